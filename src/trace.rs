//! Structured trace points (§4.K).
//!
//! Every component in the crate emits its trace records through the
//! [`TraceSink`] trait rather than calling a logger directly, so a host can
//! swap in its own sink (a ring buffer, a UART line, nothing at all)
//! instead of the crate's own `log`-backed default, [`LogSink`]. The free
//! functions below are what every other module actually calls; each is a
//! thin wrapper forwarding to the crate-wide default sink — mirroring the
//! way the teacher kernel's IPC subsystem calls `log::info!`/`log::warn!`
//! directly from inside its queue and channel code rather than routing
//! through a hand-rolled callback registry. With the `trace` feature
//! disabled, `LogSink`'s methods compile to nothing.

#![allow(unused_variables)]

/// Accepts the structured trace records every component in this crate
/// emits: pool get/put, queue post/get, state dispatch/transition, publish,
/// time-event arm/fire, and mutex lock/unlock. Every method has a no-op
/// default, so an implementor only needs to override the few it cares
/// about.
pub trait TraceSink {
    fn pool_get(&self, pool_idx: usize, free_count: u16, min_free: u16) {}
    fn pool_put(&self, pool_idx: usize, free_count: u16) {}
    fn pool_exhausted(&self, pool_idx: usize) {}
    fn queue_post_fifo(&self, prio: u8, free_count: u16) {}
    fn queue_post_lifo(&self, prio: u8, free_count: u16) {}
    fn queue_get(&self, prio: u8, free_count: u16) {}
    fn queue_full(&self, prio: u8) {}
    fn transition(&self, signal: u16, source: u16, target: u16) {}
    fn dispatch(&self, prio: u8, signal: u16, state: u16) {}
    fn publish(&self, signal: u16, n_subscribers: usize) {}
    fn time_event_armed(&self, prio: u8, signal: u16, ticks: u16, tick_rate: usize) {}
    fn time_event_fired(&self, prio: u8, signal: u16, tick_rate: usize) {}
    fn mutex_lock(&self, ceiling: u8, prev: u8) {}
    fn mutex_unlock(&self, restored: u8) {}
    fn sched_activate(&self, prio: u8) {}
}

#[cfg(feature = "trace")]
macro_rules! emit {
    ($lvl:ident, $($arg:tt)+) => {
        ::log::$lvl!($($arg)+)
    };
}

#[cfg(not(feature = "trace"))]
macro_rules! emit {
    ($lvl:ident, $($arg:tt)+) => {};
}

/// The crate's own sink: forwards every record to the `log` facade at an
/// appropriate level (`trace!` for routine pool and queue traffic, `info!`
/// for transitions and publishes, `warn!` for exhaustion/full).
pub struct LogSink;

impl TraceSink for LogSink {
    fn pool_get(&self, pool_idx: usize, free_count: u16, min_free: u16) {
        emit!(trace, "pool[{}]: get -> free={} min_free={}", pool_idx, free_count, min_free);
    }

    fn pool_put(&self, pool_idx: usize, free_count: u16) {
        emit!(trace, "pool[{}]: put -> free={}", pool_idx, free_count);
    }

    fn pool_exhausted(&self, pool_idx: usize) {
        emit!(warn, "pool[{}]: exhausted", pool_idx);
    }

    fn queue_post_fifo(&self, prio: u8, free_count: u16) {
        emit!(trace, "queue[{}]: post FIFO -> free={}", prio, free_count);
    }

    fn queue_post_lifo(&self, prio: u8, free_count: u16) {
        emit!(trace, "queue[{}]: post LIFO -> free={}", prio, free_count);
    }

    fn queue_get(&self, prio: u8, free_count: u16) {
        emit!(trace, "queue[{}]: get -> free={}", prio, free_count);
    }

    fn queue_full(&self, prio: u8) {
        emit!(warn, "queue[{}]: full, event dropped", prio);
    }

    fn transition(&self, signal: u16, source: u16, target: u16) {
        emit!(info, "sig={} transition {} -> {}", signal, source, target);
    }

    fn dispatch(&self, prio: u8, signal: u16, state: u16) {
        emit!(trace, "ao[{}]: sig={} dispatched in state {}", prio, signal, state);
    }

    fn publish(&self, signal: u16, n_subscribers: usize) {
        emit!(info, "pubsub: sig={} delivered to {} subscribers", signal, n_subscribers);
    }

    fn time_event_armed(&self, prio: u8, signal: u16, ticks: u16, tick_rate: usize) {
        emit!(trace, "time[{}]: armed sig={} ticks={} rate={}", prio, signal, ticks, tick_rate);
    }

    fn time_event_fired(&self, prio: u8, signal: u16, tick_rate: usize) {
        emit!(trace, "time[{}]: fired sig={} rate={}", prio, signal, tick_rate);
    }

    fn mutex_lock(&self, ceiling: u8, prev: u8) {
        emit!(trace, "mutex: lock ceiling={} prev_lock_prio={}", ceiling, prev);
    }

    fn mutex_unlock(&self, restored: u8) {
        emit!(trace, "mutex: unlock restored_lock_prio={}", restored);
    }

    fn sched_activate(&self, prio: u8) {
        emit!(trace, "sched: activate prio={}", prio);
    }
}

const SINK: LogSink = LogSink;

#[inline]
pub fn pool_get(pool_idx: usize, free_count: u16, min_free: u16) {
    SINK.pool_get(pool_idx, free_count, min_free);
}

#[inline]
pub fn pool_put(pool_idx: usize, free_count: u16) {
    SINK.pool_put(pool_idx, free_count);
}

#[inline]
pub fn pool_exhausted(pool_idx: usize) {
    SINK.pool_exhausted(pool_idx);
}

#[inline]
pub fn queue_post_fifo(prio: u8, free_count: u16) {
    SINK.queue_post_fifo(prio, free_count);
}

#[inline]
pub fn queue_post_lifo(prio: u8, free_count: u16) {
    SINK.queue_post_lifo(prio, free_count);
}

#[inline]
pub fn queue_get(prio: u8, free_count: u16) {
    SINK.queue_get(prio, free_count);
}

#[inline]
pub fn queue_full(prio: u8) {
    SINK.queue_full(prio);
}

#[inline]
pub fn transition(signal: u16, source: u16, target: u16) {
    SINK.transition(signal, source, target);
}

#[inline]
pub fn dispatch(prio: u8, signal: u16, state: u16) {
    SINK.dispatch(prio, signal, state);
}

#[inline]
pub fn publish(signal: u16, n_subscribers: usize) {
    SINK.publish(signal, n_subscribers);
}

#[inline]
pub fn time_event_armed(prio: u8, signal: u16, ticks: u16, tick_rate: usize) {
    SINK.time_event_armed(prio, signal, ticks, tick_rate);
}

#[inline]
pub fn time_event_fired(prio: u8, signal: u16, tick_rate: usize) {
    SINK.time_event_fired(prio, signal, tick_rate);
}

#[inline]
pub fn mutex_lock(ceiling: u8, prev: u8) {
    SINK.mutex_lock(ceiling, prev);
}

#[inline]
pub fn mutex_unlock(restored: u8) {
    SINK.mutex_unlock(restored);
}

#[inline]
pub fn sched_activate(prio: u8) {
    SINK.sched_activate(prio);
}
