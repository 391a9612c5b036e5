//! Priority-preemptive native scheduler (Component H).
//!
//! Grounded on the teacher kernel's `sched::tick`/`rq::pick_next` pattern —
//! a ready-set bitmap, an atomic ISR-nesting counter, and a pick-highest
//! loop — adapted from task-level preemption to active-object run-to-
//! completion steps. Every active object in this framework runs as a
//! "basic" (non-blocking) thread: [`Scheduler::activate`] always executes
//! one event to completion, then re-reads the ready set before deciding
//! what to run next, so a higher-priority active object that became ready
//! mid-loop preempts at the next step boundary rather than mid-instruction.
//! That is sufficient preemption granularity for an active-object system,
//! where a handler is expected to run to completion quickly and never
//! block.
//!
//! "Extended" (blocking, own-stack) threads are a real part of the original
//! kernel this was ported from, but true context switching needs
//! target-specific `unsafe` assembly the teacher's own `context_switch`
//! supplies — code this exercise never compiles or runs. Rather than ship
//! unverified `asm!`, extended-thread support is expressed as the
//! [`ExtendedThread`] extension trait: a host that needs blocking threads
//! implements it with its real RTOS or architecture's context-switch
//! primitives, and this crate only tracks which extended threads are
//! ready/blocked.

pub mod mutex;

use crate::port::Port;
use core::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Bitmap of ready priorities, one bit per priority (`bit i` == priority
/// `i + 1`). Supports up to 64 simultaneously registered priorities, the
/// configured ceiling in §6.
#[derive(Default)]
pub struct ReadySet(AtomicU64);

impl ReadySet {
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, prio: u8) {
        self.0.fetch_or(1u64 << (prio - 1), Ordering::AcqRel);
    }

    pub fn clear(&self, prio: u8) {
        self.0.fetch_and(!(1u64 << (prio - 1)), Ordering::AcqRel);
    }

    pub fn is_set(&self, prio: u8) -> bool {
        self.0.load(Ordering::Acquire) & (1u64 << (prio - 1)) != 0
    }

    fn bits(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }
}

/// A host-implemented extension for blocking ("extended") threads, gated
/// behind the `extended-threads` feature. The scheduler only needs to know
/// whether an extended thread is presently blocked; the actual save/restore
/// of its execution context is the host's responsibility.
#[cfg(feature = "extended-threads")]
pub trait ExtendedThread: Port {
    /// Saves the calling thread's context and switches away from it. Called
    /// with interrupts already disabled; must return once this thread is
    /// resumed.
    fn block_current(prio: u8);

    /// Marks a previously-blocked extended thread ready and eligible for
    /// [`Scheduler::find_max`] to select again.
    fn unblock(prio: u8);
}

/// Ready-set, ISR-nesting counter, and the priority-ceiling ledger a
/// [`crate::mutex::PriorityCeilingMutex`] raises and restores. One instance
/// is shared by every active object registered with a
/// [`crate::framework::Framework`].
pub struct Scheduler {
    ready: ReadySet,
    isr_nesting: AtomicU8,
    pub(crate) lock_ceiling: AtomicU8,
    pub(crate) lock_holder: AtomicU8,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub const fn new() -> Self {
        Self {
            ready: ReadySet::new(),
            isr_nesting: AtomicU8::new(0),
            lock_ceiling: AtomicU8::new(0),
            lock_holder: AtomicU8::new(0),
        }
    }

    pub fn mark_ready(&self, prio: u8) {
        self.ready.set(prio);
    }

    pub fn mark_idle(&self, prio: u8) {
        self.ready.clear(prio);
    }

    /// Enters an ISR. Must be paired with [`Scheduler::isr_exit`]; nestable.
    pub fn isr_enter(&self) {
        self.isr_nesting.fetch_add(1, Ordering::AcqRel);
    }

    pub fn isr_exit(&self) {
        self.isr_nesting.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn is_isr_context(&self) -> bool {
        self.isr_nesting.load(Ordering::Acquire) > 0
    }

    /// Highest ready priority eligible to run right now: every ready
    /// priority above the active lock ceiling, plus the ceiling's own
    /// holder (who must be allowed to keep running — that's the whole
    /// point of raising the ceiling instead of simply blocking everyone
    /// below it).
    pub fn find_max(&self) -> Option<u8> {
        let ceiling = self.lock_ceiling.load(Ordering::Acquire);
        let mut bits = self.ready.bits();
        if ceiling > 0 {
            let holder = self.lock_holder.load(Ordering::Acquire);
            let above_ceiling = !0u64 << ceiling;
            let holder_bit = if holder > 0 { 1u64 << (holder - 1) } else { 0 };
            bits = (bits & above_ceiling) | (bits & holder_bit);
        }
        if bits == 0 {
            None
        } else {
            Some(64 - bits.leading_zeros() as u8)
        }
    }

    /// Repeatedly runs the highest-priority ready active object one event
    /// at a time via `run_prio`, which must return whether that priority
    /// still has queued work afterward. Returns once nothing is ready,
    /// at which point the host should call [`crate::port::Port::on_idle`].
    pub fn activate<P: Port>(&self, mut run_prio: impl FnMut(u8) -> bool) {
        while let Some(prio) = self.find_max() {
            crate::trace::sched_activate(prio);
            if !run_prio(prio) {
                self.mark_idle(prio);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestPort;

    #[test]
    fn find_max_picks_the_highest_ready_priority() {
        let sched = Scheduler::new();
        sched.mark_ready(3);
        sched.mark_ready(7);
        sched.mark_ready(5);
        assert_eq!(sched.find_max(), Some(7));
    }

    #[test]
    fn lock_ceiling_excludes_ready_priorities_at_or_below_it() {
        let sched = Scheduler::new();
        sched.mark_ready(2);
        sched.mark_ready(5);
        sched.lock_ceiling.store(5, core::sync::atomic::Ordering::Release);
        // priority 5 itself is at the ceiling, not above it: excluded
        // unless it is also the holder.
        assert_eq!(sched.find_max(), None);
        sched.mark_ready(9);
        assert_eq!(sched.find_max(), Some(9));
    }

    #[test]
    fn lock_holder_keeps_running_through_its_own_ceiling() {
        let sched = Scheduler::new();
        sched.mark_ready(3);
        sched.lock_ceiling.store(5, core::sync::atomic::Ordering::Release);
        sched.lock_holder.store(3, core::sync::atomic::Ordering::Release);
        assert_eq!(sched.find_max(), Some(3));
    }

    #[test]
    fn activate_drains_every_ready_priority_highest_first() {
        let sched = Scheduler::new();
        sched.mark_ready(2);
        sched.mark_ready(6);
        let mut order: heapless::Vec<u8, 4> = heapless::Vec::new();
        sched.activate::<TestPort>(|prio| {
            order.push(prio).unwrap();
            false // nothing left queued at this priority
        });
        assert_eq!(order.as_slice(), &[6, 2]);
        assert_eq!(sched.find_max(), None);
    }
}
