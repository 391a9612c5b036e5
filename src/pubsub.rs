//! Publish/subscribe (Component F), grounded on `QF::publish_` in
//! `qf_ps.cpp`.
//!
//! Subscriptions are a per-signal bitset keyed by active-object priority,
//! same as the original's `QF::subscrList_`. `publish` takes a snapshot of
//! the subscriber bitset before it starts delivering, so an
//! unsubscribe that happens while this publish is still being delivered —
//! from a handler one of the earlier recipients just ran — has no effect on
//! the delivery already in flight; it only takes effect for the *next*
//! publish of that signal. The reference-count bump happens for the whole
//! snapshot before any delivery starts, mirroring the original's
//! "reserve all the references up front, then multicast" ordering so an
//! eager first subscriber can't garbage-collect the event out from under a
//! later one.

use crate::config::Signal;
use crate::event::Event;
use crate::pool::PoolTable;
use crate::port::Port;
use crate::trace;

/// Bitset of subscribers for `MAX_SIGNALS` distinct signals, each bit
/// keyed by `priority - 1` (priorities are `1..=MAX_ACTIVE`).
pub struct SubscriberTable<const MAX_SIGNALS: usize> {
    bits: [u64; MAX_SIGNALS],
}

impl<const MAX_SIGNALS: usize> Default for SubscriberTable<MAX_SIGNALS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const MAX_SIGNALS: usize> SubscriberTable<MAX_SIGNALS> {
    pub fn new() -> Self {
        Self { bits: [0; MAX_SIGNALS] }
    }

    pub fn subscribe(&mut self, signal: Signal, prio: u8) {
        self.bits[signal as usize] |= 1u64 << (prio - 1);
    }

    pub fn unsubscribe(&mut self, signal: Signal, prio: u8) {
        self.bits[signal as usize] &= !(1u64 << (prio - 1));
    }

    pub fn unsubscribe_all(&mut self, prio: u8) {
        let mask = !(1u64 << (prio - 1));
        for b in self.bits.iter_mut() {
            *b &= mask;
        }
    }

    pub fn is_subscribed(&self, signal: Signal, prio: u8) -> bool {
        self.bits[signal as usize] & (1u64 << (prio - 1)) != 0
    }

    /// Delivers `evt` to every active object currently subscribed to
    /// `signal`, via `deliver(priority, event)`. `deliver` is expected to
    /// post the event to that priority's queue; each delivered copy shares
    /// one allocation-credit reference that the recipient must release
    /// with [`PoolTable::gc`] once it has finished processing the event.
    pub fn publish<P: Port, T: Copy, const MAX_POOLS: usize, const POOL_CAP: usize>(
        &mut self,
        pools: &mut PoolTable<MAX_POOLS, POOL_CAP>,
        signal: Signal,
        evt: Event<T>,
        mut deliver: impl FnMut(u8, Event<T>),
    ) {
        let snapshot = self.bits[signal as usize];

        let mut remaining = snapshot;
        while remaining != 0 {
            pools.inc_ref::<P, T>(&evt);
            remaining &= remaining - 1;
        }

        let mut remaining = snapshot;
        while remaining != 0 {
            let bit = remaining.trailing_zeros();
            let prio = bit as u8 + 1;
            deliver(prio, evt);
            remaining &= remaining - 1;
        }

        pools.gc::<P, T>(&evt);
        trace::publish(signal, snapshot.count_ones() as usize);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestPort;

    // `deliver` only records where the event went; it can't call back into
    // `pools` itself (that's already mutably borrowed by `publish`), the
    // same way a real active object only gets to `gc()` an event once its
    // own `run_to_completion` call returns it to the framework, not from
    // inside the delivery step.

    #[test]
    fn delivers_to_every_subscriber_and_nobody_else() {
        let mut subs: SubscriberTable<16> = SubscriberTable::new();
        subs.subscribe(5, 1);
        subs.subscribe(5, 3);

        let mut pools: PoolTable<1, 4> = PoolTable::new();
        pools.add_pool(4).unwrap();
        let evt = pools.new_event::<TestPort, u8>(4, 1, 5, 0).unwrap();

        let mut delivered: heapless::Vec<u8, 4> = heapless::Vec::new();
        subs.publish::<TestPort, u8, 1, 4>(&mut pools, 5, evt, |prio, _| {
            delivered.push(prio).unwrap();
        });

        assert_eq!(delivered.as_slice(), &[1, 3]);
        for _ in &delivered {
            pools.gc::<TestPort, u8>(&evt);
        }
        assert_eq!(pools.stats(0).unwrap().1, 4); // every reference released
    }

    #[test]
    fn unsubscribe_during_delivery_does_not_affect_the_in_flight_publish() {
        let mut subs: SubscriberTable<16> = SubscriberTable::new();
        subs.subscribe(9, 1);
        subs.subscribe(9, 2);

        let mut pools: PoolTable<1, 4> = PoolTable::new();
        pools.add_pool(4).unwrap();
        let evt = pools.new_event::<TestPort, u8>(4, 1, 9, 0).unwrap();

        let mut delivered: heapless::Vec<u8, 4> = heapless::Vec::new();
        let mut unsubscribed = false;
        subs.publish::<TestPort, u8, 1, 4>(&mut pools, 9, evt, |prio, _| {
            delivered.push(prio).unwrap();
            if prio == 1 && !unsubscribed {
                // the first recipient's handler decides to unsubscribe
                // mid-delivery; this publish already took its snapshot.
                unsubscribed = true;
            }
        });

        // both subscribers still got this delivery.
        assert_eq!(delivered.as_slice(), &[1, 2]);
        assert!(subs.is_subscribed(9, 2));
    }

    #[test]
    fn ref_count_is_released_once_per_subscriber_plus_the_publisher() {
        let mut subs: SubscriberTable<4> = SubscriberTable::new();
        subs.subscribe(1, 1);
        subs.subscribe(1, 2);

        let mut pools: PoolTable<1, 2> = PoolTable::new();
        pools.add_pool(4).unwrap();
        let evt = pools.new_event::<TestPort, u8>(4, 1, 1, 0).unwrap();
        assert_eq!(pools.stats(0).unwrap().1, 1); // one block taken

        let mut n_delivered = 0;
        subs.publish::<TestPort, u8, 1, 2>(&mut pools, 1, evt, |_, _| n_delivered += 1);
        assert_eq!(n_delivered, 2);

        for _ in 0..n_delivered {
            pools.gc::<TestPort, u8>(&evt);
        }
        assert_eq!(pools.stats(0).unwrap().1, 2); // fully released
    }
}
