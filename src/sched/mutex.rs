//! Priority-ceiling mutex (Component I), grounded on
//! `QXMutex::init/lock/unlock` in `qxk_mutex.cpp`.
//!
//! Locking raises the scheduler's lock ceiling to this mutex's configured
//! priority (if that's higher than whatever ceiling is already in effect)
//! and records which priority holds it; unlocking restores whatever
//! ceiling was in effect before this lock, then re-runs [`Scheduler::activate`]
//! in case a thread unblocked by the ceiling drop is now the highest ready
//! priority. A mutex may not be locked from ISR context, and a thread
//! holding one must not block — exactly the original's two preconditions.

use super::Scheduler;
use crate::port::Port;
use core::sync::atomic::Ordering;

const UNUSED: u8 = 0xFF;

/// A priority-ceiling mutex bound to one ceiling priority, shared with a
/// [`Scheduler`] for the duration of each lock/unlock pair.
pub struct PriorityCeilingMutex {
    ceiling: u8,
    prev_ceiling: u8,
    prev_holder: u8,
}

impl PriorityCeilingMutex {
    /// Builds a mutex whose ceiling is `ceiling`. The ceiling should be at
    /// least as high as the priority of every active object that might
    /// lock it, so that holding the mutex can never be preempted by one of
    /// its own contenders.
    pub const fn new(ceiling: u8) -> Self {
        Self { ceiling, prev_ceiling: UNUSED, prev_holder: 0 }
    }

    /// Raises `sched`'s lock ceiling to this mutex's, recording the
    /// previous ceiling/holder to restore on unlock. Asserts if called
    /// from ISR context or while already held.
    pub fn lock<P: Port>(&mut self, sched: &Scheduler, holder: u8) {
        if sched.is_isr_context() || self.prev_ceiling != UNUSED {
            crate::error::fail::<P>(module_path!(), line!());
        }
        self.prev_ceiling = sched.lock_ceiling.load(Ordering::Acquire);
        self.prev_holder = sched.lock_holder.load(Ordering::Acquire);

        if self.prev_ceiling < self.ceiling {
            sched.lock_ceiling.store(self.ceiling, Ordering::Release);
        }
        sched.lock_holder.store(holder, Ordering::Release);
        crate::trace::mutex_lock(self.ceiling, self.prev_ceiling);
    }

    /// Restores the ceiling and holder recorded by the matching
    /// [`Self::lock`], then lets the scheduler re-activate in case a
    /// thread the ceiling had excluded is now eligible. Asserts if called
    /// from ISR context or if this mutex is not currently held.
    pub fn unlock<P: Port>(&mut self, sched: &Scheduler, mut run_prio: impl FnMut(u8) -> bool) {
        if sched.is_isr_context() || self.prev_ceiling == UNUSED {
            crate::error::fail::<P>(module_path!(), line!());
        }
        let prev = self.prev_ceiling;
        self.prev_ceiling = UNUSED;
        sched.lock_holder.store(self.prev_holder, Ordering::Release);

        if sched.lock_ceiling.load(Ordering::Acquire) > prev {
            sched.lock_ceiling.store(prev, Ordering::Release);
            crate::trace::mutex_unlock(prev);
            sched.activate::<P>(&mut run_prio);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestPort;

    #[test]
    fn lock_raises_ceiling_and_unlock_restores_it() {
        let sched = Scheduler::new();
        let mut m = PriorityCeilingMutex::new(5);

        m.lock::<TestPort>(&sched, 3);
        assert_eq!(sched.lock_ceiling.load(Ordering::Acquire), 5);
        assert_eq!(sched.lock_holder.load(Ordering::Acquire), 3);

        m.unlock::<TestPort>(&sched, |_| false);
        assert_eq!(sched.lock_ceiling.load(Ordering::Acquire), 0);
        assert_eq!(sched.lock_holder.load(Ordering::Acquire), 0);
    }

    #[test]
    fn lock_never_lowers_an_already_higher_ceiling() {
        let sched = Scheduler::new();
        sched.lock_ceiling.store(9, Ordering::Release);
        let mut outer = PriorityCeilingMutex::new(9);
        let mut inner = PriorityCeilingMutex::new(4);

        outer.lock::<TestPort>(&sched, 1);
        inner.lock::<TestPort>(&sched, 1);
        assert_eq!(sched.lock_ceiling.load(Ordering::Acquire), 9);

        inner.unlock::<TestPort>(&sched, |_| false);
        // the inner lock's ceiling (4) was never the active one, so
        // unlocking it must not disturb the still-held outer ceiling.
        assert_eq!(sched.lock_ceiling.load(Ordering::Acquire), 9);
    }

    #[test]
    #[should_panic]
    fn double_lock_asserts() {
        let sched = Scheduler::new();
        let mut m = PriorityCeilingMutex::new(5);
        m.lock::<TestPort>(&sched, 1);
        m.lock::<TestPort>(&sched, 2);
    }

    #[test]
    #[should_panic]
    fn unlock_without_a_matching_lock_asserts() {
        let sched = Scheduler::new();
        let mut m = PriorityCeilingMutex::new(5);
        m.unlock::<TestPort>(&sched, |_| false);
    }

    #[test]
    fn unlock_reactivates_a_priority_the_ceiling_had_excluded() {
        let sched = Scheduler::new();
        sched.mark_ready(3);
        let mut m = PriorityCeilingMutex::new(5);

        m.lock::<TestPort>(&sched, 8);
        // priority 3 is below the ceiling while the mutex is held.
        assert_eq!(sched.find_max(), None);

        let mut activated = None;
        m.unlock::<TestPort>(&sched, |prio| {
            activated = Some(prio);
            false
        });
        assert_eq!(activated, Some(3));
    }
}
