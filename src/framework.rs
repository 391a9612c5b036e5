//! Framework context (§9 design note).
//!
//! The original ties event pools, the ready set, the subscriber table, the
//! active-object priority table, and the time-event lists together as
//! process-wide globals (`QF::` static members). This crate instead
//! collects them into one value, [`Framework`], with an explicit
//! construction and registration lifecycle — no `static mut`, no global
//! singleton, so a host can run more than one instance (handy for tests)
//! and so every dependency is visible in the type signature instead of
//! implicit through a shared global namespace.

use crate::ao::AnyActiveObject;
use crate::config::{Ctr, Signal};
use crate::error::Error;
use crate::event::Event;
use crate::pool::PoolTable;
use crate::port::Port;
use crate::pubsub::SubscriberTable;
use crate::sched::mutex::PriorityCeilingMutex;
use crate::sched::Scheduler;
use crate::time::TimeWheel;

/// The whole runtime for one application: a fixed registry of active
/// objects sharing one event-pool allocator, one publish/subscribe table,
/// one time-event wheel, and one scheduler.
///
/// Const parameters: `MAX_ACTIVE` active objects, `MAX_POOLS` event-pool
/// size classes of `POOL_CAP` blocks each, `MAX_SIGNALS` distinct
/// publishable signals, `MAX_TIMERS` time events across `MAX_TICK_RATES`
/// independent tick rates.
pub struct Framework<
    'a,
    Evt,
    P,
    const MAX_ACTIVE: usize,
    const MAX_POOLS: usize,
    const POOL_CAP: usize,
    const MAX_SIGNALS: usize,
    const MAX_TIMERS: usize,
    const MAX_TICK_RATES: usize,
> where
    Evt: Copy + Default,
    P: Port,
{
    aos: heapless::Vec<&'a mut dyn AnyActiveObject<Evt, P>, MAX_ACTIVE>,
    pools: PoolTable<MAX_POOLS, POOL_CAP>,
    subs: SubscriberTable<MAX_SIGNALS>,
    timers: TimeWheel<MAX_TIMERS, MAX_TICK_RATES>,
    sched: Scheduler,
    /// Priorities reserved as a mutex ceiling by [`Framework::new_mutex`].
    /// Bounded by `MAX_ACTIVE` on the assumption that an application never
    /// needs more priority-ceiling mutexes than it has active objects.
    mutex_ceilings: heapless::Vec<u8, MAX_ACTIVE>,
}

impl<
        'a,
        Evt,
        P,
        const MAX_ACTIVE: usize,
        const MAX_POOLS: usize,
        const POOL_CAP: usize,
        const MAX_SIGNALS: usize,
        const MAX_TIMERS: usize,
        const MAX_TICK_RATES: usize,
    > Framework<'a, Evt, P, MAX_ACTIVE, MAX_POOLS, POOL_CAP, MAX_SIGNALS, MAX_TIMERS, MAX_TICK_RATES>
where
    Evt: Copy + Default,
    P: Port,
{
    pub fn new() -> Self {
        Self {
            aos: heapless::Vec::new(),
            pools: PoolTable::new(),
            subs: SubscriberTable::new(),
            timers: TimeWheel::new(),
            sched: Scheduler::new(),
            mutex_ceilings: heapless::Vec::new(),
        }
    }

    /// Registers an event-pool size class. Must be called in ascending
    /// `block_size` order before any [`Framework::new_event`] call.
    pub fn add_pool(&mut self, block_size: u16) -> Result<(), Error> {
        self.pools.add_pool(block_size)
    }

    /// Registers an active object at its fixed priority. Fails with
    /// [`Error::PriorityInUse`] if another registered active object
    /// already holds that priority, or [`Error::PriorityCeilingInUse`] if
    /// a mutex already reserved that priority as its ceiling.
    pub fn register(&mut self, ao: &'a mut dyn AnyActiveObject<Evt, P>) -> Result<(), Error> {
        if self.aos.iter().any(|existing| existing.priority() == ao.priority()) {
            return Err(Error::PriorityInUse);
        }
        if self.mutex_ceilings.iter().any(|&c| c == ao.priority()) {
            return Err(Error::PriorityCeilingInUse);
        }
        self.aos.push(ao).map_err(|_| Error::PoolExhausted)
    }

    /// Reserves `ceiling` as a priority-ceiling mutex's ceiling and builds
    /// the mutex. The ceiling must be a priority no active object is
    /// registered at and no other mutex has already reserved; it is then
    /// held in the same priority table active-object registrations check
    /// against, so a later [`Framework::register`] can't collide with it
    /// either. Fails with [`Error::PriorityCeilingInUse`] on collision.
    pub fn new_mutex(&mut self, ceiling: u8) -> Result<PriorityCeilingMutex, Error> {
        if self.aos.iter().any(|ao| ao.priority() == ceiling) {
            return Err(Error::PriorityCeilingInUse);
        }
        if self.mutex_ceilings.iter().any(|&c| c == ceiling) {
            return Err(Error::PriorityCeilingInUse);
        }
        self.mutex_ceilings.push(ceiling).map_err(|_| Error::PoolExhausted)?;
        Ok(PriorityCeilingMutex::new(ceiling))
    }

    /// Runs every registered active object's top-level initial transition.
    /// Call once, after every active object has been registered.
    pub fn start_all(&mut self) {
        for ao in self.aos.iter_mut() {
            ao.start();
        }
    }

    fn find_ao(&mut self, prio: u8) -> Option<&mut (dyn AnyActiveObject<Evt, P> + 'a)> {
        self.aos.iter_mut().map(|b| &mut **b).find(|a| a.priority() == prio)
    }

    /// Allocates a pooled event. See [`PoolTable::new_event`] for the
    /// margin/size_hint contract.
    pub fn new_event(&mut self, size_hint: u16, margin: Ctr, signal: Signal, payload: Evt) -> Option<Event<Evt>> {
        self.pools.new_event::<P, Evt>(size_hint, margin, signal, payload)
    }

    /// Posts to the back of `prio`'s queue, then runs the scheduler until
    /// nothing is left ready. Fails with [`Error::NotRegistered`] if no
    /// active object holds that priority.
    pub fn post_fifo(&mut self, prio: u8, evt: Event<Evt>, margin: Ctr) -> Result<(), Error> {
        match self.find_ao(prio) {
            Some(ao) => {
                ao.post_fifo(evt, margin)?;
                self.sched.mark_ready(prio);
                self.activate();
                Ok(())
            }
            None => Err(Error::NotRegistered),
        }
    }

    /// Jumps an event to the front of `prio`'s queue (guaranteed, asserts
    /// on failure), then runs the scheduler.
    pub fn post_lifo(&mut self, prio: u8, evt: Event<Evt>) {
        match self.find_ao(prio) {
            Some(ao) => {
                ao.post_lifo(evt);
                self.sched.mark_ready(prio);
            }
            None => crate::error::fail::<P>(module_path!(), line!()),
        }
        self.activate();
    }

    pub fn subscribe(&mut self, signal: Signal, prio: u8) {
        self.subs.subscribe(signal, prio);
    }

    pub fn unsubscribe(&mut self, signal: Signal, prio: u8) {
        self.subs.unsubscribe(signal, prio);
    }

    /// Delivers `evt` to every current subscriber of `signal`, then runs
    /// the scheduler.
    pub fn publish(&mut self, signal: Signal, evt: Event<Evt>) {
        let Self { aos, pools, subs, sched, .. } = self;
        subs.publish::<P, Evt, MAX_POOLS, POOL_CAP>(pools, signal, evt, |prio, e| {
            if let Some(ao) = aos.iter_mut().map(|b| &mut **b).find(|a| a.priority() == prio) {
                // publish is always best-effort from the framework's
                // perspective: a subscriber whose queue is genuinely full
                // drops this delivery rather than taking down the publisher.
                let _ = ao.post_fifo(e, 1);
                sched.mark_ready(prio);
            }
        });
        self.activate();
    }

    /// Arms a new one-shot or periodic timer bound to post `signal` to
    /// `prio` under tick rate `tick_rate`.
    pub fn new_timer(&mut self, tick_rate: usize, prio: u8, signal: Signal) -> crate::time::TimerId {
        self.timers.new_timer::<P>(tick_rate, prio, signal)
    }

    pub fn arm_timer(&mut self, timer: crate::time::TimerId, ticks: crate::config::Ticks, interval: crate::config::Ticks) {
        self.timers.arm(timer, ticks, interval);
    }

    pub fn disarm_timer(&mut self, timer: crate::time::TimerId) {
        self.timers.disarm(timer);
    }

    /// Advances `tick_rate` by one tick, delivering any expired timers'
    /// events and then running the scheduler.
    pub fn tick(&mut self, tick_rate: usize)
    where
        Evt: Default,
    {
        let Self { aos, timers, sched, .. } = self;
        timers.tick(tick_rate, |prio, signal| {
            if let Some(ao) = aos.iter_mut().map(|b| &mut **b).find(|a| a.priority() == prio) {
                let evt = Event::new_static(signal, Evt::default());
                let _ = ao.post_fifo(evt, 1);
                sched.mark_ready(prio);
            }
        });
        self.activate();
    }

    /// Drains every ready active object, highest priority first, until
    /// none has work left.
    pub fn activate(&mut self) {
        let Self { sched, aos, pools, .. } = self;
        sched.activate::<P>(|prio| match aos.iter_mut().map(|b| &mut **b).find(|a| a.priority() == prio) {
            Some(ao) => ao.run_to_completion(&mut |e| pools.gc::<P, Evt>(e)),
            None => crate::error::fail::<P>(module_path!(), line!()),
        });
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.sched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ao::ActiveObject;
    use crate::config::{EMPTY_SIG, ENTRY_SIG, EXIT_SIG, INIT_SIG, USER_SIG};
    use crate::hsm::{Outcome, StateMachine};
    use crate::test_support::TestPort;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::vec::Vec;

    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    enum St {
        Top,
        Run,
    }

    /// One substate below `Top`; every non-reserved signal it receives is
    /// recorded as `(id, signal)` so a test can see which active object
    /// handled what, and in which order.
    struct Recorder {
        id: u8,
        log: Rc<RefCell<Vec<(u8, u16)>>>,
    }

    impl StateMachine<u8> for Recorder {
        type State = St;

        fn top() -> St {
            St::Top
        }

        fn state_id(state: St) -> u16 {
            state as u16
        }

        fn handler(&mut self, state: St, event: &Event<u8>) -> Outcome<St> {
            match state {
                St::Top => match event.signal {
                    INIT_SIG => Outcome::Init(St::Run),
                    _ => Outcome::Ignored,
                },
                St::Run => match event.signal {
                    EMPTY_SIG => Outcome::Super(St::Top),
                    ENTRY_SIG | EXIT_SIG | INIT_SIG => Outcome::Handled,
                    sig => {
                        self.log.borrow_mut().push((self.id, sig));
                        Outcome::Handled
                    }
                },
            }
        }
    }

    const SIG_PING: u16 = USER_SIG;
    const SIG_BROADCAST: u16 = USER_SIG + 1;

    type Fx<'a> = Framework<'a, u8, TestPort, 4, 1, 8, 16, 4, 1>;

    #[test]
    fn register_rejects_duplicate_priority() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut a = ActiveObject::<Recorder, u8, 4, 4>::new(1, Recorder { id: 1, log: log.clone() });
        let mut b = ActiveObject::<Recorder, u8, 4, 4>::new(1, Recorder { id: 2, log: log.clone() });

        let mut fw: Fx<'_> = Framework::new();
        fw.register(&mut a).unwrap();
        assert_eq!(fw.register(&mut b), Err(Error::PriorityInUse));
    }

    #[test]
    fn posting_to_unregistered_priority_is_an_error() {
        let mut fw: Fx<'_> = Framework::new();
        let evt = Event::new_static(SIG_PING, 0u8);
        assert_eq!(fw.post_fifo(7, evt, 1), Err(Error::NotRegistered));
    }

    #[test]
    fn two_active_objects_exchange_events_end_to_end() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut a = ActiveObject::<Recorder, u8, 4, 4>::new(1, Recorder { id: 1, log: log.clone() });
        let mut b = ActiveObject::<Recorder, u8, 4, 4>::new(2, Recorder { id: 2, log: log.clone() });

        let mut fw: Fx<'_> = Framework::new();
        fw.register(&mut a).unwrap();
        fw.register(&mut b).unwrap();
        fw.start_all();

        fw.post_fifo(2, Event::new_static(SIG_PING, 7), 1).unwrap();
        fw.post_fifo(1, Event::new_static(SIG_PING, 9), 1).unwrap();

        // Both priorities ran to completion (the higher one first), each
        // recording the event it alone received.
        assert_eq!(*log.borrow(), vec![(2, SIG_PING), (1, SIG_PING)]);
    }

    #[test]
    fn publish_reaches_every_subscriber_across_active_objects() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut a = ActiveObject::<Recorder, u8, 4, 4>::new(1, Recorder { id: 1, log: log.clone() });
        let mut b = ActiveObject::<Recorder, u8, 4, 4>::new(2, Recorder { id: 2, log: log.clone() });
        let mut c = ActiveObject::<Recorder, u8, 4, 4>::new(3, Recorder { id: 3, log: log.clone() });

        let mut fw: Fx<'_> = Framework::new();
        fw.register(&mut a).unwrap();
        fw.register(&mut b).unwrap();
        fw.register(&mut c).unwrap();
        fw.start_all();

        fw.subscribe(SIG_BROADCAST, 1);
        fw.subscribe(SIG_BROADCAST, 3);
        // priority 2 deliberately never subscribes.

        fw.publish(SIG_BROADCAST, Event::new_static(SIG_BROADCAST, 0));

        let mut seen: Vec<u8> = log.borrow().iter().map(|(id, _)| *id).collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![1, 3]);
    }

    #[test]
    fn pooled_event_round_trips_through_publish_and_is_fully_released() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut a = ActiveObject::<Recorder, u8, 4, 4>::new(1, Recorder { id: 1, log: log.clone() });
        let mut b = ActiveObject::<Recorder, u8, 4, 4>::new(2, Recorder { id: 2, log: log.clone() });

        let mut fw: Fx<'_> = Framework::new();
        fw.add_pool(8).unwrap();
        fw.register(&mut a).unwrap();
        fw.register(&mut b).unwrap();
        fw.start_all();

        fw.subscribe(SIG_BROADCAST, 1);
        fw.subscribe(SIG_BROADCAST, 2);

        let evt = fw.new_event(8, 1, SIG_BROADCAST, 0).unwrap();
        assert_eq!(fw.pools.stats(0).unwrap().1, 7); // one block taken

        fw.publish(SIG_BROADCAST, evt);

        assert_eq!(log.borrow().len(), 2);
        // both subscribers ran to completion inside publish()/activate(),
        // each releasing its allocation credit via run_to_completion's
        // release callback: the block is back in the pool afterward.
        assert_eq!(fw.pools.stats(0).unwrap().1, 8);
    }

    #[test]
    fn timer_fires_through_the_full_stack() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut a = ActiveObject::<Recorder, u8, 4, 4>::new(1, Recorder { id: 1, log: log.clone() });

        let mut fw: Fx<'_> = Framework::new();
        fw.register(&mut a).unwrap();
        fw.start_all();

        let timer = fw.new_timer(0, 1, SIG_PING);
        fw.arm_timer(timer, 2, 0);

        // round-trip law: arm(T, 2, 0); tick x 2 fires T exactly once.
        fw.tick(0);
        assert!(log.borrow().is_empty());
        fw.tick(0);
        assert_eq!(*log.borrow(), vec![(1, SIG_PING)]);

        // one-shot: stays silent on further ticks without a re-arm.
        fw.tick(0);
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn new_mutex_rejects_a_ceiling_already_held_by_an_active_object() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut a = ActiveObject::<Recorder, u8, 4, 4>::new(5, Recorder { id: 5, log });

        let mut fw: Fx<'_> = Framework::new();
        fw.register(&mut a).unwrap();

        assert_eq!(fw.new_mutex(5).unwrap_err(), Error::PriorityCeilingInUse);
    }

    #[test]
    fn new_mutex_rejects_a_ceiling_already_reserved_by_another_mutex() {
        let mut fw: Fx<'_> = Framework::new();
        fw.new_mutex(5).unwrap();

        assert_eq!(fw.new_mutex(5).unwrap_err(), Error::PriorityCeilingInUse);
    }

    #[test]
    fn register_rejects_a_priority_already_reserved_as_a_mutex_ceiling() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut a = ActiveObject::<Recorder, u8, 4, 4>::new(5, Recorder { id: 5, log });

        let mut fw: Fx<'_> = Framework::new();
        fw.new_mutex(5).unwrap();

        assert_eq!(fw.register(&mut a).unwrap_err(), Error::PriorityCeilingInUse);
    }
}
