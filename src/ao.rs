//! Active objects (Component G): an [`crate::hsm::Processor`] bound to its
//! own [`crate::queue::EventQueue`] and a fixed, unique priority.
//!
//! Posting to an active object that has not been started (or has since been
//! stopped) is a fatal assertion rather than a silently dropped event or a
//! queued-for-later message: the priority table is the framework's single
//! source of truth for "this AO exists and is schedulable", so a post
//! outside that window means something upstream still holds a stale
//! reference to it.

use crate::config::Ctr;
use crate::error::Error;
use crate::event::Event;
use crate::hsm::{Processor, StateMachine};
use crate::port::Port;
use crate::queue::EventQueue;

/// Binds a state machine instance, its dispatch cursor, and its inbox under
/// one fixed priority. `QCAP` is the inbox's ring capacity (see
/// [`EventQueue`]); `DEPTH` bounds the state hierarchy's nesting depth.
pub struct ActiveObject<H, Evt, const QCAP: usize, const DEPTH: usize>
where
    Evt: Copy + Default,
    H: StateMachine<Evt>,
{
    sm: H,
    processor: Processor<H, Evt, DEPTH>,
    queue: EventQueue<Evt, QCAP>,
    prio: u8,
    running: bool,
}

impl<H, Evt, const QCAP: usize, const DEPTH: usize> ActiveObject<H, Evt, QCAP, DEPTH>
where
    Evt: Copy + Default,
    H: StateMachine<Evt>,
{
    /// Builds an active object at a fixed priority. `prio` must be unique
    /// among every active object registered with the same
    /// [`crate::framework::Framework`]; uniqueness itself is enforced there,
    /// not here, since a lone `ActiveObject` has no visibility into its
    /// siblings.
    pub fn new(prio: u8, sm: H) -> Self {
        Self {
            sm,
            processor: Processor::new(),
            queue: EventQueue::new(),
            prio,
            running: false,
        }
    }

    pub fn priority(&self) -> u8 {
        self.prio
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Runs the state machine's top-level initial transition and marks the
    /// active object eligible to receive events.
    pub fn start<P: Port>(&mut self) {
        self.processor.init::<P>(&mut self.sm);
        self.running = true;
    }

    /// Marks the active object ineligible to receive further events.
    /// Anything already queued stays queued but will not be drained until
    /// (if ever) the active object is started again.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Appends an event to the back of this active object's queue.
    /// `margin == 0` asserts on a full queue; see [`EventQueue::post_fifo`].
    ///
    /// Posting to a stopped (never-started, or since-stopped) active
    /// object is always a fatal assertion, regardless of margin: the
    /// priority table is authoritative, so a post reaching here names an
    /// active object the caller should never have had a handle to anymore.
    pub fn post_fifo<P: Port>(&mut self, evt: Event<Evt>, margin: Ctr) -> Result<(), Error> {
        if !self.running {
            crate::error::fail::<P>(module_path!(), line!());
        }
        self.queue.post_fifo::<P>(self.prio, evt, margin)
    }

    /// Jumps an event to the front of this active object's queue. Always
    /// the guaranteed flavor (asserts on a full queue); also asserts if the
    /// active object is stopped, for the same reason as [`Self::post_fifo`].
    pub fn post_lifo<P: Port>(&mut self, evt: Event<Evt>) {
        if !self.running {
            crate::error::fail::<P>(module_path!(), line!());
        }
        self.queue.post_lifo::<P>(self.prio, evt);
    }

    pub fn has_work(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Drains one event and runs it to completion (hierarchical dispatch
    /// never yields mid-event). `release` is called with the event once
    /// dispatch returns, so the caller can drop its pool allocation credit
    /// via [`crate::pool::PoolTable::gc`]; returns `false` with nothing
    /// called if the queue was empty.
    pub fn run_to_completion<P: Port>(&mut self, mut release: impl FnMut(&Event<Evt>)) -> bool {
        match self.queue.get::<P>(self.prio) {
            Some(evt) => {
                crate::trace::dispatch(self.prio, evt.signal, H::state_id(self.processor.state()));
                self.processor.dispatch::<P>(&mut self.sm, &evt);
                release(&evt);
                true
            }
            None => false,
        }
    }

    pub fn is_in<P: Port>(&mut self, state: H::State) -> bool {
        self.processor.is_in::<P>(&mut self.sm, state)
    }
}

/// Object-safe view of an [`ActiveObject`] with its state-machine type `H`
/// erased, so a [`crate::framework::Framework`] can hold a fixed-size
/// registry of active objects whose internal state types differ from one
/// another while sharing one event payload type `Evt` and one port `P`.
pub trait AnyActiveObject<Evt: Copy + Default, P: Port> {
    fn priority(&self) -> u8;
    fn is_running(&self) -> bool;
    fn start(&mut self);
    fn stop(&mut self);
    fn post_fifo(&mut self, evt: Event<Evt>, margin: Ctr) -> Result<(), Error>;
    fn post_lifo(&mut self, evt: Event<Evt>);
    fn has_work(&self) -> bool;
    fn run_to_completion(&mut self, release: &mut dyn FnMut(&Event<Evt>)) -> bool;
}

impl<H, Evt, P, const QCAP: usize, const DEPTH: usize> AnyActiveObject<Evt, P>
    for ActiveObject<H, Evt, QCAP, DEPTH>
where
    Evt: Copy + Default,
    H: StateMachine<Evt>,
    P: Port,
{
    fn priority(&self) -> u8 {
        ActiveObject::priority(self)
    }

    fn is_running(&self) -> bool {
        ActiveObject::is_running(self)
    }

    fn start(&mut self) {
        ActiveObject::start::<P>(self)
    }

    fn stop(&mut self) {
        ActiveObject::stop(self)
    }

    fn post_fifo(&mut self, evt: Event<Evt>, margin: Ctr) -> Result<(), Error> {
        ActiveObject::post_fifo::<P>(self, evt, margin)
    }

    fn post_lifo(&mut self, evt: Event<Evt>) {
        ActiveObject::post_lifo::<P>(self, evt)
    }

    fn has_work(&self) -> bool {
        ActiveObject::has_work(self)
    }

    fn run_to_completion(&mut self, release: &mut dyn FnMut(&Event<Evt>)) -> bool {
        ActiveObject::run_to_completion::<P>(self, release)
    }
}
