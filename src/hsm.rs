//! Hierarchical state machine dispatch (Component D), grounded on
//! `QHsm::dispatch` in `qhsm_dis.cpp`.
//!
//! The original expresses a state as a C function pointer and writes its
//! "what's my superstate" / "what's my initial transition" answers back
//! into two object fields (`m_state`, `m_temp`) because a C function can
//! only return one `QState` code. This crate's [`StateMachine::handler`]
//! returns an [`Outcome`] instead, so the superstate/initial-transition
//! answer travels as a value rather than through a mutated field — the
//! `state`/`temp` two-slot convention collapses into `Processor::state`
//! (the stable active leaf) plus ordinary local variables during dispatch.
//!
//! The original's dispatch also special-cases six transition topologies
//! (self-transition, transition to the direct superstate, to a sibling
//! under a shared parent, and so on) as direct jumps for speed. This
//! version instead builds both states' full ancestor chains (bounded by
//! [`crate::config::MAX_NEST_DEPTH`]) and finds their least common ancestor
//! by linear scan. Same external semantics — same exit order, same entry
//! order, same cascading-initial-transition behavior — traded for one
//! general routine instead of six hand-specialized ones, which matters here
//! precisely because this code is never run through a compiler before
//! shipping.

use crate::config::{Signal, EMPTY_SIG, ENTRY_SIG, EXIT_SIG, INIT_SIG};
use crate::event::Event;
use crate::port::Port;

/// What a state's handler decides to do with the event it was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome<S> {
    /// The event was processed; stay in the current state.
    Handled,
    /// The event doesn't apply here and isn't expected to apply anywhere up
    /// the hierarchy either.
    Ignored,
    /// This state doesn't handle the event; `S` is its superstate, and the
    /// dispatcher should retry the same event there. Also the answer to an
    /// `EMPTY_SIG` topology probe.
    Super(S),
    /// Take an external transition to state `S`.
    Transition(S),
    /// Answer to an `INIT_SIG` probe: this composite state has a nested
    /// initial transition into substate `S`.
    Init(S),
}

/// A single hierarchical state machine's transition table, expressed as one
/// function from `(state, event)` to [`Outcome`] rather than one handler
/// function per state.
///
/// `Evt` is the application's unified event payload (see [`crate::event`]);
/// `Default` gives the dispatcher a harmless placeholder payload to attach
/// to the reserved pseudo-events (`EMPTY_SIG`/`ENTRY_SIG`/`EXIT_SIG`/`INIT_SIG`),
/// which a handler must never read.
pub trait StateMachine<Evt: Copy + Default> {
    type State: Copy + PartialEq;

    /// The root pseudostate. Its handler is never queried for a superstate;
    /// chain walks stop here.
    fn top() -> Self::State;

    fn handler(&mut self, state: Self::State, event: &Event<Evt>) -> Outcome<Self::State>;

    /// A small numeric code identifying `state`, used only by trace points
    /// (§4.K) that need to name a state in a log record. `State` itself
    /// carries no required numeric representation, so this is the one place
    /// an implementor supplies one.
    fn state_id(state: Self::State) -> u16;
}

/// Drives one [`StateMachine`] through dispatch, holding the one piece of
/// state that persists between events: the currently active leaf state.
///
/// `DEPTH` bounds the hierarchy nesting depth; it sizes the scratch arrays
/// used while computing a transition's exit/entry path.
pub struct Processor<H, Evt, const DEPTH: usize>
where
    Evt: Copy + Default,
    H: StateMachine<Evt>,
{
    state: H::State,
    _evt: core::marker::PhantomData<Evt>,
}

impl<H, Evt, const DEPTH: usize> Processor<H, Evt, DEPTH>
where
    Evt: Copy + Default,
    H: StateMachine<Evt>,
{
    /// Builds a processor parked at the top pseudostate. Call [`Processor::init`]
    /// before the first [`Processor::dispatch`].
    pub fn new() -> Self {
        Self { state: H::top(), _evt: core::marker::PhantomData }
    }

    /// The currently active leaf state.
    pub fn state(&self) -> H::State {
        self.state
    }

    /// Runs the top-level initial transition and any cascade of nested
    /// initial transitions beneath it, entering every state from just below
    /// the top down to the final leaf.
    pub fn init<P: Port>(&mut self, sm: &mut H) {
        self.state = H::top();
        let probe = Event::new_static(INIT_SIG, Evt::default());
        match sm.handler(H::top(), &probe) {
            Outcome::Init(target) | Outcome::Transition(target) => {
                let mut chain: heapless::Vec<H::State, DEPTH> = heapless::Vec::new();
                self.build_chain::<P>(sm, target, &mut chain);
                for s in chain.iter().rev() {
                    if *s == H::top() {
                        continue;
                    }
                    self.fire::<P>(sm, *s, ENTRY_SIG);
                }
                self.state = target;
                self.cascade_init::<P>(sm, target);
            }
            _ => crate::error::fail::<P>(module_path!(), line!()),
        }
    }

    /// Dispatches one event: bubbles it up through superstates until some
    /// state handles, ignores, or transitions on it.
    pub fn dispatch<P: Port>(&mut self, sm: &mut H, event: &Event<Evt>) {
        let mut s = self.state;
        loop {
            match sm.handler(s, event) {
                Outcome::Super(parent) => {
                    s = parent;
                    continue;
                }
                Outcome::Handled | Outcome::Ignored => return,
                Outcome::Transition(target) => {
                    self.transition::<P>(sm, s, target, event.signal);
                    return;
                }
                Outcome::Init(_) => crate::error::fail::<P>(module_path!(), line!()),
            }
        }
    }

    /// `true` if `state` is the active leaf or one of its ancestors.
    pub fn is_in<P: Port>(&mut self, sm: &mut H, state: H::State) -> bool {
        let mut s = self.state;
        loop {
            if s == state {
                return true;
            }
            if s == H::top() {
                return false;
            }
            s = self.query_super::<P>(sm, s);
        }
    }

    fn query_super<P: Port>(&mut self, sm: &mut H, s: H::State) -> H::State {
        let probe = Event::new_static(EMPTY_SIG, Evt::default());
        match sm.handler(s, &probe) {
            Outcome::Super(parent) => parent,
            _ => crate::error::fail::<P>(module_path!(), line!()),
        }
    }

    fn build_chain<P: Port>(&mut self, sm: &mut H, start: H::State, buf: &mut heapless::Vec<H::State, DEPTH>) {
        buf.clear();
        let mut s = start;
        loop {
            if buf.push(s).is_err() {
                crate::error::fail::<P>(module_path!(), line!());
            }
            if s == H::top() {
                break;
            }
            s = self.query_super::<P>(sm, s);
        }
    }

    fn fire<P: Port>(&mut self, sm: &mut H, s: H::State, sig: Signal) {
        let e = Event::new_static(sig, Evt::default());
        match sm.handler(s, &e) {
            Outcome::Handled | Outcome::Ignored | Outcome::Super(_) => {}
            _ => crate::error::fail::<P>(module_path!(), line!()),
        }
    }

    fn cascade_init<P: Port>(&mut self, sm: &mut H, mut current: H::State) {
        for _ in 0..DEPTH {
            let probe = Event::new_static(INIT_SIG, Evt::default());
            match sm.handler(current, &probe) {
                Outcome::Init(child) => {
                    self.fire::<P>(sm, child, ENTRY_SIG);
                    current = child;
                    self.state = current;
                }
                Outcome::Handled | Outcome::Ignored => return,
                _ => crate::error::fail::<P>(module_path!(), line!()),
            }
        }
        crate::error::fail::<P>(module_path!(), line!());
    }

    /// Runs an external transition to `target`, returned by `s`'s handler —
    /// `s` may be the active leaf itself or any ancestor the event bubbled
    /// through before being handled. Self-transition (`s == target`): exit
    /// every active state from the leaf up through and including `s`, then
    /// re-enter it and run its cascade of nested initial transitions.
    /// Otherwise the least common ancestor is found between `s` (the level
    /// the transition is defined on, not necessarily the active leaf) and
    /// `target`, by comparing their full ancestor chains; every active state
    /// from the leaf up to (not including) that LCA is exited, then every
    /// state from just below the LCA down to `target` is entered.
    fn transition<P: Port>(&mut self, sm: &mut H, s: H::State, target: H::State, signal: Signal) {
        crate::trace::transition(signal, H::state_id(s), H::state_id(target));

        if s == target {
            let mut leaf_chain: heapless::Vec<H::State, DEPTH> = heapless::Vec::new();
            self.build_chain::<P>(sm, self.state, &mut leaf_chain);
            for st in leaf_chain.iter() {
                self.fire::<P>(sm, *st, EXIT_SIG);
                if *st == s {
                    break;
                }
            }
            self.fire::<P>(sm, target, ENTRY_SIG);
            self.state = target;
            self.cascade_init::<P>(sm, target);
            return;
        }

        let mut leaf_chain: heapless::Vec<H::State, DEPTH> = heapless::Vec::new();
        let mut src_chain: heapless::Vec<H::State, DEPTH> = heapless::Vec::new();
        let mut tgt_chain: heapless::Vec<H::State, DEPTH> = heapless::Vec::new();
        self.build_chain::<P>(sm, self.state, &mut leaf_chain);
        self.build_chain::<P>(sm, s, &mut src_chain);
        self.build_chain::<P>(sm, target, &mut tgt_chain);

        let mut lca_state = None;
        let mut lca_tgt_idx = 0;
        'outer: for s_anc in src_chain.iter() {
            for (j, t) in tgt_chain.iter().enumerate() {
                if s_anc == t {
                    lca_state = Some(*s_anc);
                    lca_tgt_idx = j;
                    break 'outer;
                }
            }
        }
        let lca_state = match lca_state {
            Some(st) => st,
            None => crate::error::fail::<P>(module_path!(), line!()),
        };

        for st in leaf_chain.iter() {
            if *st == lca_state {
                break;
            }
            self.fire::<P>(sm, *st, EXIT_SIG);
        }
        for j in (0..lca_tgt_idx).rev() {
            self.fire::<P>(sm, tgt_chain[j], ENTRY_SIG);
        }
        self.state = target;
        self.cascade_init::<P>(sm, target);
    }
}
