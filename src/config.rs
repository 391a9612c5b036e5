//! Compile-time configuration: signal width, reserved signals, and the
//! bounded ranges a host picks when it instantiates a [`crate::framework::Framework`].
//!
//! Widths are fixed type aliases at the defaults from the external-interface
//! table rather than a fully generic bit-width knob (see DESIGN.md for the
//! tradeoff); the bounded *ranges* themselves are plain `const` generic
//! parameters on the framework types, so a host picks `MAX_ACTIVE`,
//! `MAX_POOLS`, `POOL_CAP`, `QUEUE_CAP` and `MAX_TICK_RATES` directly. The
//! reserved-signal block below plays the same role the teacher kernel's
//! `ipc::message::MessageType`/`MsgFlags` reserved categories play for its
//! own envelopes: a small closed set of framework-owned values an
//! application's own signals never collide with.

#![allow(dead_code)]

/// Identifies an event kind. Signals `1..USER_SIG` are reserved for the HSM's
/// own pseudo-events; application signals start at [`USER_SIG`].
pub type Signal = u16;

/// Reserved probe signal: "what is your superstate?" Never delivered from
/// outside the processor.
pub const EMPTY_SIG: Signal = 0;
/// Reserved entry-action pseudo-event.
pub const ENTRY_SIG: Signal = 1;
/// Reserved exit-action pseudo-event.
pub const EXIT_SIG: Signal = 2;
/// Reserved nested-initial-transition pseudo-event.
pub const INIT_SIG: Signal = 3;
/// First signal value available to applications.
pub const USER_SIG: Signal = 4;

/// Counter type backing event-pool and event-queue free-counts.
pub type Ctr = u16;

/// Counter type backing time-event tick counters.
pub type Ticks = u16;

/// Upper bound on active-object priorities (§6): `1..=64`, default 32.
pub const MAX_PRIORITY_CEILING: u8 = 64;

/// Upper bound on distinct tick rates (§6): `1..=15`, default 1.
pub const MAX_TICK_RATE_CEILING: usize = 15;

/// Upper bound on distinct event pools (§6): `1..=255`, default 3.
pub const MAX_POOL_CEILING: usize = 255;

/// Maximum nesting depth of the HSM's state hierarchy. Bounds the
/// fixed-size entry-path scratch array used during dispatch (§4.D); an
/// attempt to enter a hierarchy deeper than this is a fatal assertion.
pub const MAX_NEST_DEPTH: usize = 8;
