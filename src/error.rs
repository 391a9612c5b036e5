//! Error and assertion model (§4.L, §7).
//!
//! Resource exhaustion under a best-effort request (`margin > 0`) surfaces as
//! a typed [`Error`] the caller can recover from. Everything else — a
//! guaranteed request (`margin == 0`) that could not be satisfied, an invalid
//! handler return, a priority collision, an entry path deeper than the
//! configured bound — is a programming error and goes through [`crate::port::Port::on_assert`],
//! which never returns. The teacher kernel's own `#[panic_handler]` (in
//! `kernel/src/lib.rs`/`kernel/src/main.rs`) plays the same "fatal, no
//! return, host decides what happens next" role for its own invariant
//! violations; this crate routes through a `Port` method instead of
//! `panic!` directly so a host without `core::panic` unwinding (or one that
//! wants to reset instead of halt) can still implement it.

use core::fmt;

/// Recoverable failure from a best-effort (`margin > 0`) operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// No block available in any pool large enough for the request.
    PoolExhausted,
    /// The target queue has no free slot (and LIFO-guaranteed posting was
    /// not used).
    QueueFull,
    /// The state machine's handler returned an outcome not valid for the
    /// signal it was given (e.g. an `Outcome::Transition` in response to
    /// `ENTRY_SIG`).
    StateMachineFault,
    /// `register` was called with a priority already bound to another
    /// active object.
    PriorityInUse,
    /// A mutex ceiling collides with a priority already reserved by an
    /// active object or another mutex.
    PriorityCeilingInUse,
    /// The priority given does not name a registered active object.
    NotRegistered,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::PoolExhausted => "no event pool has a free block for this request",
            Error::QueueFull => "destination queue is at capacity",
            Error::StateMachineFault => "state machine handler returned an invalid outcome",
            Error::PriorityInUse => "priority already bound to an active object",
            Error::PriorityCeilingInUse => "mutex ceiling collides with a reserved priority",
            Error::NotRegistered => "priority does not name a registered active object",
        };
        f.write_str(msg)
    }
}

/// Calls the port's fatal-assertion hook. Never returns.
///
/// Every internal invariant violation funnels through here rather than
/// panicking directly, so a host can redirect a guaranteed failure to
/// whatever its own fault handling looks like (halt, reset, blink a
/// pattern on an LED) instead of unwinding into `core::panic`.
#[inline]
pub fn fail<P: crate::port::Port>(module: &'static str, line: u32) -> ! {
    P::on_assert(module, line)
}

/// Calls [`fail`] if `cond` is false. Mirrors the `Q_ASSERT`/`Q_REQUIRE`
/// style of the original: a single named check point per call site.
#[macro_export]
macro_rules! ao_assert {
    ($port:ty, $cond:expr) => {
        if !($cond) {
            $crate::error::fail::<$port>(module_path!(), line!());
        }
    };
}
