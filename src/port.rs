//! External interfaces (§6): the primitives a host environment supplies.
//!
//! A [`Port`] is implemented on a zero-sized marker type rather than an
//! object instance, the same shape the teacher kernel's `arch::x86_64`
//! module uses for `gdt::init`/`idt::init` — free functions addressed
//! through the type system instead of a trait object, so there is no vtable
//! and no `&dyn` in the hot interrupt path.

/// Opaque interrupt/critical-section status, returned by [`Port::crit_enter`]
/// and consumed by the matching [`Port::crit_exit`]. Hosts typically store
/// the saved `PRIMASK`/`CPSR`/`eflags` bits here; this crate never inspects
/// the value, only threads it back to the same call site.
#[derive(Debug, Clone, Copy, Default)]
pub struct CritStatus(pub usize);

/// Host-supplied primitives a [`crate::framework::Framework`] is built on.
///
/// Implement this once per target (native host thread, Cortex-M, an x86
/// kernel task) and pass the marker type as the `P` parameter everywhere a
/// module needs one of these operations.
pub trait Port: Sized {
    /// Disable interrupts unconditionally. Used only to bracket the very
    /// short window a [`crate::sched`] scheduler needs exclusive access to
    /// the ready-set; most code should prefer [`Port::crit_enter`].
    fn int_disable();

    /// Re-enable interrupts after [`Port::int_disable`].
    fn int_enable();

    /// Enter a critical section nestable within itself, returning the state
    /// needed to restore the previous interrupt mask on exit. Safe to call
    /// from task or ISR context.
    fn crit_enter() -> CritStatus;

    /// Leave a critical section opened by [`Port::crit_enter`].
    fn crit_exit(status: CritStatus);

    /// Called by the scheduler's idle thread when no active object has
    /// work. A typical implementation executes a low-power wait
    /// instruction; it must return (the scheduler re-polls the ready set
    /// on return) rather than loop internally.
    fn on_idle();

    /// Called once before the scheduler's main loop starts.
    fn on_startup() {}

    /// Called if the scheduler's main loop ever returns (it normally
    /// doesn't).
    fn on_cleanup() {}

    /// Fatal assertion hook: a programming-error invariant was violated.
    /// `module` and `line` identify the call site. Implementations
    /// typically log the location and halt or reset; this function must
    /// never return.
    fn on_assert(module: &'static str, line: u32) -> !;
}

/// RAII guard around [`Port::crit_enter`]/[`Port::crit_exit`], the idiomatic
/// Rust replacement for the teacher's paired `QF_CRIT_ENTRY_`/`QF_CRIT_EXIT_`
/// macros: the exit call happens on drop so every return path out of a
/// critical section, including an early `?`, is covered.
pub struct CritSection<P: Port> {
    status: CritStatus,
    _port: core::marker::PhantomData<P>,
}

impl<P: Port> CritSection<P> {
    /// Opens a critical section. Dropping the guard closes it.
    #[inline]
    #[must_use]
    pub fn enter() -> Self {
        Self {
            status: P::crit_enter(),
            _port: core::marker::PhantomData,
        }
    }
}

impl<P: Port> Drop for CritSection<P> {
    #[inline]
    fn drop(&mut self) {
        P::crit_exit(self.status);
    }
}
