//! Time-event wheel (Component E).
//!
//! Mirrors the original framework's per-tick-rate singly-linked lists of
//! armed timers, walked once per `tick()` call. A timer's first `arm()` (or
//! any re-arm issued while it's still linked and counting down) splices it
//! into the walked list immediately, so `arm(t, n, 0)` followed by `tick()`
//! called `n` times fires it exactly once. The one exception is re-arming a
//! one-shot that *just* fired: the original resolves "what happens if a
//! timer's own expiry handler re-arms it" by keeping such a re-arm on a
//! separate pending list, spliced into the main list only at the end of the
//! *next* `tick()` rather than immediately — giving a timer re-armed from
//! inside its own callback a full extra tick before it counts down again,
//! rather than letting it race the walk that just unlinked it. This
//! implementation keeps that same split (`heads` vs `fresh_heads`), scoped
//! to that one case.

use crate::config::{Signal, Ticks};

pub type TimerId = u16;

#[derive(Clone, Copy)]
struct Slot {
    in_use: bool,
    linked: bool,
    /// Set when this slot was just unlinked by a one-shot firing in
    /// `tick()`, cleared by the next `arm()` or `disarm()`. Tells `arm()`
    /// whether this re-arm is the "fired, then immediately re-armed" case
    /// that deserves the one-tick rest, as opposed to an ordinary first arm.
    just_fired: bool,
    tick_rate: u8,
    ctr: Ticks,
    interval: Ticks,
    signal: Signal,
    prio: u8,
    next: Option<TimerId>,
}

impl Slot {
    const fn empty() -> Self {
        Self {
            in_use: false,
            linked: false,
            just_fired: false,
            tick_rate: 0,
            ctr: 0,
            interval: 0,
            signal: 0,
            prio: 0,
            next: None,
        }
    }
}

/// A fixed table of timers grouped into `MAX_TICK_RATES` independent time
/// bases, each with its own list walked by a separate [`TimeWheel::tick`]
/// call (so a 1ms tick source and a 1s tick source can coexist without
/// either paying for the other's granularity).
pub struct TimeWheel<const MAX_TIMERS: usize, const MAX_TICK_RATES: usize> {
    slots: [Slot; MAX_TIMERS],
    heads: [Option<TimerId>; MAX_TICK_RATES],
    fresh_heads: [Option<TimerId>; MAX_TICK_RATES],
}

impl<const MAX_TIMERS: usize, const MAX_TICK_RATES: usize> Default
    for TimeWheel<MAX_TIMERS, MAX_TICK_RATES>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<const MAX_TIMERS: usize, const MAX_TICK_RATES: usize> TimeWheel<MAX_TIMERS, MAX_TICK_RATES> {
    pub fn new() -> Self {
        Self {
            slots: [Slot::empty(); MAX_TIMERS],
            heads: [None; MAX_TICK_RATES],
            fresh_heads: [None; MAX_TICK_RATES],
        }
    }

    /// Claims a free timer slot, bound to deliver `signal` to active object
    /// `prio` on every expiry under tick rate `tick_rate`. The timer starts
    /// disarmed; call [`TimeWheel::arm`] to start it counting down.
    pub fn new_timer<P: crate::port::Port>(&mut self, tick_rate: usize, prio: u8, signal: Signal) -> TimerId {
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            if !slot.in_use {
                *slot = Slot {
                    in_use: true,
                    linked: false,
                    just_fired: false,
                    tick_rate: tick_rate as u8,
                    ctr: 0,
                    interval: 0,
                    signal,
                    prio,
                    next: None,
                };
                return idx as TimerId;
            }
        }
        crate::error::fail::<P>(module_path!(), line!())
    }

    /// Arms (or re-arms) a timer to fire after `ticks` ticks, then every
    /// `interval` ticks thereafter (`interval == 0` for a one-shot).
    ///
    /// If the timer is already linked into the main list (counting down,
    /// mid-period), only its countdown and reload interval are updated in
    /// place. Otherwise it is not currently linked — either this is its
    /// very first arm, or it just fired as a one-shot. A first arm splices
    /// straight into the main list and is walked starting with the very
    /// next [`TimeWheel::tick`] call; a re-arm of a timer that just fired
    /// instead joins this tick rate's "freshly armed" list and sits out one
    /// tick before it starts counting down (see the module docs).
    pub fn arm(&mut self, timer: TimerId, ticks: Ticks, interval: Ticks) {
        let idx = timer as usize;
        let already_linked = self.slots[idx].linked;
        let just_fired = self.slots[idx].just_fired;
        self.slots[idx].ctr = ticks;
        self.slots[idx].interval = interval;
        self.slots[idx].just_fired = false;
        if !already_linked {
            let rate = self.slots[idx].tick_rate as usize;
            if just_fired {
                self.slots[idx].next = self.fresh_heads[rate];
                self.fresh_heads[rate] = Some(timer);
            } else {
                self.slots[idx].next = self.heads[rate];
                self.heads[rate] = Some(timer);
            }
            self.slots[idx].linked = true;
        }
        crate::trace::time_event_armed(self.slots[idx].prio, self.slots[idx].signal, ticks, self.slots[idx].tick_rate as usize);
    }

    /// Disarms a timer, removing it from whichever list currently holds
    /// it. A no-op if the timer wasn't armed.
    pub fn disarm(&mut self, timer: TimerId) {
        let idx = timer as usize;
        if !self.slots[idx].linked {
            return;
        }
        let rate = self.slots[idx].tick_rate as usize;
        if !Self::unlink(&mut self.heads[rate], &mut self.slots, timer) {
            Self::unlink(&mut self.fresh_heads[rate], &mut self.slots, timer);
        }
        self.slots[idx].linked = false;
        self.slots[idx].just_fired = false;
        self.slots[idx].ctr = 0;
    }

    fn unlink(head: &mut Option<TimerId>, slots: &mut [Slot; MAX_TIMERS], target: TimerId) -> bool {
        let mut cur = *head;
        let mut prev: Option<TimerId> = None;
        while let Some(id) = cur {
            if id == target {
                let next = slots[id as usize].next;
                match prev {
                    Some(p) => slots[p as usize].next = next,
                    None => *head = next,
                }
                return true;
            }
            prev = Some(id);
            cur = slots[id as usize].next;
        }
        false
    }

    /// Advances tick rate `tick_rate` by one tick: walks the main list
    /// decrementing every counter, invoking `post(prio, signal)` for each
    /// timer that reaches zero and reloading or unlinking it per its
    /// interval, and only *after* that walk splices in anything freshly
    /// re-armed since the previous call. A one-shot that fires is unlinked
    /// and marked `just_fired`; if it is re-armed before the next `tick()`
    /// of this rate, [`TimeWheel::arm`] routes that re-arm through the
    /// fresh list instead of splicing it straight back in, so it gets one
    /// full tick of rest before counting down again.
    pub fn tick(&mut self, tick_rate: usize, mut post: impl FnMut(u8, Signal)) {
        let mut cur = self.heads[tick_rate];
        let mut prev: Option<TimerId> = None;
        while let Some(id) = cur {
            let idx = id as usize;
            let next = self.slots[idx].next;
            self.slots[idx].ctr -= 1;
            if self.slots[idx].ctr == 0 {
                crate::trace::time_event_fired(self.slots[idx].prio, self.slots[idx].signal, tick_rate);
                post(self.slots[idx].prio, self.slots[idx].signal);
                if self.slots[idx].interval > 0 {
                    self.slots[idx].ctr = self.slots[idx].interval;
                    prev = Some(id);
                } else {
                    match prev {
                        Some(p) => self.slots[p as usize].next = next,
                        None => self.heads[tick_rate] = next,
                    }
                    self.slots[idx].linked = false;
                    self.slots[idx].just_fired = true;
                }
            } else {
                prev = Some(id);
            }
            cur = next;
        }

        if let Some(fresh) = self.fresh_heads[tick_rate].take() {
            let mut tail = fresh;
            loop {
                match self.slots[tail as usize].next {
                    Some(next) => tail = next,
                    None => break,
                }
            }
            self.slots[tail as usize].next = self.heads[tick_rate];
            self.heads[tick_rate] = Some(fresh);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestPort;

    #[test]
    fn one_shot_fires_once_after_its_ticks() {
        let mut w: TimeWheel<4, 1> = TimeWheel::new();
        let t = w.new_timer::<TestPort>(0, 3, 42);
        w.arm(t, 3, 0);

        // round-trip law: arm(T, n, 0); tick x n fires T exactly once.
        let mut fired = 0;
        for _ in 0..2 {
            w.tick(0, |_, _| fired += 1);
        }
        assert_eq!(fired, 0);
        w.tick(0, |prio, sig| {
            fired += 1;
            assert_eq!(prio, 3);
            assert_eq!(sig, 42);
        });
        assert_eq!(fired, 1);
        // one-shot: stays silent afterward without a re-arm.
        w.tick(0, |_, _| fired += 1);
        assert_eq!(fired, 1);
    }

    #[test]
    fn periodic_timer_reloads() {
        let mut w: TimeWheel<4, 1> = TimeWheel::new();
        let t = w.new_timer::<TestPort>(0, 1, 7);
        w.arm(t, 2, 2);

        // round-trip law: arm(T, n, n); tick x 3n fires T exactly 3 times.
        let mut fired = 0;
        for _ in 0..6 {
            w.tick(0, |_, _| fired += 1);
        }
        assert_eq!(fired, 3); // ticks 2, 4, 6
    }

    #[test]
    fn first_arm_is_walked_on_the_very_next_tick() {
        let mut w: TimeWheel<4, 1> = TimeWheel::new();
        let t = w.new_timer::<TestPort>(0, 1, 7);
        w.arm(t, 1, 0);

        let mut fired = 0;
        w.tick(0, |_, _| fired += 1);
        assert_eq!(fired, 1, "a timer's first arm must count down starting with the very next tick");
    }

    #[test]
    fn rearming_a_just_fired_one_shot_sits_out_one_tick() {
        let mut w: TimeWheel<4, 1> = TimeWheel::new();
        let t = w.new_timer::<TestPort>(0, 1, 7);
        w.arm(t, 1, 0);

        let mut fired = 0;
        w.tick(0, |_, _| fired += 1);
        assert_eq!(fired, 1);

        // re-arming right after it fired: this one sits out the next tick
        // before it starts counting down again.
        w.arm(t, 1, 0);
        w.tick(0, |_, _| fired += 1);
        assert_eq!(fired, 1, "a re-arm issued right after firing must not fire on the very next tick");
        w.tick(0, |_, _| fired += 1);
        assert_eq!(fired, 2, "but does fire the tick after that");
    }

    #[test]
    fn disarm_removes_a_pending_timer() {
        let mut w: TimeWheel<4, 1> = TimeWheel::new();
        let t = w.new_timer::<TestPort>(0, 1, 7);
        w.arm(t, 2, 0);
        w.tick(0, |_, _| {}); // one countdown tick, not yet fired
        w.disarm(t);

        let mut fired = 0;
        w.tick(0, |_, _| fired += 1);
        assert_eq!(fired, 0);
    }

    #[test]
    fn disarm_removes_a_freshly_rearmed_pending_timer() {
        let mut w: TimeWheel<4, 1> = TimeWheel::new();
        let t = w.new_timer::<TestPort>(0, 1, 7);
        w.arm(t, 1, 0);
        w.tick(0, |_, _| {}); // fires once, unlinked
        w.arm(t, 1, 0); // re-armed onto the fresh list, sitting out next tick
        w.disarm(t);

        let mut fired = 0;
        for _ in 0..3 {
            w.tick(0, |_, _| fired += 1);
        }
        assert_eq!(fired, 0);
    }
}
