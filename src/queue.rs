//! Bounded FIFO/LIFO event queue (Component C), grounded on
//! `QEQueue::post`/`postLIFO`/`get` in `qf_qeq.cpp`.
//!
//! The original keeps a one-deep "front" cache (`m_frontEvt`) ahead of a
//! ring buffer so `get()` never has to touch the ring when only one event is
//! queued. This crate keeps the same two-tier layout; the ring here is a
//! fixed `[Option<Event<T>>; N]` array instead of the original's raw
//! pointer ring, so total queue capacity is `N + 1`.

use crate::config::Ctr;
use crate::error::Error;
use crate::event::Event;
use crate::port::{CritSection, Port};
use crate::trace;

/// A single active object's inbox. `N` is the ring capacity; the queue
/// holds `N + 1` events total counting the front slot.
pub struct EventQueue<T: Copy, const N: usize> {
    front: Option<Event<T>>,
    ring: [Option<Event<T>>; N],
    head: usize,
    tail: usize,
    free_count: Ctr,
    min_free: Ctr,
}

impl<T: Copy, const N: usize> Default for EventQueue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy, const N: usize> EventQueue<T, N> {
    pub fn new() -> Self {
        Self {
            front: None,
            ring: [None; N],
            head: 0,
            tail: 0,
            free_count: N as Ctr,
            min_free: N as Ctr,
        }
    }

    /// Total capacity, front slot included.
    pub fn capacity(&self) -> Ctr {
        N as Ctr + 1
    }

    /// Events currently queued.
    pub fn len(&self) -> Ctr {
        (self.front.is_some() as Ctr) + (N as Ctr - self.free_count)
    }

    pub fn is_empty(&self) -> bool {
        self.front.is_none()
    }

    /// Lowest the ring's free count has ever reached.
    pub fn min_free(&self) -> Ctr {
        self.min_free
    }

    /// Appends to the back of the queue. `margin == 0` asserts on a full
    /// queue instead of returning an error (the "guaranteed" flavor in
    /// §4.C); `margin > 0` is best-effort and returns
    /// [`Error::QueueFull`] once fewer than `margin` ring slots would
    /// remain free.
    pub fn post_fifo<P: Port>(&mut self, prio: u8, e: Event<T>, margin: Ctr) -> Result<(), Error> {
        let _cs = CritSection::<P>::enter();
        if self.front.is_none() {
            self.front = Some(e);
            trace::queue_post_fifo(prio, self.free_count);
            return Ok(());
        }
        if self.free_count as usize > margin as usize {
            self.ring[self.head] = Some(e);
            self.head = (self.head + 1) % N;
            self.free_count -= 1;
            if self.free_count < self.min_free {
                self.min_free = self.free_count;
            }
            trace::queue_post_fifo(prio, self.free_count);
            Ok(())
        } else {
            trace::queue_full(prio);
            if margin == 0 {
                crate::error::fail::<P>(module_path!(), line!());
            }
            Err(Error::QueueFull)
        }
    }

    /// Jumps an event to the very front of the queue, ahead of everything
    /// already posted. Always the "guaranteed" flavor: a full queue is a
    /// fatal assertion, matching the original's unconditional
    /// `postLIFO`.
    pub fn post_lifo<P: Port>(&mut self, prio: u8, e: Event<T>) {
        let _cs = CritSection::<P>::enter();
        match self.front.take() {
            None => self.front = Some(e),
            Some(old_front) => {
                if self.free_count == 0 {
                    crate::error::fail::<P>(module_path!(), line!());
                }
                self.tail = if self.tail == 0 { N - 1 } else { self.tail - 1 };
                self.ring[self.tail] = Some(old_front);
                self.free_count -= 1;
                if self.free_count < self.min_free {
                    self.min_free = self.free_count;
                }
                self.front = Some(e);
            }
        }
        trace::queue_post_lifo(prio, self.free_count);
    }

    /// Removes and returns the event at the front of the queue, refilling
    /// the front slot from the ring if anything is stored there.
    pub fn get<P: Port>(&mut self, prio: u8) -> Option<Event<T>> {
        let _cs = CritSection::<P>::enter();
        let out = self.front.take()?;
        if self.free_count < N as Ctr {
            self.front = self.ring[self.tail].take();
            self.tail = (self.tail + 1) % N;
            self.free_count += 1;
        }
        trace::queue_get(prio, self.free_count);
        Some(out)
    }
}
