//! Fixed-block event pools (Component B), grounded on `QMPool::init/get/put`
//! in `qf_mem.cpp`.
//!
//! The original pool links free blocks through an in-place singly-linked
//! list written into the block's own memory. Since this crate's blocks hold
//! no payload (see the note in [`crate::event`]), free blocks are tracked as
//! a plain index stack instead — same O(1) get/put, same free-count and
//! low-water-mark bookkeeping, no unsafe pointer chasing.

use crate::config::Ctr;
use crate::error::Error;
use crate::event::{BlockIdx, Event, Origin};
use crate::port::{CritSection, Port};
use crate::trace;

/// A single size class of fixed-capacity blocks.
///
/// `N` is this pool's block capacity, fixed at compile time the same way
/// `heapless::Vec<T, N>` fixes its backing storage.
pub struct EventPool<const N: usize> {
    /// Caller-declared "weight class" used to pick this pool out of a
    /// [`PoolTable`] in ascending order; see the note in [`crate::event`]
    /// for why this is no longer a literal `sizeof`.
    block_size: u16,
    free_list: [BlockIdx; N],
    free_count: Ctr,
    min_free: Ctr,
    ref_ctr: [u8; N],
}

impl<const N: usize> EventPool<N> {
    /// Builds a pool of `N` blocks in the given weight class, all free.
    pub fn new(block_size: u16) -> Self {
        let mut free_list = [0; N];
        let mut i = 0;
        while i < N {
            free_list[i] = i as BlockIdx;
            i += 1;
        }
        Self {
            block_size,
            free_list,
            free_count: N as Ctr,
            min_free: N as Ctr,
            ref_ctr: [0; N],
        }
    }

    /// Total block count.
    pub fn capacity(&self) -> Ctr {
        N as Ctr
    }

    /// Blocks currently free.
    pub fn free_count(&self) -> Ctr {
        self.free_count
    }

    /// Lowest `free_count` has ever reached; a high-water-mark-in-reverse
    /// used to size pools during commissioning.
    pub fn min_free(&self) -> Ctr {
        self.min_free
    }

    fn get(&mut self, margin: Ctr) -> Option<BlockIdx> {
        if self.free_count as usize > margin as usize {
            self.free_count -= 1;
            let idx = self.free_list[self.free_count as usize];
            self.ref_ctr[idx as usize] = 1;
            if self.free_count < self.min_free {
                self.min_free = self.free_count;
            }
            Some(idx)
        } else {
            None
        }
    }

    fn put(&mut self, block: BlockIdx) {
        self.free_list[self.free_count as usize] = block;
        self.free_count += 1;
    }

    fn inc_ref(&mut self, block: BlockIdx) {
        self.ref_ctr[block as usize] = self.ref_ctr[block as usize].saturating_add(1);
    }

    /// Drops one reference; returns the block to the free list once the
    /// count reaches zero.
    fn dec_ref(&mut self, block: BlockIdx) {
        let ctr = &mut self.ref_ctr[block as usize];
        *ctr -= 1;
        if *ctr == 0 {
            self.put(block);
        }
    }
}

/// An ascending-size-class sequence of [`EventPool`]s, the allocator behind
/// [`PoolTable::new_event`].
///
/// `MAX_POOLS` bounds how many size classes can be registered; `POOL_CAP` is
/// the (shared) block capacity of each one. Real deployments with pools of
/// different capacities should use distinct `PoolTable` instances — the
/// original framework allows heterogeneous pool sizes too, but a `const`
/// generic array needs a uniform element type.
pub struct PoolTable<const MAX_POOLS: usize, const POOL_CAP: usize> {
    pools: heapless::Vec<EventPool<POOL_CAP>, MAX_POOLS>,
}

impl<const MAX_POOLS: usize, const POOL_CAP: usize> Default for PoolTable<MAX_POOLS, POOL_CAP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const MAX_POOLS: usize, const POOL_CAP: usize> PoolTable<MAX_POOLS, POOL_CAP> {
    pub fn new() -> Self {
        Self { pools: heapless::Vec::new() }
    }

    /// Registers a new size class. Pools must be added in ascending
    /// `block_size` order, mirroring how applications commission their
    /// pools smallest-first in the original framework's `QF::poolInit`
    /// sequence.
    pub fn add_pool(&mut self, block_size: u16) -> Result<(), Error> {
        if let Some(last) = self.pools.last() {
            debug_assert!(block_size >= last.block_size, "pools must be added in ascending size order");
        }
        self.pools
            .push(EventPool::new(block_size))
            .map_err(|_| Error::PoolExhausted)
    }

    /// Allocates a block from the first pool whose `block_size` is at least
    /// `size_hint`, wraps it in a freshly-tagged [`Event`].
    ///
    /// `margin == 0` is the "guaranteed" flavor: failure to allocate is a
    /// programming error (the system was sized wrong) and is a fatal
    /// assertion. `margin > 0` is best-effort: the caller gets `None` back
    /// if fewer than `margin` blocks would remain free afterward.
    pub fn new_event<P: Port, T: Copy>(
        &mut self,
        size_hint: u16,
        margin: Ctr,
        signal: crate::config::Signal,
        payload: T,
    ) -> Option<Event<T>> {
        let _cs = CritSection::<P>::enter();
        for (idx, pool) in self.pools.iter_mut().enumerate() {
            if pool.block_size >= size_hint {
                return match pool.get(margin) {
                    Some(block) => {
                        trace::pool_get(idx, pool.free_count, pool.min_free);
                        Some(Event {
                            signal,
                            payload,
                            origin: Origin::Pooled { pool: (idx + 1) as u8, block },
                        })
                    }
                    None => {
                        trace::pool_exhausted(idx);
                        if margin == 0 {
                            crate::error::fail::<P>(module_path!(), line!());
                        }
                        None
                    }
                };
            }
        }
        // no pool big enough for size_hint: a commissioning error regardless
        // of margin, since no amount of retrying will ever find a block.
        if margin == 0 {
            crate::error::fail::<P>(module_path!(), line!());
        }
        None
    }

    /// Bumps the allocation credit on a pooled event by one. Used by
    /// multi-consumer delivery (publish, broadcast-style posting) before
    /// handing the same logical event to more than one queue.
    pub fn inc_ref<P: Port, T: Copy>(&mut self, evt: &Event<T>) {
        if let Origin::Pooled { pool, block } = evt.origin {
            let _cs = CritSection::<P>::enter();
            self.pools[(pool - 1) as usize].inc_ref(block);
        }
    }

    /// Releases one allocation credit; once the last holder calls this the
    /// block returns to its pool's free list. A no-op for static events.
    pub fn gc<P: Port, T: Copy>(&mut self, evt: &Event<T>) {
        if let Origin::Pooled { pool, block } = evt.origin {
            let _cs = CritSection::<P>::enter();
            let idx = (pool - 1) as usize;
            self.pools[idx].dec_ref(block);
            trace::pool_put(idx, self.pools[idx].free_count);
        }
    }

    /// Read-only access to a pool's bookkeeping, e.g. for a diagnostics
    /// endpoint.
    pub fn stats(&self, pool_idx: usize) -> Option<(Ctr, Ctr, Ctr)> {
        self.pools
            .get(pool_idx)
            .map(|p| (p.capacity(), p.free_count, p.min_free))
    }
}
