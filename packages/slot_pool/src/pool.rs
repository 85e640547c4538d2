use std::alloc::Layout;
use std::any::type_name;
use std::marker::PhantomData;
use std::num::NonZero;
use std::ptr::NonNull;

use crate::{BlockAllocator, FreeList};

/// A vacant slot must be able to host the intrusive free-list link in its own bytes.
const LINK_BYTES: NonZero<usize> =
    const { NonZero::new(size_of::<*mut u8>()).expect("pointers are never zero-sized") };

/// A typed object pool that serves and reclaims `T`-sized storage slots in O(1)
/// without calling into the system allocator in steady state.
///
/// The pool owns a private [`BlockAllocator`]. Whenever the free list runs dry, it
/// requests one block of `BLOCK_CAPACITY` slots and carves it into fresh vacant
/// slots; growth is always one fixed-size block at a time. Construction performs
/// that replenishment once up front, so a new pool serves its first
/// `BLOCK_CAPACITY` allocations without touching the system allocator again.
///
/// Reclaimed slots are reused most-recently-freed first, which keeps the hot
/// path cache-friendly.
///
/// # Storage, not objects - the pool never constructs or drops `T`
///
/// [`alloc()`][Self::alloc] hands out *raw storage*: the caller placement-writes a
/// value before reading and drops it before [`dealloc()`][Self::dealloc]. Slot
/// memory itself always belongs to the pool and is released only in bulk, when the
/// pool (and with it the block allocator) is dropped.
///
/// # Example
///
/// ```rust
/// use slot_pool::SlotPool;
///
/// let mut pool = SlotPool::<u64, 4>::new();
///
/// let slot = pool.alloc();
///
/// // The slot is uninitialized storage; constructing a value in it is our job.
/// // SAFETY: The slot is writable and exclusively ours until dealloc().
/// unsafe { slot.write(1024) };
/// // SAFETY: Initialized just above.
/// assert_eq!(unsafe { slot.read() }, 1024);
///
/// // Returning the slot is also our job. u64 needs no drop.
/// // SAFETY: The slot came from this pool and is returned exactly once.
/// unsafe { pool.dealloc(slot) };
/// ```
///
/// # Thread safety
///
/// The pool has no internal synchronization. It can move to another thread (when
/// `T` can), but sharing one instance requires an external lock around every
/// operation - or simply one pool per thread.
pub struct SlotPool<T, const BLOCK_CAPACITY: usize = 16> {
    /// Owns every block this pool has ever carved. Dropping it is what finally
    /// releases the slots.
    blocks: BlockAllocator,

    /// Vacant slots across all blocks, most recently vacated first.
    free: FreeList,

    /// Number of slots currently handed out.
    allocated: usize,

    _slot: PhantomData<T>,
}

impl<T, const BLOCK_CAPACITY: usize> SlotPool<T, BLOCK_CAPACITY> {
    /// Creates a pool and performs its initial replenishment, so the pool is
    /// immediately ready to serve `BLOCK_CAPACITY` allocations.
    ///
    /// # Example
    ///
    /// ```rust
    /// use slot_pool::SlotPool;
    ///
    /// let pool = SlotPool::<u64, 8>::new();
    ///
    /// assert!(pool.is_empty());
    /// assert_eq!(pool.capacity(), 8);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `BLOCK_CAPACITY` is zero or if `T` is smaller than a pointer.
    /// The latter is a structural precondition: a vacant slot's bytes double as
    /// the free-list link, so they must be able to hold one.
    #[must_use]
    pub fn new() -> Self {
        assert!(
            BLOCK_CAPACITY > 0,
            "SlotPool must have at least one slot per block"
        );
        assert!(
            size_of::<T>() >= LINK_BYTES.get(),
            "SlotPool slots of {} are too small to host a free-list link",
            type_name::<T>()
        );

        let mut pool = Self {
            blocks: BlockAllocator::new(),
            free: FreeList::new(),
            allocated: 0,
            _slot: PhantomData,
        };

        pool.replenish();

        pool
    }

    /// Serves one `T`-sized slot, growing the pool by one block first if no vacant
    /// slot is available.
    ///
    /// The returned slot is raw storage: stale bytes if the slot was previously
    /// vacated, uninitialized bytes if freshly carved. Write before reading. The
    /// slot stays valid until it is passed back to [`dealloc()`][Self::dealloc]
    /// or the pool is dropped.
    ///
    /// # Example
    ///
    /// ```rust
    /// use slot_pool::SlotPool;
    ///
    /// let mut pool = SlotPool::<u64, 4>::new();
    ///
    /// let first = pool.alloc();
    /// let second = pool.alloc();
    /// assert_ne!(first, second);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if growing the pool fails because the system allocator is out of
    /// memory.
    #[must_use]
    pub fn alloc(&mut self) -> NonNull<T> {
        if self.free.is_empty() {
            self.replenish();
        }

        let slot = self
            .free
            .pop()
            .expect("replenishment always leaves at least one vacant slot");

        self.allocated = self
            .allocated
            .checked_add(1)
            .expect("cannot exceed pool capacity, which fits in virtual memory");

        #[cfg(debug_assertions)]
        self.integrity_check();

        slot.cast::<T>()
    }

    /// Returns a slot to the pool, making it the next slot
    /// [`alloc()`][Self::alloc] serves (most-recently-freed-first reuse).
    ///
    /// No value is dropped by this call and no validation is performed; both are
    /// the caller's contract, below.
    ///
    /// # Example
    ///
    /// ```rust
    /// use slot_pool::SlotPool;
    ///
    /// let mut pool = SlotPool::<u64, 4>::new();
    ///
    /// let slot = pool.alloc();
    ///
    /// // SAFETY: The slot came from this pool, holds no live value (u64 needs no
    /// // drop), and is returned exactly once.
    /// unsafe { pool.dealloc(slot) };
    ///
    /// // The vacated slot is the first to be served again.
    /// assert_eq!(pool.alloc(), slot);
    /// ```
    ///
    /// # Safety
    ///
    /// The caller must guarantee that:
    ///
    /// - `slot` was returned by [`alloc()`][Self::alloc] on this very pool;
    /// - `slot` is not already vacant (no double free);
    /// - any value constructed in the slot has already been dropped;
    /// - the slot's contents are not accessed after this call.
    ///
    /// Passing a foreign or already-vacant slot corrupts the free list.
    pub unsafe fn dealloc(&mut self, slot: NonNull<T>) {
        debug_assert!(
            self.blocks.contains(slot.cast()),
            "dealloc() received a slot of {} that this pool never issued",
            type_name::<T>()
        );

        // SAFETY: The caller guarantees the slot came from alloc() on this pool, so
        // it is at least size_of::<T>() >= pointer-size bytes that stay valid until
        // the pool is dropped, and holds no live value anyone will read again.
        unsafe {
            self.free.push(slot.cast::<u8>());
        }

        self.allocated = self
            .allocated
            .checked_sub(1)
            .expect("caller contract: every dealloc() matches an earlier alloc()");
    }

    /// The number of slots currently handed out.
    #[must_use]
    pub fn len(&self) -> usize {
        self.allocated
    }

    /// Whether no slots are currently handed out.
    ///
    /// An empty pool still holds its blocks; capacity is never returned early.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.allocated == 0
    }

    /// The number of slots the pool can serve without growing.
    ///
    /// Grows in `BLOCK_CAPACITY` steps, one block per replenishment, which makes
    /// this the observable measure of how often the pool has grown.
    ///
    /// # Example
    ///
    /// ```rust
    /// use slot_pool::SlotPool;
    ///
    /// let mut pool = SlotPool::<u64, 4>::new();
    /// assert_eq!(pool.capacity(), 4);
    ///
    /// // Exhausting the first block makes the next alloc() carve a second one.
    /// let slots: Vec<_> = (0..5).map(|_| pool.alloc()).collect();
    /// assert_eq!(pool.capacity(), 8);
    /// assert_eq!(slots.len(), 5);
    /// ```
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.blocks
            .block_count()
            .checked_mul(BLOCK_CAPACITY)
            .expect("overflow here would mean the pool holds more slots than virtual memory can fit")
    }

    /// Requests one fresh block from the block allocator and carves it into
    /// `BLOCK_CAPACITY` vacant slots.
    fn replenish(&mut self) {
        let layout = Layout::array::<T>(BLOCK_CAPACITY)
            .expect("block layout must be calculable for any slot count that fits in memory");

        let block = self.blocks.allocate(layout);

        let slot_size = NonZero::new(size_of::<T>())
            .expect("guarded by the slot size precondition in new()");
        let slot_count =
            NonZero::new(BLOCK_CAPACITY).expect("guarded by the capacity precondition in new()");

        // SAFETY: The block spans BLOCK_CAPACITY * size_of::<T>() writable bytes
        // (array layout stride is exactly size_of::<T>()), it stays valid until the
        // block allocator is dropped together with the pool, and nothing references
        // it yet. Slot size covers the link per the precondition in new().
        unsafe {
            self.free.refill(block, slot_size, slot_count);
        }
    }

    /// Verifies that the free list is consistent with the pool's accounting.
    ///
    /// Every vacant slot must lie inside a block issued by this pool's own
    /// allocator, and vacant plus handed-out slots must add up to capacity.
    #[cfg_attr(test, mutants::skip)] // This is essentially test logic, mutation is meaningless.
    #[cfg(debug_assertions)]
    #[allow(
        clippy::arithmetic_side_effects,
        reason = "integrity check counts are bounded by capacity, which was checked at growth time"
    )]
    fn integrity_check(&self) {
        let mut vacant = 0_usize;

        self.free.walk(|slot| {
            vacant += 1;

            assert!(
                self.blocks.contains(slot),
                "free list of {} holds a slot outside every issued block",
                type_name::<T>()
            );
        });

        assert!(
            vacant + self.allocated == self.capacity(),
            "pool of {} has {} vacant + {} allocated slots against a capacity of {}",
            type_name::<T>(),
            vacant,
            self.allocated,
            self.capacity()
        );
    }
}

impl<T, const BLOCK_CAPACITY: usize> Default for SlotPool<T, BLOCK_CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const BLOCK_CAPACITY: usize> std::fmt::Debug for SlotPool<T, BLOCK_CAPACITY> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotPool")
            .field("slot_type", &std::format_args!("{}", type_name::<T>()))
            .field("block_capacity", &BLOCK_CAPACITY)
            .field("len", &self.allocated)
            .field("capacity", &self.capacity())
            .finish_non_exhaustive()
    }
}

// SAFETY: The raw pointers are used purely for memory management within blocks the
// pool exclusively owns, so the pool is as thread-mobile as the values callers may
// have parked in its slots.
unsafe impl<T: Send, const BLOCK_CAPACITY: usize> Send for SlotPool<T, BLOCK_CAPACITY> {}

#[cfg(test)]
#[allow(
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    clippy::arithmetic_side_effects,
    reason = "test code doesn't need the same safety rigor as production code"
)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::thread;

    use super::*;

    #[test]
    fn smoke_test() {
        let mut pool = SlotPool::<u64, 4>::new();

        let slots: Vec<_> = (0..4).map(|_| pool.alloc()).collect();

        // Every live slot is distinct.
        for (index, slot) in slots.iter().enumerate() {
            for other in slots.iter().skip(index + 1) {
                assert_ne!(slot, other);
            }
        }

        for (index, slot) in slots.iter().enumerate() {
            unsafe { slot.write(index as u64 * 0x0101_0101) };
        }

        for (index, slot) in slots.iter().enumerate() {
            unsafe { assert_eq!(slot.read(), index as u64 * 0x0101_0101) };
        }

        assert_eq!(pool.len(), 4);

        for slot in slots {
            unsafe { pool.dealloc(slot) };
        }

        assert!(pool.is_empty());
    }

    #[test]
    fn construction_performs_initial_replenishment() {
        let pool = SlotPool::<u64, 4>::new();

        assert!(pool.is_empty());
        assert_eq!(pool.len(), 0);
        assert_eq!(pool.capacity(), 4);
    }

    #[test]
    fn lifo_reuse_matches_dealloc_order() {
        let mut pool = SlotPool::<u64, 4>::new();

        let first_round: Vec<_> = (0..4).map(|_| pool.alloc()).collect();

        for slot in &first_round {
            unsafe { pool.dealloc(*slot) };
        }

        // Slots come back in reverse of the order they were returned.
        for expected in first_round.iter().rev() {
            assert_eq!(pool.alloc(), *expected);
        }
    }

    #[test]
    fn lifo_reuse_spans_blocks() {
        let mut pool = SlotPool::<u64, 4>::new();

        // Five allocations straddle two blocks.
        let first_round: Vec<_> = (0..5).map(|_| pool.alloc()).collect();

        for slot in &first_round {
            unsafe { pool.dealloc(*slot) };
        }

        for expected in first_round.iter().rev() {
            assert_eq!(pool.alloc(), *expected);
        }
    }

    #[test]
    fn link_bytes_matches_pointer_size() {
        assert_eq!(LINK_BYTES.get(), size_of::<*mut u8>());
    }

    #[test]
    fn growth_adds_exactly_one_block() {
        let mut pool = SlotPool::<u64, 4>::new();

        let mut slots: Vec<_> = (0..4).map(|_| pool.alloc()).collect();
        assert_eq!(pool.capacity(), 4);

        // The fifth allocation must trigger exactly one replenishment and hand out
        // a slot distinct from all earlier ones.
        let fifth = pool.alloc();
        assert_eq!(pool.capacity(), 8);
        assert!(slots.iter().all(|slot| *slot != fifth));
        slots.push(fifth);

        // The sixth is served from the second block, not a third.
        let sixth = pool.alloc();
        assert_eq!(pool.capacity(), 8);
        assert!(slots.iter().all(|slot| *slot != sixth));
    }

    #[test]
    fn patterns_survive_neighbor_churn() {
        // Byte-array slots also exercise the unaligned free-list links.
        let mut pool = SlotPool::<[u8; 16], 4>::new();

        let keepers: Vec<_> = (0..3).map(|_| pool.alloc()).collect();

        for (index, slot) in keepers.iter().enumerate() {
            unsafe { slot.write([index as u8 + 1; 16]) };
        }

        // Churn the remaining capacity while the keepers stay live.
        for round in 0..10 {
            let scratch = pool.alloc();
            unsafe { scratch.write([0xAA ^ round; 16]) };
            unsafe { pool.dealloc(scratch) };
        }

        for (index, slot) in keepers.iter().enumerate() {
            unsafe { assert_eq!(slot.read(), [index as u8 + 1; 16]) };
        }

        for slot in keepers {
            unsafe { pool.dealloc(slot) };
        }
    }

    #[test]
    fn caller_managed_struct_contents() {
        #[derive(Clone, Copy, Debug, Eq, PartialEq)]
        #[repr(C)]
        struct Record {
            id: u64,
            tag: [u8; 16],
        }

        let mut pool = SlotPool::<Record, 4>::new();

        let slot = pool.alloc();
        let record = Record {
            id: 10,
            tag: *b"abcdefghijklmnop",
        };

        unsafe { slot.write(record) };
        unsafe { assert_eq!(slot.read(), record) };

        unsafe { pool.dealloc(slot) };
    }

    #[test]
    fn drop_after_churn_is_clean() {
        let mut pool = SlotPool::<u64, 4>::new();

        let slots: Vec<_> = (0..9).map(|_| pool.alloc()).collect();
        assert_eq!(pool.capacity(), 12);

        for slot in slots {
            unsafe { pool.dealloc(slot) };
        }

        // Capacity is never returned early; it all goes at once, right here.
        drop(pool);
    }

    #[test]
    fn default_block_capacity_is_sixteen() {
        let pool = SlotPool::<u64>::new();

        assert_eq!(pool.capacity(), 16);
    }

    #[test]
    fn multithreaded_via_mutex() {
        let pool = Arc::new(Mutex::new(SlotPool::<u64, 4>::new()));

        {
            let mut pool = pool.lock().unwrap();
            let slot = pool.alloc();
            unsafe { slot.write(42) };
            unsafe { pool.dealloc(slot) };
        }

        let pool_clone = Arc::clone(&pool);
        let handle = thread::spawn(move || {
            let mut pool = pool_clone.lock().unwrap();
            let slot = pool.alloc();
            unsafe { slot.write(43) };
            unsafe { assert_eq!(slot.read(), 43) };
            unsafe { pool.dealloc(slot) };
        });

        handle.join().unwrap();

        let pool = pool.lock().unwrap();
        assert!(pool.is_empty());
    }

    #[test]
    #[should_panic]
    fn slot_smaller_than_link_is_panic() {
        drop(SlotPool::<u8, 4>::new());
    }

    #[test]
    #[should_panic]
    fn zero_block_capacity_is_panic() {
        drop(SlotPool::<u64, 0>::new());
    }
}
