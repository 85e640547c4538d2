use std::alloc::{Layout, alloc, dealloc};
use std::ptr::NonNull;

/// One region of raw memory obtained from the system allocator, recorded so it can
/// be released when the owning [`BlockAllocator`] is dropped.
#[derive(Debug)]
struct Block {
    ptr: NonNull<u8>,

    /// The layout the block was allocated with. Deallocation must use the same layout,
    /// so we keep it alongside the pointer.
    layout: Layout,
}

/// A growable bulk allocator that remembers every block it has ever issued.
///
/// Blocks are requested from the system allocator on demand and are released only
/// all at once, when the allocator itself is dropped. There is no way to return an
/// individual block early - callers that want fine-grained reuse layer their own
/// bookkeeping on top, the way [`SlotPool`][crate::SlotPool] does.
///
/// Every pointer returned by [`allocate()`][Self::allocate] remains valid until the
/// allocator is dropped. After the drop, all of them are dangling.
///
/// The allocator cannot be cloned - its `Drop` implementation assumes sole
/// responsibility for the blocks it recorded.
#[derive(Debug)]
pub struct BlockAllocator {
    /// Every block ever issued, in allocation order (most recent last). The record
    /// only ever grows; it is drained in its entirety at drop, most recent block first.
    blocks: Vec<Block>,
}

impl BlockAllocator {
    /// Creates an allocator that has not yet issued any blocks.
    ///
    /// # Example
    ///
    /// ```rust
    /// use slot_pool::BlockAllocator;
    ///
    /// let blocks = BlockAllocator::new();
    /// assert_eq!(blocks.block_count(), 0);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    /// Allocates one block of the given layout and returns a pointer to its first byte.
    ///
    /// The returned bytes are uninitialized. The block remains valid until the
    /// allocator is dropped; it cannot be released individually.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::alloc::Layout;
    ///
    /// use slot_pool::BlockAllocator;
    ///
    /// let mut blocks = BlockAllocator::new();
    /// let region = blocks.allocate(Layout::array::<u64>(32).unwrap());
    ///
    /// // The bytes are ours until `blocks` is dropped, but start out uninitialized.
    /// // SAFETY: The region is writable and at least 32 u64 wide.
    /// unsafe { region.cast::<u64>().write(42) };
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `layout` is zero-sized or if the system allocator cannot satisfy
    /// the request. Allocation failure is not treated as a recoverable condition.
    #[must_use]
    pub fn allocate(&mut self, layout: Layout) -> NonNull<u8> {
        assert!(
            layout.size() > 0,
            "BlockAllocator cannot allocate a zero-sized block"
        );

        // SAFETY: The layout is non-zero-sized, guarded by the assertion above.
        let ptr = NonNull::new(unsafe { alloc(layout) }).expect(
            "we do not intend to handle allocation failure as a real possibility - OOM results in panic",
        );

        self.blocks.push(Block { ptr, layout });

        ptr
    }

    /// The number of blocks this allocator has issued so far.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// The total number of bytes across all issued blocks.
    #[must_use]
    pub fn allocated_bytes(&self) -> usize {
        self.blocks.iter().map(|block| block.layout.size()).sum()
    }

    /// Whether the given pointer lands inside one of the issued blocks.
    ///
    /// Used by debug-build integrity checks; not part of the public surface.
    pub(crate) fn contains(&self, ptr: NonNull<u8>) -> bool {
        self.blocks.iter().any(|block| {
            let start = block.ptr.addr().get();
            let addr = ptr.addr().get();

            // A block at the very end of the address space cannot exist, so the
            // saturating end bound loses nothing.
            addr >= start && addr < start.saturating_add(block.layout.size())
        })
    }
}

impl Default for BlockAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BlockAllocator {
    fn drop(&mut self) {
        // Most recently allocated block first.
        while let Some(block) = self.blocks.pop() {
            // SAFETY: The block was allocated in allocate() with exactly this layout
            // and is deallocated exactly once - the record is drained as we go.
            unsafe {
                dealloc(block.ptr.as_ptr(), block.layout);
            }
        }
    }
}

// SAFETY: The raw pointers are used purely for memory management within the
// allocator's own blocks. Nothing about them is tied to the creating thread.
unsafe impl Send for BlockAllocator {}

#[cfg(test)]
#[allow(
    clippy::multiple_unsafe_ops_per_block,
    reason = "test code doesn't need the same safety rigor as production code"
)]
mod tests {
    use std::alloc::Layout;

    use super::*;

    #[test]
    fn issues_distinct_usable_blocks() {
        let mut blocks = BlockAllocator::new();

        let layout = Layout::array::<u64>(8).unwrap();
        let first = blocks.allocate(layout).cast::<u64>();
        let second = blocks.allocate(layout).cast::<u64>();

        assert_ne!(first, second);

        // Fill both blocks with distinct patterns and verify neither steps on the other.
        for offset in 0..8 {
            // SAFETY: Both blocks are 8 u64 wide and exclusively ours.
            unsafe {
                first.add(offset).write(0x1111_1111_1111_1111);
                second.add(offset).write(0x2222_2222_2222_2222);
            }
        }

        for offset in 0..8 {
            // SAFETY: Written just above.
            unsafe {
                assert_eq!(first.add(offset).read(), 0x1111_1111_1111_1111);
                assert_eq!(second.add(offset).read(), 0x2222_2222_2222_2222);
            }
        }
    }

    #[test]
    fn accounting_tracks_every_block() {
        let mut blocks = BlockAllocator::new();
        assert_eq!(blocks.block_count(), 0);
        assert_eq!(blocks.allocated_bytes(), 0);

        _ = blocks.allocate(Layout::array::<u8>(100).unwrap());
        _ = blocks.allocate(Layout::array::<u8>(50).unwrap());

        assert_eq!(blocks.block_count(), 2);
        assert_eq!(blocks.allocated_bytes(), 150);
    }

    #[test]
    fn contains_covers_payload_only() {
        let mut blocks = BlockAllocator::new();

        let layout = Layout::array::<u8>(16).unwrap();
        let region = blocks.allocate(layout);

        assert!(blocks.contains(region));
        // SAFETY: Last byte of the 16-byte block.
        assert!(blocks.contains(unsafe { region.add(15) }));
        // SAFETY: One past the end is a valid pointer to form, just not contained.
        assert!(!blocks.contains(unsafe { region.add(16) }));
    }

    #[test]
    #[should_panic]
    fn zero_sized_layout_is_panic() {
        let mut blocks = BlockAllocator::new();

        _ = blocks.allocate(Layout::from_size_align(0, 1).unwrap());
    }

    #[test]
    fn drop_with_many_blocks_is_clean() {
        let mut blocks = BlockAllocator::new();

        for count in 1..32 {
            _ = blocks.allocate(Layout::array::<u64>(count).unwrap());
        }

        // All blocks are released together when the allocator goes out of scope.
        drop(blocks);
    }
}
