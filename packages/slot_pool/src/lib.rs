//! A two-layer memory pool for latency-sensitive code paths that must not call the
//! general-purpose system allocator on the hot path.
//!
//! This crate provides [`SlotPool`], a typed object pool that serves fixed-size
//! storage slots in O(1), built on [`BlockAllocator`], a bulk allocator that
//! requests memory one block at a time and releases everything at once when it is
//! dropped.
//!
//! # Key Features
//!
//! - **Zero steady-state allocation**: once a block is carved, serving and
//!   reclaiming slots never touches the system allocator
//! - **O(1) serve and reclaim**: an intrusive free list threaded through the
//!   vacant slots' own bytes
//! - **Most-recently-freed-first reuse**: the last slot returned is the next slot
//!   served, keeping the hot path cache-friendly
//! - **Fixed-step growth**: exhausting the free list carves exactly one more block
//!   of `BLOCK_CAPACITY` slots
//! - **Bulk teardown**: slot memory always belongs to the pool and is released in
//!   one sweep when the pool is dropped
//! - **Storage, not lifecycle**: the pool never constructs or drops `T`; callers
//!   placement-write on [`alloc()`][SlotPool::alloc] and drop before
//!   [`dealloc()`][SlotPool::dealloc]
//! - **Thread mobility**: a pool can move between threads (but not be shared
//!   without external synchronization)
//!
//! # Example
//!
//! ```rust
//! use slot_pool::SlotPool;
//!
//! // Four slots per block; the first block is carved up front.
//! let mut pool = SlotPool::<u64, 4>::new();
//!
//! let slot = pool.alloc();
//!
//! // The pool hands out raw storage; constructing a value in it is our job.
//! // SAFETY: The slot is writable and exclusively ours until dealloc().
//! unsafe { slot.write(1024) };
//! // SAFETY: Initialized just above.
//! assert_eq!(unsafe { slot.read() }, 1024);
//!
//! // Dropping the value (trivial for u64) and returning the slot is likewise ours.
//! // SAFETY: The slot came from this pool and is returned exactly once.
//! unsafe { pool.dealloc(slot) };
//! ```
//!
//! # Growth
//!
//! ```rust
//! use slot_pool::SlotPool;
//!
//! let mut pool = SlotPool::<u64, 4>::new();
//! assert_eq!(pool.capacity(), 4);
//!
//! // A fifth allocation exhausts the first block, so the pool carves a second.
//! let slots: Vec<_> = (0..5).map(|_| pool.alloc()).collect();
//! assert_eq!(pool.capacity(), 8);
//!
//! for slot in slots {
//!     // SAFETY: Every slot came from this pool, holds no live value, and is
//!     // returned exactly once.
//!     unsafe { pool.dealloc(slot) };
//! }
//! ```
//!
//! The block allocator is also usable on its own when all you need is "allocate
//! now, free everything together later":
//!
//! ```rust
//! use std::alloc::Layout;
//!
//! use slot_pool::BlockAllocator;
//!
//! let mut blocks = BlockAllocator::new();
//! let region = blocks.allocate(Layout::array::<u8>(4096).unwrap());
//!
//! // ... use the region ...
//!
//! // Dropping the allocator releases every block it ever issued.
//! drop(blocks);
//! ```

mod block_allocator;
mod free_list;
mod pool;

pub use block_allocator::*;
pub(crate) use free_list::*;
pub use pool::*;
