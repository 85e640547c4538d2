//! Basic usage of the `slot_pool` crate:
//!
//! * Creating a pool.
//! * Placement-constructing values in pool slots.
//! * Returning slots for reuse.
//! * Observing fixed-step growth.

use slot_pool::SlotPool;

/// The kind of payload a latency-sensitive pipeline might recycle.
#[derive(Debug)]
struct Message {
    sequence: u64,
    payload: [u8; 24],
}

fn main() {
    // Four slots per block; the first block is carved before we ever allocate.
    let mut pool = SlotPool::<Message, 4>::new();

    println!(
        "Fresh pool: {} of {} slots in use",
        pool.len(),
        pool.capacity()
    );

    // The pool hands out raw storage. Constructing a value in it is our job.
    let slot = pool.alloc();

    // SAFETY: The slot is writable, Message-sized, and exclusively ours.
    unsafe {
        slot.write(Message {
            sequence: 1,
            payload: [0x55; 24],
        });
    }

    // SAFETY: Initialized just above; no exclusive access exists elsewhere.
    let message = unsafe { &*slot.as_ptr() };
    println!(
        "Message #{} with {} payload bytes lives in a pool slot",
        message.sequence,
        message.payload.len()
    );

    // Dropping the value before returning the slot is also our job. Message has
    // nothing to drop, so the slot can go straight back.
    // SAFETY: The slot came from this pool and is returned exactly once.
    unsafe { pool.dealloc(slot) };

    // The most recently returned slot is the next one served.
    let recycled = pool.alloc();
    assert_eq!(recycled, slot);
    println!("Recycled the same slot: {recycled:?}");

    // SAFETY: Same contract as above.
    unsafe { pool.dealloc(recycled) };

    // Exhausting a block makes the pool carve exactly one more.
    let burst: Vec<_> = (0..5).map(|_| pool.alloc()).collect();
    println!(
        "After a burst of five: {} of {} slots in use",
        pool.len(),
        pool.capacity()
    );

    for slot in burst {
        // SAFETY: Every slot came from this pool, holds no live value, and is
        // returned exactly once.
        unsafe { pool.dealloc(slot) };
    }

    // Dropping the pool releases every block it ever carved, all at once.
    drop(pool);
    println!("Pool dropped; all blocks released together");
}
