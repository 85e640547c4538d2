use std::num::NonZero;
use std::ptr::{self, NonNull};

/// An intrusive LIFO list of vacant slots, threaded through the slots' own storage.
///
/// While a slot is vacant, its first pointer-sized bytes hold the address of the next
/// vacant slot (null for the final slot). While a slot is handed out, those same bytes
/// belong to the caller's value. This module is the only place in the crate that
/// reinterprets slot bytes; everything else deals in whole slots.
///
/// The link is written and read with unaligned accesses, so a slot only needs the
/// alignment of the values stored in it, not the alignment of a pointer.
#[derive(Debug)]
pub(crate) struct FreeList {
    /// The most recently vacated (or first freshly carved) slot. Served first.
    head: Option<NonNull<u8>>,
}

impl FreeList {
    pub(crate) const fn new() -> Self {
        Self { head: None }
    }

    #[must_use]
    pub(crate) fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Pushes a vacant slot onto the list, making it the next slot to be served.
    ///
    /// # Safety
    ///
    /// The caller must guarantee that:
    ///
    /// - `slot` points to at least pointer-size writable bytes that remain valid
    ///   for as long as the slot stays on the list;
    /// - `slot` is not already on the list;
    /// - nothing else reads or writes the slot's bytes while it is on the list.
    pub(crate) unsafe fn push(&mut self, slot: NonNull<u8>) {
        let next = self.head.map_or(ptr::null_mut(), NonNull::as_ptr);

        // SAFETY: The caller guarantees the slot has room for the link and is ours
        // to write; `write_link` places no alignment requirement on the slot.
        unsafe {
            write_link(slot, next);
        }

        self.head = Some(slot);
    }

    /// Pops the most recently pushed slot, advancing the list head to that slot's
    /// stored link.
    #[must_use]
    pub(crate) fn pop(&mut self) -> Option<NonNull<u8>> {
        let slot = self.head?;

        // SAFETY: Every slot reachable through `head` had its link written by push()
        // or refill() before it became reachable, and the caller of push()/refill()
        // guaranteed the bytes stay valid and untouched while the slot is listed.
        let next = unsafe { read_link(slot) };

        self.head = NonNull::new(next);

        Some(slot)
    }

    /// Carves a freshly allocated block into `slot_count` contiguous slots of
    /// `slot_size` bytes each and links them in forward order: slot *i* links to
    /// slot *i + 1*, and the final slot's link is the null sentinel that terminates
    /// the list. The list head becomes the first carved slot.
    ///
    /// # Safety
    ///
    /// The caller must guarantee that:
    ///
    /// - `block` points to at least `slot_size * slot_count` writable bytes that
    ///   remain valid for as long as any carved slot stays on the list;
    /// - `slot_size` is at least pointer-size;
    /// - nothing else reads or writes the block's bytes while its slots are listed.
    pub(crate) unsafe fn refill(
        &mut self,
        block: NonNull<u8>,
        slot_size: NonZero<usize>,
        slot_count: NonZero<usize>,
    ) {
        debug_assert!(
            self.is_empty(),
            "refill() would orphan the slots already on the list"
        );

        let mut slot = block;

        for _ in 1..slot_count.get() {
            // SAFETY: The loop visits slot_count - 1 slots, so this lands at most
            // slot_size * (slot_count - 1) bytes into the block the caller vouched for.
            let next = unsafe { slot.add(slot_size.get()) };

            // SAFETY: `slot` is within the block and slot_size >= pointer-size per
            // the caller's contract, so the link fits in the slot's own bytes.
            unsafe {
                write_link(slot, next.as_ptr());
            }

            slot = next;
        }

        // The final slot terminates the list. A later push() is what gives it a
        // successor, if it ever gets one.
        // SAFETY: Same contract as the writes above; this is the last slot in the block.
        unsafe {
            write_link(slot, ptr::null_mut());
        }

        self.head = Some(block);
    }

    /// Visits every slot currently on the list, head first.
    ///
    /// Debug-build integrity checking only; intentionally O(n).
    #[cfg(debug_assertions)]
    pub(crate) fn walk(&self, mut visit: impl FnMut(NonNull<u8>)) {
        let mut next = self.head;

        while let Some(slot) = next {
            visit(slot);

            // SAFETY: Same invariant as pop() - any listed slot has a valid link.
            next = NonNull::new(unsafe { read_link(slot) });
        }
    }
}

#[expect(
    clippy::cast_ptr_alignment,
    reason = "the link is accessed exclusively through unaligned writes"
)]
unsafe fn write_link(slot: NonNull<u8>, next: *mut u8) {
    // SAFETY: The caller guarantees at least pointer-size writable bytes at `slot`.
    unsafe {
        slot.as_ptr().cast::<*mut u8>().write_unaligned(next);
    }
}

#[expect(
    clippy::cast_ptr_alignment,
    reason = "the link is accessed exclusively through unaligned reads"
)]
unsafe fn read_link(slot: NonNull<u8>) -> *mut u8 {
    // SAFETY: The caller guarantees `slot` holds a previously written link.
    unsafe { slot.as_ptr().cast::<*mut u8>().read_unaligned() }
}

#[cfg(test)]
mod tests {
    use new_zealand::nz;

    use super::*;

    const SLOT_BYTES: NonZero<usize> =
        const { NonZero::new(size_of::<usize>()).expect("usize is never zero-sized") };

    // A backing buffer of pointer-aligned, pointer-sized slots for the list to chew on.
    struct Backing {
        buffer: Vec<usize>,
    }

    impl Backing {
        fn new(slots: usize) -> Self {
            Self {
                buffer: vec![0_usize; slots],
            }
        }

        fn slot(&mut self, index: usize) -> NonNull<u8> {
            assert!(index < self.buffer.len());

            // SAFETY: Bounds-checked above; the offset stays within the buffer.
            unsafe {
                NonNull::new(self.buffer.as_mut_ptr())
                    .unwrap()
                    .cast::<u8>()
                    .add(index.checked_mul(size_of::<usize>()).unwrap())
            }
        }
    }

    #[test]
    fn starts_empty() {
        let mut list = FreeList::new();

        assert!(list.is_empty());
        assert_eq!(list.pop(), None);
    }

    #[test]
    fn push_pop_is_lifo() {
        let mut backing = Backing::new(3);
        let mut list = FreeList::new();

        let a = backing.slot(0);
        let b = backing.slot(1);
        let c = backing.slot(2);

        // SAFETY: Each slot is a distinct usize in the buffer, valid for the whole test.
        unsafe {
            list.push(a);
        }
        // SAFETY: As above.
        unsafe {
            list.push(b);
        }
        // SAFETY: As above.
        unsafe {
            list.push(c);
        }

        assert_eq!(list.pop(), Some(c));
        assert_eq!(list.pop(), Some(b));
        assert_eq!(list.pop(), Some(a));
        assert_eq!(list.pop(), None);
    }

    #[test]
    fn refill_serves_slots_in_forward_order() {
        let mut backing = Backing::new(4);
        let mut list = FreeList::new();

        // SAFETY: The buffer holds 4 pointer-sized slots and outlives the list.
        unsafe {
            list.refill(backing.slot(0), SLOT_BYTES, nz!(4));
        }

        for index in 0..4 {
            let expected = backing.slot(index);
            assert_eq!(list.pop(), Some(expected));
        }

        // The final slot's null sentinel terminates the list.
        assert!(list.is_empty());
        assert_eq!(list.pop(), None);
    }

    #[test]
    fn push_after_refill_stitches_lists_together() {
        let mut backing = Backing::new(2);
        let mut extra = Backing::new(1);

        let stray = extra.slot(0);

        let mut list = FreeList::new();

        // SAFETY: Both buffers outlive the list and their slots are pointer-sized.
        unsafe {
            list.refill(backing.slot(0), SLOT_BYTES, nz!(2));
        }
        // SAFETY: As above.
        unsafe {
            list.push(stray);
        }

        assert_eq!(list.pop(), Some(stray));
        assert_eq!(list.pop(), Some(backing.slot(0)));
        assert_eq!(list.pop(), Some(backing.slot(1)));
        assert_eq!(list.pop(), None);
    }

    #[cfg(debug_assertions)]
    #[test]
    fn walk_visits_head_first() {
        let mut backing = Backing::new(3);
        let mut list = FreeList::new();

        // SAFETY: The buffer holds 3 pointer-sized slots and outlives the list.
        unsafe {
            list.refill(backing.slot(0), SLOT_BYTES, nz!(3));
        }

        let mut visited = Vec::new();
        list.walk(|slot| visited.push(slot));

        let expected: Vec<_> = (0..3).map(|index| backing.slot(index)).collect();
        assert_eq!(visited, expected);
    }
}
