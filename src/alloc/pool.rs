// Licensed under the MIT License.

use std::fmt;
use std::mem::MaybeUninit;

use crate::spinlock::SpinLock;

/// Where a value handed out by [`Pool::allocate`] actually lives.
///
/// Mirrors the coroutine-stack allocator's `Header` encoding a slot index or
/// `-1` for a heap overflow allocation, generalized to any contiguous run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotHandle {
    /// `(first_index, count)` within the pool's backing buffer.
    Pooled(usize, usize),
    /// Allocated from the system heap because the pool had no contiguous
    /// run of the requested size.
    Heap,
}

struct Inner<T> {
    buffer: Box<[MaybeUninit<T>]>,
    /// Indices of free slots. Kept sorted descending so that checking the
    /// top `n` entries for contiguity is a simple adjacent-difference scan.
    free: Vec<usize>,
    heap_allocated: usize,
}

/// A fixed-capacity pool of `T` slots with heap fallback.
///
/// `allocate(n)` looks for `n` contiguous free slots by scanning from the top
/// of the free-index stack; if found, it returns `SlotHandle::Pooled` and the
/// values must be initialized by the caller via [`Pool::slot_mut`]. On
/// exhaustion it falls back to the heap and reports `SlotHandle::Heap`,
/// leaving allocation of the actual value to the caller (see
/// [`Pool::allocate`]'s return contract).
pub struct Pool<T> {
    inner: SpinLock<Inner<T>>,
    capacity: usize,
}

impl<T> Pool<T> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let mut buffer = Vec::with_capacity(capacity);
        buffer.resize_with(capacity, MaybeUninit::uninit);
        let mut free: Vec<usize> = (0..capacity).collect();
        free.reverse(); // descending, so `free.last()` is the smallest free index.
        Self {
            inner: SpinLock::new(Inner {
                buffer: buffer.into_boxed_slice(),
                free,
                heap_allocated: 0,
            }),
            capacity,
        }
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn num_free(&self) -> usize {
        self.inner.lock().free.len()
    }

    #[must_use]
    pub fn num_heap_allocated(&self) -> usize {
        self.inner.lock().heap_allocated
    }

    /// Attempts to reserve `n` contiguous pool slots. On success the caller
    /// must initialize each with [`Pool::write`] before reading it back with
    /// [`Pool::read`]. Returns `SlotHandle::Heap` when no contiguous run of
    /// `n` free slots exists (the caller then owns its own heap allocation
    /// and never calls into this pool for that value again).
    pub fn allocate(&self, n: usize) -> SlotHandle {
        assert!(n >= 1, "cannot allocate zero slots");
        let mut inner = self.inner.lock();

        if let Some(start_pos) = find_contiguous_run(&inner.free, n) {
            let first_index = inner.free[start_pos + n - 1];
            inner.free.drain(start_pos..start_pos + n);
            return SlotHandle::Pooled(first_index, n);
        }

        inner.heap_allocated += n;
        SlotHandle::Heap
    }

    pub fn deallocate(&self, handle: SlotHandle) {
        let mut inner = self.inner.lock();
        match handle {
            SlotHandle::Heap => {
                inner.heap_allocated = inner.heap_allocated.saturating_sub(1);
            }
            SlotHandle::Pooled(first_index, count) => {
                for i in 0..count {
                    inner.free.push(first_index + i);
                }
                inner.free.sort_unstable_by(|a, b| b.cmp(a));
            }
        }
    }

    /// # Safety
    /// `index` must be within `SlotHandle::Pooled`'s range currently owned by
    /// the caller and not previously written without being read/dropped.
    pub unsafe fn write(&self, index: usize, value: T) {
        let mut inner = self.inner.lock();
        inner.buffer[index].write(value);
    }

    /// # Safety
    /// `index` must have been previously written via [`Pool::write`] and not
    /// yet read back.
    pub unsafe fn read(&self, index: usize) -> T {
        let mut inner = self.inner.lock();
        // SAFETY: caller guarantees the slot holds an initialized value.
        unsafe { inner.buffer[index].assume_init_read() }
    }
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Pool")
            .field("capacity", &self.capacity)
            .field("free", &inner.free.len())
            .field("heap_allocated", &inner.heap_allocated)
            .finish()
    }
}

/// Scans the descending free-index stack for `n` entries that are
/// contiguous in slot-index space, returning the position of the *first* of
/// those entries (i.e. the one holding the lowest index). The stack is kept
/// sorted descending so a run of contiguous indices appears as a run of
/// consecutive-decreasing values.
fn find_contiguous_run(free_desc: &[usize], n: usize) -> Option<usize> {
    if free_desc.len() < n {
        return None;
    }
    'outer: for start in 0..=(free_desc.len() - n) {
        for i in 0..n - 1 {
            if free_desc[start + i] != free_desc[start + i + 1] + 1 {
                continue 'outer;
            }
        }
        return Some(start);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_single_slot_round_trips() {
        let pool: Pool<u32> = Pool::new(4);
        let handle = pool.allocate(1);
        let SlotHandle::Pooled(idx, 1) = handle else {
            panic!("expected pooled slot");
        };
        unsafe {
            pool.write(idx, 42);
            assert_eq!(pool.read(idx), 42);
        }
        pool.deallocate(handle);
        assert_eq!(pool.num_free(), 4);
    }

    #[test]
    fn exhaustion_falls_back_to_heap() {
        let pool: Pool<u32> = Pool::new(2);
        let a = pool.allocate(1);
        let b = pool.allocate(1);
        let c = pool.allocate(1);
        assert!(matches!(a, SlotHandle::Pooled(..)));
        assert!(matches!(b, SlotHandle::Pooled(..)));
        assert_eq!(c, SlotHandle::Heap);
        assert_eq!(pool.num_heap_allocated(), 1);
        pool.deallocate(c);
        assert_eq!(pool.num_heap_allocated(), 0);
    }

    #[test]
    fn contiguous_allocation_requires_adjacent_indices() {
        let pool: Pool<u32> = Pool::new(4);
        let single = pool.allocate(1); // takes index 3 (top of descending free stack).
        let SlotHandle::Pooled(taken_idx, 1) = single else {
            panic!()
        };
        assert_eq!(taken_idx, 3);

        // Remaining free indices are 0,1,2 - contiguous, so a run of 3 still fits.
        let run = pool.allocate(3);
        assert!(matches!(run, SlotHandle::Pooled(0, 3)));
    }

    #[test]
    fn pointers_stay_in_managed_buffer_invariant() {
        let pool: Pool<u32> = Pool::new(8);
        for _ in 0..8 {
            let h = pool.allocate(1);
            if let SlotHandle::Pooled(idx, _) = h {
                assert!(idx < pool.capacity());
            }
        }
        assert_eq!(pool.num_free(), 0);
        assert_eq!(pool.num_heap_allocated(), 0);
    }
}
