use std::cmp::Ordering;

pub mod heap_queue;

/// Heap entry ordered by ascending `key`.
#[derive(Copy, Clone, Debug)]
pub struct QueueElement<T> {
    pub key: f64,
    pub item: T,
}

impl<T> QueueElement<T> {
    pub fn new(key: f64, item: T) -> QueueElement<T> {
        QueueElement { key, item }
    }
}

// The priority queue depends on `Ord`.
// Explicitly implement the trait so the queue becomes a min-heap
// instead of a max-heap.
impl<T: Ord> Ord for QueueElement<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Flip the ordering on keys. Ties are broken by the item so that
        // `PartialEq` and `Ord` stay consistent and pops are deterministic.
        other
            .key
            .total_cmp(&self.key)
            .then_with(|| other.item.cmp(&self.item))
    }
}

impl<T: Ord> PartialOrd for QueueElement<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Ord> PartialEq for QueueElement<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T: Ord> Eq for QueueElement<T> {}
