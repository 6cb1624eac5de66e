use std::collections::BinaryHeap;

use super::QueueElement;

/// Binary min-heap without decrease-key; stale entries are skipped by callers.
#[derive(Clone, Debug)]
pub struct HeapQueue<T: Ord> {
    queue: BinaryHeap<QueueElement<T>>,
}

impl<T: Ord> Default for HeapQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord> HeapQueue<T> {
    pub fn new() -> HeapQueue<T> {
        HeapQueue {
            queue: BinaryHeap::new(),
        }
    }

    pub fn push(&mut self, key: f64, item: T) {
        self.queue.push(QueueElement::new(key, item))
    }

    pub fn pop(&mut self) -> Option<QueueElement<T>> {
        self.queue.pop()
    }

    pub fn peek(&self) -> Option<&QueueElement<T>> {
        self.queue.peek()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }
}

impl<T: Ord> FromIterator<QueueElement<T>> for HeapQueue<T> {
    fn from_iter<I: IntoIterator<Item = QueueElement<T>>>(iter: I) -> Self {
        HeapQueue {
            queue: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_smallest_key_first_with_deterministic_ties() {
        let mut queue = HeapQueue::new();
        queue.push(3.5, 1u32);
        queue.push(0.5, 9u32);
        queue.push(3.5, 0u32);
        queue.push(1.0, 4u32);

        let order: Vec<_> = std::iter::from_fn(|| queue.pop().map(|element| element.item)).collect();
        assert_eq!(order, vec![9, 4, 0, 1]);
    }
}
