//! Sealed, non-replenishing allocation queue.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Fixed set of ids handed out at most once each.
///
/// The queue is filled at construction and has no insert operation. `take`
/// never blocks: once every id has been handed out it returns `None`, which
/// callers must read as pool exhaustion.
#[derive(Debug)]
pub struct AllocationQueue {
    ids: Box<[String]>,
    next: AtomicUsize,
}

impl AllocationQueue {
    /// Seal `ids` into a queue. Duplicate ids are dropped, keeping the first.
    #[must_use]
    pub fn sealed(ids: impl IntoIterator<Item = String>) -> Self {
        let mut seen = std::collections::HashSet::new();
        let ids: Vec<String> = ids
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();

        Self {
            ids: ids.into_boxed_slice(),
            next: AtomicUsize::new(0),
        }
    }

    /// Remove and return the next unallocated id.
    pub fn take(&self) -> Option<String> {
        let len = self.ids.len();
        self.next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < len).then_some(n + 1)
            })
            .ok()
            .map(|index| self.ids[index].clone())
    }

    /// Number of ids the queue was sealed with.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.ids.len()
    }

    /// Number of ids not yet taken.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.ids
            .len()
            .saturating_sub(self.next.load(Ordering::Acquire))
    }
}
