//! Transform history and moving-average smoothing.

use std::collections::VecDeque;

use steadyframe_core::Transform;

/// Fixed-capacity FIFO of recent motion transforms. Pushing onto a full
/// history evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct TransformHistory {
    entries: VecDeque<Transform>,
    capacity: usize,
}

impl TransformHistory {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, transform: Transform) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(transform);
    }

    /// Change the capacity, dropping the oldest entries if it shrinks.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Transform> + ExactSizeIterator + '_ {
        self.entries.iter()
    }

    /// Element-wise mean of the stored transforms; identity when empty.
    pub fn mean(&self) -> Transform {
        Transform::mean(&self.entries)
    }
}

/// Moving-average smoother over the last `window` motion transforms.
#[derive(Debug, Clone)]
pub struct TransformSmoother {
    history: TransformHistory,
}

impl TransformSmoother {
    pub fn new(window: usize) -> Self {
        Self {
            history: TransformHistory::new(window),
        }
    }

    /// Record `transform` and return the smoothed motion.
    pub fn push(&mut self, transform: Transform) -> Transform {
        self.history.push(transform);
        self.history.mean()
    }

    /// Smoothed motion without recording anything.
    pub fn current(&self) -> Transform {
        self.history.mean()
    }

    pub fn window(&self) -> usize {
        self.history.capacity()
    }

    pub fn set_window(&mut self, window: usize) {
        self.history.set_capacity(window);
    }

    pub fn history(&self) -> &TransformHistory {
        &self.history
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }
}
