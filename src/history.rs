// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Sliding window of recent temperature samples.

use std::collections::VecDeque;

pub const DEFAULT_CAPACITY: usize = 20;
pub const DEFAULT_RECENT: usize = 5;

/// A fixed-capacity window over the most recent raw temperature samples.
///
/// The first sample pre-fills the whole window so early averages are not
/// pulled toward zero.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    samples: VecDeque<f64>,
    capacity: usize,
    recent: usize,
}

impl HistoryBuffer {
    /// `recent` must be non-zero and smaller than `capacity`.
    pub fn new(capacity: usize, recent: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity + 1),
            capacity,
            recent,
        }
    }

    pub fn push(&mut self, temp: f64) {
        if self.samples.is_empty() {
            self.samples.extend(std::iter::repeat_n(temp, self.capacity));
            return;
        }
        self.samples.push_back(temp);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    /// The larger of the mean over the older samples and the mean over the
    /// `recent` newest samples. `None` until the window has filled.
    ///
    /// A recent rise dominates at once while a drop only shows after it has
    /// persisted through the longer window.
    pub fn weighted_average(&self) -> Option<f64> {
        if !self.is_full() {
            return None;
        }
        let split = self.capacity - self.recent;
        let older: f64 = self.samples.iter().take(split).sum::<f64>() / split as f64;
        let newer: f64 = self.samples.iter().skip(split).sum::<f64>() / self.recent as f64;
        Some(older.max(newer))
    }

    pub fn samples(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_RECENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_buffer_has_no_average() {
        let history = HistoryBuffer::default();
        assert_eq!(history.weighted_average(), None);
    }

    #[test]
    fn test_first_sample_prefills() {
        let mut history = HistoryBuffer::default();
        history.push(42.0);
        assert!(history.is_full());
        assert_eq!(history.samples().count(), DEFAULT_CAPACITY);
        assert_eq!(history.weighted_average(), Some(42.0));
    }

    #[test]
    fn test_recent_spike_dominates() {
        let mut history = HistoryBuffer::default();
        for _ in 0..15 {
            history.push(40.0);
        }
        for _ in 0..5 {
            history.push(70.0);
        }
        assert_eq!(history.weighted_average(), Some(70.0));
    }

    #[test]
    fn test_recent_drop_is_smoothed() {
        let mut history = HistoryBuffer::default();
        for _ in 0..20 {
            history.push(70.0);
        }
        for _ in 0..5 {
            history.push(40.0);
        }
        assert_eq!(history.weighted_average(), Some(70.0));
    }

    #[test]
    fn test_oldest_sample_is_evicted() {
        let mut history = HistoryBuffer::new(4, 1);
        history.push(10.0);
        history.push(20.0);
        history.push(30.0);
        assert_eq!(history.samples().collect::<Vec<_>>(), vec![10.0, 10.0, 20.0, 30.0]);
        assert_eq!(history.weighted_average(), Some(30.0));
    }

    #[test]
    fn test_single_zero_sample_does_not_drag_signal() {
        let mut history = HistoryBuffer::default();
        history.push(60.0);
        history.push(0.0);
        // older mean stays 60, recent mean drops to 48
        assert_eq!(history.weighted_average(), Some(60.0));
    }
}
