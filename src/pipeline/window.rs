//! Sliding window aggregation.
//!
//! Buffers the most recent N samples and re-emits the full window on
//! every push once warm (overlapping windows, stride 1). The first
//! N−1 pushes produce nothing.

use crate::sample::Sample;
use std::collections::VecDeque;

/// Fixed-capacity overlapping sample window.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    buf: VecDeque<Sample>,
    capacity: usize,
}

impl SlidingWindow {
    /// Create a window of the given capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a sample, dropping the oldest once at capacity.
    ///
    /// Returns the full window (oldest first) when the buffer is full,
    /// `None` while still warming up.
    pub fn push(&mut self, sample: Sample) -> Option<&[Sample]> {
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(sample);
        if self.buf.len() == self.capacity {
            Some(self.buf.make_contiguous())
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::Field;

    fn sample(value: f64) -> Sample {
        Sample::tagged(Field::UserTemperature, value)
    }

    #[test]
    fn test_emits_total_minus_capacity_plus_one_windows() {
        for capacity in [1usize, 3, 5] {
            let total = 12usize;
            let mut window = SlidingWindow::new(capacity);
            let mut emitted = 0usize;
            for i in 0..total {
                if window.push(sample(i as f64)).is_some() {
                    emitted += 1;
                }
            }
            assert_eq!(emitted, total - capacity + 1, "capacity {capacity}");
        }
    }

    #[test]
    fn test_emits_nothing_before_warm() {
        let mut window = SlidingWindow::new(5);
        for i in 0..4 {
            assert!(window.push(sample(f64::from(i))).is_none());
        }
        assert_eq!(window.len(), 4);
    }

    #[test]
    fn test_full_window_slides_by_one() {
        let mut window = SlidingWindow::new(3);
        assert!(window.push(sample(0.0)).is_none());
        assert!(window.push(sample(1.0)).is_none());

        let first: Vec<f64> = window
            .push(sample(2.0))
            .expect("full")
            .iter()
            .filter_map(|s| s.get(Field::UserTemperature))
            .collect();
        assert_eq!(first, vec![0.0, 1.0, 2.0]);

        let second: Vec<f64> = window
            .push(sample(3.0))
            .expect("full")
            .iter()
            .filter_map(|s| s.get(Field::UserTemperature))
            .collect();
        assert_eq!(second, vec![1.0, 2.0, 3.0]);
        assert_eq!(window.len(), window.capacity());
    }

    #[test]
    fn test_once_full_length_stays_at_capacity() {
        let mut window = SlidingWindow::new(2);
        for i in 0..10 {
            window.push(sample(f64::from(i)));
            if i >= 1 {
                assert_eq!(window.len(), 2);
            }
        }
    }
}
