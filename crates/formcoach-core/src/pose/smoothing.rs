//! Sliding-window angle smoothing.
//!
//! Small windows react faster, large windows reject more jitter.

use std::collections::VecDeque;

/// Default number of readings averaged.
pub const DEFAULT_WINDOW: usize = 3;

/// Append `new_value`, evict the oldest readings beyond `window_size`, and return
/// the mean of what remains.
pub fn smooth(new_value: f32, buffer: &mut VecDeque<f32>, window_size: usize) -> f32 {
    let window_size = window_size.max(1);
    buffer.push_back(new_value);
    while buffer.len() > window_size {
        buffer.pop_front();
    }
    buffer.iter().sum::<f32>() / buffer.len() as f32
}

/// Bounded FIFO of recent raw angles. Length never exceeds the window.
#[derive(Debug, Clone)]
pub struct AngleBuffer {
    values: VecDeque<f32>,
    window: usize,
}

impl AngleBuffer {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            values: VecDeque::with_capacity(window + 1),
            window,
        }
    }

    /// Push a raw reading and return the smoothed value.
    pub fn push(&mut self, raw: f32) -> f32 {
        smooth(raw, &mut self.values, self.window)
    }

    /// Mean of the current contents, or `None` when empty.
    pub fn mean(&self) -> Option<f32> {
        if self.values.is_empty() {
            None
        } else {
            Some(self.values.iter().sum::<f32>() / self.values.len() as f32)
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

impl Default for AngleBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_mean_of_last_window_values() {
        let mut buf = VecDeque::new();
        let fed = [10.0, 20.0, 30.0, 40.0, 50.0, 60.0];
        for (i, v) in fed.iter().enumerate() {
            let out = smooth(*v, &mut buf, 4);
            assert!(buf.len() <= 4);
            let start = (i + 1).saturating_sub(4);
            let tail = &fed[start..=i];
            let expected = tail.iter().sum::<f32>() / tail.len() as f32;
            assert!((out - expected).abs() < 1e-4, "step {i}: {out} vs {expected}");
        }
    }

    #[test]
    fn evicts_oldest_first() {
        let mut buf = AngleBuffer::new(2);
        buf.push(100.0);
        buf.push(50.0);
        let out = buf.push(10.0);
        assert_eq!(buf.len(), 2);
        assert!((out - 30.0).abs() < 1e-4);
    }

    #[test]
    fn clear_resets_mean() {
        let mut buf = AngleBuffer::default();
        buf.push(90.0);
        assert_eq!(buf.mean(), Some(90.0));
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.mean(), None);
    }
}
