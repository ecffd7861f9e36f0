//! Short-window latency trend.
//!
//! The aggregator keeps the last few interval p99 readings and marks each new
//! reading with a symbol telling how far it sits from their mean: `+` tiers
//! for regressions, `-` tiers for improvements, one tier per order of
//! magnitude, at most three.

use crate::ring_buf::RingBuf;

pub const TREND_WINDOW_LEN: usize = 5;

const UP: [&str; 4] = ["", "+", "++", "+++"];
const DOWN: [&str; 4] = ["", "-", "--", "---"];

/// Truncating integer mean; 0 for an empty slice.
pub fn mean(values: &[i64]) -> i64 {
    if values.is_empty() {
        return 0;
    }
    values.iter().sum::<i64>() / values.len() as i64
}

/// Symbol for `latest` against the mean of `window`.
///
/// Up tier k counts when `latest > mean * 10^k`. Down tier k counts when
/// `latest < mean / 10^(k-1)`, so any reading under the mean is at least `-`.
pub fn classify(window: &[i64], latest: i64) -> &'static str {
    if window.is_empty() {
        return "";
    }
    let m = mean(window);

    let mut up = 0;
    let mut scale: i64 = 10;
    for _ in 0..3 {
        if latest > m.saturating_mul(scale) {
            up += 1;
        }
        scale = scale.saturating_mul(10);
    }
    if up > 0 {
        return UP[up];
    }

    let mut down = 0;
    let mut scale: i64 = 1;
    for _ in 0..3 {
        if latest < m / scale {
            down += 1;
        }
        scale *= 10;
    }
    DOWN[down]
}

/// Ring of recent p99 readings owned by the aggregator.
#[derive(Debug, Clone)]
pub struct TrendWindow {
    ring: RingBuf<i64>,
}

impl Default for TrendWindow {
    fn default() -> Self {
        Self::new(TREND_WINDOW_LEN)
    }
}

impl TrendWindow {
    pub fn new(cap: usize) -> Self {
        Self {
            ring: RingBuf::with_capacity(cap),
        }
    }

    /// Classifies `latest` against the current contents, then records it.
    /// The reading never takes part in its own classification.
    pub fn observe(&mut self, latest: i64) -> &'static str {
        let symbol = classify(self.ring.as_slice(), latest);
        self.ring.push(latest);
        symbol
    }

    #[cfg(test)]
    fn readings(&self) -> &[i64] {
        self.ring.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), 0);
        assert_eq!(mean(&[10, 20, 30, 40]), 25);
        assert_eq!(mean(&[8, 6, 5, 1000]), 254);
        assert_eq!(mean(&[0, 7, 10, 9, 1_000_000]), 200_005);
    }

    #[test]
    fn test_classify_regressions() {
        let data = [0, 7, 10, 9];
        assert_eq!(classify(&data, 1_000_000), "+++");
        assert_eq!(classify(&data, 1_000), "++");
        assert_eq!(classify(&data, 100), "+");
        assert_eq!(classify(&data, 10), "");
        assert_eq!(classify(&data, 0), "-");
    }

    #[test]
    fn test_classify_improvements() {
        let data = [1_000_000; 4];
        assert_eq!(classify(&data, 1_000_000), "");
        assert_eq!(classify(&data, 100_000), "-");
        assert_eq!(classify(&data, 10_000), "--");
        assert_eq!(classify(&data, 1_000), "---");
    }

    #[test]
    fn test_classify_flat_zero() {
        assert_eq!(classify(&[0; 5], 0), "");
        assert_eq!(classify(&[], 42), "");
    }

    #[test]
    fn test_observe_classifies_before_push() {
        let mut w = TrendWindow::default();
        assert_eq!(w.observe(5), "");
        // window is [5]; 5 is not a deviation from itself
        assert_eq!(w.observe(5), "");
        assert_eq!(w.observe(5_000), "++");
        assert_eq!(w.readings(), &[5, 5, 5_000]);

        for _ in 0..10 {
            w.observe(7);
        }
        assert_eq!(w.readings().len(), TREND_WINDOW_LEN);
    }
}
