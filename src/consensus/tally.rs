//! Per-code agreement tally.

use std::collections::{BTreeMap, HashMap};

/// Default number of agreeing reads required to confirm a code.
pub const DEFAULT_THRESHOLD: u32 = 3;

/// Outcome of a single observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The code has been seen `count` times; `threshold` are required.
    Accumulating { count: u32, threshold: u32 },
    /// The code reached the threshold.
    Confirmed(String),
}

impl Verdict {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Verdict::Confirmed(_))
    }

    /// Progress towards confirmation in `0.0..=1.0`.
    pub fn progress(&self) -> f32 {
        match self {
            Verdict::Accumulating { count, threshold } => {
                (*count as f32 / (*threshold).max(1) as f32).min(1.0)
            }
            Verdict::Confirmed(_) => 1.0,
        }
    }
}

/// Accumulates reads per decoded code within one scan session.
///
/// Each code's count is independent: reading a different code never
/// resets another code's progress, so an intermittent misread does not
/// penalize the true code.
#[derive(Debug, Clone)]
pub struct ConsensusTally {
    threshold: u32,
    counts: HashMap<String, u32>,
    observations: u64,
}

impl ConsensusTally {
    /// Creates a tally confirming after `threshold` reads (minimum 1).
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            counts: HashMap::new(),
            observations: 0,
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Records one read of `code`.
    pub fn observe(&mut self, code: &str) -> Verdict {
        self.observations += 1;
        let count = self.counts.entry(code.to_string()).or_insert(0);
        *count += 1;

        if *count >= self.threshold {
            tracing::debug!(code, count = *count, "Code confirmed");
            Verdict::Confirmed(code.to_string())
        } else {
            tracing::trace!(code, count = *count, threshold = self.threshold, "Code accumulating");
            Verdict::Accumulating {
                count: *count,
                threshold: self.threshold,
            }
        }
    }

    /// Current count for `code`.
    pub fn count(&self, code: &str) -> u32 {
        self.counts.get(code).copied().unwrap_or(0)
    }

    /// Sorted copy of every tally.
    pub fn snapshot(&self) -> BTreeMap<String, u32> {
        self.counts
            .iter()
            .map(|(code, count)| (code.clone(), *count))
            .collect()
    }

    /// Total reads observed since the last reset.
    pub fn observations(&self) -> u64 {
        self.observations
    }

    /// Clears every tally.
    pub fn reset(&mut self) {
        self.counts.clear();
        self.observations = 0;
    }
}

impl Default for ConsensusTally {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tallies(pairs: &[(&str, u32)]) -> BTreeMap<String, u32> {
        pairs.iter().map(|(c, n)| (c.to_string(), *n)).collect()
    }

    #[test]
    fn test_interleaved_misread_keeps_progress() {
        let mut tally = ConsensusTally::new(3);

        assert_eq!(
            tally.observe("111"),
            Verdict::Accumulating { count: 1, threshold: 3 }
        );
        assert_eq!(tally.snapshot(), tallies(&[("111", 1)]));

        tally.observe("111");
        assert_eq!(tally.snapshot(), tallies(&[("111", 2)]));

        tally.observe("222");
        assert_eq!(tally.snapshot(), tallies(&[("111", 2), ("222", 1)]));

        assert_eq!(tally.observe("111"), Verdict::Confirmed("111".into()));
        assert_eq!(tally.count("111"), 3);
    }

    #[test]
    fn test_threshold_one_confirms_first_read() {
        let mut tally = ConsensusTally::new(1);
        assert_eq!(tally.observe("5901234123457"), Verdict::Confirmed("5901234123457".into()));
    }

    #[test]
    fn test_zero_threshold_clamped() {
        assert_eq!(ConsensusTally::new(0).threshold(), 1);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut tally = ConsensusTally::default();
        tally.observe("111");
        tally.observe("222");
        tally.reset();

        assert!(tally.snapshot().is_empty());
        assert_eq!(tally.observations(), 0);
        assert_eq!(tally.count("111"), 0);
    }

    #[test]
    fn test_progress() {
        assert_eq!(Verdict::Accumulating { count: 1, threshold: 4 }.progress(), 0.25);
        assert_eq!(Verdict::Confirmed("x".into()).progress(), 1.0);
    }
}
