//! Onset Decision Rule

use serde::{Deserialize, Serialize};

use crate::OnsetError;

/// Onset decision rule over per-repetition hits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnsetRule {
    /// Hits required
    pub m: usize,
    /// Trailing window length for the M-of-N vote
    pub n: usize,
    /// `true`: at least `m` hits among the last `n` reps;
    /// `false`: `m` consecutive hits
    pub m_of_n: bool,
}

impl Default for OnsetRule {
    fn default() -> Self {
        Self {
            m: 2,
            n: 3,
            m_of_n: true,
        }
    }
}

impl OnsetRule {
    /// M-of-N voting rule
    pub fn m_of_n(m: usize, n: usize) -> Self {
        Self { m, n, m_of_n: true }
    }

    /// Run of `m` consecutive hits
    pub fn consecutive(m: usize) -> Self {
        Self {
            m,
            n: m,
            m_of_n: false,
        }
    }

    /// Check parameter ranges
    pub fn validate(&self) -> Result<(), OnsetError> {
        if self.m == 0 {
            return Err(OnsetError::InvalidRule("m must be at least 1".to_string()));
        }
        if self.m_of_n && self.n < self.m {
            return Err(OnsetError::InvalidRule(format!(
                "n ({}) must be at least m ({})",
                self.n, self.m
            )));
        }
        Ok(())
    }

    /// Position (0-based) of the repetition at which onset is declared.
    ///
    /// M-of-N declares at the repetition that completes the vote; the
    /// consecutive rule declares at the first repetition of the run.
    pub fn detect(&self, hits: &[bool]) -> Option<usize> {
        if self.m == 0 {
            return None;
        }
        if self.m_of_n {
            (0..hits.len()).find(|&k| {
                let from = (k + 1).saturating_sub(self.n);
                hits[from..=k].iter().filter(|&&h| h).count() >= self.m
            })
        } else {
            let mut run = 0;
            for (k, &hit) in hits.iter().enumerate() {
                run = if hit { run + 1 } else { 0 };
                if run >= self.m {
                    return Some(k + 1 - self.m);
                }
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn hits(bits: &[u8]) -> Vec<bool> {
        bits.iter().map(|&b| b == 1).collect()
    }

    #[test]
    fn test_m_of_n_vote() {
        let rule = OnsetRule::m_of_n(2, 3);
        // Reps 1..3 = 0,1,1 already hold two hits
        assert_eq!(rule.detect(&hits(&[0, 1, 1, 0, 1, 1, 1])), Some(2));
        // Tolerates one miss inside the window
        assert_eq!(rule.detect(&hits(&[1, 0, 1, 0, 0])), Some(2));
        assert_eq!(rule.detect(&hits(&[1, 0, 0, 1, 0, 0, 1])), None);
    }

    #[test]
    fn test_m_of_n_clipped_at_start() {
        let rule = OnsetRule::m_of_n(2, 5);
        assert_eq!(rule.detect(&hits(&[1, 1, 0])), Some(1));
        assert_eq!(rule.detect(&hits(&[1])), None);
    }

    #[test]
    fn test_consecutive_run() {
        let rule = OnsetRule::consecutive(2);
        assert_eq!(rule.detect(&hits(&[0, 1, 1, 0, 1, 1, 1])), Some(1));
        assert_eq!(rule.detect(&hits(&[1, 0, 1, 0, 1])), None);
        assert_eq!(OnsetRule::consecutive(3).detect(&hits(&[0, 1, 1, 0, 1, 1, 1])), Some(4));
    }

    #[test]
    fn test_no_hits() {
        assert_eq!(OnsetRule::default().detect(&[]), None);
        assert_eq!(OnsetRule::default().detect(&[false; 6]), None);
    }

    #[test]
    fn test_validate() {
        assert!(OnsetRule::default().validate().is_ok());
        assert!(OnsetRule::m_of_n(4, 3).validate().is_err());
        assert!(OnsetRule::consecutive(0).validate().is_err());
        // n is unused by the consecutive rule
        assert!(OnsetRule { m: 3, n: 1, m_of_n: false }.validate().is_ok());
    }

    proptest! {
        #[test]
        fn prop_consecutive_implies_m_of_n(bits in prop::collection::vec(any::<bool>(), 0..40), m in 1usize..4) {
            // A run of m hits always satisfies m-of-m no later than the run ends
            let run_start = OnsetRule::consecutive(m).detect(&bits);
            let vote = OnsetRule::m_of_n(m, m).detect(&bits);
            prop_assert_eq!(run_start.map(|k| k + m - 1), vote);
        }
    }
}
