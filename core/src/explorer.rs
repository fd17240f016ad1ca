#![deny(missing_docs)]

//! # Domain Explorer
//!
//! Binary search for the real bound of a numeric parameter, driven by a live
//! pass/fail attempt. Each attempt is one request replay, so the number of attempts
//! is capped.

/// Default cap on attempts per search.
pub const DEFAULT_MAX_ITERATIONS: usize = 70;

/// Searches the signed 64-bit range for the largest (or smallest) accepted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainExplorer {
    max_iterations: usize,
}

impl Default for DomainExplorer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ITERATIONS)
    }
}

impl DomainExplorer {
    /// Creates an explorer with an attempt cap.
    pub fn new(max_iterations: usize) -> Self {
        Self { max_iterations }
    }

    /// The attempt cap.
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Largest value accepted by `accepts`, searching upwards from `start`.
    ///
    /// `None` when `start` itself is rejected, when the cap is reached before
    /// the search converges, or when the bound is `i64::MAX` (unconstrained).
    pub fn find_maximum(&self, start: i64, mut accepts: impl FnMut(i64) -> bool) -> Option<i64> {
        if !accepts(start) {
            tracing::debug!(start, "seed value rejected, no maximum to explore");
            return None;
        }
        let mut best = start;
        let mut lower = start.checked_add(1)?;
        let mut upper = i64::MAX;
        let mut iterations = 0;

        while lower <= upper {
            if iterations == self.max_iterations {
                tracing::debug!(best, "iteration cap reached while exploring maximum");
                return None;
            }
            iterations += 1;
            let candidate = midpoint(lower, upper);
            if accepts(candidate) {
                best = candidate;
                match candidate.checked_add(1) {
                    Some(next) => lower = next,
                    None => break,
                }
            } else {
                // candidate > start >= i64::MIN, so this cannot underflow.
                upper = candidate - 1;
            }
        }

        if best == i64::MAX {
            None
        } else {
            tracing::debug!(best, iterations, "explored maximum");
            Some(best)
        }
    }

    /// Smallest value accepted by `accepts`, searching downwards from `start`.
    pub fn find_minimum(&self, start: i64, mut accepts: impl FnMut(i64) -> bool) -> Option<i64> {
        if !accepts(start) {
            tracing::debug!(start, "seed value rejected, no minimum to explore");
            return None;
        }
        let mut best = start;
        let mut upper = start.checked_sub(1)?;
        let mut lower = i64::MIN;
        let mut iterations = 0;

        while lower <= upper {
            if iterations == self.max_iterations {
                tracing::debug!(best, "iteration cap reached while exploring minimum");
                return None;
            }
            iterations += 1;
            let candidate = midpoint(lower, upper);
            if accepts(candidate) {
                best = candidate;
                match candidate.checked_sub(1) {
                    Some(next) => upper = next,
                    None => break,
                }
            } else {
                lower = candidate + 1;
            }
        }

        if best == i64::MIN {
            None
        } else {
            tracing::debug!(best, iterations, "explored minimum");
            Some(best)
        }
    }
}

/// Midpoint of `[lower, upper]` without overflow.
fn midpoint(lower: i64, upper: i64) -> i64 {
    if (lower < 0) != (upper < 0) {
        (lower + upper) / 2
    } else {
        lower + (upper - lower) / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_finds_maximum() {
        let explorer = DomainExplorer::default();
        assert_eq!(explorer.find_maximum(10, |v| v <= 42), Some(42));
        assert_eq!(explorer.find_maximum(42, |v| v <= 42), Some(42));
    }

    #[test]
    fn test_rejected_seed_yields_none() {
        let explorer = DomainExplorer::default();
        assert_eq!(explorer.find_maximum(10, |_| false), None);
        assert_eq!(explorer.find_minimum(10, |_| false), None);
    }

    #[test]
    fn test_unbounded_yields_none() {
        let explorer = DomainExplorer::default();
        assert_eq!(explorer.find_maximum(0, |_| true), None);
        assert_eq!(explorer.find_minimum(0, |_| true), None);
        assert_eq!(explorer.find_maximum(i64::MAX, |_| true), None);
    }

    #[test]
    fn test_finds_minimum_across_zero() {
        let explorer = DomainExplorer::default();
        assert_eq!(explorer.find_minimum(10, |v| v >= -7), Some(-7));
        assert_eq!(explorer.find_minimum(-3, |v| v >= -3), Some(-3));
    }

    #[test]
    fn test_cap_yields_none() {
        let explorer = DomainExplorer::new(5);
        assert_eq!(explorer.find_maximum(0, |v| v <= 1_000_000), None);
    }

    #[test]
    fn test_probe_count_is_capped() {
        let explorer = DomainExplorer::default();
        let mut attempts = 0;
        explorer.find_maximum(0, |v| {
            attempts += 1;
            v <= 123_456_789
        });
        assert!(attempts <= DEFAULT_MAX_ITERATIONS + 1);
    }

    proptest! {
        #[test]
        fn prop_maximum_matches_threshold(start in -1_000_000i64..1_000_000, offset in 0i64..1_000_000_000_000) {
            let bound = start + offset;
            let explorer = DomainExplorer::default();
            prop_assert_eq!(explorer.find_maximum(start, |v| v <= bound), Some(bound));
        }

        #[test]
        fn prop_minimum_matches_threshold(start in -1_000_000i64..1_000_000, offset in 0i64..1_000_000_000_000) {
            let bound = start - offset;
            let explorer = DomainExplorer::default();
            prop_assert_eq!(explorer.find_minimum(start, |v| v >= bound), Some(bound));
        }
    }
}
