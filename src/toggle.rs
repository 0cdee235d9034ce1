//! Per-cycle toggle accounting.

use indexmap::IndexSet;
use serde::{ Serialize, Deserialize };

/// The toggle count of one finalized cycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleDataPoint {
    pub cycle: u32,
    pub count: u32,
}

/// Accumulates Hamming distances per cycle and emits a point for
/// every finalized cycle whose total reaches the threshold.
///
/// A cycle is finalized when a strictly larger cycle index is seen,
/// so the last cycle of a trace is only emitted by
/// [`Aggregator::finish`] with `flush` set.
#[derive(Debug, Clone)]
pub struct Aggregator {
    threshold: u64,
    /// The running cycle, `None` before the first one starts.
    current: Option<u64>,
    /// The cycle index most recently observed.
    candidate: u64,
    pending_hamming: u64,
    /// Number of bits compared in the running cycle.
    pending_bits: u64,
    report_cycles: IndexSet<u64>,
    reporting: bool,
    points: Vec<ToggleDataPoint>,
}

#[inline]
fn saturate(x: u64) -> u32 {
    u32::try_from(x).unwrap_or(u32::MAX)
}

impl Aggregator {
    pub fn new(threshold: u64, report_cycles: IndexSet<u64>) -> Aggregator {
        Aggregator {
            threshold,
            current: None,
            candidate: 0,
            pending_hamming: 0,
            pending_bits: 0,
            report_cycles,
            reporting: false,
            points: Vec::with_capacity(1000),
        }
    }

    /// Account for one update of `bits` bits, `distance` of them changed.
    #[inline]
    pub fn add(&mut self, distance: u64, bits: u64) {
        self.pending_hamming += distance;
        self.pending_bits += bits;
    }

    #[inline]
    pub fn set_candidate(&mut self, cycle: u64) {
        self.candidate = cycle;
    }

    /// Start a new cycle if the candidate moved past the running one,
    /// finalizing the running one.
    ///
    /// Returns the emitted point, if any.
    pub fn advance(&mut self) -> Option<ToggleDataPoint> {
        if self.current.is_some_and(|c| self.candidate <= c) {
            return None;
        }
        let point = self.finalize();
        self.current = Some(self.candidate);
        self.reporting = self.report_cycles.contains(&self.candidate);
        point
    }

    fn finalize(&mut self) -> Option<ToggleDataPoint> {
        let point = match self.current {
            Some(cycle) if self.pending_hamming >= self.threshold => {
                clilog::debug!(
                    "cycle {}: {} toggles in {} bits",
                    cycle, self.pending_hamming, self.pending_bits
                );
                let p = ToggleDataPoint {
                    cycle: saturate(cycle),
                    count: saturate(self.pending_hamming),
                };
                self.points.push(p);
                Some(p)
            }
            _ => None,
        };
        self.pending_hamming = 0;
        self.pending_bits = 0;
        point
    }

    /// Whether per-signal diffs of the running cycle are reported.
    #[inline]
    pub fn is_reporting(&self) -> bool {
        self.reporting
    }

    #[inline]
    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    #[inline]
    pub fn current(&self) -> Option<u64> {
        self.current
    }

    #[inline]
    pub fn pending(&self) -> u64 {
        self.pending_hamming
    }

    #[inline]
    pub fn pending_bits(&self) -> u64 {
        self.pending_bits
    }

    #[inline]
    pub fn points(&self) -> &[ToggleDataPoint] {
        &self.points
    }

    /// Stop accounting. With `flush`, the running cycle is finalized
    /// as if a later cycle had been seen.
    pub fn finish(mut self, flush: bool) -> Vec<ToggleDataPoint> {
        if flush {
            self.finalize();
        }
        self.points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(cycle: u32, count: u32) -> ToggleDataPoint {
        ToggleDataPoint { cycle, count }
    }

    #[test]
    fn test_first_cycle_starts_without_point() {
        let mut agg = Aggregator::new(0, IndexSet::new());
        assert_eq!(agg.current(), None);
        assert_eq!(agg.advance(), None);
        assert_eq!(agg.current(), Some(0));
        // no advance on an equal or smaller candidate
        agg.add(3, 4);
        assert_eq!(agg.advance(), None);
        assert_eq!(agg.pending(), 3);
        assert_eq!(agg.pending_bits(), 4);
    }

    #[test]
    fn test_threshold_boundary() {
        let mut agg = Aggregator::new(3, IndexSet::new());
        agg.advance();
        agg.add(3, 8);
        agg.set_candidate(1);
        assert_eq!(agg.advance(), Some(point(0, 3)));
        agg.add(2, 8);
        agg.set_candidate(2);
        assert_eq!(agg.advance(), None);
        // the below-threshold total does not carry over
        assert_eq!(agg.pending(), 0);
        agg.add(1, 1);
        agg.set_candidate(3);
        assert_eq!(agg.advance(), None);
        assert_eq!(agg.finish(false), [point(0, 3)]);
    }

    #[test]
    fn test_going_backwards_stays_in_cycle() {
        let mut agg = Aggregator::new(1, IndexSet::new());
        agg.set_candidate(5);
        agg.advance();
        agg.add(1, 1);
        agg.set_candidate(2);
        assert_eq!(agg.advance(), None);
        agg.add(1, 1);
        assert_eq!(agg.current(), Some(5));
        agg.set_candidate(7);
        assert_eq!(agg.advance(), Some(point(5, 2)));
    }

    #[test]
    fn test_trailing_cycle() {
        let mut agg = Aggregator::new(1, IndexSet::new());
        agg.advance();
        agg.add(4, 4);
        assert!(agg.clone().finish(false).is_empty());
        assert_eq!(agg.finish(true), [point(0, 4)]);
    }

    #[test]
    fn test_report_cycles() {
        let mut agg = Aggregator::new(1, [2, 4].into_iter().collect());
        agg.advance();
        assert!(!agg.is_reporting());
        agg.set_candidate(2);
        agg.advance();
        assert!(agg.is_reporting());
        agg.set_candidate(3);
        agg.advance();
        assert!(!agg.is_reporting());
    }

    #[test]
    fn test_counts_saturate() {
        let mut agg = Aggregator::new(1, IndexSet::new());
        agg.set_candidate(u64::MAX);
        agg.advance();
        agg.add(u32::MAX as u64 + 7, 1);
        assert_eq!(agg.finish(true), [point(u32::MAX, u32::MAX)]);
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn pending_grows_until_finalized(
            ops in prop::collection::vec((0u64..16, prop::bool::ANY), 0..64)
        ) {
            let mut agg = Aggregator::new(4, IndexSet::new());
            agg.advance();
            let mut cycle = 0;
            for (d, next) in ops {
                let before = agg.pending();
                if next {
                    cycle += 1;
                    agg.set_candidate(cycle);
                    let p = agg.advance();
                    prop_assert_eq!(agg.pending(), 0);
                    prop_assert_eq!(p.map(|p| p.count as u64), (before >= 4).then_some(before));
                } else {
                    agg.add(d, d);
                    prop_assert!(agg.pending() >= before);
                }
            }
        }
    }
}
