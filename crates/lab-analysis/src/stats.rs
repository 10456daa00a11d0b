//! Median with a distribution-free 95% confidence interval.

use std::cmp::Ordering;

use serde::Serialize;

/// Table sizes below this use the precomputed ranks.
const TABLE_LIMIT: usize = 71;

/// (low, high) 1-based ranks of the 95% confidence interval for the median,
/// indexed by sample size. Entry 0 is unused; no interval exists below n = 6.
const CONFIDENCE_RANKS: [(usize, usize); TABLE_LIMIT] = [
    (0, 0),
    (1, 1),
    (1, 1),
    (1, 1),
    (2, 2),
    (2, 2),
    (1, 6),
    (1, 7),
    (1, 7),
    (2, 8),
    (2, 9),
    (2, 10),
    (3, 10),
    (3, 11),
    (3, 11),
    (4, 12),
    (4, 12),
    (5, 13),
    (5, 14),
    (5, 15),
    (6, 15),
    (6, 16),
    (6, 16),
    (7, 17),
    (7, 17),
    (8, 18),
    (8, 19),
    (8, 20),
    (9, 20),
    (9, 21),
    (10, 21),
    (10, 22),
    (10, 22),
    (11, 23),
    (11, 23),
    (12, 24),
    (12, 24),
    (13, 25),
    (13, 26),
    (13, 27),
    (14, 27),
    (14, 28),
    (15, 28),
    (15, 29),
    (16, 29),
    (16, 30),
    (16, 30),
    (17, 31),
    (17, 31),
    (18, 32),
    (18, 32),
    (19, 33),
    (19, 34),
    (19, 35),
    (20, 35),
    (20, 36),
    (21, 36),
    (21, 37),
    (22, 37),
    (22, 38),
    (23, 39),
    (23, 39),
    (24, 40),
    (24, 40),
    (24, 40),
    (25, 41),
    (25, 41),
    (26, 42),
    (26, 43),
    (26, 44),
    (27, 44),
];

/// Returns the 1-based (low, high) ranks bounding the median, or `None` for
/// an empty sample.
pub fn confidence_ranks(n: usize) -> Option<(usize, usize)> {
    match n {
        0 => None,
        n if n < TABLE_LIMIT => Some(CONFIDENCE_RANKS[n]),
        n => {
            let half = n as f64 / 2.0;
            let spread = 0.980 * (n as f64).sqrt();
            let low = (half - spread).floor() as usize;
            let high = (half + 1.0 + spread).ceil() as usize;
            Some((low, high.min(n)))
        }
    }
}

/// 1-based rank of the median.
pub fn median_rank(n: usize) -> usize {
    (n / 2).max(1)
}

/// One measurement; a timed-out run ranks above every finished run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timed_out: bool,
    pub value: f64,
}

impl Sample {
    pub fn finished(value: f64) -> Self {
        Sample {
            timed_out: false,
            value,
        }
    }

    pub fn timeout(value: f64) -> Self {
        Sample {
            timed_out: true,
            value,
        }
    }

    fn rank_cmp(&self, other: &Self) -> Ordering {
        self.timed_out
            .cmp(&other.timed_out)
            .then(self.value.total_cmp(&other.value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LowMedHigh {
    pub low: f64,
    pub median: f64,
    pub high: f64,
}

impl LowMedHigh {
    pub fn nan() -> Self {
        LowMedHigh {
            low: f64::NAN,
            median: f64::NAN,
            high: f64::NAN,
        }
    }

    pub fn is_nan(&self) -> bool {
        self.median.is_nan()
    }

    /// Length of the confidence half-interval below the median.
    pub fn below(&self) -> f64 {
        self.median - self.low
    }

    pub fn above(&self) -> f64 {
        self.high - self.median
    }
}

/// Median and confidence bounds of one (algorithm, x value) bucket.
///
/// If the sample at the median rank is a timeout the whole triple is NaN:
/// timeouts dominate and there is no meaningful central tendency.
pub fn low_med_high(samples: &[Sample]) -> Option<LowMedHigh> {
    let n = samples.len();
    let (low, high) = confidence_ranks(n)?;
    let mut sorted = samples.to_vec();
    sorted.sort_by(Sample::rank_cmp);
    let med = &sorted[median_rank(n) - 1];
    if med.timed_out {
        return Some(LowMedHigh::nan());
    }
    Some(LowMedHigh {
        low: sorted[low - 1].value,
        median: med.value,
        high: sorted[high - 1].value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finished(values: &[f64]) -> Vec<Sample> {
        values.iter().map(|v| Sample::finished(*v)).collect()
    }

    #[test]
    fn table_matches_known_sizes() {
        assert_eq!(confidence_ranks(0), None);
        assert_eq!(confidence_ranks(1), Some((1, 1)));
        assert_eq!(confidence_ranks(5), Some((2, 2)));
        assert_eq!(confidence_ranks(6), Some((1, 6)));
        assert_eq!(confidence_ranks(12), Some((3, 10)));
        assert_eq!(confidence_ranks(64), Some((24, 40)));
        assert_eq!(confidence_ranks(70), Some((27, 44)));
    }

    #[test]
    fn table_ranks_are_ordered_and_in_range() {
        for n in 1..200 {
            let (low, high) = confidence_ranks(n).expect("ranks");
            let med = median_rank(n);
            assert!(low >= 1 && low <= med, "n={} low={} med={}", n, low, med);
            assert!(high >= med && high <= n, "n={} high={} med={}", n, high, med);
        }
    }

    #[test]
    fn large_samples_use_normal_approximation() {
        // 50 - 0.98 * 10 = 40.2 ; 51 + 9.8 = 60.8
        assert_eq!(confidence_ranks(100), Some((40, 61)));
        assert_eq!(confidence_ranks(71), Some((27, 45)));
    }

    #[test]
    fn six_samples_fixture() {
        let samples = finished(&[13.0, 2.0, 7.0, 5.0, 11.0, 3.0]);
        let lmh = low_med_high(&samples).expect("lmh");
        assert_eq!(
            lmh,
            LowMedHigh {
                low: 2.0,
                median: 5.0,
                high: 13.0
            }
        );
        assert_eq!(lmh.below(), 3.0);
        assert_eq!(lmh.above(), 8.0);
    }

    #[test]
    fn single_sample_is_degenerate_interval() {
        let lmh = low_med_high(&finished(&[4.5])).expect("lmh");
        assert_eq!((lmh.low, lmh.median, lmh.high), (4.5, 4.5, 4.5));
        assert!(low_med_high(&[]).is_none());
    }

    #[test]
    fn timeout_at_median_yields_nan_triple() {
        let samples = vec![
            Sample::finished(1.0),
            Sample::timeout(0.5),
            Sample::timeout(0.1),
            Sample::finished(2.0),
            Sample::timeout(0.2),
            Sample::timeout(0.3),
        ];
        let lmh = low_med_high(&samples).expect("lmh");
        assert!(lmh.low.is_nan() && lmh.median.is_nan() && lmh.high.is_nan());
        assert!(lmh.is_nan());
    }

    #[test]
    fn timeouts_rank_above_finished_runs() {
        // Sorted: 1, 2, 3, 4, T(0.1), T(0.2); median rank 3 -> 3.
        let samples = vec![
            Sample::timeout(0.1),
            Sample::finished(4.0),
            Sample::finished(1.0),
            Sample::timeout(0.2),
            Sample::finished(3.0),
            Sample::finished(2.0),
        ];
        let lmh = low_med_high(&samples).expect("lmh");
        assert_eq!(lmh.median, 3.0);
        assert_eq!(lmh.low, 1.0);
        assert_eq!(lmh.high, 0.2);
    }
}
