use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::network::{NetworkError, Result};

/// Ordered grid of optimization intervals, durations in hours
///
/// Interval-indexed quantities have `len()` entries; boundary-indexed
/// quantities (cumulative energy, time-varying capacity) have `len() + 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Periods {
    durations: Vec<f64>,
}

impl Periods {
    pub fn from_durations(durations: Vec<f64>) -> Result<Self> {
        if durations.is_empty() {
            return Err(NetworkError::InvalidPeriods("at least one period is required".into()));
        }
        if let Some((index, duration)) = durations
            .iter()
            .enumerate()
            .find(|(_, d)| !d.is_finite() || **d <= 0.0)
        {
            return Err(NetworkError::InvalidPeriods(format!(
                "period {index} has non-positive duration {duration}"
            )));
        }
        Ok(Self { durations })
    }

    /// Build from N+1 boundary timestamps
    pub fn from_boundaries(boundaries: &[DateTime<Utc>]) -> Result<Self> {
        if boundaries.len() < 2 {
            return Err(NetworkError::InvalidPeriods(
                "at least two boundary timestamps are required".into(),
            ));
        }
        let durations = boundaries
            .iter()
            .tuple_windows()
            .map(|(start, end)| end.signed_duration_since(*start).num_seconds() as f64 / 3600.0)
            .collect();
        Self::from_durations(durations)
    }

    /// Uniform grid, handy for tests and fixed-resolution horizons
    pub fn uniform(count: usize, hours: f64) -> Result<Self> {
        Self::from_durations(vec![hours; count])
    }

    pub fn len(&self) -> usize {
        self.durations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }

    pub fn duration(&self, t: usize) -> f64 {
        self.durations[t]
    }

    pub fn durations(&self) -> &[f64] {
        &self.durations
    }

    /// Cumulative boundaries in hours: `b[0] = 0`, `b[t+1] = b[t] + period[t]`
    pub fn boundaries(&self) -> Vec<f64> {
        std::iter::once(0.0)
            .chain(self.durations.iter().scan(0.0, |acc, d| {
                *acc += d;
                Some(*acc)
            }))
            .collect()
    }

    pub fn horizon(&self) -> f64 {
        self.durations.iter().sum()
    }
}

/// Stretch or cut `values` to `len` entries
///
/// A shorter sequence repeats its last value, a longer one is truncated.
/// An empty input yields zeros.
pub fn broadcast(values: &[f64], len: usize) -> Vec<f64> {
    match values.last() {
        None => vec![0.0; len],
        Some(last) => values
            .iter()
            .copied()
            .chain(std::iter::repeat(*last))
            .take(len)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;
    use rstest::rstest;

    #[test]
    fn test_boundaries_are_fence_posts() {
        let periods = Periods::from_durations(vec![0.5, 1.0, 0.25]).unwrap();

        assert_eq!(periods.len(), 3);
        assert_eq!(periods.boundaries(), vec![0.0, 0.5, 1.5, 1.75]);
        assert_eq!(periods.horizon(), 1.75);
    }

    #[test]
    fn test_from_boundary_timestamps() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let stamps = vec![
            start,
            start + Duration::minutes(15),
            start + Duration::minutes(75),
        ];

        let periods = Periods::from_boundaries(&stamps).unwrap();

        assert_eq!(periods.durations(), &[0.25, 1.0]);
    }

    #[rstest]
    #[case(vec![])]
    #[case(vec![1.0, 0.0])]
    #[case(vec![1.0, -0.5])]
    #[case(vec![f64::NAN])]
    fn test_invalid_durations_rejected(#[case] durations: Vec<f64>) {
        assert!(matches!(
            Periods::from_durations(durations),
            Err(NetworkError::InvalidPeriods(_))
        ));
    }

    #[rstest]
    #[case(&[2.0], 3, vec![2.0, 2.0, 2.0])]
    #[case(&[1.0, 2.0], 4, vec![1.0, 2.0, 2.0, 2.0])]
    #[case(&[1.0, 2.0, 3.0], 2, vec![1.0, 2.0])]
    #[case(&[], 2, vec![0.0, 0.0])]
    fn test_broadcast(#[case] values: &[f64], #[case] len: usize, #[case] expected: Vec<f64>) {
        assert_eq!(broadcast(values, len), expected);
    }

    proptest! {
        #[test]
        fn prop_broadcast_has_requested_length(values in prop::collection::vec(-100.0f64..100.0, 0..10), len in 0usize..20) {
            let out = broadcast(&values, len);
            prop_assert_eq!(out.len(), len);
            for (i, value) in out.iter().enumerate() {
                let expected = values.get(i).or(values.last()).copied().unwrap_or(0.0);
                prop_assert_eq!(*value, expected);
            }
        }

        #[test]
        fn prop_boundaries_accumulate(durations in prop::collection::vec(0.01f64..4.0, 1..24)) {
            let periods = Periods::from_durations(durations.clone()).unwrap();
            let boundaries = periods.boundaries();
            prop_assert_eq!(boundaries.len(), durations.len() + 1);
            prop_assert_eq!(boundaries[0], 0.0);
            for t in 0..durations.len() {
                prop_assert!((boundaries[t + 1] - boundaries[t] - durations[t]).abs() < 1e-9);
            }
        }
    }
}
