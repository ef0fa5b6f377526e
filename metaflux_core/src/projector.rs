//! Snapshot projection - maps a cursor on the simulated time axis to a sample.
//!
//! Projection uses the *ceiling* sample: the first sample whose time is
//! greater than or equal to the cursor. A cursor strictly between two samples
//! is attributed to the later one; a cursor past the last sample resolves to
//! the last sample.

use crate::result::{DynamicSimulationResult, FluxMap};
use serde::Serialize;
use std::collections::BTreeMap;

/// The state of the culture at one sample, as shown for a cursor position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// Sample index chosen by projection
    pub index: usize,

    /// Simulated time of that sample
    pub time: f64,

    pub growth_rate: f64,

    /// Reaction fluxes, absent when history was not fetched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fluxes: Option<FluxMap>,

    pub byproducts: BTreeMap<String, f64>,
}

/// Index of the first sample with `times[i] >= t`, clamped to the last sample.
///
/// Returns `None` only for an empty axis. A NaN cursor resolves to sample 0.
/// `times` must be non-decreasing; repeated values resolve to their first
/// occurrence.
pub fn ceiling_index(times: &[f64], t: f64) -> Option<usize> {
    if times.is_empty() {
        return None;
    }
    if t.is_nan() {
        return Some(0);
    }

    let i = times.partition_point(|&sample| sample < t);
    Some(i.min(times.len() - 1))
}

/// Projects `result` at `current_time`.
///
/// Pure: identical inputs always produce identical snapshots.
pub fn project(result: &DynamicSimulationResult, current_time: f64) -> Option<Snapshot> {
    let index = ceiling_index(result.time(), current_time)?;

    let byproducts = result
        .byproducts()
        .iter()
        .map(|(name, series)| (name.clone(), series[index]))
        .collect();

    Some(Snapshot {
        index,
        time: result.time()[index],
        growth_rate: result.growth_rate()[index],
        fluxes: result.flux_history().map(|history| history[index].clone()),
        byproducts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::tests::result_with_time;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_between_samples_selects_later_sample() {
        let result = result_with_time(vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        let snapshot = project(&result, 2.5).unwrap();
        assert_eq!(snapshot.index, 3);
        assert_eq!(snapshot.time, 3.0);
    }

    #[test]
    fn test_exact_sample_selects_itself() {
        let result = result_with_time(vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(project(&result, 0.0).unwrap().index, 0);
        assert_eq!(project(&result, 2.0).unwrap().index, 2);
        assert_eq!(project(&result, 4.0).unwrap().index, 4);
    }

    #[test]
    fn test_past_last_sample_uses_last_index() {
        let result = result_with_time(vec![0.0, 1.0, 2.0]);
        assert_eq!(project(&result, 99.0).unwrap().index, 2);
    }

    #[test]
    fn test_negative_and_nan_cursor_use_first_sample() {
        let result = result_with_time(vec![0.0, 1.0, 2.0]);
        assert_eq!(project(&result, -3.0).unwrap().index, 0);
        assert_eq!(project(&result, f64::NAN).unwrap().index, 0);
    }

    #[test]
    fn test_empty_result_yields_no_snapshot() {
        assert!(project(&DynamicSimulationResult::empty(), 0.0).is_none());
        assert_eq!(ceiling_index(&[], 1.0), None);
    }

    #[test]
    fn test_duplicate_times_take_first_match() {
        assert_eq!(ceiling_index(&[0.0, 1.0, 1.0, 1.0, 2.0], 1.0), Some(1));
        assert_eq!(ceiling_index(&[0.0, 1.0, 1.0, 1.0, 2.0], 0.5), Some(1));
    }

    #[test]
    fn test_snapshot_reads_parallel_series() {
        let result = result_with_time(vec![0.0, 1.0, 2.0, 3.0]);
        let snapshot = project(&result, 1.2).unwrap();

        assert_eq!(snapshot.index, 2);
        assert_relative_eq!(snapshot.growth_rate, 0.2, epsilon = 1e-12);
        assert_eq!(snapshot.byproducts["EX_ac_e"], 4.0);
        assert_eq!(snapshot.byproducts["EX_etoh_e"], 0.5);
        assert_eq!(snapshot.fluxes.as_ref().unwrap()["PFK"], 2.0);
    }

    #[test]
    fn test_snapshot_without_history_has_no_fluxes() {
        let result = result_with_time(vec![0.0, 1.0]).without_flux_history();
        assert!(project(&result, 0.5).unwrap().fluxes.is_none());
    }

    fn time_axis() -> impl Strategy<Value = Vec<f64>> {
        prop::collection::vec(0.0f64..5.0, 0..40).prop_map(|steps| {
            let mut t = 0.0;
            let mut axis = vec![0.0];
            for step in steps {
                t += step;
                axis.push(t);
            }
            axis
        })
    }

    proptest! {
        #[test]
        fn prop_index_always_in_bounds(axis in time_axis(), t in -10.0f64..300.0) {
            let result = result_with_time(axis.clone());
            let snapshot = project(&result, t).unwrap();
            prop_assert!(snapshot.index < axis.len());
        }

        #[test]
        fn prop_index_is_first_ceiling(axis in time_axis(), t in 0.0f64..300.0) {
            let i = ceiling_index(&axis, t).unwrap();
            let last = axis.len() - 1;
            if axis[last] >= t {
                prop_assert!(axis[i] >= t);
                prop_assert!(i == 0 || axis[i - 1] < t);
            } else {
                prop_assert_eq!(i, last);
            }
        }

        #[test]
        fn prop_zero_projects_to_first_sample(axis in time_axis()) {
            prop_assert_eq!(ceiling_index(&axis, 0.0), Some(0));
        }

        #[test]
        fn prop_projection_is_deterministic(axis in time_axis(), t in 0.0f64..300.0) {
            let result = result_with_time(axis);
            prop_assert_eq!(project(&result, t), project(&result, t));
        }
    }
}
