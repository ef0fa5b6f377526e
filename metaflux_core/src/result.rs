//! Dynamic simulation result - the validated, immutable time series.
//!
//! Responses are checked here before anything downstream sees them: every
//! parallel series must share the length of the time axis, and the time axis
//! itself must start at zero and never go backwards.

use metaflux_env::{DynamicSimulationResponse, EnvError, ToxicityAlert};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Reasons a response body is rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResultError {
    /// A parallel series does not match the time axis
    #[error("series `{series}` has {actual} samples, expected {expected}")]
    LengthMismatch {
        series: String,
        expected: usize,
        actual: usize,
    },

    /// The time axis violates its ordering rules
    #[error("invalid time axis: {0}")]
    InvalidTimeAxis(String),

    /// A toxicity alert cannot be placed on the time axis
    #[error("invalid toxicity alert #{index}: {reason}")]
    InvalidAlert { index: usize, reason: String },
}

impl From<ResultError> for EnvError {
    fn from(err: ResultError) -> Self {
        EnvError::malformed(err.to_string())
    }
}

/// A byproduct threshold crossing at a simulated time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToxicityEvent {
    /// Simulated hours; not necessarily a member of the time axis
    pub time: f64,
    pub byproduct: String,
    /// Concentration in the medium at the crossing, mmol/L
    pub concentration: f64,
}

impl From<ToxicityAlert> for ToxicityEvent {
    fn from(alert: ToxicityAlert) -> Self {
        Self {
            time: alert.time,
            byproduct: alert.byproduct,
            concentration: alert.concentration,
        }
    }
}

/// Per-sample reaction fluxes keyed by reaction id.
pub type FluxMap = BTreeMap<String, f64>;

/// A validated dynamic simulation trajectory.
///
/// All series share the length of [`time`](Self::time). An empty time axis
/// is a legal "no data" result.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DynamicSimulationResult {
    time: Vec<f64>,
    biomass: Vec<f64>,
    glucose: Vec<f64>,
    growth_rate: Vec<f64>,
    byproducts: BTreeMap<String, Vec<f64>>,
    flux_history: Option<Vec<FluxMap>>,
    toxicity_events: Vec<ToxicityEvent>,
}

impl DynamicSimulationResult {
    /// Validates a decoded service response.
    pub fn from_response(response: DynamicSimulationResponse) -> Result<Self, ResultError> {
        let DynamicSimulationResponse {
            time,
            biomass,
            glucose,
            growth_rates,
            byproducts,
            flux_history,
            toxicity_alerts,
        } = response;

        validate_time_axis(&time)?;
        let n = time.len();

        check_len("biomass", n, biomass.len())?;
        check_len("glucose", n, glucose.len())?;
        check_len("growth_rates", n, growth_rates.len())?;
        for (name, series) in &byproducts {
            check_len(&format!("byproducts.{}", name), n, series.len())?;
        }

        // The service sends `[]` when history was not requested.
        let flux_history = match flux_history {
            Some(history) if history.is_empty() && n > 0 => None,
            Some(history) => {
                check_len("flux_history", n, history.len())?;
                Some(history)
            }
            None => None,
        };

        let mut toxicity_events = Vec::with_capacity(toxicity_alerts.len());
        for (index, alert) in toxicity_alerts.into_iter().enumerate() {
            if !alert.time.is_finite() || alert.time < 0.0 {
                return Err(ResultError::InvalidAlert {
                    index,
                    reason: format!("time {} is not a non-negative number", alert.time),
                });
            }
            if !alert.concentration.is_finite() {
                return Err(ResultError::InvalidAlert {
                    index,
                    reason: "concentration is not finite".to_string(),
                });
            }
            toxicity_events.push(ToxicityEvent::from(alert));
        }

        Ok(Self {
            time,
            biomass,
            glucose,
            growth_rate: growth_rates,
            byproducts,
            flux_history,
            toxicity_events,
        })
    }

    /// Returns an empty "no data" result.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Drops the flux history, as on the reduced-fidelity path.
    pub fn without_flux_history(mut self) -> Self {
        self.flux_history = None;
        self
    }

    /// Number of samples on the time axis.
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// Returns true when the result carries no samples.
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn biomass(&self) -> &[f64] {
        &self.biomass
    }

    pub fn glucose(&self) -> &[f64] {
        &self.glucose
    }

    pub fn growth_rate(&self) -> &[f64] {
        &self.growth_rate
    }

    /// Byproduct series keyed by exchange reaction id, ordered by name.
    pub fn byproducts(&self) -> &BTreeMap<String, Vec<f64>> {
        &self.byproducts
    }

    /// Per-sample flux snapshots, absent on the reduced-fidelity path.
    pub fn flux_history(&self) -> Option<&[FluxMap]> {
        self.flux_history.as_deref()
    }

    pub fn has_flux_history(&self) -> bool {
        self.flux_history.is_some()
    }

    pub fn toxicity_events(&self) -> &[ToxicityEvent] {
        &self.toxicity_events
    }

    /// Time of the last sample, if any.
    pub fn last_time(&self) -> Option<f64> {
        self.time.last().copied()
    }
}

impl TryFrom<DynamicSimulationResponse> for DynamicSimulationResult {
    type Error = ResultError;

    fn try_from(response: DynamicSimulationResponse) -> Result<Self, Self::Error> {
        Self::from_response(response)
    }
}

fn check_len(series: &str, expected: usize, actual: usize) -> Result<(), ResultError> {
    if expected != actual {
        return Err(ResultError::LengthMismatch {
            series: series.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

/// Time must be finite, start at 0 and be non-decreasing.
///
/// Repeated values are tolerated (the service rounds to two decimals); the
/// projector resolves them to the first occurrence.
fn validate_time_axis(time: &[f64]) -> Result<(), ResultError> {
    let Some(&first) = time.first() else {
        return Ok(());
    };

    if first != 0.0 {
        return Err(ResultError::InvalidTimeAxis(format!(
            "first sample is {}, expected 0",
            first
        )));
    }

    for (i, pair) in time.windows(2).enumerate() {
        let (prev, next) = (pair[0], pair[1]);
        if !next.is_finite() {
            return Err(ResultError::InvalidTimeAxis(format!(
                "sample {} is not finite",
                i + 1
            )));
        }
        if next < prev {
            return Err(ResultError::InvalidTimeAxis(format!(
                "sample {} ({}) precedes sample {} ({})",
                i + 1,
                next,
                i,
                prev
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds a response with flat series over the given time axis.
    pub(crate) fn response_with_time(time: Vec<f64>) -> DynamicSimulationResponse {
        let n = time.len();
        let mut byproducts = BTreeMap::new();
        byproducts.insert("EX_ac_e".to_string(), (0..n).map(|i| i as f64 * 2.0).collect());
        byproducts.insert("EX_etoh_e".to_string(), vec![0.5; n]);

        DynamicSimulationResponse {
            biomass: (0..n).map(|i| 0.01 * (i + 1) as f64).collect(),
            glucose: (0..n).map(|i| 20.0 - i as f64).collect(),
            growth_rates: (0..n).map(|i| 0.1 * i as f64).collect(),
            byproducts,
            flux_history: Some(
                (0..n)
                    .map(|i| {
                        let mut fluxes = FluxMap::new();
                        fluxes.insert("PFK".to_string(), i as f64);
                        fluxes
                    })
                    .collect(),
            ),
            toxicity_alerts: Vec::new(),
            time,
        }
    }

    pub(crate) fn result_with_time(time: Vec<f64>) -> DynamicSimulationResult {
        DynamicSimulationResult::from_response(response_with_time(time)).unwrap()
    }

    #[test]
    fn test_valid_response_accepted() {
        let result = result_with_time(vec![0.0, 1.0, 2.0]);
        assert_eq!(result.len(), 3);
        assert!(result.has_flux_history());
        assert_eq!(result.last_time(), Some(2.0));
        assert_eq!(result.byproducts().len(), 2);
    }

    #[test]
    fn test_empty_result_is_valid() {
        let mut response = response_with_time(vec![]);
        response.flux_history = None;
        let result = DynamicSimulationResult::from_response(response).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.last_time(), None);
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let mut response = response_with_time(vec![0.0, 1.0, 2.0]);
        response.glucose.pop();
        let err = DynamicSimulationResult::from_response(response).unwrap_err();
        assert_eq!(
            err,
            ResultError::LengthMismatch {
                series: "glucose".to_string(),
                expected: 3,
                actual: 2,
            }
        );
    }

    #[test]
    fn test_byproduct_length_mismatch_names_series() {
        let mut response = response_with_time(vec![0.0, 1.0]);
        response.byproducts.insert("EX_lac__L_e".to_string(), vec![1.0]);
        let err = DynamicSimulationResult::from_response(response).unwrap_err();
        assert!(err.to_string().contains("byproducts.EX_lac__L_e"));
    }

    #[test]
    fn test_time_axis_must_start_at_zero() {
        let err = DynamicSimulationResult::from_response(response_with_time(vec![0.5, 1.0]))
            .unwrap_err();
        assert!(matches!(err, ResultError::InvalidTimeAxis(_)));
    }

    #[test]
    fn test_time_axis_must_not_decrease() {
        let err = DynamicSimulationResult::from_response(response_with_time(vec![0.0, 2.0, 1.0]))
            .unwrap_err();
        assert!(matches!(err, ResultError::InvalidTimeAxis(_)));
    }

    #[test]
    fn test_repeated_time_tolerated() {
        let result = result_with_time(vec![0.0, 1.0, 1.0, 2.0]);
        assert_eq!(result.len(), 4);
    }

    #[test]
    fn test_empty_flux_history_normalized_to_absent() {
        let mut response = response_with_time(vec![0.0, 1.0]);
        response.flux_history = Some(Vec::new());
        let result = DynamicSimulationResult::from_response(response).unwrap();
        assert!(result.flux_history().is_none());
    }

    #[test]
    fn test_short_flux_history_rejected() {
        let mut response = response_with_time(vec![0.0, 1.0, 2.0]);
        response.flux_history.as_mut().unwrap().pop();
        assert!(DynamicSimulationResult::from_response(response).is_err());
    }

    #[test]
    fn test_negative_alert_time_rejected() {
        let mut response = response_with_time(vec![0.0, 1.0]);
        response.toxicity_alerts.push(ToxicityAlert {
            time: -1.0,
            byproduct: "EX_ac_e".to_string(),
            concentration: 50.0,
        });
        let err = DynamicSimulationResult::from_response(response).unwrap_err();
        assert!(matches!(err, ResultError::InvalidAlert { index: 0, .. }));
    }

    #[test]
    fn test_result_error_maps_to_malformed() {
        let err: EnvError = ResultError::InvalidTimeAxis("x".to_string()).into();
        assert!(matches!(err, EnvError::MalformedResponse(_)));
    }

    #[test]
    fn test_without_flux_history() {
        let result = result_with_time(vec![0.0, 1.0]).without_flux_history();
        assert!(!result.has_flux_history());
    }
}
