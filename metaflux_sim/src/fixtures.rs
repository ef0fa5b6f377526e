//! Synthetic batch-culture trajectories used as service payloads.
//!
//! A linear surrogate stands in for the flux balance solve: growth and
//! secretion are proportional to Monod glucose uptake, integrated with a
//! forward Euler step. The shape matches what the real service returns,
//! including byproduct accumulation and toxicity alerts.

use metaflux_core::DynamicParams;
use metaflux_env::{DynamicSimulationResponse, ToxicityAlert};
use std::collections::BTreeMap;

/// Byproduct exchange reactions tracked for toxicity, with their
/// inhibition thresholds in mmol/L.
pub const TOXICITY_THRESHOLDS: [(&str, f64); 3] = [
    ("EX_ac_e", 60.0),
    ("EX_lac__L_e", 40.0),
    ("EX_etoh_e", 30.0),
];

/// Fraction of a threshold at which an alert is raised.
pub const ALERT_FRACTION: f64 = 0.8;

/// At most this many alerts are reported.
pub const MAX_TOXICITY_ALERTS: usize = 10;

const GLUCOSE_EXCHANGE: &str = "EX_glc__D_e";
const BIOMASS_REACTION: &str = "BIOMASS_Ecoli_core_w_GAM";

/// Culture conditions and surrogate kinetics.
#[derive(Debug, Clone)]
pub struct CultureParams {
    /// Initial glucose, mmol/L
    pub initial_glucose: f64,

    /// Initial biomass, gDW/L
    pub initial_biomass: f64,

    /// Horizon in hours
    pub total_time: f64,

    /// Euler step in hours
    pub time_step: f64,

    /// Michaelis constant for glucose uptake, mmol/L (default: 0.5)
    pub km: f64,

    /// Maximum glucose uptake, mmol/gDW/h (default: 10.0)
    pub vmax_uptake: f64,

    /// Biomass formed per mmol glucose taken up, gDW/mmol (default: 0.045)
    pub biomass_yield: f64,

    /// Secretion flux per unit uptake for each byproduct
    pub secretion: BTreeMap<String, f64>,
}

impl Default for CultureParams {
    fn default() -> Self {
        Self::from_params(&DynamicParams::default())
    }
}

impl CultureParams {
    /// Takes the culture conditions from a request.
    pub fn from_params(params: &DynamicParams) -> Self {
        let secretion = [("EX_ac_e", 0.45), ("EX_etoh_e", 0.12), ("EX_lac__L_e", 0.05)]
            .into_iter()
            .map(|(id, ratio)| (id.to_string(), ratio))
            .collect();

        Self {
            initial_glucose: params.initial_glucose,
            initial_biomass: params.initial_biomass,
            total_time: params.total_time,
            time_step: params.time_step,
            km: 0.5,
            vmax_uptake: 10.0,
            biomass_yield: 0.045,
            secretion,
        }
    }
}

fn round_to(value: f64, digits: i32) -> f64 {
    let scale = 10f64.powi(digits);
    (value * scale).round() / scale
}

/// Deterministic fixture generator.
#[derive(Debug, Clone, Default)]
pub struct BatchCulture {
    params: CultureParams,
}

impl BatchCulture {
    pub fn new(params: CultureParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &CultureParams {
        &self.params
    }

    /// Integrates the culture until the horizon or glucose exhaustion.
    ///
    /// Always includes flux history; the transport strips it when a
    /// request does not ask for it.
    pub fn simulate(&self) -> DynamicSimulationResponse {
        let p = &self.params;
        let mut response = DynamicSimulationResponse::default();
        if !(p.time_step.is_finite() && p.time_step > 0.0) {
            return response;
        }

        let mut accumulated: BTreeMap<&str, f64> =
            TOXICITY_THRESHOLDS.iter().map(|(id, _)| (*id, 0.0)).collect();
        let mut history = Vec::new();
        let mut alerts = Vec::new();

        let mut biomass = p.initial_biomass;
        let mut glucose = p.initial_glucose;
        let mut step = 0u32;

        loop {
            let t = step as f64 * p.time_step;
            if t > p.total_time + 1e-9 || glucose <= 0.0 {
                break;
            }

            response.time.push(round_to(t, 2));
            response.biomass.push(round_to(biomass, 4));
            response.glucose.push(round_to(glucose, 4));

            let uptake = p.vmax_uptake * glucose / (p.km + glucose);

            let mut inhibition = 1.0;
            for (id, threshold) in TOXICITY_THRESHOLDS {
                if !p.secretion.contains_key(id) {
                    continue;
                }
                let concentration = accumulated[id];
                inhibition *= threshold / (threshold + concentration);
                if concentration > threshold * ALERT_FRACTION {
                    alerts.push(ToxicityAlert {
                        time: t,
                        byproduct: id.to_string(),
                        concentration,
                    });
                }
            }
            let growth = p.biomass_yield * uptake * inhibition;
            response.growth_rates.push(round_to(growth, 4));

            let mut fluxes = BTreeMap::new();
            fluxes.insert(GLUCOSE_EXCHANGE.to_string(), -uptake);
            fluxes.insert(BIOMASS_REACTION.to_string(), growth);
            for (id, ratio) in &p.secretion {
                let secreted = ratio * uptake;
                fluxes.insert(id.clone(), secreted);
                response
                    .byproducts
                    .entry(id.clone())
                    .or_default()
                    .push(round_to(secreted, 4));
                if let Some(total) = accumulated.get_mut(id.as_str()) {
                    *total += secreted * biomass * p.time_step;
                }
            }
            fluxes.retain(|_, flux| flux.abs() > 1e-3);
            history.push(fluxes);

            let next_biomass = biomass + growth * biomass * p.time_step;
            glucose = (glucose - uptake * biomass * p.time_step).max(0.0);
            biomass = next_biomass.max(0.0);
            step += 1;
        }

        alerts.truncate(MAX_TOXICITY_ALERTS);
        response.flux_history = Some(history);
        response.toxicity_alerts = alerts;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use metaflux_core::DynamicSimulationResult;

    fn culture(initial_glucose: f64, time_step: f64) -> DynamicSimulationResponse {
        let params = DynamicParams {
            initial_glucose,
            time_step,
            ..DynamicParams::default()
        };
        BatchCulture::new(CultureParams::from_params(&params)).simulate()
    }

    #[test]
    fn test_default_culture_is_a_valid_result() {
        let response = BatchCulture::default().simulate();
        assert_eq!(response.time[0], 0.0);

        let result = DynamicSimulationResult::from_response(response).unwrap();
        assert!(result.len() > 1);
        assert!(result.has_flux_history());
        assert_eq!(result.byproducts().len(), 3);
    }

    #[test]
    fn test_initial_uptake_follows_monod() {
        let response = culture(20.0, 1.0);
        let first = &response.flux_history.as_ref().unwrap()[0];

        assert_relative_eq!(first[GLUCOSE_EXCHANGE], -10.0 * 20.0 / 20.5, epsilon = 1e-12);
        assert_relative_eq!(response.growth_rates[0], 0.439, epsilon = 1e-4);
        assert_relative_eq!(response.byproducts["EX_ac_e"][0], 4.3902, epsilon = 1e-4);
    }

    #[test]
    fn test_glucose_never_increases() {
        let response = culture(20.0, 1.0);
        assert!(response.glucose.windows(2).all(|w| w[1] <= w[0]));
        assert!(response.biomass.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_dilute_culture_raises_no_alerts() {
        assert!(culture(20.0, 1.0).toxicity_alerts.is_empty());
    }

    #[test]
    fn test_rich_culture_crosses_acetate_threshold() {
        let response = culture(200.0, 1.0);
        let alerts = &response.toxicity_alerts;

        assert!(!alerts.is_empty());
        assert!(alerts.iter().all(|a| a.byproduct == "EX_ac_e"));
        assert!(alerts.iter().all(|a| a.concentration > 60.0 * ALERT_FRACTION));
        assert!(response.time.iter().any(|t| *t == alerts[0].time));
    }

    #[test]
    fn test_alerts_are_capped() {
        let response = culture(400.0, 0.1);
        assert!(response.toxicity_alerts.len() <= MAX_TOXICITY_ALERTS);
        assert!(!response.toxicity_alerts.is_empty());
    }

    #[test]
    fn test_non_positive_step_yields_empty_payload() {
        let response = culture(20.0, 0.0);
        assert!(response.time.is_empty());
        assert!(response.flux_history.is_none());
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(culture(150.0, 0.5), culture(150.0, 0.5));
    }
}
