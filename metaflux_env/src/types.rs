//! Wire types exchanged with the simulation service.

use crate::error::EnvError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Body of `POST /simulate-dynamic`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicSimulationRequest {
    /// Identifier of the metabolic model loaded by the service
    pub model_id: String,

    /// Initial substrate (glucose) concentration, mmol/L
    pub initial_glucose: f64,

    /// Initial biomass, gDW/L
    pub initial_biomass: f64,

    /// Simulated horizon in hours
    pub total_time: f64,

    /// Fixed integration step in hours
    pub time_step: f64,

    /// Gene/reaction knockouts applied before the run
    pub knockouts: Vec<String>,

    /// Whether the per-step flux snapshots should be returned
    pub include_flux_history: bool,
}

/// A precomputed threshold crossing as reported by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToxicityAlert {
    pub time: f64,
    pub byproduct: String,
    pub concentration: f64,
}

/// Body of a successful `POST /simulate-dynamic` answer.
///
/// Fields the playback engine does not consume (`byproduct_analysis`,
/// `success`) are ignored on deserialization.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DynamicSimulationResponse {
    pub time: Vec<f64>,
    pub biomass: Vec<f64>,
    pub glucose: Vec<f64>,
    pub growth_rates: Vec<f64>,
    pub byproducts: BTreeMap<String, Vec<f64>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flux_history: Option<Vec<BTreeMap<String, f64>>>,

    #[serde(default)]
    pub toxicity_alerts: Vec<ToxicityAlert>,
}

impl DynamicSimulationResponse {
    /// Decodes a response body.
    ///
    /// The service reports solver exceptions as `200 {"success": false,
    /// "error": "..."}`; those become [`EnvError::ServerFailure`]. Any other
    /// shape mismatch becomes [`EnvError::MalformedResponse`].
    pub fn from_json(body: serde_json::Value) -> Result<Self, EnvError> {
        if body.get("success").and_then(|v| v.as_bool()) == Some(false) {
            let detail = body
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or("simulation reported failure")
                .to_string();
            return Err(EnvError::server(200, detail));
        }

        serde_json::from_value(body).map_err(|e| EnvError::malformed(e.to_string()))
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    /// Returns true when the service reports itself healthy.
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}
