//! Deterministic playback scenarios for DST.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// DST-001: Primary attempt hangs past its budget
    PrimaryTimeout,

    /// DST-002: Both attempts refused
    TotalOutage,

    /// DST-003: Both attempts answer with a server detail
    ServerDetail,

    /// DST-004: Primary body fails validation
    MalformedPayload,

    /// DST-005: Clean fetch, playback to the end
    HappyPath,

    /// DST-006: Seeded storm of seeks, play/pause and speed changes
    ScrubStorm,

    /// DST-007: Speed cycling and tick phase
    SpeedCycle,

    /// DST-008: Toxicity markers share the growth curve's samples
    ToxicityAlignment,

    /// DST-009: A new result replaces one mid-playback
    LateResultSwap,

    /// DST-010: Primary answers just inside its budget
    SlowPrimary,

    /// DST-011: Health probe against an unreachable service
    ServiceDown,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::PrimaryTimeout,
            ScenarioId::TotalOutage,
            ScenarioId::ServerDetail,
            ScenarioId::MalformedPayload,
            ScenarioId::HappyPath,
            ScenarioId::ScrubStorm,
            ScenarioId::SpeedCycle,
            ScenarioId::ToxicityAlignment,
            ScenarioId::LateResultSwap,
            ScenarioId::SlowPrimary,
            ScenarioId::ServiceDown,
        ]
    }

    /// Scenarios that only exercise the fetch protocol.
    pub fn fetch() -> Vec<ScenarioId> {
        Self::all().into_iter().filter(|s| s.is_fetch()).collect()
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::PrimaryTimeout => "primary_timeout",
            ScenarioId::TotalOutage => "total_outage",
            ScenarioId::ServerDetail => "server_detail",
            ScenarioId::MalformedPayload => "malformed_payload",
            ScenarioId::HappyPath => "happy_path",
            ScenarioId::ScrubStorm => "scrub_storm",
            ScenarioId::SpeedCycle => "speed_cycle",
            ScenarioId::ToxicityAlignment => "toxicity_alignment",
            ScenarioId::LateResultSwap => "late_result_swap",
            ScenarioId::SlowPrimary => "slow_primary",
            ScenarioId::ServiceDown => "service_down",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::PrimaryTimeout => "Primary hangs, one reduced-fidelity retry without flux history",
            ScenarioId::TotalOutage => "Both attempts refused, single terminal error, no third request",
            ScenarioId::ServerDetail => "Server detail message surfaces as the terminal diagnostic",
            ScenarioId::MalformedPayload => "Mismatched series lengths trigger the fallback",
            ScenarioId::HappyPath => "Full-fidelity fetch played to the end of the horizon",
            ScenarioId::ScrubStorm => "Random seeks, toggles and speed changes keep one live timer",
            ScenarioId::SpeedCycle => "1x -> 2x -> 5x -> 10x -> 1x without shifting the tick phase",
            ScenarioId::ToxicityAlignment => "Alerts resolve to the same ceiling samples as the cursor",
            ScenarioId::LateResultSwap => "New result resets the cursor, stale ticks are ignored",
            ScenarioId::SlowPrimary => "Primary answers 1s before its deadline and is kept",
            ScenarioId::ServiceDown => "Unreachable service raises one notification per probe",
        }
    }

    /// Returns true if this scenario never starts playback.
    pub fn is_fetch(&self) -> bool {
        matches!(
            self,
            ScenarioId::PrimaryTimeout
                | ScenarioId::TotalOutage
                | ScenarioId::ServerDetail
                | ScenarioId::MalformedPayload
                | ScenarioId::SlowPrimary
                | ScenarioId::ServiceDown
        )
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "primary_timeout" | "primarytimeout" | "dst-001" => Ok(ScenarioId::PrimaryTimeout),
            "total_outage" | "totaloutage" | "dst-002" => Ok(ScenarioId::TotalOutage),
            "server_detail" | "serverdetail" | "dst-003" => Ok(ScenarioId::ServerDetail),
            "malformed_payload" | "malformedpayload" | "dst-004" => Ok(ScenarioId::MalformedPayload),
            "happy_path" | "happypath" | "dst-005" => Ok(ScenarioId::HappyPath),
            "scrub_storm" | "scrubstorm" | "dst-006" => Ok(ScenarioId::ScrubStorm),
            "speed_cycle" | "speedcycle" | "dst-007" => Ok(ScenarioId::SpeedCycle),
            "toxicity_alignment" | "toxicityalignment" | "dst-008" => Ok(ScenarioId::ToxicityAlignment),
            "late_result_swap" | "lateresultswap" | "dst-009" => Ok(ScenarioId::LateResultSwap),
            "slow_primary" | "slowprimary" | "dst-010" => Ok(ScenarioId::SlowPrimary),
            "service_down" | "servicedown" | "dst-011" => Ok(ScenarioId::ServiceDown),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
