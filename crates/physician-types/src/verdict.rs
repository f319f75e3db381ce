//! Structured analysis contract returned by the physics-reasoning oracle.
//!
//! The types in this module double as the wire format: they deserialize
//! directly from the oracle's JSON document and derive a JSON Schema that
//! prompt-building backends hand to the model as a structured-output
//! constraint.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

/// Primary safety decision of a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Pass,
    Warning,
    Fail,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Pass => write!(f, "PASS"),
            Status::Warning => write!(f, "WARNING"),
            Status::Fail => write!(f, "FAIL"),
        }
    }
}

/// Final position of the logic gate as reported by the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum FinalVerdict {
    Open,
    Closed,
}

/// A single `(parameter, value)` adjustment.  Keys may repeat; order is the
/// oracle's reasoning order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PhysicsOverride {
    pub parameter: String,
    pub value: String,
}

/// Oracle-supplied kinematic estimates.  Never verified locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct KinematicEstimate {
    #[serde(deserialize_with = "text_or_number")]
    #[schemars(with = "String")]
    pub mass_estimation: String,
    #[serde(deserialize_with = "text_or_number")]
    #[schemars(with = "String")]
    pub friction_coefficient: String,
    #[serde(deserialize_with = "text_or_number")]
    #[schemars(with = "String")]
    pub center_of_mass: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LogicGate {
    pub safety_constraints: Vec<String>,
    pub adjustments_required: Vec<String>,
    pub final_verdict: FinalVerdict,
}

/// Forensic detail exactly as the oracle sent it.
///
/// Every field is optional on the wire so that a FAIL verdict with partial
/// forensic detail still parses; [`ForensicDraft::is_complete`] tells the
/// two apart.  Empty strings count as missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ForensicDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_law_violated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconstruction_analysis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub governor_patch: Option<String>,
}

impl ForensicDraft {
    /// `true` when all four fields carry non-empty text.
    pub fn is_complete(&self) -> bool {
        [
            &self.failure_signature,
            &self.primary_law_violated,
            &self.reconstruction_analysis,
            &self.governor_patch,
        ]
        .iter()
        .all(|f| f.as_deref().is_some_and(|s| !s.trim().is_empty()))
    }
}

/// Fully populated forensic report handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ForensicReport {
    pub failure_signature: String,
    pub primary_law_violated: String,
    pub reconstruction_analysis: String,
    pub governor_patch: String,
}

/// Structured result of one verification request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Verdict {
    /// Auto-detected agent, e.g. "Robotic Arm" or "Drone".
    pub agent_type: String,
    pub status: Status,
    /// Causal-reasoning narrative.
    pub logic_trace: String,
    pub physics_overrides: Vec<PhysicsOverride>,
    pub kinematics: KinematicEstimate,
    pub contextual_risks: Vec<String>,
    pub logic_gate: LogicGate,
    pub simulation_outcome: String,
    /// Only populated when `status` is FAIL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forensic_report: Option<ForensicDraft>,
}

impl Verdict {
    /// `true` for PASS and WARNING verdicts.
    pub fn clears_gate(&self) -> bool {
        matches!(self.status, Status::Pass | Status::Warning)
    }
}

/// Accept a JSON string or number and keep it as text.
fn text_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Integer(i64),
        Float(f64),
    }

    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Text(s) => s,
        Scalar::Integer(i) => i.to_string(),
        Scalar::Float(f) => f.to_string(),
    })
}
