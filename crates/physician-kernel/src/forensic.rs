//! Forensic reconstruction for verdicts that closed the gate.
//!
//! [`reconstruct`] turns whatever forensic detail the oracle supplied into a
//! complete [`ForensicReport`].  Fields the oracle left out (or sent empty)
//! are replaced with fixed fallback text so the presentation layer always
//! receives all four sections.  The function is pure: identical verdicts
//! always yield identical reports.

use physician_types::{ForensicDraft, ForensicReport, Verdict};

pub const FALLBACK_FAILURE_SIGNATURE: &str = "Kinematic Rupture";
pub const FALLBACK_PRIMARY_LAW: &str = "Conservation of Momentum";
pub const FALLBACK_RECONSTRUCTION: &str =
    "Black box telemetry incomplete; reconstruction derived from gate verdict only.";
pub const FALLBACK_GOVERNOR_PATCH: &str = "Increase damping ratio on Z-axis.";

/// Build the complete forensic report for a FAIL verdict.
pub fn reconstruct(verdict: &Verdict) -> ForensicReport {
    let empty = ForensicDraft::default();
    let draft = verdict.forensic_report.as_ref().unwrap_or(&empty);
    ForensicReport {
        failure_signature: or_fallback(&draft.failure_signature, FALLBACK_FAILURE_SIGNATURE),
        primary_law_violated: or_fallback(&draft.primary_law_violated, FALLBACK_PRIMARY_LAW),
        reconstruction_analysis: or_fallback(
            &draft.reconstruction_analysis,
            FALLBACK_RECONSTRUCTION,
        ),
        governor_patch: or_fallback(&draft.governor_patch, FALLBACK_GOVERNOR_PATCH),
    }
}

/// Names of the forensic fields [`reconstruct`] would substitute.
pub fn fallback_fields(verdict: &Verdict) -> Vec<&'static str> {
    let Some(draft) = verdict.forensic_report.as_ref() else {
        return vec![
            "failure_signature",
            "primary_law_violated",
            "reconstruction_analysis",
            "governor_patch",
        ];
    };
    [
        ("failure_signature", &draft.failure_signature),
        ("primary_law_violated", &draft.primary_law_violated),
        ("reconstruction_analysis", &draft.reconstruction_analysis),
        ("governor_patch", &draft.governor_patch),
    ]
    .into_iter()
    .filter(|(_, value)| is_blank(value))
    .map(|(name, _)| name)
    .collect()
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|s| s.trim().is_empty())
}

fn or_fallback(value: &Option<String>, fallback: &str) -> String {
    match value.as_deref() {
        Some(s) if !s.trim().is_empty() => s.to_string(),
        _ => fallback.to_string(),
    }
}
