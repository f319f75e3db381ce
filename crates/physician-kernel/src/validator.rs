//! [`VerdictValidator`] – schema and invariant check for oracle responses.
//!
//! Validation is all-or-nothing and runs in two stages:
//!
//! 1. **Schema** – the document must deserialize into a [`Verdict`]: every
//!    required field present with the right primitive type, enumerations
//!    matching their declared values exactly (case-sensitive).
//! 2. **Invariants** – every registered [`VerdictRule`] is evaluated in
//!    order.  The first violation rejects the verdict with
//!    [`ValidationError::SemanticMismatch`].
//!
//! The two built-in rules encode the status/gate/forensic contract:
//! - [`GateAgreementRule`] – `FAIL` ⇔ `final_verdict = CLOSED`.
//! - [`ForensicScopeRule`] – `PASS`/`WARNING` carry no forensic report.
//!
//! A `FAIL` verdict with an absent or partial forensic report is accepted;
//! completing it is the job of [`crate::forensic::reconstruct`].
//!
//! # Example
//!
//! ```
//! use physician_kernel::validator::validate_body;
//! use physician_types::ValidationError;
//!
//! let err = validate_body("not json").unwrap_err();
//! assert!(matches!(err, ValidationError::Parse(_)));
//! ```

use physician_types::{FinalVerdict, Status, ValidationError, Verdict};
use serde::Deserialize;
use serde_json::Value;

// ────────────────────────────────────────────────────────────────────────────
// Rule trait
// ────────────────────────────────────────────────────────────────────────────

/// A semantic invariant that a structurally valid verdict must satisfy.
pub trait VerdictRule: Send + Sync {
    /// Short name used in mismatch messages.
    fn name(&self) -> &str;

    /// Return `Err(detail)` when the verdict violates the invariant.
    fn check(&self, verdict: &Verdict) -> Result<(), String>;
}

/// `status = FAIL` if and only if `logic_gate.final_verdict = CLOSED`.
pub struct GateAgreementRule;

impl VerdictRule for GateAgreementRule {
    fn name(&self) -> &str {
        "gate_agreement"
    }

    fn check(&self, verdict: &Verdict) -> Result<(), String> {
        match (verdict.status, verdict.logic_gate.final_verdict) {
            (Status::Fail, FinalVerdict::Closed) => Ok(()),
            (Status::Pass | Status::Warning, FinalVerdict::Open) => Ok(()),
            (status, gate) => Err(format!("status {status} with final_verdict {gate:?}")),
        }
    }
}

/// Only `FAIL` verdicts may carry a forensic report.
pub struct ForensicScopeRule;

impl VerdictRule for ForensicScopeRule {
    fn name(&self) -> &str {
        "forensic_scope"
    }

    fn check(&self, verdict: &Verdict) -> Result<(), String> {
        if verdict.clears_gate() && verdict.forensic_report.is_some() {
            return Err(format!(
                "status {} must not carry a forensic_report",
                verdict.status
            ));
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// VerdictValidator
// ────────────────────────────────────────────────────────────────────────────

/// Ordered set of [`VerdictRule`]s applied after schema validation.
pub struct VerdictValidator {
    rules: Vec<Box<dyn VerdictRule>>,
}

impl Default for VerdictValidator {
    /// A validator with the built-in contract rules registered.
    fn default() -> Self {
        Self {
            rules: vec![Box::new(GateAgreementRule), Box::new(ForensicScopeRule)],
        }
    }
}

impl VerdictValidator {
    /// A validator with no invariant rules, only the schema check.
    pub fn schema_only() -> Self {
        Self { rules: Vec::new() }
    }

    /// Register an additional rule, evaluated after the existing ones.
    pub fn add_rule(&mut self, rule: Box<dyn VerdictRule>) {
        self.rules.push(rule);
    }

    /// Validate an already-parsed JSON document.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::Schema`] – missing field, wrong type, or unknown
    ///   enumeration value.
    /// - [`ValidationError::SemanticMismatch`] – a registered rule rejected it.
    pub fn validate(&self, raw: &Value) -> Result<Verdict, ValidationError> {
        let verdict =
            Verdict::deserialize(raw).map_err(|e| ValidationError::Schema(e.to_string()))?;
        for rule in &self.rules {
            rule.check(&verdict).map_err(|detail| {
                ValidationError::SemanticMismatch(format!("{}: {detail}", rule.name()))
            })?;
        }
        Ok(verdict)
    }

    /// Parse `body` as JSON and [`validate`][Self::validate] it.
    pub fn validate_body(&self, body: &str) -> Result<Verdict, ValidationError> {
        let raw: Value =
            serde_json::from_str(body).map_err(|e| ValidationError::Parse(e.to_string()))?;
        self.validate(&raw)
    }
}

/// Validate `raw` with the default rule set.
pub fn validate(raw: &Value) -> Result<Verdict, ValidationError> {
    VerdictValidator::default().validate(raw)
}

/// Parse and validate `body` with the default rule set.
pub fn validate_body(body: &str) -> Result<Verdict, ValidationError> {
    VerdictValidator::default().validate_body(body)
}
