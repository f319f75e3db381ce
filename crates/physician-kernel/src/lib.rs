//! `physician-kernel` – Verdict Handling & Gate Control
//!
//! The deterministic half of the pipeline.  Nothing in this crate performs
//! I/O or awaits; every function reacts identically to identical input.
//!
//! # Modules
//!
//! - [`validator`] – [`VerdictValidator`][validator::VerdictValidator]:
//!   schema check plus the status/gate/forensic invariant rules applied to
//!   every oracle response.
//! - [`gate`] – [`GateMachine`][gate::GateMachine]: the STANDBY → VERIFYING →
//!   OPEN / WARNING / BLOCKED state machine with single-flight admission and
//!   stale-result discarding.
//! - [`forensic`] – [`reconstruct`][forensic::reconstruct]: completes the
//!   forensic report of a FAIL verdict with deterministic fallbacks.
//! - [`event_log`] – [`EventLog`][event_log::EventLog]: the append-only
//!   operator log every stage writes to.

pub mod event_log;
pub mod forensic;
pub mod gate;
pub mod validator;

pub use event_log::EventLog;
pub use forensic::{fallback_fields, reconstruct};
pub use gate::{BlockReason, GateMachine, GateState, Ticket};
pub use validator::{validate, validate_body, ForensicScopeRule, GateAgreementRule, VerdictRule, VerdictValidator};
