//! [`VerificationSession`] – the orchestrator.
//!
//! Holds everything the operator works with: the selected frame, the intent,
//! the stress-test flag, the [`GateMachine`], the current verdict and its
//! forensic report, an audit trail of applied verdicts, and the shared
//! [`EventLog`].  State changes only through the methods below; readers take
//! an immutable [`SessionSnapshot`].
//!
//! # Verification flow
//!
//! ```text
//! verify()
//!   ├─ gate.begin(build request)     ── MissingInput / AlreadyInProgress
//!   ├─ client.submit(request).await  ── the only suspension point;
//!   │                                   dropping verify() here abandons the ticket
//!   ├─ gate.resolve(ticket, outcome) ── stale result → discarded
//!   └─ FAIL → forensic::reconstruct
//! ```
//!
//! The session mutex is released before the oracle call and re-taken after
//! it; it is never held across an `.await`.  If the `verify` future is
//! dropped while the call is outstanding the in-flight slot is released and
//! the gate returns to STANDBY.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use physician_kernel::{
    BlockReason, EventLog, GateMachine, GateState, Ticket, fallback_fields, reconstruct,
};
use physician_types::{ForensicReport, LogLevel, PipelineError, TelemetryFrame, Verdict};
use tracing::{debug, info};

use crate::client::VerificationClient;
use crate::oracle::Oracle;
use crate::request;

// ─────────────────────────────────────────────────────────────────────────────
// Read-side types
// ─────────────────────────────────────────────────────────────────────────────

/// One verdict that was applied to the gate.
#[derive(Debug, Clone, PartialEq)]
pub struct VerdictRecord {
    /// Frame generation the verdict was requested for.
    pub generation: u64,
    pub received_at: DateTime<Utc>,
    pub verdict: Verdict,
}

/// Metadata of the loaded frame.  The bytes themselves stay in the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSummary {
    pub file_name: Option<String>,
    pub mime_type: String,
    pub bytes: usize,
}

/// Immutable view of the session at one instant.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub gate: GateState,
    pub generation: u64,
    pub in_flight: bool,
    pub frame: Option<FrameSummary>,
    pub intent: String,
    pub stress_test: bool,
    pub verdict: Option<Verdict>,
    /// Present only when the gate is blocked by a physical violation.
    pub forensic: Option<ForensicReport>,
    /// Remote failure behind a BLOCKED gate with no verdict.
    pub last_error: Option<PipelineError>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

struct SessionState {
    frame: Option<TelemetryFrame>,
    intent: String,
    stress_test: bool,
    gate: GateMachine,
    current: Option<Verdict>,
    forensic: Option<ForensicReport>,
    last_error: Option<PipelineError>,
    history: Vec<VerdictRecord>,
}

impl SessionState {
    /// Drop the current analysis and start a new frame generation.
    fn invalidate(&mut self) {
        self.gate.supersede();
        self.current = None;
        self.forensic = None;
        self.last_error = None;
    }
}

/// Admitted ticket that is released if `verify` is dropped mid-call.
struct Admission<'a> {
    state: &'a Mutex<SessionState>,
    ticket: Option<Ticket>,
}

impl Admission<'_> {
    /// Hand the ticket to `resolve`; the guard no longer releases it.
    fn settle(&mut self) -> Option<Ticket> {
        self.ticket.take()
    }
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            self.state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .gate
                .abandon(ticket);
        }
    }
}

/// A single operator's verification session.
pub struct VerificationSession {
    client: VerificationClient,
    state: Mutex<SessionState>,
    log: EventLog,
}

impl VerificationSession {
    /// Create a session consulting `oracle` with the given per-call timeout.
    pub fn new(oracle: Arc<dyn Oracle>, timeout: Duration) -> Self {
        let log = EventLog::default();
        let client = VerificationClient::new(oracle, log.clone()).with_timeout(timeout);
        Self::with_client(client, log)
    }

    /// Create a session around a pre-configured client.  `log` must be the
    /// log the client was built with.
    pub fn with_client(client: VerificationClient, log: EventLog) -> Self {
        Self {
            client,
            state: Mutex::new(SessionState {
                frame: None,
                intent: String::new(),
                stress_test: false,
                gate: GateMachine::new(log.clone()),
                current: None,
                forensic: None,
                last_error: None,
                history: Vec::new(),
            }),
            log,
        }
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn oracle_name(&self) -> &str {
        self.client.oracle_name()
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Operator actions ────────────────────────────────────────────────────

    /// Replace the telemetry frame.  Any current analysis is invalidated.
    pub fn select_frame(&self, frame: TelemetryFrame) {
        let mut state = self.lock();
        debug!(bytes = frame.data.len(), mime = %frame.mime_type, "frame selected");
        state.frame = Some(frame);
        self.log.append("Visual telemetry buffer loaded into memory.", LogLevel::Info);
        state.invalidate();
    }

    /// Replace the intent text.  Invalidates only when the text changes.
    pub fn set_intent(&self, intent: impl Into<String>) {
        let intent = intent.into();
        let mut state = self.lock();
        if state.intent == intent {
            return;
        }
        state.intent = intent;
        state.invalidate();
    }

    pub fn set_stress_test(&self, enabled: bool) {
        let mut state = self.lock();
        if state.stress_test == enabled {
            return;
        }
        state.stress_test = enabled;
        let message = if enabled {
            "STRESS_TEST_ARMED: next verification will simulate a catastrophic failure."
        } else {
            "STRESS_TEST_DISARMED: standard verification restored."
        };
        self.log.append(message, LogLevel::Sys);
    }

    /// Return the gate to STANDBY.  Frame and intent are kept.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.invalidate();
        self.log.append("Session reset: gate returned to STANDBY.", LogLevel::Sys);
    }

    // ── Verification ────────────────────────────────────────────────────────

    /// Run one verification for the current frame and intent.
    ///
    /// Returns the resulting gate state.  When the frame or intent changed
    /// while the call was outstanding the result is discarded and the
    /// current (STANDBY) state is returned instead.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::MissingInput`] / [`PipelineError::AlreadyInProgress`]
    ///   – refused locally; no oracle call was made.
    /// - [`PipelineError::BackendUnavailable`] /
    ///   [`PipelineError::MalformedResponse`] – the gate is now BLOCKED.
    pub async fn verify(&self) -> Result<GateState, PipelineError> {
        let (ticket, request) = {
            let mut guard = self.lock();
            let SessionState {
                frame,
                intent,
                stress_test,
                gate,
                ..
            } = &mut *guard;
            let admitted = gate.begin(|| request::build(frame.as_ref(), intent, *stress_test))?;
            guard.current = None;
            guard.forensic = None;
            guard.last_error = None;
            admitted
        };

        let mut admission = Admission {
            state: &self.state,
            ticket: Some(ticket),
        };
        let outcome = self.client.submit(&request).await;

        let mut state = self.lock();
        admission.settle();
        let Some(next) = state.gate.resolve(ticket, outcome.as_ref()) else {
            info!(generation = ticket.generation(), "stale verification result discarded");
            return Ok(state.gate.state());
        };

        match outcome {
            Ok(verdict) => {
                if next == GateState::Blocked(BlockReason::Violation) {
                    self.log.append("INITIATING FORENSIC BLACK BOX RECOVERY...", LogLevel::Crit);
                    let substituted = fallback_fields(&verdict);
                    if !substituted.is_empty() {
                        self.log.append(
                            format!(
                                "FORENSIC_FALLBACK: black box incomplete, defaults used for {}.",
                                substituted.join(", ")
                            ),
                            LogLevel::Sys,
                        );
                    }
                    state.forensic = Some(reconstruct(&verdict));
                }
                state.history.push(VerdictRecord {
                    generation: ticket.generation(),
                    received_at: Utc::now(),
                    verdict: verdict.clone(),
                });
                state.current = Some(verdict);
                Ok(next)
            }
            Err(e) => {
                state.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    // ── Readers ─────────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.lock();
        SessionSnapshot {
            gate: state.gate.state(),
            generation: state.gate.generation(),
            in_flight: state.gate.is_in_flight(),
            frame: state.frame.as_ref().map(|f| FrameSummary {
                file_name: f.file_name.clone(),
                mime_type: f.mime_type.clone(),
                bytes: f.data.len(),
            }),
            intent: state.intent.clone(),
            stress_test: state.stress_test,
            verdict: state.current.clone(),
            forensic: state.forensic.clone(),
            last_error: state.last_error.clone(),
        }
    }

    /// Every verdict applied so far, oldest first.
    pub fn history(&self) -> Vec<VerdictRecord> {
        self.lock().history.clone()
    }
}
