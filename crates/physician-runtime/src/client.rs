//! [`VerificationClient`] – one oracle call, validated.
//!
//! Sends a [`VerificationRequest`] to the configured [`Oracle`] exactly once,
//! bounded by a timeout, and runs the answer through the
//! [`VerdictValidator`].  It never retries and never synthesizes a verdict:
//! the outcome is either a validated [`Verdict`] or one of
//! [`PipelineError::BackendUnavailable`] / [`PipelineError::MalformedResponse`].
//!
//! Each call writes two operator log entries: a SYS entry when the request
//! goes out and exactly one entry describing the outcome.

use std::sync::Arc;
use std::time::Duration;

use physician_kernel::{EventLog, VerdictValidator};
use physician_types::{LogLevel, OracleError, PipelineError, ValidationError, Verdict};
use tracing::{Instrument, debug, info_span, warn};

use crate::oracle::Oracle;
use crate::request::VerificationRequest;

/// Upper bound on a single oracle call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Submits requests to an [`Oracle`] and validates the answers.
pub struct VerificationClient {
    oracle: Arc<dyn Oracle>,
    validator: VerdictValidator,
    timeout: Duration,
    log: EventLog,
}

impl VerificationClient {
    pub fn new(oracle: Arc<dyn Oracle>, log: EventLog) -> Self {
        Self {
            oracle,
            validator: VerdictValidator::default(),
            timeout: DEFAULT_TIMEOUT,
            log,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replace the default rule set.
    pub fn with_validator(mut self, validator: VerdictValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn oracle_name(&self) -> &str {
        self.oracle.name()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Consult the oracle once and validate its verdict.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::BackendUnavailable`] – transport failure, non-2xx
    ///   answer, unusable envelope, or no answer within the timeout.
    /// - [`PipelineError::MalformedResponse`] – the answer is not a valid
    ///   verdict document.
    pub async fn submit(&self, request: &VerificationRequest) -> Result<Verdict, PipelineError> {
        let backend = self.oracle.name();
        let opening = if request.is_stress_test() {
            "INITIATING STRESS TEST [SIMULATION]...".to_string()
        } else {
            format!("Synchronizing with Physician Kernel via {backend}...")
        };
        self.log.append(opening, LogLevel::Sys);

        let span = info_span!("oracle_consult", backend, mode = ?request.mode);
        let outcome = async {
            let body = tokio::time::timeout(self.timeout, self.oracle.consult(request))
                .await
                .map_err(|_| OracleError::Timeout(self.timeout))??;
            debug!(bytes = body.len(), "oracle answered");
            Ok::<_, PipelineError>(self.validator.validate_body(&body)?)
        }
        .instrument(span)
        .await;

        self.record(backend, &outcome);
        outcome
    }

    fn record(&self, backend: &str, outcome: &Result<Verdict, PipelineError>) {
        match outcome {
            Ok(verdict) => {
                self.log.append(
                    format!(
                        "ORACLE_RESPONSE: {} verdict for {} (gate {:?}).",
                        verdict.status, verdict.agent_type, verdict.logic_gate.final_verdict
                    ),
                    LogLevel::Sys,
                );
            }
            Err(PipelineError::BackendUnavailable(e)) => {
                warn!(backend, error = %e, "oracle call failed");
                self.log.append(
                    format!("CONNECTION_ERROR: {backend} backend is not responding ({e})."),
                    LogLevel::Crit,
                );
            }
            Err(PipelineError::MalformedResponse(ValidationError::SemanticMismatch(detail))) => {
                warn!(backend, detail, "verdict rejected by invariant rules");
                self.log.append(format!("SEMANTIC_MISMATCH: {detail}"), LogLevel::Crit);
            }
            Err(PipelineError::MalformedResponse(e)) => {
                warn!(backend, error = %e, "verdict rejected");
                self.log.append(format!("MALFORMED_RESPONSE: {e}"), LogLevel::Crit);
            }
            Err(_) => {}
        }
    }
}
