//! [`GateMachine`] – turns verification outcomes into gate states.
//!
//! ```text
//!            begin()                 resolve(verdict / error)
//! STANDBY ────────────► VERIFYING ──────────────────────────► OPEN | WARNING | BLOCKED
//!    ▲                                                               │
//!    └──────────────────────── supersede() ◄─────────────────────────┘
//! ```
//!
//! Rules enforced here:
//!
//! 1. **Single flight** – while an oracle call is outstanding, [`begin`]
//!    fails with [`PipelineError::AlreadyInProgress`].  This holds even
//!    after the call was superseded: the network operation is still running
//!    and only one may exist at a time.
//! 2. **Input check** – the request preparation closure passed to
//!    [`begin`] may fail with [`PipelineError::MissingInput`]; the gate stays
//!    where it is and a WARN entry is logged.
//! 3. **Staleness** – every frame/intent edit or reset advances the frame
//!    generation via [`supersede`].  A result resolved against an older
//!    generation is discarded and never applied.
//! 4. **Determinism** – the terminal state is a pure function of the outcome
//!    ([`GateState::after`]).
//!
//! [`begin`]: GateMachine::begin
//! [`supersede`]: GateMachine::supersede

use physician_types::{LogLevel, MissingInput, PipelineError, Status, Verdict};
use tracing::{debug, warn};

use crate::event_log::EventLog;

/// Why the gate is blocked.  A physical violation and "we could not ask" are
/// kept apart: only the former has forensic content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockReason {
    /// The oracle returned a genuine FAIL verdict.
    Violation,
    /// The oracle could not be reached in time.
    BackendUnavailable,
    /// The oracle answered with something that is not a valid verdict.
    MalformedResponse,
}

/// Derived gate position shown to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateState {
    /// No request outstanding and no current analysis.
    Standby,
    /// A request for the current frame is in flight.
    Verifying,
    /// PASS: the agent is cleared to proceed.
    Open,
    /// WARNING: cleared to proceed with the required adjustments.
    Warning,
    Blocked(BlockReason),
}

impl GateState {
    /// Terminal state for a completed request.
    ///
    /// # Panics
    ///
    /// On [`PipelineError::MissingInput`] or
    /// [`PipelineError::AlreadyInProgress`]: those requests are refused by
    /// [`GateMachine::begin`] and never complete.
    pub fn after(outcome: Result<&Verdict, &PipelineError>) -> GateState {
        match outcome {
            Ok(verdict) => match verdict.status {
                Status::Pass => GateState::Open,
                Status::Warning => GateState::Warning,
                Status::Fail => GateState::Blocked(BlockReason::Violation),
            },
            Err(PipelineError::MalformedResponse(_)) => {
                GateState::Blocked(BlockReason::MalformedResponse)
            }
            Err(PipelineError::BackendUnavailable(_)) => {
                GateState::Blocked(BlockReason::BackendUnavailable)
            }
            Err(e @ (PipelineError::MissingInput(_) | PipelineError::AlreadyInProgress)) => {
                unreachable!("locally refused request reached the gate: {e}")
            }
        }
    }

    /// `true` for both OPEN and its WARNING shade.
    pub fn is_open(&self) -> bool {
        matches!(self, GateState::Open | GateState::Warning)
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, GateState::Blocked(_))
    }

    /// Upper-case label for display.
    pub fn label(&self) -> &'static str {
        match self {
            GateState::Standby => "STANDBY",
            GateState::Verifying => "VERIFYING",
            GateState::Open => "OPEN",
            GateState::Warning => "WARNING",
            GateState::Blocked(_) => "BLOCKED",
        }
    }
}

impl std::fmt::Display for GateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Proof that a request was admitted; resolves against the generation it
/// was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
}

impl Ticket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Gate state plus the bookkeeping needed for single-flight and staleness.
pub struct GateMachine {
    state: GateState,
    generation: u64,
    in_flight: Option<Ticket>,
    log: EventLog,
}

impl GateMachine {
    /// A machine in [`GateState::Standby`] recording into `log`.
    pub fn new(log: EventLog) -> Self {
        Self {
            state: GateState::Standby,
            generation: 0,
            in_flight: None,
            log,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Current frame generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// `true` while an oracle call is outstanding, superseded or not.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Admit a new request and move to [`GateState::Verifying`].
    ///
    /// `prepare` builds the request payload; it runs only when no other call
    /// is outstanding.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::AlreadyInProgress`] – another call is outstanding.
    /// - [`PipelineError::MissingInput`] – `prepare` found no frame or an
    ///   empty intent.  Logged as WARN; the state is unchanged.
    pub fn begin<T>(
        &mut self,
        prepare: impl FnOnce() -> Result<T, PipelineError>,
    ) -> Result<(Ticket, T), PipelineError> {
        if self.in_flight.is_some() {
            warn!(generation = self.generation, "verification refused: call already outstanding");
            return Err(PipelineError::AlreadyInProgress);
        }

        let prepared = match prepare() {
            Ok(prepared) => prepared,
            Err(PipelineError::MissingInput(missing)) => {
                let message = match missing {
                    MissingInput::Frame => "MISSING_TELEMETRY: No visual input source.",
                    MissingInput::Intent => "MISSING_INTENT: Intent vector is empty.",
                };
                self.log.append(message, LogLevel::Warn);
                return Err(PipelineError::MissingInput(missing));
            }
            Err(other) => return Err(other),
        };

        let ticket = Ticket {
            generation: self.generation,
        };
        self.in_flight = Some(ticket);
        self.state = GateState::Verifying;
        debug!(generation = ticket.generation, "gate → VERIFYING");
        Ok((ticket, prepared))
    }

    /// Invalidate the current analysis: back to [`GateState::Standby`] and a
    /// new frame generation.  An outstanding call keeps running but its
    /// result will be discarded.
    pub fn supersede(&mut self) {
        self.generation += 1;
        if self.in_flight.is_some() {
            self.log.append(
                "Pending verification superseded; its result will be discarded.",
                LogLevel::Sys,
            );
        }
        self.state = GateState::Standby;
        debug!(generation = self.generation, "gate → STANDBY");
    }

    /// Release `ticket` when its call was dropped before an outcome arrived.
    ///
    /// The in-flight slot is freed so a new request can be admitted.  A gate
    /// still VERIFYING for the ticket's generation returns to STANDBY.  A
    /// ticket that is no longer in flight is ignored.
    pub fn abandon(&mut self, ticket: Ticket) {
        if self.in_flight != Some(ticket) {
            return;
        }
        self.in_flight = None;
        self.log.append(
            "ABANDONED_REQUEST: verification dropped before a result arrived; gate returned to STANDBY.",
            LogLevel::Sys,
        );
        if ticket.generation == self.generation {
            self.state = GateState::Standby;
        }
        debug!(generation = ticket.generation, "in-flight ticket abandoned");
    }

    /// Apply the outcome of the call admitted with `ticket`.
    ///
    /// Returns the new state, or `None` when the ticket belongs to a
    /// superseded generation and the outcome was discarded.
    pub fn resolve(
        &mut self,
        ticket: Ticket,
        outcome: Result<&Verdict, &PipelineError>,
    ) -> Option<GateState> {
        if self.in_flight == Some(ticket) {
            self.in_flight = None;
        }

        if ticket.generation != self.generation {
            let what = match outcome {
                Ok(verdict) => format!("verdict {}", verdict.status),
                Err(_) => "failed request".to_string(),
            };
            self.log.append(
                format!("STALE_RESULT: {what} for a superseded frame was discarded."),
                LogLevel::Sys,
            );
            return None;
        }

        let next = GateState::after(outcome);
        match (next, outcome) {
            (GateState::Open, _) => {
                self.log.append("VERIFICATION_SUCCESS: Gate is OPEN", LogLevel::Info);
            }
            (GateState::Warning, Ok(verdict)) => {
                let adjustments = if verdict.logic_gate.adjustments_required.is_empty() {
                    "none listed".to_string()
                } else {
                    verdict.logic_gate.adjustments_required.join("; ")
                };
                self.log.append(
                    format!("VERIFICATION_WARNING: Gate is OPEN with adjustments: {adjustments}"),
                    LogLevel::Warn,
                );
            }
            (GateState::Blocked(BlockReason::Violation), _) => {
                self.log.append("CRITICAL: PHYSICAL LAW VIOLATION DETECTED", LogLevel::Crit);
            }
            (GateState::Blocked(_), _) => {
                self.log.append(
                    "VERIFICATION_BLOCKED: Safety Governor Engaged (no verdict available).",
                    LogLevel::Warn,
                );
            }
            _ => {}
        }
        self.state = next;
        debug!(generation = ticket.generation, state = %next, "gate resolved");
        Some(next)
    }
}
