//! `physician-runtime` – Oracle I/O & Session Orchestration
//!
//! Everything that talks to the outside world or awaits lives here; the
//! deterministic verdict handling it drives is in `physician-kernel`.
//!
//! # Modules
//!
//! - [`request`] – [`build`][request::build]: assembles a
//!   [`VerificationRequest`][request::VerificationRequest] from the frame,
//!   intent and stress-test flag, refusing missing input before any I/O.
//! - [`oracle`] – the [`Oracle`][oracle::Oracle] capability trait.  The
//!   pipeline depends on nothing else about the reasoning backend.
//! - [`bridge`] – [`BridgeOracle`][bridge::BridgeOracle]: multipart upload
//!   to an HTTP bridge (`POST {base}/verify`) plus a health probe.
//! - [`llm_oracle`] – [`LlmOracle`][llm_oracle::LlmOracle]: direct vision
//!   request to an OpenAI-compatible `/v1/chat/completions` endpoint with the
//!   [`Verdict`][physician_types::Verdict] JSON Schema injected via
//!   `response_format`.
//! - [`client`] – [`VerificationClient`][client::VerificationClient]: one
//!   timed oracle call, validated.  Never retries, never synthesizes.
//! - [`session`] – [`VerificationSession`][session::VerificationSession]:
//!   owns frame, intent, gate, verdict and forensic report; the only place
//!   state changes.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: global
//!   `tracing` subscriber with optional OTLP span export.

pub mod bridge;
pub mod client;
pub mod llm_oracle;
pub mod oracle;
pub mod request;
pub mod session;
pub mod telemetry;

#[cfg(test)]
mod test_http;

pub use bridge::{BridgeHealth, BridgeOracle};
pub use client::{DEFAULT_TIMEOUT, VerificationClient};
pub use llm_oracle::LlmOracle;
pub use oracle::Oracle;
pub use request::{VerificationMode, VerificationRequest};
pub use session::{FrameSummary, SessionSnapshot, VerdictRecord, VerificationSession};
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};

// Re-exported so front ends can render gate states without a direct
// dependency on physician-kernel.
pub use physician_kernel::{BlockReason, EventLog, GateState};
