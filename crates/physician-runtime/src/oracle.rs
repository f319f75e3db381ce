//! The Oracle capability.
//!
//! The pipeline never speaks to a specific reasoning backend.  It holds an
//! `Arc<dyn Oracle>` and asks it one question per request: "here is a
//! [`VerificationRequest`], give me your verdict document".  Parsing and
//! validating that document is the [`VerificationClient`]'s job, so every
//! backend is held to the same schema.
//!
//! Provided backends:
//! - [`BridgeOracle`][crate::bridge::BridgeOracle] – multipart upload to an
//!   HTTP bridge that fronts the reasoning model.
//! - [`LlmOracle`][crate::llm_oracle::LlmOracle] – direct vision request to
//!   an OpenAI-compatible chat-completions endpoint.
//!
//! [`VerificationClient`]: crate::client::VerificationClient

use async_trait::async_trait;
use physician_types::OracleError;

use crate::request::VerificationRequest;

/// A physics-reasoning backend.
///
/// # Contract
///
/// * `consult` sends `request` exactly once and returns the raw JSON verdict
///   document on transport success.  It must not retry internally and must
///   never fabricate a document on failure.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Short backend name used in log entries and spans.
    fn name(&self) -> &str;

    /// Submit `request` and return the verdict document body.
    async fn consult(&self, request: &VerificationRequest) -> Result<String, OracleError>;
}
