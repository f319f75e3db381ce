//! `physician-types` – shared data model for the kinematic verification
//! pipeline.
//!
//! - [`verdict`] – the structured analysis contract returned by the oracle.
//! - [`TelemetryFrame`] – the single visual observation sent with a request.
//! - [`LogEntry`] / [`LogLevel`] – operator-facing lifecycle records.
//! - [`PipelineError`], [`ValidationError`], [`OracleError`] – the error
//!   taxonomy every pipeline stage resolves to.

pub mod verdict;

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use verdict::{
    FinalVerdict, ForensicDraft, ForensicReport, KinematicEstimate, LogicGate, PhysicsOverride,
    Status, Verdict,
};

/// One image representing the agent's current visual observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryFrame {
    /// Encoded image bytes (JPEG, PNG, …).
    pub data: Vec<u8>,
    /// Declared mime type, e.g. `"image/jpeg"`.
    pub mime_type: String,
    /// Original file name, forwarded to the bridge as the upload name.
    pub file_name: Option<String>,
}

impl TelemetryFrame {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
            file_name: None,
        }
    }

    /// Attach the upload file name (builder-style).
    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    /// Infer an image mime type from a file extension.
    pub fn mime_for_path(path: &Path) -> &'static str {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("jpg" | "jpeg") => "image/jpeg",
            Some("png") => "image/png",
            Some("webp") => "image/webp",
            Some("gif") => "image/gif",
            Some("bmp") => "image/bmp",
            _ => "application/octet-stream",
        }
    }
}

/// Severity of an operator log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warn,
    Crit,
    Sys,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Crit => write!(f, "CRIT"),
            LogLevel::Sys => write!(f, "SYS"),
        }
    }
}

/// Immutable record of a pipeline lifecycle milestone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    /// Stamp a new entry with a fresh id and the current time.
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            level,
            message: message.into(),
        }
    }
}

/// Which operator input was absent when a request was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingInput {
    Frame,
    Intent,
}

impl std::fmt::Display for MissingInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MissingInput::Frame => write!(f, "no telemetry frame selected"),
            MissingInput::Intent => write!(f, "intent is empty"),
        }
    }
}

/// Transport-level failure talking to the oracle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("oracle unreachable: {0}")]
    Unreachable(String),

    #[error("oracle did not answer within {0:?}")]
    Timeout(Duration),

    #[error("oracle returned HTTP {0}")]
    Status(u16),

    #[error("unusable oracle envelope: {0}")]
    Protocol(String),
}

/// Reasons an oracle response is rejected on ingest.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("response body is not valid JSON: {0}")]
    Parse(String),

    #[error("response does not match the verdict schema: {0}")]
    Schema(String),

    #[error("verdict violates the status/gate/forensic invariant: {0}")]
    SemanticMismatch(String),
}

/// Every failure the verification pipeline can resolve to.  None of them is
/// fatal to the session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Missing input: {0}")]
    MissingInput(MissingInput),

    #[error("A verification request is already in progress")]
    AlreadyInProgress,

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(#[from] OracleError),

    #[error("Malformed response: {0}")]
    MalformedResponse(#[from] ValidationError),
}

impl PipelineError {
    /// `true` for errors raised after a request reached the oracle.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            PipelineError::BackendUnavailable(_) | PipelineError::MalformedResponse(_)
        )
    }
}
