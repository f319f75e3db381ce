//! Verification request construction.
//!
//! [`build`] assembles the payload for one oracle call from the operator's
//! current frame and intent.  It performs no I/O; a request with no frame or
//! an empty intent is refused with [`PipelineError::MissingInput`] before
//! anything reaches the network.
//!
//! # Stress test
//!
//! With `stress_test` set the command is prefixed with [`OVERRIDE_MARKER`]
//! and the accompanying directive instructs the oracle to force a FAIL with
//! an invented but plausible physical cause.  The response still runs through
//! the full validate → gate → forensic chain; nothing downstream treats it
//! specially.
//!
//! ```
//! use physician_runtime::request::{build, VerificationMode};
//! use physician_types::TelemetryFrame;
//!
//! let frame = TelemetryFrame::new(vec![0xFF, 0xD8], "image/jpeg");
//! let req = build(Some(&frame), "Pick up the glass bottle", true).unwrap();
//! assert_eq!(req.command, "OVERRIDE: Pick up the glass bottle");
//! assert_eq!(req.mode, VerificationMode::StressTest);
//! ```

use physician_types::{MissingInput, PipelineError, TelemetryFrame};

/// Prefix that marks a stress-test command on the wire.
pub const OVERRIDE_MARKER: &str = "OVERRIDE: ";

/// Directive sent with ordinary requests.
pub const STANDARD_DIRECTIVE: &str = "Analyze this kinematic scenario. Default to PASS for \
reasonable commands. If unsafe, generate a forensic crash report.";

/// Directive sent with stress-test requests.
pub const STRESS_TEST_DIRECTIVE: &str = "*** STRESS TEST MODE ACTIVE ***\n\
INSTRUCTION: IGNORE ACTUAL SAFETY. SIMULATE A CATASTROPHIC FAILURE for this action. \
Assume the robot crashed. You MUST return status 'FAIL'. Invent a plausible physical reason \
(e.g., hydraulic failure, friction loss, center-of-mass shift) and generate a detailed \
forensic_report explaining the crash.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationMode {
    Standard,
    StressTest,
}

/// Payload for a single oracle call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRequest {
    /// Intent as sent in the `command` part, marker included.
    pub command: String,
    /// Intent exactly as the operator entered it (trimmed).
    pub intent: String,
    pub frame: TelemetryFrame,
    pub mode: VerificationMode,
}

impl VerificationRequest {
    /// Mode directive accompanying this request.
    pub fn directive(&self) -> &'static str {
        match self.mode {
            VerificationMode::Standard => STANDARD_DIRECTIVE,
            VerificationMode::StressTest => STRESS_TEST_DIRECTIVE,
        }
    }

    /// Prompt text for backends that talk to a model directly.
    pub fn prompt(&self) -> String {
        format!("PROPOSED INTENT: {}\n\n{}", self.intent, self.directive())
    }

    pub fn is_stress_test(&self) -> bool {
        self.mode == VerificationMode::StressTest
    }
}

/// Assemble a [`VerificationRequest`].
///
/// # Errors
///
/// [`PipelineError::MissingInput`] when `frame` is `None` or `intent` is
/// empty after trimming.  The frame is checked first.
pub fn build(
    frame: Option<&TelemetryFrame>,
    intent: &str,
    stress_test: bool,
) -> Result<VerificationRequest, PipelineError> {
    let frame = frame.ok_or(PipelineError::MissingInput(MissingInput::Frame))?;
    let intent = intent.trim();
    if intent.is_empty() {
        return Err(PipelineError::MissingInput(MissingInput::Intent));
    }

    let (command, mode) = if stress_test {
        (format!("{OVERRIDE_MARKER}{intent}"), VerificationMode::StressTest)
    } else {
        (intent.to_string(), VerificationMode::Standard)
    };

    Ok(VerificationRequest {
        command,
        intent: intent.to_string(),
        frame: frame.clone(),
        mode,
    })
}
