//! End-to-end pipeline scenarios: session → client → validator → gate →
//! forensic reconstruction, driven by a scripted in-process oracle.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use physician_kernel::forensic::{FALLBACK_GOVERNOR_PATCH, FALLBACK_PRIMARY_LAW};
use physician_runtime::{
    BlockReason, BridgeOracle, GateState, Oracle, VerificationRequest, VerificationSession,
};
use physician_types::{
    LogLevel, MissingInput, OracleError, PipelineError, Status, TelemetryFrame, ValidationError,
};
use tokio::sync::Notify;

// ─────────────────────────────────────────────────────────────────────────────
// Fixtures
// ─────────────────────────────────────────────────────────────────────────────

const INTENT: &str = "Pick up the glass bottle";

const PASS: &str = r#"{
    "agent_type": "Robotic Arm",
    "status": "PASS",
    "logic_trace": "Bottle mass 0.4 kg is within the 2 kg payload; grip is stable.",
    "physics_overrides": [],
    "kinematics": {"mass_estimation": "0.4 kg", "friction_coefficient": "0.6", "center_of_mass": "lower third"},
    "contextual_risks": ["glass is fragile"],
    "logic_gate": {"safety_constraints": ["grip force < 20 N"], "adjustments_required": [], "final_verdict": "OPEN"},
    "simulation_outcome": "Bottle lifted without slip."
}"#;

const FAIL_FULL: &str = r#"{
    "agent_type": "Robotic Arm",
    "status": "FAIL",
    "logic_trace": "Payload exceeds joint torque limits.",
    "physics_overrides": [{"parameter": "max_payload", "value": "2 kg"}],
    "kinematics": {"mass_estimation": "45 kg", "friction_coefficient": 0.2, "center_of_mass": "outside support polygon"},
    "contextual_risks": ["tip-over"],
    "logic_gate": {"safety_constraints": ["torque < 40 Nm"], "adjustments_required": ["abort"], "final_verdict": "CLOSED"},
    "simulation_outcome": "Arm topples forward.",
    "forensic_report": {
        "failure_signature": "Topple Event > 45deg",
        "primary_law_violated": "Static Torque Equilibrium",
        "reconstruction_analysis": "Centre of mass left the base footprint during lift.",
        "governor_patch": "Cap payload at 2 kg."
    }
}"#;

const FAIL_PARTIAL: &str = r#"{
    "agent_type": "Robotic Arm",
    "status": "FAIL",
    "logic_trace": "Hydraulic pressure loss under load.",
    "physics_overrides": [],
    "kinematics": {"mass_estimation": "3 kg", "friction_coefficient": "0.4", "center_of_mass": "gripper"},
    "contextual_risks": [],
    "logic_gate": {"safety_constraints": [], "adjustments_required": [], "final_verdict": "CLOSED"},
    "simulation_outcome": "Bottle dropped.",
    "forensic_report": {
        "failure_signature": "Grip Shear Failure",
        "reconstruction_analysis": "Pressure decayed mid-lift.",
        "governor_patch": ""
    }
}"#;

const PASS_WITH_FORENSICS: &str = r#"{
    "agent_type": "Robotic Arm",
    "status": "PASS",
    "logic_trace": "ok",
    "physics_overrides": [],
    "kinematics": {"mass_estimation": "1", "friction_coefficient": "1", "center_of_mass": "c"},
    "contextual_risks": [],
    "logic_gate": {"safety_constraints": [], "adjustments_required": [], "final_verdict": "OPEN"},
    "simulation_outcome": "ok",
    "forensic_report": {
        "failure_signature": "x", "primary_law_violated": "y",
        "reconstruction_analysis": "z", "governor_patch": "w"
    }
}"#;

type Reply = Result<String, OracleError>;

/// Oracle that answers from a script, counts calls and can be held until
/// released.
struct ScriptedOracle {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<VerificationRequest>>,
    calls: AtomicUsize,
    hold: Option<Arc<Notify>>,
}

impl ScriptedOracle {
    fn new(replies: impl IntoIterator<Item = &'static str>) -> Arc<Self> {
        Arc::new(Self::from_replies(replies.into_iter().map(|r| Ok(r.to_string())), None))
    }

    /// Every call waits for a `notify_one` on the returned handle.
    fn held(replies: impl IntoIterator<Item = &'static str>) -> (Arc<Self>, Arc<Notify>) {
        let release = Arc::new(Notify::new());
        let oracle = Self::from_replies(
            replies.into_iter().map(|r| Ok(r.to_string())),
            Some(release.clone()),
        );
        (Arc::new(oracle), release)
    }

    fn failing(error: OracleError) -> Arc<Self> {
        Arc::new(Self::from_replies([Err(error)], None))
    }

    fn from_replies(replies: impl IntoIterator<Item = Reply>, hold: Option<Arc<Notify>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            hold,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn requests(&self) -> Vec<VerificationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn consult(&self, request: &VerificationRequest) -> Result<String, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if let Some(release) = &self.hold {
            release.notified().await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(OracleError::Protocol("script exhausted".into())))
    }
}

fn frame() -> TelemetryFrame {
    TelemetryFrame::new(b"\xFF\xD8\xFF\xE0bench".to_vec(), "image/jpeg").with_file_name("bench.jpg")
}

fn session(oracle: Arc<ScriptedOracle>) -> VerificationSession {
    let session = VerificationSession::new(oracle, Duration::from_secs(5));
    session.select_frame(frame());
    session.set_intent(INTENT);
    session
}

async fn wait_for_calls(oracle: &ScriptedOracle, n: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while oracle.calls() < n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("oracle was never called");
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenarios
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn pass_verdict_opens_gate() {
    let oracle = ScriptedOracle::new([PASS]);
    let s = session(oracle.clone());

    assert_eq!(s.verify().await, Ok(GateState::Open));

    let snap = s.snapshot();
    assert_eq!(snap.gate, GateState::Open);
    assert!(snap.forensic.is_none());
    assert!(snap.last_error.is_none());
    assert_eq!(snap.verdict.unwrap().status, Status::Pass);
    assert!(
        s.log()
            .entries()
            .iter()
            .any(|e| e.level == LogLevel::Info && e.message == "VERIFICATION_SUCCESS: Gate is OPEN")
    );
    assert_eq!(oracle.requests()[0].command, INTENT);
}

#[tokio::test]
async fn fail_verdict_blocks_and_passes_forensics_through() {
    let s = session(ScriptedOracle::new([FAIL_FULL]));

    assert_eq!(s.verify().await, Ok(GateState::Blocked(BlockReason::Violation)));

    let snap = s.snapshot();
    let report = snap.forensic.expect("forensic report");
    assert_eq!(report.failure_signature, "Topple Event > 45deg");
    assert_eq!(report.primary_law_violated, "Static Torque Equilibrium");
    assert_eq!(report.reconstruction_analysis, "Centre of mass left the base footprint during lift.");
    assert_eq!(report.governor_patch, "Cap payload at 2 kg.");
    assert_eq!(snap.verdict.unwrap().kinematics.friction_coefficient, "0.2");

    let crit: Vec<_> = s
        .log()
        .entries()
        .into_iter()
        .filter(|e| e.level == LogLevel::Crit)
        .map(|e| e.message)
        .collect();
    assert_eq!(
        crit,
        vec![
            "CRITICAL: PHYSICAL LAW VIOLATION DETECTED".to_string(),
            "INITIATING FORENSIC BLACK BOX RECOVERY...".to_string(),
        ]
    );
}

#[tokio::test]
async fn unreachable_bridge_blocks_without_forensics() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let s = VerificationSession::new(
        Arc::new(BridgeOracle::new(format!("http://{addr}"))),
        Duration::from_secs(5),
    );
    s.select_frame(frame());
    s.set_intent(INTENT);

    let err = s.verify().await.unwrap_err();
    assert!(matches!(err, PipelineError::BackendUnavailable(_)), "got {err:?}");

    let snap = s.snapshot();
    assert_eq!(snap.gate, GateState::Blocked(BlockReason::BackendUnavailable));
    assert!(snap.forensic.is_none());
    assert!(snap.verdict.is_none());
    assert_eq!(snap.last_error, Some(err));

    let crit: Vec<_> = s
        .log()
        .entries()
        .into_iter()
        .filter(|e| e.level == LogLevel::Crit)
        .collect();
    assert_eq!(crit.len(), 1);
    assert!(crit[0].message.starts_with("CONNECTION_ERROR"));
}

#[tokio::test]
async fn stress_test_runs_the_ordinary_chain() {
    let oracle = ScriptedOracle::new([PASS, FAIL_PARTIAL]);
    let s = session(oracle.clone());
    s.set_stress_test(true);

    // The oracle ignored the directive: the PASS is applied like any other.
    assert_eq!(s.verify().await, Ok(GateState::Open));
    s.reset();
    assert_eq!(s.verify().await, Ok(GateState::Blocked(BlockReason::Violation)));

    for request in oracle.requests() {
        assert_eq!(request.command, format!("OVERRIDE: {INTENT}"));
        assert!(request.is_stress_test());
    }
    assert!(
        s.log()
            .entries()
            .iter()
            .any(|e| e.message == "INITIATING STRESS TEST [SIMULATION]...")
    );
    assert!(s.snapshot().forensic.is_some());
}

#[tokio::test]
async fn missing_frame_is_refused_without_calling_the_oracle() {
    let oracle = ScriptedOracle::new([PASS]);
    let s = VerificationSession::new(oracle.clone(), Duration::from_secs(5));
    s.set_intent(INTENT);

    assert_eq!(
        s.verify().await,
        Err(PipelineError::MissingInput(MissingInput::Frame))
    );
    assert_eq!(s.snapshot().gate, GateState::Standby);
    assert_eq!(oracle.calls(), 0);

    let warn: Vec<_> = s
        .log()
        .entries()
        .into_iter()
        .filter(|e| e.level == LogLevel::Warn)
        .collect();
    assert_eq!(warn.len(), 1);
    assert_eq!(warn[0].message, "MISSING_TELEMETRY: No visual input source.");
}

// ─────────────────────────────────────────────────────────────────────────────
// Properties
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn partial_forensic_report_is_completed_with_fallbacks() {
    let s = session(ScriptedOracle::new([FAIL_PARTIAL]));
    s.verify().await.unwrap();

    let report = s.snapshot().forensic.unwrap();
    assert_eq!(report.failure_signature, "Grip Shear Failure");
    assert_eq!(report.primary_law_violated, FALLBACK_PRIMARY_LAW);
    assert_eq!(report.reconstruction_analysis, "Pressure decayed mid-lift.");
    assert_eq!(report.governor_patch, FALLBACK_GOVERNOR_PATCH);

    let fallback = s
        .log()
        .entries()
        .into_iter()
        .find(|e| e.message.starts_with("FORENSIC_FALLBACK"))
        .expect("fallback entry");
    assert_eq!(fallback.level, LogLevel::Sys);
    assert!(fallback.message.contains("primary_law_violated, governor_patch"));
}

#[tokio::test]
async fn repeated_verification_of_same_input_is_idempotent() {
    let oracle = ScriptedOracle::new([PASS, PASS]);
    let s = session(oracle.clone());

    let first = s.verify().await;
    let verdict = s.snapshot().verdict;
    let second = s.verify().await;

    assert_eq!(first, second);
    assert_eq!(s.snapshot().verdict, verdict);
    assert_eq!(oracle.calls(), 2);
    assert_eq!(s.history().len(), 2);
}

#[tokio::test]
async fn second_request_while_in_flight_is_refused() {
    let (oracle, release) = ScriptedOracle::held([PASS]);
    let s = Arc::new(session(oracle.clone()));

    let pending = tokio::spawn({
        let s = s.clone();
        async move { s.verify().await }
    });
    wait_for_calls(&oracle, 1).await;

    assert_eq!(s.snapshot().gate, GateState::Verifying);
    let entries_before = s.log().len();
    assert_eq!(s.verify().await, Err(PipelineError::AlreadyInProgress));
    assert_eq!(s.log().len(), entries_before, "refusal is not logged");

    release.notify_one();
    assert_eq!(pending.await.unwrap(), Ok(GateState::Open));
    assert_eq!(oracle.calls(), 1);
}

#[tokio::test]
async fn dropped_verification_releases_the_gate() {
    let (oracle, release) = ScriptedOracle::held([PASS, PASS]);
    let s = session(oracle.clone());

    let cancelled = tokio::time::timeout(Duration::from_millis(50), s.verify()).await;
    assert!(cancelled.is_err(), "the held call should outlive the caller's deadline");
    assert_eq!(oracle.calls(), 1);

    let snap = s.snapshot();
    assert_eq!(snap.gate, GateState::Standby);
    assert!(!snap.in_flight);
    assert!(
        s.log()
            .entries()
            .iter()
            .any(|e| e.level == LogLevel::Sys && e.message.starts_with("ABANDONED_REQUEST"))
    );

    release.notify_one();
    assert_eq!(s.verify().await, Ok(GateState::Open));
    assert_eq!(oracle.calls(), 2);
    assert_eq!(s.history().len(), 1);
}

#[tokio::test]
async fn aborted_verification_task_does_not_lock_the_session() {
    let (oracle, release) = ScriptedOracle::held([PASS]);
    let s = Arc::new(session(oracle.clone()));

    let pending = tokio::spawn({
        let s = s.clone();
        async move { s.verify().await }
    });
    wait_for_calls(&oracle, 1).await;
    pending.abort();
    assert!(pending.await.unwrap_err().is_cancelled());

    s.reset();
    assert!(!s.snapshot().in_flight);
    release.notify_one();
    assert_eq!(s.verify().await, Ok(GateState::Open));
    assert_eq!(oracle.calls(), 2, "a fresh call reached the oracle");
}

#[tokio::test]
async fn result_for_superseded_frame_is_discarded() {
    let (oracle, release) = ScriptedOracle::held([FAIL_FULL, PASS]);
    let s = Arc::new(session(oracle.clone()));

    let pending = tokio::spawn({
        let s = s.clone();
        async move { s.verify().await }
    });
    wait_for_calls(&oracle, 1).await;

    s.set_intent("Place the bottle on the shelf");
    assert_eq!(s.snapshot().gate, GateState::Standby);
    // The superseded call is still outstanding.
    assert_eq!(s.verify().await, Err(PipelineError::AlreadyInProgress));

    release.notify_one();
    assert_eq!(pending.await.unwrap(), Ok(GateState::Standby));

    let snap = s.snapshot();
    assert_eq!(snap.gate, GateState::Standby);
    assert!(snap.verdict.is_none());
    assert!(snap.forensic.is_none());
    assert!(s.history().is_empty());
    assert!(
        s.log()
            .entries()
            .iter()
            .any(|e| e.level == LogLevel::Sys && e.message.starts_with("STALE_RESULT"))
    );
    assert_eq!(s.log().count(LogLevel::Crit), 0);

    // The new generation verifies normally.
    release.notify_one();
    assert_eq!(s.verify().await, Ok(GateState::Open));
    assert_eq!(oracle.requests()[1].intent, "Place the bottle on the shelf");
}

#[tokio::test]
async fn malformed_answer_blocks_and_session_recovers() {
    let oracle = Arc::new(ScriptedOracle::from_replies(
        [Ok("<html>502 Bad Gateway</html>".to_string()), Ok(PASS.to_string())],
        None,
    ));
    let s = session(oracle);

    let err = s.verify().await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::MalformedResponse(ValidationError::Parse(_))
    ));
    let snap = s.snapshot();
    assert_eq!(snap.gate, GateState::Blocked(BlockReason::MalformedResponse));
    assert!(snap.forensic.is_none());

    assert_eq!(s.verify().await, Ok(GateState::Open));
    assert!(s.snapshot().last_error.is_none());
}

#[tokio::test]
async fn forensic_report_on_pass_is_a_semantic_mismatch() {
    let s = session(ScriptedOracle::new([PASS_WITH_FORENSICS]));

    let err = s.verify().await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::MalformedResponse(ValidationError::SemanticMismatch(_))
    ));
    assert_eq!(s.snapshot().gate, GateState::Blocked(BlockReason::MalformedResponse));
    assert!(
        s.log()
            .entries()
            .iter()
            .any(|e| e.level == LogLevel::Crit && e.message.starts_with("SEMANTIC_MISMATCH"))
    );
}

#[tokio::test]
async fn silent_oracle_times_out_as_backend_unavailable() {
    let (oracle, _release) = ScriptedOracle::held([PASS]);
    let s = VerificationSession::new(oracle.clone(), Duration::from_millis(50));
    s.select_frame(frame());
    s.set_intent(INTENT);

    assert_eq!(
        s.verify().await,
        Err(PipelineError::BackendUnavailable(OracleError::Timeout(
            Duration::from_millis(50)
        )))
    );
    let snap = s.snapshot();
    assert_eq!(snap.gate, GateState::Blocked(BlockReason::BackendUnavailable));
    assert!(!snap.in_flight, "a timed-out call no longer counts as in flight");
}

#[tokio::test]
async fn oracle_error_leaves_no_verdict_behind() {
    let s = session(ScriptedOracle::failing(OracleError::Status(503)));
    s.verify().await.unwrap_err();
    let snap = s.snapshot();
    assert!(snap.verdict.is_none());
    assert_eq!(
        snap.last_error,
        Some(PipelineError::BackendUnavailable(OracleError::Status(503)))
    );
}

#[tokio::test]
async fn live_subscribers_see_entries_in_order() {
    let s = session(ScriptedOracle::new([PASS]));
    let mut live = s.log().subscribe();
    s.verify().await.unwrap();

    let mut messages = Vec::new();
    while let Ok(entry) = live.try_recv() {
        messages.push(entry.message);
    }
    assert_eq!(messages.len(), 3);
    assert!(messages[0].starts_with("Synchronizing"));
    assert!(messages[1].starts_with("ORACLE_RESPONSE"));
    assert_eq!(messages[2], "VERIFICATION_SUCCESS: Gate is OPEN");
}
