//! REPL – the operator console.
//!
//! Supported slash-commands:
//!   /frame <path>     – load an image file as the telemetry frame
//!   /intent <text>    – set the proposed intent
//!   /stress [on|off]  – arm / disarm stress-test mode (no argument toggles)
//!   /verify           – consult the oracle for the current frame + intent
//!   /status           – show gate, inputs and the current analysis
//!   /log              – print the full operator log
//!   /reset            – return the gate to STANDBY
//!   /probe            – bridge health check
//!   /help             – show this list
//!   /quit | /exit     – leave the console
//!
//! New operator log entries are echoed after every command.

use colored::{ColoredString, Colorize};
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use physician_runtime::{
    BlockReason, BridgeOracle, GateState, SessionSnapshot, VerificationSession,
};
use physician_types::{LogEntry, LogLevel, TelemetryFrame, Verdict};
use tokio::runtime::Runtime;

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Frame(String),
    Intent(String),
    /// `None` toggles.
    Stress(Option<bool>),
    Verify,
    Status,
    Log,
    Reset,
    Probe,
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Command, String> {
        let line = line.trim();
        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };
        match head {
            "/frame" if rest.is_empty() => Err("usage: /frame <path>".into()),
            "/frame" => Ok(Command::Frame(rest.to_string())),
            "/intent" => Ok(Command::Intent(rest.to_string())),
            "/stress" => match rest {
                "" => Ok(Command::Stress(None)),
                "on" => Ok(Command::Stress(Some(true))),
                "off" => Ok(Command::Stress(Some(false))),
                other => Err(format!("usage: /stress [on|off] (got '{other}')")),
            },
            "/verify" => Ok(Command::Verify),
            "/status" => Ok(Command::Status),
            "/log" => Ok(Command::Log),
            "/reset" => Ok(Command::Reset),
            "/probe" => Ok(Command::Probe),
            "/help" => Ok(Command::Help),
            "/quit" | "/exit" => Ok(Command::Quit),
            other => Err(format!("Unknown command: '{other}'")),
        }
    }
}

/// Entry point for the interactive console.
///
/// `shutdown` is polled each iteration; when set the loop exits cleanly.
pub fn run(
    rt: &Runtime,
    session: &VerificationSession,
    bridge: Option<&Arc<BridgeOracle>>,
    shutdown: Arc<AtomicBool>,
) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut echoed = session.log().len();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", "physician>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }
        if line.trim().is_empty() {
            continue;
        }

        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(msg) => {
                println!("{} Type {} for available commands.", msg.red(), "/help".bold());
                continue;
            }
        };

        let echo_new_entries = command != Command::Log;
        match command {
            Command::Frame(path) => cmd_frame(session, &path),
            Command::Intent(text) => {
                session.set_intent(text);
                println!("  Intent: {}", session.snapshot().intent.bold());
            }
            Command::Stress(flag) => {
                let enabled = flag.unwrap_or(!session.snapshot().stress_test);
                session.set_stress_test(enabled);
                let label = if enabled { "ARMED".red().bold() } else { "off".green() };
                println!("  Stress test: {label}");
            }
            Command::Verify => cmd_verify(rt, session),
            Command::Status => print_status(&session.snapshot()),
            Command::Log => {
                println!("{}", "Operator Log".bold().underline());
                for entry in session.log().entries() {
                    print_entry(&entry);
                }
            }
            Command::Reset => session.reset(),
            Command::Probe => cmd_probe(rt, bridge),
            Command::Help => cmd_help(),
            Command::Quit => {
                println!("{}", "Goodbye.".green());
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
        }

        if echo_new_entries {
            let entries = session.log().entries();
            for entry in entries.iter().skip(echoed) {
                print_entry(entry);
            }
            echoed = entries.len();
        } else {
            echoed = session.log().len();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "Physician Commands".bold().underline());
    println!("  {}   – load an image as the telemetry frame", "/frame <path>".bold().cyan());
    println!("  {}  – set the proposed intent", "/intent <text>".bold().cyan());
    println!("  {} – arm / disarm stress-test mode", "/stress [on|off]".bold().cyan());
    println!("  {}         – verify the current frame + intent", "/verify".bold().cyan());
    println!("  {}         – gate, inputs and current analysis", "/status".bold().cyan());
    println!("  {}            – full operator log", "/log".bold().cyan());
    println!("  {}          – return the gate to STANDBY", "/reset".bold().cyan());
    println!("  {}          – bridge health check", "/probe".bold().cyan());
    println!("  {}    – exit", "/quit  /exit".bold().cyan());
    println!();
}

fn cmd_frame(session: &VerificationSession, path: &str) {
    match load_frame(Path::new(path)) {
        Ok(frame) => {
            println!(
                "  Frame: {} ({}, {} bytes)",
                path.bold(),
                frame.mime_type,
                frame.data.len()
            );
            session.select_frame(frame);
        }
        Err(e) => println!("{}: {}", "Cannot load frame".red(), e),
    }
}

fn cmd_verify(rt: &Runtime, session: &VerificationSession) {
    println!("  Consulting {} …", session.oracle_name().dimmed());
    match rt.block_on(session.verify()) {
        Ok(GateState::Standby) => {
            println!("  {}", "Result discarded: inputs changed while verifying.".yellow());
        }
        Ok(_) => print_status(&session.snapshot()),
        Err(e) if e.is_remote() => {
            println!("  {} {}", "✗".red().bold(), e.to_string().red());
            print_status(&session.snapshot());
        }
        Err(e) => println!("  {} {}", "✗".yellow().bold(), e.to_string().yellow()),
    }
}

fn cmd_probe(rt: &Runtime, bridge: Option<&Arc<BridgeOracle>>) {
    let Some(bridge) = bridge else {
        println!("  {}", "/probe is only available with the bridge backend.".yellow());
        return;
    };
    print!("  Probing bridge at {} … ", bridge.base_url().dimmed());
    io::stdout().flush().ok();
    match rt.block_on(bridge.probe()) {
        Ok(health) if health.is_online() => println!(
            "{} {}",
            "online".green(),
            health.system.unwrap_or_default().dimmed()
        ),
        Ok(health) => println!("{} (status: {})", "degraded".yellow(), health.status),
        Err(e) => println!("{} {}", "offline".red(), e.to_string().dimmed()),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rendering
// ─────────────────────────────────────────────────────────────────────────────

fn print_status(snap: &SessionSnapshot) {
    println!();
    println!("  Gate     : {}", gate_label(snap.gate));
    match &snap.frame {
        Some(frame) => println!(
            "  Frame    : {} ({}, {} bytes)",
            frame.file_name.as_deref().unwrap_or("<unnamed>"),
            frame.mime_type,
            frame.bytes
        ),
        None => println!("  Frame    : {}", "none".dimmed()),
    }
    if snap.intent.trim().is_empty() {
        println!("  Intent   : {}", "none".dimmed());
    } else {
        println!("  Intent   : {}", snap.intent);
    }
    if snap.stress_test {
        println!("  Mode     : {}", "STRESS TEST".red().bold());
    }
    if let Some(verdict) = &snap.verdict {
        print_verdict(verdict);
    }
    if let Some(report) = &snap.forensic {
        println!();
        println!("{}", "  ── Forensic Black Box ──".red().bold());
        println!("  Failure signature : {}", report.failure_signature.bold());
        println!("  Law violated      : {}", report.primary_law_violated);
        println!("  Reconstruction    : {}", report.reconstruction_analysis);
        println!("  Governor patch    : {}", report.governor_patch.green());
    }
    if let Some(error) = &snap.last_error {
        println!("  Error    : {}", error.to_string().red());
    }
    println!();
}

fn print_verdict(verdict: &Verdict) {
    println!("  Agent    : {}", verdict.agent_type);
    println!("  Status   : {}", verdict.status.to_string().bold());
    println!("  Trace    : {}", verdict.logic_trace);
    let k = &verdict.kinematics;
    println!(
        "  Kinematics: mass {} · friction {} · CoM {}",
        k.mass_estimation, k.friction_coefficient, k.center_of_mass
    );
    for o in &verdict.physics_overrides {
        println!("  Override : {} = {}", o.parameter, o.value.yellow());
    }
    for risk in &verdict.contextual_risks {
        println!("  Risk     : {risk}");
    }
    for constraint in &verdict.logic_gate.safety_constraints {
        println!("  Constraint: {constraint}");
    }
    for adjustment in &verdict.logic_gate.adjustments_required {
        println!("  Adjust   : {}", adjustment.yellow());
    }
    println!("  Outcome  : {}", verdict.simulation_outcome);
}

fn gate_label(state: GateState) -> ColoredString {
    match state {
        GateState::Standby => "STANDBY".dimmed(),
        GateState::Verifying => "VERIFYING".cyan(),
        GateState::Open => "OPEN".green().bold(),
        GateState::Warning => "OPEN (WARNING)".yellow().bold(),
        GateState::Blocked(BlockReason::Violation) => "BLOCKED – physical violation".red().bold(),
        GateState::Blocked(BlockReason::BackendUnavailable) => {
            "BLOCKED – oracle unavailable".red()
        }
        GateState::Blocked(BlockReason::MalformedResponse) => {
            "BLOCKED – malformed oracle response".red()
        }
    }
}

fn print_entry(entry: &LogEntry) {
    let level = format!("{:<4}", entry.level.to_string());
    let level = match entry.level {
        LogLevel::Info => level.green(),
        LogLevel::Warn => level.yellow(),
        LogLevel::Crit => level.red().bold(),
        LogLevel::Sys => level.cyan(),
    };
    println!(
        "  {} {} {}",
        entry.timestamp.format("%H:%M:%S").to_string().dimmed(),
        level,
        entry.message
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Read an image file into a [`TelemetryFrame`].
pub(crate) fn load_frame(path: &Path) -> Result<TelemetryFrame, String> {
    let data = std::fs::read(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    if data.is_empty() {
        return Err(format!("{} is empty", path.display()));
    }
    let frame = TelemetryFrame::new(data, TelemetryFrame::mime_for_path(path));
    Ok(match path.file_name() {
        Some(name) => frame.with_file_name(name.to_string_lossy()),
        None => frame,
    })
}
