//! `physician-cli` – Physician Operator Console
//!
//! The `physician` binary wires the verification pipeline to a terminal:
//!
//! 1. Initialises tracing (`RUST_LOG`, `PHYSICIAN_LOG_FORMAT`, optional OTLP).
//! 2. Loads `~/.physician/config.toml`, writing defaults on first run.
//! 3. Builds the configured oracle backend and, for the bridge, probes it.
//! 4. Drops the operator into an interactive console (see [`repl`]).
//! 5. Intercepts **Ctrl-C** and leaves the console at the next prompt.

mod config;
mod repl;

use colored::Colorize;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use physician_runtime::{BridgeOracle, LlmOracle, Oracle, VerificationSession};

use crate::config::{Backend, Config};

fn main() {
    let _tracing = physician_runtime::init_tracing("physician");

    print_banner();

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – leaving the console …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler");
    }

    let cfg = load_config();
    info!(?cfg, "configuration resolved");

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start async runtime".red(), e);
            std::process::exit(1);
        }
    };

    let (oracle, bridge) = build_oracle(&cfg);
    println!(
        "  Backend  : {} (timeout {}s)",
        cfg.backend.to_string().bold(),
        cfg.request_timeout_secs
    );
    match &bridge {
        Some(bridge) => probe_bridge(&rt, bridge),
        None => println!("  Model    : {} at {}", cfg.llm_model.bold(), cfg.llm_url.dimmed()),
    }

    let session = VerificationSession::new(oracle, cfg.timeout());

    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    repl::run(&rt, &session, bridge.as_ref(), shutdown);
}

/// Load the config, creating it with defaults on first run.  Env overrides
/// are applied either way but never persisted.
fn load_config() -> Config {
    match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            match config::save(&Config::default()) {
                Ok(()) => println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Error saving config".red(), e),
            }
            let mut cfg = Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    }
}

/// The session's oracle, plus a typed handle to the bridge for `/probe`.
fn build_oracle(cfg: &Config) -> (Arc<dyn Oracle>, Option<Arc<BridgeOracle>>) {
    match cfg.backend {
        Backend::Bridge => {
            let bridge = Arc::new(BridgeOracle::new(cfg.bridge_url.as_str()));
            (bridge.clone() as Arc<dyn Oracle>, Some(bridge))
        }
        Backend::Llm => {
            let llm = LlmOracle::new(cfg.llm_url.as_str(), cfg.llm_model.as_str())
                .with_api_key(cfg.llm_api_key.as_str());
            (Arc::new(llm) as Arc<dyn Oracle>, None)
        }
    }
}

fn probe_bridge(rt: &tokio::runtime::Runtime, bridge: &BridgeOracle) {
    print!("  Probing bridge at {} … ", bridge.base_url().dimmed());
    std::io::stdout().flush().ok();
    match rt.block_on(bridge.probe()) {
        Ok(health) if health.is_online() => {
            println!("{}", "online".green());
            if let Some(system) = health.system {
                println!("  System   : {}", system.bold());
            }
        }
        Ok(health) => println!("{} (status: {})", "degraded".yellow(), health.status),
        Err(e) => {
            println!("{}", "offline".yellow());
            println!(
                "  {}  Start the bridge, then run {}.",
                e.to_string().dimmed(),
                "/probe".bold()
            );
        }
    }
}

fn print_banner() {
    println!();
    println!("{}", r#"    ___  __ __ __  __ _____ ____ _____ ____ ___    _   __"#.bold().cyan());
    println!("{}", r#"   / _ \/ // / \ \/ // ___//  _// ___//  _//   |  / | / /"#.bold().cyan());
    println!("{}", r#"  / ___/ _  /   \  /(__  )_/ / / /__ _/ / / /| | /  |/ / "#.bold().cyan());
    println!("{}", r#" /_/  /_//_/    /_//____//___/ \___//___//_/ |_|/_/|_/   "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "PHYSICIAN".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Kinematic verification gate for physical agents");
    println!();
}
