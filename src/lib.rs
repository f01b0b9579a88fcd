// src/lib.rs

pub mod cli;
pub mod config;
pub mod console;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod report;
pub mod types;
pub mod worker;

use anyhow::{Context, Result, bail};
use tokio::io::BufReader;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, Command};
use crate::config::{ConfigFile, Settings, load_or_default};
use crate::engine::{Controller, RuntimeOptions, assemble};
use crate::exec::{ProcessLauncher, check_interpreter, resolve_interpreter};
use crate::report::{StatusReporter, StatusSnapshot};
use crate::types::ModelKind;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and interpreter resolution
/// - orchestrator / runtime / status reporter
/// - the console or a single `run`
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_or_default(&args.config)
        .with_context(|| format!("failed to load config from {}", args.config))?;

    let interpreter = resolve_interpreter(
        args.interpreter.as_deref(),
        cfg.config.interpreter.as_deref(),
        &cfg.config.interpreter_candidates,
        std::time::Duration::from_millis(cfg.config.probe_timeout_ms),
    )
    .await;
    info!(%interpreter, "using interpreter");

    let settings = Settings::from_config(&cfg, interpreter);

    match args.command() {
        Command::ShowConfig => {
            print_dry_run(&cfg, &settings);
            Ok(())
        }
        Command::TestEnv => {
            let report = check_interpreter(settings.interpreter(), settings.probe_timeout()).await;
            println!("{}", report.summary());
            if !report.success {
                bail!("environment check failed");
            }
            Ok(())
        }
        Command::Run { model } => run_model(settings, model).await,
        Command::Console => run_interactive(settings).await,
    }
}

/// Start `model` and supervise it until its workers are gone or Ctrl-C.
async fn run_model(settings: Settings, model: ModelKind) -> Result<()> {
    if model == ModelKind::None {
        bail!("nothing to run: pick a model other than none");
    }

    let launcher = ProcessLauncher::from_settings(&settings);
    let assembled = assemble(
        settings,
        launcher,
        RuntimeOptions {
            exit_when_idle: true,
        },
    );

    let (reporter, status) = StatusReporter::spawn(assembled.events);
    let printer = spawn_status_printer(status.clone());
    spawn_ctrl_c(assembled.controller.clone());

    assembled.controller.start_model(model)?;
    assembled.runtime.run().await?;

    if let Err(err) = reporter.await {
        warn!(error = %err, "status reporter task failed");
    }
    if let Err(err) = printer.await {
        warn!(error = %err, "status printer task failed");
    }

    let last = status.borrow().clone();
    match last.last_error {
        Some(err) => bail!("{} ended with an error: {err}", model.label()),
        None => Ok(()),
    }
}

/// Operator console on stdin/stdout.
async fn run_interactive(settings: Settings) -> Result<()> {
    let launcher = ProcessLauncher::from_settings(&settings);
    let assembled = assemble(settings, launcher, RuntimeOptions::default());

    let (reporter, status) = StatusReporter::spawn(assembled.events);
    spawn_ctrl_c(assembled.controller.clone());

    let runtime = tokio::spawn(assembled.runtime.run());

    console::run_console(
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        assembled.controller,
        status,
    )
    .await?;

    runtime.await.context("runtime task failed")??;
    if let Err(err) = reporter.await {
        warn!(error = %err, "status reporter task failed");
    }
    Ok(())
}

fn spawn_status_printer(
    mut status: watch::Receiver<StatusSnapshot>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let line = status.borrow_and_update().status_line();
            println!("{line}");
        }
    })
}

// Ctrl-C → graceful shutdown.
fn spawn_ctrl_c(controller: Controller) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("failed to listen for Ctrl+C: {e}");
            return;
        }
        info!("Ctrl+C received; stopping workers");
        if controller.shutdown().is_err() {
            debug!("runtime already stopped");
        }
    });
}

/// Simple dry-run output: print the resolved settings, nothing is started.
fn print_dry_run(cfg: &ConfigFile, settings: &Settings) {
    println!("neurodrive configuration");
    println!("  interpreter = {}", settings.interpreter());
    println!(
        "  interpreter_candidates = {:?}",
        cfg.config.interpreter_candidates
    );
    println!("  grace_timeout_ms = {}", cfg.config.grace_timeout_ms);
    println!("  kill_timeout_ms = {}", cfg.config.kill_timeout_ms);
    println!("  probe_timeout_ms = {}", cfg.config.probe_timeout_ms);
    println!("  output_history_lines = {}", cfg.config.output_history_lines);
    println!();

    println!("workers:");
    for (kind, script) in settings.workers() {
        println!("  - {kind} ({})", kind.label());
        if script.script.trim().is_empty() {
            println!("      script: <not configured>");
        } else {
            println!("      script: {}", script.script);
        }
        if !script.args.is_empty() {
            println!("      args: {:?}", script.args);
        }
    }

    println!();
    println!("models:");
    for kind in ModelKind::WORKER_SLOTS {
        let slots: Vec<&str> = kind.constituents().iter().map(|k| k.id()).collect();
        println!("  - {kind}: {}", slots.join(", "));
    }

    debug!("dry-run complete (no execution)");
}
