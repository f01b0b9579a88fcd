// src/console.rs

//! Interactive operator console.
//!
//! Reads one command per line, turns it into [`Controller`] calls and echoes
//! status changes as they happen. Lines are parsed with `clap` in multicall
//! mode, so every line reads like a small command invocation:
//!
//! ```text
//! start combined
//! set-script lane /opt/lane/detect.py
//! stop
//! quit
//! ```

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tracing::debug;

use crate::engine::Controller;
use crate::errors::Result;
use crate::report::StatusSnapshot;
use crate::types::ModelKind;

#[derive(Debug, Parser)]
#[command(multicall = true, disable_help_subcommand = true)]
struct ConsoleLine {
    #[command(subcommand)]
    command: ConsoleCommand,
}

/// One console command.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum ConsoleCommand {
    /// Switch to a model (stops whatever runs).
    Start {
        #[arg(value_enum)]
        model: ModelKind,
    },
    /// Stop the current model.
    Stop,
    /// Print the current status line.
    Status,
    /// Check the interpreter.
    TestEnv,
    /// Change the script used on the next start of a model.
    SetScript {
        #[arg(value_enum)]
        model: ModelKind,
        /// Script path: the rest of the line, spaces included.
        #[arg(allow_hyphen_values = true)]
        path: String,
    },
    /// Change the interpreter used on the next start.
    SetInterpreter { name: String },
    /// List commands.
    Help,
    /// Stop everything and leave.
    #[command(alias = "exit")]
    Quit,
}

/// Parse one input line. `Ok(None)` for blank lines.
pub fn parse_line(line: &str) -> std::result::Result<Option<ConsoleCommand>, String> {
    let words = split_line(line);
    if words.is_empty() {
        return Ok(None);
    }
    ConsoleLine::try_parse_from(words)
        .map(|parsed| Some(parsed.command))
        .map_err(|e| e.to_string().trim_end().to_string())
}

/// Split on whitespace, except that `set-script` keeps everything after the
/// model token as one verbatim path.
fn split_line(line: &str) -> Vec<&str> {
    let line = line.trim();
    let Some((command, rest)) = line.split_once(char::is_whitespace) else {
        return if line.is_empty() { Vec::new() } else { vec![line] };
    };
    if command != "set-script" {
        return line.split_whitespace().collect();
    }
    let rest = rest.trim_start();
    match rest.split_once(char::is_whitespace) {
        Some((model, path)) => vec![command, model, path.trim_start()],
        None => vec![command, rest],
    }
}

const HELP: &str = "\
commands:
  start <none|traffic|drowsiness|lane|combined>
  stop
  status
  test-env
  set-script <model> <path>
  set-interpreter <name>
  quit
";

/// Run the console until `quit`, end of input or the runtime stopping,
/// then request shutdown.
pub async fn run_console<R, W>(
    input: R,
    mut out: W,
    controller: Controller,
    mut status: watch::Receiver<StatusSnapshot>,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    let initial = status.borrow_and_update().status_line();
    write_line(&mut out, &initial).await?;

    loop {
        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    debug!("runtime stopped; leaving console");
                    break;
                }
                let line = status.borrow_and_update().status_line();
                write_line(&mut out, &line).await?;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!("console input closed");
                    break;
                };
                match parse_line(&line) {
                    Ok(None) => {}
                    Ok(Some(ConsoleCommand::Quit)) => break,
                    Ok(Some(command)) => {
                        if let Some(reply) = dispatch(&controller, &status, command)? {
                            write_line(&mut out, &reply).await?;
                        }
                    }
                    Err(message) => write_line(&mut out, &message).await?,
                }
            }
        }
    }

    if controller.shutdown().is_err() {
        debug!("runtime already stopped");
    }
    out.flush().await?;
    Ok(())
}

fn dispatch(
    controller: &Controller,
    status: &watch::Receiver<StatusSnapshot>,
    command: ConsoleCommand,
) -> Result<Option<String>> {
    let reply = match command {
        ConsoleCommand::Start { model } => {
            controller.start_model(model)?;
            None
        }
        ConsoleCommand::Stop => {
            controller.stop_current_model()?;
            None
        }
        ConsoleCommand::Status => Some(status.borrow().status_line()),
        ConsoleCommand::TestEnv => {
            controller.test_environment()?;
            None
        }
        ConsoleCommand::SetScript { model, path } => {
            controller.set_script_path(model, path.clone())?;
            Some(format!("{} script set to {path}", model.label()))
        }
        ConsoleCommand::SetInterpreter { name } => {
            controller.set_interpreter(name.clone())?;
            Some(format!("interpreter set to {name}"))
        }
        ConsoleCommand::Help => Some(HELP.trim_end().to_string()),
        ConsoleCommand::Quit => None,
    };
    Ok(reply)
}

async fn write_line<W: AsyncWrite + Unpin>(out: &mut W, line: &str) -> Result<()> {
    out.write_all(line.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await?;
    Ok(())
}
