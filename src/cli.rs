// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

use crate::types::ModelKind;

/// Command-line arguments for `neurodrive`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "neurodrive",
    version,
    about = "Switch between computer-vision worker scripts and supervise them.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Neurodrive.toml` in the current working directory. When the
    /// default file does not exist, built-in worker paths are used.
    #[arg(long, value_name = "PATH", default_value = "Neurodrive.toml", global = true)]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `NEURODRIVE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    /// Interpreter to run worker scripts with, skipping detection.
    #[arg(long, value_name = "NAME", global = true)]
    pub interpreter: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl CliArgs {
    /// The subcommand, `console` when none was given.
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Console)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Start one model and supervise it until its workers exit or Ctrl-C.
    Run {
        #[arg(value_enum)]
        model: ModelKind,
    },
    /// Interactive operator console reading commands from stdin.
    Console,
    /// Check that the interpreter answers `--version`.
    TestEnv,
    /// Print the resolved configuration without starting anything.
    ShowConfig,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_is_the_default_command() {
        let args = CliArgs::try_parse_from(["neurodrive"]).expect("parse");
        assert_eq!(args.command(), Command::Console);
        assert_eq!(args.config, "Neurodrive.toml");
    }

    #[test]
    fn run_takes_a_model_alias() {
        let args = CliArgs::try_parse_from([
            "neurodrive",
            "--interpreter",
            "python3.11",
            "run",
            "traffic",
        ])
        .expect("parse");
        assert_eq!(
            args.command(),
            Command::Run {
                model: ModelKind::TrafficSignRecognition
            }
        );
        assert_eq!(args.interpreter.as_deref(), Some("python3.11"));
    }

    #[test]
    fn global_flags_after_subcommand() {
        let args = CliArgs::try_parse_from(["neurodrive", "show-config", "--config", "x.toml"])
            .expect("parse");
        assert_eq!(args.command(), Command::ShowConfig);
        assert_eq!(args.config, "x.toml");
    }
}
