// src/types.rs

//! Core value types shared by the config, worker and engine layers.

use std::fmt;
use std::process::ExitStatus;
use std::str::FromStr;

use clap::ValueEnum;
use serde::Deserialize;

/// Analysis mode an operator can select.
///
/// `Combined` is the only composite kind: it runs the traffic-sign and
/// drowsiness workers plus a third "combined-extra" script, which lives in
/// the registry slot keyed by `Combined` itself.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    #[default]
    None,
    #[value(alias = "traffic", alias = "tsr")]
    TrafficSignRecognition,
    #[value(alias = "drowsy")]
    Drowsiness,
    #[value(alias = "lane")]
    LaneDetection,
    Combined,
}

impl ModelKind {
    /// Every kind that can own a worker slot.
    pub const WORKER_SLOTS: [ModelKind; 4] = [
        ModelKind::TrafficSignRecognition,
        ModelKind::Drowsiness,
        ModelKind::LaneDetection,
        ModelKind::Combined,
    ];

    /// Registry slots a model activation occupies, in spawn order.
    pub fn constituents(self) -> &'static [ModelKind] {
        match self {
            ModelKind::None => &[],
            ModelKind::TrafficSignRecognition => &[ModelKind::TrafficSignRecognition],
            ModelKind::Drowsiness => &[ModelKind::Drowsiness],
            ModelKind::LaneDetection => &[ModelKind::LaneDetection],
            ModelKind::Combined => &[
                ModelKind::TrafficSignRecognition,
                ModelKind::Drowsiness,
                ModelKind::Combined,
            ],
        }
    }

    pub fn is_composite(self) -> bool {
        self.constituents().len() > 1
    }

    /// Human-readable name used in status lines.
    pub fn label(self) -> &'static str {
        match self {
            ModelKind::None => "No model",
            ModelKind::TrafficSignRecognition => "Traffic sign recognition",
            ModelKind::Drowsiness => "Drowsiness detection",
            ModelKind::LaneDetection => "Lane detection",
            ModelKind::Combined => "Combined model",
        }
    }

    /// Identifier as used in config keys (`[worker.<id>]`).
    pub fn id(self) -> &'static str {
        match self {
            ModelKind::None => "none",
            ModelKind::TrafficSignRecognition => "traffic_sign_recognition",
            ModelKind::Drowsiness => "drowsiness",
            ModelKind::LaneDetection => "lane_detection",
            ModelKind::Combined => "combined",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <ModelKind as ValueEnum>::from_str(s.trim(), true)
            .or_else(|_| {
                ModelKind::WORKER_SLOTS
                    .into_iter()
                    .chain([ModelKind::None])
                    .find(|k| k.id() == s.trim().to_lowercase())
                    .ok_or(())
            })
            .map_err(|_| {
                format!(
                    "invalid model: {s} (expected none, traffic, drowsiness, lane or combined)"
                )
            })
    }
}

/// How a worker process ended, as far as the OS reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    /// The process returned an exit code.
    Normal,
    /// The process was terminated by a signal (or the code is unknown).
    Abnormal,
}

/// Exit code plus how the process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerExit {
    pub code: i32,
    pub kind: ExitKind,
}

impl WorkerExit {
    pub fn normal(code: i32) -> Self {
        Self {
            code,
            kind: ExitKind::Normal,
        }
    }

    /// Exit of a process that was killed (code unknown).
    pub fn killed() -> Self {
        Self {
            code: -1,
            kind: ExitKind::Abnormal,
        }
    }

    pub fn is_success(&self) -> bool {
        self.kind == ExitKind::Normal && self.code == 0
    }

    /// State of a worker that ended on its own with this exit.
    pub fn natural_state(self) -> WorkerState {
        match self.kind {
            ExitKind::Normal => WorkerState::Exited(self),
            ExitKind::Abnormal => WorkerState::Crashed,
        }
    }
}

impl From<ExitStatus> for WorkerExit {
    fn from(status: ExitStatus) -> Self {
        match status.code() {
            Some(code) => WorkerExit::normal(code),
            None => WorkerExit::killed(),
        }
    }
}

/// Lifecycle state of one worker handle.
///
/// `Starting` and `Running` are live; everything else is terminal and can
/// never go back to a live state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Starting,
    Running,
    Exited(WorkerExit),
    FailedToStart,
    Crashed,
}

impl WorkerState {
    pub fn is_terminal(&self) -> bool {
        !self.is_live()
    }

    pub fn is_live(&self) -> bool {
        matches!(self, WorkerState::Starting | WorkerState::Running)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Starting => f.write_str("starting"),
            WorkerState::Running => f.write_str("running"),
            WorkerState::Exited(exit) => match exit.kind {
                ExitKind::Normal => write!(f, "exited({})", exit.code),
                ExitKind::Abnormal => f.write_str("exited(abnormal)"),
            },
            WorkerState::FailedToStart => f.write_str("failed-to-start"),
            WorkerState::Crashed => f.write_str("crashed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_model_is_none() {
        assert_eq!(ModelKind::default(), ModelKind::None);
    }

    #[test]
    fn combined_spans_three_slots() {
        assert_eq!(
            ModelKind::Combined.constituents(),
            &[
                ModelKind::TrafficSignRecognition,
                ModelKind::Drowsiness,
                ModelKind::Combined
            ]
        );
        assert!(ModelKind::Combined.is_composite());
        assert!(ModelKind::None.constituents().is_empty());
        for kind in [
            ModelKind::TrafficSignRecognition,
            ModelKind::Drowsiness,
            ModelKind::LaneDetection,
        ] {
            assert_eq!(kind.constituents(), &[kind]);
        }
    }

    #[test]
    fn parses_aliases_and_config_ids() {
        assert_eq!("traffic".parse::<ModelKind>(), Ok(ModelKind::TrafficSignRecognition));
        assert_eq!("lane_detection".parse::<ModelKind>(), Ok(ModelKind::LaneDetection));
        assert_eq!("Lane-Detection".parse::<ModelKind>(), Ok(ModelKind::LaneDetection));
        assert_eq!("none".parse::<ModelKind>(), Ok(ModelKind::None));
        assert!("radar".parse::<ModelKind>().is_err());
    }

    #[test]
    fn terminal_states_are_not_live() {
        assert!(WorkerState::Starting.is_live());
        assert!(WorkerState::Running.is_live());
        assert!(WorkerState::FailedToStart.is_terminal());
        assert!(WorkerState::Crashed.is_terminal());
        assert!(WorkerState::Exited(WorkerExit::normal(0)).is_terminal());
    }

    #[test]
    fn abnormal_natural_exit_is_a_crash() {
        assert_eq!(WorkerExit::killed().natural_state(), WorkerState::Crashed);
        assert_eq!(
            WorkerExit::normal(3).natural_state(),
            WorkerState::Exited(WorkerExit::normal(3))
        );
        assert!(WorkerExit::normal(0).is_success());
        assert!(!WorkerExit::normal(1).is_success());
    }
}
