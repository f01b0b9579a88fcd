// tests/process_lifecycle.rs
//
// Real worker processes, using `sh` as the interpreter.

#![cfg(unix)]

mod common;
use crate::common::{driven, with_timeout};

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tempfile::TempDir;

use neurodrive::config::Settings;
use neurodrive::engine::FailureKind;
use neurodrive::exec::ProcessLauncher;
use neurodrive::report::OrchestratorEvent;
use neurodrive::types::ModelKind;
use neurodrive::worker::Stream;
use neurodrive_test_utils::SettingsBuilder;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

fn sh_settings(kind: ModelKind, script: &Path) -> Settings {
    SettingsBuilder::new()
        .interpreter("sh")
        .script(kind, script.to_str().unwrap())
        .grace(Duration::from_millis(300))
        .kill_timeout(Duration::from_secs(2))
        .build()
}

#[tokio::test]
async fn clean_exit_is_reported_with_output() {
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "tsr.sh", "echo hello from $(basename $(pwd))\nexit 0\n");
    let settings = sh_settings(ModelKind::TrafficSignRecognition, &script);
    let launcher = ProcessLauncher::from_settings(&settings);
    let mut d = driven(settings, launcher);

    d.orchestrator
        .start_model(ModelKind::TrafficSignRecognition)
        .await;
    d.pump_until(|o| o.registry().is_empty()).await;

    let state = d.orchestrator.state().clone();
    assert_eq!(
        state.status_message,
        "Traffic sign recognition finished with exit code 0"
    );
    assert!(!state.aggregate_running);

    // The worker ran inside the script's directory.
    let dir_name = dir.path().file_name().unwrap().to_string_lossy().into_owned();
    let stdout = d
        .events()
        .iter()
        .find_map(|e| match e {
            OrchestratorEvent::ProcessFinished { output, .. } => Some(output.stdout.clone()),
            _ => None,
        })
        .expect("completion event");
    assert!(stdout.contains(&format!("hello from {dir_name}")), "stdout: {stdout}");
}

#[tokio::test]
async fn nonzero_exit_carries_stderr() {
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "drowsy.sh", "echo model weights missing >&2\nexit 4\n");
    let settings = sh_settings(ModelKind::Drowsiness, &script);
    let launcher = ProcessLauncher::from_settings(&settings);
    let mut d = driven(settings, launcher);

    d.orchestrator.start_model(ModelKind::Drowsiness).await;
    d.pump_until(|o| o.registry().is_empty()).await;

    let (failure, exit_code, stderr) = d
        .events()
        .iter()
        .find_map(|e| match e {
            OrchestratorEvent::ProcessError {
                failure,
                exit_code,
                output,
                ..
            } => Some((*failure, *exit_code, output.stderr.clone())),
            _ => None,
        })
        .expect("error event");
    assert_eq!(failure, FailureKind::RuntimeFailure);
    assert_eq!(exit_code, Some(4));
    assert!(stderr.contains("model weights missing"));
    assert_eq!(
        d.orchestrator.state().status_message,
        "Error: Drowsiness detection exited with code 4"
    );
}

#[tokio::test]
async fn missing_script_directory_fails_to_start() {
    let settings = sh_settings(
        ModelKind::Drowsiness,
        Path::new("/neurodrive-test-no-such-dir/detector.py"),
    );
    let launcher = ProcessLauncher::from_settings(&settings);
    let mut d = driven(settings, launcher);

    d.orchestrator.start_model(ModelKind::Drowsiness).await;
    d.pump_until(|o| o.registry().is_empty()).await;

    let state = d.orchestrator.state().clone();
    assert_eq!(state.active_model, ModelKind::Drowsiness);
    assert!(!state.aggregate_running);
    assert!(d.events().iter().any(|e| matches!(
        e,
        OrchestratorEvent::ProcessError {
            kind: ModelKind::Drowsiness,
            failure: FailureKind::Launch,
            ..
        }
    )));
}

#[tokio::test]
async fn missing_interpreter_fails_to_start() {
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "lane.sh", "exit 0\n");
    let settings = SettingsBuilder::new()
        .interpreter("neurodrive-no-such-interpreter")
        .script(ModelKind::LaneDetection, script.to_str().unwrap())
        .build();
    let launcher = ProcessLauncher::from_settings(&settings);
    let mut d = driven(settings, launcher);

    d.orchestrator.start_model(ModelKind::LaneDetection).await;
    d.pump_until(|o| o.registry().is_empty()).await;

    assert!(
        d.orchestrator
            .state()
            .status_message
            .starts_with("Error: Lane detection failed to start")
    );
}

#[tokio::test]
async fn missing_script_file_launches_with_warning() {
    let dir = TempDir::new().unwrap();
    let script = dir.path().join("not-there.sh");
    let settings = sh_settings(ModelKind::LaneDetection, &script);
    let launcher = ProcessLauncher::from_settings(&settings);
    let mut d = driven(settings, launcher);

    d.orchestrator.start_model(ModelKind::LaneDetection).await;
    d.pump_until(|o| o.registry().is_empty()).await;

    let events = d.events().to_vec();
    assert!(events.iter().any(|e| matches!(
        e,
        OrchestratorEvent::Warning {
            kind: ModelKind::LaneDetection,
            ..
        }
    )));
    // The interpreter itself reports the missing file and exits non-zero.
    assert!(events.iter().any(|e| matches!(
        e,
        OrchestratorEvent::ProcessError {
            failure: FailureKind::RuntimeFailure,
            exit_code: Some(code),
            ..
        } if *code != 0
    )));
}

#[tokio::test]
async fn cooperative_stop_needs_no_kill() {
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "loop.sh", "while true; do sleep 0.05; done\n");
    let settings = sh_settings(ModelKind::Combined, &script);
    let launcher = ProcessLauncher::from_settings(&settings);
    let mut d = driven(settings, launcher);

    // Only the combined-extra slot is configured here.
    d.orchestrator.start_model(ModelKind::Combined).await;
    d.pump_until(|o| o.state().aggregate_running).await;

    d.orchestrator.stop_current_model().await;

    assert!(d.orchestrator.registry().is_empty());
    assert!(d.events().iter().any(|e| matches!(
        e,
        OrchestratorEvent::WorkerStopped {
            kind: ModelKind::Combined,
            forced: false
        }
    )));
}

#[tokio::test]
async fn term_ignoring_worker_is_killed_within_bound() {
    let dir = TempDir::new().unwrap();
    let script = write_script(
        dir.path(),
        "stubborn.sh",
        "trap '' TERM\necho ready\nwhile true; do sleep 0.05; done\n",
    );
    let settings = sh_settings(ModelKind::TrafficSignRecognition, &script);
    let launcher = ProcessLauncher::from_settings(&settings);
    let mut d = driven(settings, launcher);

    d.orchestrator
        .start_model(ModelKind::TrafficSignRecognition)
        .await;
    d.pump_until(|o| o.state().aggregate_running).await;

    // Wait until the trap is installed before asking it to stop.
    with_timeout(async {
        loop {
            let ready = d
                .orchestrator
                .registry()
                .get(ModelKind::TrafficSignRecognition)
                .is_some_and(|h| h.output().lines(Stream::Stdout).iter().any(|l| l == "ready"));
            if ready {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;

    let started = Instant::now();
    d.orchestrator.stop_current_model().await;
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(300), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(300 + 2000), "elapsed {elapsed:?}");
    assert!(d.events().iter().any(|e| matches!(
        e,
        OrchestratorEvent::WorkerStopped {
            kind: ModelKind::TrafficSignRecognition,
            forced: true
        }
    )));
    assert!(!d.orchestrator.state().aggregate_running);
}

#[tokio::test]
async fn undecodable_output_does_not_disturb_the_worker() {
    let dir = TempDir::new().unwrap();
    let script = write_script(
        dir.path(),
        "lane.sh",
        "printf '\\377\\n'\nsleep 0.3\ni=0\nwhile [ $i -lt 200 ]; do echo frame $i; i=$((i+1)); done\nexit 0\n",
    );
    let settings = sh_settings(ModelKind::LaneDetection, &script);
    let launcher = ProcessLauncher::from_settings(&settings);
    let mut d = driven(settings, launcher);

    d.orchestrator.start_model(ModelKind::LaneDetection).await;
    d.pump_until(|o| o.registry().is_empty()).await;

    assert_eq!(
        d.orchestrator.state().status_message,
        "Lane detection finished with exit code 0"
    );
    let stdout = d
        .events()
        .iter()
        .find_map(|e| match e {
            OrchestratorEvent::ProcessFinished { output, .. } => Some(output.stdout.clone()),
            _ => None,
        })
        .expect("completion event");
    assert!(stdout.starts_with("\u{FFFD}\n"), "stdout: {stdout:?}");
    assert!(stdout.contains("frame 199\n"));
}

#[tokio::test]
async fn output_drain_does_not_turn_a_clean_stop_into_a_kill() {
    let dir = TempDir::new().unwrap();
    // The background sleep keeps stdout open after the shell is gone, so the
    // supervisor waits out the whole drain bound.
    let script = write_script(
        dir.path(),
        "tsr.sh",
        "sleep 2 &\necho ready\nwhile true; do sleep 0.05; done\n",
    );
    let settings = SettingsBuilder::new()
        .interpreter("sh")
        .script(ModelKind::TrafficSignRecognition, script.to_str().unwrap())
        .grace(Duration::from_millis(300))
        .kill_timeout(Duration::from_millis(100))
        .build();
    let launcher = ProcessLauncher::from_settings(&settings);
    let mut d = driven(settings, launcher);

    d.orchestrator
        .start_model(ModelKind::TrafficSignRecognition)
        .await;
    d.pump_until(|o| o.state().aggregate_running).await;

    d.orchestrator.stop_current_model().await;

    assert!(d.orchestrator.registry().is_empty());
    assert!(d.events().iter().any(|e| matches!(
        e,
        OrchestratorEvent::WorkerStopped {
            kind: ModelKind::TrafficSignRecognition,
            forced: false
        }
    )));
}
