// tests/config_loading.rs

use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;

use neurodrive::config::{Settings, default_config_path, load_and_validate, load_or_default};
use neurodrive::errors::NeurodriveError;
use neurodrive::types::ModelKind;
use neurodrive_test_utils::ConfigFileBuilder;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn full_config_is_loaded() {
    let file = config_file(
        r#"
[config]
interpreter = "python3.11"
grace_timeout_ms = 1500
kill_timeout_ms = 750
output_history_lines = 20

[worker.traffic_sign_recognition]
script = "/srv/tsr/tf.py"
args = ["--camera", "0"]

[worker.lane_detection]
script = "/srv/lane/lane.py"
"#,
    );

    let cfg = load_and_validate(file.path()).expect("valid config");
    assert_eq!(cfg.config.interpreter.as_deref(), Some("python3.11"));
    assert_eq!(cfg.config.grace_timeout_ms, 1500);

    let tsr = cfg
        .script(ModelKind::TrafficSignRecognition)
        .expect("tsr slot");
    assert_eq!(tsr.script, "/srv/tsr/tf.py");
    assert_eq!(tsr.args, vec!["--camera".to_string(), "0".to_string()]);

    // Slots missing from the file fall back to the built-in scripts.
    assert_eq!(
        cfg.script(ModelKind::Drowsiness).map(|s| s.script.as_str()),
        Some("/home/root/DROWSINESS/tf/drowsiness_detectorr.py")
    );
    assert_eq!(
        cfg.script(ModelKind::Combined).map(|s| s.script.as_str()),
        Some("/path/to/model3/script3.py")
    );

    let settings = Settings::from_config(&cfg, "python3.11");
    assert_eq!(settings.grace_period(), Duration::from_millis(1500));
    assert_eq!(settings.kill_timeout(), Duration::from_millis(750));
    assert_eq!(settings.output_history_lines(), 20);
}

#[test]
fn empty_file_uses_defaults() {
    let file = config_file("");
    let cfg = load_and_validate(file.path()).expect("empty config is valid");

    assert_eq!(cfg.config.interpreter, None);
    assert_eq!(
        cfg.config.interpreter_candidates,
        vec!["python3".to_string(), "python".to_string()]
    );
    assert_eq!(cfg.config.grace_timeout_ms, 3000);
    assert_eq!(cfg.config.kill_timeout_ms, 2000);
    assert_eq!(
        cfg.script(ModelKind::TrafficSignRecognition)
            .map(|s| s.script.as_str()),
        Some("/home/root/traffic/tf/tf.py")
    );
    // Lane detection has no built-in script; that only matters when started.
    assert_eq!(
        cfg.script(ModelKind::LaneDetection).map(|s| s.script.as_str()),
        Some("")
    );
}

#[test]
fn zero_timeout_is_rejected() {
    let file = config_file("[config]\ngrace_timeout_ms = 0\n");
    match load_and_validate(file.path()) {
        Err(NeurodriveError::ConfigError(msg)) => assert!(msg.contains("grace_timeout_ms")),
        other => panic!("Expected ConfigError, got: {other:?}"),
    }
}

#[test]
fn blank_interpreter_is_rejected() {
    let file = config_file("[config]\ninterpreter = \"  \"\n");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(NeurodriveError::ConfigError(_))
    ));

    let file = config_file("[config]\ninterpreter_candidates = []\n");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(NeurodriveError::ConfigError(_))
    ));
}

#[test]
fn none_is_not_a_worker_slot() {
    let file = config_file("[worker.none]\nscript = \"x.py\"\n");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(NeurodriveError::ConfigError(msg)) if msg.contains("worker.none")
    ));
}

#[test]
fn unknown_model_key_is_a_toml_error() {
    let file = config_file("[worker.radar]\nscript = \"radar.py\"\n");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(NeurodriveError::TomlError(_))
    ));
}

#[test]
fn explicit_missing_path_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("Neurodrive.toml");
    assert!(matches!(
        load_or_default(&missing),
        Err(NeurodriveError::IoError(_))
    ));
}

#[test]
fn default_path_is_relative_to_cwd() {
    assert_eq!(
        default_config_path(),
        std::path::PathBuf::from("Neurodrive.toml")
    );
}

#[test]
fn builder_produces_validated_config() {
    let cfg = ConfigFileBuilder::new()
        .with_interpreter("python3")
        .with_worker(ModelKind::LaneDetection, "/srv/lane.py")
        .with_grace_ms(250)
        .build();

    assert_eq!(
        cfg.script(ModelKind::LaneDetection).map(|s| s.script.as_str()),
        Some("/srv/lane.py")
    );
    assert_eq!(cfg.worker.len(), 4);
    assert_eq!(cfg.config.grace_timeout_ms, 250);
}
