// src/exec/probe.rs

//! Interpreter checks: the `testEnvironment` diagnostic and interpreter
//! auto-detection. Neither touches the worker registry.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Result of running `<interpreter> --version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentReport {
    pub interpreter: String,
    pub success: bool,
    /// Combined stdout and stderr (Python 2 prints its version on stderr),
    /// or the launch / timeout error.
    pub output: String,
}

impl EnvironmentReport {
    pub fn summary(&self) -> String {
        let detail = self.output.trim();
        if self.success {
            format!("Environment OK: {} ({detail})", self.interpreter)
        } else {
            format!("Environment check failed for {}: {detail}", self.interpreter)
        }
    }
}

/// Run the interpreter with `--version` and report what happened.
pub async fn check_interpreter(interpreter: &str, limit: Duration) -> EnvironmentReport {
    let report = |success: bool, output: String| EnvironmentReport {
        interpreter: interpreter.to_string(),
        success,
        output,
    };

    if interpreter.trim().is_empty() {
        return report(false, "no interpreter configured".to_string());
    }

    let mut cmd = Command::new(interpreter);
    cmd.arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(interpreter, "probing interpreter");

    let output = match timeout(limit, cmd.output()).await {
        Err(_) => {
            return report(
                false,
                format!("no answer within {} ms", limit.as_millis()),
            );
        }
        Ok(Err(err)) => return report(false, err.to_string()),
        Ok(Ok(output)) => output,
    };

    let mut text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(stderr.trim());
    }

    if !output.status.success() {
        let code = output.status.code().unwrap_or(-1);
        if text.is_empty() {
            text = format!("exited with code {code}");
        }
        return report(false, text);
    }

    report(true, text)
}

/// First candidate that answers `--version` successfully.
pub async fn detect_interpreter(candidates: &[String], limit: Duration) -> Option<String> {
    for candidate in candidates.iter().filter(|c| !c.trim().is_empty()) {
        let report = check_interpreter(candidate, limit).await;
        if report.success {
            info!(interpreter = %candidate, version = %report.output, "detected interpreter");
            return Some(candidate.clone());
        }
        debug!(interpreter = %candidate, output = %report.output, "interpreter candidate rejected");
    }
    None
}

/// Pick the interpreter: explicit override, then configured value, then the
/// first working candidate, then the first candidate as a last resort.
pub async fn resolve_interpreter(
    explicit: Option<&str>,
    configured: Option<&str>,
    candidates: &[String],
    limit: Duration,
) -> String {
    if let Some(name) = explicit.or(configured).filter(|n| !n.trim().is_empty()) {
        return name.trim().to_string();
    }

    if let Some(found) = detect_interpreter(candidates, limit).await {
        return found;
    }

    let fallback = candidates
        .iter()
        .find(|c| !c.trim().is_empty())
        .cloned()
        .unwrap_or_default();
    warn!(
        interpreter = %fallback,
        "no interpreter candidate answered --version; using the first candidate"
    );
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_interpreter_fails_the_check() {
        let report =
            check_interpreter("neurodrive-no-such-interpreter", Duration::from_secs(2)).await;
        assert!(!report.success);
        assert!(!report.output.is_empty());
        assert!(report.summary().starts_with("Environment check failed"));
    }

    #[tokio::test]
    async fn explicit_interpreter_wins_without_probing() {
        let candidates = vec!["neurodrive-no-such-interpreter".to_string()];
        let chosen = resolve_interpreter(
            Some("python3.11"),
            Some("python"),
            &candidates,
            Duration::from_millis(10),
        )
        .await;
        assert_eq!(chosen, "python3.11");

        let chosen =
            resolve_interpreter(None, Some("python"), &candidates, Duration::from_millis(10))
                .await;
        assert_eq!(chosen, "python");
    }

    #[tokio::test]
    async fn falls_back_to_first_candidate() {
        let candidates = vec![
            "".to_string(),
            "neurodrive-no-such-interpreter".to_string(),
        ];
        let chosen = resolve_interpreter(None, None, &candidates, Duration::from_secs(2)).await;
        assert_eq!(chosen, "neurodrive-no-such-interpreter");
    }

    #[test]
    fn summary_mentions_version() {
        let report = EnvironmentReport {
            interpreter: "python3".to_string(),
            success: true,
            output: "Python 3.11.2\n".to_string(),
        };
        assert_eq!(report.summary(), "Environment OK: python3 (Python 3.11.2)");
    }
}
