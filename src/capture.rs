//! Pane capture: snapshot the text of a tmux pane running a Claude CLI session.

use crate::config::CaptureConfig;
use chrono::{DateTime, Utc};
use std::process::Stdio;
use tokio::process::Command;

/// Text captured from one pane at one instant.
#[derive(Debug, Clone)]
pub struct CapturedOutput {
    /// tmux target the text came from.
    pub session: String,
    pub content: String,
    pub captured_at: DateTime<Utc>,
}

/// Errors that can occur while capturing a pane.
#[derive(Debug)]
pub enum CaptureError {
    /// Session name was empty.
    InvalidTarget,
    /// Failed to spawn the tmux binary.
    Spawn { source: std::io::Error },
    /// tmux ran but exited non-zero (e.g. no such session).
    Failed {
        exit_code: Option<i32>,
        stderr: String,
    },
}

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureError::InvalidTarget => write!(f, "tmux target must not be empty"),
            CaptureError::Spawn { source } => {
                write!(f, "failed to spawn tmux: {}", source)
            }
            CaptureError::Failed { exit_code, stderr } => match exit_code {
                Some(code) => write!(f, "capture-pane exited with {}: {}", code, stderr),
                None => write!(f, "capture-pane killed by signal: {}", stderr),
            },
        }
    }
}

impl std::error::Error for CaptureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CaptureError::Spawn { source } => Some(source),
            _ => None,
        }
    }
}

/// Build `capture-pane` arguments for the given target.
fn build_args(config: &CaptureConfig, session: &str) -> Vec<String> {
    let mut args = vec!["capture-pane".to_string(), "-p".to_string()];
    if config.join_wrapped {
        args.push("-J".to_string());
    }
    args.push("-S".to_string());
    args.push(format!("-{}", config.history_lines));
    args.push("-t".to_string());
    args.push(session.to_string());
    args
}

/// Capture the pane text of `session`.
///
/// Output is decoded lossily so stray bytes from terminal control sequences
/// never fail the capture.
pub async fn capture_pane(
    config: &CaptureConfig,
    session: &str,
) -> Result<CapturedOutput, CaptureError> {
    let session = session.trim();
    if session.is_empty() {
        return Err(CaptureError::InvalidTarget);
    }

    let args = build_args(config, session);
    tracing::debug!(command = %config.tmux_command, args = ?args, "capturing pane");

    let output = Command::new(&config.tmux_command)
        .args(&args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| CaptureError::Spawn { source: e })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        tracing::debug!(exit_code = ?output.status.code(), %stderr, "capture-pane failed");
        return Err(CaptureError::Failed {
            exit_code: output.status.code(),
            stderr,
        });
    }

    let content = String::from_utf8_lossy(&output.stdout).into_owned();
    tracing::debug!(session, bytes = content.len(), "pane captured");

    Ok(CapturedOutput {
        session: session.to_string(),
        content,
        captured_at: Utc::now(),
    })
}
