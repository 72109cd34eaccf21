//! tmux operations — the narrow process-control contract drover consumes.
//!
//! Everything shells out to the `tmux` binary via `tokio::process::Command`.
//! Commands are issued through the [`CommandRunner`] trait so tests can
//! substitute a fake runner; production code uses [`TmuxRunner`].

use async_trait::async_trait;
use std::process::Stdio;

/// Output of an external command: (stdout, stderr, exit code).
///
/// A spawn failure (binary missing, permission denied) is folded into the
/// exit code using shell conventions — 127 for "not found", 126 for other
/// OS errors — so callers handle one shape instead of two.
#[derive(Debug, Clone)]
pub struct CmdOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: i32,
}

impl CmdOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Seam for running external commands. Tests inject a recording fake;
/// production uses [`TmuxRunner`].
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `cmd` to completion and return its output.
    async fn run(&self, cmd: &[&str]) -> CmdOutput;
}

/// Default runner backed by `tokio::process::Command`.
pub struct TmuxRunner;

#[async_trait]
impl CommandRunner for TmuxRunner {
    async fn run(&self, cmd: &[&str]) -> CmdOutput {
        let (program, args) = match cmd.split_first() {
            Some(split) => split,
            None => {
                return CmdOutput {
                    stdout: String::new(),
                    stderr: "empty command".into(),
                    code: 126,
                };
            }
        };

        let result = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await;

        match result {
            Ok(output) => CmdOutput {
                stdout: String::from_utf8_lossy(&output.stdout).trim().to_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
                code: output.status.code().unwrap_or(-1),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => CmdOutput {
                stdout: String::new(),
                stderr: e.to_string(),
                code: 127,
            },
            Err(e) => CmdOutput {
                stdout: String::new(),
                stderr: e.to_string(),
                code: 126,
            },
        }
    }
}

/// Check whether a tmux session exists.
pub async fn session_exists(runner: &dyn CommandRunner, session: &str) -> bool {
    runner
        .run(&["tmux", "has-session", "-t", session])
        .await
        .success()
}

/// List window names in a session. Empty on failure.
pub async fn list_windows(runner: &dyn CommandRunner, session: &str) -> Vec<String> {
    let out = runner
        .run(&["tmux", "list-windows", "-t", session, "-F", "#{window_name}"])
        .await;
    if !out.success() {
        return Vec::new();
    }
    out.stdout
        .lines()
        .filter(|s| !s.trim().is_empty())
        .map(str::to_owned)
        .collect()
}

/// Kill a window in a session. Best-effort: killing an already-gone window
/// is a no-op, not an error.
pub async fn kill_window(runner: &dyn CommandRunner, session: &str, window: &str) {
    let target = format!("{session}:{window}");
    let _ = runner.run(&["tmux", "kill-window", "-t", &target]).await;
}

/// Kill a tmux session (and every window in it). Best-effort.
pub async fn kill_session(runner: &dyn CommandRunner, session: &str) {
    let _ = runner.run(&["tmux", "kill-session", "-t", session]).await;
}

/// Create a new detached session running `command` in a named window.
/// Returns the tool output so callers that care (controller restart) can
/// distinguish a failed start.
pub async fn new_session(
    runner: &dyn CommandRunner,
    session: &str,
    window: &str,
    command: &str,
) -> CmdOutput {
    runner
        .run(&["tmux", "new-session", "-d", "-s", session, "-n", window, command])
        .await
}
