//! Shared test double for the external-command seam.

use async_trait::async_trait;
use drover::tmux::{CmdOutput, CommandRunner};
use std::sync::Mutex;

/// Scripted stand-in for tmux/gh: records every invocation and answers
/// from a closure keyed on the command line.
pub struct ScriptedRunner {
    calls: Mutex<Vec<Vec<String>>>,
    script: Box<dyn Fn(&[&str]) -> CmdOutput + Send + Sync>,
}

impl ScriptedRunner {
    pub fn new(script: impl Fn(&[&str]) -> CmdOutput + Send + Sync + 'static) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            script: Box::new(script),
        }
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    /// Count recorded invocations whose leading words match `prefix`.
    pub fn count_with_prefix(&self, prefix: &[&str]) -> usize {
        self.calls()
            .iter()
            .filter(|call| {
                call.len() >= prefix.len()
                    && call[..prefix.len()]
                        .iter()
                        .map(String::as_str)
                        .eq(prefix.iter().copied())
            })
            .count()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, cmd: &[&str]) -> CmdOutput {
        self.calls
            .lock()
            .unwrap()
            .push(cmd.iter().map(|s| s.to_string()).collect());
        (self.script)(cmd)
    }
}

pub fn ok(stdout: &str) -> CmdOutput {
    CmdOutput {
        stdout: stdout.to_owned(),
        stderr: String::new(),
        code: 0,
    }
}

pub fn fail(stderr: &str) -> CmdOutput {
    CmdOutput {
        stdout: String::new(),
        stderr: stderr.to_owned(),
        code: 1,
    }
}
