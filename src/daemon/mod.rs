//! Daemon — tmux session and controller lifecycle.
//!
//! `drover start` launches the controller agent in a tmux session named
//! `drover-{short}` (window `main`), then runs the health loop forever.
//! Each tick the loop:
//!
//! 1. kills worker windows whose session-activity file has gone stale,
//! 2. checks whether the controller itself needs a restart, and
//! 3. restarts it under a minimum-interval cooldown.
//!
//! Workers are windows inside the same session, named
//! `"{mode}-{issue_lowercase}"`, so killing the session kills the swarm.

pub mod config;

use crate::session::{
    compute_controller_session_id, compute_session_id, newest_mtime, session_file_path,
};
use crate::state::types::WorkerMode;
use crate::tmux::{self, CommandRunner};
use color_eyre::eyre::{bail, Result, WrapErr};
use config::HealthConfig;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::time::{sleep, Instant};

/// Window reserved for the controller.
pub const MAIN_WINDOW: &str = "main";

// ---------------------------------------------------------------------------
// Naming and validation
// ---------------------------------------------------------------------------

/// Validate a project/team id before it goes anywhere near a shell or a
/// tmux target. Letters, digits, hyphens, and underscores only.
pub fn validate_project_id(project_id: &str) -> Result<()> {
    let ok = !project_id.is_empty()
        && project_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !ok {
        bail!("project id must contain only letters, numbers, hyphens, and underscores");
    }
    Ok(())
}

const BASE62: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

fn base62(mut n: u128) -> String {
    if n == 0 {
        return "0".into();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE62[(n % 62) as usize] as char);
        n /= 62;
    }
    digits.iter().rev().collect()
}

/// Short id used in session names: UUIDs shorten to base62 of their 128-bit
/// value, anything else is used as-is.
pub fn get_short_id(project_id: &str) -> String {
    match uuid::Uuid::parse_str(project_id) {
        Ok(u) => base62(u.as_u128()),
        Err(_) => project_id.to_owned(),
    }
}

/// tmux session name for a swarm instance.
pub fn session_name(short: &str) -> String {
    format!("drover-{short}")
}

fn sh_quote(s: &str) -> Result<String> {
    Ok(shlex::try_quote(s)
        .wrap_err("argument cannot be shell-quoted")?
        .into_owned())
}

// ---------------------------------------------------------------------------
// Staleness
// ---------------------------------------------------------------------------

/// The kill condition: strictly older than the threshold. An activity file
/// aged exactly at the threshold is not yet stale.
pub fn is_stale(age: Duration, threshold: Duration) -> bool {
    age > threshold
}

/// Kill worker windows whose newest activity timestamp is stale.
///
/// A window with no activity file yet is never killed — the worker may have
/// just started and absence is not staleness. Per-window failures (bad
/// name, unreadable file, kill of an already-gone window) skip that window
/// and never abort the sweep.
pub async fn check_worker_health(
    runner: &dyn CommandRunner,
    session: &str,
    team_id: &str,
    workspaces_dir: &Path,
    threshold: Duration,
    now: SystemTime,
) {
    let windows = tmux::list_windows(runner, session).await;

    for window in windows {
        if window == MAIN_WINDOW {
            continue;
        }

        // "{mode}-{issue_lowercase}"; first-hyphen split, gated on a valid
        // mode so hyphenated issue ids stay intact.
        let Some((mode_str, issue_lower)) = window.split_once('-') else {
            continue;
        };
        let Some(mode) = WorkerMode::parse(mode_str) else {
            continue;
        };
        if issue_lower.is_empty() {
            continue;
        }

        let issue_id = issue_lower.to_uppercase();
        let session_id = match compute_session_id(team_id, &issue_id, mode) {
            Ok(id) => id,
            Err(e) => {
                eprintln!("[daemon] skipping window {window}: {e}");
                continue;
            }
        };

        // Worker workspaces are sibling directories named after the issue.
        let workspace = workspaces_dir.join(issue_lower);
        let session_file = session_file_path(&workspace, &session_id);

        let Some(mtime) = newest_mtime(&session_file) else {
            // No activity file yet — worker just started.
            continue;
        };

        let age = now.duration_since(mtime).unwrap_or_default();
        if is_stale(age, threshold) {
            eprintln!("[daemon] killing stale worker {window} (idle {}s)", age.as_secs());
            tmux::kill_window(runner, session, &window).await;
        }
    }
}

/// Whether the controller needs a restart: its session is gone, or its
/// activity file (including subagents) is missing or stale.
pub async fn controller_needs_restart(
    runner: &dyn CommandRunner,
    session: &str,
    session_file: &Path,
    threshold: Duration,
    now: SystemTime,
) -> bool {
    if !tmux::session_exists(runner, session).await {
        return true;
    }
    let Some(mtime) = newest_mtime(session_file) else {
        return true;
    };
    let age = now.duration_since(mtime).unwrap_or_default();
    is_stale(age, threshold)
}

// ---------------------------------------------------------------------------
// Controller start
// ---------------------------------------------------------------------------

/// Start the controller agent in the session's `main` window.
///
/// Resume-vs-new is decided by activity-file presence, not any in-memory
/// flag — the loop itself may have been restarted since the session was
/// first created.
pub async fn start_controller(
    runner: &dyn CommandRunner,
    session: &str,
    team_id: &str,
    short: &str,
    workspace: &Path,
    session_id: &str,
) -> Result<()> {
    let session_file = session_file_path(workspace, session_id);
    let id_quoted = sh_quote(session_id)?;
    let session_flag = if session_file.exists() {
        format!("--resume {id_quoted}")
    } else {
        format!("--session-id {id_quoted}")
    };

    let ws = sh_quote(&workspace.to_string_lossy())?;
    let prompt = sh_quote(&format!("/drover-controller Team: {team_id}"))?;
    let command = format!(
        "cd {ws} && \
         DROVER_DIR={ws} \
         DROVER_TEAM_ID={team} \
         DROVER_SHORT_ID={short_q} \
         claude --dangerously-skip-permissions {session_flag} {prompt}",
        team = sh_quote(team_id)?,
        short_q = sh_quote(short)?,
    );

    let out = tmux::new_session(runner, session, MAIN_WINDOW, &command).await;
    if !out.success() {
        bail!("tmux new-session failed (exit {}): {}", out.code, out.stderr);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Health loop
// ---------------------------------------------------------------------------

/// The periodic health & restart loop for one swarm instance.
pub struct HealthMonitor<'a> {
    runner: &'a dyn CommandRunner,
    config: HealthConfig,
    session: String,
    team_id: String,
    short: String,
    workspace: PathBuf,
    controller_session_id: String,
    last_restart: Option<Instant>,
}

impl<'a> HealthMonitor<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        config: HealthConfig,
        team_id: &str,
        workspace: &Path,
    ) -> Result<Self> {
        let short = get_short_id(team_id);
        Ok(Self {
            runner,
            config,
            session: session_name(&short),
            team_id: team_id.to_owned(),
            short,
            workspace: workspace.to_owned(),
            controller_session_id: compute_controller_session_id(team_id)?,
            last_restart: None,
        })
    }

    /// tmux session this monitor watches.
    pub fn session(&self) -> &str {
        &self.session
    }

    /// Run one tick: staleness sweep, controller check, cooldown-gated
    /// restart. A sweep problem never blocks the controller check, and a
    /// failed start is logged and retried next tick without advancing the
    /// last-restart timestamp (so its own cooldown cannot block the retry).
    pub async fn tick(&mut self) {
        let threshold = self.config.staleness_threshold();

        // Worker workspaces live beside the controller workspace.
        let workspaces_dir = self
            .workspace
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.workspace.clone());

        check_worker_health(
            self.runner,
            &self.session,
            &self.team_id,
            &workspaces_dir,
            threshold,
            SystemTime::now(),
        )
        .await;

        let session_file = session_file_path(&self.workspace, &self.controller_session_id);
        let needs_restart = controller_needs_restart(
            self.runner,
            &self.session,
            &session_file,
            threshold,
            SystemTime::now(),
        )
        .await;

        if !needs_restart {
            return;
        }

        if let Some(last) = self.last_restart {
            let elapsed = last.elapsed();
            let cooldown = self.config.restart_cooldown();
            if elapsed < cooldown {
                let wait = cooldown - elapsed;
                eprintln!("[daemon] restart cooldown: waiting {}s", wait.as_secs());
                sleep(wait).await;
            }
        }

        eprintln!("[daemon] restarting controller in {}", self.session);
        if tmux::session_exists(self.runner, &self.session).await {
            tmux::kill_session(self.runner, &self.session).await;
        }

        match start_controller(
            self.runner,
            &self.session,
            &self.team_id,
            &self.short,
            &self.workspace,
            &self.controller_session_id,
        )
        .await
        {
            Ok(()) => self.last_restart = Some(Instant::now()),
            Err(e) => eprintln!("[daemon] failed to start controller: {e}"),
        }
    }

    /// Run forever: sleep the check interval, then tick.
    pub async fn run(&mut self) {
        loop {
            sleep(self.config.check_interval()).await;
            self.tick().await;
        }
    }
}

// ---------------------------------------------------------------------------
// Commands: start / stop / status
// ---------------------------------------------------------------------------

/// Start the swarm: launch the controller, then run the health loop.
pub async fn start(runner: &dyn CommandRunner, team_id: &str, workspace: &Path) -> Result<()> {
    validate_project_id(team_id)?;
    let config = HealthConfig::load(workspace)?;

    let short = get_short_id(team_id);
    let session = session_name(&short);
    let controller_session_id = compute_controller_session_id(team_id)?;

    if tmux::session_exists(runner, &session).await {
        bail!("swarm already running for {team_id}; run `drover stop {team_id}` first");
    }

    println!("Starting drover for team: {team_id}");
    println!("Session: {session}");
    println!("Workspace: {}", workspace.display());

    start_controller(runner, &session, team_id, &short, workspace, &controller_session_id)
        .await?;

    println!();
    println!("To attach: tmux attach -t {session}");
    println!("To view:   tmux capture-pane -t {session}:{MAIN_WINDOW} -p");
    println!();

    let mut monitor = HealthMonitor::new(runner, config, team_id, workspace)?;
    monitor.run().await;
    Ok(())
}

/// Stop the swarm. Killing the session also kills every worker window.
pub async fn stop(runner: &dyn CommandRunner, team_id: &str) -> Result<()> {
    validate_project_id(team_id)?;
    let session = session_name(&get_short_id(team_id));

    if tmux::session_exists(runner, &session).await {
        tmux::kill_session(runner, &session).await;
        println!("Killed controller session: {session}");
    } else {
        println!("No controller session found: {session}");
    }
    Ok(())
}

/// Print controller and worker status.
pub async fn status(runner: &dyn CommandRunner, team_id: &str) -> Result<()> {
    validate_project_id(team_id)?;
    let session = session_name(&get_short_id(team_id));

    println!("Drover status: {team_id}");
    println!("Session: {session}");
    println!("{}", "=".repeat(40));

    if tmux::session_exists(runner, &session).await {
        println!("Controller: RUNNING");
        let workers: Vec<String> = tmux::list_windows(runner, &session)
            .await
            .into_iter()
            .filter(|w| w != MAIN_WINDOW)
            .collect();
        if workers.is_empty() {
            println!("Workers: none");
        } else {
            println!("Workers: {}", workers.len());
            for w in &workers {
                println!("  - {w}");
            }
        }
    } else {
        println!("Controller: NOT RUNNING");
        println!("Workers: N/A (controller not running)");
    }

    Ok(())
}
