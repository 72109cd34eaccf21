//! Session identity and activity files.
//!
//! Every worker (and the controller itself) addresses its resumable agent
//! conversation by a deterministic UUIDv5: namespace = the team UUID, name =
//! `"{issue}:{mode}"` (or the fixed name `"controller"`). The agent CLI
//! writes a JSONL activity file per session under `~/.claude/projects/`;
//! its mtime is our liveness proxy.

use crate::state::types::WorkerMode;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use uuid::Uuid;

/// The team identifier is not a well-formed UUID.
///
/// This is the single validation point for identities — callers must not
/// dispatch a worker with a made-up session id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTeamId(pub String);

impl std::fmt::Display for InvalidTeamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "team id is not a valid UUID: {:?}", self.0)
    }
}

impl std::error::Error for InvalidTeamId {}

fn namespace(team_id: &str) -> Result<Uuid, InvalidTeamId> {
    Uuid::parse_str(team_id).map_err(|_| InvalidTeamId(team_id.to_owned()))
}

/// Compute the deterministic session id for a worker.
///
/// Identical inputs always produce the identical id; different issue or
/// mode produces a different id.
pub fn compute_session_id(
    team_id: &str,
    issue_id: &str,
    mode: WorkerMode,
) -> Result<String, InvalidTeamId> {
    let ns = namespace(team_id)?;
    let name = format!("{issue_id}:{mode}");
    Ok(Uuid::new_v5(&ns, name.as_bytes()).to_string())
}

/// Compute the deterministic session id for the controller.
///
/// Uses the fixed name `"controller"` — it contains no `issue:mode` pair,
/// so it can never collide with a worker id.
pub fn compute_controller_session_id(team_id: &str) -> Result<String, InvalidTeamId> {
    let ns = namespace(team_id)?;
    Ok(Uuid::new_v5(&ns, b"controller").to_string())
}

/// Path to a session's activity file.
///
/// The agent CLI encodes workspace paths by replacing every
/// non-alphanumeric character with a dash:
/// `/home/sami/swarm/default` → `-home-sami-swarm-default`.
pub fn session_file_path(workspace: &Path, session_id: &str) -> PathBuf {
    let encoded: String = workspace
        .to_string_lossy()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/"))
        .join(".claude")
        .join("projects")
        .join(encoded)
        .join(format!("{session_id}.jsonl"))
}

/// Newest mtime across the session file and any subagent activity files.
///
/// Subagent files live in `{parent}/{stem}/subagents/*.jsonl` and may be
/// more recently active than the top-level file, so the maximum wins.
/// Returns `None` if the session file itself is missing or unreadable —
/// absence is "no activity yet", never an error. Individual unreadable
/// subagent files are skipped.
pub fn newest_mtime(session_file: &Path) -> Option<SystemTime> {
    let mut newest = std::fs::metadata(session_file).and_then(|m| m.modified()).ok()?;

    let stem = session_file.file_stem()?;
    let subagents_dir = session_file.parent()?.join(stem).join("subagents");
    if let Ok(entries) = std::fs::read_dir(&subagents_dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != "jsonl") {
                continue;
            }
            if let Ok(mtime) = entry.metadata().and_then(|m| m.modified()) {
                newest = newest.max(mtime);
            }
        }
    }

    Some(newest)
}
