//! State collection — the observe/decide half of the reconciliation loop.
//!
//! One poll cycle flows one way: tracker payload → [`parse`] → [`fetch`]
//! (live tmux workers + batched PR draft status, concurrently) →
//! [`decision`] → a fresh [`types::CollectedState`]. Nothing is persisted;
//! every cycle recomputes from the tracker and the process table
//! (level-triggered, not edge-triggered).

pub mod decision;
pub mod fetch;
pub mod parse;
pub mod types;

use crate::tmux::CommandRunner;
use color_eyre::eyre::Result;
use serde_json::Value;

/// Run one full collection cycle: parse raw tracker issues, fetch remote
/// state, and decide one action per issue.
///
/// Fails (producing no state at all) if the team id is malformed or the
/// remote PR batch exhausts its retries — partial state is never published.
pub async fn collect_state(
    runner: &dyn CommandRunner,
    raw_issues: &[Value],
    team_id: &str,
    session: &str,
    policy: fetch::RetryPolicy,
) -> Result<types::CollectedState> {
    let parsed = parse::parse_issues(raw_issues);
    let fetched = fetch::fetch_issues(runner, parsed, session, policy).await?;
    let state = decision::build_collected_state(&fetched, team_id)?;
    Ok(state)
}
