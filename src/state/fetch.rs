//! Remote state fetching — live tmux workers and PR draft status.
//!
//! The two retrievals run concurrently and both must complete before any
//! decision is computed; a failed PR batch aborts the whole poll cycle
//! rather than letting decisions run on stale defaults.
//!
//! PR draft status shells out to `gh api graphql` with one combined query
//! per poll cycle: one aliased repository sub-query per distinct repo, one
//! aliased pullRequest field per PR inside it.

use super::types::{FetchedIssue, ParsedIssue, PrRef, WorkerMode};
use crate::tmux::{self, CommandRunner};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use tokio::time::{sleep, Duration};

/// The remote API could not be reached or understood after all retries.
///
/// Must propagate: a poll cycle that cannot determine PR status produces no
/// state update and is retried at the next poll.
#[derive(Debug, Clone)]
pub struct RemoteApiError(pub String);

impl std::fmt::Display for RemoteApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "remote API error: {}", self.0)
    }
}

impl std::error::Error for RemoteApiError {}

/// Retry policy for remote calls: total attempt budget plus an exponential
/// backoff schedule (doubling from `initial_backoff`, capped at
/// `max_backoff`).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(10),
        }
    }
}

/// Run `op` up to `policy.attempts` times, sleeping the backoff schedule
/// between failures. The last error is returned once the budget is spent.
pub async fn retry_with_backoff<T, E, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut backoff = policy.initial_backoff;
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.attempts => {
                eprintln!("[state] attempt {attempt}/{} failed: {e}", policy.attempts);
                sleep(backoff).await;
                backoff = (backoff * 2).min(policy.max_backoff);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

// ── Live workers ─────────────────────────────────────────

/// List live worker windows in the swarm session as issue id → mode.
///
/// Windows are named `"{mode}-{issue_lowercase}"`; the `main` window is the
/// controller. The split takes the first hyphen and is accepted only when
/// the prefix is a valid mode, so issue identifiers containing hyphens
/// survive intact and stray manual windows are silently ignored.
pub async fn live_workers(
    runner: &dyn CommandRunner,
    session: &str,
) -> HashMap<String, WorkerMode> {
    let windows = tmux::list_windows(runner, session).await;
    let mut workers = HashMap::new();

    for window in windows {
        if window == "main" {
            continue;
        }
        let Some((mode_str, issue)) = window.split_once('-') else {
            continue;
        };
        let Some(mode) = WorkerMode::parse(mode_str) else {
            continue;
        };
        if issue.is_empty() {
            continue;
        }
        // Tracker identifiers compare uppercase; windows are created lowercase.
        workers.insert(issue.to_uppercase(), mode);
    }

    workers
}

// ── PR draft status ──────────────────────────────────────

/// Build the combined GraphQL query for a batch of PR refs grouped by repo.
///
/// Aliases (`repo{i}`, `pr{j}`) keep same-named fields from colliding and
/// key the response back to issue ids.
fn build_batch_query(by_repo: &BTreeMap<(String, String), Vec<(String, u32)>>) -> String {
    let mut query = String::from("query {");
    for (repo_idx, ((owner, repo), prs)) in by_repo.iter().enumerate() {
        query.push_str(&format!(
            " repo{repo_idx}: repository(owner: \"{owner}\", name: \"{repo}\") {{"
        ));
        for (pr_idx, (_, number)) in prs.iter().enumerate() {
            query.push_str(&format!(
                " pr{pr_idx}: pullRequest(number: {number}) {{ isDraft }}"
            ));
        }
        query.push_str(" }");
    }
    query.push_str(" }");
    query
}

/// Fetch PR draft status for a batch of issues in one remote round trip.
///
/// Returns an entry for every input issue: `Some(true)` draft, `Some(false)`
/// ready, `None` unknown (PR missing from the response or its payload
/// malformed). Transport failures and unparseable bodies are retried per
/// `policy`, then surfaced as [`RemoteApiError`].
pub async fn pr_draft_status_batch(
    runner: &dyn CommandRunner,
    pr_refs: &BTreeMap<String, PrRef>,
    policy: RetryPolicy,
) -> Result<HashMap<String, Option<bool>>, RemoteApiError> {
    if pr_refs.is_empty() {
        return Ok(HashMap::new());
    }

    // Group by repository; BTreeMap keeps alias numbering deterministic.
    let mut by_repo: BTreeMap<(String, String), Vec<(String, u32)>> = BTreeMap::new();
    for (issue_id, pr_ref) in pr_refs {
        by_repo
            .entry((pr_ref.owner.clone(), pr_ref.repo.clone()))
            .or_default()
            .push((issue_id.clone(), pr_ref.number));
    }

    let query = build_batch_query(&by_repo);
    let query_arg = format!("query={query}");

    let data = retry_with_backoff(policy, || {
        let query_arg = query_arg.clone();
        async move {
            let out = runner
                .run(&["gh", "api", "graphql", "-f", &query_arg])
                .await;
            if !out.success() {
                return Err(RemoteApiError(format!(
                    "GraphQL query failed (exit {}): {}",
                    out.code, out.stderr
                )));
            }
            serde_json::from_str::<serde_json::Value>(&out.stdout)
                .map_err(|e| RemoteApiError(format!("failed to parse GraphQL response: {e}")))
        }
    })
    .await?;

    // A parsed response with null/missing data degrades per-entry to
    // unknown; it does not abort the batch.
    let repos = data.get("data");
    let mut result = HashMap::new();

    for (repo_idx, (_, prs)) in by_repo.iter().enumerate() {
        let repo_data = repos.and_then(|d| d.get(format!("repo{repo_idx}")));
        for (pr_idx, (issue_id, _)) in prs.iter().enumerate() {
            // Missing PR object or missing isDraft field: unknown. A null
            // isDraft on a present field: not draft. Never conflated.
            let is_draft = repo_data
                .and_then(|r| r.get(format!("pr{pr_idx}")))
                .filter(|pr| !pr.is_null())
                .and_then(|pr| pr.get("isDraft").map(|v| v.as_bool().unwrap_or(false)));
            result.insert(issue_id.clone(), is_draft);
        }
    }

    Ok(result)
}

// ── Fork-join fetch ──────────────────────────────────────

/// Fetch everything a poll cycle needs: live workers and PR draft status,
/// concurrently. Both branches must complete; a batch failure propagates
/// and the cycle produces no partial result.
pub async fn fetch_issues(
    runner: &dyn CommandRunner,
    parsed: Vec<ParsedIssue>,
    session: &str,
    policy: RetryPolicy,
) -> Result<Vec<FetchedIssue>, RemoteApiError> {
    // Only issues that actually need a draft-status lookup enter the batch.
    let pr_refs: BTreeMap<String, PrRef> = parsed
        .iter()
        .filter(|issue| issue.needs_pr_status())
        .filter_map(|issue| {
            issue
                .pr_ref
                .clone()
                .map(|pr_ref| (issue.issue_id.clone(), pr_ref))
        })
        .collect();

    let (workers, draft_map) = tokio::try_join!(
        async { Ok::<_, RemoteApiError>(live_workers(runner, session).await) },
        pr_draft_status_batch(runner, &pr_refs, policy),
    )?;

    eprintln!(
        "[state] fetched {} live worker(s), {} PR draft status(es)",
        workers.len(),
        draft_map.len()
    );

    Ok(parsed
        .into_iter()
        .map(|issue| {
            let has_live_worker = workers.contains_key(&issue.issue_id.to_uppercase());
            let pr_is_draft = draft_map.get(&issue.issue_id).copied().flatten();
            FetchedIssue {
                has_pr: issue.pr_ref.is_some(),
                pr_is_draft,
                has_live_worker,
                issue_id: issue.issue_id,
                status: issue.status,
                labels: issue.labels,
            }
        })
        .collect())
}
