//! Types for state collection.
//!
//! Everything here is a transient value owned by a single poll cycle —
//! state is recomputed from the tracker and process table every poll, never
//! merged with a previous cycle's result.

use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeSet;

// ── Issue status ─────────────────────────────────────────

/// Issue status: the fixed lifecycle set, with unknown raw values passed
/// through unchanged so new tracker statuses degrade to "skip" instead of
/// erroring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueStatus {
    Triage,
    Icebox,
    Backlog,
    Todo,
    InProgress,
    NeedsReview,
    Retro,
    Done,
    /// Unrecognized raw status, preserved verbatim.
    Other(String),
}

impl IssueStatus {
    /// Normalize a raw status string to canonical form.
    ///
    /// Known synonyms map to canonical values ("In Review" → Needs Review);
    /// anything else passes through unchanged.
    pub fn normalize(raw: &str) -> Self {
        match raw {
            "Triage" => Self::Triage,
            "Icebox" => Self::Icebox,
            "Backlog" => Self::Backlog,
            "Todo" => Self::Todo,
            "In Progress" => Self::InProgress,
            "Needs Review" | "In Review" => Self::NeedsReview,
            "Retro" => Self::Retro,
            "Done" => Self::Done,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Triage => "Triage",
            Self::Icebox => "Icebox",
            Self::Backlog => "Backlog",
            Self::Todo => "Todo",
            Self::InProgress => "In Progress",
            Self::NeedsReview => "Needs Review",
            Self::Retro => "Retro",
            Self::Done => "Done",
            Self::Other(raw) => raw,
        }
    }
}

impl std::fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for IssueStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ── Worker mode ──────────────────────────────────────────

/// Lifecycle stage a worker operates in. Window names in the swarm session
/// follow `"{mode}-{issue_lowercase}"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerMode {
    Architect,
    Plan,
    Implement,
    Review,
    Merge,
}

impl WorkerMode {
    /// Parse a mode name; `None` for anything outside the closed set.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "architect" => Some(Self::Architect),
            "plan" => Some(Self::Plan),
            "implement" => Some(Self::Implement),
            "review" => Some(Self::Review),
            "merge" => Some(Self::Merge),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Architect => "architect",
            Self::Plan => "plan",
            Self::Implement => "implement",
            Self::Review => "review",
            Self::Merge => "merge",
        }
    }
}

impl std::fmt::Display for WorkerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Actions ──────────────────────────────────────────────

/// The one next action the decision engine suggests for an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Skip,
    DispatchArchitect,
    DispatchPlanner,
    DispatchImplementer,
    DispatchReviewer,
    DispatchMerger,
    ResumeImplementerForChanges,
    ResumeImplementerForRetro,
    TransitionToTodo,
    TransitionToInProgress,
    TransitionToNeedsReview,
    TransitionToRetro,
    RelayUserFeedback,
    RemoveWorkerActiveAndRedispatch,
    InvestigateNoPr,
}

impl Action {
    /// The worker mode whose session identity this action addresses.
    ///
    /// Total by construction — a new variant without an arm is a compile
    /// error, never a silent default. Non-dispatch actions (skip,
    /// transitions, investigation) still map to a mode because the output
    /// record always carries a session id.
    pub fn mode(self) -> WorkerMode {
        match self {
            Self::Skip => WorkerMode::Implement,
            Self::DispatchArchitect => WorkerMode::Architect,
            Self::DispatchPlanner => WorkerMode::Plan,
            Self::DispatchImplementer => WorkerMode::Implement,
            Self::DispatchReviewer => WorkerMode::Review,
            Self::DispatchMerger => WorkerMode::Merge,
            Self::ResumeImplementerForChanges => WorkerMode::Implement,
            Self::ResumeImplementerForRetro => WorkerMode::Implement,
            Self::TransitionToTodo => WorkerMode::Plan,
            Self::TransitionToInProgress => WorkerMode::Implement,
            Self::TransitionToNeedsReview => WorkerMode::Review,
            // The completing review worker's session, so a follow-up resume
            // lands in the conversation that approved the PR.
            Self::TransitionToRetro => WorkerMode::Review,
            Self::RelayUserFeedback => WorkerMode::Implement,
            Self::RemoveWorkerActiveAndRedispatch => WorkerMode::Implement,
            Self::InvestigateNoPr => WorkerMode::Implement,
        }
    }
}

// ── Labels ───────────────────────────────────────────────

/// Well-known label names.
pub const LABEL_WORKER_DONE: &str = "worker-done";
pub const LABEL_WORKER_ACTIVE: &str = "worker-active";
pub const LABEL_USER_INPUT_NEEDED: &str = "user-input-needed";
pub const LABEL_USER_FEEDBACK_GIVEN: &str = "user-feedback-given";

/// Label set with exact-match membership. Order is irrelevant to the
/// decision engine; serialized order is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Labels(BTreeSet<String>);

impl Labels {
    pub fn contains(&self, label: &str) -> bool {
        self.0.contains(label)
    }

    pub fn worker_done(&self) -> bool {
        self.contains(LABEL_WORKER_DONE)
    }

    pub fn worker_active(&self) -> bool {
        self.contains(LABEL_WORKER_ACTIVE)
    }

    pub fn user_input_needed(&self) -> bool {
        self.contains(LABEL_USER_INPUT_NEEDED)
    }

    pub fn user_feedback_given(&self) -> bool {
        self.contains(LABEL_USER_FEEDBACK_GIVEN)
    }
}

impl<S: Into<String>> FromIterator<S> for Labels {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

// ── Pull request references ──────────────────────────────

/// Parsed GitHub PR reference from a tracker attachment URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrRef {
    pub owner: String,
    pub repo: String,
    pub number: u32,
}

impl PrRef {
    /// Parse `https://github.com/{owner}/{repo}/pull/{number}`.
    ///
    /// Owner and repo segments accept word characters plus `.` and `-`.
    /// PR numbers above i32::MAX are rejected (the GraphQL API uses a
    /// 32-bit int), so a nonsense URL cannot overflow the batched query.
    pub fn from_url(url: &str) -> Option<Self> {
        let rest = url.strip_prefix("https://github.com/")?;
        let mut parts = rest.splitn(4, '/');
        let owner = parts.next()?;
        let repo = parts.next()?;
        if parts.next()? != "pull" {
            return None;
        }
        let number_part = parts.next()?;
        // Tolerate trailing path/query segments after the number.
        let digits: &str = number_part
            .split(|c: char| !c.is_ascii_digit())
            .next()
            .filter(|s| !s.is_empty())?;

        let valid_segment = |s: &str| {
            !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || "._-".contains(c))
        };
        if !valid_segment(owner) || !valid_segment(repo) {
            return None;
        }

        let number: u64 = digits.parse().ok()?;
        if number > i32::MAX as u64 {
            return None;
        }
        Some(Self {
            owner: owner.to_owned(),
            repo: repo.to_owned(),
            number: number as u32,
        })
    }
}

// ── Per-issue records ────────────────────────────────────

/// Issue as normalized from the tracker payload, before any remote lookups.
#[derive(Debug, Clone)]
pub struct ParsedIssue {
    pub issue_id: String,
    pub status: IssueStatus,
    pub labels: Labels,
    pub pr_ref: Option<PrRef>,
}

impl ParsedIssue {
    /// Whether this issue belongs in the PR draft-status batch: awaiting
    /// review, worker-complete, and carrying a parsed PR reference.
    pub fn needs_pr_status(&self) -> bool {
        self.status == IssueStatus::NeedsReview
            && self.labels.worker_done()
            && self.pr_ref.is_some()
    }
}

/// Issue after remote lookups: tracker state joined with process-table and
/// code-review state.
#[derive(Debug, Clone)]
pub struct FetchedIssue {
    pub issue_id: String,
    pub status: IssueStatus,
    pub labels: Labels,
    /// Whether a PR is linked at all. Distinct from `pr_is_draft == None`,
    /// which means "has a PR but the draft status could not be determined".
    pub has_pr: bool,
    /// Draft status: `None` = unknown, `Some(true)` = draft, `Some(false)`
    /// = ready. Only meaningful when `has_pr` is true.
    pub pr_is_draft: Option<bool>,
    pub has_live_worker: bool,
}

/// Final per-issue state with the suggested action. Immutable; produced
/// fresh every poll.
#[derive(Debug, Clone, Serialize)]
pub struct IssueState {
    pub status: IssueStatus,
    pub labels: Labels,
    pub has_pr: bool,
    pub pr_is_draft: Option<bool>,
    pub has_live_worker: bool,
    pub suggested_action: Action,
    pub session_id: String,
    pub has_user_feedback: bool,
}

/// Complete state collection result, keyed by issue id.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectedState {
    pub issues: std::collections::BTreeMap<String, IssueState>,
}
