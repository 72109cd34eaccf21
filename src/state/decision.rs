//! Decision engine — pure functions from fetched issue state to actions.
//!
//! No I/O here. `suggest_action` is total over every status, known or not;
//! `build_issue_state` layers the precedence overrides on top:
//!
//! 1. user-input-needed + user-feedback-given → relay the feedback
//! 2. user-input-needed alone → skip until the user responds
//! 3. worker-active with no live window → orphan, clear and redispatch
//! 4. normal status routing

use super::types::{Action, CollectedState, FetchedIssue, IssueState, IssueStatus};
use crate::session::{compute_session_id, InvalidTeamId};

/// Suggest the next action from normal status routing.
///
/// When the worker-done label is set, the live-worker flag is ignored on
/// purpose: a completed worker may leave a stale window running, and that
/// must not block the state transition.
pub fn suggest_action(
    status: &IssueStatus,
    has_worker_done: bool,
    has_live_worker: bool,
    pr_is_draft: Option<bool>,
    has_pr: bool,
) -> Action {
    match status {
        // Handled by the controller directly.
        IssueStatus::Done | IssueStatus::Triage | IssueStatus::Icebox => Action::Skip,

        IssueStatus::Backlog => {
            if has_worker_done {
                Action::TransitionToTodo
            } else if has_live_worker {
                Action::Skip
            } else {
                Action::DispatchArchitect
            }
        }

        IssueStatus::Todo => {
            if has_worker_done {
                Action::TransitionToInProgress
            } else if has_live_worker {
                Action::Skip
            } else {
                Action::DispatchPlanner
            }
        }

        IssueStatus::InProgress => {
            if has_worker_done {
                Action::TransitionToNeedsReview
            } else if has_live_worker {
                Action::Skip
            } else {
                Action::DispatchImplementer
            }
        }

        IssueStatus::NeedsReview => {
            if has_worker_done {
                if !has_pr {
                    // Worker claimed completion but produced nothing
                    // reviewable. Needs human attention.
                    Action::InvestigateNoPr
                } else {
                    match pr_is_draft {
                        // Has a PR but the check didn't resolve — transient,
                        // retried next cycle. Never conflated with "no PR".
                        None => Action::Skip,
                        Some(true) => Action::ResumeImplementerForChanges,
                        Some(false) => Action::TransitionToRetro,
                    }
                }
            } else if has_live_worker {
                Action::Skip
            } else {
                Action::DispatchReviewer
            }
        }

        IssueStatus::Retro => {
            if has_worker_done {
                Action::DispatchMerger
            } else if has_live_worker {
                Action::Skip
            } else {
                Action::ResumeImplementerForRetro
            }
        }

        IssueStatus::Other(_) => Action::Skip,
    }
}

/// Resolve overlapping signals into one action, then attach the session
/// identity for that action's mode.
pub fn build_issue_state(issue: &FetchedIssue, team_id: &str) -> Result<IssueState, InvalidTeamId> {
    // Workers self-escalate: post a question to the tracker, add
    // user-input-needed, then exit. The user's response adds
    // user-feedback-given.
    let action = if issue.labels.user_input_needed() && issue.labels.user_feedback_given() {
        Action::RelayUserFeedback
    } else if issue.labels.user_input_needed() {
        Action::Skip
    } else if issue.labels.worker_active() && !issue.has_live_worker {
        // Orphan: the tracker says a worker is active but no window exists.
        // Must fire before status routing or a crashed worker looks like
        // "waiting" and stalls the issue forever.
        Action::RemoveWorkerActiveAndRedispatch
    } else {
        suggest_action(
            &issue.status,
            issue.labels.worker_done(),
            issue.has_live_worker,
            issue.pr_is_draft,
            issue.has_pr,
        )
    };

    let session_id = compute_session_id(team_id, &issue.issue_id, action.mode())?;

    Ok(IssueState {
        status: issue.status.clone(),
        labels: issue.labels.clone(),
        has_pr: issue.has_pr,
        pr_is_draft: issue.pr_is_draft,
        has_live_worker: issue.has_live_worker,
        suggested_action: action,
        session_id,
        has_user_feedback: issue.labels.user_feedback_given(),
    })
}

/// Build the complete collected state for one poll cycle.
pub fn build_collected_state(
    issues: &[FetchedIssue],
    team_id: &str,
) -> Result<CollectedState, InvalidTeamId> {
    let mut state = CollectedState::default();
    for issue in issues {
        state
            .issues
            .insert(issue.issue_id.clone(), build_issue_state(issue, team_id)?);
    }
    Ok(state)
}
