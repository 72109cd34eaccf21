//! Integration tests for the decision engine: the full status routing
//! matrix plus the precedence layer (feedback relay, pending input,
//! orphan detection) and session-id attachment.

use drover::session::compute_session_id;
use drover::state::decision::{build_issue_state, suggest_action};
use drover::state::types::{Action, FetchedIssue, IssueStatus, Labels, WorkerMode};

const TEAM: &str = "7b4f0862-b775-4cb0-9a67-85400c6f44a8";

fn issue(status: IssueStatus, labels: &[&str]) -> FetchedIssue {
    FetchedIssue {
        issue_id: "ENG-21".into(),
        status,
        labels: labels.iter().copied().collect::<Labels>(),
        has_pr: false,
        pr_is_draft: None,
        has_live_worker: false,
    }
}

// ---------------------------------------------------------------------------
// Status routing matrix
// ---------------------------------------------------------------------------

#[test]
fn terminal_statuses_always_skip() {
    for status in [IssueStatus::Done, IssueStatus::Triage, IssueStatus::Icebox] {
        assert_eq!(suggest_action(&status, false, false, None, false), Action::Skip);
        // Even with every other signal raised.
        assert_eq!(
            suggest_action(&status, true, true, Some(false), true),
            Action::Skip
        );
    }
}

#[test]
fn backlog_routing() {
    let s = IssueStatus::Backlog;
    assert_eq!(suggest_action(&s, true, false, None, false), Action::TransitionToTodo);
    assert_eq!(suggest_action(&s, false, true, None, false), Action::Skip);
    assert_eq!(suggest_action(&s, false, false, None, false), Action::DispatchArchitect);
}

#[test]
fn todo_routing() {
    let s = IssueStatus::Todo;
    assert_eq!(suggest_action(&s, true, false, None, false), Action::TransitionToInProgress);
    assert_eq!(suggest_action(&s, false, true, None, false), Action::Skip);
    assert_eq!(suggest_action(&s, false, false, None, false), Action::DispatchPlanner);
}

#[test]
fn in_progress_routing() {
    let s = IssueStatus::InProgress;
    assert_eq!(suggest_action(&s, true, false, None, false), Action::TransitionToNeedsReview);
    assert_eq!(suggest_action(&s, false, true, None, false), Action::Skip);
    assert_eq!(suggest_action(&s, false, false, None, false), Action::DispatchImplementer);
}

#[test]
fn needs_review_with_worker_done_branches_on_pr() {
    let s = IssueStatus::NeedsReview;
    // No PR at all: stuck, needs a human.
    assert_eq!(suggest_action(&s, true, false, None, false), Action::InvestigateNoPr);
    // PR exists but draft status unknown: transient, retry next cycle.
    assert_eq!(suggest_action(&s, true, false, None, true), Action::Skip);
    // Draft: send it back for changes.
    assert_eq!(
        suggest_action(&s, true, false, Some(true), true),
        Action::ResumeImplementerForChanges
    );
    // Ready: move on.
    assert_eq!(
        suggest_action(&s, true, false, Some(false), true),
        Action::TransitionToRetro
    );
}

#[test]
fn needs_review_without_worker_done() {
    let s = IssueStatus::NeedsReview;
    assert_eq!(suggest_action(&s, false, true, None, false), Action::Skip);
    assert_eq!(suggest_action(&s, false, false, None, false), Action::DispatchReviewer);
}

#[test]
fn retro_routing() {
    let s = IssueStatus::Retro;
    assert_eq!(suggest_action(&s, true, false, None, false), Action::DispatchMerger);
    assert_eq!(suggest_action(&s, false, true, None, false), Action::Skip);
    assert_eq!(
        suggest_action(&s, false, false, None, false),
        Action::ResumeImplementerForRetro
    );
}

#[test]
fn unknown_status_skips_never_errors() {
    let s = IssueStatus::Other("Blocked On Vendor".into());
    assert_eq!(suggest_action(&s, true, true, Some(false), true), Action::Skip);
}

#[test]
fn worker_done_ignores_stale_live_window() {
    // A completed worker may leave its window running; the transition must
    // not be blocked by the live-worker flag.
    assert_eq!(
        suggest_action(&IssueStatus::Backlog, true, true, None, false),
        Action::TransitionToTodo
    );
    assert_eq!(
        suggest_action(&IssueStatus::InProgress, true, true, None, false),
        Action::TransitionToNeedsReview
    );
    assert_eq!(
        suggest_action(&IssueStatus::Retro, true, true, None, false),
        Action::DispatchMerger
    );
}

// ---------------------------------------------------------------------------
// Precedence layer
// ---------------------------------------------------------------------------

#[test]
fn feedback_relay_beats_everything() {
    let mut i = issue(IssueStatus::InProgress, &["user-input-needed", "user-feedback-given"]);
    i.has_live_worker = true;
    let state = build_issue_state(&i, TEAM).unwrap();
    assert_eq!(state.suggested_action, Action::RelayUserFeedback);
    assert!(state.has_user_feedback);
}

#[test]
fn feedback_relay_beats_orphan_detection() {
    // worker-active with no live window would trip the orphan rule, and
    // worker-done would trip a transition — the relay still wins.
    let i = issue(
        IssueStatus::InProgress,
        &["user-input-needed", "user-feedback-given", "worker-active", "worker-done"],
    );
    let state = build_issue_state(&i, TEAM).unwrap();
    assert_eq!(state.suggested_action, Action::RelayUserFeedback);
    assert!(state.has_user_feedback);
}

#[test]
fn pending_input_without_response_skips() {
    let i = issue(IssueStatus::Backlog, &["user-input-needed"]);
    let state = build_issue_state(&i, TEAM).unwrap();
    assert_eq!(state.suggested_action, Action::Skip);
    assert!(!state.has_user_feedback);
}

#[test]
fn orphaned_worker_is_cleared_before_status_routing() {
    // worker-active but no live window: the status alone would say
    // dispatch, but the orphan rule must fire first.
    let i = issue(IssueStatus::InProgress, &["worker-active"]);
    let state = build_issue_state(&i, TEAM).unwrap();
    assert_eq!(state.suggested_action, Action::RemoveWorkerActiveAndRedispatch);

    // Even with worker-done also set: routing would transition, but the
    // crashed-worker cleanup comes first.
    let i = issue(IssueStatus::InProgress, &["worker-active", "worker-done"]);
    let state = build_issue_state(&i, TEAM).unwrap();
    assert_eq!(state.suggested_action, Action::RemoveWorkerActiveAndRedispatch);
}

#[test]
fn worker_active_with_live_window_routes_normally() {
    let mut i = issue(IssueStatus::InProgress, &["worker-active"]);
    i.has_live_worker = true;
    let state = build_issue_state(&i, TEAM).unwrap();
    assert_eq!(state.suggested_action, Action::Skip);
}

// ---------------------------------------------------------------------------
// Session identity attachment
// ---------------------------------------------------------------------------

#[test]
fn session_id_follows_the_action_mode() {
    let mut i = issue(IssueStatus::NeedsReview, &["worker-done"]);
    i.has_pr = true;
    i.pr_is_draft = Some(false);

    let state = build_issue_state(&i, TEAM).unwrap();
    assert_eq!(state.suggested_action, Action::TransitionToRetro);
    assert_eq!(
        state.session_id,
        compute_session_id(TEAM, "ENG-21", WorkerMode::Review).unwrap()
    );
}

#[test]
fn every_action_has_a_mode() {
    for action in [
        Action::Skip,
        Action::DispatchArchitect,
        Action::DispatchPlanner,
        Action::DispatchImplementer,
        Action::DispatchReviewer,
        Action::DispatchMerger,
        Action::ResumeImplementerForChanges,
        Action::ResumeImplementerForRetro,
        Action::TransitionToTodo,
        Action::TransitionToInProgress,
        Action::TransitionToNeedsReview,
        Action::TransitionToRetro,
        Action::RelayUserFeedback,
        Action::RemoveWorkerActiveAndRedispatch,
        Action::InvestigateNoPr,
    ] {
        // mode() is total; computing an id from it must succeed.
        assert!(compute_session_id(TEAM, "ENG-1", action.mode()).is_ok());
    }
}

#[test]
fn malformed_team_id_fails_the_build() {
    let i = issue(IssueStatus::Todo, &[]);
    assert!(build_issue_state(&i, "not-a-uuid").is_err());
}
