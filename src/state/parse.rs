//! Tracker payload normalization.
//!
//! The tracker returns issues in two dialects: the flat shape
//! (`"status": "Todo"`, `"labels": ["a", "b"]`) and the nested GraphQL
//! shape (`"state": {"name": "Todo"}`, `"labels": {"nodes": [{"name": …}]}`).
//! Both normalize into [`ParsedIssue`]. Issues without an identifier are
//! dropped — an issue we cannot name is not trackable.

use super::types::{IssueStatus, Labels, ParsedIssue, PrRef};
use serde_json::Value;

/// Parse raw tracker issues into normalized records.
pub fn parse_issues(raw_issues: &[Value]) -> Vec<ParsedIssue> {
    let mut parsed = Vec::with_capacity(raw_issues.len());

    for issue in raw_issues {
        let Some(issue_id) = issue
            .get("identifier")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
        else {
            continue;
        };

        parsed.push(ParsedIssue {
            issue_id: issue_id.to_owned(),
            status: extract_status(issue),
            labels: extract_labels(issue),
            pr_ref: extract_pr_ref(issue),
        });
    }

    eprintln!("[state] parsed {} issue(s) from tracker payload", parsed.len());
    parsed
}

/// Status lives at `"status"` (flat) or `"state.name"` (nested).
fn extract_status(issue: &Value) -> IssueStatus {
    let raw = issue
        .get("status")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .or_else(|| issue.get("state").and_then(|s| s.get("name")).and_then(Value::as_str))
        .unwrap_or("");
    IssueStatus::normalize(raw)
}

/// Labels are either a list of strings (flat) or `{"nodes": [{"name": …}]}`.
/// Anything malformed degrades to the empty set.
fn extract_labels(issue: &Value) -> Labels {
    match issue.get("labels") {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        Some(Value::Object(obj)) => obj
            .get("nodes")
            .and_then(Value::as_array)
            .map(|nodes| {
                nodes
                    .iter()
                    .filter_map(|node| node.get("name").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default(),
        _ => Labels::default(),
    }
}

/// First attachment whose URL parses as a canonical PR URL wins.
/// Non-matching attachments are ignored, not errors.
fn extract_pr_ref(issue: &Value) -> Option<PrRef> {
    issue
        .get("attachments")
        .and_then(Value::as_array)?
        .iter()
        .filter_map(|attachment| attachment.get("url").and_then(Value::as_str))
        .find_map(PrRef::from_url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_nested_dialect() {
        let issues = vec![json!({
            "identifier": "ENG-21",
            "state": {"name": "In Progress"},
            "labels": {"nodes": [{"name": "worker-done"}]},
        })];
        let parsed = parse_issues(&issues);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].issue_id, "ENG-21");
        assert_eq!(parsed[0].status, IssueStatus::InProgress);
        assert!(parsed[0].labels.worker_done());
    }

    #[test]
    fn parses_flat_dialect() {
        let issues = vec![json!({
            "identifier": "ENG-21",
            "status": "Todo",
            "labels": ["worker-active", "backend"],
        })];
        let parsed = parse_issues(&issues);
        assert_eq!(parsed[0].status, IssueStatus::Todo);
        assert!(parsed[0].labels.worker_active());
        assert!(parsed[0].labels.contains("backend"));
    }

    #[test]
    fn normalizes_status_alias() {
        let issues = vec![json!({
            "identifier": "ENG-21",
            "state": {"name": "In Review"},
            "labels": {"nodes": []},
        })];
        assert_eq!(parse_issues(&issues)[0].status, IssueStatus::NeedsReview);
    }

    #[test]
    fn drops_issues_without_identifier() {
        let issues = vec![
            json!({"state": {"name": "Todo"}, "labels": {"nodes": []}}),
            json!({"identifier": "ENG-21", "state": {"name": "Todo"}}),
        ];
        let parsed = parse_issues(&issues);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].issue_id, "ENG-21");
    }

    #[test]
    fn tolerates_null_state_and_labels() {
        let issues = vec![json!({"identifier": "ENG-21", "state": null, "labels": null})];
        let parsed = parse_issues(&issues);
        assert_eq!(parsed[0].status, IssueStatus::Other(String::new()));
        assert_eq!(parsed[0].labels, Labels::default());
    }

    #[test]
    fn first_valid_pr_attachment_wins() {
        let issues = vec![json!({
            "identifier": "ENG-21",
            "status": "Needs Review",
            "labels": ["worker-done"],
            "attachments": [
                {"url": "https://example.com/design-doc"},
                {"url": "https://github.com/acme/widgets/pull/7"},
                {"url": "https://github.com/acme/widgets/pull/8"},
            ],
        })];
        let parsed = parse_issues(&issues);
        let pr = parsed[0].pr_ref.as_ref().unwrap();
        assert_eq!(
            (pr.owner.as_str(), pr.repo.as_str(), pr.number),
            ("acme", "widgets", 7)
        );
        assert!(parsed[0].needs_pr_status());
    }

    #[test]
    fn oversized_pr_number_treated_as_no_reference() {
        let issues = vec![json!({
            "identifier": "ENG-21",
            "status": "Needs Review",
            "labels": ["worker-done"],
            "attachments": [{"url": "https://github.com/a/b/pull/99999999999"}],
        })];
        let parsed = parse_issues(&issues);
        assert!(parsed[0].pr_ref.is_none());
        assert!(!parsed[0].needs_pr_status());
    }
}
