// src/normalize/status.rs
//! Native status vocabularies → `TaskStatus`.
//!
//! Exact table lookups first; Notion additionally falls back to substring
//! checks because workspaces rename their status options freely.
//! `None` means "not recognised"; the caller decides the fallback.

use crate::model::TaskStatus;

const IN_PROGRESS_LABELS: &[&str] = &["in progress", "in-progress"];

const NOTION_TABLE: &[(&str, TaskStatus)] = &[
    ("not started", TaskStatus::Open),
    ("todo", TaskStatus::Open),
    ("to do", TaskStatus::Open),
    ("backlog", TaskStatus::Open),
    ("open", TaskStatus::Open),
    ("in progress", TaskStatus::InProgress),
    ("doing", TaskStatus::InProgress),
    ("in review", TaskStatus::InProgress),
    ("started", TaskStatus::InProgress),
    ("done", TaskStatus::Done),
    ("complete", TaskStatus::Done),
    ("completed", TaskStatus::Done),
    ("archived", TaskStatus::Closed),
    ("cancelled", TaskStatus::Closed),
    ("canceled", TaskStatus::Closed),
    ("closed", TaskStatus::Closed),
];

/// GitHub issue `state` plus optional `state_reason`.
/// An open issue with an in-progress label is `InProgress`.
pub fn github_status<'a, I>(state: &str, state_reason: Option<&str>, labels: I) -> Option<TaskStatus>
where
    I: IntoIterator<Item = &'a str>,
{
    let state = state.trim().to_ascii_lowercase();
    let reason = state_reason.map(|r| r.trim().to_ascii_lowercase());

    match state.as_str() {
        "open" => {
            let in_progress = labels
                .into_iter()
                .any(|l| IN_PROGRESS_LABELS.contains(&l.trim().to_lowercase().as_str()));
            Some(if in_progress {
                TaskStatus::InProgress
            } else {
                TaskStatus::Open
            })
        }
        "closed" => match reason.as_deref() {
            Some("completed") => Some(TaskStatus::Done),
            Some("not_planned") | Some("duplicate") | None | Some("") => Some(TaskStatus::Closed),
            Some("reopened") => Some(TaskStatus::Open),
            Some(_) => Some(TaskStatus::Closed),
        },
        "merged" | "completed" => Some(TaskStatus::Done),
        "not_planned" => Some(TaskStatus::Closed),
        _ => None,
    }
}

/// Notion status/select option name.
pub fn notion_status(name: &str) -> Option<TaskStatus> {
    let key = name.trim().to_lowercase();
    if let Some((_, s)) = NOTION_TABLE.iter().find(|(k, _)| *k == key) {
        return Some(*s);
    }
    if key.contains("done") || key.contains("complete") {
        return Some(TaskStatus::Done);
    }
    if key.contains("progress") {
        return Some(TaskStatus::InProgress);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn github_table() {
        let none: [&str; 0] = [];
        assert_eq!(github_status("open", None, none), Some(TaskStatus::Open));
        assert_eq!(github_status("closed", None, none), Some(TaskStatus::Closed));
        assert_eq!(github_status("closed", Some("completed"), none), Some(TaskStatus::Done));
        assert_eq!(github_status("closed", Some("not_planned"), none), Some(TaskStatus::Closed));
        assert_eq!(github_status("merged", None, none), Some(TaskStatus::Done));
        assert_eq!(github_status("locked", None, none), None);
    }

    #[test]
    fn github_in_progress_label_only_applies_to_open() {
        assert_eq!(
            github_status("open", None, ["bug", "In Progress"]),
            Some(TaskStatus::InProgress)
        );
        assert_eq!(
            github_status("closed", None, ["in-progress"]),
            Some(TaskStatus::Closed)
        );
    }

    #[test]
    fn notion_table_and_fallbacks() {
        assert_eq!(notion_status("Not started"), Some(TaskStatus::Open));
        assert_eq!(notion_status("In Review"), Some(TaskStatus::InProgress));
        assert_eq!(notion_status("Canceled"), Some(TaskStatus::Closed));
        assert_eq!(notion_status("Done ✅"), Some(TaskStatus::Done));
        assert_eq!(notion_status("Work in progress"), Some(TaskStatus::InProgress));
        assert_eq!(notion_status("Blocked"), None);
    }
}
