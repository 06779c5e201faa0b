// src/reconcile/merge.rs
//! Field merging for one finalized group of contributor records.

use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

use crate::model::{Source, SourceRecord, Task};
use crate::normalize::UNTITLED;

/// `task-` + 16 hex chars of SHA-256 over the sorted `source:source_id` lines.
/// Depends on contributor identity only.
pub fn task_id<'a>(contributors: impl IntoIterator<Item = (Source, &'a str)>) -> String {
    let mut lines: Vec<String> = contributors
        .into_iter()
        .map(|(s, id)| format!("{s}:{id}"))
        .collect();
    lines.sort();

    let mut hasher = Sha256::new();
    hasher.update(lines.join("\n").as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().take(8).map(|b| format!("{b:02x}")).collect();
    format!("task-{hex}")
}

/// Merge `group` (non-empty). `priority` orders sources, most trusted first;
/// sources not listed rank after the listed ones.
pub fn merge_group(group: &[&SourceRecord], priority: &[Source]) -> Task {
    let rank = |s: Source| priority.iter().position(|p| *p == s).unwrap_or(priority.len());
    let mut by_priority: Vec<&SourceRecord> = group.to_vec();
    by_priority.sort_by(|a, b| {
        rank(a.source)
            .cmp(&rank(b.source))
            .then(a.source.cmp(&b.source))
            .then_with(|| a.source_id.cmp(&b.source_id))
    });

    let title = pick_text(&by_priority, |r| Some(r.title.as_str()).filter(|t| *t != UNTITLED))
        .unwrap_or_else(|| UNTITLED.to_string());
    let description = pick_text(&by_priority, |r| r.description.as_deref());
    let assignee = by_priority.iter().find_map(|r| r.assignee.clone());

    let labels: BTreeSet<String> = group.iter().flat_map(|r| r.labels.iter().cloned()).collect();
    let due_date = group.iter().filter_map(|r| r.due_date).min();
    let created_at = group.iter().filter_map(|r| r.created_at).min();
    let updated_at = group.iter().filter_map(|r| r.updated_at).max();

    // Highest activity wins; all-closed groups therefore stay closed-equivalent.
    let status = group
        .iter()
        .map(|r| r.canonical_status)
        .max_by_key(|s| s.activity_rank())
        .unwrap_or_default();

    let sources: BTreeSet<Source> = group.iter().map(|r| r.source).collect();
    let source_ids: BTreeMap<Source, String> = group.iter().map(|r| (r.source, r.source_id.clone())).collect();
    let urls: BTreeMap<Source, String> = group.iter().map(|r| (r.source, r.url.clone())).collect();

    Task {
        id: task_id(group.iter().map(|r| (r.source, r.source_id.as_str()))),
        title,
        description,
        sources,
        source_ids,
        labels,
        due_date,
        assignee,
        status,
        importance_score: 0.0,
        urls,
        created_at,
        updated_at,
    }
}

/// Highest-priority non-empty value; if that one is missing everywhere the
/// longest candidate wins.
fn pick_text<'a>(
    by_priority: &[&'a SourceRecord],
    field: impl Fn(&'a SourceRecord) -> Option<&'a str>,
) -> Option<String> {
    if let Some(v) = by_priority
        .first()
        .copied()
        .and_then(&field)
        .filter(|v| !v.trim().is_empty())
    {
        return Some(v.to_string());
    }
    by_priority
        .iter()
        .copied()
        .filter_map(&field)
        .filter(|v| !v.trim().is_empty())
        .max_by_key(|v| v.chars().count())
        .map(str::to_string)
}
