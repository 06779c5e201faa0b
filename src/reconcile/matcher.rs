// src/reconcile/matcher.rs
//! Heuristic "same task?" strategies, used only for records no explicit
//! link has already joined.

use crate::config::{MatcherKind, ReconcileSettings};
use crate::model::SourceRecord;
use crate::normalize::{title_key, UNTITLED};

pub trait MatchStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Records with different keys are never compared. `None` puts the record
    /// in a single bucket with every other unkeyed record.
    fn block_key(&self, _record: &SourceRecord) -> Option<String> {
        None
    }

    fn is_match(&self, a: &SourceRecord, b: &SourceRecord) -> bool;
}

pub fn from_settings(s: &ReconcileSettings) -> Box<dyn MatchStrategy> {
    match s.matcher {
        MatcherKind::Exact => Box::new(ExactKeyMatcher),
        MatcherKind::Fuzzy => Box::new(FuzzyTitleMatcher::new(s.fuzzy_threshold)),
    }
}

/// Same normalized title, overlapping labels, same assignee.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExactKeyMatcher;

impl MatchStrategy for ExactKeyMatcher {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn block_key(&self, record: &SourceRecord) -> Option<String> {
        Some(title_key(&record.title))
    }

    fn is_match(&self, a: &SourceRecord, b: &SourceRecord) -> bool {
        matchable(a)
            && matchable(b)
            && title_key(&a.title) == title_key(&b.title)
            && labels_compatible(a, b)
            && assignee_compatible(a, b)
    }
}

/// Normalized Levenshtein similarity of title keys at or above `threshold`,
/// with the same label/assignee compatibility as the exact matcher.
#[derive(Debug, Clone, Copy)]
pub struct FuzzyTitleMatcher {
    threshold: f64,
}

impl FuzzyTitleMatcher {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }
}

impl MatchStrategy for FuzzyTitleMatcher {
    fn name(&self) -> &'static str {
        "fuzzy"
    }

    fn is_match(&self, a: &SourceRecord, b: &SourceRecord) -> bool {
        if !(matchable(a) && matchable(b)) {
            return false;
        }
        let (ka, kb) = (title_key(&a.title), title_key(&b.title));
        if ka.is_empty() || kb.is_empty() {
            return false;
        }
        strsim::normalized_levenshtein(&ka, &kb) >= self.threshold
            && labels_compatible(a, b)
            && assignee_compatible(a, b)
    }
}

/// Placeholder titles carry no identity.
fn matchable(r: &SourceRecord) -> bool {
    r.title != UNTITLED && !title_key(&r.title).is_empty()
}

/// Overlap, case-insensitively. Two unlabelled records are compatible.
fn labels_compatible(a: &SourceRecord, b: &SourceRecord) -> bool {
    if a.labels.is_empty() && b.labels.is_empty() {
        return true;
    }
    a.labels
        .iter()
        .any(|la| b.labels.iter().any(|lb| la.to_lowercase() == lb.to_lowercase()))
}

fn assignee_compatible(a: &SourceRecord, b: &SourceRecord) -> bool {
    match (&a.assignee, &b.assignee) {
        (None, None) => true,
        (Some(x), Some(y)) => x.trim().to_lowercase() == y.trim().to_lowercase(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Source, TaskStatus};
    use std::collections::BTreeSet;

    fn rec(source: Source, title: &str, labels: &[&str], assignee: Option<&str>) -> SourceRecord {
        SourceRecord {
            source,
            source_id: title.to_string(),
            title: title.to_string(),
            description: None,
            labels: labels.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            assignee: assignee.map(str::to_string),
            due_date: None,
            status: "open".into(),
            canonical_status: TaskStatus::Open,
            url: String::new(),
            created_at: None,
            updated_at: None,
            links: BTreeSet::new(),
        }
    }

    #[test]
    fn exact_requires_title_labels_and_assignee() {
        let m = ExactKeyMatcher;
        let a = rec(Source::Github, "Fix login bug", &["bug"], None);
        assert!(m.is_match(&a, &rec(Source::Notion, "fix login bug.", &["Bug", "urgent"], None)));
        assert!(!m.is_match(&a, &rec(Source::Notion, "Fix login bug", &["docs"], None)));
        assert!(!m.is_match(&a, &rec(Source::Notion, "Fix login bug", &["bug"], Some("ada"))));
        assert!(!m.is_match(&a, &rec(Source::Notion, "Fix logout bug", &["bug"], None)));
    }

    #[test]
    fn unlabelled_pairs_are_compatible_but_one_sided_labels_are_not() {
        let m = ExactKeyMatcher;
        let a = rec(Source::Github, "Ship it", &[], Some("Octo"));
        assert!(m.is_match(&a, &rec(Source::Notion, "Ship it", &[], Some("octo"))));
        assert!(!m.is_match(&a, &rec(Source::Notion, "Ship it", &["x"], Some("octo"))));
    }

    #[test]
    fn untitled_never_matches() {
        let m = ExactKeyMatcher;
        let a = rec(Source::Github, UNTITLED, &[], None);
        assert!(!m.is_match(&a, &rec(Source::Notion, UNTITLED, &[], None)));
    }

    #[test]
    fn fuzzy_tolerates_small_edits() {
        let m = FuzzyTitleMatcher::new(0.85);
        let a = rec(Source::Github, "Fix the login bug", &["bug"], None);
        assert!(m.is_match(&a, &rec(Source::Notion, "Fix the logn bug", &["bug"], None)));
        assert!(!m.is_match(&a, &rec(Source::Notion, "Write release notes", &["bug"], None)));
    }
}
