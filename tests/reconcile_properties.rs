// tests/reconcile_properties.rs
//
// Reconciler properties over normalized records:
// - every record lands in exactly one task
// - same input in any order → same tasks
// - closed only when every contributor is closed
// - the GitHub/Notion "Fix login bug" scenario

use std::collections::{BTreeSet, HashMap};

use chrono::{TimeZone, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use task_sync::config::ReconcileSettings;
use task_sync::model::{Source, SourceRecord, SourceRef, Task, TaskComparison, TaskStatus};
use task_sync::reconcile::Reconciler;
use task_sync::score::{score_all, ScoringWeights};
use task_sync::SyncStatus;

fn rec(source: Source, id: &str, title: &str, labels: &[&str], status: TaskStatus) -> SourceRecord {
    SourceRecord {
        source,
        source_id: id.to_string(),
        title: title.to_string(),
        description: None,
        labels: labels.iter().map(|s| s.to_string()).collect(),
        assignee: None,
        due_date: None,
        status: format!("{status:?}"),
        canonical_status: status,
        url: format!("https://example.test/{source}/{id}"),
        created_at: None,
        updated_at: None,
        links: BTreeSet::new(),
    }
}

fn reconciler() -> Reconciler {
    Reconciler::from_settings(&ReconcileSettings::default()).expect("default reconciler")
}

fn corpus() -> Vec<SourceRecord> {
    let mut linked = rec(Source::Notion, "n-linked", "Quarterly planning", &[], TaskStatus::Open);
    linked.links.insert(SourceRef::new(Source::Github, "#7"));

    let mut by_url = rec(Source::Notion, "n-url", "Unrelated name", &["infra"], TaskStatus::Done);
    by_url.description = Some("see https://github.com/acme/app/issues/8 for details".into());

    vec![
        rec(Source::Github, "1", "Fix login bug", &["bug"], TaskStatus::Open),
        rec(Source::Notion, "n1", "Fix login bug", &["bug", "urgent"], TaskStatus::InProgress),
        rec(Source::Github, "2", "Write docs", &[], TaskStatus::Closed),
        rec(Source::Notion, "n2", "write docs!", &[], TaskStatus::Done),
        rec(Source::Github, "3", "Same title", &["a"], TaskStatus::Open),
        rec(Source::Github, "4", "Same title", &["a"], TaskStatus::Open),
        rec(Source::Notion, "n3", "Same title", &["a"], TaskStatus::Open),
        rec(Source::Github, "5", "Label mismatch", &["x"], TaskStatus::Open),
        rec(Source::Notion, "n5", "Label mismatch", &["y"], TaskStatus::Open),
        rec(Source::Github, "7", "Planning Q3", &[], TaskStatus::Open),
        rec(Source::Github, "8", "Migrate CI", &["infra"], TaskStatus::Closed),
        linked,
        by_url,
        rec(Source::Notion, "n9", "Notion only", &[], TaskStatus::Open),
    ]
}

fn contributor_counts(tasks: &[Task]) -> HashMap<(Source, String), usize> {
    let mut seen = HashMap::new();
    for t in tasks {
        for (s, id) in &t.source_ids {
            *seen.entry((*s, id.clone())).or_insert(0) += 1;
        }
    }
    seen
}

#[test]
fn login_bug_scenario_merges_into_one_task() {
    let records = vec![
        rec(Source::Github, "42", "Fix login bug", &["bug"], TaskStatus::Open),
        rec(Source::Notion, "abc", "Fix login bug", &["bug", "urgent"], TaskStatus::InProgress),
    ];
    let tasks = reconciler().reconcile(&records).unwrap();
    assert_eq!(tasks.len(), 1);

    let t = &tasks[0];
    assert_eq!(t.sources.iter().copied().collect::<Vec<_>>(), vec![Source::Github, Source::Notion]);
    assert_eq!(t.labels.iter().map(String::as_str).collect::<Vec<_>>(), vec!["bug", "urgent"]);
    assert_eq!(t.status, TaskStatus::InProgress);
    assert_eq!(t.source_ids[&Source::Github], "42");
    assert_eq!(t.source_ids[&Source::Notion], "abc");
    assert_eq!(t.urls.len(), 2);
}

#[test]
fn every_record_appears_in_exactly_one_task() {
    let records = corpus();
    let tasks = reconciler().reconcile(&records).unwrap();
    let seen = contributor_counts(&tasks);

    assert_eq!(seen.len(), records.len());
    for r in &records {
        assert_eq!(seen.get(&(r.source, r.source_id.clone())), Some(&1), "{}:{}", r.source, r.source_id);
    }
    for t in &tasks {
        assert!(!t.sources.is_empty());
        for s in &t.sources {
            assert!(t.source_ids.contains_key(s));
            assert!(t.urls.contains_key(s));
        }
    }
}

#[test]
fn expected_groupings_in_corpus() {
    let tasks = reconciler().reconcile(&corpus()).unwrap();
    let find = |s: Source, id: &str| {
        tasks
            .iter()
            .find(|t| t.source_ids.get(&s).map(String::as_str) == Some(id))
            .unwrap()
    };

    // explicit link metadata and URL in description
    assert_eq!(find(Source::Github, "7").source_ids.get(&Source::Notion).unwrap(), "n-linked");
    assert_eq!(find(Source::Github, "8").source_ids.get(&Source::Notion).unwrap(), "n-url");
    // punctuation/case-insensitive title match
    assert_eq!(find(Source::Github, "2").sources.len(), 2);
    // label sets must overlap
    assert_eq!(find(Source::Github, "5").sources.len(), 1);
    // one github partner for n3, never two
    assert_eq!(find(Source::Notion, "n3").sources.len(), 2);
    assert_eq!(find(Source::Github, "4").sources.len(), 1);
}

#[test]
fn reconciliation_is_independent_of_input_order() {
    let records = corpus();
    let baseline = reconciler().reconcile(&records).unwrap();
    let mut base_sorted = baseline.clone();
    base_sorted.sort_by(|a, b| a.id.cmp(&b.id));

    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..25 {
        let mut shuffled = records.clone();
        shuffled.shuffle(&mut rng);
        let mut tasks = reconciler().reconcile(&shuffled).unwrap();
        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(tasks, base_sorted);
    }
}

#[test]
fn ids_are_stable_across_runs_and_ignore_field_values() {
    let mut records = corpus();
    let first = reconciler().reconcile(&records).unwrap();
    for r in records.iter_mut() {
        r.due_date = chrono::NaiveDate::from_ymd_opt(2026, 6, 1);
        r.updated_at = Some(Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap());
        r.canonical_status = TaskStatus::Open;
    }
    let second = reconciler().reconcile(&records).unwrap();
    let ids = |ts: &[Task]| ts.iter().map(|t| t.id.clone()).collect::<BTreeSet<_>>();
    assert_eq!(ids(&first), ids(&second));
}

#[test]
fn closed_iff_all_contributors_closed() {
    let gh = rec(Source::Github, "2", "Write docs", &[], TaskStatus::Closed);
    let nt = rec(Source::Notion, "n2", "Write docs", &[], TaskStatus::Done);
    let tasks = reconciler().reconcile(&[gh.clone(), nt]).unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].status, TaskStatus::Done);

    let reopened = rec(Source::Notion, "n2", "Write docs", &[], TaskStatus::Open);
    let tasks = reconciler().reconcile(&[gh, reopened]).unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].status, TaskStatus::Open);
}

#[test]
fn assembled_snapshot_is_sorted_by_score_then_id() {
    let mut tasks = reconciler().reconcile(&corpus()).unwrap();
    let now = Utc.with_ymd_and_hms(2026, 1, 10, 0, 0, 0).unwrap();
    score_all(&mut tasks, now, &ScoringWeights::default());

    let cmp = TaskComparison::assemble(tasks, &Source::ALL, SyncStatus::default());
    for pair in cmp.all_tasks.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(
            a.importance_score > b.importance_score
                || (a.importance_score == b.importance_score && a.id < b.id)
        );
        assert!(a.importance_score >= 0.0);
    }
    let gh_count = cmp.all_tasks.iter().filter(|t| t.has_source(Source::Github)).count();
    assert_eq!(cmp.tasks_by_source[&Source::Github].len(), gh_count);
}
