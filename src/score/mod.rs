//! # Importance Scorer
//! Weighted sum over due-date urgency, status, cross-source presence,
//! label signals, assignment and staleness.
//!
//! Every weight lives in [`ScoringWeights`]; the `[scoring]` config section
//! overrides any subset of them:
//!
//! ```toml
//! [scoring]
//! overdue_base = 100.0
//! per_extra_source = 15.0
//! [scoring.label_weights]
//! urgent = 30.0
//! ```
//!
//! Scores are computed against "now" and never cached across cycles.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::model::{Task, TaskStatus};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    // due-date urgency
    pub overdue_base: f64,
    pub overdue_per_day: f64,
    pub due_today: f64,
    pub due_tomorrow: f64,
    pub due_within_3_days: f64,
    pub due_within_week: f64,
    pub due_within_2_weeks: f64,
    pub due_within_month: f64,

    // status
    pub status_open: f64,
    pub status_in_progress: f64,
    pub closed_penalty: f64,
    /// Residual a just-updated closed task keeps; halves every `closed_half_life_days`.
    pub closed_recency_bonus: f64,
    pub closed_half_life_days: f64,

    pub per_extra_source: f64,
    pub assigned_bonus: f64,

    // staleness by days since updated_at
    pub stale_30_days: f64,
    pub stale_60_days: f64,

    /// Case-insensitive label name → bonus.
    pub label_weights: BTreeMap<String, f64>,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        let label_weights = [
            ("p0", 40.0),
            ("blocker", 35.0),
            ("critical", 30.0),
            ("urgent", 30.0),
            ("p1", 25.0),
            ("high", 20.0),
            ("bug", 5.0),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            overdue_base: 100.0,
            overdue_per_day: 2.0,
            due_today: 90.0,
            due_tomorrow: 80.0,
            due_within_3_days: 70.0,
            due_within_week: 60.0,
            due_within_2_weeks: 40.0,
            due_within_month: 20.0,
            status_open: 10.0,
            status_in_progress: 25.0,
            closed_penalty: 80.0,
            closed_recency_bonus: 5.0,
            closed_half_life_days: 14.0,
            per_extra_source: 15.0,
            assigned_bonus: 5.0,
            stale_30_days: 10.0,
            stale_60_days: 20.0,
            label_weights,
        }
    }
}

impl ScoringWeights {
    fn label_weight(&self, label: &str) -> f64 {
        let needle = label.trim().to_lowercase();
        self.label_weights
            .iter()
            .find(|(k, _)| k.to_lowercase() == needle)
            .map(|(_, w)| *w)
            .unwrap_or(0.0)
    }
}

/// Urgency from the due date alone. `days_until` < 0 means overdue.
pub fn due_urgency(days_until: i64, w: &ScoringWeights) -> f64 {
    match days_until {
        d if d < 0 => w.overdue_base + w.overdue_per_day * (-d) as f64,
        0 => w.due_today,
        1 => w.due_tomorrow,
        2..=3 => w.due_within_3_days,
        4..=7 => w.due_within_week,
        8..=14 => w.due_within_2_weeks,
        15..=30 => w.due_within_month,
        _ => 0.0,
    }
}

fn status_term(status: TaskStatus, w: &ScoringWeights) -> f64 {
    match status {
        TaskStatus::Open => w.status_open,
        TaskStatus::InProgress => w.status_in_progress,
        TaskStatus::Done | TaskStatus::Closed => -w.closed_penalty,
    }
}

fn staleness_term(updated_at: Option<DateTime<Utc>>, now: DateTime<Utc>, w: &ScoringWeights) -> f64 {
    let Some(updated) = updated_at else {
        return 0.0;
    };
    match (now - updated).num_days() {
        d if d > 60 => w.stale_60_days,
        d if d > 30 => w.stale_30_days,
        _ => 0.0,
    }
}

/// Decays from `closed_recency_bonus` with the age of the last update.
/// Strictly positive for any dated task, so closed items keep their recency order.
fn closed_residual(task: &Task, now: DateTime<Utc>, w: &ScoringWeights) -> f64 {
    let Some(at) = task.updated_at.or(task.created_at) else {
        return 0.0;
    };
    let age_days = (now - at).num_seconds().max(0) as f64 / 86_400.0;
    let half_life = w.closed_half_life_days.max(f64::EPSILON);
    w.closed_recency_bonus * 0.5f64.powf(age_days / half_life)
}

/// Due date, extra sources, labels and assignment. Never negative.
fn signal_terms(task: &Task, now: DateTime<Utc>, w: &ScoringWeights) -> f64 {
    let mut score = 0.0;

    if let Some(due) = task.due_date {
        let days_until = (due - now.date_naive()).num_days();
        score += due_urgency(days_until, w);
    }

    let extra_sources = task.sources.len().saturating_sub(1);
    score += w.per_extra_source * extra_sources as f64;

    score += task
        .labels
        .iter()
        .map(|l| l.trim().to_lowercase())
        .collect::<std::collections::BTreeSet<_>>()
        .iter()
        .map(|l| w.label_weight(l))
        .sum::<f64>();

    if task.assignee.is_some() {
        score += w.assigned_bonus;
    }
    score
}

/// Importance of one merged task at `now`. Never negative, unbounded above.
///
/// Open work keeps its status term however stale it gets; staleness only
/// eats into the other signals. Closed work pays `closed_penalty` against
/// its signals (floored at 0) and keeps a recency residual on top.
pub fn importance_score(task: &Task, now: DateTime<Utc>, w: &ScoringWeights) -> f64 {
    let signals = signal_terms(task, now, w);
    match task.status {
        TaskStatus::Open | TaskStatus::InProgress => {
            let stale = staleness_term(task.updated_at, now, w);
            (status_term(task.status, w) + (signals - stale).max(0.0)).max(0.0)
        }
        TaskStatus::Done | TaskStatus::Closed => {
            (signals + status_term(task.status, w)).max(0.0) + closed_residual(task, now, w)
        }
    }
}

/// Score every task in place.
pub fn score_all(tasks: &mut [Task], now: DateTime<Utc>, w: &ScoringWeights) {
    for t in tasks.iter_mut() {
        t.importance_score = importance_score(t, now, w);
    }
}
