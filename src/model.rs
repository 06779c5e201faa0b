//! # Data Model
//! Shapes shared by every stage of a sync cycle: the per-source
//! `SourceRecord`, the merged `Task`, and the published `TaskComparison`.
//!
//! JSON field names match what the presentation client reads verbatim.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// External system a record was ingested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Github,
    Notion,
}

impl Source {
    pub const ALL: [Source; 2] = [Source::Github, Source::Notion];

    pub fn as_str(self) -> &'static str {
        match self {
            Source::Github => "github",
            Source::Notion => "notion",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown source '{0}'")]
pub struct UnknownSource(pub String);

impl FromStr for Source {
    type Err = UnknownSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "github" | "gh" => Ok(Source::Github),
            "notion" => Ok(Source::Notion),
            _ => Err(UnknownSource(s.to_string())),
        }
    }
}

/// Canonical task status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Open,
    InProgress,
    Done,
    Closed,
}

impl TaskStatus {
    /// Activity rank used when merging: the highest rank among contributors wins.
    /// in_progress > open > done > closed
    pub fn activity_rank(self) -> u8 {
        match self {
            TaskStatus::InProgress => 3,
            TaskStatus::Open => 2,
            TaskStatus::Done => 1,
            TaskStatus::Closed => 0,
        }
    }

    pub fn is_closed(self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Closed)
    }
}

/// Reference to a record in some source, by its native id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceRef {
    pub source: Source,
    pub source_id: String,
}

impl SourceRef {
    pub fn new(source: Source, source_id: impl Into<String>) -> Self {
        Self {
            source,
            source_id: source_id.into(),
        }
    }
}

/// One connector's normalized view of one task, before merging.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub source: Source,
    pub source_id: String,
    pub title: String,
    pub description: Option<String>,
    pub labels: BTreeSet<String>,
    pub assignee: Option<String>,
    pub due_date: Option<NaiveDate>,
    /// Source-native status string, kept for diagnostics.
    pub status: String,
    pub canonical_status: TaskStatus,
    pub url: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Explicit cross-source references taken from source metadata.
    pub links: BTreeSet<SourceRef>,
}

impl SourceRecord {
    pub fn key(&self) -> SourceRef {
        SourceRef::new(self.source, self.source_id.clone())
    }
}

/// The merged, canonical task exposed to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub sources: BTreeSet<Source>,
    pub source_ids: BTreeMap<Source, String>,
    pub labels: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    pub status: TaskStatus,
    pub importance_score: f64,
    pub urls: BTreeMap<Source, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn has_source(&self, source: Source) -> bool {
        self.sources.contains(&source)
    }
}

/// Sync metadata for one published snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub total_tasks_by_source: BTreeMap<Source, usize>,
    pub last_sync: Option<DateTime<Utc>>,
    #[serde(default)]
    pub degraded_sources: BTreeSet<Source>,
    #[serde(default)]
    pub warnings: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// One immutable, fully computed sync result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskComparison {
    pub all_tasks: Vec<Task>,
    pub tasks_by_source: BTreeMap<Source, Vec<Task>>,
    pub sync_status: SyncStatus,
}

impl TaskComparison {
    /// Build a comparison from scored tasks: sorts by score (desc) then id (asc)
    /// and buckets every task under each of its sources.
    pub fn assemble(mut tasks: Vec<Task>, sources: &[Source], sync_status: SyncStatus) -> Self {
        sort_by_importance(&mut tasks);

        let mut tasks_by_source: BTreeMap<Source, Vec<Task>> =
            sources.iter().map(|s| (*s, Vec::new())).collect();
        for task in &tasks {
            for source in &task.sources {
                tasks_by_source
                    .entry(*source)
                    .or_default()
                    .push(task.clone());
            }
        }

        Self {
            all_tasks: tasks,
            tasks_by_source,
            sync_status,
        }
    }

    /// Tasks containing `source`; an unknown source yields an empty list.
    pub fn tasks_for(&self, source: &str) -> Vec<Task> {
        match source.parse::<Source>() {
            Ok(s) => self
                .all_tasks
                .iter()
                .filter(|t| t.has_source(s))
                .cloned()
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// Descending importance, ties broken by ascending id.
pub fn sort_by_importance(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| {
        b.importance_score
            .total_cmp(&a.importance_score)
            .then_with(|| a.id.cmp(&b.id))
    });
}
