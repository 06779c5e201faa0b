// src/reconcile/mod.rs
//! # Reconciler
//! Groups the cycle's `SourceRecord`s into `Task`s.
//!
//! 1. explicit links (record metadata + link rules over descriptions)
//! 2. heuristic `MatchStrategy` over records no link has joined
//! 3. everything else stands alone
//!
//! Grouping is a union-find pass over record indices; fields are merged
//! only once the groups are final. Records are visited in
//! `(source, source_id)` order, so the outcome does not depend on input order.

pub mod links;
pub mod matcher;
pub mod merge;
pub mod union_find;

use anyhow::Result;
use std::collections::{BTreeMap, HashMap};

use crate::config::ReconcileSettings;
use crate::error::ReconcileError;
use crate::model::{Source, SourceRecord, SourceRef, Task};
use crate::normalize::canonical_id;
use links::LinkRule;
use matcher::MatchStrategy;
use union_find::{SourceUnionFind, Union};

pub struct Reconciler {
    primary_sources: Vec<Source>,
    matcher: Box<dyn MatchStrategy>,
    link_rules: Vec<LinkRule>,
}

impl Reconciler {
    pub fn new(primary_sources: Vec<Source>, matcher: Box<dyn MatchStrategy>, link_rules: Vec<LinkRule>) -> Self {
        Self {
            primary_sources,
            matcher,
            link_rules,
        }
    }

    pub fn from_settings(s: &ReconcileSettings) -> Result<Self> {
        Ok(Self::new(
            s.primary_sources.clone(),
            matcher::from_settings(s),
            LinkRule::from_settings(&s.link_patterns)?,
        ))
    }

    pub fn matcher_name(&self) -> &'static str {
        self.matcher.name()
    }

    /// Every input record ends up in exactly one returned task.
    /// Scores are left at zero.
    pub fn reconcile(&self, records: &[SourceRecord]) -> Result<Vec<Task>, ReconcileError> {
        let mut order: Vec<usize> = (0..records.len()).collect();
        order.sort_by(|&a, &b| {
            (records[a].source, &records[a].source_id).cmp(&(records[b].source, &records[b].source_id))
        });
        let sorted: Vec<&SourceRecord> = order.iter().map(|&i| &records[i]).collect();

        let mut uf = SourceUnionFind::new(sorted.iter().map(|r| r.source));
        let linked = self.join_explicit_links(&sorted, &mut uf);
        self.join_heuristic_matches(&sorted, &linked, &mut uf);

        let groups = uf.groups();
        check_partition(&sorted, &groups)?;

        let tasks: Vec<Task> = groups
            .iter()
            .map(|g| {
                let members: Vec<&SourceRecord> = g.iter().map(|&i| sorted[i]).collect();
                merge::merge_group(&members, &self.primary_sources)
            })
            .collect();

        tracing::debug!(
            records = records.len(),
            tasks = tasks.len(),
            matcher = self.matcher.name(),
            "reconciled"
        );
        Ok(tasks)
    }

    /// Returns which indices took part in an explicit link.
    fn join_explicit_links(&self, sorted: &[&SourceRecord], uf: &mut SourceUnionFind) -> Vec<bool> {
        let index: HashMap<(Source, String), usize> = sorted
            .iter()
            .enumerate()
            .map(|(i, r)| ((r.source, canonical_id(&r.source_id)), i))
            .collect();

        let mut linked = vec![false; sorted.len()];
        for (i, r) in sorted.iter().enumerate() {
            let mut refs: Vec<SourceRef> = r.links.iter().cloned().collect();
            refs.extend(self.link_rules.iter().flat_map(|rule| rule.extract(r)));

            for target in refs {
                if target.source == r.source {
                    continue;
                }
                let Some(&j) = index.get(&(target.source, canonical_id(&target.source_id))) else {
                    tracing::debug!(from = %display_key(r), to = %target.source_id, "link target not in this cycle");
                    continue;
                };
                match uf.union(i, j) {
                    Union::Merged | Union::AlreadyJoined => {
                        linked[i] = true;
                        linked[j] = true;
                    }
                    Union::Refused => {
                        tracing::warn!(
                            from = %display_key(r),
                            to = %display_key(sorted[j]),
                            "explicit link refused: group already has a record from that source"
                        );
                    }
                }
            }
        }
        linked
    }

    fn join_heuristic_matches(&self, sorted: &[&SourceRecord], linked: &[bool], uf: &mut SourceUnionFind) {
        let mut buckets: BTreeMap<Option<String>, Vec<usize>> = BTreeMap::new();
        for (i, r) in sorted.iter().enumerate() {
            if !linked[i] {
                buckets.entry(self.matcher.block_key(r)).or_default().push(i);
            }
        }

        for members in buckets.values() {
            for (pos, &i) in members.iter().enumerate() {
                for &j in &members[pos + 1..] {
                    let (a, b) = (sorted[i], sorted[j]);
                    if a.source == b.source || !self.matcher.is_match(a, b) {
                        continue;
                    }
                    if uf.union(i, j) == Union::Refused {
                        tracing::info!(
                            a = %display_key(a),
                            b = %display_key(b),
                            "heuristic match refused: one record per source per task"
                        );
                    }
                }
            }
        }
    }
}

/// Every record index must appear in exactly one group.
fn check_partition(sorted: &[&SourceRecord], groups: &[Vec<usize>]) -> Result<(), ReconcileError> {
    let mut seen = vec![0usize; sorted.len()];
    for g in groups {
        for &i in g {
            if let Some(n) = seen.get_mut(i) {
                *n += 1;
            }
        }
    }
    match seen.iter().position(|&n| n != 1) {
        Some(i) => Err(ReconcileError::InvariantViolation {
            source_name: sorted[i].source,
            source_id: sorted[i].source_id.clone(),
            groups: seen[i],
        }),
        None => Ok(()),
    }
}

fn display_key(r: &SourceRecord) -> String {
    format!("{}:{}", r.source, r.source_id)
}
