// src/reconcile/union_find.rs
//! Disjoint sets over record indices, tracking which sources each set holds
//! so a union can never put two records of one source into one group.

use std::collections::BTreeSet;

use crate::model::Source;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Union {
    Merged,
    AlreadyJoined,
    /// Both sets already contain a record from the same source.
    Refused,
}

#[derive(Debug, Clone)]
pub struct SourceUnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
    sources: Vec<BTreeSet<Source>>,
}

impl SourceUnionFind {
    pub fn new(sources: impl IntoIterator<Item = Source>) -> Self {
        let sources: Vec<BTreeSet<Source>> = sources.into_iter().map(|s| BTreeSet::from([s])).collect();
        let n = sources.len();
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
            sources,
        }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        // path compression
        let mut cur = x;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    pub fn union(&mut self, a: usize, b: usize) -> Union {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return Union::AlreadyJoined;
        }
        if !self.sources[ra].is_disjoint(&self.sources[rb]) {
            return Union::Refused;
        }

        let (big, small) = if self.rank[ra] >= self.rank[rb] { (ra, rb) } else { (rb, ra) };
        self.parent[small] = big;
        if self.rank[big] == self.rank[small] {
            self.rank[big] += 1;
        }
        let moved = std::mem::take(&mut self.sources[small]);
        self.sources[big].extend(moved);
        Union::Merged
    }

    /// Groups of indices, each sorted, ordered by their smallest member.
    pub fn groups(&mut self) -> Vec<Vec<usize>> {
        let n = self.len();
        let mut by_root: Vec<Vec<usize>> = vec![Vec::new(); n];
        for i in 0..n {
            let r = self.find(i);
            by_root[r].push(i);
        }
        let mut out: Vec<Vec<usize>> = by_root.into_iter().filter(|g| !g.is_empty()).collect();
        out.sort_by_key(|g| g[0]);
        out
    }
}
