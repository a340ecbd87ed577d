//! File dependency graph.
//!
//! Each unification of a defining occurrence in file `D` with a referencing
//! occurrence in file `R` records the edge `D -> R`. Edges are kept in both
//! directions, deduplicated, and never removed during a run.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::file::FileId;

/// A definer → referencer relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DependencyEdge {
    pub definer: FileId,
    pub referencer: FileId,
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// definer → referencers
    forward: BTreeMap<FileId, BTreeSet<FileId>>,
    /// referencer → definers
    backward: BTreeMap<FileId, BTreeSet<FileId>>,
    len: usize,
}

impl DependencyGraph {
    pub fn new() -> Self {
        DependencyGraph::default()
    }

    /// Record `definer -> referencer`. Returns `true` if the edge is new.
    pub fn add_edge(&mut self, definer: FileId, referencer: FileId) -> bool {
        let added = self.forward.entry(definer).or_default().insert(referencer);
        if added {
            self.backward.entry(referencer).or_default().insert(definer);
            self.len += 1;
            tracing::trace!(%definer, %referencer, "recorded dependency");
        }
        added
    }

    /// Files that reference definitions in `file`.
    pub fn edges_from(&self, file: FileId) -> impl Iterator<Item = FileId> + '_ {
        self.forward.get(&file).into_iter().flatten().copied()
    }

    /// Files whose definitions `file` references.
    pub fn edges_to(&self, file: FileId) -> impl Iterator<Item = FileId> + '_ {
        self.backward.get(&file).into_iter().flatten().copied()
    }

    pub fn contains(&self, definer: FileId, referencer: FileId) -> bool {
        self.forward
            .get(&definer)
            .is_some_and(|refs| refs.contains(&referencer))
    }

    /// All edges ordered by definer, then referencer.
    pub fn edges(&self) -> impl Iterator<Item = DependencyEdge> + '_ {
        self.forward.iter().flat_map(|(&definer, refs)| {
            refs.iter().map(move |&referencer| DependencyEdge {
                definer,
                referencer,
            })
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_are_visible_in_both_directions() {
        let mut graph = DependencyGraph::new();
        let (h, a, b) = (FileId::new(1), FileId::new(2), FileId::new(3));
        assert!(graph.add_edge(h, a));
        assert!(graph.add_edge(h, b));
        assert_eq!(graph.edges_from(h).collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(graph.edges_to(b).collect::<Vec<_>>(), vec![h]);
        assert_eq!(graph.edges_to(h).count(), 0);
    }

    #[test]
    fn duplicate_edges_are_ignored() {
        let mut graph = DependencyGraph::new();
        let (h, a) = (FileId::new(1), FileId::new(2));
        assert!(graph.add_edge(h, a));
        assert!(!graph.add_edge(h, a));
        assert_eq!(graph.len(), 1);
        assert!(graph.contains(h, a));
        assert!(!graph.contains(a, h));
    }

    #[test]
    fn edges_iterate_in_order() {
        let mut graph = DependencyGraph::new();
        graph.add_edge(FileId::new(2), FileId::new(1));
        graph.add_edge(FileId::new(1), FileId::new(3));
        let edges: Vec<_> = graph
            .edges()
            .map(|e| (e.definer.0, e.referencer.0))
            .collect();
        assert_eq!(edges, vec![(1, 3), (2, 1)]);
    }
}
