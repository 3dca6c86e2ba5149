//! Weighted caller → callee graph
//!
//! Each qualifying sample contributes one unit to every consecutive
//! caller/callee pair on its resolved stack. Recursive frames produce
//! self-edges; they are kept as observed.

use super::flat_profile::FlatProfile;
use super::qualifying_samples;
use crate::domain::FunctionId;
use crate::format::Record;
use crate::symbolization::FunctionTable;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CallGraphEdge {
    pub caller: FunctionId,
    pub callee: FunctionId,
    pub weight: u64,
}

/// Sparse adjacency map: caller → (callee → weight)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallGraph {
    edges: BTreeMap<FunctionId, BTreeMap<FunctionId, u64>>,
}

impl CallGraph {
    fn add(&mut self, caller: FunctionId, callee: FunctionId) {
        *self.edges.entry(caller).or_default().entry(callee).or_insert(0) += 1;
    }

    #[must_use]
    pub fn weight(&self, caller: FunctionId, callee: FunctionId) -> u64 {
        self.edges.get(&caller).and_then(|callees| callees.get(&callee)).copied().unwrap_or(0)
    }

    /// Callees of `caller` with their weights
    #[must_use]
    pub fn callees(&self, caller: FunctionId) -> Option<&BTreeMap<FunctionId, u64>> {
        self.edges.get(&caller)
    }

    /// All edges ordered by caller, then callee
    pub fn edges(&self) -> impl Iterator<Item = CallGraphEdge> + '_ {
        self.edges.iter().flat_map(|(&caller, callees)| {
            callees.iter().map(move |(&callee, &weight)| CallGraphEdge { caller, callee, weight })
        })
    }

    /// The raw adjacency map
    #[must_use]
    pub fn adjacency(&self) -> &BTreeMap<FunctionId, BTreeMap<FunctionId, u64>> {
        &self.edges
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

pub struct CallGraphBuilder<'a> {
    functions: &'a FunctionTable,
}

impl<'a> CallGraphBuilder<'a> {
    #[must_use]
    pub fn new(functions: &'a FunctionTable) -> Self {
        Self { functions }
    }

    /// Build the graph, raising each callee's call count in `profile`
    pub fn build(&self, records: &[Record], profile: &mut FlatProfile) -> CallGraph {
        let mut graph = CallGraph::default();

        for sample in qualifying_samples(records, self.functions) {
            let frames: Vec<FunctionId> = sample.frames().collect();
            for pair in frames.windows(2) {
                let (callee, caller) = (pair[0], pair[1]);
                graph.add(caller, callee);
                profile.add_call(callee);
            }
        }

        graph
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::super::FlatProfileBuilder;
    use super::*;

    #[test]
    fn test_edges_follow_stack() {
        let functions = functions();
        let records = vec![
            sample(0, LEAF, &[WORK, MAIN]),
            sample(1, LEAF, &[WORK, MAIN]),
            sample(2, WORK, &[MAIN]),
        ];
        let mut profile = FlatProfileBuilder::new(&functions).build(&records);

        let graph = CallGraphBuilder::new(&functions).build(&records, &mut profile);

        assert_eq!(graph.weight(WORK_ID, LEAF_ID), 2);
        assert_eq!(graph.weight(MAIN_ID, WORK_ID), 3);
        assert_eq!(graph.weight(LEAF_ID, WORK_ID), 0);
        assert_eq!(graph.edge_count(), 2);

        // sampled twice plus called twice
        assert_eq!(profile.get(LEAF_ID).unwrap().call_count, 4);
        // sampled once plus called three times
        assert_eq!(profile.get(WORK_ID).unwrap().call_count, 4);
        assert_eq!(profile.get(MAIN_ID).unwrap().call_count, 0);
    }

    #[test]
    fn test_recursion_produces_self_edge() {
        let functions = functions();
        let records = vec![sample(0, LEAF, &[LEAF, MAIN])];
        let mut profile = FlatProfileBuilder::new(&functions).build(&records);

        let graph = CallGraphBuilder::new(&functions).build(&records, &mut profile);

        assert_eq!(graph.weight(LEAF_ID, LEAF_ID), 1);
        assert_eq!(graph.weight(MAIN_ID, LEAF_ID), 1);
    }

    #[test]
    fn test_edges_iterator_is_ordered() {
        let functions = functions();
        let records = vec![sample(0, LEAF, &[MAIN]), sample(1, WORK, &[MAIN])];
        let mut profile = FlatProfileBuilder::new(&functions).build(&records);

        let graph = CallGraphBuilder::new(&functions).build(&records, &mut profile);
        let edges: Vec<CallGraphEdge> = graph.edges().collect();

        assert_eq!(
            edges,
            vec![
                CallGraphEdge { caller: MAIN_ID, callee: WORK_ID, weight: 1 },
                CallGraphEdge { caller: MAIN_ID, callee: LEAF_ID, weight: 1 },
            ]
        );
    }

    #[test]
    fn test_lone_frame_has_no_edges() {
        let functions = functions();
        let records = vec![sample(0, MAIN, &[])];
        let mut profile = FlatProfileBuilder::new(&functions).build(&records);

        assert!(CallGraphBuilder::new(&functions).build(&records, &mut profile).is_empty());
    }
}
