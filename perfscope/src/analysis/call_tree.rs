//! Call tree (forest) of observed call paths
//!
//! Every qualifying sample inserts its path, outermost frame first and the
//! sampled frame last, and adds one unit of inclusive time and one sample to
//! each node on that path. Nodes live in an index arena; parents and children
//! refer to each other by [`NodeId`].
//!
//! ```text
//! roots                 main (4, 100%)
//!                       ├── work (3, 75%)
//!                       │   └── leaf (2, 50%)
//!                       └── idle (1, 25%)
//! ```
//!
//! After all samples are inserted, nodes whose share of the total falls below
//! the prune threshold are detached together with their subtrees and the
//! arena is compacted.

// Percentage calculations intentionally convert u64 to f64
#![allow(clippy::cast_precision_loss)]

use super::qualifying_samples;
use crate::domain::FunctionId;
use crate::format::Record;
use crate::symbolization::FunctionTable;
use serde::Serialize;
use std::collections::BTreeMap;

/// Index of a node in the call tree arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub struct CallTreeNode {
    pub function_id: FunctionId,
    pub inclusive_time: u64,
    /// Share of the total inclusive time of all roots (0.0 - 100.0)
    pub inclusive_time_pct: f64,
    pub sample_count: u64,
    pub parent: Option<NodeId>,
    pub children: BTreeMap<FunctionId, NodeId>,
}

impl CallTreeNode {
    fn new(function_id: FunctionId, parent: Option<NodeId>) -> Self {
        Self {
            function_id,
            inclusive_time: 0,
            inclusive_time_pct: 0.0,
            sample_count: 0,
            parent,
            children: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallTree {
    nodes: Vec<CallTreeNode>,
    roots: BTreeMap<FunctionId, NodeId>,
}

impl CallTree {
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&CallTreeNode> {
        self.nodes.get(id.0)
    }

    /// Root nodes keyed by function
    #[must_use]
    pub fn roots(&self) -> &BTreeMap<FunctionId, NodeId> {
        &self.roots
    }

    #[must_use]
    pub fn root(&self, function: FunctionId) -> Option<&CallTreeNode> {
        self.roots.get(&function).and_then(|&id| self.node(id))
    }

    /// Child of `parent` for `function`
    #[must_use]
    pub fn child(&self, parent: &CallTreeNode, function: FunctionId) -> Option<&CallTreeNode> {
        parent.children.get(&function).and_then(|&id| self.node(id))
    }

    /// Follow a path of functions from a root
    #[must_use]
    pub fn find_path(&self, path: &[FunctionId]) -> Option<&CallTreeNode> {
        let (first, rest) = path.split_first()?;
        rest.iter().try_fold(self.root(*first)?, |node, &function| self.child(node, function))
    }

    #[must_use]
    pub fn nodes(&self) -> &[CallTreeNode] {
        &self.nodes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Sum of all roots' inclusive time
    #[must_use]
    pub fn total_inclusive_time(&self) -> u64 {
        self.roots.values().filter_map(|&id| self.node(id)).map(|n| n.inclusive_time).sum()
    }

    fn push_node(&mut self, function: FunctionId, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(CallTreeNode::new(function, parent));
        id
    }

    /// Insert a path (outermost first) and credit every node on it
    fn insert_path(&mut self, path: &[FunctionId]) {
        let mut current: Option<NodeId> = None;

        for &function in path {
            let existing = match current {
                None => self.roots.get(&function).copied(),
                Some(parent) => self.nodes[parent.0].children.get(&function).copied(),
            };
            let id = match existing {
                Some(id) => id,
                None => {
                    let id = self.push_node(function, current);
                    match current {
                        None => self.roots.insert(function, id),
                        Some(parent) => self.nodes[parent.0].children.insert(function, id),
                    };
                    id
                }
            };
            current = Some(id);
        }

        // Walk back up from the leaf.
        while let Some(id) = current {
            let node = &mut self.nodes[id.0];
            node.inclusive_time += 1;
            node.sample_count += 1;
            current = node.parent;
        }
    }

    /// Compute percentages and detach nodes below `threshold`
    fn prune(&mut self, threshold: f64) {
        let total = self.total_inclusive_time();
        if total == 0 {
            return;
        }
        let total = total as f64;

        let mut stack: Vec<NodeId> = self.roots.values().copied().collect();
        while let Some(id) = stack.pop() {
            let fraction = self.nodes[id.0].inclusive_time as f64 / total;
            self.nodes[id.0].inclusive_time_pct = fraction * 100.0;

            if fraction < threshold {
                let (function, parent) = (self.nodes[id.0].function_id, self.nodes[id.0].parent);
                match parent {
                    None => self.roots.remove(&function),
                    Some(parent) => self.nodes[parent.0].children.remove(&function),
                };
                continue;
            }

            stack.extend(self.nodes[id.0].children.values().copied());
        }

        self.compact();
    }

    /// Rebuild the arena keeping only nodes reachable from the roots
    fn compact(&mut self) {
        let old = std::mem::take(&mut self.nodes);
        let old_roots = std::mem::take(&mut self.roots);

        let mut stack: Vec<(NodeId, Option<NodeId>)> =
            old_roots.values().rev().map(|&id| (id, None)).collect();

        while let Some((old_id, parent)) = stack.pop() {
            let source = &old[old_id.0];
            let id = NodeId(self.nodes.len());
            self.nodes.push(CallTreeNode {
                children: BTreeMap::new(),
                parent,
                ..source.clone()
            });
            match parent {
                None => self.roots.insert(source.function_id, id),
                Some(parent) => self.nodes[parent.0].children.insert(source.function_id, id),
            };
            stack.extend(source.children.values().rev().map(|&child| (child, Some(id))));
        }
    }
}

pub struct CallTreeBuilder<'a> {
    functions: &'a FunctionTable,
    prune_threshold: f64,
}

impl<'a> CallTreeBuilder<'a> {
    #[must_use]
    pub fn new(functions: &'a FunctionTable, prune_threshold: f64) -> Self {
        Self { functions, prune_threshold }
    }

    #[must_use]
    pub fn build(&self, records: &[Record]) -> CallTree {
        let mut tree = CallTree::default();
        let mut path = Vec::new();

        for sample in qualifying_samples(records, self.functions) {
            path.clear();
            path.extend(sample.frames());
            path.reverse();
            tree.insert_path(&path);
        }

        tree.prune(self.prune_threshold);
        tree
    }
}
