// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::fmt::Display;

use itertools::Itertools;

use super::phys_nodes::PhysNodes;
use super::MemoLogicalNodeId;
use crate::logical_property::LogicalProps;
use crate::nodes::{ArcLogicalNode, LogicalNode, ProjectionName, ProjectionNameSet};
use crate::rules::LogicalRewriteType;

/// A set of logical nodes that remembers insertion order. The index of a node never changes until
/// the set is cleared.
#[derive(Default)]
pub struct OrderPreservingNodeSet {
    nodes: Vec<ArcLogicalNode>,
    node_to_index: HashMap<ArcLogicalNode, usize>,
}

impl OrderPreservingNodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, node: &LogicalNode) -> Option<usize> {
        self.node_to_index.get(node).copied()
    }

    /// Returns the index of `node` and whether it was newly inserted.
    pub fn emplace_back(&mut self, node: ArcLogicalNode) -> (usize, bool) {
        if let Some(index) = self.find(&node) {
            return (index, false);
        }
        let index = self.nodes.len();
        self.node_to_index.insert(node.clone(), index);
        self.nodes.push(node);
        (index, true)
    }

    pub fn at(&self, index: usize) -> &ArcLogicalNode {
        &self.nodes[index]
    }

    pub fn nodes(&self) -> &[ArcLogicalNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.node_to_index.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArcLogicalNode> {
        self.nodes.iter()
    }
}

/// The names a group binds for its parents, sorted. Fixed when the group is created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectionBinder {
    names: Vec<ProjectionName>,
}

impl ProjectionBinder {
    pub fn new(projections: &ProjectionNameSet) -> Self {
        Self {
            names: projections.iter().cloned().collect(),
        }
    }

    pub fn names(&self) -> &[ProjectionName] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.binary_search_by(|x| (**x).cmp(name)).is_ok()
    }

    pub fn projection_set(&self) -> ProjectionNameSet {
        self.names.iter().cloned().collect()
    }
}

impl Display for ProjectionBinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.names.iter().join(", "))
    }
}

/// A pending logical rewrite of one node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogicalRewriteEntry {
    /// Lower runs first.
    pub priority: u32,
    pub rule: LogicalRewriteType,
    pub node_id: MemoLogicalNodeId,
}

impl LogicalRewriteEntry {
    pub fn new(priority: u32, rule: LogicalRewriteType, node_id: MemoLogicalNodeId) -> Self {
        Self {
            priority,
            rule,
            node_id,
        }
    }
}

impl Ord for LogicalRewriteEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // `BinaryHeap` is a max-heap; invert so the lowest priority pops first.
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.rule.cmp(&self.rule))
            .then_with(|| other.node_id.cmp(&self.node_id))
    }
}

impl PartialOrd for LogicalRewriteEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub type LogicalRewriteQueue = BinaryHeap<LogicalRewriteEntry>;

/// An equivalence class of logical nodes producing the same projections.
pub struct Group {
    pub(super) logical_nodes: OrderPreservingNodeSet,
    pub(super) logical_properties: LogicalProps,
    pub(super) binder: ProjectionBinder,
    /// Parallel to `logical_nodes`: the rewrite that produced each node.
    pub(super) rules: Vec<LogicalRewriteType>,
    pub(super) logical_rewrite_queue: LogicalRewriteQueue,
    pub(super) physical_nodes: PhysNodes,
}

impl Group {
    pub fn new(projections: ProjectionNameSet) -> Self {
        Self {
            logical_nodes: OrderPreservingNodeSet::new(),
            binder: ProjectionBinder::new(&projections),
            logical_properties: LogicalProps::with_projections(projections),
            rules: Vec::new(),
            logical_rewrite_queue: LogicalRewriteQueue::new(),
            physical_nodes: PhysNodes::new(),
        }
    }

    pub fn logical_nodes(&self) -> &OrderPreservingNodeSet {
        &self.logical_nodes
    }

    pub fn logical_properties(&self) -> &LogicalProps {
        &self.logical_properties
    }

    pub fn binder(&self) -> &ProjectionBinder {
        &self.binder
    }

    pub fn rules(&self) -> &[LogicalRewriteType] {
        &self.rules
    }

    pub fn logical_rewrite_queue(&self) -> &LogicalRewriteQueue {
        &self.logical_rewrite_queue
    }

    pub fn physical_nodes(&self) -> &PhysNodes {
        &self.physical_nodes
    }

    /// Whether the optimization task at `index` has not yet been offered every logical node of the
    /// group.
    pub fn has_unimplemented_nodes(&self, index: usize) -> bool {
        self.physical_nodes.queue(index).last_implemented_node_pos < self.logical_nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascades::GroupId;
    use crate::nodes::projection_set;
    use crate::tests::common::scan;

    #[test]
    fn node_set_keeps_first_index() {
        let mut set = OrderPreservingNodeSet::new();
        assert_eq!(set.emplace_back(scan("t1", "a")), (0, true));
        assert_eq!(set.emplace_back(scan("t2", "b")), (1, true));
        assert_eq!(set.emplace_back(scan("t1", "a")), (0, false));
        assert_eq!(set.len(), 2);
        assert_eq!(set.find(&scan("t2", "b")), Some(1));
        set.clear();
        assert!(set.is_empty());
        assert_eq!(set.find(&scan("t1", "a")), None);
    }

    #[test]
    fn binder_is_sorted() {
        let binder = ProjectionBinder::new(&projection_set(["c", "a", "b"]));
        assert_eq!(binder.to_string(), "[a, b, c]");
        assert!(binder.contains("b"));
        assert!(!binder.contains("d"));
    }

    #[test]
    fn rewrite_queue_pops_lowest_priority_first() {
        let id = |index| MemoLogicalNodeId::new(GroupId(0), index);
        let mut queue = LogicalRewriteQueue::new();
        queue.push(LogicalRewriteEntry::new(5, LogicalRewriteType::SargableSplit, id(0)));
        queue.push(LogicalRewriteEntry::new(1, LogicalRewriteType::CollationMerge, id(1)));
        queue.push(LogicalRewriteEntry::new(3, LogicalRewriteType::LimitSkipMerge, id(2)));
        let order = std::iter::from_fn(|| queue.pop().map(|x| x.priority)).collect_vec();
        assert_eq!(order, vec![1, 3, 5]);
    }
}
