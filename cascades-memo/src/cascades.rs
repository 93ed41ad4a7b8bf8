// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! The cascades memo: groups of equivalent logical nodes, the indices used to deduplicate them, and
//! the per-group state of the cost-bounded physical search.

mod group;
mod integrator;
mod memo;
mod phys_nodes;

use std::collections::{HashMap, HashSet};
use std::fmt::Display;

pub use group::{
    Group, LogicalRewriteEntry, LogicalRewriteQueue, OrderPreservingNodeSet, ProjectionBinder,
};
pub use memo::{Memo, MemoContext, Stats};
pub use phys_nodes::{
    PhysNodeInfo, PhysNodes, PhysOptimizationResult, PhysQueueAndImplPos, PhysRewriteEntry,
};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Hash)]
pub struct GroupId(pub usize);

impl Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "!{}", self.0)
    }
}

/// Position of a logical node inside its group.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub struct MemoLogicalNodeId {
    pub group_id: GroupId,
    pub index: usize,
}

impl MemoLogicalNodeId {
    pub fn new(group_id: GroupId, index: usize) -> Self {
        Self { group_id, index }
    }
}

impl Display for MemoLogicalNodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.group_id, self.index)
    }
}

/// Position of an optimization task inside a group's physical nodes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub struct MemoPhysicalNodeId {
    pub group_id: GroupId,
    pub index: usize,
}

impl MemoPhysicalNodeId {
    pub fn new(group_id: GroupId, index: usize) -> Self {
        Self { group_id, index }
    }
}

impl Display for MemoPhysicalNodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.group_id, self.index)
    }
}

/// The child groups of a node, in child order. Keys the memo's cross-group dedup index.
pub type GroupIdVector = Vec<GroupId>;

pub type NodeIdSet = HashSet<MemoLogicalNodeId>;

/// Identity of a node inside one candidate tree: the address of its `Arc` allocation. Two
/// structurally equal subtrees at different positions are different keys.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct NodeRef(usize);

impl NodeRef {
    pub fn of(node: &crate::nodes::ArcLogicalNode) -> Self {
        NodeRef(std::sync::Arc::as_ptr(node) as usize)
    }
}

/// Integration hints: subtrees of a candidate tree that must land in a given group.
pub type NodeTargetGroupMap = HashMap<NodeRef, GroupId>;
