// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::collections::hash_map::Entry;
use std::sync::Arc;

use anyhow::Result;
use itertools::Itertools;
use tracing::trace;

use super::memo::{Memo, MemoContext};
use super::{GroupId, MemoLogicalNodeId, NodeIdSet, NodeRef, NodeTargetGroupMap};
use crate::nodes::{ArcLogicalNode, LogicalNode};
use crate::projection_tracking::ProjectionTracker;
use crate::rules::LogicalRewriteType;

/// Folds one candidate tree into the memo, children first. Lives for a single `integrate` call.
pub(super) struct MemoIntegrator<'a, 'm> {
    ctx: MemoContext<'a>,
    memo: &'m mut Memo,
    inserted_node_ids: &'m mut NodeIdSet,
    target_group_map: NodeTargetGroupMap,
    projections: ProjectionTracker,
    rule: LogicalRewriteType,
    /// Do not assume that `F(x) = F(y)` implies `x = y` for unary `F`.
    add_existing_node_with_new_child: bool,
}

impl<'a, 'm> MemoIntegrator<'a, 'm> {
    pub fn new(
        ctx: MemoContext<'a>,
        memo: &'m mut Memo,
        root: &ArcLogicalNode,
        target_group_map: NodeTargetGroupMap,
        inserted_node_ids: &'m mut NodeIdSet,
        rule: LogicalRewriteType,
        add_existing_node_with_new_child: bool,
    ) -> Self {
        let projections = ProjectionTracker::build(memo, root);
        Self {
            ctx,
            memo,
            inserted_node_ids,
            target_group_map,
            projections,
            rule,
            add_existing_node_with_new_child,
        }
    }

    pub fn integrate(mut self, root: &ArcLogicalNode) -> Result<GroupId> {
        self.integrate_node(root)
    }

    fn integrate_node(&mut self, node: &ArcLogicalNode) -> Result<GroupId> {
        self.update_target_group_map(node);

        if let Some(group_id) = node.as_delegator() {
            return match self.target_group_map.get(&NodeRef::of(node)) {
                Some(&target) if target != group_id => self.add_nodes(node, node.clone(), vec![]),
                _ => Ok(group_id),
            };
        }

        let child_group_ids = node
            .children()
            .into_iter()
            .map(|child| self.integrate_node(child))
            .collect::<Result<Vec<_>>>()?;
        let for_memo = if child_group_ids.is_empty() {
            node.clone()
        } else {
            Arc::new(
                node.with_children(
                    child_group_ids
                        .iter()
                        .map(|&group_id| LogicalNode::delegator(group_id))
                        .collect_vec(),
                ),
            )
        };
        self.add_nodes(node, for_memo, child_group_ids)
    }

    fn add_nodes(
        &mut self,
        node: &ArcLogicalNode,
        for_memo: ArcLogicalNode,
        child_group_ids: Vec<GroupId>,
    ) -> Result<GroupId> {
        let target_group_id = self.target_group_map.get(&NodeRef::of(node)).copied();
        let projections = self.projections.get(node).clone();
        let node_id = self.memo.add_node_with_context(
            self.ctx,
            child_group_ids,
            projections,
            target_group_id,
            self.inserted_node_ids,
            for_memo,
            self.rule,
        )?;
        Ok(node_id.group_id)
    }

    /// Before descending into `node`: if it is pinned to a group that already holds an equal node,
    /// pin its children to that node's child groups.
    fn update_target_group_map(&mut self, node: &ArcLogicalNode) {
        match node.as_ref() {
            LogicalNode::Scan { .. }
            | LogicalNode::ValueScan { .. }
            | LogicalNode::MemoLogicalDelegator { .. }
            | LogicalNode::RidIntersect { .. }
            | LogicalNode::RidUnion { .. } => {}
            LogicalNode::Filter { .. }
            | LogicalNode::Evaluation { .. }
            | LogicalNode::Sargable { .. }
            | LogicalNode::GroupBy { .. }
            | LogicalNode::Unwind { .. }
            | LogicalNode::Collation { .. }
            | LogicalNode::LimitSkip { .. }
            | LogicalNode::Exchange { .. }
            | LogicalNode::Root { .. } => {
                if !self.add_existing_node_with_new_child {
                    self.propagate_target_group(node);
                }
            }
            LogicalNode::BinaryJoin { .. } | LogicalNode::Union { .. } => {
                self.propagate_target_group(node)
            }
        }
    }

    fn propagate_target_group(&mut self, node: &ArcLogicalNode) {
        let Some(&target_group_id) = self.target_group_map.get(&NodeRef::of(node)) else {
            return;
        };
        let Some(index) = self.memo.find_node_in_group(target_group_id, node) else {
            return;
        };
        let existing = self
            .memo
            .node(MemoLogicalNodeId::new(target_group_id, index))
            .clone();
        let existing_children = existing.child_group_ids();
        let children = node.children();
        assert_eq!(
            existing_children.len(),
            children.len(),
            "different number of children between existing and target node"
        );
        for (child, child_group_id) in children.into_iter().zip(existing_children) {
            self.update_target_group_ref(NodeRef::of(child), child_group_id);
        }
    }

    fn update_target_group_ref(&mut self, child: NodeRef, group_id: GroupId) {
        match self.target_group_map.entry(child) {
            Entry::Vacant(entry) => {
                trace!(event = "propagate_target_group", group_id = %group_id);
                entry.insert(group_id);
            }
            Entry::Occupied(entry) => assert_eq!(
                *entry.get(),
                group_id,
                "incompatible target groups for parent and child"
            ),
        }
    }
}
