// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use itertools::Itertools;
use tracing::{debug, trace, warn};

use super::group::{Group, LogicalRewriteQueue, OrderPreservingNodeSet, ProjectionBinder};
use super::integrator::MemoIntegrator;
use super::phys_nodes::PhysNodes;
use super::{GroupId, GroupIdVector, MemoLogicalNodeId, NodeIdSet, NodeTargetGroupMap};
use crate::cost::CardinalityEstimator;
use crate::debug::DebugInfo;
use crate::logical_property::{CardinalityEstimate, LogicalProps, LogicalPropsInterface};
use crate::metadata::Metadata;
use crate::nodes::{ArcLogicalNode, LogicalNode, PlanNode, ProjectionNameSet};
use crate::rules::LogicalRewriteType;

/// Everything the memo needs from the outside to derive properties of new groups.
#[derive(Clone, Copy)]
pub struct MemoContext<'a> {
    pub metadata: &'a Metadata,
    pub debug_info: &'a DebugInfo,
    pub logical_props_derivation: &'a dyn LogicalPropsInterface,
    pub cardinality_estimator: &'a dyn CardinalityEstimator,
}

impl<'a> MemoContext<'a> {
    pub fn new(
        metadata: &'a Metadata,
        debug_info: &'a DebugInfo,
        logical_props_derivation: &'a dyn LogicalPropsInterface,
        cardinality_estimator: &'a dyn CardinalityEstimator,
    ) -> Self {
        Self {
            metadata,
            debug_info,
            logical_props_derivation,
            cardinality_estimator,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    /// Number of calls to `integrate`.
    pub num_integrations: usize,
    /// Number of physical plans explored by the physical search.
    pub phys_plan_exploration_count: usize,
    /// Number of times the physical search looked up an existing optimization task.
    pub phys_memo_check_count: usize,
}

/// Groups of equivalent logical nodes, plus two inverse indices over the nodes inserted through
/// integration: from child groups to the nodes built over them, and back.
#[derive(Default)]
pub struct Memo {
    groups: Vec<Group>,
    input_groups_to_node_id: HashMap<GroupIdVector, NodeIdSet>,
    node_id_to_input_groups: HashMap<MemoLogicalNodeId, GroupIdVector>,
    stats: Stats,
}

impl Memo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(&self, group_id: GroupId) -> &Group {
        self.groups
            .get(group_id.0)
            .unwrap_or_else(|| panic!("group {} does not exist", group_id))
    }

    fn group_mut(&mut self, group_id: GroupId) -> &mut Group {
        self.groups
            .get_mut(group_id.0)
            .unwrap_or_else(|| panic!("group {} does not exist", group_id))
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn logical_node_count(&self) -> usize {
        self.groups.iter().map(|x| x.logical_nodes.len()).sum()
    }

    pub fn physical_node_count(&self) -> usize {
        self.groups.iter().map(|x| x.physical_nodes.len()).sum()
    }

    pub fn node(&self, node_id: MemoLogicalNodeId) -> &ArcLogicalNode {
        self.group(node_id.group_id).logical_nodes.at(node_id.index)
    }

    pub fn logical_nodes(&self, group_id: GroupId) -> &OrderPreservingNodeSet {
        &self.group(group_id).logical_nodes
    }

    pub fn logical_props(&self, group_id: GroupId) -> &LogicalProps {
        &self.group(group_id).logical_properties
    }

    pub fn binder_for_group(&self, group_id: GroupId) -> &ProjectionBinder {
        &self.group(group_id).binder
    }

    pub fn rules(&self, group_id: GroupId) -> &[LogicalRewriteType] {
        &self.group(group_id).rules
    }

    pub fn logical_rewrite_queue_mut(&mut self, group_id: GroupId) -> &mut LogicalRewriteQueue {
        &mut self.group_mut(group_id).logical_rewrite_queue
    }

    pub fn physical_nodes(&self, group_id: GroupId) -> &PhysNodes {
        &self.group(group_id).physical_nodes
    }

    pub fn physical_nodes_mut(&mut self, group_id: GroupId) -> &mut PhysNodes {
        &mut self.group_mut(group_id).physical_nodes
    }

    pub fn input_groups_to_node_id_map(&self) -> &HashMap<GroupIdVector, NodeIdSet> {
        &self.input_groups_to_node_id
    }

    pub fn node_id_to_input_groups_map(&self) -> &HashMap<MemoLogicalNodeId, GroupIdVector> {
        &self.node_id_to_input_groups
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut Stats {
        &mut self.stats
    }

    pub fn add_group(&mut self, projections: ProjectionNameSet) -> GroupId {
        let group_id = GroupId(self.groups.len());
        trace!(event = "add_group", group_id = %group_id, projections = %projections.iter().join(", "));
        self.groups.push(Group::new(projections));
        group_id
    }

    /// Insert `node` into `group_id` unless an equal node is already there. Does not touch the
    /// inverse indices or derive any property.
    ///
    /// Panics if `node` is a physical node.
    pub fn add_node(
        &mut self,
        group_id: GroupId,
        node: impl Into<PlanNode>,
        rule: LogicalRewriteType,
    ) -> (MemoLogicalNodeId, bool) {
        let node = match node.into() {
            PlanNode::Logical(node) => node,
            PlanNode::Physical(node) => {
                panic!("attempting to insert physical node {} into group {}", node, group_id)
            }
        };
        let group = self.group_mut(group_id);
        let (index, inserted) = group.logical_nodes.emplace_back(node);
        if inserted {
            group.rules.push(rule);
        }
        trace!(event = "add_node", group_id = %group_id, index, inserted, rule = %rule);
        (MemoLogicalNodeId::new(group_id, index), inserted)
    }

    pub fn find_node_in_group(&self, group_id: GroupId, node: &LogicalNode) -> Option<usize> {
        self.group(group_id).logical_nodes.find(node)
    }

    /// Look up `node` among the integrated nodes whose children are `group_vector`.
    pub fn find_node(
        &self,
        group_vector: &[GroupId],
        node: &LogicalNode,
    ) -> Option<MemoLogicalNodeId> {
        self.input_groups_to_node_id
            .get(group_vector)?
            .iter()
            .find(|node_id| self.node(**node_id).as_ref() == node)
            .copied()
    }

    /// Derive the logical properties and cardinality of a group from its first node.
    pub fn estimate_ce(&mut self, ctx: MemoContext<'_>, group_id: GroupId) -> Result<()> {
        assert!(
            !self.group(group_id).logical_nodes.is_empty(),
            "group {} has no logical nodes",
            group_id
        );
        let node = self.group(group_id).logical_nodes.at(0).clone();
        let derived = ctx
            .logical_props_derivation
            .derive_props(ctx.metadata, &node, self, group_id)
            .with_context(|| format!("failed to derive logical properties of group {}", group_id))?;
        let mut props = self.group(group_id).logical_properties.clone();
        props.merge(derived);
        props.cardinality = Some(self.derive_cardinality(ctx, &props, &node)?);
        if ctx.debug_info.has_debug_level(2) {
            debug!(event = "estimate_ce", group_id = %group_id, props = %props);
        }
        self.group_mut(group_id).logical_properties = props;
        Ok(())
    }

    fn derive_cardinality(
        &self,
        ctx: MemoContext<'_>,
        props: &LogicalProps,
        node: &ArcLogicalNode,
    ) -> Result<CardinalityEstimate> {
        let estimate = ctx
            .cardinality_estimator
            .derive_ce(ctx.metadata, self, props, node)
            .with_context(|| format!("failed to estimate cardinality of {}", node))?;
        let mut partial_schema_key_ce = Vec::new();
        if let LogicalNode::Sargable {
            child,
            requirements,
            target,
            ..
        } = node.as_ref()
        {
            for (key, req) in requirements {
                let singular: ArcLogicalNode = Arc::new(LogicalNode::Sargable {
                    child: child.clone(),
                    requirements: [(key.clone(), req.clone())].into_iter().collect(),
                    candidate_indexes: vec![],
                    target: *target,
                });
                let singular_estimate = ctx
                    .cardinality_estimator
                    .derive_ce(ctx.metadata, self, props, &singular)
                    .with_context(|| format!("failed to estimate cardinality of {}", key))?;
                partial_schema_key_ce.push((key.clone(), singular_estimate));
            }
        }
        Ok(CardinalityEstimate {
            estimate,
            partial_schema_key_ce,
        })
    }

    /// Add a node whose children are delegators to `group_vector`. Without a target group, a node
    /// not yet in the memo gets a fresh group with `projections` and has its properties derived.
    /// With one, it is inserted into that group.
    ///
    /// Panics if the node would reference its own group, or if it already lives in a group other
    /// than the requested one.
    #[allow(clippy::too_many_arguments)]
    pub fn add_node_with_context(
        &mut self,
        ctx: MemoContext<'_>,
        group_vector: GroupIdVector,
        projections: ProjectionNameSet,
        target_group_id: Option<GroupId>,
        inserted_node_ids: &mut NodeIdSet,
        node: ArcLogicalNode,
        rule: LogicalRewriteType,
    ) -> Result<MemoLogicalNodeId> {
        for &child in &group_vector {
            assert!(
                child.0 < self.groups.len(),
                "node {} references missing group {}",
                node,
                child
            );
            assert!(
                Some(child) != target_group_id,
                "node {} references its own target group {}",
                node,
                child
            );
        }

        if let Some(existing) = self.find_node(&group_vector, &node) {
            if let Some(target_group_id) = target_group_id {
                assert_eq!(
                    target_group_id, existing.group_id,
                    "node {} found outside target group",
                    node
                );
            }
            return Ok(existing);
        }

        let (group_id, requested_projections) = match target_group_id {
            Some(target_group_id) => (target_group_id, Some(projections)),
            None => (self.add_group(projections), None),
        };
        let (node_id, inserted) = self.add_node(group_id, node.clone(), rule);
        if inserted || target_group_id.is_none() {
            inserted_node_ids.insert(node_id);
            self.input_groups_to_node_id
                .entry(group_vector.clone())
                .or_default()
                .insert(node_id);
            self.node_id_to_input_groups.insert(node_id, group_vector);

            match requested_projections {
                None => self.estimate_ce(ctx, group_id)?,
                Some(projections) if ctx.debug_info.is_debug_mode() => {
                    let binder = self.binder_for_group(group_id);
                    for name in binder.names() {
                        assert!(
                            projections.contains(name),
                            "node {} does not project {} required by group {}",
                            node,
                            name,
                            group_id
                        );
                    }
                    if ctx.debug_info.has_debug_level(3) {
                        self.verify_cardinality(ctx, group_id, &node)?;
                    }
                }
                Some(_) => {}
            }
        }
        Ok(node_id)
    }

    /// Re-estimate `node` against the properties of the group it joined and report a mismatch.
    /// The stored estimate is left as is.
    fn verify_cardinality(
        &self,
        ctx: MemoContext<'_>,
        group_id: GroupId,
        node: &ArcLogicalNode,
    ) -> Result<()> {
        let props = self.logical_props(group_id);
        let Some(stored) = props.estimate() else {
            return Ok(());
        };
        let estimate = self.derive_cardinality(ctx, props, node)?.estimate;
        if estimate != stored {
            warn!(
                event = "cardinality_mismatch",
                group_id = %group_id,
                node = %node,
                stored = %stored,
                estimate = %estimate,
            );
        }
        Ok(())
    }

    /// Fold the tree rooted at `node` into the memo and return the group of its root.
    ///
    /// `target_group_map` pins subtrees to existing groups. Every node inserted along the way is
    /// added to `inserted_node_ids`, tagged with `rule`. With `add_existing_node_with_new_child`,
    /// a unary node that matches an existing node of its target group does not force its child
    /// into that node's child group.
    pub fn integrate(
        &mut self,
        ctx: MemoContext<'_>,
        node: &ArcLogicalNode,
        target_group_map: NodeTargetGroupMap,
        inserted_node_ids: &mut NodeIdSet,
        rule: LogicalRewriteType,
        add_existing_node_with_new_child: bool,
    ) -> Result<GroupId> {
        self.stats.num_integrations += 1;
        trace!(event = "integrate", rule = %rule, node = %node);
        let group_id = MemoIntegrator::new(
            ctx,
            self,
            node,
            target_group_map,
            inserted_node_ids,
            rule,
            add_existing_node_with_new_child,
        )
        .integrate(node)?;
        if ctx.debug_info.is_debug_mode() {
            self.verify_integrity();
        }
        Ok(group_id)
    }

    /// Drop every logical node of a group along with its index entries, provenance and pending
    /// rewrites. The group itself, its properties and its physical tasks stay.
    pub fn clear_logical_nodes(&mut self, group_id: GroupId) {
        trace!(event = "clear_logical_nodes", group_id = %group_id);
        let node_count = self.group(group_id).logical_nodes.len();
        for index in 0..node_count {
            let node_id = MemoLogicalNodeId::new(group_id, index);
            let Some(group_vector) = self.node_id_to_input_groups.remove(&node_id) else {
                continue;
            };
            if let Some(node_ids) = self.input_groups_to_node_id.get_mut(&group_vector) {
                node_ids.remove(&node_id);
                if node_ids.is_empty() {
                    self.input_groups_to_node_id.remove(&group_vector);
                }
            }
        }
        let group = self.group_mut(group_id);
        group.logical_nodes.clear();
        group.rules.clear();
        group.logical_rewrite_queue.clear();
    }

    pub fn clear(&mut self) {
        self.groups.clear();
        self.input_groups_to_node_id.clear();
        self.node_id_to_input_groups.clear();
        self.stats = Stats::default();
    }

    /// Check that both inverse indices describe the same nodes, that every indexed node exists
    /// with children matching its key, and that no node references its own group.
    pub fn verify_integrity(&self) {
        let indexed = self
            .input_groups_to_node_id
            .values()
            .map(|x| x.len())
            .sum::<usize>();
        assert_eq!(indexed, self.node_id_to_input_groups.len());
        for (node_id, group_vector) in &self.node_id_to_input_groups {
            assert!(
                self.input_groups_to_node_id
                    .get(group_vector)
                    .is_some_and(|x| x.contains(node_id)),
                "node {} is missing from the input group index",
                node_id
            );
            let group = self.group(node_id.group_id);
            assert!(
                node_id.index < group.logical_nodes.len(),
                "indexed node {} does not exist",
                node_id
            );
            let node = group.logical_nodes.at(node_id.index);
            assert_eq!(
                &node.child_group_ids(),
                group_vector,
                "children of {} do not match its index key",
                node_id
            );
            assert!(
                !group_vector.contains(&node_id.group_id),
                "node {} references its own group",
                node_id
            );
        }
        for group in &self.groups {
            assert_eq!(group.logical_nodes.len(), group.rules.len());
        }
    }

    pub fn dump(&self, mut buf: impl std::fmt::Write) -> std::fmt::Result {
        for (id, group) in self.groups.iter().enumerate() {
            let group_id = GroupId(id);
            writeln!(buf, "group_id={} binder={}", group_id, group.binder)?;
            writeln!(buf, "  {}", group.logical_properties)?;
            for (index, node) in group.logical_nodes.iter().enumerate() {
                writeln!(
                    buf,
                    "  node_id={} rule={} | {}",
                    MemoLogicalNodeId::new(group_id, index),
                    group.rules[index],
                    node
                )?;
            }
            for result in group.physical_nodes.nodes() {
                let winner = match result.node_info() {
                    Some(info) => format!("winner={} cost={} | {}", info.rule, info.cost, info.node),
                    None => "winner=<unknown>".to_string(),
                };
                writeln!(
                    buf,
                    "  phys_id={} props={} cost_limit={} {}",
                    result.index(),
                    result.phys_props(),
                    result.cost_limit(),
                    winner
                )?;
            }
        }
        Ok(())
    }
}
