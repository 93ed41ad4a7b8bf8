// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use tracing::trace;

use crate::cost::CostType;
use crate::logical_property::CEType;
use crate::nodes::ArcPhysicalNode;
use crate::physical_property::PhysProps;
use crate::rules::PhysicalRewriteType;

/// An implementation chosen (or rejected) for an optimization task.
#[derive(Clone, Debug, PartialEq)]
pub struct PhysNodeInfo {
    pub node: ArcPhysicalNode,
    /// Total cost of the plan rooted at `node`.
    pub cost: CostType,
    /// Cost of `node` alone, excluding its children.
    pub local_cost: CostType,
    /// Cardinality after applying the task's limit/skip requirement, if any.
    pub adjusted_ce: CEType,
    pub rule: PhysicalRewriteType,
}

/// A candidate implementation waiting to be costed.
#[derive(Clone, Debug)]
pub struct PhysRewriteEntry {
    /// Lower runs first.
    pub priority: u32,
    pub node: ArcPhysicalNode,
    /// Properties required from each child, in child order.
    pub child_props: Vec<PhysProps>,
    pub rule: PhysicalRewriteType,
}

impl PartialEq for PhysRewriteEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PhysRewriteEntry {}

impl Ord for PhysRewriteEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.rule.cmp(&self.rule))
    }
}

impl PartialOrd for PhysRewriteEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Resumable state of one optimization task: candidates not yet costed, and how many of the
/// group's logical nodes have been offered to the implementation rules so far.
#[derive(Debug)]
pub struct PhysQueueAndImplPos {
    pub last_implemented_node_pos: usize,
    pub queue: BinaryHeap<PhysRewriteEntry>,
    implementation_pending: bool,
}

impl PhysQueueAndImplPos {
    fn new() -> Self {
        Self {
            last_implemented_node_pos: 0,
            queue: BinaryHeap::new(),
            implementation_pending: true,
        }
    }

    pub fn is_implementation_pending(&self) -> bool {
        self.implementation_pending
    }
}

/// The outcome of optimizing a group under one set of required physical properties.
#[derive(Debug)]
pub struct PhysOptimizationResult {
    index: usize,
    phys_props: PhysProps,
    cost_limit: CostType,
    node_info: Option<PhysNodeInfo>,
    rejected_node_info: Vec<PhysNodeInfo>,
}

impl PhysOptimizationResult {
    fn new(index: usize, phys_props: PhysProps, cost_limit: CostType) -> Self {
        Self {
            index,
            phys_props,
            cost_limit,
            node_info: None,
            rejected_node_info: Vec::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn phys_props(&self) -> &PhysProps {
        &self.phys_props
    }

    pub fn cost_limit(&self) -> CostType {
        self.cost_limit
    }

    pub fn node_info(&self) -> Option<&PhysNodeInfo> {
        self.node_info.as_ref()
    }

    pub fn rejected_node_info(&self) -> &[PhysNodeInfo] {
        &self.rejected_node_info
    }

    /// Install a new winner. The previous winner, if any, is kept as rejected.
    pub fn set_node_info(&mut self, info: PhysNodeInfo) {
        assert!(
            info.cost <= self.cost_limit,
            "winner cost {} exceeds the cost limit {}",
            info.cost,
            self.cost_limit
        );
        if let Some(previous) = self.node_info.replace(info) {
            self.rejected_node_info.push(previous);
        }
    }
}

/// The optimization tasks of a group, one per distinct set of required physical properties.
#[derive(Debug, Default)]
pub struct PhysNodes {
    nodes: Vec<PhysOptimizationResult>,
    queues: Vec<PhysQueueAndImplPos>,
    props_to_index: HashMap<PhysProps, usize>,
}

impl PhysNodes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task for `phys_props` bounded by `cost_limit`. If a task for the same properties
    /// already exists it is returned unchanged.
    pub fn add_optimization_result(
        &mut self,
        phys_props: PhysProps,
        cost_limit: CostType,
    ) -> &mut PhysOptimizationResult {
        if let Some(&index) = self.props_to_index.get(&phys_props) {
            return &mut self.nodes[index];
        }
        let index = self.nodes.len();
        trace!(event = "add_optimization_result", index, phys_props = %phys_props, cost_limit = %cost_limit);
        self.props_to_index.insert(phys_props.clone(), index);
        self.queues.push(PhysQueueAndImplPos::new());
        self.nodes
            .push(PhysOptimizationResult::new(index, phys_props, cost_limit));
        &mut self.nodes[index]
    }

    pub fn at(&self, index: usize) -> &PhysOptimizationResult {
        &self.nodes[index]
    }

    pub fn at_mut(&mut self, index: usize) -> &mut PhysOptimizationResult {
        &mut self.nodes[index]
    }

    pub fn find(&self, phys_props: &PhysProps) -> Option<usize> {
        self.props_to_index.get(phys_props).copied()
    }

    pub fn nodes(&self) -> &[PhysOptimizationResult] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn queue(&self, index: usize) -> &PhysQueueAndImplPos {
        &self.queues[index]
    }

    pub fn queue_mut(&mut self, index: usize) -> &mut PhysQueueAndImplPos {
        &mut self.queues[index]
    }

    /// A task is optimized once every logical node up to its implementation position has been
    /// offered to the implementation rules and every resulting candidate has been costed.
    pub fn is_optimized(&self, index: usize) -> bool {
        let queue = &self.queues[index];
        !queue.implementation_pending && queue.queue.is_empty()
    }

    /// Record that logical nodes `[0, pos)` have been offered to the implementation rules.
    pub fn mark_implemented(&mut self, index: usize, pos: usize) {
        let queue = &mut self.queues[index];
        queue.last_implemented_node_pos = pos;
        queue.implementation_pending = false;
    }

    /// Re-open a task under a strictly larger cost bound, so alternatives pruned under the old bound
    /// are tried again.
    pub fn raise_cost_limit(&mut self, index: usize, cost_limit: CostType) {
        let result = &mut self.nodes[index];
        assert!(
            cost_limit > result.cost_limit,
            "cost limit of task {} can only be raised: {} -> {}",
            index,
            result.cost_limit,
            cost_limit
        );
        trace!(event = "raise_cost_limit", index, from = %result.cost_limit, to = %cost_limit);
        result.cost_limit = cost_limit;
        let queue = &mut self.queues[index];
        queue.last_implemented_node_pos = 0;
        queue.implementation_pending = true;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::nodes::PhysicalNode;
    use crate::physical_property::DistributionRequirement;

    fn scan_node() -> ArcPhysicalNode {
        PhysicalNode::PhysicalScan {
            field_projections: vec![],
            scan_def_name: "coll".into(),
            parallel: false,
        }
        .into()
    }

    fn info(cost: f64) -> PhysNodeInfo {
        PhysNodeInfo {
            node: scan_node(),
            cost: CostType::new(cost),
            local_cost: CostType::new(cost),
            adjusted_ce: CEType(100.0),
            rule: PhysicalRewriteType::PhysicalScan,
        }
    }

    #[test]
    fn tasks_are_keyed_by_props() {
        let mut nodes = PhysNodes::new();
        let centralized = PhysProps::default().with_distribution(DistributionRequirement::centralized());
        let limited = PhysProps::default().with_limit_skip(Some(10), 0);
        assert_eq!(nodes.add_optimization_result(centralized.clone(), CostType::INFINITY).index(), 0);
        assert_eq!(nodes.add_optimization_result(limited.clone(), CostType::new(5.0)).index(), 1);
        // Re-registering keeps the original bound.
        let existing = nodes.add_optimization_result(limited.clone(), CostType::new(50.0));
        assert_eq!(existing.index(), 1);
        assert_eq!(existing.cost_limit(), CostType::new(5.0));
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes.find(&centralized), Some(0));
        assert_eq!(nodes.find(&limited), Some(1));
        assert_eq!(nodes.find(&PhysProps::default()), None);
    }

    #[test]
    fn optimized_once_drained() {
        let mut nodes = PhysNodes::new();
        nodes.add_optimization_result(PhysProps::default(), CostType::new(10.0));
        assert!(!nodes.is_optimized(0));

        nodes.mark_implemented(0, 3);
        nodes.queue_mut(0).queue.push(PhysRewriteEntry {
            priority: 0,
            node: scan_node(),
            child_props: vec![],
            rule: PhysicalRewriteType::PhysicalScan,
        });
        assert!(!nodes.is_optimized(0));
        nodes.queue_mut(0).queue.pop();
        assert!(nodes.is_optimized(0));
        assert_eq!(nodes.queue(0).last_implemented_node_pos, 3);
    }

    #[test]
    fn raising_cost_limit_reopens_task() {
        let mut nodes = PhysNodes::new();
        nodes.add_optimization_result(PhysProps::default(), CostType::new(10.0));
        nodes.mark_implemented(0, 2);
        assert!(nodes.is_optimized(0));

        nodes.raise_cost_limit(0, CostType::new(20.0));
        assert!(!nodes.is_optimized(0));
        assert_eq!(nodes.queue(0).last_implemented_node_pos, 0);
        assert_eq!(nodes.at(0).cost_limit(), CostType::new(20.0));
    }

    #[test]
    #[should_panic(expected = "can only be raised")]
    fn cost_limit_is_never_narrowed() {
        let mut nodes = PhysNodes::new();
        nodes.add_optimization_result(PhysProps::default(), CostType::new(10.0));
        nodes.raise_cost_limit(0, CostType::new(10.0));
    }

    #[test]
    fn replaced_winner_is_kept_as_rejected() {
        let mut nodes = PhysNodes::new();
        let result = nodes.add_optimization_result(PhysProps::default(), CostType::new(10.0));
        result.set_node_info(info(8.0));
        result.set_node_info(info(4.0));
        assert_eq!(result.node_info().map(|x| x.cost), Some(CostType::new(4.0)));
        assert_eq!(result.rejected_node_info().len(), 1);
        assert_eq!(result.rejected_node_info()[0].cost, CostType::new(8.0));
    }

    #[test]
    fn candidates_pop_in_priority_order() {
        let mut queue = BinaryHeap::new();
        for (priority, rule) in [
            (2, PhysicalRewriteType::HashJoin),
            (0, PhysicalRewriteType::PhysicalScan),
            (1, PhysicalRewriteType::Seek),
        ] {
            queue.push(PhysRewriteEntry {
                priority,
                node: scan_node(),
                child_props: vec![],
                rule,
            });
        }
        let order = std::iter::from_fn(|| queue.pop().map(|x| x.rule)).collect::<Vec<_>>();
        assert_eq!(
            order,
            vec![
                PhysicalRewriteType::PhysicalScan,
                PhysicalRewriteType::Seek,
                PhysicalRewriteType::HashJoin
            ]
        );
    }
}
