// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::collections::HashMap;

use crate::cascades::{Memo, NodeRef};
use crate::nodes::{ArcLogicalNode, LogicalNode, ProjectionNameSet};

/// The projections produced by every subtree of one candidate tree. Delegators produce the
/// projections bound by their group.
pub struct ProjectionTracker {
    projections: HashMap<NodeRef, ProjectionNameSet>,
}

impl ProjectionTracker {
    pub fn build(memo: &Memo, root: &ArcLogicalNode) -> Self {
        let mut tracker = Self {
            projections: HashMap::new(),
        };
        tracker.visit(memo, root);
        tracker
    }

    /// Panics if `node` is not part of the tree this tracker was built from.
    pub fn get(&self, node: &ArcLogicalNode) -> &ProjectionNameSet {
        self.projections
            .get(&NodeRef::of(node))
            .unwrap_or_else(|| panic!("projections of {} were not tracked", node))
    }

    fn visit(&mut self, memo: &Memo, node: &ArcLogicalNode) -> ProjectionNameSet {
        let children = node
            .children()
            .into_iter()
            .map(|child| self.visit(memo, child))
            .collect::<Vec<_>>();
        let child = || children.first().cloned().unwrap_or_default();
        let projections = match node.as_ref() {
            LogicalNode::MemoLogicalDelegator { group_id } => {
                memo.binder_for_group(*group_id).projection_set()
            }
            LogicalNode::Scan { projection, .. } => [projection.clone()].into_iter().collect(),
            LogicalNode::ValueScan { projections, .. } | LogicalNode::Union { projections, .. } => {
                projections.iter().cloned().collect()
            }
            LogicalNode::Filter { .. }
            | LogicalNode::Collation { .. }
            | LogicalNode::LimitSkip { .. }
            | LogicalNode::Exchange { .. }
            | LogicalNode::Root { .. } => child(),
            LogicalNode::Evaluation { projection, .. } => {
                let mut result = child();
                result.insert(projection.clone());
                result
            }
            LogicalNode::Sargable { requirements, .. } => {
                let mut result = child();
                result.extend(
                    requirements
                        .values()
                        .filter_map(|req| req.bound_projection.clone()),
                );
                result
            }
            LogicalNode::GroupBy {
                group_by,
                aggregations,
                ..
            } => group_by
                .iter()
                .cloned()
                .chain(aggregations.iter().map(|(name, _)| name.clone()))
                .collect(),
            LogicalNode::Unwind { pid_projection, .. } => {
                let mut result = child();
                result.insert(pid_projection.clone());
                result
            }
            LogicalNode::BinaryJoin { .. }
            | LogicalNode::RidIntersect { .. }
            | LogicalNode::RidUnion { .. } => children.iter().flatten().cloned().collect(),
        };
        self.projections
            .insert(NodeRef::of(node), projections.clone());
        projections
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::nodes::projection_set;
    use crate::tests::common::*;

    #[test]
    fn tracks_every_subtree() {
        let mut memo = Memo::new();
        let group = memo.add_group(projection_set(["b"]));
        let left = scan("t1", "a");
        let right = delegator(group);
        let eval = evaluation(left.clone(), "c", var("a"));
        let join = join(eval.clone(), right.clone());
        let tracker = ProjectionTracker::build(&memo, &join);
        assert_eq!(tracker.get(&left), &projection_set(["a"]));
        assert_eq!(tracker.get(&right), &projection_set(["b"]));
        assert_eq!(tracker.get(&eval), &projection_set(["a", "c"]));
        assert_eq!(tracker.get(&join), &projection_set(["a", "b", "c"]));
    }

    #[test]
    fn group_by_replaces_child_projections() {
        let memo = Memo::new();
        let child = scan("t1", "a");
        let node = group_by(child, &["k"], &["total"]);
        let tracker = ProjectionTracker::build(&memo, &node);
        assert_eq!(tracker.get(&node), &projection_set(["k", "total"]));
    }
}
