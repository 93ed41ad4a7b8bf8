// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::fmt::Display;
use std::sync::Arc;

use super::{Expr, Interval, JoinType, ProjectionName};
use crate::cascades::MemoPhysicalNodeId;
use crate::physical_property::{CollationOp, DistributionRequirement};

/// A pointer to a physical plan node.
pub type ArcPhysicalNode = Arc<PhysicalNode>;

/// Implementation choices produced by the physical search. None of these may be stored among a
/// group's logical nodes.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PhysicalNode {
    /// Stands in for the winner of another group's optimization task.
    MemoPhysicalDelegator {
        node_id: MemoPhysicalNodeId,
    },
    PhysicalScan {
        field_projections: Vec<(Arc<str>, ProjectionName)>,
        scan_def_name: Arc<str>,
        parallel: bool,
    },
    IndexScan {
        index_def_name: Arc<str>,
        interval: Interval,
        reverse: bool,
    },
    Seek {
        rid_projection: ProjectionName,
        scan_def_name: Arc<str>,
    },
    Filter {
        child: ArcPhysicalNode,
        filter: Expr,
    },
    Evaluation {
        child: ArcPhysicalNode,
        projection: ProjectionName,
        expr: Expr,
    },
    NestedLoopJoin {
        left: ArcPhysicalNode,
        right: ArcPhysicalNode,
        join_type: JoinType,
        filter: Expr,
    },
    HashJoin {
        left: ArcPhysicalNode,
        right: ArcPhysicalNode,
        join_type: JoinType,
        left_keys: Vec<ProjectionName>,
        right_keys: Vec<ProjectionName>,
    },
    MergeJoin {
        left: ArcPhysicalNode,
        right: ArcPhysicalNode,
        left_keys: Vec<ProjectionName>,
        right_keys: Vec<ProjectionName>,
        collation: Vec<CollationOp>,
    },
    Sort {
        child: ArcPhysicalNode,
        spec: Vec<(ProjectionName, CollationOp)>,
    },
    LimitSkip {
        child: ArcPhysicalNode,
        limit: Option<u64>,
        skip: u64,
    },
    Exchange {
        child: ArcPhysicalNode,
        distribution: DistributionRequirement,
    },
    HashGroupBy {
        child: ArcPhysicalNode,
        group_by: Vec<ProjectionName>,
        aggregations: Vec<(ProjectionName, Expr)>,
    },
    Unwind {
        child: ArcPhysicalNode,
        projection: ProjectionName,
        pid_projection: ProjectionName,
    },
    Union {
        children: Vec<ArcPhysicalNode>,
    },
    Unique {
        child: ArcPhysicalNode,
        projections: Vec<ProjectionName>,
    },
    Root {
        child: ArcPhysicalNode,
        projections: Vec<ProjectionName>,
    },
}

impl PhysicalNode {
    pub fn delegator(node_id: MemoPhysicalNodeId) -> ArcPhysicalNode {
        Arc::new(PhysicalNode::MemoPhysicalDelegator { node_id })
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            PhysicalNode::MemoPhysicalDelegator { .. } => "MemoPhysicalDelegator",
            PhysicalNode::PhysicalScan { .. } => "PhysicalScan",
            PhysicalNode::IndexScan { .. } => "IndexScan",
            PhysicalNode::Seek { .. } => "Seek",
            PhysicalNode::Filter { .. } => "PhysicalFilter",
            PhysicalNode::Evaluation { .. } => "PhysicalEvaluation",
            PhysicalNode::NestedLoopJoin { .. } => "NestedLoopJoin",
            PhysicalNode::HashJoin { .. } => "HashJoin",
            PhysicalNode::MergeJoin { .. } => "MergeJoin",
            PhysicalNode::Sort { .. } => "Sort",
            PhysicalNode::LimitSkip { .. } => "PhysicalLimitSkip",
            PhysicalNode::Exchange { .. } => "PhysicalExchange",
            PhysicalNode::HashGroupBy { .. } => "HashGroupBy",
            PhysicalNode::Unwind { .. } => "PhysicalUnwind",
            PhysicalNode::Union { .. } => "PhysicalUnion",
            PhysicalNode::Unique { .. } => "Unique",
            PhysicalNode::Root { .. } => "PhysicalRoot",
        }
    }

    pub fn children(&self) -> Vec<&ArcPhysicalNode> {
        match self {
            PhysicalNode::MemoPhysicalDelegator { .. }
            | PhysicalNode::PhysicalScan { .. }
            | PhysicalNode::IndexScan { .. }
            | PhysicalNode::Seek { .. } => vec![],
            PhysicalNode::Filter { child, .. }
            | PhysicalNode::Evaluation { child, .. }
            | PhysicalNode::Sort { child, .. }
            | PhysicalNode::LimitSkip { child, .. }
            | PhysicalNode::Exchange { child, .. }
            | PhysicalNode::HashGroupBy { child, .. }
            | PhysicalNode::Unwind { child, .. }
            | PhysicalNode::Unique { child, .. }
            | PhysicalNode::Root { child, .. } => vec![child],
            PhysicalNode::NestedLoopJoin { left, right, .. }
            | PhysicalNode::HashJoin { left, right, .. }
            | PhysicalNode::MergeJoin { left, right, .. } => vec![left, right],
            PhysicalNode::Union { children } => children.iter().collect(),
        }
    }
}

impl Display for PhysicalNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhysicalNode::MemoPhysicalDelegator { node_id } => write!(f, "{}", node_id),
            PhysicalNode::PhysicalScan { scan_def_name, .. } => {
                write!(f, "(PhysicalScan {})", scan_def_name)
            }
            PhysicalNode::IndexScan {
                index_def_name,
                interval,
                ..
            } => write!(f, "(IndexScan {} {})", index_def_name, interval),
            PhysicalNode::Seek { scan_def_name, .. } => write!(f, "(Seek {})", scan_def_name),
            _ => {
                write!(f, "({}", self.kind_name())?;
                for child in self.children() {
                    write!(f, " {}", child)?;
                }
                write!(f, ")")
            }
        }
    }
}
