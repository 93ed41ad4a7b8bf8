// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Plan nodes stored in and produced by the memo. Logical and physical operators are two closed
//! enums, so every traversal over them is checked for exhaustiveness by the compiler.

mod expr;
mod logical;
mod physical;
mod value;

use std::collections::BTreeSet;
use std::fmt::Display;
use std::sync::Arc;

pub use expr::{BinaryOp, Expr, UnaryOp};
pub use logical::{
    ArcLogicalNode, GroupByType, IndexReqTarget, Interval, IntervalBound, JoinType, LogicalNode,
    PartialSchemaKey, PartialSchemaRequirement, PartialSchemaRequirements,
};
pub use physical::{ArcPhysicalNode, PhysicalNode};
pub use value::{SerializableOrderedF64, Value};

/// Name of a value produced by a plan node.
pub type ProjectionName = Arc<str>;

/// Ordered so that anything derived from it (e.g. a group's binder) is deterministic.
pub type ProjectionNameSet = BTreeSet<ProjectionName>;

pub fn projection_set<'a>(names: impl IntoIterator<Item = &'a str>) -> ProjectionNameSet {
    names.into_iter().map(ProjectionName::from).collect()
}

/// Either kind of plan node. Only the low-level group insertion path accepts this; it rejects the
/// physical half.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum PlanNode {
    Logical(ArcLogicalNode),
    Physical(ArcPhysicalNode),
}

impl Display for PlanNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanNode::Logical(node) => write!(f, "{}", node),
            PlanNode::Physical(node) => write!(f, "{}", node),
        }
    }
}

impl From<ArcLogicalNode> for PlanNode {
    fn from(value: ArcLogicalNode) -> Self {
        Self::Logical(value)
    }
}

impl From<LogicalNode> for PlanNode {
    fn from(value: LogicalNode) -> Self {
        Self::Logical(value.into())
    }
}

impl From<ArcPhysicalNode> for PlanNode {
    fn from(value: ArcPhysicalNode) -> Self {
        Self::Physical(value)
    }
}

impl From<PhysicalNode> for PlanNode {
    fn from(value: PhysicalNode) -> Self {
        Self::Physical(value.into())
    }
}
