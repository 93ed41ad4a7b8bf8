// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use std::sync::Arc;

use itertools::Itertools;

use super::{Expr, ProjectionName, Value};
use crate::cascades::GroupId;
use crate::physical_property::{CollationOp, DistributionRequirement};

/// A pointer to a logical plan node.
pub type ArcLogicalNode = Arc<LogicalNode>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupByType {
    Complete,
    Local,
    Global,
}

/// Which kind of access a sargable node is allowed to turn into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndexReqTarget {
    Complete,
    Index,
    Seek,
}

/// Identifies the value a sargable requirement constrains: a projection plus a field path below it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartialSchemaKey {
    pub projection: ProjectionName,
    pub path: Vec<Arc<str>>,
}

impl PartialSchemaKey {
    pub fn new(projection: &str, path: &[&str]) -> Self {
        Self {
            projection: projection.into(),
            path: path.iter().map(|x| Arc::from(*x)).collect(),
        }
    }
}

impl Display for PartialSchemaKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.projection)?;
        for field in &self.path {
            write!(f, ".{}", field)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IntervalBound {
    pub inclusive: bool,
    pub value: Value,
}

/// A closed, open or half-open interval. `None` bounds are unbounded.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Interval {
    pub low: Option<IntervalBound>,
    pub high: Option<IntervalBound>,
}

impl Interval {
    pub fn point(value: Value) -> Self {
        Self {
            low: Some(IntervalBound {
                inclusive: true,
                value: value.clone(),
            }),
            high: Some(IntervalBound {
                inclusive: true,
                value,
            }),
        }
    }

    pub fn unbounded() -> Self {
        Self {
            low: None,
            high: None,
        }
    }
}

impl Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.low {
            Some(bound) => write!(f, "{}{}", if bound.inclusive { "[" } else { "(" }, bound.value)?,
            None => write!(f, "(-inf")?,
        }
        write!(f, ", ")?;
        match &self.high {
            Some(bound) => write!(f, "{}{}", bound.value, if bound.inclusive { "]" } else { ")" }),
            None => write!(f, "+inf)"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartialSchemaRequirement {
    /// Projection the matched value is bound to, if the value is needed above the sargable node.
    pub bound_projection: Option<ProjectionName>,
    pub interval: Interval,
    /// The requirement only drives index selection and does not need to be re-checked.
    pub perf_only: bool,
}

pub type PartialSchemaRequirements = BTreeMap<PartialSchemaKey, PartialSchemaRequirement>;

/// The closed set of logical operators the memo stores. Every variant has a fixed arity except
/// `Union`. Children are `MemoLogicalDelegator`s once a node has been memoized.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum LogicalNode {
    Scan {
        projection: ProjectionName,
        scan_def_name: Arc<str>,
    },
    ValueScan {
        projections: Vec<ProjectionName>,
        rows: Vec<Vec<Value>>,
        has_rid: bool,
    },
    /// Stands in for "any plan of the given group".
    MemoLogicalDelegator {
        group_id: GroupId,
    },
    Filter {
        child: ArcLogicalNode,
        filter: Expr,
    },
    Evaluation {
        child: ArcLogicalNode,
        projection: ProjectionName,
        expr: Expr,
    },
    Sargable {
        child: ArcLogicalNode,
        requirements: PartialSchemaRequirements,
        candidate_indexes: Vec<Arc<str>>,
        target: IndexReqTarget,
    },
    GroupBy {
        child: ArcLogicalNode,
        group_by: Vec<ProjectionName>,
        aggregations: Vec<(ProjectionName, Expr)>,
        group_by_type: GroupByType,
    },
    Unwind {
        child: ArcLogicalNode,
        projection: ProjectionName,
        pid_projection: ProjectionName,
        retain_non_arrays: bool,
    },
    Collation {
        child: ArcLogicalNode,
        spec: Vec<(ProjectionName, CollationOp)>,
    },
    LimitSkip {
        child: ArcLogicalNode,
        limit: Option<u64>,
        skip: u64,
    },
    Exchange {
        child: ArcLogicalNode,
        distribution: DistributionRequirement,
        preserves_order: bool,
    },
    Root {
        child: ArcLogicalNode,
        projections: Vec<ProjectionName>,
    },
    BinaryJoin {
        left: ArcLogicalNode,
        right: ArcLogicalNode,
        join_type: JoinType,
        correlated_projections: BTreeSet<ProjectionName>,
        filter: Expr,
    },
    RidIntersect {
        left: ArcLogicalNode,
        right: ArcLogicalNode,
        scan_projection: ProjectionName,
    },
    RidUnion {
        left: ArcLogicalNode,
        right: ArcLogicalNode,
        scan_projection: ProjectionName,
    },
    Union {
        children: Vec<ArcLogicalNode>,
        projections: Vec<ProjectionName>,
    },
}

impl LogicalNode {
    pub fn delegator(group_id: GroupId) -> ArcLogicalNode {
        Arc::new(LogicalNode::MemoLogicalDelegator { group_id })
    }

    pub fn as_delegator(&self) -> Option<GroupId> {
        match self {
            LogicalNode::MemoLogicalDelegator { group_id } => Some(*group_id),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            LogicalNode::Scan { .. } => "Scan",
            LogicalNode::ValueScan { .. } => "ValueScan",
            LogicalNode::MemoLogicalDelegator { .. } => "MemoLogicalDelegator",
            LogicalNode::Filter { .. } => "Filter",
            LogicalNode::Evaluation { .. } => "Evaluation",
            LogicalNode::Sargable { .. } => "Sargable",
            LogicalNode::GroupBy { .. } => "GroupBy",
            LogicalNode::Unwind { .. } => "Unwind",
            LogicalNode::Collation { .. } => "Collation",
            LogicalNode::LimitSkip { .. } => "LimitSkip",
            LogicalNode::Exchange { .. } => "Exchange",
            LogicalNode::Root { .. } => "Root",
            LogicalNode::BinaryJoin { .. } => "BinaryJoin",
            LogicalNode::RidIntersect { .. } => "RidIntersect",
            LogicalNode::RidUnion { .. } => "RidUnion",
            LogicalNode::Union { .. } => "Union",
        }
    }

    pub fn children(&self) -> Vec<&ArcLogicalNode> {
        match self {
            LogicalNode::Scan { .. }
            | LogicalNode::ValueScan { .. }
            | LogicalNode::MemoLogicalDelegator { .. } => vec![],
            LogicalNode::Filter { child, .. }
            | LogicalNode::Evaluation { child, .. }
            | LogicalNode::Sargable { child, .. }
            | LogicalNode::GroupBy { child, .. }
            | LogicalNode::Unwind { child, .. }
            | LogicalNode::Collation { child, .. }
            | LogicalNode::LimitSkip { child, .. }
            | LogicalNode::Exchange { child, .. }
            | LogicalNode::Root { child, .. } => vec![child],
            LogicalNode::BinaryJoin { left, right, .. }
            | LogicalNode::RidIntersect { left, right, .. }
            | LogicalNode::RidUnion { left, right, .. } => vec![left, right],
            LogicalNode::Union { children, .. } => children.iter().collect(),
        }
    }

    /// Group ids of the children of a memoized node.
    ///
    /// Panics if a child is not a delegator, which means the node was never folded into the memo.
    pub fn child_group_ids(&self) -> Vec<GroupId> {
        self.children()
            .into_iter()
            .map(|child| {
                child
                    .as_delegator()
                    .unwrap_or_else(|| panic!("child of memoized node {} is not a delegator", self))
            })
            .collect()
    }

    /// Rebuild this node with `children` in place of its current children, keeping every other
    /// field.
    pub fn with_children(&self, children: Vec<ArcLogicalNode>) -> LogicalNode {
        assert_eq!(
            children.len(),
            self.children().len(),
            "arity mismatch when rebuilding {}",
            self.kind_name()
        );
        if let LogicalNode::Union { projections, .. } = self {
            return LogicalNode::Union {
                children,
                projections: projections.clone(),
            };
        }
        let mut children = children.into_iter();
        let mut next = || children.next().unwrap();
        match self {
            LogicalNode::Scan { .. }
            | LogicalNode::ValueScan { .. }
            | LogicalNode::MemoLogicalDelegator { .. } => self.clone(),
            LogicalNode::Filter { filter, .. } => LogicalNode::Filter {
                child: next(),
                filter: filter.clone(),
            },
            LogicalNode::Evaluation {
                projection, expr, ..
            } => LogicalNode::Evaluation {
                child: next(),
                projection: projection.clone(),
                expr: expr.clone(),
            },
            LogicalNode::Sargable {
                requirements,
                candidate_indexes,
                target,
                ..
            } => LogicalNode::Sargable {
                child: next(),
                requirements: requirements.clone(),
                candidate_indexes: candidate_indexes.clone(),
                target: *target,
            },
            LogicalNode::GroupBy {
                group_by,
                aggregations,
                group_by_type,
                ..
            } => LogicalNode::GroupBy {
                child: next(),
                group_by: group_by.clone(),
                aggregations: aggregations.clone(),
                group_by_type: *group_by_type,
            },
            LogicalNode::Unwind {
                projection,
                pid_projection,
                retain_non_arrays,
                ..
            } => LogicalNode::Unwind {
                child: next(),
                projection: projection.clone(),
                pid_projection: pid_projection.clone(),
                retain_non_arrays: *retain_non_arrays,
            },
            LogicalNode::Collation { spec, .. } => LogicalNode::Collation {
                child: next(),
                spec: spec.clone(),
            },
            LogicalNode::LimitSkip { limit, skip, .. } => LogicalNode::LimitSkip {
                child: next(),
                limit: *limit,
                skip: *skip,
            },
            LogicalNode::Exchange {
                distribution,
                preserves_order,
                ..
            } => LogicalNode::Exchange {
                child: next(),
                distribution: distribution.clone(),
                preserves_order: *preserves_order,
            },
            LogicalNode::Root { projections, .. } => LogicalNode::Root {
                child: next(),
                projections: projections.clone(),
            },
            LogicalNode::BinaryJoin {
                join_type,
                correlated_projections,
                filter,
                ..
            } => LogicalNode::BinaryJoin {
                left: next(),
                right: next(),
                join_type: *join_type,
                correlated_projections: correlated_projections.clone(),
                filter: filter.clone(),
            },
            LogicalNode::RidIntersect {
                scan_projection, ..
            } => LogicalNode::RidIntersect {
                left: next(),
                right: next(),
                scan_projection: scan_projection.clone(),
            },
            LogicalNode::RidUnion {
                scan_projection, ..
            } => LogicalNode::RidUnion {
                left: next(),
                right: next(),
                scan_projection: scan_projection.clone(),
            },
            LogicalNode::Union { .. } => unreachable!(),
        }
    }
}

impl Display for LogicalNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(group_id) = self.as_delegator() {
            return write!(f, "{}", group_id);
        }
        write!(f, "({}", self.kind_name())?;
        for child in self.children() {
            write!(f, " {}", child)?;
        }
        match self {
            LogicalNode::Scan {
                projection,
                scan_def_name,
            } => write!(f, " {} {}", scan_def_name, projection)?,
            LogicalNode::ValueScan {
                projections, rows, ..
            } => write!(f, " [{}] rows={}", projections.iter().join(", "), rows.len())?,
            LogicalNode::Filter { filter, .. } => write!(f, " {}", filter)?,
            LogicalNode::Evaluation {
                projection, expr, ..
            } => write!(f, " {}={}", projection, expr)?,
            LogicalNode::Sargable {
                requirements,
                target,
                ..
            } => {
                for (key, req) in requirements {
                    write!(f, " {}:{}", key, req.interval)?;
                }
                write!(f, " {:?}", target)?;
            }
            LogicalNode::GroupBy {
                group_by,
                aggregations,
                ..
            } => write!(
                f,
                " [{}] [{}]",
                group_by.iter().join(", "),
                aggregations
                    .iter()
                    .map(|(name, expr)| format!("{}={}", name, expr))
                    .join(", ")
            )?,
            LogicalNode::Unwind {
                projection,
                pid_projection,
                ..
            } => write!(f, " {} {}", projection, pid_projection)?,
            LogicalNode::Collation { spec, .. } => write!(
                f,
                " [{}]",
                spec.iter()
                    .map(|(name, op)| format!("{}:{:?}", name, op))
                    .join(", ")
            )?,
            LogicalNode::LimitSkip { limit, skip, .. } => match limit {
                Some(limit) => write!(f, " limit={} skip={}", limit, skip)?,
                None => write!(f, " skip={}", skip)?,
            },
            LogicalNode::Exchange { distribution, .. } => write!(f, " {}", distribution)?,
            LogicalNode::Root { projections, .. } | LogicalNode::Union { projections, .. } => {
                write!(f, " [{}]", projections.iter().join(", "))?
            }
            LogicalNode::BinaryJoin {
                join_type, filter, ..
            } => write!(f, " {:?} {}", join_type, filter)?,
            LogicalNode::RidIntersect {
                scan_projection, ..
            }
            | LogicalNode::RidUnion {
                scan_projection, ..
            } => write!(f, " {}", scan_projection)?,
            LogicalNode::MemoLogicalDelegator { .. } => unreachable!(),
        }
        write!(f, ")")
    }
}
