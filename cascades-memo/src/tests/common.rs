// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use itertools::Itertools;

use crate::cascades::{GroupId, Memo, MemoContext};
use crate::cost::CardinalityEstimator;
use crate::debug::DebugInfo;
use crate::logical_property::{CEType, IndexingAvailability, LogicalProps, LogicalPropsInterface};
use crate::metadata::{Metadata, ScanDefinition};
use crate::nodes::{
    ArcLogicalNode, BinaryOp, Expr, Interval, JoinType, LogicalNode, PartialSchemaKey,
    PartialSchemaRequirement, Value,
};

pub(crate) fn scan(scan_def_name: &str, projection: &str) -> ArcLogicalNode {
    Arc::new(LogicalNode::Scan {
        projection: projection.into(),
        scan_def_name: scan_def_name.into(),
    })
}

pub(crate) fn delegator(group_id: GroupId) -> ArcLogicalNode {
    LogicalNode::delegator(group_id)
}

pub(crate) fn var(name: &str) -> Expr {
    Expr::var(name)
}

pub(crate) fn eq(name: &str, value: i64) -> Expr {
    Expr::binary(BinaryOp::Eq, Expr::var(name), Expr::constant(Value::Int64(value)))
}

pub(crate) fn filter(child: ArcLogicalNode, filter: Expr) -> ArcLogicalNode {
    Arc::new(LogicalNode::Filter { child, filter })
}

pub(crate) fn evaluation(child: ArcLogicalNode, projection: &str, expr: Expr) -> ArcLogicalNode {
    Arc::new(LogicalNode::Evaluation {
        child,
        projection: projection.into(),
        expr,
    })
}

pub(crate) fn join(left: ArcLogicalNode, right: ArcLogicalNode) -> ArcLogicalNode {
    Arc::new(LogicalNode::BinaryJoin {
        left,
        right,
        join_type: JoinType::Inner,
        correlated_projections: Default::default(),
        filter: Expr::true_constant(),
    })
}

pub(crate) fn group_by(child: ArcLogicalNode, keys: &[&str], aggs: &[&str]) -> ArcLogicalNode {
    Arc::new(LogicalNode::GroupBy {
        child,
        group_by: keys.iter().map(|x| (*x).into()).collect(),
        aggregations: aggs
            .iter()
            .map(|x| {
                let function = Expr::FunctionCall {
                    name: "$sum".into(),
                    args: vec![Expr::constant(Value::Int64(1))],
                };
                ((*x).into(), function)
            })
            .collect(),
        group_by_type: crate::nodes::GroupByType::Complete,
    })
}

pub(crate) fn limit(child: ArcLogicalNode, limit: u64) -> ArcLogicalNode {
    Arc::new(LogicalNode::LimitSkip {
        child,
        limit: Some(limit),
        skip: 0,
    })
}

pub(crate) fn union(children: Vec<ArcLogicalNode>, projections: &[&str]) -> ArcLogicalNode {
    Arc::new(LogicalNode::Union {
        children,
        projections: projections.iter().map(|x| (*x).into()).collect(),
    })
}

/// A sargable node with one point requirement per `(projection, field, value)`.
pub(crate) fn sargable(child: ArcLogicalNode, points: &[(&str, &str, i64)]) -> ArcLogicalNode {
    Arc::new(LogicalNode::Sargable {
        child,
        requirements: points
            .iter()
            .map(|(projection, field, value)| {
                (
                    PartialSchemaKey::new(projection, &[*field]),
                    PartialSchemaRequirement {
                        bound_projection: None,
                        interval: Interval::point(Value::Int64(*value)),
                        perf_only: false,
                    },
                )
            })
            .collect(),
        candidate_indexes: vec![],
        target: crate::nodes::IndexReqTarget::Complete,
    })
}

/// Collections known to the test catalog, each with 1000 documents.
pub(crate) const COLLECTIONS: [&str; 4] = ["t1", "t2", "t3", "coll"];

/// Derives projections from the group binder and collection availability from scans. Scans of
/// collections missing from the catalog are rejected.
pub(crate) struct TestPropsDerivation;

impl LogicalPropsInterface for TestPropsDerivation {
    fn derive_props(
        &self,
        metadata: &Metadata,
        node: &ArcLogicalNode,
        memo: &Memo,
        group_id: GroupId,
    ) -> Result<LogicalProps> {
        let mut props = LogicalProps::with_projections(memo.binder_for_group(group_id).projection_set());
        if let LogicalNode::Scan {
            projection,
            scan_def_name,
        } = node.as_ref()
        {
            if metadata.scan_def(scan_def_name).is_none() {
                bail!("unknown collection {}", scan_def_name);
            }
            props.collection_availability = Some([scan_def_name.clone()].into_iter().collect());
            props.indexing_availability = Some(IndexingAvailability {
                scan_group_id: group_id,
                scan_projection: projection.clone(),
                scan_def_name: scan_def_name.clone(),
            });
        }
        Ok(props)
    }
}

/// A toy estimator: scans use the catalog, every filtering operator keeps a tenth of its input.
/// Counts how many estimates it was asked for.
#[derive(Default)]
pub(crate) struct TestCardinalityEstimator {
    calls: AtomicUsize,
}

impl TestCardinalityEstimator {
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn child_ce(memo: &Memo, child: &ArcLogicalNode) -> f64 {
    child
        .as_delegator()
        .and_then(|group_id| memo.logical_props(group_id).estimate())
        .map_or(0.0, |x| x.0)
}

impl CardinalityEstimator for TestCardinalityEstimator {
    fn derive_ce(
        &self,
        metadata: &Metadata,
        memo: &Memo,
        _props: &LogicalProps,
        node: &ArcLogicalNode,
    ) -> Result<CEType> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let children = node.children();
        let estimate = match node.as_ref() {
            LogicalNode::Scan { scan_def_name, .. } => metadata
                .scan_def(scan_def_name)
                .and_then(|x| x.ce)
                .unwrap_or(0.0),
            LogicalNode::ValueScan { rows, .. } => rows.len() as f64,
            LogicalNode::Filter { child, .. } => child_ce(memo, child) * 0.1,
            LogicalNode::Sargable {
                child,
                requirements,
                ..
            } => child_ce(memo, child) * 0.1f64.powi(requirements.len() as i32),
            LogicalNode::LimitSkip {
                child,
                limit: Some(limit),
                ..
            } => child_ce(memo, child).min(*limit as f64),
            LogicalNode::BinaryJoin { left, right, .. } => {
                child_ce(memo, left) * child_ce(memo, right) * 0.1
            }
            _ => children.iter().map(|x| child_ce(memo, x)).sum(),
        };
        Ok(CEType(estimate))
    }
}

/// Owns everything a `MemoContext` borrows.
pub(crate) struct TestEnv {
    pub metadata: Metadata,
    pub debug_info: DebugInfo,
    pub props: TestPropsDerivation,
    pub ce: TestCardinalityEstimator,
}

impl TestEnv {
    pub(crate) fn new() -> Self {
        Self::with_debug_info(DebugInfo::default_for_tests())
    }

    pub(crate) fn with_debug_info(debug_info: DebugInfo) -> Self {
        Self {
            metadata: Metadata::new(
                COLLECTIONS
                    .iter()
                    .map(|x| (Arc::from(*x), ScanDefinition::with_ce(1000.0)))
                    .collect_vec(),
            ),
            debug_info,
            props: TestPropsDerivation,
            ce: TestCardinalityEstimator::default(),
        }
    }

    pub(crate) fn ctx(&self) -> MemoContext<'_> {
        MemoContext::new(&self.metadata, &self.debug_info, &self.props, &self.ce)
    }
}
