// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Tags recording which rewrite produced a memo entry. The memo only stores them; the rewrite
//! logic lives with the driver.

use std::fmt::{Display, Formatter};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogicalRewriteType {
    /// The node came from the input plan.
    Root,
    FilterEvaluationReorder,
    FilterCollationReorder,
    EvaluationCollationReorder,
    EvaluationLimitSkipReorder,
    FilterGroupByPushdown,
    FilterUnwindReorder,
    EvaluationUnwindReorder,
    FilterExchangeReorder,
    ExchangeEvaluationReorder,
    FilterUnionReorder,
    CollationMerge,
    LimitSkipMerge,
    SargableFilterReorder,
    SargableEvaluationReorder,
    SargableMerge,
    SargableSplit,
    FilterSubstitute,
    EvaluationSubstitute,
    FilterRidIntersectReorder,
    RidIntersectGroupByReorder,
    GroupByExplore,
    SargableCovering,
}

impl Display for LogicalRewriteType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PhysicalRewriteType {
    Uninitialized,
    Root,
    Seek,
    PhysicalScan,
    ValueScan,
    Evaluation,
    Filter,
    Sargable,
    RidIntersect,
    RidUnion,
    IndexFetch,
    HashJoin,
    MergeJoin,
    NestedLoopJoin,
    HashGroupBy,
    Unwind,
    Union,
    LimitSkip,
    EnforceCollation,
    EnforceLimitSkip,
    EnforceDistribution,
    AttemptCoveringQuery,
}

impl Display for PhysicalRewriteType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}
