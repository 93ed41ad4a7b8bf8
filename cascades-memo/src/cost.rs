// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::fmt::Display;

use anyhow::Result;
use ordered_float::OrderedFloat;

use crate::cascades::Memo;
use crate::logical_property::{CEType, LogicalProps};
use crate::metadata::Metadata;
use crate::nodes::ArcLogicalNode;

/// The cost of a plan. A lower value means a better cost.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CostType(pub OrderedFloat<f64>);

impl CostType {
    pub const INFINITY: CostType = CostType(OrderedFloat(f64::INFINITY));

    pub fn new(cost: f64) -> Self {
        assert!(cost >= 0.0, "cost must be non-negative, got {}", cost);
        CostType(OrderedFloat(cost))
    }

    pub fn is_infinite(&self) -> bool {
        self.0.is_infinite()
    }
}

impl Display for CostType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_infinite() {
            write!(f, "inf")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Estimates how many documents a node produces. `props` are the logical properties of the group
/// being estimated; `node` is either the group's first node or a single-requirement variant of
/// it.
pub trait CardinalityEstimator: 'static + Send + Sync {
    fn derive_ce(
        &self,
        metadata: &Metadata,
        memo: &Memo,
        props: &LogicalProps,
        node: &ArcLogicalNode,
    ) -> Result<CEType>;
}
