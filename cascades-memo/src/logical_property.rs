// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::collections::BTreeSet;
use std::fmt::Display;
use std::sync::Arc;

use anyhow::Result;
use itertools::Itertools;

use crate::cascades::{GroupId, Memo};
use crate::metadata::Metadata;
use crate::nodes::{ArcLogicalNode, PartialSchemaKey, ProjectionName, ProjectionNameSet};

/// A cardinality estimate, in documents.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd)]
pub struct CEType(pub f64);

impl Display for CEType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CardinalityEstimate {
    pub estimate: CEType,
    /// One estimate per requirement of a sargable node, taken in isolation.
    pub partial_schema_key_ce: Vec<(PartialSchemaKey, CEType)>,
}

/// Present on groups whose plans can be answered by scanning (or indexing into) a collection.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IndexingAvailability {
    pub scan_group_id: GroupId,
    pub scan_projection: ProjectionName,
    pub scan_def_name: Arc<str>,
}

/// Logical properties shared by every node of a group. They are derived once, from the first node
/// inserted into the group.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LogicalProps {
    pub projections: ProjectionNameSet,
    pub collection_availability: Option<BTreeSet<Arc<str>>>,
    pub indexing_availability: Option<IndexingAvailability>,
    pub cardinality: Option<CardinalityEstimate>,
}

impl LogicalProps {
    pub fn with_projections(projections: ProjectionNameSet) -> Self {
        Self {
            projections,
            ..Default::default()
        }
    }

    /// Fill every property missing from `self` with the one in `other`. Properties already present
    /// are kept, including the projections fixed when the group was created.
    pub fn merge(&mut self, other: LogicalProps) {
        if self.projections.is_empty() {
            self.projections = other.projections;
        }
        if self.collection_availability.is_none() {
            self.collection_availability = other.collection_availability;
        }
        if self.indexing_availability.is_none() {
            self.indexing_availability = other.indexing_availability;
        }
        if self.cardinality.is_none() {
            self.cardinality = other.cardinality;
        }
    }

    pub fn estimate(&self) -> Option<CEType> {
        self.cardinality.as_ref().map(|x| x.estimate)
    }
}

impl Display for LogicalProps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "projections=[{}]", self.projections.iter().join(", "))?;
        if let Some(collections) = &self.collection_availability {
            write!(f, " collections=[{}]", collections.iter().join(", "))?;
        }
        if let Some(indexing) = &self.indexing_availability {
            write!(
                f,
                " indexing={}@{}",
                indexing.scan_def_name, indexing.scan_group_id
            )?;
        }
        if let Some(ce) = &self.cardinality {
            write!(f, " ce={}", ce.estimate)?;
            for (key, estimate) in &ce.partial_schema_key_ce {
                write!(f, " {}:{}", key, estimate)?;
            }
        }
        Ok(())
    }
}

/// Derives logical properties of a group from one of its nodes. The node's children are
/// delegators, so an implementation reads child properties back from `memo`.
pub trait LogicalPropsInterface: 'static + Send + Sync {
    fn derive_props(
        &self,
        metadata: &Metadata,
        node: &ArcLogicalNode,
        memo: &Memo,
        group_id: GroupId,
    ) -> Result<LogicalProps>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::projection_set;

    #[test]
    fn merge_keeps_existing_properties() {
        let mut props = LogicalProps::with_projections(projection_set(["a"]));
        props.cardinality = Some(CardinalityEstimate {
            estimate: CEType(10.0),
            partial_schema_key_ce: vec![],
        });
        props.merge(LogicalProps {
            projections: projection_set(["b"]),
            collection_availability: Some(["coll".into()].into_iter().collect()),
            indexing_availability: None,
            cardinality: Some(CardinalityEstimate::default()),
        });
        assert_eq!(props.projections, projection_set(["a"]));
        assert_eq!(props.estimate(), Some(CEType(10.0)));
        assert!(props.collection_availability.is_some());
    }
}
