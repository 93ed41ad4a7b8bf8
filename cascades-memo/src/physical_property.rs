// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Required physical properties. A `PhysProps` value keys a group's physical search tasks, so it
//! hashes and compares by value: two requests are the same task only if every requirement is
//! exactly equal.

use std::fmt::Display;

use itertools::Itertools;

use crate::nodes::{IndexReqTarget, ProjectionName, ProjectionNameSet};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CollationOp {
    Ascending,
    Descending,
    /// Equal values are adjacent, in no particular order.
    Clustered,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct CollationRequirement(pub Vec<(ProjectionName, CollationOp)>);

impl CollationRequirement {
    /// `required` must be a prefix of this collation.
    pub fn satisfies(&self, required: &CollationRequirement) -> bool {
        self.0.starts_with(&required.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DistributionType {
    Centralized,
    Replicated,
    RoundRobin,
    HashPartitioning,
    RangePartitioning,
    UnknownPartitioning,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DistributionRequirement {
    pub distribution_type: DistributionType,
    pub projections: Vec<ProjectionName>,
}

impl DistributionRequirement {
    pub fn centralized() -> Self {
        Self {
            distribution_type: DistributionType::Centralized,
            projections: vec![],
        }
    }

    pub fn hash_partitioned(projections: Vec<ProjectionName>) -> Self {
        Self {
            distribution_type: DistributionType::HashPartitioning,
            projections,
        }
    }
}

impl Display for DistributionRequirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.projections.is_empty() {
            write!(f, "{:?}", self.distribution_type)
        } else {
            write!(
                f,
                "{:?}[{}]",
                self.distribution_type,
                self.projections.iter().join(", ")
            )
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LimitSkipRequirement {
    pub limit: Option<u64>,
    pub skip: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IndexingRequirement {
    pub target: IndexReqTarget,
    pub dedup_rid: bool,
}

/// The set of physical properties a group's plan is asked to deliver. `None` means no requirement.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct PhysProps {
    pub collation: Option<CollationRequirement>,
    pub distribution: Option<DistributionRequirement>,
    pub limit_skip: Option<LimitSkipRequirement>,
    pub projections: Option<ProjectionNameSet>,
    pub indexing: Option<IndexingRequirement>,
}

impl PhysProps {
    pub fn with_collation(mut self, collation: CollationRequirement) -> Self {
        self.collation = Some(collation);
        self
    }

    pub fn with_distribution(mut self, distribution: DistributionRequirement) -> Self {
        self.distribution = Some(distribution);
        self
    }

    pub fn with_limit_skip(mut self, limit: Option<u64>, skip: u64) -> Self {
        self.limit_skip = Some(LimitSkipRequirement { limit, skip });
        self
    }

    pub fn with_projections(mut self, projections: ProjectionNameSet) -> Self {
        self.projections = Some(projections);
        self
    }

    pub fn with_indexing(mut self, target: IndexReqTarget, dedup_rid: bool) -> Self {
        self.indexing = Some(IndexingRequirement { target, dedup_rid });
        self
    }
}

impl Display for PhysProps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = vec![];
        if let Some(collation) = &self.collation {
            parts.push(format!(
                "collation=[{}]",
                collation
                    .0
                    .iter()
                    .map(|(name, op)| format!("{}:{:?}", name, op))
                    .join(", ")
            ));
        }
        if let Some(distribution) = &self.distribution {
            parts.push(format!("distribution={}", distribution));
        }
        if let Some(limit_skip) = &self.limit_skip {
            match limit_skip.limit {
                Some(limit) => parts.push(format!("limit={} skip={}", limit, limit_skip.skip)),
                None => parts.push(format!("skip={}", limit_skip.skip)),
            }
        }
        if let Some(projections) = &self.projections {
            parts.push(format!("projections=[{}]", projections.iter().join(", ")));
        }
        if let Some(indexing) = &self.indexing {
            parts.push(format!(
                "indexing={:?} dedup_rid={}",
                indexing.target, indexing.dedup_rid
            ));
        }
        write!(f, "{{{}}}", parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collation(names: &[&str]) -> CollationRequirement {
        CollationRequirement(
            names
                .iter()
                .map(|x| (ProjectionName::from(*x), CollationOp::Ascending))
                .collect(),
        )
    }

    #[test]
    fn collation_prefix_satisfies() {
        assert!(collation(&["a", "b"]).satisfies(&collation(&["a"])));
        assert!(collation(&["a"]).satisfies(&collation(&[])));
        assert!(!collation(&["a"]).satisfies(&collation(&["a", "b"])));
        assert!(!collation(&["b", "a"]).satisfies(&collation(&["a"])));
    }

    #[test]
    fn display_lists_only_present_requirements() {
        let props = PhysProps::default()
            .with_limit_skip(Some(10), 0)
            .with_distribution(DistributionRequirement::centralized());
        assert_eq!(
            props.to_string(),
            "{distribution=Centralized limit=10 skip=0}"
        );
        assert_eq!(PhysProps::default().to_string(), "{}");
    }
}
