// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::physical_property::DistributionRequirement;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexDefinition {
    /// Indexed field paths, in key order.
    pub fields: Vec<Vec<Arc<str>>>,
    pub is_multikey: bool,
}

/// A collection the plan can scan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScanDefinition {
    pub exists: bool,
    /// Known document count, if statistics are available.
    pub ce: Option<f64>,
    pub indexes: HashMap<Arc<str>, IndexDefinition>,
    #[serde(skip)]
    pub distribution: Option<DistributionRequirement>,
}

impl ScanDefinition {
    pub fn with_ce(ce: f64) -> Self {
        Self {
            exists: true,
            ce: Some(ce),
            indexes: HashMap::new(),
            distribution: None,
        }
    }
}

impl Default for ScanDefinition {
    fn default() -> Self {
        Self {
            exists: true,
            ce: None,
            indexes: HashMap::new(),
            distribution: None,
        }
    }
}

/// Catalog handed through the memo to the property and cardinality strategies.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub scan_defs: HashMap<Arc<str>, ScanDefinition>,
    pub number_of_partitions: usize,
}

impl Metadata {
    pub fn new(scan_defs: impl IntoIterator<Item = (Arc<str>, ScanDefinition)>) -> Self {
        Self {
            scan_defs: scan_defs.into_iter().collect(),
            number_of_partitions: 1,
        }
    }

    pub fn scan_def(&self, name: &str) -> Option<&ScanDefinition> {
        self.scan_defs.get(name)
    }
}
