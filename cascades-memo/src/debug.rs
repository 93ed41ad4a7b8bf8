// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use serde::{Deserialize, Serialize};

/// Debugging knobs of the memo. In debug mode the memo verifies its indices after every
/// integration and cross-checks node projections; a higher debug level logs more.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugInfo {
    pub debug_mode: bool,
    pub debug_level: u32,
}

impl DebugInfo {
    pub const DEFAULT_DEBUG_LEVEL: u32 = 2;

    pub fn default_for_prod() -> Self {
        Self {
            debug_mode: false,
            debug_level: 0,
        }
    }

    pub fn default_for_tests() -> Self {
        Self {
            debug_mode: true,
            debug_level: Self::DEFAULT_DEBUG_LEVEL,
        }
    }

    pub fn is_debug_mode(&self) -> bool {
        self.debug_mode
    }

    pub fn has_debug_level(&self, level: u32) -> bool {
        self.debug_level >= level
    }
}

impl Default for DebugInfo {
    fn default() -> Self {
        Self::default_for_prod()
    }
}
