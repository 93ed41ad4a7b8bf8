// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

#![allow(clippy::new_without_default)]

pub mod cascades;
pub mod cost;
pub mod debug;
pub mod logical_property;
pub mod metadata;
pub mod nodes;
pub mod physical_property;
pub mod projection_tracking;
pub mod rules;

#[cfg(test)]
pub(crate) mod tests;
