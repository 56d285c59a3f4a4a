// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-tensor metadata descriptors.

use crate::{Precision, Shape};
use std::fmt;

/// Metadata describing one named tensor: its shape and element precision.
///
/// The pipeline validator compares `TensorInfo` values across graph edges;
/// the metadata query exposes them as the pipeline's external signature.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TensorInfo {
    /// Dimension descriptor.
    pub shape: Shape,
    /// Element data type.
    pub precision: Precision,
}

impl TensorInfo {
    /// Creates a descriptor from a shape and precision.
    pub fn new(shape: Shape, precision: Precision) -> Self {
        Self { shape, precision }
    }

    /// Returns the placeholder descriptor for tensors whose metadata cannot
    /// be derived from any model (e.g. a request field passed straight
    /// through to the response).
    pub fn unspecified() -> Self {
        Self {
            shape: Shape::empty(),
            precision: Precision::Undefined,
        }
    }

    /// Returns `true` if this is the unspecified placeholder.
    pub fn is_unspecified(&self) -> bool {
        self.precision == Precision::Undefined
    }

    /// Returns the memory footprint of one tensor with this metadata.
    pub fn size_bytes(&self) -> usize {
        self.shape.size_bytes(self.precision)
    }
}

impl fmt::Display for TensorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.precision, self.shape)
    }
}
