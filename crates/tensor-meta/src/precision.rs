// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Supported tensor element data types.

/// Enumerates the numeric types a served tensor can hold.
///
/// `Undefined` is reserved for unspecified descriptors: a pipeline input
/// fed straight to the response carries no model-derived metadata, so its
/// precision cannot be stated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    /// 32-bit IEEE 754 floating point.
    F32,
    /// 16-bit IEEE 754 floating point.
    F16,
    /// 16-bit brain floating point.
    BF16,
    /// 8-bit signed integer (quantised models).
    I8,
    /// 32-bit signed integer.
    I32,
    /// 64-bit signed integer (token IDs, sequence labels).
    I64,
    /// 8-bit unsigned integer (raw image data).
    U8,
    /// Placeholder for tensors whose metadata cannot be derived.
    Undefined,
}

impl Precision {
    /// Returns the size of a single element in bytes.
    ///
    /// `Undefined` has no element size and returns 0.
    pub fn size_bytes(self) -> usize {
        match self {
            Precision::F32 => 4,
            Precision::F16 => 2,
            Precision::BF16 => 2,
            Precision::I8 => 1,
            Precision::I32 => 4,
            Precision::I64 => 8,
            Precision::U8 => 1,
            Precision::Undefined => 0,
        }
    }

    /// Parses a precision from a manifest string.
    ///
    /// Accepts the short form (`"f32"`) and common aliases (`"fp32"`,
    /// `"float32"`).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "f32" | "fp32" | "float32" => Some(Self::F32),
            "f16" | "fp16" | "float16" => Some(Self::F16),
            "bf16" | "bfloat16" => Some(Self::BF16),
            "i8" | "int8" => Some(Self::I8),
            "i32" | "int32" => Some(Self::I32),
            "i64" | "int64" => Some(Self::I64),
            "u8" | "uint8" => Some(Self::U8),
            _ => None,
        }
    }

    /// Returns a human-readable label for this precision.
    pub fn as_str(self) -> &'static str {
        match self {
            Precision::F32 => "f32",
            Precision::F16 => "f16",
            Precision::BF16 => "bf16",
            Precision::I8 => "i8",
            Precision::I32 => "i32",
            Precision::I64 => "i64",
            Precision::U8 => "u8",
            Precision::Undefined => "undefined",
        }
    }
}

impl std::fmt::Display for Precision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
