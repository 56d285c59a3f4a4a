// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Model instance configuration: batching and shape parameter modes.
//!
//! A parameter is either pinned at load time (`Fixed`) or deferred to
//! request time (`Auto`). Pipelines forbid `Auto` on every model they
//! reference — the validator rejects such definitions outright.

use indexmap::IndexMap;

/// How a batch-size or shape parameter is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamMode {
    /// Pinned at model load time.
    Fixed,
    /// Deferred to request time (dynamic).
    Auto,
}

impl Default for ParamMode {
    fn default() -> Self {
        Self::Fixed
    }
}

/// Configuration of one model instance, as far as pipelines care about it.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ModelConfig {
    /// Batch-size resolution mode.
    #[serde(default)]
    pub batching_mode: ParamMode,
    /// Per-input shape resolution modes, keyed by tensor name.
    #[serde(default)]
    pub shapes: IndexMap<String, ParamMode>,
}

impl ModelConfig {
    /// A fully static configuration (no dynamic parameters).
    pub fn fixed() -> Self {
        Self::default()
    }

    /// Returns the name of the first input with an `Auto` shape, if any.
    pub fn first_auto_shape(&self) -> Option<&str> {
        self.shapes
            .iter()
            .find(|(_, mode)| **mode == ParamMode::Auto)
            .map(|(name, _)| name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_default() {
        let c = ModelConfig::fixed();
        assert_eq!(c.batching_mode, ParamMode::Fixed);
        assert!(c.first_auto_shape().is_none());
    }

    #[test]
    fn test_first_auto_shape() {
        let mut c = ModelConfig::fixed();
        c.shapes.insert("input".into(), ParamMode::Fixed);
        c.shapes.insert("mask".into(), ParamMode::Auto);
        assert_eq!(c.first_auto_shape(), Some("mask"));
    }

    #[test]
    fn test_serde_defaults() {
        let c: ModelConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(c.batching_mode, ParamMode::Fixed);
        assert!(c.shapes.is_empty());

        let c: ModelConfig =
            serde_json::from_str(r#"{"batching_mode": "auto"}"#).unwrap();
        assert_eq!(c.batching_mode, ParamMode::Auto);
    }
}
