// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! JSON catalog manifest parsing.
//!
//! The manifest declares which models (and versions) a catalog holds,
//! together with their tensor metadata and parameter modes. The offline
//! tooling builds a catalog from it to lint pipeline configurations
//! without a running server.
//!
//! # Format
//! ```json
//! {
//!   "models": [
//!     {
//!       "name": "face-detector",
//!       "version": 2,
//!       "batching_mode": "fixed",
//!       "inputs":  [ { "name": "image", "shape": [1, 3, 224, 224], "precision": "f32" } ],
//!       "outputs": [ { "name": "boxes", "shape": [1, 100, 4], "precision": "f32" } ]
//!     }
//!   ]
//! }
//! ```

use crate::{CatalogError, ModelCatalog, ModelConfig, ModelInstance, ParamMode};
use indexmap::IndexMap;
use std::path::Path;
use tensor_meta::{Precision, Shape, TensorInfo};

/// Top-level catalog manifest, deserialized from JSON.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CatalogManifest {
    /// Declared model instances.
    pub models: Vec<ManifestModel>,
}

/// One model instance entry in the manifest.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ManifestModel {
    /// Model name.
    pub name: String,
    /// Version number (defaults to 1).
    #[serde(default = "default_version")]
    pub version: u64,
    /// Batch-size resolution mode (defaults to `fixed`).
    #[serde(default)]
    pub batching_mode: ParamMode,
    /// Input tensor declarations.
    pub inputs: Vec<ManifestTensor>,
    /// Output tensor declarations.
    pub outputs: Vec<ManifestTensor>,
}

fn default_version() -> u64 {
    1
}

/// One tensor declaration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ManifestTensor {
    /// Tensor name.
    pub name: String,
    /// Dimensions.
    pub shape: Vec<usize>,
    /// Precision string (e.g. `"f32"`, `"int64"`).
    pub precision: String,
    /// Shape resolution mode (defaults to `fixed`; inputs only).
    #[serde(default)]
    pub shape_mode: ParamMode,
}

impl CatalogManifest {
    /// Loads a manifest from a JSON file path.
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| CatalogError::InvalidManifest {
                detail: format!("cannot read '{}': {e}", path.display()),
            })?;
        Self::from_json(&content)
    }

    /// Parses a manifest from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        serde_json::from_str(json).map_err(|e| CatalogError::InvalidManifest {
            detail: e.to_string(),
        })
    }

    /// Builds a populated catalog with every declared instance available.
    pub fn build(&self) -> Result<ModelCatalog, CatalogError> {
        let catalog = ModelCatalog::new();
        for model in &self.models {
            let inputs = tensor_map(&model.name, &model.inputs)?;
            let outputs = tensor_map(&model.name, &model.outputs)?;
            let config = ModelConfig {
                batching_mode: model.batching_mode,
                shapes: model
                    .inputs
                    .iter()
                    .map(|t| (t.name.clone(), t.shape_mode))
                    .collect(),
            };
            catalog.insert_instance(ModelInstance::available(
                model.name.clone(),
                model.version,
                inputs,
                outputs,
                config,
            ));
        }
        Ok(catalog)
    }
}

fn tensor_map(
    model: &str,
    tensors: &[ManifestTensor],
) -> Result<IndexMap<String, TensorInfo>, CatalogError> {
    let mut map = IndexMap::new();
    for t in tensors {
        let precision = Precision::from_str_loose(&t.precision).ok_or_else(|| {
            CatalogError::InvalidManifest {
                detail: format!(
                    "model '{model}' tensor '{}' has unsupported precision '{}'",
                    t.name, t.precision,
                ),
            }
        })?;
        if map
            .insert(
                t.name.clone(),
                TensorInfo::new(Shape::new(t.shape.clone()), precision),
            )
            .is_some()
        {
            return Err(CatalogError::InvalidManifest {
                detail: format!("model '{model}' declares tensor '{}' twice", t.name),
            });
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "models": [
                {
                    "name": "face-detector",
                    "version": 2,
                    "inputs":  [ { "name": "image", "shape": [1, 3, 224, 224], "precision": "f32" } ],
                    "outputs": [ { "name": "boxes", "shape": [1, 100, 4], "precision": "f32" } ]
                },
                {
                    "name": "embedder",
                    "batching_mode": "auto",
                    "inputs":  [ { "name": "crop", "shape": [1, 3, 112, 112], "precision": "f32", "shape_mode": "auto" } ],
                    "outputs": [ { "name": "vec", "shape": [1, 512], "precision": "f32" } ]
                }
            ]
        }"#
    }

    #[test]
    fn test_parse_manifest() {
        let m = CatalogManifest::from_json(sample_json()).unwrap();
        assert_eq!(m.models.len(), 2);
        assert_eq!(m.models[0].version, 2);
        assert_eq!(m.models[1].version, 1);
        assert_eq!(m.models[1].batching_mode, ParamMode::Auto);
    }

    #[test]
    fn test_build_catalog() {
        let catalog = CatalogManifest::from_json(sample_json())
            .unwrap()
            .build()
            .unwrap();
        let detector = catalog.find_model_instance("face-detector", 0).unwrap();
        assert_eq!(detector.version(), 2);
        assert!(detector.inputs_info().contains_key("image"));

        let embedder = catalog.find_model_instance("embedder", 1).unwrap();
        assert_eq!(embedder.config().batching_mode, ParamMode::Auto);
        assert_eq!(embedder.config().first_auto_shape(), Some("crop"));
    }

    #[test]
    fn test_bad_precision() {
        let json = r#"{
            "models": [ {
                "name": "m", "inputs": [ { "name": "x", "shape": [1], "precision": "q4" } ],
                "outputs": []
            } ]
        }"#;
        let err = CatalogManifest::from_json(json).unwrap().build().unwrap_err();
        assert!(matches!(err, CatalogError::InvalidManifest { .. }));
    }

    #[test]
    fn test_duplicate_tensor() {
        let json = r#"{
            "models": [ {
                "name": "m",
                "inputs": [
                    { "name": "x", "shape": [1], "precision": "f32" },
                    { "name": "x", "shape": [2], "precision": "f32" }
                ],
                "outputs": []
            } ]
        }"#;
        let err = CatalogManifest::from_json(json).unwrap().build().unwrap_err();
        assert!(matches!(err, CatalogError::InvalidManifest { .. }));
    }

    #[test]
    fn test_serde_roundtrip() {
        let m = CatalogManifest::from_json(sample_json()).unwrap();
        let json = serde_json::to_string_pretty(&m).unwrap();
        let back = CatalogManifest::from_json(&json).unwrap();
        assert_eq!(back.models.len(), m.models.len());
        assert_eq!(back.models[0].name, m.models[0].name);
    }
}
