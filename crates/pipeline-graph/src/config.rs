// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! JSON pipeline configuration parsing.
//!
//! A configuration document declares one or more pipelines, each as an
//! ordered node list plus a connection map. Parsing produces the record
//! types a reload consumes ([`crate::NodeInfo`], [`crate::Connections`]);
//! nothing here touches the catalog.
//!
//! # Format
//! ```json
//! {
//!   "pipelines": [
//!     {
//!       "name": "find-faces",
//!       "nodes": [
//!         { "name": "request",  "kind": "entry", "outputs": { "image": "image" } },
//!         { "name": "detect",   "kind": "DL model", "model_name": "face-detector",
//!           "model_version": 2, "outputs": { "boxes": "detection_out" } },
//!         { "name": "response", "kind": "exit" }
//!       ],
//!       "connections": {
//!         "detect":   { "request": { "image": "data" } },
//!         "response": { "detect":  { "boxes": "boxes" } }
//!       }
//!     }
//!   ]
//! }
//! ```

use crate::{to_node_kind, Connections, NodeInfo, NodeKind, PipelineError};
use indexmap::IndexMap;
use std::path::Path;

/// Top-level configuration document.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PipelineConfigList {
    /// Declared pipelines.
    pub pipelines: Vec<PipelineConfig>,
}

/// Declaration of one pipeline.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name; also the logical model name it is served under.
    pub name: String,
    /// Ordered node declarations.
    pub nodes: Vec<NodeConfig>,
    /// dependant → dependency → (alias → realName).
    #[serde(default)]
    pub connections: Connections,
}

/// Declaration of one node.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NodeConfig {
    /// Node name, unique within the pipeline.
    pub name: String,
    /// Kind token: `"entry"`, `"DL model"`, or `"exit"`.
    pub kind: String,
    /// Referenced model name (DL nodes only).
    #[serde(default)]
    pub model_name: Option<String>,
    /// Pinned model version; omitted means "default version".
    #[serde(default)]
    pub model_version: Option<u64>,
    /// Published outputs: alias → underlying tensor name.
    #[serde(default)]
    pub outputs: IndexMap<String, String>,
}

impl PipelineConfigList {
    /// Loads a configuration document from a JSON file path.
    pub fn from_file(path: &Path) -> Result<Self, PipelineError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| PipelineError::InvalidConfiguration {
                detail: format!("cannot read '{}': {e}", path.display()),
            })?;
        Self::from_json(&content)
    }

    /// Parses a configuration document from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        serde_json::from_str(json).map_err(|e| PipelineError::InvalidConfiguration {
            detail: e.to_string(),
        })
    }
}

impl PipelineConfig {
    /// Produces the ordered node records, resolving kind tokens.
    pub fn node_infos(&self) -> Result<Vec<NodeInfo>, PipelineError> {
        let mut infos = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let kind = to_node_kind(&node.kind)?;
            if kind == NodeKind::Dl && node.model_name.is_none() {
                return Err(PipelineError::InvalidConfiguration {
                    detail: format!("node '{}' is a DL node without a model_name", node.name),
                });
            }
            infos.push(NodeInfo {
                node_name: node.name.clone(),
                kind,
                model_name: node.model_name.clone(),
                model_version: node.model_version,
                output_name_aliases: node.outputs.clone(),
            });
        }
        Ok(infos)
    }

    /// Produces the connection map.
    pub fn connections(&self) -> Connections {
        self.connections.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "pipelines": [
                {
                    "name": "find-faces",
                    "nodes": [
                        { "name": "request",  "kind": "entry", "outputs": { "image": "image" } },
                        { "name": "detect",   "kind": "DL model", "model_name": "face-detector",
                          "model_version": 2, "outputs": { "boxes": "detection_out" } },
                        { "name": "response", "kind": "exit" }
                    ],
                    "connections": {
                        "detect":   { "request": { "image": "data" } },
                        "response": { "detect":  { "boxes": "boxes" } }
                    }
                }
            ]
        }"#
    }

    #[test]
    fn test_parse() {
        let list = PipelineConfigList::from_json(sample_json()).unwrap();
        assert_eq!(list.pipelines.len(), 1);
        let p = &list.pipelines[0];
        assert_eq!(p.name, "find-faces");
        assert_eq!(p.nodes.len(), 3);
    }

    #[test]
    fn test_node_infos() {
        let list = PipelineConfigList::from_json(sample_json()).unwrap();
        let infos = list.pipelines[0].node_infos().unwrap();
        assert_eq!(infos[0].kind, NodeKind::Entry);
        assert_eq!(infos[1].kind, NodeKind::Dl);
        assert_eq!(infos[1].model_name.as_deref(), Some("face-detector"));
        assert_eq!(infos[1].model_version, Some(2));
        assert_eq!(
            infos[1].output_name_aliases.get("boxes").map(String::as_str),
            Some("detection_out"),
        );
        assert_eq!(infos[2].kind, NodeKind::Exit);
    }

    #[test]
    fn test_connections_preserve_order() {
        let list = PipelineConfigList::from_json(sample_json()).unwrap();
        let connections = list.pipelines[0].connections();
        let dependants: Vec<_> = connections.keys().collect();
        assert_eq!(dependants, ["detect", "response"]);
    }

    #[test]
    fn test_unknown_kind_token() {
        let json = r#"{
            "pipelines": [ {
                "name": "p",
                "nodes": [ { "name": "n", "kind": "custom" } ]
            } ]
        }"#;
        let list = PipelineConfigList::from_json(json).unwrap();
        let err = list.pipelines[0].node_infos().unwrap_err();
        assert_eq!(
            err,
            PipelineError::NodeWrongKindConfiguration {
                token: "custom".into(),
            },
        );
    }

    #[test]
    fn test_dl_without_model_name() {
        let json = r#"{
            "pipelines": [ {
                "name": "p",
                "nodes": [ { "name": "n", "kind": "DL model" } ]
            } ]
        }"#;
        let list = PipelineConfigList::from_json(json).unwrap();
        let err = list.pipelines[0].node_infos().unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_bad_json() {
        assert!(matches!(
            PipelineConfigList::from_json("{"),
            Err(PipelineError::InvalidConfiguration { .. }),
        ));
    }
}
