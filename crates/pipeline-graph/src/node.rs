// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Declared graph shape: node records and connection maps.
//!
//! A [`NodeInfo`] is an immutable descriptor of one declared node; the
//! [`Connections`] map stores the edges keyed by *dependant* node name.
//! Both use insertion-ordered maps so validation walks edges in the order
//! the configuration declared them, keeping first-error-wins diagnostics
//! deterministic.

use crate::PipelineError;
use indexmap::IndexMap;

/// Configuration token naming a model-execution node.
pub const DL_NODE_CONFIG_TYPE: &str = "DL model";
/// Configuration token naming the request adapter node.
pub const ENTRY_NODE_CONFIG_TYPE: &str = "entry";
/// Configuration token naming the response adapter node.
pub const EXIT_NODE_CONFIG_TYPE: &str = "exit";

/// The kind of a pipeline node. A closed set: the validator dispatches on
/// it in both node and edge rules, so adding a kind means extending those
/// rules too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Request adapter: exposes request fields as outputs.
    Entry,
    /// Wraps one versioned model invocation.
    Dl,
    /// Response adapter: consumes final outputs into the response.
    Exit,
}

impl NodeKind {
    /// Returns a human-readable label.
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Entry => "entry",
            NodeKind::Dl => "DL model",
            NodeKind::Exit => "exit",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a configuration kind token.
pub fn to_node_kind(token: &str) -> Result<NodeKind, PipelineError> {
    match token {
        DL_NODE_CONFIG_TYPE => Ok(NodeKind::Dl),
        ENTRY_NODE_CONFIG_TYPE => Ok(NodeKind::Entry),
        EXIT_NODE_CONFIG_TYPE => Ok(NodeKind::Exit),
        other => {
            tracing::error!("unsupported node type: {other}");
            Err(PipelineError::NodeWrongKindConfiguration {
                token: other.to_string(),
            })
        }
    }
}

/// Edge payload: alias published by the dependency → input name consumed
/// by the dependant.
pub type EdgeMapping = IndexMap<String, String>;
/// All edges entering one dependant, keyed by dependency node name.
pub type NodeConnections = IndexMap<String, EdgeMapping>;
/// The whole connection graph, keyed by dependant node name.
pub type Connections = IndexMap<String, NodeConnections>;

/// Immutable descriptor of one declared node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInfo {
    /// Unique name within the definition.
    pub node_name: String,
    /// Node kind.
    pub kind: NodeKind,
    /// Referenced model name; populated only for DL nodes.
    pub model_name: Option<String>,
    /// Pinned model version; `None` means "use the default version".
    pub model_version: Option<u64>,
    /// External alias → underlying tensor name. For DL nodes the aliases
    /// rename model outputs; for the entry node they are the permitted
    /// request-tensor names.
    pub output_name_aliases: IndexMap<String, String>,
}

impl NodeInfo {
    /// Builds the request adapter record. `aliases` lists the request
    /// tensors the pipeline accepts.
    pub fn entry(node_name: impl Into<String>, aliases: IndexMap<String, String>) -> Self {
        Self {
            node_name: node_name.into(),
            kind: NodeKind::Entry,
            model_name: None,
            model_version: None,
            output_name_aliases: aliases,
        }
    }

    /// Builds a model-execution node record.
    pub fn dl(
        node_name: impl Into<String>,
        model_name: impl Into<String>,
        model_version: Option<u64>,
        aliases: IndexMap<String, String>,
    ) -> Self {
        Self {
            node_name: node_name.into(),
            kind: NodeKind::Dl,
            model_name: Some(model_name.into()),
            model_version,
            output_name_aliases: aliases,
        }
    }

    /// Builds the response adapter record.
    pub fn exit(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
            kind: NodeKind::Exit,
            model_name: None,
            model_version: None,
            output_name_aliases: IndexMap::new(),
        }
    }

    /// The version to hand the catalog: 0 encodes "default version".
    pub fn version_or_zero(&self) -> u64 {
        self.model_version.unwrap_or(0)
    }

    /// The referenced model name, or "" for non-DL nodes (diagnostics only).
    pub fn model_name_or_empty(&self) -> &str {
        self.model_name.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::indexmap;

    #[test]
    fn test_to_node_kind() {
        assert_eq!(to_node_kind("DL model").unwrap(), NodeKind::Dl);
        assert_eq!(to_node_kind("entry").unwrap(), NodeKind::Entry);
        assert_eq!(to_node_kind("exit").unwrap(), NodeKind::Exit);
    }

    #[test]
    fn test_to_node_kind_unknown() {
        let err = to_node_kind("custom").unwrap_err();
        assert_eq!(
            err,
            PipelineError::NodeWrongKindConfiguration {
                token: "custom".into(),
            },
        );
        // Token matching is exact.
        assert!(to_node_kind("dl model").is_err());
    }

    #[test]
    fn test_constructors() {
        let entry = NodeInfo::entry("request", indexmap! {"image".to_string() => "image".to_string()});
        assert_eq!(entry.kind, NodeKind::Entry);
        assert_eq!(entry.version_or_zero(), 0);

        let dl = NodeInfo::dl(
            "detect",
            "face-detector",
            Some(2),
            indexmap! {"boxes".to_string() => "prob".to_string()},
        );
        assert_eq!(dl.kind, NodeKind::Dl);
        assert_eq!(dl.version_or_zero(), 2);
        assert_eq!(dl.model_name_or_empty(), "face-detector");

        let exit = NodeInfo::exit("response");
        assert_eq!(exit.kind, NodeKind::Exit);
        assert!(exit.output_name_aliases.is_empty());
    }

    #[test]
    fn test_alias_order_is_insertion_order() {
        let dl = NodeInfo::dl(
            "n",
            "m",
            None,
            indexmap! {
                "z".to_string() => "t3".to_string(),
                "a".to_string() => "t1".to_string(),
            },
        );
        let keys: Vec<_> = dl.output_name_aliases.keys().collect();
        assert_eq!(keys, ["z", "a"]);
    }
}
