// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error taxonomy for pipeline definition and validation.
//!
//! Validation returns the first detected error and stops; there is no
//! partial-success state. Every variant carries the names a diagnostic
//! needs, so the message alone identifies the offending node, model, or
//! tensor.

use model_catalog::CatalogError;
use tensor_meta::Shape;

/// Errors produced by the pipeline definition subsystem.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    /// A node declaration used an unrecognized kind token.
    #[error("unsupported node kind token '{token}'")]
    NodeWrongKindConfiguration { token: String },

    /// The definition lacks an entry or an exit node.
    #[error("pipeline is missing its {side} node")]
    MissingEntryOrExit { side: NodeSide },

    /// More than one entry node declared.
    #[error("pipeline declares multiple entry nodes")]
    MultipleEntryNodes,

    /// More than one exit node declared.
    #[error("pipeline declares multiple exit nodes")]
    MultipleExitNodes,

    /// Two nodes share a name.
    #[error("duplicate node name '{node}'")]
    NodeNameDuplicate { node: String },

    /// A self-loop or back-edge was found; `path` is the DFS ancestor
    /// chain at the point of detection.
    #[error("cycle detected through nodes: {}", path.join(", "))]
    CycleFound { path: Vec<String> },

    /// Some node is unreachable from the exit node.
    #[error("pipeline contains nodes not connected to the graph")]
    ContainsUnconnectedNodes,

    /// An edge names a dependency node that does not exist.
    #[error("node '{dependant}' is connected to missing node '{dependency}'")]
    ReferringToMissingNode {
        dependant: String,
        dependency: String,
    },

    /// A DL node's model (or pinned version) is not in the catalog.
    #[error("node '{node}' refers to missing model '{model}' version {version}")]
    ReferringToMissingModel {
        node: String,
        model: String,
        version: u64,
    },

    /// A dependency model lacks the output resolved through an alias.
    #[error("model '{model}' of node '{node}' has no output '{output}'")]
    ReferringToMissingModelOutput {
        node: String,
        model: String,
        output: String,
    },

    /// An edge alias is absent from the dependency's declared outputs.
    #[error("node '{node}' does not publish data item '{alias}'")]
    ReferringToMissingDataSource { node: String, alias: String },

    /// `realName` is not an input of the dependant model, or the input was
    /// already wired from another source.
    #[error("node '{node}' has no unconnected input named '{input}'")]
    ConnectionToMissingNodeInput { node: String, input: String },

    /// Some model inputs were left unfed after all edges were applied.
    #[error("node '{node}' has inputs not connected to any source: {}", inputs.join(", "))]
    NotAllInputsConnected { node: String, inputs: Vec<String> },

    /// Shape mismatch across a model-to-model edge.
    #[error(
        "shape mismatch: output '{output}' of '{dependency}' is {actual} \
         but input '{input}' of '{dependant}' wants {expected}"
    )]
    InvalidShape {
        dependency: String,
        output: String,
        actual: Shape,
        dependant: String,
        input: String,
        expected: Shape,
    },

    /// Precision mismatch across a model-to-model edge.
    #[error(
        "precision mismatch: output '{output}' of '{dependency}' is {actual} \
         but input '{input}' of '{dependant}' wants {expected}"
    )]
    InvalidPrecision {
        dependency: String,
        output: String,
        actual: String,
        dependant: String,
        input: String,
        expected: String,
    },

    /// A referenced model defers batch size or shape to request time.
    #[error("node '{node}' uses model '{model}' with a dynamic {parameter}, which is forbidden")]
    ForbiddenModelDynamicParameter {
        node: String,
        model: String,
        parameter: String,
    },

    /// `wait_for_loaded` timed out before the target became available.
    /// Shared by definition-level and model-level waits.
    #[error("'{name}' is not loaded yet")]
    NotLoadedYet { name: String },

    /// The target was retired while (or before) being waited on.
    #[error("'{name}' is not loaded anymore")]
    NotLoadedAnymore { name: String },

    /// A metadata query needed a model that is unavailable.
    #[error("model '{model}' is unavailable")]
    ModelMissing { model: String },

    /// The pipeline configuration document could not be parsed.
    #[error("invalid pipeline configuration: {detail}")]
    InvalidConfiguration { detail: String },

    /// Internal invariant violation (e.g. the exit node appearing as a
    /// dependency).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Which endpoint of the pipeline a cardinality error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeSide {
    /// The request-side entry node.
    Entry,
    /// The response-side exit node.
    Exit,
}

impl std::fmt::Display for NodeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeSide::Entry => f.write_str("entry"),
            NodeSide::Exit => f.write_str("exit"),
        }
    }
}

/// Catalog failures surfacing through definition-level operations keep
/// their wait/missing semantics.
impl From<CatalogError> for PipelineError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::ModelMissing { model }
            | CatalogError::VersionMissing { model, .. } => {
                PipelineError::ModelMissing { model }
            }
            CatalogError::NotLoadedYet { model, .. } => {
                PipelineError::NotLoadedYet { name: model }
            }
            CatalogError::NotLoadedAnymore { model, .. } => {
                PipelineError::NotLoadedAnymore { name: model }
            }
            CatalogError::InvalidManifest { detail } => PipelineError::Internal(detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_context() {
        let err = PipelineError::NotAllInputsConnected {
            node: "classifier".into(),
            inputs: vec!["b".into(), "c".into()],
        };
        assert_eq!(
            err.to_string(),
            "node 'classifier' has inputs not connected to any source: b, c",
        );

        let err = PipelineError::CycleFound {
            path: vec!["m1".into(), "m2".into()],
        };
        assert_eq!(err.to_string(), "cycle detected through nodes: m1, m2");
    }

    #[test]
    fn test_catalog_error_mapping() {
        let err: PipelineError = CatalogError::ModelMissing {
            model: "resnet".into(),
        }
        .into();
        assert_eq!(
            err,
            PipelineError::ModelMissing {
                model: "resnet".into(),
            },
        );
    }
}
