// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Executable pipelines: short-lived graphs bound to one request.
//!
//! [`PipelineDefinition::create`] materializes the declared graph into
//! concrete node objects wired by edge mappings and hands back a
//! [`Pipeline`] that owns them. The pipeline also owns the
//! [`DefinitionGuard`](crate::DefinitionGuard) acquired at creation, so a
//! reload or retire of the definition waits until every in-flight
//! pipeline is dropped — each one completes against the record snapshot
//! it was built from.
//!
//! `execute` walks the graph in dependency order moving named tensors
//! along edges. Model nodes produce placeholder tensors shaped by their
//! instance's output metadata; the real transfer and compute engine is a
//! separate subsystem and is stubbed here the same way token generation
//! is simulated elsewhere in this workspace.

use crate::{
    DefinitionGuard, EdgeMapping, NodeKind, PipelineDefinition, PipelineError,
    DEFAULT_WAIT_FOR_LOADED_US,
};
use indexmap::IndexMap;
use model_catalog::ModelCatalog;
use std::sync::Arc;
use tensor_meta::Tensor;

/// A decoded predict request: named input tensors.
#[derive(Debug, Clone, Default)]
pub struct PredictRequest {
    tensors: IndexMap<String, Tensor>,
}

impl PredictRequest {
    /// Creates an empty request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a named input tensor.
    pub fn insert(&mut self, name: impl Into<String>, tensor: Tensor) {
        self.tensors.insert(name.into(), tensor);
    }

    /// Looks up an input tensor by name.
    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.tensors.get(name)
    }

    /// Number of input tensors.
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    /// Returns `true` when the request carries no tensors.
    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }
}

/// A predict response under construction: named output tensors.
#[derive(Debug, Clone, Default)]
pub struct PredictResponse {
    tensors: IndexMap<String, Tensor>,
}

impl PredictResponse {
    /// Creates an empty response.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a named output tensor.
    pub fn insert(&mut self, name: impl Into<String>, tensor: Tensor) {
        self.tensors.insert(name.into(), tensor);
    }

    /// Looks up an output tensor by name.
    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.tensors.get(name)
    }

    /// Output tensor names in insertion order.
    pub fn names(&self) -> Vec<&str> {
        self.tensors.keys().map(String::as_str).collect()
    }

    /// Number of output tensors.
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    /// Returns `true` when no outputs have been produced yet.
    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }
}

/// The request adapter: publishes request fields as node outputs.
#[derive(Debug)]
pub struct EntryNode {
    request: PredictRequest,
    aliases: IndexMap<String, String>,
}

/// One model invocation bound to a (model, version) in the catalog.
#[derive(Debug)]
pub struct DlNode {
    node_name: String,
    model_name: String,
    model_version: u64,
    aliases: IndexMap<String, String>,
}

impl DlNode {
    /// The referenced model name.
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// The referenced version (0 = default).
    pub fn model_version(&self) -> u64 {
        self.model_version
    }
}

/// The response adapter: collects final outputs into the response.
#[derive(Debug)]
pub struct ExitNode {
    response: PredictResponse,
}

/// A node of an instantiated pipeline.
#[derive(Debug)]
pub enum PipelineNode {
    /// Request adapter.
    Entry(EntryNode),
    /// Model invocation.
    Dl(DlNode),
    /// Response adapter.
    Exit(ExitNode),
}

impl PipelineNode {
    /// The node's declared output surface (alias → underlying name).
    /// The exit node publishes nothing.
    pub fn aliases(&self) -> Option<&IndexMap<String, String>> {
        match self {
            PipelineNode::Entry(n) => Some(&n.aliases),
            PipelineNode::Dl(n) => Some(&n.aliases),
            PipelineNode::Exit(_) => None,
        }
    }
}

/// An edge of an instantiated pipeline.
#[derive(Debug)]
struct Edge {
    dependency: String,
    dependant: String,
    mapping: EdgeMapping,
}

/// A runnable pipeline bound to one request/response pair.
///
/// Owns its nodes, its edges, and the definition guard acquired at
/// creation time.
pub struct Pipeline {
    name: String,
    nodes: IndexMap<String, PipelineNode>,
    edges: Vec<Edge>,
    entry_name: String,
    exit_name: String,
    _guard: DefinitionGuard,
}

impl Pipeline {
    /// The owning definition's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// The entry node's name.
    pub fn entry_name(&self) -> &str {
        &self.entry_name
    }

    /// The exit node's name.
    pub fn exit_name(&self) -> &str {
        &self.exit_name
    }

    /// Wires `dependency → dependant` with the given edge mapping.
    fn connect(
        &mut self,
        dependency: &str,
        dependant: &str,
        mapping: EdgeMapping,
    ) -> Result<(), PipelineError> {
        if !self.nodes.contains_key(dependency) || !self.nodes.contains_key(dependant) {
            return Err(PipelineError::Internal(format!(
                "cannot connect '{dependency}' to '{dependant}': unknown node",
            )));
        }
        tracing::debug!(
            "connecting pipeline '{}', from '{}' to '{}'",
            self.name,
            dependency,
            dependant,
        );
        self.edges.push(Edge {
            dependency: dependency.to_string(),
            dependant: dependant.to_string(),
            mapping,
        });
        Ok(())
    }

    /// Runs the pipeline and returns the filled response.
    ///
    /// Tensors move along edges in dependency order. Each model node pins
    /// its instance with an unload guard while "executing".
    pub fn execute(mut self, catalog: &ModelCatalog) -> Result<PredictResponse, PipelineError> {
        // Published outputs per node, keyed by alias.
        let mut published: IndexMap<String, IndexMap<String, Tensor>> = IndexMap::new();

        for node_name in self.execution_order()? {
            // Inputs for this node: every edge pointing at it, resolved
            // against what the dependencies already published.
            let mut inputs: IndexMap<String, Tensor> = IndexMap::new();
            for edge in self.edges.iter().filter(|e| e.dependant == node_name) {
                let source = published.get(&edge.dependency).ok_or_else(|| {
                    PipelineError::Internal(format!(
                        "node '{}' ran before its dependency '{}'",
                        node_name, edge.dependency,
                    ))
                })?;
                for (alias, real_name) in &edge.mapping {
                    let tensor = source.get(alias).ok_or_else(|| {
                        PipelineError::Internal(format!(
                            "dependency '{}' did not publish '{alias}'",
                            edge.dependency,
                        ))
                    })?;
                    inputs.insert(real_name.clone(), tensor.clone());
                }
            }

            let node = self.nodes.get_mut(&node_name).ok_or_else(|| {
                PipelineError::Internal(format!("unknown node '{node_name}'"))
            })?;
            match node {
                PipelineNode::Entry(entry) => {
                    let mut outputs = IndexMap::new();
                    for (alias, real_name) in &entry.aliases {
                        let tensor = entry.request.get(real_name).ok_or_else(|| {
                            PipelineError::Internal(format!(
                                "request is missing tensor '{real_name}'",
                            ))
                        })?;
                        outputs.insert(alias.clone(), tensor.clone());
                    }
                    published.insert(node_name.clone(), outputs);
                }
                PipelineNode::Dl(dl) => {
                    let (instance, _instance_guard) = catalog
                        .instance_with_guard(&dl.model_name, dl.model_version)
                        .map_err(PipelineError::from)?;
                    tracing::debug!(
                        "pipeline '{}' executing node '{}' on model '{}' version {}",
                        self.name,
                        dl.node_name,
                        instance.name(),
                        instance.version(),
                    );
                    // Placeholder execution: one zeroed tensor per model
                    // output, published under the node's aliases.
                    let mut outputs = IndexMap::new();
                    for (alias, underlying) in &dl.aliases {
                        let info =
                            instance.outputs_info().get(underlying).ok_or_else(|| {
                                PipelineError::Internal(format!(
                                    "model '{}' lost output '{underlying}'",
                                    dl.model_name,
                                ))
                            })?;
                        outputs.insert(alias.clone(), Tensor::zeroed(info.clone()));
                    }
                    published.insert(node_name.clone(), outputs);
                }
                PipelineNode::Exit(exit) => {
                    for (real_name, tensor) in inputs {
                        exit.response.insert(real_name, tensor);
                    }
                }
            }
        }

        let exit = match self.nodes.shift_remove(&self.exit_name) {
            Some(PipelineNode::Exit(exit)) => exit,
            _ => {
                return Err(PipelineError::Internal(
                    "pipeline lost its exit node".into(),
                ))
            }
        };
        Ok(exit.response)
    }

    // A dependency-respecting node order. The definition was validated
    // acyclic, so the fixpoint always terminates.
    fn execution_order(&self) -> Result<Vec<String>, PipelineError> {
        let mut order: Vec<String> = Vec::with_capacity(self.nodes.len());
        let mut placed: Vec<&str> = Vec::with_capacity(self.nodes.len());
        while order.len() < self.nodes.len() {
            let mut progressed = false;
            for name in self.nodes.keys() {
                if placed.contains(&name.as_str()) {
                    continue;
                }
                let ready = self
                    .edges
                    .iter()
                    .filter(|e| e.dependant == *name)
                    .all(|e| placed.contains(&e.dependency.as_str()));
                if ready {
                    placed.push(name);
                    order.push(name.clone());
                    progressed = true;
                }
            }
            if !progressed {
                return Err(PipelineError::Internal(
                    "pipeline graph has no executable order".into(),
                ));
            }
        }
        Ok(order)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("nodes", &self.nodes.len())
            .field("edges", &self.edges.len())
            .finish()
    }
}

impl PipelineDefinition {
    /// Materializes an executable pipeline bound to the given request and
    /// response.
    ///
    /// Blocks (up to the default timeout) until the definition is
    /// available, then builds one concrete node per record and wires every
    /// declared edge. The returned pipeline owns the acquired guard.
    ///
    /// Model instances are resolved lazily at execution time, so the
    /// catalog is taken here only to mirror the serving call surface.
    pub fn create(
        self: &Arc<Self>,
        request: PredictRequest,
        response: PredictResponse,
        _catalog: &ModelCatalog,
    ) -> Result<Pipeline, PipelineError> {
        let guard = self.wait_for_loaded(DEFAULT_WAIT_FOR_LOADED_US)?;
        let spec = self.spec();

        let mut nodes: IndexMap<String, PipelineNode> = IndexMap::new();
        let mut entry_name: Option<String> = None;
        let mut exit_name: Option<String> = None;
        let mut request = Some(request);
        let mut response = Some(response);

        for info in &spec.node_infos {
            tracing::debug!(
                "creating pipeline '{}', adding node '{}' (model '{}')",
                self.name(),
                info.node_name,
                info.model_name_or_empty(),
            );
            let node = match info.kind {
                NodeKind::Entry => {
                    entry_name = Some(info.node_name.clone());
                    let request = request.take().ok_or_else(|| {
                        PipelineError::Internal("request already bound".into())
                    })?;
                    PipelineNode::Entry(EntryNode {
                        request,
                        aliases: info.output_name_aliases.clone(),
                    })
                }
                NodeKind::Dl => PipelineNode::Dl(DlNode {
                    node_name: info.node_name.clone(),
                    model_name: info.model_name_or_empty().to_string(),
                    model_version: info.version_or_zero(),
                    aliases: info.output_name_aliases.clone(),
                }),
                NodeKind::Exit => {
                    exit_name = Some(info.node_name.clone());
                    let response = response.take().ok_or_else(|| {
                        PipelineError::Internal("response already bound".into())
                    })?;
                    PipelineNode::Exit(ExitNode { response })
                }
            };
            nodes.insert(info.node_name.clone(), node);
        }

        let (Some(entry_name), Some(exit_name)) = (entry_name, exit_name) else {
            return Err(PipelineError::Internal(
                "available definition lacks entry or exit node".into(),
            ));
        };

        let mut pipeline = Pipeline {
            name: self.name().to_string(),
            nodes,
            edges: Vec::new(),
            entry_name,
            exit_name,
            _guard: guard,
        };

        for (dependant, dependencies) in &spec.connections {
            for (dependency, mapping) in dependencies {
                // Empty mappings carry no tensors; nothing to wire.
                if mapping.is_empty() {
                    continue;
                }
                pipeline.connect(dependency, dependant, mapping.clone())?;
            }
        }

        Ok(pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensor_meta::{Precision, Shape, Tensor, TensorInfo};

    fn sample_tensor() -> Tensor {
        Tensor::zeroed(TensorInfo::new(Shape::new(vec![1, 4]), Precision::F32))
    }

    #[test]
    fn test_request_response_maps() {
        let mut request = PredictRequest::new();
        assert!(request.is_empty());
        request.insert("image", sample_tensor());
        assert_eq!(request.len(), 1);
        assert!(request.get("image").is_some());
        assert!(request.get("missing").is_none());

        let mut response = PredictResponse::new();
        assert!(response.is_empty());
        response.insert("boxes", sample_tensor());
        assert_eq!(response.names(), ["boxes"]);
    }

    #[test]
    fn test_aliases_surface() {
        let node = PipelineNode::Exit(ExitNode {
            response: PredictResponse::new(),
        });
        assert!(node.aliases().is_none());
    }
}
