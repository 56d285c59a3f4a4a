// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Graph validation: structural and semantic checks against the catalog.
//!
//! Validation runs in two phases and stops at the first error:
//!
//! 1. **Node-level** — entry/exit cardinality, duplicate names, then each
//!    node's wiring: model existence, dynamic-parameter bans, input
//!    completeness, alias soundness, and tensor compatibility across
//!    model-to-model edges.
//! 2. **Cycles and connectivity** — an iterative reverse DFS rooted at the
//!    exit node. The connection map is keyed dependant → dependencies, so
//!    walking "forward" from the exit traverses the transpose of the data
//!    flow graph, which contains exactly the same cycles.
//!
//! Every model touched during validation is pinned with an unload guard
//! for the duration of its checks.

use crate::{Connections, NodeInfo, NodeKind, NodeSide, PipelineError};
use model_catalog::{InstanceGuard, ModelCatalog, ModelInstance, ParamMode};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Borrowed view of a definition's records, validated as one unit.
pub struct GraphValidator<'a> {
    pipeline_name: &'a str,
    node_infos: &'a [NodeInfo],
    connections: &'a Connections,
}

impl<'a> GraphValidator<'a> {
    /// Creates a validator over a record snapshot.
    pub fn new(
        pipeline_name: &'a str,
        node_infos: &'a [NodeInfo],
        connections: &'a Connections,
    ) -> Self {
        Self {
            pipeline_name,
            node_infos,
            connections,
        }
    }

    /// Runs both validation phases.
    pub fn validate(&self, catalog: &ModelCatalog) -> Result<(), PipelineError> {
        self.validate_nodes(catalog)?;
        self.validate_for_cycles()
    }

    /// Phase 1: cardinality, uniqueness, and per-node wiring checks.
    fn validate_nodes(&self, catalog: &ModelCatalog) -> Result<(), PipelineError> {
        tracing::debug!(
            "validation of pipeline '{}' nodes started",
            self.pipeline_name,
        );

        let entry_count = self
            .node_infos
            .iter()
            .filter(|n| n.kind == NodeKind::Entry)
            .count();
        let exit_count = self
            .node_infos
            .iter()
            .filter(|n| n.kind == NodeKind::Exit)
            .count();

        if entry_count == 0 {
            tracing::error!("pipeline '{}' is missing its request node", self.pipeline_name);
            return Err(PipelineError::MissingEntryOrExit {
                side: NodeSide::Entry,
            });
        }
        if exit_count == 0 {
            tracing::error!("pipeline '{}' is missing its response node", self.pipeline_name);
            return Err(PipelineError::MissingEntryOrExit {
                side: NodeSide::Exit,
            });
        }
        if entry_count > 1 {
            tracing::error!("pipeline '{}' has multiple request nodes", self.pipeline_name);
            return Err(PipelineError::MultipleEntryNodes);
        }
        if exit_count > 1 {
            tracing::error!("pipeline '{}' has multiple response nodes", self.pipeline_name);
            return Err(PipelineError::MultipleExitNodes);
        }

        for node in self.node_infos {
            let same_name = self
                .node_infos
                .iter()
                .filter(|n| n.node_name == node.node_name)
                .count();
            if same_name > 1 {
                tracing::error!(
                    "pipeline '{}' has multiple nodes with name '{}'",
                    self.pipeline_name,
                    node.node_name,
                );
                return Err(PipelineError::NodeNameDuplicate {
                    node: node.node_name.clone(),
                });
            }
            self.validate_node(catalog, node)?;
        }

        Ok(())
    }

    /// Validates one dependant node and every edge entering it.
    fn validate_node(
        &self,
        catalog: &ModelCatalog,
        dependant: &NodeInfo,
    ) -> Result<(), PipelineError> {
        tracing::debug!(
            "validating pipeline '{}' node '{}' kind '{}'",
            self.pipeline_name,
            dependant.node_name,
            dependant.kind,
        );

        // For DL dependants, pin the underlying instance and remember the
        // set of model inputs that still need a data source. Each wired
        // input is removed from the set; whatever remains at the end was
        // never fed.
        let mut dependant_instance: Option<(Arc<ModelInstance>, InstanceGuard)> = None;
        let mut remaining_inputs: BTreeSet<String> = BTreeSet::new();

        if dependant.kind == NodeKind::Dl {
            let resolved = self.resolve_dl_instance(catalog, dependant)?;

            let config = resolved.0.config();
            if config.batching_mode == ParamMode::Auto {
                tracing::error!(
                    "pipeline '{}' node '{}' uses model '{}' with dynamic batch size",
                    self.pipeline_name,
                    dependant.node_name,
                    dependant.model_name_or_empty(),
                );
                return Err(PipelineError::ForbiddenModelDynamicParameter {
                    node: dependant.node_name.clone(),
                    model: dependant.model_name_or_empty().to_string(),
                    parameter: "batch size".into(),
                });
            }
            if let Some(input) = config.first_auto_shape() {
                tracing::error!(
                    "pipeline '{}' node '{}' uses model '{}' with dynamic shape on '{}'",
                    self.pipeline_name,
                    dependant.node_name,
                    dependant.model_name_or_empty(),
                    input,
                );
                return Err(PipelineError::ForbiddenModelDynamicParameter {
                    node: dependant.node_name.clone(),
                    model: dependant.model_name_or_empty().to_string(),
                    parameter: "shape".into(),
                });
            }

            remaining_inputs = resolved.0.inputs_info().keys().cloned().collect();
            dependant_instance = Some(resolved);
        }

        if let Some(edges) = self.connections.get(&dependant.node_name) {
            for (dependency_name, mapping) in edges {
                // The entry node may appear as a dependant with an empty
                // mapping; anything more is a configuration the graph
                // model cannot represent.
                if dependant.kind == NodeKind::Entry {
                    if mapping.is_empty() {
                        continue;
                    }
                    return Err(PipelineError::Internal(format!(
                        "entry node '{}' cannot consume inputs",
                        dependant.node_name,
                    )));
                }

                let dependency = self
                    .node_infos
                    .iter()
                    .find(|n| n.node_name == *dependency_name)
                    .ok_or_else(|| {
                        tracing::error!(
                            "pipeline '{}' node '{}' is connected to missing node '{}'",
                            self.pipeline_name,
                            dependant.node_name,
                            dependency_name,
                        );
                        PipelineError::ReferringToMissingNode {
                            dependant: dependant.node_name.clone(),
                            dependency: dependency_name.clone(),
                        }
                    })?;

                if dependency.kind == NodeKind::Exit {
                    return Err(PipelineError::Internal(format!(
                        "exit node '{}' cannot be a dependency",
                        dependency.node_name,
                    )));
                }

                let dependency_instance = if dependency.kind == NodeKind::Dl {
                    Some(self.resolve_dl_instance(catalog, dependency)?)
                } else {
                    None
                };

                for (alias, real_name) in mapping {
                    // Mark the dependant input as fed. Failure means the
                    // input does not exist or was already wired elsewhere.
                    if dependant.kind == NodeKind::Dl && !remaining_inputs.remove(real_name) {
                        tracing::error!(
                            "pipeline '{}' node '{}' model '{}' has no unconnected input '{}'",
                            self.pipeline_name,
                            dependant.node_name,
                            dependant.model_name_or_empty(),
                            real_name,
                        );
                        return Err(PipelineError::ConnectionToMissingNodeInput {
                            node: dependant.node_name.clone(),
                            input: real_name.clone(),
                        });
                    }

                    // The dependency must declare the alias on its surface.
                    if !dependency.output_name_aliases.contains_key(alias) {
                        tracing::error!(
                            "pipeline '{}' node '{}' does not publish '{}' needed by '{}'",
                            self.pipeline_name,
                            dependency.node_name,
                            alias,
                            dependant.node_name,
                        );
                        return Err(PipelineError::ReferringToMissingDataSource {
                            node: dependency.node_name.clone(),
                            alias: alias.clone(),
                        });
                    }

                    // For DL dependencies, the alias must resolve to a real
                    // model output, and model-to-model edges must agree on
                    // tensor metadata.
                    if let Some((dep_instance, _)) = &dependency_instance {
                        let underlying = &dependency.output_name_aliases[alias];
                        let output_info =
                            dep_instance.outputs_info().get(underlying).ok_or_else(|| {
                                tracing::error!(
                                    "pipeline '{}' model '{}' of node '{}' lacks output '{}'",
                                    self.pipeline_name,
                                    dependency.model_name_or_empty(),
                                    dependency.node_name,
                                    underlying,
                                );
                                PipelineError::ReferringToMissingModelOutput {
                                    node: dependency.node_name.clone(),
                                    model: dependency.model_name_or_empty().to_string(),
                                    output: underlying.clone(),
                                }
                            })?;

                        if let Some((dant_instance, _)) = &dependant_instance {
                            let input_info = dant_instance
                                .inputs_info()
                                .get(real_name)
                                .ok_or_else(|| {
                                    PipelineError::Internal(format!(
                                        "input '{real_name}' vanished from model '{}'",
                                        dependant.model_name_or_empty(),
                                    ))
                                })?;

                            if input_info.shape != output_info.shape {
                                tracing::error!(
                                    "pipeline '{}' shape mismatch on edge '{}' -> '{}'",
                                    self.pipeline_name,
                                    dependency.node_name,
                                    dependant.node_name,
                                );
                                return Err(PipelineError::InvalidShape {
                                    dependency: dependency.node_name.clone(),
                                    output: underlying.clone(),
                                    actual: output_info.shape.clone(),
                                    dependant: dependant.node_name.clone(),
                                    input: real_name.clone(),
                                    expected: input_info.shape.clone(),
                                });
                            }
                            if input_info.precision != output_info.precision {
                                tracing::error!(
                                    "pipeline '{}' precision mismatch on edge '{}' -> '{}'",
                                    self.pipeline_name,
                                    dependency.node_name,
                                    dependant.node_name,
                                );
                                return Err(PipelineError::InvalidPrecision {
                                    dependency: dependency.node_name.clone(),
                                    output: underlying.clone(),
                                    actual: output_info.precision.to_string(),
                                    dependant: dependant.node_name.clone(),
                                    input: real_name.clone(),
                                    expected: input_info.precision.to_string(),
                                });
                            }
                        }
                    }
                }
            }
        }

        if !remaining_inputs.is_empty() {
            let inputs: Vec<String> = remaining_inputs.into_iter().collect();
            tracing::error!(
                "pipeline '{}' node '{}' model '{}' has unconnected inputs: {}",
                self.pipeline_name,
                dependant.node_name,
                dependant.model_name_or_empty(),
                inputs.join(", "),
            );
            return Err(PipelineError::NotAllInputsConnected {
                node: dependant.node_name.clone(),
                inputs,
            });
        }

        Ok(())
    }

    /// Phase 2: reverse DFS from the exit node over the transpose graph.
    fn validate_for_cycles(&self) -> Result<(), PipelineError> {
        let exit = self
            .node_infos
            .iter()
            .find(|n| n.kind == NodeKind::Exit)
            .ok_or(PipelineError::MissingEntryOrExit {
                side: NodeSide::Exit,
            })?;

        let mut visited: Vec<&str> = Vec::with_capacity(self.node_infos.len());
        let mut parent_stack: Vec<&str> = Vec::with_capacity(self.node_infos.len());
        let mut current: &str = &exit.node_name;
        visited.push(current);

        loop {
            let mut descended = false;
            if let Some(dependencies) = self.connections.get(current) {
                for dependency in dependencies.keys() {
                    let dependency = dependency.as_str();
                    if dependency == current {
                        tracing::error!("node '{current}' is connected to itself");
                        return Err(PipelineError::CycleFound {
                            path: vec![current.to_string()],
                        });
                    }

                    if !visited.contains(&dependency) {
                        parent_stack.push(current);
                        visited.push(dependency);
                        current = dependency;
                        descended = true;
                        break;
                    }
                    if parent_stack.contains(&dependency) {
                        let path: Vec<String> =
                            parent_stack.iter().map(|n| n.to_string()).collect();
                        tracing::error!("following nodes create a cycle: {}", path.join(", "));
                        return Err(PipelineError::CycleFound { path });
                    }
                    // Already visited but not on the path: a cross edge in
                    // a DAG, nothing to do.
                }
            }

            if !descended {
                match parent_stack.pop() {
                    Some(parent) => current = parent,
                    None => break,
                }
            }
        }

        if visited.len() != self.node_infos.len() {
            tracing::error!(
                "pipeline '{}' has nodes not connected to the graph",
                self.pipeline_name,
            );
            return Err(PipelineError::ContainsUnconnectedNodes);
        }

        Ok(())
    }

    // Looks up the model behind a DL node and pins it with a guard. Any
    // lookup or wait failure is reported as a missing model.
    fn resolve_dl_instance(
        &self,
        catalog: &ModelCatalog,
        node: &NodeInfo,
    ) -> Result<(Arc<ModelInstance>, InstanceGuard), PipelineError> {
        let model = node.model_name_or_empty();
        let version = node.version_or_zero();
        catalog.instance_with_guard(model, version).map_err(|e| {
            tracing::error!(
                "validation of pipeline '{}' failed, node '{}': {e}",
                self.pipeline_name,
                node.node_name,
            );
            PipelineError::ReferringToMissingModel {
                node: node.node_name.clone(),
                model: model.to_string(),
                version,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::{indexmap, IndexMap};
    use model_catalog::{ModelConfig, ModelInstance};
    use tensor_meta::{Precision, Shape, TensorInfo};

    fn info(shape: &[usize]) -> TensorInfo {
        TensorInfo::new(Shape::new(shape.to_vec()), Precision::F32)
    }

    fn tensor_map(names: &[&str], shape: &[usize]) -> IndexMap<String, TensorInfo> {
        names.iter().map(|n| (n.to_string(), info(shape))).collect()
    }

    fn catalog_with_model(name: &str, inputs: &[&str], outputs: &[&str]) -> ModelCatalog {
        let catalog = ModelCatalog::new();
        catalog.insert_instance(ModelInstance::available(
            name,
            1,
            tensor_map(inputs, &[1, 10]),
            tensor_map(outputs, &[1, 10]),
            ModelConfig::fixed(),
        ));
        catalog
    }

    fn identity_aliases(names: &[&str]) -> IndexMap<String, String> {
        names
            .iter()
            .map(|n| (n.to_string(), n.to_string()))
            .collect()
    }

    #[test]
    fn test_missing_entry() {
        let nodes = vec![NodeInfo::exit("response")];
        let connections = Connections::new();
        let catalog = ModelCatalog::new();
        let err = GraphValidator::new("p", &nodes, &connections)
            .validate(&catalog)
            .unwrap_err();
        assert_eq!(
            err,
            PipelineError::MissingEntryOrExit {
                side: NodeSide::Entry,
            },
        );
    }

    #[test]
    fn test_missing_exit() {
        let nodes = vec![NodeInfo::entry("request", identity_aliases(&["x"]))];
        let connections = Connections::new();
        let catalog = ModelCatalog::new();
        let err = GraphValidator::new("p", &nodes, &connections)
            .validate(&catalog)
            .unwrap_err();
        assert_eq!(
            err,
            PipelineError::MissingEntryOrExit {
                side: NodeSide::Exit,
            },
        );
    }

    #[test]
    fn test_multiple_entries() {
        let nodes = vec![
            NodeInfo::entry("a", identity_aliases(&["x"])),
            NodeInfo::entry("b", identity_aliases(&["x"])),
            NodeInfo::exit("response"),
        ];
        let connections = Connections::new();
        let catalog = ModelCatalog::new();
        let err = GraphValidator::new("p", &nodes, &connections)
            .validate(&catalog)
            .unwrap_err();
        assert_eq!(err, PipelineError::MultipleEntryNodes);
    }

    #[test]
    fn test_duplicate_node_name() {
        let nodes = vec![
            NodeInfo::entry("request", identity_aliases(&["x"])),
            NodeInfo::exit("request"),
        ];
        let connections = Connections::new();
        let catalog = ModelCatalog::new();
        let err = GraphValidator::new("p", &nodes, &connections)
            .validate(&catalog)
            .unwrap_err();
        assert_eq!(
            err,
            PipelineError::NodeNameDuplicate {
                node: "request".into(),
            },
        );
    }

    #[test]
    fn test_edge_to_missing_dependency() {
        let nodes = vec![
            NodeInfo::entry("request", identity_aliases(&["x"])),
            NodeInfo::exit("response"),
        ];
        let connections: Connections = indexmap! {
            "response".to_string() => indexmap! {
                "ghost".to_string() => indexmap! {
                    "x".to_string() => "x".to_string(),
                },
            },
        };
        let catalog = ModelCatalog::new();
        let err = GraphValidator::new("p", &nodes, &connections)
            .validate(&catalog)
            .unwrap_err();
        assert_eq!(
            err,
            PipelineError::ReferringToMissingNode {
                dependant: "response".into(),
                dependency: "ghost".into(),
            },
        );
    }

    #[test]
    fn test_missing_model() {
        let nodes = vec![
            NodeInfo::entry("request", identity_aliases(&["x"])),
            NodeInfo::dl("infer", "absent", None, identity_aliases(&["y"])),
            NodeInfo::exit("response"),
        ];
        let connections: Connections = indexmap! {
            "infer".to_string() => indexmap! {
                "request".to_string() => indexmap! {
                    "x".to_string() => "in".to_string(),
                },
            },
            "response".to_string() => indexmap! {
                "infer".to_string() => indexmap! {
                    "y".to_string() => "y".to_string(),
                },
            },
        };
        let catalog = ModelCatalog::new();
        let err = GraphValidator::new("p", &nodes, &connections)
            .validate(&catalog)
            .unwrap_err();
        assert_eq!(
            err,
            PipelineError::ReferringToMissingModel {
                node: "infer".into(),
                model: "absent".into(),
                version: 0,
            },
        );
    }

    #[test]
    fn test_alias_not_published() {
        let catalog = catalog_with_model("m", &["in"], &["out"]);
        let nodes = vec![
            NodeInfo::entry("request", identity_aliases(&["x"])),
            NodeInfo::dl("infer", "m", None, identity_aliases(&["out"])),
            NodeInfo::exit("response"),
        ];
        let connections: Connections = indexmap! {
            "infer".to_string() => indexmap! {
                "request".to_string() => indexmap! {
                    // The entry node never declared 'hidden'.
                    "hidden".to_string() => "in".to_string(),
                },
            },
            "response".to_string() => indexmap! {
                "infer".to_string() => indexmap! {
                    "out".to_string() => "out".to_string(),
                },
            },
        };
        let err = GraphValidator::new("p", &nodes, &connections)
            .validate(&catalog)
            .unwrap_err();
        assert_eq!(
            err,
            PipelineError::ReferringToMissingDataSource {
                node: "request".into(),
                alias: "hidden".into(),
            },
        );
    }

    #[test]
    fn test_double_wired_input() {
        let catalog = catalog_with_model("m", &["in"], &["out"]);
        let nodes = vec![
            NodeInfo::entry("request", identity_aliases(&["x", "y"])),
            NodeInfo::dl("infer", "m", None, identity_aliases(&["out"])),
            NodeInfo::exit("response"),
        ];
        let connections: Connections = indexmap! {
            "infer".to_string() => indexmap! {
                "request".to_string() => indexmap! {
                    "x".to_string() => "in".to_string(),
                    "y".to_string() => "in".to_string(),
                },
            },
            "response".to_string() => indexmap! {
                "infer".to_string() => indexmap! {
                    "out".to_string() => "out".to_string(),
                },
            },
        };
        let err = GraphValidator::new("p", &nodes, &connections)
            .validate(&catalog)
            .unwrap_err();
        assert_eq!(
            err,
            PipelineError::ConnectionToMissingNodeInput {
                node: "infer".into(),
                input: "in".into(),
            },
        );
    }

    #[test]
    fn test_missing_model_output_behind_alias() {
        let catalog = catalog_with_model("m", &["in"], &["out"]);
        let nodes = vec![
            NodeInfo::entry("request", identity_aliases(&["x"])),
            NodeInfo::dl(
                "infer",
                "m",
                None,
                indexmap! {"result".to_string() => "logits".to_string()},
            ),
            NodeInfo::exit("response"),
        ];
        let connections: Connections = indexmap! {
            "infer".to_string() => indexmap! {
                "request".to_string() => indexmap! {
                    "x".to_string() => "in".to_string(),
                },
            },
            "response".to_string() => indexmap! {
                "infer".to_string() => indexmap! {
                    "result".to_string() => "result".to_string(),
                },
            },
        };
        let err = GraphValidator::new("p", &nodes, &connections)
            .validate(&catalog)
            .unwrap_err();
        assert_eq!(
            err,
            PipelineError::ReferringToMissingModelOutput {
                node: "infer".into(),
                model: "m".into(),
                output: "logits".into(),
            },
        );
    }

    #[test]
    fn test_exit_as_dependency_is_internal_error() {
        let nodes = vec![
            NodeInfo::entry("request", identity_aliases(&["x"])),
            NodeInfo::exit("response"),
        ];
        let connections: Connections = indexmap! {
            "request".to_string() => indexmap! {
                "response".to_string() => indexmap! {
                    "x".to_string() => "x".to_string(),
                },
            },
        };
        let catalog = ModelCatalog::new();
        let err = GraphValidator::new("p", &nodes, &connections)
            .validate(&catalog)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Internal(_)));
    }

    #[test]
    fn test_self_loop() {
        // Model with two inputs so the self-edge passes node-level wiring:
        // one fed by the entry, one fed by the node's own output.
        let catalog = ModelCatalog::new();
        catalog.insert_instance(ModelInstance::available(
            "m",
            1,
            tensor_map(&["in1", "in2"], &[1, 10]),
            tensor_map(&["out"], &[1, 10]),
            ModelConfig::fixed(),
        ));
        let nodes = vec![
            NodeInfo::entry("request", identity_aliases(&["x"])),
            NodeInfo::dl("infer", "m", None, identity_aliases(&["out"])),
            NodeInfo::exit("response"),
        ];
        let connections: Connections = indexmap! {
            "infer".to_string() => indexmap! {
                "request".to_string() => indexmap! {
                    "x".to_string() => "in1".to_string(),
                },
                "infer".to_string() => indexmap! {
                    "out".to_string() => "in2".to_string(),
                },
            },
            "response".to_string() => indexmap! {
                "infer".to_string() => indexmap! {
                    "out".to_string() => "out".to_string(),
                },
            },
        };
        let err = GraphValidator::new("p", &nodes, &connections)
            .validate(&catalog)
            .unwrap_err();
        assert_eq!(
            err,
            PipelineError::CycleFound {
                path: vec!["infer".into()],
            },
        );
    }
}
