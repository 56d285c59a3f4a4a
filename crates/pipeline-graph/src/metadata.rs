// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The definition's externally visible tensor signature.
//!
//! A pipeline is addressed as a single logical model, so it must present
//! aggregate input and output descriptors. Inputs are found on edges
//! leaving the entry node: each alias becomes a pipeline input named
//! after it. Outputs are found on edges entering the exit node: each
//! `realName` becomes a pipeline output. Descriptors come from the
//! adjacent model's metadata; when the adjacent node is the entry or the
//! exit itself (a pass-through), the descriptor is *unspecified*.

use crate::{NodeInfo, NodeKind, PipelineDefinition, PipelineError};
use indexmap::IndexMap;
use model_catalog::ModelCatalog;
use std::sync::Arc;
use tensor_meta::TensorInfo;

impl PipelineDefinition {
    /// Computes the pipeline's input signature.
    ///
    /// Holds a definition guard for the duration of the scan and an
    /// instance guard on each touched model.
    pub fn get_inputs_info(
        self: &Arc<Self>,
        catalog: &ModelCatalog,
    ) -> Result<IndexMap<String, TensorInfo>, PipelineError> {
        let _guard = self.wait_for_loaded(0)?;
        let spec = self.spec();
        let mut inputs_info = IndexMap::new();

        for (dependant_name, all_mappings) in &spec.connections {
            let dependant = find_node(&spec.node_infos, dependant_name)?;
            for (dependency_name, mapping) in all_mappings {
                let dependency = find_node(&spec.node_infos, dependency_name)?;
                if dependency.kind != NodeKind::Entry {
                    continue;
                }

                match dependant.kind {
                    NodeKind::Exit => {
                        for alias in mapping.keys() {
                            inputs_info
                                .entry(alias.clone())
                                .or_insert_with(TensorInfo::unspecified);
                        }
                    }
                    NodeKind::Dl => {
                        let instance = catalog
                            .find_model_instance(
                                dependant.model_name_or_empty(),
                                dependant.version_or_zero(),
                            )
                            .ok_or_else(|| {
                                tracing::debug!(
                                    "model '{}' was unavailable while fetching pipeline '{}' \
                                     inputs info",
                                    dependant.model_name_or_empty(),
                                    self.name(),
                                );
                                PipelineError::ModelMissing {
                                    model: dependant.model_name_or_empty().to_string(),
                                }
                            })?;
                        let _instance_guard = instance.wait_for_loaded(0)?;

                        for (alias, real_name) in mapping {
                            let info = instance
                                .inputs_info()
                                .get(real_name)
                                .cloned()
                                .ok_or_else(|| {
                                    PipelineError::Internal(format!(
                                        "model '{}' lost input '{real_name}'",
                                        dependant.model_name_or_empty(),
                                    ))
                                })?;
                            inputs_info.insert(alias.clone(), info);
                        }
                    }
                    NodeKind::Entry => {
                        // Validation never admits edges into the entry node.
                        return Err(PipelineError::Internal(format!(
                            "unexpected dependant kind for node '{}'",
                            dependant.node_name,
                        )));
                    }
                }
            }
        }

        Ok(inputs_info)
    }

    /// Computes the pipeline's output signature.
    pub fn get_outputs_info(
        self: &Arc<Self>,
        catalog: &ModelCatalog,
    ) -> Result<IndexMap<String, TensorInfo>, PipelineError> {
        let _guard = self.wait_for_loaded(0)?;
        let spec = self.spec();
        let mut outputs_info = IndexMap::new();

        for (dependant_name, all_mappings) in &spec.connections {
            let dependant = find_node(&spec.node_infos, dependant_name)?;
            if dependant.kind != NodeKind::Exit {
                continue;
            }

            for (dependency_name, mapping) in all_mappings {
                let dependency = find_node(&spec.node_infos, dependency_name)?;
                match dependency.kind {
                    NodeKind::Entry => {
                        for real_name in mapping.values() {
                            outputs_info
                                .entry(real_name.clone())
                                .or_insert_with(TensorInfo::unspecified);
                        }
                    }
                    NodeKind::Dl => {
                        let instance = catalog
                            .find_model_instance(
                                dependency.model_name_or_empty(),
                                dependency.version_or_zero(),
                            )
                            .ok_or_else(|| {
                                tracing::debug!(
                                    "model '{}' was unavailable while fetching pipeline '{}' \
                                     outputs info",
                                    dependency.model_name_or_empty(),
                                    self.name(),
                                );
                                PipelineError::ModelMissing {
                                    model: dependency.model_name_or_empty().to_string(),
                                }
                            })?;
                        let _instance_guard = instance.wait_for_loaded(0)?;

                        for (alias, real_name) in mapping {
                            let underlying = dependency
                                .output_name_aliases
                                .get(alias)
                                .unwrap_or(alias);
                            let info = instance
                                .outputs_info()
                                .get(underlying)
                                .cloned()
                                .ok_or_else(|| {
                                    PipelineError::Internal(format!(
                                        "model '{}' lost output '{underlying}'",
                                        dependency.model_name_or_empty(),
                                    ))
                                })?;
                            outputs_info.insert(real_name.clone(), info);
                        }
                    }
                    NodeKind::Exit => {
                        // Validation never admits the exit node as a dependency.
                        return Err(PipelineError::Internal(format!(
                            "unexpected dependency kind for node '{}'",
                            dependency.node_name,
                        )));
                    }
                }
            }
        }

        Ok(outputs_info)
    }
}

fn find_node<'a>(
    node_infos: &'a [NodeInfo],
    name: &str,
) -> Result<&'a NodeInfo, PipelineError> {
    node_infos
        .iter()
        .find(|n| n.node_name == name)
        .ok_or_else(|| PipelineError::Internal(format!("connection names unknown node '{name}'")))
}
