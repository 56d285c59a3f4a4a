// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `ensemble-ctl describe`: print one pipeline's node list, edges, and
//! the external tensor signature it presents to clients.

use model_catalog::CatalogManifest;
use pipeline_graph::{PipelineConfigList, PipelineDefinition};
use std::path::PathBuf;

pub fn execute(
    catalog_path: PathBuf,
    config_path: PathBuf,
    pipeline_name: String,
) -> anyhow::Result<()> {
    let catalog = CatalogManifest::from_file(&catalog_path)
        .map_err(|e| anyhow::anyhow!("failed to load catalog manifest: {e}"))?
        .build()?;
    let config = PipelineConfigList::from_file(&config_path)
        .map_err(|e| anyhow::anyhow!("failed to load pipeline configuration: {e}"))?;

    let pipeline = config
        .pipelines
        .iter()
        .find(|p| p.name == pipeline_name)
        .ok_or_else(|| {
            anyhow::anyhow!("configuration declares no pipeline named '{pipeline_name}'")
        })?;

    let definition = PipelineDefinition::new(&pipeline.name);
    definition
        .reload(&catalog, pipeline.node_infos()?, pipeline.connections())
        .map_err(|e| anyhow::anyhow!("pipeline '{}' failed validation: {e}", pipeline.name))?;

    println!("  Pipeline: {}", pipeline.name);
    println!();

    println!("  {:<20} {:<10} {:<20} {:>8}", "Node", "Kind", "Model", "Version");
    println!("  {}", "-".repeat(62));
    for node in &pipeline.nodes {
        println!(
            "  {:<20} {:<10} {:<20} {:>8}",
            node.name,
            node.kind,
            node.model_name.as_deref().unwrap_or("-"),
            node.model_version
                .map(|v| v.to_string())
                .unwrap_or_else(|| "default".into()),
        );
    }
    println!();

    println!("  Edges:");
    for (dependant, dependencies) in &pipeline.connections {
        for (dependency, mapping) in dependencies {
            for (alias, real_name) in mapping {
                println!("   {dependency}[{alias}] -> {dependant}[{real_name}]");
            }
        }
    }
    println!();

    let inputs = definition.get_inputs_info(&catalog)?;
    println!("  Inputs:");
    for (name, info) in &inputs {
        println!("   {name:<20} {info}");
    }

    let outputs = definition.get_outputs_info(&catalog)?;
    println!("  Outputs:");
    for (name, info) in &outputs {
        println!("   {name:<20} {info}");
    }

    definition.retire(&catalog);
    Ok(())
}
