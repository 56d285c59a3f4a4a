// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `ensemble-ctl validate`: load every declared pipeline against the
//! catalog and report the first validation error of each.

use model_catalog::CatalogManifest;
use pipeline_graph::{PipelineConfigList, PipelineDefinition};
use std::path::PathBuf;

pub fn execute(catalog_path: PathBuf, config_path: PathBuf) -> anyhow::Result<()> {
    let catalog = CatalogManifest::from_file(&catalog_path)
        .map_err(|e| anyhow::anyhow!("failed to load catalog manifest: {e}"))?
        .build()?;
    let config = PipelineConfigList::from_file(&config_path)
        .map_err(|e| anyhow::anyhow!("failed to load pipeline configuration: {e}"))?;

    let mut failures = 0usize;
    for pipeline in &config.pipelines {
        let definition = PipelineDefinition::new(&pipeline.name);
        let result = pipeline
            .node_infos()
            .and_then(|nodes| definition.reload(&catalog, nodes, pipeline.connections()));
        match result {
            Ok(()) => println!("  {:<24} OK", pipeline.name),
            Err(e) => {
                failures += 1;
                println!("  {:<24} FAILED: {e}", pipeline.name);
            }
        }
        definition.retire(&catalog);
    }

    println!();
    println!(
        "  {} pipeline(s) checked, {} failed",
        config.pipelines.len(),
        failures,
    );
    if failures > 0 {
        anyhow::bail!("{failures} pipeline(s) failed validation");
    }
    Ok(())
}
