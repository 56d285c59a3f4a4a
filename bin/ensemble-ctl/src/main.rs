// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # ensemble-ctl
//!
//! Offline lint tool for pipeline configurations: validates pipeline
//! definitions against a catalog manifest without a running server.
//!
//! ## Usage
//! ```bash
//! # Validate every pipeline in a configuration
//! ensemble-ctl validate --catalog catalog.json --config pipelines.json
//!
//! # Describe one pipeline's external tensor signature
//! ensemble-ctl describe --catalog catalog.json --config pipelines.json --pipeline find-faces
//! ```

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ensemble-ctl",
    about = "Offline validation for model-serving pipeline configurations",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate every pipeline in a configuration document.
    Validate {
        /// Path to the catalog manifest (JSON).
        #[arg(short = 'm', long)]
        catalog: std::path::PathBuf,

        /// Path to the pipeline configuration (JSON).
        #[arg(short, long)]
        config: std::path::PathBuf,
    },

    /// Describe a pipeline: nodes, edges, and external tensor signature.
    Describe {
        /// Path to the catalog manifest (JSON).
        #[arg(short = 'm', long)]
        catalog: std::path::PathBuf,

        /// Path to the pipeline configuration (JSON).
        #[arg(short, long)]
        config: std::path::PathBuf,

        /// Name of the pipeline to describe.
        #[arg(short, long)]
        pipeline: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    commands::init_tracing(cli.verbose);

    match cli.command {
        Commands::Validate { catalog, config } => commands::validate::execute(catalog, config),
        Commands::Describe {
            catalog,
            config,
            pipeline,
        } => commands::describe::execute(catalog, config, pipeline),
    }
}
