// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # pipeline-graph
//!
//! Pipeline definitions for a model-serving runtime: a declarative DAG of
//! model invocations addressable as one logical model.
//!
//! A [`PipelineDefinition`] owns the declared node and connection records,
//! validates them against a live [`ModelCatalog`](model_catalog::ModelCatalog),
//! watches the referenced models for changes, and materializes executable
//! [`Pipeline`]s for predict requests.
//!
//! # Key Components
//!
//! - [`NodeInfo`] / [`Connections`] — immutable descriptors of the
//!   declared graph shape.
//! - [`GraphValidator`] — structural checks (cardinality, duplicates,
//!   cycles, orphans) and semantic checks (input completeness, alias
//!   soundness, tensor compatibility, dynamic-parameter bans).
//! - [`PipelineDefinition`] — the lifecycle state machine
//!   (`Begin → Loading → Available → Retired`) with a usage counter that
//!   gates destructive transitions, plus the subscription bookkeeping.
//! - [`DefinitionGuard`] — RAII ticket held by in-flight readers.
//! - [`Pipeline`] — a short-lived executable graph bound to one
//!   request/response pair.
//! - [`PipelineConfigList`] — the JSON configuration surface.
//!
//! # Concurrency Model
//!
//! ```text
//! request threads ──► wait_for_loaded ──► guard (usage += 1)
//!                                           │ create / metadata query
//!                                           ▼ drop (usage -= 1)
//! control thread ──► reload/retire: publish non-Available, drain to 0,
//!                    mutate records, republish
//! catalog threads ──► on_model_changed ──► revalidate, republish
//! ```
//!
//! Readers that acquired a guard before a reload began finish against the
//! old record snapshot; readers arriving later see the new snapshot once
//! `Available` is republished.

mod config;
mod definition;
mod error;
mod guard;
mod metadata;
mod node;
mod pipeline;
mod validator;

pub use config::{NodeConfig, PipelineConfig, PipelineConfigList};
pub use definition::{LifecycleState, PipelineDefinition, DEFAULT_WAIT_FOR_LOADED_US};
pub use error::{NodeSide, PipelineError};
pub use guard::DefinitionGuard;
pub use node::{
    to_node_kind, Connections, EdgeMapping, NodeConnections, NodeInfo, NodeKind,
    DL_NODE_CONFIG_TYPE, ENTRY_NODE_CONFIG_TYPE, EXIT_NODE_CONFIG_TYPE,
};
pub use pipeline::{
    DlNode, EntryNode, ExitNode, Pipeline, PipelineNode, PredictRequest, PredictResponse,
};
pub use validator::GraphValidator;
