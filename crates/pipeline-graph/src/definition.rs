// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The long-lived pipeline definition: records, lifecycle, subscriptions.
//!
//! # Lifecycle
//!
//! ```text
//! Begin ──► Loading ──► Available ──► Retired
//!              ▲            │
//!              └── reload ──┘
//! ```
//!
//! Node and connection records may only be replaced while the state is
//! not `Available` and the usage counter is zero. Writers publish a
//! non-available state first (rejecting new guards), then drain the
//! counter, then mutate. Readers acquire a [`DefinitionGuard`] through
//! [`PipelineDefinition::wait_for_loaded`], which checks availability and
//! increments the counter under one lock.
//!
//! # Subscriptions
//!
//! For every DL node the definition watches the referenced (model,
//! version) — version 0 standing in for "default" — and the catalog calls
//! back on changes so the definition can re-validate itself. Both sides
//! hold the relationship weakly.

use crate::{Connections, GraphValidator, NodeInfo, NodeKind, PipelineError};
use model_catalog::{ChangeSubscriber, ModelCatalog};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError, RwLock, RwLockReadGuard};
use std::time::{Duration, Instant};

use crate::DefinitionGuard;

/// Granularity of the timed wait inside `wait_for_loaded`.
const WAIT_LOADED_TIMESTEP: Duration = Duration::from_micros(10);

/// Default wait budget for guard acquisition in `create`, in microseconds.
pub const DEFAULT_WAIT_FOR_LOADED_US: u64 = 500_000;

/// Lifecycle state of a pipeline definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecycleState {
    /// Created, never loaded.
    Begin,
    /// A (re)load is in progress, or the last validation failed.
    Loading,
    /// Validated and serving.
    Available,
    /// Permanently withdrawn.
    Retired,
}

/// The definition's record snapshot, swapped atomically on reload.
#[derive(Debug, Default)]
pub(crate) struct GraphSpec {
    pub(crate) node_infos: Vec<NodeInfo>,
    pub(crate) connections: Connections,
}

/// A named, validated pipeline graph specification.
///
/// Always used behind `Arc`: guards, subscriptions, and instantiated
/// pipelines all hold shared references back to it.
pub struct PipelineDefinition {
    pipeline_name: String,
    spec: RwLock<GraphSpec>,
    state: Mutex<LifecycleState>,
    state_changed: Condvar,
    usage: AtomicUsize,
    // Watched (model name, version-or-zero) pairs, deduplicated.
    subscriptions: Mutex<BTreeSet<(String, u64)>>,
    // Serializes reload/retire against each other.
    writer: Mutex<()>,
}

impl PipelineDefinition {
    /// Creates an empty definition in the `Begin` state.
    pub fn new(pipeline_name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            pipeline_name: pipeline_name.into(),
            spec: RwLock::new(GraphSpec::default()),
            state: Mutex::new(LifecycleState::Begin),
            state_changed: Condvar::new(),
            usage: AtomicUsize::new(0),
            subscriptions: Mutex::new(BTreeSet::new()),
            writer: Mutex::new(()),
        })
    }

    /// The pipeline's name.
    pub fn name(&self) -> &str {
        &self.pipeline_name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of outstanding guards.
    pub fn usage_count(&self) -> usize {
        self.usage.load(Ordering::Acquire)
    }

    pub(crate) fn usage_counter(&self) -> &AtomicUsize {
        &self.usage
    }

    pub(crate) fn spec(&self) -> RwLockReadGuard<'_, GraphSpec> {
        self.spec.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the definition's records and re-validates.
    ///
    /// Tears down existing subscriptions, publishes `Loading` (no new
    /// guards can be acquired), drains in-flight readers, swaps the
    /// records, re-subscribes, and validates. `Available` is republished
    /// only on success; on failure the definition stays non-available and
    /// the validation error is returned.
    pub fn reload(
        self: &Arc<Self>,
        catalog: &ModelCatalog,
        node_infos: Vec<NodeInfo>,
        connections: Connections,
    ) -> Result<(), PipelineError> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        tracing::info!("reloading pipeline '{}'", self.pipeline_name);

        self.reset_subscriptions(catalog);
        self.publish_state(LifecycleState::Loading);
        self.drain_users();

        {
            let mut spec = self.spec.write().unwrap_or_else(PoisonError::into_inner);
            spec.node_infos = node_infos;
            spec.connections = connections;
        }
        self.make_subscriptions(catalog);

        let result = self.validate(catalog);
        if result.is_ok() {
            self.publish_state(LifecycleState::Available);
            tracing::info!("pipeline '{}' is available", self.pipeline_name);
        }
        result
    }

    /// Withdraws the definition permanently.
    pub fn retire(self: &Arc<Self>, catalog: &ModelCatalog) {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        tracing::info!("retiring pipeline '{}'", self.pipeline_name);

        self.reset_subscriptions(catalog);
        self.publish_state(LifecycleState::Retired);
        self.drain_users();

        let mut spec = self.spec.write().unwrap_or_else(PoisonError::into_inner);
        spec.node_infos.clear();
        spec.connections.clear();
    }

    /// Validates the current records against the catalog.
    pub fn validate(&self, catalog: &ModelCatalog) -> Result<(), PipelineError> {
        let spec = self.spec();
        GraphValidator::new(&self.pipeline_name, &spec.node_infos, &spec.connections)
            .validate(catalog)
    }

    /// Blocks until the definition is `Available`, the timeout elapses,
    /// or the definition retires.
    ///
    /// On success the returned guard has already incremented the usage
    /// counter, atomically with the availability check. A timeout of 0
    /// degenerates to a single non-blocking check.
    pub fn wait_for_loaded(
        self: &Arc<Self>,
        timeout_us: u64,
    ) -> Result<DefinitionGuard, PipelineError> {
        let deadline = Instant::now() + Duration::from_micros(timeout_us);
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            match *state {
                LifecycleState::Available => {
                    self.usage.fetch_add(1, Ordering::AcqRel);
                    return Ok(DefinitionGuard::new(Arc::clone(self)));
                }
                LifecycleState::Retired => {
                    tracing::debug!(
                        "waiting for pipeline '{}' ended, it started unloading",
                        self.pipeline_name,
                    );
                    return Err(PipelineError::NotLoadedAnymore {
                        name: self.pipeline_name.clone(),
                    });
                }
                LifecycleState::Begin | LifecycleState::Loading => {
                    if Instant::now() >= deadline {
                        tracing::debug!(
                            "waiting for pipeline '{}' ended due to timeout",
                            self.pipeline_name,
                        );
                        return Err(PipelineError::NotLoadedYet {
                            name: self.pipeline_name.clone(),
                        });
                    }
                    let (guard, _timeout) = self
                        .state_changed
                        .wait_timeout(state, WAIT_LOADED_TIMESTEP)
                        .unwrap_or_else(PoisonError::into_inner);
                    state = guard;
                }
            }
        }
    }

    /// Subscribes to every distinct (model, version) referenced by a DL
    /// node. Missing models are logged and skipped — the validator will
    /// reject the definition anyway.
    pub fn make_subscriptions(self: &Arc<Self>, catalog: &ModelCatalog) {
        let as_subscriber: Arc<dyn ChangeSubscriber> = Arc::clone(self) as Arc<dyn ChangeSubscriber>;
        let spec = self.spec();
        let mut subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        for node in &spec.node_infos {
            if node.kind != NodeKind::Dl {
                continue;
            }
            let model_name = node.model_name_or_empty().to_string();
            let key = (model_name.clone(), node.version_or_zero());
            if subscriptions.contains(&key) {
                continue;
            }

            let Some(model) = catalog.find_model_by_name(&model_name) else {
                tracing::warn!(
                    "pipeline '{}' failed to subscribe to model '{}': it is missing",
                    self.pipeline_name,
                    model_name,
                );
                continue;
            };
            match node.model_version {
                Some(version) => {
                    let Some(instance) = model.instance_by_version(version) else {
                        tracing::warn!(
                            "pipeline '{}' failed to subscribe to model '{}' version {}: \
                             it is missing",
                            self.pipeline_name,
                            model_name,
                            version,
                        );
                        continue;
                    };
                    instance.subscribe(&as_subscriber);
                }
                None => model.subscribe(&as_subscriber),
            }
            subscriptions.insert(key);
        }
    }

    /// Symmetric teardown of every watch made by `make_subscriptions`.
    pub fn reset_subscriptions(&self, catalog: &ModelCatalog) {
        let mut subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for (model_name, version) in subscriptions.iter() {
            let Some(model) = catalog.find_model_by_name(model_name) else {
                continue;
            };
            if *version != 0 {
                if let Some(instance) = model.instance_by_version(*version) {
                    instance.unsubscribe(&self.pipeline_name);
                }
            } else {
                model.unsubscribe(&self.pipeline_name);
            }
        }
        subscriptions.clear();
    }

    /// The watched (model, version-or-zero) pairs, for inspection.
    pub fn subscription_keys(&self) -> Vec<(String, u64)> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    fn publish_state(&self, new_state: LifecycleState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = new_state;
        self.state_changed.notify_all();
    }

    // Spin until every outstanding guard is released. Callers have already
    // published a non-available state, so no new guard can be acquired.
    fn drain_users(&self) {
        while self.usage.load(Ordering::Acquire) > 0 {
            std::thread::sleep(Duration::from_micros(1));
        }
    }
}

impl ChangeSubscriber for PipelineDefinition {
    fn subscriber_name(&self) -> &str {
        &self.pipeline_name
    }

    /// Re-validates the definition after a watched model changed and
    /// republishes the resulting state. Safe to call repeatedly.
    fn on_model_changed(&self, catalog: &ModelCatalog, model: &str, version: u64) {
        // Taking the writer lock keeps revalidation from republishing
        // `Available` in the middle of a concurrent reload's drain.
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if self.state() == LifecycleState::Retired {
            return;
        }
        tracing::info!(
            "pipeline '{}' revalidating after change of model '{}' version {}",
            self.pipeline_name,
            model,
            version,
        );
        match self.validate(catalog) {
            Ok(()) => {
                self.publish_state(LifecycleState::Available);
                tracing::info!("pipeline '{}' is available", self.pipeline_name);
            }
            Err(e) => {
                self.publish_state(LifecycleState::Loading);
                tracing::warn!(
                    "pipeline '{}' failed revalidation: {e}",
                    self.pipeline_name,
                );
            }
        }
    }
}

impl std::fmt::Debug for PipelineDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineDefinition")
            .field("name", &self.pipeline_name)
            .field("state", &self.state())
            .field("usage", &self.usage_count())
            .finish()
    }
}
