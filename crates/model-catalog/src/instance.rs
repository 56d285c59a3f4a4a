// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! A loaded model version: metadata, configuration, and lifecycle.
//!
//! Tensor metadata and configuration are immutable for the lifetime of an
//! instance — a model change is modelled as a new instance. The only
//! mutable state is the lifecycle:
//!
//! ```text
//! Loading ──► Available ──► Retired
//! ```
//!
//! Readers pin an `Available` instance with an [`InstanceGuard`];
//! retirement publishes `Retired` first (rejecting new guards) and then
//! drains the usage counter before completing.

use crate::{CatalogError, ChangeSubscriber, InstanceGuard, ModelConfig, SubscriberSet};
use indexmap::IndexMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tensor_meta::TensorInfo;

/// Granularity of the timed wait inside `wait_for_loaded`.
const WAIT_LOADED_TIMESTEP: Duration = Duration::from_micros(10);

/// Lifecycle state of one model instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InstanceState {
    /// Weights are being loaded; not yet usable.
    Loading,
    /// Fully loaded; guards may be acquired.
    Available,
    /// Unloaded; guards are rejected permanently.
    Retired,
}

/// One (model name, version) loaded into the catalog.
pub struct ModelInstance {
    name: String,
    version: u64,
    inputs: IndexMap<String, TensorInfo>,
    outputs: IndexMap<String, TensorInfo>,
    config: ModelConfig,
    state: Mutex<InstanceState>,
    state_changed: Condvar,
    usage: AtomicUsize,
    subscribers: Mutex<SubscriberSet>,
}

impl ModelInstance {
    /// Creates an instance in the `Loading` state.
    pub fn loading(
        name: impl Into<String>,
        version: u64,
        inputs: IndexMap<String, TensorInfo>,
        outputs: IndexMap<String, TensorInfo>,
        config: ModelConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            version,
            inputs,
            outputs,
            config,
            state: Mutex::new(InstanceState::Loading),
            state_changed: Condvar::new(),
            usage: AtomicUsize::new(0),
            subscribers: Mutex::new(SubscriberSet::new()),
        })
    }

    /// Creates an instance that is immediately `Available`.
    pub fn available(
        name: impl Into<String>,
        version: u64,
        inputs: IndexMap<String, TensorInfo>,
        outputs: IndexMap<String, TensorInfo>,
        config: ModelConfig,
    ) -> Arc<Self> {
        let instance = Self::loading(name, version, inputs, outputs, config);
        instance.make_available();
        instance
    }

    /// Model name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Model version.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Input tensor metadata, keyed by tensor name.
    pub fn inputs_info(&self) -> &IndexMap<String, TensorInfo> {
        &self.inputs
    }

    /// Output tensor metadata, keyed by tensor name.
    pub fn outputs_info(&self) -> &IndexMap<String, TensorInfo> {
        &self.outputs
    }

    /// Batching/shape parameter configuration.
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> InstanceState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of outstanding guards.
    pub fn usage_count(&self) -> usize {
        self.usage.load(Ordering::Acquire)
    }

    pub(crate) fn usage_counter(&self) -> &AtomicUsize {
        &self.usage
    }

    /// Publishes the `Available` state and wakes waiting acquirers.
    pub fn make_available(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = InstanceState::Available;
        tracing::info!(
            "model '{}' version {} is now available",
            self.name,
            self.version,
        );
        self.state_changed.notify_all();
    }

    /// Retires the instance: rejects new guards, then drains outstanding
    /// ones before returning.
    pub fn retire(&self) {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            *state = InstanceState::Retired;
            self.state_changed.notify_all();
        }
        while self.usage.load(Ordering::Acquire) > 0 {
            std::thread::sleep(Duration::from_micros(1));
        }
        tracing::info!("model '{}' version {} retired", self.name, self.version);
    }

    /// Blocks until the instance is `Available`, the timeout elapses, or
    /// the instance retires.
    ///
    /// On success the returned [`InstanceGuard`] has already incremented
    /// the usage counter, atomically with the availability check. A
    /// timeout of 0 degenerates to a single non-blocking check.
    pub fn wait_for_loaded(
        self: &Arc<Self>,
        timeout_us: u64,
    ) -> Result<InstanceGuard, CatalogError> {
        let deadline = Instant::now() + Duration::from_micros(timeout_us);
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            match *state {
                InstanceState::Available => {
                    self.usage.fetch_add(1, Ordering::AcqRel);
                    return Ok(InstanceGuard::new(Arc::clone(self)));
                }
                InstanceState::Retired => {
                    return Err(CatalogError::NotLoadedAnymore {
                        model: self.name.clone(),
                        version: self.version,
                    });
                }
                InstanceState::Loading => {
                    if Instant::now() >= deadline {
                        return Err(CatalogError::NotLoadedYet {
                            model: self.name.clone(),
                            version: self.version,
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

    /// Registers a subscriber for changes to this specific instance.
    pub fn subscribe(&self, subscriber: &Arc<dyn ChangeSubscriber>) {
        tracing::info!(
            "subscribing '{}' to model '{}' version {}",
            subscriber.subscriber_name(),
            self.name,
            self.version,
        );
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .subscribe(subscriber);
    }

    /// Removes a subscriber by name.
    pub fn unsubscribe(&self, subscriber_name: &str) {
        tracing::info!(
            "unsubscribing '{}' from model '{}' version {}",
            subscriber_name,
            self.name,
            self.version,
        );
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .unsubscribe(subscriber_name);
    }

    /// Returns `true` if the named subscriber is registered here.
    pub fn has_subscriber(&self, subscriber_name: &str) -> bool {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(subscriber_name)
    }

    pub(crate) fn live_subscribers(&self) -> Vec<Arc<dyn ChangeSubscriber>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .collect_live()
    }
}

impl std::fmt::Debug for ModelInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelInstance")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("state", &self.state())
            .field("usage", &self.usage_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensor_meta::{Precision, Shape};

    fn tensors(names: &[&str]) -> IndexMap<String, TensorInfo> {
        names
            .iter()
            .map(|n| {
                (
                    n.to_string(),
                    TensorInfo::new(Shape::new(vec![1, 10]), Precision::F32),
                )
            })
            .collect()
    }

    fn sample() -> Arc<ModelInstance> {
        ModelInstance::available(
            "resnet",
            1,
            tensors(&["in"]),
            tensors(&["out"]),
            ModelConfig::fixed(),
        )
    }

    #[test]
    fn test_available_guard() {
        let instance = sample();
        let guard = instance.wait_for_loaded(0).unwrap();
        assert_eq!(instance.usage_count(), 1);
        assert_eq!(guard.instance().name(), "resnet");
        drop(guard);
        assert_eq!(instance.usage_count(), 0);
    }

    #[test]
    fn test_loading_times_out() {
        let instance = ModelInstance::loading(
            "slow",
            1,
            tensors(&["in"]),
            tensors(&["out"]),
            ModelConfig::fixed(),
        );
        let err = instance.wait_for_loaded(100).unwrap_err();
        assert_eq!(
            err,
            CatalogError::NotLoadedYet {
                model: "slow".into(),
                version: 1,
            },
        );
        assert_eq!(instance.usage_count(), 0);
    }

    #[test]
    fn test_retired_rejected() {
        let instance = sample();
        instance.retire();
        let err = instance.wait_for_loaded(100).unwrap_err();
        assert_eq!(
            err,
            CatalogError::NotLoadedAnymore {
                model: "resnet".into(),
                version: 1,
            },
        );
    }

    #[test]
    fn test_wait_observes_late_availability() {
        let instance = ModelInstance::loading(
            "late",
            3,
            tensors(&["in"]),
            tensors(&["out"]),
            ModelConfig::fixed(),
        );
        let waiter = {
            let instance = Arc::clone(&instance);
            std::thread::spawn(move || instance.wait_for_loaded(1_000_000))
        };
        std::thread::sleep(Duration::from_millis(5));
        instance.make_available();
        let guard = waiter.join().unwrap().unwrap();
        assert_eq!(guard.instance().version(), 3);
    }

    #[test]
    fn test_retire_drains_guards() {
        let instance = sample();
        let guard = instance.wait_for_loaded(0).unwrap();

        let retirer = {
            let instance = Arc::clone(&instance);
            std::thread::spawn(move || instance.retire())
        };
        std::thread::sleep(Duration::from_millis(5));
        assert!(!retirer.is_finished());

        drop(guard);
        retirer.join().unwrap();
        assert_eq!(instance.state(), InstanceState::Retired);
    }

    #[test]
    fn test_guard_balance_across_threads() {
        let instance = sample();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let instance = Arc::clone(&instance);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        let guard = instance.wait_for_loaded(1000).unwrap();
                        drop(guard);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(instance.usage_count(), 0);
    }
}
