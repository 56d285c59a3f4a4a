// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The catalog proper: name → model → versioned instances.
//!
//! Version 0 is the "default version" sentinel throughout the serving
//! surface; it resolves to the highest registered version. State changes
//! flowing through the catalog ([`ModelCatalog::make_available`],
//! [`ModelCatalog::retire_instance`]) notify the union of instance-level
//! and model-level subscribers after the change is published.

use crate::{CatalogError, ChangeSubscriber, InstanceGuard, ModelInstance, SubscriberSet};
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Default wait budget for guard acquisition during validation and
/// metadata queries, in microseconds.
pub const DEFAULT_INSTANCE_WAIT_US: u64 = 0;

/// All registered versions of one model name.
pub struct Model {
    name: String,
    instances: RwLock<BTreeMap<u64, Arc<ModelInstance>>>,
    // Subscribers that track the default version rather than a pinned one.
    subscribers: Mutex<SubscriberSet>,
}

impl Model {
    fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            instances: RwLock::new(BTreeMap::new()),
            subscribers: Mutex::new(SubscriberSet::new()),
        })
    }

    /// Model name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Looks up a specific version.
    pub fn instance_by_version(&self, version: u64) -> Option<Arc<ModelInstance>> {
        self.instances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&version)
            .cloned()
    }

    /// The default instance: the highest registered version.
    pub fn default_instance(&self) -> Option<Arc<ModelInstance>> {
        self.instances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .next_back()
            .cloned()
    }

    /// Registered version numbers in ascending order.
    pub fn versions(&self) -> Vec<u64> {
        self.instances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }

    /// Registers a subscriber for the default version of this model.
    pub fn subscribe(&self, subscriber: &Arc<dyn ChangeSubscriber>) {
        tracing::info!(
            "subscribing '{}' to model '{}' (default version)",
            subscriber.subscriber_name(),
            self.name,
        );
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .subscribe(subscriber);
    }

    /// Removes a default-version subscriber by name.
    pub fn unsubscribe(&self, subscriber_name: &str) {
        tracing::info!(
            "unsubscribing '{}' from model '{}' (default version)",
            subscriber_name,
            self.name,
        );
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .unsubscribe(subscriber_name);
    }

    /// Returns `true` if the named subscriber tracks this model's default
    /// version.
    pub fn has_subscriber(&self, subscriber_name: &str) -> bool {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(subscriber_name)
    }

    fn add_instance(&self, instance: Arc<ModelInstance>) {
        self.instances
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(instance.version(), instance);
    }

    fn live_subscribers(&self) -> Vec<Arc<dyn ChangeSubscriber>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .collect_live()
    }
}

/// The registry of all loaded models, shared across serving threads.
#[derive(Default)]
pub struct ModelCatalog {
    models: RwLock<IndexMap<String, Arc<Model>>>,
}

impl ModelCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a model by name.
    pub fn find_model_by_name(&self, name: &str) -> Option<Arc<Model>> {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Resolves (name, version) to an instance. `version == 0` selects the
    /// default (highest) version.
    pub fn find_model_instance(
        &self,
        name: &str,
        version: u64,
    ) -> Option<Arc<ModelInstance>> {
        let model = self.find_model_by_name(name)?;
        if version == 0 {
            model.default_instance()
        } else {
            model.instance_by_version(version)
        }
    }

    /// Resolves an instance and pins it with an unload guard.
    ///
    /// This is the lookup every validation and metadata path goes through:
    /// the guard stays held for the duration of the caller's check so the
    /// instance cannot retire mid-use.
    pub fn instance_with_guard(
        &self,
        name: &str,
        version: u64,
    ) -> Result<(Arc<ModelInstance>, InstanceGuard), CatalogError> {
        let instance = self.find_model_instance(name, version).ok_or_else(|| {
            if version == 0 || self.find_model_by_name(name).is_none() {
                CatalogError::ModelMissing { model: name.into() }
            } else {
                CatalogError::VersionMissing {
                    model: name.into(),
                    version,
                }
            }
        })?;
        let guard = instance.wait_for_loaded(DEFAULT_INSTANCE_WAIT_US)?;
        Ok((instance, guard))
    }

    /// Registers an instance, creating the model entry if needed, and
    /// notifies subscribers of the affected model.
    pub fn insert_instance(&self, instance: Arc<ModelInstance>) {
        let model = {
            let mut models = self.models.write().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(
                models
                    .entry(instance.name().to_string())
                    .or_insert_with(|| Model::new(instance.name())),
            )
        };
        let (name, version) = (instance.name().to_string(), instance.version());
        model.add_instance(instance);
        self.notify(&name, version);
    }

    /// Publishes an instance as available and notifies subscribers.
    pub fn make_available(&self, name: &str, version: u64) -> Result<(), CatalogError> {
        let instance = self.find_model_instance(name, version).ok_or_else(|| {
            CatalogError::VersionMissing {
                model: name.into(),
                version,
            }
        })?;
        instance.make_available();
        self.notify(name, instance.version());
        Ok(())
    }

    /// Retires an instance (draining its guards) and notifies subscribers.
    pub fn retire_instance(&self, name: &str, version: u64) -> Result<(), CatalogError> {
        let instance = self.find_model_instance(name, version).ok_or_else(|| {
            CatalogError::VersionMissing {
                model: name.into(),
                version,
            }
        })?;
        instance.retire();
        self.notify(name, instance.version());
        Ok(())
    }

    /// Names of all registered models, in registration order.
    pub fn model_names(&self) -> Vec<String> {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    // Fan out a change notification to instance-level and model-level
    // subscribers. Locks are released before any callback runs.
    fn notify(&self, name: &str, version: u64) {
        let mut targets: Vec<Arc<dyn ChangeSubscriber>> = Vec::new();
        if let Some(model) = self.find_model_by_name(name) {
            if let Some(instance) = model.instance_by_version(version) {
                targets.extend(instance.live_subscribers());
            }
            for sub in model.live_subscribers() {
                if !targets
                    .iter()
                    .any(|t| t.subscriber_name() == sub.subscriber_name())
                {
                    targets.push(sub);
                }
            }
        }
        for sub in targets {
            tracing::debug!(
                "notifying '{}' about model '{}' version {}",
                sub.subscriber_name(),
                name,
                version,
            );
            sub.on_model_changed(self, name, version);
        }
    }
}

impl std::fmt::Debug for ModelCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelCatalog")
            .field("models", &self.model_names())
            .finish()
    }
}
