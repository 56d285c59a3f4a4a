// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Change-notification plumbing between the catalog and its subscribers.
//!
//! A subscriber (in practice a pipeline definition) registers on a model
//! or on a specific instance. The relationship is weak in both directions:
//! the set stores `Weak` references and the subscriber only remembers
//! which (model, version) pairs it watches. Dead entries are pruned on
//! the next notification pass.

use crate::ModelCatalog;
use std::sync::{Arc, Weak};

/// Implemented by anything that wants to hear about model changes.
///
/// `on_model_changed` receives the catalog so the subscriber can re-check
/// its own consistency (the revalidation policy lives with the caller;
/// implementations must tolerate repeated calls).
pub trait ChangeSubscriber: Send + Sync {
    /// Stable identity used for deduplication and unsubscription.
    fn subscriber_name(&self) -> &str;

    /// Invoked after a model instance changed state.
    fn on_model_changed(&self, catalog: &ModelCatalog, model: &str, version: u64);
}

/// A deduplicated set of weak subscriber references.
#[derive(Default)]
pub struct SubscriberSet {
    entries: Vec<(String, Weak<dyn ChangeSubscriber>)>,
}

impl SubscriberSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a subscriber unless one with the same name is already present.
    pub fn subscribe(&mut self, subscriber: &Arc<dyn ChangeSubscriber>) {
        let name = subscriber.subscriber_name();
        if self.entries.iter().any(|(n, _)| n == name) {
            return;
        }
        self.entries
            .push((name.to_string(), Arc::downgrade(subscriber)));
    }

    /// Removes the subscriber with the given name, if present.
    pub fn unsubscribe(&mut self, name: &str) {
        self.entries.retain(|(n, _)| n != name);
    }

    /// Returns the live subscribers, pruning entries whose target is gone.
    pub fn collect_live(&mut self) -> Vec<Arc<dyn ChangeSubscriber>> {
        let mut live = Vec::with_capacity(self.entries.len());
        self.entries.retain(|(_, weak)| match weak.upgrade() {
            Some(sub) => {
                live.push(sub);
                true
            }
            None => false,
        });
        live
    }

    /// Number of entries, including not-yet-pruned dead ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when the set holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if a subscriber with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }
}
