// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! RAII unload guard for model instances.
//!
//! Holding an [`InstanceGuard`] pins the instance in its current loaded
//! state: retirement drains the usage counter to zero before completing,
//! so metadata reads and executions never race an unload. The guard is
//! acquired through [`crate::ModelInstance::wait_for_loaded`] and released
//! by dropping it.

use crate::ModelInstance;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// A scoped usage-counter ticket on one model instance.
///
/// The counter is incremented atomically with the availability check at
/// acquisition; dropping the guard decrements it.
pub struct InstanceGuard {
    instance: Arc<ModelInstance>,
}

impl InstanceGuard {
    /// Called by `ModelInstance::wait_for_loaded` once the counter has
    /// been incremented under the state lock.
    pub(crate) fn new(instance: Arc<ModelInstance>) -> Self {
        Self { instance }
    }

    /// The guarded instance.
    pub fn instance(&self) -> &Arc<ModelInstance> {
        &self.instance
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        self.instance.usage_counter().fetch_sub(1, Ordering::AcqRel);
    }
}

impl std::fmt::Debug for InstanceGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceGuard")
            .field("model", &self.instance.name())
            .field("version", &self.instance.version())
            .finish()
    }
}
