// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! RAII unload guard for pipeline definitions.
//!
//! A guard is the reader's ticket into a definition: acquiring one checks
//! `state == Available` and increments the usage counter atomically;
//! dropping it decrements. Reload and retire publish a non-available
//! state first and then drain the counter to zero, so every reader that
//! got in completes against the snapshot it saw.

use crate::PipelineDefinition;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// A scoped usage-counter ticket on one pipeline definition.
pub struct DefinitionGuard {
    definition: Arc<PipelineDefinition>,
}

impl DefinitionGuard {
    /// Called by `PipelineDefinition::wait_for_loaded` once the counter
    /// has been incremented under the state lock.
    pub(crate) fn new(definition: Arc<PipelineDefinition>) -> Self {
        Self { definition }
    }

    /// The guarded definition.
    pub fn definition(&self) -> &Arc<PipelineDefinition> {
        &self.definition
    }
}

impl Drop for DefinitionGuard {
    fn drop(&mut self) {
        self.definition.usage_counter().fetch_sub(1, Ordering::AcqRel);
    }
}

impl std::fmt::Debug for DefinitionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefinitionGuard")
            .field("pipeline", &self.definition.name())
            .finish()
    }
}
