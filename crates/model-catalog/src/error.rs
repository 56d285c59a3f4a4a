// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for catalog lookups and instance waits.

/// Errors produced by the model catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    /// No model is registered under the requested name.
    #[error("model '{model}' is not registered")]
    ModelMissing { model: String },

    /// The model exists but the requested version does not.
    #[error("model '{model}' has no version {version}")]
    VersionMissing { model: String, version: u64 },

    /// `wait_for_loaded` timed out before the instance became available.
    #[error("model '{model}' version {version} is not loaded yet")]
    NotLoadedYet { model: String, version: u64 },

    /// The instance was retired while (or before) being waited on.
    #[error("model '{model}' version {version} is not loaded anymore")]
    NotLoadedAnymore { model: String, version: u64 },

    /// The catalog manifest could not be parsed or is inconsistent.
    #[error("invalid catalog manifest: {detail}")]
    InvalidManifest { detail: String },
}
