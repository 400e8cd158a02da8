// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for node label reconciliation.
//!
//! This module provides specialized error types for:
//! - Malformed label configuration (strict mode only)
//! - kubectl invocations that kept failing until the retry deadline
//! - A missing kubectl binary
//! - Failures persisting the applied-label state
//!
//! Failed reads of the node's live labels are deliberately absent here: they
//! are reported as `None` by the client, never as an error.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while parsing the user's label configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// A token was neither `key=value` nor a `key-` removal request.
    ///
    /// Only raised in strict mode; otherwise the token is logged and skipped.
    #[error("Malformed label: {token}")]
    MalformedLabel {
        /// The offending configuration token
        token: String,
    },
}

/// Errors raised while reading or writing the applied-label state.
#[derive(Error, Debug)]
pub enum StateError {
    /// The state file could not be read or written
    #[error("Failed to access label state at {path}: {source}")]
    Io {
        /// Path of the state file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The state file exists but does not hold a valid state document
    #[error("Invalid label state at {path}: {source}")]
    Corrupt {
        /// Path of the state file
        path: PathBuf,
        /// Underlying decode error
        #[source]
        source: serde_json::Error,
    },
}

/// Errors that abort a reconciliation pass.
#[derive(Error, Debug)]
pub enum LabelError {
    /// A kubectl label operation kept failing until the retry deadline passed.
    ///
    /// The message is the operation's retry message, e.g.
    /// `Failed to apply label foo=bar. Will retry.`
    #[error("{message}")]
    NodeLabel {
        /// Human-readable retry message of the failed operation
        message: String,
    },

    /// Neither the configured kubectl binary nor one on `PATH` exists
    #[error("kubectl not found at {configured} or on PATH")]
    KubectlNotFound {
        /// The configured kubectl path that was tried first
        configured: PathBuf,
    },

    /// The label configuration is malformed (strict mode)
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The applied-label state could not be persisted
    #[error(transparent)]
    State(#[from] StateError),
}

impl LabelError {
    /// Builds a [`LabelError::NodeLabel`] from an operation's retry message.
    pub fn node_label(message: impl Into<String>) -> Self {
        Self::NodeLabel {
            message: message.into(),
        }
    }

    /// Returns `true` if retrying the same pass later could succeed.
    ///
    /// Retry exhaustion is transient by nature; a missing binary or bad
    /// configuration needs operator action.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NodeLabel { .. } | Self::State(_))
    }
}

#[cfg(test)]
#[path = "label_errors_tests.rs"]
mod label_errors_tests;
