// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Execution context for a reconciliation pass.
//!
//! The context supplies everything the reconciler derives labels from rather
//! than reading from the user's label configuration:
//! - The node's name as known to the cluster
//! - Application and charm identity
//! - The cloud the node runs on, if any
//! - An optional availability-zone hint from the environment

use crate::config::ReconcilerSettings;
use crate::constants::{AVAILABILITY_ZONE_ENV, HOSTNAME_FILE};
use anyhow::{bail, Context as _, Result};
use std::path::Path;

/// Identity and environment facts for the node being labeled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeContext {
    /// Node name, resolvable on the target cluster
    pub node_name: String,

    /// Value for the `juju-application` label
    pub application: String,

    /// Value for the `juju-charm` label
    pub charm: String,

    /// Cloud identity (e.g. `aws`), or `None` when not on a known cloud
    pub cloud: Option<String>,

    /// Availability-zone hint for the `topology.kubernetes.io/zone` label
    pub availability_zone: Option<String>,
}

impl NodeContext {
    /// Creates a context whose charm identity equals its application name.
    pub fn new(node_name: impl Into<String>, application: impl Into<String>) -> Self {
        let application = application.into();
        Self {
            node_name: node_name.into(),
            charm: application.clone(),
            application,
            cloud: None,
            availability_zone: None,
        }
    }

    #[must_use]
    pub fn with_charm(mut self, charm: impl Into<String>) -> Self {
        self.charm = charm.into();
        self
    }

    #[must_use]
    pub fn with_cloud(mut self, cloud: Option<String>) -> Self {
        self.cloud = cloud;
        self
    }

    #[must_use]
    pub fn with_availability_zone(mut self, zone: Option<String>) -> Self {
        self.availability_zone = zone.filter(|zone| !zone.is_empty());
        self
    }

    /// Builds the context from settings plus the process environment.
    ///
    /// The node name falls back to the host name, and the availability zone
    /// is read from `JUJU_AVAILABILITY_ZONE`.
    ///
    /// # Errors
    ///
    /// Returns an error if no application name is configured, or if no node
    /// name is configured and the host name cannot be read.
    pub fn from_settings(settings: &ReconcilerSettings) -> Result<Self> {
        let Some(application) = settings.application.clone() else {
            bail!("An application name is required to derive the juju-application label");
        };

        let node_name = resolve_node_name(settings)?;

        let charm = settings
            .charm
            .clone()
            .unwrap_or_else(|| application.clone());

        Ok(Self::new(node_name, application)
            .with_charm(charm)
            .with_cloud(settings.cloud.clone())
            .with_availability_zone(availability_zone_from_env()))
    }
}

/// The configured node name, or the host name when none is configured.
///
/// # Errors
///
/// Returns an error if no node name is configured and the host name cannot
/// be read.
pub fn resolve_node_name(settings: &ReconcilerSettings) -> Result<String> {
    match &settings.node_name {
        Some(name) => Ok(name.clone()),
        None => read_hostname(Path::new(HOSTNAME_FILE)),
    }
}

/// Reads the availability-zone hint from the environment.
///
/// An unset or empty variable yields `None`.
#[must_use]
pub fn availability_zone_from_env() -> Option<String> {
    std::env::var(AVAILABILITY_ZONE_ENV)
        .ok()
        .filter(|zone| !zone.trim().is_empty())
}

/// Reads a host name file and normalizes it into a node name.
///
/// Kubernetes registers nodes under the lowercase host name.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is empty.
pub fn read_hostname(path: &Path) -> Result<String> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read host name from {}", path.display()))?;
    let hostname = raw.trim().to_lowercase();
    if hostname.is_empty() {
        bail!("Host name file {} is empty", path.display());
    }
    Ok(hostname)
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
