// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the node labeler.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Retry Constants
// ============================================================================

/// Total time to keep retrying a failing kubectl invocation (3 minutes)
pub const DEFAULT_RETRY_TIMEOUT_SECS: u64 = 180;

/// Fixed pause between kubectl retries
pub const DEFAULT_RETRY_INTERVAL_SECS: u64 = 1;

// ============================================================================
// kubectl Constants
// ============================================================================

/// Preferred kubectl binary; falls back to a `PATH` lookup when absent
pub const DEFAULT_KUBECTL_PATH: &str = "/snap/bin/kubectl";

/// Executable name used for the `PATH` lookup
pub const KUBECTL_BINARY: &str = "kubectl";

/// Default kubeconfig handed to kubectl via `--kubeconfig`
pub const DEFAULT_KUBECONFIG_PATH: &str = "/root/.kube/config";

/// JSONPath expression selecting a node's label map
pub const NODE_LABELS_JSONPATH: &str = "{.metadata.labels}";

// ============================================================================
// State Constants
// ============================================================================

/// Default location of the persisted applied-label state
pub const DEFAULT_STATE_FILE: &str = "/var/lib/node-labeler/state.json";

// ============================================================================
// Environment Variables
// ============================================================================

/// Environment variable carrying the availability-zone hint
pub const AVAILABILITY_ZONE_ENV: &str = "JUJU_AVAILABILITY_ZONE";

/// Environment variable carrying the node name
pub const NODE_NAME_ENV: &str = "NODE_NAME";

/// File consulted for the node name when no name is configured
pub const HOSTNAME_FILE: &str = "/etc/hostname";

// ============================================================================
// Watch Loop Constants
// ============================================================================

/// Default interval between reconciliation passes in `watch` mode (5 minutes)
pub const DEFAULT_WATCH_INTERVAL_SECS: u64 = 300;
