// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Label keys owned by the reconciler.
//!
//! These keys are derived from the execution context rather than from the
//! user's label configuration. They are re-applied on every reconciliation
//! pass and are never recorded in the applied-label state.

// ============================================================================
// Kubernetes Standard Labels
// https://kubernetes.io/docs/reference/labels-annotations-taints/
// ============================================================================

/// Well-known topology label carrying the node's availability zone
pub const TOPOLOGY_ZONE_LABEL: &str = "topology.kubernetes.io/zone";

// ============================================================================
// Workload Identity Labels
// ============================================================================

/// Label carrying the name of the application that manages this node
pub const APPLICATION_LABEL: &str = "juju-application";

/// Label carrying the name of the charm (workload) deployed on this node
pub const CHARM_LABEL: &str = "juju-charm";

/// Label carrying the cloud provider the node runs on (e.g. `ec2`, `gce`)
pub const CLOUD_LABEL: &str = "juju.io/cloud";

// ============================================================================
// Label Syntax
// ============================================================================

/// Separator between a label key and its value in configuration tokens
pub const KEY_VALUE_SEPARATOR: char = '=';

/// Trailing marker requesting that a label be removed (`key-`)
pub const REMOVAL_SUFFIX: char = '-';

/// All derived label keys, in the order a reconciliation pass applies them.
pub const DERIVED_LABELS: [&str; 4] = [
    TOPOLOGY_ZONE_LABEL,
    APPLICATION_LABEL,
    CHARM_LABEL,
    CLOUD_LABEL,
];

/// Returns `true` when `key` is owned by the reconciler rather than the user.
#[must_use]
pub fn is_derived_label(key: &str) -> bool {
    DERIVED_LABELS.contains(&key)
}
