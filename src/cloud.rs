// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cloud provider resolution for the `juju.io/cloud` label.
//!
//! The provider table is ordered and the first entry matching the node's
//! cloud identity wins. When nothing matches, the label must be removed so a
//! stale value does not survive a migration or a torn-down cloud integration.

/// Ordered `(cloud identity, label value)` pairs. First match wins.
pub const CLOUD_LABELS: [(&str, &str); 5] = [
    ("aws", "ec2"),
    ("gcp", "gce"),
    ("openstack", "openstack"),
    ("vsphere", "vsphere"),
    ("azure", "azure"),
];

/// What to do with the cloud label on this pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudLabel {
    /// Set the cloud label to this value
    Set(&'static str),
    /// No provider matched; remove the cloud label
    Remove,
}

/// Resolves the cloud label for a cloud identity.
///
/// `None`, or an identity not listed in [`CLOUD_LABELS`], resolves to
/// [`CloudLabel::Remove`].
#[must_use]
pub fn resolve_cloud_label(cloud: Option<&str>) -> CloudLabel {
    let Some(cloud) = cloud else {
        return CloudLabel::Remove;
    };

    CLOUD_LABELS
        .iter()
        .find(|(identity, _)| *identity == cloud)
        .map_or(CloudLabel::Remove, |(_, label)| CloudLabel::Set(*label))
}
