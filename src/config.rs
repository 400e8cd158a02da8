// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Label configuration parsing and reconciler settings.
//!
//! Users describe the labels they want on a node as a single
//! whitespace-separated string of `key=value` tokens:
//!
//! ```text
//! node-role.kubernetes.io/control-plane= disktype=ssd gpu-
//! ```
//!
//! A token whose value ends with `-` (or a bare `key-` token) asks for the
//! label to be removed instead of set. Tokens that fit neither shape are
//! malformed: they are skipped with a warning, or rejected outright in strict
//! mode.
//!
//! # Example
//!
//! ```rust
//! use node_labeler::config::{parse_labels, DesiredLabel};
//!
//! let desired = parse_labels("disktype=ssd gpu-", false).unwrap();
//! assert_eq!(desired.get("disktype"), Some(&DesiredLabel::Set("ssd".to_string())));
//! assert_eq!(desired.get("gpu"), Some(&DesiredLabel::Remove));
//! ```

use crate::constants::{
    DEFAULT_KUBECONFIG_PATH, DEFAULT_KUBECTL_PATH, DEFAULT_RETRY_INTERVAL_SECS,
    DEFAULT_RETRY_TIMEOUT_SECS, DEFAULT_STATE_FILE,
};
use crate::label_errors::ConfigurationError;
use crate::labels::{KEY_VALUE_SEPARATOR, REMOVAL_SUFFIX};
use crate::reconcilers::retry::RetryPolicy;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// What the configuration asks for a single label key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DesiredLabel {
    /// Set the label to this value, overwriting any existing value
    Set(String),
    /// Remove the label from the node
    Remove,
}

/// The labels requested by configuration, keyed by label name.
///
/// Later tokens for the same key win. Iteration is in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredLabels {
    entries: BTreeMap<String, DesiredLabel>,
}

impl DesiredLabels {
    /// Creates an empty label set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `entry` for `key`, replacing any earlier entry.
    pub fn insert(&mut self, key: impl Into<String>, entry: DesiredLabel) {
        self.entries.insert(key.into(), entry);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&DesiredLabel> {
        self.entries.get(key)
    }

    /// Returns `true` if `key` is requested to be set (not removed).
    #[must_use]
    pub fn wants_set(&self, key: &str) -> bool {
        matches!(self.entries.get(key), Some(DesiredLabel::Set(_)))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, DesiredLabel> {
        self.entries.iter()
    }

    /// Only the labels to be set, as a plain key/value map.
    #[must_use]
    pub fn set_labels(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .filter_map(|(key, entry)| match entry {
                DesiredLabel::Set(value) => Some((key.clone(), value.clone())),
                DesiredLabel::Remove => None,
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a DesiredLabels {
    type Item = (&'a String, &'a DesiredLabel);
    type IntoIter = btree_map::Iter<'a, String, DesiredLabel>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Parses a single configuration token.
///
/// Returns `None` for malformed tokens: no `=` and no trailing `-`, or more
/// than one `=`. A token with exactly one `=` always parses, even with an
/// empty key; kubectl is left to reject such a label.
#[must_use]
pub fn parse_label_token(token: &str) -> Option<(String, DesiredLabel)> {
    let mut parts = token.split(KEY_VALUE_SEPARATOR);
    let key = parts.next()?;
    let value = parts.next();
    if parts.next().is_some() {
        return None;
    }

    match value {
        Some(value) if value.ends_with(REMOVAL_SUFFIX) => {
            Some((key.to_string(), DesiredLabel::Remove))
        }
        Some(value) => Some((key.to_string(), DesiredLabel::Set(value.to_string()))),
        None => key
            .strip_suffix(REMOVAL_SUFFIX)
            .filter(|key| !key.is_empty())
            .map(|key| (key.to_string(), DesiredLabel::Remove)),
    }
}

/// Parses the whitespace-separated label configuration string.
///
/// # Arguments
///
/// * `text` - The raw configuration value
/// * `strict` - Reject the first malformed token instead of skipping it
///
/// # Errors
///
/// Returns [`ConfigurationError::MalformedLabel`] in strict mode when a token
/// cannot be parsed.
pub fn parse_labels(text: &str, strict: bool) -> Result<DesiredLabels, ConfigurationError> {
    let mut desired = DesiredLabels::new();

    for token in text.split_whitespace() {
        match parse_label_token(token) {
            Some((key, entry)) => {
                debug!(label = %key, entry = ?entry, "Parsed label token");
                desired.insert(key, entry);
            }
            None if strict => {
                return Err(ConfigurationError::MalformedLabel {
                    token: token.to_string(),
                });
            }
            None => warn!("Skipping malformed label: {token}."),
        }
    }

    Ok(desired)
}

/// Reconciler settings, loaded from an optional YAML file.
///
/// Every field has a default so a partial file is valid; the binary layers
/// command-line flags on top.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ReconcilerSettings {
    /// Whitespace-separated `key=value` label tokens
    pub labels: String,
    /// Kubeconfig passed to kubectl
    pub kubeconfig: PathBuf,
    /// Preferred kubectl binary
    pub kubectl_path: PathBuf,
    /// Where the applied-label state is persisted
    pub state_file: PathBuf,
    /// Treat malformed label tokens as fatal
    pub strict: bool,
    /// Total retry deadline for each kubectl invocation
    pub timeout_secs: u64,
    /// Pause between kubectl retries
    pub retry_interval_secs: u64,
    /// Node to label; defaults to the host name
    pub node_name: Option<String>,
    /// Application identity for the `juju-application` label
    pub application: Option<String>,
    /// Charm identity for the `juju-charm` label; defaults to `application`
    pub charm: Option<String>,
    /// Cloud the node runs on (e.g. `aws`, `gcp`)
    pub cloud: Option<String>,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            labels: String::new(),
            kubeconfig: PathBuf::from(DEFAULT_KUBECONFIG_PATH),
            kubectl_path: PathBuf::from(DEFAULT_KUBECTL_PATH),
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
            strict: false,
            timeout_secs: DEFAULT_RETRY_TIMEOUT_SECS,
            retry_interval_secs: DEFAULT_RETRY_INTERVAL_SECS,
            node_name: None,
            application: None,
            charm: None,
            cloud: None,
        }
    }
}

impl ReconcilerSettings {
    /// Loads settings from a YAML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid YAML for this schema or
    /// fails [`ReconcilerSettings::validate`].
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let settings: Self =
            serde_yaml::from_str(yaml).context("Failed to parse reconciler settings")?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        Self::from_yaml(&yaml).with_context(|| format!("Invalid settings in {}", path.display()))
    }

    /// Rejects settings that would make the reconciler misbehave.
    ///
    /// # Errors
    ///
    /// Returns an error if `retry-interval-secs` is zero, which would spin
    /// kubectl back to back until the deadline.
    pub fn validate(&self) -> Result<()> {
        if self.retry_interval_secs == 0 {
            bail!("retry-interval-secs must be at least 1");
        }
        Ok(())
    }

    /// Parses the configured label string, honouring `strict`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] in strict mode for malformed tokens.
    pub fn desired_labels(&self) -> Result<DesiredLabels, ConfigurationError> {
        parse_labels(&self.labels, self.strict)
    }

    /// The retry policy shared by every kubectl invocation.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_secs(self.timeout_secs),
            Duration::from_secs(self.retry_interval_secs),
        )
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
