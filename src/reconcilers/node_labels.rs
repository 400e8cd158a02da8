// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Node label reconciliation.
//!
//! A reconciliation pass converges a node's labels with configuration:
//!
//! 1. Remove every previously applied label the configuration no longer sets
//! 2. Apply configured labels, honouring `key-` removal requests
//! 3. Set the topology zone label from the availability-zone hint, unless the
//!    node already carries one
//! 4. Set the application and charm identity labels
//! 5. Set the cloud label from the provider table, or remove it
//!
//! The applied-label state is updated and persisted after every successful
//! operation. The first operation that exhausts its retries aborts the pass;
//! everything applied before it stays applied and recorded.

use crate::cloud::{resolve_cloud_label, CloudLabel};
use crate::config::{DesiredLabel, DesiredLabels};
use crate::context::NodeContext;
use crate::kubectl::{CommandRunner, KubectlLabelClient, ProcessRunner};
use crate::label_errors::LabelError;
use crate::labels::{
    is_derived_label, APPLICATION_LABEL, CHARM_LABEL, CLOUD_LABEL, TOPOLOGY_ZONE_LABEL,
};
use crate::metrics::{
    record_applied_labels, record_reconciliation_error, record_reconciliation_success,
};
use crate::state::{AppliedLabels, StateStore};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// What a reconciliation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Labels removed from the node, in the order they were removed
    pub removed: Vec<String>,
    /// User labels set on the node, in the order they were set
    pub applied: Vec<String>,
    /// Zone label value set this pass, if any
    pub zone: Option<String>,
    /// Cloud label outcome; `None` only if the pass aborted before step 5
    pub cloud: Option<CloudLabel>,
}

/// Applies labels to a Kubernetes node and records what it applied.
pub struct LabelMaker<S: StateStore, R: CommandRunner = ProcessRunner> {
    client: KubectlLabelClient<R>,
    store: S,
}

impl<S: StateStore, R: CommandRunner> LabelMaker<S, R> {
    pub fn new(client: KubectlLabelClient<R>, store: S) -> Self {
        Self { client, store }
    }

    #[must_use]
    pub fn client(&self) -> &KubectlLabelClient<R> {
        &self.client
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads the applied-label state and runs one reconciliation pass.
    ///
    /// Records pass metrics and returns the applied state alongside the
    /// summary.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::State`] if the state cannot be loaded, or any
    /// error from [`LabelMaker::reconcile`].
    pub async fn apply_node_labels(
        &self,
        desired: &DesiredLabels,
        context: &NodeContext,
    ) -> Result<(ReconcileSummary, AppliedLabels), LabelError> {
        let start = Instant::now();
        let mut applied = self.store.load()?;

        let result = self.reconcile(desired, &mut applied, context).await;
        record_applied_labels(applied.len());

        match result {
            Ok(summary) => {
                record_reconciliation_success(start.elapsed());
                info!(
                    node = %context.node_name,
                    removed = summary.removed.len(),
                    applied = summary.applied.len(),
                    elapsed = ?start.elapsed(),
                    "Node labels reconciled"
                );
                Ok((summary, applied))
            }
            Err(e) => {
                record_reconciliation_error(start.elapsed());
                error!(node = %context.node_name, error = %e, "Node label reconciliation failed");
                Err(e)
            }
        }
    }

    /// Runs one reconciliation pass against `applied`.
    ///
    /// `applied` is mutated in place and persisted through the store after
    /// every successful label operation, so on error it still reflects what
    /// is actually on the node.
    ///
    /// # Errors
    ///
    /// Returns the first [`LabelError`] raised by a label operation or by the
    /// state store. Remaining steps are not attempted.
    pub async fn reconcile(
        &self,
        desired: &DesiredLabels,
        applied: &mut AppliedLabels,
        context: &NodeContext,
    ) -> Result<ReconcileSummary, LabelError> {
        let node = context.node_name.as_str();
        let mut summary = ReconcileSummary::default();

        debug!(
            node = node,
            desired = desired.len(),
            previously_applied = applied.len(),
            "Starting node label reconciliation"
        );

        // Labels the user dropped from configuration.
        for key in applied.keys() {
            if desired.wants_set(&key) {
                continue;
            }
            self.client.remove_label(node, &key).await?;
            applied.remove(&key);
            self.store.save(applied)?;
            summary.removed.push(key);
        }

        for (key, entry) in desired {
            if is_derived_label(key) {
                warn!(
                    label = %key,
                    "Configured label is derived by the reconciler and will be overwritten"
                );
            }

            match entry {
                DesiredLabel::Remove => {
                    if summary.removed.contains(key) {
                        continue;
                    }
                    self.client.remove_label(node, key).await?;
                    summary.removed.push(key.clone());
                }
                DesiredLabel::Set(value) => {
                    self.client.set_label(node, key, value).await?;
                    applied.insert(key.clone(), value.clone());
                    self.store.save(applied)?;
                    summary.applied.push(key.clone());
                }
            }
        }

        summary.zone = self.apply_zone_label(context).await?;

        self.client
            .set_label(node, APPLICATION_LABEL, &context.application)
            .await?;
        self.client
            .set_label(node, CHARM_LABEL, &context.charm)
            .await?;

        let cloud = resolve_cloud_label(context.cloud.as_deref());
        match cloud {
            CloudLabel::Set(value) => self.client.set_label(node, CLOUD_LABEL, value).await?,
            CloudLabel::Remove => self.client.remove_label(node, CLOUD_LABEL).await?,
        }
        summary.cloud = Some(cloud);

        Ok(summary)
    }

    /// Sets the zone label from the context's hint when the node lacks one.
    ///
    /// The check reads live labels so a zone set by another agent is never
    /// clobbered. When the live read is unavailable the label is left alone.
    async fn apply_zone_label(&self, context: &NodeContext) -> Result<Option<String>, LabelError> {
        let Some(zone) = context.availability_zone.as_deref() else {
            return Ok(None);
        };
        let node = context.node_name.as_str();

        match self.client.active_labels(node).await? {
            Some(active) if active.contains_key(TOPOLOGY_ZONE_LABEL) => {
                debug!(node = node, "Node already carries a zone label");
                Ok(None)
            }
            Some(_) => {
                self.client.set_label(node, TOPOLOGY_ZONE_LABEL, zone).await?;
                Ok(Some(zone.to_string()))
            }
            None => {
                warn!(node = node, "Active labels unavailable, skipping zone label");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
#[path = "node_labels_tests.rs"]
mod node_labels_tests;
