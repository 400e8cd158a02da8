// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Node label reconciliation.
//!
//! # Reconciliation Architecture
//!
//! The labeler follows the standard controller pattern on a single node:
//!
//! 1. **Read** - Parse desired labels from configuration, load applied state
//! 2. **Diff** - Compare desired labels with the labels applied last time
//! 3. **Update** - Issue kubectl label operations to converge the node
//! 4. **Record** - Persist applied state after each successful operation
//!
//! # Available Reconcilers
//!
//! - [`LabelMaker::apply_node_labels`] - Loads state and runs one full pass
//! - [`LabelMaker::reconcile`] - Runs one pass against caller-supplied state
//!
//! # Example: Using the Reconciler
//!
//! ```rust,no_run
//! use node_labeler::config::parse_labels;
//! use node_labeler::context::NodeContext;
//! use node_labeler::kubectl::KubectlLabelClient;
//! use node_labeler::reconcilers::{retry::RetryPolicy, LabelMaker};
//! use node_labeler::state::FileStateStore;
//!
//! async fn label_node() -> anyhow::Result<()> {
//!     let client = KubectlLabelClient::new(
//!         "/snap/bin/kubectl",
//!         "/root/.kube/config",
//!         RetryPolicy::default(),
//!     );
//!     let maker = LabelMaker::new(client, FileStateStore::new("/var/lib/node-labeler/state.json"));
//!
//!     let desired = parse_labels("disktype=ssd gpu-", false)?;
//!     let context = NodeContext::new("worker-0", "kubernetes-worker")
//!         .with_cloud(Some("aws".to_string()));
//!
//!     maker.apply_node_labels(&desired, &context).await?;
//!     Ok(())
//! }
//! ```

pub mod node_labels;
pub mod retry;

pub use node_labels::{LabelMaker, ReconcileSummary};
