// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # node-labeler - Kubernetes Node Label Reconciler
//!
//! node-labeler keeps a Kubernetes node's labels in step with a declarative
//! configuration string, and layers in labels derived from where the node
//! runs: application and charm identity, cloud provider, availability zone.
//!
//! ## Overview
//!
//! This library provides:
//!
//! - Parsing of whitespace-separated `key=value` label configuration
//! - A persisted record of the labels previously applied, used to compute removals
//! - kubectl-backed label operations with fixed-interval retries
//! - The reconciliation pass tying them together
//!
//! ## Modules
//!
//! - [`config`] - Label configuration parsing and reconciler settings
//! - [`context`] - Node identity and environment facts
//! - [`cloud`] - Cloud provider to label resolution
//! - [`state`] - Applied-label state and its stores
//! - [`kubectl`] - kubectl invocation and binary resolution
//! - [`reconcilers`] - The reconciliation pass and retry policy
//! - [`metrics`] - Prometheus metrics
//!
//! ## Example
//!
//! ```rust
//! use node_labeler::cloud::{resolve_cloud_label, CloudLabel};
//! use node_labeler::config::parse_labels;
//!
//! let desired = parse_labels("disktype=ssd too=many=equals", false).unwrap();
//! assert_eq!(desired.len(), 1);
//!
//! assert_eq!(resolve_cloud_label(Some("aws")), CloudLabel::Set("ec2"));
//! ```

pub mod cloud;
pub mod config;
pub mod constants;
pub mod context;
pub mod kubectl;
pub mod label_errors;
pub mod labels;
pub mod metrics;
pub mod reconcilers;
pub mod state;

#[cfg(test)]
mod test_support;
