// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! kubectl-backed node label operations.
//!
//! All cluster access goes through the `kubectl` command-line client:
//!
//! ```text
//! kubectl --kubeconfig=<path> label node <node> <key>=<value> --overwrite
//! kubectl --kubeconfig=<path> label node <node> <key>-
//! kubectl --kubeconfig=<path> get node <node> -o=jsonpath={.metadata.labels}
//! ```
//!
//! Each invocation is wrapped in the shared [`RetryPolicy`]. Process execution
//! sits behind the [`CommandRunner`] trait so the command sequence can be
//! observed without a cluster.

use crate::constants::{KUBECTL_BINARY, NODE_LABELS_JSONPATH};
use crate::label_errors::LabelError;
use crate::labels::REMOVAL_SUFFIX;
use crate::metrics::record_label_operation;
use crate::reconcilers::retry::{retry_command, RetryPolicy};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Operation names used in logs and metrics.
pub const OP_SET_LABEL: &str = "set-label";
pub const OP_REMOVE_LABEL: &str = "remove-label";
pub const OP_READ_LABELS: &str = "read-labels";

/// Captured result of one process invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Whether the process exited with status zero
    pub success: bool,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl CommandOutput {
    /// A successful invocation printing `stdout`.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed invocation printing `stderr`.
    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Runs external programs.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `program` with `args`, capturing its output.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the process could not be started.
    async fn run(&self, program: &Path, args: &[String]) -> std::io::Result<CommandOutput>;
}

#[async_trait]
impl<T: CommandRunner + ?Sized> CommandRunner for std::sync::Arc<T> {
    async fn run(&self, program: &Path, args: &[String]) -> std::io::Result<CommandOutput> {
        (**self).run(program, args).await
    }
}

/// [`CommandRunner`] that spawns real processes via tokio.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &Path, args: &[String]) -> std::io::Result<CommandOutput> {
        let output = tokio::process::Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Why a single attempt failed; only used for logging before a retry.
#[derive(Debug)]
enum AttemptError {
    Spawn(std::io::Error),
    Exit(String),
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn(e) => write!(f, "failed to start kubectl: {e}"),
            Self::Exit(stderr) => write!(f, "kubectl exited unsuccessfully: {}", stderr.trim()),
        }
    }
}

/// Resolves the kubectl binary, preferring `configured` when it exists.
///
/// # Errors
///
/// Returns [`LabelError::KubectlNotFound`] when neither `configured` nor a
/// `kubectl` on `PATH` exists.
pub fn resolve_kubectl(configured: &Path) -> Result<PathBuf, LabelError> {
    resolve_kubectl_with(configured, || which::which(KUBECTL_BINARY).ok())
}

/// Like [`resolve_kubectl`], with the `PATH` lookup supplied by the caller.
///
/// # Errors
///
/// Returns [`LabelError::KubectlNotFound`] when `configured` does not exist
/// and `lookup` finds nothing.
pub fn resolve_kubectl_with<F>(configured: &Path, lookup: F) -> Result<PathBuf, LabelError>
where
    F: FnOnce() -> Option<PathBuf>,
{
    if configured.exists() {
        return Ok(configured.to_path_buf());
    }

    match lookup() {
        Some(found) => {
            debug!(
                configured = %configured.display(),
                found = %found.display(),
                "Configured kubectl missing, using PATH lookup"
            );
            Ok(found)
        }
        None => Err(LabelError::KubectlNotFound {
            configured: configured.to_path_buf(),
        }),
    }
}

/// Node label operations executed through kubectl.
pub struct KubectlLabelClient<R: CommandRunner = ProcessRunner> {
    runner: R,
    kubectl_path: PathBuf,
    kubeconfig: PathBuf,
    policy: RetryPolicy,
}

impl KubectlLabelClient<ProcessRunner> {
    /// Creates a client that spawns real kubectl processes.
    pub fn new(
        kubectl_path: impl Into<PathBuf>,
        kubeconfig: impl Into<PathBuf>,
        policy: RetryPolicy,
    ) -> Self {
        Self::with_runner(ProcessRunner, kubectl_path, kubeconfig, policy)
    }
}

impl<R: CommandRunner> KubectlLabelClient<R> {
    /// Creates a client executing commands through `runner`.
    pub fn with_runner(
        runner: R,
        kubectl_path: impl Into<PathBuf>,
        kubeconfig: impl Into<PathBuf>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            runner,
            kubectl_path: kubectl_path.into(),
            kubeconfig: kubeconfig.into(),
            policy,
        }
    }

    #[must_use]
    pub fn runner(&self) -> &R {
        &self.runner
    }

    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn base_args(&self, verb: &str, node: &str) -> Vec<String> {
        vec![
            format!("--kubeconfig={}", self.kubeconfig.display()),
            verb.to_string(),
            "node".to_string(),
            node.to_string(),
        ]
    }

    /// Runs kubectl under the retry policy, returning its stdout.
    async fn run_retried(
        &self,
        operation: &str,
        args: Vec<String>,
        retry_message: &str,
    ) -> Result<String, LabelError> {
        let kubectl = resolve_kubectl(&self.kubectl_path)?;
        let (runner, kubectl, args) = (&self.runner, kubectl.as_path(), args.as_slice());

        retry_command(&self.policy, operation, retry_message, || async move {
            match runner.run(kubectl, args).await {
                Ok(output) if output.success => Ok(output.stdout),
                Ok(output) => Err(AttemptError::Exit(output.stderr)),
                Err(e) => Err(AttemptError::Spawn(e)),
            }
        })
        .await
    }

    /// Sets `key=value` on `node`, overwriting any existing value.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::NodeLabel`] if kubectl keeps failing until the
    /// retry deadline, or [`LabelError::KubectlNotFound`].
    pub async fn set_label(&self, node: &str, key: &str, value: &str) -> Result<(), LabelError> {
        let mut args = self.base_args("label", node);
        args.push(format!("{key}={value}"));
        args.push("--overwrite".to_string());

        let retry_message = format!("Failed to apply label {key}={value}. Will retry.");
        let result = self.run_retried(OP_SET_LABEL, args, &retry_message).await;
        record_label_operation(OP_SET_LABEL, result.is_ok());
        result?;

        debug!(node = node, label = key, value = value, "Applied node label");
        Ok(())
    }

    /// Removes `key` from `node`. Removing an absent label succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::NodeLabel`] if kubectl keeps failing until the
    /// retry deadline, or [`LabelError::KubectlNotFound`].
    pub async fn remove_label(&self, node: &str, key: &str) -> Result<(), LabelError> {
        let mut args = self.base_args("label", node);
        args.push(format!("{key}{REMOVAL_SUFFIX}"));

        let retry_message = format!("Failed to remove label {key}. Will retry.");
        let result = self.run_retried(OP_REMOVE_LABEL, args, &retry_message).await;
        record_label_operation(OP_REMOVE_LABEL, result.is_ok());
        result?;

        debug!(node = node, label = key, "Removed node label");
        Ok(())
    }

    /// Reads every label currently on `node`.
    ///
    /// Returns `Ok(None)` when the labels are unavailable: kubectl kept
    /// failing until the deadline, or printed something that is not a JSON
    /// label map.
    ///
    /// # Errors
    ///
    /// Only [`LabelError::KubectlNotFound`]; a missing binary is a setup
    /// problem, not a transient read failure.
    pub async fn active_labels(
        &self,
        node: &str,
    ) -> Result<Option<BTreeMap<String, String>>, LabelError> {
        let mut args = self.base_args("get", node);
        args.push(format!("-o=jsonpath={NODE_LABELS_JSONPATH}"));

        let stdout = match self
            .run_retried(OP_READ_LABELS, args, "Failed to get labels. Will retry.")
            .await
        {
            Ok(stdout) => stdout,
            Err(e @ LabelError::KubectlNotFound { .. }) => return Err(e),
            Err(e) => {
                record_label_operation(OP_READ_LABELS, false);
                warn!(node = node, error = %e, "Node labels unavailable");
                return Ok(None);
            }
        };

        match serde_json::from_str::<BTreeMap<String, String>>(stdout.trim()) {
            Ok(labels) => {
                record_label_operation(OP_READ_LABELS, true);
                Ok(Some(labels))
            }
            Err(e) => {
                record_label_operation(OP_READ_LABELS, false);
                warn!(node = node, error = %e, "Unparseable node labels from kubectl");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
#[path = "kubectl_tests.rs"]
mod kubectl_tests;
