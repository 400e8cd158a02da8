// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

// Common test utilities for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use node_labeler::kubectl::{CommandOutput, CommandRunner};
use node_labeler::reconcilers::retry::RetryPolicy;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// In-memory stand-in for a cluster, driven through kubectl arguments.
///
/// Understands `label node <n> k=v --overwrite`, `label node <n> k-` and
/// `get node <n> -o=jsonpath={.metadata.labels}`. Unknown nodes fail like
/// `kubectl` does with `NotFound`.
#[derive(Default)]
pub struct FakeCluster {
    nodes: Mutex<BTreeMap<String, BTreeMap<String, String>>>,
    history: Mutex<Vec<String>>,
    unreachable: Mutex<bool>,
}

impl FakeCluster {
    pub fn with_node(name: &str, labels: &[(&str, &str)]) -> Self {
        let cluster = Self::default();
        cluster.nodes.lock().unwrap().insert(
            name.to_string(),
            labels
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        );
        cluster
    }

    pub fn labels(&self, node: &str) -> BTreeMap<String, String> {
        self.nodes
            .lock()
            .unwrap()
            .get(node)
            .cloned()
            .unwrap_or_default()
    }

    /// Labels set or removed by someone other than the reconciler.
    pub fn set_external_label(&self, node: &str, key: &str, value: &str) {
        if let Some(labels) = self.nodes.lock().unwrap().get_mut(node) {
            labels.insert(key.to_string(), value.to_string());
        }
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        *self.unreachable.lock().unwrap() = unreachable;
    }

    pub fn history(&self) -> Vec<String> {
        self.history.lock().unwrap().clone()
    }

    pub fn clear_history(&self) {
        self.history.lock().unwrap().clear();
    }

    fn execute(&self, args: &[String]) -> CommandOutput {
        let args: Vec<&str> = args
            .iter()
            .map(String::as_str)
            .filter(|arg| !arg.starts_with("--kubeconfig="))
            .collect();

        let mut nodes = self.nodes.lock().unwrap();
        match args.as_slice() {
            ["get", "node", node, output] if output.starts_with("-o=jsonpath=") => {
                match nodes.get(*node) {
                    Some(labels) => CommandOutput::ok(serde_json::to_string(labels).unwrap()),
                    None => CommandOutput::failed(format!("nodes \"{node}\" not found")),
                }
            }
            ["label", "node", node, change, rest @ ..] => {
                let Some(labels) = nodes.get_mut(*node) else {
                    return CommandOutput::failed(format!("nodes \"{node}\" not found"));
                };
                if let Some((key, value)) = change.split_once('=') {
                    if labels.contains_key(key) && !rest.contains(&"--overwrite") {
                        return CommandOutput::failed("already has a value");
                    }
                    labels.insert(key.to_string(), value.to_string());
                } else if let Some(key) = change.strip_suffix('-') {
                    labels.remove(key);
                } else {
                    return CommandOutput::failed("invalid label spec");
                }
                CommandOutput::ok(format!("node/{node} labeled"))
            }
            _ => CommandOutput::failed("unknown command"),
        }
    }
}

#[async_trait]
impl CommandRunner for FakeCluster {
    async fn run(&self, _program: &Path, args: &[String]) -> std::io::Result<CommandOutput> {
        self.history.lock().unwrap().push(
            args.iter()
                .filter(|arg| !arg.starts_with("--kubeconfig="))
                .cloned()
                .collect::<Vec<_>>()
                .join(" "),
        );
        if *self.unreachable.lock().unwrap() {
            return Ok(CommandOutput::failed(
                "The connection to the server was refused",
            ));
        }
        Ok(self.execute(args))
    }
}

/// A retry policy that gives up almost immediately.
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy::new(Duration::from_millis(30), Duration::from_millis(5))
}

/// Creates a stand-in kubectl binary so path resolution succeeds.
pub fn fake_kubectl(dir: &Path) -> PathBuf {
    let path = dir.join("kubectl");
    std::fs::write(&path, "#!/bin/sh\n").unwrap();
    path
}
