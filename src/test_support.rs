// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared test doubles for unit tests.

use crate::kubectl::{CommandOutput, CommandRunner};
use crate::reconcilers::retry::RetryPolicy;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Responder = Box<dyn Fn(&[String]) -> std::io::Result<CommandOutput> + Send + Sync>;

/// [`CommandRunner`] that records every invocation and answers from a script.
pub struct ScriptedRunner {
    calls: Mutex<Vec<(PathBuf, Vec<String>)>>,
    respond: Responder,
}

impl ScriptedRunner {
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(&[String]) -> std::io::Result<CommandOutput> + Send + Sync + 'static,
    {
        Self {
            calls: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        }
    }

    /// Every command succeeds with `stdout`.
    pub fn succeeding(stdout: &str) -> Self {
        let stdout = stdout.to_string();
        Self::new(move |_| Ok(CommandOutput::ok(stdout.clone())))
    }

    /// Every command exits unsuccessfully.
    pub fn failing() -> Self {
        Self::new(|_| Ok(CommandOutput::failed("error: the server is unavailable")))
    }

    /// Arguments of every call, in order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, args)| args.clone())
            .collect()
    }

    /// Programs of every call, in order.
    pub fn programs(&self) -> Vec<PathBuf> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(program, _)| program.clone())
            .collect()
    }

    /// Every call rendered without its `--kubeconfig` flag, e.g.
    /// `label node worker-0 disktype=ssd --overwrite`.
    pub fn commands(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .map(|args| {
                args.into_iter()
                    .filter(|arg| !arg.starts_with("--kubeconfig="))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, program: &Path, args: &[String]) -> std::io::Result<CommandOutput> {
        self.calls
            .lock()
            .unwrap()
            .push((program.to_path_buf(), args.to_vec()));
        (self.respond)(args)
    }
}

/// A retry policy that gives up almost immediately.
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy::new(Duration::from_millis(20), Duration::from_millis(5))
}

/// Creates a stand-in kubectl binary so path resolution succeeds.
pub fn fake_kubectl(dir: &Path) -> PathBuf {
    let path = dir.join("kubectl");
    std::fs::write(&path, "#!/bin/sh\n").unwrap();
    path
}

/// Collects formatted tracing output in memory.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// A subscriber that writes every event, at any level, into this capture.
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync {
        let writer = self.clone();
        tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .finish()
    }

    /// Everything written so far.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
