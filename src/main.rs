// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use node_labeler::{
    config::ReconcilerSettings,
    constants::{DEFAULT_WATCH_INTERVAL_SECS, NODE_NAME_ENV},
    context::{resolve_node_name, NodeContext},
    kubectl::KubectlLabelClient,
    label_errors::LabelError,
    metrics::gather_metrics,
    reconcilers::{LabelMaker, ReconcileSummary},
    state::FileStateStore,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Reconcile Kubernetes node labels with declarative configuration.
#[derive(Parser, Debug)]
#[command(name = "node-labeler")]
#[command(about = "Reconcile Kubernetes node labels with declarative configuration")]
#[command(version)]
struct Cli {
    /// YAML settings file (or set `NODE_LABELER_CONFIG`)
    #[arg(long, short, env = "NODE_LABELER_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: SettingsOverrides,

    #[command(subcommand)]
    command: Commands,
}

/// Command-line overrides layered on top of the settings file.
#[derive(Args, Debug, Default)]
struct SettingsOverrides {
    /// Whitespace-separated `key=value` labels
    #[arg(long, global = true)]
    labels: Option<String>,

    /// Kubeconfig passed to kubectl
    #[arg(long, global = true)]
    kubeconfig: Option<PathBuf>,

    /// Preferred kubectl binary
    #[arg(long, global = true)]
    kubectl_path: Option<PathBuf>,

    /// Applied-label state file
    #[arg(long, global = true)]
    state_file: Option<PathBuf>,

    /// Treat malformed label tokens as fatal
    #[arg(long, global = true)]
    strict: bool,

    /// Retry deadline for each kubectl call, in seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Pause between kubectl retries, in seconds
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    retry_interval_secs: Option<u64>,

    /// Node to label
    #[arg(long, env = NODE_NAME_ENV, global = true)]
    node_name: Option<String>,

    /// Application identity for the `juju-application` label
    #[arg(long, global = true)]
    application: Option<String>,

    /// Charm identity for the `juju-charm` label
    #[arg(long, global = true)]
    charm: Option<String>,

    /// Cloud the node runs on (e.g. aws, gcp, openstack, vsphere, azure)
    #[arg(long, global = true)]
    cloud: Option<String>,
}

impl SettingsOverrides {
    fn apply(&self, mut settings: ReconcilerSettings) -> ReconcilerSettings {
        if let Some(labels) = &self.labels {
            settings.labels.clone_from(labels);
        }
        if let Some(kubeconfig) = &self.kubeconfig {
            settings.kubeconfig.clone_from(kubeconfig);
        }
        if let Some(kubectl_path) = &self.kubectl_path {
            settings.kubectl_path.clone_from(kubectl_path);
        }
        if let Some(state_file) = &self.state_file {
            settings.state_file.clone_from(state_file);
        }
        if self.strict {
            settings.strict = true;
        }
        if let Some(timeout_secs) = self.timeout_secs {
            settings.timeout_secs = timeout_secs;
        }
        if let Some(retry_interval_secs) = self.retry_interval_secs {
            settings.retry_interval_secs = retry_interval_secs;
        }
        if self.node_name.is_some() {
            settings.node_name.clone_from(&self.node_name);
        }
        if self.application.is_some() {
            settings.application.clone_from(&self.application);
        }
        if self.charm.is_some() {
            settings.charm.clone_from(&self.charm);
        }
        if self.cloud.is_some() {
            settings.cloud.clone_from(&self.cloud);
        }
        settings
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one reconciliation pass
    Apply,

    /// Reconcile periodically, re-reading settings before every pass
    Watch {
        /// Seconds between passes
        #[arg(
            long,
            default_value_t = DEFAULT_WATCH_INTERVAL_SECS,
            value_parser = clap::value_parser!(u64).range(1..)
        )]
        interval: u64,

        /// Serve Prometheus metrics on this address (e.g. 0.0.0.0:9090)
        #[arg(long)]
        metrics_addr: Option<SocketAddr>,
    },

    /// Print the labels currently on the node as JSON
    Show,

    /// Print shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "node-labeler", &mut std::io::stdout());
        return Ok(());
    }

    // Passes never overlap, so a single thread drives everything.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .thread_name("node-labeler")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    // Initialize logging with custom format
    // Format: timestamp file:line LEVEL message
    //
    // Respects RUST_LOG environment variable if set, otherwise defaults to INFO level
    // Respects RUST_LOG_FORMAT environment variable for output format (json|text)
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_target(false)
                .with_writer(std::io::stderr)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_target(false)
                .with_ansi(true)
                .with_writer(std::io::stderr)
                .compact()
                .init();
        }
    }

    debug!("Logging initialized with file and line number tracking");

    match cli.command {
        Commands::Apply => {
            let settings = load_settings(&cli)?;
            run_pass(&settings).await?;
            Ok(())
        }
        Commands::Watch {
            interval,
            metrics_addr,
        } => run_watch(&cli, Duration::from_secs(interval), metrics_addr).await,
        Commands::Show => show_labels(&load_settings(&cli)?).await,
        Commands::Completions { .. } => Ok(()),
    }
}

/// Loads the settings file, if any, and applies command-line overrides.
fn load_settings(cli: &Cli) -> Result<ReconcilerSettings> {
    let settings = match &cli.config {
        Some(path) => ReconcilerSettings::from_file(path)?,
        None => ReconcilerSettings::default(),
    };
    let settings = cli.overrides.apply(settings);
    settings.validate()?;
    Ok(settings)
}

fn label_maker(settings: &ReconcilerSettings) -> LabelMaker<FileStateStore> {
    let client = KubectlLabelClient::new(
        &settings.kubectl_path,
        &settings.kubeconfig,
        settings.retry_policy(),
    );
    LabelMaker::new(client, FileStateStore::new(&settings.state_file))
}

/// Runs one reconciliation pass with the given settings.
async fn run_pass(settings: &ReconcilerSettings) -> Result<ReconcileSummary> {
    let desired = settings
        .desired_labels()
        .map_err(LabelError::from)
        .context("Invalid label configuration")?;
    let context = NodeContext::from_settings(settings)?;

    info!(
        node = %context.node_name,
        labels = desired.len(),
        cloud = ?context.cloud,
        "Reconciling node labels"
    );

    let (summary, _) = label_maker(settings)
        .apply_node_labels(&desired, &context)
        .await
        .with_context(|| format!("Failed to label node {}", context.node_name))?;
    Ok(summary)
}

async fn run_watch(cli: &Cli, interval: Duration, metrics_addr: Option<SocketAddr>) -> Result<()> {
    info!(interval = ?interval, "Starting node label watch loop");

    tokio::select! {
        result = watch_loop(cli, interval) => result,
        result = serve_metrics(metrics_addr) => {
            error!("Metrics server exited unexpectedly: {:?}", result);
            result
        }
        result = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal, stopping");
            result.context("Failed to listen for shutdown signal")
        }
    }
}

async fn watch_loop(cli: &Cli, interval: Duration) -> Result<()> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let outcome = match load_settings(cli) {
            Ok(settings) => run_pass(&settings).await,
            Err(e) => Err(e),
        };
        if let Err(e) = outcome {
            if needs_operator_action(&e) {
                error!("Reconciliation pass failed, fix the configuration or host: {e:#}");
            } else {
                warn!("Reconciliation pass failed, will retry next interval: {e:#}");
            }
        }
    }
}

/// Whether a failed pass will keep failing until someone intervenes.
fn needs_operator_action(e: &anyhow::Error) -> bool {
    e.downcast_ref::<LabelError>()
        .is_some_and(|err| !err.is_retryable())
}

async fn serve_metrics(addr: Option<SocketAddr>) -> Result<()> {
    let Some(addr) = addr else {
        return std::future::pending().await;
    };

    let app = Router::new().route("/metrics", get(metrics_handler));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind metrics server to {addr}"))?;

    info!(addr = %addr, "Serving Prometheus metrics on /metrics");
    axum::serve(listener, app)
        .await
        .context("Metrics server failed")
}

async fn metrics_handler() -> Response {
    match gather_metrics() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn show_labels(settings: &ReconcilerSettings) -> Result<()> {
    let node_name = resolve_node_name(settings)?;
    let client = KubectlLabelClient::new(
        &settings.kubectl_path,
        &settings.kubeconfig,
        settings.retry_policy(),
    );

    let Some(labels) = client.active_labels(&node_name).await? else {
        anyhow::bail!("Labels for node {node_name} are unavailable");
    };

    println!("{}", serde_json::to_string_pretty(&labels)?);
    Ok(())
}
