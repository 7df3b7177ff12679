//! capsim - cluster capacity simulator.
//!
//! This is the entry point for the `capsim` binary. `capsim run` simulates
//! scheduling a set of workload templates onto a cluster snapshot and prints
//! the review report. `capsim export` saves a live cluster as snapshot files.

mod convert;
mod render;
mod snapshot;

use std::io;
use std::path::PathBuf;

use anyhow::{bail, Context};
use capsim_scheduler::AlgorithmRegistry;
use capsim_simulator::{Simulation, SimulationConfig, SimulationInput};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use render::OutputFormat;
use snapshot::{RawSnapshot, UidMode};

/// capsim - simulate scheduling workloads onto a cluster snapshot.
#[derive(Parser, Debug)]
#[command(name = "capsim")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging.
    #[arg(long, global = true, default_value = "false")]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Simulate scheduling the workloads of a template file.
    Run(RunArgs),
    /// Save the nodes and running pods of a live cluster as snapshot files.
    Export(ExportArgs),
}

/// Where the cluster comes from.
#[derive(Args, Debug)]
struct ClusterArgs {
    /// Path to the kubeconfig file used to reach a live cluster.
    #[arg(long, env = "KUBECONFIG")]
    kubeconfig: Option<PathBuf>,

    /// Namespace whose running pods are read, and in which workloads are simulated.
    #[arg(long, env = "CAPSIM_NAMESPACE", default_value = "default")]
    namespace: String,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// JSON file of workload templates (`[{"name", "num", "pod"}]`).
    #[arg(long)]
    podspec: PathBuf,

    /// JSON file of nodes; reads the live cluster when omitted.
    #[arg(long)]
    nodes: Option<PathBuf>,

    /// JSON file of pods already running on the nodes.
    #[arg(long, requires = "nodes")]
    pods: Option<PathBuf>,

    #[command(flatten)]
    cluster: ClusterArgs,

    /// Scheduling algorithm provider.
    #[arg(long, alias = "algorithmprovider", env = "CAPSIM_ALGORITHM_PROVIDER")]
    algorithm_provider: Option<String>,

    /// Seconds to wait for each scheduling decision (0 waits forever).
    #[arg(long, env = "CAPSIM_DECISION_TIMEOUT_SECS")]
    decision_timeout_secs: Option<u64>,

    /// Derive workload UIDs from template names for reproducible output.
    #[arg(long, default_value = "false")]
    deterministic_uids: bool,

    /// Report format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
}

#[derive(Args, Debug)]
struct ExportArgs {
    /// Directory to write `nodes.json` and `pods.json` into.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    #[command(flatten)]
    cluster: ClusterArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "info,capsim=debug,capsim_simulator=debug,capsim_scheduler=debug"
    } else {
        "warn,capsim=info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(fmt::layer().with_writer(io::stderr))
        .init();

    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Export(args) => export(args).await,
    }
}

async fn load_cluster(args: &RunArgs) -> anyhow::Result<snapshot::ClusterSnapshot> {
    let raw = if let Some(nodes) = &args.nodes {
        RawSnapshot::from_files(nodes, args.pods.as_deref())
            .context("Failed to read cluster snapshot")?
    } else {
        fetch_live(&args.cluster).await?
    };
    Ok(raw.into_cluster()?)
}

async fn fetch_live(cluster: &ClusterArgs) -> anyhow::Result<RawSnapshot> {
    let client = snapshot::connect(cluster.kubeconfig.as_deref())
        .await
        .context("Failed to connect to cluster")?;
    RawSnapshot::fetch(client, &cluster.namespace)
        .await
        .context("Failed to read live cluster")
}

fn simulation_config(args: &RunArgs) -> SimulationConfig {
    let mut config = SimulationConfig::from_env();
    if let Some(provider) = &args.algorithm_provider {
        config.algorithm_provider.clone_from(provider);
    }
    if let Some(secs) = args.decision_timeout_secs {
        config.decision_timeout_secs = secs;
    }
    config
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let templates =
        snapshot::load_templates(&args.podspec).context("Failed to parse simulation pod spec")?;
    let uids = if args.deterministic_uids {
        UidMode::Deterministic
    } else {
        UidMode::Random
    };
    let workloads = snapshot::expand_templates(&templates, &args.cluster.namespace, uids)?;

    let cluster = load_cluster(&args).await?;
    if cluster.nodes.is_empty() {
        bail!("cluster snapshot has no nodes");
    }
    info!(
        nodes = cluster.nodes.len(),
        running = cluster.running.len(),
        workloads = workloads.len(),
        "Loaded simulation input"
    );

    let config = simulation_config(&args);
    let registry = AlgorithmRegistry::with_defaults()?;
    let simulation = Simulation::new(
        SimulationInput {
            nodes: cluster.nodes,
            workloads,
            pre_existing: cluster.running,
        },
        config,
        &registry,
    )
    .context("Failed to start scheduler simulator")?;

    let result = simulation.run().await;
    if let Err(e) = &result {
        warn!(error = %e, "Simulation ended with an error");
    }

    if let Some(report) = simulation.report() {
        render::render(report, args.output, &mut io::stdout().lock())?;
    }
    result.context("Simulation failed")
}

async fn export(args: ExportArgs) -> anyhow::Result<()> {
    let raw = fetch_live(&args.cluster).await?;
    raw.write_to(&args.out_dir)?;
    Ok(())
}
