use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use tokio::sync::mpsc;

use ymir_state::{FileSnapshotStore, KvStateMachine, LoopbackLog};

#[derive(clap::Parser, Debug)]
#[command(name = "ymir-node", about = "Ymir replicated KV node")]
struct Cli {
    #[arg(long)]
    node_id: u64,
    #[arg(long, default_value = "0.0.0.0:17000")]
    listen_addr: String,
    #[arg(long)]
    config: Option<std::path::PathBuf>,
    /// Overrides storage.data_dir from the config when set.
    #[arg(long)]
    data_dir: Option<std::path::PathBuf>,
}

#[derive(Debug, Deserialize)]
struct StorageConfig {
    data_dir: String,
}

#[derive(Debug, Deserialize)]
struct LogConfig {
    snapshot_threshold: u64,
    channel_capacity: usize,
}

#[derive(Debug, Deserialize)]
struct ObservabilityConfig {
    log_level: String,
    log_format: String,
}

#[derive(Debug, Deserialize)]
struct Config {
    storage: StorageConfig,
    log: LogConfig,
    observability: ObservabilityConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use clap::Parser;
    let cli = Cli::parse();

    let mut figment = Figment::new()
        .merge(Toml::string(include_str!("../../../config/default.toml")));

    if let Some(ref config_path) = cli.config {
        figment = figment.merge(Toml::file_exact(config_path));
    }

    let config: Config = figment
        .merge(Env::prefixed("YMIR_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    match config.observability.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(&config.observability.log_level)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .pretty()
                .with_env_filter(&config.observability.log_level)
                .init();
        }
    }

    tracing::info!(
        node_id = cli.node_id,
        listen_addr = %cli.listen_addr,
        "node starting"
    );

    let listen_addr: SocketAddr = cli
        .listen_addr
        .parse()
        .with_context(|| format!("invalid listen_addr: {}", cli.listen_addr))?;

    let data_dir = cli
        .data_dir
        .unwrap_or_else(|| config.storage.data_dir.clone().into());

    // Single-node mode: the loopback log stands in for the consensus
    // collaborator and commits proposals immediately, in order.
    let LoopbackLog { propose_tx, commit_rx, error_rx } = LoopbackLog::spawn();

    let machine = Arc::new(KvStateMachine::new(
        cli.node_id,
        propose_tx,
        FileSnapshotStore::new(data_dir),
        config.log.snapshot_threshold,
    ));
    machine.bootstrap().await.context("snapshot bootstrap failed")?;

    // Membership changes are a collaborator concern; with no real consensus
    // attached they are logged and dropped.
    let (conf_tx, mut conf_rx) = mpsc::channel(config.log.channel_capacity);
    tokio::spawn(async move {
        while let Some(change) = conf_rx.recv().await {
            tracing::info!(?change, "membership change forwarded");
        }
    });

    let applier = tokio::spawn(machine.clone().run_applier(commit_rx, error_rx));

    tokio::select! {
        res = ymir_server::serve(listen_addr, machine, conf_tx, cli.node_id) => res,
        res = applier => match res {
            Ok(Ok(())) => Ok(()),
            // Corrupt committed data or a failed collaborator: terminate
            // rather than keep serving unknown state.
            Ok(Err(err)) => Err(anyhow::Error::new(err).context("applier failed")),
            Err(join_err) => Err(anyhow::anyhow!("applier task panicked: {join_err}")),
        },
    }
}
