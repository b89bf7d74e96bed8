// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `outpostd` — serve the orchestration tree over TCP.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use outpost_daemon::adapters::{HostMounter, KubernetesSpawner};
use outpost_daemon::{startup, Config, ReceiptStore};

#[derive(Parser)]
#[command(name = "outpostd", about = "Cloud workloads as a mountable file tree")]
struct Args {
    /// Address the protocol server listens on
    #[arg(long, default_value = "127.0.0.1:5640")]
    listen: String,

    /// Directory remote trees are mounted under
    #[arg(long)]
    mount_root: PathBuf,

    /// Receipt directory (default: "<mount-root>.receipts")
    #[arg(long)]
    receipt_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("OUTPOST_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = Config::new(args.listen, args.mount_root);
    if let Some(dir) = args.receipt_dir {
        config = config.with_receipt_dir(dir);
    }

    let store = ReceiptStore::new(&config.receipt_dir);
    let spawner =
        Arc::new(KubernetesSpawner::connect(store).await.context("connecting to kubernetes")?);
    let mounter = Arc::new(HostMounter::new());

    let started = startup(&config, spawner, mounter).await.context("startup")?;

    let shutdown = started.shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt, shutting down");
            shutdown.cancel();
        }
    });

    // Partial move: `started` keeps holding the mount-root lock while
    // the listener runs.
    let listener = started.listener;
    listener.run().await;
    Ok(())
}
