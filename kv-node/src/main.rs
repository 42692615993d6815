//! Replica process entry point: resolves configuration, opens the Store
//! and Operation Log, spins up the RESP gateway and the replication HTTP
//! API, and drives the Syncer and GC background tasks until shutdown.

mod config;
mod migrate;
mod resp;

use anyhow::Context;
use config::{Args, NodeConfig};
use clap::Parser;
use kv_oplog::OperationLog;
use kv_segment::{SegmentConfig, SegmentManager};
use kv_server::Server;
use kv_store::Store;
use kv_sync::{router, PeerConfig, SyncConfig, Syncer};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder().with_max_level(log_level).with_target(false).compact().init();

    let config = NodeConfig::resolve(args).context("resolving node configuration")?;
    match run(config).await {
        Ok(()) => Ok(()),
        Err(err) => {
            tracing::error!(error = %err, "fatal startup failure");
            Err(err)
        }
    }
}

async fn run(config: NodeConfig) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&config.data_dir).await.context("creating data directory")?;

    let segment_config = SegmentConfig {
        max_segment_size: config.max_segment_size,
        compaction_threshold: config.compaction_threshold,
        compaction_interval: config.compaction_interval,
    };
    let segments = Arc::new(SegmentManager::open(config.data_dir.join("segments"), segment_config.clone()).await.context("opening segments")?);
    migrate::migrate_legacy_store(&config.data_dir, &segments).await.context("migrating legacy store.json")?;

    let store = Arc::new(Store::open(config.replica_id.clone(), segments).await.context("opening store")?);
    let oplog = Arc::new(OperationLog::open(config.data_dir.join("oplog"), segment_config).await.context("opening operation log")?);
    let server = Arc::new(Server::new(config.replica_id.clone(), store.clone(), oplog.clone()));
    server.reload_seen_from_log().await;

    tracing::info!(
        replica_id = %config.replica_id,
        resp_port = config.resp_port,
        http_port = config.http_port,
        peers = config.peers.len(),
        "replica starting",
    );

    let (stop_tx, stop_rx) = watch::channel(false);

    let sync_config = SyncConfig {
        peers: config.peers.iter().map(|p| PeerConfig { replica_id: p.replica_id.clone(), base_url: p.base_url.clone() }).collect(),
        tick_interval: config.sync_interval,
        request_timeout: config.sync_timeout,
    };
    let syncer = Arc::new(Syncer::new(sync_config, server.clone(), oplog.clone()));
    let syncer_task = tokio::spawn(syncer.run(stop_rx.clone()));

    let gc_store = store.clone();
    let gc_oplog = oplog.clone();
    let tombstone_ttl = config.tombstone_ttl;
    let oplog_retention = config.oplog_retention;
    let gc_interval = config.gc_interval;
    let mut gc_stop = stop_rx.clone();
    let gc_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(gc_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let cutoff = kv_types::Timestamp::now().as_nanos() - tombstone_ttl.as_nanos() as i64;
                    gc_store.gc(cutoff).await;
                    let oplog_cutoff = kv_types::Timestamp::from_nanos(kv_types::Timestamp::now().as_nanos() - oplog_retention.as_nanos() as i64);
                    if let Err(err) = gc_oplog.prune_older_than(oplog_cutoff).await {
                        tracing::warn!(error = %err, "operation log retention pruning failed");
                    }
                }
                _ = gc_stop.changed() => {
                    if *gc_stop.borrow() {
                        break;
                    }
                }
            }
        }
    });

    let http_listener = TcpListener::bind(("0.0.0.0", config.http_port)).await.context("binding replication HTTP port")?;
    let http_app = router(server.clone(), oplog.clone());
    let mut http_stop = stop_rx.clone();
    let http_task = tokio::spawn(async move {
        axum::serve(http_listener, http_app)
            .with_graceful_shutdown(async move {
                let _ = http_stop.changed().await;
            })
            .await
    });

    let resp_listener = TcpListener::bind(("0.0.0.0", config.resp_port)).await.context("binding RESP port")?;
    let resp_task = {
        let server = server.clone();
        let mut resp_stop = stop_rx.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    accepted = resp_listener.accept() => {
                        let Ok((stream, peer)) = accepted else { continue };
                        let server = server.clone();
                        tokio::spawn(async move {
                            if let Err(err) = handle_connection(stream, server).await {
                                tracing::debug!(%peer, error = %err, "client connection ended");
                            }
                        });
                    }
                    _ = resp_stop.changed() => {
                        if *resp_stop.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    };

    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    tracing::info!("shutdown signal received, draining background tasks");
    let _ = stop_tx.send(true);

    let _ = tokio::join!(syncer_task, gc_task, http_task, resp_task);
    Ok(())
}

async fn handle_connection(stream: TcpStream, server: Arc<Server>) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    while let Some(args) = resp::read_command(&mut reader).await? {
        if args.is_empty() {
            continue;
        }
        match server.execute(&args).await {
            Ok(reply) => resp::write_reply(&mut write_half, &reply).await?,
            Err(err) => resp::write_error(&mut write_half, &err).await?,
        }
        write_half.flush().await?;
    }
    Ok(())
}
