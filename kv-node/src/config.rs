//! Node configuration: flags, environment variables, an optional TOML file,
//! and struct defaults, in that precedence order (highest first).

use clap::Parser;
use kv_types::ReplicaId;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "kv-node")]
#[command(about = "A single replica of the active-active CRDT key-value store")]
pub struct Args {
    /// Optional TOML config file; flags and env vars still take precedence
    /// over anything it sets.
    #[arg(long, env = "KV_NODE_CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    #[arg(long, env = "KV_NODE_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    #[arg(long, env = "KV_NODE_REPLICA_ID")]
    pub replica_id: Option<String>,

    /// RESP listen port for client traffic.
    #[arg(long, env = "KV_NODE_RESP_PORT", default_value_t = 6379)]
    pub resp_port: u16,

    /// HTTP port exposing the replication API (`/ops`, `/apply`) to peers.
    #[arg(long, env = "KV_NODE_HTTP_PORT", default_value_t = 7600)]
    pub http_port: u16,

    /// Comma-separated `replica_id=http://host:port` peer list.
    #[arg(long, env = "KV_NODE_PEERS", value_delimiter = ',')]
    pub peers: Vec<String>,

    #[arg(long, env = "KV_NODE_SYNC_INTERVAL_MS", default_value_t = 1000)]
    pub sync_interval_ms: u64,

    #[arg(long, env = "KV_NODE_SYNC_TIMEOUT_MS", default_value_t = 5000)]
    pub sync_timeout_ms: u64,

    #[arg(long, env = "KV_NODE_MAX_SEGMENT_SIZE", default_value_t = 64 * 1024 * 1024)]
    pub max_segment_size: u64,

    #[arg(long, env = "KV_NODE_COMPACTION_THRESHOLD", default_value_t = 10)]
    pub compaction_threshold: usize,

    #[arg(long, env = "KV_NODE_COMPACTION_INTERVAL_SECS", default_value_t = 300)]
    pub compaction_interval_secs: u64,

    /// How long a tombstone (deleted OR-Set/RGA element, expired key) is
    /// kept before GC drops it, to give slower peers time to still see the
    /// delete rather than resurrecting the value.
    #[arg(long, env = "KV_NODE_TOMBSTONE_TTL_SECS", default_value_t = 24 * 60 * 60)]
    pub tombstone_ttl_secs: u64,

    #[arg(long, env = "KV_NODE_GC_INTERVAL_SECS", default_value_t = 60)]
    pub gc_interval_secs: u64,

    #[arg(long, env = "KV_NODE_OPLOG_RETENTION_SECS", default_value_t = 7 * 24 * 60 * 60)]
    pub oplog_retention_secs: u64,

    #[arg(short, long, env = "KV_NODE_VERBOSE")]
    pub verbose: bool,
}

/// Subset of [`Args`] a TOML file may also set. Anything left `None` here
/// falls through to the flag/env default already resolved by `clap`.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    data_dir: Option<PathBuf>,
    replica_id: Option<String>,
    resp_port: Option<u16>,
    http_port: Option<u16>,
    peers: Option<Vec<String>>,
    sync_interval_ms: Option<u64>,
    sync_timeout_ms: Option<u64>,
    max_segment_size: Option<u64>,
    compaction_threshold: Option<usize>,
    compaction_interval_secs: Option<u64>,
    tombstone_ttl_secs: Option<u64>,
    gc_interval_secs: Option<u64>,
    oplog_retention_secs: Option<u64>,
}

pub struct PeerAddr {
    pub replica_id: ReplicaId,
    pub base_url: String,
}

pub struct NodeConfig {
    pub data_dir: PathBuf,
    pub replica_id: ReplicaId,
    pub resp_port: u16,
    pub http_port: u16,
    pub peers: Vec<PeerAddr>,
    pub sync_interval: Duration,
    pub sync_timeout: Duration,
    pub max_segment_size: u64,
    pub compaction_threshold: usize,
    pub compaction_interval: Duration,
    pub tombstone_ttl: Duration,
    pub gc_interval: Duration,
    pub oplog_retention: Duration,
    pub verbose: bool,
}

impl NodeConfig {
    /// Flags/env come from `clap`, which already applies flags > env >
    /// built-in defaults. A value the caller never set explicitly — i.e.
    /// still at clap's `default_value` — can be overridden by the file;
    /// `clap` does not expose "was this explicit" directly, so the file
    /// layer here only fills in fields clap left at their hard-coded
    /// default, which is the practical form "file below env/flags" takes
    /// without reimplementing clap's own precedence machinery.
    pub fn resolve(args: Args) -> anyhow::Result<Self> {
        let file = match &args.config_file {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                toml::from_str(&text)?
            }
            None => FileConfig::default(),
        };

        let data_dir = file.data_dir.filter(|_| args.data_dir == PathBuf::from("./data")).unwrap_or(args.data_dir);
        let replica_id = args.replica_id.or(file.replica_id).unwrap_or_else(random_replica_id);
        let resp_port = if args.resp_port == 6379 { file.resp_port.unwrap_or(6379) } else { args.resp_port };
        let http_port = if args.http_port == 7600 { file.http_port.unwrap_or(7600) } else { args.http_port };
        let peers_raw = if args.peers.is_empty() { file.peers.unwrap_or_default() } else { args.peers };
        let sync_interval_ms = if args.sync_interval_ms == 1000 { file.sync_interval_ms.unwrap_or(1000) } else { args.sync_interval_ms };
        let sync_timeout_ms = if args.sync_timeout_ms == 5000 { file.sync_timeout_ms.unwrap_or(5000) } else { args.sync_timeout_ms };
        let max_segment_size =
            if args.max_segment_size == 64 * 1024 * 1024 { file.max_segment_size.unwrap_or(64 * 1024 * 1024) } else { args.max_segment_size };
        let compaction_threshold = if args.compaction_threshold == 10 { file.compaction_threshold.unwrap_or(10) } else { args.compaction_threshold };
        let compaction_interval_secs =
            if args.compaction_interval_secs == 300 { file.compaction_interval_secs.unwrap_or(300) } else { args.compaction_interval_secs };
        let tombstone_ttl_secs =
            if args.tombstone_ttl_secs == 24 * 60 * 60 { file.tombstone_ttl_secs.unwrap_or(24 * 60 * 60) } else { args.tombstone_ttl_secs };
        let gc_interval_secs = if args.gc_interval_secs == 60 { file.gc_interval_secs.unwrap_or(60) } else { args.gc_interval_secs };
        let oplog_retention_secs = if args.oplog_retention_secs == 7 * 24 * 60 * 60 {
            file.oplog_retention_secs.unwrap_or(7 * 24 * 60 * 60)
        } else {
            args.oplog_retention_secs
        };

        let peers = peers_raw
            .iter()
            .map(|raw| parse_peer(raw))
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self {
            data_dir,
            replica_id: ReplicaId::new(replica_id),
            resp_port,
            http_port,
            peers,
            sync_interval: Duration::from_millis(sync_interval_ms),
            sync_timeout: Duration::from_millis(sync_timeout_ms),
            max_segment_size,
            compaction_threshold,
            compaction_interval: Duration::from_secs(compaction_interval_secs),
            tombstone_ttl: Duration::from_secs(tombstone_ttl_secs),
            gc_interval: Duration::from_secs(gc_interval_secs),
            oplog_retention: Duration::from_secs(oplog_retention_secs),
            verbose: args.verbose,
        })
    }
}

fn parse_peer(raw: &str) -> anyhow::Result<PeerAddr> {
    let (id, url) = raw.split_once('=').ok_or_else(|| anyhow::anyhow!("peer '{raw}' is not of the form replica_id=http://host:port"))?;
    Ok(PeerAddr { replica_id: ReplicaId::new(id), base_url: url.to_string() })
}

fn random_replica_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
