//! The command façade: local dispatch, foreign operation replay, and the
//! handful of server-scoped queries (`INFO`) that don't belong on the Store.

use crate::command::{Command, SetExistence};
use crate::error::CommandResult;
use crate::reply::CommandReply;
use kv_oplog::OperationLog;
use kv_store::{MutationMeta, SetCondition, Store};
use kv_types::{Operation, OperationId, OperationKind, ReplicaId, Timestamp};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Whether a command mutates the keyspace and so needs an
/// [`Operation`] appended for replication.
fn is_mutation(command: &Command) -> bool {
    !matches!(
        command,
        Command::Ping(_)
            | Command::Echo(_)
            | Command::Info
            | Command::Get(_)
            | Command::MGet(_)
            | Command::StrLen(_)
            | Command::GetRange(..)
            | Command::Exists(_)
            | Command::Ttl(_)
            | Command::Pttl(_)
            | Command::LRange(..)
            | Command::LLen(_)
            | Command::LIndex(..)
            | Command::SMembers(_)
            | Command::SCard(_)
            | Command::SIsMember(..)
            | Command::HGet(..)
            | Command::HGetAll(_)
            | Command::HLen(_)
            | Command::HKeys(_)
            | Command::HVals(_)
            | Command::HExists(..)
            | Command::ZScore(..)
            | Command::ZCard(_)
            | Command::ZRange(..)
            | Command::ZRangeByScore(..)
            | Command::ZRank(..)
    )
}

/// `DEL` and `GETDEL` are the only commands that remove a whole key;
/// everything else that mutates produces a new value.
fn operation_kind(command: &Command) -> OperationKind {
    match command {
        Command::Del(_) | Command::GetDel(_) => OperationKind::Delete,
        _ => OperationKind::Set,
    }
}

/// Single-node command dispatch and foreign operation replay.
///
/// [`Self::execute`] is the local entry point: a freshly parsed command from
/// this replica's own clients. [`Self::handle_operation`] is the replay
/// entry point: an [`Operation`] pulled or pushed in from a peer, applied
/// with its *original* timestamp/replica/sequence so every replica that
/// applies it converges on the same CRDT state. Both paths funnel through
/// the same [`Store`] mutators; only the [`MutationMeta`] differs.
pub struct Server {
    replica_id: ReplicaId,
    store: Arc<Store>,
    oplog: Arc<OperationLog>,
    seen: Mutex<HashSet<OperationId>>,
    local_op_seq: AtomicU64,
    started_at: Instant,
}

impl Server {
    #[must_use]
    pub fn new(replica_id: ReplicaId, store: Arc<Store>, oplog: Arc<OperationLog>) -> Self {
        Self {
            replica_id,
            store,
            oplog,
            seen: Mutex::new(HashSet::new()),
            local_op_seq: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub fn replica_id(&self) -> &ReplicaId {
        &self.replica_id
    }

    /// Parses and applies a locally originated command, appending an
    /// [`Operation`] to the log for outbound replication if it mutated
    /// anything. A failure to append is a persistence-category failure —
    /// logged, not surfaced, since the mutation itself already succeeded.
    pub async fn execute(&self, args: &[Vec<u8>]) -> CommandResult<CommandReply> {
        let command = Command::parse(args)?;
        let reply = self.apply(&command, MutationMeta::local()).await?;

        if is_mutation(&command) {
            let op = self.build_local_operation(args, &command);
            if let Err(err) = self.oplog.append(op).await {
                tracing::error!(error = %err, "failed to append operation to log after applying command");
            }
        }

        Ok(reply)
    }

    fn build_local_operation(&self, args: &[Vec<u8>], command: &Command) -> Operation {
        let seq = self.local_op_seq.fetch_add(1, Ordering::Relaxed);
        let timestamp = Timestamp::now();
        let operation_id = OperationId::new(timestamp, self.replica_id.clone(), seq);
        let name = String::from_utf8_lossy(&args[0]).to_ascii_uppercase();
        let rest = args[1..].iter().map(|a| String::from_utf8_lossy(a).into_owned()).collect();
        Operation::new(operation_id, timestamp, self.replica_id.clone(), name, rest, operation_kind(command))
    }

    /// Applies a replicated [`Operation`] exactly once. Operations already
    /// in the seen set (already applied, whether pulled earlier or applied
    /// locally) are silently skipped — replay must be idempotent since the
    /// Syncer may redeliver.
    pub async fn handle_operation(&self, op: Operation) -> CommandResult<()> {
        {
            let mut seen = self.seen.lock().await;
            if !seen.insert(op.operation_id.clone()) {
                return Ok(());
            }
        }

        let mut raw_args = Vec::with_capacity(op.args.len() + 1);
        raw_args.push(op.command.clone().into_bytes());
        raw_args.extend(op.args.iter().map(|a| a.clone().into_bytes()));
        let command = Command::parse(&raw_args)?;

        let meta = MutationMeta::origin(op.timestamp, op.replica_id.clone(), op.operation_id.seq);
        self.apply(&command, meta).await?;

        if let Err(err) = self.oplog.append(op).await {
            tracing::error!(error = %err, "failed to forward replayed operation into local log");
        }
        Ok(())
    }

    /// Rebuilds the seen-operation set from the log's own retained window.
    /// Called once at startup so a restart doesn't re-replicate operations
    /// this replica already applied before it went down.
    pub async fn reload_seen_from_log(&self) {
        let mut seen = self.seen.lock().await;
        for op in self.oplog.operations_since(Timestamp::from_nanos(i64::MIN)).await {
            seen.insert(op.operation_id);
        }
    }

    pub async fn info(&self) -> String {
        format!(
            "replica_id:{}\r\nuptime_seconds:{}\r\nkeys:{}\r\n",
            self.replica_id,
            self.started_at.elapsed().as_secs(),
            self.store.len().await,
        )
    }

    async fn apply(&self, command: &Command, meta: MutationMeta) -> CommandResult<CommandReply> {
        Ok(match command {
            Command::Ping(payload) => match payload {
                Some(p) => CommandReply::Bulk(p.clone()),
                None => CommandReply::SimpleString("PONG".to_string()),
            },
            Command::Echo(payload) => CommandReply::Bulk(payload.clone()),
            Command::Info => CommandReply::Bulk(self.info().await.into_bytes()),

            Command::Get(key) => CommandReply::bulk_opt(self.store.get(key).await?),
            Command::Set { key, value, ttl_secs, keep_ttl, existence } => {
                let ttl = ttl_secs.map(Duration::from_secs);
                let condition = match existence {
                    SetExistence::Always => SetCondition::Always,
                    SetExistence::OnlyIfAbsent => SetCondition::OnlyIfAbsent,
                    SetExistence::OnlyIfPresent => SetCondition::OnlyIfPresent,
                };
                let wrote = self.store.set(key.clone(), value.clone(), ttl, *keep_ttl, condition, meta).await?;
                if wrote {
                    CommandReply::Ok
                } else {
                    CommandReply::Nil
                }
            }
            Command::GetDel(key) => CommandReply::bulk_opt(self.store.get_del(key, meta).await?),
            Command::MGet(keys) => {
                let mut out = Vec::with_capacity(keys.len());
                for key in keys {
                    out.push(CommandReply::bulk_opt(self.store.get(key).await?));
                }
                CommandReply::Array(out)
            }
            Command::MSet(pairs) => {
                for (key, value) in pairs {
                    self.store.set(key.clone(), value.clone(), None, false, SetCondition::Always, meta.clone()).await?;
                }
                CommandReply::Ok
            }
            Command::Append(key, value) => CommandReply::Integer(self.store.append(key, value, meta).await? as i64),
            Command::StrLen(key) => CommandReply::Integer(self.store.get(key).await?.map_or(0, |v| v.len() as i64)),
            Command::GetRange(key, start, end) => {
                let value = self.store.get(key).await?.unwrap_or_default();
                CommandReply::Bulk(string_range(&value, *start, *end))
            }
            Command::Incr(key) => CommandReply::Integer(self.store.incr(key, meta).await?),
            Command::IncrBy(key, delta) => CommandReply::Integer(self.store.incr_by(key, *delta, meta).await?),
            Command::Decr(key) => CommandReply::Integer(self.store.decr(key, meta).await?),
            Command::DecrBy(key, delta) => CommandReply::Integer(self.store.decr_by(key, *delta, meta).await?),
            Command::IncrByFloat(key, delta) => CommandReply::float(self.store.incr_by_float(key, *delta, meta).await?),

            Command::Del(keys) => {
                let mut count = 0;
                for key in keys {
                    if self.store.del(key, meta.clone()).await? {
                        count += 1;
                    }
                }
                CommandReply::Integer(count)
            }
            Command::Exists(keys) => {
                let mut count = 0;
                for key in keys {
                    if self.store.exists(key).await {
                        count += 1;
                    }
                }
                CommandReply::Integer(count)
            }
            Command::Expire(key, secs) => CommandReply::bool_integer(self.store.expire(key, Duration::from_secs(*secs), meta).await?),
            Command::PExpire(key, millis) => CommandReply::bool_integer(self.store.pexpire(key, Duration::from_millis(*millis), meta).await?),
            Command::ExpireAt(key, at_secs) => {
                CommandReply::bool_integer(self.store.expire_at(key, Timestamp::from_nanos(*at_secs as i64 * 1_000_000_000), meta).await?)
            }
            Command::Ttl(key) => CommandReply::Integer(ttl_reply(self.store.ttl(key).await, 1)),
            Command::Pttl(key) => CommandReply::Integer(ttl_reply(self.store.pttl(key).await, 1000)),

            Command::LPush(key, values) => CommandReply::Integer(self.store.lpush(key, values.clone(), meta).await? as i64),
            Command::RPush(key, values) => CommandReply::Integer(self.store.rpush(key, values.clone(), meta).await? as i64),
            Command::LPop(key) => CommandReply::bulk_opt(self.store.lpop(key, meta).await?),
            Command::RPop(key) => CommandReply::bulk_opt(self.store.rpop(key, meta).await?),
            Command::LRange(key, start, stop) => {
                CommandReply::Array(self.store.lrange(key, *start, *stop).await?.into_iter().map(CommandReply::bulk).collect())
            }
            Command::LLen(key) => CommandReply::Integer(self.store.llen(key).await? as i64),
            Command::LIndex(key, index) => CommandReply::bulk_opt(self.store.lindex(key, *index).await?),
            Command::LSet(key, index, value) => {
                self.store.lset(key, *index, value.clone(), meta).await?;
                CommandReply::Ok
            }
            Command::LInsert { key, before, pivot, value } => match self.store.linsert(key, *before, pivot, value.clone(), meta).await? {
                Some(len) => CommandReply::Integer(len as i64),
                None => CommandReply::Integer(-1),
            },
            Command::LTrim(key, start, stop) => {
                self.store.ltrim(key, *start, *stop).await?;
                CommandReply::Ok
            }
            Command::LRem(key, count, value) => CommandReply::Integer(self.store.lrem(key, *count, value, meta).await? as i64),

            Command::SAdd(key, members) => CommandReply::Integer(self.store.sadd(key, members.clone(), meta).await? as i64),
            Command::SRem(key, members) => CommandReply::Integer(self.store.srem(key, members.clone(), meta).await? as i64),
            Command::SMembers(key) => CommandReply::Array(self.store.smembers(key).await?.into_iter().map(CommandReply::bulk).collect()),
            Command::SCard(key) => CommandReply::Integer(self.store.scard(key).await? as i64),
            Command::SIsMember(key, member) => CommandReply::bool_integer(self.store.sismember(key, member).await?),

            Command::HSet(key, fields) => CommandReply::Integer(self.store.hset(key, fields.clone(), meta).await? as i64),
            Command::HGet(key, field) => CommandReply::bulk_opt(self.store.hget(key, field).await?),
            Command::HDel(key, fields) => CommandReply::Integer(self.store.hdel(key, fields.clone(), meta).await? as i64),
            Command::HGetAll(key) => CommandReply::Array(
                self.store
                    .hgetall(key)
                    .await?
                    .into_iter()
                    .flat_map(|(f, v)| [CommandReply::bulk(f.into_bytes()), CommandReply::bulk(v)])
                    .collect(),
            ),
            Command::HLen(key) => CommandReply::Integer(self.store.hlen(key).await? as i64),
            Command::HIncrBy(key, field, delta) => CommandReply::Integer(self.store.hincr_by(key, field, *delta, meta).await?),
            Command::HIncrByFloat(key, field, delta) => CommandReply::float(self.store.hincr_by_float(key, field, *delta, meta).await?),
            Command::HKeys(key) => CommandReply::Array(self.store.hkeys(key).await?.into_iter().map(|k| CommandReply::bulk(k.into_bytes())).collect()),
            Command::HVals(key) => CommandReply::Array(self.store.hvals(key).await?.into_iter().map(CommandReply::bulk).collect()),
            Command::HExists(key, field) => CommandReply::bool_integer(self.store.hexists(key, field).await?),

            Command::ZAdd(key, score, member) => CommandReply::bool_integer(self.store.zadd(key, member.clone(), *score, meta).await?),
            Command::ZRem(key, member) => CommandReply::bool_integer(self.store.zrem(key, member, meta).await?),
            Command::ZScore(key, member) => CommandReply::float_opt(self.store.zscore(key, member).await?),
            Command::ZCard(key) => CommandReply::Integer(self.store.zcard(key).await? as i64),
            Command::ZRange(key, start, stop) => zset_members_reply(self.store.zrange(key, *start, *stop).await?),
            Command::ZRangeByScore(key, min, max) => zset_members_reply(self.store.zrange_by_score(key, *min, *max).await?),
            Command::ZRank(key, member) => match self.store.zrank(key, member).await? {
                Some(rank) => CommandReply::Integer(rank as i64),
                None => CommandReply::Nil,
            },
            Command::ZIncrBy(key, delta, member) => CommandReply::float(self.store.zincr_by(key, member.clone(), *delta, meta).await?),
        })
    }
}

/// Maps the Store's `(outer, inner)` TTL representation onto RESP's
/// Redis-style `TTL`/`PTTL` convention: `-2` for a missing key, `-1` for a
/// key with no expiry, otherwise the remaining time in the requested unit.
fn ttl_reply(ttl: Option<Option<Duration>>, unit_per_sec: u64) -> i64 {
    match ttl {
        None => -2,
        Some(None) => -1,
        Some(Some(remaining)) => (remaining.as_secs_f64() * unit_per_sec as f64).round() as i64,
    }
}

/// `GETRANGE key start end`, Redis-style: negative indices count from the
/// end, both bounds inclusive, clamped to the string's actual length
/// rather than erroring on an out-of-range request.
fn string_range(value: &[u8], start: i64, end: i64) -> Vec<u8> {
    let len = value.len() as i64;
    if len == 0 {
        return Vec::new();
    }
    let start = if start < 0 { (len + start).max(0) } else { start };
    let end = if end < 0 { (len + end).max(0) } else { end.min(len - 1) };
    if start >= len || start > end {
        return Vec::new();
    }
    value[start as usize..=end as usize].to_vec()
}

fn zset_members_reply(members: Vec<(String, f64)>) -> CommandReply {
    CommandReply::Array(members.into_iter().flat_map(|(m, s)| [CommandReply::bulk(m.into_bytes()), CommandReply::float(s)]).collect())
}
