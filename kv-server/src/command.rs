//! The parsed, type-safe command set the Server dispatches.
//!
//! Decoding RESP wire bytes into an argument vector is the gateway's job,
//! not this crate's; [`Command::parse`] only turns that already-split
//! argument vector into a typed command, so arity and syntax errors are
//! caught in one place regardless of which gateway calls in.

use crate::error::{CommandError, CommandResult};
use kv_types::Timestamp;

/// `SET`'s existence precondition: plain `SET` always writes, `NX` only
/// writes if the key is absent, `XX` only if it's already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetExistence {
    #[default]
    Always,
    OnlyIfAbsent,
    OnlyIfPresent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Ping(Option<Vec<u8>>),
    Echo(Vec<u8>),
    Info,

    Get(String),
    Set { key: String, value: Vec<u8>, ttl_secs: Option<u64>, keep_ttl: bool, existence: SetExistence },
    GetDel(String),
    MGet(Vec<String>),
    MSet(Vec<(String, Vec<u8>)>),
    Append(String, Vec<u8>),
    StrLen(String),
    GetRange(String, i64, i64),
    Incr(String),
    IncrBy(String, i64),
    Decr(String),
    DecrBy(String, i64),
    IncrByFloat(String, f64),

    Del(Vec<String>),
    Exists(Vec<String>),
    Expire(String, u64),
    PExpire(String, u64),
    ExpireAt(String, u64),
    Ttl(String),
    Pttl(String),

    LPush(String, Vec<Vec<u8>>),
    RPush(String, Vec<Vec<u8>>),
    LPop(String),
    RPop(String),
    LRange(String, i64, i64),
    LLen(String),
    LIndex(String, i64),
    LSet(String, i64, Vec<u8>),
    LInsert { key: String, before: bool, pivot: Vec<u8>, value: Vec<u8> },
    LTrim(String, i64, i64),
    LRem(String, i64, Vec<u8>),

    SAdd(String, Vec<Vec<u8>>),
    SRem(String, Vec<Vec<u8>>),
    SMembers(String),
    SCard(String),
    SIsMember(String, Vec<u8>),

    HSet(String, Vec<(String, Vec<u8>)>),
    HGet(String, String),
    HDel(String, Vec<String>),
    HGetAll(String),
    HLen(String),
    HIncrBy(String, String, i64),
    HIncrByFloat(String, String, f64),
    HKeys(String),
    HVals(String),
    HExists(String, String),

    ZAdd(String, f64, String),
    ZRem(String, String),
    ZScore(String, String),
    ZCard(String),
    ZRange(String, i64, i64),
    ZRangeByScore(String, f64, f64),
    ZRank(String, String),
    ZIncrBy(String, f64, String),
}

fn utf8(bytes: &[u8]) -> CommandResult<String> {
    std::str::from_utf8(bytes).map(str::to_string).map_err(|_| CommandError::Syntax)
}

fn parse_i64(bytes: &[u8]) -> CommandResult<i64> {
    utf8(bytes)?.parse().map_err(|_| CommandError::NotAnInteger)
}

fn parse_u64(bytes: &[u8]) -> CommandResult<u64> {
    utf8(bytes)?.parse().map_err(|_| CommandError::NotAnInteger)
}

fn parse_f64(bytes: &[u8]) -> CommandResult<f64> {
    utf8(bytes)?.parse().map_err(|_| CommandError::NotAFloat)
}

impl Command {
    /// Parses a pre-split argument vector (`args[0]` is the command name)
    /// into a typed [`Command`]. Arity and basic syntax are validated here;
    /// type clashes against stored data are only discovered at dispatch.
    pub fn parse(args: &[Vec<u8>]) -> CommandResult<Self> {
        let Some((name, rest)) = args.split_first() else {
            return Err(CommandError::Syntax);
        };
        let name_str = utf8(name)?.to_ascii_uppercase();

        macro_rules! arity {
            ($min:expr, $name:expr) => {
                if rest.len() < $min {
                    return Err(CommandError::WrongArity($name));
                }
            };
        }

        Ok(match name_str.as_str() {
            "PING" => Command::Ping(rest.first().cloned()),
            "ECHO" => {
                arity!(1, "ECHO");
                Command::Echo(rest[0].clone())
            }
            "INFO" => Command::Info,

            "GET" => {
                arity!(1, "GET");
                Command::Get(utf8(&rest[0])?)
            }
            "SET" => {
                arity!(2, "SET");
                let opts = parse_set_ttl(&rest[2..])?;
                Command::Set {
                    key: utf8(&rest[0])?,
                    value: rest[1].clone(),
                    ttl_secs: opts.ttl_secs,
                    keep_ttl: opts.keep_ttl,
                    existence: opts.existence,
                }
            }
            "GETDEL" => {
                arity!(1, "GETDEL");
                Command::GetDel(utf8(&rest[0])?)
            }
            "MGET" => {
                arity!(1, "MGET");
                Command::MGet(rest.iter().map(|b| utf8(b)).collect::<CommandResult<_>>()?)
            }
            "MSET" => {
                arity!(2, "MSET");
                if rest.len() % 2 != 0 {
                    return Err(CommandError::WrongArity("MSET"));
                }
                let mut pairs = Vec::new();
                let mut i = 0;
                while i < rest.len() {
                    pairs.push((utf8(&rest[i])?, rest[i + 1].clone()));
                    i += 2;
                }
                Command::MSet(pairs)
            }
            "APPEND" => {
                arity!(2, "APPEND");
                Command::Append(utf8(&rest[0])?, rest[1].clone())
            }
            "STRLEN" => {
                arity!(1, "STRLEN");
                Command::StrLen(utf8(&rest[0])?)
            }
            "GETRANGE" => {
                arity!(3, "GETRANGE");
                Command::GetRange(utf8(&rest[0])?, parse_i64(&rest[1])?, parse_i64(&rest[2])?)
            }
            "INCR" => {
                arity!(1, "INCR");
                Command::Incr(utf8(&rest[0])?)
            }
            "INCRBY" => {
                arity!(2, "INCRBY");
                Command::IncrBy(utf8(&rest[0])?, parse_i64(&rest[1])?)
            }
            "DECR" => {
                arity!(1, "DECR");
                Command::Decr(utf8(&rest[0])?)
            }
            "DECRBY" => {
                arity!(2, "DECRBY");
                Command::DecrBy(utf8(&rest[0])?, parse_i64(&rest[1])?)
            }
            "INCRBYFLOAT" => {
                arity!(2, "INCRBYFLOAT");
                Command::IncrByFloat(utf8(&rest[0])?, parse_f64(&rest[1])?)
            }

            "DEL" => {
                arity!(1, "DEL");
                Command::Del(rest.iter().map(|b| utf8(b)).collect::<CommandResult<_>>()?)
            }
            "EXISTS" => {
                arity!(1, "EXISTS");
                Command::Exists(rest.iter().map(|b| utf8(b)).collect::<CommandResult<_>>()?)
            }
            "EXPIRE" => {
                arity!(2, "EXPIRE");
                Command::Expire(utf8(&rest[0])?, parse_u64(&rest[1])?)
            }
            "PEXPIRE" => {
                arity!(2, "PEXPIRE");
                Command::PExpire(utf8(&rest[0])?, parse_u64(&rest[1])?)
            }
            "EXPIREAT" => {
                arity!(2, "EXPIREAT");
                Command::ExpireAt(utf8(&rest[0])?, parse_u64(&rest[1])?)
            }
            "TTL" => {
                arity!(1, "TTL");
                Command::Ttl(utf8(&rest[0])?)
            }
            "PTTL" => {
                arity!(1, "PTTL");
                Command::Pttl(utf8(&rest[0])?)
            }

            "LPUSH" => {
                arity!(2, "LPUSH");
                Command::LPush(utf8(&rest[0])?, rest[1..].to_vec())
            }
            "RPUSH" => {
                arity!(2, "RPUSH");
                Command::RPush(utf8(&rest[0])?, rest[1..].to_vec())
            }
            "LPOP" => {
                arity!(1, "LPOP");
                Command::LPop(utf8(&rest[0])?)
            }
            "RPOP" => {
                arity!(1, "RPOP");
                Command::RPop(utf8(&rest[0])?)
            }
            "LRANGE" => {
                arity!(3, "LRANGE");
                Command::LRange(utf8(&rest[0])?, parse_i64(&rest[1])?, parse_i64(&rest[2])?)
            }
            "LLEN" => {
                arity!(1, "LLEN");
                Command::LLen(utf8(&rest[0])?)
            }
            "LINDEX" => {
                arity!(2, "LINDEX");
                Command::LIndex(utf8(&rest[0])?, parse_i64(&rest[1])?)
            }
            "LSET" => {
                arity!(3, "LSET");
                Command::LSet(utf8(&rest[0])?, parse_i64(&rest[1])?, rest[2].clone())
            }
            "LINSERT" => {
                arity!(4, "LINSERT");
                let before = match utf8(&rest[1])?.to_ascii_uppercase().as_str() {
                    "BEFORE" => true,
                    "AFTER" => false,
                    _ => return Err(CommandError::Syntax),
                };
                Command::LInsert { key: utf8(&rest[0])?, before, pivot: rest[2].clone(), value: rest[3].clone() }
            }
            "LTRIM" => {
                arity!(3, "LTRIM");
                Command::LTrim(utf8(&rest[0])?, parse_i64(&rest[1])?, parse_i64(&rest[2])?)
            }
            "LREM" => {
                arity!(3, "LREM");
                Command::LRem(utf8(&rest[0])?, parse_i64(&rest[1])?, rest[2].clone())
            }

            "SADD" => {
                arity!(2, "SADD");
                Command::SAdd(utf8(&rest[0])?, rest[1..].to_vec())
            }
            "SREM" => {
                arity!(2, "SREM");
                Command::SRem(utf8(&rest[0])?, rest[1..].to_vec())
            }
            "SMEMBERS" => {
                arity!(1, "SMEMBERS");
                Command::SMembers(utf8(&rest[0])?)
            }
            "SCARD" => {
                arity!(1, "SCARD");
                Command::SCard(utf8(&rest[0])?)
            }
            "SISMEMBER" => {
                arity!(2, "SISMEMBER");
                Command::SIsMember(utf8(&rest[0])?, rest[1].clone())
            }

            "HSET" => {
                arity!(3, "HSET");
                if (rest.len() - 1) % 2 != 0 {
                    return Err(CommandError::WrongArity("HSET"));
                }
                let key = utf8(&rest[0])?;
                let mut fields = Vec::new();
                let mut i = 1;
                while i < rest.len() {
                    fields.push((utf8(&rest[i])?, rest[i + 1].clone()));
                    i += 2;
                }
                Command::HSet(key, fields)
            }
            "HGET" => {
                arity!(2, "HGET");
                Command::HGet(utf8(&rest[0])?, utf8(&rest[1])?)
            }
            "HDEL" => {
                arity!(2, "HDEL");
                Command::HDel(utf8(&rest[0])?, rest[1..].iter().map(|b| utf8(b)).collect::<CommandResult<_>>()?)
            }
            "HGETALL" => {
                arity!(1, "HGETALL");
                Command::HGetAll(utf8(&rest[0])?)
            }
            "HLEN" => {
                arity!(1, "HLEN");
                Command::HLen(utf8(&rest[0])?)
            }
            "HINCRBY" => {
                arity!(3, "HINCRBY");
                Command::HIncrBy(utf8(&rest[0])?, utf8(&rest[1])?, parse_i64(&rest[2])?)
            }
            "HINCRBYFLOAT" => {
                arity!(3, "HINCRBYFLOAT");
                Command::HIncrByFloat(utf8(&rest[0])?, utf8(&rest[1])?, parse_f64(&rest[2])?)
            }
            "HKEYS" => {
                arity!(1, "HKEYS");
                Command::HKeys(utf8(&rest[0])?)
            }
            "HVALS" => {
                arity!(1, "HVALS");
                Command::HVals(utf8(&rest[0])?)
            }
            "HEXISTS" => {
                arity!(2, "HEXISTS");
                Command::HExists(utf8(&rest[0])?, utf8(&rest[1])?)
            }

            "ZADD" => {
                arity!(3, "ZADD");
                Command::ZAdd(utf8(&rest[0])?, parse_f64(&rest[1])?, utf8(&rest[2])?)
            }
            "ZREM" => {
                arity!(2, "ZREM");
                Command::ZRem(utf8(&rest[0])?, utf8(&rest[1])?)
            }
            "ZSCORE" => {
                arity!(2, "ZSCORE");
                Command::ZScore(utf8(&rest[0])?, utf8(&rest[1])?)
            }
            "ZCARD" => {
                arity!(1, "ZCARD");
                Command::ZCard(utf8(&rest[0])?)
            }
            "ZRANGE" => {
                arity!(3, "ZRANGE");
                Command::ZRange(utf8(&rest[0])?, parse_i64(&rest[1])?, parse_i64(&rest[2])?)
            }
            "ZRANGEBYSCORE" => {
                arity!(3, "ZRANGEBYSCORE");
                Command::ZRangeByScore(utf8(&rest[0])?, parse_f64(&rest[1])?, parse_f64(&rest[2])?)
            }
            "ZRANK" => {
                arity!(2, "ZRANK");
                Command::ZRank(utf8(&rest[0])?, utf8(&rest[1])?)
            }
            "ZINCRBY" => {
                arity!(3, "ZINCRBY");
                Command::ZIncrBy(utf8(&rest[0])?, parse_f64(&rest[1])?, utf8(&rest[2])?)
            }

            other => return Err(CommandError::UnknownCommand(other.to_string())),
        })
    }
}

/// `SET`'s trailing option list, parsed once and threaded whole into
/// `Command::Set` rather than discarded.
#[derive(Debug, Default)]
struct SetOptions {
    ttl_secs: Option<u64>,
    keep_ttl: bool,
    existence: SetExistence,
}

/// Parses `SET`'s trailing option list, supporting `EX seconds` / `PX
/// millis` (rendered as whole seconds since the Store's TTL grain doesn't
/// need sub-second precision for this subset), the absolute-time variants
/// `EXAT`/`PXAT` (converted to a relative TTL against wall-clock time at
/// parse time since `Command::Set` only carries a relative one), `KEEPTTL`,
/// and the `NX`/`XX` existence guards. `KEEPTTL` and any of `EX`/`PX`/
/// `EXAT`/`PXAT` are mutually exclusive, as are `NX` and `XX`.
fn parse_set_ttl(opts: &[Vec<u8>]) -> CommandResult<SetOptions> {
    let mut i = 0;
    let mut result = SetOptions::default();
    while i < opts.len() {
        match utf8(&opts[i])?.to_ascii_uppercase().as_str() {
            "EX" => {
                i += 1;
                result.ttl_secs = Some(parse_u64(opts.get(i).ok_or(CommandError::Syntax)?)?);
            }
            "PX" => {
                i += 1;
                result.ttl_secs = Some(parse_u64(opts.get(i).ok_or(CommandError::Syntax)?)? / 1000);
            }
            "EXAT" => {
                i += 1;
                let at_secs = parse_u64(opts.get(i).ok_or(CommandError::Syntax)?)?;
                result.ttl_secs = Some(relative_ttl_secs(at_secs));
            }
            "PXAT" => {
                i += 1;
                let at_millis = parse_u64(opts.get(i).ok_or(CommandError::Syntax)?)?;
                result.ttl_secs = Some(relative_ttl_secs(at_millis / 1000));
            }
            "KEEPTTL" => result.keep_ttl = true,
            "NX" => {
                if result.existence != SetExistence::Always {
                    return Err(CommandError::Syntax);
                }
                result.existence = SetExistence::OnlyIfAbsent;
            }
            "XX" => {
                if result.existence != SetExistence::Always {
                    return Err(CommandError::Syntax);
                }
                result.existence = SetExistence::OnlyIfPresent;
            }
            _ => return Err(CommandError::Syntax),
        }
        i += 1;
    }
    if result.keep_ttl && result.ttl_secs.is_some() {
        return Err(CommandError::Syntax);
    }
    Ok(result)
}

/// Clamps an absolute unix-seconds deadline already in the past to a TTL
/// of zero rather than underflowing, so an already-expired `EXAT`/`PXAT`
/// still takes effect as an immediate expiry instead of erroring out.
fn relative_ttl_secs(at_secs: u64) -> u64 {
    let now_secs = (Timestamp::now().as_nanos() / 1_000_000_000) as u64;
    at_secs.saturating_sub(now_secs)
}
