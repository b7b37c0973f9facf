//! KV Store port (C1, spec §6.1): the durable key/value substrate backing
//! the active set, priority index, triggered set, throttle flag, and
//! learning parameters. Treated as an external collaborator per spec §1;
//! this crate ships a minimal in-process adapter (`infrastructure::kv`)
//! so the rest of the core is runnable standalone.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::domain::errors::CoreResult;

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> CoreResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> CoreResult<()>;
    async fn del(&self, key: &str) -> CoreResult<()>;
    async fn incr(&self, key: &str) -> CoreResult<i64>;
    /// Sets a key's TTL in seconds; a value of 0 clears any existing TTL.
    async fn expire(&self, key: &str, ttl_secs: u64) -> CoreResult<()>;

    async fn sadd(&self, key: &str, member: &str) -> CoreResult<()>;
    async fn srem(&self, key: &str, member: &str) -> CoreResult<()>;
    async fn smembers(&self, key: &str) -> CoreResult<Vec<String>>;
    async fn scard(&self, key: &str) -> CoreResult<usize>;
    async fn sismember(&self, key: &str, member: &str) -> CoreResult<bool>;

    /// Adds `member` to the sorted set at `key` with the given score,
    /// updating the score if the member is already present.
    async fn zadd(&self, key: &str, member: &str, score: f64) -> CoreResult<()>;
    async fn zrangebyscore(&self, key: &str, min: f64, max: f64) -> CoreResult<Vec<String>>;
    async fn zrem(&self, key: &str, member: &str) -> CoreResult<()>;

    async fn lpush(&self, key: &str, value: &str) -> CoreResult<()>;
    async fn lrange(&self, key: &str, start: isize, stop: isize) -> CoreResult<Vec<String>>;
    async fn ltrim(&self, key: &str, start: isize, stop: isize) -> CoreResult<()>;

    /// Applies a batch of operations as a single atomic unit, for the
    /// multi-key invariants spec §5 requires (e.g. goal status + active-set
    /// membership). Implementations without native transactions (e.g. the
    /// in-process adapter's single global lock) satisfy this trivially.
    async fn transaction(&self, ops: Vec<KvOp>) -> CoreResult<()>;
}

/// A single write operation, used to express multi-key atomic updates
/// through `KvStore::transaction`.
#[derive(Debug, Clone)]
pub enum KvOp {
    Set { key: String, value: String },
    Del { key: String },
    Sadd { key: String, member: String },
    Srem { key: String, member: String },
    Zadd { key: String, member: String, score: f64 },
    Zrem { key: String, member: String },
}

/// Convenience snapshot of the aggregate domain-parameter keys C11
/// writes and C7/C9 read (`success_rate:{type}:{domain}`,
/// `avg_value:{type}:{domain}`, `confidence_scaling:{domain}`).
pub type DomainParamMap = HashMap<String, f64>;
