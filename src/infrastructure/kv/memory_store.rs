use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::domain::errors::CoreResult;
use crate::domain::ports::{KvOp, KvStore};

#[derive(Default)]
struct Store {
    strings: HashMap<String, String>,
    sets: HashMap<String, HashSet<String>>,
    sorted_sets: HashMap<String, HashMap<String, f64>>,
    lists: HashMap<String, VecDeque<String>>,
    expirations: HashMap<String, Instant>,
}

/// In-memory `KvStore`. A single `Mutex` guards everything, which is
/// exactly what the port's `transaction` needs to be atomic for free.
pub struct InMemoryKvStore {
    inner: Mutex<Store>,
}

impl Default for InMemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Store::default()),
        }
    }

    fn is_live(store: &Store, key: &str) -> bool {
        match store.expirations.get(key) {
            Some(expiry) => Instant::now() < *expiry,
            None => true,
        }
    }

    fn apply_op(store: &mut Store, op: KvOp) {
        match op {
            KvOp::Set { key, value } => {
                store.strings.insert(key, value);
            }
            KvOp::Del { key } => {
                store.strings.remove(&key);
                store.sets.remove(&key);
                store.sorted_sets.remove(&key);
                store.lists.remove(&key);
                store.expirations.remove(&key);
            }
            KvOp::Sadd { key, member } => {
                store.sets.entry(key).or_default().insert(member);
            }
            KvOp::Srem { key, member } => {
                if let Some(set) = store.sets.get_mut(&key) {
                    set.remove(&member);
                }
            }
            KvOp::Zadd { key, member, score } => {
                store.sorted_sets.entry(key).or_default().insert(member, score);
            }
            KvOp::Zrem { key, member } => {
                if let Some(zset) = store.sorted_sets.get_mut(&key) {
                    zset.remove(&member);
                }
            }
        }
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn get(&self, key: &str) -> CoreResult<Option<String>> {
        let store = self.inner.lock().unwrap();
        if !Self::is_live(&store, key) {
            return Ok(None);
        }
        Ok(store.strings.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> CoreResult<()> {
        let mut store = self.inner.lock().unwrap();
        store.strings.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn del(&self, key: &str) -> CoreResult<()> {
        let mut store = self.inner.lock().unwrap();
        Self::apply_op(&mut store, KvOp::Del { key: key.to_string() });
        Ok(())
    }

    async fn incr(&self, key: &str) -> CoreResult<i64> {
        let mut store = self.inner.lock().unwrap();
        let current = store
            .strings
            .get(key)
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0);
        let next = current + 1;
        store.strings.insert(key.to_string(), next.to_string());
        Ok(next)
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> CoreResult<()> {
        let mut store = self.inner.lock().unwrap();
        if ttl_secs == 0 {
            store.expirations.remove(key);
        } else {
            store
                .expirations
                .insert(key.to_string(), Instant::now() + Duration::from_secs(ttl_secs));
        }
        Ok(())
    }

    async fn sadd(&self, key: &str, member: &str) -> CoreResult<()> {
        let mut store = self.inner.lock().unwrap();
        store.sets.entry(key.to_string()).or_default().insert(member.to_string());
        Ok(())
    }

    async fn srem(&self, key: &str, member: &str) -> CoreResult<()> {
        let mut store = self.inner.lock().unwrap();
        if let Some(set) = store.sets.get_mut(key) {
            set.remove(member);
        }
        Ok(())
    }

    async fn smembers(&self, key: &str) -> CoreResult<Vec<String>> {
        let store = self.inner.lock().unwrap();
        if !Self::is_live(&store, key) {
            return Ok(Vec::new());
        }
        Ok(store.sets.get(key).map(|s| s.iter().cloned().collect()).unwrap_or_default())
    }

    async fn scard(&self, key: &str) -> CoreResult<usize> {
        let store = self.inner.lock().unwrap();
        Ok(store.sets.get(key).map(HashSet::len).unwrap_or(0))
    }

    async fn sismember(&self, key: &str, member: &str) -> CoreResult<bool> {
        let store = self.inner.lock().unwrap();
        Ok(store.sets.get(key).is_some_and(|s| s.contains(member)))
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> CoreResult<()> {
        let mut store = self.inner.lock().unwrap();
        store
            .sorted_sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(())
    }

    async fn zrangebyscore(&self, key: &str, min: f64, max: f64) -> CoreResult<Vec<String>> {
        let store = self.inner.lock().unwrap();
        let Some(zset) = store.sorted_sets.get(key) else {
            return Ok(Vec::new());
        };
        let mut members: Vec<(&String, &f64)> =
            zset.iter().filter(|(_, score)| **score >= min && **score <= max).collect();
        members.sort_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(members.into_iter().map(|(m, _)| m.clone()).collect())
    }

    async fn zrem(&self, key: &str, member: &str) -> CoreResult<()> {
        let mut store = self.inner.lock().unwrap();
        if let Some(zset) = store.sorted_sets.get_mut(key) {
            zset.remove(member);
        }
        Ok(())
    }

    async fn lpush(&self, key: &str, value: &str) -> CoreResult<()> {
        let mut store = self.inner.lock().unwrap();
        store.lists.entry(key.to_string()).or_default().push_front(value.to_string());
        Ok(())
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> CoreResult<Vec<String>> {
        let store = self.inner.lock().unwrap();
        let Some(list) = store.lists.get(key) else {
            return Ok(Vec::new());
        };
        let len = list.len() as isize;
        let norm = |i: isize| -> isize {
            if i < 0 {
                (len + i).max(0)
            } else {
                i.min(len)
            }
        };
        let start = norm(start);
        let stop = (norm(stop) + 1).min(len);
        if start >= stop {
            return Ok(Vec::new());
        }
        Ok(list.iter().skip(start as usize).take((stop - start) as usize).cloned().collect())
    }

    async fn ltrim(&self, key: &str, start: isize, stop: isize) -> CoreResult<()> {
        let kept = self.lrange(key, start, stop).await?;
        let mut store = self.inner.lock().unwrap();
        store.lists.insert(key.to_string(), kept.into_iter().collect());
        Ok(())
    }

    async fn transaction(&self, ops: Vec<KvOp>) -> CoreResult<()> {
        let mut store = self.inner.lock().unwrap();
        for op in ops {
            Self::apply_op(&mut store, op);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn incr_starts_at_one() {
        let kv = InMemoryKvStore::new();
        assert_eq!(kv.incr("counter").await.unwrap(), 1);
        assert_eq!(kv.incr("counter").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn expired_key_reads_as_absent() {
        let kv = InMemoryKvStore::new();
        kv.set("k", "v").await.unwrap();
        kv.expire("k", 0).await.unwrap();
        assert_eq!(kv.get("k").await.unwrap(), Some("v".to_string()));

        kv.set("k2", "v").await.unwrap();
        {
            let mut store = kv.inner.lock().unwrap();
            store.expirations.insert("k2".to_string(), Instant::now() - Duration::from_secs(1));
        }
        assert_eq!(kv.get("k2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn zrangebyscore_filters_and_sorts() {
        let kv = InMemoryKvStore::new();
        kv.zadd("z", "a", 1.0).await.unwrap();
        kv.zadd("z", "b", 5.0).await.unwrap();
        kv.zadd("z", "c", 10.0).await.unwrap();
        let result = kv.zrangebyscore("z", 1.0, 5.0).await.unwrap();
        assert_eq!(result, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn transaction_applies_all_ops_atomically() {
        let kv = InMemoryKvStore::new();
        kv.transaction(vec![
            KvOp::Set { key: "status".into(), value: "active".into() },
            KvOp::Sadd { key: "active_set".into(), member: "g1".into() },
        ])
        .await
        .unwrap();
        assert_eq!(kv.get("status").await.unwrap(), Some("active".to_string()));
        assert!(kv.sismember("active_set", "g1").await.unwrap());
    }

    #[tokio::test]
    async fn lpush_lrange_ltrim() {
        let kv = InMemoryKvStore::new();
        kv.lpush("log", "c").await.unwrap();
        kv.lpush("log", "b").await.unwrap();
        kv.lpush("log", "a").await.unwrap();
        assert_eq!(kv.lrange("log", 0, -1).await.unwrap(), vec!["a", "b", "c"]);
        kv.ltrim("log", 0, 1).await.unwrap();
        assert_eq!(kv.lrange("log", 0, -1).await.unwrap(), vec!["a", "b"]);
    }
}
