//! Key-value store collaborator
//!
//! The cache core depends on exactly the Redis command surface it needs:
//! GET, SET with TTL, DEL, EXPIRE, pipelined batch GET, KEYS, MGET, INFO,
//! FLUSH. `CacheStore` is the seam; `MemoryStore` implements the same
//! command surface in process memory with lazy TTL expiry.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// The Redis-compatible command surface the cache core rides on
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// GET — value at a key, or None when absent or expired
    async fn get(&self, key: &str) -> Result<Option<String>, String>;

    /// SET with TTL in seconds
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), String>;

    /// DEL — returns whether the key existed
    async fn del(&self, key: &str) -> Result<bool, String>;

    /// EXPIRE — reset a key's TTL; returns whether the key existed
    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, String>;

    /// Pipelined MULTI/EXEC GET of one batch of keys
    async fn batch_get(&self, keys: &[String]) -> Result<Vec<Option<String>>, String>;

    /// KEYS — every live key
    async fn keys(&self) -> Result<Vec<String>, String>;

    /// MGET
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>, String>;

    /// INFO — statistics in Redis INFO text format
    async fn info(&self) -> Result<String, String>;

    /// FLUSHALL
    async fn flush(&self) -> Result<(), String>;
}

struct StoredEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// In-process store with per-entry absolute expiry, checked lazily on read
pub struct MemoryStore {
    entries: DashMap<String, StoredEntry>,
    started_at: Instant,
    keyspace_hits: AtomicU64,
    keyspace_misses: AtomicU64,
    total_commands: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            entries: DashMap::new(),
            started_at: Instant::now(),
            keyspace_hits: AtomicU64::new(0),
            keyspace_misses: AtomicU64::new(0),
            total_commands: AtomicU64::new(0),
        }
    }

    fn read(&self, key: &str) -> Option<String> {
        self.total_commands.fetch_add(1, Ordering::Relaxed);
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired() => {
                self.keyspace_hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            Some(_) => {
                drop(self.entries.remove(key));
                self.keyspace_misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.keyspace_misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Approximate memory held by live entries, in bytes
    fn used_memory(&self) -> usize {
        self.entries
            .iter()
            .map(|entry| entry.key().len() + entry.value().value.len())
            .sum()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, String> {
        Ok(self.read(key))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), String> {
        self.total_commands.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(
            key.to_string(),
            StoredEntry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_secs)),
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<bool, String> {
        self.total_commands.fetch_add(1, Ordering::Relaxed);
        Ok(self.entries.remove(key).is_some())
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, String> {
        self.total_commands.fetch_add(1, Ordering::Relaxed);
        match self.entries.get_mut(key) {
            Some(mut entry) if !entry.is_expired() => {
                entry.expires_at = Some(Instant::now() + Duration::from_secs(ttl_secs));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn batch_get(&self, keys: &[String]) -> Result<Vec<Option<String>>, String> {
        Ok(keys.iter().map(|key| self.read(key)).collect())
    }

    async fn keys(&self) -> Result<Vec<String>, String> {
        self.total_commands.fetch_add(1, Ordering::Relaxed);
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| !entry.value().is_expired())
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>, String> {
        Ok(keys.iter().map(|key| self.read(key)).collect())
    }

    async fn info(&self) -> Result<String, String> {
        let uptime = self.started_at.elapsed().as_secs();
        Ok(format!(
            "# Server\r\n\
             redis_version:memory-0.1\r\n\
             uptime_in_seconds:{}\r\n\
             \r\n\
             # Clients\r\n\
             connected_clients:1\r\n\
             \r\n\
             # Memory\r\n\
             used_memory:{}\r\n\
             \r\n\
             # Stats\r\n\
             total_commands_processed:{}\r\n\
             keyspace_hits:{}\r\n\
             keyspace_misses:{}\r\n\
             db0_keys:{}\r\n",
            uptime,
            self.used_memory(),
            self.total_commands.load(Ordering::Relaxed),
            self.keyspace_hits.load(Ordering::Relaxed),
            self.keyspace_misses.load(Ordering::Relaxed),
            self.entries.len(),
        ))
    }

    async fn flush(&self) -> Result<(), String> {
        self.total_commands.fetch_add(1, Ordering::Relaxed);
        self.entries.clear();
        Ok(())
    }
}

/// Parse Redis INFO text into `section -> {field -> value}`
pub fn parse_info(text: &str) -> BTreeMap<String, BTreeMap<String, String>> {
    let mut sections = BTreeMap::new();
    let mut current = String::from("unknown");

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(name) = line.strip_prefix('#') {
            current = name.trim().to_lowercase();
        } else if let Some((field, value)) = line.split_once(':') {
            sections
                .entry(current.clone())
                .or_insert_with(BTreeMap::new)
                .insert(field.to_string(), value.to_string());
        }
    }
    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_del() {
        let store = MemoryStore::new();
        store.set_ex("Book--1", "{\"id\":\"1\"}", 60).await.unwrap();

        assert_eq!(
            store.get("Book--1").await.unwrap(),
            Some("{\"id\":\"1\"}".to_string())
        );
        assert!(store.del("Book--1").await.unwrap());
        assert_eq!(store.get("Book--1").await.unwrap(), None);
        assert!(!store.del("Book--1").await.unwrap());
    }

    #[tokio::test]
    async fn test_expiry() {
        let store = MemoryStore::new();
        store.set_ex("gone", "x", 0).await.unwrap();
        assert_eq!(store.get("gone").await.unwrap(), None);

        store.set_ex("kept", "y", 60).await.unwrap();
        assert!(store.expire("kept", 120).await.unwrap());
        assert!(!store.expire("missing", 120).await.unwrap());
    }

    #[tokio::test]
    async fn test_batch_get_preserves_order() {
        let store = MemoryStore::new();
        store.set_ex("a", "1", 60).await.unwrap();
        store.set_ex("c", "3", 60).await.unwrap();

        let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let values = store.batch_get(&keys).await.unwrap();
        assert_eq!(
            values,
            vec![Some("1".to_string()), None, Some("3".to_string())]
        );
    }

    #[tokio::test]
    async fn test_flush_and_keys() {
        let store = MemoryStore::new();
        store.set_ex("a", "1", 60).await.unwrap();
        store.set_ex("b", "2", 60).await.unwrap();
        assert_eq!(store.keys().await.unwrap(), vec!["a", "b"]);

        store.flush().await.unwrap();
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_info_sections() {
        let store = MemoryStore::new();
        store.set_ex("a", "1", 60).await.unwrap();
        store.get("a").await.unwrap();
        store.get("missing").await.unwrap();

        let info = store.info().await.unwrap();
        let sections = parse_info(&info);
        assert!(sections.contains_key("server"));
        assert_eq!(sections["stats"]["keyspace_hits"], "1");
        assert_eq!(sections["stats"]["keyspace_misses"], "1");
    }
}
