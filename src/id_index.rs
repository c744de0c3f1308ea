//! ID index
//!
//! Secondary lookup from a contextual name (usually a parent entity's display
//! name) to the concrete cache keys of each entity type recorded under it.
//! Lets a later request that addresses an entity by a non-id argument (e.g.
//! lookup by name) recover the right cache key. Process lifetime only; owned
//! by one cache-manager instance and reset whenever the cache is cleared.

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct IdIndex {
    /// context name -> { bare type name -> fully-qualified cache keys }
    entries: DashMap<String, HashMap<String, Vec<String>>>,
    recorded: AtomicUsize,
    max_entries: usize,
}

impl IdIndex {
    pub fn new(max_entries: usize) -> Self {
        IdIndex {
            entries: DashMap::new(),
            recorded: AtomicUsize::new(0),
            max_entries,
        }
    }

    /// Record a cache key under a context name. New entries are dropped once
    /// the configured ceiling is reached; existing keys are never duplicated.
    pub fn record(&self, context: &str, bare_type: &str, full_key: &str) {
        if self.recorded.load(Ordering::Relaxed) >= self.max_entries {
            tracing::warn!(context, full_key, "ID index full, dropping entry");
            return;
        }
        let mut by_type = self.entries.entry(context.to_string()).or_default();
        let keys = by_type.entry(bare_type.to_string()).or_default();
        if !keys.iter().any(|existing| existing == full_key) {
            keys.push(full_key.to_string());
            self.recorded.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Cache keys recorded for a type under a context name
    pub fn lookup(&self, context: &str, bare_type: &str) -> Option<Vec<String>> {
        self.entries
            .get(context)
            .and_then(|by_type| by_type.get(bare_type).cloned())
    }

    /// Drop everything; called alongside a cache flush
    pub fn clear(&self) {
        self.entries.clear();
        self.recorded.store(0, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.recorded.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_lookup() {
        let index = IdIndex::new(100);
        index.record("Canada", "Country", "Country--1");
        index.record("Canada", "Country", "Country--1"); // duplicate ignored
        index.record("Canada", "City", "City--7");

        assert_eq!(
            index.lookup("Canada", "Country"),
            Some(vec!["Country--1".to_string()])
        );
        assert_eq!(index.lookup("Canada", "City"), Some(vec!["City--7".to_string()]));
        assert_eq!(index.lookup("Chile", "Country"), None);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_bounded() {
        let index = IdIndex::new(1);
        index.record("a", "T", "T--1");
        index.record("b", "T", "T--2");

        assert_eq!(index.len(), 1);
        assert_eq!(index.lookup("b", "T"), None);
    }

    #[test]
    fn test_clear() {
        let index = IdIndex::new(10);
        index.record("a", "T", "T--1");
        index.clear();
        assert!(index.is_empty());
        assert_eq!(index.lookup("a", "T"), None);
    }
}
