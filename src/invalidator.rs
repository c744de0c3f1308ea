//! Mutation Invalidator
//!
//! Surgical cache maintenance driven by mutation results: creates, updates,
//! or deletes the affected per-entity records and keeps the type's
//! fields-list index in step. Failures are logged and never block returning
//! the mutation's own result to the client.

use crate::config::CacheConfig;
use crate::normalizer::payload_id;
use crate::schema::SchemaMaps;
use crate::storage::CacheStore;
use crate::types::{entity_key, is_id_name, ArgValue};
use serde_json::Value;

/// Mutation-name prefixes marking a deletion
const DELETION_MARKERS: [&str; 2] = ["delete", "remove"];

pub struct Invalidator<'a> {
    store: &'a dyn CacheStore,
    schema: &'a SchemaMaps,
    config: &'a CacheConfig,
}

impl<'a> Invalidator<'a> {
    pub fn new(store: &'a dyn CacheStore, schema: &'a SchemaMaps, config: &'a CacheConfig) -> Self {
        Invalidator {
            store,
            schema,
            config,
        }
    }

    /// Apply one mutation's effect to the cache
    pub async fn update_cache_by_mutation(
        &self,
        origin_result: &Value,
        mutation_name: &str,
        mutation_type: &str,
        mutation_args: &[(String, ArgValue)],
    ) {
        let payload = origin_result.get(mutation_name).cloned().unwrap_or(Value::Null);
        let is_delete = is_deletion(mutation_name);
        let fields_list_key = self.schema.fields_list_key(mutation_type);

        let explicit_id = mutation_args
            .iter()
            .find(|(name, _)| is_id_name(name))
            .map(|(_, value)| value.key_text());
        let id = explicit_id.clone().or_else(|| payload_id(&payload));

        let Some(id) = id else {
            // No id anywhere: fall back to scanning the fields-list index
            self.scan_and_apply(fields_list_key, mutation_args, is_delete).await;
            return;
        };

        let key = entity_key(mutation_type, Some(&id));
        let existing = match self.store.get(&key).await {
            Ok(existing) => existing,
            Err(err) => {
                tracing::warn!(key, error = %err, "invalidation read failed");
                return;
            }
        };

        match existing {
            // No entry yet: treat as create
            None => {
                self.write_record(&key, &payload).await;
                if let Some(list_key) = fields_list_key {
                    self.append_to_list(list_key, &key).await;
                }
            }
            Some(stored) if explicit_id.is_some() => {
                if is_delete {
                    self.delete_key(&key, fields_list_key).await;
                } else {
                    // Single-key overwrite, keeping fields the mutation
                    // result does not mention
                    let merged = overlay(&stored, &payload);
                    self.write_record(&key, &merged).await;
                }
            }
            // Entry exists but the id came from the payload, not the
            // arguments: match records by argument values instead
            Some(_) => {
                self.scan_and_apply(fields_list_key, mutation_args, is_delete).await;
            }
        }
    }

    /// O(index size) scan supporting id-less mutations: compare each indexed
    /// record's stored values against the mutation's non-id arguments
    async fn scan_and_apply(
        &self,
        fields_list_key: Option<&str>,
        mutation_args: &[(String, ArgValue)],
        is_delete: bool,
    ) {
        let Some(list_key) = fields_list_key else {
            tracing::warn!("no fields-list key for id-less mutation, cache left untouched");
            return;
        };
        let member_keys = self.read_list(list_key).await;
        if member_keys.is_empty() {
            return;
        }

        let records = match self.store.mget(&member_keys).await {
            Ok(records) => records,
            Err(err) => {
                tracing::warn!(list_key, error = %err, "invalidation scan failed");
                return;
            }
        };

        let matchable: Vec<(&String, &ArgValue)> = mutation_args
            .iter()
            .filter(|(name, _)| !name.to_lowercase().contains("id"))
            .map(|(name, value)| (name, value))
            .collect();

        for (member_key, record_text) in member_keys.iter().zip(records) {
            let Some(record) = record_text.and_then(|t| serde_json::from_str::<Value>(&t).ok())
            else {
                continue;
            };

            if is_delete {
                let all_match = matchable
                    .iter()
                    .all(|(name, value)| record.get(name.as_str()) == Some(&value.to_json()));
                if all_match && !matchable.is_empty() {
                    self.delete_key(member_key, Some(list_key)).await;
                }
            } else {
                let (matching, updates): (Vec<_>, Vec<_>) = matchable
                    .iter()
                    .partition(|(name, value)| record.get(name.as_str()) == Some(&value.to_json()));
                if matching.is_empty() || updates.is_empty() {
                    continue;
                }
                let mut updated = record.clone();
                if let Some(fields) = updated.as_object_mut() {
                    for (name, value) in updates {
                        fields.insert(name.to_string(), value.to_json());
                    }
                }
                self.write_record(member_key, &updated).await;
            }
        }
    }

    async fn delete_key(&self, key: &str, fields_list_key: Option<&str>) {
        if let Err(err) = self.store.del(key).await {
            tracing::warn!(key, error = %err, "invalidation delete failed");
        }
        if let Some(list_key) = fields_list_key {
            let remaining: Vec<Value> = self
                .read_list(list_key)
                .await
                .into_iter()
                .filter(|member| member != key)
                .map(Value::String)
                .collect();
            self.write_record(list_key, &Value::Array(remaining)).await;
        }
    }

    async fn append_to_list(&self, list_key: &str, key: &str) {
        let mut members = self.read_list(list_key).await;
        if !members.iter().any(|member| member == key) {
            members.push(key.to_string());
        }
        let value = Value::Array(members.into_iter().map(Value::String).collect());
        self.write_record(list_key, &value).await;
    }

    async fn read_list(&self, list_key: &str) -> Vec<String> {
        match self.store.get(list_key).await {
            Ok(Some(text)) => serde_json::from_str::<Vec<String>>(&text).unwrap_or_default(),
            Ok(None) => Vec::new(),
            Err(err) => {
                tracing::warn!(list_key, error = %err, "fields-list read failed");
                Vec::new()
            }
        }
    }

    async fn write_record(&self, key: &str, value: &Value) {
        match serde_json::to_string(value) {
            Ok(text) => {
                if let Err(err) = self.store.set_ex(key, &text, self.config.ttl_secs).await {
                    tracing::warn!(key, error = %err, "invalidation write failed");
                }
            }
            Err(err) => tracing::warn!(key, error = %err, "invalidation serialization failed"),
        }
    }
}

/// Overlay the mutation payload on top of the stored record, keeping any
/// stored fields the payload does not mention
fn overlay(stored_text: &str, payload: &Value) -> Value {
    let mut base = serde_json::from_str::<Value>(stored_text).unwrap_or(Value::Null);
    match (base.as_object_mut(), payload.as_object()) {
        (Some(fields), Some(updates)) => {
            for (name, value) in updates {
                fields.insert(name.clone(), value.clone());
            }
            base
        }
        _ => payload.clone(),
    }
}

fn is_deletion(mutation_name: &str) -> bool {
    let lower = mutation_name.to_lowercase();
    DELETION_MARKERS.iter().any(|marker| lower.starts_with(marker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::json;

    fn schema() -> SchemaMaps {
        let mut maps = SchemaMaps::new();
        maps.add_query("books", "[Book]");
        maps.add_mutation("addBook", "Book");
        maps.add_mutation("changeBook", "Book");
        maps.add_mutation("deleteBook", "Book");
        maps
    }

    fn args(pairs: &[(&str, ArgValue)]) -> Vec<(String, ArgValue)> {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_create_writes_entry_and_list() {
        let store = MemoryStore::new();
        let schema = schema();
        let config = CacheConfig::default();
        let invalidator = Invalidator::new(&store, &schema, &config);

        let result = json!({ "addBook": { "id": "9", "name": "Dune" } });
        invalidator
            .update_cache_by_mutation(
                &result,
                "addBook",
                "Book",
                &args(&[("name", ArgValue::String("Dune".to_string()))]),
            )
            .await;

        assert_eq!(
            store.get("Book--9").await.unwrap().unwrap(),
            "{\"id\":\"9\",\"name\":\"Dune\"}"
        );
        assert_eq!(store.get("books").await.unwrap().unwrap(), "[\"Book--9\"]");
    }

    #[tokio::test]
    async fn test_explicit_id_delete() {
        let store = MemoryStore::new();
        store.set_ex("Book--9", "{\"id\":\"9\"}", 60).await.unwrap();
        store.set_ex("books", "[\"Book--9\"]", 60).await.unwrap();
        let schema = schema();
        let config = CacheConfig::default();
        let invalidator = Invalidator::new(&store, &schema, &config);

        let result = json!({ "deleteBook": { "id": "9" } });
        invalidator
            .update_cache_by_mutation(
                &result,
                "deleteBook",
                "Book",
                &args(&[("id", ArgValue::String("9".to_string()))]),
            )
            .await;

        assert_eq!(store.get("Book--9").await.unwrap(), None);
        assert_eq!(store.get("books").await.unwrap().unwrap(), "[]");
    }

    #[tokio::test]
    async fn test_explicit_id_overwrite_keeps_unmentioned_fields() {
        let store = MemoryStore::new();
        store
            .set_ex("Book--9", "{\"id\":\"9\",\"name\":\"Dune\",\"year\":1965}", 60)
            .await
            .unwrap();
        let schema = schema();
        let config = CacheConfig::default();
        let invalidator = Invalidator::new(&store, &schema, &config);

        let result = json!({ "changeBook": { "id": "9", "name": "Dune Messiah" } });
        invalidator
            .update_cache_by_mutation(
                &result,
                "changeBook",
                "Book",
                &args(&[
                    ("id", ArgValue::String("9".to_string())),
                    ("name", ArgValue::String("Dune Messiah".to_string())),
                ]),
            )
            .await;

        let record: Value =
            serde_json::from_str(&store.get("Book--9").await.unwrap().unwrap()).unwrap();
        assert_eq!(record["name"], "Dune Messiah");
        assert_eq!(record["year"], 1965);
    }

    #[tokio::test]
    async fn test_idless_delete_scans_index() {
        let store = MemoryStore::new();
        store
            .set_ex("Book--1", "{\"id\":\"1\",\"name\":\"Dune\"}", 60)
            .await
            .unwrap();
        store
            .set_ex("Book--2", "{\"id\":\"2\",\"name\":\"Solaris\"}", 60)
            .await
            .unwrap();
        store
            .set_ex("books", "[\"Book--1\",\"Book--2\"]", 60)
            .await
            .unwrap();
        let schema = schema();
        let config = CacheConfig::default();
        let invalidator = Invalidator::new(&store, &schema, &config);

        let result = json!({ "deleteBook": {} });
        invalidator
            .update_cache_by_mutation(
                &result,
                "deleteBook",
                "Book",
                &args(&[("name", ArgValue::String("Solaris".to_string()))]),
            )
            .await;

        assert!(store.get("Book--1").await.unwrap().is_some());
        assert_eq!(store.get("Book--2").await.unwrap(), None);
        assert_eq!(store.get("books").await.unwrap().unwrap(), "[\"Book--1\"]");
    }

    #[tokio::test]
    async fn test_idless_update_matches_and_rewrites() {
        let store = MemoryStore::new();
        store
            .set_ex("Book--1", "{\"id\":\"1\",\"name\":\"Dune\",\"year\":1963}", 60)
            .await
            .unwrap();
        store.set_ex("books", "[\"Book--1\"]", 60).await.unwrap();
        let schema = schema();
        let config = CacheConfig::default();
        let invalidator = Invalidator::new(&store, &schema, &config);

        let result = json!({ "changeBook": {} });
        invalidator
            .update_cache_by_mutation(
                &result,
                "changeBook",
                "Book",
                &args(&[
                    ("name", ArgValue::String("Dune".to_string())),
                    ("year", ArgValue::Int(1965)),
                ]),
            )
            .await;

        let record: Value =
            serde_json::from_str(&store.get("Book--1").await.unwrap().unwrap()).unwrap();
        assert_eq!(record["year"], 1965);
        assert_eq!(record["name"], "Dune");
    }

    #[test]
    fn test_deletion_markers() {
        assert!(is_deletion("deleteBook"));
        assert!(is_deletion("removeCity"));
        assert!(is_deletion("DeleteBook"));
        assert!(!is_deletion("addBook"));
    }
}
