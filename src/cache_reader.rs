//! Cache Reader
//!
//! Reconstructs the cached portion of a request from flat store records,
//! flipping prototype scalar leaves to `false` wherever data is missing.
//! Store I/O failures are logged and treated as misses — the cache layer
//! fails open and the request degrades to origin resolution.

use crate::config::CacheConfig;
use crate::id_index::IdIndex;
use crate::prototype::{FieldShape, PrototypeNode};
use crate::storage::CacheStore;
use crate::types::{capitalize_first, entity_key};
use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;

pub struct CacheReader<'a> {
    store: &'a dyn CacheStore,
    id_index: &'a IdIndex,
    config: &'a CacheConfig,
}

impl<'a> CacheReader<'a> {
    pub fn new(store: &'a dyn CacheStore, id_index: &'a IdIndex, config: &'a CacheConfig) -> Self {
        CacheReader {
            store,
            id_index,
            config,
        }
    }

    /// Read every root field of the prototype from the cache, marking misses
    /// in place. Returns the partial response data object.
    pub async fn build_from_cache(&self, prototype: &mut PrototypeNode) -> Value {
        let mut data = Map::new();

        for (name, shape) in prototype.fields.iter_mut() {
            match shape {
                FieldShape::Entity(node) => {
                    let key = self.resolve_entity_key(node);
                    let response_key = node.response_key(name).to_string();
                    let value = self.read_entity(&key, node).await;
                    data.insert(response_key, value);
                }
                FieldShape::EntityList(node) => {
                    let response_key = node.response_key(name).to_string();
                    let value = self.read_collection(name, node).await;
                    data.insert(response_key, value);
                }
                // Root scalars have no cache representation
                FieldShape::Scalar(cached) => *cached = false,
                FieldShape::FragmentSpread(_) => {}
            }
        }

        Value::Object(data)
    }

    /// Cache key for a root entity field: `"{Type}--{id}"`, substituting an
    /// ID-index hit when the field was addressed by a non-id argument
    fn resolve_entity_key(&self, node: &PrototypeNode) -> String {
        if node.id.is_some() {
            return entity_key(&node.type_name, node.id.as_deref());
        }

        for (_, value) in node.non_id_args() {
            let context = value.key_text();
            let indexed = self
                .id_index
                .lookup(&context, &node.type_name)
                .or_else(|| self.id_index.lookup(&capitalize_first(&context), &node.type_name));
            if let Some(keys) = indexed {
                if let Some(key) = keys.first() {
                    return key.clone();
                }
            }
        }

        entity_key(&node.type_name, None)
    }

    async fn read_entity(&self, key: &str, node: &mut PrototypeNode) -> Value {
        match self.fetch_record(key).await {
            Some(record) if record.is_object() => self.copy_entity(&record, node, key.to_string()).await,
            Some(_) | None => {
                node.flip_all_misses();
                Value::Object(Map::new())
            }
        }
    }

    /// A root collection stores an ordered list of member keys under the
    /// query's own name
    async fn read_collection(&self, query_name: &str, node: &mut PrototypeNode) -> Value {
        match self.fetch_record(query_name).await {
            Some(Value::Array(items)) => {
                let member_keys: Vec<String> = items
                    .iter()
                    .filter_map(|item| item.as_str().map(|s| s.to_string()))
                    .collect();
                if member_keys.len() != items.len() {
                    // Not a reference list; force a re-fetch
                    node.flip_all_misses();
                    return Value::Array(Vec::new());
                }
                match self.read_members(&member_keys, node).await {
                    Some(members) => Value::Array(members),
                    // A member record was evicted: the partial list cannot
                    // be merged item-by-item, so discard it and re-fetch
                    None => {
                        node.flip_all_misses();
                        Value::Array(Vec::new())
                    }
                }
            }
            Some(_) | None => {
                node.flip_all_misses();
                Value::Array(Vec::new())
            }
        }
    }

    /// Fetch collection members in pipelined batches to bound round trips.
    /// Returns None when any member record is wholly absent.
    async fn read_members(
        &self,
        keys: &[String],
        node: &mut PrototypeNode,
    ) -> Option<Vec<Value>> {
        let mut members = Vec::with_capacity(keys.len());

        for chunk in keys.chunks(self.config.batch_size.max(1)) {
            let values = match self.store.batch_get(chunk).await {
                Ok(values) => values,
                Err(err) => {
                    tracing::warn!(error = %err, "batched cache read failed, treating as misses");
                    return None;
                }
            };

            for (member_key, value) in chunk.iter().zip(values) {
                match value.and_then(|text| parse_record(&text, member_key)) {
                    Some(record) if record.is_object() => {
                        members.push(self.copy_entity(&record, node, member_key.clone()).await);
                    }
                    _ => return None,
                }
            }
        }
        Some(members)
    }

    /// Copy prototype-requested fields out of a flat record, recursing into
    /// nested entities. A nested entity not embedded in the record is looked
    /// up under the synthetic key `"{parentKey}--{field}"`.
    fn copy_entity<'b>(
        &'b self,
        record: &'b Value,
        node: &'b mut PrototypeNode,
        parent_key: String,
    ) -> Pin<Box<dyn Future<Output = Value> + Send + 'b>> {
        Box::pin(async move {
            let mut out = Map::new();

            for (field_name, shape) in node.fields.iter_mut() {
                match shape {
                    FieldShape::Scalar(cached) => match record.get(field_name.as_str()) {
                        Some(value) => {
                            out.insert(field_name.clone(), value.clone());
                        }
                        None => *cached = false,
                    },
                    FieldShape::Entity(child) => {
                        let response_key = child.response_key(field_name).to_string();
                        let synthetic = format!("{}--{}", parent_key, field_name);
                        match record.get(field_name.as_str()) {
                            Some(embedded) if embedded.is_object() => {
                                let value = self.copy_entity(embedded, child, synthetic).await;
                                out.insert(response_key, value);
                            }
                            Some(_) => child.flip_all_misses(),
                            None => match self.fetch_record(&synthetic).await {
                                Some(fetched) if fetched.is_object() => {
                                    let value =
                                        self.copy_entity(&fetched, child, synthetic).await;
                                    out.insert(response_key, value);
                                }
                                _ => child.flip_all_misses(),
                            },
                        }
                    }
                    FieldShape::EntityList(child) => {
                        let response_key = child.response_key(field_name).to_string();
                        match record.get(field_name.as_str()) {
                            Some(Value::Array(items)) => {
                                let mut members = Vec::with_capacity(items.len());
                                for item in items {
                                    if item.is_object() {
                                        let item_key =
                                            format!("{}--{}", parent_key, field_name);
                                        members.push(
                                            self.copy_entity(item, child, item_key).await,
                                        );
                                    } else {
                                        child.flip_all_misses();
                                    }
                                }
                                out.insert(response_key, Value::Array(members));
                            }
                            _ => child.flip_all_misses(),
                        }
                    }
                    FieldShape::FragmentSpread(_) => {}
                }
            }

            Value::Object(out)
        })
    }

    /// GET + JSON parse, logging faults and treating them as misses
    async fn fetch_record(&self, key: &str) -> Option<Value> {
        match self.store.get(key).await {
            Ok(Some(text)) => parse_record(&text, key),
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(key, error = %err, "cache read failed, treating as miss");
                None
            }
        }
    }
}

fn parse_record(text: &str, key: &str) -> Option<Value> {
    match serde_json::from_str(text) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(key, error = %err, "unparseable cache record, treating as miss");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn book_proto(id: &str) -> PrototypeNode {
        let mut root = PrototypeNode::new("Query");
        let mut book = PrototypeNode::new("Book");
        book.id = Some(id.to_string());
        book.insert_field("id", FieldShape::Scalar(true));
        book.insert_field("name", FieldShape::Scalar(true));
        root.insert_field("book", FieldShape::Entity(book));
        root
    }

    #[tokio::test]
    async fn test_empty_store_marks_misses() {
        let store = MemoryStore::new();
        let index = IdIndex::new(100);
        let config = CacheConfig::default();
        let reader = CacheReader::new(&store, &index, &config);

        let mut proto = book_proto("3");
        let data = reader.build_from_cache(&mut proto).await;

        assert_eq!(data, serde_json::json!({ "book": {} }));
        let Some(FieldShape::Entity(book)) = proto.field("book") else {
            panic!("expected entity");
        };
        assert_eq!(book.field("name"), Some(&FieldShape::Scalar(false)));
        // Identity metadata survives the miss
        assert_eq!(book.id.as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn test_full_hit() {
        let store = MemoryStore::new();
        store
            .set_ex("Book--3", "{\"id\":\"3\",\"name\":\"Dune\"}", 60)
            .await
            .unwrap();
        let index = IdIndex::new(100);
        let config = CacheConfig::default();
        let reader = CacheReader::new(&store, &index, &config);

        let mut proto = book_proto("3");
        let data = reader.build_from_cache(&mut proto).await;

        assert_eq!(data, serde_json::json!({ "book": { "id": "3", "name": "Dune" } }));
        assert!(!proto.has_misses());
    }

    #[tokio::test]
    async fn test_partial_hit_flips_only_missing() {
        let store = MemoryStore::new();
        store.set_ex("Book--3", "{\"id\":\"3\"}", 60).await.unwrap();
        let index = IdIndex::new(100);
        let config = CacheConfig::default();
        let reader = CacheReader::new(&store, &index, &config);

        let mut proto = book_proto("3");
        let data = reader.build_from_cache(&mut proto).await;

        assert_eq!(data, serde_json::json!({ "book": { "id": "3" } }));
        let Some(FieldShape::Entity(book)) = proto.field("book") else {
            panic!("expected entity");
        };
        assert_eq!(book.field("id"), Some(&FieldShape::Scalar(true)));
        assert_eq!(book.field("name"), Some(&FieldShape::Scalar(false)));
    }

    #[tokio::test]
    async fn test_collection_reference_list() {
        let store = MemoryStore::new();
        store
            .set_ex("books", "[\"Book--1\",\"Book--2\"]", 60)
            .await
            .unwrap();
        store
            .set_ex("Book--1", "{\"id\":\"1\",\"name\":\"Dune\"}", 60)
            .await
            .unwrap();
        store
            .set_ex("Book--2", "{\"id\":\"2\",\"name\":\"Solaris\"}", 60)
            .await
            .unwrap();
        let index = IdIndex::new(100);
        let config = CacheConfig::default();
        let reader = CacheReader::new(&store, &index, &config);

        let mut root = PrototypeNode::new("Query");
        let mut book = PrototypeNode::new("Book");
        book.insert_field("id", FieldShape::Scalar(true));
        book.insert_field("name", FieldShape::Scalar(true));
        root.insert_field("books", FieldShape::EntityList(book));

        let data = reader.build_from_cache(&mut root).await;
        assert_eq!(
            data,
            serde_json::json!({ "books": [
                { "id": "1", "name": "Dune" },
                { "id": "2", "name": "Solaris" },
            ]})
        );
        assert!(!root.has_misses());
    }

    #[tokio::test]
    async fn test_evicted_member_discards_partial_list() {
        let store = MemoryStore::new();
        store
            .set_ex("books", "[\"Book--1\",\"Book--2\"]", 60)
            .await
            .unwrap();
        store
            .set_ex("Book--1", "{\"id\":\"1\",\"name\":\"Dune\"}", 60)
            .await
            .unwrap();
        // Book--2 has been evicted
        let index = IdIndex::new(100);
        let config = CacheConfig::default();
        let reader = CacheReader::new(&store, &index, &config);

        let mut root = PrototypeNode::new("Query");
        let mut book = PrototypeNode::new("Book");
        book.insert_field("id", FieldShape::Scalar(true));
        book.insert_field("name", FieldShape::Scalar(true));
        root.insert_field("books", FieldShape::EntityList(book));

        // The surviving member must not leak into the partial: a stale
        // one-member list would be concatenated with the re-fetched
        // collection downstream
        let data = reader.build_from_cache(&mut root).await;
        assert_eq!(data, serde_json::json!({ "books": [] }));
        assert!(root.has_misses());
    }

    #[tokio::test]
    async fn test_nested_entity_via_synthetic_key() {
        let store = MemoryStore::new();
        store
            .set_ex("Country--1", "{\"id\":\"1\",\"name\":\"Chile\"}", 60)
            .await
            .unwrap();
        store
            .set_ex("Country--1--capitol", "{\"id\":\"9\",\"name\":\"Santiago\"}", 60)
            .await
            .unwrap();
        let index = IdIndex::new(100);
        let config = CacheConfig::default();
        let reader = CacheReader::new(&store, &index, &config);

        let mut root = PrototypeNode::new("Query");
        let mut country = PrototypeNode::new("Country");
        country.id = Some("1".to_string());
        country.insert_field("id", FieldShape::Scalar(true));
        let mut capitol = PrototypeNode::new("City");
        capitol.insert_field("id", FieldShape::Scalar(true));
        capitol.insert_field("name", FieldShape::Scalar(true));
        country.insert_field("capitol", FieldShape::Entity(capitol));
        root.insert_field("country", FieldShape::Entity(country));

        let data = reader.build_from_cache(&mut root).await;
        assert_eq!(
            data,
            serde_json::json!({ "country": {
                "id": "1",
                "capitol": { "id": "9", "name": "Santiago" },
            }})
        );
        assert!(!root.has_misses());
    }

    #[tokio::test]
    async fn test_id_index_substitution() {
        let store = MemoryStore::new();
        store
            .set_ex("Country--1", "{\"id\":\"1\",\"name\":\"Canada\"}", 60)
            .await
            .unwrap();
        let index = IdIndex::new(100);
        index.record("Canada", "Country", "Country--1");
        let config = CacheConfig::default();
        let reader = CacheReader::new(&store, &index, &config);

        let mut root = PrototypeNode::new("Query");
        let mut country = PrototypeNode::new("Country");
        country
            .args
            .push(("name".to_string(), crate::types::ArgValue::String("canada".to_string())));
        country.insert_field("id", FieldShape::Scalar(true));
        country.insert_field("name", FieldShape::Scalar(true));
        root.insert_field("country", FieldShape::Entity(country));

        // Lookup by lowercase argument still resolves via the capitalized probe
        let data = reader.build_from_cache(&mut root).await;
        assert_eq!(
            data,
            serde_json::json!({ "country": { "id": "1", "name": "Canada" } })
        );
    }
}
