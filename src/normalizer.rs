//! Cache Normalizer
//!
//! Decomposes a unified response into flat, independently-addressable cache
//! records plus ID-index entries. Entity-valued fields are cached as their
//! own entries and also left embedded in the parent's stored record; the
//! read path depends on that embedding, so the two must stay in step.

use crate::config::CacheConfig;
use crate::id_index::IdIndex;
use crate::prototype::{FieldShape, PrototypeNode};
use crate::storage::CacheStore;
use crate::types::{entity_key, ID_SPELLINGS};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

pub struct Normalizer<'a> {
    store: &'a dyn CacheStore,
    id_index: &'a IdIndex,
    config: &'a CacheConfig,
}

impl<'a> Normalizer<'a> {
    pub fn new(store: &'a dyn CacheStore, id_index: &'a IdIndex, config: &'a CacheConfig) -> Self {
        Normalizer {
            store,
            id_index,
            config,
        }
    }

    /// Decompose a response into per-entity records. Store faults are logged
    /// and swallowed: normalization failure must never fail the request.
    pub async fn normalize_for_cache(
        &self,
        response: &Value,
        prototype: &PrototypeNode,
        context_name: Option<&str>,
    ) {
        for (name, shape) in &prototype.fields {
            let node = match shape {
                FieldShape::Entity(node) | FieldShape::EntityList(node) => node,
                _ => continue,
            };
            let value = match response.get(node.response_key(name)) {
                Some(value) => value,
                None => continue,
            };

            match shape {
                FieldShape::Entity(_) => {
                    if value.is_object() {
                        self.normalize_entity(value, node, context_name).await;
                    }
                }
                FieldShape::EntityList(_) => {
                    let Some(items) = value.as_array() else {
                        continue;
                    };
                    let mut member_keys = Vec::with_capacity(items.len());
                    for item in items {
                        if !item.is_object() {
                            continue;
                        }
                        if let Some(key) = self.normalize_entity(item, node, context_name).await {
                            member_keys.push(Value::String(key));
                        }
                    }
                    // Collection roots store an ordered reference list under
                    // the query's own name
                    self.write(name, &Value::Array(member_keys)).await;
                }
                _ => unreachable!(),
            }
        }
    }

    /// Cache one entity object, recursing into entity-valued fields.
    /// Returns the cache key the record was stored under.
    fn normalize_entity<'b>(
        &'b self,
        entity: &'b Value,
        node: &'b PrototypeNode,
        context_name: Option<&'b str>,
    ) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'b>> {
        Box::pin(async move {
            let payload_id = payload_id(entity);
            let id = node.id.clone().or_else(|| payload_id.clone());
            let key = entity_key(&node.type_name, id.as_deref());

            // The payload's own name field becomes the context for this
            // entity and everything below it
            let own_name = entity.get("name").and_then(|v| v.as_str());
            let effective_context = own_name.or(context_name);

            // The prototype had no id, so a later by-argument lookup needs
            // the index to recover this key
            if node.id.is_none() && payload_id.is_some() {
                if let Some(context) = effective_context {
                    self.id_index.record(context, &node.type_name, &key);
                }
            }

            for (field_name, shape) in &node.fields {
                let child = match shape {
                    FieldShape::Entity(child) | FieldShape::EntityList(child) => child,
                    _ => continue,
                };
                let Some(value) = entity.get(child.response_key(field_name)) else {
                    continue;
                };
                match value {
                    Value::Object(_) => {
                        self.normalize_entity(value, child, effective_context).await;
                    }
                    Value::Array(items) => {
                        for item in items {
                            if item.is_object() {
                                self.normalize_entity(item, child, effective_context).await;
                            }
                        }
                    }
                    _ => {}
                }
            }

            // Every field is copied into the flat record, embedded entities
            // included — the read path expects them in place
            self.write(&key, entity).await;
            Some(key)
        })
    }

    async fn write(&self, key: &str, value: &Value) {
        let text = match serde_json::to_string(value) {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(key, error = %err, "cache record serialization failed");
                return;
            }
        };
        if let Err(err) = self.store.set_ex(key, &text, self.config.ttl_secs).await {
            tracing::warn!(key, error = %err, "cache write failed");
        }
    }
}

/// Conventionally named identifier value in a payload object
pub fn payload_id(entity: &Value) -> Option<String> {
    for spelling in ID_SPELLINGS {
        match entity.get(spelling) {
            Some(Value::String(s)) => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}
