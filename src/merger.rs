//! Response Merger
//!
//! Joins the cache-partial result with the origin result for the reduced
//! query, recursing per prototype key. Never panics on a branch absent from
//! either side — an absent side passes the other through unchanged.

use crate::prototype::{FieldShape, PrototypeNode};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Merge the two response halves into the unified response
pub fn join_responses(cache_part: &Value, origin_part: &Value, prototype: &PrototypeNode) -> Value {
    merge_values(Some(cache_part), Some(origin_part), Some(prototype))
        .unwrap_or(Value::Object(Map::new()))
}

fn merge_values(
    cache: Option<&Value>,
    origin: Option<&Value>,
    node: Option<&PrototypeNode>,
) -> Option<Value> {
    match (cache, origin) {
        (None, None) => None,
        (Some(value), None) | (None, Some(value)) => Some(value.clone()),
        (Some(cache), Some(origin)) => Some(merge_present(cache, origin, node)),
    }
}

fn merge_present(cache: &Value, origin: &Value, node: Option<&PrototypeNode>) -> Value {
    match (cache, origin) {
        (Value::Array(cache_items), Value::Array(origin_items)) => {
            if item_field_set(cache_items) == item_field_set(origin_items) {
                // Identical field sets: the two lists are disjoint partitions
                let mut joined = cache_items.clone();
                joined.extend(origin_items.iter().cloned());
                Value::Array(joined)
            } else {
                // Differing sets: each index carries different field coverage
                // of the same logical item
                let len = cache_items.len().max(origin_items.len());
                let merged = (0..len)
                    .filter_map(|i| merge_values(cache_items.get(i), origin_items.get(i), node))
                    .collect();
                Value::Array(merged)
            }
        }
        // Only one side has a list: pass it through unchanged
        (list @ Value::Array(_), _) | (_, list @ Value::Array(_)) => list.clone(),
        (Value::Object(cache_fields), Value::Object(origin_fields)) => {
            let mut merged = cache_fields.clone();
            for (key, value) in origin_fields {
                merged.insert(key.clone(), value.clone());
            }

            // Deep-merge entity-typed children per the prototype
            if let Some(node) = node {
                for (name, shape) in &node.fields {
                    let child = match shape {
                        FieldShape::Entity(child) | FieldShape::EntityList(child) => child,
                        _ => continue,
                    };
                    let key = child.response_key(name);
                    if let Some(value) =
                        merge_values(cache_fields.get(key), origin_fields.get(key), Some(child))
                    {
                        merged.insert(key.to_string(), value);
                    }
                }
            }
            Value::Object(merged)
        }
        // The reduced query only asked for missing leaves; an origin null
        // never overwrites data the cache already holds
        (cache, Value::Null) if !cache.is_null() => cache.clone(),
        // Scalar on both sides: the origin value is fresher
        (_, origin) => origin.clone(),
    }
}

/// Union of field names across a list's items, used to tell disjoint
/// partitions apart from split field coverage
fn item_field_set(items: &[Value]) -> BTreeSet<String> {
    items
        .iter()
        .filter_map(|item| item.as_object())
        .flat_map(|fields| fields.keys().cloned())
        .collect()
}
