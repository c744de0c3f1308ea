//! Core type definitions shared across the cache pipeline

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Conventional spellings of a unique-identifier field or argument
pub const ID_SPELLINGS: [&str; 4] = ["id", "_id", "ID", "Id"];

/// Prefix marking introspection fields; queries touching these bypass the cache
pub const INTROSPECTION_PREFIX: &str = "__";

/// Literal scalar argument values carried on a prototype node
///
/// Only literal scalars survive compilation; variables, nulls, lists, and
/// objects route the whole operation around the cache before this type is
/// built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArgValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Enum(String),
}

impl ArgValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Render as GraphQL source text, preserving the scalar's type
    /// (strings quoted, numbers and booleans bare)
    pub fn render(&self) -> String {
        match self {
            ArgValue::Bool(b) => b.to_string(),
            ArgValue::Int(i) => i.to_string(),
            ArgValue::Float(f) => f.to_string(),
            ArgValue::String(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
            ArgValue::Enum(e) => e.clone(),
        }
    }

    /// Convert to a JSON value for comparison against stored record fields
    pub fn to_json(&self) -> Value {
        match self {
            ArgValue::Bool(b) => Value::Bool(*b),
            ArgValue::Int(i) => Value::from(*i),
            ArgValue::Float(f) => Value::from(*f),
            ArgValue::String(s) => Value::String(s.clone()),
            ArgValue::Enum(e) => Value::String(e.clone()),
        }
    }

    /// String form used when the value becomes part of a cache key
    pub fn key_text(&self) -> String {
        match self {
            ArgValue::String(s) | ArgValue::Enum(s) => s.clone(),
            ArgValue::Bool(b) => b.to_string(),
            ArgValue::Int(i) => i.to_string(),
            ArgValue::Float(f) => f.to_string(),
        }
    }
}

/// How much of the response was served from the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheHit {
    /// No origin call was needed
    Full,
    /// Cache partial merged with an origin remainder
    Partial,
    /// Entirely from the origin
    None,
}

/// Whether a field or argument name is a conventional identifier spelling
pub fn is_id_name(name: &str) -> bool {
    ID_SPELLINGS.contains(&name)
}

/// Cache key for an entity: `"{Type}--{id}"`, or bare `"{Type}"` without an id
pub fn entity_key(type_name: &str, id: Option<&str>) -> String {
    match id {
        Some(id) => format!("{}--{}", type_name, id),
        None => type_name.to_string(),
    }
}

/// Capitalize the first character, used for the second ID-index probe
pub fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_key() {
        assert_eq!(entity_key("Country", Some("1")), "Country--1");
        assert_eq!(entity_key("countries", None), "countries");
    }

    #[test]
    fn test_arg_value_render() {
        assert_eq!(ArgValue::String("NYC".to_string()).render(), "\"NYC\"");
        assert_eq!(ArgValue::Int(42).render(), "42");
        assert_eq!(ArgValue::Bool(true).render(), "true");
        assert_eq!(ArgValue::Float(1.5).render(), "1.5");
    }

    #[test]
    fn test_capitalize_first() {
        assert_eq!(capitalize_first("canada"), "Canada");
        assert_eq!(capitalize_first("Canada"), "Canada");
        assert_eq!(capitalize_first(""), "");
    }

    #[test]
    fn test_id_spellings() {
        assert!(is_id_name("id"));
        assert!(is_id_name("_id"));
        assert!(is_id_name("ID"));
        assert!(!is_id_name("name"));
    }
}
