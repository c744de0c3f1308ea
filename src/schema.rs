//! Schema-derived type maps
//!
//! Three read-only dictionaries produced once at startup by schema
//! introspection: query name -> return type, mutation name -> affected type,
//! and type name -> field types. The cache core never re-derives them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Return type of a root query: a single entity or a list of them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeRef {
    Single(String),
    List(String),
}

impl TypeRef {
    /// Parse introspection text: `"[Book]"` is a list, `"Book"` a single
    pub fn parse(text: &str) -> TypeRef {
        let trimmed = text.trim_end_matches('!');
        if let Some(inner) = trimmed.strip_prefix('[') {
            TypeRef::List(inner.trim_end_matches(']').trim_end_matches('!').to_string())
        } else {
            TypeRef::Single(trimmed.to_string())
        }
    }

    /// The underlying entity type name
    pub fn type_name(&self) -> &str {
        match self {
            TypeRef::Single(name) | TypeRef::List(name) => name,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, TypeRef::List(_))
    }
}

/// The three immutable schema dictionaries supplied at startup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaMaps {
    /// Root query name -> return type
    pub query_map: HashMap<String, TypeRef>,
    /// Mutation name -> affected type name
    pub mutation_map: HashMap<String, String>,
    /// Type name -> { field name -> field type text, e.g. "City" or "[City]" }
    pub fields_map: HashMap<String, HashMap<String, String>>,
}

impl SchemaMaps {
    pub fn new() -> Self {
        SchemaMaps::default()
    }

    /// Register a root query and its return type text
    pub fn add_query(&mut self, query_name: &str, return_type: &str) {
        self.query_map
            .insert(query_name.to_string(), TypeRef::parse(return_type));
    }

    /// Register a mutation and the type it affects
    pub fn add_mutation(&mut self, mutation_name: &str, affected_type: &str) {
        self.mutation_map
            .insert(mutation_name.to_string(), affected_type.to_string());
    }

    /// Register one field of a type
    pub fn add_field(&mut self, type_name: &str, field_name: &str, field_type: &str) {
        self.fields_map
            .entry(type_name.to_string())
            .or_default()
            .insert(field_name.to_string(), field_type.to_string());
    }

    /// Return type of a root query, if known
    pub fn query_type(&self, query_name: &str) -> Option<&TypeRef> {
        self.query_map.get(query_name)
    }

    /// Type affected by a mutation, if known
    pub fn mutation_type(&self, mutation_name: &str) -> Option<&str> {
        self.mutation_map.get(mutation_name).map(|s| s.as_str())
    }

    /// Declared type of a field on an entity type, if known
    pub fn field_type(&self, type_name: &str, field_name: &str) -> Option<TypeRef> {
        self.fields_map
            .get(type_name)
            .and_then(|fields| fields.get(field_name))
            .map(|text| TypeRef::parse(text))
    }

    /// The root collection query returning a list of `type_name`, whose
    /// stored reference list must be kept in step by mutation invalidation
    pub fn fields_list_key(&self, type_name: &str) -> Option<&str> {
        self.query_map
            .iter()
            .find(|(_, type_ref)| type_ref.is_list() && type_ref.type_name() == type_name)
            .map(|(query_name, _)| query_name.as_str())
    }
}
