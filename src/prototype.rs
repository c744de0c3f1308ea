//! Prototype tree
//!
//! The per-request template describing every requested field, its cache
//! status, and resolution metadata. Compiled once from the AST, annotated by
//! the cache reader, consumed by the reducer, merger, and normalizer, then
//! discarded with the request. Never shared across requests.

use crate::types::{is_id_name, ArgValue};
use serde::{Deserialize, Serialize};

/// Shape of one requested field, assigned once during compilation
///
/// Scalar leaves carry the cache status: `true` means the value is available
/// from the cache, `false` means it must be fetched from the origin. Every
/// leaf starts `true`; the cache reader flips misses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldShape {
    Scalar(bool),
    Entity(PrototypeNode),
    EntityList(PrototypeNode),
    /// Placeholder for `...FragmentName`, removed by the splice pass
    FragmentSpread(String),
}

/// One node of the prototype tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrototypeNode {
    /// Entity type name this node resolves to
    pub type_name: String,
    /// Resolved unique identifier; once chosen it is never removed, even if
    /// the cache holds nothing for it — identity must survive the split
    pub id: Option<String>,
    /// Response alias, if the field was aliased
    pub alias: Option<String>,
    /// Literal scalar arguments, in query order
    pub args: Vec<(String, ArgValue)>,
    /// Requested children, in query order
    pub fields: Vec<(String, FieldShape)>,
}

impl PrototypeNode {
    pub fn new(type_name: &str) -> Self {
        PrototypeNode {
            type_name: type_name.to_string(),
            id: None,
            alias: None,
            args: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Key this node's value appears under in a response object
    pub fn response_key<'a>(&'a self, field_name: &'a str) -> &'a str {
        self.alias.as_deref().unwrap_or(field_name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldShape> {
        self.fields
            .iter()
            .find(|(field_name, _)| field_name == name)
            .map(|(_, shape)| shape)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut FieldShape> {
        self.fields
            .iter_mut()
            .find(|(field_name, _)| field_name == name)
            .map(|(_, shape)| shape)
    }

    pub fn insert_field(&mut self, name: &str, shape: FieldShape) {
        self.fields.push((name.to_string(), shape));
    }

    /// Value of an argument by name
    pub fn arg(&self, name: &str) -> Option<&ArgValue> {
        self.args
            .iter()
            .find(|(arg_name, _)| arg_name == name)
            .map(|(_, value)| value)
    }

    /// Arguments that are not identifier spellings (used for ID-index probes
    /// and id-less mutation matching)
    pub fn non_id_args(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.args
            .iter()
            .filter(|(name, _)| !is_id_name(name))
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Whether any scalar leaf in this subtree is marked as a miss
    pub fn has_misses(&self) -> bool {
        self.fields.iter().any(|(_, shape)| match shape {
            FieldShape::Scalar(cached) => !cached,
            FieldShape::Entity(child) | FieldShape::EntityList(child) => child.has_misses(),
            FieldShape::FragmentSpread(_) => false,
        })
    }

    /// Mark every scalar leaf in this subtree as a miss, forcing a full
    /// subtree re-fetch
    pub fn flip_all_misses(&mut self) {
        for (_, shape) in &mut self.fields {
            match shape {
                FieldShape::Scalar(cached) => *cached = false,
                FieldShape::Entity(child) | FieldShape::EntityList(child) => {
                    child.flip_all_misses()
                }
                FieldShape::FragmentSpread(_) => {}
            }
        }
    }

    /// Deepest entity nesting in this subtree; a node with only scalar
    /// children has depth 1
    pub fn depth(&self) -> usize {
        1 + self
            .fields
            .iter()
            .map(|(_, shape)| match shape {
                FieldShape::Entity(child) | FieldShape::EntityList(child) => child.depth(),
                _ => 0,
            })
            .max()
            .unwrap_or(0)
    }
}
