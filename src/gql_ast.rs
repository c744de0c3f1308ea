//! GraphQL Abstract Syntax Tree (AST)
//!
//! Represents the parsed structure of a GraphQL request document before
//! compilation into a prototype.

use serde::{Deserialize, Serialize};

/// A parsed request document: operations plus fragment definitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub definitions: Vec<Definition>,
}

impl Document {
    /// The operation to execute, honoring an optional operation name
    pub fn operation(&self, name: Option<&str>) -> Option<&OperationDefinition> {
        self.definitions.iter().find_map(|def| match def {
            Definition::Operation(op) => match name {
                Some(wanted) => (op.name.as_deref() == Some(wanted)).then_some(op),
                None => Some(op),
            },
            Definition::Fragment(_) => None,
        })
    }

    /// All fragment definitions in the document
    pub fn fragments(&self) -> impl Iterator<Item = &FragmentDefinition> {
        self.definitions.iter().filter_map(|def| match def {
            Definition::Fragment(frag) => Some(frag),
            Definition::Operation(_) => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Definition {
    Operation(OperationDefinition),
    Fragment(FragmentDefinition),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationType {
    Query,
    Mutation,
    Subscription,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationDefinition {
    pub operation: OperationType,
    pub name: Option<String>,
    pub variable_definitions: Vec<VariableDefinition>,
    pub directives: Vec<Directive>,
    pub selection_set: SelectionSet,
}

/// `$var: Type = default` in an operation header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDefinition {
    pub name: String,
    /// Rendered type text, e.g. "String!" or "[Int]"
    pub var_type: String,
    pub default: Option<AstValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionSet {
    pub selections: Vec<Selection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Selection {
    Field(Field),
    FragmentSpread(FragmentSpread),
    InlineFragment(InlineFragment),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub alias: Option<String>,
    pub name: String,
    pub arguments: Vec<(String, AstValue)>,
    pub directives: Vec<Directive>,
    pub selection_set: Option<SelectionSet>,
}

impl Field {
    /// Key this field appears under in a response object
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentSpread {
    pub name: String,
    pub directives: Vec<Directive>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineFragment {
    pub type_condition: Option<String>,
    pub directives: Vec<Directive>,
    pub selection_set: SelectionSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentDefinition {
    pub name: String,
    pub type_condition: String,
    pub directives: Vec<Directive>,
    pub selection_set: SelectionSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directive {
    pub name: String,
    pub arguments: Vec<(String, AstValue)>,
}

/// Literal values appearing in arguments and defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AstValue {
    Variable(String),
    Int(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Null,
    Enum(String),
    List(Vec<AstValue>),
    Object(Vec<(String, AstValue)>),
}

impl AstValue {
    /// Whether this value is a plain scalar literal that can be cached and
    /// re-issued verbatim (variables, nulls, lists, and objects cannot)
    pub fn is_scalar_literal(&self) -> bool {
        matches!(
            self,
            AstValue::Int(_)
                | AstValue::Float(_)
                | AstValue::String(_)
                | AstValue::Boolean(_)
                | AstValue::Enum(_)
        )
    }
}
