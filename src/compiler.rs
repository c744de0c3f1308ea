//! AST Compiler
//!
//! Depth-first traversal of a parsed operation, producing the annotated
//! prototype template, the operation classification, and the fragment table.
//! Operations the cache cannot safely represent or re-issue are classified
//! out of the cache path instead of failing the request.

use crate::config::CacheConfig;
use crate::error::QueryError;
use crate::gql_ast::*;
use crate::prototype::{FieldShape, PrototypeNode};
use crate::schema::{SchemaMaps, TypeRef};
use crate::types::{capitalize_first, is_id_name, ArgValue, INTROSPECTION_PREFIX};
use std::collections::HashMap;

/// Classification of one compiled operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Query,
    Mutation,
    /// Cannot be cached or re-issued: directives, variable/null/list/object
    /// arguments, introspection fields, or a subscription
    Unquellable,
    /// Cacheable identity cannot be established for some selection set
    NoId,
}

/// Fragment name -> immediate field names
pub type FragmentTable = HashMap<String, Vec<String>>;

/// Output of compilation: the prototype, its classification, and fragments
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub prototype: PrototypeNode,
    pub kind: OperationKind,
    pub fragments: FragmentTable,
}

/// Why traversal stopped early
enum Abort {
    Unquellable,
    NoId,
}

/// Compile one operation of a parsed document into a prototype
pub fn compile(
    document: &Document,
    operation_name: Option<&str>,
    schema: &SchemaMaps,
    config: &CacheConfig,
) -> Result<CompiledQuery, QueryError> {
    let operation = document
        .operation(operation_name)
        .ok_or_else(|| match operation_name {
            Some(name) => QueryError::BadRequest(format!("Unknown operation '{}'", name)),
            None => QueryError::BadRequest("Document contains no operation".to_string()),
        })?;

    let fragments = collect_fragments(document);

    let kind = match operation.operation {
        OperationType::Query => OperationKind::Query,
        OperationType::Mutation => OperationKind::Mutation,
        OperationType::Subscription => {
            return Ok(CompiledQuery {
                prototype: PrototypeNode::new("Subscription"),
                kind: OperationKind::Unquellable,
                fragments,
            })
        }
    };

    if !operation.directives.is_empty() {
        return Ok(CompiledQuery {
            prototype: PrototypeNode::new(root_type_name(kind)),
            kind: OperationKind::Unquellable,
            fragments,
        });
    }

    let compiler = Compiler { schema, config };
    let mut root = PrototypeNode::new(root_type_name(kind));

    for selection in &operation.selection_set.selections {
        let field = match selection {
            Selection::Field(field) => field,
            // Fragments and inline fragments at the operation root cannot
            // establish per-field identity
            Selection::FragmentSpread(_) | Selection::InlineFragment(_) => {
                return Ok(aborted(kind, fragments, Abort::Unquellable))
            }
        };

        match compiler.compile_root_field(field, kind) {
            Ok((name, shape)) => root.insert_field(&name, shape),
            Err(abort) => return Ok(aborted(kind, fragments, abort)),
        }
    }

    splice_fragments(&mut root, &fragments);

    Ok(CompiledQuery {
        prototype: root,
        kind,
        fragments,
    })
}

fn root_type_name(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::Mutation => "Mutation",
        _ => "Query",
    }
}

fn aborted(kind: OperationKind, fragments: FragmentTable, abort: Abort) -> CompiledQuery {
    let kind = match abort {
        Abort::Unquellable => OperationKind::Unquellable,
        Abort::NoId => OperationKind::NoId,
    };
    CompiledQuery {
        prototype: PrototypeNode::new(root_type_name(kind)),
        kind,
        fragments,
    }
}

struct Compiler<'a> {
    schema: &'a SchemaMaps,
    config: &'a CacheConfig,
}

impl<'a> Compiler<'a> {
    fn compile_root_field(
        &self,
        field: &Field,
        kind: OperationKind,
    ) -> Result<(String, FieldShape), Abort> {
        let type_ref = match kind {
            OperationKind::Mutation => self
                .schema
                .mutation_type(&field.name)
                .map(|t| TypeRef::Single(t.to_string())),
            _ => self.schema.query_type(&field.name).cloned(),
        };
        let type_ref =
            type_ref.unwrap_or_else(|| TypeRef::Single(capitalize_first(&field.name)));

        let node = self.compile_field(field, type_ref.type_name())?;
        let shape = if type_ref.is_list() {
            FieldShape::EntityList(node)
        } else {
            FieldShape::Entity(node)
        };
        Ok((field.name.clone(), shape))
    }

    /// Compile one field that carries a selection set into a prototype node
    fn compile_field(&self, field: &Field, type_name: &str) -> Result<PrototypeNode, Abort> {
        self.check_field(field)?;

        let selection_set = field.selection_set.as_ref().ok_or(Abort::NoId)?;

        let mut node = PrototypeNode::new(type_name);
        node.alias = field.alias.clone();

        for (name, value) in &field.arguments {
            let arg = literal_arg(value).ok_or(Abort::Unquellable)?;
            if self.is_id_argument(name) && node.id.is_none() {
                node.id = Some(arg.key_text());
            }
            node.args.push((name.clone(), arg));
        }

        self.compile_selection_set(selection_set, &mut node)?;
        Ok(node)
    }

    fn compile_selection_set(
        &self,
        selection_set: &SelectionSet,
        node: &mut PrototypeNode,
    ) -> Result<(), Abort> {
        let mut has_id_field = false;
        let mut has_spread = false;

        for selection in &selection_set.selections {
            match selection {
                Selection::Field(field) => {
                    self.check_field(field)?;

                    match &field.selection_set {
                        Some(_) => {
                            let type_ref = self
                                .schema
                                .field_type(&node.type_name, &field.name)
                                .unwrap_or_else(|| {
                                    TypeRef::Single(capitalize_first(&field.name))
                                });
                            let child = self.compile_field(field, type_ref.type_name())?;
                            let shape = if type_ref.is_list() {
                                FieldShape::EntityList(child)
                            } else {
                                FieldShape::Entity(child)
                            };
                            node.insert_field(&field.name, shape);
                        }
                        None => {
                            // Aliased or argument-taking scalars cannot be
                            // mapped onto a flat cache record
                            if field.alias.is_some() || !field.arguments.is_empty() {
                                return Err(Abort::Unquellable);
                            }
                            if is_id_name(&field.name) {
                                has_id_field = true;
                            }
                            node.insert_field(&field.name, FieldShape::Scalar(true));
                        }
                    }
                }
                Selection::FragmentSpread(spread) => {
                    if !spread.directives.is_empty() {
                        return Err(Abort::Unquellable);
                    }
                    has_spread = true;
                    node.insert_field(&spread.name, FieldShape::FragmentSpread(spread.name.clone()));
                }
                Selection::InlineFragment(_) => return Err(Abort::Unquellable),
            }
        }

        if !has_id_field && !has_spread {
            return Err(Abort::NoId);
        }
        Ok(())
    }

    /// Conditions that route the whole operation around the cache
    fn check_field(&self, field: &Field) -> Result<(), Abort> {
        if !field.directives.is_empty() {
            return Err(Abort::Unquellable);
        }
        if field.name.starts_with(INTROSPECTION_PREFIX) {
            return Err(Abort::Unquellable);
        }
        for (_, value) in &field.arguments {
            if !value.is_scalar_literal() {
                return Err(Abort::Unquellable);
            }
        }
        Ok(())
    }

    fn is_id_argument(&self, name: &str) -> bool {
        match &self.config.user_defined_id {
            Some(configured) => name == configured,
            None => is_id_name(name),
        }
    }
}

fn literal_arg(value: &AstValue) -> Option<ArgValue> {
    match value {
        AstValue::Int(i) => Some(ArgValue::Int(*i)),
        AstValue::Float(f) => Some(ArgValue::Float(*f)),
        AstValue::String(s) => Some(ArgValue::String(s.clone())),
        AstValue::Boolean(b) => Some(ArgValue::Bool(*b)),
        AstValue::Enum(e) => Some(ArgValue::Enum(e.clone())),
        AstValue::Variable(_) | AstValue::Null | AstValue::List(_) | AstValue::Object(_) => None,
    }
}

/// Collect fragment definitions into a flat table of immediate field names
fn collect_fragments(document: &Document) -> FragmentTable {
    let mut table = FragmentTable::new();
    for fragment in document.fragments() {
        let fields = fragment
            .selection_set
            .selections
            .iter()
            .filter_map(|selection| match selection {
                Selection::Field(field) => Some(field.name.clone()),
                _ => None,
            })
            .collect();
        table.insert(fragment.name.clone(), fields);
    }
    table
}

/// Replace fragment-spread placeholders with the fragment's fields, recursing
/// into nested entities first
pub fn splice_fragments(node: &mut PrototypeNode, fragments: &FragmentTable) {
    for (_, shape) in &mut node.fields {
        match shape {
            FieldShape::Entity(child) | FieldShape::EntityList(child) => {
                splice_fragments(child, fragments)
            }
            _ => {}
        }
    }

    let mut spliced: Vec<(String, FieldShape)> = Vec::new();
    for (name, shape) in node.fields.drain(..) {
        match shape {
            FieldShape::FragmentSpread(fragment_name) => {
                if let Some(fields) = fragments.get(&fragment_name) {
                    for field in fields {
                        if !spliced.iter().any(|(existing, _)| existing == field) {
                            spliced.push((field.clone(), FieldShape::Scalar(true)));
                        }
                    }
                }
            }
            other => {
                if !spliced.iter().any(|(existing, _)| existing == &name) {
                    spliced.push((name, other));
                }
            }
        }
    }
    node.fields = spliced;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gql_parser::Parser;

    fn schema() -> SchemaMaps {
        let mut maps = SchemaMaps::new();
        maps.add_query("country", "Country");
        maps.add_query("countries", "[Country]");
        maps.add_query("book", "Book");
        maps.add_mutation("addBook", "Book");
        maps.add_field("Country", "capitol", "City");
        maps.add_field("Country", "cities", "[City]");
        maps
    }

    fn compile_source(source: &str) -> CompiledQuery {
        let document = Parser::parse(source).unwrap();
        compile(&document, None, &schema(), &CacheConfig::default()).unwrap()
    }

    #[test]
    fn test_basic_compile() {
        let compiled =
            compile_source("{ country(id: \"1\") { id name capitol { id name } } }");
        assert_eq!(compiled.kind, OperationKind::Query);

        let Some(FieldShape::Entity(country)) = compiled.prototype.field("country") else {
            panic!("expected entity");
        };
        assert_eq!(country.type_name, "Country");
        assert_eq!(country.id.as_deref(), Some("1"));
        assert_eq!(country.field("name"), Some(&FieldShape::Scalar(true)));

        let Some(FieldShape::Entity(capitol)) = country.field("capitol") else {
            panic!("expected nested entity");
        };
        assert_eq!(capitol.type_name, "City");
    }

    #[test]
    fn test_list_shape_from_schema() {
        let compiled = compile_source("{ countries { id name cities { id name } } }");
        let Some(FieldShape::EntityList(countries)) = compiled.prototype.field("countries")
        else {
            panic!("expected entity list");
        };
        assert!(matches!(countries.field("cities"), Some(FieldShape::EntityList(_))));
    }

    #[test]
    fn test_unquellable_directive() {
        let compiled = compile_source("{ country(id: \"1\") @live { id } }");
        assert_eq!(compiled.kind, OperationKind::Unquellable);
    }

    #[test]
    fn test_unquellable_variable_argument() {
        let compiled = compile_source("query ($x: ID) { country(id: $x) { id } }");
        assert_eq!(compiled.kind, OperationKind::Unquellable);
    }

    #[test]
    fn test_unquellable_introspection() {
        let compiled = compile_source("{ __schema { id types } }");
        assert_eq!(compiled.kind, OperationKind::Unquellable);
    }

    #[test]
    fn test_subscription_unquellable() {
        let compiled = compile_source("subscription { countryAdded { id } }");
        assert_eq!(compiled.kind, OperationKind::Unquellable);
    }

    #[test]
    fn test_no_id() {
        let compiled = compile_source("{ country(name: \"Chile\") { name population } }");
        assert_eq!(compiled.kind, OperationKind::NoId);
    }

    #[test]
    fn test_fragment_splice() {
        let compiled = compile_source(
            "{ book(id: \"3\") { ...BookFields } } fragment BookFields on Book { id name }",
        );
        assert_eq!(compiled.kind, OperationKind::Query);

        let Some(FieldShape::Entity(book)) = compiled.prototype.field("book") else {
            panic!("expected entity");
        };
        assert_eq!(book.field("id"), Some(&FieldShape::Scalar(true)));
        assert_eq!(book.field("name"), Some(&FieldShape::Scalar(true)));
        assert_eq!(book.fields.len(), 2);
    }

    #[test]
    fn test_mutation_type_from_map() {
        let compiled = compile_source("mutation { addBook(name: \"Dune\") { id name } }");
        assert_eq!(compiled.kind, OperationKind::Mutation);

        let Some(FieldShape::Entity(book)) = compiled.prototype.field("addBook") else {
            panic!("expected entity");
        };
        assert_eq!(book.type_name, "Book");
        assert_eq!(
            book.arg("name"),
            Some(&ArgValue::String("Dune".to_string()))
        );
    }

    #[test]
    fn test_user_defined_id() {
        let document = Parser::parse("{ book(isbn: \"999\") { id name } }").unwrap();
        let config = CacheConfig {
            user_defined_id: Some("isbn".to_string()),
            ..CacheConfig::default()
        };
        let compiled = compile(&document, None, &schema(), &config).unwrap();

        let Some(FieldShape::Entity(book)) = compiled.prototype.field("book") else {
            panic!("expected entity");
        };
        assert_eq!(book.id.as_deref(), Some("999"));
    }
}
