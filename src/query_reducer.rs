//! Query Reducer
//!
//! Builds the minimal follow-up request from a miss-annotated prototype:
//! first a filtered projection keeping only branches that still need data,
//! then GraphQL source text rendered from that projection. An empty
//! projection renders to an empty string — nothing remains to fetch.

use crate::compiler::OperationKind;
use crate::prototype::{FieldShape, PrototypeNode};
use crate::types::is_id_name;

/// Filtered projection of the prototype: only branches containing at least
/// one miss or a nested entity needing data. The unique-id field is always
/// force-included regardless of its cache status — identity must survive
/// the split.
pub fn create_query_obj(prototype: &PrototypeNode) -> PrototypeNode {
    let mut reduced = PrototypeNode::new(&prototype.type_name);

    for (name, shape) in &prototype.fields {
        match shape {
            FieldShape::Entity(node) => {
                if let Some(child) = reduce_node(node) {
                    reduced.insert_field(name, FieldShape::Entity(child));
                }
            }
            FieldShape::EntityList(node) => {
                if let Some(child) = reduce_node(node) {
                    reduced.insert_field(name, FieldShape::EntityList(child));
                }
            }
            FieldShape::Scalar(false) => reduced.insert_field(name, FieldShape::Scalar(false)),
            FieldShape::Scalar(true) | FieldShape::FragmentSpread(_) => {}
        }
    }

    reduced
}

fn reduce_node(node: &PrototypeNode) -> Option<PrototypeNode> {
    let mut reduced = PrototypeNode {
        type_name: node.type_name.clone(),
        id: node.id.clone(),
        alias: node.alias.clone(),
        args: node.args.clone(),
        fields: Vec::new(),
    };
    let mut actionable = 0;

    for (name, shape) in &node.fields {
        match shape {
            FieldShape::Scalar(cached) => {
                if is_id_name(name) {
                    // Force-included; does not count toward retention
                    reduced.insert_field(name, FieldShape::Scalar(*cached));
                } else if !cached {
                    reduced.insert_field(name, FieldShape::Scalar(false));
                    actionable += 1;
                }
            }
            FieldShape::Entity(child) => {
                if let Some(inner) = reduce_node(child) {
                    reduced.insert_field(name, FieldShape::Entity(inner));
                    actionable += 1;
                }
            }
            FieldShape::EntityList(child) => {
                if let Some(inner) = reduce_node(child) {
                    reduced.insert_field(name, FieldShape::EntityList(inner));
                    actionable += 1;
                }
            }
            FieldShape::FragmentSpread(_) => {}
        }
    }

    (actionable > 0).then_some(reduced)
}

/// Render the filtered projection back into GraphQL source text
pub fn create_query_str(reduced: &PrototypeNode, kind: OperationKind) -> String {
    if reduced.fields.is_empty() {
        return String::new();
    }

    let mut out = String::new();
    if kind == OperationKind::Mutation {
        out.push_str("mutation ");
    }
    out.push('{');
    for (name, shape) in &reduced.fields {
        render_field(&mut out, name, shape);
    }
    out.push_str(" }");
    out
}

fn render_field(out: &mut String, name: &str, shape: &FieldShape) {
    match shape {
        FieldShape::Scalar(_) => {
            out.push(' ');
            out.push_str(name);
        }
        FieldShape::Entity(node) | FieldShape::EntityList(node) => {
            out.push(' ');
            if let Some(alias) = &node.alias {
                out.push_str(alias);
                out.push_str(": ");
            }
            out.push_str(name);

            if !node.args.is_empty() {
                let rendered: Vec<String> = node
                    .args
                    .iter()
                    .map(|(arg_name, value)| format!("{}: {}", arg_name, value.render()))
                    .collect();
                out.push('(');
                out.push_str(&rendered.join(", "));
                out.push(')');
            }

            out.push_str(" {");
            for (child_name, child_shape) in &node.fields {
                render_field(out, child_name, child_shape);
            }
            out.push_str(" }");
        }
        FieldShape::FragmentSpread(_) => {}
    }
}
