#![deny(missing_docs)]

//! # Style Serializer
//!
//! Renders a node's value as the string that goes on the wire, following the
//! OpenAPI `style`/`explode` rules.
//!
//! Leaf formatting applies three extra rules: whole floats lose their
//! trailing `.0`, path values have `/` and `\` stripped, and values of a
//! form-encoded request body are percent-encoded.

use crate::params::{NodeId, NodeKind, Operation, ParameterLocation, ParameterNode, ParameterStyle};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value as JsonValue;

/// Characters left untouched when form-encoding a body value.
const FORM_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'*');

/// Renders a node with an explicit style and explode modifier.
///
/// Unknown handles render as the empty string.
pub fn render(op: &Operation, id: NodeId, style: ParameterStyle, explode: bool) -> String {
    let Some(node) = op.node(id) else {
        tracing::warn!(node = %id, "rendering a node that does not exist");
        return String::new();
    };
    match node.kind() {
        kind if kind.is_leaf() => render_leaf(op, node, style),
        NodeKind::Array(array) => {
            let values: Vec<String> = array
                .elements
                .iter()
                .map(|element| element_text(op, *element))
                .collect();
            render_array(node.name().raw(), &values, style, explode)
        }
        NodeKind::Object(object) => {
            let pairs: Vec<(String, String)> = object
                .properties
                .iter()
                .filter_map(|property| {
                    let child = op.node(*property)?;
                    Some((child.name().raw().to_string(), element_text(op, *property)))
                })
                .collect();
            render_object(node.name().raw(), &pairs, style, explode)
        }
        kind => {
            let target = kind
                .combined()
                .and_then(|c| c.output_schema.or_else(|| c.candidates.first().copied()));
            match target {
                Some(target) => render(op, target, style, explode),
                None => String::new(),
            }
        }
    }
}

/// Renders a node with its declared (or location default) style and explode.
pub fn render_declared(op: &Operation, id: NodeId) -> String {
    match op.node(id) {
        Some(node) => render(op, id, node.effective_style(), node.effective_explode()),
        None => String::new(),
    }
}

fn render_leaf(op: &Operation, node: &ParameterNode, style: ParameterStyle) -> String {
    let value = leaf_text(op, node);
    let name = node.name().raw();
    match style {
        ParameterStyle::Matrix => format!(";{}={}", name, value),
        ParameterStyle::Label => format!(".{}", value),
        ParameterStyle::Form => format!("{}={}", name, value),
        ParameterStyle::Simple | ParameterStyle::SpaceDelimited | ParameterStyle::PipeDelimited => {
            value
        }
        ParameterStyle::DeepObject => {
            tracing::warn!(parameter = %name, "deepObject applies to objects only, rendering as simple");
            value
        }
    }
}

fn render_array(name: &str, values: &[String], style: ParameterStyle, explode: bool) -> String {
    match style {
        ParameterStyle::Matrix if explode => values.iter().map(|v| format!(";{}={}", name, v)).collect(),
        ParameterStyle::Matrix => format!(";{}={}", name, values.join(",")),
        ParameterStyle::Label => values.iter().map(|v| format!(".{}", v)).collect(),
        ParameterStyle::Form if explode => values
            .iter()
            .map(|v| format!("{}={}", name, v))
            .collect::<Vec<_>>()
            .join("&"),
        ParameterStyle::Form => format!("{}={}", name, values.join(",")),
        ParameterStyle::Simple => values.join(","),
        ParameterStyle::SpaceDelimited => values.join("%20"),
        ParameterStyle::PipeDelimited => values.join("|"),
        ParameterStyle::DeepObject => {
            tracing::warn!(parameter = %name, "deepObject applies to objects only, rendering as simple");
            values.join(",")
        }
    }
}

fn render_object(
    name: &str,
    pairs: &[(String, String)],
    style: ParameterStyle,
    explode: bool,
) -> String {
    let flat = || {
        pairs
            .iter()
            .flat_map(|(k, v)| [k.as_str(), v.as_str()])
            .collect::<Vec<_>>()
    };
    let joined_pairs = |prefix: &str, separator: &str| {
        pairs
            .iter()
            .map(|(k, v)| format!("{}{}={}", prefix, k, v))
            .collect::<Vec<_>>()
            .join(separator)
    };
    match style {
        ParameterStyle::Matrix if explode => joined_pairs(";", ""),
        ParameterStyle::Matrix => format!(";{}={}", name, flat().join(",")),
        ParameterStyle::Label if explode => joined_pairs(".", ""),
        ParameterStyle::Label => flat().iter().map(|part| format!(".{}", part)).collect(),
        ParameterStyle::Form if explode => joined_pairs("", "&"),
        ParameterStyle::Form => format!("{}={}", name, flat().join(",")),
        ParameterStyle::Simple if explode => joined_pairs("", ","),
        ParameterStyle::Simple => flat().join(","),
        ParameterStyle::SpaceDelimited => flat().join("%20"),
        ParameterStyle::PipeDelimited => flat().join("|"),
        ParameterStyle::DeepObject if explode => pairs
            .iter()
            .map(|(k, v)| format!("{}[{}]={}", name, k, v))
            .collect::<Vec<_>>()
            .join("&"),
        ParameterStyle::DeepObject => {
            tracing::warn!(parameter = %name, "deepObject needs explode, rendering as simple");
            flat().join(",")
        }
    }
}

/// Text of a child value: formatted leaves, compact JSON for structures.
fn element_text(op: &Operation, id: NodeId) -> String {
    match op.node(id) {
        Some(node) if node.is_leaf() => leaf_text(op, node),
        Some(node) if node.kind().combined().is_some() => {
            match node.kind().combined().and_then(|c| c.output_schema) {
                Some(output) => element_text(op, output),
                None => String::new(),
            }
        }
        Some(_) => op
            .to_json(id)
            .map(|value| value.to_string())
            .unwrap_or_default(),
        None => String::new(),
    }
}

/// Formatted leaf value, or the empty string when the leaf holds none.
fn leaf_text(op: &Operation, node: &ParameterNode) -> String {
    let Some(value) = node.value() else {
        tracing::warn!(parameter = %node.name(), "leaf has no value, rendering an empty string");
        return String::new();
    };
    let text = format_value(value);
    match node.location() {
        ParameterLocation::Path => text.replace(['/', '\\'], ""),
        ParameterLocation::RequestBody if op.is_form_encoded() => {
            utf8_percent_encode(&text, FORM_VALUE).to_string()
        }
        _ => text,
    }
}

/// Wire text of a JSON scalar; whole floats drop their fraction.
pub fn format_value(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 => {
                format!("{}", f as i64)
            }
            _ => n.to_string(),
        },
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Null => "null".to_string(),
        structured => structured.to_string(),
    }
}
