#![deny(missing_docs)]

//! # Parameter Nodes
//!
//! The tagged node hierarchy stored in an operation's arena. Every variant
//! shares the common attributes on [`ParameterNode`]; the variant payload in
//! [`NodeKind`] carries the leaf value, the structured children, or the
//! candidate schemas of a combined schema.
//!
//! Children are referenced through [`NodeId`] handles into the owning
//! operation. The `parent` handle is a back-reference only: ownership always
//! flows from the operation roots downwards.

use crate::params::types::{
    ParameterFormat, ParameterLocation, ParameterName, ParameterStyle, ParameterType,
};
use serde_json::Value as JsonValue;
use std::fmt;

/// Handle of a node inside an operation arena.
///
/// Freed slots are reused; the generation tells a stale handle apart from
/// the node now living in the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub(crate) index: usize,
    pub(crate) generation: u32,
}

impl NodeId {
    /// Raw arena index.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.generation == 0 {
            write!(f, "#{}", self.index)
        } else {
            write!(f, "#{}.{}", self.index, self.generation)
        }
    }
}

/// A leaf value pointing at a value observed elsewhere.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafReference {
    /// Identifier of the operation owning the source leaf.
    pub operation: String,
    /// REST path of the source leaf within that operation.
    pub rest_path: String,
    /// The value the source leaf held when the link was made.
    pub value: JsonValue,
}

/// The value held by a leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeValue {
    /// A value set directly.
    Concrete(JsonValue),
    /// A value copied from another leaf, keeping its provenance.
    Reference(LeafReference),
}

impl NodeValue {
    /// The JSON value to render, following references.
    pub fn concrete(&self) -> &JsonValue {
        match self {
            NodeValue::Concrete(value) => value,
            NodeValue::Reference(reference) => &reference.value,
        }
    }
}

/// Payload of the Null, Boolean and Generic leaves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeafData {
    /// Current value.
    pub value: Option<NodeValue>,
}

/// Payload of a Number leaf (`integer` or `number`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumberLeaf {
    /// Current value.
    pub value: Option<NodeValue>,
    /// Inclusive lower bound unless `exclusive_minimum` is set.
    pub minimum: Option<f64>,
    /// Inclusive upper bound unless `exclusive_maximum` is set.
    pub maximum: Option<f64>,
    /// Whether `minimum` excludes the bound itself.
    pub exclusive_minimum: bool,
    /// Whether `maximum` excludes the bound itself.
    pub exclusive_maximum: bool,
}

/// Payload of a String leaf.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringLeaf {
    /// Current value.
    pub value: Option<NodeValue>,
    /// `minLength`
    pub min_length: Option<usize>,
    /// `maxLength`
    pub max_length: Option<usize>,
    /// `pattern`
    pub pattern: Option<String>,
}

/// Payload of an Array node.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayNode {
    /// The item template. Never rendered as a concrete value.
    pub reference_element: NodeId,
    /// Materialized elements, in order.
    pub elements: Vec<NodeId>,
    /// `minItems`
    pub min_items: Option<usize>,
    /// `maxItems`
    pub max_items: Option<usize>,
    /// `uniqueItems`
    pub unique_items: bool,
}

/// Payload of an Object node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectNode {
    /// Properties in declaration order.
    pub properties: Vec<NodeId>,
}

/// Payload of the AllOf/AnyOf/OneOf nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CombinedNode {
    /// The declared alternatives, in order.
    pub candidates: Vec<NodeId>,
    /// The schema selected or merged from the candidates.
    pub output_schema: Option<NodeId>,
    /// Properties added before an output schema was chosen.
    pub pending_properties: Vec<NodeId>,
}

/// The variant of a node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// `null` leaf.
    Null(LeafData),
    /// `boolean` leaf.
    Boolean(LeafData),
    /// `integer`/`number` leaf.
    Number(NumberLeaf),
    /// `string` leaf.
    String(StringLeaf),
    /// Fallback leaf accepting any value.
    Generic(LeafData),
    /// `array` node.
    Array(ArrayNode),
    /// `object` node.
    Object(ObjectNode),
    /// `allOf` combined schema.
    AllOf(CombinedNode),
    /// `anyOf` combined schema.
    AnyOf(CombinedNode),
    /// `oneOf` combined schema.
    OneOf(CombinedNode),
}

impl NodeKind {
    /// Short variant label used in logs and errors.
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Null(_) => "null",
            NodeKind::Boolean(_) => "boolean",
            NodeKind::Number(_) => "number",
            NodeKind::String(_) => "string",
            NodeKind::Generic(_) => "generic",
            NodeKind::Array(_) => "array",
            NodeKind::Object(_) => "object",
            NodeKind::AllOf(_) => "allOf",
            NodeKind::AnyOf(_) => "anyOf",
            NodeKind::OneOf(_) => "oneOf",
        }
    }

    /// True for the five leaf variants.
    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            NodeKind::Null(_)
                | NodeKind::Boolean(_)
                | NodeKind::Number(_)
                | NodeKind::String(_)
                | NodeKind::Generic(_)
        )
    }

    /// The combined-schema payload, if this is AllOf/AnyOf/OneOf.
    pub fn combined(&self) -> Option<&CombinedNode> {
        match self {
            NodeKind::AllOf(c) | NodeKind::AnyOf(c) | NodeKind::OneOf(c) => Some(c),
            _ => None,
        }
    }

    pub(crate) fn combined_mut(&mut self) -> Option<&mut CombinedNode> {
        match self {
            NodeKind::AllOf(c) | NodeKind::AnyOf(c) | NodeKind::OneOf(c) => Some(c),
            _ => None,
        }
    }

    /// The leaf value, if this is a leaf holding one.
    pub fn leaf_value(&self) -> Option<&NodeValue> {
        match self {
            NodeKind::Null(l) | NodeKind::Boolean(l) | NodeKind::Generic(l) => l.value.as_ref(),
            NodeKind::Number(n) => n.value.as_ref(),
            NodeKind::String(s) => s.value.as_ref(),
            _ => None,
        }
    }

    pub(crate) fn leaf_value_slot(&mut self) -> Option<&mut Option<NodeValue>> {
        match self {
            NodeKind::Null(l) | NodeKind::Boolean(l) | NodeKind::Generic(l) => Some(&mut l.value),
            NodeKind::Number(n) => Some(&mut n.value),
            NodeKind::String(s) => Some(&mut s.value),
            _ => None,
        }
    }

    /// Direct children, in rendering order, excluding nothing.
    pub(crate) fn child_ids(&self) -> Vec<NodeId> {
        match self {
            NodeKind::Array(a) => {
                let mut ids = Vec::with_capacity(a.elements.len() + 1);
                ids.push(a.reference_element);
                ids.extend(a.elements.iter().copied());
                ids
            }
            NodeKind::Object(o) => o.properties.clone(),
            NodeKind::AllOf(c) | NodeKind::AnyOf(c) | NodeKind::OneOf(c) => {
                let mut ids = c.candidates.clone();
                ids.extend(c.output_schema);
                ids.extend(c.pending_properties.iter().copied());
                ids
            }
            _ => Vec::new(),
        }
    }
}

/// A parameter node: common attributes plus a variant payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterNode {
    pub(crate) name: ParameterName,
    pub(crate) location: ParameterLocation,
    pub(crate) required: bool,
    pub(crate) schema_type: ParameterType,
    pub(crate) format: ParameterFormat,
    pub(crate) style: Option<ParameterStyle>,
    pub(crate) explode: Option<bool>,
    pub(crate) default_value: Option<JsonValue>,
    pub(crate) enum_values: Vec<JsonValue>,
    pub(crate) examples: Vec<JsonValue>,
    pub(crate) description: Option<String>,
    pub(crate) resource_identifier: bool,
    pub(crate) parent: Option<NodeId>,
    pub(crate) kind: NodeKind,
}

impl ParameterNode {
    /// Creates a node with empty common attributes.
    pub(crate) fn new(
        name: ParameterName,
        location: ParameterLocation,
        schema_type: ParameterType,
        kind: NodeKind,
    ) -> Self {
        Self {
            name,
            location,
            required: false,
            schema_type,
            format: ParameterFormat::Missing,
            style: None,
            explode: None,
            default_value: None,
            enum_values: Vec::new(),
            examples: Vec::new(),
            description: None,
            resource_identifier: false,
            parent: None,
            kind,
        }
    }

    /// The declared name.
    pub fn name(&self) -> &ParameterName {
        &self.name
    }

    /// Where the parameter lives.
    pub fn location(&self) -> ParameterLocation {
        self.location
    }

    /// Whether the parameter is required.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// The declared type.
    pub fn schema_type(&self) -> ParameterType {
        self.schema_type
    }

    /// The declared format.
    pub fn format(&self) -> &ParameterFormat {
        &self.format
    }

    /// The declared style, if any.
    pub fn style(&self) -> Option<ParameterStyle> {
        self.style
    }

    /// The declared explode modifier, if any.
    pub fn explode(&self) -> Option<bool> {
        self.explode
    }

    /// Declared style, falling back to the location default.
    pub fn effective_style(&self) -> ParameterStyle {
        self.style
            .unwrap_or_else(|| ParameterStyle::default_for(self.location))
    }

    /// Declared explode modifier, falling back to the style default.
    pub fn effective_explode(&self) -> bool {
        self.explode
            .unwrap_or_else(|| self.effective_style().default_explode())
    }

    /// The declared default value.
    pub fn default_value(&self) -> Option<&JsonValue> {
        self.default_value.as_ref()
    }

    /// The declared enum values (unique, in declaration order).
    pub fn enum_values(&self) -> &[JsonValue] {
        &self.enum_values
    }

    /// The declared examples (unique, in declaration order).
    pub fn examples(&self) -> &[JsonValue] {
        &self.examples
    }

    /// Free-text description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Whether the schema carries the `x-crudResourceIdentifier` marker.
    pub fn is_resource_identifier(&self) -> bool {
        self.resource_identifier
    }

    /// The parent node, if any.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// The variant payload.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// The leaf value as JSON, following references.
    pub fn value(&self) -> Option<&JsonValue> {
        self.kind.leaf_value().map(NodeValue::concrete)
    }

    /// True for leaf variants.
    pub fn is_leaf(&self) -> bool {
        self.kind.is_leaf()
    }
}

/// Adds `value` to `set` unless an equal value is already present.
pub(crate) fn insert_unique(set: &mut Vec<JsonValue>, value: JsonValue) -> bool {
    if set.contains(&value) {
        false
    } else {
        set.push(value);
        true
    }
}
