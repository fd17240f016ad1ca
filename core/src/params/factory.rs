#![deny(missing_docs)]

//! # Parameter Factory
//!
//! Builds parameter nodes from the plain key/value maps supplied by the
//! description parser, and from concrete JSON values observed in responses.
//!
//! Dispatch order: `not` is rejected, then `allOf`/`anyOf`/`oneOf` win over
//! `type`, then the effective `type` (read from a nested `schema` map when
//! present) selects the variant. Unknown or missing types fall back to the
//! Generic leaf with a warning.

use crate::error::{AppError, AppResult};
use crate::params::cast::cast_value;
use crate::params::node::{
    ArrayNode, CombinedNode, LeafData, NodeId, NodeKind, NodeValue, NumberLeaf, ObjectNode,
    ParameterNode, StringLeaf,
};
use crate::params::operation::{Operation, Template};
use crate::params::types::{
    CollectionFormat, ParameterFormat, ParameterLocation, ParameterName, ParameterStyle,
    ParameterType,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// A raw schema or parameter map as handed over by the description parser.
pub type RawMap = Map<String, JsonValue>;

/// Marker flagging the identifier property of a CRUD resource.
pub const RESOURCE_IDENTIFIER_KEY: &str = "x-crudResourceIdentifier";

/// Serialized form of an operation handed over by the description parser.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDescriptor {
    /// The `operationId`.
    pub operation_id: String,
    /// HTTP method.
    #[serde(default)]
    pub method: String,
    /// Endpoint path template.
    #[serde(default)]
    pub endpoint: String,
    /// Raw parameter maps (`name`, `in`, `schema`, ...).
    #[serde(default)]
    pub parameters: Vec<RawMap>,
    /// Request body, if any.
    #[serde(default)]
    pub request_body: Option<RequestBodyDescriptor>,
    /// Response body schemas keyed by status code.
    #[serde(default)]
    pub responses: IndexMap<String, JsonValue>,
}

/// Request body part of an [`OperationDescriptor`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBodyDescriptor {
    /// Media type of the body.
    #[serde(default = "default_content_type")]
    pub content_type: String,
    /// Body schema.
    pub schema: RawMap,
}

fn default_content_type() -> String {
    "application/json".to_string()
}

/// Builds parameter nodes inside an operation arena.
pub struct ParameterFactory;

impl ParameterFactory {
    /// Builds a node (and its subtree) from a raw map.
    ///
    /// The returned node points at `parent` but is not linked into the
    /// parent's container; callers attach it. `name` overrides `raw["name"]`.
    /// The location comes from the parent when there is one, else from `in`,
    /// else from `location`.
    pub fn build(
        op: &mut Operation,
        parent: Option<NodeId>,
        raw: &RawMap,
        name: Option<&str>,
        location: ParameterLocation,
    ) -> AppResult<NodeId> {
        op.ensure_writable("build a parameter")?;

        let name = match name.map(str::to_string).or_else(|| str_field(raw, "name")) {
            Some(name) => name,
            None if parent.is_none() && location.is_parameter_location() => {
                return Err(AppError::Creation(
                    "parameter declaration has no name".to_string(),
                ))
            }
            None => String::new(),
        };

        let location = match parent {
            Some(parent_id) => op.try_node(parent_id)?.location(),
            None => str_field(raw, "in")
                .map(|v| ParameterLocation::from_in(&v))
                .filter(|l| *l != ParameterLocation::Unknown)
                .unwrap_or(location),
        };

        let schema = effective_schema(raw);
        if schema.contains_key("not") || raw.contains_key("not") {
            return Err(AppError::Creation(format!(
                "parameter '{}' uses the unsupported 'not' keyword",
                name
            )));
        }

        for (keyword, schema_type) in [
            ("allOf", ParameterType::AllOf),
            ("anyOf", ParameterType::AnyOf),
            ("oneOf", ParameterType::OneOf),
        ] {
            if let Some(list) = schema.get(keyword) {
                return build_combined(op, parent, raw, schema, &name, location, schema_type, list);
            }
        }

        let schema_type = resolve_type(schema, &name);
        let id = op.alloc(ParameterNode::new(
            ParameterName::new(name.clone()),
            location,
            schema_type,
            NodeKind::Generic(LeafData::default()),
        ))?;
        if let Err(err) = finish_node(op, id, parent, raw, schema, &name, location, schema_type) {
            discard(op, id);
            return Err(err);
        }
        Ok(id)
    }

    /// Builds a node tree mirroring a concrete JSON value.
    ///
    /// Every leaf receives the value it was built from; arrays get a Generic
    /// reference element plus one element per item.
    pub fn build_from_value(
        op: &mut Operation,
        parent: Option<NodeId>,
        name: &str,
        location: ParameterLocation,
        value: &JsonValue,
    ) -> AppResult<NodeId> {
        let name = ParameterName::new(name);
        let (schema_type, kind) = match value {
            JsonValue::Null => (ParameterType::Null, NodeKind::Null(leaf_with(value))),
            JsonValue::Bool(_) => (ParameterType::Boolean, NodeKind::Boolean(leaf_with(value))),
            JsonValue::Number(n) => {
                let schema_type = if n.is_f64() {
                    ParameterType::Number
                } else {
                    ParameterType::Integer
                };
                let leaf = NumberLeaf {
                    value: Some(NodeValue::Concrete(value.clone())),
                    ..NumberLeaf::default()
                };
                (schema_type, NodeKind::Number(leaf))
            }
            JsonValue::String(_) => {
                let leaf = StringLeaf {
                    value: Some(NodeValue::Concrete(value.clone())),
                    ..StringLeaf::default()
                };
                (ParameterType::String, NodeKind::String(leaf))
            }
            JsonValue::Array(_) => (ParameterType::Array, NodeKind::Generic(LeafData::default())),
            JsonValue::Object(_) => (
                ParameterType::Object,
                NodeKind::Object(ObjectNode::default()),
            ),
        };

        let mut node = ParameterNode::new(name.clone(), location, schema_type, kind);
        node.parent = parent;
        let id = op.alloc(node)?;

        match value {
            JsonValue::Array(items) => {
                let mut reference = ParameterNode::new(
                    name.clone(),
                    location,
                    ParameterType::Unknown,
                    NodeKind::Generic(LeafData::default()),
                );
                reference.parent = Some(id);
                let reference_element = op.alloc(reference)?;
                let mut elements = Vec::with_capacity(items.len());
                for item in items {
                    elements.push(Self::build_from_value(
                        op,
                        Some(id),
                        name.raw(),
                        location,
                        item,
                    )?);
                }
                op.replace_kind(
                    id,
                    NodeKind::Array(ArrayNode {
                        reference_element,
                        elements,
                        min_items: None,
                        max_items: None,
                        unique_items: false,
                    }),
                )?;
            }
            JsonValue::Object(map) => {
                for (key, item) in map {
                    let child = Self::build_from_value(op, Some(id), key, location, item)?;
                    op.add_property(id, child)?;
                }
            }
            _ => {}
        }
        Ok(id)
    }
}

impl Template {
    /// Builds a read-only template from a descriptor.
    ///
    /// Parameters, bodies and responses that fail to build are dropped with a
    /// warning; the template keeps whatever parsed successfully.
    pub fn from_descriptor(descriptor: &OperationDescriptor) -> AppResult<Template> {
        let mut op = Operation::new(
            descriptor.operation_id.clone(),
            descriptor.method.clone(),
            descriptor.endpoint.clone(),
        );

        for raw in &descriptor.parameters {
            let built = ParameterFactory::build(&mut op, None, raw, None, ParameterLocation::Query)
                .and_then(|id| op.attach_parameter(id).map(|_| id));
            if let Err(err) = built {
                tracing::warn!(
                    operation = %descriptor.operation_id,
                    parameter = ?raw.get("name"),
                    "dropping parameter: {}",
                    err
                );
            }
        }

        if let Some(body) = &descriptor.request_body {
            let built = ParameterFactory::build(
                &mut op,
                None,
                &body.schema,
                Some(""),
                ParameterLocation::RequestBody,
            )
            .and_then(|id| op.attach_request_body(id, body.content_type.clone()));
            if let Err(err) = built {
                tracing::warn!(operation = %descriptor.operation_id, "dropping request body: {}", err);
            }
        }

        for (status, schema) in &descriptor.responses {
            let Some(schema) = schema.as_object() else {
                tracing::warn!(operation = %descriptor.operation_id, status = %status, "response schema is not a map");
                continue;
            };
            let built = ParameterFactory::build(
                &mut op,
                None,
                schema,
                Some(""),
                ParameterLocation::ResponseBody,
            )
            .and_then(|id| op.attach_response(status.clone(), id));
            if let Err(err) = built {
                tracing::warn!(operation = %descriptor.operation_id, status = %status, "dropping response: {}", err);
            }
        }

        Ok(Template::new(op))
    }

    /// Parses a YAML (or JSON) descriptor and builds a template from it.
    pub fn from_yaml_str(source: &str) -> AppResult<Template> {
        let descriptor: OperationDescriptor = serde_yaml::from_str(source)?;
        Template::from_descriptor(&descriptor)
    }
}

impl Operation {
    /// Records an observed response body as the operation's actual response.
    pub fn set_actual_response(&mut self, body: &JsonValue) -> AppResult<NodeId> {
        let id = ParameterFactory::build_from_value(
            self,
            None,
            "",
            ParameterLocation::ResponseBody,
            body,
        )?;
        self.attach_actual_response(id)?;
        Ok(id)
    }

    /// Assigns a JSON value to a template-shaped subtree.
    ///
    /// Leaves receive the cast value, arrays are refilled from their
    /// reference element, objects assign matching properties, and combined
    /// schemas forward to their output schema. Keys without a matching
    /// property are ignored.
    pub fn set_value_tree(&mut self, id: NodeId, value: &JsonValue) -> AppResult<()> {
        self.ensure_writable("set a value")?;
        let node = self.try_node(id)?;
        let schema_type = node.schema_type();
        let name = node.name().clone();
        let is_leaf = node.is_leaf();
        let selected_output = node.kind().combined().map(|c| c.output_schema);

        if is_leaf {
            let cast = cast_value(schema_type, value).ok_or_else(|| {
                AppError::TypeMismatch(format!(
                    "value {} cannot be cast to {} for '{}'",
                    value, schema_type, name
                ))
            })?;
            return self.set_value(id, cast);
        }
        if let Some(output) = selected_output {
            let output = match output {
                Some(output) => output,
                None => self.select_output_schema(id)?,
            };
            return self.set_value_tree(output, value);
        }

        match (schema_type, value) {
            (ParameterType::Array, JsonValue::Array(items)) => {
                self.clear_elements(id)?;
                for item in items {
                    let element = self.new_element(id)?;
                    self.set_value_tree(element, item)?;
                }
                Ok(())
            }
            (ParameterType::Object, JsonValue::Object(map)) => {
                for (key, item) in map {
                    match self.property(id, key) {
                        Some(property) => self.set_value_tree(property, item)?,
                        None => tracing::debug!(property = %key, "no such property, ignoring value"),
                    }
                }
                Ok(())
            }
            _ => Err(AppError::TypeMismatch(format!(
                "{} '{}' cannot hold {}",
                schema_type, name, value
            ))),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn build_combined(
    op: &mut Operation,
    parent: Option<NodeId>,
    raw: &RawMap,
    schema: &RawMap,
    name: &str,
    location: ParameterLocation,
    schema_type: ParameterType,
    list: &JsonValue,
) -> AppResult<NodeId> {
    let placeholder = NodeKind::Generic(LeafData::default());
    let id = op.alloc(ParameterNode::new(
        ParameterName::new(name),
        location,
        schema_type,
        placeholder,
    ))?;
    if let Err(err) = set_parent(op, id, parent) {
        discard(op, id);
        return Err(err);
    }

    let mut candidates = Vec::new();
    for (index, candidate) in list.as_array().into_iter().flatten().enumerate() {
        let Some(candidate) = candidate.as_object() else {
            tracing::warn!(parameter = %name, index, "skipping non-map {} candidate", schema_type);
            continue;
        };
        match ParameterFactory::build(op, Some(id), candidate, Some(name), location) {
            Ok(candidate_id) => candidates.push(candidate_id),
            Err(err) => {
                tracing::warn!(parameter = %name, index, "skipping {} candidate: {}", schema_type, err)
            }
        }
    }

    if candidates.is_empty() {
        discard(op, id);
        return Err(AppError::Creation(format!(
            "{} schema '{}' has no valid candidate",
            schema_type, name
        )));
    }

    let combined = CombinedNode {
        candidates,
        output_schema: None,
        pending_properties: Vec::new(),
    };
    let kind = match schema_type {
        ParameterType::AllOf => NodeKind::AllOf(combined),
        ParameterType::AnyOf => NodeKind::AnyOf(combined),
        _ => NodeKind::OneOf(combined),
    };
    let finished = match op.replace_kind(id, kind) {
        Ok(()) => apply_common(op, id, raw, schema),
        Err(err) => Err(err),
    };
    if let Err(err) = finished {
        discard(op, id);
        return Err(err);
    }
    Ok(id)
}

#[allow(clippy::too_many_arguments)]
fn finish_node(
    op: &mut Operation,
    id: NodeId,
    parent: Option<NodeId>,
    raw: &RawMap,
    schema: &RawMap,
    name: &str,
    location: ParameterLocation,
    schema_type: ParameterType,
) -> AppResult<()> {
    let kind = build_kind(op, id, schema, name, location, schema_type)?;
    op.replace_kind(id, kind)?;
    set_parent(op, id, parent)?;
    apply_common(op, id, raw, schema)
}

fn build_kind(
    op: &mut Operation,
    id: NodeId,
    schema: &RawMap,
    name: &str,
    location: ParameterLocation,
    schema_type: ParameterType,
) -> AppResult<NodeKind> {
    let kind = match schema_type {
        ParameterType::Null => NodeKind::Null(LeafData::default()),
        ParameterType::Boolean => NodeKind::Boolean(LeafData::default()),
        ParameterType::Integer | ParameterType::Number => NodeKind::Number(number_leaf(schema)),
        ParameterType::String => NodeKind::String(StringLeaf {
            value: None,
            min_length: usize_field(schema, "minLength"),
            max_length: usize_field(schema, "maxLength"),
            pattern: str_field(schema, "pattern"),
        }),
        ParameterType::Array => {
            let reference_element = match schema.get("items").and_then(JsonValue::as_object) {
                Some(items) => {
                    match ParameterFactory::build(op, Some(id), items, Some(name), location) {
                        Ok(item) => item,
                        Err(err) => {
                            tracing::warn!(parameter = %name, "array items fall back to generic: {}", err);
                            generic_item(op, id, name, location)?
                        }
                    }
                }
                None => generic_item(op, id, name, location)?,
            };
            NodeKind::Array(ArrayNode {
                reference_element,
                elements: Vec::new(),
                min_items: usize_field(schema, "minItems"),
                max_items: usize_field(schema, "maxItems"),
                unique_items: schema
                    .get("uniqueItems")
                    .and_then(JsonValue::as_bool)
                    .unwrap_or(false),
            })
        }
        ParameterType::Object => {
            let mut properties = Vec::new();
            let required: Vec<&str> = schema
                .get("required")
                .and_then(JsonValue::as_array)
                .map(|names| names.iter().filter_map(JsonValue::as_str).collect())
                .unwrap_or_default();
            if let Some(declared) = schema.get("properties").and_then(JsonValue::as_object) {
                for (key, property) in declared {
                    let Some(property) = property.as_object() else {
                        tracing::warn!(parameter = %name, property = %key, "skipping non-map property");
                        continue;
                    };
                    match ParameterFactory::build(op, Some(id), property, Some(key), location) {
                        Ok(child) => {
                            if required.contains(&key.as_str()) {
                                op.set_required(child, true)?;
                            }
                            properties.push(child);
                        }
                        Err(err) => {
                            tracing::warn!(parameter = %name, property = %key, "dropping property: {}", err)
                        }
                    }
                }
            }
            NodeKind::Object(ObjectNode { properties })
        }
        _ => {
            tracing::warn!(parameter = %name, "missing or unsupported type, using a generic parameter");
            NodeKind::Generic(LeafData::default())
        }
    };
    Ok(kind)
}

fn generic_item(
    op: &mut Operation,
    parent: NodeId,
    name: &str,
    location: ParameterLocation,
) -> AppResult<NodeId> {
    let mut item = ParameterNode::new(
        ParameterName::new(name),
        location,
        ParameterType::Unknown,
        NodeKind::Generic(LeafData::default()),
    );
    item.parent = Some(parent);
    op.alloc(item)
}

fn number_leaf(schema: &RawMap) -> NumberLeaf {
    let mut leaf = NumberLeaf {
        minimum: f64_field(schema, "minimum"),
        maximum: f64_field(schema, "maximum"),
        ..NumberLeaf::default()
    };
    // OAS 3.0 uses booleans, OAS 3.1 carries the bound itself.
    match schema.get("exclusiveMinimum") {
        Some(JsonValue::Bool(b)) => leaf.exclusive_minimum = *b,
        Some(JsonValue::Number(n)) => {
            leaf.minimum = n.as_f64();
            leaf.exclusive_minimum = true;
        }
        _ => {}
    }
    match schema.get("exclusiveMaximum") {
        Some(JsonValue::Bool(b)) => leaf.exclusive_maximum = *b,
        Some(JsonValue::Number(n)) => {
            leaf.maximum = n.as_f64();
            leaf.exclusive_maximum = true;
        }
        _ => {}
    }
    leaf
}

/// The schema part of a raw map: the nested `schema` map when present.
fn effective_schema(raw: &RawMap) -> &RawMap {
    raw.get("schema")
        .and_then(JsonValue::as_object)
        .unwrap_or(raw)
}

fn resolve_type(schema: &RawMap, name: &str) -> ParameterType {
    let declared = match schema.get("type") {
        Some(JsonValue::String(s)) => Some(s.clone()),
        Some(JsonValue::Array(types)) => {
            let names: Vec<&str> = types.iter().filter_map(JsonValue::as_str).collect();
            names
                .iter()
                .find(|t| **t != "null")
                .or_else(|| names.first())
                .map(|t| t.to_string())
        }
        _ => None,
    };

    match declared {
        Some(t) => match t.parse::<ParameterType>() {
            Ok(parsed) if !matches!(
                parsed,
                ParameterType::AllOf | ParameterType::AnyOf | ParameterType::OneOf
            ) =>
            {
                parsed
            }
            _ => {
                tracing::warn!(parameter = %name, declared = %t, "unknown type");
                ParameterType::Unknown
            }
        },
        None if schema.contains_key("properties") => ParameterType::Object,
        None if schema.contains_key("items") => ParameterType::Array,
        None => ParameterType::Unknown,
    }
}

fn apply_common(op: &mut Operation, id: NodeId, raw: &RawMap, schema: &RawMap) -> AppResult<()> {
    let schema_type = op.try_node(id)?.schema_type();
    let location = op.try_node(id)?.location();

    if let Some(required) = raw.get("required").and_then(JsonValue::as_bool) {
        op.set_required(id, required)?;
    }
    // Path parameters are always required.
    if location == ParameterLocation::Path && op.try_node(id)?.parent().is_none() {
        op.set_required(id, true)?;
    }

    match str_field(raw, "style").as_deref().map(ParameterStyle::parse) {
        Some(Some(style)) => op.set_style(id, style)?,
        Some(None) => tracing::warn!(node = %id, "ignoring unknown style"),
        None => {
            if let Some(format) =
                str_field(raw, "collectionFormat").and_then(|cf| CollectionFormat::parse(&cf))
            {
                let (style, explode) = format.style_for(location);
                op.set_style(id, style)?;
                op.set_explode(id, explode)?;
            }
        }
    }
    if let Some(explode) = raw.get("explode").and_then(JsonValue::as_bool) {
        op.set_explode(id, explode)?;
    }

    if let Some(description) = str_field(raw, "description").or_else(|| str_field(schema, "description")) {
        op.set_description(id, description)?;
    }
    if let Some(format) = str_field(schema, "format") {
        op.set_format(id, ParameterFormat::parse(&format))?;
    }
    if raw
        .get(RESOURCE_IDENTIFIER_KEY)
        .or_else(|| schema.get(RESOURCE_IDENTIFIER_KEY))
        .and_then(JsonValue::as_bool)
        .unwrap_or(false)
    {
        op.mark_resource_identifier(id)?;
    }

    let cast = |value: &JsonValue, what: &str| -> Option<JsonValue> {
        let result = if schema_type.is_leaf() {
            cast_value(schema_type, value)
        } else {
            Some(value.clone())
        };
        if result.is_none() {
            tracing::warn!(node = %id, value = %value, "discarding {} that does not fit {}", what, schema_type);
        }
        result
    };

    if let Some(default) = schema.get("default").or_else(|| raw.get("default")) {
        if let Some(value) = cast(default, "default") {
            op.set_default_value(id, value)?;
        }
    }
    if let Some(values) = schema.get("enum").and_then(JsonValue::as_array) {
        for value in values {
            if let Some(value) = cast(value, "enum value") {
                op.add_enum_value(id, value)?;
            }
        }
    }
    for example in collect_examples(raw).into_iter().chain(collect_examples(schema)) {
        if let Some(value) = cast(&example, "example") {
            op.add_example(id, value)?;
        }
    }
    Ok(())
}

/// Gathers `example` and `examples` (array or named example map) values.
fn collect_examples(map: &RawMap) -> Vec<JsonValue> {
    let mut out = Vec::new();
    if let Some(example) = map.get("example") {
        out.push(example.clone());
    }
    match map.get("examples") {
        Some(JsonValue::Array(values)) => out.extend(values.iter().cloned()),
        Some(JsonValue::Object(named)) => {
            for entry in named.values() {
                match entry.get("value") {
                    Some(value) => out.push(value.clone()),
                    None => tracing::debug!("skipping example without inline value"),
                }
            }
        }
        _ => {}
    }
    out
}

fn set_parent(op: &mut Operation, id: NodeId, parent: Option<NodeId>) -> AppResult<()> {
    if let Some(parent) = parent {
        op.set_parent_link(id, parent)?;
    }
    Ok(())
}

/// Frees a partially built node and everything allocated below it.
fn discard(op: &mut Operation, id: NodeId) {
    tracing::debug!(node = %id, "discarding partially built node");
    op.free_dangling(id);
}

fn leaf_with(value: &JsonValue) -> LeafData {
    LeafData {
        value: Some(NodeValue::Concrete(value.clone())),
    }
}

fn str_field(map: &RawMap, key: &str) -> Option<String> {
    map.get(key).and_then(JsonValue::as_str).map(str::to_string)
}

fn f64_field(map: &RawMap, key: &str) -> Option<f64> {
    map.get(key).and_then(JsonValue::as_f64)
}

fn usize_field(map: &RawMap, key: &str) -> Option<usize> {
    map.get(key)
        .and_then(JsonValue::as_u64)
        .and_then(|v| usize::try_from(v).ok())
}
