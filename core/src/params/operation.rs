#![deny(missing_docs)]

//! # Operations
//!
//! An [`Operation`] owns every parameter node of one API operation in an
//! arena. Root request parameters, the request body and the response bodies
//! are entry points into that arena; nodes refer to each other through
//! [`NodeId`] handles.
//!
//! Operations parsed from an API description are wrapped in a [`Template`],
//! which only hands out shared references. [`Template::to_draft`] produces a
//! writable deep copy. An operation frozen with [`Operation::freeze`] also
//! rejects every mutator at runtime with [`AppError::ReadOnly`].

use crate::error::{AppError, AppResult};
use crate::params::node::{
    insert_unique, ArrayNode, LeafData, LeafReference, NodeId, NodeKind, NodeValue, NumberLeaf,
    ObjectNode, ParameterNode, StringLeaf,
};
use crate::params::types::{
    ParameterFormat, ParameterLocation, ParameterName, ParameterStyle, ParameterType,
};
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::ops::Deref;

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<ParameterNode>,
}

/// An API operation and the arena holding its parameter nodes.
#[derive(Debug, Clone)]
pub struct Operation {
    operation_id: String,
    method: String,
    endpoint: String,
    nodes: Vec<Slot>,
    free: Vec<usize>,
    parameters: Vec<NodeId>,
    request_body: Option<NodeId>,
    request_content_type: Option<String>,
    responses: IndexMap<String, NodeId>,
    actual_response: Option<NodeId>,
    read_only: bool,
}

impl Operation {
    /// Creates an empty, writable operation.
    pub fn new(
        operation_id: impl Into<String>,
        method: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            operation_id: operation_id.into(),
            method: method.into(),
            endpoint: endpoint.into(),
            nodes: Vec::new(),
            free: Vec::new(),
            parameters: Vec::new(),
            request_body: None,
            request_content_type: None,
            responses: IndexMap::new(),
            actual_response: None,
            read_only: false,
        }
    }

    /// The `operationId`.
    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    /// The HTTP method.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The endpoint path template.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Whether mutators are rejected.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Marks the operation read-only. There is no way back: clone instead.
    pub fn freeze(&mut self) {
        self.read_only = true;
    }

    /// Returns a writable deep copy sharing no state with `self`.
    pub fn deep_clone(&self) -> Operation {
        let mut copy = self.clone();
        copy.read_only = false;
        copy
    }

    /// Root path/query/header/cookie parameters in declaration order.
    pub fn parameters(&self) -> &[NodeId] {
        &self.parameters
    }

    /// The request body root.
    pub fn request_body(&self) -> Option<NodeId> {
        self.request_body
    }

    /// Content type of the request body.
    pub fn request_content_type(&self) -> Option<&str> {
        self.request_content_type.as_deref()
    }

    /// True when the request body is sent form-encoded.
    pub fn is_form_encoded(&self) -> bool {
        self.request_content_type
            .as_deref()
            .map(|ct| ct.contains("x-www-form-urlencoded"))
            .unwrap_or(false)
    }

    /// Declared response body roots keyed by status code.
    pub fn responses(&self) -> &IndexMap<String, NodeId> {
        &self.responses
    }

    /// The observed response body root, if one was recorded.
    pub fn actual_response(&self) -> Option<NodeId> {
        self.actual_response
    }

    /// Looks up a node.
    pub fn node(&self, id: NodeId) -> Option<&ParameterNode> {
        self.nodes
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    /// Looks up a node, failing on stale handles.
    pub fn try_node(&self, id: NodeId) -> AppResult<&ParameterNode> {
        self.node(id).ok_or_else(|| {
            AppError::UnknownNode(format!(
                "node {} is not part of operation '{}'",
                id, self.operation_id
            ))
        })
    }

    pub(crate) fn ensure_writable(&self, action: &str) -> AppResult<()> {
        if self.read_only {
            Err(AppError::read_only(action))
        } else {
            Ok(())
        }
    }

    pub(crate) fn node_mut(&mut self, id: NodeId, action: &str) -> AppResult<&mut ParameterNode> {
        self.ensure_writable(action)?;
        let operation_id = self.operation_id.clone();
        self.nodes
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or_else(|| {
                AppError::UnknownNode(format!(
                    "node {} is not part of operation '{}'",
                    id, operation_id
                ))
            })
    }

    /// Allocates a detached node, reusing a released slot when one exists.
    pub(crate) fn alloc(&mut self, node: ParameterNode) -> AppResult<NodeId> {
        self.ensure_writable("allocate a node")?;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.nodes[index];
            slot.node = Some(node);
            return Ok(NodeId {
                index,
                generation: slot.generation,
            });
        }
        self.nodes.push(Slot {
            generation: 0,
            node: Some(node),
        });
        Ok(NodeId {
            index: self.nodes.len() - 1,
            generation: 0,
        })
    }

    /// Takes a node out of its slot and queues the slot for reuse.
    fn release(&mut self, id: NodeId) -> Option<ParameterNode> {
        let slot = self
            .nodes
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)?;
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        Some(node)
    }

    /// Number of arena slots, live or released.
    pub fn arena_len(&self) -> usize {
        self.nodes.len()
    }

    /// Replaces the variant payload of a node.
    pub(crate) fn replace_kind(&mut self, id: NodeId, kind: NodeKind) -> AppResult<()> {
        self.node_mut(id, "replace a node variant")?.kind = kind;
        Ok(())
    }

    // --- Roots ---

    /// Attaches a detached node as a root request parameter.
    pub fn attach_parameter(&mut self, id: NodeId) -> AppResult<()> {
        self.ensure_writable("attach a parameter")?;
        let node = self.try_node(id)?;
        if node.name.is_empty() {
            return Err(AppError::Creation(
                "root parameters must be named".to_string(),
            ));
        }
        if !node.location.is_parameter_location() {
            return Err(AppError::Creation(format!(
                "parameter '{}' has location '{}' which is not a parameter location",
                node.name, node.location
            )));
        }
        self.node_mut(id, "attach a parameter")?.parent = None;
        self.parameters.push(id);
        Ok(())
    }

    /// Sets the request body root and its content type.
    pub fn attach_request_body(
        &mut self,
        id: NodeId,
        content_type: impl Into<String>,
    ) -> AppResult<()> {
        self.ensure_writable("attach a request body")?;
        self.set_location_recursive(id, ParameterLocation::RequestBody)?;
        self.node_mut(id, "attach a request body")?.parent = None;
        self.request_body = Some(id);
        self.request_content_type = Some(content_type.into());
        Ok(())
    }

    /// Declares the response body root for a status code.
    pub fn attach_response(&mut self, status: impl Into<String>, id: NodeId) -> AppResult<()> {
        self.ensure_writable("attach a response")?;
        self.set_location_recursive(id, ParameterLocation::ResponseBody)?;
        self.node_mut(id, "attach a response")?.parent = None;
        self.responses.insert(status.into(), id);
        Ok(())
    }

    /// Records the observed response body root, replacing a previous one.
    pub fn attach_actual_response(&mut self, id: NodeId) -> AppResult<()> {
        self.ensure_writable("attach an actual response")?;
        if let Some(previous) = self.actual_response.take() {
            self.free_subtree(previous);
        }
        self.set_location_recursive(id, ParameterLocation::ResponseBody)?;
        self.node_mut(id, "attach an actual response")?.parent = None;
        self.actual_response = Some(id);
        Ok(())
    }

    /// Forgets the observed response body.
    pub fn clear_actual_response(&mut self) -> AppResult<()> {
        self.ensure_writable("clear the actual response")?;
        if let Some(previous) = self.actual_response.take() {
            self.free_subtree(previous);
        }
        Ok(())
    }

    // --- Structure queries ---

    /// Direct children of a node: reference element first for arrays,
    /// candidates then output schema for combined schemas.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id)
            .map(|node| node.kind.child_ids())
            .unwrap_or_default()
    }

    /// The node and all nodes below it, depth first.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if self.node(current).is_none() {
                continue;
            }
            out.push(current);
            let mut children = self.children(current);
            children.reverse();
            stack.extend(children);
        }
        out
    }

    /// Walks parent links up to the tree root.
    pub fn root_of(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(parent) = self.node(current).and_then(|n| n.parent) {
            current = parent;
        }
        current
    }

    /// Every node reachable from the request roots.
    pub fn all_request_nodes(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        for root in self.parameters.iter().copied().chain(self.request_body) {
            out.extend(self.descendants(root));
        }
        out
    }

    /// Every node reachable from any root, responses included.
    pub fn all_nodes(&self) -> Vec<NodeId> {
        let mut out = self.all_request_nodes();
        for root in self.responses.values().copied().chain(self.actual_response) {
            out.extend(self.descendants(root));
        }
        out
    }

    /// Request-side nodes whose name matches `name` (raw first, then normalized).
    pub fn find_by_name(&self, name: &str) -> Vec<NodeId> {
        let nodes = self.all_request_nodes();
        let raw: Vec<NodeId> = nodes
            .iter()
            .copied()
            .filter(|id| self.node(*id).map(|n| n.name.raw() == name).unwrap_or(false))
            .collect();
        if !raw.is_empty() {
            return raw;
        }
        nodes
            .into_iter()
            .filter(|id| self.node(*id).map(|n| n.name.matches(name)).unwrap_or(false))
            .collect()
    }

    /// Root request parameter with the given name and location.
    pub fn root_parameter(&self, location: ParameterLocation, name: &str) -> Option<NodeId> {
        self.parameters.iter().copied().find(|id| {
            self.node(*id)
                .map(|n| n.location == location && n.name.raw() == name)
                .unwrap_or(false)
        })
    }

    // --- Leaf values ---

    /// Sets a leaf value. The value must fit the leaf variant.
    pub fn set_value(&mut self, id: NodeId, value: JsonValue) -> AppResult<()> {
        let node = self.node_mut(id, "set a value")?;
        check_value_fits(node, &value)?;
        let label = node.kind.label();
        let name = node.name.clone();
        let slot = node.kind.leaf_value_slot().ok_or_else(|| {
            AppError::TypeMismatch(format!(
                "'{}' is a {} node and holds no leaf value",
                name, label
            ))
        })?;
        *slot = Some(NodeValue::Concrete(value));
        Ok(())
    }

    /// Sets a leaf value by reference to a leaf observed elsewhere.
    pub fn set_reference_value(&mut self, id: NodeId, reference: LeafReference) -> AppResult<()> {
        let node = self.node_mut(id, "set a value")?;
        check_value_fits(node, &reference.value)?;
        let name = node.name.clone();
        let slot = node.kind
            .leaf_value_slot()
            .ok_or_else(|| AppError::TypeMismatch(format!("'{}' holds no leaf value", name)))?;
        *slot = Some(NodeValue::Reference(reference));
        Ok(())
    }

    /// Removes the value of a leaf.
    pub fn clear_value(&mut self, id: NodeId) -> AppResult<()> {
        let node = self.node_mut(id, "clear a value")?;
        if let Some(slot) = node.kind.leaf_value_slot() {
            *slot = None;
        }
        Ok(())
    }

    // --- Common attributes ---

    /// Sets the `required` flag.
    pub fn set_required(&mut self, id: NodeId, required: bool) -> AppResult<()> {
        self.node_mut(id, "set required")?.required = required;
        Ok(())
    }

    /// Sets the declared format.
    pub fn set_format(&mut self, id: NodeId, format: ParameterFormat) -> AppResult<()> {
        self.node_mut(id, "set format")?.format = format;
        Ok(())
    }

    /// Sets the serialization style.
    pub fn set_style(&mut self, id: NodeId, style: ParameterStyle) -> AppResult<()> {
        self.node_mut(id, "set style")?.style = Some(style);
        Ok(())
    }

    /// Sets the explode modifier.
    pub fn set_explode(&mut self, id: NodeId, explode: bool) -> AppResult<()> {
        self.node_mut(id, "set explode")?.explode = Some(explode);
        Ok(())
    }

    /// Sets the description.
    pub fn set_description(&mut self, id: NodeId, description: impl Into<String>) -> AppResult<()> {
        self.node_mut(id, "set description")?.description = Some(description.into());
        Ok(())
    }

    /// Sets the declared default value.
    pub fn set_default_value(&mut self, id: NodeId, value: JsonValue) -> AppResult<()> {
        self.node_mut(id, "set default value")?.default_value = Some(value);
        Ok(())
    }

    /// Adds an enum value; duplicates are ignored.
    pub fn add_enum_value(&mut self, id: NodeId, value: JsonValue) -> AppResult<bool> {
        Ok(insert_unique(
            &mut self.node_mut(id, "add an enum value")?.enum_values,
            value,
        ))
    }

    /// Adds an example; duplicates are ignored.
    pub fn add_example(&mut self, id: NodeId, value: JsonValue) -> AppResult<bool> {
        Ok(insert_unique(
            &mut self.node_mut(id, "add an example")?.examples,
            value,
        ))
    }

    // --- Number and string constraints ---

    fn number_mut(&mut self, id: NodeId, action: &str) -> AppResult<&mut NumberLeaf> {
        let node = self.node_mut(id, action)?;
        let name = node.name.clone();
        match &mut node.kind {
            NodeKind::Number(n) => Ok(n),
            other => Err(AppError::TypeMismatch(format!(
                "cannot {} on '{}': {} is not numeric",
                action,
                name,
                other.label()
            ))),
        }
    }

    fn string_mut(&mut self, id: NodeId, action: &str) -> AppResult<&mut StringLeaf> {
        let node = self.node_mut(id, action)?;
        let name = node.name.clone();
        match &mut node.kind {
            NodeKind::String(s) => Ok(s),
            other => Err(AppError::TypeMismatch(format!(
                "cannot {} on '{}': {} is not a string",
                action,
                name,
                other.label()
            ))),
        }
    }

    /// Sets `minimum`.
    pub fn set_minimum(&mut self, id: NodeId, minimum: Option<f64>) -> AppResult<()> {
        self.number_mut(id, "set minimum")?.minimum = minimum;
        Ok(())
    }

    /// Sets `maximum`.
    pub fn set_maximum(&mut self, id: NodeId, maximum: Option<f64>) -> AppResult<()> {
        self.number_mut(id, "set maximum")?.maximum = maximum;
        Ok(())
    }

    /// Sets `exclusiveMinimum`.
    pub fn set_exclusive_minimum(&mut self, id: NodeId, exclusive: bool) -> AppResult<()> {
        self.number_mut(id, "set exclusive minimum")?.exclusive_minimum = exclusive;
        Ok(())
    }

    /// Sets `exclusiveMaximum`.
    pub fn set_exclusive_maximum(&mut self, id: NodeId, exclusive: bool) -> AppResult<()> {
        self.number_mut(id, "set exclusive maximum")?.exclusive_maximum = exclusive;
        Ok(())
    }

    /// Sets `minLength`.
    pub fn set_min_length(&mut self, id: NodeId, min_length: Option<usize>) -> AppResult<()> {
        self.string_mut(id, "set min length")?.min_length = min_length;
        Ok(())
    }

    /// Sets `maxLength`.
    pub fn set_max_length(&mut self, id: NodeId, max_length: Option<usize>) -> AppResult<()> {
        self.string_mut(id, "set max length")?.max_length = max_length;
        Ok(())
    }

    /// Sets `pattern`.
    pub fn set_pattern(&mut self, id: NodeId, pattern: Option<String>) -> AppResult<()> {
        self.string_mut(id, "set pattern")?.pattern = pattern;
        Ok(())
    }

    /// Changes the declared type, swapping the variant when needed.
    ///
    /// A leaf keeps its value when it can be cast to the new type; otherwise
    /// the value is dropped.
    pub fn change_type(&mut self, id: NodeId, new_type: ParameterType) -> AppResult<()> {
        self.ensure_writable("change type")?;
        let node = self.try_node(id)?;
        let old_type = node.schema_type;
        let old_value = node.value().cloned();
        let old_children = node.kind.child_ids();
        let (name, location) = (node.name.clone(), node.location);
        if old_type == new_type {
            return Ok(());
        }
        if old_type.is_numeric() && new_type.is_numeric() {
            self.node_mut(id, "change type")?.schema_type = new_type;
            return Ok(());
        }

        let kind = match new_type {
            ParameterType::Null => NodeKind::Null(LeafData::default()),
            ParameterType::Boolean => NodeKind::Boolean(LeafData::default()),
            ParameterType::Integer | ParameterType::Number => {
                NodeKind::Number(NumberLeaf::default())
            }
            ParameterType::String => NodeKind::String(StringLeaf::default()),
            ParameterType::Unknown => NodeKind::Generic(LeafData::default()),
            ParameterType::Array => {
                let mut item = ParameterNode::new(
                    name.clone(),
                    location,
                    ParameterType::Unknown,
                    NodeKind::Generic(LeafData::default()),
                );
                item.parent = Some(id);
                let reference_element = self.alloc(item)?;
                NodeKind::Array(ArrayNode {
                    reference_element,
                    elements: Vec::new(),
                    min_items: None,
                    max_items: None,
                    unique_items: false,
                })
            }
            ParameterType::Object => NodeKind::Object(ObjectNode::default()),
            ParameterType::AllOf | ParameterType::AnyOf | ParameterType::OneOf => {
                return Err(AppError::TypeMismatch(format!(
                    "cannot turn '{}' into a combined schema",
                    name
                )))
            }
        };

        for child in old_children {
            self.free_subtree(child);
        }
        let node = self.node_mut(id, "change type")?;
        node.kind = kind;
        node.schema_type = new_type;

        if let Some(value) = old_value {
            match crate::params::cast::cast_value(new_type, &value) {
                Some(cast) if node.kind.is_leaf() => {
                    if let Some(slot) = node.kind.leaf_value_slot() {
                        *slot = Some(NodeValue::Concrete(cast));
                    }
                }
                _ => tracing::warn!(
                    parameter = %node.name,
                    "dropping value that does not fit new type {}",
                    new_type
                ),
            }
        }
        Ok(())
    }

    // --- Arrays ---

    fn array(&self, id: NodeId) -> AppResult<&ArrayNode> {
        let node = self.try_node(id)?;
        match &node.kind {
            NodeKind::Array(a) => Ok(a),
            other => Err(AppError::TypeMismatch(format!(
                "'{}' is a {} node, not an array",
                node.name,
                other.label()
            ))),
        }
    }

    fn array_mut(&mut self, id: NodeId, action: &str) -> AppResult<&mut ArrayNode> {
        let node = self.node_mut(id, action)?;
        let name = node.name.clone();
        match &mut node.kind {
            NodeKind::Array(a) => Ok(a),
            other => Err(AppError::TypeMismatch(format!(
                "cannot {} on '{}': {} is not an array",
                action,
                name,
                other.label()
            ))),
        }
    }

    /// Materializes a new element from the array's reference element.
    pub fn new_element(&mut self, array_id: NodeId) -> AppResult<NodeId> {
        self.ensure_writable("add an element")?;
        let template = self.array(array_id)?.reference_element;
        let element = self.duplicate(template, Some(array_id))?;
        self.array_mut(array_id, "add an element")?
            .elements
            .push(element);
        Ok(element)
    }

    /// Appends an already allocated node as an element.
    pub fn push_element(&mut self, array_id: NodeId, element: NodeId) -> AppResult<()> {
        self.ensure_writable("add an element")?;
        self.array(array_id)?;
        let location = self.try_node(array_id)?.location;
        self.set_location_recursive(element, location)?;
        self.node_mut(element, "add an element")?.parent = Some(array_id);
        self.array_mut(array_id, "add an element")?
            .elements
            .push(element);
        Ok(())
    }

    /// Removes and frees the element at `index`.
    pub fn remove_element(&mut self, array_id: NodeId, index: usize) -> AppResult<()> {
        let array = self.array_mut(array_id, "remove an element")?;
        if index >= array.elements.len() {
            return Err(AppError::General(format!(
                "element index {} out of bounds ({} elements)",
                index,
                array.elements.len()
            )));
        }
        let removed = array.elements.remove(index);
        self.free_subtree(removed);
        Ok(())
    }

    /// Moves an element to a new position.
    pub fn move_element(&mut self, array_id: NodeId, from: usize, to: usize) -> AppResult<()> {
        let array = self.array_mut(array_id, "reorder elements")?;
        let len = array.elements.len();
        if from >= len || to >= len {
            return Err(AppError::General(format!(
                "cannot move element {} to {} ({} elements)",
                from, to, len
            )));
        }
        let element = array.elements.remove(from);
        array.elements.insert(to, element);
        Ok(())
    }

    /// Removes and frees every element, keeping the reference element.
    pub fn clear_elements(&mut self, array_id: NodeId) -> AppResult<()> {
        let elements = std::mem::take(&mut self.array_mut(array_id, "clear elements")?.elements);
        for element in elements {
            self.free_subtree(element);
        }
        Ok(())
    }

    // --- Objects and combined schemas ---

    /// Adds a property to an object, or to a combined schema.
    ///
    /// On a combined schema the property goes to the output schema when one
    /// is selected, and waits in the pending list otherwise. A second
    /// property with the same raw name is a [`AppError::Creation`].
    pub fn add_property(&mut self, parent_id: NodeId, property: NodeId) -> AppResult<()> {
        self.ensure_writable("add a property")?;
        let target = self.property_target(parent_id)?;
        self.ensure_unique_property(target, property)?;
        let location = self.try_node(parent_id)?.location;

        self.set_location_recursive(property, location)?;
        self.node_mut(property, "add a property")?.parent = Some(target);
        let target_node = self.node_mut(target, "add a property")?;
        match &mut target_node.kind {
            NodeKind::Object(o) => o.properties.push(property),
            kind => {
                if let Some(c) = kind.combined_mut() {
                    c.pending_properties.push(property);
                }
            }
        }
        Ok(())
    }

    /// The node whose property list receives properties added to `parent_id`.
    fn property_target(&self, parent_id: NodeId) -> AppResult<NodeId> {
        let parent = self.try_node(parent_id)?;
        match &parent.kind {
            NodeKind::Object(_) => Ok(parent_id),
            NodeKind::AllOf(c) | NodeKind::AnyOf(c) | NodeKind::OneOf(c) => match c.output_schema {
                Some(output)
                    if self
                        .node(output)
                        .map(|n| matches!(n.kind, NodeKind::Object(_)))
                        .unwrap_or(false) =>
                {
                    Ok(output)
                }
                _ => Ok(parent_id),
            },
            other => Err(AppError::TypeMismatch(format!(
                "cannot add a property to '{}': {} holds no properties",
                parent.name,
                other.label()
            ))),
        }
    }

    /// Property names are unique within an object.
    fn ensure_unique_property(&self, target: NodeId, property: NodeId) -> AppResult<()> {
        let name = self.try_node(property)?.name.raw();
        match self.property(target, name) {
            Some(existing) if existing != property => Err(AppError::Creation(format!(
                "'{}' already has a property named '{}'",
                self.try_node(target)?.name,
                name
            ))),
            _ => Ok(()),
        }
    }

    /// Property of an object (or pending property of a combined schema) by raw name.
    pub fn property(&self, parent_id: NodeId, name: &str) -> Option<NodeId> {
        let parent = self.node(parent_id)?;
        let candidates: &[NodeId] = match &parent.kind {
            NodeKind::Object(o) => &o.properties,
            NodeKind::AllOf(c) | NodeKind::AnyOf(c) | NodeKind::OneOf(c) => &c.pending_properties,
            _ => return None,
        };
        candidates
            .iter()
            .copied()
            .find(|id| self.node(*id).map(|n| n.name.raw() == name).unwrap_or(false))
    }

    /// Sets the output schema of a combined schema and moves pending
    /// properties into it when it is an object.
    pub fn set_output_schema(&mut self, combined_id: NodeId, output: NodeId) -> AppResult<()> {
        self.ensure_writable("set an output schema")?;
        let combined = self.try_node(combined_id)?;
        let Some(c) = combined.kind.combined() else {
            return Err(AppError::TypeMismatch(format!(
                "'{}' is not a combined schema",
                combined.name
            )));
        };
        let previous = c.output_schema;
        let pending = c.pending_properties.clone();
        let location = combined.location;

        if let Some(previous) = previous.filter(|p| *p != output) {
            self.free_subtree(previous);
        }
        self.set_location_recursive(output, location)?;
        self.node_mut(output, "set an output schema")?.parent = Some(combined_id);
        let output_is_object = matches!(self.try_node(output)?.kind, NodeKind::Object(_));

        let node = self.node_mut(combined_id, "set an output schema")?;
        if let Some(c) = node.kind.combined_mut() {
            c.output_schema = Some(output);
            if output_is_object {
                c.pending_properties.clear();
            }
        }
        if output_is_object {
            for property in pending {
                let name = self.try_node(property)?.name.raw().to_string();
                if let Some(shadowed) = self.property(output, &name) {
                    self.detach(shadowed)?;
                    self.free_subtree(shadowed);
                }
                self.node_mut(property, "set an output schema")?.parent = Some(output);
                if let NodeKind::Object(o) = &mut self.node_mut(output, "set an output schema")?.kind
                {
                    o.properties.push(property);
                }
            }
        }
        Ok(())
    }

    // --- Detaching, moving and copying ---

    /// Removes a node (and its subtree) from wherever it is attached.
    pub fn remove_node(&mut self, id: NodeId) -> AppResult<()> {
        self.ensure_writable("remove a node")?;
        self.try_node(id)?;
        self.detach(id)?;
        self.free_subtree(id);
        Ok(())
    }

    /// Moves a node under a new parent, re-deriving its location.
    ///
    /// Objects and combined schemas receive it as a property, arrays as an
    /// element.
    pub fn reparent(&mut self, id: NodeId, new_parent: NodeId) -> AppResult<()> {
        self.ensure_writable("reparent a node")?;
        if self.descendants(id).contains(&new_parent) {
            return Err(AppError::General(format!(
                "cannot move node {} below its own descendant {}",
                id, new_parent
            )));
        }
        if !matches!(self.try_node(new_parent)?.kind, NodeKind::Array(_)) {
            let target = self.property_target(new_parent)?;
            self.ensure_unique_property(target, id)?;
        }
        self.detach(id)?;
        match self.try_node(new_parent)?.kind {
            NodeKind::Array(_) => self.push_element(new_parent, id),
            _ => self.add_property(new_parent, id),
        }
    }

    /// Unlinks a node from its parent container or root slot without freeing it.
    pub(crate) fn detach(&mut self, id: NodeId) -> AppResult<()> {
        self.ensure_writable("detach a node")?;
        let parent = self.try_node(id)?.parent;
        match parent {
            Some(parent_id) => {
                let parent = self.node_mut(parent_id, "detach a node")?;
                match &mut parent.kind {
                    NodeKind::Array(a) => {
                        if a.reference_element == id {
                            return Err(AppError::General(
                                "the reference element of an array cannot be detached"
                                    .to_string(),
                            ));
                        }
                        a.elements.retain(|e| *e != id);
                    }
                    NodeKind::Object(o) => o.properties.retain(|p| *p != id),
                    kind => {
                        if let Some(c) = kind.combined_mut() {
                            c.candidates.retain(|p| *p != id);
                            c.pending_properties.retain(|p| *p != id);
                            if c.output_schema == Some(id) {
                                c.output_schema = None;
                            }
                        }
                    }
                }
            }
            None => {
                self.parameters.retain(|p| *p != id);
                if self.request_body == Some(id) {
                    self.request_body = None;
                }
                self.responses.retain(|_, root| *root != id);
                if self.actual_response == Some(id) {
                    self.actual_response = None;
                }
            }
        }
        self.node_mut(id, "detach a node")?.parent = None;
        Ok(())
    }

    /// Deep-copies a subtree inside this arena under `new_parent`.
    ///
    /// The copy is not linked into the parent's container.
    pub fn duplicate(&mut self, id: NodeId, new_parent: Option<NodeId>) -> AppResult<NodeId> {
        self.ensure_writable("duplicate a node")?;
        let mut node = self.try_node(id)?.clone();
        node.parent = new_parent;
        let copy = self.alloc(node)?;

        let kind = self.try_node(copy)?.kind.clone();
        let remapped = match kind {
            NodeKind::Array(mut a) => {
                a.reference_element = self.duplicate(a.reference_element, Some(copy))?;
                a.elements = self.duplicate_all(&a.elements, copy)?;
                NodeKind::Array(a)
            }
            NodeKind::Object(mut o) => {
                o.properties = self.duplicate_all(&o.properties, copy)?;
                NodeKind::Object(o)
            }
            NodeKind::AllOf(c) => NodeKind::AllOf(self.duplicate_combined(c, copy)?),
            NodeKind::AnyOf(c) => NodeKind::AnyOf(self.duplicate_combined(c, copy)?),
            NodeKind::OneOf(c) => NodeKind::OneOf(self.duplicate_combined(c, copy)?),
            leaf => leaf,
        };
        self.replace_kind(copy, remapped)?;
        Ok(copy)
    }

    fn duplicate_all(&mut self, ids: &[NodeId], parent: NodeId) -> AppResult<Vec<NodeId>> {
        ids.iter()
            .map(|id| self.duplicate(*id, Some(parent)))
            .collect()
    }

    fn duplicate_combined(
        &mut self,
        mut c: crate::params::node::CombinedNode,
        parent: NodeId,
    ) -> AppResult<crate::params::node::CombinedNode> {
        c.candidates = self.duplicate_all(&c.candidates, parent)?;
        c.pending_properties = self.duplicate_all(&c.pending_properties, parent)?;
        c.output_schema = match c.output_schema {
            Some(output) => Some(self.duplicate(output, Some(parent))?),
            None => None,
        };
        Ok(c)
    }

    pub(crate) fn set_location_recursive(
        &mut self,
        id: NodeId,
        location: ParameterLocation,
    ) -> AppResult<()> {
        for node_id in self.descendants(id) {
            self.node_mut(node_id, "set location")?.location = location;
        }
        Ok(())
    }

    pub(crate) fn set_name(&mut self, id: NodeId, name: ParameterName) -> AppResult<()> {
        self.node_mut(id, "rename a node")?.name = name;
        Ok(())
    }

    /// Flags a node as the identifier of a CRUD resource.
    pub fn mark_resource_identifier(&mut self, id: NodeId) -> AppResult<()> {
        self.node_mut(id, "mark a resource identifier")?.resource_identifier = true;
        Ok(())
    }

    /// Points a detached node at its future parent without linking it.
    pub(crate) fn set_parent_link(&mut self, id: NodeId, parent: NodeId) -> AppResult<()> {
        self.node_mut(id, "set a parent")?.parent = Some(parent);
        Ok(())
    }

    /// Moves the variant payload of `source` into `target`.
    ///
    /// The previous children of `target` are freed, the children of `source`
    /// are re-parented, and the `source` slot is released.
    pub(crate) fn transplant(&mut self, target: NodeId, source: NodeId) -> AppResult<()> {
        self.ensure_writable("merge schemas")?;
        let old_children = self.try_node(target)?.kind.child_ids();
        let donor = self
            .release(source)
            .ok_or_else(|| AppError::UnknownNode(format!("node {} was already released", source)))?;
        for child in old_children {
            self.free_subtree(child);
        }
        let location = self.try_node(target)?.location;
        for child in donor.kind.child_ids() {
            self.node_mut(child, "merge schemas")?.parent = Some(target);
            self.set_location_recursive(child, location)?;
        }
        let node = self.node_mut(target, "merge schemas")?;
        node.kind = donor.kind;
        node.schema_type = donor.schema_type;
        if !node.format.is_declared() {
            node.format = donor.format;
        }
        Ok(())
    }

    pub(crate) fn free_subtree(&mut self, id: NodeId) {
        for node_id in self.descendants(id) {
            self.release(node_id);
        }
    }

    /// Frees a node plus every node whose parent links lead to it, including
    /// children that were never linked into its container.
    pub(crate) fn free_dangling(&mut self, id: NodeId) {
        let hanging: Vec<NodeId> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.node.is_some())
            .map(|(index, slot)| NodeId {
                index,
                generation: slot.generation,
            })
            .filter(|candidate| self.descends_from(*candidate, id))
            .collect();
        for node in hanging {
            self.release(node);
        }
    }

    fn descends_from(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.node(node).and_then(|n| n.parent);
        }
        false
    }

    /// Structural equality of two subtrees, possibly in different operations.
    ///
    /// Object properties are compared as a set; everything else in order.
    pub fn subtree_eq(&self, a: NodeId, other: &Operation, b: NodeId) -> bool {
        let (Some(left), Some(right)) = (self.node(a), other.node(b)) else {
            return false;
        };
        let same_attributes = left.name == right.name
            && left.location == right.location
            && left.required == right.required
            && left.schema_type == right.schema_type
            && left.format == right.format
            && left.style == right.style
            && left.explode == right.explode
            && left.default_value == right.default_value
            && same_set(&left.enum_values, &right.enum_values)
            && same_set(&left.examples, &right.examples)
            && left.description == right.description
            && left.resource_identifier == right.resource_identifier;
        if !same_attributes {
            return false;
        }

        let pairwise = |xs: &[NodeId], ys: &[NodeId]| {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .zip(ys.iter())
                    .all(|(x, y)| self.subtree_eq(*x, other, *y))
        };

        match (&left.kind, &right.kind) {
            (NodeKind::Null(x), NodeKind::Null(y))
            | (NodeKind::Boolean(x), NodeKind::Boolean(y))
            | (NodeKind::Generic(x), NodeKind::Generic(y)) => x == y,
            (NodeKind::Number(x), NodeKind::Number(y)) => x == y,
            (NodeKind::String(x), NodeKind::String(y)) => x == y,
            (NodeKind::Array(x), NodeKind::Array(y)) => {
                x.min_items == y.min_items
                    && x.max_items == y.max_items
                    && x.unique_items == y.unique_items
                    && self.subtree_eq(x.reference_element, other, y.reference_element)
                    && pairwise(&x.elements, &y.elements)
            }
            (NodeKind::Object(x), NodeKind::Object(y)) => {
                x.properties.len() == y.properties.len()
                    && x.properties.iter().all(|p| {
                        y.properties
                            .iter()
                            .any(|q| self.subtree_eq(*p, other, *q))
                    })
            }
            (NodeKind::AllOf(x), NodeKind::AllOf(y))
            | (NodeKind::AnyOf(x), NodeKind::AnyOf(y))
            | (NodeKind::OneOf(x), NodeKind::OneOf(y)) => {
                pairwise(&x.candidates, &y.candidates)
                    && pairwise(&x.pending_properties, &y.pending_properties)
                    && match (x.output_schema, y.output_schema) {
                        (Some(p), Some(q)) => self.subtree_eq(p, other, q),
                        (None, None) => true,
                        _ => false,
                    }
            }
            _ => false,
        }
    }
}

fn same_set(a: &[JsonValue], b: &[JsonValue]) -> bool {
    a.len() == b.len() && a.iter().all(|v| b.contains(v))
}

/// Rejects values that do not belong to the leaf's variant.
fn check_value_fits(node: &ParameterNode, value: &JsonValue) -> AppResult<()> {
    let fits = match &node.kind {
        NodeKind::Null(_) => value.is_null(),
        NodeKind::Boolean(_) => value.is_boolean(),
        NodeKind::Number(_) => match node.schema_type {
            ParameterType::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value.as_f64().map(|f| f.fract() == 0.0).unwrap_or(false)
            }
            _ => value.is_number(),
        },
        NodeKind::String(_) => value.is_string(),
        NodeKind::Generic(_) => true,
        _ => false,
    };
    if fits {
        Ok(())
    } else {
        Err(AppError::TypeMismatch(format!(
            "value {} does not fit {} parameter '{}'",
            value, node.schema_type, node.name
        )))
    }
}

/// A read-only operation parsed from an API description.
///
/// Only shared access is available; call [`Template::to_draft`] to obtain a
/// writable copy.
#[derive(Debug, Clone)]
pub struct Template {
    operation: Operation,
}

impl Template {
    /// Freezes an operation into a template.
    pub fn new(mut operation: Operation) -> Self {
        operation.freeze();
        Self { operation }
    }

    /// A writable deep copy of the template.
    pub fn to_draft(&self) -> Operation {
        self.operation.deep_clone()
    }
}

impl Deref for Template {
    type Target = Operation;

    fn deref(&self) -> &Self::Target {
        &self.operation
    }
}
