#![deny(missing_docs)]

//! # Combined Schema Merge
//!
//! Folds the candidates of an `allOf`/`anyOf`/`oneOf` node into a single
//! representative schema.
//!
//! * `allOf` folds the candidates left to right, narrowing bounds as it goes.
//! * `anyOf` and `oneOf` take the first selected candidate.
//!
//! Merging allocates fresh nodes, so it needs a writable operation. The
//! merged node is a detached copy whose parent is the combined node; use
//! [`Operation::select_output_schema`] to install it as the output schema.

use crate::error::{AppError, AppResult};
use crate::params::node::{LeafData, NodeId, NodeKind, ParameterNode};
use crate::params::operation::Operation;
use crate::params::types::ParameterType;
use crate::random::RandomSource;
use serde_json::Value as JsonValue;

impl Operation {
    /// Folds every candidate of a combined schema.
    pub fn merge(&mut self, combined: NodeId) -> AppResult<NodeId> {
        let count = self.candidates(combined)?.len();
        let all: Vec<usize> = (0..count).collect();
        self.merge_subset(combined, &all)
    }

    /// Folds the candidates at `indices`, in the given order.
    ///
    /// An empty selection yields a Null node.
    pub fn merge_subset(&mut self, combined: NodeId, indices: &[usize]) -> AppResult<NodeId> {
        self.ensure_writable("merge schemas")?;
        let candidates = self.candidates(combined)?;
        let schema_type = self.try_node(combined)?.schema_type();

        let mut selected = Vec::with_capacity(indices.len());
        for index in indices {
            let candidate = candidates.get(*index).copied().ok_or_else(|| {
                AppError::General(format!(
                    "candidate index {} out of bounds ({} candidates)",
                    index,
                    candidates.len()
                ))
            })?;
            selected.push(candidate);
        }

        let Some((first, rest)) = selected.split_first() else {
            return self.null_output(combined);
        };

        let merged = self.duplicate(*first, Some(combined))?;
        if schema_type == ParameterType::AllOf {
            for candidate in rest {
                self.merge_into(merged, *candidate)?;
            }
        } else if !rest.is_empty() {
            tracing::debug!(
                node = %combined,
                "{} keeps the first of {} selected candidates",
                schema_type,
                selected.len()
            );
        }
        self.resolve_output_schema(combined, merged)?;
        Ok(merged)
    }

    /// Folds `count` candidates picked at random without replacement.
    ///
    /// Zero yields a Null node; a count at or above the number of candidates
    /// folds them all.
    pub fn merge_sample(
        &mut self,
        combined: NodeId,
        count: usize,
        rng: &mut RandomSource,
    ) -> AppResult<NodeId> {
        let available = self.candidates(combined)?.len();
        if count == 0 {
            return self.null_output(combined);
        }
        if count >= available {
            return self.merge(combined);
        }
        let indices = rng.sample_indices(available, count);
        self.merge_subset(combined, &indices)
    }

    /// Merges all candidates and installs the result as the output schema.
    pub fn select_output_schema(&mut self, combined: NodeId) -> AppResult<NodeId> {
        let merged = self.merge(combined)?;
        self.set_output_schema(combined, merged)?;
        Ok(merged)
    }

    fn candidates(&self, combined: NodeId) -> AppResult<Vec<NodeId>> {
        let node = self.try_node(combined)?;
        node.kind()
            .combined()
            .map(|c| c.candidates.clone())
            .ok_or_else(|| {
                AppError::TypeMismatch(format!(
                    "'{}' is a {} node, not a combined schema",
                    node.name(),
                    node.kind().label()
                ))
            })
    }

    fn null_output(&mut self, combined: NodeId) -> AppResult<NodeId> {
        let node = self.try_node(combined)?;
        let mut null = ParameterNode::new(
            node.name().clone(),
            node.location(),
            ParameterType::Null,
            NodeKind::Null(LeafData::default()),
        );
        null.parent = Some(combined);
        self.alloc(null)
    }

    /// Gives the merged node the identity of the combined schema it replaces.
    fn resolve_output_schema(&mut self, combined: NodeId, merged: NodeId) -> AppResult<()> {
        let source = self.try_node(combined)?;
        let (name, location, required) = (source.name().clone(), source.location(), source.is_required());
        self.set_name(merged, name)?;
        self.set_location_recursive(merged, location)?;
        if required {
            self.set_required(merged, true)?;
        }
        Ok(())
    }

    /// Narrows `target` in place with the constraints of `source`.
    fn merge_into(&mut self, target: NodeId, source: NodeId) -> AppResult<()> {
        // Nested combined schemas are resolved to their own merge first.
        if self.try_node(source)?.kind().combined().is_some() {
            let resolved = self.merge(source)?;
            let result = self.merge_into(target, resolved);
            self.free_subtree(resolved);
            return result;
        }
        if self.try_node(target)?.kind().combined().is_some() {
            let resolved = self.merge(target)?;
            self.transplant(target, resolved)?;
        }

        self.merge_attributes(target, source)?;

        let target_kind = self.try_node(target)?.kind().clone();
        let source_node = self.try_node(source)?.clone();
        match (target_kind, &source_node.kind) {
            (NodeKind::Generic(_), source_kind) if !matches!(source_kind, NodeKind::Generic(_)) => {
                let copy = self.duplicate(source, None)?;
                self.transplant(target, copy)?;
            }
            (_, NodeKind::Generic(_)) => {}
            (NodeKind::Number(mut a), NodeKind::Number(b)) => {
                a.maximum = narrowed(a.maximum, b.maximum, f64::min);
                a.minimum = narrowed(a.minimum, b.minimum, f64::max);
                a.exclusive_maximum |= b.exclusive_maximum;
                a.exclusive_minimum |= b.exclusive_minimum;
                let node = self.node_mut(target, "merge schemas")?;
                if source_node.schema_type() == ParameterType::Integer {
                    node.schema_type = ParameterType::Integer;
                }
                node.kind = NodeKind::Number(a);
            }
            (NodeKind::String(mut a), NodeKind::String(b)) => {
                a.max_length = narrowed(a.max_length, b.max_length, usize::min);
                a.min_length = narrowed(a.min_length, b.min_length, usize::max);
                if a.pattern.is_none() {
                    a.pattern = b.pattern.clone();
                }
                self.node_mut(target, "merge schemas")?.kind = NodeKind::String(a);
            }
            (NodeKind::Object(a), NodeKind::Object(b)) => {
                for property in &b.properties {
                    let Some(name) = self.node(*property).map(|p| p.name().raw().to_string())
                    else {
                        continue;
                    };
                    let existing = a.properties.iter().copied().find(|id| {
                        self.node(*id)
                            .map(|n| n.name().raw() == name)
                            .unwrap_or(false)
                    });
                    match existing {
                        Some(existing) => self.merge_into(existing, *property)?,
                        None => {
                            let copy = self.duplicate(*property, None)?;
                            self.add_property(target, copy)?;
                        }
                    }
                }
            }
            (NodeKind::Array(mut a), NodeKind::Array(b)) => {
                self.merge_into(a.reference_element, b.reference_element)?;
                a.max_items = narrowed(a.max_items, b.max_items, usize::min);
                a.min_items = narrowed(a.min_items, b.min_items, usize::max);
                a.unique_items |= b.unique_items;
                if let NodeKind::Array(current) = &mut self.node_mut(target, "merge schemas")?.kind {
                    current.min_items = a.min_items;
                    current.max_items = a.max_items;
                    current.unique_items = a.unique_items;
                }
            }
            (NodeKind::Null(_), NodeKind::Null(_)) | (NodeKind::Boolean(_), NodeKind::Boolean(_)) => {}
            (target_kind, source_kind) => {
                tracing::warn!(
                    target = %target,
                    source = %source,
                    "cannot merge {} into {}, keeping the target schema",
                    source_kind.label(),
                    target_kind.label()
                );
            }
        }
        Ok(())
    }

    fn merge_attributes(&mut self, target: NodeId, source: NodeId) -> AppResult<()> {
        let source = self.try_node(source)?.clone();
        let node = self.node_mut(target, "merge schemas")?;
        node.required |= source.required;
        if !node.format.is_declared() {
            node.format = source.format.clone();
        }
        if node.style.is_none() {
            node.style = source.style;
        }
        if node.explode.is_none() {
            node.explode = source.explode;
        }
        if node.default_value.is_none() {
            node.default_value = source.default_value.clone();
        }
        if node.description.is_none() {
            node.description = source.description.clone();
        }
        node.resource_identifier |= source.resource_identifier;
        node.enum_values = intersect_enums(&node.enum_values, &source.enum_values);
        for example in source.examples {
            crate::params::node::insert_unique(&mut node.examples, example);
        }
        Ok(())
    }
}

/// Both sides must constrain for the result to constrain.
fn narrowed<T: Copy>(a: Option<T>, b: Option<T>, pick: fn(T, T) -> T) -> Option<T> {
    match (a, b) {
        (Some(a), Some(b)) => Some(pick(a, b)),
        _ => None,
    }
}

fn intersect_enums(a: &[JsonValue], b: &[JsonValue]) -> Vec<JsonValue> {
    match (a.is_empty(), b.is_empty()) {
        (true, _) => b.to_vec(),
        (_, true) => a.to_vec(),
        _ => {
            let common: Vec<JsonValue> = a.iter().filter(|v| b.contains(v)).cloned().collect();
            if common.is_empty() {
                tracing::warn!("allOf enums are disjoint, keeping the first");
                a.to_vec()
            } else {
                common
            }
        }
    }
}
