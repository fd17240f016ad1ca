#![deny(missing_docs)]

//! # Traversal
//!
//! Read-only walks over a subtree. Array reference elements are templates
//! and never take part in these walks; combined schemas are traversed
//! through their output schema when one is selected, else through their
//! candidates.

use crate::params::node::{NodeId, NodeKind};
use crate::params::operation::Operation;
use serde_json::{Map, Value as JsonValue};

impl Operation {
    /// Concrete children of a node: reference elements and pending
    /// properties of unresolved combined schemas are skipped.
    fn concrete_children(&self, id: NodeId) -> Vec<NodeId> {
        match self.node(id).map(|n| n.kind()) {
            Some(NodeKind::Array(a)) => a.elements.clone(),
            Some(NodeKind::Object(o)) => o.properties.clone(),
            Some(kind) => match kind.combined() {
                Some(c) => match c.output_schema {
                    Some(output) => vec![output],
                    None => c.candidates.clone(),
                },
                None => Vec::new(),
            },
            None => Vec::new(),
        }
    }

    fn collect_matching(&self, id: NodeId, keep: &dyn Fn(&NodeKind) -> bool, out: &mut Vec<NodeId>) {
        let Some(node) = self.node(id) else {
            return;
        };
        if keep(node.kind()) {
            out.push(id);
        }
        for child in self.concrete_children(id) {
            self.collect_matching(child, keep, out);
        }
    }

    /// Leaf nodes below (or at) `id`.
    pub fn leaves(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_matching(id, &NodeKind::is_leaf, &mut out);
        out
    }

    /// Array nodes below (or at) `id`.
    pub fn arrays(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_matching(id, &|k| matches!(k, NodeKind::Array(_)), &mut out);
        out
    }

    /// Object nodes below (or at) `id`.
    pub fn objects(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_matching(id, &|k| matches!(k, NodeKind::Object(_)), &mut out);
        out
    }

    /// Leaves of every request root.
    pub fn request_leaves(&self) -> Vec<NodeId> {
        self.parameters()
            .iter()
            .copied()
            .chain(self.request_body())
            .flat_map(|root| self.leaves(root))
            .collect()
    }

    /// True when the subtree carries no concrete value.
    pub fn is_empty(&self, id: NodeId) -> bool {
        let Some(node) = self.node(id) else {
            return true;
        };
        match node.kind() {
            kind if kind.is_leaf() => node.value().is_none(),
            NodeKind::Array(a) => a.elements.is_empty(),
            NodeKind::Object(o) => o.properties.iter().all(|p| self.is_empty(*p)),
            kind => kind
                .combined()
                .and_then(|c| c.output_schema)
                .map(|output| self.is_empty(output))
                .unwrap_or(true),
        }
    }

    /// The concrete JSON value of a subtree, or `None` when it holds none.
    ///
    /// Object properties without a value are omitted; an array renders its
    /// elements only.
    pub fn to_json(&self, id: NodeId) -> Option<JsonValue> {
        let node = self.node(id)?;
        match node.kind() {
            kind if kind.is_leaf() => node.value().cloned(),
            NodeKind::Array(a) => Some(JsonValue::Array(
                a.elements.iter().filter_map(|e| self.to_json(*e)).collect(),
            )),
            NodeKind::Object(o) => {
                let mut map = Map::new();
                for property in &o.properties {
                    if let (Some(p), Some(value)) = (self.node(*property), self.to_json(*property)) {
                        map.insert(p.name().raw().to_string(), value);
                    }
                }
                Some(JsonValue::Object(map))
            }
            kind => kind
                .combined()
                .and_then(|c| c.output_schema)
                .and_then(|output| self.to_json(output)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::factory::ParameterFactory;
    use crate::params::types::ParameterLocation;
    use serde_json::json;

    #[test]
    fn test_reference_elements_are_not_leaves() {
        let mut op = Operation::new("op", "POST", "/");
        let root = ParameterFactory::build_from_value(
            &mut op,
            None,
            "",
            ParameterLocation::RequestBody,
            &json!({"tags": ["a", "b"], "owner": {"id": 3}}),
        )
        .unwrap();
        assert_eq!(op.leaves(root).len(), 3);
        assert_eq!(op.arrays(root).len(), 1);
        assert_eq!(op.objects(root).len(), 2);
        assert!(!op.is_empty(root));
    }

    #[test]
    fn test_cleared_array_is_empty() {
        let mut op = Operation::new("op", "POST", "/");
        let root = ParameterFactory::build_from_value(
            &mut op,
            None,
            "ids",
            ParameterLocation::Query,
            &json!([1, 2]),
        )
        .unwrap();
        op.clear_elements(root).unwrap();
        assert!(op.is_empty(root));
        assert_eq!(op.to_json(root), Some(json!([])));
    }
}
