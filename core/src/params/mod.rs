#![deny(missing_docs)]

//! # Parameter Model
//!
//! Typed, recursively structured parameter nodes stored in an operation
//! arena, and everything that builds, merges, casts and walks them.

pub mod cast;
pub mod factory;
pub mod merge;
pub mod node;
pub mod operation;
pub mod traversal;
pub mod types;

pub use cast::{cast_to_node, cast_value};
pub use factory::{OperationDescriptor, ParameterFactory, RawMap, RequestBodyDescriptor};
pub use node::{
    ArrayNode, CombinedNode, LeafData, LeafReference, NodeId, NodeKind, NodeValue, NumberLeaf,
    ObjectNode, ParameterNode, StringLeaf,
};
pub use operation::{Operation, Template};
pub use types::{
    normalize_name, CollectionFormat, ParameterFormat, ParameterLocation, ParameterName,
    ParameterStyle, ParameterType,
};
