#![deny(missing_docs)]

//! # APIProbe Core
//!
//! Parameter modeling and rule inference for REST API test generation.
//!
//! Operations are parsed into read-only [`Template`]s of typed parameter
//! nodes. Writable drafts of them are filled with values, serialized per
//! OpenAPI style, addressed by structural and REST paths, and constrained by
//! [`rules::Rule`]s that are confirmed against the live API.

/// Shared error types.
pub mod error;

/// Parameter node model.
pub mod params;

/// Style-based value serialization.
pub mod serializer;

/// Structural and REST path addressing.
pub mod path;

/// Rule taxonomy, application and validation.
pub mod rules;

/// Binary-search exploration of numeric bounds.
pub mod explorer;

/// Seedable randomness.
pub mod random;

/// Observed response values.
pub mod catalogue;

/// Leaf value generation.
pub mod provider;

/// Test sequences, runners and oracles.
pub mod runner;

/// Engine settings.
pub mod config;

/// Shared engine state.
pub mod context;

pub use catalogue::ValueCatalogue;
pub use config::EngineConfig;
pub use context::Context;
pub use error::{AppError, AppResult};
pub use explorer::{DomainExplorer, DEFAULT_MAX_ITERATIONS};
pub use params::{
    NodeId, NodeKind, Operation, OperationDescriptor, ParameterFactory, ParameterFormat,
    ParameterLocation, ParameterNode, ParameterStyle, ParameterType, Template,
};
pub use path::{PathToken, ResponseSelector, RestPath, RestScope, StructuralPath};
pub use provider::{RandomValueProvider, ValueProvider};
pub use random::RandomSource;
pub use rules::{Rule, RuleOrigin, RulePayload, RuleType};
pub use runner::{
    ExecutedSequence, ExecutedStep, Oracle, StatusClass, StatusCodeOracle, TestRunner,
    TestSequence,
};
pub use serializer::{render, render_declared};
