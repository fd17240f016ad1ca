#![deny(missing_docs)]

//! # Engine Context
//!
//! Bundles the state a rule application or validation run needs: settings,
//! the random source, the observed-value catalogue and the value provider.
//! It is passed explicitly; nothing in the crate is global.

use crate::catalogue::ValueCatalogue;
use crate::config::EngineConfig;
use crate::error::AppResult;
use crate::explorer::DomainExplorer;
use crate::params::{NodeId, Operation};
use crate::provider::{populate, RandomValueProvider, ValueProvider};
use crate::random::RandomSource;
use serde_json::Value as JsonValue;

/// Shared engine state.
pub struct Context {
    config: EngineConfig,
    rng: RandomSource,
    catalogue: ValueCatalogue,
    provider: Box<dyn ValueProvider>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .field("rng", &self.rng)
            .field("catalogue", &self.catalogue)
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Creates a context seeded from the configuration.
    pub fn new(config: EngineConfig) -> Self {
        let rng = RandomSource::seeded(config.seed);
        Self {
            config,
            rng,
            catalogue: ValueCatalogue::new(),
            provider: Box::new(RandomValueProvider::default()),
        }
    }

    /// Replaces the value provider.
    pub fn with_provider(mut self, provider: Box<dyn ValueProvider>) -> Self {
        self.provider = provider;
        self
    }

    /// The settings.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The random source.
    pub fn rng(&mut self) -> &mut RandomSource {
        &mut self.rng
    }

    /// Observed values.
    pub fn catalogue(&self) -> &ValueCatalogue {
        &self.catalogue
    }

    /// Mutable access to the observed values.
    pub fn catalogue_mut(&mut self) -> &mut ValueCatalogue {
        &mut self.catalogue
    }

    /// A domain explorer honoring the configured attempt cap.
    pub fn explorer(&self) -> DomainExplorer {
        DomainExplorer::new(self.config.exploration_max_iterations)
    }

    /// Asks the provider for a value for one leaf.
    pub fn provide_value(&mut self, op: &Operation, id: NodeId) -> Option<JsonValue> {
        self.provider
            .provide(op, id, &mut self.rng, &self.catalogue)
    }

    /// Fills every empty part of a subtree.
    pub fn populate(&mut self, op: &mut Operation, id: NodeId) -> AppResult<()> {
        populate(op, id, self.provider.as_ref(), &mut self.rng, &self.catalogue)
    }

    /// Fills every request parameter and the request body.
    pub fn populate_request(&mut self, op: &mut Operation) -> AppResult<()> {
        let roots: Vec<NodeId> = op
            .parameters()
            .iter()
            .copied()
            .chain(op.request_body())
            .collect();
        for root in roots {
            self.populate(op, root)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ParameterFactory, ParameterLocation, RawMap};
    use serde_json::json;

    struct Fixed;

    impl ValueProvider for Fixed {
        fn provide(
            &self,
            _op: &Operation,
            _id: NodeId,
            _rng: &mut RandomSource,
            _catalogue: &ValueCatalogue,
        ) -> Option<JsonValue> {
            Some(json!("7"))
        }
    }

    #[test]
    fn test_custom_provider_is_used() {
        let mut op = Operation::new("op", "GET", "/pets");
        let raw: RawMap = json!({"name": "limit", "in": "query", "schema": {"type": "integer"}})
            .as_object()
            .cloned()
            .unwrap();
        let id = ParameterFactory::build(&mut op, None, &raw, None, ParameterLocation::Query).unwrap();
        op.attach_parameter(id).unwrap();

        let mut ctx = Context::default().with_provider(Box::new(Fixed));
        ctx.populate_request(&mut op).unwrap();
        assert_eq!(op.node(id).unwrap().value(), Some(&json!(7)));
    }

    #[test]
    fn test_explorer_follows_config() {
        let config = EngineConfig {
            exploration_max_iterations: 3,
            ..EngineConfig::default()
        };
        assert_eq!(Context::new(config).explorer().max_iterations(), 3);
    }
}
