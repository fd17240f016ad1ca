#![deny(missing_docs)]

//! # Value Providers
//!
//! Sources of concrete values for leaves, and [`populate`], which fills a
//! whole subtree: arrays get elements, combined schemas get an output
//! schema, and every empty leaf asks the provider for a value.

use crate::catalogue::ValueCatalogue;
use crate::error::AppResult;
use crate::params::{cast_value, NodeId, NodeKind, Operation, ParameterFormat, ParameterType};
use crate::random::RandomSource;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::{json, Value as JsonValue};

/// Produces a value for a leaf.
pub trait ValueProvider {
    /// A value for the leaf `id`, or `None` when nothing sensible exists.
    fn provide(
        &self,
        op: &Operation,
        id: NodeId,
        rng: &mut RandomSource,
        catalogue: &ValueCatalogue,
    ) -> Option<JsonValue>;
}

/// Random values honoring the declared metadata.
///
/// Preference order: enum values, examples, the default, values observed in
/// earlier responses, then a fresh value within the declared bounds.
#[derive(Debug, Clone)]
pub struct RandomValueProvider {
    /// Probability of picking an example when examples exist.
    pub example_probability: f64,
    /// Probability of picking the default when one exists.
    pub default_probability: f64,
    /// Probability of reusing an observed value when the catalogue has one.
    pub catalogue_probability: f64,
}

impl Default for RandomValueProvider {
    fn default() -> Self {
        Self {
            example_probability: 0.7,
            default_probability: 0.5,
            catalogue_probability: 0.5,
        }
    }
}

impl ValueProvider for RandomValueProvider {
    fn provide(
        &self,
        op: &Operation,
        id: NodeId,
        rng: &mut RandomSource,
        catalogue: &ValueCatalogue,
    ) -> Option<JsonValue> {
        let node = op.node(id)?;
        let schema_type = node.schema_type();

        if let Some(value) = rng.choose(node.enum_values()) {
            return Some(value.clone());
        }
        if !node.examples().is_empty() && rng.chance(self.example_probability) {
            return rng.choose(node.examples()).cloned();
        }
        if let Some(default) = node.default_value() {
            if rng.chance(self.default_probability) {
                return Some(default.clone());
            }
        }
        let observed: Vec<JsonValue> = catalogue
            .values(node.name().raw())
            .iter()
            .filter_map(|v| cast_value(schema_type, v))
            .collect();
        if !observed.is_empty() && rng.chance(self.catalogue_probability) {
            return rng.choose(&observed).cloned();
        }

        let fresh = match node.kind() {
            NodeKind::Null(_) => JsonValue::Null,
            NodeKind::Boolean(_) => JsonValue::Bool(rng.chance(0.5)),
            NodeKind::Number(leaf) => {
                let step = if schema_type == ParameterType::Integer { 1.0 } else { 0.01 };
                let low = leaf
                    .minimum
                    .map(|m| if leaf.exclusive_minimum { m + step } else { m });
                let high = leaf
                    .maximum
                    .map(|m| if leaf.exclusive_maximum { m - step } else { m });
                let (low, high) = match (low, high) {
                    (Some(l), Some(h)) => (l, h),
                    (Some(l), None) => (l, l + 100.0),
                    (None, Some(h)) => (h - 100.0, h),
                    (None, None) => (0.0, 100.0),
                };
                if schema_type == ParameterType::Integer {
                    json!(rng.int_between(low.ceil() as i64, high.floor() as i64))
                } else {
                    let value = rng.float_between(low, high);
                    json!((value * 100.0).round() / 100.0)
                }
            }
            NodeKind::String(leaf) => {
                let text = formatted_string(node.format(), rng).unwrap_or_else(|| {
                    if leaf.pattern.is_some() {
                        tracing::debug!(parameter = %node.name(), "pattern is not honored by random strings");
                    }
                    let min = leaf.min_length.unwrap_or(1);
                    let max = leaf.max_length.unwrap_or(min.max(10)).max(min);
                    let len = rng.int_between(min as i64, max as i64) as usize;
                    random_text(rng, len)
                });
                JsonValue::String(text)
            }
            NodeKind::Generic(_) => JsonValue::String(random_text(rng, 8)),
            _ => return None,
        };
        Some(fresh)
    }
}

fn random_text(rng: &mut RandomSource, len: usize) -> String {
    rng.rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn formatted_string(format: &ParameterFormat, rng: &mut RandomSource) -> Option<String> {
    let text = match format {
        ParameterFormat::Date => format!(
            "{:04}-{:02}-{:02}",
            rng.int_between(1970, 2030),
            rng.int_between(1, 12),
            rng.int_between(1, 28)
        ),
        ParameterFormat::DateTime => format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
            rng.int_between(1970, 2030),
            rng.int_between(1, 12),
            rng.int_between(1, 28),
            rng.int_between(0, 23),
            rng.int_between(0, 59),
            rng.int_between(0, 59)
        ),
        ParameterFormat::Email => format!("{}@example.com", random_text(rng, 8).to_lowercase()),
        ParameterFormat::Uuid => {
            let hex: String = (0..32)
                .map(|_| {
                    let digit = rng.int_between(0, 15) as u32;
                    char::from_digit(digit, 16).unwrap_or('0')
                })
                .collect();
            format!(
                "{}-{}-{}-{}-{}",
                &hex[0..8],
                &hex[8..12],
                &hex[12..16],
                &hex[16..20],
                &hex[20..32]
            )
        }
        ParameterFormat::Uri => format!("https://example.com/{}", random_text(rng, 6).to_lowercase()),
        ParameterFormat::Hostname => format!("{}.example.com", random_text(rng, 6).to_lowercase()),
        ParameterFormat::Ipv4 => format!(
            "{}.{}.{}.{}",
            rng.int_between(1, 254),
            rng.int_between(0, 255),
            rng.int_between(0, 255),
            rng.int_between(1, 254)
        ),
        ParameterFormat::Ipv6 => (0..8)
            .map(|_| format!("{:x}", rng.int_between(0, 0xffff)))
            .collect::<Vec<_>>()
            .join(":"),
        _ => return None,
    };
    Some(text)
}

/// Fills every empty part of a subtree.
///
/// Arrays without elements receive between `minItems` (default 1) and
/// `maxItems` (default `minItems + 2`) elements. Leaves whose provided value
/// does not fit are left empty with a warning.
pub fn populate(
    op: &mut Operation,
    id: NodeId,
    provider: &dyn ValueProvider,
    rng: &mut RandomSource,
    catalogue: &ValueCatalogue,
) -> AppResult<()> {
    let node = op.try_node(id)?;
    match node.kind().clone() {
        kind if kind.is_leaf() => {
            if node.value().is_some() {
                return Ok(());
            }
            match provider.provide(op, id, rng, catalogue) {
                Some(value) => {
                    let schema_type = op.try_node(id)?.schema_type();
                    match cast_value(schema_type, &value) {
                        Some(cast) => op.set_value(id, cast)?,
                        None => tracing::warn!(node = %id, value = %value, "provided value does not fit {}", schema_type),
                    }
                }
                None => tracing::warn!(node = %id, "no value available"),
            }
        }
        NodeKind::Array(array) => {
            let mut elements = array.elements.clone();
            if elements.is_empty() {
                let min = array.min_items.unwrap_or(1);
                let max = array.max_items.unwrap_or(min + 2).max(min);
                let count = rng.int_between(min as i64, max as i64) as usize;
                for _ in 0..count {
                    elements.push(op.new_element(id)?);
                }
            }
            for element in elements {
                populate(op, element, provider, rng, catalogue)?;
            }
        }
        NodeKind::Object(object) => {
            for property in object.properties {
                populate(op, property, provider, rng, catalogue)?;
            }
        }
        kind => {
            let output = match kind.combined().and_then(|c| c.output_schema) {
                Some(output) => output,
                None => op.select_output_schema(id)?,
            };
            populate(op, output, provider, rng, catalogue)?;
        }
    }
    Ok(())
}
