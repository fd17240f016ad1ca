#![deny(missing_docs)]

//! # Rules
//!
//! Declarative constraints over request parameters. A rule names its
//! parameters and carries a kind-specific payload; it is bound to concrete
//! nodes only when applied to an operation, by name lookup, so one rule can
//! serve many operations.
//!
//! * [`applicability`]: compatibility with the rules already chosen.
//! * [`apply`]: mutation of a writable operation and the matching check.
//! * [`factory`]: rules from declared metadata and extraction responses.
//! * [`extraction`]: the optional rule-extraction service.
//! * [`requires`]: the `IF ... THEN ...;` expression language.
//! * [`validation`]: confirmation of rules against the live API.

pub mod applicability;
pub mod apply;
pub mod extraction;
pub mod factory;
pub mod requires;
pub mod validation;

pub use apply::apply_combination;
pub use extraction::{extract_rules, ExtractionRequest, ExtractionResponse, RuleExtractor};
pub use factory::RuleFactory;
pub use requires::{Clause, Predicate, RequiresExpression};
pub use validation::{RuleValidator, ValidationOutcome};

use crate::params::{
    CollectionFormat, NodeId, NodeKind, Operation, ParameterFormat, ParameterType,
};
use serde_json::Value as JsonValue;
use std::fmt;

/// Rule kinds, in the order they are applied when combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RuleType {
    /// The parameter does not exist and must be left out.
    Remove,
    /// The parameter must always be sent.
    Required,
    /// At least one of the parameters must be sent.
    Or,
    /// Exactly one of the parameters must be sent.
    OnlyOne,
    /// Either all of the parameters are sent or none is.
    AllOrNone,
    /// At most one of the parameters may be sent.
    ZeroOrOne,
    /// The real type of the parameter.
    Type,
    /// The real format of the parameter.
    Format,
    /// Inclusive upper bound.
    Maximum,
    /// Inclusive lower bound.
    Minimum,
    /// Whether the upper bound is exclusive.
    ExclusiveMaximum,
    /// Whether the lower bound is exclusive.
    ExclusiveMinimum,
    /// A default value.
    Default,
    /// How array values are joined.
    CollectionFormat,
    /// A conditional dependency between parameters.
    Requires,
    /// The accepted values.
    Enum,
    /// A value known to be accepted.
    Example,
    /// An arithmetic relation between parameters; never applicable.
    ArithmeticRelational,
}

impl RuleType {
    /// True for Or, OnlyOne, AllOrNone and ZeroOrOne.
    pub fn is_set_relationship(&self) -> bool {
        matches!(
            self,
            RuleType::Or | RuleType::OnlyOne | RuleType::AllOrNone | RuleType::ZeroOrOne
        )
    }

    /// True for the presence rules Remove and Required.
    pub fn is_presence(&self) -> bool {
        matches!(self, RuleType::Remove | RuleType::Required)
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Kind-specific data of a rule.
#[derive(Debug, Clone, PartialEq)]
pub enum RulePayload {
    /// See [`RuleType::Remove`].
    Remove,
    /// See [`RuleType::Required`].
    Required,
    /// See [`RuleType::Or`].
    Or,
    /// See [`RuleType::OnlyOne`].
    OnlyOne,
    /// See [`RuleType::AllOrNone`].
    AllOrNone,
    /// See [`RuleType::ZeroOrOne`].
    ZeroOrOne,
    /// See [`RuleType::Type`].
    Type(ParameterType),
    /// See [`RuleType::Format`].
    Format(ParameterFormat),
    /// See [`RuleType::Maximum`].
    Maximum(f64),
    /// See [`RuleType::Minimum`].
    Minimum(f64),
    /// See [`RuleType::ExclusiveMaximum`].
    ExclusiveMaximum(bool),
    /// See [`RuleType::ExclusiveMinimum`].
    ExclusiveMinimum(bool),
    /// See [`RuleType::Default`].
    Default(JsonValue),
    /// See [`RuleType::CollectionFormat`].
    CollectionFormat(CollectionFormat),
    /// See [`RuleType::Requires`].
    Requires(RequiresExpression),
    /// See [`RuleType::Enum`].
    Enum(Vec<JsonValue>),
    /// See [`RuleType::Example`].
    Example(JsonValue),
    /// See [`RuleType::ArithmeticRelational`]; keeps the source text.
    ArithmeticRelational(String),
}

impl RulePayload {
    /// The kind of this payload.
    pub fn rule_type(&self) -> RuleType {
        match self {
            RulePayload::Remove => RuleType::Remove,
            RulePayload::Required => RuleType::Required,
            RulePayload::Or => RuleType::Or,
            RulePayload::OnlyOne => RuleType::OnlyOne,
            RulePayload::AllOrNone => RuleType::AllOrNone,
            RulePayload::ZeroOrOne => RuleType::ZeroOrOne,
            RulePayload::Type(_) => RuleType::Type,
            RulePayload::Format(_) => RuleType::Format,
            RulePayload::Maximum(_) => RuleType::Maximum,
            RulePayload::Minimum(_) => RuleType::Minimum,
            RulePayload::ExclusiveMaximum(_) => RuleType::ExclusiveMaximum,
            RulePayload::ExclusiveMinimum(_) => RuleType::ExclusiveMinimum,
            RulePayload::Default(_) => RuleType::Default,
            RulePayload::CollectionFormat(_) => RuleType::CollectionFormat,
            RulePayload::Requires(_) => RuleType::Requires,
            RulePayload::Enum(_) => RuleType::Enum,
            RulePayload::Example(_) => RuleType::Example,
            RulePayload::ArithmeticRelational(_) => RuleType::ArithmeticRelational,
        }
    }
}

/// Where a rule came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleOrigin {
    /// Declared metadata of the API description.
    Specification,
    /// The rule-extraction service.
    Extraction,
    /// Produced by fine validation reclassifying another rule.
    Validation,
}

/// A constraint over named parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    parameters: Vec<String>,
    payload: RulePayload,
    origin: RuleOrigin,
}

impl Rule {
    /// Creates a rule.
    pub fn new(parameters: Vec<String>, payload: RulePayload, origin: RuleOrigin) -> Self {
        Self {
            parameters,
            payload,
            origin,
        }
    }

    /// A rule over a single parameter.
    pub fn single(parameter: impl Into<String>, payload: RulePayload, origin: RuleOrigin) -> Self {
        Self::new(vec![parameter.into()], payload, origin)
    }

    /// The parameter names the rule constrains.
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    /// The first parameter name, if any.
    pub fn parameter(&self) -> Option<&str> {
        self.parameters.first().map(String::as_str)
    }

    /// The payload.
    pub fn payload(&self) -> &RulePayload {
        &self.payload
    }

    /// The kind.
    pub fn rule_type(&self) -> RuleType {
        self.payload.rule_type()
    }

    /// Where the rule came from.
    pub fn origin(&self) -> RuleOrigin {
        self.origin
    }

    /// True when both rules constrain at least one common parameter.
    pub fn shares_parameter(&self, other: &Rule) -> bool {
        self.parameters.iter().any(|p| other.parameters.contains(p))
    }

    /// The same rule with a different origin.
    pub fn with_origin(mut self, origin: RuleOrigin) -> Self {
        self.origin = origin;
        self
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params = self.parameters.join(", ");
        match &self.payload {
            RulePayload::Type(t) => write!(f, "Type({}, {})", params, t),
            RulePayload::Format(v) => write!(f, "Format({}, {})", params, v),
            RulePayload::Maximum(v) => write!(f, "Maximum({}, {})", params, v),
            RulePayload::Minimum(v) => write!(f, "Minimum({}, {})", params, v),
            RulePayload::ExclusiveMaximum(v) => write!(f, "ExclusiveMaximum({}, {})", params, v),
            RulePayload::ExclusiveMinimum(v) => write!(f, "ExclusiveMinimum({}, {})", params, v),
            RulePayload::Default(v) => write!(f, "Default({}, {})", params, v),
            RulePayload::CollectionFormat(v) => write!(f, "CollectionFormat({}, {})", params, v),
            RulePayload::Requires(e) => write!(f, "Requires({})", e),
            RulePayload::Enum(values) => {
                let values: Vec<String> = values.iter().map(JsonValue::to_string).collect();
                write!(f, "Enum({}, [{}])", params, values.join(", "))
            }
            RulePayload::Example(v) => write!(f, "Example({}, {})", params, v),
            RulePayload::ArithmeticRelational(text) => write!(f, "ArithmeticRelational({})", text),
            other => write!(f, "{}({})", other.rule_type(), params),
        }
    }
}

/// Request-side nodes a parameter name refers to.
///
/// Array elements and reference elements carry their array's name and are
/// not parameters of their own, so they are skipped.
pub(crate) fn targets(op: &Operation, name: &str) -> Vec<NodeId> {
    op.find_by_name(name)
        .into_iter()
        .filter(|id| {
            let parent = op.node(*id).and_then(|n| n.parent());
            !matches!(
                parent.and_then(|p| op.node(p)).map(|p| p.kind()),
                Some(NodeKind::Array(_))
            )
        })
        .collect()
}

/// True when some target of `name` holds a value.
pub(crate) fn is_present(op: &Operation, name: &str) -> bool {
    targets(op, name).iter().any(|id| !op.is_empty(*id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rule_types_are_ordered_for_application() {
        let mut kinds = vec![RuleType::Example, RuleType::Remove, RuleType::Maximum, RuleType::Or];
        kinds.sort();
        assert_eq!(
            kinds,
            vec![RuleType::Remove, RuleType::Or, RuleType::Maximum, RuleType::Example]
        );
        assert!(RuleType::OnlyOne.is_set_relationship());
        assert!(!RuleType::Requires.is_set_relationship());
    }

    #[test]
    fn test_display() {
        let rule = Rule::new(
            vec!["a".into(), "b".into()],
            RulePayload::OnlyOne,
            RuleOrigin::Extraction,
        );
        assert_eq!(rule.to_string(), "OnlyOne(a, b)");
        let rule = Rule::single("limit", RulePayload::Maximum(100.0), RuleOrigin::Specification);
        assert_eq!(rule.to_string(), "Maximum(limit, 100)");
        let rule = Rule::single("s", RulePayload::Enum(vec![json!("x"), json!(1)]), RuleOrigin::Specification);
        assert_eq!(rule.to_string(), r#"Enum(s, ["x", 1])"#);
    }
}
