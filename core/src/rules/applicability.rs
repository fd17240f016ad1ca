#![deny(missing_docs)]

//! # Rule Applicability
//!
//! Whether a rule can join a combination of rules already selected for an
//! operation. A rule is applicable when every parameter it names exists in
//! the operation, its payload fits those parameters, and it does not clash
//! with a selected rule.

use crate::params::{cast_to_node, NodeKind, Operation, ParameterLocation};
use crate::rules::{targets, Rule, RulePayload, RuleType};

impl Rule {
    /// True when the rule may be added to `combination` for `op`.
    pub fn is_applicable(&self, op: &Operation, combination: &[Rule]) -> bool {
        if self.rule_type() == RuleType::ArithmeticRelational {
            return false;
        }
        if self.parameters().is_empty() || combination.contains(self) {
            return false;
        }
        if !self.parameters().iter().all(|p| !targets(op, p).is_empty()) {
            return false;
        }
        self.fits(op) && combination.iter().all(|other| !self.conflicts_with(other))
    }

    /// Payload checks against the operation's nodes.
    fn fits(&self, op: &Operation) -> bool {
        let ids: Vec<_> = self
            .parameters()
            .iter()
            .flat_map(|p| targets(op, p))
            .collect();
        let nodes = || ids.iter().filter_map(|id| op.node(*id));

        match self.payload() {
            RulePayload::Remove => nodes().all(|n| n.location() != ParameterLocation::Path),
            RulePayload::Or
            | RulePayload::OnlyOne
            | RulePayload::AllOrNone
            | RulePayload::ZeroOrOne => self.parameters().len() >= 2,
            RulePayload::Maximum(_)
            | RulePayload::Minimum(_)
            | RulePayload::ExclusiveMaximum(_)
            | RulePayload::ExclusiveMinimum(_) => {
                nodes().all(|n| matches!(n.kind(), NodeKind::Number(_)))
            }
            RulePayload::CollectionFormat(_) => {
                nodes().all(|n| matches!(n.kind(), NodeKind::Array(_)))
            }
            RulePayload::Default(value) | RulePayload::Example(value) => ids
                .iter()
                .all(|id| cast_to_node(op, *id, value).is_some()),
            RulePayload::Enum(values) => ids
                .iter()
                .all(|id| values.iter().any(|v| cast_to_node(op, *id, v).is_some())),
            RulePayload::Type(_) => nodes().all(|n| n.kind().combined().is_none()),
            _ => true,
        }
    }

    /// True when both rules cannot be applied together.
    fn conflicts_with(&self, other: &Rule) -> bool {
        if !self.shares_parameter(other) {
            return false;
        }
        let (mine, theirs) = (self.rule_type(), other.rule_type());

        // A removed parameter cannot be constrained in any other way.
        if mine == RuleType::Remove || theirs == RuleType::Remove {
            return true;
        }
        if mine.is_set_relationship() && theirs.is_set_relationship() {
            return true;
        }
        if mine == theirs {
            return match (self.payload(), other.payload()) {
                // Several Requires rules and several Examples compose.
                (RulePayload::Requires(_), RulePayload::Requires(_)) => false,
                (RulePayload::Example(_), RulePayload::Example(_)) => false,
                _ => true,
            };
        }
        match (self.payload(), other.payload()) {
            (RulePayload::Maximum(max), RulePayload::Minimum(min))
            | (RulePayload::Minimum(min), RulePayload::Maximum(max)) => min > max,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ParameterFactory, RawMap};
    use crate::rules::RuleOrigin;
    use serde_json::{json, Value as JsonValue};

    fn operation() -> Operation {
        let mut op = Operation::new("listPets", "GET", "/pets/{owner}");
        for raw in [
            json!({"name": "owner", "in": "path", "schema": {"type": "string"}}),
            json!({"name": "limit", "in": "query", "schema": {"type": "integer"}}),
            json!({"name": "offset", "in": "query", "schema": {"type": "integer"}}),
            json!({"name": "tag", "in": "query", "schema": {"type": "string"}}),
        ] {
            let raw: RawMap = raw.as_object().cloned().unwrap();
            let id = ParameterFactory::build(&mut op, None, &raw, None, ParameterLocation::Query)
                .unwrap();
            op.attach_parameter(id).unwrap();
        }
        op
    }

    fn rule(params: &[&str], payload: RulePayload) -> Rule {
        Rule::new(
            params.iter().map(|p| p.to_string()).collect(),
            payload,
            RuleOrigin::Extraction,
        )
    }

    #[test]
    fn test_unknown_parameters_are_inapplicable() {
        let op = operation();
        assert!(!rule(&["missing"], RulePayload::Required).is_applicable(&op, &[]));
        assert!(rule(&["tag"], RulePayload::Required).is_applicable(&op, &[]));
    }

    #[test]
    fn test_arithmetic_relations_are_never_applicable() {
        let op = operation();
        let r = rule(&["limit", "offset"], RulePayload::ArithmeticRelational("limit > offset".into()));
        assert!(!r.is_applicable(&op, &[]));
    }

    #[test]
    fn test_presence_rules_collide() {
        let op = operation();
        let required = rule(&["tag"], RulePayload::Required);
        let remove = rule(&["tag"], RulePayload::Remove);
        assert!(!remove.is_applicable(&op, &[required.clone()]));
        assert!(!required.is_applicable(&op, &[remove]));
        assert!(!required.is_applicable(&op, &[required.clone()]));
        assert!(!rule(&["owner"], RulePayload::Remove).is_applicable(&op, &[]));
    }

    #[test]
    fn test_one_set_relationship_per_parameter() {
        let op = operation();
        let or = rule(&["limit", "offset"], RulePayload::Or);
        let only_one = rule(&["offset", "tag"], RulePayload::OnlyOne);
        let disjoint = rule(&["tag", "owner"], RulePayload::ZeroOrOne);
        assert!(!only_one.is_applicable(&op, &[or.clone()]));
        assert!(disjoint.is_applicable(&op, &[or]));
        assert!(!rule(&["tag"], RulePayload::Or).is_applicable(&op, &[]));
    }

    #[test]
    fn test_payload_must_fit() {
        let op = operation();
        assert!(!rule(&["tag"], RulePayload::Maximum(3.0)).is_applicable(&op, &[]));
        assert!(rule(&["limit"], RulePayload::Maximum(3.0)).is_applicable(&op, &[]));
        assert!(!rule(&["limit"], RulePayload::Default(json!("many"))).is_applicable(&op, &[]));
        assert!(rule(&["limit"], RulePayload::Default(json!("5"))).is_applicable(&op, &[]));
        let values: Vec<JsonValue> = vec![json!("x"), json!(2)];
        assert!(rule(&["limit"], RulePayload::Enum(values)).is_applicable(&op, &[]));
    }

    #[test]
    fn test_crossed_bounds_conflict() {
        let op = operation();
        let max = rule(&["limit"], RulePayload::Maximum(3.0));
        assert!(!rule(&["limit"], RulePayload::Minimum(5.0)).is_applicable(&op, &[max.clone()]));
        assert!(rule(&["limit"], RulePayload::Minimum(1.0)).is_applicable(&op, &[max]));
    }
}
