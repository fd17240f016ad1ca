#![deny(missing_docs)]

//! # Rule Factory
//!
//! Turns declared parameter metadata and rule-extraction responses into
//! [`Rule`]s. Unusable input is skipped with a warning; the factory never
//! fails.

use crate::params::{
    CollectionFormat, NodeId, NodeKind, Operation, ParameterFormat, ParameterType,
};
use crate::rules::extraction::ExtractionResponse;
use crate::rules::requires::RequiresExpression;
use crate::rules::{Rule, RuleOrigin, RulePayload};
use regex::Regex;
use serde_json::Value as JsonValue;
use std::sync::OnceLock;

/// Builds rules.
pub struct RuleFactory;

impl RuleFactory {
    /// Rules stated by the operation's declared metadata.
    ///
    /// Covers root parameters and object properties; array items and
    /// combined-schema alternatives are not parameters of their own.
    pub fn from_specification(op: &Operation) -> Vec<Rule> {
        let mut rules: Vec<Rule> = Vec::new();
        let mut push = |rule: Rule| {
            if !rules.contains(&rule) {
                rules.push(rule);
            }
        };

        for id in op.all_request_nodes() {
            if !is_named_parameter(op, id) {
                continue;
            }
            let Some(node) = op.node(id) else { continue };
            let name = node.name().raw().to_string();
            let rule = |payload| Rule::single(name.clone(), payload, RuleOrigin::Specification);

            if node.is_required() {
                push(rule(RulePayload::Required));
            }
            if node.kind().combined().is_none() && node.schema_type() != ParameterType::Unknown {
                push(rule(RulePayload::Type(node.schema_type())));
            }
            if node.format().is_declared() {
                push(rule(RulePayload::Format(node.format().clone())));
            }
            if let NodeKind::Number(leaf) = node.kind() {
                if let Some(min) = leaf.minimum {
                    push(rule(RulePayload::Minimum(min)));
                }
                if let Some(max) = leaf.maximum {
                    push(rule(RulePayload::Maximum(max)));
                }
                if leaf.exclusive_minimum {
                    push(rule(RulePayload::ExclusiveMinimum(true)));
                }
                if leaf.exclusive_maximum {
                    push(rule(RulePayload::ExclusiveMaximum(true)));
                }
            }
            if let Some(default) = node.default_value() {
                push(rule(RulePayload::Default(default.clone())));
            }
            if !node.enum_values().is_empty() {
                push(rule(RulePayload::Enum(node.enum_values().to_vec())));
            }
            for example in node.examples() {
                push(rule(RulePayload::Example(example.clone())));
            }
        }
        rules
    }

    /// Rules carried by a rule-extraction response.
    pub fn from_extraction_response(response: &ExtractionResponse) -> Vec<Rule> {
        let mut rules = Vec::new();
        for (parameter, keywords) in response {
            for (keyword, values) in keywords {
                let rule = |payload| Rule::single(parameter.clone(), payload, RuleOrigin::Extraction);
                match keyword.as_str() {
                    "default" => match values.first() {
                        Some(value) => rules.push(rule(RulePayload::Default(value.clone()))),
                        None => tracing::warn!(parameter = %parameter, "empty default"),
                    },
                    "enum" if !values.is_empty() => {
                        rules.push(rule(RulePayload::Enum(values.clone())))
                    }
                    "example" => {
                        for value in values {
                            rules.push(rule(RulePayload::Example(value.clone())));
                        }
                    }
                    "required" if is_affirmative(values) => rules.push(rule(RulePayload::Required)),
                    "remove" if is_affirmative(values) => rules.push(rule(RulePayload::Remove)),
                    "minimum" => {
                        if let Some(n) = first_number(values) {
                            rules.push(rule(RulePayload::Minimum(n)));
                        }
                    }
                    "maximum" => {
                        if let Some(n) = first_number(values) {
                            rules.push(rule(RulePayload::Maximum(n)));
                        }
                    }
                    "exclusiveMinimum" => match exclusive(values) {
                        Some((bound, flag)) => {
                            if let Some(n) = bound {
                                rules.push(rule(RulePayload::Minimum(n)));
                            }
                            rules.push(rule(RulePayload::ExclusiveMinimum(flag)));
                        }
                        None => tracing::warn!(parameter = %parameter, "unreadable exclusiveMinimum"),
                    },
                    "exclusiveMaximum" => match exclusive(values) {
                        Some((bound, flag)) => {
                            if let Some(n) = bound {
                                rules.push(rule(RulePayload::Maximum(n)));
                            }
                            rules.push(rule(RulePayload::ExclusiveMaximum(flag)));
                        }
                        None => tracing::warn!(parameter = %parameter, "unreadable exclusiveMaximum"),
                    },
                    "type" => {
                        match first_str(values).and_then(|s| s.parse::<ParameterType>().ok()) {
                            Some(t) => rules.push(rule(RulePayload::Type(t))),
                            None => tracing::warn!(parameter = %parameter, "unknown type in extraction response"),
                        }
                    }
                    "format" => {
                        if let Some(format) = first_str(values) {
                            rules.push(rule(RulePayload::Format(ParameterFormat::parse(format))));
                        }
                    }
                    "collectionFormat" => {
                        match first_str(values).and_then(CollectionFormat::parse) {
                            Some(cf) => rules.push(rule(RulePayload::CollectionFormat(cf))),
                            None => tracing::warn!(parameter = %parameter, "unknown collectionFormat"),
                        }
                    }
                    "IPD" => {
                        rules.extend(
                            values
                                .iter()
                                .filter_map(JsonValue::as_str)
                                .filter_map(Self::parse_dependency),
                        );
                    }
                    "enum" | "required" | "remove" => {}
                    other => tracing::warn!(parameter = %parameter, keyword = other, "unknown rule keyword"),
                }
            }
        }
        rules
    }

    /// Parses an inter-parameter dependency: `Or(a, b)`, `OnlyOne(...)`,
    /// `AllOrNone(...)`, `ZeroOrOne(...)`, `IF ... THEN ...;`, or an
    /// arithmetic relation such as `start < end`.
    pub fn parse_dependency(text: &str) -> Option<Rule> {
        static SET_RE: OnceLock<Regex> = OnceLock::new();
        static ARITH_RE: OnceLock<Regex> = OnceLock::new();
        static IDENT_RE: OnceLock<Regex> = OnceLock::new();
        let set_re = SET_RE.get_or_init(|| {
            Regex::new(r"^\s*(Or|OnlyOne|AllOrNone|ZeroOrOne)\s*\(([^)]*)\)\s*;?\s*$")
                .expect("Invalid regex")
        });
        let arith_re = ARITH_RE.get_or_init(|| {
            Regex::new(r"^[\w.\s+\-*/()]+(==|!=|>=|<=|>|<)[\w.\s+\-*/()]+;?$").expect("Invalid regex")
        });
        let ident_re =
            IDENT_RE.get_or_init(|| Regex::new(r"[A-Za-z_][\w.]*").expect("Invalid regex"));

        let text = text.trim();
        if let Some(caps) = set_re.captures(text) {
            let parameters: Vec<String> = caps[2]
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect();
            if parameters.len() < 2 {
                tracing::warn!(dependency = text, "set relationship needs two parameters");
                return None;
            }
            let payload = match &caps[1] {
                "Or" => RulePayload::Or,
                "OnlyOne" => RulePayload::OnlyOne,
                "AllOrNone" => RulePayload::AllOrNone,
                _ => RulePayload::ZeroOrOne,
            };
            return Some(Rule::new(parameters, payload, RuleOrigin::Extraction));
        }
        if text.to_ascii_uppercase().starts_with("IF ") {
            return match text.parse::<RequiresExpression>() {
                Ok(expression) => Some(Rule::new(
                    expression.parameters(),
                    RulePayload::Requires(expression),
                    RuleOrigin::Extraction,
                )),
                Err(err) => {
                    tracing::warn!(dependency = text, error = %err, "unreadable requires expression");
                    None
                }
            };
        }
        if arith_re.is_match(text) {
            let mut parameters: Vec<String> = Vec::new();
            for m in ident_re.find_iter(text) {
                if !parameters.iter().any(|p| p == m.as_str()) {
                    parameters.push(m.as_str().to_string());
                }
            }
            return Some(Rule::new(
                parameters,
                RulePayload::ArithmeticRelational(text.to_string()),
                RuleOrigin::Extraction,
            ));
        }
        tracing::warn!(dependency = text, "unrecognized dependency");
        None
    }
}

/// Root parameters and object properties; not array items, reference
/// elements, or combined-schema alternatives.
fn is_named_parameter(op: &Operation, id: NodeId) -> bool {
    let Some(node) = op.node(id) else {
        return false;
    };
    if node.name().is_empty() {
        return false;
    }
    match node.parent().and_then(|p| op.node(p)) {
        Some(parent) => matches!(parent.kind(), NodeKind::Object(_)),
        None => true,
    }
}

fn is_affirmative(values: &[JsonValue]) -> bool {
    values.is_empty()
        || values.iter().any(|v| match v {
            JsonValue::Bool(b) => *b,
            JsonValue::String(s) => s.eq_ignore_ascii_case("true"),
            _ => false,
        })
}

fn number_of(value: &JsonValue) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

fn first_number(values: &[JsonValue]) -> Option<f64> {
    values.iter().find_map(number_of)
}

fn first_str(values: &[JsonValue]) -> Option<&str> {
    values.iter().find_map(JsonValue::as_str)
}

/// Boolean flags (OpenAPI 3.0) or numeric bounds (3.1) of the exclusive keywords.
fn exclusive(values: &[JsonValue]) -> Option<(Option<f64>, bool)> {
    let value = values.first()?;
    match value {
        JsonValue::Bool(b) => Some((None, *b)),
        JsonValue::String(s) if s.eq_ignore_ascii_case("true") => Some((None, true)),
        JsonValue::String(s) if s.eq_ignore_ascii_case("false") => Some((None, false)),
        other => number_of(other).map(|n| (Some(n), true)),
    }
}
