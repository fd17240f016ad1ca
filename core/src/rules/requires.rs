#![deny(missing_docs)]

//! # Requires Expressions
//!
//! Conditional dependencies between parameters, written as
//! `IF <condition> THEN <statement>;`. Both sides are `AND`-joined clauses:
//!
//! * `p` / `NOT p`: presence or absence of `p`
//! * `p == v` / `p != v`: equality with a literal
//! * `p > n`, `p >= n`, `p < n`, `p <= n`: numeric comparisons
//!
//! Literals are JSON (`1`, `true`, `"x"`), single-quoted strings, or bare words.

use crate::context::Context;
use crate::error::{AppError, AppResult};
use crate::params::{cast_to_node, NodeId, Operation};
use crate::rules::{is_present, targets};
use regex::Regex;
use serde_json::{json, Value as JsonValue};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// What a clause asserts about its parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// The parameter is sent.
    Present,
    /// The parameter is left out.
    Absent,
    /// The parameter equals the literal.
    Equals(JsonValue),
    /// The parameter is sent and differs from the literal.
    NotEquals(JsonValue),
    /// `>`
    Greater(f64),
    /// `>=`
    GreaterOrEqual(f64),
    /// `<`
    Less(f64),
    /// `<=`
    LessOrEqual(f64),
}

/// One assertion about one parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    /// Parameter name.
    pub parameter: String,
    /// The assertion.
    pub predicate: Predicate,
}

impl Clause {
    /// The opposite assertion.
    pub fn negate(&self) -> Clause {
        let predicate = match &self.predicate {
            Predicate::Present => Predicate::Absent,
            Predicate::Absent => Predicate::Present,
            Predicate::Equals(v) => Predicate::NotEquals(v.clone()),
            Predicate::NotEquals(v) => Predicate::Equals(v.clone()),
            Predicate::Greater(n) => Predicate::LessOrEqual(*n),
            Predicate::GreaterOrEqual(n) => Predicate::Less(*n),
            Predicate::Less(n) => Predicate::GreaterOrEqual(*n),
            Predicate::LessOrEqual(n) => Predicate::Greater(*n),
        };
        Clause {
            parameter: self.parameter.clone(),
            predicate,
        }
    }

    /// Evaluates the clause against the values currently held by `op`.
    pub fn holds(&self, op: &Operation) -> bool {
        let values = || {
            targets(op, &self.parameter)
                .into_iter()
                .filter_map(|id| op.to_json(id).map(|v| (id, v)))
                .collect::<Vec<_>>()
        };
        match &self.predicate {
            Predicate::Present => is_present(op, &self.parameter),
            Predicate::Absent => !is_present(op, &self.parameter),
            Predicate::Equals(expected) => values()
                .iter()
                .any(|(id, v)| equals(op, *id, v, expected)),
            Predicate::NotEquals(expected) => {
                let values = values();
                !values.is_empty() && values.iter().all(|(id, v)| !equals(op, *id, v, expected))
            }
            Predicate::Greater(n) => compare(values(), |v| v > *n),
            Predicate::GreaterOrEqual(n) => compare(values(), |v| v >= *n),
            Predicate::Less(n) => compare(values(), |v| v < *n),
            Predicate::LessOrEqual(n) => compare(values(), |v| v <= *n),
        }
    }

    /// Mutates `op` so that the clause holds.
    pub fn enforce(&self, op: &mut Operation, ctx: &mut Context) -> AppResult<()> {
        let ids = targets(op, &self.parameter);
        if ids.is_empty() {
            return Err(AppError::General(format!(
                "parameter '{}' does not exist in operation '{}'",
                self.parameter,
                op.operation_id()
            )));
        }
        for id in ids {
            match &self.predicate {
                Predicate::Present => ctx.populate(op, id)?,
                Predicate::Absent => op.remove_node(id)?,
                Predicate::Equals(expected) => assign(op, id, expected)?,
                Predicate::NotEquals(expected) => {
                    ctx.populate(op, id)?;
                    let current = op.to_json(id);
                    if current.as_ref().map(|v| equals(op, id, v, expected)).unwrap_or(false) {
                        assign(op, id, &different_from(expected))?;
                    }
                }
                Predicate::Greater(n) => assign(op, id, &number(n.floor() + 1.0))?,
                Predicate::GreaterOrEqual(n) => assign(op, id, &number(n.ceil()))?,
                Predicate::Less(n) => assign(op, id, &number(n.ceil() - 1.0))?,
                Predicate::LessOrEqual(n) => assign(op, id, &number(n.floor()))?,
            }
        }
        Ok(())
    }
}

fn equals(op: &Operation, id: NodeId, actual: &JsonValue, expected: &JsonValue) -> bool {
    match cast_to_node(op, id, expected) {
        Some(cast) => &cast == actual || numbers_equal(&cast, actual),
        None => actual == expected,
    }
}

fn numbers_equal(a: &JsonValue, b: &JsonValue) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn compare(values: Vec<(NodeId, JsonValue)>, test: impl Fn(f64) -> bool) -> bool {
    values.iter().any(|(_, v)| {
        v.as_f64()
            .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
            .map(&test)
            .unwrap_or(false)
    })
}

fn number(value: f64) -> JsonValue {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        json!(value as i64)
    } else {
        json!(value)
    }
}

fn different_from(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Bool(b) => JsonValue::Bool(!b),
        JsonValue::Number(n) => number(n.as_f64().unwrap_or(0.0) + 1.0),
        JsonValue::String(s) => JsonValue::String(format!("{}_", s)),
        _ => JsonValue::String("other".to_string()),
    }
}

/// Sets a leaf (cast to its type) or a structured subtree to `value`.
pub(crate) fn assign(op: &mut Operation, id: NodeId, value: &JsonValue) -> AppResult<()> {
    let node = op.try_node(id)?;
    if node.is_leaf() {
        let cast = cast_to_node(op, id, value).ok_or_else(|| {
            AppError::TypeMismatch(format!(
                "value {} does not fit parameter '{}' of type {}",
                value,
                node.name(),
                node.schema_type()
            ))
        })?;
        op.set_value(id, cast)
    } else {
        op.set_value_tree(id, value)
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = &self.parameter;
        match &self.predicate {
            Predicate::Present => write!(f, "{}", p),
            Predicate::Absent => write!(f, "NOT {}", p),
            Predicate::Equals(v) => write!(f, "{} == {}", p, v),
            Predicate::NotEquals(v) => write!(f, "{} != {}", p, v),
            Predicate::Greater(n) => write!(f, "{} > {}", p, n),
            Predicate::GreaterOrEqual(n) => write!(f, "{} >= {}", p, n),
            Predicate::Less(n) => write!(f, "{} < {}", p, n),
            Predicate::LessOrEqual(n) => write!(f, "{} <= {}", p, n),
        }
    }
}

impl FromStr for Clause {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        static NOT_RE: OnceLock<Regex> = OnceLock::new();
        static CMP_RE: OnceLock<Regex> = OnceLock::new();
        static NAME_RE: OnceLock<Regex> = OnceLock::new();
        let not_re = NOT_RE.get_or_init(|| Regex::new(r"(?i)^NOT\s+([\w.\-\[\]]+)$").expect("Invalid regex"));
        let cmp_re = CMP_RE.get_or_init(|| {
            Regex::new(r"^([\w.\-\[\]]+)\s*(==|!=|>=|<=|>|<)\s*(.+)$").expect("Invalid regex")
        });
        let name_re = NAME_RE.get_or_init(|| Regex::new(r"^[\w.\-\[\]]+$").expect("Invalid regex"));

        let s = s.trim();
        if let Some(caps) = not_re.captures(s) {
            return Ok(Clause {
                parameter: caps[1].to_string(),
                predicate: Predicate::Absent,
            });
        }
        if let Some(caps) = cmp_re.captures(s) {
            let parameter = caps[1].to_string();
            let literal = parse_literal(&caps[3]);
            let numeric = || {
                literal.as_f64().ok_or_else(|| {
                    AppError::General(format!("'{}' compares '{}' with a non-number", s, parameter))
                })
            };
            let predicate = match &caps[2] {
                "==" => Predicate::Equals(literal.clone()),
                "!=" => Predicate::NotEquals(literal.clone()),
                ">" => Predicate::Greater(numeric()?),
                ">=" => Predicate::GreaterOrEqual(numeric()?),
                "<" => Predicate::Less(numeric()?),
                _ => Predicate::LessOrEqual(numeric()?),
            };
            return Ok(Clause {
                parameter,
                predicate,
            });
        }
        if name_re.is_match(s) {
            return Ok(Clause {
                parameter: s.to_string(),
                predicate: Predicate::Present,
            });
        }
        Err(AppError::General(format!("cannot parse clause '{}'", s)))
    }
}

fn parse_literal(text: &str) -> JsonValue {
    let text = text.trim();
    if let Some(inner) = text.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
        return JsonValue::String(inner.to_string());
    }
    serde_json::from_str(text).unwrap_or_else(|_| JsonValue::String(text.to_string()))
}

/// `IF <condition> THEN <statement>;`
#[derive(Debug, Clone, PartialEq)]
pub struct RequiresExpression {
    /// Clauses that must all hold for the statement to apply.
    pub condition: Vec<Clause>,
    /// Clauses that must all hold whenever the condition does.
    pub statement: Vec<Clause>,
}

impl RequiresExpression {
    /// Every parameter mentioned, in order of first appearance.
    pub fn parameters(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for clause in self.condition.iter().chain(&self.statement) {
            if !out.contains(&clause.parameter) {
                out.push(clause.parameter.clone());
            }
        }
        out
    }

    /// True when every condition clause holds.
    pub fn condition_holds(&self, op: &Operation) -> bool {
        self.condition.iter().all(|c| c.holds(op))
    }

    /// True when every statement clause holds.
    pub fn statement_holds(&self, op: &Operation) -> bool {
        self.statement.iter().all(|c| c.holds(op))
    }

    /// True unless the condition holds and the statement does not.
    pub fn is_satisfied(&self, op: &Operation) -> bool {
        !self.condition_holds(op) || self.statement_holds(op)
    }
}

impl fmt::Display for RequiresExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |clauses: &[Clause]| {
            clauses
                .iter()
                .map(Clause::to_string)
                .collect::<Vec<_>>()
                .join(" AND ")
        };
        write!(f, "IF {} THEN {};", join(&self.condition), join(&self.statement))
    }
}

impl FromStr for RequiresExpression {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        static IF_RE: OnceLock<Regex> = OnceLock::new();
        static AND_RE: OnceLock<Regex> = OnceLock::new();
        let if_re = IF_RE.get_or_init(|| {
            Regex::new(r"(?is)^\s*IF\s+(.+?)\s+THEN\s+(.+?)\s*;?\s*$").expect("Invalid regex")
        });
        let and_re = AND_RE.get_or_init(|| Regex::new(r"(?i)\s+AND\s+").expect("Invalid regex"));

        let caps = if_re
            .captures(s)
            .ok_or_else(|| AppError::General(format!("'{}' is not an IF ... THEN ... expression", s)))?;
        let clauses = |text: &str| -> AppResult<Vec<Clause>> {
            and_re.split(text).map(str::parse).collect()
        };
        Ok(RequiresExpression {
            condition: clauses(&caps[1])?,
            statement: clauses(&caps[2])?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ParameterFactory, ParameterLocation, RawMap};
    use pretty_assertions::assert_eq;

    fn query(op: &mut Operation, name: &str, schema: JsonValue) {
        let raw: RawMap = json!({"name": name, "in": "query", "schema": schema})
            .as_object()
            .cloned()
            .unwrap();
        let id = ParameterFactory::build(op, None, &raw, None, ParameterLocation::Query).unwrap();
        op.attach_parameter(id).unwrap();
    }

    #[test]
    fn test_parse_and_display() {
        let expr: RequiresExpression = "IF type == 'card' AND NOT coupon THEN card_number; "
            .parse()
            .unwrap();
        assert_eq!(expr.condition.len(), 2);
        assert_eq!(expr.condition[0].predicate, Predicate::Equals(json!("card")));
        assert_eq!(expr.condition[1].predicate, Predicate::Absent);
        assert_eq!(expr.statement[0].predicate, Predicate::Present);
        assert_eq!(
            expr.to_string(),
            r#"IF type == "card" AND NOT coupon THEN card_number;"#
        );
        assert_eq!(expr.parameters(), vec!["type", "coupon", "card_number"]);
    }

    #[test]
    fn test_comparisons_require_numbers() {
        let clause: Clause = "limit >= 10".parse().unwrap();
        assert_eq!(clause.predicate, Predicate::GreaterOrEqual(10.0));
        assert!("limit > ten".parse::<Clause>().is_err());
        assert!("IF THEN".parse::<RequiresExpression>().is_err());
    }

    #[test]
    fn test_enforce_and_evaluate() {
        let mut op = Operation::new("list", "GET", "/items");
        query(&mut op, "sort", json!({"type": "string"}));
        query(&mut op, "limit", json!({"type": "integer"}));
        let mut ctx = Context::default();

        let expr: RequiresExpression = "IF sort THEN limit > 5;".parse().unwrap();
        assert!(expr.is_satisfied(&op));

        expr.condition[0].enforce(&mut op, &mut ctx).unwrap();
        assert!(expr.condition_holds(&op));
        expr.statement[0].negate().enforce(&mut op, &mut ctx).unwrap();
        assert!(!expr.is_satisfied(&op));
        expr.statement[0].enforce(&mut op, &mut ctx).unwrap();
        assert!(expr.is_satisfied(&op));
        let limit = targets(&op, "limit")[0];
        assert_eq!(op.to_json(limit), Some(json!(6)));
    }
}
