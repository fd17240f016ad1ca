#![deny(missing_docs)]

//! # Fine Validation
//!
//! Confirms a rule against the live API. Each protocol replays reset copies
//! of a passing test sequence with the first interaction's operation mutated,
//! and compares the oracle's verdicts to what the rule predicts.
//!
//! The unmodified sequence must pass before and after a protocol runs;
//! otherwise the API is not stable enough to learn from and the outcome is
//! [`ValidationOutcome::Inconclusive`].

use crate::context::Context;
use crate::error::{AppError, AppResult};
use crate::params::{cast_to_node, NodeKind, Operation};
use crate::rules::requires::{assign, RequiresExpression};
use crate::rules::{targets, Rule, RuleOrigin, RulePayload, RuleType};
use crate::runner::{Oracle, TestRunner, TestSequence};
use serde_json::{json, Value as JsonValue};

/// Result of validating one rule.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    /// The API behaves as the rule states.
    Confirmed,
    /// The API follows different rules, listed here.
    Reclassified(Vec<Rule>),
    /// The API does not follow the rule.
    Discarded,
    /// No conclusion could be drawn.
    Inconclusive,
}

/// Classifies the outcomes of the four presence combinations of `a` and `b`.
///
/// `pattern` holds the oracle verdicts for, in order: both present, only
/// `a`, only `b`, neither. Returns `None` when the pattern shows no
/// relationship.
pub fn classify_set_relationship(a: &str, b: &str, pattern: [bool; 4]) -> Option<Vec<Rule>> {
    let pair = || vec![a.to_string(), b.to_string()];
    let required = |name: &str| Rule::single(name, RulePayload::Required, RuleOrigin::Validation);
    let rules = match pattern {
        [true, true, true, false] => vec![Rule::new(pair(), RulePayload::Or, RuleOrigin::Validation)],
        [false, true, true, false] => {
            vec![Rule::new(pair(), RulePayload::OnlyOne, RuleOrigin::Validation)]
        }
        [true, false, false, true] => {
            vec![Rule::new(pair(), RulePayload::AllOrNone, RuleOrigin::Validation)]
        }
        [false, true, true, true] => {
            vec![Rule::new(pair(), RulePayload::ZeroOrOne, RuleOrigin::Validation)]
        }
        [true, true, false, false] => vec![required(a)],
        [true, false, true, false] => vec![required(b)],
        [true, false, false, false] => vec![required(a), required(b)],
        _ => return None,
    };
    Some(rules)
}

/// Runs fine-validation protocols against a test runner and an oracle.
pub struct RuleValidator<'a> {
    runner: &'a mut dyn TestRunner,
    oracle: &'a dyn Oracle,
}

impl<'a> RuleValidator<'a> {
    /// Creates a validator.
    pub fn new(runner: &'a mut dyn TestRunner, oracle: &'a dyn Oracle) -> Self {
        Self { runner, oracle }
    }

    /// Validates `rule` against `sequence`, whose first interaction must
    /// contain the rule's parameters.
    pub fn validate(
        &mut self,
        rule: &Rule,
        sequence: &TestSequence,
        ctx: &mut Context,
    ) -> AppResult<ValidationOutcome> {
        if sequence.is_empty() {
            return Ok(ValidationOutcome::Inconclusive);
        }
        if !self.replay(&sequence.reset_clone()?, ctx)? {
            tracing::debug!(rule = %rule, "sequence fails before validation");
            return Ok(ValidationOutcome::Inconclusive);
        }

        let outcome = self.run_protocol(rule, sequence, ctx)?;

        if !self.replay(&sequence.reset_clone()?, ctx)? {
            tracing::debug!(rule = %rule, "sequence fails after validation");
            return Ok(ValidationOutcome::Inconclusive);
        }
        match &outcome {
            ValidationOutcome::Confirmed => tracing::info!(rule = %rule, "rule confirmed"),
            ValidationOutcome::Reclassified(rules) => {
                let rules: Vec<String> = rules.iter().map(Rule::to_string).collect();
                tracing::info!(rule = %rule, into = ?rules, "rule reclassified")
            }
            ValidationOutcome::Discarded => tracing::info!(rule = %rule, "rule discarded"),
            ValidationOutcome::Inconclusive => tracing::debug!(rule = %rule, "validation inconclusive"),
        }
        Ok(outcome)
    }

    fn run_protocol(
        &mut self,
        rule: &Rule,
        sequence: &TestSequence,
        ctx: &mut Context,
    ) -> AppResult<ValidationOutcome> {
        let Some(op) = sequence.first_operation() else {
            return Ok(ValidationOutcome::Inconclusive);
        };
        if rule.parameters().iter().any(|p| targets(op, p).is_empty()) {
            tracing::debug!(rule = %rule, "rule parameters are missing from the operation");
            return Ok(ValidationOutcome::Inconclusive);
        }

        match rule.payload() {
            RulePayload::Remove => {
                let name = first_parameter(rule)?;
                let passes = self.variant(sequence, ctx, |op, _| set_presence(op, None, name))?;
                Ok(passes.map_or(ValidationOutcome::Inconclusive, verdict))
            }
            RulePayload::Required => {
                let name = first_parameter(rule)?;
                let with = self.variant(sequence, ctx, |op, ctx| set_presence(op, Some(ctx), name))?;
                let without = self.variant(sequence, ctx, |op, _| set_presence(op, None, name))?;
                Ok(match (with, without) {
                    (Some(true), Some(false)) => ValidationOutcome::Confirmed,
                    (Some(true), Some(true)) => ValidationOutcome::Discarded,
                    _ => ValidationOutcome::Inconclusive,
                })
            }
            RulePayload::Or
            | RulePayload::OnlyOne
            | RulePayload::AllOrNone
            | RulePayload::ZeroOrOne => self.set_relationship(rule, sequence, ctx),
            RulePayload::Maximum(_) | RulePayload::Minimum(_) => self.bound(rule, sequence, ctx),
            RulePayload::ExclusiveMaximum(flag) | RulePayload::ExclusiveMinimum(flag) => {
                self.exclusive_bound(rule, *flag, sequence, ctx)
            }
            RulePayload::Default(value) | RulePayload::Example(value) => {
                let name = first_parameter(rule)?;
                if !castable(op, name, value) {
                    tracing::debug!(rule = %rule, "value does not fit, dropping rule");
                    return Ok(ValidationOutcome::Discarded);
                }
                let passes = self.variant(sequence, ctx, |op, _| set_all(op, name, value))?;
                Ok(passes.map_or(ValidationOutcome::Inconclusive, verdict))
            }
            RulePayload::Enum(values) => {
                let name = first_parameter(rule)?;
                let candidates: Vec<&JsonValue> =
                    values.iter().filter(|v| castable(op, name, v)).collect();
                if candidates.is_empty() {
                    return Ok(ValidationOutcome::Discarded);
                }
                let mut accepted = Vec::new();
                for value in &candidates {
                    match self.variant(sequence, ctx, |op, _| set_all(op, name, value))? {
                        Some(true) => accepted.push((*value).clone()),
                        Some(false) => {}
                        None => return Ok(ValidationOutcome::Inconclusive),
                    }
                }
                Ok(if accepted.len() == candidates.len() {
                    ValidationOutcome::Confirmed
                } else if accepted.is_empty() {
                    ValidationOutcome::Discarded
                } else {
                    ValidationOutcome::Reclassified(vec![Rule::single(
                        name,
                        RulePayload::Enum(accepted),
                        RuleOrigin::Validation,
                    )])
                })
            }
            RulePayload::Type(schema_type) => {
                let name = first_parameter(rule)?;
                let passes = self.variant(sequence, ctx, |op, ctx| {
                    for id in targets(op, name) {
                        op.change_type(id, *schema_type)?;
                        ctx.populate(op, id)?;
                    }
                    Ok(())
                })?;
                Ok(passes.map_or(ValidationOutcome::Inconclusive, verdict))
            }
            RulePayload::Format(format) => {
                let name = first_parameter(rule)?;
                let passes = self.variant(sequence, ctx, |op, ctx| {
                    for id in targets(op, name) {
                        op.set_format(id, format.clone())?;
                        op.clear_value(id)?;
                        ctx.populate(op, id)?;
                    }
                    Ok(())
                })?;
                Ok(passes.map_or(ValidationOutcome::Inconclusive, verdict))
            }
            RulePayload::CollectionFormat(collection_format) => {
                let name = first_parameter(rule)?;
                let passes = self.variant(sequence, ctx, |op, ctx| {
                    for id in targets(op, name) {
                        let (style, explode) =
                            collection_format.style_for(op.try_node(id)?.location());
                        op.set_style(id, style)?;
                        op.set_explode(id, explode)?;
                        ctx.populate(op, id)?;
                    }
                    Ok(())
                })?;
                Ok(passes.map_or(ValidationOutcome::Inconclusive, verdict))
            }
            RulePayload::Requires(expression) => self.requires(expression, sequence, ctx),
            RulePayload::ArithmeticRelational(_) => Ok(ValidationOutcome::Inconclusive),
        }
    }

    /// Replays the four presence combinations of a two-parameter rule.
    fn set_relationship(
        &mut self,
        rule: &Rule,
        sequence: &TestSequence,
        ctx: &mut Context,
    ) -> AppResult<ValidationOutcome> {
        let [a, b] = rule.parameters() else {
            tracing::debug!(rule = %rule, "only two-parameter relationships can be validated");
            return Ok(ValidationOutcome::Inconclusive);
        };

        let mut pattern = [false; 4];
        let combinations = [(true, true), (true, false), (false, true), (false, false)];
        for (slot, (with_a, with_b)) in pattern.iter_mut().zip(combinations) {
            let passes = self.variant(sequence, ctx, |op, ctx| {
                set_presence(op, with_a.then_some(&mut *ctx), a)?;
                set_presence(op, with_b.then_some(ctx), b)
            })?;
            let Some(passes) = passes else {
                return Ok(ValidationOutcome::Inconclusive);
            };
            *slot = passes;
        }
        tracing::debug!(rule = %rule, ?pattern, "presence combinations replayed");

        Ok(match classify_set_relationship(a, b, pattern) {
            Some(found) => {
                let same = found.len() == 1
                    && found[0].rule_type() == rule.rule_type()
                    && found[0].parameters() == rule.parameters();
                if same {
                    ValidationOutcome::Confirmed
                } else {
                    ValidationOutcome::Reclassified(found)
                }
            }
            None => ValidationOutcome::Discarded,
        })
    }

    /// Tries one past a Maximum/Minimum; explores the real bound when that
    /// value unexpectedly passes, else confirms the bound itself.
    fn bound(
        &mut self,
        rule: &Rule,
        sequence: &TestSequence,
        ctx: &mut Context,
    ) -> AppResult<ValidationOutcome> {
        let name = first_parameter(rule)?;
        if !is_numeric(sequence, name) {
            return Ok(ValidationOutcome::Inconclusive);
        }
        let (bound, is_max) = match rule.payload() {
            RulePayload::Maximum(max) => (integer_bound(max.floor()), true),
            RulePayload::Minimum(min) => (integer_bound(min.ceil()), false),
            _ => return Ok(ValidationOutcome::Inconclusive),
        };
        let Some(bound) = bound else {
            tracing::debug!(rule = %rule, "bound is not a representable integer");
            return Ok(ValidationOutcome::Inconclusive);
        };
        let beyond = if is_max {
            bound.checked_add(1)
        } else {
            bound.checked_sub(1)
        };
        let Some(beyond) = beyond else {
            return Ok(ValidationOutcome::Inconclusive);
        };

        match self.try_number(sequence, ctx, name, beyond)? {
            None => return Ok(ValidationOutcome::Inconclusive),
            Some(false) => {
                let at_bound = self.try_number(sequence, ctx, name, bound)?;
                return Ok(at_bound.map_or(ValidationOutcome::Inconclusive, verdict));
            }
            Some(true) => {}
        }

        tracing::debug!(rule = %rule, beyond, "value beyond the bound accepted, exploring");
        let explorer = ctx.explorer();
        let mut failure: Option<AppError> = None;
        let mut accepts = |value: i64| {
            if failure.is_some() {
                return false;
            }
            match self.try_number(sequence, ctx, name, value) {
                Ok(passes) => passes.unwrap_or(false),
                Err(err) => {
                    failure = Some(err);
                    false
                }
            }
        };
        let found = if is_max {
            explorer.find_maximum(beyond, &mut accepts)
        } else {
            explorer.find_minimum(beyond, &mut accepts)
        };
        if let Some(err) = failure {
            return Err(err);
        }

        Ok(match found {
            Some(real) => {
                let payload = if is_max {
                    RulePayload::Maximum(real as f64)
                } else {
                    RulePayload::Minimum(real as f64)
                };
                ValidationOutcome::Reclassified(vec![Rule::single(name, payload, RuleOrigin::Validation)])
            }
            None => ValidationOutcome::Discarded,
        })
    }

    /// Tries the declared bound itself: an exclusive bound must be rejected.
    fn exclusive_bound(
        &mut self,
        rule: &Rule,
        exclusive: bool,
        sequence: &TestSequence,
        ctx: &mut Context,
    ) -> AppResult<ValidationOutcome> {
        let name = first_parameter(rule)?;
        let is_max = rule.rule_type() == RuleType::ExclusiveMaximum;
        let declared = sequence.first_operation().and_then(|op| {
            targets(op, name).into_iter().find_map(|id| match op.node(id)?.kind() {
                NodeKind::Number(leaf) if is_max => leaf.maximum,
                NodeKind::Number(leaf) => leaf.minimum,
                _ => None,
            })
        });
        let Some(declared) = declared else {
            return Ok(ValidationOutcome::Inconclusive);
        };
        let Some(bound) = integer_bound(if is_max { declared.floor() } else { declared.ceil() }) else {
            return Ok(ValidationOutcome::Inconclusive);
        };

        let Some(accepted) = self.try_number(sequence, ctx, name, bound)? else {
            return Ok(ValidationOutcome::Inconclusive);
        };
        if accepted != exclusive {
            return Ok(ValidationOutcome::Confirmed);
        }
        let payload = if is_max {
            RulePayload::ExclusiveMaximum(!exclusive)
        } else {
            RulePayload::ExclusiveMinimum(!exclusive)
        };
        Ok(ValidationOutcome::Reclassified(vec![Rule::single(
            name,
            payload,
            RuleOrigin::Validation,
        )]))
    }

    /// Replays the expression satisfied, then with its statement violated.
    fn requires(
        &mut self,
        expression: &RequiresExpression,
        sequence: &TestSequence,
        ctx: &mut Context,
    ) -> AppResult<ValidationOutcome> {
        let Some(first) = expression.statement.first() else {
            return Ok(ValidationOutcome::Inconclusive);
        };
        let violation = first.negate();

        let satisfied = self.variant(sequence, ctx, |op, ctx| {
            for clause in expression.condition.iter().chain(&expression.statement) {
                clause.enforce(op, ctx)?;
            }
            Ok(())
        })?;
        let violated = self.variant(sequence, ctx, |op, ctx| {
            for clause in &expression.condition {
                clause.enforce(op, ctx)?;
            }
            violation.enforce(op, ctx)
        })?;

        Ok(match (satisfied, violated) {
            (Some(true), Some(false)) => ValidationOutcome::Confirmed,
            (Some(true), Some(true)) => ValidationOutcome::Discarded,
            _ => ValidationOutcome::Inconclusive,
        })
    }

    fn try_number(
        &mut self,
        sequence: &TestSequence,
        ctx: &mut Context,
        name: &str,
        value: i64,
    ) -> AppResult<Option<bool>> {
        let value = json!(value);
        self.variant(sequence, ctx, |op, _| set_all(op, name, &value))
    }

    /// Replays a reset copy of `sequence` after `mutate` ran on its first operation.
    ///
    /// Returns `None` without replaying when `mutate` fails, e.g. because a
    /// literal does not fit its parameter or a named parameter is missing.
    fn variant(
        &mut self,
        sequence: &TestSequence,
        ctx: &mut Context,
        mutate: impl FnOnce(&mut Operation, &mut Context) -> AppResult<()>,
    ) -> AppResult<Option<bool>> {
        let mut altered = sequence.reset_clone()?;
        let op = altered
            .first_operation_mut()
            .ok_or_else(|| AppError::General("cannot validate an empty sequence".to_string()))?;
        if let Err(err) = mutate(op, ctx) {
            tracing::debug!(operation = %op.operation_id(), error = %err, "variant cannot be built");
            return Ok(None);
        }
        self.replay(&altered, ctx).map(Some)
    }

    fn replay(&mut self, sequence: &TestSequence, ctx: &mut Context) -> AppResult<bool> {
        let executed = self.runner.run(sequence)?;
        executed.observe_into(ctx.catalogue_mut());
        Ok(self.oracle.assess(&executed))
    }
}

fn verdict(passes: bool) -> ValidationOutcome {
    if passes {
        ValidationOutcome::Confirmed
    } else {
        ValidationOutcome::Discarded
    }
}

/// An `f64` bound as an `i64`, or `None` when it is not finite or out of range.
fn integer_bound(value: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is itself out of range.
    if value.is_finite() && value >= i64::MIN as f64 && value < i64::MAX as f64 {
        Some(value as i64)
    } else {
        None
    }
}

fn first_parameter(rule: &Rule) -> AppResult<&str> {
    rule.parameter()
        .ok_or_else(|| AppError::General(format!("rule {} names no parameter", rule)))
}

fn castable(op: &Operation, name: &str, value: &JsonValue) -> bool {
    targets(op, name)
        .into_iter()
        .all(|id| cast_to_node(op, id, value).is_some())
}

fn is_numeric(sequence: &TestSequence, name: &str) -> bool {
    sequence
        .first_operation()
        .map(|op| {
            targets(op, name)
                .iter()
                .all(|id| matches!(op.node(*id).map(|n| n.kind()), Some(NodeKind::Number(_))))
        })
        .unwrap_or(false)
}

/// Populates (with a context) or removes (without) every target of `name`.
fn set_presence(op: &mut Operation, ctx: Option<&mut Context>, name: &str) -> AppResult<()> {
    match ctx {
        Some(ctx) => {
            for id in targets(op, name) {
                ctx.populate(op, id)?;
            }
        }
        None => {
            for id in targets(op, name) {
                op.remove_node(id)?;
            }
        }
    }
    Ok(())
}

fn set_all(op: &mut Operation, name: &str, value: &JsonValue) -> AppResult<()> {
    for id in targets(op, name) {
        assign(op, id, value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ParameterFactory, ParameterLocation, RawMap, Template};
    use crate::runner::{ExecutedSequence, ExecutedStep, StatusCodeOracle};

    fn sequence() -> TestSequence {
        let mut op = Operation::new("search", "GET", "/search");
        for raw in [
            json!({"name": "a", "in": "query", "schema": {"type": "string"}}),
            json!({"name": "b", "in": "query", "schema": {"type": "string"}}),
            json!({"name": "limit", "in": "query", "schema": {"type": "integer", "maximum": 10}}),
        ] {
            let raw: RawMap = raw.as_object().cloned().unwrap();
            let id = ParameterFactory::build(&mut op, None, &raw, None, ParameterLocation::Query)
                .unwrap();
            op.attach_parameter(id).unwrap();
        }
        let mut draft = Template::new(op).to_draft();
        let limit = targets(&draft, "limit")[0];
        draft.set_value(limit, json!(5)).unwrap();
        let a = targets(&draft, "a")[0];
        draft.set_value(a, json!("x")).unwrap();
        TestSequence::single(draft)
    }

    fn status(passes: bool) -> AppResult<ExecutedSequence> {
        Ok(ExecutedSequence::new(vec![ExecutedStep::with_status(if passes { 200 } else { 400 })]))
    }

    fn present(op: &Operation, name: &str) -> bool {
        crate::rules::is_present(op, name)
    }

    fn limit(op: &Operation) -> Option<i64> {
        targets(op, "limit")
            .first()
            .and_then(|id| op.to_json(*id))
            .and_then(|v| v.as_i64())
    }

    #[test]
    fn test_or_pattern_reclassifies_only_one() {
        let mut runner = |seq: &TestSequence| {
            let op = seq.first_operation().unwrap();
            status(present(op, "a") != present(op, "b"))
        };
        let oracle = StatusCodeOracle;
        let mut validator = RuleValidator::new(&mut runner, &oracle);
        let rule = Rule::new(vec!["a".into(), "b".into()], RulePayload::Or, RuleOrigin::Extraction);
        let outcome = validator
            .validate(&rule, &sequence(), &mut Context::default())
            .unwrap();
        match outcome {
            ValidationOutcome::Reclassified(rules) => {
                assert_eq!(rules.len(), 1);
                assert_eq!(rules[0].rule_type(), RuleType::OnlyOne);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_failing_precheck_is_inconclusive() {
        let mut runner = |_: &TestSequence| status(false);
        let oracle = StatusCodeOracle;
        let mut validator = RuleValidator::new(&mut runner, &oracle);
        let rule = Rule::single("a", RulePayload::Required, RuleOrigin::Extraction);
        let outcome = validator
            .validate(&rule, &sequence(), &mut Context::default())
            .unwrap();
        assert_eq!(outcome, ValidationOutcome::Inconclusive);
    }

    #[test]
    fn test_maximum_is_confirmed() {
        let mut runner = |seq: &TestSequence| status(limit(seq.first_operation().unwrap()).unwrap_or(0) <= 10);
        let oracle = StatusCodeOracle;
        let mut validator = RuleValidator::new(&mut runner, &oracle);
        let rule = Rule::single("limit", RulePayload::Maximum(10.0), RuleOrigin::Specification);
        let outcome = validator
            .validate(&rule, &sequence(), &mut Context::default())
            .unwrap();
        assert_eq!(outcome, ValidationOutcome::Confirmed);
    }

    #[test]
    fn test_maximum_is_explored_when_too_strict() {
        let mut attempts = 0;
        let mut runner = |seq: &TestSequence| {
            attempts += 1;
            status(limit(seq.first_operation().unwrap()).unwrap_or(0) <= 42)
        };
        let oracle = StatusCodeOracle;
        let mut validator = RuleValidator::new(&mut runner, &oracle);
        let rule = Rule::single("limit", RulePayload::Maximum(10.0), RuleOrigin::Specification);
        let outcome = validator
            .validate(&rule, &sequence(), &mut Context::default())
            .unwrap();
        assert_eq!(
            outcome,
            ValidationOutcome::Reclassified(vec![Rule::single(
                "limit",
                RulePayload::Maximum(42.0),
                RuleOrigin::Validation
            )])
        );
        drop(validator);
        assert!(attempts <= 2 + 1 + 70 + 1);
    }

    #[test]
    fn test_enum_keeps_accepted_values() {
        let mut runner = |seq: &TestSequence| {
            let op = seq.first_operation().unwrap();
            let a = targets(op, "a").first().and_then(|id| op.to_json(*id));
            status(a != Some(json!("bad")))
        };
        let oracle = StatusCodeOracle;
        let mut validator = RuleValidator::new(&mut runner, &oracle);
        let rule = Rule::single(
            "a",
            RulePayload::Enum(vec![json!("x"), json!("bad"), json!("y")]),
            RuleOrigin::Specification,
        );
        let outcome = validator
            .validate(&rule, &sequence(), &mut Context::default())
            .unwrap();
        assert_eq!(
            outcome,
            ValidationOutcome::Reclassified(vec![Rule::single(
                "a",
                RulePayload::Enum(vec![json!("x"), json!("y")]),
                RuleOrigin::Validation
            )])
        );
    }

    #[test]
    fn test_degenerate_patterns() {
        let rules = classify_set_relationship("a", "b", [true, true, false, false]).unwrap();
        assert_eq!(rules[0].to_string(), "Required(a)");
        let rules = classify_set_relationship("a", "b", [true, false, false, false]).unwrap();
        assert_eq!(rules.len(), 2);
        assert!(classify_set_relationship("a", "b", [true, true, true, true]).is_none());
    }
}
