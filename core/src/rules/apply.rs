#![deny(missing_docs)]

//! # Rule Application
//!
//! Applying a rule mutates a writable operation so that requests generated
//! from it respect the constraint; [`Rule::is_applied`] checks the result
//! without mutating. Applying to a read-only operation fails with
//! [`AppError::ReadOnly`].

use crate::context::Context;
use crate::error::{AppError, AppResult};
use crate::params::{cast_to_node, NodeId, NodeKind, Operation};
use crate::rules::{is_present, targets, Rule, RulePayload};

impl Rule {
    /// Applies the rule to `op`.
    pub fn apply(&self, op: &mut Operation, ctx: &mut Context) -> AppResult<()> {
        op.ensure_writable("apply a rule")?;
        let ids: Vec<NodeId> = self
            .parameters()
            .iter()
            .flat_map(|p| targets(op, p))
            .collect();

        match self.payload() {
            RulePayload::Remove => {
                for id in ids {
                    op.remove_node(id)?;
                }
            }
            RulePayload::Required => {
                for id in ids {
                    op.set_required(id, true)?;
                    ctx.populate(op, id)?;
                }
            }
            RulePayload::Or => {
                if self.present(op).is_empty() {
                    let chosen = self.pick(ctx, self.parameters().to_vec());
                    self.make_present(op, ctx, &chosen)?;
                }
            }
            RulePayload::OnlyOne => {
                let present = self.present(op);
                let chosen = if present.is_empty() {
                    self.pick(ctx, self.parameters().to_vec())
                } else {
                    self.pick(ctx, present)
                };
                self.keep_only(op, &chosen)?;
                self.make_present(op, ctx, &chosen)?;
            }
            RulePayload::AllOrNone => {
                if !self.present(op).is_empty() {
                    for name in self.parameters() {
                        self.make_present(op, ctx, name)?;
                    }
                }
            }
            RulePayload::ZeroOrOne => {
                let present = self.present(op);
                if present.len() > 1 {
                    let chosen = self.pick(ctx, present);
                    self.keep_only(op, &chosen)?;
                }
            }
            RulePayload::Type(schema_type) => {
                for id in ids {
                    let was_present = !op.is_empty(id);
                    op.change_type(id, *schema_type)?;
                    if was_present {
                        ctx.populate(op, id)?;
                    }
                }
            }
            RulePayload::Format(format) => {
                for id in ids {
                    op.set_format(id, format.clone())?;
                    refresh(op, ctx, id)?;
                }
            }
            RulePayload::Maximum(max) => {
                for id in ids {
                    op.set_maximum(id, Some(*max))?;
                    if number_value(op, id).map(|v| v > *max).unwrap_or(false) {
                        refresh(op, ctx, id)?;
                    }
                }
            }
            RulePayload::Minimum(min) => {
                for id in ids {
                    op.set_minimum(id, Some(*min))?;
                    if number_value(op, id).map(|v| v < *min).unwrap_or(false) {
                        refresh(op, ctx, id)?;
                    }
                }
            }
            RulePayload::ExclusiveMaximum(exclusive) => {
                for id in ids {
                    op.set_exclusive_maximum(id, *exclusive)?;
                }
            }
            RulePayload::ExclusiveMinimum(exclusive) => {
                for id in ids {
                    op.set_exclusive_minimum(id, *exclusive)?;
                }
            }
            RulePayload::Default(value) => {
                for id in ids {
                    match cast_to_node(op, id, value) {
                        Some(cast) => op.set_default_value(id, cast)?,
                        None => tracing::warn!(rule = %self, "default does not fit the parameter type"),
                    }
                }
            }
            RulePayload::CollectionFormat(collection_format) => {
                for id in ids {
                    let (style, explode) = collection_format.style_for(op.try_node(id)?.location());
                    op.set_style(id, style)?;
                    op.set_explode(id, explode)?;
                }
            }
            RulePayload::Requires(expression) => {
                if expression.condition_holds(op) {
                    for clause in &expression.statement {
                        clause.enforce(op, ctx)?;
                    }
                }
            }
            RulePayload::Enum(values) => {
                for id in ids {
                    let mut accepted = Vec::new();
                    for value in values {
                        match cast_to_node(op, id, value) {
                            Some(cast) => {
                                op.add_enum_value(id, cast.clone())?;
                                accepted.push(cast);
                            }
                            None => tracing::warn!(rule = %self, value = %value, "enum value does not fit the parameter type"),
                        }
                    }
                    let current = op.to_json(id);
                    if current.map(|v| !accepted.contains(&v)).unwrap_or(false) {
                        refresh(op, ctx, id)?;
                    }
                }
            }
            RulePayload::Example(value) => {
                for id in ids {
                    match cast_to_node(op, id, value) {
                        Some(cast) => {
                            op.add_example(id, cast)?;
                        }
                        None => tracing::warn!(rule = %self, "example does not fit the parameter type"),
                    }
                }
            }
            RulePayload::ArithmeticRelational(text) => {
                return Err(AppError::General(format!(
                    "arithmetic relational rules are not supported: {}",
                    text
                )))
            }
        }
        tracing::debug!(rule = %self, operation = op.operation_id(), "applied rule");
        Ok(())
    }

    /// True when `op` already satisfies the rule.
    pub fn is_applied(&self, op: &Operation) -> bool {
        let ids: Vec<NodeId> = self
            .parameters()
            .iter()
            .flat_map(|p| targets(op, p))
            .collect();
        let nodes = || ids.iter().filter_map(|id| op.node(*id));
        let present = self.present(op).len();

        match self.payload() {
            RulePayload::Remove => ids.is_empty(),
            RulePayload::Required => {
                !ids.is_empty() && ids.iter().all(|id| !op.is_empty(*id)) && nodes().all(|n| n.is_required())
            }
            RulePayload::Or => present >= 1,
            RulePayload::OnlyOne => present == 1,
            RulePayload::AllOrNone => present == 0 || present == self.parameters().len(),
            RulePayload::ZeroOrOne => present <= 1,
            RulePayload::Type(t) => nodes().all(|n| n.schema_type() == *t),
            RulePayload::Format(f) => nodes().all(|n| n.format() == f),
            RulePayload::Maximum(v) => nodes().all(|n| match n.kind() {
                NodeKind::Number(leaf) => leaf.maximum == Some(*v),
                _ => false,
            }),
            RulePayload::Minimum(v) => nodes().all(|n| match n.kind() {
                NodeKind::Number(leaf) => leaf.minimum == Some(*v),
                _ => false,
            }),
            RulePayload::ExclusiveMaximum(v) => nodes().all(|n| match n.kind() {
                NodeKind::Number(leaf) => leaf.exclusive_maximum == *v,
                _ => false,
            }),
            RulePayload::ExclusiveMinimum(v) => nodes().all(|n| match n.kind() {
                NodeKind::Number(leaf) => leaf.exclusive_minimum == *v,
                _ => false,
            }),
            RulePayload::Default(value) => ids.iter().all(|id| {
                let cast = cast_to_node(op, *id, value);
                cast.is_some() && op.node(*id).and_then(|n| n.default_value()) == cast.as_ref()
            }),
            RulePayload::CollectionFormat(cf) => nodes().all(|n| {
                let (style, explode) = cf.style_for(n.location());
                n.style() == Some(style) && n.explode() == Some(explode)
            }),
            RulePayload::Requires(expression) => expression.is_satisfied(op),
            RulePayload::Enum(values) => ids.iter().all(|id| {
                values
                    .iter()
                    .filter_map(|v| cast_to_node(op, *id, v))
                    .all(|cast| op.node(*id).map(|n| n.enum_values().contains(&cast)).unwrap_or(false))
            }),
            RulePayload::Example(value) => ids.iter().all(|id| match cast_to_node(op, *id, value) {
                Some(cast) => op.node(*id).map(|n| n.examples().contains(&cast)).unwrap_or(false),
                None => false,
            }),
            RulePayload::ArithmeticRelational(_) => false,
        }
    }

    /// Parameter names that currently hold a value.
    fn present(&self, op: &Operation) -> Vec<String> {
        self.parameters()
            .iter()
            .filter(|p| is_present(op, p))
            .cloned()
            .collect()
    }

    fn pick(&self, ctx: &mut Context, names: Vec<String>) -> String {
        ctx.rng().choose(&names).cloned().unwrap_or_default()
    }

    fn make_present(&self, op: &mut Operation, ctx: &mut Context, name: &str) -> AppResult<()> {
        for id in targets(op, name) {
            ctx.populate(op, id)?;
        }
        Ok(())
    }

    fn keep_only(&self, op: &mut Operation, keep: &str) -> AppResult<()> {
        for name in self.parameters().iter().filter(|p| p.as_str() != keep) {
            for id in targets(op, name) {
                op.remove_node(id)?;
            }
        }
        Ok(())
    }
}

fn number_value(op: &Operation, id: NodeId) -> Option<f64> {
    op.node(id)?.value()?.as_f64()
}

/// Replaces a present leaf value with a fresh one.
fn refresh(op: &mut Operation, ctx: &mut Context, id: NodeId) -> AppResult<()> {
    if op.try_node(id)?.value().is_some() {
        op.clear_value(id)?;
        ctx.populate(op, id)?;
    }
    Ok(())
}

/// Applies every compatible rule of `rules` to `op`.
///
/// Rules are considered in [`crate::rules::RuleType`] order; each one is
/// kept when it is applicable alongside those kept before it. Returns the
/// rules that were applied.
pub fn apply_combination(
    op: &mut Operation,
    rules: &[Rule],
    ctx: &mut Context,
) -> AppResult<Vec<Rule>> {
    let mut ordered: Vec<&Rule> = rules.iter().collect();
    ordered.sort_by_key(|rule| rule.rule_type());

    let mut accepted: Vec<Rule> = Vec::new();
    for rule in ordered {
        if rule.is_applicable(op, &accepted) {
            accepted.push(rule.clone());
        } else {
            tracing::debug!(rule = %rule, "skipping inapplicable rule");
        }
    }
    for rule in &accepted {
        rule.apply(op, ctx)?;
    }
    Ok(accepted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{CollectionFormat, ParameterFactory, ParameterLocation, ParameterStyle, ParameterType, RawMap, Template};
    use crate::rules::{RequiresExpression, RuleOrigin, RuleType};
    use serde_json::json;

    fn template() -> Template {
        let mut op = Operation::new("search", "GET", "/search");
        for raw in [
            json!({"name": "q", "in": "query", "schema": {"type": "string"}}),
            json!({"name": "isbn", "in": "query", "schema": {"type": "string"}}),
            json!({"name": "limit", "in": "query", "schema": {"type": "integer", "maximum": 500}}),
            json!({"name": "tags", "in": "query", "schema": {"type": "array", "items": {"type": "string"}}}),
        ] {
            let raw: RawMap = raw.as_object().cloned().unwrap();
            let id = ParameterFactory::build(&mut op, None, &raw, None, ParameterLocation::Query)
                .unwrap();
            op.attach_parameter(id).unwrap();
        }
        Template::new(op)
    }

    fn rule(params: &[&str], payload: RulePayload) -> Rule {
        Rule::new(
            params.iter().map(|p| p.to_string()).collect(),
            payload,
            RuleOrigin::Extraction,
        )
    }

    #[test]
    fn test_templates_reject_rules() {
        let template = template();
        let mut frozen = template.to_draft();
        frozen.freeze();
        let err = rule(&["q"], RulePayload::Remove)
            .apply(&mut frozen, &mut Context::default())
            .unwrap_err();
        assert!(err.is_read_only());
    }

    #[test]
    fn test_remove_and_required() {
        let mut op = template().to_draft();
        let mut ctx = Context::default();
        let remove = rule(&["isbn"], RulePayload::Remove);
        assert!(!remove.is_applied(&op));
        remove.apply(&mut op, &mut ctx).unwrap();
        assert!(remove.is_applied(&op));
        assert!(op.find_by_name("isbn").is_empty());

        let required = rule(&["q"], RulePayload::Required);
        required.apply(&mut op, &mut ctx).unwrap();
        assert!(required.is_applied(&op));
    }

    #[test]
    fn test_only_one_keeps_a_single_parameter() {
        let mut op = template().to_draft();
        let mut ctx = Context::default();
        for name in ["q", "isbn"] {
            rule(&[name], RulePayload::Required).apply(&mut op, &mut ctx).unwrap();
        }
        let only_one = rule(&["q", "isbn"], RulePayload::OnlyOne);
        assert!(!only_one.is_applied(&op));
        only_one.apply(&mut op, &mut ctx).unwrap();
        assert!(only_one.is_applied(&op));
        assert!(rule(&["q", "isbn"], RulePayload::Or).is_applied(&op));
    }

    #[test]
    fn test_bounds_and_metadata() {
        let mut op = template().to_draft();
        let mut ctx = Context::default();
        let rules = [
            rule(&["limit"], RulePayload::Maximum(50.0)),
            rule(&["limit"], RulePayload::Default(json!("20"))),
            rule(&["limit"], RulePayload::Enum(vec![json!(10), json!("x")])),
            rule(&["tags"], RulePayload::CollectionFormat(CollectionFormat::Pipes)),
            rule(&["q"], RulePayload::Type(ParameterType::Integer)),
        ];
        for r in &rules {
            r.apply(&mut op, &mut ctx).unwrap();
            assert!(r.is_applied(&op), "{}", r);
        }
        let limit = targets(&op, "limit")[0];
        assert_eq!(op.node(limit).unwrap().default_value(), Some(&json!(20)));
        assert_eq!(op.node(limit).unwrap().enum_values(), &[json!(10)]);
        let tags = targets(&op, "tags")[0];
        assert_eq!(op.node(tags).unwrap().style(), Some(ParameterStyle::PipeDelimited));
    }

    #[test]
    fn test_requires_enforces_statement() {
        let mut op = template().to_draft();
        let mut ctx = Context::default();
        let expression: RequiresExpression = "IF q THEN limit <= 5;".parse().unwrap();
        let requires = rule(&["q", "limit"], RulePayload::Requires(expression));
        rule(&["q"], RulePayload::Required).apply(&mut op, &mut ctx).unwrap();
        requires.apply(&mut op, &mut ctx).unwrap();
        assert!(requires.is_applied(&op));
        let limit = targets(&op, "limit")[0];
        assert_eq!(op.to_json(limit), Some(json!(5)));
    }

    #[test]
    fn test_combination_follows_rule_order() {
        let mut op = template().to_draft();
        let mut ctx = Context::default();
        let rules = vec![
            rule(&["q"], RulePayload::Example(json!("dune"))),
            rule(&["q"], RulePayload::Required),
            rule(&["q"], RulePayload::Remove),
            rule(&["limit", "q"], RulePayload::ArithmeticRelational("limit > q".into())),
        ];
        let applied = apply_combination(&mut op, &rules, &mut ctx).unwrap();
        let kinds: Vec<RuleType> = applied.iter().map(Rule::rule_type).collect();
        assert_eq!(kinds, vec![RuleType::Remove]);
        assert!(op.find_by_name("q").is_empty());
    }
}
