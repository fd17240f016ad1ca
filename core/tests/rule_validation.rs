use apiprobe_core::params::{Operation, Template};
use apiprobe_core::rules::validation::classify_set_relationship;
use apiprobe_core::rules::{RequiresExpression, RuleValidator, ValidationOutcome};
use apiprobe_core::{
    AppResult, Context, DomainExplorer, ExecutedSequence, ExecutedStep, Rule, RuleOrigin,
    RulePayload, RuleType, StatusCodeOracle, TestSequence,
};
use pretty_assertions::assert_eq;
use serde_json::json;

const DESCRIPTOR: &str = r#"
operationId: listOrders
method: GET
endpoint: /orders
parameters:
  - name: from
    in: query
    schema:
      type: string
  - name: to
    in: query
    schema:
      type: string
  - name: pageSize
    in: query
    schema:
      type: integer
      maximum: 10
"#;

fn sequence() -> TestSequence {
    let mut op = Template::from_yaml_str(DESCRIPTOR).unwrap().to_draft();
    for (name, value) in [("from", json!("2024-01-01")), ("to", json!("2024-02-01")), ("pageSize", json!(5))] {
        let id = op.find_by_name(name)[0];
        op.set_value(id, value).unwrap();
    }
    TestSequence::single(op)
}

fn present(op: &Operation, name: &str) -> bool {
    op.find_by_name(name)
        .first()
        .map(|id| !op.is_empty(*id))
        .unwrap_or(false)
}

fn page_size(op: &Operation) -> i64 {
    op.find_by_name("pageSize")
        .first()
        .and_then(|id| op.to_json(*id))
        .and_then(|value| value.as_i64())
        .unwrap_or(0)
}

fn status(passes: bool) -> AppResult<ExecutedSequence> {
    let code = if passes { 200 } else { 422 };
    Ok(ExecutedSequence::new(vec![ExecutedStep::with_status(code)]))
}

fn validate(
    rule: &Rule,
    accepts: impl Fn(&Operation) -> bool,
) -> ValidationOutcome {
    let mut runner = |seq: &TestSequence| status(accepts(seq.first_operation().unwrap()));
    let oracle = StatusCodeOracle;
    let mut validator = RuleValidator::new(&mut runner, &oracle);
    validator
        .validate(rule, &sequence(), &mut Context::default())
        .unwrap()
}

fn pair(payload: RulePayload) -> Rule {
    Rule::new(vec!["from".into(), "to".into()], payload, RuleOrigin::Extraction)
}

#[test]
fn test_explorer_finds_hidden_maximum() {
    let explorer = DomainExplorer::default();
    assert_eq!(explorer.find_maximum(0, |value| value <= 42), Some(42));
    assert_eq!(explorer.find_minimum(0, |value| value >= -7), Some(-7));
    assert_eq!(explorer.find_maximum(50, |value| value <= 42), None);
}

#[test]
fn test_presence_patterns() {
    let types = |rules: Option<Vec<Rule>>| {
        rules.map(|rules| rules.iter().map(Rule::rule_type).collect::<Vec<_>>())
    };
    assert_eq!(
        types(classify_set_relationship("from", "to", [true, true, true, false])),
        Some(vec![RuleType::Or])
    );
    assert_eq!(
        types(classify_set_relationship("from", "to", [false, true, true, false])),
        Some(vec![RuleType::OnlyOne])
    );
    assert_eq!(
        types(classify_set_relationship("from", "to", [true, false, false, true])),
        Some(vec![RuleType::AllOrNone])
    );
    assert_eq!(classify_set_relationship("from", "to", [true, true, true, true]), None);
}

#[test]
fn test_or_is_confirmed() {
    let outcome = validate(&pair(RulePayload::Or), |op| present(op, "from") || present(op, "to"));
    assert_eq!(outcome, ValidationOutcome::Confirmed);
}

#[test]
fn test_or_is_reclassified_as_all_or_none() {
    let outcome = validate(&pair(RulePayload::Or), |op| present(op, "from") == present(op, "to"));
    assert_eq!(
        outcome,
        ValidationOutcome::Reclassified(vec![pair(RulePayload::AllOrNone).with_origin(RuleOrigin::Validation)])
    );
}

#[test]
fn test_unconstrained_pair_is_discarded() {
    let outcome = validate(&pair(RulePayload::OnlyOne), |_| true);
    assert_eq!(outcome, ValidationOutcome::Discarded);
}

#[test]
fn test_required_is_confirmed() {
    let rule = Rule::single("from", RulePayload::Required, RuleOrigin::Specification);
    assert_eq!(validate(&rule, |op| present(op, "from")), ValidationOutcome::Confirmed);
    assert_eq!(validate(&rule, |_| true), ValidationOutcome::Discarded);
}

#[test]
fn test_maximum_is_explored() {
    let rule = Rule::single("pageSize", RulePayload::Maximum(10.0), RuleOrigin::Specification);
    assert_eq!(validate(&rule, |op| page_size(op) <= 10), ValidationOutcome::Confirmed);
    assert_eq!(
        validate(&rule, |op| page_size(op) <= 100),
        ValidationOutcome::Reclassified(vec![Rule::single(
            "pageSize",
            RulePayload::Maximum(100.0),
            RuleOrigin::Validation
        )])
    );
}

#[test]
fn test_unstable_api_is_inconclusive() {
    let rule = Rule::single("from", RulePayload::Required, RuleOrigin::Specification);
    assert_eq!(validate(&rule, |_| false), ValidationOutcome::Inconclusive);
}

fn requires(text: &str) -> RulePayload {
    RulePayload::Requires(text.parse::<RequiresExpression>().unwrap())
}

#[test]
fn test_requires_with_mistyped_literal_is_inconclusive() {
    for text in ["IF pageSize == abc THEN from;", "IF from THEN pageSize == abc;"] {
        let rule = Rule::single("pageSize", requires(text), RuleOrigin::Extraction);
        assert_eq!(validate(&rule, |_| true), ValidationOutcome::Inconclusive, "{}", text);
    }
}

#[test]
fn test_requires_on_unknown_parameter_is_inconclusive() {
    let expression: RequiresExpression = "IF ghost THEN from;".parse().unwrap();
    let declared = Rule::new(
        expression.parameters(),
        RulePayload::Requires(expression.clone()),
        RuleOrigin::Extraction,
    );
    assert_eq!(validate(&declared, |_| true), ValidationOutcome::Inconclusive);

    let misattributed = Rule::single("from", RulePayload::Requires(expression), RuleOrigin::Extraction);
    assert_eq!(validate(&misattributed, |_| true), ValidationOutcome::Inconclusive);
}

#[test]
fn test_default_and_example_with_bad_input() {
    let mistyped = Rule::single("pageSize", RulePayload::Default(json!("abc")), RuleOrigin::Extraction);
    assert_eq!(validate(&mistyped, |_| true), ValidationOutcome::Discarded);

    let missing = Rule::single("ghost", RulePayload::Example(json!(3)), RuleOrigin::Extraction);
    assert_eq!(validate(&missing, |_| true), ValidationOutcome::Inconclusive);

    let fitting = Rule::single("pageSize", RulePayload::Example(json!("7")), RuleOrigin::Extraction);
    assert_eq!(validate(&fitting, |op| page_size(op) == 7 || page_size(op) == 5), ValidationOutcome::Confirmed);
}

#[test]
fn test_unrepresentable_bounds_are_inconclusive() {
    for payload in [
        RulePayload::Maximum(f64::INFINITY),
        RulePayload::Maximum(1e30),
        RulePayload::Minimum(-1e30),
        RulePayload::Minimum(f64::NAN),
    ] {
        let rule = Rule::single("pageSize", payload, RuleOrigin::Extraction);
        assert_eq!(validate(&rule, |_| true), ValidationOutcome::Inconclusive, "{}", rule);
    }
}
