#![deny(missing_docs)]

//! # Rules Command
//!
//! Prints the rules an operation declares, plus those the rule-extraction
//! service reads from its parameter descriptions when a service is set.

use crate::error::{CliError, CliResult};
use crate::render::load_template;
use apiprobe_core::rules::{apply_combination, extract_rules, RuleExtractor, RuleFactory};
use apiprobe_core::{render_declared, Context, EngineConfig};
use std::fmt::Write as _;
use std::path::PathBuf;

/// Arguments for the rules command.
#[derive(clap::Args, Debug, Clone)]
pub struct RulesArgs {
    /// Operation descriptor (YAML or JSON).
    pub operation: PathBuf,

    /// URL of the rule-extraction service (overrides the configuration).
    #[clap(long, env = "APIPROBE_EXTRACTION_URL")]
    pub extraction_url: Option<String>,

    /// Apply the compatible rules to a fresh draft and render it.
    #[clap(long)]
    pub apply: bool,
}

/// Executes the rules command with the extractor built from the arguments.
pub fn execute(args: &RulesArgs, config: EngineConfig) -> CliResult<String> {
    let url = args
        .extraction_url
        .clone()
        .or_else(|| config.rule_extraction_url.clone());
    match url {
        Some(url) => {
            let extractor = http_extractor(&url)?;
            execute_with(args, config, Some(extractor.as_ref()))
        }
        None => execute_with(args, config, None),
    }
}

#[cfg(feature = "client")]
fn http_extractor(url: &str) -> CliResult<Box<dyn RuleExtractor>> {
    Ok(Box::new(crate::extractor::HttpRuleExtractor::new(
        url,
        std::time::Duration::from_secs(30),
    )))
}

#[cfg(not(feature = "client"))]
fn http_extractor(url: &str) -> CliResult<Box<dyn RuleExtractor>> {
    Err(CliError::Argument(format!(
        "cannot reach {}: built without the `client` feature",
        url
    )))
}

/// Executes the rules command with an explicit extractor.
pub fn execute_with(
    args: &RulesArgs,
    config: EngineConfig,
    extractor: Option<&dyn RuleExtractor>,
) -> CliResult<String> {
    let template = load_template(&args.operation)?;
    let mut rules = RuleFactory::from_specification(&template);
    if let Some(extractor) = extractor {
        for rule in extract_rules(extractor, &template) {
            let known = rules
                .iter()
                .any(|r| r.payload() == rule.payload() && r.parameters() == rule.parameters());
            if !known {
                rules.push(rule);
            }
        }
    }

    let mut out = String::new();
    let mut line = |text: String| {
        writeln!(out, "{}", text).map_err(|e| CliError::General(e.to_string()))
    };
    for rule in &rules {
        line(format!("{:?}\t{}", rule.origin(), rule))?;
    }

    if args.apply {
        let mut draft = template.to_draft();
        let mut ctx = Context::new(config);
        ctx.populate_request(&mut draft)?;
        let applied = apply_combination(&mut draft, &rules, &mut ctx)?;
        line(format!("applied {} of {} rules", applied.len(), rules.len()))?;
        for id in draft.parameters().to_vec() {
            if let Some(node) = draft.node(id) {
                line(format!("{}: {}", node.name(), render_declared(&draft, id)))?;
            }
        }
        for rule in rules.iter().filter(|r| !applied.contains(r)) {
            tracing::debug!(rule = %rule, "rule skipped as incompatible");
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiprobe_core::rules::{ExtractionRequest, ExtractionResponse};
    use apiprobe_core::AppResult;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    const OPERATION: &str = r#"
operationId: listPets
method: GET
endpoint: /pets
parameters:
  - name: limit
    in: query
    required: true
    description: Between 1 and 50 pets. Use either limit or cursor.
    schema:
      type: integer
      maximum: 50
  - name: cursor
    in: query
    schema:
      type: string
"#;

    fn args(dir: &tempfile::TempDir, apply: bool) -> RulesArgs {
        let path = dir.path().join("list_pets.yaml");
        fs::write(&path, OPERATION).unwrap();
        RulesArgs {
            operation: path,
            extraction_url: None,
            apply,
        }
    }

    #[test]
    fn test_specification_rules() {
        let dir = tempdir().unwrap();
        let out = execute(&args(&dir, false), EngineConfig::default()).unwrap();
        assert_eq!(
            out.lines().collect::<Vec<_>>(),
            vec![
                "Specification\tRequired(limit)",
                "Specification\tType(limit, integer)",
                "Specification\tMaximum(limit, 50)",
                "Specification\tType(cursor, string)",
            ]
        );
    }

    #[test]
    fn test_extracted_rules_are_appended() {
        let dir = tempdir().unwrap();
        let extractor = |request: &ExtractionRequest| -> AppResult<ExtractionResponse> {
            let mut response = ExtractionResponse::new();
            let keywords = response.entry(request.param_name.clone()).or_default();
            keywords.insert("minimum".to_string(), vec![json!(1)]);
            keywords.insert("maximum".to_string(), vec![json!(50)]);
            keywords.insert("IPD".to_string(), vec![json!("OnlyOne(limit, cursor)")]);
            Ok(response)
        };
        let out = execute_with(&args(&dir, false), EngineConfig::default(), Some(&extractor)).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines.contains(&"Extraction\tMinimum(limit, 1)"));
        assert!(lines.contains(&"Extraction\tOnlyOne(limit, cursor)"));
        assert_eq!(lines.iter().filter(|l| l.ends_with("Maximum(limit, 50)")).count(), 1);
    }

    #[test]
    fn test_apply_renders_constrained_draft() {
        let dir = tempdir().unwrap();
        let out = execute(&args(&dir, true), EngineConfig::default()).unwrap();
        assert!(out.contains("applied 4 of 4 rules"));
        let limit_line = out.lines().find(|l| l.starts_with("limit: ")).unwrap();
        let value: i64 = limit_line.trim_start_matches("limit: limit=").parse().unwrap();
        assert!(value <= 50);
    }
}
