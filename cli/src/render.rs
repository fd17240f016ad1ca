#![deny(missing_docs)]

//! # Render Command
//!
//! Fills an operation's parameters and prints each root parameter the way
//! it goes on the wire, using its declared style and explode modifier.

use crate::error::{CliError, CliResult};
use apiprobe_core::{render_declared, Context, EngineConfig, Operation, Template};
use serde_json::Value as JsonValue;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Arguments for the render command.
#[derive(clap::Args, Debug, Clone)]
pub struct RenderArgs {
    /// Operation descriptor (YAML or JSON).
    pub operation: PathBuf,

    /// JSON object of parameter values keyed by parameter name.
    /// Parameters without a value are generated.
    #[clap(long)]
    pub values: Option<String>,
}

/// Reads an operation descriptor into a template.
pub fn load_template(path: &Path) -> CliResult<Template> {
    if !path.exists() {
        return Err(CliError::Argument(format!(
            "operation file not found: {:?}",
            path
        )));
    }
    let source = std::fs::read_to_string(path)?;
    Ok(Template::from_yaml_str(&source)?)
}

/// Executes the render command and returns the printed text.
pub fn execute(args: &RenderArgs, config: EngineConfig) -> CliResult<String> {
    let template = load_template(&args.operation)?;
    let values = match &args.values {
        Some(raw) => match serde_json::from_str::<JsonValue>(raw)? {
            JsonValue::Object(map) => map,
            other => {
                return Err(CliError::Argument(format!(
                    "--values must be a JSON object, got {}",
                    other
                )))
            }
        },
        None => Default::default(),
    };

    let mut draft = template.to_draft();
    let mut ctx = Context::new(config);
    for (name, value) in &values {
        let roots = matching_roots(&draft, name);
        if roots.is_empty() {
            tracing::warn!(parameter = %name, "no such parameter, ignoring its value");
        }
        for id in roots {
            draft.set_value_tree(id, value)?;
        }
    }
    ctx.populate_request(&mut draft)?;

    let mut out = String::new();
    writeln!(
        out,
        "{} {} ({})",
        draft.method(),
        draft.endpoint(),
        draft.operation_id()
    )
    .map_err(|e| CliError::General(e.to_string()))?;
    for id in draft.parameters().to_vec() {
        let Some(node) = draft.node(id) else { continue };
        writeln!(
            out,
            "{:<8} {}: {}",
            node.location().to_string(),
            node.name(),
            render_declared(&draft, id)
        )
        .map_err(|e| CliError::General(e.to_string()))?;
    }
    if let Some(body) = draft.request_body() {
        let content_type = draft.request_content_type().unwrap_or("application/json");
        let text = if draft.is_form_encoded() {
            render_declared(&draft, body)
        } else {
            draft
                .to_json(body)
                .map(|value| value.to_string())
                .unwrap_or_default()
        };
        writeln!(out, "body     {}: {}", content_type, text)
            .map_err(|e| CliError::General(e.to_string()))?;
    }
    Ok(out)
}

fn matching_roots(op: &Operation, name: &str) -> Vec<apiprobe_core::NodeId> {
    op.parameters()
        .iter()
        .copied()
        .filter(|id| op.node(*id).map(|n| n.name().raw() == name).unwrap_or(false))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    const OPERATION: &str = r#"
operationId: listPets
method: GET
endpoint: /pets/{kind}
parameters:
  - name: kind
    in: path
    schema:
      type: string
  - name: ids
    in: query
    schema:
      type: array
      items:
        type: integer
  - name: limit
    in: query
    schema:
      type: integer
      enum: [25]
"#;

    fn write_operation(dir: &Path) -> PathBuf {
        let path = dir.join("list_pets.yaml");
        fs::write(&path, OPERATION).unwrap();
        path
    }

    #[test]
    fn test_render_with_values() {
        let dir = tempdir().unwrap();
        let args = RenderArgs {
            operation: write_operation(dir.path()),
            values: Some(r#"{"kind": "cat", "ids": [1, 2]}"#.to_string()),
        };
        let out = execute(&args, EngineConfig::default()).unwrap();
        assert_eq!(
            out,
            "GET /pets/{kind} (listPets)\n\
             path     kind: cat\n\
             query    ids: ids=1&ids=2\n\
             query    limit: limit=25\n"
        );
    }

    #[test]
    fn test_render_rejects_non_object_values() {
        let dir = tempdir().unwrap();
        let args = RenderArgs {
            operation: write_operation(dir.path()),
            values: Some("[1]".to_string()),
        };
        assert!(matches!(
            execute(&args, EngineConfig::default()),
            Err(CliError::Argument(_))
        ));
    }

    #[test]
    fn test_missing_operation_file() {
        let args = RenderArgs {
            operation: PathBuf::from("/no/such/operation.yaml"),
            values: None,
        };
        assert!(execute(&args, EngineConfig::default()).is_err());
    }
}
