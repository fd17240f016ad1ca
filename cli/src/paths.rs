#![deny(missing_docs)]

//! # Paths Command
//!
//! Lists the structural and REST path of every node of an operation.

use crate::error::{CliError, CliResult};
use crate::render::load_template;
use std::fmt::Write as _;
use std::path::PathBuf;

/// Arguments for the paths command.
#[derive(clap::Args, Debug, Clone)]
pub struct PathsArgs {
    /// Operation descriptor (YAML or JSON).
    pub operation: PathBuf,

    /// Only list leaves.
    #[clap(long)]
    pub leaves: bool,
}

/// Executes the paths command and returns the printed text.
pub fn execute(args: &PathsArgs) -> CliResult<String> {
    let template = load_template(&args.operation)?;
    let mut out = String::new();
    for id in template.all_nodes() {
        let Some(node) = template.node(id) else { continue };
        if args.leaves && !node.is_leaf() {
            continue;
        }
        let structural = template.structural_path(id)?;
        let rest = template.rest_path(id)?;
        writeln!(out, "{}\t{}\t{}", rest, structural, node.schema_type())
            .map_err(|e| CliError::General(e.to_string()))?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_lists_request_and_response_paths() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("create.yaml");
        fs::write(
            &path,
            r#"
operationId: createPet
method: POST
endpoint: /pets
parameters:
  - name: dryRun
    in: query
    schema:
      type: boolean
requestBody:
  contentType: application/json
  schema:
    type: object
    properties:
      tags:
        type: array
        items:
          type: string
responses:
  "201":
    type: object
    properties:
      id:
        type: integer
"#,
        )
        .unwrap();

        let all = execute(&PathsArgs {
            operation: path.clone(),
            leaves: false,
        })
        .unwrap();
        let lines: Vec<&str> = all.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines.contains(&"$[\"request\"][\"query\"][\"dryRun\"]\t$[\"dryRun\"]\tboolean"));
        assert!(lines.contains(&"$[\"request\"][\"body\"][\"tags\"][-1]\t$[\"tags\"][-1]\tstring"));

        let leaves = execute(&PathsArgs {
            operation: path,
            leaves: true,
        })
        .unwrap();
        assert_eq!(
            leaves.lines().map(|l| l.split('\t').next().unwrap()).collect::<Vec<_>>(),
            vec![
                "$[\"request\"][\"query\"][\"dryRun\"]",
                "$[\"request\"][\"body\"][\"tags\"][-1]",
                "$[\"response\"][\"201\"][\"body\"][\"id\"]",
            ]
        );
    }
}
