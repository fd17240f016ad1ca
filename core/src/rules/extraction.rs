#![deny(missing_docs)]

//! # Rule Extraction
//!
//! Client side of the optional rule-extraction service, which reads free-text
//! parameter descriptions and answers with keyword/value pairs. The transport
//! lives behind [`RuleExtractor`]; the CLI ships an HTTP implementation.

use crate::error::AppResult;
use crate::params::{NodeKind, Operation};
use crate::rules::factory::RuleFactory;
use crate::rules::Rule;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Body sent to the extraction service for one parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRequest {
    /// Every parameter name of the operation.
    pub param_names: Vec<String>,
    /// The described parameter.
    pub param_name: String,
    /// Its free-text description.
    pub description: String,
}

/// `{ param_name: { keyword: [values] } }`
pub type ExtractionResponse = IndexMap<String, IndexMap<String, Vec<JsonValue>>>;

/// Sends extraction requests.
pub trait RuleExtractor {
    /// Queries the service for one parameter.
    fn extract(&self, request: &ExtractionRequest) -> AppResult<ExtractionResponse>;
}

impl<F> RuleExtractor for F
where
    F: Fn(&ExtractionRequest) -> AppResult<ExtractionResponse>,
{
    fn extract(&self, request: &ExtractionRequest) -> AppResult<ExtractionResponse> {
        self(request)
    }
}

/// One request per described root parameter or object property.
pub fn extraction_requests(op: &Operation) -> Vec<ExtractionRequest> {
    let named: Vec<_> = op
        .all_request_nodes()
        .into_iter()
        .filter_map(|id| {
            let node = op.node(id)?;
            let parent_is_object = match node.parent().and_then(|p| op.node(p)) {
                Some(parent) => matches!(parent.kind(), NodeKind::Object(_)),
                None => true,
            };
            (parent_is_object && !node.name().is_empty()).then_some(node)
        })
        .collect();

    let mut param_names: Vec<String> = Vec::new();
    for node in &named {
        let name = node.name().raw().to_string();
        if !param_names.contains(&name) {
            param_names.push(name);
        }
    }

    named
        .iter()
        .filter_map(|node| {
            let description = node.description()?.trim();
            (!description.is_empty()).then(|| ExtractionRequest {
                param_names: param_names.clone(),
                param_name: node.name().raw().to_string(),
                description: description.to_string(),
            })
        })
        .collect()
}

/// Rules the extraction service finds in the operation's descriptions.
///
/// When the service fails the result is empty: extraction is optional and
/// its absence only means fewer rules.
pub fn extract_rules(extractor: &dyn RuleExtractor, op: &Operation) -> Vec<Rule> {
    let mut rules = Vec::new();
    for request in extraction_requests(op) {
        match extractor.extract(&request) {
            Ok(response) => {
                for rule in RuleFactory::from_extraction_response(&response) {
                    if !rules.contains(&rule) {
                        rules.push(rule);
                    }
                }
            }
            Err(err) => {
                tracing::warn!(
                    operation = op.operation_id(),
                    parameter = %request.param_name,
                    error = %err,
                    "rule extraction unavailable, continuing without extracted rules"
                );
                return Vec::new();
            }
        }
    }
    tracing::info!(operation = op.operation_id(), count = rules.len(), "extracted rules");
    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::params::{ParameterFactory, ParameterLocation, RawMap};
    use serde_json::json;

    fn operation() -> Operation {
        let mut op = Operation::new("listPets", "GET", "/pets");
        for raw in [
            json!({"name": "limit", "in": "query", "description": "At most 50.", "schema": {"type": "integer"}}),
            json!({"name": "offset", "in": "query", "schema": {"type": "integer"}}),
        ] {
            let raw: RawMap = raw.as_object().cloned().unwrap();
            let id = ParameterFactory::build(&mut op, None, &raw, None, ParameterLocation::Query)
                .unwrap();
            op.attach_parameter(id).unwrap();
        }
        op
    }

    #[test]
    fn test_requests_cover_described_parameters() {
        let requests = extraction_requests(&operation());
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].param_name, "limit");
        assert_eq!(requests[0].param_names, vec!["limit", "offset"]);
        let wire = serde_json::to_value(&requests[0]).unwrap();
        assert_eq!(wire["description"], json!("At most 50."));
    }

    #[test]
    fn test_extracted_rules() {
        let extractor = |request: &ExtractionRequest| -> AppResult<ExtractionResponse> {
            let mut keywords = IndexMap::new();
            keywords.insert("maximum".to_string(), vec![json!(50)]);
            let mut response = IndexMap::new();
            response.insert(request.param_name.clone(), keywords);
            Ok(response)
        };
        let rules = extract_rules(&extractor, &operation());
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].to_string(), "Maximum(limit, 50)");
    }

    #[test]
    fn test_offline_service_yields_no_rules() {
        let extractor = |_: &ExtractionRequest| -> AppResult<ExtractionResponse> {
            Err(AppError::General("connection refused".to_string()))
        };
        assert!(extract_rules(&extractor, &operation()).is_empty());
    }
}
