#![deny(missing_docs)]

//! # HTTP Rule Extractor
//!
//! Posts one JSON request per described parameter to the rule-extraction
//! service and reads back `{ param: { keyword: [values] } }`.

use apiprobe_core::rules::{ExtractionRequest, ExtractionResponse, RuleExtractor};
use apiprobe_core::{AppError, AppResult};
use std::time::Duration;

/// Rule extractor over a blocking HTTP client.
pub struct HttpRuleExtractor {
    url: String,
    agent: ureq::Agent,
}

impl HttpRuleExtractor {
    /// Creates an extractor for the service at `url`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self {
            url: url.into(),
            agent,
        }
    }

    /// The service URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl RuleExtractor for HttpRuleExtractor {
    fn extract(&self, request: &ExtractionRequest) -> AppResult<ExtractionResponse> {
        tracing::debug!(url = %self.url, parameter = %request.param_name, "querying rule extraction");
        let mut response = self
            .agent
            .post(&self.url)
            .send_json(request)
            .map_err(|e| AppError::General(format!("rule extraction request failed: {}", e)))?;
        response
            .body_mut()
            .read_json::<ExtractionResponse>()
            .map_err(|e| AppError::General(format!("unreadable rule extraction response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiprobe_core::rules::extract_rules;
    use apiprobe_core::Template;

    #[test]
    fn test_unreachable_service_degrades_to_no_rules() {
        let template = Template::from_yaml_str(
            r#"
operationId: listPets
method: GET
endpoint: /pets
parameters:
  - name: limit
    in: query
    description: At most 100 pets are returned.
    schema:
      type: integer
"#,
        )
        .unwrap();
        // Port 9 (discard) on localhost refuses connections.
        let extractor = HttpRuleExtractor::new("http://127.0.0.1:9/extract", Duration::from_millis(500));
        assert_eq!(extractor.url(), "http://127.0.0.1:9/extract");
        assert!(extract_rules(&extractor, &template).is_empty());
    }
}
