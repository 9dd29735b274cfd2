//! Remote summary lookup tool
//!
//! Issues one GET against a REST summary endpoint (Wikipedia's page summary
//! API by default) with the topic as the final path segment, and returns the
//! `extract` field of the JSON body.

use crate::config::LookupSection;
use crate::tools::{Outcome, ToolError, ToolInvoker, ToolKind};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use url::Url;

pub const DEFAULT_SUMMARY_ENDPOINT: &str = "https://en.wikipedia.org/api/rest_v1/page/summary";

/// Text returned when the endpoint answers 200 without an `extract` field
pub const NO_SUMMARY_PLACEHOLDER: &str = "No summary found.";

/// Summary lookup tool - builtin implementation
pub struct SummaryLookupTool {
    client: reqwest::Client,
    endpoint: Url,
}

impl SummaryLookupTool {
    /// Create the tool from the `[lookup]` configuration section
    pub fn new(config: &LookupSection) -> Result<Self, ToolError> {
        let endpoint = Self::parse_endpoint(&config.endpoint)?;

        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(timeout));
        }
        let client = builder
            .build()
            .map_err(|e| ToolError::InitializationError(e.to_string()))?;

        Ok(Self { client, endpoint })
    }

    /// Create the tool for an endpoint with default client settings
    pub fn from_endpoint<S: Into<String>>(endpoint: S) -> Result<Self, ToolError> {
        Self::new(&LookupSection {
            endpoint: endpoint.into(),
            ..LookupSection::default()
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Validate the configured endpoint (pure function)
    fn parse_endpoint(endpoint: &str) -> Result<Url, ToolError> {
        let url = Url::parse(endpoint)
            .map_err(|e| ToolError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
        if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
            return Err(ToolError::InvalidEndpoint(format!(
                "{endpoint}: expected an http(s) base URL"
            )));
        }
        Ok(url)
    }

    /// Append the topic as an escaped path segment (pure function)
    fn build_lookup_url(endpoint: &Url, topic: &str) -> Result<Url, String> {
        let mut url = endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| format!("endpoint {endpoint} cannot take a topic segment"))?
            .pop_if_empty()
            .push(topic);
        Ok(url)
    }

    /// Pull the summary out of a response body (pure function)
    fn extract_summary(body: &Value) -> String {
        body.get("extract")
            .and_then(|extract| extract.as_str())
            .unwrap_or(NO_SUMMARY_PLACEHOLDER)
            .to_string()
    }
}

#[async_trait]
impl ToolInvoker for SummaryLookupTool {
    fn kind(&self) -> ToolKind {
        ToolKind::SummaryLookup
    }

    async fn invoke(&self, topic: &str) -> Outcome {
        let url = match Self::build_lookup_url(&self.endpoint, topic) {
            Ok(url) => url,
            Err(e) => return Outcome::Failure(format!("tool error: {e}")),
        };

        tracing::debug!(url = %url, "Requesting summary");

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(topic = %topic, error = %e, "Summary request failed");
                return Outcome::Failure(format!("tool error: {e}"));
            }
        };

        let status = response.status();
        if status != StatusCode::OK {
            tracing::warn!(topic = %topic, status = status.as_u16(), "Summary lookup returned non-OK status");
            return Outcome::Failure(format!("lookup failed with status {}", status.as_u16()));
        }

        match response.json::<Value>().await {
            Ok(body) => Outcome::Success(Self::extract_summary(&body)),
            Err(e) => Outcome::Failure(format!("tool error: {e}")),
        }
    }
}
