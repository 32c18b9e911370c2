//! HttpTextProvider -- concrete [`TextProvider`] over the upstream messages API.
//!
//! Performs a single non-streaming request per call. Timeouts, retries, and
//! circuit breaking all live in the responder; this client does one honest
//! attempt and reports failures precisely.
//!
//! The API key is wrapped in [`secrecy::SecretString`] and is never logged
//! or included in `Debug` output.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use handover_core::provider::TextProvider;
use handover_types::provider::{GenerateRequest, GeneratedText, ProviderError};

use super::types::{WireContentBlock, WireMessage, WireRequest, WireResponse};

/// HTTP client for the upstream text-generation service.
///
/// # API Key Security
///
/// The key is stored as a [`SecretString`] and only exposed when building
/// request headers. It never appears in Debug output or tracing logs.
pub struct HttpTextProvider {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl HttpTextProvider {
    /// API version header value expected by the upstream service.
    const API_VERSION: &'static str = "2023-06-01";

    pub fn new(api_key: SecretString, base_url: String, model: String) -> Self {
        // Transport-level ceiling only; the responder applies the real
        // per-attempt timeout.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("failed to create reqwest client");

        Self {
            client,
            api_key,
            base_url,
            model,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Override the base URL (useful for testing or proxies).
    #[allow(dead_code)]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Convert a generic [`GenerateRequest`] into the wire shape. History
    /// turns come first, oldest first, then the current customer message.
    fn to_wire_request(&self, request: &GenerateRequest) -> WireRequest {
        let mut messages: Vec<WireMessage> = request
            .history
            .iter()
            .map(|(role, content)| WireMessage {
                role: role.clone(),
                content: content.clone(),
            })
            .collect();
        messages.push(WireMessage {
            role: "user".to_string(),
            content: request.message.clone(),
        });

        WireRequest {
            model: self.model.clone(),
            max_tokens: request.max_tokens,
            messages,
            system: Some(request.system_prompt.clone()),
            temperature: request.temperature,
        }
    }
}

// HttpTextProvider intentionally does not derive Debug so the key cannot
// leak through formatting.

impl TextProvider for HttpTextProvider {
    fn name(&self) -> &str {
        "http"
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GeneratedText, ProviderError> {
        let body = self.to_wire_request(request);
        let url = self.url("/v1/messages");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", Self::API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Http(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }

        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Http(format!("failed to parse response: {e}")))?;

        let content = wire
            .content
            .iter()
            .filter_map(|block| match block {
                WireContentBlock::Text { text } => Some(text.as_str()),
                WireContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("");

        if content.trim().is_empty() {
            return Err(ProviderError::Empty);
        }

        Ok(GeneratedText {
            content,
            model: wire.model,
        })
    }
}
