//! Wire types for the upstream messages API.
//!
//! These are the HTTP request/response structures for the external
//! text-generation service. They are NOT the provider-agnostic types from
//! handover-types.

use serde::{Deserialize, Serialize};

/// Request body for the messages endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct WireRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub temperature: f64,
}

/// A single conversation turn on the wire.
#[derive(Debug, Clone, Serialize)]
pub struct WireMessage {
    pub role: String,
    pub content: String,
}

/// Response body for a non-streaming completion.
#[derive(Debug, Clone, Deserialize)]
pub struct WireResponse {
    pub content: Vec<WireContentBlock>,
    pub model: Option<String>,
}

/// A content block in the response.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum WireContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}
