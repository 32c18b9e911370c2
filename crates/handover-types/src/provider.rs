//! Upstream text-provider types for Handover.
//!
//! These model the request/response shapes for the external text-generation
//! provider and the reply envelope the reliability wrapper hands back to
//! callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::fmt;
use std::str::FromStr;

use crate::conversation::Language;

/// Where an automated reply came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplySource {
    Cache,
    Ai,
    Fallback,
}

impl fmt::Display for ReplySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplySource::Cache => write!(f, "cache"),
            ReplySource::Ai => write!(f, "ai"),
            ReplySource::Fallback => write!(f, "fallback"),
        }
    }
}

impl FromStr for ReplySource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cache" => Ok(ReplySource::Cache),
            "ai" => Ok(ReplySource::Ai),
            "fallback" => Ok(ReplySource::Fallback),
            other => Err(format!("invalid reply source: '{other}'")),
        }
    }
}

/// A request to the upstream provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// The customer message to respond to.
    pub message: String,
    /// System prompt establishing the persona and shop knowledge.
    pub system_prompt: String,
    /// Recent conversation turns, oldest first, as (role, content) pairs
    /// with role in {"user", "assistant"}.
    pub history: Vec<(String, String)>,
    pub max_tokens: u32,
    pub temperature: f64,
}

/// Text returned by the upstream provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedText {
    pub content: String,
    pub model: Option<String>,
}

/// Errors talking to the upstream provider. All variants are transient from
/// the reliability wrapper's point of view: it retries and then falls back,
/// never surfacing them to the customer.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider call timed out after {0} ms")]
    Timeout(u64),

    #[error("provider transport error: {0}")]
    Http(String),

    #[error("provider returned status {0}")]
    Status(u16),

    #[error("provider returned an empty response")]
    Empty,
}

/// The reply envelope returned by the reliability wrapper.
///
/// Always usable: the wrapper degrades to a locally synthesized fallback
/// rather than erroring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyOutcome {
    pub content: String,
    pub source: ReplySource,
    /// Confidence in [0, 1]; fixed per source (cache 0.9, ai 0.95,
    /// fallback 0.7).
    pub confidence: f64,
    pub latency_ms: u64,
    pub language: Language,
    /// Matched intent when the fallback responder synthesized the reply.
    pub intent: Option<String>,
}

/// A cached reply row in the durable store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedReply {
    /// Hex SHA-256 of message|language|system prompt.
    pub cache_key: String,
    pub content: String,
    pub language: Language,
    pub confidence: f64,
    /// Intent the message classified as when the reply was generated.
    pub intent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub hit_count: u64,
}

impl CachedReply {
    /// Whether this entry is still valid at `now`.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_reply_source_roundtrip() {
        for src in [ReplySource::Cache, ReplySource::Ai, ReplySource::Fallback] {
            let parsed: ReplySource = src.to_string().parse().unwrap();
            assert_eq!(src, parsed);
        }
    }

    #[test]
    fn test_cached_reply_freshness() {
        let now = Utc::now();
        let entry = CachedReply {
            cache_key: "abc".to_string(),
            content: "hello".to_string(),
            language: Language::English,
            confidence: 0.9,
            intent: Some("greeting".to_string()),
            created_at: now,
            expires_at: now + Duration::hours(1),
            hit_count: 0,
        };
        assert!(entry.is_fresh(now));
        assert!(!entry.is_fresh(now + Duration::hours(2)));
    }

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::Timeout(5000);
        assert!(err.to_string().contains("5000"));
        assert_eq!(ProviderError::Status(503).to_string(), "provider returned status 503");
    }
}
