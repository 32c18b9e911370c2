//! TextProvider trait definition.
//!
//! The core abstraction over the upstream text-generation service. Uses
//! native async fn in traits (RPITIT, Rust 2024 edition). Implementations
//! live in handover-infra (e.g., `HttpTextProvider`).

use handover_types::provider::{GenerateRequest, GeneratedText, ProviderError};

/// Trait for upstream text-generation backends.
///
/// A single call, no streaming. The responder wraps each call with its
/// own timeout, retry, and circuit-breaker logic, so implementations
/// should do one honest attempt and report failures precisely.
pub trait TextProvider: Send + Sync {
    /// Human-readable provider name for logs and stats.
    fn name(&self) -> &str;

    /// Generate a reply for the given request.
    fn generate(
        &self,
        request: &GenerateRequest,
    ) -> impl std::future::Future<Output = Result<GeneratedText, ProviderError>> + Send;
}
