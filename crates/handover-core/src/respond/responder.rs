//! The responder pipeline: cache, breaker, retries, fallback.
//!
//! `Responder::respond` is infallible by contract. Whatever happens
//! upstream, the customer gets a reply; only its `source` and confidence
//! change.

use std::time::Instant;

use chrono::{Duration as ChronoDuration, Utc};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use handover_types::config::ResponderConfig;
use handover_types::conversation::Language;
use handover_types::provider::{
    CachedReply, GenerateRequest, ProviderError, ReplyOutcome, ReplySource,
};

use crate::provider::TextProvider;
use crate::repository::ReplyCacheRepository;
use crate::respond::breaker::ProviderBreaker;
use crate::respond::fallback;
use crate::respond::metrics::ResponderMetrics;

/// Fixed confidence per reply source.
const CONFIDENCE_CACHE: f64 = 0.9;
const CONFIDENCE_AI: f64 = 0.95;
const CONFIDENCE_FALLBACK: f64 = 0.7;

const MAX_TOKENS: u32 = 500;
const TEMPERATURE: f64 = 0.7;

/// Reliability wrapper around the upstream text provider.
///
/// Generic over the cache repository and provider so tests can inject
/// scripted implementations.
pub struct Responder<C: ReplyCacheRepository, P: TextProvider> {
    cache: C,
    provider: P,
    breaker: Mutex<ProviderBreaker>,
    metrics: ResponderMetrics,
    config: ResponderConfig,
}

impl<C: ReplyCacheRepository, P: TextProvider> Responder<C, P> {
    pub fn new(cache: C, provider: P, config: ResponderConfig) -> Self {
        let breaker = ProviderBreaker::new(config.failure_threshold, config.breaker_cooldown());
        Self {
            cache,
            provider,
            breaker: Mutex::new(breaker),
            metrics: ResponderMetrics::new(),
            config,
        }
    }

    /// Produce a reply for a customer message. Never fails.
    ///
    /// Pipeline: cache lookup, then the provider behind the breaker with
    /// bounded retries, then the intent fallback. Cache and breaker
    /// bookkeeping errors are logged and ignored; they must not cost the
    /// customer a reply.
    pub async fn respond(
        &self,
        message: &str,
        language: Language,
        system_prompt: &str,
        history: &[(String, String)],
    ) -> ReplyOutcome {
        let started = Instant::now();
        self.metrics.record_request();

        // Every reply is classified, whatever path produces it.
        let intent = fallback::classify_intent(message);
        let cache_key = compute_cache_key(message, language, system_prompt);

        if let Some(cached) = self.lookup_cache(&cache_key).await {
            self.metrics.record_cache_hit();
            debug!(%cache_key, "reply cache hit");
            return ReplyOutcome {
                content: cached.content,
                source: ReplySource::Cache,
                confidence: CONFIDENCE_CACHE,
                latency_ms: elapsed_ms(started),
                language,
                intent: Some(cached.intent.unwrap_or_else(|| intent.to_string())),
            };
        }

        if self.breaker.lock().await.is_available() {
            let request = GenerateRequest {
                message: message.to_string(),
                system_prompt: system_prompt.to_string(),
                history: history.to_vec(),
                max_tokens: MAX_TOKENS,
                temperature: TEMPERATURE,
            };

            match self.call_with_retries(&request).await {
                Ok(generated) => {
                    self.metrics.record_provider_success();
                    self.breaker.lock().await.record_success();
                    self.store_cache(&cache_key, &generated.content, language, intent)
                        .await;
                    return ReplyOutcome {
                        content: generated.content,
                        source: ReplySource::Ai,
                        confidence: CONFIDENCE_AI,
                        latency_ms: elapsed_ms(started),
                        language,
                        intent: Some(intent.to_string()),
                    };
                }
                Err(error) => {
                    self.metrics.record_provider_failure();
                    warn!(%error, "provider attempts exhausted, falling back");
                }
            }
        } else {
            debug!("circuit open, skipping provider");
        }

        self.metrics.record_fallback();
        let fallback = fallback::reply_for(message, language);
        info!(intent = fallback.intent, "serving fallback reply");
        ReplyOutcome {
            content: fallback.content,
            source: ReplySource::Fallback,
            confidence: CONFIDENCE_FALLBACK,
            latency_ms: elapsed_ms(started),
            language,
            intent: Some(fallback.intent.to_string()),
        }
    }

    /// Call the provider with per-attempt timeout and exponential backoff.
    ///
    /// Each failed attempt is recorded against the breaker. The loop stops
    /// early once the breaker opens mid-sequence.
    async fn call_with_retries(
        &self,
        request: &GenerateRequest,
    ) -> Result<handover_types::provider::GeneratedText, ProviderError> {
        let timeout = self.config.provider_timeout();
        let mut delay = self.config.retry_base_delay();
        let mut last_error = ProviderError::Empty;

        for attempt in 1..=self.config.max_retries {
            let result = tokio::time::timeout(timeout, self.provider.generate(request)).await;
            let outcome = match result {
                Ok(Ok(generated)) if generated.content.trim().is_empty() => {
                    Err(ProviderError::Empty)
                }
                Ok(Ok(generated)) => Ok(generated),
                Ok(Err(error)) => Err(error),
                Err(_) => Err(ProviderError::Timeout(timeout.as_millis() as u64)),
            };

            match outcome {
                Ok(generated) => return Ok(generated),
                Err(error) => {
                    warn!(attempt, %error, "provider call failed");
                    let mut breaker = self.breaker.lock().await;
                    breaker.record_failure(&error);
                    let open = !matches!(
                        breaker.state,
                        crate::respond::breaker::CircuitState::Closed { .. }
                    );
                    drop(breaker);
                    last_error = error;

                    if open {
                        break;
                    }
                    if attempt < self.config.max_retries {
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    }
                }
            }
        }

        Err(last_error)
    }

    async fn lookup_cache(&self, cache_key: &str) -> Option<CachedReply> {
        match self.cache.get(cache_key, Utc::now()).await {
            Ok(Some(cached)) => {
                if let Err(error) = self.cache.record_hit(cache_key).await {
                    warn!(%error, "failed to record cache hit");
                }
                Some(cached)
            }
            Ok(None) => None,
            Err(error) => {
                warn!(%error, "reply cache lookup failed");
                None
            }
        }
    }

    async fn store_cache(&self, cache_key: &str, content: &str, language: Language, intent: &str) {
        let now = Utc::now();
        let ttl = ChronoDuration::seconds(self.config.cache_ttl_secs as i64);
        let reply = CachedReply {
            cache_key: cache_key.to_string(),
            content: content.to_string(),
            language,
            confidence: CONFIDENCE_AI,
            intent: Some(intent.to_string()),
            created_at: now,
            expires_at: now + ttl,
            hit_count: 0,
        };
        if let Err(error) = self.cache.put(&reply).await {
            warn!(%error, "failed to store reply in cache");
        }
    }

    /// Breaker snapshot for the stats endpoint.
    pub async fn breaker_snapshot(&self) -> crate::respond::breaker::BreakerSnapshot {
        self.breaker.lock().await.snapshot()
    }

    /// Counter snapshot for the stats endpoint.
    pub fn metrics_snapshot(&self) -> crate::respond::metrics::MetricsSnapshot {
        self.metrics.snapshot()
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Hex SHA-256 over the (message, language, system prompt) tuple.
///
/// Message text is trimmed and lowercased so trivially restated prompts
/// share an entry.
pub fn compute_cache_key(message: &str, language: Language, system_prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(message.trim().to_lowercase().as_bytes());
    hasher.update([0x1f]);
    hasher.update(language.to_string().as_bytes());
    hasher.update([0x1f]);
    hasher.update(system_prompt.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use chrono::{DateTime, Utc};
    use handover_types::error::RepositoryError;
    use handover_types::provider::GeneratedText;

    /// In-memory cache repository for pipeline tests.
    #[derive(Default)]
    struct MemoryCache {
        entries: StdMutex<HashMap<String, CachedReply>>,
    }

    impl ReplyCacheRepository for MemoryCache {
        async fn get(
            &self,
            cache_key: &str,
            now: DateTime<Utc>,
        ) -> Result<Option<CachedReply>, RepositoryError> {
            let entries = self.entries.lock().unwrap();
            Ok(entries
                .get(cache_key)
                .filter(|reply| reply.is_fresh(now))
                .cloned())
        }

        async fn put(&self, reply: &CachedReply) -> Result<(), RepositoryError> {
            self.entries
                .lock()
                .unwrap()
                .insert(reply.cache_key.clone(), reply.clone());
            Ok(())
        }

        async fn record_hit(&self, cache_key: &str) -> Result<(), RepositoryError> {
            if let Some(reply) = self.entries.lock().unwrap().get_mut(cache_key) {
                reply.hit_count += 1;
            }
            Ok(())
        }

        async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
            let mut entries = self.entries.lock().unwrap();
            let before = entries.len();
            entries.retain(|_, reply| reply.is_fresh(now));
            Ok((before - entries.len()) as u64)
        }
    }

    /// Scripted provider: fails `failures_before_success` times, then
    /// answers. Counts calls.
    struct ScriptedProvider {
        failures_before_success: u32,
        calls: AtomicU32,
    }

    impl ScriptedProvider {
        fn new(failures_before_success: u32) -> Self {
            Self {
                failures_before_success,
                calls: AtomicU32::new(0),
            }
        }

        fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl TextProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(
            &self,
            request: &GenerateRequest,
        ) -> Result<GeneratedText, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures_before_success {
                Err(ProviderError::Status(503))
            } else {
                Ok(GeneratedText {
                    content: format!("reply to: {}", request.message),
                    model: Some("scripted-1".to_string()),
                })
            }
        }
    }

    fn fast_config() -> ResponderConfig {
        ResponderConfig {
            max_retries: 3,
            retry_base_delay_secs: 0,
            provider_timeout_secs: 5,
            failure_threshold: 5,
            breaker_cooldown_secs: 300,
            cache_ttl_secs: 3600,
        }
    }

    #[tokio::test]
    async fn test_success_path_returns_ai_and_caches() {
        let responder = Responder::new(
            MemoryCache::default(),
            ScriptedProvider::new(0),
            fast_config(),
        );

        let outcome = responder
            .respond("what is the price of chicken", Language::English, "sys", &[])
            .await;
        assert_eq!(outcome.source, ReplySource::Ai);
        assert!((outcome.confidence - 0.95).abs() < f64::EPSILON);
        assert_eq!(outcome.intent.as_deref(), Some("price_inquiry"));
        assert!(outcome.latency_ms < 60_000);

        // Identical tuple within the TTL: served from cache, no new call.
        let outcome2 = responder
            .respond("what is the price of chicken", Language::English, "sys", &[])
            .await;
        assert_eq!(outcome2.source, ReplySource::Cache);
        assert!((outcome2.confidence - 0.9).abs() < f64::EPSILON);
        assert_eq!(outcome2.intent.as_deref(), Some("price_inquiry"));
        assert_eq!(responder.provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_retries_then_success() {
        let responder = Responder::new(
            MemoryCache::default(),
            ScriptedProvider::new(2),
            fast_config(),
        );

        let outcome = responder
            .respond("hello", Language::English, "sys", &[])
            .await;
        assert_eq!(outcome.source, ReplySource::Ai);
        assert_eq!(responder.provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_fall_back_with_intent() {
        let responder = Responder::new(
            MemoryCache::default(),
            ScriptedProvider::new(u32::MAX),
            fast_config(),
        );

        let outcome = responder
            .respond("what is the price of chicken", Language::English, "sys", &[])
            .await;
        assert_eq!(outcome.source, ReplySource::Fallback);
        assert_eq!(outcome.intent.as_deref(), Some("price_inquiry"));
        assert!((outcome.confidence - 0.7).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_open_breaker_short_circuits_provider() {
        let mut config = fast_config();
        config.failure_threshold = 3;
        let responder = Responder::new(
            MemoryCache::default(),
            ScriptedProvider::new(u32::MAX),
            config,
        );

        // First request burns through 3 attempts and opens the breaker.
        let first = responder
            .respond("hello", Language::English, "sys", &[])
            .await;
        assert_eq!(first.source, ReplySource::Fallback);
        let calls_after_first = responder.provider.call_count();
        assert_eq!(calls_after_first, 3);

        // Second request must not touch the provider at all.
        let second = responder
            .respond("hello again", Language::English, "sys", &[])
            .await;
        assert_eq!(second.source, ReplySource::Fallback);
        assert_eq!(responder.provider.call_count(), calls_after_first);

        let snap = responder.breaker_snapshot().await;
        assert_eq!(snap.circuit_state, "open");
    }

    #[tokio::test]
    async fn test_cache_hit_skips_open_breaker() {
        let mut config = fast_config();
        config.failure_threshold = 1;
        let cache = MemoryCache::default();
        let now = Utc::now();
        let key = compute_cache_key("hello", Language::English, "sys");
        cache
            .put(&CachedReply {
                cache_key: key,
                content: "cached hello".to_string(),
                language: Language::English,
                confidence: 0.95,
                intent: Some("greeting".to_string()),
                created_at: now,
                expires_at: now + ChronoDuration::seconds(3600),
                hit_count: 0,
            })
            .await
            .unwrap();

        let responder = Responder::new(cache, ScriptedProvider::new(u32::MAX), config);
        let outcome = responder
            .respond("hello", Language::English, "sys", &[])
            .await;
        assert_eq!(outcome.source, ReplySource::Cache);
        assert_eq!(outcome.content, "cached hello");
        assert_eq!(outcome.intent.as_deref(), Some("greeting"));
        assert_eq!(responder.provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_metrics_track_sources() {
        let responder = Responder::new(
            MemoryCache::default(),
            ScriptedProvider::new(0),
            fast_config(),
        );
        responder
            .respond("hello", Language::English, "sys", &[])
            .await;
        responder
            .respond("hello", Language::English, "sys", &[])
            .await;

        let snap = responder.metrics_snapshot();
        assert_eq!(snap.total_requests, 2);
        assert_eq!(snap.provider_successes, 1);
        assert_eq!(snap.cache_hits, 1);
    }

    #[test]
    fn test_cache_key_normalizes_message() {
        let a = compute_cache_key("  Hello ", Language::English, "sys");
        let b = compute_cache_key("hello", Language::English, "sys");
        assert_eq!(a, b);

        let c = compute_cache_key("hello", Language::NepaliRomanized, "sys");
        assert_ne!(a, c);

        let d = compute_cache_key("hello", Language::English, "other prompt");
        assert_ne!(a, d);
    }
}
