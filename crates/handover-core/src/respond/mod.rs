//! The reliability envelope around the upstream text provider.
//!
//! `Responder` is the only way the rest of the service obtains an
//! automated reply. It layers a durable reply cache, a circuit breaker,
//! bounded retries with exponential backoff, and an intent-matched
//! fallback so that it always returns a usable reply and never errors.

pub mod breaker;
pub mod fallback;
pub mod metrics;
pub mod responder;

pub use breaker::{BreakerSnapshot, CircuitState, ProviderBreaker};
pub use metrics::{MetricsSnapshot, ResponderMetrics};
pub use responder::Responder;
