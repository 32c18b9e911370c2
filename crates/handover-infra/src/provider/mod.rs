//! Upstream text provider implementations.

mod http;
mod types;

pub use http::HttpTextProvider;
