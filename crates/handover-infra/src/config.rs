//! Service configuration loader.
//!
//! Reads `handover.toml` from the data directory and deserializes it into
//! [`ServiceConfig`]. Falls back to defaults when the file is missing or
//! malformed; a bad config file must not keep the service down.

use std::path::Path;

use handover_types::config::ServiceConfig;

/// Load service configuration from `{data_dir}/handover.toml`.
pub async fn load_service_config(data_dir: &Path) -> ServiceConfig {
    let config_path = data_dir.join("handover.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(
                "no handover.toml found at {}, using defaults",
                config_path.display()
            );
            return ServiceConfig::default();
        }
        Err(err) => {
            tracing::warn!(
                "failed to read {}: {err}, using defaults",
                config_path.display()
            );
            return ServiceConfig::default();
        }
    };

    match toml::from_str::<ServiceConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            ServiceConfig::default()
        }
    }
}
