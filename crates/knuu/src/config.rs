//! Run-scoped identifiers and orchestrator configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::identity;

const ENV_RUN_ID: &str = "KNUU_RUN_ID";
const ENV_NAMESPACE: &str = "KNUU_NAMESPACE";
const ENV_IMAGE_REGISTRY: &str = "KNUU_IMAGE_REGISTRY";
const ENV_IMAGE_TTL: &str = "KNUU_IMAGE_TTL";

/// Timestamp layout used for the `test-started` label.
const START_TIME_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Identifiers shared by every instance created during one test run.
///
/// Built once at process start and handed out behind an `Arc`; nothing in
/// the crate mutates it afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    identifier: String,
    start_time: String,
}

impl RunContext {
    #[must_use]
    pub fn new(identifier: impl Into<String>, start_time: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            start_time: start_time.into(),
        }
    }

    /// Build a context stamped with `started_at`, generating the run id.
    pub fn generate(started_at: DateTime<Utc>) -> Result<Self> {
        let start_time = started_at.format(START_TIME_FORMAT).to_string();
        let suffix = identity::short_id()?;
        Ok(Self::new(format!("{start_time}_{suffix}"), start_time))
    }

    /// Build a context from `KNUU_RUN_ID`, generating one when unset.
    pub fn from_env() -> Result<Self> {
        let now = Utc::now();
        match std::env::var(ENV_RUN_ID) {
            Ok(id) if !id.trim().is_empty() => {
                debug!(run_id = %id, "Using run identifier from environment");
                Ok(Self::new(id, now.format(START_TIME_FORMAT).to_string()))
            }
            _ => Self::generate(now),
        }
    }

    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    #[must_use]
    pub fn start_time(&self) -> &str {
        &self.start_time
    }
}

/// Orchestrator settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct KnuuConfig {
    /// Namespace every instance resource is created in
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Registry used for generated short-lived image references
    #[serde(default = "default_image_registry", rename = "imageRegistry")]
    pub image_registry: String,

    /// Tag used as the expiry for generated image references
    #[serde(default = "default_image_ttl", rename = "imageTtl")]
    pub image_ttl: String,

    /// Field manager that owns the fields of server-side applies
    #[serde(default = "default_field_manager", rename = "fieldManager")]
    pub field_manager: String,
}

fn default_namespace() -> String {
    "test".to_string()
}

fn default_image_registry() -> String {
    "ttl.sh".to_string()
}

fn default_image_ttl() -> String {
    "1h".to_string()
}

fn default_field_manager() -> String {
    "knuu".to_string()
}

impl Default for KnuuConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            image_registry: default_image_registry(),
            image_ttl: default_image_ttl(),
            field_manager: default_field_manager(),
        }
    }
}

impl KnuuConfig {
    /// Load configuration from environment variables, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(namespace) = non_empty_env(ENV_NAMESPACE) {
            config.namespace = namespace;
        }
        if let Some(registry) = non_empty_env(ENV_IMAGE_REGISTRY) {
            config.image_registry = registry;
        }
        if let Some(ttl) = non_empty_env(ENV_IMAGE_TTL) {
            config.image_ttl = ttl;
        }
        config
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serial_test::serial;

    #[test]
    fn generated_run_id_is_prefixed_by_start_time() {
        let started = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap();
        let run = RunContext::generate(started).unwrap();

        assert_eq!(run.start_time(), "20240301T123005");
        assert!(run.identifier().starts_with("20240301T123005_"));
        assert_eq!(run.identifier().len(), "20240301T123005_".len() + 8);
    }

    #[test]
    #[serial]
    fn run_id_taken_from_environment() {
        std::env::set_var(ENV_RUN_ID, "ci-run-7");
        let run = RunContext::from_env().unwrap();
        std::env::remove_var(ENV_RUN_ID);

        assert_eq!(run.identifier(), "ci-run-7");
    }

    #[test]
    #[serial]
    fn config_from_env_overrides_defaults() {
        std::env::set_var(ENV_NAMESPACE, "e2e");
        std::env::set_var(ENV_IMAGE_TTL, "24h");
        let config = KnuuConfig::from_env();
        std::env::remove_var(ENV_NAMESPACE);
        std::env::remove_var(ENV_IMAGE_TTL);

        assert_eq!(config.namespace, "e2e");
        assert_eq!(config.image_ttl, "24h");
        assert_eq!(config.image_registry, "ttl.sh");
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: KnuuConfig = serde_json::from_str(r#"{"namespace":"perf"}"#).unwrap();
        assert_eq!(config.namespace, "perf");
        assert_eq!(config.field_manager, "knuu");
    }
}
