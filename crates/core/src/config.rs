//! Operator configuration.
//!
//! Defaults cover a normal deployment; environment variables and an optional
//! TOML/JSON file can override them.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Region every provider session is scoped to unless overridden.
pub const DEFAULT_REGION: &str = "ap-south-1";

/// Runtime configuration for the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorConfig {
    /// Cloud provider region for the provisioning session.
    #[serde(default = "default_region")]
    pub region: String,

    /// Restrict the controller to one namespace. `None` watches all namespaces.
    #[serde(default)]
    pub namespace: Option<String>,

    /// Delay before the dispatcher re-delivers a key whose reconcile failed.
    #[serde(with = "duration_secs", default = "default_error_requeue")]
    pub error_requeue: Duration,

    /// Field manager name used for status writes.
    #[serde(default = "default_field_manager")]
    pub field_manager: String,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            namespace: None,
            error_requeue: default_error_requeue(),
            field_manager: default_field_manager(),
        }
    }
}

impl OperatorConfig {
    /// Set the region.
    #[must_use]
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Restrict the controller to a namespace.
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set the error requeue delay.
    #[must_use]
    pub const fn error_requeue(mut self, delay: Duration) -> Self {
        self.error_requeue = delay;
        self
    }

    /// Load configuration from environment variables on top of the defaults.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if a variable is set but malformed.
    pub fn from_env() -> Result<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a key lookup (`EC2_OPERATOR_*` names).
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if a value is present but malformed.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(region) = lookup("EC2_OPERATOR_REGION") {
            debug!(region = %region, "Region overridden from environment");
            self.region = region;
        }

        if let Some(namespace) = lookup("EC2_OPERATOR_NAMESPACE") {
            self.namespace = Some(namespace).filter(|ns| !ns.is_empty());
        }

        if let Some(secs) = lookup("EC2_OPERATOR_ERROR_REQUEUE_SECS") {
            let secs = secs.trim().parse::<u64>().map_err(|e| {
                Error::invalid_config(format!(
                    "EC2_OPERATOR_ERROR_REQUEUE_SECS must be whole seconds: {e}"
                ))
            })?;
            debug!(secs, "Error requeue overridden from environment");
            self.error_requeue = Duration::from_secs(secs);
        }

        self.validate()
    }

    /// Load configuration from a file. `.json` files are parsed as JSON,
    /// anything else as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "Loading operator config");
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::file_read_failed(path, e.to_string()))?;

        let config: Self = if path.extension().is_some_and(|e| e == "json") {
            serde_json::from_str(&content).map_err(|e| Error::json_parse_failed(e.to_string()))?
        } else {
            toml::from_str(&content).map_err(|e| Error::toml_parse_failed(e.to_string()))?
        };

        config.validate()
    }

    /// Check invariants that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` on an empty region or field manager.
    pub fn validate(self) -> Result<Self> {
        if self.region.trim().is_empty() {
            return Err(Error::invalid_config("region must not be empty"));
        }
        if self.field_manager.trim().is_empty() {
            return Err(Error::invalid_config("field_manager must not be empty"));
        }
        Ok(self)
    }
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

const fn default_error_requeue() -> Duration {
    Duration::from_secs(30)
}

fn default_field_manager() -> String {
    "ec2-operator".to_string()
}

/// Serialization helper for Duration as seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = OperatorConfig::default();
        assert_eq!(config.region, "ap-south-1");
        assert_eq!(config.namespace, None);
        assert_eq!(config.error_requeue, Duration::from_secs(30));
        assert_eq!(config.field_manager, "ec2-operator");
    }

    #[test]
    fn test_config_builder() {
        let config = OperatorConfig::default()
            .region("eu-west-1")
            .namespace("infra")
            .error_requeue(Duration::from_secs(5));

        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.namespace.as_deref(), Some("infra"));
        assert_eq!(config.error_requeue, Duration::from_secs(5));
    }

    #[test]
    fn test_overrides_apply() {
        let config = OperatorConfig::default()
            .with_overrides(lookup(&[
                ("EC2_OPERATOR_REGION", "us-east-2"),
                ("EC2_OPERATOR_NAMESPACE", "prod"),
                ("EC2_OPERATOR_ERROR_REQUEUE_SECS", "12"),
            ]))
            .unwrap();

        assert_eq!(config.region, "us-east-2");
        assert_eq!(config.namespace.as_deref(), Some("prod"));
        assert_eq!(config.error_requeue, Duration::from_secs(12));
    }

    #[test]
    fn test_empty_namespace_override_means_all_namespaces() {
        let config = OperatorConfig::default()
            .namespace("old")
            .with_overrides(lookup(&[("EC2_OPERATOR_NAMESPACE", "")]))
            .unwrap();
        assert_eq!(config.namespace, None);
    }

    #[test]
    fn test_malformed_requeue_rejected() {
        let result = OperatorConfig::default()
            .with_overrides(lookup(&[("EC2_OPERATOR_ERROR_REQUEUE_SECS", "soon")]));
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn test_empty_region_rejected() {
        let result = OperatorConfig::default().with_overrides(lookup(&[("EC2_OPERATOR_REGION", " ")]));
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn test_from_toml_file_fills_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "region = \"us-west-2\"\nerror_requeue = 90").unwrap();

        let config = OperatorConfig::from_file(file.path()).unwrap();
        assert_eq!(config.region, "us-west-2");
        assert_eq!(config.error_requeue, Duration::from_secs(90));
        assert_eq!(config.field_manager, "ec2-operator");
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"namespace": "staging"}}"#).unwrap();

        let config = OperatorConfig::from_file(file.path()).unwrap();
        assert_eq!(config.region, DEFAULT_REGION);
        assert_eq!(config.namespace.as_deref(), Some("staging"));
    }

    #[test]
    fn test_from_file_reports_parse_error() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "region = [").unwrap();

        let result = OperatorConfig::from_file(file.path());
        assert!(matches!(result, Err(Error::TomlParseFailed { .. })));
    }

    #[test]
    fn test_from_missing_file() {
        let result = OperatorConfig::from_file(Path::new("/nonexistent/ec2-operator.toml"));
        assert!(matches!(result, Err(Error::FileReadFailed { .. })));
    }
}
