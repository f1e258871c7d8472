//! Configuration for endpoint orchestration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::catalog::{ModelCatalog, ModelConfig};
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

/// Main orchestrator configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OrchestratorConfig {
    /// Control-plane connection settings
    #[serde(default)]
    pub control_plane: ControlPlaneConfig,
    /// Provisioning wait settings
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    /// Retry policies per remote-call class
    #[serde(default)]
    pub retry: RetryConfig,
    /// Extra catalog entries (override built-in entries with the same id)
    #[serde(default)]
    pub models: Vec<ModelConfig>,
}

impl OrchestratorConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::info!("Loaded endpoint configuration from {}", path.display());
        Ok(config)
    }

    /// Check every section, failing before any remote call is made
    pub fn validate(&self) -> Result<()> {
        self.control_plane.validate()?;
        self.lifecycle.validate()?;
        self.retry.control_plane.to_policy()?;
        self.retry.invocation.to_policy()?;
        self.catalog()?;
        Ok(())
    }

    /// Built-in catalog extended with the configured models
    pub fn catalog(&self) -> Result<ModelCatalog> {
        ModelCatalog::builtin().with_models(self.models.iter().cloned())
    }
}

/// Control-plane connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlPlaneConfig {
    /// Base URL of the control-plane API
    pub base_url: String,
    /// Region the endpoints live in
    #[serde(default = "default_region")]
    pub region: String,
    /// Execution role passed on endpoint creation
    #[serde(default)]
    pub role_arn: Option<String>,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
    /// Environment variable holding a bearer token (optional)
    #[serde(default)]
    pub token_env: Option<String>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            region: default_region(),
            role_arn: None,
            timeout_secs: default_request_timeout(),
            token_env: None,
        }
    }
}

impl ControlPlaneConfig {
    fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(Error::config(format!(
                "control_plane.base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(Error::config("control_plane.timeout_secs must be > 0"));
        }
        Ok(())
    }

    /// Request timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Bearer token read from `token_env`, if configured and set
    pub fn bearer_token(&self) -> Option<String> {
        self.token_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|token| !token.is_empty())
    }
}

/// Provisioning wait configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LifecycleConfig {
    /// Fixed interval between status checks (default: 5s)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Pause while a configuration exists without an endpoint (default: 5s)
    #[serde(default = "default_grace_interval")]
    pub grace_interval_secs: u64,
    /// Grace waits before deploying from the dangling configuration (default: 6)
    #[serde(default = "default_max_grace_waits")]
    pub max_grace_waits: u32,
    /// Ceiling on total provisioning wait (default: 1800s = 30 minutes)
    #[serde(default = "default_provisioning_timeout")]
    pub provisioning_timeout_secs: u64,
}

fn default_poll_interval() -> u64 {
    5
}

fn default_grace_interval() -> u64 {
    5
}

fn default_max_grace_waits() -> u32 {
    6
}

fn default_provisioning_timeout() -> u64 {
    1800
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            grace_interval_secs: 5,
            max_grace_waits: 6,
            provisioning_timeout_secs: 1800, // 30 minutes
        }
    }
}

impl LifecycleConfig {
    /// Reject zero intervals and ceilings
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            return Err(Error::config("lifecycle.poll_interval_secs must be > 0"));
        }
        if self.grace_interval_secs == 0 {
            return Err(Error::config("lifecycle.grace_interval_secs must be > 0"));
        }
        if self.provisioning_timeout_secs == 0 {
            return Err(Error::config("lifecycle.provisioning_timeout_secs must be > 0"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn grace_interval(&self) -> Duration {
        Duration::from_secs(self.grace_interval_secs)
    }

    pub fn provisioning_timeout(&self) -> Duration {
        Duration::from_secs(self.provisioning_timeout_secs)
    }
}

/// Retry policies per remote-call class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Describe / create calls
    #[serde(default = "default_control_plane_retry")]
    pub control_plane: RetryPolicyConfig,
    /// Endpoint invocations
    #[serde(default = "default_invocation_retry")]
    pub invocation: RetryPolicyConfig,
}

fn default_control_plane_retry() -> RetryPolicyConfig {
    RetryPolicyConfig::from(&RetryPolicy::control_plane())
}

fn default_invocation_retry() -> RetryPolicyConfig {
    RetryPolicyConfig::from(&RetryPolicy::invocation())
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            control_plane: default_control_plane_retry(),
            invocation: default_invocation_retry(),
        }
    }
}

/// Serializable form of a [`RetryPolicy`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicyConfig {
    /// Retries beyond the first call
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds
    pub base_delay_ms: u64,
    /// Multiplier per retry (must be > 1)
    pub backoff_factor: f64,
    /// Error codes treated as transient
    pub retryable_error_codes: Vec<String>,
}

impl RetryPolicyConfig {
    /// Build the validated policy
    pub fn to_policy(&self) -> Result<RetryPolicy> {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.base_delay_ms),
            self.backoff_factor,
            self.retryable_error_codes.iter().cloned(),
        )
    }
}

impl From<&RetryPolicy> for RetryPolicyConfig {
    fn from(policy: &RetryPolicy) -> Self {
        let mut codes: Vec<String> = policy.retryable_error_codes().iter().cloned().collect();
        codes.sort();
        Self {
            max_retries: policy.max_retries(),
            base_delay_ms: u64::try_from(policy.base_delay().as_millis()).unwrap_or(u64::MAX),
            backoff_factor: policy.backoff_factor(),
            retryable_error_codes: codes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::EndpointRole;
    use crate::error::codes;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = OrchestratorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.lifecycle.poll_interval(), Duration::from_secs(5));
        assert_eq!(
            config.retry.invocation.to_policy().unwrap(),
            RetryPolicy::invocation()
        );
    }

    #[test]
    fn test_parse_toml() {
        let config = OrchestratorConfig::from_toml_str(
            r#"
            [control_plane]
            base_url = "https://models.internal.example"
            token_env = "ENDPOINTS_TOKEN"

            [lifecycle]
            provisioning_timeout_secs = 600

            [retry.invocation]
            max_retries = 2
            base_delay_ms = 250
            backoff_factor = 3.0
            retryable_error_codes = ["ThrottlingException"]

            [[models]]
            model_id = "custom/e5-large"
            role = "embedding"
            source_kind = "custom_image"
            compute_class = "ml.g5.xlarge"
            output_dimension = 1024
            request_shape = "inputs"
            "#,
        )
        .unwrap();

        assert_eq!(config.control_plane.region, "us-east-1");
        assert_eq!(config.lifecycle.provisioning_timeout_secs, 600);
        assert_eq!(config.lifecycle.poll_interval_secs, 5);

        let invocation = config.retry.invocation.to_policy().unwrap();
        assert_eq!(invocation.max_retries(), 2);
        assert!(invocation.is_retryable(codes::THROTTLING));
        assert!(!invocation.is_retryable(codes::SERVICE_UNAVAILABLE));
        assert_eq!(config.retry.control_plane, default_control_plane_retry());

        let catalog = config.catalog().unwrap();
        let custom = catalog.resolve("custom/e5-large").unwrap();
        assert_eq!(custom.role, EndpointRole::Embedding);
    }

    #[test]
    fn test_rejects_malformed_policy() {
        let err = OrchestratorConfig::from_toml_str(
            r#"
            [retry.control_plane]
            max_retries = 3
            base_delay_ms = 100
            backoff_factor = 0.5
            retryable_error_codes = []
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = OrchestratorConfig::from_toml_str(
            r#"
            [control_plane]
            base_url = "localhost:8080"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[lifecycle]\nmax_grace_waits = 2").unwrap();

        let config = OrchestratorConfig::from_file(file.path()).unwrap();
        assert_eq!(config.lifecycle.max_grace_waits, 2);

        assert!(OrchestratorConfig::from_file("/definitely/not/here.toml").is_err());
    }
}
