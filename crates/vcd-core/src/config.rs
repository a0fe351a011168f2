//! Configuration structures for vCD clients.
//!
//! This module provides the validated configuration used to connect to a vCD
//! endpoint. It can be built in code or loaded from JSON.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;
use validator::Validate;

/// Configuration for a vCD client instance.
///
/// The endpoint is the absolute URL root against which every relative API
/// path is resolved (for example `https://vcd.example.com/api`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct VcdClientConfig {
    /// Base endpoint URL
    #[validate(url)]
    pub endpoint: String,

    /// API version advertised in the `Accept` header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    /// Whether to verify TLS certificates
    #[serde(default = "default_tls_verify")]
    pub tls_verify: bool,

    /// Request timeout in seconds
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Custom user agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

const fn default_tls_verify() -> bool {
    true
}

const fn default_request_timeout_secs() -> u64 {
    30
}

impl VcdClientConfig {
    /// Create a new client configuration for the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or validation fails.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, Error> {
        let config = Self {
            endpoint: endpoint.into(),
            api_version: None,
            tls_verify: default_tls_verify(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: None,
        };

        config
            .validate()
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {e}")))?;

        Ok(config)
    }

    /// Load and validate a configuration from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be parsed or fails validation.
    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::ConfigError(format!("Invalid configuration document: {e}")))?;

        config
            .validate()
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {e}")))?;

        Ok(config)
    }

    /// Set the API version.
    #[must_use]
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Set whether to verify TLS certificates.
    #[must_use]
    pub const fn with_tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Set request timeout in seconds.
    #[must_use]
    pub const fn with_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout_secs = seconds;
        self
    }

    /// Set a custom user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Parse the endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn parse_endpoint(&self) -> Result<Url, Error> {
        Url::parse(&self.endpoint)
            .map_err(|e| Error::ConfigError(format!("Invalid endpoint URL: {e}")))
    }
}

impl Default for VcdClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://localhost/api".to_string(),
            api_version: None,
            tls_verify: default_tls_verify(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_new() {
        let config = VcdClientConfig::new("https://vcd.example.com/api").unwrap();
        assert_eq!(config.endpoint, "https://vcd.example.com/api");
        assert!(config.tls_verify);
        assert_eq!(config.request_timeout_secs, 30);
        assert!(config.api_version.is_none());
    }

    #[test]
    fn test_config_invalid_url() {
        let result = VcdClientConfig::new("not-a-url");
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_config_builder() {
        let config = VcdClientConfig::new("https://vcd.example.com/api")
            .unwrap()
            .with_api_version("36.0")
            .with_tls_verify(false)
            .with_timeout(60)
            .with_user_agent("dfw-tool/1.0");

        assert_eq!(config.api_version.as_deref(), Some("36.0"));
        assert!(!config.tls_verify);
        assert_eq!(config.timeout(), Duration::from_secs(60));
        assert_eq!(config.user_agent.as_deref(), Some("dfw-tool/1.0"));
    }

    #[test]
    fn test_config_parse_endpoint() {
        let config = VcdClientConfig::new("https://vcd.example.com:8443/api").unwrap();
        let url = config.parse_endpoint().unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("vcd.example.com"));
        assert_eq!(url.port(), Some(8443));
        assert_eq!(url.path(), "/api");
    }

    #[test]
    fn test_config_from_json_applies_defaults() {
        let config =
            VcdClientConfig::from_json_str(r#"{"endpoint": "https://vcd.example.com/api"}"#)
                .unwrap();
        assert!(config.tls_verify);
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_config_from_json_rejects_out_of_range_timeout() {
        let result = VcdClientConfig::from_json_str(
            r#"{"endpoint": "https://vcd.example.com/api", "request_timeout_secs": 0}"#,
        );
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_config_serialization() {
        let config = VcdClientConfig::new("https://vcd.example.com/api")
            .unwrap()
            .with_api_version("36.0");

        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("user_agent"));
        let deserialized: VcdClientConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_config_validation_timeout_range() {
        let mut config = VcdClientConfig::default();
        config.request_timeout_secs = 0;
        assert!(config.validate().is_err());

        config.request_timeout_secs = 301;
        assert!(config.validate().is_err());

        config.request_timeout_secs = 30;
        assert!(config.validate().is_ok());
    }
}
