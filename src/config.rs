//! Configuration loading via `ortho-config`.

use std::ffi::OsString;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::retry::RetryPolicy;
use crate::transport::HttpSettings;

/// Default API endpoint.
pub const DEFAULT_API_ENDPOINT: &str = "https://deck-api.ngcloud.ru/api/v1/index.cfm";

/// Default location of the token file.
pub const DEFAULT_TOKEN_FILE: &str = "~/.nubes_token";

/// Largest accepted operation timeout, one week.
pub const MAX_OPERATION_TIMEOUT_SECS: u64 = 7 * 24 * 60 * 60;

/// Connection, timing and retry settings derived from environment variables
/// and configuration files.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "NUBES",
    discovery(
        app_name = "nubes-lifecycle",
        env_var = "NUBES_CONFIG_PATH",
        config_file_name = "nubes-lifecycle.toml",
        dotfile_name = ".nubes-lifecycle.toml",
        project_file_name = "nubes-lifecycle.toml"
    )
)]
pub struct NubesConfig {
    /// Base URL of the wizard API; request paths are appended verbatim.
    #[ortho_config(default = DEFAULT_API_ENDPOINT.to_owned())]
    pub api_endpoint: String,
    /// Bearer token. When absent the token file is read instead.
    pub api_token: Option<String>,
    /// File holding the bearer token; `~/` expands to the home directory.
    #[ortho_config(default = DEFAULT_TOKEN_FILE.to_owned())]
    pub token_file: String,
    /// Deadline for polling an operation and waiting for its instance.
    #[ortho_config(default = 1800)]
    pub operation_timeout_secs: u64,
    /// Interval between operation status reads.
    #[ortho_config(default = 5)]
    pub operation_poll_secs: u64,
    /// Interval between instance status reads while settling.
    #[ortho_config(default = 10)]
    pub settle_poll_secs: u64,
    /// Connection establishment timeout, TLS handshake included.
    #[ortho_config(default = 60)]
    pub connect_timeout_secs: u64,
    /// Timeout for a single HTTP request.
    #[ortho_config(default = 300)]
    pub request_timeout_secs: u64,
    /// Retries after the first attempt for transient failures.
    #[ortho_config(default = 3)]
    pub max_retries: u32,
    /// Base delay between retries, multiplied by the attempt number.
    #[ortho_config(default = 2000)]
    pub retry_base_delay_ms: u64,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn hint(&self) -> String {
        format!(
            "set {} or add {} to nubes-lifecycle.toml",
            self.env_var, self.toml_key
        )
    }
}

impl NubesConfig {
    /// Loads configuration without attempting to parse CLI arguments. Values
    /// merge defaults, configuration files and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("nubes-lifecycle")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: {}",
                metadata.description,
                metadata.hint()
            )));
        }
        Ok(())
    }

    fn require_positive(value: u64, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value == 0 {
            return Err(ConfigError::Invalid(format!(
                "{} must be greater than zero: {}",
                metadata.description,
                metadata.hint()
            )));
        }
        Ok(())
    }

    /// Performs semantic validation. Error messages name the environment
    /// variable and TOML key that fix the problem.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when the endpoint is blank and
    /// [`ConfigError::Invalid`] when a timeout or interval is zero or the
    /// operation timeout exceeds [`MAX_OPERATION_TIMEOUT_SECS`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.api_endpoint,
            &FieldMetadata::new("API endpoint", "NUBES_API_ENDPOINT", "api_endpoint"),
        )?;
        if self.operation_timeout_secs > MAX_OPERATION_TIMEOUT_SECS {
            let metadata = FieldMetadata::new(
                "operation timeout",
                "NUBES_OPERATION_TIMEOUT_SECS",
                "operation_timeout_secs",
            );
            return Err(ConfigError::Invalid(format!(
                "{} must not exceed {MAX_OPERATION_TIMEOUT_SECS} seconds: {}",
                metadata.description,
                metadata.hint()
            )));
        }
        let positive = [
            (
                self.operation_timeout_secs,
                FieldMetadata::new(
                    "operation timeout",
                    "NUBES_OPERATION_TIMEOUT_SECS",
                    "operation_timeout_secs",
                ),
            ),
            (
                self.operation_poll_secs,
                FieldMetadata::new(
                    "operation poll interval",
                    "NUBES_OPERATION_POLL_SECS",
                    "operation_poll_secs",
                ),
            ),
            (
                self.settle_poll_secs,
                FieldMetadata::new(
                    "settle poll interval",
                    "NUBES_SETTLE_POLL_SECS",
                    "settle_poll_secs",
                ),
            ),
            (
                self.connect_timeout_secs,
                FieldMetadata::new(
                    "connect timeout",
                    "NUBES_CONNECT_TIMEOUT_SECS",
                    "connect_timeout_secs",
                ),
            ),
            (
                self.request_timeout_secs,
                FieldMetadata::new(
                    "request timeout",
                    "NUBES_REQUEST_TIMEOUT_SECS",
                    "request_timeout_secs",
                ),
            ),
        ];
        for (value, metadata) in &positive {
            Self::require_positive(*value, metadata)?;
        }
        Ok(())
    }

    /// Inline token, when configured and not blank.
    #[must_use]
    pub fn inline_token(&self) -> Option<&str> {
        self.api_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    /// HTTP settings for `token`.
    #[must_use]
    pub fn http_settings(&self, token: String) -> HttpSettings {
        HttpSettings {
            endpoint: self.api_endpoint.trim().to_owned(),
            token,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    /// Retry policy for transient failures.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
        }
    }

    /// Deadline for polling an operation and settling its instance.
    #[must_use]
    pub const fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// Interval between operation status reads.
    #[must_use]
    pub const fn operation_poll_interval(&self) -> Duration {
        Duration::from_secs(self.operation_poll_secs)
    }

    /// Interval between instance status reads while settling.
    #[must_use]
    pub const fn settle_poll_interval(&self) -> Duration {
        Duration::from_secs(self.settle_poll_secs)
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a configured value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
