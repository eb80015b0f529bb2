//! Configuration loading via `ortho-config`.

use std::time::Duration;

use camino::Utf8Path;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::fs_util;
use crate::softlayer::{DEFAULT_API_ENDPOINT, HttpSoftLayerClient};
use crate::vm::hosts::DEFAULT_HOSTS_FILE;
use crate::vm::{AgentOptions, CreatorWaits, EtcHostsFile};
use crate::wait::WaitSettings;

/// SoftLayer credentials and provisioning limits derived from configuration
/// files and environment variables.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "SL",
    discovery(
        app_name = "softlayer-cpi",
        env_var = "SL_CPI_CONFIG_PATH",
        config_file_name = "softlayer-cpi.toml",
        dotfile_name = ".softlayer-cpi.toml",
        project_file_name = "softlayer-cpi.toml"
    )
)]
pub struct SoftLayerConfig {
    /// Account user name used for basic authentication.
    #[ortho_config(default = String::new())]
    pub username: String,
    /// API key paired with the user name.
    #[ortho_config(default = String::new())]
    pub api_key: String,
    /// Base URL of the REST API.
    #[ortho_config(default = DEFAULT_API_ENDPOINT.to_owned())]
    pub api_endpoint: String,
    /// JSON file holding the agent options.
    pub agent_options_file: Option<String>,
    /// Hosts file updated for guests reached through their backend address.
    #[ortho_config(default = DEFAULT_HOSTS_FILE.to_owned())]
    pub hosts_file: String,
    /// Upper bound for provisioning and ephemeral disk waits.
    #[ortho_config(default = 7200)]
    pub wait_timeout_secs: u64,
    /// Delay between two polls.
    #[ortho_config(default = 5)]
    pub poll_interval_secs: u64,
    /// Upper bound for waits following an operating system reload.
    #[ortho_config(default = 14400)]
    pub reload_timeout_secs: u64,
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

    fn missing(&self) -> ConfigError {
        ConfigError::MissingField(format!(
            "missing {}: set {} or add {} to softlayer-cpi.toml",
            self.description, self.env_var, self.toml_key
        ))
    }
}

impl SoftLayerConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(metadata.missing());
        }
        Ok(())
    }

    fn require_positive(value: u64, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value == 0 {
            return Err(ConfigError::InvalidValue(format!(
                "{} must be greater than zero: check {} or {} in softlayer-cpi.toml",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("softlayer-cpi")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation on required fields.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty
    /// and [`ConfigError::InvalidValue`] when a wait limit is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.username,
            &FieldMetadata::new("SoftLayer user name", "SL_USERNAME", "username"),
        )?;
        Self::require_field(
            &self.api_key,
            &FieldMetadata::new("SoftLayer API key", "SL_API_KEY", "api_key"),
        )?;
        Self::require_field(
            &self.api_endpoint,
            &FieldMetadata::new("API endpoint", "SL_API_ENDPOINT", "api_endpoint"),
        )?;
        Self::require_field(
            &self.hosts_file,
            &FieldMetadata::new("hosts file", "SL_HOSTS_FILE", "hosts_file"),
        )?;
        Self::require_positive(
            self.wait_timeout_secs,
            &FieldMetadata::new("wait timeout", "SL_WAIT_TIMEOUT_SECS", "wait_timeout_secs"),
        )?;
        Self::require_positive(
            self.poll_interval_secs,
            &FieldMetadata::new(
                "poll interval",
                "SL_POLL_INTERVAL_SECS",
                "poll_interval_secs",
            ),
        )?;
        Self::require_positive(
            self.reload_timeout_secs,
            &FieldMetadata::new(
                "reload timeout",
                "SL_RELOAD_TIMEOUT_SECS",
                "reload_timeout_secs",
            ),
        )?;
        Ok(())
    }

    /// Returns the wait limits for the provisioning orchestrator.
    #[must_use]
    pub const fn creator_waits(&self) -> CreatorWaits {
        let interval = Duration::from_secs(self.poll_interval_secs);
        CreatorWaits {
            provisioning: WaitSettings::new(Duration::from_secs(self.wait_timeout_secs), interval),
            reload: WaitSettings::new(Duration::from_secs(self.reload_timeout_secs), interval),
        }
    }

    /// Builds the REST client from the configured credentials.
    #[must_use]
    pub fn client(&self) -> HttpSoftLayerClient {
        HttpSoftLayerClient::new(&self.api_endpoint, &self.username, &self.api_key)
    }

    /// Returns the hosts file registrar.
    #[must_use]
    pub fn hosts(&self) -> EtcHostsFile {
        EtcHostsFile::new(self.hosts_file.as_str())
    }

    /// Reads and validates the agent options, preferring `override_path` over
    /// the configured file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when no file is named,
    /// [`ConfigError::AgentOptions`] when it cannot be read or parsed, and
    /// [`ConfigError::InvalidValue`] when the options are incomplete.
    pub fn load_agent_options(
        &self,
        override_path: Option<&Utf8Path>,
    ) -> Result<AgentOptions, ConfigError> {
        let path = override_path
            .or_else(|| self.agent_options_file.as_deref().map(Utf8Path::new))
            .filter(|path| !path.as_str().trim().is_empty())
            .ok_or_else(|| {
                FieldMetadata::new(
                    "agent options file",
                    "SL_AGENT_OPTIONS_FILE",
                    "agent_options_file",
                )
                .missing()
            })?;
        load_agent_options(path)
    }
}

/// Reads agent options from a JSON file.
///
/// # Errors
///
/// Returns [`ConfigError::AgentOptions`] when the file cannot be read or
/// parsed and [`ConfigError::InvalidValue`] when it is incomplete.
pub fn load_agent_options(path: &Utf8Path) -> Result<AgentOptions, ConfigError> {
    let raw = fs_util::read_to_string(path).map_err(|message| ConfigError::AgentOptions {
        path: path.to_string(),
        message,
    })?;
    let options: AgentOptions =
        serde_json::from_str(&raw).map_err(|err| ConfigError::AgentOptions {
            path: path.to_string(),
            message: err.to_string(),
        })?;
    options
        .validate()
        .map_err(|err| ConfigError::InvalidValue(format!("{path}: {err}")))?;
    Ok(options)
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a field holds an unusable value.
    #[error("invalid configuration value: {0}")]
    InvalidValue(String),
    /// Raised when the agent options file cannot be read or parsed.
    #[error("failed to load agent options from {path}: {message}")]
    AgentOptions {
        /// File that was read.
        path: String,
        /// Underlying error message.
        message: String,
    },
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
