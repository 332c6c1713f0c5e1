//! Configuration structures for the hub utilities
//!
//! Settings are layered: built-in defaults, then an optional file (JSON,
//! YAML or TOML, picked by extension), then `HUB_`-prefixed environment
//! variables using `__` between section and key, e.g.
//! `HUB_PROBES__PYTHON=python3.11`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "HUB";

/// Top-level settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Capability probe settings
    pub probes: ProbeSettings,
    /// Batching defaults
    pub batch: BatchSettings,
}

impl Settings {
    /// Load settings from defaults, an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder()
            .add_source(::config::Config::try_from(&Settings::default())?);

        if let Some(path) = path {
            if !path.exists() {
                return Err(Error::config(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(::config::File::from(path).required(true));
        }

        let settings: Settings = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("probes.disabled"),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate settings
    pub fn validate(&self) -> Result<()> {
        if self.batch.default_size == 0 {
            return Err(Error::config("Default batch size must be > 0"));
        }

        if self.probes.timeout_secs == 0 {
            return Err(Error::config("Probe timeout must be > 0 seconds"));
        }

        if self.probes.python.trim().is_empty() {
            return Err(Error::config("Python interpreter must not be empty"));
        }

        Ok(())
    }
}

/// Capability probe settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    /// Variable holding the path to GCS service account credentials
    pub gcs_credentials_var: String,
    /// Variable holding the Azure storage account key
    pub azure_key_var: String,
    /// Variable holding the hub backend password
    pub hub_password_var: String,
    /// Interpreter used to load Python runtimes
    pub python: String,
    /// Per-probe timeout used by the CLI
    pub timeout_secs: u64,
    /// Probes skipped when building the default registry
    pub disabled: Vec<String>,
}

impl ProbeSettings {
    /// Per-probe timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Whether a probe has been disabled by name
    pub fn is_disabled(&self, name: &str) -> bool {
        self.disabled.iter().any(|d| d.eq_ignore_ascii_case(name))
    }
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            gcs_credentials_var: "GOOGLE_APPLICATION_CREDENTIALS".to_string(),
            azure_key_var: "ACCOUNT_KEY".to_string(),
            hub_password_var: "ACTIVELOOP_HUB_PASSWORD".to_string(),
            python: "python3".to_string(),
            timeout_secs: 30,
            disabled: Vec::new(),
        }
    }
}

/// Batching defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Batch size used when none is given
    pub default_size: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self { default_size: 1 }
    }
}
