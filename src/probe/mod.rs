//! Capability probes
//!
//! A probe answers one question: is an optional backend usable from this
//! process right now? Probes never fail; every error and panic raised while
//! checking is folded into `false`. They may touch the filesystem, spawn
//! processes or wait on the network, so callers should not assume they are
//! free.

pub mod runtime;
pub mod storage;

pub use runtime::{PythonInterpreter, Runtime, RuntimeProbe, VersionSource};
pub use storage::{
    AwsCredentialChain, CredentialProbe, CredentialVerifier, GcloudDefaultCredentials,
    StorageBackend, StsCallerIdentity,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::debug;

use crate::config::ProbeSettings;
use crate::scope::panic_message;

/// Read access to environment variables
pub trait Environment: Send + Sync {
    /// Value of `key`, if set
    fn var(&self, key: &str) -> Option<String>;

    /// Home directory of the current user
    fn home_dir(&self) -> Option<PathBuf> {
        self.var("HOME")
            .or_else(|| self.var("USERPROFILE"))
            .map(PathBuf::from)
    }

    /// Per-user configuration directory (`%APPDATA%` on Windows)
    fn config_dir(&self) -> Option<PathBuf> {
        match self.var("APPDATA") {
            Some(dir) if cfg!(windows) => Some(PathBuf::from(dir)),
            _ => self.home_dir().map(|home| home.join(".config")),
        }
    }
}

/// The real process environment
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var_os(key).map(|value| value.to_string_lossy().into_owned())
    }

    fn home_dir(&self) -> Option<PathBuf> {
        dirs::home_dir()
    }

    fn config_dir(&self) -> Option<PathBuf> {
        dirs::config_dir()
    }
}

/// In-memory environment
#[derive(Debug, Default, Clone)]
pub struct MapEnv {
    vars: HashMap<String, String>,
}

impl MapEnv {
    /// Empty environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapEnv {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl Environment for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

/// What a probe checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    /// Object storage or hosted backend credentials
    Storage,
    /// Compute or ML runtime
    Runtime,
}

/// A capability probe
pub trait Probe: Send + Sync {
    /// Short stable name, e.g. `"s3"` or `"pytorch"`
    fn name(&self) -> &str;

    /// What the probe checks
    fn kind(&self) -> ProbeKind;

    /// Whether the backend is usable right now
    fn is_available(&self) -> bool;
}

/// Run a fallible check, mapping errors and panics to `false`
pub(crate) fn guarded<F>(probe: &str, check: F) -> bool
where
    F: FnOnce() -> anyhow::Result<()>,
{
    match panic::catch_unwind(AssertUnwindSafe(check)) {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            debug!(probe, "Probe unavailable: {:#}", err);
            false
        }
        Err(payload) => {
            debug!(probe, "Probe panicked: {}", panic_message(payload.as_ref()));
            false
        }
    }
}

/// Outcome of a single probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Probe name
    pub name: String,
    /// What the probe checks
    pub kind: ProbeKind,
    /// Whether the backend was usable
    pub available: bool,
}

/// Outcomes of a set of probes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeReport {
    /// When the probes ran
    pub taken_at: DateTime<Utc>,
    /// Results in probe order
    pub results: Vec<ProbeResult>,
}

impl ProbeReport {
    /// Run every probe in order
    pub fn collect(probes: &[Box<dyn Probe>]) -> Self {
        let results = probes
            .iter()
            .map(|probe| {
                let available = probe.is_available();
                debug!(probe = probe.name(), available, "Probe finished");
                ProbeResult {
                    name: probe.name().to_string(),
                    kind: probe.kind(),
                    available,
                }
            })
            .collect();

        Self::from_results(results)
    }

    /// Build a report from results gathered elsewhere
    pub fn from_results(results: Vec<ProbeResult>) -> Self {
        Self {
            taken_at: Utc::now(),
            results,
        }
    }

    /// Availability of a probe by name
    pub fn get(&self, name: &str) -> Option<bool> {
        self.results
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.available)
    }

    /// Names of available backends
    pub fn available(&self) -> impl Iterator<Item = &str> {
        self.results
            .iter()
            .filter(|r| r.available)
            .map(|r| r.name.as_str())
    }
}

/// Every probe against the process environment and the configured
/// interpreter, minus disabled ones
pub fn default_probes(settings: &ProbeSettings) -> Vec<Box<dyn Probe>> {
    default_probes_with(
        settings,
        Arc::new(ProcessEnv),
        Arc::new(PythonInterpreter::new(settings.python.clone())),
    )
}

/// Every probe against the given environment and version source, minus
/// disabled ones
pub fn default_probes_with(
    settings: &ProbeSettings,
    env: Arc<dyn Environment>,
    source: Arc<dyn VersionSource>,
) -> Vec<Box<dyn Probe>> {
    let storage = StorageBackend::ALL
        .iter()
        .map(|&backend| Box::new(CredentialProbe::new(backend, env.clone(), settings)) as Box<dyn Probe>);

    let runtimes = Runtime::ALL
        .iter()
        .map(|&runtime| Box::new(RuntimeProbe::new(runtime, source.clone())) as Box<dyn Probe>);

    storage
        .chain(runtimes)
        .filter(|probe| !settings.is_disabled(probe.name()))
        .collect()
}
