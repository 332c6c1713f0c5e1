//! Compute and ML runtime probes
//!
//! A runtime counts as loaded when it can be imported and reports a
//! version. Only the yes/no answer leaves the probe.

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::process::{Command, Stdio};
use std::sync::Arc;
use tracing::debug;

use super::{guarded, Probe, ProbeKind};
use crate::config::ProbeSettings;

/// Optional runtimes the data library integrates with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Runtime {
    /// PyTorch
    PyTorch,
    /// Ray
    Ray,
    /// Dask
    Dask,
    /// TensorFlow
    TensorFlow,
    /// TensorFlow Datasets
    Tfds,
    /// Hugging Face Transformers
    Transformers,
    /// Pathos multiprocessing
    Pathos,
}

impl Runtime {
    /// Every runtime, in report order
    pub const ALL: [Runtime; 7] = [
        Runtime::PyTorch,
        Runtime::Ray,
        Runtime::Dask,
        Runtime::TensorFlow,
        Runtime::Tfds,
        Runtime::Transformers,
        Runtime::Pathos,
    ];

    /// Probe name
    pub fn name(&self) -> &'static str {
        match self {
            Runtime::PyTorch => "pytorch",
            Runtime::Ray => "ray",
            Runtime::Dask => "dask",
            Runtime::TensorFlow => "tensorflow",
            Runtime::Tfds => "tfds",
            Runtime::Transformers => "transformers",
            Runtime::Pathos => "pathos",
        }
    }

    /// Module imported to load the runtime
    pub fn module(&self) -> &'static str {
        match self {
            Runtime::PyTorch => "torch",
            Runtime::Ray => "ray",
            Runtime::Dask => "dask",
            Runtime::TensorFlow => "tensorflow",
            Runtime::Tfds => "tensorflow_datasets",
            Runtime::Transformers => "transformers",
            Runtime::Pathos => "pathos",
        }
    }
}

/// Loads a runtime module and reads its version
#[cfg_attr(test, mockall::automock)]
pub trait VersionSource: Send + Sync {
    /// Version string of `module`, or an error if it cannot be loaded
    fn version(&self, module: &str) -> anyhow::Result<String>;
}

/// Reads versions by importing modules in a Python interpreter
#[derive(Debug, Clone)]
pub struct PythonInterpreter {
    program: String,
}

impl PythonInterpreter {
    /// Use `program` (a path or a name looked up on `PATH`)
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Interpreter from probe settings
    pub fn from_settings(settings: &ProbeSettings) -> Self {
        Self::new(settings.python.clone())
    }

    /// Interpreter program
    pub fn program(&self) -> &str {
        &self.program
    }
}

fn is_module_path(module: &str) -> bool {
    !module.is_empty()
        && module.split('.').all(|part| {
            part.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

impl VersionSource for PythonInterpreter {
    fn version(&self, module: &str) -> anyhow::Result<String> {
        if !is_module_path(module) {
            bail!("'{}' is not a module path", module);
        }

        let output = Command::new(&self.program)
            .arg("-c")
            .arg(format!("import {module}; print({module}.__version__)"))
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("failed to run {}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let last_line = stderr.lines().last().unwrap_or("").trim();
            bail!("import {} failed: {}", module, last_line);
        }

        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if version.is_empty() {
            bail!("{} reported no version", module);
        }
        Ok(version)
    }
}

/// Probe for one runtime
pub struct RuntimeProbe {
    runtime: Runtime,
    source: Arc<dyn VersionSource>,
}

impl RuntimeProbe {
    /// Probe `runtime` through `source`
    pub fn new(runtime: Runtime, source: Arc<dyn VersionSource>) -> Self {
        Self { runtime, source }
    }

    /// Runtime this probe checks
    pub fn runtime(&self) -> Runtime {
        self.runtime
    }
}

impl Probe for RuntimeProbe {
    fn name(&self) -> &str {
        self.runtime.name()
    }

    fn kind(&self) -> ProbeKind {
        ProbeKind::Runtime
    }

    fn is_available(&self) -> bool {
        guarded(self.name(), || {
            let version = self.source.version(self.runtime.module())?;
            debug!(runtime = self.name(), version = %version, "Runtime loaded");
            Ok(())
        })
    }
}

fn runtime_loaded(runtime: Runtime) -> bool {
    let source = PythonInterpreter::from_settings(&ProbeSettings::default());
    RuntimeProbe::new(runtime, Arc::new(source)).is_available()
}

/// Whether PyTorch can be loaded
pub fn pytorch_loaded() -> bool {
    runtime_loaded(Runtime::PyTorch)
}

/// Whether Ray can be loaded
pub fn ray_loaded() -> bool {
    runtime_loaded(Runtime::Ray)
}

/// Whether Dask can be loaded
pub fn dask_loaded() -> bool {
    runtime_loaded(Runtime::Dask)
}

/// Whether TensorFlow can be loaded
pub fn tensorflow_loaded() -> bool {
    runtime_loaded(Runtime::TensorFlow)
}

/// Whether TensorFlow Datasets can be loaded
pub fn tfds_loaded() -> bool {
    runtime_loaded(Runtime::Tfds)
}

/// Whether Transformers can be loaded
pub fn transformers_loaded() -> bool {
    runtime_loaded(Runtime::Transformers)
}

/// Whether Pathos can be loaded
pub fn pathos_loaded() -> bool {
    runtime_loaded(Runtime::Pathos)
}
