//! Storage credential probes
//!
//! An explicit credential variable short-circuits the check: its presence
//! alone counts as available and nothing is validated. Without it, the
//! probe falls back to a [`CredentialVerifier`], if the backend has one.
//! S3 has no such variable and always authenticates through STS.

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::fs;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{guarded, Environment, Probe, ProbeKind, ProcessEnv};
use crate::config::ProbeSettings;

/// Storage backends with a credential probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Google Cloud Storage
    Gcs,
    /// Amazon S3
    S3,
    /// Azure Blob Storage
    Azure,
    /// Hosted hub backend
    Hub,
}

impl StorageBackend {
    /// Every backend, in report order
    pub const ALL: [StorageBackend; 4] = [
        StorageBackend::Gcs,
        StorageBackend::S3,
        StorageBackend::Azure,
        StorageBackend::Hub,
    ];

    /// Probe name
    pub fn name(&self) -> &'static str {
        match self {
            StorageBackend::Gcs => "gcs",
            StorageBackend::S3 => "s3",
            StorageBackend::Azure => "azure",
            StorageBackend::Hub => "hub",
        }
    }

    /// Variable whose presence proves credentials, if the backend has one
    pub fn credential_var<'a>(&self, settings: &'a ProbeSettings) -> Option<&'a str> {
        match self {
            StorageBackend::Gcs => Some(&settings.gcs_credentials_var),
            StorageBackend::S3 => None,
            StorageBackend::Azure => Some(&settings.azure_key_var),
            StorageBackend::Hub => Some(&settings.hub_password_var),
        }
    }
}

/// Checks credentials when no explicit credential variable is set.
///
/// Implementations may call out to the network; any error means the
/// backend is unavailable.
#[cfg_attr(test, mockall::automock)]
pub trait CredentialVerifier: Send + Sync {
    /// Succeed only when usable credentials were found
    fn verify(&self) -> anyhow::Result<()>;
}

/// gcloud application-default credentials on disk
pub struct GcloudDefaultCredentials {
    env: Arc<dyn Environment>,
}

impl GcloudDefaultCredentials {
    /// Resolve paths through `env`
    pub fn new(env: Arc<dyn Environment>) -> Self {
        Self { env }
    }

    /// Location of the application-default credentials file
    pub fn credentials_path(&self) -> Option<PathBuf> {
        let config_dir = match self.env.var("CLOUDSDK_CONFIG") {
            Some(dir) => PathBuf::from(dir),
            None if cfg!(windows) => self.env.config_dir()?.join("gcloud"),
            None => self.env.home_dir()?.join(".config").join("gcloud"),
        };
        Some(config_dir.join("application_default_credentials.json"))
    }
}

impl CredentialVerifier for GcloudDefaultCredentials {
    fn verify(&self) -> anyhow::Result<()> {
        let path = self
            .credentials_path()
            .context("cannot locate gcloud configuration directory")?;
        let content = fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let creds: serde_json::Value = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;

        match creds.get("type").and_then(|t| t.as_str()) {
            Some(kind) if !kind.is_empty() => {
                debug!(kind, "Found gcloud application-default credentials");
                Ok(())
            }
            _ => bail!("{} has no credential type", path.display()),
        }
    }
}

/// Live AWS identity check: resolves the SDK's default credential chain
/// (environment, shared files, SSO, web identity, container and instance
/// metadata) and calls STS `GetCallerIdentity`.
#[derive(Debug, Clone)]
pub struct StsCallerIdentity {
    timeout: Duration,
}

impl StsCallerIdentity {
    /// Give up on the identity call after `timeout`
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn caller_identity(&self) -> anyhow::Result<()> {
        let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = aws_sdk_sts::Client::new(&sdk_config);

        let identity = client
            .get_caller_identity()
            .send()
            .await
            .context("GetCallerIdentity failed")?;

        debug!(
            account = identity.account().unwrap_or("unknown"),
            arn = identity.arn().unwrap_or("unknown"),
            "Authenticated with STS"
        );
        Ok(())
    }
}

impl CredentialVerifier for StsCallerIdentity {
    fn verify(&self) -> anyhow::Result<()> {
        // credential resolution itself may wait on instance metadata
        block_on(tokio::time::timeout(self.timeout, self.caller_identity()))?
            .with_context(|| format!("STS identity check timed out after {:?}", self.timeout))?
    }
}

/// Drive `future` to completion from synchronous code, reusing the ambient
/// tokio runtime when called from one of its blocking threads
fn block_on<F: Future>(future: F) -> anyhow::Result<F::Output> {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => Ok(handle.block_on(future)),
        Err(_) => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("failed to start runtime for credential check")?;
            Ok(runtime.block_on(future))
        }
    }
}

/// Offline AWS check: static keys in the environment or an access key for
/// the selected profile in the shared credentials file. Nothing is
/// authenticated.
pub struct AwsCredentialChain {
    env: Arc<dyn Environment>,
}

impl AwsCredentialChain {
    /// Resolve variables and paths through `env`
    pub fn new(env: Arc<dyn Environment>) -> Self {
        Self { env }
    }

    /// Profile selected by `AWS_PROFILE`, else `default`
    pub fn profile(&self) -> String {
        self.env
            .var("AWS_PROFILE")
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| "default".to_string())
    }

    /// Location of the shared credentials file
    pub fn credentials_path(&self) -> Option<PathBuf> {
        match self.env.var("AWS_SHARED_CREDENTIALS_FILE") {
            Some(path) => Some(PathBuf::from(path)),
            None => Some(self.env.home_dir()?.join(".aws").join("credentials")),
        }
    }

    fn non_empty(&self, key: &str) -> bool {
        self.env.var(key).is_some_and(|v| !v.is_empty())
    }
}

impl CredentialVerifier for AwsCredentialChain {
    fn verify(&self) -> anyhow::Result<()> {
        if self.non_empty("AWS_ACCESS_KEY_ID") && self.non_empty("AWS_SECRET_ACCESS_KEY") {
            debug!("Found AWS credentials in the environment");
            return Ok(());
        }

        let path = self
            .credentials_path()
            .context("cannot locate AWS shared credentials file")?;
        let content = fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let profile = self.profile();

        if profile_has_access_key(&content, &profile) {
            debug!(profile = %profile, "Found AWS shared credentials");
            Ok(())
        } else {
            bail!("profile '{}' has no access key in {}", profile, path.display())
        }
    }
}

/// Whether an INI-style credentials file gives `profile` an access key.
/// Profile names are matched case-sensitively.
fn profile_has_access_key(content: &str, profile: &str) -> bool {
    let mut in_profile = false;

    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            in_profile = section.trim() == profile;
            continue;
        }

        if !in_profile {
            continue;
        }

        if let Some((key, value)) = line.split_once('=') {
            if key.trim() == "aws_access_key_id" && !value.trim().is_empty() {
                return true;
            }
        }
    }

    false
}

/// Probe for one storage backend
pub struct CredentialProbe {
    backend: StorageBackend,
    env: Arc<dyn Environment>,
    credential_var: Option<String>,
    verifier: Option<Arc<dyn CredentialVerifier>>,
}

impl CredentialProbe {
    /// Probe with the backend's default verifier
    pub fn new(backend: StorageBackend, env: Arc<dyn Environment>, settings: &ProbeSettings) -> Self {
        let verifier: Option<Arc<dyn CredentialVerifier>> = match backend {
            StorageBackend::Gcs => Some(Arc::new(GcloudDefaultCredentials::new(env.clone()))),
            StorageBackend::S3 => Some(Arc::new(StsCallerIdentity::new(settings.timeout()))),
            StorageBackend::Azure | StorageBackend::Hub => None,
        };

        Self {
            backend,
            credential_var: backend.credential_var(settings).map(str::to_string),
            env,
            verifier,
        }
    }

    /// Replace the fallback verifier, e.g. with a live identity check
    pub fn with_verifier(mut self, verifier: Arc<dyn CredentialVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Drop the fallback verifier
    pub fn without_verifier(mut self) -> Self {
        self.verifier = None;
        self
    }

    /// Backend this probe checks
    pub fn backend(&self) -> StorageBackend {
        self.backend
    }
}

impl Probe for CredentialProbe {
    fn name(&self) -> &str {
        self.backend.name()
    }

    fn kind(&self) -> ProbeKind {
        ProbeKind::Storage
    }

    fn is_available(&self) -> bool {
        if let Some(var) = &self.credential_var {
            if self.env.var(var).is_some() {
                debug!(probe = self.name(), var = %var, "Credential variable present");
                return true;
            }
        }

        match &self.verifier {
            Some(verifier) => guarded(self.name(), || verifier.verify()),
            None => false,
        }
    }
}

fn probe_process_env(backend: StorageBackend) -> bool {
    CredentialProbe::new(backend, Arc::new(ProcessEnv), &ProbeSettings::default()).is_available()
}

/// Whether Google Cloud Storage credentials are available
pub fn gcp_creds_exist() -> bool {
    probe_process_env(StorageBackend::Gcs)
}

/// Whether AWS credentials authenticate with STS
pub fn s3_creds_exist() -> bool {
    probe_process_env(StorageBackend::S3)
}

/// Whether an Azure account key is set
pub fn azure_creds_exist() -> bool {
    probe_process_env(StorageBackend::Azure)
}

/// Whether a hub backend password is set
pub fn hub_creds_exist() -> bool {
    probe_process_env(StorageBackend::Hub)
}
