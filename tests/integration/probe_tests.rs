//! Probe registry tests against injected environments

use super::init_test_logging;
use hub_utils::probe::{
    default_probes_with, CredentialProbe, CredentialVerifier, ProbeKind, ProbeReport, Runtime,
    RuntimeProbe, StorageBackend, VersionSource,
};
use hub_utils::{MapEnv, Probe, ProbeSettings};
use std::collections::HashSet;
use std::sync::Arc;

/// Version source that knows a fixed set of modules
struct Installed(HashSet<&'static str>);

impl VersionSource for Installed {
    fn version(&self, module: &str) -> anyhow::Result<String> {
        if self.0.contains(module) {
            Ok("1.0.0".to_string())
        } else {
            anyhow::bail!("No module named '{}'", module)
        }
    }
}

/// Verifier standing in for a network identity call that errors out
struct Unreachable;

impl CredentialVerifier for Unreachable {
    fn verify(&self) -> anyhow::Result<()> {
        anyhow::bail!("could not connect to endpoint")
    }
}

fn empty_home() -> (tempfile::TempDir, MapEnv) {
    let home = tempfile::tempdir().unwrap();
    let env = MapEnv::new().with("HOME", home.path().to_string_lossy());
    (home, env)
}

#[test]
fn test_full_registry_report() {
    init_test_logging();
    let (_home, env) = empty_home();
    let env = env.with("ACCOUNT_KEY", "key");

    // s3 authenticates against STS over the network
    let mut settings = ProbeSettings::default();
    settings.disabled = vec!["s3".to_string()];

    let source = Installed(["torch", "dask"].into_iter().collect());
    let probes = default_probes_with(&settings, Arc::new(env), Arc::new(source));
    let report = ProbeReport::collect(&probes);

    assert_eq!(report.results.len(), 10);
    assert_eq!(report.get("azure"), Some(true));
    assert_eq!(report.get("hub"), Some(false));
    assert_eq!(report.get("gcs"), Some(false));
    assert_eq!(report.get("s3"), None);
    assert_eq!(report.get("pytorch"), Some(true));
    assert_eq!(report.get("dask"), Some(true));
    assert_eq!(report.get("tensorflow"), Some(false));

    let available: Vec<&str> = report.available().collect();
    assert_eq!(available, vec!["azure", "pytorch", "dask"]);
}

#[test]
fn test_probes_never_fail() {
    init_test_logging();
    let (_home, env) = empty_home();
    let env = Arc::new(env);

    let s3 = CredentialProbe::new(StorageBackend::S3, env.clone(), &ProbeSettings::default())
        .with_verifier(Arc::new(Unreachable));
    assert!(!s3.is_available());

    let gcs = CredentialProbe::new(StorageBackend::Gcs, env, &ProbeSettings::default())
        .without_verifier();
    assert!(!gcs.is_available());

    for runtime in Runtime::ALL {
        let probe = RuntimeProbe::new(runtime, Arc::new(Installed(HashSet::new())));
        assert!(!probe.is_available());
        assert_eq!(probe.kind(), ProbeKind::Runtime);
    }
}

#[test]
fn test_report_serializes_to_json() {
    let (_home, env) = empty_home();
    let env = env.with("ACTIVELOOP_HUB_PASSWORD", "pw");

    let mut settings = ProbeSettings::default();
    settings.disabled = Runtime::ALL.iter().map(|r| r.name().to_string()).collect();
    settings.disabled.push("s3".to_string());

    let probes = default_probes_with(&settings, Arc::new(env), Arc::new(Installed(HashSet::new())));
    let report = ProbeReport::collect(&probes);
    let json = serde_json::to_value(&report).unwrap();

    let results = json["results"].as_array().unwrap();
    assert_eq!(results.len(), StorageBackend::ALL.len() - 1);
    assert_eq!(results[2]["name"], "hub");
    assert_eq!(results[2]["available"], true);
    assert!(json["taken_at"].is_string());
}
