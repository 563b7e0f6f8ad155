//! Resolution of a bare certificate file name. Kept in its own test binary
//! because it changes the process's current directory.

mod common;

use std::fs;

use common::RecordingRunner;
use tempfile::TempDir;
use tlsprep::{ProvisionPolicy, Provisioner, ResolverSettings, TlsConfig, TlsResolver};

#[tokio::test]
async fn bare_cert_name_runs_in_current_dir() {
    let previous = std::env::current_dir().unwrap();
    let dir = TempDir::new().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();
    fs::write("server.crt", "cert").unwrap();

    let resolver = TlsResolver::with_provisioner(
        Provisioner::with_runner(RecordingRunner::fingerprinting(), ProvisionPolicy::default()),
        ResolverSettings::default(),
    );
    let config = TlsConfig {
        https: false,
        client_cert: Some("server.crt".to_string()),
    };
    let result = resolver.resolve(&config).await;
    let cwd = std::env::current_dir().unwrap();
    std::env::set_current_dir(previous).unwrap();

    let options = result.unwrap().unwrap();
    assert_eq!(options.cert_file(), std::path::Path::new("server.crt"));
    let calls = resolver.provisioner().runner().calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].working_dir.as_deref(), Some(cwd.as_path()));
    assert!(calls[0].has_arg(cwd.join("server.crt").to_str().unwrap()));
}
