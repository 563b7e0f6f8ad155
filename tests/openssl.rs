//! Provisioning against a real `openssl` binary. Skipped when none is installed.

use std::path::Path;
use std::time::Duration;

use tempfile::TempDir;
use tlsprep::{process, tls, ProvisionPolicy, ResolverSettings, TlsConfig, TlsResolver};

async fn openssl_available() -> bool {
    let out = process::run(&["openssl", "version"], None, Some(Duration::from_secs(5))).await;
    !out.has_error() && out.stdout.contains("SSL")
}

fn resolver(cert_dir: &Path) -> TlsResolver {
    let settings = ResolverSettings {
        cert_dir: cert_dir.to_path_buf(),
        ..ResolverSettings::default()
    };
    // ring only loads RSA keys of at least 2048 bits.
    let policy = ProvisionPolicy {
        key_size: 2048,
        ..ProvisionPolicy::default()
    };
    TlsResolver::new(settings, policy)
}

#[tokio::test]
async fn self_ca_bundle_end_to_end() {
    if !openssl_available().await {
        eprintln!("openssl not found, skipping");
        return;
    }
    let dir = TempDir::new().unwrap();
    let resolver = resolver(dir.path());
    let config = TlsConfig {
        https: true,
        client_cert: Some(".".to_string()),
    };

    let options = resolver.resolve(&config).await.unwrap().unwrap();

    assert_eq!(options.cert_file(), dir.path().join("localhost.pem"));
    for name in [
        "localhost-term-local.key",
        "localhost-term-local.csr",
        "localhost-term-local.crt",
        "localhost-term-local.p12",
    ] {
        assert!(dir.path().join(name).exists(), "{} missing", name);
    }
    assert!(tls::server_config(&options).is_ok());

    // A second start reuses the material and reports the same options.
    let again = resolver.resolve(&config).await.unwrap().unwrap();
    assert_eq!(options, again);
}

#[tokio::test]
async fn fingerprint_reflects_certificate() {
    if !openssl_available().await {
        eprintln!("openssl not found, skipping");
        return;
    }
    let dir = TempDir::new().unwrap();
    let resolver = resolver(dir.path());
    let cert_file = dir.path().join("localhost.pem");
    let request = tlsprep::IssueRequest {
        cert_file: &cert_file,
        key_file: None,
        hostname: "localhost",
        working_dir: dir.path(),
        force_new: true,
        client_name: "",
    };

    let created = resolver.provisioner().issue_server_certificate(&request).await;
    let reread = resolver
        .provisioner()
        .issue_server_certificate(&tlsprep::IssueRequest {
            force_new: false,
            ..request
        })
        .await;

    assert!(created.contains("Fingerprint="), "{}", created);
    assert_eq!(created, reread);
}
