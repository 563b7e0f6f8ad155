//! TLS module for turning resolved options into a rustls server configuration.

pub mod certificate;
pub mod key;

use std::sync::Arc;
use anyhow::{Context, Result};
use rustls::server::WebPkiClientVerifier;
use rustls::ServerConfig;

use crate::resolve::{ClientCertPolicy, TlsOptions};

/// Build a rustls server configuration from resolved options.
///
/// The key is read from `key_file`, or from `cert_file` when the options carry
/// no separate key. A CA bundle with a `Required` or `Optional` policy installs
/// a client certificate verifier.
///
/// Note that the ring provider rejects RSA keys shorter than 2048 bits.
pub fn server_config(options: &TlsOptions) -> Result<ServerConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let cert_chain = certificate::load_certs(options.cert_file())?;
    let key = key::load_key(options.key_file().unwrap_or(options.cert_file()))?;

    let builder = ServerConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .context("no usable TLS protocol versions")?;
    let builder = match (options.ca_certs(), options.cert_reqs()) {
        (Some(ca_path), Some(policy @ (ClientCertPolicy::Required | ClientCertPolicy::Optional))) => {
            let roots = certificate::load_root_store(ca_path)?;
            let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider);
            let verifier = if policy == ClientCertPolicy::Optional {
                verifier.allow_unauthenticated()
            } else {
                verifier
            };
            let verifier = verifier.build().context("failed to build client certificate verifier")?;
            tracing::debug!("Client certificates {:?} against {}", policy, ca_path.display());
            builder.with_client_cert_verifier(verifier)
        }
        _ => builder.with_no_client_auth(),
    };

    builder
        .with_single_cert(cert_chain, key)
        .context("certificate does not match private key")
}
