//! Certificate loading utilities

use std::{fs, path::Path};
use anyhow::{bail, Context, Result};
use rustls::pki_types::CertificateDer;
use rustls::RootCertStore;

/// Load certificate chain from a file
///
/// Files ending in `.der` are read as a single DER certificate, anything else
/// as PEM. Private keys stored in the same PEM file are skipped.
pub fn load_certs(cert_path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let cert_chain = fs::read(cert_path)
        .with_context(|| format!("failed to read certificate chain {}", cert_path.display()))?;
    let cert_chain = if cert_path.extension().map_or(false, |x| x == "der") {
        vec![CertificateDer::from(cert_chain)]
    } else {
        rustls_pemfile::certs(&mut &*cert_chain)
            .collect::<Result<Vec<_>, _>>()
            .context("invalid PEM-encoded certificate")?
    };
    if cert_chain.is_empty() {
        bail!("no certificates found in {}", cert_path.display());
    }
    Ok(cert_chain)
}

/// Load the certificates trusted to sign client certificates.
pub fn load_root_store(ca_path: &Path) -> Result<RootCertStore> {
    let mut roots = RootCertStore::empty();
    for cert in load_certs(ca_path)? {
        roots
            .add(cert)
            .with_context(|| format!("unusable CA certificate in {}", ca_path.display()))?;
    }
    Ok(roots)
}
