//! Private key loading utilities

use std::{fs, path::Path};
use anyhow::{Context, Result};
use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};

/// Load private key from a file
///
/// PEM files may also hold certificates; the first key found is used.
pub fn load_key(key_path: &Path) -> Result<PrivateKeyDer<'static>> {
    let key = fs::read(key_path)
        .with_context(|| format!("failed to read private key {}", key_path.display()))?;
    let key = if key_path.extension().map_or(false, |x| x == "der") {
        PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key))
    } else {
        rustls_pemfile::private_key(&mut &*key)
            .context("malformed PEM private key")?
            .ok_or_else(|| anyhow::anyhow!("no private keys found in {}", key_path.display()))?
    };
    Ok(key)
}
