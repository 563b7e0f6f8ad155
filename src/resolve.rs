//! Maps the server's TLS flags onto certificate files and a [`TlsOptions`]
//! record, provisioning the certificate when it does not exist yet.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::TlsError;
use crate::process::{CommandRunner, SystemRunner};
use crate::provision::{IssueRequest, ProvisionPolicy, Provisioner};

/// Client cert value meaning "trust the server's own certificate".
pub const SELF_SIGNED_CA: &str = ".";

/// TLS flags as given by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    pub https: bool,
    /// Certificate path, or [`SELF_SIGNED_CA`].
    pub client_cert: Option<String>,
}

impl TlsConfig {
    fn client_cert(&self) -> Option<&str> {
        self.client_cert.as_deref().filter(|c| !c.is_empty())
    }
}

/// Defaults the resolver falls back on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    pub hostname: String,
    /// Directory of `<hostname>.pem` when no certificate path is configured.
    pub cert_dir: PathBuf,
    /// Name the client bundle is issued for in client-cert mode.
    pub client_name: String,
    /// Extensions that imply a sibling `.key` file.
    pub cert_extensions: Vec<String>,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            cert_dir: PathBuf::from("."),
            client_name: "term-local".to_string(),
            cert_extensions: vec!["crt".to_string(), "cer".to_string()],
        }
    }
}

/// Whether the listener asks connecting clients for a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientCertPolicy {
    None,
    Optional,
    Required,
}

/// Resolved TLS settings for a listening socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsOptions {
    cert_file: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ca_certs: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cert_reqs: Option<ClientCertPolicy>,
}

impl TlsOptions {
    /// Options serving `cert_file` without asking clients for certificates.
    pub fn new(cert_file: impl Into<PathBuf>, key_file: Option<PathBuf>) -> Self {
        Self {
            cert_file: cert_file.into(),
            key_file,
            ca_certs: None,
            cert_reqs: None,
        }
    }

    /// Trust `ca_certs` for client certificates under `policy`.
    pub fn with_client_ca(mut self, ca_certs: impl Into<PathBuf>, policy: ClientCertPolicy) -> Self {
        self.ca_certs = Some(ca_certs.into());
        self.cert_reqs = Some(policy);
        self
    }

    pub fn cert_file(&self) -> &Path {
        &self.cert_file
    }

    /// Separate key file. `None` means the key is inside the certificate file.
    pub fn key_file(&self) -> Option<&Path> {
        self.key_file.as_deref()
    }

    /// Certificates trusted to sign client certificates.
    pub fn ca_certs(&self) -> Option<&Path> {
        self.ca_certs.as_deref()
    }

    pub fn cert_reqs(&self) -> Option<ClientCertPolicy> {
        self.cert_reqs
    }

    pub fn requires_client_cert(&self) -> bool {
        self.cert_reqs == Some(ClientCertPolicy::Required)
    }
}

#[derive(Clone, Copy)]
enum ClientCertMode<'a> {
    Off,
    SelfSigned,
    File(&'a Path),
}

/// Decides which certificate to serve and makes sure it exists.
pub struct TlsResolver<R = SystemRunner> {
    provisioner: Provisioner<R>,
    settings: ResolverSettings,
}

impl TlsResolver<SystemRunner> {
    pub fn new(settings: ResolverSettings, policy: ProvisionPolicy) -> Self {
        Self::with_provisioner(Provisioner::new(policy), settings)
    }
}

impl<R: CommandRunner> TlsResolver<R> {
    pub fn with_provisioner(provisioner: Provisioner<R>, settings: ResolverSettings) -> Self {
        Self {
            provisioner,
            settings,
        }
    }

    pub fn provisioner(&self) -> &Provisioner<R> {
        &self.provisioner
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    /// Resolves `config` into TLS options, or `None` when TLS is off.
    ///
    /// A certificate is generated only when neither it nor its key file exist;
    /// otherwise only its fingerprint is read. Callers must not resolve the
    /// same certificate path concurrently.
    pub async fn resolve(&self, config: &TlsConfig) -> Result<Option<TlsOptions>, TlsError> {
        let mode = match config.client_cert() {
            None => ClientCertMode::Off,
            Some(SELF_SIGNED_CA) => ClientCertMode::SelfSigned,
            Some(path) => ClientCertMode::File(Path::new(path)),
        };
        if !config.https && matches!(mode, ClientCertMode::Off) {
            return Ok(None);
        }

        if let ClientCertMode::File(path) = mode {
            if !exists(path).await {
                return Err(TlsError::ClientCertNotFound(path.to_path_buf()));
            }
        }

        let (cert_file, key_file) = match mode {
            ClientCertMode::File(path) => (path.to_path_buf(), self.sibling_key(path)),
            _ => (
                self.settings
                    .cert_dir
                    .join(format!("{}.pem", self.settings.hostname)),
                None,
            ),
        };
        let working_dir = match cert_file.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        };

        let force_new = !exists(&cert_file).await
            && match &key_file {
                Some(key) => !exists(key).await,
                None => true,
            };
        tracing::info!(
            "{} SSL cert {}",
            if force_new { "Generating" } else { "Using" },
            cert_file.display()
        );

        let client_name = match mode {
            ClientCertMode::Off => "",
            _ => self.settings.client_name.as_str(),
        };
        let fingerprint = self
            .provisioner
            .issue_server_certificate(&IssueRequest {
                cert_file: &cert_file,
                key_file: key_file.as_deref(),
                hostname: &self.settings.hostname,
                working_dir: &working_dir,
                force_new,
                client_name,
            })
            .await;
        if fingerprint.is_empty() {
            return Err(TlsError::ProvisioningFailed(cert_file));
        }
        tracing::info!("{}", fingerprint);

        let options = TlsOptions::new(cert_file, key_file);
        Ok(Some(match mode {
            ClientCertMode::Off => options,
            ClientCertMode::SelfSigned => {
                let ca_certs = options.cert_file.clone();
                options.with_client_ca(ca_certs, ClientCertPolicy::Required)
            }
            ClientCertMode::File(path) => options.with_client_ca(path, ClientCertPolicy::Required),
        }))
    }

    fn sibling_key(&self, cert_file: &Path) -> Option<PathBuf> {
        let extension = cert_file.extension()?.to_str()?;
        self.settings
            .cert_extensions
            .iter()
            .any(|known| known.eq_ignore_ascii_case(extension))
            .then(|| cert_file.with_extension("key"))
    }
}

async fn exists(path: &Path) -> bool {
    match tokio::fs::try_exists(path).await {
        Ok(found) => found,
        Err(e) => {
            tracing::debug!("Cannot check {}: {}", path.display(), e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> TlsResolver {
        TlsResolver::new(ResolverSettings::default(), ProvisionPolicy::default())
    }

    #[test]
    fn sibling_key_for_known_extensions() {
        let resolver = resolver();
        assert_eq!(
            resolver.sibling_key(Path::new("/etc/tls/server.crt")),
            Some(PathBuf::from("/etc/tls/server.key"))
        );
        assert_eq!(
            resolver.sibling_key(Path::new("server.CER")),
            Some(PathBuf::from("server.key"))
        );
        assert_eq!(resolver.sibling_key(Path::new("/etc/tls/server.pem")), None);
        assert_eq!(resolver.sibling_key(Path::new("/etc/tls/server")), None);
    }

    #[tokio::test]
    async fn tls_off_is_a_no_op() {
        let resolver = resolver();
        assert_eq!(resolver.resolve(&TlsConfig::default()).await.unwrap(), None);

        let empty = TlsConfig {
            https: false,
            client_cert: Some(String::new()),
        };
        assert_eq!(resolver.resolve(&empty).await.unwrap(), None);
    }

    #[test]
    fn options_serialize_without_absent_fields() {
        let options = TlsOptions::new("localhost.pem", None)
            .with_client_ca("localhost.pem", ClientCertPolicy::Required);
        let json = serde_json::to_string(&options).unwrap();
        assert_eq!(
            json,
            r#"{"cert_file":"localhost.pem","ca_certs":"localhost.pem","cert_reqs":"required"}"#
        );
        assert!(options.requires_client_cert());
    }
}
