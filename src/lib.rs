//! Provisioning of self-signed TLS identity material for a server process.
//!
//! [`TlsResolver`] decides which certificate a listener should serve, asks the
//! [`Provisioner`] to create it through the external certificate tool when it
//! does not exist yet, and returns the resulting [`TlsOptions`].
//! [`tls::server_config`] turns those options into a rustls configuration.

pub mod error;
pub mod process;
pub mod provision;
pub mod resolve;
pub mod tls;

pub use error::TlsError;
pub use process::{CommandRunner, ProcessOutput, SystemRunner};
pub use provision::{IssueRequest, ProvisionPolicy, Provisioner};
pub use resolve::{ClientCertPolicy, ResolverSettings, TlsConfig, TlsOptions, TlsResolver};
