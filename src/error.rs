//! Errors that end TLS options resolution.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal resolution failures. There is no degraded mode for either of them.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("Client cert file {} not found", .0.display())]
    ClientCertNotFound(PathBuf),

    #[error("Failed to generate server SSL certificate {}", .0.display())]
    ProvisioningFailed(PathBuf),
}

impl TlsError {
    /// Prints the diagnostic to stderr and terminates the process with
    /// status 1.
    pub fn exit(&self) -> ! {
        eprintln!("tlsprep: {}", self);
        std::process::exit(1)
    }
}
