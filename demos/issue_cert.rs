//! This example issues (or re-reads) a self-signed server certificate and,
//! optionally, a client bundle signed by it.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tlsprep::{IssueRequest, ProvisionPolicy, Provisioner};

use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

/// Command line arguments for the certificate issuer.
#[derive(Parser, Debug)]
struct Args {
    /// Path of the certificate file.
    #[arg(short = 'c', long = "cert", help = "Path of the certificate file.", required = true)]
    cert_path: PathBuf,

    /// Path of a separate private key file.
    #[arg(short = 'k', long = "key", help = "Path of a separate private key file.")]
    key_path: Option<PathBuf>,

    /// Host name written into the certificate.
    #[arg(short = 'n', long = "hostname", help = "Host name written into the certificate.", default_value = "localhost")]
    hostname: String,

    /// Issue a client bundle for this name.
    #[arg(long = "client", help = "Issue a client bundle for this name.", default_value = "")]
    client_name: String,

    /// Generate new key material even if the files exist.
    #[arg(long = "new", help = "Generate new key material even if the files exist.")]
    force_new: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    let args = Args::parse();

    let working_dir = match args.cert_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => std::env::current_dir()?,
    };
    let provisioner = Provisioner::new(ProvisionPolicy::default());
    let fingerprint = provisioner
        .issue_server_certificate(&IssueRequest {
            cert_file: &args.cert_path,
            key_file: args.key_path.as_deref(),
            hostname: &args.hostname,
            working_dir: &working_dir,
            force_new: args.force_new,
            client_name: &args.client_name,
        })
        .await;

    if fingerprint.is_empty() {
        error!("No fingerprint for {}", args.cert_path.display());
        return Err(anyhow::Error::msg("Failed to issue certificate"));
    }
    println!("{}", fingerprint);
    Ok(())
}
