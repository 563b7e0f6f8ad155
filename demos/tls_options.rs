//! This example resolves the TLS options a server would listen with,
//! generating a self-signed certificate on first use.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tlsprep::{tls, ProvisionPolicy, ResolverSettings, TlsConfig, TlsResolver};

use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Command line arguments for resolving TLS options.
#[derive(Parser, Debug)]
struct Args {
    /// Serve HTTPS with a self-signed certificate.
    #[arg(long = "https", help = "Serve HTTPS with a self-signed certificate.")]
    https: bool,

    /// Require client certificates signed by this file, or "." for the server certificate.
    #[arg(long = "client-cert", help = "Require client certificates signed by this file, or \".\" for the server certificate.")]
    client_cert: Option<String>,

    /// Directory holding the generated certificate.
    #[arg(short = 'd', long = "cert-dir", help = "Directory holding the generated certificate.", default_value = ".")]
    cert_dir: PathBuf,

    /// Host name written into the certificate.
    #[arg(short = 'n', long = "hostname", help = "Host name written into the certificate.", default_value = "localhost")]
    hostname: String,

    /// RSA key size in bits.
    #[arg(long = "key-size", help = "RSA key size in bits.", default_value_t = 1024)]
    key_size: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    let args = Args::parse();

    let settings = ResolverSettings {
        hostname: args.hostname,
        cert_dir: args.cert_dir,
        ..ResolverSettings::default()
    };
    let policy = ProvisionPolicy {
        key_size: args.key_size,
        ..ProvisionPolicy::default()
    };
    let resolver = TlsResolver::new(settings, policy);
    let config = TlsConfig {
        https: args.https,
        client_cert: args.client_cert,
    };

    let options = match resolver.resolve(&config).await {
        Ok(Some(options)) => options,
        Ok(None) => {
            info!("TLS disabled");
            return Ok(());
        }
        Err(e) => e.exit(),
    };

    info!("Resolved TLS options: {:?}", options);
    match tls::server_config(&options) {
        Ok(_) => info!("rustls server config ready"),
        Err(e) => error!("rustls cannot load this certificate: {:#}", e),
    }
    Ok(())
}
