//! Self-signed server certificate and client bundle provisioning.
//!
//! Every step is an explicit argument vector for the external certificate
//! tool. Steps run one after another through a [`CommandRunner`]; a failing
//! step is logged and the sequence moves on. The fingerprint printed by the
//! final inspection of the server certificate is the only success signal.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::process::{CommandRunner, ProcessOutput, SystemRunner};

/// Executable used when the policy does not name another one.
pub const DEFAULT_TOOL: &str = "openssl";

/// How the server key and certificate are produced on a fresh issuance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerIssuance {
    /// One `req -x509 -newkey` call writes key and certificate together.
    #[default]
    Combined,
    /// `genrsa`, then a CSR, then a self-signed `x509 -req`. Needs a key file
    /// distinct from the certificate file.
    Staged,
}

/// Fixed provisioning policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionPolicy {
    pub tool: String,
    pub key_size: u32,
    pub validity_days: u32,
    /// `O=` component of every generated subject.
    pub organization: String,
    /// Serial number given to client certificates.
    pub client_serial: String,
    /// Export password of the client PKCS#12 bundle.
    pub client_password: String,
    pub step_timeout_secs: u64,
    pub server_issuance: ServerIssuance,
}

impl Default for ProvisionPolicy {
    fn default() -> Self {
        Self {
            tool: DEFAULT_TOOL.to_string(),
            key_size: 1024,
            validity_days: 1024,
            organization: "tlsprep".to_string(),
            client_serial: "01".to_string(),
            client_password: "password".to_string(),
            step_timeout_secs: 15,
            server_issuance: ServerIssuance::Combined,
        }
    }
}

impl ProvisionPolicy {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }
}

/// Inputs of one call to [`Provisioner::issue_server_certificate`].
#[derive(Debug, Clone, Copy)]
pub struct IssueRequest<'a> {
    pub cert_file: &'a Path,
    /// Separate key file. `None` stores the key inside `cert_file`.
    pub key_file: Option<&'a Path>,
    pub hostname: &'a str,
    /// Directory the tool runs in; client bundle files land here.
    pub working_dir: &'a Path,
    /// Generate new key material instead of only reading the fingerprint.
    pub force_new: bool,
    /// Issue a client bundle for this name. Empty disables it.
    pub client_name: &'a str,
}

/// Resolved values for one provisioning call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionParams {
    cert_file: PathBuf,
    key_file: PathBuf,
    hostname: String,
    client_name: String,
    client_prefix: String,
    client_password: String,
    client_serial: String,
    organization: String,
    key_size: u32,
    validity_days: u32,
}

impl ProvisionParams {
    pub fn new(request: &IssueRequest<'_>, policy: &ProvisionPolicy) -> Self {
        let cert_file = anchor(request.cert_file);
        let key_file = request.key_file.map(anchor).unwrap_or_else(|| cert_file.clone());
        Self {
            cert_file,
            key_file,
            hostname: request.hostname.to_string(),
            client_name: request.client_name.to_string(),
            client_prefix: format!("{}-{}", request.hostname, request.client_name),
            client_password: policy.client_password.clone(),
            client_serial: policy.client_serial.clone(),
            organization: policy.organization.clone(),
            key_size: policy.key_size,
            validity_days: policy.validity_days,
        }
    }

    pub fn cert_file(&self) -> &Path {
        &self.cert_file
    }

    pub fn key_file(&self) -> &Path {
        &self.key_file
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    pub fn client_prefix(&self) -> &str {
        &self.client_prefix
    }

    /// Client bundle file with the given extension, relative to the working
    /// directory.
    pub fn client_file(&self, extension: &str) -> PathBuf {
        PathBuf::from(format!("{}.{}", self.client_prefix, extension))
    }

    fn subject(&self, common_name: &str) -> String {
        format!("/O={}/CN={}", self.organization, common_name)
    }
}

/// Relative paths are made absolute against the current directory, since the
/// tool runs inside the working directory.
fn anchor(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(dir) => dir.join(path),
        Err(_) => path.to_path_buf(),
    }
}

/// One external command: executable plus literal argument tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: OsString,
    args: Vec<OsString>,
}

impl Invocation {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }

    /// Full argument vector, executable first.
    pub fn argv(&self) -> Vec<OsString> {
        let mut argv = Vec::with_capacity(self.args.len() + 1);
        argv.push(self.program.clone());
        argv.extend(self.args.iter().cloned());
        argv
    }
}

/// A labelled step of a provisioning sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub label: &'static str,
    pub invocation: Invocation,
}

impl Step {
    fn new(label: &'static str, invocation: Invocation) -> Self {
        Self { label, invocation }
    }
}

/// Steps that create the server key and certificate.
pub fn server_generation_steps(
    params: &ProvisionParams,
    tool: &str,
    issuance: ServerIssuance,
) -> Vec<Step> {
    let issuance = if issuance == ServerIssuance::Staged && params.key_file == params.cert_file {
        tracing::debug!("Staged issuance needs a separate key file, using combined issuance");
        ServerIssuance::Combined
    } else {
        issuance
    };

    match issuance {
        ServerIssuance::Combined => vec![Step::new(
            "server key and certificate",
            Invocation::new(tool)
                .args(["req", "-x509", "-nodes", "-days"])
                .arg(params.validity_days.to_string())
                .arg("-newkey")
                .arg(format!("rsa:{}", params.key_size))
                .args(["-batch", "-subj"])
                .arg(params.subject(&params.hostname))
                .arg("-keyout")
                .arg(&params.key_file)
                .arg("-out")
                .arg(&params.cert_file),
        )],
        ServerIssuance::Staged => {
            let csr = format!("{}.csr", params.hostname);
            vec![
                Step::new(
                    "server key",
                    Invocation::new(tool)
                        .args(["genrsa", "-out"])
                        .arg(&params.key_file)
                        .arg(params.key_size.to_string()),
                ),
                Step::new(
                    "server signing request",
                    Invocation::new(tool)
                        .args(["req", "-new", "-key"])
                        .arg(&params.key_file)
                        .arg("-out")
                        .arg(&csr)
                        .args(["-batch", "-subj"])
                        .arg(params.subject(&params.hostname)),
                ),
                Step::new(
                    "server self-signature",
                    Invocation::new(tool)
                        .args(["x509", "-req", "-days"])
                        .arg(params.validity_days.to_string())
                        .arg("-in")
                        .arg(&csr)
                        .arg("-signkey")
                        .arg(&params.key_file)
                        .arg("-out")
                        .arg(&params.cert_file),
                ),
            ]
        }
    }
}

/// Read-only inspection printing the server certificate fingerprint.
pub fn fingerprint_step(params: &ProvisionParams, tool: &str) -> Step {
    Step::new(
        "server fingerprint",
        Invocation::new(tool)
            .args(["x509", "-noout", "-fingerprint", "-in"])
            .arg(&params.cert_file),
    )
}

/// Client key, CSR, server-signed certificate and PKCS#12 export, in order.
pub fn client_bundle_steps(params: &ProvisionParams, tool: &str) -> Vec<Step> {
    let key = params.client_file("key");
    let csr = params.client_file("csr");
    let crt = params.client_file("crt");
    let p12 = params.client_file("p12");
    vec![
        Step::new(
            "client key",
            Invocation::new(tool)
                .args(["genrsa", "-out"])
                .arg(&key)
                .arg(params.key_size.to_string()),
        ),
        Step::new(
            "client signing request",
            Invocation::new(tool)
                .args(["req", "-new", "-key"])
                .arg(&key)
                .arg("-out")
                .arg(&csr)
                .args(["-batch", "-subj"])
                .arg(params.subject(&params.client_name)),
        ),
        Step::new(
            "client certificate",
            Invocation::new(tool)
                .args(["x509", "-req", "-days"])
                .arg(params.validity_days.to_string())
                .arg("-in")
                .arg(&csr)
                .arg("-CA")
                .arg(&params.cert_file)
                .arg("-CAkey")
                .arg(&params.key_file)
                .arg("-set_serial")
                .arg(&params.client_serial)
                .arg("-out")
                .arg(&crt),
        ),
        Step::new(
            "client bundle",
            Invocation::new(tool)
                .args(["pkcs12", "-export", "-in"])
                .arg(&crt)
                .arg("-inkey")
                .arg(&key)
                .arg("-out")
                .arg(&p12)
                .arg("-passout")
                .arg(format!("pass:{}", params.client_password)),
        ),
    ]
}

/// Drives provisioning steps through a [`CommandRunner`].
#[derive(Debug, Clone, Default)]
pub struct Provisioner<R = SystemRunner> {
    runner: R,
    policy: ProvisionPolicy,
}

impl Provisioner<SystemRunner> {
    pub fn new(policy: ProvisionPolicy) -> Self {
        Self::with_runner(SystemRunner, policy)
    }
}

impl<R: CommandRunner> Provisioner<R> {
    pub fn with_runner(runner: R, policy: ProvisionPolicy) -> Self {
        Self { runner, policy }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn policy(&self) -> &ProvisionPolicy {
        &self.policy
    }

    /// Returns the fingerprint of the server certificate, generating key
    /// material first when `force_new` is set.
    ///
    /// Step failures are logged and do not stop the sequence. An empty string
    /// means no fingerprint could be read; the caller decides what that means.
    pub async fn issue_server_certificate(&self, request: &IssueRequest<'_>) -> String {
        let params = ProvisionParams::new(request, &self.policy);
        let tool = self.policy.tool.as_str();

        let mut steps = Vec::new();
        if request.force_new {
            steps.extend(server_generation_steps(&params, tool, self.policy.server_issuance));
        }
        steps.push(fingerprint_step(&params, tool));

        let mut last = ProcessOutput::default();
        for step in &steps {
            last = self.execute(step, request.working_dir).await;
        }
        let fingerprint = last.stdout.trim().to_string();

        if request.force_new && !request.client_name.is_empty() {
            tracing::info!(
                "Issuing client bundle {} for {}",
                params.client_file("p12").display(),
                params.client_name()
            );
            for step in client_bundle_steps(&params, tool) {
                self.execute(&step, request.working_dir).await;
            }
        }

        fingerprint
    }

    async fn execute(&self, step: &Step, working_dir: &Path) -> ProcessOutput {
        tracing::debug!("Running {} step: {:?}", step.label, step.invocation.argv());
        let output = self
            .runner
            .run(
                &step.invocation.argv(),
                Some(working_dir),
                Some(self.policy.step_timeout()),
            )
            .await;
        if output.has_error() {
            tracing::warn!(
                "SSL keygen {} step reported: {} {}",
                step.label,
                output.stdout.trim(),
                output.stderr.trim()
            );
        }
        output
    }
}
