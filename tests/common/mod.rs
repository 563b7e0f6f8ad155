#![allow(dead_code)]

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tlsprep::{CommandRunner, ProcessOutput};

pub const FINGERPRINT: &str = "SHA1 Fingerprint=3A:91:0C:7F:E2:55:10:42:9B:6D:AF:01:C4:88:2E:73:5B:90:11:D6";

/// One invocation seen by [`RecordingRunner`].
#[derive(Debug, Clone)]
pub struct Call {
    pub argv: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

impl Call {
    pub fn subcommand(&self) -> &str {
        self.argv.get(1).map(String::as_str).unwrap_or("")
    }

    pub fn has_arg(&self, arg: &str) -> bool {
        self.argv.iter().any(|a| a == arg)
    }

    pub fn is_fingerprint(&self) -> bool {
        self.has_arg("-fingerprint")
    }

    pub fn creates_key(&self) -> bool {
        self.subcommand() == "genrsa" || self.has_arg("-newkey")
    }
}

type Responder = Box<dyn Fn(&[String]) -> ProcessOutput + Send + Sync>;

/// Records every command instead of running it and answers with canned output.
pub struct RecordingRunner {
    calls: Mutex<Vec<Call>>,
    respond: Responder,
}

impl RecordingRunner {
    pub fn new(respond: impl Fn(&[String]) -> ProcessOutput + Send + Sync + 'static) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        }
    }

    /// Prints a fingerprint for inspection steps, nothing for anything else.
    pub fn fingerprinting() -> Self {
        Self::new(|argv| {
            if argv.iter().any(|a| a == "-fingerprint") {
                ok(&format!("{}\n", FINGERPRINT))
            } else {
                ProcessOutput::default()
            }
        })
    }

    /// Every step produces no output at all.
    pub fn silent() -> Self {
        Self::new(|_| ProcessOutput::default())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn subcommands(&self) -> Vec<String> {
        self.calls().iter().map(|c| c.subcommand().to_string()).collect()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(
        &self,
        command_args: &[OsString],
        working_dir: Option<&Path>,
        timeout: Option<Duration>,
    ) -> ProcessOutput {
        let argv: Vec<String> = command_args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        let output = (self.respond)(&argv);
        self.calls.lock().unwrap().push(Call {
            argv,
            working_dir: working_dir.map(Path::to_path_buf),
            timeout,
        });
        output
    }
}

pub fn ok(stdout: &str) -> ProcessOutput {
    ProcessOutput {
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

pub fn failed(stderr: &str) -> ProcessOutput {
    ProcessOutput {
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}
