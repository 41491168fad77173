//! External tool invocation with timeouts
//!
//! Every ffprobe/ffmpeg call goes through [`ToolRunner`], so tests can
//! substitute a fake runner and never spawn a real process.

use std::ffi::OsString;
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::ToolFailure;

/// Poll interval while waiting for a child process
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A single external tool call
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<OsString>,
    pub timeout: Duration,
}

impl ToolInvocation {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Last argument, which is the output path for ffmpeg calls
    pub fn last_arg(&self) -> Option<&OsString> {
        self.args.last()
    }

    /// Whether any argument equals `needle`
    pub fn has_arg(&self, needle: &str) -> bool {
        self.args.iter().any(|a| a == needle)
    }
}

/// Captured output of a successful invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ToolOutput {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// Runs external tools; a non-zero exit is a failure
pub trait ToolRunner: Send + Sync {
    fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolFailure>;
}

/// Runs tools as child processes, killing them on timeout
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemToolRunner;

impl ToolRunner for SystemToolRunner {
    fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolFailure> {
        let program = invocation.program.clone();
        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ToolFailure::Spawn {
                program: program.clone(),
                message: e.to_string(),
            })?;

        // Drain pipes concurrently so a chatty child cannot block on a full pipe
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = wait_with_timeout(&mut child, invocation.timeout);

        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();

        match status {
            Ok(Some(status)) if status.success() => Ok(ToolOutput { stdout, stderr }),
            Ok(Some(status)) => Err(ToolFailure::ExitCode {
                program,
                code: status.code(),
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            }),
            Ok(None) => Err(ToolFailure::Timeout {
                program,
                timeout: invocation.timeout,
            }),
            Err(e) => Err(ToolFailure::Spawn {
                program,
                message: e.to_string(),
            }),
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

/// Wait for the child; `Ok(None)` means it was killed after `timeout`.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            log::debug!("Killing child {} after {:?}", child.id(), timeout);
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_builder() {
        let invocation = ToolInvocation::new("ffmpeg", Duration::from_secs(30))
            .args(["-i", "in.mp4"])
            .arg("-y")
            .arg("out.webp");

        assert_eq!(invocation.program, "ffmpeg");
        assert_eq!(invocation.args.len(), 4);
        assert!(invocation.has_arg("-y"));
        assert!(!invocation.has_arg("-vf"));
        assert_eq!(invocation.last_arg(), Some(&OsString::from("out.webp")));
    }

    #[test]
    fn test_spawn_failure() {
        let invocation = ToolInvocation::new("definitely-not-a-real-tool-7f3a", Duration::from_secs(1));
        let result = SystemToolRunner.run(&invocation);
        assert!(matches!(result, Err(ToolFailure::Spawn { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_success_captures_stdout() {
        let invocation = ToolInvocation::new("sh", Duration::from_secs(5)).args(["-c", "echo hello"]);
        let output = SystemToolRunner.run(&invocation).unwrap();
        assert_eq!(output.stdout_lossy().trim(), "hello");
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit() {
        let invocation =
            ToolInvocation::new("sh", Duration::from_secs(5)).args(["-c", "echo oops >&2; exit 3"]);
        match SystemToolRunner.run(&invocation) {
            Err(ToolFailure::ExitCode { code, stderr, .. }) => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "oops");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_child() {
        let start = Instant::now();
        let invocation = ToolInvocation::new("sleep", Duration::from_millis(200)).arg("5");
        let result = SystemToolRunner.run(&invocation);
        assert!(matches!(result, Err(ToolFailure::Timeout { .. })));
        assert!(start.elapsed() < Duration::from_secs(4));
    }
}
