use anyhow::{Context, Result};
use log::{debug, warn};
use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use crate::port::CommandOutput;

const POLL_INTERVAL: Duration = Duration::from_millis(10);
/// How long output may keep draining after the deadline or a kill.
const DRAIN_GRACE: Duration = Duration::from_millis(100);

/// Runs one external utility at a time, killing it once the timeout expires.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    timeout: Duration,
}

impl CommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Never fails: spawn errors, nonzero exits and timeouts all come back unsuccessful.
    pub fn run(&self, program: &str, args: &[&str]) -> CommandOutput {
        match self.try_run(program, args) {
            Ok(result) => result,
            Err(err) => {
                debug!("{} {:?} failed: {:#}", program, args, err);
                CommandOutput::failed()
            }
        }
    }

    fn try_run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawn {}", program))?;

        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait().context("wait for child")? {
                break Some(status);
            }
            if Instant::now() >= deadline {
                warn!("{} {:?} timed out after {:?}", program, args, self.timeout);
                let _ = child.kill();
                let _ = child.wait();
                break None;
            }
            thread::sleep(POLL_INTERVAL);
        };

        // A grandchild can inherit the pipes and outlive the kill, so reading
        // stops at the deadline instead of at EOF.
        let drain_until = Instant::now().max(deadline) + DRAIN_GRACE;
        let stdout = collect(stdout, drain_until);
        let stderr = collect(stderr, drain_until);
        if !stderr.trim().is_empty() {
            debug!("{} stderr: {}", program, stderr.trim());
        }

        Ok(CommandOutput {
            output: stdout,
            success: status.map(|s| s.success()).unwrap_or(false),
        })
    }
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        let _ = tx.send(buf);
    });
    rx
}

/// Output read so far, or nothing if the pipe is still held open at `until`.
fn collect(output: Option<Receiver<Vec<u8>>>, until: Instant) -> String {
    output
        .and_then(|rx| rx.recv_timeout(until.saturating_duration_since(Instant::now())).ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).to_string())
        .unwrap_or_default()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn runner() -> CommandRunner {
        CommandRunner::new(Duration::from_secs(5))
    }

    #[test]
    fn captures_stdout_of_successful_commands() {
        let result = runner().run("sh", &["-c", "echo disk0; echo noise >&2"]);
        assert!(result.success);
        assert_eq!(result.output, "disk0\n");
    }

    #[test]
    fn nonzero_exit_is_unsuccessful() {
        let result = runner().run("sh", &["-c", "echo partial; exit 3"]);
        assert!(!result.success);
        assert_eq!(result.output, "partial\n");
    }

    #[test]
    fn missing_program_is_unsuccessful() {
        let result = runner().run("sysmaint-no-such-utility", &[]);
        assert_eq!(result, CommandOutput::failed());
    }

    #[test]
    fn hung_command_is_killed_at_the_deadline() {
        let runner = CommandRunner::new(Duration::from_millis(100));
        let started = Instant::now();
        let result = runner.run("sleep", &["5"]);
        assert!(!result.success);
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn grandchild_holding_the_pipe_does_not_extend_the_deadline() {
        let runner = CommandRunner::new(Duration::from_millis(200));
        let started = Instant::now();
        let result = runner.run("sh", &["-c", "sleep 4; true"]);
        assert!(!result.success);
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
