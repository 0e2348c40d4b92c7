//! Subprocess invocation for `git`, `gh` and the other external tools.
//!
//! Every call carries a timeout. A child that outlives it is killed and the
//! call reports [`FactoryError::CommandTimedOut`]; a non-zero exit becomes
//! [`FactoryError::CommandFailed`] with the trimmed stderr (or stdout) as
//! detail.

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{FactoryError, Result};

const DETAIL_LIMIT: usize = 400;
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Captured output of a finished child process.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Trimmed stderr, or stdout when stderr is empty, capped for messages.
    pub fn detail(&self) -> String {
        let text = if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        };
        text.chars().take(DETAIL_LIMIT).collect()
    }
}

/// Fail with [`FactoryError::MissingExecutable`] unless `program` is on PATH.
pub fn require(program: &str) -> Result<()> {
    which::which(program)
        .map(|_| ())
        .map_err(|_| FactoryError::MissingExecutable(program.to_string()))
}

/// Run `cmd` to completion or until `timeout` elapses.
pub fn run_with_timeout(mut cmd: Command, timeout: Duration) -> Result<CommandOutput> {
    let label = describe(&cmd);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            FactoryError::MissingExecutable(cmd.get_program().to_string_lossy().into_owned())
        }
        _ => FactoryError::Io(e),
    })?;

    // Drain both pipes on their own threads so a chatty child cannot block
    // on a full pipe while we poll for exit.
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            kill(&mut child);
            return Err(FactoryError::CommandTimedOut {
                command: label,
                seconds: timeout.as_secs(),
            });
        }
        thread::sleep(POLL_INTERVAL);
    };

    Ok(CommandOutput {
        status,
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
    })
}

/// Run `program args…` in `cwd` and return stdout on success.
pub fn run_program(program: &str, cwd: &Path, args: &[&str], timeout: Duration) -> Result<String> {
    let mut cmd = Command::new(program);
    cmd.args(args).current_dir(cwd);
    let label = describe(&cmd);
    let output = run_with_timeout(cmd, timeout)?;
    if !output.success() {
        return Err(FactoryError::CommandFailed {
            command: label,
            detail: output.detail(),
        });
    }
    Ok(output.stdout)
}

/// Run `git args…` in `cwd` and return stdout on success.
pub fn run_git(cwd: &Path, args: &[&str], timeout: Duration) -> Result<String> {
    run_program("git", cwd, args, timeout)
}

/// Current branch name, `master` when detached or undetermined.
pub fn current_branch(repo: &Path, timeout: Duration) -> String {
    run_git(repo, &["branch", "--show-current"], timeout)
        .map(|out| out.trim().to_string())
        .ok()
        .filter(|b| !b.is_empty())
        .unwrap_or_else(|| "master".to_string())
}

/// True when a push was rejected because the remote has commits we lack.
pub fn is_non_fast_forward(detail: &str) -> bool {
    let lower = detail.to_lowercase();
    [
        "non-fast-forward",
        "[rejected]",
        "fetch first",
        "tip of your current branch is behind",
        "failed to push some refs",
    ]
    .iter()
    .any(|marker| lower.contains(marker))
}

fn describe(cmd: &Command) -> String {
    let mut parts = vec![cmd.get_program().to_string_lossy().into_owned()];
    parts.extend(cmd.get_args().map(|a| a.to_string_lossy().into_owned()));
    parts.join(" ")
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
