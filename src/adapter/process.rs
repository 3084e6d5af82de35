//! Bounded subprocess execution for adapter commands
//!
//! Every external tool the adapters invoke (syntax checkers, test runners,
//! complexity analyzers) runs through here: piped output drained on
//! background threads, a hard timeout, kill on expiry. A timed-out or
//! failing command is returned as data, never raised.

use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;
use wait_timeout::ChildExt;

/// Captured result of one bounded command invocation
#[derive(Debug, Clone)]
pub struct CmdOutput {
    /// True when the process exited with status zero
    pub ok: bool,
    /// Combined stdout then stderr, lossily decoded
    pub output: String,
    /// True when the process was killed after exceeding the timeout
    pub timed_out: bool,
}

impl CmdOutput {
    fn timed_out() -> Self {
        Self {
            ok: false,
            output: String::new(),
            timed_out: true,
        }
    }
}

/// Run a command under `repo_path` with a hard timeout.
///
/// Output pipes are drained on separate threads so a chatty child cannot
/// deadlock against a full pipe buffer while we wait on it.
pub fn run_with_timeout(
    repo_path: &Path,
    bin: &str,
    args: &[&str],
    timeout: Duration,
    envs: &[(&str, &str)],
) -> Result<CmdOutput> {
    let mut command = Command::new(bin);
    command
        .args(args)
        .current_dir(repo_path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (key, value) in envs {
        command.env(key, value);
    }

    let mut child = command
        .spawn()
        .with_context(|| format!("failed to spawn `{}`", bin))?;

    let stdout_handle = spawn_reader(child.stdout.take());
    let stderr_handle = spawn_reader(child.stderr.take());

    let status = match child
        .wait_timeout(timeout)
        .with_context(|| format!("failed to wait on `{}`", bin))?
    {
        Some(status) => status,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            // Drain whatever the child managed to emit before the kill
            let _ = stdout_handle.join();
            let _ = stderr_handle.join();
            return Ok(CmdOutput::timed_out());
        }
    };

    let stdout = stdout_handle.join().unwrap_or_default();
    let stderr = stderr_handle.join().unwrap_or_default();

    let mut combined = String::from_utf8_lossy(&stdout).into_owned();
    if !stderr.is_empty() {
        if !combined.is_empty() {
            combined.push('\n');
        }
        combined.push_str(&String::from_utf8_lossy(&stderr));
    }

    Ok(CmdOutput {
        ok: status.success(),
        output: combined,
        timed_out: false,
    })
}

fn spawn_reader<R: Read + Send + 'static>(source: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut reader) = source {
            let _ = reader.read_to_end(&mut buf);
        }
        buf
    })
}
