//! Production execution primitive: child processes with timeouts, bounded
//! output, and cooperative cancellation.

use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};

use crate::core::exec::{CancelToken, CommandRunner, CommandSpec, ExecOutcome};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// [`CommandRunner`] backed by `std::process::Command`.
///
/// Output is read concurrently while the child runs so pipes never deadlock;
/// bytes beyond the configured limit are discarded while still draining the
/// pipe. Timeout and cancellation share one wait loop: both kill the child
/// rather than abandon it.
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    #[instrument(skip_all, fields(program = %spec.program, timeout_secs = spec.timeout.as_secs()))]
    fn run(&self, spec: &CommandSpec, cancel: &CancelToken) -> Result<ExecOutcome> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }

        debug!("spawning child process");
        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawn {}", spec.display()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("stdout was not piped"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("stderr was not piped"))?;
        let limit = spec.output_limit_bytes;
        let stdout_handle = thread::spawn(move || read_stream_limited(stdout, limit));
        let stderr_handle = thread::spawn(move || read_stream_limited(stderr, limit));

        let started = Instant::now();
        let mut timed_out = false;
        let mut cancelled = false;
        let status = loop {
            if let Some(status) = child.try_wait().context("wait for command")? {
                break status;
            }
            if cancel.is_cancelled() {
                warn!("command cancelled, killing");
                cancelled = true;
                child.kill().context("kill cancelled command")?;
                break child.wait().context("wait after kill")?;
            }
            if started.elapsed() >= spec.timeout {
                warn!(
                    timeout_secs = spec.timeout.as_secs(),
                    "command timed out, killing"
                );
                timed_out = true;
                child.kill().context("kill timed out command")?;
                break child.wait().context("wait after kill")?;
            }
            thread::sleep(POLL_INTERVAL);
        };

        let (stdout, stdout_truncated) = join_output(stdout_handle).context("join stdout")?;
        let (stderr, stderr_truncated) = join_output(stderr_handle).context("join stderr")?;

        if stdout_truncated > 0 || stderr_truncated > 0 {
            warn!(stdout_truncated, stderr_truncated, "output truncated");
        }

        debug!(exit_code = ?status.code(), timed_out, cancelled, "command finished");
        Ok(ExecOutcome {
            exit_code: status.code(),
            stdout,
            stderr,
            stdout_truncated,
            stderr_truncated,
            timed_out,
            cancelled,
        })
    }
}

fn join_output(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}
