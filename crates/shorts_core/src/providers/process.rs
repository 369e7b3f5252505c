//! Subprocess execution with a hard deadline.
//!
//! External tools (ffmpeg, ffprobe, espeak-ng) are run with piped output
//! and polled; a process still running at the deadline is killed and the
//! attempt reported as a timeout.

use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use super::{ProviderCtx, ProviderError, ProviderResult};

/// Poll interval while waiting for a child process.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Captured output of a finished command.
#[derive(Debug)]
pub struct CommandOutput {
    /// Process exit code (-1 if unavailable).
    pub exit_code: i32,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
}

/// Run a command, killing it if it outlives the context deadline.
///
/// Output lines are fed to the run logger's tail buffer so they are
/// available for failure diagnosis. A non-zero exit is an error.
pub fn run_with_deadline(
    mut cmd: Command,
    tool: &str,
    ctx: &ProviderCtx,
) -> ProviderResult<CommandOutput> {
    let started = Instant::now();

    ctx.logger.command(&format_command(&cmd));

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd
        .spawn()
        .map_err(|e| ProviderError::io(format!("spawning {}", tool), e))?;

    let stdout_handle = spawn_reader(child.stdout.take());
    let stderr_handle = spawn_reader(child.stderr.take());

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if Instant::now() >= ctx.deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    ctx.logger
                        .warn(&format!("{} killed after exceeding its deadline", tool));
                    return Err(ProviderError::timeout(started.elapsed()));
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                return Err(ProviderError::io(format!("waiting for {}", tool), e));
            }
        }
    };

    let stdout = stdout_handle.join().unwrap_or_default();
    let stderr = stderr_handle.join().unwrap_or_default();

    for line in stdout.lines() {
        ctx.logger.output_line(line, false);
    }
    for line in stderr.lines() {
        ctx.logger.output_line(line, true);
    }

    let exit_code = status.code().unwrap_or(-1);
    if !status.success() {
        ctx.logger.show_tail(tool);
        let message = stderr
            .lines()
            .rev()
            .take(5)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ProviderError::command_failed(tool, exit_code, message));
    }

    Ok(CommandOutput {
        exit_code,
        stdout,
        stderr,
    })
}

/// Drain a child pipe on a background thread.
fn spawn_reader<R: Read + Send + 'static>(
    pipe: Option<R>,
) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut collected = String::new();
        if let Some(pipe) = pipe {
            let reader = BufReader::new(pipe);
            for line in reader.lines().map_while(Result::ok) {
                collected.push_str(&line);
                collected.push('\n');
            }
        }
        collected
    })
}

/// Render a command line for logging.
fn format_command(cmd: &Command) -> String {
    let mut parts = vec![cmd.get_program().to_string_lossy().to_string()];
    parts.extend(cmd.get_args().map(|a| a.to_string_lossy().to_string()));
    parts.join(" ")
}
