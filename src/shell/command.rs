//! Shell command execution.

use crate::error::{RelayError, Result};
use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Which limit stopped a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// Nothing was written for longer than the no-output timeout.
    NoOutput,
    /// The command ran longer than its total timeout.
    Total,
}

/// Result of executing a shell command.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit code (None if killed by signal).
    pub exit_code: Option<i32>,

    /// Captured standard output (empty when streaming).
    pub stdout: String,

    /// Captured standard error (empty when streaming).
    pub stderr: String,

    /// Execution duration.
    pub duration: Duration,

    /// Whether command succeeded (exit code 0).
    pub success: bool,

    /// Set when the command was killed for hitting a timeout.
    pub timed_out: Option<TimeoutKind>,
}

/// Options for command execution.
#[derive(Debug, Clone, Default)]
pub struct CommandOptions {
    /// Working directory.
    pub cwd: Option<PathBuf>,

    /// Environment variables (merged with system env).
    pub env: HashMap<String, String>,

    /// Kill the command after this long without any output.
    pub no_output_timeout: Option<Duration>,

    /// Kill the command after this long in total.
    pub timeout: Option<Duration>,
}

/// A chunk of raw output, tagged with the pipe it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputChunk {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
}

impl OutputChunk {
    pub fn bytes(&self) -> &[u8] {
        match self {
            OutputChunk::Stdout(bytes) | OutputChunk::Stderr(bytes) => bytes,
        }
    }
}

/// Execute a command, capturing its output.
pub fn execute(command: &str, options: &CommandOptions) -> Result<CommandResult> {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut result = execute_streaming(command, options, &mut |chunk| match chunk {
        OutputChunk::Stdout(bytes) => stdout.extend_from_slice(&bytes),
        OutputChunk::Stderr(bytes) => stderr.extend_from_slice(&bytes),
    })?;
    result.stdout = String::from_utf8_lossy(&stdout).into_owned();
    result.stderr = String::from_utf8_lossy(&stderr).into_owned();
    Ok(result)
}

/// Execute a command, handing every output chunk to `on_output` as it
/// arrives.
///
/// Stdout and stderr are read on their own threads and delivered in arrival
/// order on the calling thread. When a timeout in `options` expires, the
/// command (and everything it spawned) is killed.
pub fn execute_streaming(
    command: &str,
    options: &CommandOptions,
    on_output: &mut dyn FnMut(OutputChunk),
) -> Result<CommandResult> {
    let start = Instant::now();

    let mut cmd = shell_command(command);
    if let Some(cwd) = &options.cwd {
        cmd.current_dir(cwd);
    }
    for (key, value) in &options.env {
        cmd.env(key, value);
    }
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|e| {
        tracing::debug!("Failed to spawn '{}': {}", command, e);
        RelayError::CommandFailed {
            command: command.to_string(),
            code: None,
        }
    })?;

    let (tx, rx) = mpsc::channel();
    let mut readers = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        readers.push(spawn_reader(stdout, tx.clone(), OutputChunk::Stdout));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(spawn_reader(stderr, tx, OutputChunk::Stderr));
    }

    let mut last_output = Instant::now();
    let timed_out = loop {
        let received = match next_wait(options, start, last_output) {
            Some(wait) => rx.recv_timeout(wait),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok(chunk) => {
                last_output = Instant::now();
                on_output(chunk);
            }
            Err(RecvTimeoutError::Disconnected) => break None,
            Err(RecvTimeoutError::Timeout) => {
                if let Some(kind) = expired(options, start, last_output) {
                    tracing::debug!("Killing '{}' after {:?} timeout", command, kind);
                    kill_tree(&mut child);
                    break Some(kind);
                }
            }
        }
    };

    // The group kill closes the pipes, so the readers finish on their own.
    for reader in readers {
        if reader.join().is_err() {
            tracing::warn!("Output reader for '{}' panicked", command);
        }
    }

    // Deliver whatever the readers sent before they stopped.
    while let Ok(chunk) = rx.try_recv() {
        on_output(chunk);
    }

    let status = child.wait().map_err(|_| RelayError::CommandFailed {
        command: command.to_string(),
        code: None,
    })?;

    let success = status.success() && timed_out.is_none();
    Ok(CommandResult {
        exit_code: status.code(),
        stdout: String::new(),
        stderr: String::new(),
        duration: start.elapsed(),
        success,
        timed_out,
    })
}

fn spawn_reader<R>(
    mut source: R,
    tx: Sender<OutputChunk>,
    wrap: fn(Vec<u8>) -> OutputChunk,
) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = [0u8; READ_CHUNK_SIZE];
        loop {
            match source.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(wrap(buf[..n].to_vec())).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
    })
}

/// How long to wait for the next chunk before checking the timeouts.
fn next_wait(options: &CommandOptions, start: Instant, last_output: Instant) -> Option<Duration> {
    let total = options
        .timeout
        .map(|limit| limit.saturating_sub(start.elapsed()));
    let silent = options
        .no_output_timeout
        .map(|limit| limit.saturating_sub(last_output.elapsed()));
    match (total, silent) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn expired(options: &CommandOptions, start: Instant, last_output: Instant) -> Option<TimeoutKind> {
    if options.timeout.is_some_and(|limit| start.elapsed() >= limit) {
        return Some(TimeoutKind::Total);
    }
    if options
        .no_output_timeout
        .is_some_and(|limit| last_output.elapsed() >= limit)
    {
        return Some(TimeoutKind::NoOutput);
    }
    None
}

#[cfg(unix)]
fn shell_command(command: &str) -> Command {
    use std::os::unix::process::CommandExt;

    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    // Own process group, so a timeout can stop everything the script started.
    cmd.process_group(0);
    cmd
}

#[cfg(not(unix))]
fn shell_command(command: &str) -> Command {
    let shell = std::env::var("COMSPEC").unwrap_or_else(|_| "cmd.exe".to_string());
    let mut cmd = Command::new(shell);
    cmd.arg("/C").arg(command);
    cmd
}

#[cfg(unix)]
fn kill_tree(child: &mut Child) {
    if let Ok(pid) = libc::pid_t::try_from(child.id()) {
        // SAFETY: kill() only sends a signal; the negative pid addresses the
        // process group created for this child at spawn.
        unsafe {
            libc::kill(-pid, libc::SIGKILL);
        }
    }
    let _ = child.kill();
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) {
    let _ = child.kill();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(command: &str, options: &CommandOptions) -> (CommandResult, String) {
        let mut output = Vec::new();
        let result = execute_streaming(command, options, &mut |chunk| {
            output.extend_from_slice(chunk.bytes())
        })
        .unwrap();
        (result, String::from_utf8_lossy(&output).into_owned())
    }

    #[test]
    fn execute_successful_command() {
        let result = execute("echo hello", &CommandOptions::default()).unwrap();
        assert!(result.success);
        assert_eq!(result.exit_code, Some(0));
        assert!(result.stdout.contains("hello"));
        assert!(result.timed_out.is_none());
    }

    #[test]
    fn execute_failing_command() {
        let result = execute("exit 3", &CommandOptions::default()).unwrap();
        assert!(!result.success);
        assert_eq!(result.exit_code, Some(3));
    }

    #[test]
    fn execute_with_env() {
        let mut options = CommandOptions::default();
        options
            .env
            .insert("MY_VAR".to_string(), "my_value".to_string());
        let result = execute("echo $MY_VAR", &options).unwrap();
        assert!(result.stdout.contains("my_value"));
    }

    #[test]
    fn execute_with_cwd() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join("marker.txt"), "x").unwrap();
        let options = CommandOptions {
            cwd: Some(temp.path().to_path_buf()),
            ..Default::default()
        };
        let result = execute("ls", &options).unwrap();
        assert!(result.stdout.contains("marker.txt"));
    }

    #[test]
    fn streams_stdout_and_stderr() {
        let mut chunks = Vec::new();
        let result = execute_streaming(
            "echo out && echo err >&2",
            &CommandOptions::default(),
            &mut |chunk| chunks.push(chunk),
        )
        .unwrap();
        assert!(result.success);
        assert!(chunks.iter().any(|c| matches!(c, OutputChunk::Stdout(_))));
        assert!(chunks.iter().any(|c| matches!(c, OutputChunk::Stderr(_))));
    }

    #[test]
    fn keeps_raw_bytes_without_line_splitting() {
        let (_, output) = collect("printf 'no newline'", &CommandOptions::default());
        assert_eq!(output, "no newline");
    }

    #[test]
    fn no_output_timeout_kills_silent_command() {
        let options = CommandOptions {
            no_output_timeout: Some(Duration::from_millis(300)),
            ..Default::default()
        };
        let (result, output) = collect("echo started; sleep 5; echo never", &options);
        assert_eq!(result.timed_out, Some(TimeoutKind::NoOutput));
        assert!(!result.success);
        assert!(output.contains("started"));
        assert!(!output.contains("never"));
        assert!(result.duration < Duration::from_secs(5));
    }

    #[test]
    fn output_resets_no_output_timeout() {
        let options = CommandOptions {
            no_output_timeout: Some(Duration::from_secs(2)),
            ..Default::default()
        };
        let (result, _) = collect("for i in 1 2 3; do echo $i; sleep 0.2; done", &options);
        assert!(result.success);
        assert!(result.timed_out.is_none());
    }

    #[test]
    fn total_timeout_kills_chatty_command() {
        let options = CommandOptions {
            timeout: Some(Duration::from_millis(500)),
            no_output_timeout: Some(Duration::from_secs(10)),
            ..Default::default()
        };
        let (result, _) = collect("while true; do echo tick; sleep 0.1; done", &options);
        assert_eq!(result.timed_out, Some(TimeoutKind::Total));
    }

    #[test]
    fn timeout_keeps_output_read_before_the_kill() {
        let options = CommandOptions {
            no_output_timeout: Some(Duration::from_millis(300)),
            ..Default::default()
        };
        let (result, output) = collect("seq 1 5000; sleep 5", &options);
        assert_eq!(result.timed_out, Some(TimeoutKind::NoOutput));
        assert!(output.starts_with("1\n"));
        assert!(output.ends_with("5000\n"));
        assert_eq!(output.lines().count(), 5000);
    }

    #[test]
    fn wait_is_unbounded_without_timeouts() {
        let now = Instant::now();
        assert_eq!(next_wait(&CommandOptions::default(), now, now), None);
    }
}
