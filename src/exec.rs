//! Command execution.
//!
//! Runs one shell command as a child process, feeds it input, and captures
//! its merged output and exit code. A nonzero exit code is normal data
//! here; `ExecError` only covers a broken environment.

use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Poll interval while waiting on a child with a timeout.
const WAIT_POLL: Duration = Duration::from_millis(10);

/// Captured outcome of one command execution.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Merged stdout and stderr, in the order the streams were drained.
    pub output: String,
    /// Exit code of the command. On Unix, death by signal N is recorded
    /// as -N so return-code conditions can still address it.
    pub exit_code: i32,
}

/// Error raised when a command could not be executed at all.
#[derive(Debug)]
pub enum ExecError {
    /// The shell itself could not be spawned.
    Spawn(std::io::Error),
    /// Waiting on the child failed at the OS level.
    Io(std::io::Error),
    /// The opt-in per-test timeout expired; the child was killed.
    Timeout(u64),
}

impl std::fmt::Display for ExecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecError::Spawn(e) => write!(f, "failed to spawn shell: {e}"),
            ExecError::Io(e) => write!(f, "failed to wait for command: {e}"),
            ExecError::Timeout(secs) => write!(f, "Timeout: command exceeded {secs}s"),
        }
    }
}

impl std::error::Error for ExecError {}

/// Run `command` through `sh -c`, writing `input` to its stdin.
///
/// The command string is handed to the shell verbatim, so test authors can
/// use pipes and redirection. Output is drained incrementally while the
/// child runs; a command that writes more than the OS pipe buffer can
/// neither deadlock nor lose output. Without a timeout the call blocks
/// until the child exits. The child is fully reaped before returning.
pub fn run_command(
    command: &str,
    input: &str,
    timeout: Option<Duration>,
) -> Result<CommandResult, ExecError> {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd.stdin(if input.is_empty() {
        Stdio::null()
    } else {
        Stdio::piped()
    });
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(ExecError::Spawn)?;

    // Feed stdin from its own thread: the full input is written before the
    // stream is closed, and a child that exits without reading it (broken
    // pipe) is not an error.
    let writer = child.stdin.take().map(|mut stdin| {
        let data = input.to_owned();
        thread::spawn(move || {
            let _ = stdin.write_all(data.as_bytes());
        })
    });

    let sink: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
    let mut readers = Vec::with_capacity(2);
    if let Some(stream) = child.stdout.take() {
        readers.push(spawn_drain(stream, Arc::clone(&sink)));
    }
    if let Some(stream) = child.stderr.take() {
        readers.push(spawn_drain(stream, Arc::clone(&sink)));
    }

    let waited = match timeout {
        None => child.wait().map_err(ExecError::Io),
        Some(limit) => wait_with_timeout(&mut child, limit),
    };

    // Drain to EOF and reap helper threads before reporting anything, so
    // no pipe outlives this call.
    for handle in readers {
        let _ = handle.join();
    }
    if let Some(handle) = writer {
        let _ = handle.join();
    }

    let status = waited?;
    let output = {
        let bytes = sink.lock().expect("output sink poisoned");
        String::from_utf8_lossy(&bytes).into_owned()
    };

    Ok(CommandResult {
        output,
        exit_code: exit_code_of(status),
    })
}

/// Copy a child stream into the shared sink chunk by chunk.
fn spawn_drain<R: Read + Send + 'static>(
    mut stream: R,
    sink: Arc<Mutex<Vec<u8>>>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut buf = [0u8; 8192];
        loop {
            match stream.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let mut sink = sink.lock().expect("output sink poisoned");
                    sink.extend_from_slice(&buf[..n]);
                }
            }
        }
    })
}

fn wait_with_timeout(child: &mut Child, limit: Duration) -> Result<ExitStatus, ExecError> {
    let start = Instant::now();
    loop {
        match child.try_wait().map_err(ExecError::Io)? {
            Some(status) => return Ok(status),
            None => {
                if start.elapsed() > limit {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ExecError::Timeout(limit.as_secs()));
                }
                thread::sleep(WAIT_POLL);
            }
        }
    }
}

fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}
