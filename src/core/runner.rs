use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::core::command::EngineCommand;
use crate::core::error::LzwError;

const POLL_INTERVAL: Duration = Duration::from_millis(20);
/// How long to wait for the error stream to close once the engine is gone.
/// Descendants of the engine can keep the pipe open long after it exits.
const STDERR_DRAIN: Duration = Duration::from_millis(500);

/// Something that can carry out an engine command inside a workspace.
pub trait Engine: Send + Sync {
    fn invoke(&self, command: &EngineCommand, workdir: &Path) -> Result<(), LzwError>;
}

/// Runs the external engine binary as a child process.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    program: PathBuf,
    timeout: Option<Duration>,
}

impl ProcessEngine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    /// Relative paths with a directory part ("./main", "bin/lzw") are taken
    /// relative to the working directory the engine runs in; bare names are
    /// looked up on PATH.
    fn resolve_program(&self, workdir: &Path) -> PathBuf {
        let has_dir = self.program.components().count() > 1;
        if self.program.is_relative() && has_dir {
            workdir.join(&self.program)
        } else {
            self.program.clone()
        }
    }
}

impl Engine for ProcessEngine {
    fn invoke(&self, command: &EngineCommand, workdir: &Path) -> Result<(), LzwError> {
        let command_line = command.command_line(&self.program);
        let program = self.resolve_program(workdir);
        debug!(%command_line, workdir = %workdir.display(), "invoking engine");

        let mut cmd = Command::new(&program);
        cmd.args(command.to_args())
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LzwError::BinaryNotFound {
                    program: program.clone(),
                    command_line: command_line.clone(),
                }
            } else {
                LzwError::ProcessFailed {
                    exit_code: None,
                    command_line: command_line.clone(),
                    stderr: e.to_string(),
                }
            }
        })?;
        let mut child = ChildGuard::new(child);

        let stderr = child.take_stderr().ok_or_else(|| LzwError::ProcessFailed {
            exit_code: None,
            command_line: command_line.clone(),
            stderr: "failed to capture engine stderr".to_string(),
        })?;
        let capture = spawn_stderr_reader(stderr);

        let waited = child.wait(self.timeout);
        if waited.as_ref().map_or(true, |status| status.is_none()) {
            child.kill_and_reap();
        }
        let stderr = capture.finish(STDERR_DRAIN);

        let status = match waited {
            Ok(Some(status)) => status,
            Ok(None) => {
                let timeout = self.timeout.unwrap_or_default();
                warn!(%command_line, ?timeout, "engine timed out and was killed");
                return Err(LzwError::TimedOut {
                    timeout,
                    command_line,
                    stderr,
                });
            }
            Err(e) => {
                return Err(LzwError::ProcessFailed {
                    exit_code: None,
                    command_line,
                    stderr: e.to_string(),
                })
            }
        };

        if status.success() {
            Ok(())
        } else {
            Err(LzwError::ProcessFailed {
                exit_code: status.code(),
                command_line,
                stderr,
            })
        }
    }
}

/// Owns a running engine process; dropping it kills and reaps the child if it
/// has not been waited on yet.
struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        Self { child, reaped: false }
    }

    fn take_stderr(&mut self) -> Option<std::process::ChildStderr> {
        self.child.stderr.take()
    }

    /// Waits for exit; `Ok(None)` means the timeout elapsed first.
    fn wait(&mut self, timeout: Option<Duration>) -> std::io::Result<Option<ExitStatus>> {
        let Some(timeout) = timeout else {
            let status = self.child.wait()?;
            self.reaped = true;
            return Ok(Some(status));
        };

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = self.child.try_wait()? {
                self.reaped = true;
                return Ok(Some(status));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn kill_and_reap(&mut self) {
        if self.reaped {
            return;
        }
        let _ = self.child.kill();
        let _ = self.child.wait();
        self.reaped = true;
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        self.kill_and_reap();
    }
}

/// Error stream collected by a reader thread.
struct StderrCapture {
    captured: Arc<Mutex<Vec<u8>>>,
    done: mpsc::Receiver<()>,
}

impl StderrCapture {
    /// Waits up to `drain` for end of stream, then returns whatever arrived.
    /// The reader thread is left behind if a stray process still holds the
    /// pipe.
    fn finish(self, drain: Duration) -> String {
        if let Err(RecvTimeoutError::Timeout) = self.done.recv_timeout(drain) {
            debug!("engine error stream still open; returning partial output");
        }
        let captured = self.captured.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&captured).into_owned()
    }
}

/// Collects the whole error stream, logging each line as it arrives.
fn spawn_stderr_reader<R: Read + Send + 'static>(stderr: R) -> StderrCapture {
    let captured = Arc::new(Mutex::new(Vec::new()));
    let (done_tx, done) = mpsc::channel();
    let sink = Arc::clone(&captured);

    thread::spawn(move || {
        let mut reader = BufReader::new(stderr);
        let mut line_buf: Vec<u8> = Vec::new();

        loop {
            line_buf.clear();
            match reader.read_until(b'\n', &mut line_buf) {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&line_buf);
                    let line = line.trim_end_matches(&['\r', '\n'][..]);
                    if !line.is_empty() {
                        debug!(target: "lzwflow::engine", "{line}");
                    }
                    sink.lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .extend_from_slice(&line_buf);
                }
                Err(_) => break,
            }
        }

        let _ = done_tx.send(());
    });

    StderrCapture { captured, done }
}
