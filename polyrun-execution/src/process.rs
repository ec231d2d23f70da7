//! Child process runner with wall-clock timeout and concurrent stream draining

use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::ExecutionError;

/// How long to wait for a killed child to be reaped
const REAP_GRACE: Duration = Duration::from_millis(500);

/// How long output is still drained after the child itself has exited
const DRAIN_GRACE: Duration = Duration::from_millis(200);

/// A fully rendered process invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Text written to the child's stdin, which is closed afterwards.
    /// `None` attaches stdin to the null device.
    pub stdin: Option<String>,
    pub cwd: Option<PathBuf>,
}

impl ProcessSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

/// Outcome of one child process
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was killed by a signal or timed out
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub duration: Duration,
}

impl ProcessOutcome {
    /// Exited on its own with status zero
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Run `spec` to completion or until `timeout` elapses
///
/// stdout and stderr are drained concurrently with the wait so a child that
/// fills a pipe buffer cannot stall. Once the child exits, its output is
/// drained for a short grace period and anything left in its process group is
/// killed; descendants are never waited for. On timeout the whole group is
/// killed and any partial output is discarded. Spawn failures are reported as
/// [`ExecutionError::SpawnError`].
pub async fn run_process(spec: ProcessSpec, timeout: Duration) -> Result<ProcessOutcome, ExecutionError> {
    let started = Instant::now();

    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .stdin(if spec.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(cwd) = &spec.cwd {
        cmd.current_dir(cwd);
    }

    // Own process group, so descendants can be killed together
    #[cfg(unix)]
    {
        cmd.process_group(0);
    }

    let mut child = cmd.spawn().map_err(|e| ExecutionError::SpawnError {
        program: spec.program.clone(),
        message: e.to_string(),
    })?;
    let pid = child.id();
    debug!("Spawned '{}' (pid {:?})", spec.program, pid);

    let stdin = child.stdin.take();
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| ExecutionError::ProcessIo("stdout pipe unavailable".to_string()))?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| ExecutionError::ProcessIo("stderr pipe unavailable".to_string()))?;

    let input = spec.stdin;
    let write_stdin = async move {
        if let (Some(mut pipe), Some(input)) = (stdin, input) {
            match pipe.write_all(input.as_bytes()).await {
                // The child may exit without reading its input
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
                other => other?,
            }
            drop(pipe);
        }
        Ok::<(), io::Error>(())
    };

    // Read into buffers that outlive the readers, so output gathered before
    // the drain grace expires is kept
    let mut out = Vec::new();
    let mut err = Vec::new();
    let collected = tokio::time::timeout(timeout, async {
        let streams = async {
            tokio::try_join!(write_stdin, stdout.read_to_end(&mut out), stderr.read_to_end(&mut err)).map(drop)
        };
        tokio::pin!(streams);

        tokio::select! {
            status = child.wait() => {
                let status = status?;
                // Background descendants may keep the pipes open after the child exits
                match tokio::time::timeout(DRAIN_GRACE, &mut streams).await {
                    Ok(drained) => drained?,
                    Err(_) => debug!("'{}' exited with descendants holding its output open", spec.program),
                }
                Ok::<ExitStatus, io::Error>(status)
            }
            drained = &mut streams => {
                drained?;
                child.wait().await
            }
        }
    })
    .await;

    match collected {
        Ok(Ok(status)) => {
            // Nothing the child started outlives the run
            kill_group(pid);
            Ok(ProcessOutcome {
                stdout: String::from_utf8_lossy(&out).into_owned(),
                stderr: String::from_utf8_lossy(&err).into_owned(),
                exit_code: status.code(),
                timed_out: false,
                duration: started.elapsed(),
            })
        }
        Ok(Err(e)) => {
            terminate(&mut child, pid).await;
            Err(ExecutionError::ProcessIo(e.to_string()))
        }
        Err(_) => {
            debug!("'{}' exceeded {:?}, killing", spec.program, timeout);
            terminate(&mut child, pid).await;
            Ok(ProcessOutcome {
                stdout: String::new(),
                stderr: String::new(),
                exit_code: None,
                timed_out: true,
                duration: started.elapsed(),
            })
        }
    }
}

/// SIGKILL every process left in the child's process group
fn kill_group(pid: Option<u32>) {
    #[cfg(unix)]
    {
        use nix::errno::Errno;
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = pid {
            match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
                Ok(()) | Err(Errno::ESRCH) => {}
                Err(e) => debug!("Failed to kill process group {}: {}", pid, e),
            }
        }
    }
    #[cfg(not(unix))]
    let _ = pid;
}

/// Kill the child and everything in its process group, then reap it
async fn terminate(child: &mut Child, pid: Option<u32>) {
    kill_group(pid);

    if let Err(e) = child.start_kill() {
        debug!("Failed to kill process {:?}: {}", pid, e);
    }

    match tokio::time::timeout(REAP_GRACE, child.wait()).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => debug!("Failed to reap process {:?}: {}", pid, e),
        Err(_) => warn!("Process {:?} did not exit after being killed", pid),
    }
}

/// Poll until `pid` is gone or a zombie, returning false if it outlives `limit`
#[cfg(all(test, target_os = "linux"))]
pub(crate) async fn wait_for_exit(pid: i32, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    loop {
        let running = std::fs::read_to_string(format!("/proc/{}/stat", pid))
            .ok()
            .and_then(|stat| {
                let state = stat.rsplit_once(')')?.1.trim_start().chars().next()?;
                Some(state != 'Z' && state != 'X')
            })
            .unwrap_or(false);
        if !running {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
