use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, warn};

use crate::{error::Error, types::ResourceLimits, Result};

const MINIMAL_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// How long the output readers may keep draining after the process is gone
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Captured behavior of one finished subprocess
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl ProcessOutput {
    /// Exit code, or `None` if the process was terminated by a signal
    pub fn exit_code(&self) -> Option<i32> {
        self.status.code()
    }

    pub fn signal(&self) -> Option<i32> {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            self.status.signal()
        }
        #[cfg(not(unix))]
        {
            None
        }
    }
}

/// Launches subprocesses with a scrubbed environment, no stdin, a wall-clock
/// deadline and optional rlimits. Each child gets its own process group so a
/// timeout takes down anything it forked.
#[derive(Debug, Clone)]
pub struct Sandbox {
    working_dir: PathBuf,
    limits: Option<ResourceLimits>,
    env: Vec<(String, OsString)>,
    max_output_bytes: usize,
}

impl Sandbox {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            limits: None,
            env: vec![("PATH".to_string(), OsString::from(MINIMAL_PATH))],
            max_output_bytes: ResourceLimits::default().max_output_bytes,
        }
    }

    /// Apply rlimits to every child started from this sandbox
    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.max_output_bytes = limits.max_output_bytes;
        self.limits = Some(limits);
        self
    }

    /// Add or replace one environment variable passed to children
    pub fn with_env(mut self, key: &str, value: impl Into<OsString>) -> Self {
        self.env.retain(|(k, _)| k != key);
        self.env.push((key.to_string(), value.into()));
        self
    }

    /// Run `program` with `args` and wait at most `timeout`.
    ///
    /// Returns [`Error::ExecutionLaunchFailed`] when the process cannot be started
    /// and [`Error::Timeout`] (with whatever output was produced) when the deadline
    /// passes. A non-zero exit is not an error here.
    pub async fn execute(
        &self,
        program: &Path,
        args: &[OsString],
        timeout: Duration,
    ) -> Result<ProcessOutput> {
        debug!("Sandbox execute - Command: {:?}", program);
        debug!("Sandbox execute - Args: {:?}", args);
        debug!("Sandbox execute - Working dir: {:?}", self.working_dir);

        let mut command = Command::new(program);
        command
            .args(args)
            .env_clear()
            .envs(self.env.iter().map(|(k, v)| (k, v)))
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let limits = self.limits.clone();
        unsafe {
            command.pre_exec(move || {
                nix::unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0))?;
                if let Some(limits) = &limits {
                    apply_limits(limits)?;
                }
                Ok(())
            });
        }

        let start = Instant::now();
        let mut child = command.spawn().map_err(|e| Error::ExecutionLaunchFailed {
            path: program.to_path_buf(),
            reason: e.to_string(),
        })?;
        let mut group = ProcessGroup::new(child.id());

        let stdout_reader = child
            .stdout
            .take()
            .map(|out| tokio::spawn(read_capped(out, self.max_output_bytes)));
        let stderr_reader = child
            .stderr
            .take()
            .map(|err| tokio::spawn(read_capped(err, self.max_output_bytes)));

        let waited = time::timeout(timeout, child.wait()).await;
        let elapsed = start.elapsed();

        // Reap anything the child left behind in its group, whatever the outcome.
        group.kill();

        match waited {
            Ok(Ok(status)) => Ok(ProcessOutput {
                status,
                stdout: collect(stdout_reader).await,
                stderr: collect(stderr_reader).await,
                elapsed,
            }),
            Ok(Err(e)) => Err(Error::Io(e)),
            Err(_) => {
                warn!("Process {:?} exceeded {:?}, killed", program, timeout);
                if let Err(e) = child.kill().await {
                    debug!("Kill after timeout failed: {}", e);
                }
                Err(Error::Timeout {
                    limit: timeout,
                    stdout: collect(stdout_reader).await,
                    stderr: collect(stderr_reader).await,
                })
            }
        }
    }
}

/// SIGKILLs a child's process group once, either explicitly or when dropped.
/// Dropping covers the case where the future driving the child is cancelled.
struct ProcessGroup {
    pgid: Option<Pid>,
}

impl ProcessGroup {
    fn new(pid: Option<u32>) -> Self {
        Self {
            pgid: pid.map(|id| Pid::from_raw(id as i32)),
        }
    }

    fn kill(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            if let Err(e) = killpg(pgid, Signal::SIGKILL) {
                // ESRCH: the whole group already exited
                if e != nix::errno::Errno::ESRCH {
                    debug!("killpg({}) failed: {}", pgid, e);
                }
            }
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

fn apply_limits(limits: &ResourceLimits) -> std::io::Result<()> {
    use nix::sys::resource::{setrlimit, Resource};

    if let Some(cpu_time) = limits.cpu_time {
        setrlimit(Resource::RLIMIT_CPU, cpu_time, cpu_time)?;
    }
    if let Some(file_size) = limits.file_size {
        setrlimit(Resource::RLIMIT_FSIZE, file_size, file_size)?;
    }
    #[cfg(target_os = "linux")]
    {
        if let Some(memory) = limits.memory {
            setrlimit(Resource::RLIMIT_AS, memory, memory)?;
        }
    }
    Ok(())
}

/// Read a stream to EOF, keeping at most `cap` bytes
async fn read_capped<R: AsyncRead + Unpin>(mut reader: R, cap: usize) -> Vec<u8> {
    let mut kept = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let room = cap.saturating_sub(kept.len());
                kept.extend_from_slice(&chunk[..n.min(room)]);
            }
        }
    }
    kept
}

async fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> String {
    let Some(mut handle) = reader else {
        return String::new();
    };
    match time::timeout(DRAIN_GRACE, &mut handle).await {
        Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
        Ok(Err(e)) => {
            warn!("Output reader failed: {}", e);
            String::new()
        }
        Err(_) => {
            handle.abort();
            String::new()
        }
    }
}
