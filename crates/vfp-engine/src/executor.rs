//! Job execution interface and the container runtime implementation.
//!
//! The executor is the boundary to the external collaborator that actually
//! performs per-file processing. The engine only sees [`JobExecutor`]: hand
//! over a fully rendered [`ExecSpec`], get back a terminal [`ExecOutcome`].
//! [`ContainerExecutor`] is the production implementation, spawning the
//! configured container runtime as a child process.

use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use vfp_core::JobId;

/// Maximum stdout or stderr size captured per stream (1 MiB).
///
/// Output beyond this limit is truncated to bound memory use; the job's
/// real output goes to its output location, not to these streams.
const MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// Fully rendered inputs for one job execution.
#[derive(Debug, Clone)]
pub struct ExecSpec {
    pub job_id: JobId,
    /// Container image reference to run.
    pub container_image: String,
    /// Resolved command-line arguments, in order.
    pub args: Vec<String>,
    /// Resolved environment mapping.
    pub env: BTreeMap<String, String>,
    pub vcpus: u32,
    pub memory_mib: u32,
}

/// How an execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStatus {
    Succeeded,
    Failed,
    /// Terminated on request; reported only after the process actually
    /// exited.
    Cancelled,
}

/// Terminal result of one execution.
#[derive(Debug, Clone)]
pub struct ExecOutcome {
    pub status: ExecStatus,
    /// Process exit code (`-1` if killed by signal).
    pub exit_code: i32,
    /// Where the job wrote its output, when it reported one.
    pub output_location: Option<String>,
    /// Trailing stderr, kept for failure diagnostics.
    pub stderr_tail: String,
}

/// Errors that prevent an execution from producing an outcome at all.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("Failed to spawn container runtime: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Runs one rendered job to a terminal outcome.
///
/// Execution duration is unbounded; cancellation is best-effort via the
/// token and must be confirmed by the returned outcome, never assumed.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    async fn run(&self, spec: ExecSpec, cancel: CancellationToken) -> Result<ExecOutcome, ExecError>;
}

/// Executor that shells out to a container runtime binary.
///
/// Builds `"<runtime> run --rm -e K=V… <image> <args…>"` per job and waits
/// for the child to exit. On cancellation the child is killed and the
/// outcome is reported as cancelled only once the process is gone.
pub struct ContainerExecutor {
    /// Container runtime binary, e.g. `docker` or `podman`.
    runtime: String,
}

impl ContainerExecutor {
    pub fn new(runtime: impl Into<String>) -> Self {
        Self {
            runtime: runtime.into(),
        }
    }

    fn command(&self, spec: &ExecSpec) -> Command {
        let mut cmd = Command::new(&self.runtime);
        cmd.arg("run").arg("--rm");
        cmd.arg("--cpus").arg(spec.vcpus.to_string());
        cmd.arg("--memory").arg(format!("{}m", spec.memory_mib));
        for (key, value) in &spec.env {
            cmd.arg("-e").arg(format!("{key}={value}"));
        }
        cmd.arg(&spec.container_image);
        cmd.args(&spec.args);
        cmd
    }
}

#[async_trait]
impl JobExecutor for ContainerExecutor {
    async fn run(&self, spec: ExecSpec, cancel: CancellationToken) -> Result<ExecOutcome, ExecError> {
        let mut cmd = self.command(&spec);
        // `kill_on_drop(true)` ensures the child dies if this task is dropped.
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let start = Instant::now();
        let mut child = cmd.spawn()?;

        // Read output streams in spawned tasks so `child.wait()` (which
        // borrows `&mut child`) can run concurrently.
        let stdout_handle = child.stdout.take();
        let stderr_handle = child.stderr.take();
        let stdout_task = tokio::spawn(async move { read_stream(stdout_handle).await });
        let stderr_task = tokio::spawn(async move { read_stream(stderr_handle).await });

        let (status, cancelled) = tokio::select! {
            status = child.wait() => (status?, false),
            _ = cancel.cancelled() => {
                tracing::info!(job_id = %spec.job_id, "Kill requested, terminating container");
                let _ = child.kill().await;
                // Confirmation: only report cancelled once the child exited.
                (child.wait().await?, true)
            }
        };

        let stdout_bytes = stdout_task.await.unwrap_or_default();
        let stderr_bytes = stderr_task.await.unwrap_or_default();
        let stdout = String::from_utf8_lossy(&stdout_bytes);
        let stderr = String::from_utf8_lossy(&stderr_bytes);

        let exit_code = status.code().unwrap_or(-1);
        let outcome_status = if cancelled {
            ExecStatus::Cancelled
        } else if status.success() {
            ExecStatus::Succeeded
        } else {
            ExecStatus::Failed
        };

        tracing::info!(
            job_id = %spec.job_id,
            exit_code,
            duration_ms = start.elapsed().as_millis() as u64,
            status = ?outcome_status,
            "Container exited",
        );

        Ok(ExecOutcome {
            status: outcome_status,
            exit_code,
            // The worker prints its output location as the last stdout line.
            output_location: stdout.lines().last().map(str::to_string).filter(|s| !s.is_empty()),
            stderr_tail: stderr.chars().take(4096).collect(),
        })
    }
}

/// Read an entire output stream into a byte buffer, capped at [`MAX_OUTPUT_BYTES`].
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h)
            .take(MAX_OUTPUT_BYTES as u64)
            .read_to_end(&mut buf)
            .await;
    }
    buf
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
