//! Background scheduling loop.
//!
//! A single long-lived task that, on every tick, reconciles the capacity
//! pool against queued demand and matches queued jobs to idle units in FIFO
//! order. Matching is never invoked synchronously by `dispatch`; the loop
//! runs independently until its cancellation token fires.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use vfp_core::{CoreError, JobId, JobInstance, JobState};

use crate::executor::{ExecSpec, ExecStatus, JobExecutor};
use crate::pool::ResourcePoolManager;
use crate::queue::JobQueue;

/// Default polling interval for the scheduler loop.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Matches queued jobs to worker capacity and drives them to completion.
pub struct Scheduler {
    queue: Arc<JobQueue>,
    pool: Arc<ResourcePoolManager>,
    executor: Arc<dyn JobExecutor>,
    poll_interval: Duration,
    /// Cancel handles for currently running jobs.
    running: Mutex<HashMap<JobId, CancellationToken>>,
}

impl Scheduler {
    /// Create a scheduler with the default poll interval.
    pub fn new(
        queue: Arc<JobQueue>,
        pool: Arc<ResourcePoolManager>,
        executor: Arc<dyn JobExecutor>,
    ) -> Self {
        Self::with_poll_interval(queue, pool, executor, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_poll_interval(
        queue: Arc<JobQueue>,
        pool: Arc<ResourcePoolManager>,
        executor: Arc<dyn JobExecutor>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            queue,
            pool,
            executor,
            poll_interval,
            running: Mutex::new(HashMap::new()),
        }
    }

    /// Run the scheduling loop until the cancellation token is triggered.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Scheduler started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Scheduler shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    /// One scheduling cycle: scale the pool, then match queued jobs to
    /// capacity in FIFO order until nothing more is ready.
    async fn tick(self: &Arc<Self>) {
        if let Err(e) = self.pool.reconcile(self.queue.queued_demand_vcpus()).await {
            tracing::error!(error = %e, "Pool reconcile failed");
        }

        loop {
            let Some(job) = self
                .queue
                .next_ready(|vcpus, memory| self.pool.has_idle_capacity(vcpus, memory))
            else {
                break;
            };

            let unit = match self.pool.request_capacity(job.id, job.vcpus, job.memory_mib) {
                Ok(unit) => unit,
                // Lost the capacity between the probe and the request;
                // re-poll on the next tick.
                Err(CoreError::CapacityUnavailable) => break,
                Err(e) => {
                    tracing::error!(job_id = %job.id, error = %e, "Capacity request failed");
                    break;
                }
            };

            if let Err(e) = self.queue.assign(job.id, unit.id) {
                // The job was cancelled between the probe and the
                // assignment. Give the unit back and move on.
                tracing::warn!(job_id = %job.id, error = %e, "Assignment lost, releasing unit");
                self.pool.release(unit.id);
                continue;
            }

            tracing::info!(job_id = %job.id, unit_id = %unit.id, "Job assigned to capacity unit");

            let scheduler = Arc::clone(self);
            tokio::spawn(async move {
                scheduler.execute(job, unit.id).await;
            });
        }
    }

    /// Run one assigned job to a terminal state and release its unit.
    async fn execute(self: Arc<Self>, job: JobInstance, unit_id: vfp_core::UnitId) {
        let cancel = CancellationToken::new();
        self.running
            .lock()
            .expect("scheduler running-set lock poisoned")
            .insert(job.id, cancel.clone());

        let spec = ExecSpec {
            job_id: job.id,
            container_image: job.container_image.clone(),
            args: job.rendered_arguments.clone(),
            env: job.rendered_environment.clone(),
            vcpus: job.vcpus,
            memory_mib: job.memory_mib,
        };

        let result = self.executor.run(spec, cancel).await;

        self.running
            .lock()
            .expect("scheduler running-set lock poisoned")
            .remove(&job.id);
        self.pool.release(unit_id);

        let transition = match result {
            Ok(outcome) => {
                let (state, detail) = match outcome.status {
                    ExecStatus::Succeeded => (JobState::Succeeded, None),
                    ExecStatus::Failed => (
                        JobState::Failed,
                        Some(format!(
                            "Exit code {}: {}",
                            outcome.exit_code, outcome.stderr_tail
                        )),
                    ),
                    ExecStatus::Cancelled => {
                        (JobState::Cancelled, Some("Terminated on request".to_string()))
                    }
                };
                self.queue
                    .mark_state(job.id, state, detail, outcome.output_location)
            }
            Err(e) => self.queue.mark_state(
                job.id,
                JobState::Failed,
                Some(format!("Executor error: {e}")),
                None,
            ),
        };

        if let Err(e) = transition {
            tracing::error!(job_id = %job.id, error = %e, "Failed to record terminal state");
        }
    }

    /// Request cancellation of a job.
    ///
    /// Queued jobs are cancelled immediately. Running jobs get a best-effort
    /// termination signal; the state changes to `Cancelled` only once the
    /// executor confirms the process exited. Terminal jobs are rejected with
    /// [`CoreError::InvalidTransition`].
    pub fn cancel(&self, job_id: JobId) -> Result<(), CoreError> {
        let job = self.queue.job(job_id).ok_or(CoreError::NotFound {
            entity: "JobInstance",
            id: job_id.to_string(),
        })?;

        match job.state {
            JobState::Running => {
                if let Some(token) = self
                    .running
                    .lock()
                    .expect("scheduler running-set lock poisoned")
                    .get(&job_id)
                {
                    token.cancel();
                }
                tracing::info!(job_id = %job_id, "Cancellation signalled to executor");
                Ok(())
            }
            _ => self.queue.mark_state(
                job_id,
                JobState::Cancelled,
                Some("Cancelled before execution".to_string()),
                None,
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
