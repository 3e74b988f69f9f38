//! FIFO job queue.
//!
//! The queue owns every [`JobInstance`] from submission until it reaches a
//! terminal state. It is shared mutable state; concurrent dispatcher calls
//! and the scheduler loop all go through one internal mutex, so state
//! transitions and unit assignment are atomic with respect to readers.
//!
//! Single priority level; within it strict first-in-first-out order.
//! `Failed` jobs are never retried by the queue; a retry is a fresh
//! dispatch producing a new instance.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use vfp_core::{CoreError, JobId, JobInstance, JobState, UnitId};
use vfp_events::{EventBus, JobEvent};

struct QueueInner {
    /// Every job instance this process has accepted, keyed by id.
    jobs: HashMap<JobId, JobInstance>,
    /// Ids of `Queued` jobs in arrival order.
    fifo: VecDeque<JobId>,
}

/// Ordered queue of submitted jobs awaiting capacity.
pub struct JobQueue {
    inner: Mutex<QueueInner>,
    bus: Arc<EventBus>,
}

impl JobQueue {
    /// Create an empty queue publishing lifecycle events on `bus`.
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                jobs: HashMap::new(),
                fifo: VecDeque::new(),
            }),
            bus,
        }
    }

    /// Accept a freshly submitted job, returning its queue position.
    ///
    /// Transitions the job `Submitted -> Queued`. Queue depth is unbounded
    /// by design; admission control is a policy the original system also
    /// does not enforce.
    pub fn enqueue(&self, mut job: JobInstance) -> Result<usize, CoreError> {
        job.state.validate_transition(JobState::Queued)?;
        job.state = JobState::Queued;

        let mut inner = self.lock();
        let job_id = job.id;
        let position = inner.fifo.len();
        inner.fifo.push_back(job_id);
        inner.jobs.insert(job_id, job);
        drop(inner);

        self.bus.publish(
            JobEvent::transition(job_id, JobState::Queued)
                .with_payload(serde_json::json!({ "position": position })),
        );
        Ok(position)
    }

    /// Snapshot of the oldest `Queued` job whose resource request passes
    /// `has_capacity`, or `None` when nothing is ready.
    ///
    /// The job stays queued; callers follow up with
    /// [`assign`](JobQueue::assign) once a unit is actually held.
    pub fn next_ready<F>(&self, has_capacity: F) -> Option<JobInstance>
    where
        F: Fn(u32, u32) -> bool,
    {
        let inner = self.lock();
        inner
            .fifo
            .iter()
            .filter_map(|id| inner.jobs.get(id))
            .find(|job| has_capacity(job.vcpus, job.memory_mib))
            .cloned()
    }

    /// Bind a queued job to a capacity unit and mark it `Running`.
    pub fn assign(&self, job_id: JobId, unit_id: UnitId) -> Result<(), CoreError> {
        let mut inner = self.lock();
        let job = inner.jobs.get_mut(&job_id).ok_or(CoreError::NotFound {
            entity: "JobInstance",
            id: job_id.to_string(),
        })?;

        job.state.validate_transition(JobState::Running)?;
        job.state = JobState::Running;
        job.assigned_unit = Some(unit_id);
        inner.fifo.retain(|id| *id != job_id);
        drop(inner);

        self.bus.publish(
            JobEvent::transition(job_id, JobState::Running)
                .with_payload(serde_json::json!({ "unitId": unit_id })),
        );
        Ok(())
    }

    /// Transition a job to `new_state`, with an optional detail message and
    /// output location for terminal states.
    ///
    /// Rejects transitions the state machine forbids; terminal states have
    /// no exits. Entering a terminal state releases the job's unit binding
    /// and removes it from the FIFO (covers cancellation while queued).
    pub fn mark_state(
        &self,
        job_id: JobId,
        new_state: JobState,
        detail: Option<String>,
        output_location: Option<String>,
    ) -> Result<(), CoreError> {
        let mut inner = self.lock();
        let job = inner.jobs.get_mut(&job_id).ok_or(CoreError::NotFound {
            entity: "JobInstance",
            id: job_id.to_string(),
        })?;

        job.state.validate_transition(new_state)?;
        job.state = new_state;
        if new_state.is_terminal() {
            job.assigned_unit = None;
            job.exit_message = detail.clone();
            job.output_location = output_location;
            inner.fifo.retain(|id| *id != job_id);
        }
        drop(inner);

        let mut event = JobEvent::transition(job_id, new_state);
        if let Some(detail) = detail {
            event = event.with_detail(detail);
        }
        self.bus.publish(event);
        Ok(())
    }

    /// Snapshot of a single job.
    pub fn job(&self, job_id: JobId) -> Option<JobInstance> {
        self.lock().jobs.get(&job_id).cloned()
    }

    /// Snapshot of every job this process has accepted, oldest first.
    pub fn jobs(&self) -> Vec<JobInstance> {
        let inner = self.lock();
        let mut jobs: Vec<_> = inner.jobs.values().cloned().collect();
        jobs.sort_by_key(|job| job.id);
        jobs
    }

    /// Number of jobs currently waiting for capacity.
    pub fn queued_depth(&self) -> usize {
        self.lock().fifo.len()
    }

    /// Total vCPUs requested by currently queued jobs. Drives pool scaling.
    pub fn queued_demand_vcpus(&self) -> u32 {
        let inner = self.lock();
        inner
            .fifo
            .iter()
            .filter_map(|id| inner.jobs.get(id))
            .map(|job| job.vcpus)
            .sum()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueInner> {
        self.inner.lock().expect("job queue lock poisoned")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
