//! Job instances and worker capacity units.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::JobState;
use crate::template::JobTemplate;
use crate::types::{JobId, TemplateId, Timestamp, UnitId};

/// One concrete execution derived from a [`JobTemplate`].
///
/// Created by the dispatcher per arrival event and owned by the job queue
/// until it reaches a terminal state. Only `state`, `assigned_unit`, and the
/// outcome fields ever change after construction; identity and the template
/// reference do not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInstance {
    pub id: JobId,
    /// The template this instance was rendered from.
    pub template_id: TemplateId,
    /// Container image reference (copied from the template at render time).
    pub container_image: String,
    /// Fully resolved command-line arguments.
    pub rendered_arguments: Vec<String>,
    /// Fully resolved environment mapping.
    pub rendered_environment: BTreeMap<String, String>,
    /// vCPUs requested (copied from the template at render time).
    pub vcpus: u32,
    /// Memory requested in MiB (copied from the template at render time).
    pub memory_mib: u32,
    pub submitted_at: Timestamp,
    pub state: JobState,
    /// Capacity unit currently running this job, if any.
    pub assigned_unit: Option<UnitId>,
    /// Human-readable outcome detail for `Failed`/`Cancelled` jobs.
    pub exit_message: Option<String>,
    /// Where the executor wrote its output, when it reported one.
    pub output_location: Option<String>,
}

impl JobInstance {
    /// Build a freshly submitted instance from rendered template output.
    pub fn new(
        template: &JobTemplate,
        rendered_arguments: Vec<String>,
        rendered_environment: BTreeMap<String, String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            template_id: template.id,
            container_image: template.container_image.clone(),
            rendered_arguments,
            rendered_environment,
            vcpus: template.vcpus,
            memory_mib: template.memory_mib,
            submitted_at: Utc::now(),
            state: JobState::Submitted,
            assigned_unit: None,
            exit_message: None,
            output_location: None,
        }
    }
}

/// One schedulable slice of compute capacity.
///
/// Created and destroyed by the resource pool manager in response to queue
/// depth. Holds at most one job at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerCapacityUnit {
    pub id: UnitId,
    pub vcpus: u32,
    pub memory_mib: u32,
    /// Job currently assigned to this unit, if any.
    pub assigned_job: Option<JobId>,
    /// When the unit last became idle. Drives grace-period deprovisioning.
    pub idle_since: Timestamp,
}

impl WorkerCapacityUnit {
    /// Create an idle unit with a fresh id.
    pub fn new(vcpus: u32, memory_mib: u32) -> Self {
        Self {
            id: Uuid::now_v7(),
            vcpus,
            memory_mib,
            assigned_job: None,
            idle_since: Utc::now(),
        }
    }

    /// Whether this unit can serve a request of the given size.
    pub fn fits(&self, vcpus: u32, memory_mib: u32) -> bool {
        self.vcpus >= vcpus && self.memory_mib >= memory_mib
    }

    /// Whether the unit currently has no job assigned.
    pub fn is_idle(&self) -> bool {
        self.assigned_job.is_none()
    }
}
