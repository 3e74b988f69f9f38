//! Domain types for the vendor feed processor.
//!
//! This crate has zero internal dependencies so it can be used by the
//! engine, the invoker edge, and any future CLI tooling. It contains the
//! arrival-event and job data model, the job state machine, the template
//! rendering rules, and the shared error taxonomy.

pub mod error;
pub mod job;
pub mod state;
pub mod template;
pub mod types;

pub use error::CoreError;
pub use job::{JobInstance, WorkerCapacityUnit};
pub use state::JobState;
pub use template::JobTemplate;
pub use types::{ArrivalEvent, JobId, TemplateId, Timestamp, UnitId};
