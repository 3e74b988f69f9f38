//! Dispatch engine for the vendor feed processor.
//!
//! Turns an arrival notification into a running container job:
//!
//! - [`TemplateRegistry`]: write-once store of job templates.
//! - [`JobQueue`]: FIFO queue owning every job instance until terminal.
//! - [`ResourcePoolManager`]: elastic worker capacity between a configured
//!   minimum and maximum, backed by a [`CapacityProvider`].
//! - [`Scheduler`]: background loop matching queued jobs to idle capacity
//!   and driving execution through a [`JobExecutor`].
//! - [`JobDispatcher`]: the entry point: validate, render, enqueue.

pub mod dispatcher;
pub mod executor;
pub mod pool;
pub mod provider;
pub mod queue;
pub mod registry;
pub mod scheduler;

pub use dispatcher::{JobDispatcher, ProcessContext};
pub use executor::{ContainerExecutor, ExecOutcome, ExecSpec, ExecStatus, ExecError, JobExecutor};
pub use pool::{PoolConfig, ResourcePoolManager};
pub use provider::{CapacityProvider, ElasticProvider};
pub use queue::JobQueue;
pub use registry::TemplateRegistry;
pub use scheduler::Scheduler;
