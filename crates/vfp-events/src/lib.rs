//! Job lifecycle event bus.
//!
//! Every observable state change of a job instance is published as a
//! [`JobEvent`] on the in-process [`EventBus`], so the scheduler, the HTTP
//! edge, and tests can observe dispatch behavior without polling the queue.

pub mod bus;

pub use bus::{EventBus, JobEvent};
