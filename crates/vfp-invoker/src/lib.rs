//! HTTP edge of the vendor feed processor.
//!
//! Receives "new object arrived" notifications from the storage
//! notification source, dispatches them into the engine, and exposes job
//! inspection and cancellation endpoints.

pub mod config;
pub mod error;
pub mod handlers;
pub mod response;
pub mod routes;
pub mod state;
