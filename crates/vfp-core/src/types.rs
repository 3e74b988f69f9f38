//! Identifier aliases and the arrival event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Job instance identifier. UUID v7 so ids sort by creation time.
pub type JobId = Uuid;

/// Job template identifier.
pub type TemplateId = Uuid;

/// Worker capacity unit identifier.
pub type UnitId = Uuid;

/// All timestamps are UTC.
pub type Timestamp = DateTime<Utc>;

/// Notification that a new vendor feed object is available for processing.
///
/// Produced by the object-storage notification source and consumed exactly
/// once by the dispatcher. Delivery is at-least-once upstream, so the same
/// event may be observed more than once; no deduplication happens here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrivalEvent {
    /// Bucket / container the object arrived in.
    pub source_location: String,
    /// Key of the new object within the source location.
    pub object_key: String,
    /// When the notification source observed the arrival (UTC).
    pub arrival_time: Timestamp,
}

impl ArrivalEvent {
    /// Create an event stamped with the current time.
    pub fn new(source_location: impl Into<String>, object_key: impl Into<String>) -> Self {
        Self {
            source_location: source_location.into(),
            object_key: object_key.into(),
            arrival_time: Utc::now(),
        }
    }

    /// Validate the event shape.
    ///
    /// Rules:
    /// - `source_location` must not be empty.
    /// - `object_key` must not be empty.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.source_location.is_empty() {
            return Err(CoreError::InvalidEvent(
                "sourceLocation must not be empty".to_string(),
            ));
        }
        if self.object_key.is_empty() {
            return Err(CoreError::InvalidEvent(
                "objectKey must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
