use thiserror::Error;

/// Errors raised by the schedule engine.
///
/// Conflicts are not errors; they come back as
/// [`SlotWrite::Conflict`](crate::types::SlotWrite).
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// Backing store failed. The whole transaction was rolled back and
    /// nothing was retried.
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Slot not found: {id}")]
    SlotNotFound { id: String },

    /// Soft-deleted slots must be restored before they can be edited.
    #[error("Slot {id} is deleted")]
    SlotDeleted { id: String },

    /// The operation needs a week instance but was given a template row.
    #[error("Slot {id} is not a week instance")]
    NotAnInstance { id: String },

    #[error("Slot {id} is not a template")]
    NotATemplate { id: String },

    #[error("Invalid time range: {start}-{end}")]
    InvalidTimeRange { start: String, end: String },

    #[error("Invalid time: {0}")]
    InvalidTime(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Invalid day of week: {0}")]
    InvalidDay(u8),

    #[error("No days selected")]
    EmptyDaySet,
}

impl ScheduleError {
    /// Storage failures may succeed on a later attempt; everything else is a
    /// caller error that will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ScheduleError::Storage(_))
    }
}

pub type Result<T> = std::result::Result<T, ScheduleError>;
