use thiserror::Error;

#[derive(Debug, Error)]
pub enum StaffingError {
    /// Backing store failed; the transaction was rolled back.
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Assignment not found: {id}")]
    AssignmentNotFound { id: String },

    /// The anchor slot is not among the live slots of the week.
    #[error("Slot not found: {id}")]
    SlotNotFound { id: String },

    #[error("Slot {id} is not a week instance")]
    NotAnInstance { id: String },

    #[error("No days selected")]
    EmptyDaySet,
}

impl StaffingError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StaffingError::Storage(_))
    }
}

pub type Result<T> = std::result::Result<T, StaffingError>;
