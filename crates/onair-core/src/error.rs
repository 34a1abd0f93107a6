use thiserror::Error;

#[derive(Debug, Error)]
pub enum OnairError {
    #[error("Configuration error: {0}")]
    Config(String),
}

impl OnairError {
    /// Short error code string for machine-readable CLI output.
    pub fn code(&self) -> &'static str {
        match self {
            OnairError::Config(_) => "CONFIG_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, OnairError>;
