//! `onair-core`: identifiers, scope decisions, configuration and the
//! top-level error type shared by every onair crate.

pub mod config;
pub mod error;
pub mod types;

pub use config::OnairConfig;
pub use error::{OnairError, Result};
pub use types::{AssignmentId, ChangeScope, SlotId, WorkerId};
