//! `onair-staffing`: who works which slot.
//!
//! Assignments bind a worker to an instance slot in some role. Week-only
//! assignments are tied to one instance; recurring ones are standing rules
//! re-matched every week by the slot's day, start time and show name, since
//! instance ids change whenever a week is regenerated. See [`matcher`].

pub mod db;
pub mod error;
pub mod manager;
pub mod matcher;
pub mod store;
pub mod types;

pub use error::{Result, StaffingError};
pub use manager::RosterManager;
pub use matcher::{CharacteristicFallback, FallbackMatcher, NoFallback};
pub use store::AssignmentStore;
pub use types::{
    Assignment, AssignmentDeletion, AssignmentRequest, DeleteAction, MatchTier, Matched,
    SlotCharacteristics, SlotRoster,
};
