//! `onair-schedule`: the recurring broadcast grid.
//!
//! # Overview
//!
//! A master schedule of *template* slots is defined once and projected onto
//! each calendar week as *instance* slots by [`materialize::materialize_week`].
//! Instances can be edited or deleted for one week without touching the
//! template, or the change can cascade into the template and every later
//! week. [`engine::ScheduleEngine`] ties the pieces together over SQLite.
//!
//! | Module        | Responsibility                                      |
//! |---------------|-----------------------------------------------------|
//! | `week`/`time` | Week anchors, days, time-range arithmetic            |
//! | `store`       | Slot Store Adapter (`SlotStore`, SQLite impl)        |
//! | `cache`       | Explicitly invalidated read cache over a store       |
//! | `materialize` | Template → week projection, pruning, re-sync         |
//! | `conflict`    | Overlap detection inside a scope bucket              |
//! | `resolver`    | Current-week vs all-future edit/delete semantics     |

pub mod cache;
pub mod conflict;
pub mod db;
pub mod engine;
pub mod error;
pub mod materialize;
pub mod resolver;
pub mod store;
pub mod time;
pub mod types;
pub mod week;

pub use conflict::Conflict;
pub use engine::ScheduleEngine;
pub use error::{Result, ScheduleError};
pub use store::SlotStore;
pub use time::TimeRange;
pub use types::{
    DeleteResult, DisplayCategory, EditResult, ScheduleSlot, SlotDraft, SlotFilter, SlotKind,
    SlotPatch, SlotScope, SlotWrite,
};
pub use week::{DayOfWeek, WeekAnchor};
