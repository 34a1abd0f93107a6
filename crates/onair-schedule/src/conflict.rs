//! Conflict Detector: overlap checks inside one scope bucket and day.

use std::fmt;

use onair_core::SlotId;
use serde::Serialize;

use crate::error::{Result, ScheduleError};
use crate::store::SlotStore;
use crate::time::TimeRange;
use crate::types::{ScheduleSlot, SlotFilter, SlotScope};
use crate::week::DayOfWeek;

/// A candidate range collides with an existing live slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub day: DayOfWeek,
    pub candidate: TimeRange,
    /// The slot already occupying the range.
    pub slot: ScheduleSlot,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} overlaps {}",
            self.day,
            self.candidate,
            self.slot.label()
        )
    }
}

/// First live slot in `slots` on `day` whose range overlaps `range`,
/// skipping `exclude`.
pub fn find_overlap<'a>(
    slots: &'a [ScheduleSlot],
    day: DayOfWeek,
    range: &TimeRange,
    exclude: Option<&SlotId>,
) -> Option<&'a ScheduleSlot> {
    slots.iter().find(|s| {
        s.is_live() && s.day == day && Some(&s.id) != exclude && s.range.overlaps(range)
    })
}

/// Check one candidate against its scope bucket (all templates, or one
/// week's instances).
pub fn has_conflict<S: SlotStore + ?Sized>(
    store: &S,
    scope: &SlotScope,
    day: DayOfWeek,
    range: &TimeRange,
    exclude: Option<&SlotId>,
) -> Result<Option<Conflict>> {
    let bucket = store.fetch_slots(&SlotFilter::for_scope(scope).on_day(day))?;
    Ok(find_overlap(&bucket, day, range, exclude).map(|slot| Conflict {
        day,
        candidate: *range,
        slot: slot.clone(),
    }))
}

/// Check the same range on several days. Every day is checked before the
/// caller writes anything; the first conflicting day wins.
pub fn check_days<S: SlotStore + ?Sized>(
    store: &S,
    scope: &SlotScope,
    days: &[DayOfWeek],
    range: &TimeRange,
    exclude: Option<&SlotId>,
) -> Result<Option<Conflict>> {
    if days.is_empty() {
        return Err(ScheduleError::EmptyDaySet);
    }
    for &day in days {
        if let Some(conflict) = has_conflict(store, scope, day, range, exclude)? {
            return Ok(Some(conflict));
        }
    }
    Ok(None)
}
