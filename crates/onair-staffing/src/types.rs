use std::fmt;

use chrono::{NaiveTime, Utc};
use onair_core::{AssignmentId, ChangeScope, SlotId, WorkerId};
use onair_schedule::time::format_hhmm;
use onair_schedule::{DayOfWeek, ScheduleSlot, WeekAnchor};
use serde::{Deserialize, Serialize};

/// The parts of a slot that survive regeneration: a recurring rule made in
/// one week finds "the same show" in another week through these.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotCharacteristics {
    pub day: DayOfWeek,
    pub start_time: NaiveTime,
    pub show_name: String,
}

impl SlotCharacteristics {
    pub fn of(slot: &ScheduleSlot) -> Self {
        Self {
            day: slot.day,
            start_time: slot.range.start,
            show_name: slot.show_name.clone(),
        }
    }
}

impl fmt::Display for SlotCharacteristics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} '{}'",
            self.day,
            format_hhmm(self.start_time),
            self.show_name
        )
    }
}

/// A worker bound to a slot in some role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    /// Instance the assignment was made against.
    pub slot_id: SlotId,
    pub worker_id: WorkerId,
    pub role: String,
    /// Week of `slot_id`. For recurring rules, the first week they apply.
    pub week: WeekAnchor,
    pub is_recurring: bool,
    pub notes: Option<String>,
    /// Snapshot of the slot at creation time.
    pub characteristics: SlotCharacteristics,
    /// Recurring rules only: first week the rule no longer applies.
    pub ended_week: Option<WeekAnchor>,
    pub created_at: String,
}

impl Assignment {
    /// Build an assignment against `slot`, which must be a week instance.
    pub fn for_slot(
        slot: &ScheduleSlot,
        week: WeekAnchor,
        worker_id: &WorkerId,
        role: &str,
        is_recurring: bool,
        notes: Option<&str>,
    ) -> Self {
        Self {
            id: AssignmentId::new(),
            slot_id: slot.id.clone(),
            worker_id: worker_id.clone(),
            role: role.to_string(),
            week,
            is_recurring,
            notes: notes.map(str::to_string),
            characteristics: SlotCharacteristics::of(slot),
            ended_week: None,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    /// Whether this assignment can show up in `week` at all. Skips are
    /// applied by the store, not here.
    pub fn applies_to(&self, week: WeekAnchor) -> bool {
        if !self.is_recurring {
            return week == self.week;
        }
        week >= self.week && self.ended_week.map_or(true, |ended| week < ended)
    }

    /// Same worker doing the same job on the same show.
    pub fn duplicates(&self, other: &Assignment) -> bool {
        self.worker_id == other.worker_id
            && self.role == other.role
            && self.is_recurring == other.is_recurring
            && if self.is_recurring {
                self.characteristics == other.characteristics
            } else {
                self.slot_id == other.slot_id
            }
    }
}

/// A staffing request made from one slot in a week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRequest {
    /// The slot the administrator picked; its start time locates the slots on
    /// the other selected days.
    pub slot_id: SlotId,
    pub worker_id: WorkerId,
    pub role: String,
    pub days: Vec<DayOfWeek>,
    pub is_recurring: bool,
    pub notes: Option<String>,
}

impl AssignmentRequest {
    /// Single-day, week-only request for the slot's own day.
    pub fn for_slot(
        slot: &ScheduleSlot,
        worker_id: impl Into<WorkerId>,
        role: impl Into<String>,
    ) -> Self {
        Self {
            slot_id: slot.id.clone(),
            worker_id: worker_id.into(),
            role: role.into(),
            days: vec![slot.day],
            is_recurring: false,
            notes: None,
        }
    }

    pub fn on_days(mut self, days: impl IntoIterator<Item = DayOfWeek>) -> Self {
        self.days = days.into_iter().collect();
        self
    }

    pub fn recurring(mut self) -> Self {
        self.is_recurring = true;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Which matcher tier found an assignment for a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    /// Made against this very instance.
    Direct,
    /// Standing rule whose snapshot equals the instance's current values.
    Recurring,
    /// Week-only assignment whose slot was regenerated under a new id.
    Fallback,
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchTier::Direct => write!(f, "direct"),
            MatchTier::Recurring => write!(f, "recurring"),
            MatchTier::Fallback => write!(f, "fallback"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Matched {
    pub tier: MatchTier,
    pub assignment: Assignment,
}

/// One slot of a week with everyone staffing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotRoster {
    pub slot: ScheduleSlot,
    pub assignments: Vec<Matched>,
}

/// What a delete actually did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DeleteAction {
    /// Week-only assignment row removed.
    Removed,
    /// Recurring rule suppressed for one week.
    Skipped { week: WeekAnchor },
    /// Recurring rule stops applying from `from` on.
    Ended { from: WeekAnchor },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignmentDeletion {
    pub assignment: Assignment,
    pub scope: ChangeScope,
    pub action: DeleteAction,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Weekday};
    use onair_schedule::{SlotDraft, TimeRange};

    fn week() -> WeekAnchor {
        WeekAnchor::containing(NaiveDate::from_ymd_opt(2026, 10, 11).unwrap(), Weekday::Sun)
    }

    fn slot() -> ScheduleSlot {
        let draft = SlotDraft::new("Morning Show", TimeRange::parse("09:00", "10:00").unwrap());
        ScheduleSlot::one_off(&draft, week(), DayOfWeek::SUNDAY)
    }

    #[test]
    fn week_only_assignment_applies_to_its_week() {
        let a = Assignment::for_slot(&slot(), week(), &WorkerId::from("42"), "host", false, None);
        assert!(a.applies_to(week()));
        assert!(!a.applies_to(week().next()));
        assert!(!a.applies_to(week().prev()));
    }

    #[test]
    fn recurring_rule_applies_forward_until_ended() {
        let mut a = Assignment::for_slot(&slot(), week(), &WorkerId::from("42"), "host", true, None);
        assert!(!a.applies_to(week().prev()));
        assert!(a.applies_to(week().offset_weeks(20)));

        a.ended_week = Some(week().offset_weeks(2));
        assert!(a.applies_to(week().next()));
        assert!(!a.applies_to(week().offset_weeks(2)));
    }

    #[test]
    fn duplicates_compare_the_right_key() {
        let slot = slot();
        let worker = WorkerId::from("42");
        let a = Assignment::for_slot(&slot, week(), &worker, "host", false, None);
        let b = Assignment::for_slot(&slot, week(), &worker, "host", false, Some("again"));
        assert!(a.duplicates(&b));

        let other_role = Assignment::for_slot(&slot, week(), &worker, "producer", false, None);
        assert!(!a.duplicates(&other_role));

        let rule = Assignment::for_slot(&slot, week(), &worker, "host", true, None);
        assert!(!a.duplicates(&rule));
        let mut later = Assignment::for_slot(&slot, week().next(), &worker, "host", true, None);
        later.slot_id = SlotId::new();
        assert!(rule.duplicates(&later));
    }

    #[test]
    fn characteristics_display() {
        assert_eq!(
            SlotCharacteristics::of(&slot()).to_string(),
            "Sun 09:00 'Morning Show'"
        );
    }
}
