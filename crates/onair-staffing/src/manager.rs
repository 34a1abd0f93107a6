use std::collections::HashMap;
use std::sync::Mutex;

use onair_core::{AssignmentId, ChangeScope};
use onair_schedule::{ScheduleSlot, WeekAnchor};
use rusqlite::Connection;
use tracing::{debug, info, instrument, warn};

use crate::db::init_db;
use crate::error::{Result, StaffingError};
use crate::matcher::{match_slot, unmatched, CharacteristicFallback, FallbackMatcher};
use crate::store::{require_assignment, AssignmentStore};
use crate::types::{Assignment, AssignmentDeletion, AssignmentRequest, DeleteAction, SlotRoster};

/// Staffing for the broadcast grid.
///
/// Slots come from the schedule engine; callers pass the week's live
/// instances in, so the two stores can live in separate databases. Every
/// write is one SQLite transaction and nothing is cached, so reads always
/// see the last committed write.
pub struct RosterManager {
    db: Mutex<Connection>,
    fallback: Box<dyn FallbackMatcher>,
}

impl RosterManager {
    /// Wrap `conn` with the default tier-3 matcher, creating the schema if
    /// needed.
    pub fn new(conn: Connection) -> Result<Self> {
        Self::with_fallback(conn, Box::new(CharacteristicFallback))
    }

    pub fn with_fallback(conn: Connection, fallback: Box<dyn FallbackMatcher>) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
            fallback,
        })
    }

    /// Assignments staffing `slot` in its week.
    #[instrument(skip(self, slot), fields(slot_id = %slot.id))]
    pub fn assignments_for_slot(&self, slot: &ScheduleSlot) -> Result<Vec<Assignment>> {
        let week = require_week(slot)?;
        let assignments = self.transact(|store| store.fetch_assignments(week))?;
        let matched = match_slot(slot, &assignments, self.fallback.as_ref());
        debug!(count = matched.len(), "assignments matched");
        Ok(matched.into_iter().map(|m| m.assignment).collect())
    }

    /// Assign a worker to the request's slot and to the slots at the same
    /// start time on the other requested days. Days without such a slot are
    /// skipped. Re-assigning someone already assigned returns the existing
    /// row; a recurring rule that was ended or skipped for `week` is revived
    /// instead of duplicated.
    #[instrument(
        skip(self, request, week_slots),
        fields(slot_id = %request.slot_id, worker = %request.worker_id)
    )]
    pub fn create_assignment(
        &self,
        request: &AssignmentRequest,
        week_slots: &[ScheduleSlot],
    ) -> Result<Vec<Assignment>> {
        if request.days.is_empty() {
            return Err(StaffingError::EmptyDaySet);
        }
        let anchor = week_slots
            .iter()
            .find(|s| s.id == request.slot_id && s.is_live())
            .ok_or_else(|| StaffingError::SlotNotFound {
                id: request.slot_id.to_string(),
            })?;
        let week = require_week(anchor)?;

        let mut days = request.days.clone();
        days.sort();
        days.dedup();
        let targets: Vec<&ScheduleSlot> = days
            .into_iter()
            .filter_map(|day| {
                let found = week_slots.iter().find(|s| {
                    s.is_live()
                        && s.week() == Some(week)
                        && s.day == day
                        && s.range.start == anchor.range.start
                });
                if found.is_none() {
                    debug!(%day, "no slot at this start time; day skipped");
                }
                found
            })
            .collect();

        self.transact(|store| {
            let existing = store.fetch_assignments(week)?;
            let mut created = Vec::with_capacity(targets.len());
            for slot in targets {
                let candidate = Assignment::for_slot(
                    slot,
                    week,
                    &request.worker_id,
                    &request.role,
                    request.is_recurring,
                    request.notes.as_deref(),
                );
                if candidate.is_recurring {
                    created.push(standing_rule(store, candidate, week)?);
                    continue;
                }
                match existing.iter().find(|a| a.duplicates(&candidate)) {
                    Some(found) => {
                        debug!(assignment_id = %found.id, "already assigned");
                        created.push(found.clone());
                    }
                    None => created.push(store.insert_assignment(&candidate)?),
                }
            }
            info!(
                %week,
                count = created.len(),
                recurring = request.is_recurring,
                role = %request.role,
                "assignments created"
            );
            Ok(created)
        })
    }

    /// Remove an assignment as seen from `week`.
    ///
    /// Week-only rows are deleted outright. A recurring rule is skipped for
    /// `week` with [`ChangeScope::CurrentOnly`], or ended after `week` with
    /// [`ChangeScope::AllFuture`]; in the latter case `week` and earlier
    /// weeks keep matching.
    #[instrument(skip(self), fields(%week))]
    pub fn delete_assignment(
        &self,
        id: &AssignmentId,
        week: WeekAnchor,
        scope: ChangeScope,
    ) -> Result<AssignmentDeletion> {
        self.transact(|store| {
            let assignment = require_assignment(store, id)?;
            let (action, applied) = match (assignment.is_recurring, scope) {
                (false, _) => {
                    store.delete_assignment(id)?;
                    (DeleteAction::Removed, ChangeScope::CurrentOnly)
                }
                (true, ChangeScope::CurrentOnly) => {
                    store.skip_week(id, week)?;
                    (DeleteAction::Skipped { week }, ChangeScope::CurrentOnly)
                }
                (true, ChangeScope::AllFuture) => {
                    let from = match assignment.ended_week {
                        Some(ended) if ended <= week.next() => ended,
                        _ => week.next(),
                    };
                    store.end_recurring(id, from)?;
                    (DeleteAction::Ended { from }, ChangeScope::AllFuture)
                }
            };
            if applied != scope {
                warn!(assignment_id = %id, requested = %scope, %applied, "delete scope degraded");
            }
            info!(assignment_id = %id, action = ?action, "assignment deleted");
            Ok(AssignmentDeletion {
                assignment,
                scope: applied,
                action,
            })
        })
    }

    /// Every live instance in `week_slots` with its matched assignments.
    pub fn week_roster(&self, week_slots: &[ScheduleSlot]) -> Result<Vec<SlotRoster>> {
        let mut by_week: HashMap<WeekAnchor, Vec<Assignment>> = HashMap::new();
        let mut roster = Vec::new();
        for slot in week_slots.iter().filter(|s| s.is_live()) {
            let Some(week) = slot.week() else {
                continue;
            };
            if !by_week.contains_key(&week) {
                let fetched = self.transact(|store| store.fetch_assignments(week))?;
                by_week.insert(week, fetched);
            }
            let assignments = by_week.get(&week).map(Vec::as_slice).unwrap_or_default();
            roster.push(SlotRoster {
                slot: slot.clone(),
                assignments: match_slot(slot, assignments, self.fallback.as_ref()),
            });
        }
        Ok(roster)
    }

    /// Assignments applying to `week` that no live slot of `week_slots`
    /// claims, typically because their slot was pruned or retired.
    pub fn orphaned_assignments(
        &self,
        week: WeekAnchor,
        week_slots: &[ScheduleSlot],
    ) -> Result<Vec<Assignment>> {
        let assignments = self.transact(|store| store.fetch_assignments(week))?;
        let slots = in_week(week, week_slots);
        Ok(unmatched(&slots, &assignments, self.fallback.as_ref())
            .into_iter()
            .cloned()
            .collect())
    }

    /// Delete the week-only orphans of `week` and return them. Recurring
    /// rules are kept: a show missing for one week may return the next.
    #[instrument(skip(self, week_slots), fields(%week))]
    pub fn purge_orphans(
        &self,
        week: WeekAnchor,
        week_slots: &[ScheduleSlot],
    ) -> Result<Vec<Assignment>> {
        let slots = in_week(week, week_slots);
        self.transact(|store| {
            let assignments = store.fetch_assignments(week)?;
            let mut purged = Vec::new();
            for orphan in unmatched(&slots, &assignments, self.fallback.as_ref()) {
                if orphan.is_recurring {
                    debug!(assignment_id = %orphan.id, "recurring rule unmatched this week; kept");
                    continue;
                }
                store.delete_assignment(&orphan.id)?;
                purged.push(orphan.clone());
            }
            info!(count = purged.len(), "orphaned assignments purged");
            Ok(purged)
        })
    }

    fn transact<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.db.lock().unwrap();
        let tx = conn.transaction()?;
        let value = f(&*tx)?;
        tx.commit()?;
        Ok(value)
    }
}

/// The rule staffing `candidate`'s show from `week` on. An earlier rule for
/// the same worker and role is reused: its skip for `week` is lifted and an
/// end at or after `week` is pushed out. Otherwise `candidate` is inserted.
/// Either way the result stops where a later rule for the same job starts.
fn standing_rule<S: AssignmentStore + ?Sized>(
    store: &S,
    mut candidate: Assignment,
    week: WeekAnchor,
) -> Result<Assignment> {
    let rules: Vec<Assignment> = store
        .fetch_recurring(&candidate.characteristics)?
        .into_iter()
        .filter(|r| r.duplicates(&candidate))
        .collect();
    let next_start = rules.iter().map(|r| r.week).filter(|w| *w > week).min();
    let current = rules
        .iter()
        .find(|r| r.week <= week && r.ended_week.map_or(true, |ended| ended >= week));

    let Some(rule) = current else {
        candidate.ended_week = next_start;
        return store.insert_assignment(&candidate);
    };
    let mut revived = false;
    if let Some(ended) = rule.ended_week {
        match next_start {
            None => store.reopen_recurring(&rule.id)?,
            Some(next) if next > ended => store.end_recurring(&rule.id, next)?,
            Some(_) => {}
        }
        info!(assignment_id = %rule.id, %ended, "recurring rule reopened");
        revived = true;
    }
    if store.unskip_week(&rule.id, week)? {
        info!(assignment_id = %rule.id, %week, "recurring rule unskipped");
        revived = true;
    }
    if !revived {
        debug!(assignment_id = %rule.id, "already assigned");
    }
    require_assignment(store, &rule.id)
}

fn require_week(slot: &ScheduleSlot) -> Result<WeekAnchor> {
    slot.week().ok_or_else(|| StaffingError::NotAnInstance {
        id: slot.id.to_string(),
    })
}

fn in_week(week: WeekAnchor, slots: &[ScheduleSlot]) -> Vec<ScheduleSlot> {
    slots
        .iter()
        .filter(|s| s.week() == Some(week))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Weekday};
    use onair_core::WorkerId;
    use onair_schedule::{DayOfWeek, SlotDraft, TimeRange};

    fn manager() -> RosterManager {
        RosterManager::new(Connection::open_in_memory().unwrap()).unwrap()
    }

    fn week() -> WeekAnchor {
        WeekAnchor::containing(NaiveDate::from_ymd_opt(2026, 10, 11).unwrap(), Weekday::Sun)
    }

    fn slot(week: WeekAnchor, day: DayOfWeek, show: &str, start: &str, end: &str) -> ScheduleSlot {
        let draft = SlotDraft::new(show, TimeRange::parse(start, end).unwrap());
        ScheduleSlot::one_off(&draft, week, day)
    }

    fn weekday_mornings(week: WeekAnchor) -> Vec<ScheduleSlot> {
        vec![
            slot(week, DayOfWeek::MONDAY, "Breakfast", "06:00", "09:00"),
            slot(week, DayOfWeek::TUESDAY, "Breakfast", "06:00", "09:00"),
            slot(week, DayOfWeek::WEDNESDAY, "Breakfast", "06:30", "09:00"),
            slot(week, DayOfWeek::THURSDAY, "Breakfast", "06:00", "09:00"),
        ]
    }

    #[test]
    fn multi_day_create_skips_days_without_a_matching_slot() {
        let roster = manager();
        let slots = weekday_mornings(week());
        let request = AssignmentRequest::for_slot(&slots[0], "42", "host").on_days([
            DayOfWeek::MONDAY,
            DayOfWeek::TUESDAY,
            DayOfWeek::WEDNESDAY,
            DayOfWeek::FRIDAY,
        ]);
        let created = roster.create_assignment(&request, &slots).unwrap();
        let ids: Vec<_> = created.iter().map(|a| &a.slot_id).collect();
        assert_eq!(ids, vec![&slots[0].id, &slots[1].id]);
    }

    #[test]
    fn create_is_idempotent() {
        let roster = manager();
        let slots = weekday_mornings(week());
        let request = AssignmentRequest::for_slot(&slots[1], "42", "host");
        let first = roster.create_assignment(&request, &slots).unwrap();
        let second = roster.create_assignment(&request, &slots).unwrap();
        assert_eq!(first, second);
        assert_eq!(roster.assignments_for_slot(&slots[1]).unwrap().len(), 1);
    }

    #[test]
    fn create_rejects_unknown_anchor_and_empty_days() {
        let roster = manager();
        let slots = weekday_mornings(week());
        let stray = slot(week(), DayOfWeek::FRIDAY, "Late", "22:00", "23:00");
        assert!(matches!(
            roster.create_assignment(&AssignmentRequest::for_slot(&stray, "1", "host"), &slots),
            Err(StaffingError::SlotNotFound { .. })
        ));
        let empty = AssignmentRequest::for_slot(&slots[0], "1", "host").on_days([]);
        assert!(matches!(
            roster.create_assignment(&empty, &slots),
            Err(StaffingError::EmptyDaySet)
        ));
    }

    #[test]
    fn deleting_a_week_only_assignment_removes_it() {
        let roster = manager();
        let slots = weekday_mornings(week());
        let created = roster
            .create_assignment(&AssignmentRequest::for_slot(&slots[0], "42", "host"), &slots)
            .unwrap();
        let deletion = roster
            .delete_assignment(&created[0].id, week(), ChangeScope::AllFuture)
            .unwrap();
        assert_eq!(deletion.action, DeleteAction::Removed);
        assert_eq!(deletion.scope, ChangeScope::CurrentOnly);
        assert!(roster.assignments_for_slot(&slots[0]).unwrap().is_empty());
    }

    #[test]
    fn recurring_delete_scopes() {
        let roster = manager();
        let w1 = weekday_mornings(week());
        let rule = roster
            .create_assignment(
                &AssignmentRequest::for_slot(&w1[0], "42", "host").recurring(),
                &w1,
            )
            .unwrap()
            .remove(0);

        let w2 = weekday_mornings(week().next());
        let skipped = roster
            .delete_assignment(&rule.id, week().next(), ChangeScope::CurrentOnly)
            .unwrap();
        assert_eq!(skipped.action, DeleteAction::Skipped { week: week().next() });
        assert!(roster.assignments_for_slot(&w2[0]).unwrap().is_empty());

        let w3 = weekday_mornings(week().offset_weeks(2));
        assert_eq!(roster.assignments_for_slot(&w3[0]).unwrap().len(), 1);

        let ended = roster
            .delete_assignment(&rule.id, week().offset_weeks(2), ChangeScope::AllFuture)
            .unwrap();
        assert_eq!(ended.action, DeleteAction::Ended { from: week().offset_weeks(3) });
        assert_eq!(roster.assignments_for_slot(&w3[0]).unwrap().len(), 1);
        assert_eq!(roster.assignments_for_slot(&w1[0]).unwrap().len(), 1);
        let w4 = weekday_mornings(week().offset_weeks(3));
        assert!(roster.assignments_for_slot(&w4[0]).unwrap().is_empty());
    }

    fn host_rule(roster: &RosterManager, slots: &[ScheduleSlot]) -> Assignment {
        let request = AssignmentRequest::for_slot(&slots[0], "42", "host").recurring();
        roster.create_assignment(&request, slots).unwrap().remove(0)
    }

    #[test]
    fn recreating_an_ended_rule_reopens_it() {
        let roster = manager();
        let w1 = weekday_mornings(week());
        let rule = host_rule(&roster, &w1);
        roster
            .delete_assignment(&rule.id, week(), ChangeScope::AllFuture)
            .unwrap();
        let w3 = weekday_mornings(week().offset_weeks(2));
        assert!(roster.assignments_for_slot(&w3[0]).unwrap().is_empty());

        let again = host_rule(&roster, &w1);
        assert_eq!(again.id, rule.id);
        assert_eq!(again.ended_week, None);
        assert_eq!(roster.assignments_for_slot(&w1[0]).unwrap(), vec![again.clone()]);
        assert_eq!(roster.assignments_for_slot(&w3[0]).unwrap(), vec![again]);
    }

    #[test]
    fn recreating_a_skipped_rule_unskips_it() {
        let roster = manager();
        let w1 = weekday_mornings(week());
        let rule = host_rule(&roster, &w1);
        roster
            .delete_assignment(&rule.id, week(), ChangeScope::CurrentOnly)
            .unwrap();
        assert!(roster.assignments_for_slot(&w1[0]).unwrap().is_empty());

        let again = host_rule(&roster, &w1);
        assert_eq!(again.id, rule.id);
        assert_eq!(roster.assignments_for_slot(&w1[0]).unwrap().len(), 1);
        let w3 = weekday_mornings(week().offset_weeks(2));
        assert_eq!(roster.assignments_for_slot(&w3[0]).unwrap(), vec![again]);
    }

    #[test]
    fn recreating_in_a_later_skipped_week_keeps_one_rule() {
        let roster = manager();
        let w1 = weekday_mornings(week());
        let rule = host_rule(&roster, &w1);
        roster
            .delete_assignment(&rule.id, week().next(), ChangeScope::CurrentOnly)
            .unwrap();

        let w2 = weekday_mornings(week().next());
        let again = host_rule(&roster, &w2);
        assert_eq!(again.id, rule.id);
        assert_eq!(roster.assignments_for_slot(&w2[0]).unwrap().len(), 1);
    }

    #[test]
    fn an_earlier_rule_stops_where_a_later_one_starts() {
        let roster = manager();
        let w3 = weekday_mornings(week().offset_weeks(2));
        let later = host_rule(&roster, &w3);

        let w1 = weekday_mornings(week());
        let earlier = host_rule(&roster, &w1);
        assert_ne!(earlier.id, later.id);
        assert_eq!(earlier.ended_week, Some(week().offset_weeks(2)));
        assert_eq!(roster.assignments_for_slot(&w1[0]).unwrap(), vec![earlier]);
        assert_eq!(roster.assignments_for_slot(&w3[0]).unwrap(), vec![later]);
    }

    #[test]
    fn deleted_slots_have_no_assignments() {
        let roster = manager();
        let mut slots = weekday_mornings(week());
        roster
            .create_assignment(&AssignmentRequest::for_slot(&slots[0], "1", "host"), &slots)
            .unwrap();
        host_rule(&roster, &slots);
        slots[0].is_deleted = true;
        assert!(roster.assignments_for_slot(&slots[0]).unwrap().is_empty());
    }

    #[test]
    fn orphans_are_reported_and_week_only_ones_purged() {
        let roster = manager();
        let slots = weekday_mornings(week());
        roster
            .create_assignment(&AssignmentRequest::for_slot(&slots[0], "1", "host"), &slots)
            .unwrap();
        roster
            .create_assignment(&AssignmentRequest::for_slot(&slots[2], "2", "host"), &slots)
            .unwrap();
        roster
            .create_assignment(
                &AssignmentRequest::for_slot(&slots[2], "3", "host").recurring(),
                &slots,
            )
            .unwrap();

        // Wednesday's show is gone from the week.
        let remaining: Vec<_> = slots
            .iter()
            .filter(|s| s.day != DayOfWeek::WEDNESDAY)
            .cloned()
            .collect();
        let orphans = roster.orphaned_assignments(week(), &remaining).unwrap();
        let mut workers: Vec<_> = orphans.iter().map(|a| a.worker_id.clone()).collect();
        workers.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        assert_eq!(workers, vec![WorkerId::from("2"), WorkerId::from("3")]);

        let purged = roster.purge_orphans(week(), &remaining).unwrap();
        assert_eq!(purged.len(), 1);
        assert_eq!(purged[0].worker_id, WorkerId::from("2"));
        assert_eq!(roster.orphaned_assignments(week(), &remaining).unwrap().len(), 1);
    }

    #[test]
    fn week_roster_lists_live_slots_with_tiers() {
        let roster = manager();
        let slots = weekday_mornings(week());
        roster
            .create_assignment(&AssignmentRequest::for_slot(&slots[0], "42", "host"), &slots)
            .unwrap();
        let view = roster.week_roster(&slots).unwrap();
        assert_eq!(view.len(), slots.len());
        assert_eq!(view[0].assignments.len(), 1);
        assert!(view[1..].iter().all(|r| r.assignments.is_empty()));
    }
}
