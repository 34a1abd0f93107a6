//! Assignment Matcher.
//!
//! Instance ids are not stable across weeks, so an assignment is found for
//! a slot in up to three ways, tried in order and unioned without
//! duplicates:
//!
//! 1. **Direct**: `slot_id` is the instance's id.
//! 2. **Recurring**: a standing rule whose day, start time and show name
//!    equal the instance's current values.
//! 3. **Fallback**: a [`FallbackMatcher`] decides. The default,
//!    [`CharacteristicFallback`], picks up week-only assignments whose slot
//!    was regenerated under a new id.

use std::collections::HashSet;

use onair_schedule::ScheduleSlot;

use crate::types::{Assignment, MatchTier, Matched, SlotCharacteristics};

/// Tier 3. Replaceable once assignments carry a stable template reference.
pub trait FallbackMatcher: Send + Sync {
    /// Whether `assignment` belongs to `slot`. Only called for assignments
    /// that tiers 1 and 2 did not claim and that apply to the slot's week.
    fn matches(&self, slot: &ScheduleSlot, assignment: &Assignment) -> bool;
}

/// Week-only assignment made against another instance with the same day,
/// start time and show name.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharacteristicFallback;

impl FallbackMatcher for CharacteristicFallback {
    fn matches(&self, slot: &ScheduleSlot, assignment: &Assignment) -> bool {
        !assignment.is_recurring
            && assignment.slot_id != slot.id
            && assignment.characteristics == SlotCharacteristics::of(slot)
    }
}

/// Disables tier 3.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFallback;

impl FallbackMatcher for NoFallback {
    fn matches(&self, _slot: &ScheduleSlot, _assignment: &Assignment) -> bool {
        false
    }
}

/// Everything in `assignments` that staffs `slot`, tier by tier.
///
/// Template rows have no week and match nothing; neither do deleted slots.
pub fn match_slot(
    slot: &ScheduleSlot,
    assignments: &[Assignment],
    fallback: &dyn FallbackMatcher,
) -> Vec<Matched> {
    let Some(week) = slot.week() else {
        return Vec::new();
    };
    if !slot.is_live() {
        return Vec::new();
    }
    let candidates: Vec<&Assignment> = assignments.iter().filter(|a| a.applies_to(week)).collect();
    let characteristics = SlotCharacteristics::of(slot);

    let mut seen = HashSet::new();
    let mut matched = Vec::new();
    let mut take = |tier: MatchTier, assignment: &Assignment| {
        if seen.insert(assignment.id.clone()) {
            matched.push(Matched {
                tier,
                assignment: assignment.clone(),
            });
        }
    };

    for a in candidates.iter().copied().filter(|a| a.slot_id == slot.id) {
        take(MatchTier::Direct, a);
    }
    for a in candidates
        .iter()
        .copied()
        .filter(|a| a.is_recurring && a.characteristics == characteristics)
    {
        take(MatchTier::Recurring, a);
    }
    for a in candidates.iter().copied().filter(|a| fallback.matches(slot, a)) {
        take(MatchTier::Fallback, a);
    }
    matched
}

/// Assignments that match none of `slots`.
pub fn unmatched<'a>(
    slots: &[ScheduleSlot],
    assignments: &'a [Assignment],
    fallback: &dyn FallbackMatcher,
) -> Vec<&'a Assignment> {
    let claimed: HashSet<_> = slots
        .iter()
        .flat_map(|s| match_slot(s, assignments, fallback))
        .map(|m| m.assignment.id)
        .collect();
    assignments.iter().filter(|a| !claimed.contains(&a.id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Weekday};
    use onair_core::{SlotId, WorkerId};
    use onair_schedule::{DayOfWeek, SlotDraft, TimeRange, WeekAnchor};

    fn week() -> WeekAnchor {
        WeekAnchor::containing(NaiveDate::from_ymd_opt(2026, 10, 11).unwrap(), Weekday::Sun)
    }

    fn instance(week: WeekAnchor, show: &str, start: &str, end: &str) -> ScheduleSlot {
        let draft = SlotDraft::new(show, TimeRange::parse(start, end).unwrap());
        ScheduleSlot::one_off(&draft, week, DayOfWeek::SUNDAY)
    }

    fn assignment(slot: &ScheduleSlot, worker: &str, recurring: bool) -> Assignment {
        let week = slot.week().unwrap();
        Assignment::for_slot(slot, week, &WorkerId::from(worker), "host", recurring, None)
    }

    fn tiers(matched: &[Matched]) -> Vec<(MatchTier, &str)> {
        matched
            .iter()
            .map(|m| (m.tier, m.assignment.worker_id.as_str()))
            .collect()
    }

    #[test]
    fn direct_match_wins_over_recurring() {
        let slot = instance(week(), "Morning Show", "09:00", "10:00");
        let rule = assignment(&slot, "42", true);
        let matched = match_slot(&slot, &[rule], &CharacteristicFallback);
        assert_eq!(tiers(&matched), vec![(MatchTier::Direct, "42")]);
    }

    #[test]
    fn recurring_rule_rematches_a_new_instance() {
        let w1 = instance(week(), "Morning Show", "09:00", "10:00");
        let rule = assignment(&w1, "42", true);
        let w2 = instance(week().next(), "Morning Show", "09:00", "10:00");
        assert_ne!(w1.id, w2.id);

        let matched = match_slot(&w2, &[rule], &CharacteristicFallback);
        assert_eq!(tiers(&matched), vec![(MatchTier::Recurring, "42")]);
    }

    #[test]
    fn recurring_rule_ignores_changed_characteristics() {
        let w1 = instance(week(), "Morning Show", "09:00", "10:00");
        let rule = assignment(&w1, "42", true);
        let moved = instance(week().next(), "Morning Show", "09:30", "10:00");
        let renamed = instance(week().next(), "Breakfast", "09:00", "10:00");
        assert!(match_slot(&moved, &[rule.clone()], &CharacteristicFallback).is_empty());
        assert!(match_slot(&renamed, &[rule], &CharacteristicFallback).is_empty());
    }

    #[test]
    fn fallback_finds_regenerated_instances_in_the_same_week_only() {
        let old = instance(week(), "Morning Show", "09:00", "10:00");
        let a = assignment(&old, "7", false);
        let regenerated = instance(week(), "Morning Show", "09:00", "10:30");

        let matched = match_slot(&regenerated, &[a.clone()], &CharacteristicFallback);
        assert_eq!(tiers(&matched), vec![(MatchTier::Fallback, "7")]);
        assert!(match_slot(&regenerated, &[a.clone()], &NoFallback).is_empty());

        let next_week = instance(week().next(), "Morning Show", "09:00", "10:00");
        assert!(match_slot(&next_week, &[a], &CharacteristicFallback).is_empty());
    }

    #[test]
    fn tiers_are_unioned_in_order() {
        let slot = instance(week(), "Morning Show", "09:00", "10:00");
        let direct = assignment(&slot, "1", false);
        let old = instance(week(), "Morning Show", "09:00", "10:00");
        let rule = assignment(&old, "2", true);
        let stale = assignment(&old, "3", false);

        let matched = match_slot(&slot, &[stale, rule, direct], &CharacteristicFallback);
        assert_eq!(
            tiers(&matched),
            vec![
                (MatchTier::Direct, "1"),
                (MatchTier::Recurring, "2"),
                (MatchTier::Fallback, "3"),
            ]
        );
    }

    #[test]
    fn templates_match_nothing() {
        let draft = SlotDraft::new("Morning Show", TimeRange::parse("09:00", "10:00").unwrap());
        let template = ScheduleSlot::template(&draft, DayOfWeek::SUNDAY);
        let slot = instance(week(), "Morning Show", "09:00", "10:00");
        let rule = assignment(&slot, "42", true);
        assert!(match_slot(&template, &[rule], &CharacteristicFallback).is_empty());
    }

    #[test]
    fn deleted_slots_match_nothing() {
        let mut slot = instance(week(), "Morning Show", "09:00", "10:00");
        let direct = assignment(&slot, "1", false);
        let rule = assignment(&slot, "2", true);
        slot.is_deleted = true;
        assert!(match_slot(&slot, &[direct, rule], &CharacteristicFallback).is_empty());
    }

    #[test]
    fn unmatched_lists_orphans() {
        let live = instance(week(), "Morning Show", "09:00", "10:00");
        let gone = instance(week(), "Late Show", "22:00", "23:00");
        let kept = assignment(&live, "1", false);
        let orphan = assignment(&gone, "2", false);
        let mut deleted = instance(week(), "Late Show", "22:00", "23:00");
        deleted.id = SlotId::new();
        deleted.is_deleted = true;

        let all = [kept, orphan.clone()];
        let orphans = unmatched(&[live, deleted], &all, &CharacteristicFallback);
        assert_eq!(orphans, vec![&orphan]);
    }
}
