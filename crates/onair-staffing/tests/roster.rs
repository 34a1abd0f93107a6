use chrono::{NaiveDate, Weekday};
use onair_core::{ChangeScope, WorkerId};
use onair_schedule::{
    DayOfWeek, ScheduleEngine, SlotDraft, SlotPatch, SlotScope, TimeRange, WeekAnchor,
};
use onair_staffing::{AssignmentRequest, MatchTier, RosterManager};
use rusqlite::Connection;

fn setup() -> (ScheduleEngine, RosterManager) {
    let engine = ScheduleEngine::new(Connection::open_in_memory().unwrap(), Weekday::Sun).unwrap();
    let roster = RosterManager::new(Connection::open_in_memory().unwrap()).unwrap();
    let draft = SlotDraft::new("Morning Show", TimeRange::parse("09:00", "10:00").unwrap());
    engine
        .create_slots(&draft, &[DayOfWeek::SUNDAY], &SlotScope::Template)
        .unwrap();
    (engine, roster)
}

fn w1() -> WeekAnchor {
    WeekAnchor::containing(NaiveDate::from_ymd_opt(2026, 10, 11).unwrap(), Weekday::Sun)
}

#[test]
fn recurring_assignment_follows_the_show_into_later_weeks() {
    let (engine, roster) = setup();
    let week1 = engine.week_view(w1()).unwrap();
    let request = AssignmentRequest::for_slot(&week1[0], "42", "host").recurring();
    roster.create_assignment(&request, &week1).unwrap();

    let week2 = engine.week_view(w1().next()).unwrap();
    assert_ne!(week2[0].id, week1[0].id);

    let found = roster.assignments_for_slot(&week2[0]).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].worker_id, WorkerId::from("42"));

    let view = roster.week_roster(&week2).unwrap();
    assert_eq!(view[0].assignments[0].tier, MatchTier::Recurring);
}

#[test]
fn week_only_assignment_survives_regeneration_through_the_fallback() {
    let (engine, roster) = setup();
    let template = engine.templates().unwrap().remove(0);
    let week2 = engine.week_view(w1().next()).unwrap();
    roster
        .create_assignment(&AssignmentRequest::for_slot(&week2[0], "7", "engineer"), &week2)
        .unwrap();

    // A template edit made in week 1 regenerates week 2's instance.
    let patch = SlotPatch {
        host_name: Some("Robin".into()),
        ..SlotPatch::default()
    };
    engine.edit_template(&template.id, &patch, w1()).unwrap();
    let regenerated = engine.week_view(w1().next()).unwrap();
    assert_ne!(regenerated[0].id, week2[0].id);

    let view = roster.week_roster(&regenerated).unwrap();
    assert_eq!(view[0].assignments.len(), 1);
    assert_eq!(view[0].assignments[0].tier, MatchTier::Fallback);
    assert!(roster
        .orphaned_assignments(w1().next(), &regenerated)
        .unwrap()
        .is_empty());
}

#[test]
fn retiring_the_show_orphans_its_assignments() {
    let (engine, roster) = setup();
    let template = engine.templates().unwrap().remove(0);
    let week2 = engine.week_view(w1().next()).unwrap();
    roster
        .create_assignment(&AssignmentRequest::for_slot(&week2[0], "7", "engineer"), &week2)
        .unwrap();

    engine.delete_template(&template.id, w1()).unwrap();
    let after = engine.week_view(w1().next()).unwrap();
    assert!(after.is_empty());

    let purged = roster.purge_orphans(w1().next(), &after).unwrap();
    assert_eq!(purged.len(), 1);
    assert!(roster.orphaned_assignments(w1().next(), &after).unwrap().is_empty());
}

#[test]
fn ending_a_rule_is_forward_only() {
    let (engine, roster) = setup();
    let week1 = engine.week_view(w1()).unwrap();
    let rule = roster
        .create_assignment(
            &AssignmentRequest::for_slot(&week1[0], "42", "host").recurring(),
            &week1,
        )
        .unwrap()
        .remove(0);

    let deletion = roster
        .delete_assignment(&rule.id, w1().next(), ChangeScope::AllFuture)
        .unwrap();
    let json = serde_json::to_value(&deletion).unwrap();
    assert_eq!(json["scope"], "all_future");
    assert_eq!(json["action"]["action"], "ended");

    for (week, expected) in [(w1(), 1), (w1().next(), 1), (w1().offset_weeks(2), 0)] {
        let slots = engine.week_view(week).unwrap();
        let found = roster.assignments_for_slot(&slots[0]).unwrap();
        assert_eq!(found.len(), expected, "{week}");
    }
}
