use anyhow::{bail, Context};
use onair_core::{AssignmentId, SlotId, WorkerId};
use onair_schedule::{ScheduleEngine, SlotDraft, SlotPatch, SlotScope, SlotWrite, TimeRange};
use onair_staffing::{AssignmentRequest, RosterManager};
use serde::Serialize;
use serde_json::{json, Value};

use crate::args::{AddSlotArgs, AssignArgs, Command, EditSlotArgs};

/// What a command printed and whether it was refused by a conflict.
pub struct Outcome {
    pub output: Value,
    pub conflict: bool,
}

impl Outcome {
    fn ok(output: impl Serialize) -> anyhow::Result<Self> {
        Ok(Self {
            output: serde_json::to_value(output)?,
            conflict: false,
        })
    }

    fn write<T: Serialize>(write: SlotWrite<T>) -> anyhow::Result<Self> {
        match write {
            SlotWrite::Applied(result) => Ok(Self {
                output: json!({ "status": "applied", "result": result }),
                conflict: false,
            }),
            SlotWrite::Conflict(conflict) => Ok(Self {
                output: json!({
                    "status": "conflict",
                    "message": conflict.to_string(),
                    "conflict": conflict,
                }),
                conflict: true,
            }),
        }
    }
}

pub fn run(
    command: Command,
    engine: &ScheduleEngine,
    roster: &RosterManager,
) -> anyhow::Result<Outcome> {
    match command {
        Command::Init => Outcome::ok(json!({ "status": "initialized" })),
        Command::Week { date } => Outcome::ok(engine.week_view(engine.week_of(date))?),
        Command::Templates => Outcome::ok(engine.templates()?),
        Command::AddSlot(args) => add_slot(engine, args),
        Command::EditSlot(args) => edit_slot(engine, args),
        Command::DeleteSlot { id, scope } => {
            Outcome::ok(engine.delete_slot(&SlotId::from(id), scope)?)
        }
        Command::RestoreSlot { id } => Outcome::write(engine.restore_slot(&SlotId::from(id))?),
        Command::Resync { date } => {
            let week = engine.week_of(date);
            let refreshed = engine.resync_week(week)?;
            Outcome::ok(json!({ "week": week, "refreshed": refreshed }))
        }
        Command::Assign(args) => assign(engine, roster, args),
        Command::Unassign { id, week, scope } => Outcome::ok(roster.delete_assignment(
            &AssignmentId::from(id),
            engine.week_of(week),
            scope,
        )?),
        Command::Roster { date } => {
            let slots = engine.week_view(engine.week_of(date))?;
            Outcome::ok(roster.week_roster(&slots)?)
        }
        Command::Orphans { date, purge } => {
            let week = engine.week_of(date);
            let slots = engine.week_view(week)?;
            if purge {
                Outcome::ok(json!({ "purged": roster.purge_orphans(week, &slots)? }))
            } else {
                Outcome::ok(json!({ "orphans": roster.orphaned_assignments(week, &slots)? }))
            }
        }
    }
}

fn add_slot(engine: &ScheduleEngine, args: AddSlotArgs) -> anyhow::Result<Outcome> {
    let range = TimeRange::new(args.start, args.end)?;
    let mut draft = SlotDraft::new(args.show, range).hosted_by(args.host);
    draft.is_prerecorded = args.prerecorded;
    draft.is_collection = args.collection;
    draft.color_override = args.category;
    let target = match args.week {
        Some(date) => SlotScope::Instance {
            week: engine.week_of(date),
        },
        None => SlotScope::Template,
    };
    Outcome::write(engine.create_slots(&draft, &args.days, &target)?)
}

fn edit_slot(engine: &ScheduleEngine, args: EditSlotArgs) -> anyhow::Result<Outcome> {
    let patch = SlotPatch {
        day: args.day,
        start: args.start,
        end: args.end,
        show_name: args.show,
        host_name: args.host,
        is_prerecorded: args.prerecorded,
        is_collection: args.collection,
        color_override: if args.clear_category {
            Some(None)
        } else {
            args.category.map(Some)
        },
        ..SlotPatch::default()
    };
    if patch.is_empty() {
        bail!("nothing to change");
    }
    Outcome::write(engine.edit_slot(&SlotId::from(args.id), &patch, args.scope)?)
}

fn assign(
    engine: &ScheduleEngine,
    roster: &RosterManager,
    args: AssignArgs,
) -> anyhow::Result<Outcome> {
    let slot = engine.slot(&SlotId::from(args.slot_id))?;
    let week = slot
        .week()
        .with_context(|| format!("{} is a template; assign a week instance", slot.id))?;
    let week_slots = engine.week_view(week)?;

    let mut request = AssignmentRequest::for_slot(&slot, WorkerId::from(args.worker), args.role);
    if !args.days.is_empty() {
        request = request.on_days(args.days);
    }
    if args.recurring {
        request = request.recurring();
    }
    if let Some(notes) = args.notes {
        request = request.with_notes(notes);
    }
    Outcome::ok(roster.create_assignment(&request, &week_slots)?)
}
