//! Recurrence Materializer: projects the master grid onto one week.

use std::collections::HashSet;

use onair_core::SlotId;
use serde::Serialize;
use tracing::{debug, warn};

use crate::conflict::find_overlap;
use crate::error::Result;
use crate::store::SlotStore;
use crate::types::{ScheduleSlot, SlotFilter, SlotPatch};
use crate::week::WeekAnchor;

/// What a materialization pass did to a week.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Materialized {
    /// Live instances of the week, ordered by day then start.
    pub slots: Vec<ScheduleSlot>,
    pub created: usize,
    pub pruned: usize,
}

/// Make sure every template active in `week` has exactly one instance there.
///
/// - missing instances are synthesised from the template, unmodified;
/// - existing instances (modified, soft-deleted or not) are left untouched;
/// - unmodified, live instances whose template is no longer active for this
///   week are removed. Modified ones survive as independent slots.
///
/// A second call with unchanged templates writes nothing.
pub fn materialize_week<S: SlotStore + ?Sized>(
    store: &S,
    week: WeekAnchor,
) -> Result<Materialized> {
    let templates = store.fetch_slots(&SlotFilter::templates().with_deleted())?;
    let existing = store.fetch_slots(&SlotFilter::week(week).with_deleted())?;

    let active: Vec<&ScheduleSlot> = templates.iter().filter(|t| t.is_active_in(week)).collect();
    let active_ids: HashSet<&SlotId> = active.iter().map(|t| &t.id).collect();
    let present: HashSet<&SlotId> = existing.iter().filter_map(|s| s.origin_id.as_ref()).collect();

    let mut created = 0;
    for template in active.iter().filter(|t| !present.contains(&t.id)) {
        let instance = ScheduleSlot::materialized(template, week);
        if let Some(other) = find_overlap(&existing, instance.day, &instance.range, None) {
            warn!(
                %week,
                template_id = %template.id,
                other = %other.label(),
                "materialized slot overlaps a week-local slot"
            );
        }
        store.insert_slot(&instance)?;
        created += 1;
    }

    let mut pruned = 0;
    for stale in existing.iter().filter(|s| is_prunable(s, &active_ids)) {
        store.remove_slot(&stale.id)?;
        pruned += 1;
    }

    if created > 0 || pruned > 0 {
        debug!(%week, created, pruned, "week materialized");
    }

    let slots = store.fetch_slots(&SlotFilter::week(week))?;
    Ok(Materialized {
        slots,
        created,
        pruned,
    })
}

fn is_prunable(slot: &ScheduleSlot, active_ids: &HashSet<&SlotId>) -> bool {
    match slot.origin_id {
        Some(ref origin) => !slot.is_modified && !slot.is_deleted && !active_ids.contains(origin),
        None => false,
    }
}

/// Refresh every unmodified, live instance in `week` from its template's
/// current fields. Templates changed after a week was materialized only reach
/// that week through this call. Returns the number of refreshed instances.
pub fn resync_week<S: SlotStore + ?Sized>(store: &S, week: WeekAnchor) -> Result<usize> {
    let materialized = materialize_week(store, week)?;
    let templates = store.fetch_slots(&SlotFilter::templates().with_deleted())?;

    let mut refreshed = 0;
    for instance in materialized.slots.iter().filter(|s| !s.is_modified) {
        let Some(ref origin) = instance.origin_id else {
            continue;
        };
        let Some(template) = templates.iter().find(|t| &t.id == origin) else {
            continue;
        };
        let patch = SlotPatch::from_template(template);
        if same_content(&patch.apply(instance)?, instance) {
            continue;
        }
        store.update_slot(&instance.id, &patch)?;
        refreshed += 1;
    }
    debug!(%week, refreshed, "week resynced");
    Ok(refreshed)
}

fn same_content(a: &ScheduleSlot, b: &ScheduleSlot) -> bool {
    ScheduleSlot {
        updated_at: b.updated_at.clone(),
        ..a.clone()
    } == *b
}

/// Remove unmodified, live materializations of `template_id` in `from` and
/// every later week so they regenerate from the template. Returns how many
/// rows went.
pub fn drop_materializations<S: SlotStore + ?Sized>(
    store: &S,
    template_id: &SlotId,
    from: WeekAnchor,
) -> Result<usize> {
    let stale = store.fetch_slots(&SlotFilter::weeks_from(from).from_origin(template_id))?;
    let mut removed = 0;
    for slot in stale.iter().filter(|s| !s.is_modified) {
        store.remove_slot(&slot.id)?;
        removed += 1;
    }
    Ok(removed)
}
