//! Edit/Delete Scope Resolver.
//!
//! | Slot kind      | Scope        | Edit                                   | Delete                         |
//! |----------------|--------------|----------------------------------------|--------------------------------|
//! | template       | any          | update template, refresh later weeks   | retire template                |
//! | materialized   | current only | detach: mark modified, edit instance   | soft-delete instance           |
//! | materialized   | all future   | edit template, regenerate this week on | retire template + soft-delete  |
//! | modified       | current only | edit instance                          | soft-delete instance           |
//! | modified       | all future   | edit instance (no cascade)             | retire template + soft-delete  |
//! | one-off        | any          | edit instance                          | soft-delete instance           |
//!
//! Requests that cannot be honoured degrade to the nearest valid scope;
//! the applied scope is reported back in the result.

use onair_core::{ChangeScope, SlotId};
use tracing::{info, warn};

use crate::conflict::{check_days, has_conflict};
use crate::error::{Result, ScheduleError};
use crate::materialize::{drop_materializations, materialize_week};
use crate::store::{require_slot, SlotStore};
use crate::types::{
    DeleteResult, EditResult, ScheduleSlot, SlotDraft, SlotFilter, SlotKind, SlotPatch, SlotScope,
    SlotWrite,
};
use crate::week::{DayOfWeek, WeekAnchor};

/// How an edit is carried out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditPlan {
    /// Update the template row; unmodified instances after the current week
    /// regenerate from it.
    Template,
    /// Clone-on-write: this week's instance becomes a modified override.
    Detach,
    /// The instance has no template to cascade into; edit it in place.
    Direct,
    /// Edit the template, then regenerate this week's instance and later ones.
    Cascade { template_id: SlotId },
}

/// How a delete is carried out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletePlan {
    SoftDelete,
    /// The slot is the template; retire it.
    RetireSelf,
    /// Retire the template the instance came from.
    RetireTemplate { template_id: SlotId },
}

/// Choose the edit strategy and the scope actually applied.
pub fn plan_edit(kind: &SlotKind, requested: ChangeScope) -> (EditPlan, ChangeScope) {
    match (kind, requested) {
        (SlotKind::Template, _) => (EditPlan::Template, ChangeScope::AllFuture),
        (SlotKind::Materialized { .. }, ChangeScope::CurrentOnly) => {
            (EditPlan::Detach, ChangeScope::CurrentOnly)
        }
        (SlotKind::Materialized { template_id }, ChangeScope::AllFuture) => (
            EditPlan::Cascade {
                template_id: template_id.clone(),
            },
            ChangeScope::AllFuture,
        ),
        (SlotKind::Modified { .. } | SlotKind::OneOff, _) => {
            (EditPlan::Direct, ChangeScope::CurrentOnly)
        }
    }
}

/// Choose the delete strategy and the scope actually applied.
pub fn plan_delete(kind: &SlotKind, requested: ChangeScope) -> (DeletePlan, ChangeScope) {
    match (kind, requested) {
        (SlotKind::Template, _) => (DeletePlan::RetireSelf, ChangeScope::AllFuture),
        (
            SlotKind::Materialized { template_id } | SlotKind::Modified { template_id },
            ChangeScope::AllFuture,
        ) => (
            DeletePlan::RetireTemplate {
                template_id: template_id.clone(),
            },
            ChangeScope::AllFuture,
        ),
        (SlotKind::Materialized { .. } | SlotKind::Modified { .. }, ChangeScope::CurrentOnly)
        | (SlotKind::OneOff, _) => (DeletePlan::SoftDelete, ChangeScope::CurrentOnly),
    }
}

/// Create the same slot on several days, in the template grid or as
/// one-offs in a week. Every day is conflict-checked first; a single
/// collision writes nothing.
pub fn create_slots<S: SlotStore + ?Sized>(
    store: &S,
    draft: &SlotDraft,
    days: &[DayOfWeek],
    target: &SlotScope,
) -> Result<SlotWrite<Vec<ScheduleSlot>>> {
    if let SlotScope::Instance { week } = target {
        materialize_week(store, *week)?;
    }
    let mut unique = days.to_vec();
    unique.sort();
    unique.dedup();
    if let Some(conflict) = check_days(store, target, &unique, &draft.range, None)? {
        return Ok(SlotWrite::Conflict(conflict));
    }

    let mut created = Vec::with_capacity(unique.len());
    for day in unique {
        let slot = match target {
            SlotScope::Template => ScheduleSlot::template(draft, day),
            SlotScope::Instance { week } => ScheduleSlot::one_off(draft, *week, day),
        };
        created.push(store.insert_slot(&slot)?);
    }
    info!(scope = %target, count = created.len(), show = %draft.show_name, "slots created");
    Ok(SlotWrite::Applied(created))
}

/// Apply `patch` to `slot` under the requested scope.
///
/// `as_of` is the week the administrator is looking at; template edits leave
/// it and earlier weeks alone.
pub fn apply_edit<S: SlotStore + ?Sized>(
    store: &S,
    slot: &ScheduleSlot,
    patch: &SlotPatch,
    requested: ChangeScope,
    as_of: WeekAnchor,
) -> Result<SlotWrite<EditResult>> {
    if slot.is_deleted {
        return Err(ScheduleError::SlotDeleted {
            id: slot.id.to_string(),
        });
    }
    let patch = patch.content();
    let (plan, scope) = plan_edit(&slot.kind(), requested);
    if scope != requested {
        warn!(slot_id = %slot.id, %requested, applied = %scope, "edit scope degraded");
    }

    match plan {
        EditPlan::Template => edit_template(store, slot, &patch, as_of),
        EditPlan::Detach => edit_instance(store, slot, &patch.with_modified()),
        EditPlan::Direct => edit_instance(store, slot, &patch),
        EditPlan::Cascade { template_id } => match store.get_slot(&template_id)? {
            Some(template) if slot.week().is_some_and(|w| template.is_active_in(w)) => {
                cascade_edit(store, slot, &template, &patch)
            }
            _ => {
                warn!(slot_id = %slot.id, %template_id, "template gone; editing this week only");
                edit_instance(store, slot, &patch.with_modified())
            }
        },
    }
}

fn edit_instance<S: SlotStore + ?Sized>(
    store: &S,
    slot: &ScheduleSlot,
    patch: &SlotPatch,
) -> Result<SlotWrite<EditResult>> {
    let candidate = patch.apply(slot)?;
    if let Some(conflict) = has_conflict(
        store,
        &slot.scope,
        candidate.day,
        &candidate.range,
        Some(&slot.id),
    )? {
        return Ok(SlotWrite::Conflict(conflict));
    }
    let updated = store.update_slot(&slot.id, patch)?;
    info!(slot_id = %slot.id, scope = %slot.scope, modified = updated.is_modified, "instance edited");
    Ok(SlotWrite::Applied(EditResult {
        slot: updated,
        scope: ChangeScope::CurrentOnly,
    }))
}

fn edit_template<S: SlotStore + ?Sized>(
    store: &S,
    template: &ScheduleSlot,
    patch: &SlotPatch,
    as_of: WeekAnchor,
) -> Result<SlotWrite<EditResult>> {
    let candidate = patch.apply(template)?;
    if let Some(conflict) = has_conflict(
        store,
        &SlotScope::Template,
        candidate.day,
        &candidate.range,
        Some(&template.id),
    )? {
        return Ok(SlotWrite::Conflict(conflict));
    }
    let updated = store.update_slot(&template.id, patch)?;
    let refreshed = drop_materializations(store, &template.id, as_of.next())?;
    info!(template_id = %template.id, %as_of, refreshed, "template edited");
    Ok(SlotWrite::Applied(EditResult {
        slot: updated,
        scope: ChangeScope::AllFuture,
    }))
}

fn cascade_edit<S: SlotStore + ?Sized>(
    store: &S,
    instance: &ScheduleSlot,
    template: &ScheduleSlot,
    patch: &SlotPatch,
) -> Result<SlotWrite<EditResult>> {
    let Some(week) = instance.week() else {
        return Err(ScheduleError::NotAnInstance {
            id: instance.id.to_string(),
        });
    };
    let candidate = patch.apply(template)?;
    for (scope, exclude) in [
        (SlotScope::Template, &template.id),
        (instance.scope, &instance.id),
    ] {
        if let Some(conflict) =
            has_conflict(store, &scope, candidate.day, &candidate.range, Some(exclude))?
        {
            return Ok(SlotWrite::Conflict(conflict));
        }
    }

    store.update_slot(&template.id, patch)?;
    let dropped = drop_materializations(store, &template.id, week)?;
    let regenerated = materialize_week(store, week)?
        .slots
        .into_iter()
        .find(|s| s.origin_id.as_ref() == Some(&template.id))
        .ok_or_else(|| ScheduleError::SlotNotFound {
            id: template.id.to_string(),
        })?;
    info!(
        template_id = %template.id,
        %week,
        dropped,
        instance_id = %regenerated.id,
        "edit cascaded into template"
    );
    Ok(SlotWrite::Applied(EditResult {
        slot: regenerated,
        scope: ChangeScope::AllFuture,
    }))
}

/// Delete `slot` under the requested scope. Nothing is physically removed
/// except unmodified materializations, which regenerate on demand.
pub fn apply_delete<S: SlotStore + ?Sized>(
    store: &S,
    slot: &ScheduleSlot,
    requested: ChangeScope,
    as_of: WeekAnchor,
) -> Result<DeleteResult> {
    let (plan, scope) = plan_delete(&slot.kind(), requested);
    if scope != requested {
        warn!(slot_id = %slot.id, %requested, applied = %scope, "delete scope degraded");
    }

    match plan {
        DeletePlan::SoftDelete => soft_delete(store, slot),
        DeletePlan::RetireSelf => retire_template(store, slot, as_of, slot),
        DeletePlan::RetireTemplate { template_id } => {
            let week = slot.week().unwrap_or(as_of);
            match store.get_slot(&template_id)? {
                Some(template) => retire_template(store, &template, week, slot),
                None => {
                    warn!(slot_id = %slot.id, %template_id, "template gone; deleting this week only");
                    soft_delete(store, slot)
                }
            }
        }
    }
}

fn soft_delete<S: SlotStore + ?Sized>(store: &S, slot: &ScheduleSlot) -> Result<DeleteResult> {
    if !slot.is_deleted {
        store.soft_delete_slot(&slot.id)?;
    }
    info!(slot_id = %slot.id, scope = %slot.scope, "instance soft-deleted");
    Ok(DeleteResult {
        slot: require_slot(store, &slot.id)?,
        scope: ChangeScope::CurrentOnly,
        retired_template: None,
    })
}

/// Stop `template` materializing from `week` on, soft-delete its occurrence
/// in `week` and drop unmodified copies in later weeks.
fn retire_template<S: SlotStore + ?Sized>(
    store: &S,
    template: &ScheduleSlot,
    week: WeekAnchor,
    acted_on: &ScheduleSlot,
) -> Result<DeleteResult> {
    let retired = match template.retired_week {
        Some(existing) if existing <= week => existing,
        _ => week,
    };
    store.update_slot(
        &template.id,
        &SlotPatch {
            is_deleted: Some(true),
            retired_week: Some(Some(retired)),
            ..SlotPatch::default()
        },
    )?;

    let current = store.fetch_slots(&SlotFilter::week(week).from_origin(&template.id))?;
    for instance in &current {
        store.soft_delete_slot(&instance.id)?;
    }
    let dropped = drop_materializations(store, &template.id, week.next())?;
    info!(
        template_id = %template.id,
        from = %retired,
        soft_deleted = current.len(),
        dropped,
        "template retired"
    );

    Ok(DeleteResult {
        slot: require_slot(store, &acted_on.id)?,
        scope: ChangeScope::AllFuture,
        retired_template: Some(template.id.clone()),
    })
}

/// Undo a soft delete. Instances are re-checked against their week; a
/// retired template comes back for every week and is re-checked against the
/// master grid.
///
/// An unmodified instance whose template no longer covers its week is
/// restored as a modified, independent slot so materialization keeps it.
pub fn restore<S: SlotStore + ?Sized>(
    store: &S,
    slot: &ScheduleSlot,
) -> Result<SlotWrite<ScheduleSlot>> {
    if !slot.is_deleted {
        return Ok(SlotWrite::Applied(slot.clone()));
    }
    if let Some(conflict) =
        has_conflict(store, &slot.scope, slot.day, &slot.range, Some(&slot.id))?
    {
        return Ok(SlotWrite::Conflict(conflict));
    }
    let detach = match (slot.kind(), slot.week()) {
        (SlotKind::Materialized { template_id }, Some(week)) => !store
            .get_slot(&template_id)?
            .is_some_and(|template| template.is_active_in(week)),
        _ => false,
    };
    let patch = SlotPatch {
        is_deleted: Some(false),
        is_modified: detach.then_some(true),
        retired_week: slot.is_recurring().then_some(None),
        ..SlotPatch::default()
    };
    let restored = store.update_slot(&slot.id, &patch)?;
    info!(slot_id = %slot.id, scope = %slot.scope, detached = detach, "slot restored");
    Ok(SlotWrite::Applied(restored))
}
