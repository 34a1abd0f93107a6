//! Slot Store Adapter: the only code that knows slots live in SQLite.

use chrono::{NaiveDate, NaiveTime, Utc};
use onair_core::SlotId;
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, Row};

use crate::error::{Result, ScheduleError};
use crate::time::{format_hhmm, TimeRange};
use crate::types::{DisplayCategory, ScheduleSlot, ScopeFilter, SlotFilter, SlotPatch, SlotScope};
use crate::week::{DayOfWeek, WeekAnchor};

/// CRUD over persisted slots. Everything above this trait is storage-agnostic.
///
/// Implementations do not open transactions themselves; the caller wraps a
/// logical edit (possibly many calls) in one.
pub trait SlotStore {
    /// Rows matching `filter`, ordered by day then start time.
    fn fetch_slots(&self, filter: &SlotFilter) -> Result<Vec<ScheduleSlot>>;

    /// Load one row by id, deleted or not.
    fn get_slot(&self, id: &SlotId) -> Result<Option<ScheduleSlot>>;

    fn insert_slot(&self, slot: &ScheduleSlot) -> Result<ScheduleSlot>;

    /// Apply `patch` to the stored row and return the new state.
    fn update_slot(&self, id: &SlotId, patch: &SlotPatch) -> Result<ScheduleSlot>;

    fn soft_delete_slot(&self, id: &SlotId) -> Result<()>;

    /// Physically remove a row. Reserved for unmodified materializations,
    /// which can always be regenerated from their template.
    fn remove_slot(&self, id: &SlotId) -> Result<()>;
}

impl<T: SlotStore + ?Sized> SlotStore for &T {
    fn fetch_slots(&self, filter: &SlotFilter) -> Result<Vec<ScheduleSlot>> {
        (**self).fetch_slots(filter)
    }
    fn get_slot(&self, id: &SlotId) -> Result<Option<ScheduleSlot>> {
        (**self).get_slot(id)
    }
    fn insert_slot(&self, slot: &ScheduleSlot) -> Result<ScheduleSlot> {
        (**self).insert_slot(slot)
    }
    fn update_slot(&self, id: &SlotId, patch: &SlotPatch) -> Result<ScheduleSlot> {
        (**self).update_slot(id, patch)
    }
    fn soft_delete_slot(&self, id: &SlotId) -> Result<()> {
        (**self).soft_delete_slot(id)
    }
    fn remove_slot(&self, id: &SlotId) -> Result<()> {
        (**self).remove_slot(id)
    }
}

/// Load a slot or fail with `SlotNotFound`.
pub fn require_slot<S: SlotStore + ?Sized>(store: &S, id: &SlotId) -> Result<ScheduleSlot> {
    store
        .get_slot(id)?
        .ok_or_else(|| ScheduleError::SlotNotFound { id: id.to_string() })
}

const SLOT_SELECT_SQL: &str = "SELECT id, scope, week_anchor, origin_id, day_of_week,
        start_time, end_time, show_name, host_name, is_prerecorded, is_collection,
        is_modified, is_deleted, color_override, retired_week, created_at, updated_at
     FROM schedule_slots";

impl SlotStore for Connection {
    fn fetch_slots(&self, filter: &SlotFilter) -> Result<Vec<ScheduleSlot>> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        match filter.scope {
            ScopeFilter::Templates => clauses.push("scope = 'template'"),
            ScopeFilter::Week(week) => {
                clauses.push("scope = 'instance' AND week_anchor = ?");
                values.push(Value::Text(week.to_string()));
            }
            ScopeFilter::WeeksFrom(week) => {
                clauses.push("scope = 'instance' AND week_anchor >= ?");
                values.push(Value::Text(week.to_string()));
            }
        }
        if let Some(day) = filter.day {
            clauses.push("day_of_week = ?");
            values.push(Value::Integer(day.index() as i64));
        }
        if let Some(ref origin) = filter.origin_id {
            clauses.push("origin_id = ?");
            values.push(Value::Text(origin.to_string()));
        }
        if !filter.include_deleted {
            clauses.push("is_deleted = 0");
        }

        let sql = format!(
            "{SLOT_SELECT_SQL} WHERE {} ORDER BY week_anchor, day_of_week, start_time, id",
            clauses.join(" AND ")
        );
        let mut stmt = self.prepare_cached(&sql)?;
        let slots = stmt
            .query_map(params_from_iter(values), row_to_slot)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(slots)
    }

    fn get_slot(&self, id: &SlotId) -> Result<Option<ScheduleSlot>> {
        let mut stmt = self.prepare_cached(&format!("{SLOT_SELECT_SQL} WHERE id = ?1"))?;
        match stmt.query_row([id.as_str()], row_to_slot) {
            Ok(slot) => Ok(Some(slot)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(ScheduleError::Storage(e)),
        }
    }

    fn insert_slot(&self, slot: &ScheduleSlot) -> Result<ScheduleSlot> {
        let (scope, week) = scope_columns(&slot.scope);
        self.execute(
            "INSERT INTO schedule_slots
             (id, scope, week_anchor, origin_id, day_of_week, start_time, end_time,
              show_name, host_name, is_prerecorded, is_collection, is_modified,
              is_deleted, color_override, retired_week, created_at, updated_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17)",
            params![
                slot.id.as_str(),
                scope,
                week,
                slot.origin_id.as_ref().map(SlotId::as_str),
                slot.day.index(),
                format_hhmm(slot.range.start),
                format_hhmm(slot.range.end),
                slot.show_name,
                slot.host_name,
                slot.is_prerecorded,
                slot.is_collection,
                slot.is_modified,
                slot.is_deleted,
                slot.color_override.map(|c| c.to_string()),
                slot.retired_week.map(|w| w.to_string()),
                slot.created_at,
                slot.updated_at,
            ],
        )?;
        Ok(slot.clone())
    }

    fn update_slot(&self, id: &SlotId, patch: &SlotPatch) -> Result<ScheduleSlot> {
        let current = require_slot(self, id)?;
        let updated = patch.apply(&current)?;
        self.execute(
            "UPDATE schedule_slots SET
                day_of_week=?2, start_time=?3, end_time=?4, show_name=?5, host_name=?6,
                is_prerecorded=?7, is_collection=?8, is_modified=?9, is_deleted=?10,
                color_override=?11, retired_week=?12, updated_at=?13
             WHERE id=?1",
            params![
                id.as_str(),
                updated.day.index(),
                format_hhmm(updated.range.start),
                format_hhmm(updated.range.end),
                updated.show_name,
                updated.host_name,
                updated.is_prerecorded,
                updated.is_collection,
                updated.is_modified,
                updated.is_deleted,
                updated.color_override.map(|c| c.to_string()),
                updated.retired_week.map(|w| w.to_string()),
                updated.updated_at,
            ],
        )?;
        Ok(updated)
    }

    fn soft_delete_slot(&self, id: &SlotId) -> Result<()> {
        let n = self.execute(
            "UPDATE schedule_slots SET is_deleted = 1, updated_at = ?2 WHERE id = ?1",
            params![id.as_str(), Utc::now().to_rfc3339()],
        )?;
        if n == 0 {
            return Err(ScheduleError::SlotNotFound { id: id.to_string() });
        }
        Ok(())
    }

    fn remove_slot(&self, id: &SlotId) -> Result<()> {
        let n = self.execute("DELETE FROM schedule_slots WHERE id = ?1", [id.as_str()])?;
        if n == 0 {
            return Err(ScheduleError::SlotNotFound { id: id.to_string() });
        }
        Ok(())
    }
}

fn scope_columns(scope: &SlotScope) -> (&'static str, Option<String>) {
    match scope {
        SlotScope::Template => ("template", None),
        SlotScope::Instance { week } => ("instance", Some(week.to_string())),
    }
}

fn bad_column(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, msg.into())
}

fn week_column(idx: usize, raw: &str) -> rusqlite::Result<WeekAnchor> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(WeekAnchor::from_start_date)
        .map_err(|e| bad_column(idx, format!("bad week {raw}: {e}")))
}

fn time_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveTime> {
    let raw: String = row.get(idx)?;
    NaiveTime::parse_from_str(&raw, "%H:%M")
        .map_err(|e| bad_column(idx, format!("bad time {raw}: {e}")))
}

/// Map a SELECT row (column order from SLOT_SELECT_SQL) to a slot.
fn row_to_slot(row: &Row<'_>) -> rusqlite::Result<ScheduleSlot> {
    let scope_str: String = row.get(1)?;
    let week: Option<String> = row.get(2)?;
    let scope = match (scope_str.as_str(), week) {
        ("template", _) => SlotScope::Template,
        ("instance", Some(raw)) => SlotScope::Instance {
            week: week_column(2, &raw)?,
        },
        (other, _) => return Err(bad_column(1, format!("invalid scope {other}"))),
    };

    let day = DayOfWeek::new(row.get::<_, u8>(4)?).map_err(|e| bad_column(4, e.to_string()))?;
    let range = TimeRange::new(time_column(row, 5)?, time_column(row, 6)?)
        .map_err(|e| bad_column(6, e.to_string()))?;
    let color_override = row
        .get::<_, Option<String>>(13)?
        .map(|raw| raw.parse::<DisplayCategory>().map_err(|e| bad_column(13, e)))
        .transpose()?;
    let retired_week = row
        .get::<_, Option<String>>(14)?
        .map(|raw| week_column(14, &raw))
        .transpose()?;

    Ok(ScheduleSlot {
        id: SlotId(row.get(0)?),
        scope,
        origin_id: row.get::<_, Option<String>>(3)?.map(SlotId),
        day,
        range,
        show_name: row.get(7)?,
        host_name: row.get(8)?,
        is_prerecorded: row.get(9)?,
        is_collection: row.get(10)?,
        is_modified: row.get(11)?,
        is_deleted: row.get(12)?,
        color_override,
        retired_week,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::types::SlotDraft;
    use chrono::Weekday;

    fn store() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        conn
    }

    fn week() -> WeekAnchor {
        WeekAnchor::containing(NaiveDate::from_ymd_opt(2026, 10, 14).unwrap(), Weekday::Sun)
    }

    fn draft(show: &str, start: &str, end: &str) -> SlotDraft {
        SlotDraft::new(show, TimeRange::parse(start, end).unwrap()).hosted_by("Dana")
    }

    #[test]
    fn insert_then_fetch_by_bucket() {
        let conn = store();
        let template = ScheduleSlot::template(&draft("Morning Show", "09:00", "10:00"), DayOfWeek::SUNDAY);
        conn.insert_slot(&template).unwrap();
        let mut one_off = ScheduleSlot::one_off(&draft("Special", "23:00", "01:00"), week(), DayOfWeek::MONDAY);
        one_off.color_override = Some(DisplayCategory::Collection);
        conn.insert_slot(&one_off).unwrap();

        let templates = conn.fetch_slots(&SlotFilter::templates()).unwrap();
        assert_eq!(templates, vec![template.clone()]);

        let week_rows = conn.fetch_slots(&SlotFilter::week(week())).unwrap();
        assert_eq!(week_rows, vec![one_off.clone()]);
        assert!(week_rows[0].range.wraps_midnight());

        assert!(conn
            .fetch_slots(&SlotFilter::week(week()).on_day(DayOfWeek::SUNDAY))
            .unwrap()
            .is_empty());
        assert!(conn.fetch_slots(&SlotFilter::week(week().next())).unwrap().is_empty());
    }

    #[test]
    fn soft_deleted_rows_hidden_by_default() {
        let conn = store();
        let slot = ScheduleSlot::one_off(&draft("News", "12:00", "12:30"), week(), DayOfWeek::FRIDAY);
        conn.insert_slot(&slot).unwrap();
        conn.soft_delete_slot(&slot.id).unwrap();

        assert!(conn.fetch_slots(&SlotFilter::week(week())).unwrap().is_empty());
        let all = conn.fetch_slots(&SlotFilter::week(week()).with_deleted()).unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].is_deleted);
    }

    #[test]
    fn update_applies_partial_patch() {
        let conn = store();
        let slot = ScheduleSlot::template(&draft("Jazz", "20:00", "22:00"), DayOfWeek::SATURDAY);
        conn.insert_slot(&slot).unwrap();

        let patch = SlotPatch {
            end: Some(NaiveTime::from_hms_opt(22, 30, 0).unwrap()),
            show_name: Some("Late Jazz".into()),
            ..SlotPatch::default()
        };
        let updated = conn.update_slot(&slot.id, &patch).unwrap();
        assert_eq!(updated.range.to_string(), "20:00-22:30");
        assert_eq!(updated.host_name, "Dana");

        let reloaded = conn.get_slot(&slot.id).unwrap().unwrap();
        assert_eq!(reloaded.show_name, "Late Jazz");
        assert_eq!(reloaded.range, updated.range);
    }

    #[test]
    fn missing_rows_report_not_found() {
        let conn = store();
        let id = SlotId::new();
        assert!(conn.get_slot(&id).unwrap().is_none());
        assert!(matches!(conn.soft_delete_slot(&id), Err(ScheduleError::SlotNotFound { .. })));
        assert!(matches!(conn.remove_slot(&id), Err(ScheduleError::SlotNotFound { .. })));
        assert!(matches!(
            conn.update_slot(&id, &SlotPatch::default()),
            Err(ScheduleError::SlotNotFound { .. })
        ));
    }

    #[test]
    fn weeks_from_filters_by_origin() {
        let conn = store();
        let template = ScheduleSlot::template(&draft("Drive", "16:00", "18:00"), DayOfWeek::TUESDAY);
        conn.insert_slot(&template).unwrap();
        for w in [week().prev(), week(), week().next()] {
            conn.insert_slot(&ScheduleSlot::materialized(&template, w)).unwrap();
        }
        let later = conn
            .fetch_slots(&SlotFilter::weeks_from(week()).from_origin(&template.id))
            .unwrap();
        assert_eq!(later.len(), 2);
        assert!(later.iter().all(|s| s.week() >= Some(week())));
    }
}
