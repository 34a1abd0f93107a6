use chrono::NaiveDate;
use onair_core::{AssignmentId, SlotId, WorkerId};
use onair_schedule::time::{format_hhmm, parse_hhmm};
use onair_schedule::{DayOfWeek, WeekAnchor};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{Result, StaffingError};
use crate::types::{Assignment, SlotCharacteristics};

/// Assignment Store Adapter.
pub trait AssignmentStore {
    /// Every assignment that can appear in `week`: week-only rows made for
    /// it, plus recurring rules that have started, not ended, and are not
    /// skipped for it.
    fn fetch_assignments(&self, week: WeekAnchor) -> Result<Vec<Assignment>>;

    fn get_assignment(&self, id: &AssignmentId) -> Result<Option<Assignment>>;

    /// Every recurring rule on the show described by `characteristics`,
    /// ended or not, skips ignored.
    fn fetch_recurring(&self, characteristics: &SlotCharacteristics) -> Result<Vec<Assignment>>;

    fn insert_assignment(&self, assignment: &Assignment) -> Result<Assignment>;

    /// Remove the row and any skips recorded against it.
    fn delete_assignment(&self, id: &AssignmentId) -> Result<()>;

    /// Stop a recurring rule from applying to `from` and later weeks.
    fn end_recurring(&self, id: &AssignmentId, from: WeekAnchor) -> Result<()>;

    /// Clear the end of a recurring rule so it applies indefinitely.
    fn reopen_recurring(&self, id: &AssignmentId) -> Result<()>;

    /// Suppress a recurring rule for one week.
    fn skip_week(&self, id: &AssignmentId, week: WeekAnchor) -> Result<()>;

    /// Lift a skip. Returns whether one was recorded.
    fn unskip_week(&self, id: &AssignmentId, week: WeekAnchor) -> Result<bool>;
}

/// Load an assignment or fail with `AssignmentNotFound`.
pub fn require_assignment<S: AssignmentStore + ?Sized>(
    store: &S,
    id: &AssignmentId,
) -> Result<Assignment> {
    store
        .get_assignment(id)?
        .ok_or_else(|| StaffingError::AssignmentNotFound { id: id.to_string() })
}

const ASSIGNMENT_SELECT_SQL: &str = "SELECT a.id, a.slot_id, a.worker_id, a.role, a.week_anchor,
        a.is_recurring, a.notes, a.day_of_week, a.start_time, a.show_name, a.ended_week,
        a.created_at
     FROM assignments a";

impl AssignmentStore for Connection {
    fn fetch_assignments(&self, week: WeekAnchor) -> Result<Vec<Assignment>> {
        let mut stmt = self.prepare_cached(&format!(
            "{ASSIGNMENT_SELECT_SQL}
             WHERE (a.is_recurring = 0 AND a.week_anchor = ?1)
                OR (a.is_recurring = 1
                    AND a.week_anchor <= ?1
                    AND (a.ended_week IS NULL OR a.ended_week > ?1)
                    AND NOT EXISTS (
                        SELECT 1 FROM assignment_skips s
                        WHERE s.assignment_id = a.id AND s.week_anchor = ?1))
             ORDER BY a.id"
        ))?;
        let rows = stmt
            .query_map([week.to_string()], row_to_assignment)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn get_assignment(&self, id: &AssignmentId) -> Result<Option<Assignment>> {
        let mut stmt = self.prepare_cached(&format!("{ASSIGNMENT_SELECT_SQL} WHERE a.id = ?1"))?;
        Ok(stmt.query_row([id.as_str()], row_to_assignment).optional()?)
    }

    fn fetch_recurring(&self, characteristics: &SlotCharacteristics) -> Result<Vec<Assignment>> {
        let mut stmt = self.prepare_cached(&format!(
            "{ASSIGNMENT_SELECT_SQL}
             WHERE a.is_recurring = 1
               AND a.day_of_week = ?1 AND a.start_time = ?2 AND a.show_name = ?3
             ORDER BY a.week_anchor, a.id"
        ))?;
        let rows = stmt
            .query_map(
                params![
                    characteristics.day.index(),
                    format_hhmm(characteristics.start_time),
                    characteristics.show_name,
                ],
                row_to_assignment,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn insert_assignment(&self, assignment: &Assignment) -> Result<Assignment> {
        self.execute(
            "INSERT INTO assignments
             (id, slot_id, worker_id, role, week_anchor, is_recurring, notes,
              day_of_week, start_time, show_name, ended_week, created_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)",
            params![
                assignment.id.as_str(),
                assignment.slot_id.as_str(),
                assignment.worker_id.as_str(),
                assignment.role,
                assignment.week.to_string(),
                assignment.is_recurring,
                assignment.notes,
                assignment.characteristics.day.index(),
                format_hhmm(assignment.characteristics.start_time),
                assignment.characteristics.show_name,
                assignment.ended_week.map(|w| w.to_string()),
                assignment.created_at,
            ],
        )?;
        Ok(assignment.clone())
    }

    fn delete_assignment(&self, id: &AssignmentId) -> Result<()> {
        let n = self.execute("DELETE FROM assignments WHERE id = ?1", [id.as_str()])?;
        if n == 0 {
            return Err(StaffingError::AssignmentNotFound { id: id.to_string() });
        }
        self.execute(
            "DELETE FROM assignment_skips WHERE assignment_id = ?1",
            [id.as_str()],
        )?;
        Ok(())
    }

    fn end_recurring(&self, id: &AssignmentId, from: WeekAnchor) -> Result<()> {
        let n = self.execute(
            "UPDATE assignments SET ended_week = ?2 WHERE id = ?1 AND is_recurring = 1",
            params![id.as_str(), from.to_string()],
        )?;
        if n == 0 {
            return Err(StaffingError::AssignmentNotFound { id: id.to_string() });
        }
        Ok(())
    }

    fn reopen_recurring(&self, id: &AssignmentId) -> Result<()> {
        let n = self.execute(
            "UPDATE assignments SET ended_week = NULL WHERE id = ?1 AND is_recurring = 1",
            [id.as_str()],
        )?;
        if n == 0 {
            return Err(StaffingError::AssignmentNotFound { id: id.to_string() });
        }
        Ok(())
    }

    fn skip_week(&self, id: &AssignmentId, week: WeekAnchor) -> Result<()> {
        self.execute(
            "INSERT OR IGNORE INTO assignment_skips (assignment_id, week_anchor) VALUES (?1, ?2)",
            params![id.as_str(), week.to_string()],
        )?;
        Ok(())
    }

    fn unskip_week(&self, id: &AssignmentId, week: WeekAnchor) -> Result<bool> {
        let n = self.execute(
            "DELETE FROM assignment_skips WHERE assignment_id = ?1 AND week_anchor = ?2",
            params![id.as_str(), week.to_string()],
        )?;
        Ok(n > 0)
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

fn row_to_assignment(row: &Row<'_>) -> rusqlite::Result<Assignment> {
    let week = week_column(4, &row.get::<_, String>(4)?)?;
    let day = DayOfWeek::new(row.get::<_, u8>(7)?).map_err(|e| bad_column(7, e.to_string()))?;
    let start_time =
        parse_hhmm(&row.get::<_, String>(8)?).map_err(|e| bad_column(8, e.to_string()))?;
    let ended_week = row
        .get::<_, Option<String>>(10)?
        .map(|raw| week_column(10, &raw))
        .transpose()?;

    Ok(Assignment {
        id: AssignmentId(row.get(0)?),
        slot_id: SlotId(row.get(1)?),
        worker_id: WorkerId(row.get(2)?),
        role: row.get(3)?,
        week,
        is_recurring: row.get(5)?,
        notes: row.get(6)?,
        characteristics: SlotCharacteristics {
            day,
            start_time,
            show_name: row.get(9)?,
        },
        ended_week,
        created_at: row.get(11)?,
    })
}
