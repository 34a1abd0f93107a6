use rusqlite::Connection;

use crate::error::Result;

/// Initialise the staffing schema in `conn`. Safe to call on every startup.
///
/// Assignments snapshot the day, start time and show name of the slot they
/// were made against; recurring rules are matched on that snapshot rather
/// than on `slot_id`, which changes whenever an instance is regenerated.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS assignments (
            id           TEXT    NOT NULL PRIMARY KEY,
            slot_id      TEXT    NOT NULL,
            worker_id    TEXT    NOT NULL,
            role         TEXT    NOT NULL,
            week_anchor  TEXT    NOT NULL,   -- week created in; first week a rule applies
            is_recurring INTEGER NOT NULL DEFAULT 0,
            notes        TEXT,
            day_of_week  INTEGER NOT NULL CHECK (day_of_week BETWEEN 0 AND 6),
            start_time   TEXT    NOT NULL,   -- HH:MM
            show_name    TEXT    NOT NULL,
            ended_week   TEXT,               -- recurring only: first week no longer matched
            created_at   TEXT    NOT NULL
        ) STRICT;

        CREATE UNIQUE INDEX IF NOT EXISTS idx_assignments_direct
            ON assignments (slot_id, worker_id, role) WHERE is_recurring = 0;
        CREATE INDEX IF NOT EXISTS idx_assignments_week
            ON assignments (is_recurring, week_anchor);

        CREATE TABLE IF NOT EXISTS assignment_skips (
            assignment_id TEXT NOT NULL,
            week_anchor   TEXT NOT NULL,
            PRIMARY KEY (assignment_id, week_anchor)
        ) STRICT;
        ",
    )?;
    Ok(())
}
