use rusqlite::Connection;

use crate::error::Result;

/// Initialise the schedule schema in `conn`.
///
/// One table holds both grids: `scope = 'template'` rows (no week) and
/// `scope = 'instance'` rows keyed by `week_anchor`. Safe to call on every
/// startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schedule_slots (
            id              TEXT    NOT NULL PRIMARY KEY,
            scope           TEXT    NOT NULL CHECK (scope IN ('template', 'instance')),
            week_anchor     TEXT,               -- YYYY-MM-DD, NULL for templates
            origin_id       TEXT,               -- template an instance came from
            day_of_week     INTEGER NOT NULL CHECK (day_of_week BETWEEN 0 AND 6),
            start_time      TEXT    NOT NULL,   -- HH:MM
            end_time        TEXT    NOT NULL,   -- HH:MM, < start_time wraps midnight
            show_name       TEXT    NOT NULL,
            host_name       TEXT    NOT NULL DEFAULT '',
            is_prerecorded  INTEGER NOT NULL DEFAULT 0,
            is_collection   INTEGER NOT NULL DEFAULT 0,
            is_modified     INTEGER NOT NULL DEFAULT 0,
            is_deleted      INTEGER NOT NULL DEFAULT 0,
            color_override  TEXT,
            retired_week    TEXT,               -- templates only
            created_at      TEXT    NOT NULL,
            updated_at      TEXT    NOT NULL
        ) STRICT;

        -- Bucket scans: one scope/week/day at a time.
        CREATE INDEX IF NOT EXISTS idx_slots_bucket
            ON schedule_slots (scope, week_anchor, day_of_week);
        CREATE INDEX IF NOT EXISTS idx_slots_origin
            ON schedule_slots (origin_id, week_anchor);
        ",
    )?;
    Ok(())
}
