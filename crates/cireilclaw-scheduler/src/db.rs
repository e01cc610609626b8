use rusqlite::Connection;

use crate::error::Result;

/// Initialise the `cron_jobs` schema. Safe to call on every startup.
///
/// WAL journaling is enabled so `SchedulerHandle`'s connection (tool-driven
/// add/remove/list) and `SchedulerEngine`'s polling connection never block
/// each other on the same database file.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS cron_jobs (
            job_id      TEXT NOT NULL PRIMARY KEY,
            kind        TEXT NOT NULL,
            config_json TEXT NOT NULL,
            last_run    TEXT,
            next_run    TEXT,
            status      TEXT NOT NULL DEFAULT 'pending',
            retry_count INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_cron_jobs_next_run ON cron_jobs(next_run);",
    )?;
    Ok(())
}
