use rusqlite::Connection;

use crate::error::Result;

/// Initialise the sessions schema. Safe to call on every startup (idempotent).
///
/// WAL journaling is enabled per agent database.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS sessions (
            id               TEXT PRIMARY KEY,
            channel          TEXT NOT NULL,
            meta_json        TEXT NOT NULL,
            history_json     TEXT NOT NULL,
            opened_files_json TEXT NOT NULL DEFAULT '[]'
        );

        CREATE TABLE IF NOT EXISTS images (
            id         TEXT NOT NULL,
            session_id TEXT NOT NULL,
            media_type TEXT NOT NULL,
            PRIMARY KEY (id, session_id)
        );
        CREATE INDEX IF NOT EXISTS idx_images_id ON images(id);",
    )?;
    Ok(())
}
