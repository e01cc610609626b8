use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use cireilclaw_core::{Channel, Message, SessionId};
use rusqlite::Connection;
use tokio::task::JoinHandle;
use tracing::{debug, instrument};

use crate::error::{Result, SessionError};
use crate::images;
use crate::types::{PersistedSessionRow, Session};

const DEBOUNCE: std::time::Duration = std::time::Duration::from_secs(2);

/// Owns the single SQLite connection for one agent's session database, plus
/// the debounce timers for `save_session`.
///
/// This is the only mutating writer to the database — in-memory `Session`
/// state is the source of truth between flushes.
pub struct SessionStore {
    agent_root: PathBuf,
    timers: Mutex<HashMap<String, JoinHandle<()>>>,
    inner: Arc<Mutex<Connection>>,
}

impl SessionStore {
    /// Wrap an already-open, `db::init_db`-initialized connection. `agent_root`
    /// is the real filesystem root this agent's sandbox resolves paths under.
    pub fn new(conn: Connection, agent_root: impl Into<PathBuf>) -> Self {
        Self {
            agent_root: agent_root.into(),
            timers: Mutex::new(HashMap::new()),
            inner: Arc::new(Mutex::new(conn)),
        }
    }

    /// Arms (or re-arms) a 2s debounce timer for this session id. Any prior
    /// timer for the same id is cancelled. The session's in-memory snapshot
    /// is cloned into the spawned task so callers don't need to hold a lock
    /// across the delay.
    #[instrument(skip(self, session), fields(id = %session.id))]
    pub fn save_session(self: &Arc<Self>, session: Session) {
        if !session.channel.is_persisted() {
            return;
        }
        let key = session.id.as_str().to_string();
        let store = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(DEBOUNCE).await;
            if let Err(err) = store.flush_now(&session) {
                tracing::warn!(error = %err, id = %session.id, "session flush failed");
            }
        });

        let mut timers = self.timers.lock().unwrap();
        if let Some(old) = timers.insert(key, handle) {
            old.abort();
        }
    }

    /// Cancels every pending debounce timer and synchronously flushes the
    /// given sessions. Called on shutdown (`flushAllSessions`).
    pub fn flush_all(&self, sessions: &[Session]) -> Result<()> {
        let mut timers = self.timers.lock().unwrap();
        for (_, handle) in timers.drain() {
            handle.abort();
        }
        drop(timers);

        for session in sessions {
            if session.channel.is_persisted() {
                self.flush_now(session)?;
            }
        }
        Ok(())
    }

    #[instrument(skip(self, session), fields(id = %session.id))]
    fn flush_now(&self, session: &Session) -> Result<()> {
        let history_value = serde_json::to_value(&session.history)?;
        let (externalized, refs) = images::externalize(&history_value, &self.agent_root)?;
        let history_json = serde_json::to_string(&externalized)?;
        let meta_json = serde_json::to_string(&channel_meta(&session.channel))?;
        let opened_files_json = serde_json::to_string(&session.pinned_files)?;

        let conn = self.inner.lock().unwrap();
        conn.execute(
            "INSERT INTO sessions (id, channel, meta_json, history_json, opened_files_json)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                meta_json = excluded.meta_json,
                history_json = excluded.history_json,
                opened_files_json = excluded.opened_files_json",
            rusqlite::params![
                session.id.as_str(),
                session.channel.kind(),
                meta_json,
                history_json,
                opened_files_json
            ],
        )?;

        for image_ref in refs {
            conn.execute(
                "INSERT OR IGNORE INTO images (id, session_id, media_type) VALUES (?1, ?2, ?3)",
                rusqlite::params![image_ref.id, session.id.as_str(), image_ref.media_type],
            )?;
        }
        debug!("session flushed");
        Ok(())
    }

    /// Loads a persisted session by id, rehydrating image references back
    /// into inline bytes. Returns `None` if no row exists.
    #[instrument(skip(self))]
    pub fn load(&self, id: &SessionId) -> Result<Option<PersistedSessionRow>> {
        let conn = self.inner.lock().unwrap();
        let row = conn.query_row(
            "SELECT id, channel, meta_json, history_json, opened_files_json
             FROM sessions WHERE id = ?1",
            rusqlite::params![id.as_str()],
            |row| {
                Ok(PersistedSessionRow {
                    id: row.get(0)?,
                    channel: row.get(1)?,
                    meta_json: row.get(2)?,
                    history_json: row.get(3)?,
                    opened_files_json: row.get(4)?,
                })
            },
        );
        match row {
            Ok(row) => Ok(Some(row)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(err) => Err(SessionError::Database(err)),
        }
    }

    /// Lists every persisted session id, for startup rehydration.
    #[instrument(skip(self))]
    pub fn list_ids(&self) -> Result<Vec<SessionId>> {
        let conn = self.inner.lock().unwrap();
        let mut stmt = conn.prepare("SELECT id FROM sessions")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .filter_map(|r| r.ok())
            .map(SessionId::from)
            .collect();
        Ok(ids)
    }

    /// Rehydrates a persisted row's history back into typed `Message`s.
    pub fn rehydrate_history(&self, row: &PersistedSessionRow) -> Result<Vec<Message>> {
        let value: serde_json::Value = serde_json::from_str(&row.history_json)?;
        let rehydrated = images::rehydrate(&value, &self.agent_root)?;
        Ok(serde_json::from_value(rehydrated)?)
    }

    /// Rebuilds a live [`Session`] from a persisted row: parses the channel
    /// kind plus `meta_json` back into a [`Channel`], rehydrates history and
    /// pinned files. Used on harness startup.
    pub fn rehydrate_session(&self, row: &PersistedSessionRow, now_epoch_ms: i64) -> Result<Session> {
        let channel = channel_from_meta(&row.channel, &row.meta_json)?;
        let history = self.rehydrate_history(row)?;
        let pinned_files: Vec<String> = serde_json::from_str(&row.opened_files_json)?;

        let mut session = Session::new(channel, now_epoch_ms);
        session.history = history;
        session.pinned_files = pinned_files;
        Ok(session)
    }

    /// Deletes a session row and garbage-collects any image whose reference
    /// count drops to zero.
    #[instrument(skip(self))]
    pub fn delete(&self, id: &SessionId) -> Result<()> {
        let conn = self.inner.lock().unwrap();

        let mut stmt = conn.prepare("SELECT id FROM images WHERE session_id = ?1")?;
        let image_ids: Vec<String> = stmt
            .query_map(rusqlite::params![id.as_str()], |row| row.get(0))?
            .filter_map(|r| r.ok())
            .collect();
        drop(stmt);

        conn.execute(
            "DELETE FROM images WHERE session_id = ?1",
            rusqlite::params![id.as_str()],
        )?;

        for image_id in image_ids {
            let remaining: i64 = conn.query_row(
                "SELECT COUNT(*) FROM images WHERE id = ?1",
                rusqlite::params![image_id],
                |row| row.get(0),
            )?;
            if remaining == 0 {
                gc_unreferenced_image(&self.agent_root, &image_id);
            }
        }

        let rows_changed = conn.execute(
            "DELETE FROM sessions WHERE id = ?1",
            rusqlite::params![id.as_str()],
        )?;
        if rows_changed == 0 {
            return Err(SessionError::NotFound {
                id: id.as_str().to_string(),
            });
        }
        Ok(())
    }
}

/// Best-effort unlink of an orphaned image file; any of its possible
/// extensions may be present, so all are tried.
fn gc_unreferenced_image(agent_root: &Path, id: &str) {
    for ext in ["png", "jpg", "webp", "gif", "bin"] {
        let path = agent_root.join("images").join(format!("{id}.{ext}"));
        let _ = std::fs::remove_file(path);
    }
}

fn channel_meta(channel: &Channel) -> serde_json::Value {
    match channel {
        Channel::Discord {
            channel_id,
            guild_id,
            is_nsfw,
        } => serde_json::json!({
            "channel_id": channel_id,
            "guild_id": guild_id,
            "is_nsfw": is_nsfw,
        }),
        Channel::Matrix { room_id } => serde_json::json!({ "room_id": room_id }),
        Channel::Internal { .. } => serde_json::json!({}),
    }
}

/// Inverse of [`channel_meta`]. Internal sessions are never persisted, so
/// only `"discord"` and `"matrix"` are valid inputs here.
fn channel_from_meta(kind: &str, meta_json: &str) -> Result<Channel> {
    let meta: serde_json::Value = serde_json::from_str(meta_json)?;
    match kind {
        "discord" => Ok(Channel::Discord {
            channel_id: meta["channel_id"].as_str().unwrap_or_default().to_string(),
            guild_id: meta["guild_id"].as_str().map(|s| s.to_string()),
            is_nsfw: meta["is_nsfw"].as_bool().unwrap_or(false),
        }),
        "matrix" => Ok(Channel::Matrix {
            room_id: meta["room_id"].as_str().unwrap_or_default().to_string(),
        }),
        other => Err(SessionError::Corrupt(format!("unknown persisted channel kind: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use tempfile::tempdir;

    fn test_store(dir: &Path) -> Arc<SessionStore> {
        let conn = Connection::open(dir.join("sessions.db")).unwrap();
        init_db(&conn).unwrap();
        Arc::new(SessionStore::new(conn, dir))
    }

    #[tokio::test]
    async fn flush_now_persists_and_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = test_store(dir.path());

        let channel = Channel::Discord {
            channel_id: "1".into(),
            guild_id: None,
            is_nsfw: false,
        };
        let mut session = Session::new(channel, 0);
        session.history.push(Message::user_text("hello"));

        store.flush_now(&session).unwrap();

        let row = store.load(&session.id).unwrap().unwrap();
        let history = store.rehydrate_history(&row).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role(), "user");
    }

    #[tokio::test]
    async fn internal_sessions_are_never_flushed() {
        let dir = tempdir().unwrap();
        let store = test_store(dir.path());
        let channel = Channel::Internal { job_id: "j-1".into() };
        let session = Session::new(channel, 0);
        assert!(!session.channel.is_persisted());
        let loaded = store.load(&session.id).unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn delete_removes_session_and_gcs_orphaned_image() {
        let dir = tempdir().unwrap();
        let store = test_store(dir.path());

        let channel = Channel::Matrix { room_id: "!r:example.org".into() };
        let mut session = Session::new(channel, 0);
        let bytes = vec![7u8; 8];
        use base64::Engine;
        let data = base64::engine::general_purpose::STANDARD.encode(&bytes);
        session.history.push(Message::User {
            content: vec![cireilclaw_core::UserContent::Image(cireilclaw_core::ImageContent {
                media_type: "image/png".into(),
                data: bytes,
            })],
            id: None,
            persist: None,
        });
        store.flush_now(&session).unwrap();

        store.delete(&session.id).unwrap();
        assert!(store.load(&session.id).unwrap().is_none());

        let images_dir = dir.path().join("images");
        let remaining = std::fs::read_dir(images_dir)
            .map(|it| it.count())
            .unwrap_or(0);
        assert_eq!(remaining, 0);
    }
}
