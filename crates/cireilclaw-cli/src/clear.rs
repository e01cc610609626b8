//! `cireilclaw clear [--agent=slug]` (CLI surface): removes persisted
//! sessions without starting the harness.

use std::path::Path;

use cireilclaw_core::config;
use cireilclaw_core::AgentSlug;
use cireilclaw_sessions::{db, SessionStore};
use rusqlite::Connection;

use crate::error::{CliError, Result};

pub fn run(root: &Path, agent: Option<String>) -> Result<()> {
    let slugs = match agent {
        Some(s) => vec![AgentSlug::new(s)],
        None => {
            let all = config::discover_agents(root)?;
            if all.is_empty() {
                return Err(CliError::NoAgents(root.display().to_string()));
            }
            all
        }
    };

    for slug in slugs {
        let agent_root = config::agent_root(root, &slug);
        let db_path = agent_root.join("sessions.db");
        if !db_path.is_file() {
            println!("{}: no sessions.db, nothing to clear", slug);
            continue;
        }

        let conn = Connection::open(&db_path)?;
        db::init_db(&conn)?;
        let store = SessionStore::new(conn, agent_root);
        let ids = store.list_ids()?;
        for id in &ids {
            store.delete(id)?;
        }
        println!("{}: cleared {} session(s)", slug, ids.len());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cireilclaw_core::{Channel, Message};
    use cireilclaw_sessions::Session;
    use tempfile::tempdir;

    fn seed_session(agent_root: &Path) {
        std::fs::create_dir_all(agent_root).unwrap();
        let conn = Connection::open(agent_root.join("sessions.db")).unwrap();
        db::init_db(&conn).unwrap();
        let store = std::sync::Arc::new(SessionStore::new(conn, agent_root));
        let channel = Channel::Discord {
            channel_id: "1".into(),
            guild_id: None,
            is_nsfw: false,
        };
        let mut session = Session::new(channel, 0);
        session.history.push(Message::user_text("hi"));
        store.flush_all(std::slice::from_ref(&session)).unwrap();
    }

    #[test]
    fn missing_db_is_a_noop() {
        let root = tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("agents/main")).unwrap();
        run(root.path(), Some("main".to_string())).unwrap();
    }

    #[test]
    fn clears_an_existing_session() {
        let root = tempdir().unwrap();
        let agent_root = root.path().join("agents/main");
        seed_session(&agent_root);

        run(root.path(), Some("main".to_string())).unwrap();

        let conn = Connection::open(agent_root.join("sessions.db")).unwrap();
        let store = SessionStore::new(conn, &agent_root);
        assert!(store.list_ids().unwrap().is_empty());
    }

    #[test]
    fn missing_agent_root_without_explicit_slug_errors_with_no_agents() {
        let root = tempdir().unwrap();
        let err = run(root.path(), None).unwrap_err();
        assert!(matches!(err, CliError::NoAgents(_)));
    }
}
