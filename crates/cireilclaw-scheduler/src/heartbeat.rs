//! Heartbeat arming conditions: active-hours and checklist-presence checks.
//! Session targeting, the busy gate, the transient `sendFilter`, and turn
//! execution are the harness's responsibility once it receives
//! `FiredEvent::Heartbeat` — this module only decides whether the tick
//! should fire at all.

use std::path::Path;

use chrono::Utc;
use cireilclaw_core::config::ActiveHours;
use tracing::warn;

/// True if the current wall-clock time in `hours.tz`, formatted `HH:MM`,
/// falls within `[start, end]` lexicographically. A missing or unparseable
/// timezone fails open (treated as always active) with a warning, since
/// `ActiveHours` windows cannot wrap midnight — see
/// `cireilclaw_core::config::HeartbeatConfig::validate`, which rejects that
/// shape at config-load time.
pub fn within_active_hours(hours: Option<&ActiveHours>) -> bool {
    let Some(hours) = hours else {
        return true;
    };
    let tz: chrono_tz::Tz = match hours.tz.parse() {
        Ok(tz) => tz,
        Err(_) => {
            warn!(tz = %hours.tz, "unknown heartbeat timezone, treating as always active");
            return true;
        }
    };
    let now_local = Utc::now().with_timezone(&tz);
    let hhmm = now_local.format("%H:%M").to_string();
    hhmm.as_str() >= hours.start.as_str() && hhmm.as_str() <= hours.end.as_str()
}

/// `{agent_root}/workspace/HEARTBEAT.md` must exist and be non-empty.
pub fn checklist_present(agent_root: &Path) -> bool {
    let path = agent_root.join("workspace").join("HEARTBEAT.md");
    match std::fs::metadata(&path) {
        Ok(meta) => meta.len() > 0,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn no_active_hours_is_always_active() {
        assert!(within_active_hours(None));
    }

    #[test]
    fn unknown_timezone_fails_open() {
        let hours = ActiveHours {
            start: "08:00".into(),
            end: "20:00".into(),
            tz: "Not/A_Zone".into(),
        };
        assert!(within_active_hours(Some(&hours)));
    }

    #[test]
    fn missing_checklist_file_is_false() {
        let dir = tempdir().unwrap();
        assert!(!checklist_present(dir.path()));
    }

    #[test]
    fn empty_checklist_file_is_false() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("workspace")).unwrap();
        std::fs::write(dir.path().join("workspace/HEARTBEAT.md"), "").unwrap();
        assert!(!checklist_present(dir.path()));
    }

    #[test]
    fn non_empty_checklist_file_is_true() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("workspace")).unwrap();
        std::fs::write(dir.path().join("workspace/HEARTBEAT.md"), "- check mail\n").unwrap();
        assert!(checklist_present(dir.path()));
    }
}
