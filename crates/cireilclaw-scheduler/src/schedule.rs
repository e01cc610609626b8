use chrono::{DateTime, Utc};
use cireilclaw_core::config::Schedule;
use std::str::FromStr;
use tracing::warn;

/// Computes the next UTC fire instant for `schedule` after `from`.
///
/// Returns `None` when the schedule is exhausted: an `at` instant that has
/// already passed, or a `cron` expression this crate's parser rejects.
pub fn compute_next_run(schedule: &Schedule, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match schedule {
        Schedule::At { at } => {
            if *at > from {
                Some(*at)
            } else {
                None
            }
        }

        Schedule::Every { every } => Some(from + chrono::Duration::seconds(*every as i64)),

        Schedule::Cron { cron } => match cron::Schedule::from_str(cron) {
            Ok(parsed) => parsed.after(&from).next(),
            Err(err) => {
                warn!(cron = %cron, error = %err, "invalid cron expression");
                None
            }
        },
    }
}

/// Whether `schedule` should be treated as one-shot (deleted after firing)
/// or recurring. Only `at` is one-shot; `every`/`cron` recur indefinitely.
pub fn is_one_shot(schedule: &Schedule) -> bool {
    matches!(schedule, Schedule::At { .. })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn every_adds_seconds() {
        let from = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let schedule = Schedule::Every { every: 60 };
        let next = compute_next_run(&schedule, from).unwrap();
        assert_eq!(next, from + chrono::Duration::seconds(60));
    }

    #[test]
    fn at_in_the_past_is_exhausted() {
        let from = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let schedule = Schedule::At { at: from - chrono::Duration::seconds(1) };
        assert!(compute_next_run(&schedule, from).is_none());
        assert!(is_one_shot(&schedule));
    }

    #[test]
    fn at_in_the_future_fires_once() {
        let from = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let future = from + chrono::Duration::seconds(10);
        let schedule = Schedule::At { at: future };
        assert_eq!(compute_next_run(&schedule, from), Some(future));
    }

    #[test]
    fn cron_expression_computes_next_minute() {
        let from = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 30).unwrap();
        let schedule = Schedule::Cron {
            cron: "0 * * * * *".to_string(),
        };
        let next = compute_next_run(&schedule, from).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 1, 0, 1, 0).unwrap());
        assert!(!is_one_shot(&schedule));
    }

    #[test]
    fn invalid_cron_expression_yields_none() {
        let from = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let schedule = Schedule::Cron {
            cron: "not a cron expression".to_string(),
        };
        assert!(compute_next_run(&schedule, from).is_none());
    }
}
