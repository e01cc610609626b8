use chrono::{DateTime, Utc};
use cireilclaw_core::config::CronJobConfig;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a persisted cron job (`CronJob row`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Completed,
    Failed,
    Missed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Missed => "missed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "missed" => Ok(JobStatus::Missed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// Whether a cron job fires once and is then deleted, or keeps recurring
/// (`CronJob row` `type ∈ {one-shot, recurring}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    OneShot,
    Recurring,
}

/// A persisted cron job row.
#[derive(Debug, Clone)]
pub struct CronJobRow {
    pub job_id: String,
    pub kind: JobKind,
    pub config: CronJobConfig,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub status: JobStatus,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
}

/// Emitted when a heartbeat or cron job fires; the harness/turn engine
/// consumes these to actually run a turn. The scheduler itself
/// knows nothing about provider calls — it only decides *when*.
#[derive(Debug, Clone)]
pub enum FiredEvent {
    Heartbeat,
    Cron(CronJobRow),
}
