//! `cireilclaw-scheduler` — Tokio-based heartbeat and cron scheduler with
//! SQLite persistence.
//!
//! # Overview
//!
//! Cron jobs are persisted to a SQLite `cron_jobs` table. The
//! [`engine::SchedulerEngine`] polls the database every second, firing any
//! job whose `next_run` has arrived, and separately tracks an in-memory
//! heartbeat timer armed from [`cireilclaw_core::config::HeartbeatConfig`].
//! Both kinds of tick are surfaced as a [`types::FiredEvent`] — this crate
//! only decides *when* something should run; dispatching the actual turn is
//! the harness's job.
//!
//! # Schedule variants
//!
//! | Variant | Behaviour                                   |
//! |---------|----------------------------------------------|
//! | `every` | Repeat every N seconds                        |
//! | `cron`  | Standard cron expression (seconds-first, via the `cron` crate) |
//! | `at`    | Single fire at an absolute UTC instant, then deleted |

pub mod db;
pub mod engine;
pub mod error;
pub mod heartbeat;
pub mod schedule;
pub mod types;

pub use engine::{SchedulerEngine, SchedulerHandle};
pub use error::{Result, SchedulerError};
pub use types::{CronJobRow, FiredEvent, JobKind, JobStatus};
