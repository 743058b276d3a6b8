//! Runtime settings, from command-line flags or `PAYCYCLE_*` environment
//! variables.

use crate::application::publisher::PublishPolicy;
use crate::domain::clock::{Clock, FixedClock, SystemClock};
use crate::domain::events::EventKind;
use crate::observability::LogFormat;
use chrono::NaiveDate;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_REGISTERED_QUEUE: &str = "fincance-cadastro-funcionario-queue";
pub const DEFAULT_DELETED_QUEUE: &str = "fincance-employee-deleted-queue";
pub const DEFAULT_ROLE_CHANGED_QUEUE: &str = "employee-role-changed-queue";
pub const DEFAULT_STATUS_CHANGED_QUEUE: &str = "finance-employee-status-changed-queue";

#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Path to a persistent database. Without it, state lives in memory.
    #[arg(long, env = "PAYCYCLE_DB_PATH", global = true)]
    pub db_path: Option<PathBuf>,

    #[arg(long, env = "PAYCYCLE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact, global = true)]
    pub log_format: LogFormat,

    /// Outbound events queued beyond this are dropped.
    #[arg(long, env = "PAYCYCLE_OUTBOUND_CAPACITY", default_value_t = 1024, global = true)]
    pub outbound_capacity: usize,

    #[arg(long, env = "PAYCYCLE_PUBLISH_MAX_ATTEMPTS", default_value_t = 3, global = true)]
    pub publish_max_attempts: u32,

    /// First publish retry delay; doubled on each further attempt.
    #[arg(long, env = "PAYCYCLE_PUBLISH_BACKOFF_MS", default_value_t = 200, global = true)]
    pub publish_backoff_ms: u64,

    /// Redeliveries before an inbound message is dead-lettered.
    #[arg(long, env = "PAYCYCLE_MAX_REDELIVERIES", default_value_t = 5, global = true)]
    pub max_redeliveries: u32,

    #[arg(long, env = "PAYCYCLE_RESET_CHECK_INTERVAL_SECS", default_value_t = 3600, global = true)]
    pub reset_check_interval_secs: u64,

    /// Pin the clock to midday UTC on this date instead of the system time.
    #[arg(long, env = "PAYCYCLE_TODAY", global = true)]
    pub today: Option<NaiveDate>,

    /// Bootstrap demo payments and ledger rows at startup.
    #[arg(long, env = "PAYCYCLE_DEMO_SEED", global = true)]
    pub demo_seed: bool,

    #[arg(long, env = "PAYCYCLE_REGISTERED_QUEUE", default_value = DEFAULT_REGISTERED_QUEUE, global = true)]
    pub registered_queue: String,

    #[arg(long, env = "PAYCYCLE_DELETED_QUEUE", default_value = DEFAULT_DELETED_QUEUE, global = true)]
    pub deleted_queue: String,

    #[arg(long, env = "PAYCYCLE_ROLE_CHANGED_QUEUE", default_value = DEFAULT_ROLE_CHANGED_QUEUE, global = true)]
    pub role_changed_queue: String,

    #[arg(long, env = "PAYCYCLE_STATUS_CHANGED_QUEUE", default_value = DEFAULT_STATUS_CHANGED_QUEUE, global = true)]
    pub status_changed_queue: String,
}

impl Settings {
    pub fn publish_policy(&self) -> PublishPolicy {
        PublishPolicy {
            capacity: self.outbound_capacity,
            max_attempts: self.publish_max_attempts.max(1),
            initial_backoff: Duration::from_millis(self.publish_backoff_ms),
            ..PublishPolicy::default()
        }
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        match self.today {
            Some(date) => Arc::new(FixedClock::on_date(date)),
            None => Arc::new(SystemClock),
        }
    }

    pub fn reset_check_interval(&self) -> Duration {
        Duration::from_secs(self.reset_check_interval_secs.max(1))
    }

    /// Inbound queue name for each event kind.
    pub fn queue_bindings(&self) -> Vec<(EventKind, String)> {
        EventKind::ALL
            .into_iter()
            .map(|kind| (kind, self.queue_for(kind).to_string()))
            .collect()
    }

    pub fn queue_for(&self, kind: EventKind) -> &str {
        match kind {
            EventKind::Registered => &self.registered_queue,
            EventKind::Deleted => &self.deleted_queue,
            EventKind::RoleChanged => &self.role_changed_queue,
            EventKind::StatusChanged => &self.status_changed_queue,
        }
    }
}
