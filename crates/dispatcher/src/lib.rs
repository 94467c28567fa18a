//! 任务调度：延迟任务队列、周期任务触发与预约提醒

pub mod cron_ticker;
pub mod cron_utils;
pub mod reminders;
pub mod scheduler;

pub use cron_ticker::{
    cron_job_id, default_cron_jobs, CronTicker, DEFAULT_STALLED_JOB_LEASE_SECONDS,
};
pub use cron_utils::CronScheduler;
pub use reminders::{reminder_job_id, ReminderPlanner, REMINDER_OFFSETS_DAYS};
pub use scheduler::{CleanupStats, JobScheduler};
