pub mod cron_job;
pub mod execution;
pub mod job;

pub use cron_job::CronJob;
pub use execution::{CronHealthReport, ExecutionRecord};
pub use job::{
    id_matches_pattern, Job, JobState, JobType, QueuedJob, StalledJobs, STALLED_JOB_ERROR,
};
