use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use planner_core::{ExecutionRecordRepository, JobType, QueuedJob, Result};
use planner_dispatcher::JobScheduler;
use serde_json::json;
use tracing::info;

use crate::handler::{JobHandler, JobOutcome};

/// 清理已结束任务和过期执行记录
pub struct CleanupHandler {
    scheduler: Arc<JobScheduler>,
    records: Arc<dyn ExecutionRecordRepository>,
    job_retention: Duration,
    record_retention: Duration,
}

impl CleanupHandler {
    pub fn new(
        scheduler: Arc<JobScheduler>,
        records: Arc<dyn ExecutionRecordRepository>,
        job_retention: Duration,
        record_retention: Duration,
    ) -> Self {
        Self {
            scheduler,
            records,
            job_retention,
            record_retention,
        }
    }
}

#[async_trait]
impl JobHandler for CleanupHandler {
    fn job_type(&self) -> JobType {
        JobType::CleanupJobs
    }

    async fn handle(&self, _job: &QueuedJob) -> Result<JobOutcome> {
        let stats = self.scheduler.cleanup_completed(self.job_retention).await?;
        let cutoff = self.scheduler.clock().now() - self.record_retention;
        let purged = self.records.purge_before(cutoff).await?;
        info!("清理了 {} 条执行记录, 截止时间 {}", purged, cutoff);

        Ok(JobOutcome::success(json!({
            "cleanedJobs": stats.cleaned,
            "purgedRecords": purged,
        })))
    }
}
