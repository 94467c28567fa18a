use async_trait::async_trait;
use planner_core::{JobType, QueuedJob, Result};
use tracing::info;

use crate::handler::{JobHandler, JobOutcome};

/// 冒烟测试处理器，原样返回负载
#[derive(Debug, Default)]
pub struct FakeHandler;

#[async_trait]
impl JobHandler for FakeHandler {
    fn job_type(&self) -> JobType {
        JobType::Fake
    }

    async fn handle(&self, job: &QueuedJob) -> Result<JobOutcome> {
        info!("执行测试任务 {}: {}", job.id, job.job.payload);
        Ok(JobOutcome::success(job.job.payload.clone()))
    }
}
