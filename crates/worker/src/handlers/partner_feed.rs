use std::sync::Arc;

use async_trait::async_trait;
use planner_core::{Job, JobType, PlannerError, QueuedJob, Result};
use planner_dispatcher::JobScheduler;
use planner_domain::PartnerEventSource;
use serde_json::json;
use tracing::{debug, warn};

use crate::handler::{JobHandler, JobOutcome};

/// 事件处理任务的重试次数
const EVENT_JOB_ATTEMPTS: u32 = 3;
const EVENT_JOB_BACKOFF_MS: u64 = 10_000;

pub fn event_job_id(event_id: &str) -> String {
    format!("evt:{event_id}")
}

/// 拉取合作方事件队列，每个事件入队为一个独立的对账任务
///
/// 入队成功后才确认事件；失败的事件保持未确认，下次拉取时重新投递。
pub struct PartnerEventFeed {
    source: Arc<dyn PartnerEventSource>,
    scheduler: Arc<JobScheduler>,
}

impl PartnerEventFeed {
    pub fn new(source: Arc<dyn PartnerEventSource>, scheduler: Arc<JobScheduler>) -> Self {
        Self { source, scheduler }
    }
}

#[async_trait]
impl JobHandler for PartnerEventFeed {
    fn job_type(&self) -> JobType {
        JobType::FollowPartnerEvents
    }

    fn single_instance(&self) -> bool {
        true
    }

    async fn handle(&self, _job: &QueuedJob) -> Result<JobOutcome> {
        let events = self.source.fetch_pending().await?;
        let now = self.scheduler.clock().now();

        let mut enqueued = 0u32;
        let mut failed = 0u32;
        for event in &events {
            let job = Job::new(JobType::ProcessPartnerEvent, now, serde_json::to_value(event)?)
                .with_id(event_job_id(&event.id))
                .with_attempts(EVENT_JOB_ATTEMPTS)
                .with_backoff_ms(EVENT_JOB_BACKOFF_MS);

            let queued = match self.scheduler.schedule(job).await {
                Ok(_) => self.source.acknowledge(event).await,
                Err(e @ PlannerError::SchedulingUnavailable(_)) => return Err(e),
                Err(e) => Err(e),
            };
            match queued {
                Ok(()) => enqueued += 1,
                Err(e) => {
                    warn!("合作方事件 {} 入队失败: {}", event.id, e);
                    failed += 1;
                }
            }
        }
        debug!("合作方事件拉取: {} 个, 入队 {} 个", events.len(), enqueued);

        Ok(JobOutcome::with_errors(
            failed,
            json!({ "fetched": events.len(), "enqueued": enqueued }),
        ))
    }
}
