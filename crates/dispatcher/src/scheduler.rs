use std::sync::Arc;

use chrono::Duration;
use planner_core::{
    Clock, CronJob, Job, JobState, JobStore, JobType, PlannerError, QueuedJob, Result,
    StalledJobs,
};
use planner_infrastructure::{JobMetrics, StructuredLogger};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::cron_utils::CronScheduler;

/// 已结束任务清理统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupStats {
    pub cleaned: usize,
}

/// 持久化延迟/周期任务调度器
///
/// 保证：不早于执行时间执行、至少一次投递、稳定的任务ID（同ID待执行任务不会重复入队）。
pub struct JobScheduler {
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
}

impl JobScheduler {
    pub fn new(store: Arc<dyn JobStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> Arc<dyn JobStore> {
        Arc::clone(&self.store)
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    async fn ensure_ready(&self) -> Result<()> {
        if !self.store.is_ready().await {
            warn!("任务存储不可用，拒绝调度请求");
            return Err(PlannerError::SchedulingUnavailable(
                "任务存储未就绪".to_string(),
            ));
        }
        Ok(())
    }

    /// 调度任务，返回任务ID
    ///
    /// 未指定ID时生成UUID。同ID任务仍待执行时不做修改，直接返回已有ID；
    /// 需要改期时先取消再重新调度。
    pub async fn schedule(&self, job: Job) -> Result<String> {
        self.ensure_ready().await?;

        let id = job
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let job_type = job.job_type;
        let execution_time = job.execution_time;
        let queued = QueuedJob::new(id.clone(), job, self.clock.now());

        if self.store.insert(queued).await? {
            StructuredLogger::log_job_scheduled(&id, job_type.as_str(), execution_time);
            JobMetrics::record_jobs_scheduled(job_type.as_str());
        } else {
            StructuredLogger::log_job_deduplicated(&id, job_type.as_str());
        }
        Ok(id)
    }

    /// 仅在同ID任务从未存在（或已被清理）时入队，返回新入队的任务ID
    ///
    /// 周期任务的触发ID由触发时间决定，已完成的同一触发不能再次入队。
    pub async fn schedule_once(&self, job: Job) -> Result<Option<String>> {
        self.ensure_ready().await?;

        let id = job
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let job_type = job.job_type;
        let execution_time = job.execution_time;
        let queued = QueuedJob::new(id.clone(), job, self.clock.now());

        if self.store.insert_if_absent(queued).await? {
            StructuredLogger::log_job_scheduled(&id, job_type.as_str(), execution_time);
            JobMetrics::record_jobs_scheduled(job_type.as_str());
            Ok(Some(id))
        } else {
            StructuredLogger::log_job_deduplicated(&id, job_type.as_str());
            Ok(None)
        }
    }

    /// 回收取出时间早于租期的执行中任务
    ///
    /// 还有剩余尝试次数的任务立即重新投递，否则标记为失败。
    pub async fn recover_stalled(&self, lease: Duration) -> Result<StalledJobs> {
        self.ensure_ready().await?;
        let now = self.clock.now();
        let stalled = self.store.requeue_stalled(now - lease, now).await?;

        for id in &stalled.requeued {
            StructuredLogger::log_job_stalled(id, true);
        }
        for id in &stalled.failed {
            StructuredLogger::log_job_stalled(id, false);
        }
        Ok(stalled)
    }

    /// 取消ID匹配模式且尚未被取出的任务，返回删除数量
    pub async fn cancel_by_id_pattern(&self, pattern: &str) -> Result<usize> {
        self.ensure_ready().await?;
        if pattern.trim_matches('*').is_empty() {
            return Err(PlannerError::Internal(
                "取消任务的ID模式不能为空".to_string(),
            ));
        }

        let removed = self.store.remove_delayed_matching(pattern).await?;
        StructuredLogger::log_jobs_cancelled(pattern, removed);
        Ok(removed)
    }

    /// 注册周期任务，按任务类型覆盖已有注册
    pub async fn register_cron(&self, cron: CronJob) -> Result<()> {
        self.ensure_ready().await?;
        CronScheduler::with_timezone(&cron.cron_expression, &cron.timezone)?;

        StructuredLogger::log_cron_registered(
            cron.job_type.as_str(),
            &cron.cron_expression,
            &cron.timezone,
        );
        self.store.upsert_cron(cron).await
    }

    pub async fn unregister_all_crons(&self) -> Result<usize> {
        self.ensure_ready().await?;
        let removed = self.store.remove_all_crons().await?;
        info!("已注销 {} 个周期任务", removed);
        Ok(removed)
    }

    pub async fn registered_crons(&self) -> Result<Vec<CronJob>> {
        self.store.list_crons().await
    }

    /// 正在执行的某类型任务数量
    pub async fn count_active_by_type(&self, job_type: JobType) -> Result<usize> {
        self.store
            .count_by_type_and_state(job_type, JobState::Active)
            .await
    }

    /// 删除结束时间早于保留期的已完成/失败任务
    pub async fn cleanup_completed(&self, retention: Duration) -> Result<CleanupStats> {
        self.ensure_ready().await?;
        let cutoff = self.clock.now() - retention;
        let cleaned = self.store.purge_finished_before(cutoff).await?;
        info!("清理了 {} 个已结束任务, 截止时间 {}", cleaned, cutoff);
        Ok(CleanupStats { cleaned })
    }
}
