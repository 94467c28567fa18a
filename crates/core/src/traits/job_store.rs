use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{CronJob, JobState, JobType, QueuedJob, StalledJobs};
use crate::Result;

/// 持久化任务队列存储
///
/// 所有实现都必须保证 `dequeue_due` 的原子性：同一个任务不会被两个消费者同时取出。
#[async_trait]
pub trait JobStore: Send + Sync {
    /// 存储是否可用
    async fn is_ready(&self) -> bool;

    /// 插入任务。同ID任务仍处于待执行状态时不做修改并返回 `false`；
    /// 已结束的同ID任务会被替换。
    async fn insert(&self, job: QueuedJob) -> Result<bool>;

    /// 仅在同ID任务不存在（无论状态）时插入
    async fn insert_if_absent(&self, job: QueuedJob) -> Result<bool>;

    async fn get(&self, id: &str) -> Result<Option<QueuedJob>>;

    /// 删除ID匹配模式且尚未被取出的任务
    async fn remove_delayed_matching(&self, pattern: &str) -> Result<usize>;

    /// 取出一个到期任务并标记为 Active，记录取出时间
    ///
    /// 排序：执行时间最早优先，其次优先级数值小者优先。
    async fn dequeue_due(&self, now: DateTime<Utc>) -> Result<Option<QueuedJob>>;

    async fn complete(&self, id: &str, now: DateTime<Utc>) -> Result<()>;

    /// 标记任务失败。`retry_at` 存在时任务重新进入 Delayed 状态。
    async fn fail(
        &self,
        id: &str,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<()>;

    /// 回收在 `started_before` 之前取出且仍为 Active 的任务
    async fn requeue_stalled(
        &self,
        started_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<StalledJobs>;

    async fn count_by_type_and_state(&self, job_type: JobType, state: JobState) -> Result<usize>;

    /// 删除在 `cutoff` 之前结束的任务
    async fn purge_finished_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;

    async fn upsert_cron(&self, cron: CronJob) -> Result<()>;

    async fn remove_all_crons(&self) -> Result<usize>;

    async fn list_crons(&self) -> Result<Vec<CronJob>>;
}
