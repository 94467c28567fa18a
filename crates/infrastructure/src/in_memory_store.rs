use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use planner_core::{
    id_matches_pattern, CronJob, ExecutionRecord, ExecutionRecordRepository, JobState, JobStore,
    JobType, PlannerError, QueuedJob, Result, StalledJobs, STALLED_JOB_ERROR,
};
use tokio::sync::RwLock;
use tracing::debug;

/// 内存任务存储
///
/// 适用于嵌入式部署和测试。进程退出后任务丢失，多进程部署请使用SQLite存储。
#[derive(Debug, Clone)]
pub struct InMemoryJobStore {
    /// 任务ID -> 任务
    jobs: Arc<RwLock<HashMap<String, QueuedJob>>>,
    /// 任务类型 -> 周期任务
    crons: Arc<RwLock<HashMap<JobType, CronJob>>>,
    ready: Arc<AtomicBool>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            crons: Arc::new(RwLock::new(HashMap::new())),
            ready: Arc::new(AtomicBool::new(true)),
        }
    }

    /// 模拟存储不可用
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    pub async fn all_jobs(&self) -> Vec<QueuedJob> {
        let mut jobs: Vec<QueuedJob> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by(|a, b| a.id.cmp(&b.id));
        jobs
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn insert(&self, job: QueuedJob) -> Result<bool> {
        let mut jobs = self.jobs.write().await;
        if let Some(existing) = jobs.get(&job.id) {
            if existing.state.is_pending() {
                debug!("任务ID已存在且未结束，忽略: {}", job.id);
                return Ok(false);
            }
        }
        jobs.insert(job.id.clone(), job);
        Ok(true)
    }

    async fn insert_if_absent(&self, job: QueuedJob) -> Result<bool> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            debug!("任务ID已存在，忽略: {}", job.id);
            return Ok(false);
        }
        jobs.insert(job.id.clone(), job);
        Ok(true)
    }

    async fn get(&self, id: &str) -> Result<Option<QueuedJob>> {
        Ok(self.jobs.read().await.get(id).cloned())
    }

    async fn remove_delayed_matching(&self, pattern: &str) -> Result<usize> {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|id, job| !(job.state == JobState::Delayed && id_matches_pattern(id, pattern)));
        Ok(before - jobs.len())
    }

    async fn dequeue_due(&self, now: DateTime<Utc>) -> Result<Option<QueuedJob>> {
        let mut jobs = self.jobs.write().await;
        let next_id = jobs
            .values()
            .filter(|job| job.is_due(now))
            .min_by(|a, b| {
                a.job
                    .execution_time
                    .cmp(&b.job.execution_time)
                    .then(a.job.effective_priority().cmp(&b.job.effective_priority()))
                    .then(a.enqueued_at.cmp(&b.enqueued_at))
            })
            .map(|job| job.id.clone());

        Ok(next_id.and_then(|id| {
            jobs.get_mut(&id).map(|job| {
                job.state = JobState::Active;
                job.attempts_made += 1;
                job.started_at = Some(now);
                job.clone()
            })
        }))
    }

    async fn complete(&self, id: &str, now: DateTime<Utc>) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| PlannerError::not_found("任务", id))?;
        job.state = JobState::Completed;
        job.started_at = None;
        job.finished_at = Some(now);
        Ok(())
    }

    async fn fail(
        &self,
        id: &str,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| PlannerError::not_found("任务", id))?;
        job.last_error = Some(error.to_string());
        job.started_at = None;
        match retry_at {
            Some(at) => {
                job.state = JobState::Delayed;
                job.job.execution_time = at;
            }
            None => {
                job.state = JobState::Failed;
                job.finished_at = Some(now);
            }
        }
        Ok(())
    }

    async fn requeue_stalled(
        &self,
        started_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<StalledJobs> {
        let mut jobs = self.jobs.write().await;
        let mut stalled = StalledJobs::default();
        for job in jobs.values_mut().filter(|job| job.is_stalled(started_before)) {
            job.started_at = None;
            job.last_error = Some(STALLED_JOB_ERROR.to_string());
            if job.has_attempts_left() {
                job.state = JobState::Delayed;
                job.job.execution_time = now;
                stalled.requeued.push(job.id.clone());
            } else {
                job.state = JobState::Failed;
                job.finished_at = Some(now);
                stalled.failed.push(job.id.clone());
            }
        }
        stalled.requeued.sort();
        stalled.failed.sort();
        Ok(stalled)
    }

    async fn count_by_type_and_state(&self, job_type: JobType, state: JobState) -> Result<usize> {
        Ok(self
            .jobs
            .read()
            .await
            .values()
            .filter(|job| job.job_type() == job_type && job.state == state)
            .count())
    }

    async fn purge_finished_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| {
            !(job.state.is_finished() && job.finished_at.is_some_and(|at| at < cutoff))
        });
        Ok(before - jobs.len())
    }

    async fn upsert_cron(&self, cron: CronJob) -> Result<()> {
        self.crons.write().await.insert(cron.job_type, cron);
        Ok(())
    }

    async fn remove_all_crons(&self) -> Result<usize> {
        let mut crons = self.crons.write().await;
        let removed = crons.len();
        crons.clear();
        Ok(removed)
    }

    async fn list_crons(&self) -> Result<Vec<CronJob>> {
        let mut crons: Vec<CronJob> = self.crons.read().await.values().cloned().collect();
        crons.sort_by_key(|c| c.job_type.as_str());
        Ok(crons)
    }
}

/// 内存执行记录仓库
#[derive(Debug, Clone, Default)]
pub struct InMemoryExecutionRecordRepository {
    records: Arc<RwLock<Vec<ExecutionRecord>>>,
}

impl InMemoryExecutionRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<ExecutionRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl ExecutionRecordRepository for InMemoryExecutionRecordRepository {
    async fn save(&self, record: &ExecutionRecord) -> Result<()> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn find_by_type_since(
        &self,
        job_type: JobType,
        since: DateTime<Utc>,
    ) -> Result<Vec<ExecutionRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.job_type == job_type && r.execution_time >= since)
            .cloned()
            .collect())
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.execution_time >= cutoff);
        Ok(before - records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use planner_core::Job;

    fn queued(id: &str, at: DateTime<Utc>, priority: Option<i32>) -> QueuedJob {
        let mut job = Job::new(JobType::Fake, at, serde_json::Value::Null);
        job.priority = priority;
        QueuedJob::new(id.to_string(), job, at)
    }

    #[tokio::test]
    async fn test_insert_same_pending_id_is_noop() {
        let store = InMemoryJobStore::new();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();

        assert!(store.insert(queued("a", now, None)).await.unwrap());
        assert!(!store
            .insert(queued("a", now + Duration::hours(1), None))
            .await
            .unwrap());
        assert_eq!(store.get("a").await.unwrap().unwrap().job.execution_time, now);

        store.dequeue_due(now).await.unwrap();
        store.complete("a", now).await.unwrap();
        assert!(store
            .insert(queued("a", now + Duration::hours(1), None))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_insert_if_absent_never_replaces() {
        let store = InMemoryJobStore::new();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();

        assert!(store.insert_if_absent(queued("a", now, None)).await.unwrap());
        store.dequeue_due(now).await.unwrap();
        store.complete("a", now).await.unwrap();

        assert!(!store.insert_if_absent(queued("a", now, None)).await.unwrap());
        assert_eq!(store.get("a").await.unwrap().unwrap().state, JobState::Completed);
    }

    #[tokio::test]
    async fn test_requeue_stalled_respects_attempts() {
        let store = InMemoryJobStore::new();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let mut retried = queued("retried", now, None);
        retried.job.attempts = Some(3);
        store.insert(retried).await.unwrap();
        store.insert(queued("single", now, None)).await.unwrap();
        store.dequeue_due(now).await.unwrap();
        store.dequeue_due(now).await.unwrap();

        let later = now + Duration::hours(2);
        let none = store.requeue_stalled(now, later).await.unwrap();
        assert!(none.is_empty());

        let stalled = store
            .requeue_stalled(later - Duration::hours(1), later)
            .await
            .unwrap();
        assert_eq!(stalled.requeued, vec!["retried".to_string()]);
        assert_eq!(stalled.failed, vec!["single".to_string()]);

        let retried = store.get("retried").await.unwrap().unwrap();
        assert_eq!(retried.state, JobState::Delayed);
        assert_eq!(retried.job.execution_time, later);
        assert_eq!(retried.last_error.as_deref(), Some(STALLED_JOB_ERROR));
        let single = store.get("single").await.unwrap().unwrap();
        assert_eq!(single.state, JobState::Failed);
        assert_eq!(single.finished_at, Some(later));

        let again = store.dequeue_due(later).await.unwrap().unwrap();
        assert_eq!(again.id, "retried");
        assert_eq!(again.attempts_made, 2);
        assert_eq!(again.started_at, Some(later));
    }

    #[tokio::test]
    async fn test_dequeue_order_and_due_time() {
        let store = InMemoryJobStore::new();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();

        store.insert(queued("late", now + Duration::minutes(5), None)).await.unwrap();
        store.insert(queued("low", now, Some(5))).await.unwrap();
        store.insert(queued("high", now, Some(1))).await.unwrap();

        assert_eq!(store.dequeue_due(now).await.unwrap().unwrap().id, "high");
        assert_eq!(store.dequeue_due(now).await.unwrap().unwrap().id, "low");
        assert!(store.dequeue_due(now).await.unwrap().is_none());
        assert_eq!(
            store
                .count_by_type_and_state(JobType::Fake, JobState::Active)
                .await
                .unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn test_purge_and_records() {
        let store = InMemoryJobStore::new();
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
        store.insert(queued("old", now, None)).await.unwrap();
        store.dequeue_due(now).await.unwrap();
        store.complete("old", now - Duration::days(8)).await.unwrap();
        store.insert(queued("pending", now, None)).await.unwrap();

        let purged = store.purge_finished_before(now - Duration::days(7)).await.unwrap();
        assert_eq!(purged, 1);
        assert_eq!(store.len().await, 1);

        let repo = InMemoryExecutionRecordRepository::new();
        for hours in [1, 30] {
            repo.save(&ExecutionRecord {
                job_type: JobType::Fake,
                execution_time: now - Duration::hours(hours),
                succeeded: true,
                error_count: 0,
                duration_ms: 5,
                result: serde_json::Value::Null,
            })
            .await
            .unwrap();
        }
        let recent = repo
            .find_by_type_since(JobType::Fake, now - Duration::hours(24))
            .await
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(repo.purge_before(now - Duration::hours(24)).await.unwrap(), 1);
    }
}
