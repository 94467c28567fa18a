use async_trait::async_trait;
use chrono::{DateTime, Utc};
use planner_core::{
    CronJob, Job, JobState, JobStore, JobType, PlannerError, QueuedJob, Result, StalledJobs,
    STALLED_JOB_ERROR,
};
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

use super::{from_millis, to_millis};

const JOB_COLUMNS: &str = "id, job_type, payload, execution_time, attempts, backoff_ms, priority, \
                           state, attempts_made, enqueued_at, started_at, finished_at, last_error";

/// 同ID已有任务时：只替换已结束的任务
const REPLACE_FINISHED: &str = r#"
    ON CONFLICT(id) DO UPDATE SET
        job_type = excluded.job_type,
        payload = excluded.payload,
        execution_time = excluded.execution_time,
        attempts = excluded.attempts,
        backoff_ms = excluded.backoff_ms,
        priority = excluded.priority,
        state = excluded.state,
        attempts_made = excluded.attempts_made,
        enqueued_at = excluded.enqueued_at,
        started_at = excluded.started_at,
        finished_at = excluded.finished_at,
        last_error = excluded.last_error
    WHERE jobs.state IN ('completed', 'failed')
"#;

/// 同ID已有任务时：保留原任务
const KEEP_EXISTING: &str = "ON CONFLICT(id) DO NOTHING";

/// SQLite任务存储
///
/// 多个进程可共享同一数据库文件；`dequeue_due` 使用单条 UPDATE ... RETURNING 保证原子性。
#[derive(Debug, Clone)]
pub struct SqliteJobStore {
    pool: SqlitePool,
}

impl SqliteJobStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_queued_job(row: &sqlx::sqlite::SqliteRow) -> Result<QueuedJob> {
        let id: String = row.try_get("id")?;
        let job_type: String = row.try_get("job_type")?;
        let payload: String = row.try_get("payload")?;
        let state: String = row.try_get("state")?;
        let attempts: Option<i64> = row.try_get("attempts")?;
        let backoff_ms: Option<i64> = row.try_get("backoff_ms")?;
        let started_at: Option<i64> = row.try_get("started_at")?;
        let finished_at: Option<i64> = row.try_get("finished_at")?;
        let attempts_made: i64 = row.try_get("attempts_made")?;

        let job = Job {
            job_type: job_type.parse::<JobType>()?,
            payload: serde_json::from_str(&payload)?,
            execution_time: from_millis(row.try_get("execution_time")?)?,
            id: Some(id.clone()),
            attempts: attempts.map(|a| a as u32),
            backoff_ms: backoff_ms.map(|b| b as u64),
            priority: row.try_get::<Option<i64>, _>("priority")?.map(|p| p as i32),
        };

        Ok(QueuedJob {
            id,
            job,
            state: state.parse::<JobState>()?,
            attempts_made: attempts_made as u32,
            enqueued_at: from_millis(row.try_get("enqueued_at")?)?,
            started_at: started_at.map(from_millis).transpose()?,
            finished_at: finished_at.map(from_millis).transpose()?,
            last_error: row.try_get("last_error")?,
        })
    }

    async fn insert_with(&self, job: QueuedJob, on_conflict: &str) -> Result<bool> {
        let payload = serde_json::to_string(&job.job.payload)?;
        let result = sqlx::query(&format!(
            r#"
            INSERT INTO jobs ({JOB_COLUMNS})
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            {on_conflict}
            "#
        ))
        .bind(&job.id)
        .bind(job.job_type().as_str())
        .bind(payload)
        .bind(to_millis(job.job.execution_time))
        .bind(job.job.attempts.map(i64::from))
        .bind(job.job.backoff_ms.map(|b| b as i64))
        .bind(job.job.priority.map(i64::from))
        .bind(job.state.as_str())
        .bind(i64::from(job.attempts_made))
        .bind(to_millis(job.enqueued_at))
        .bind(job.started_at.map(to_millis))
        .bind(job.finished_at.map(to_millis))
        .bind(&job.last_error)
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() > 0;
        if !inserted {
            debug!("任务ID已存在，忽略");
        }
        Ok(inserted)
    }

    fn row_to_cron(row: &sqlx::sqlite::SqliteRow) -> Result<CronJob> {
        let job_type: String = row.try_get("job_type")?;
        let start_date: Option<i64> = row.try_get("start_date")?;
        Ok(CronJob {
            job_type: job_type.parse::<JobType>()?,
            cron_expression: row.try_get("cron_expression")?,
            timezone: row.try_get("timezone")?,
            start_date: start_date.map(from_millis).transpose()?,
        })
    }
}

/// 将任务ID模式转换为大小写敏感的 GLOB 表达式（不锚定首尾）
fn pattern_to_glob(pattern: &str) -> String {
    let escaped: Vec<String> = pattern
        .split('*')
        .map(|part| {
            part.chars()
                .map(|c| match c {
                    '?' => "[?]".to_string(),
                    '[' => "[[]".to_string(),
                    other => other.to_string(),
                })
                .collect()
        })
        .collect();
    format!("*{}*", escaped.join("*"))
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn is_ready(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    #[instrument(skip(self, job), fields(job_id = %job.id, job_type = %job.job_type()))]
    async fn insert(&self, job: QueuedJob) -> Result<bool> {
        self.insert_with(job, REPLACE_FINISHED).await
    }

    #[instrument(skip(self, job), fields(job_id = %job.id, job_type = %job.job_type()))]
    async fn insert_if_absent(&self, job: QueuedJob) -> Result<bool> {
        self.insert_with(job, KEEP_EXISTING).await
    }

    async fn get(&self, id: &str) -> Result<Option<QueuedJob>> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_queued_job).transpose()
    }

    async fn remove_delayed_matching(&self, pattern: &str) -> Result<usize> {
        let result = sqlx::query("DELETE FROM jobs WHERE state = 'delayed' AND id GLOB ?1")
            .bind(pattern_to_glob(pattern))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }

    async fn dequeue_due(&self, now: DateTime<Utc>) -> Result<Option<QueuedJob>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE jobs SET state = 'active', attempts_made = attempts_made + 1, started_at = ?1
            WHERE id = (
                SELECT id FROM jobs
                WHERE state = 'delayed' AND execution_time <= ?1
                ORDER BY execution_time, COALESCE(priority, 0), enqueued_at
                LIMIT 1
            ) AND state = 'delayed'
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(to_millis(now))
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_queued_job).transpose()
    }

    async fn complete(&self, id: &str, now: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query(
            "UPDATE jobs SET state = 'completed', started_at = NULL, finished_at = ?1 WHERE id = ?2",
        )
            .bind(to_millis(now))
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(PlannerError::not_found("任务", id));
        }
        Ok(())
    }

    async fn fail(
        &self,
        id: &str,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let query = match retry_at {
            Some(at) => sqlx::query(
                "UPDATE jobs SET state = 'delayed', started_at = NULL, execution_time = ?1, \
                 last_error = ?2 WHERE id = ?3",
            )
            .bind(to_millis(at)),
            None => sqlx::query(
                "UPDATE jobs SET state = 'failed', started_at = NULL, finished_at = ?1, \
                 last_error = ?2 WHERE id = ?3",
            )
            .bind(to_millis(now)),
        };

        let result = query.bind(error).bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(PlannerError::not_found("任务", id));
        }
        Ok(())
    }

    async fn requeue_stalled(
        &self,
        started_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<StalledJobs> {
        const STALLED: &str = "state = 'active' AND (started_at IS NULL OR started_at < ?1)";

        let mut tx = self.pool.begin().await?;
        let mut failed: Vec<String> = sqlx::query_scalar(&format!(
            r#"
            UPDATE jobs SET state = 'failed', started_at = NULL, finished_at = ?2, last_error = ?3
            WHERE {STALLED} AND attempts_made >= MAX(COALESCE(attempts, 1), 1)
            RETURNING id
            "#
        ))
        .bind(to_millis(started_before))
        .bind(to_millis(now))
        .bind(STALLED_JOB_ERROR)
        .fetch_all(&mut *tx)
        .await?;

        let mut requeued: Vec<String> = sqlx::query_scalar(&format!(
            r#"
            UPDATE jobs SET state = 'delayed', started_at = NULL, execution_time = ?2, last_error = ?3
            WHERE {STALLED}
            RETURNING id
            "#
        ))
        .bind(to_millis(started_before))
        .bind(to_millis(now))
        .bind(STALLED_JOB_ERROR)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        failed.sort();
        requeued.sort();
        Ok(StalledJobs { requeued, failed })
    }

    async fn count_by_type_and_state(&self, job_type: JobType, state: JobState) -> Result<usize> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE job_type = ?1 AND state = ?2")
                .bind(job_type.as_str())
                .bind(state.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(count as usize)
    }

    async fn purge_finished_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let result = sqlx::query(
            "DELETE FROM jobs WHERE state IN ('completed', 'failed') AND finished_at < ?1",
        )
        .bind(to_millis(cutoff))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() as usize)
    }

    async fn upsert_cron(&self, cron: CronJob) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cron_jobs (job_type, cron_expression, timezone, start_date)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(job_type) DO UPDATE SET
                cron_expression = excluded.cron_expression,
                timezone = excluded.timezone,
                start_date = excluded.start_date
            "#,
        )
        .bind(cron.job_type.as_str())
        .bind(&cron.cron_expression)
        .bind(&cron.timezone)
        .bind(cron.start_date.map(to_millis))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove_all_crons(&self) -> Result<usize> {
        let result = sqlx::query("DELETE FROM cron_jobs").execute(&self.pool).await?;
        Ok(result.rows_affected() as usize)
    }

    async fn list_crons(&self) -> Result<Vec<CronJob>> {
        let rows = sqlx::query(
            "SELECT job_type, cron_expression, timezone, start_date FROM cron_jobs ORDER BY job_type",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_cron).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_to_glob() {
        assert_eq!(pattern_to_glob("rdv:abc:"), "*rdv:abc:*");
        assert_eq!(pattern_to_glob("rdv:*:1"), "*rdv:*:1*");
        assert_eq!(pattern_to_glob("a?b[c"), "*a[?]b[[]c*");
    }
}
