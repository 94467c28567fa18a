use async_trait::async_trait;
use chrono::{DateTime, Utc};
use planner_core::{ExecutionRecord, ExecutionRecordRepository, JobType, Result};
use sqlx::{Row, SqlitePool};

use super::{from_millis, to_millis};

pub struct SqliteExecutionRecordRepository {
    pool: SqlitePool,
}

impl SqliteExecutionRecordRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<ExecutionRecord> {
        let job_type: String = row.try_get("job_type")?;
        let result: String = row.try_get("result")?;
        let error_count: i64 = row.try_get("error_count")?;
        let duration_ms: i64 = row.try_get("duration_ms")?;
        Ok(ExecutionRecord {
            job_type: job_type.parse::<JobType>()?,
            execution_time: from_millis(row.try_get("execution_time")?)?,
            succeeded: row.try_get("succeeded")?,
            error_count: error_count as u32,
            duration_ms: duration_ms as u64,
            result: serde_json::from_str(&result)?,
        })
    }
}

#[async_trait]
impl ExecutionRecordRepository for SqliteExecutionRecordRepository {
    async fn save(&self, record: &ExecutionRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO execution_records (job_type, execution_time, succeeded, error_count, duration_ms, result)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(record.job_type.as_str())
        .bind(to_millis(record.execution_time))
        .bind(record.succeeded)
        .bind(i64::from(record.error_count))
        .bind(record.duration_ms as i64)
        .bind(serde_json::to_string(&record.result)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_type_since(
        &self,
        job_type: JobType,
        since: DateTime<Utc>,
    ) -> Result<Vec<ExecutionRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT job_type, execution_time, succeeded, error_count, duration_ms, result
            FROM execution_records
            WHERE job_type = ?1 AND execution_time >= ?2
            ORDER BY execution_time
            "#,
        )
        .bind(job_type.as_str())
        .bind(to_millis(since))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let result = sqlx::query("DELETE FROM execution_records WHERE execution_time < ?1")
            .bind(to_millis(cutoff))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }
}
