pub mod sqlite_execution_record_repository;
pub mod sqlite_job_store;

pub use sqlite_execution_record_repository::SqliteExecutionRecordRepository;
pub use sqlite_job_store::SqliteJobStore;

use chrono::{DateTime, Utc};
use planner_core::config::DatabaseConfig;
use planner_core::{PlannerError, Result};
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::info;

const SCHEMA: [&str; 5] = [
    r#"
    CREATE TABLE IF NOT EXISTS jobs (
        id TEXT PRIMARY KEY,
        job_type TEXT NOT NULL,
        payload TEXT NOT NULL,
        execution_time INTEGER NOT NULL,
        attempts INTEGER,
        backoff_ms INTEGER,
        priority INTEGER,
        state TEXT NOT NULL,
        attempts_made INTEGER NOT NULL DEFAULT 0,
        enqueued_at INTEGER NOT NULL,
        started_at INTEGER,
        finished_at INTEGER,
        last_error TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_jobs_due ON jobs (state, execution_time)",
    r#"
    CREATE TABLE IF NOT EXISTS cron_jobs (
        job_type TEXT PRIMARY KEY,
        cron_expression TEXT NOT NULL,
        timezone TEXT NOT NULL,
        start_date INTEGER
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS execution_records (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        job_type TEXT NOT NULL,
        execution_time INTEGER NOT NULL,
        succeeded INTEGER NOT NULL,
        error_count INTEGER NOT NULL,
        duration_ms INTEGER NOT NULL,
        result TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_execution_records_type_time ON execution_records (job_type, execution_time)",
];

/// SQLite连接池管理
pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// 创建表结构（幂等）
    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("数据库表结构已就绪");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

pub(crate) fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub(crate) fn from_millis(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| PlannerError::Serialization(format!("无效的时间戳: {millis}")))
}
