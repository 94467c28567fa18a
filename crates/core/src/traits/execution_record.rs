use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{ExecutionRecord, JobType};
use crate::Result;

/// 任务执行记录仓库（仅追加）
#[async_trait]
pub trait ExecutionRecordRepository: Send + Sync {
    async fn save(&self, record: &ExecutionRecord) -> Result<()>;

    /// 查询某类型在 `since` 之后的执行记录
    async fn find_by_type_since(
        &self,
        job_type: JobType,
        since: DateTime<Utc>,
    ) -> Result<Vec<ExecutionRecord>>;

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}
