use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::JobType;

/// 单次任务执行的跟踪记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub job_type: JobType,
    pub execution_time: DateTime<Utc>,
    pub succeeded: bool,
    pub error_count: u32,
    pub duration_ms: u64,
    /// 处理器自定义的统计结果
    #[serde(default)]
    pub result: serde_json::Value,
}

/// 定时任务24小时健康报告
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronHealthReport {
    pub job_type: JobType,
    pub expected_runs: u64,
    pub actual_runs: u64,
    pub total_errors: u64,
    pub total_failed_runs: u64,
}

impl CronHealthReport {
    /// 实际执行次数不足或存在失败
    pub fn is_degraded(&self) -> bool {
        self.actual_runs < self.expected_runs || self.total_failed_runs > 0
    }
}
