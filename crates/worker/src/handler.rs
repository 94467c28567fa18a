use async_trait::async_trait;
use planner_core::{JobType, QueuedJob, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 一次任务处理的结果
///
/// 处理器内部可以部分失败（例如某条推送发送失败），此时任务仍视为完成，
/// 失败数量记录在 `error_count` 中。返回 `Err` 表示整次执行失败，由消费循环决定是否重试。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOutcome {
    pub succeeded: bool,
    pub error_count: u32,
    pub result: Value,
}

impl JobOutcome {
    pub fn success(result: Value) -> Self {
        Self {
            succeeded: true,
            error_count: 0,
            result,
        }
    }

    /// 运行完整结束，内部已隔离的部分失败只计入 `error_count`
    pub fn completed_with_errors(error_count: u32, result: Value) -> Self {
        Self {
            succeeded: true,
            error_count,
            result,
        }
    }

    /// 按失败数量决定是否成功
    pub fn with_errors(error_count: u32, result: Value) -> Self {
        Self {
            succeeded: error_count == 0,
            error_count,
            result,
        }
    }
}

/// 任务处理器
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// 处理的任务类型
    fn job_type(&self) -> JobType;

    /// 同类型任务同时只允许一个在执行
    fn single_instance(&self) -> bool {
        false
    }

    async fn handle(&self, job: &QueuedJob) -> Result<JobOutcome>;
}
