use std::sync::Arc;
use std::time::Instant;

use planner_core::{Clock, ExecutionRecord, ExecutionRecordRepository, QueuedJob, Result};
use planner_infrastructure::StructuredLogger;
use serde_json::json;

use crate::handler::{JobHandler, JobOutcome};

/// 任务执行跟踪器
///
/// 包装处理器调用，每次执行无论成败都写入一条执行记录。
/// 记录写入失败只打日志，不影响任务结果。
pub struct ExecutionTracker {
    records: Arc<dyn ExecutionRecordRepository>,
    clock: Arc<dyn Clock>,
}

impl ExecutionTracker {
    pub fn new(records: Arc<dyn ExecutionRecordRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { records, clock }
    }

    pub async fn track(&self, handler: &dyn JobHandler, job: &QueuedJob) -> Result<JobOutcome> {
        let execution_time = self.clock.now();
        let started = Instant::now();
        let outcome = handler.handle(job).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let record = match &outcome {
            Ok(outcome) => ExecutionRecord {
                job_type: job.job_type(),
                execution_time,
                succeeded: outcome.succeeded,
                error_count: outcome.error_count,
                duration_ms,
                result: outcome.result.clone(),
            },
            Err(e) => ExecutionRecord {
                job_type: job.job_type(),
                execution_time,
                succeeded: false,
                error_count: 1,
                duration_ms,
                result: json!({ "error": e.to_string() }),
            },
        };

        if let Err(e) = self.records.save(&record).await {
            StructuredLogger::log_system_error("execution_tracker", "save_record", &e);
        }
        outcome
    }
}
