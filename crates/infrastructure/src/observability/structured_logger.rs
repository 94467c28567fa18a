//! 结构化日志工具
//!
//! 统一任务生命周期事件的字段命名，便于日志平台按 `event` 检索。

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

/// 结构化日志工具
pub struct StructuredLogger;

impl StructuredLogger {
    /// 任务已入队
    pub fn log_job_scheduled(job_id: &str, job_type: &str, execution_time: DateTime<Utc>) {
        info!(
            event = "job_scheduled",
            job.id = job_id,
            job.type = job_type,
            job.execution_time = %execution_time,
            "任务已调度"
        );
    }

    /// 同ID任务仍待执行，本次调度被忽略
    pub fn log_job_deduplicated(job_id: &str, job_type: &str) {
        debug!(
            event = "job_deduplicated",
            job.id = job_id,
            job.type = job_type,
            "同ID任务已存在，忽略本次调度"
        );
    }

    pub fn log_jobs_cancelled(pattern: &str, removed: usize) {
        info!(
            event = "jobs_cancelled",
            job.pattern = pattern,
            job.removed = removed,
            "按ID模式取消任务"
        );
    }

    /// 执行超时的任务被回收，requeued 为 false 表示已无剩余尝试次数
    pub fn log_job_stalled(job_id: &str, requeued: bool) {
        warn!(
            event = "job_stalled",
            job.id = job_id,
            job.requeued = requeued,
            "任务执行超时，已回收"
        );
    }

    pub fn log_job_started(job_id: &str, job_type: &str, worker_id: &str, attempt: u32) {
        info!(
            event = "job_started",
            job.id = job_id,
            job.type = job_type,
            job.attempt = attempt,
            worker.id = worker_id,
            "任务开始执行"
        );
    }

    pub fn log_job_completed(
        job_id: &str,
        job_type: &str,
        worker_id: &str,
        succeeded: bool,
        error_count: u32,
        duration_ms: u64,
    ) {
        if succeeded {
            info!(
                event = "job_completed",
                job.id = job_id,
                job.type = job_type,
                worker.id = worker_id,
                job.error_count = error_count,
                job.duration_ms = duration_ms,
                "任务执行完成"
            );
        } else {
            warn!(
                event = "job_completed_with_errors",
                job.id = job_id,
                job.type = job_type,
                worker.id = worker_id,
                job.error_count = error_count,
                job.duration_ms = duration_ms,
                "任务执行完成但存在失败"
            );
        }
    }

    pub fn log_job_failed(job_id: &str, job_type: &str, worker_id: &str, error: &str) {
        error!(
            event = "job_failed",
            job.id = job_id,
            job.type = job_type,
            worker.id = worker_id,
            job.error = error,
            "任务执行失败"
        );
    }

    pub fn log_job_retry(job_id: &str, job_type: &str, attempt: u32, retry_at: DateTime<Utc>) {
        warn!(
            event = "job_retry",
            job.id = job_id,
            job.type = job_type,
            job.attempt = attempt,
            job.retry_at = %retry_at,
            "任务将重试"
        );
    }

    pub fn log_cron_registered(job_type: &str, cron_expression: &str, timezone: &str) {
        info!(
            event = "cron_registered",
            cron.type = job_type,
            cron.expression = cron_expression,
            cron.timezone = timezone,
            "周期任务已注册"
        );
    }

    pub fn log_system_error(component: &str, operation: &str, error: &dyn std::error::Error) {
        error!(
            event = "system_error",
            component = component,
            operation = operation,
            error = %error,
            "系统错误"
        );
    }
}
