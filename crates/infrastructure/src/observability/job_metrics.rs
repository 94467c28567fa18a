use metrics::{counter, histogram};

/// 任务相关指标
pub struct JobMetrics;

impl JobMetrics {
    /// 记录一次任务处理结果，`outcome` 取值 completed / retried / failed / skipped
    pub fn record_job_processed(job_type: &'static str, outcome: &'static str, duration_ms: u64) {
        counter!("planner_jobs_processed_total", "job_type" => job_type, "outcome" => outcome)
            .increment(1);
        histogram!("planner_job_duration_ms", "job_type" => job_type).record(duration_ms as f64);
    }

    pub fn record_jobs_scheduled(job_type: &'static str) {
        counter!("planner_jobs_scheduled_total", "job_type" => job_type).increment(1);
    }

    pub fn record_push_sent(source: &'static str, count: u64) {
        counter!("planner_push_sent_total", "source" => source).increment(count);
    }

    pub fn record_push_failed(source: &'static str, count: u64) {
        counter!("planner_push_failed_total", "source" => source).increment(count);
    }
}
