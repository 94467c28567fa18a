use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use planner_core::{CronHealthReport, ExecutionRecordRepository, JobType, QueuedJob, Result};
use planner_dispatcher::{CronScheduler, JobScheduler};
use tracing::{info, warn};

use crate::handler::{JobHandler, JobOutcome};

/// 定时任务健康监控
///
/// 对每个已注册的周期任务，比较过去24小时的预期触发次数与实际执行记录。只读，不修改任何状态。
pub struct CronHealthMonitor {
    scheduler: Arc<JobScheduler>,
    records: Arc<dyn ExecutionRecordRepository>,
}

impl CronHealthMonitor {
    pub fn new(scheduler: Arc<JobScheduler>, records: Arc<dyn ExecutionRecordRepository>) -> Self {
        Self { scheduler, records }
    }

    pub async fn check(&self) -> Result<Vec<CronHealthReport>> {
        let now = self.scheduler.clock().now();
        let since = now - Duration::hours(24);

        let mut reports = Vec::new();
        for cron in self.scheduler.registered_crons().await? {
            let expected_runs =
                match CronScheduler::with_timezone(&cron.cron_expression, &cron.timezone) {
                    Ok(schedule) => schedule.expected_runs_per_day(),
                    Err(e) => {
                        warn!("周期任务 {} 表达式无效，跳过监控: {}", cron.job_type, e);
                        continue;
                    }
                };

            let records: Vec<_> = self
                .records
                .find_by_type_since(cron.job_type, since)
                .await?
                .into_iter()
                .filter(|r| r.execution_time <= now)
                .collect();

            let report = CronHealthReport {
                job_type: cron.job_type,
                expected_runs,
                actual_runs: records.len() as u64,
                total_errors: records.iter().map(|r| u64::from(r.error_count)).sum(),
                total_failed_runs: records.iter().filter(|r| !r.succeeded).count() as u64,
            };

            if report.is_degraded() {
                warn!(
                    job_type = %report.job_type,
                    expected_runs = report.expected_runs,
                    actual_runs = report.actual_runs,
                    total_errors = report.total_errors,
                    total_failed_runs = report.total_failed_runs,
                    "周期任务24小时执行异常"
                );
            } else {
                info!(
                    job_type = %report.job_type,
                    actual_runs = report.actual_runs,
                    total_errors = report.total_errors,
                    "周期任务24小时执行正常"
                );
            }
            reports.push(report);
        }
        Ok(reports)
    }
}

#[async_trait]
impl JobHandler for CronHealthMonitor {
    fn job_type(&self) -> JobType {
        JobType::MonitorJobs
    }

    async fn handle(&self, _job: &QueuedJob) -> Result<JobOutcome> {
        let reports = self.check().await?;
        Ok(JobOutcome::success(serde_json::to_value(&reports)?))
    }
}
