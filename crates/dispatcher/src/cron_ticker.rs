use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use planner_core::{CronJob, Job, JobType, Result};
use tokio::sync::{broadcast, Mutex};
use tokio::time::interval;
use tracing::{debug, error, info};

use crate::cron_utils::CronScheduler;
use crate::scheduler::JobScheduler;

/// 启动时注册的周期任务
pub fn default_cron_jobs(timezone: &str) -> Vec<CronJob> {
    vec![
        CronJob::new(JobType::NotifyPartnerAppointments, "0 0 */2 * * *", timezone),
        CronJob::new(JobType::FollowPartnerEvents, "0 * * * * *", timezone),
        CronJob::new(JobType::MonitorJobs, "0 30 7 * * *", timezone),
        CronJob::new(JobType::CleanupJobs, "0 0 4 * * *", timezone),
    ]
}

/// 周期任务触发的任务ID，多个进程对同一次触发得到相同ID
pub fn cron_job_id(job_type: JobType, firing: DateTime<Utc>) -> String {
    format!("cron:{}:{}", job_type.as_str(), firing.timestamp())
}

/// 执行中任务的默认租期（秒）
pub const DEFAULT_STALLED_JOB_LEASE_SECONDS: i64 = 3600;

/// 周期任务触发器
///
/// 每次检查将 (上次检查, 当前] 区间内的触发实例化为普通任务，并回收超出租期的执行中任务。
pub struct CronTicker {
    scheduler: Arc<JobScheduler>,
    tick_interval: Duration,
    stalled_job_lease: chrono::Duration,
    last_tick: Mutex<Option<DateTime<Utc>>>,
}

impl CronTicker {
    pub fn new(scheduler: Arc<JobScheduler>, tick_interval: Duration) -> Self {
        Self {
            scheduler,
            tick_interval,
            stalled_job_lease: chrono::Duration::seconds(DEFAULT_STALLED_JOB_LEASE_SECONDS),
            last_tick: Mutex::new(None),
        }
    }

    pub fn with_stalled_job_lease(mut self, lease: chrono::Duration) -> Self {
        self.stalled_job_lease = lease;
        self
    }

    /// 执行一次检查，返回新入队的任务数
    ///
    /// 首次检查只记录起点，不补发启动前的触发；超时任务每次都回收。
    pub async fn tick(&self) -> Result<usize> {
        let stalled = self.scheduler.recover_stalled(self.stalled_job_lease).await?;
        if !stalled.is_empty() {
            info!("回收了 {} 个执行超时的任务", stalled.len());
        }

        let now = self.scheduler.clock().now();
        let mut last_tick = self.last_tick.lock().await;
        let Some(after) = *last_tick else {
            *last_tick = Some(now);
            return Ok(0);
        };

        let enqueued = self.enqueue_firings(after, now).await?;
        *last_tick = Some(now);
        Ok(enqueued)
    }

    /// 将 (after, until] 区间内所有周期任务的触发入队
    pub async fn enqueue_firings(&self, after: DateTime<Utc>, until: DateTime<Utc>) -> Result<usize> {
        let mut enqueued = 0;
        for cron in self.scheduler.registered_crons().await? {
            let cron_scheduler =
                match CronScheduler::with_timezone(&cron.cron_expression, &cron.timezone) {
                    Ok(s) => s,
                    Err(e) => {
                        error!("周期任务 {} 配置无效: {}", cron.job_type, e);
                        continue;
                    }
                };

            let firings = cron_scheduler
                .firings_between(after, until)
                .into_iter()
                .filter(|firing| cron.start_date.map_or(true, |start| *firing >= start));

            for firing in firings {
                let job = Job::new(cron.job_type, firing, serde_json::json!({}))
                    .with_id(cron_job_id(cron.job_type, firing));
                if self.scheduler.schedule_once(job).await?.is_some() {
                    enqueued += 1;
                }
            }
        }
        if enqueued > 0 {
            debug!("周期任务检查入队 {} 个任务", enqueued);
        }
        Ok(enqueued)
    }

    /// 按固定间隔运行，直到收到关闭信号
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("周期任务触发器启动, 检查间隔 {:?}", self.tick_interval);
        let mut ticker = interval(self.tick_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        error!("周期任务检查失败: {}", e);
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("周期任务触发器收到关闭信号");
                    break;
                }
            }
        }
    }
}
