use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use planner_core::{JobType, QueuedJob, Result};
use planner_dispatcher::JobScheduler;
use planner_infrastructure::{JobMetrics, StructuredLogger};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::handler::JobHandler;
use crate::tracking::ExecutionTracker;

/// Worker服务构建器
pub struct WorkerServiceBuilder {
    worker_id: String,
    scheduler: Arc<JobScheduler>,
    tracker: Arc<ExecutionTracker>,
    handlers: HashMap<JobType, Arc<dyn JobHandler>>,
    concurrency: usize,
    poll_interval: Duration,
}

impl WorkerServiceBuilder {
    /// 创建新的构建器，Worker ID 默认为主机名
    pub fn new(scheduler: Arc<JobScheduler>, tracker: Arc<ExecutionTracker>) -> Self {
        Self {
            worker_id: hostname::get()
                .unwrap_or_else(|_| "unknown".into())
                .to_string_lossy()
                .to_string(),
            scheduler,
            tracker,
            handlers: HashMap::new(),
            concurrency: 1,
            poll_interval: Duration::from_millis(1000),
        }
    }

    pub fn worker_id(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = worker_id.into();
        self
    }

    /// 设置并发消费者数量
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// 设置空闲时的轮询间隔
    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// 注册任务处理器，同类型后注册的覆盖先注册的
    pub fn register_handler(mut self, handler: Arc<dyn JobHandler>) -> Self {
        let job_type = handler.job_type();
        info!("注册任务处理器: {}", job_type);
        if self.handlers.insert(job_type, handler).is_some() {
            warn!("任务类型 {} 的处理器被覆盖", job_type);
        }
        self
    }

    pub fn build(self) -> WorkerService {
        WorkerService {
            worker_id: self.worker_id,
            scheduler: self.scheduler,
            tracker: self.tracker,
            handlers: self.handlers,
            concurrency: self.concurrency,
            poll_interval: self.poll_interval,
        }
    }
}

/// 任务消费服务
///
/// 运行 `concurrency` 个消费槽，每个槽循环：取出到期任务 → 按类型分派处理器 →
/// 确认（完成或失败重试）。收到关闭信号后不再取新任务，进行中的任务执行完毕。
pub struct WorkerService {
    worker_id: String,
    scheduler: Arc<JobScheduler>,
    tracker: Arc<ExecutionTracker>,
    handlers: HashMap<JobType, Arc<dyn JobHandler>>,
    concurrency: usize,
    poll_interval: Duration,
}

impl WorkerService {
    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn registered_types(&self) -> Vec<JobType> {
        let mut types: Vec<JobType> = self.handlers.keys().copied().collect();
        types.sort_by_key(|t| t.as_str());
        types
    }

    /// 运行直到收到关闭信号
    pub async fn run(&self, shutdown_rx: broadcast::Receiver<()>) {
        info!(
            "Worker {} 启动, 并发数 {}, 处理器 {:?}",
            self.worker_id,
            self.concurrency,
            self.registered_types()
        );

        let slots = (0..self.concurrency).map(|slot| self.run_slot(slot, shutdown_rx.resubscribe()));
        join_all(slots).await;

        info!("Worker {} 已停止", self.worker_id);
    }

    async fn run_slot(&self, slot: usize, mut shutdown_rx: broadcast::Receiver<()>) {
        debug!("消费槽 {} 启动", slot);
        loop {
            if !matches!(shutdown_rx.try_recv(), Err(TryRecvError::Empty)) {
                break;
            }

            let idle = match self.process_next().await {
                Ok(processed) => !processed,
                Err(e) => {
                    StructuredLogger::log_system_error("worker", "process_next", &e);
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = sleep(self.poll_interval) => {}
                }
            }
        }
        debug!("消费槽 {} 退出", slot);
    }

    /// 取出并处理一个到期任务，没有到期任务时返回 `false`
    pub async fn process_next(&self) -> Result<bool> {
        let now = self.scheduler.clock().now();
        let Some(job) = self.scheduler.store().dequeue_due(now).await? else {
            return Ok(false);
        };
        self.execute(job).await?;
        Ok(true)
    }

    async fn execute(&self, job: QueuedJob) -> Result<()> {
        let store = self.scheduler.store();
        let clock = self.scheduler.clock();
        let job_type = job.job_type();

        let Some(handler) = self.handlers.get(&job_type) else {
            let message = format!("没有注册任务类型 {job_type} 的处理器");
            StructuredLogger::log_job_failed(&job.id, job_type.as_str(), &self.worker_id, &message);
            store.fail(&job.id, &message, None, clock.now()).await?;
            JobMetrics::record_job_processed(job_type.as_str(), "failed", 0);
            return Ok(());
        };

        if handler.single_instance() {
            let active = self.scheduler.count_active_by_type(job_type).await?;
            if active > 1 {
                info!(
                    "任务类型 {} 已有 {} 个正在执行，跳过任务 {}",
                    job_type, active, job.id
                );
                store.complete(&job.id, clock.now()).await?;
                JobMetrics::record_job_processed(job_type.as_str(), "skipped", 0);
                return Ok(());
            }
        }

        StructuredLogger::log_job_started(
            &job.id,
            job_type.as_str(),
            &self.worker_id,
            job.attempts_made,
        );
        let started = Instant::now();
        let outcome = self.tracker.track(handler.as_ref(), &job).await;
        let duration_ms = started.elapsed().as_millis() as u64;
        let now = clock.now();

        match outcome {
            Ok(outcome) => {
                store.complete(&job.id, now).await?;
                StructuredLogger::log_job_completed(
                    &job.id,
                    job_type.as_str(),
                    &self.worker_id,
                    outcome.succeeded,
                    outcome.error_count,
                    duration_ms,
                );
                JobMetrics::record_job_processed(job_type.as_str(), "completed", duration_ms);
            }
            Err(e) if job.has_attempts_left() => {
                let backoff = chrono::Duration::milliseconds(job.job.backoff_ms.unwrap_or(0) as i64);
                let retry_at = now + backoff;
                store.fail(&job.id, &e.to_string(), Some(retry_at), now).await?;
                StructuredLogger::log_job_retry(&job.id, job_type.as_str(), job.attempts_made, retry_at);
                JobMetrics::record_job_processed(job_type.as_str(), "retried", duration_ms);
            }
            Err(e) => {
                error!("任务 {} 重试次数已用尽 ({})", job.id, job.attempts_made);
                store.fail(&job.id, &e.to_string(), None, now).await?;
                StructuredLogger::log_job_failed(
                    &job.id,
                    job_type.as_str(),
                    &self.worker_id,
                    &e.to_string(),
                );
                JobMetrics::record_job_processed(job_type.as_str(), "failed", duration_ms);
            }
        }
        Ok(())
    }
}
