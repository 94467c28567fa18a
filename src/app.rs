use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use planner_core::{AppConfig, Clock, ExecutionRecordRepository, JobStore, SystemClock};
use planner_dispatcher::{default_cron_jobs, CronTicker, JobScheduler, ReminderPlanner};
use planner_domain::{AppointmentRepository, BeneficiaryRepository, PushDispatcher};
use planner_infrastructure::{
    DatabaseManager, HttpPartnerClient, InMemoryAppointmentRepository,
    InMemoryBeneficiaryRepository, InMemoryExecutionRecordRepository, InMemoryJobStore,
    LoggingPushDispatcher, SqliteExecutionRecordRepository, SqliteJobStore,
};
use planner_worker::{
    AppointmentReminderHandler, CleanupHandler, CronHealthMonitor, DedupSettings,
    ExecutionTracker, FakeHandler, NotificationDeduplicator, PartnerEventFeed,
    PartnerEventReconciler, WorkerService, WorkerServiceBuilder,
};
use tokio::sync::broadcast;
use tracing::info;

/// 宿主系统提供的领域协作者
pub struct Collaborators {
    pub beneficiaries: Arc<dyn BeneficiaryRepository>,
    pub appointments: Arc<dyn AppointmentRepository>,
    pub push: Arc<dyn PushDispatcher>,
}

impl Collaborators {
    /// 单独运行时的内存实现，受益人可从JSON文件加载
    pub fn embedded(beneficiaries_file: Option<&str>) -> Result<Self> {
        let beneficiaries = match beneficiaries_file {
            Some(path) => InMemoryBeneficiaryRepository::from_json_file(path)
                .with_context(|| format!("加载受益人文件失败: {path}"))?,
            None => InMemoryBeneficiaryRepository::default(),
        };
        Ok(Self {
            beneficiaries: Arc::new(beneficiaries),
            appointments: Arc::new(InMemoryAppointmentRepository::new()),
            push: Arc::new(LoggingPushDispatcher),
        })
    }
}

/// 主应用程序：周期任务触发器 + 任务消费者
pub struct Application {
    config: AppConfig,
    database: Option<DatabaseManager>,
    scheduler: Arc<JobScheduler>,
    ticker: CronTicker,
    worker: WorkerService,
}

impl Application {
    pub async fn new(config: AppConfig, collaborators: Collaborators) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let (database, store, records): (
            Option<DatabaseManager>,
            Arc<dyn JobStore>,
            Arc<dyn ExecutionRecordRepository>,
        ) = if config.database.is_in_memory() {
            info!("使用内存任务存储");
            (
                None,
                Arc::new(InMemoryJobStore::new()),
                Arc::new(InMemoryExecutionRecordRepository::new()),
            )
        } else {
            info!("连接SQLite任务存储: {}", config.database.url);
            let database = DatabaseManager::new(&config.database)
                .await
                .context("连接数据库失败")?;
            database.migrate().await.context("数据库迁移失败")?;
            let pool = database.pool().clone();
            (
                Some(database),
                Arc::new(SqliteJobStore::new(pool.clone())),
                Arc::new(SqliteExecutionRecordRepository::new(pool)),
            )
        };

        let scheduler = Arc::new(JobScheduler::new(store, Arc::clone(&clock)));
        let reminders = Arc::new(ReminderPlanner::new(Arc::clone(&scheduler)));
        let partner = Arc::new(
            HttpPartnerClient::new(config.partner.clone()).context("创建合作方客户端失败")?,
        );
        let tracker = Arc::new(ExecutionTracker::new(
            Arc::clone(&records),
            Arc::clone(&clock),
        ));

        let reconciler = PartnerEventReconciler::new(
            Arc::clone(&collaborators.beneficiaries),
            Arc::clone(&collaborators.appointments),
            partner.clone(),
            reminders,
            Arc::clone(&collaborators.push),
            Arc::clone(&clock),
        )
        .with_notifications(config.features.notify_partner_appointments);

        let deduplicator = NotificationDeduplicator::new(
            Arc::clone(&collaborators.beneficiaries),
            partner.clone(),
            Arc::clone(&collaborators.push),
            Arc::clone(&clock),
            DedupSettings::from_config(&config.partner),
        );

        let worker = WorkerServiceBuilder::new(Arc::clone(&scheduler), tracker)
            .worker_id(config.worker.worker_id.clone())
            .concurrency(config.worker.concurrency)
            .poll_interval(config.worker.poll_interval())
            .register_handler(Arc::new(reconciler))
            .register_handler(Arc::new(deduplicator))
            .register_handler(Arc::new(PartnerEventFeed::new(
                partner,
                Arc::clone(&scheduler),
            )))
            .register_handler(Arc::new(AppointmentReminderHandler::new(
                Arc::clone(&collaborators.appointments),
                Arc::clone(&collaborators.push),
            )))
            .register_handler(Arc::new(CronHealthMonitor::new(
                Arc::clone(&scheduler),
                Arc::clone(&records),
            )))
            .register_handler(Arc::new(CleanupHandler::new(
                Arc::clone(&scheduler),
                records,
                chrono::Duration::days(config.scheduler.completed_job_retention_days),
                chrono::Duration::days(config.scheduler.execution_record_retention_days),
            )))
            .register_handler(Arc::new(FakeHandler))
            .build();

        let ticker = CronTicker::new(
            Arc::clone(&scheduler),
            Duration::from_secs(config.scheduler.cron_tick_interval_seconds),
        )
        .with_stalled_job_lease(chrono::Duration::seconds(
            config.scheduler.stalled_job_lease_seconds as i64,
        ));

        Ok(Self {
            config,
            database,
            scheduler,
            ticker,
            worker,
        })
    }

    /// 注销所有周期任务后重新注册默认周期任务
    async fn register_crons(&self) -> Result<()> {
        self.scheduler
            .unregister_all_crons()
            .await
            .context("注销周期任务失败")?;
        for cron in default_cron_jobs(&self.config.scheduler.timezone) {
            self.scheduler
                .register_cron(cron)
                .await
                .context("注册周期任务失败")?;
        }
        Ok(())
    }

    /// 运行直到收到关闭信号
    pub async fn run(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        self.register_crons().await?;

        info!("启动周期任务触发器和任务消费者");
        tokio::join!(
            self.ticker.run(shutdown_rx.resubscribe()),
            self.worker.run(shutdown_rx),
        );

        if let Some(database) = &self.database {
            database.close().await;
        }
        Ok(())
    }
}
