#[cfg(test)]
mod worker_service_tests {
    use async_trait::async_trait;
    use chrono::Duration;
    use planner_core::{Job, JobState, JobStore, JobType, PlannerError, QueuedJob, Result};
    use planner_dispatcher::JobScheduler;
    use planner_infrastructure::{InMemoryExecutionRecordRepository, InMemoryJobStore};
    use planner_testing_utils::{test_now, MockClock};
    use planner_worker::{
        ExecutionTracker, FakeHandler, JobHandler, JobOutcome, WorkerService, WorkerServiceBuilder,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::broadcast;

    struct CountingHandler {
        job_type: JobType,
        fail: bool,
        single_instance: bool,
        calls: AtomicUsize,
    }

    impl CountingHandler {
        fn new(job_type: JobType, fail: bool) -> Self {
            Self {
                job_type,
                fail,
                single_instance: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl JobHandler for CountingHandler {
        fn job_type(&self) -> JobType {
            self.job_type
        }

        fn single_instance(&self) -> bool {
            self.single_instance
        }

        async fn handle(&self, _job: &QueuedJob) -> Result<JobOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PlannerError::JobExecution("处理失败".to_string()));
            }
            Ok(JobOutcome::success(serde_json::json!({})))
        }
    }

    struct Fixture {
        store: Arc<InMemoryJobStore>,
        records: Arc<InMemoryExecutionRecordRepository>,
        clock: MockClock,
        scheduler: Arc<JobScheduler>,
        tracker: Arc<ExecutionTracker>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryJobStore::new());
        let records = Arc::new(InMemoryExecutionRecordRepository::new());
        let clock = MockClock::new(test_now());
        let scheduler = Arc::new(JobScheduler::new(store.clone(), Arc::new(clock.clone())));
        let tracker = Arc::new(ExecutionTracker::new(
            records.clone(),
            Arc::new(clock.clone()),
        ));
        Fixture {
            store,
            records,
            clock,
            scheduler,
            tracker,
        }
    }

    fn builder(f: &Fixture) -> WorkerServiceBuilder {
        WorkerServiceBuilder::new(f.scheduler.clone(), f.tracker.clone()).worker_id("worker-test")
    }

    async fn state_of(store: &InMemoryJobStore, id: &str) -> JobState {
        store.get(id).await.unwrap().unwrap().state
    }

    #[tokio::test]
    async fn test_successful_job_is_completed_and_tracked() {
        let f = fixture();
        let worker = builder(&f)
            .register_handler(Arc::new(FakeHandler))
            .build();
        f.scheduler
            .schedule(
                Job::new(JobType::Fake, test_now(), serde_json::json!({"n": 1})).with_id("fake-1"),
            )
            .await
            .unwrap();

        assert!(worker.process_next().await.unwrap());
        assert!(!worker.process_next().await.unwrap());

        assert_eq!(state_of(&f.store, "fake-1").await, JobState::Completed);
        let records = f.records.all().await;
        assert_eq!(records.len(), 1);
        assert!(records[0].succeeded);
        assert_eq!(records[0].job_type, JobType::Fake);
        assert_eq!(records[0].result["n"], 1);
    }

    #[tokio::test]
    async fn test_future_job_is_not_dequeued_early() {
        let f = fixture();
        let worker = builder(&f)
            .register_handler(Arc::new(FakeHandler))
            .build();
        f.scheduler
            .schedule(Job::new(JobType::Fake, test_now() + Duration::minutes(5), serde_json::json!({})))
            .await
            .unwrap();

        assert!(!worker.process_next().await.unwrap());
        f.clock.advance(Duration::minutes(5));
        assert!(worker.process_next().await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_job_is_retried_with_backoff() {
        let f = fixture();
        let handler = Arc::new(CountingHandler::new(JobType::Fake, true));
        let worker = builder(&f).register_handler(handler.clone()).build();
        f.scheduler
            .schedule(
                Job::new(JobType::Fake, test_now(), serde_json::json!({}))
                    .with_id("flaky")
                    .with_attempts(2)
                    .with_backoff_ms(1_000),
            )
            .await
            .unwrap();

        assert!(worker.process_next().await.unwrap());
        let retried = f.store.get("flaky").await.unwrap().unwrap();
        assert_eq!(retried.state, JobState::Delayed);
        assert_eq!(retried.attempts_made, 1);
        assert_eq!(retried.job.execution_time, test_now() + Duration::seconds(1));
        assert!(retried.last_error.unwrap().contains("处理失败"));

        assert!(!worker.process_next().await.unwrap());
        f.clock.advance(Duration::seconds(1));
        assert!(worker.process_next().await.unwrap());

        assert_eq!(state_of(&f.store, "flaky").await, JobState::Failed);
        assert_eq!(handler.calls(), 2);
        let records = f.records.all().await;
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| !r.succeeded && r.error_count == 1));
    }

    #[tokio::test]
    async fn test_job_without_handler_fails() {
        let f = fixture();
        let worker = builder(&f)
            .register_handler(Arc::new(FakeHandler))
            .build();
        f.scheduler
            .schedule(
                Job::new(JobType::MonitorJobs, test_now(), serde_json::json!({}))
                    .with_id("orphan")
                    .with_attempts(3),
            )
            .await
            .unwrap();

        assert!(worker.process_next().await.unwrap());
        assert_eq!(state_of(&f.store, "orphan").await, JobState::Failed);
        assert!(f.records.all().await.is_empty());
    }

    #[tokio::test]
    async fn test_single_instance_handler_skips_concurrent_run() {
        let f = fixture();
        let mut handler = CountingHandler::new(JobType::NotifyPartnerAppointments, false);
        handler.single_instance = true;
        let handler = Arc::new(handler);
        let worker = builder(&f).register_handler(handler.clone()).build();

        for (id, minutes) in [("first", 2), ("second", 1)] {
            f.scheduler
                .schedule(
                    Job::new(
                        JobType::NotifyPartnerAppointments,
                        test_now() - Duration::minutes(minutes),
                        serde_json::json!({}),
                    )
                    .with_id(id),
                )
                .await
                .unwrap();
        }
        // 模拟另一个进程正在执行 first
        let running = f.store.dequeue_due(test_now()).await.unwrap().unwrap();
        assert_eq!(running.id, "first");

        assert!(worker.process_next().await.unwrap());
        assert_eq!(handler.calls(), 0);
        assert_eq!(state_of(&f.store, "second").await, JobState::Completed);
    }

    #[tokio::test]
    async fn test_run_survives_errors_and_stops_on_shutdown() {
        let f = fixture();
        let failing = Arc::new(CountingHandler::new(JobType::Fake, true));
        let working = Arc::new(CountingHandler::new(JobType::CleanupJobs, false));
        let worker: Arc<WorkerService> = Arc::new(
            builder(&f)
                .register_handler(failing.clone())
                .register_handler(working.clone())
                .concurrency(2)
                .poll_interval(std::time::Duration::from_millis(10))
                .build(),
        );
        f.scheduler
            .schedule(Job::new(JobType::Fake, test_now(), serde_json::json!({})).with_id("bad"))
            .await
            .unwrap();
        f.scheduler
            .schedule(
                Job::new(JobType::CleanupJobs, test_now(), serde_json::json!({})).with_id("good"),
            )
            .await
            .unwrap();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn({
            let worker = worker.clone();
            async move { worker.run(shutdown_rx).await }
        });

        for _ in 0..200 {
            let bad = state_of(&f.store, "bad").await;
            let good = state_of(&f.store, "good").await;
            if bad.is_finished() && good.is_finished() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(failing.calls(), 1);
        assert_eq!(working.calls(), 1);
        assert_eq!(state_of(&f.store, "bad").await, JobState::Failed);
        assert_eq!(state_of(&f.store, "good").await, JobState::Completed);

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(2), handle)
            .await
            .expect("worker did not stop")
            .unwrap();
    }
}
