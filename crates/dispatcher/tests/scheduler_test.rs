#[cfg(test)]
mod scheduler_tests {
    use chrono::Duration;
    use planner_core::{
        Clock, CronJob, Job, JobState, JobStore, JobType, PlannerError, STALLED_JOB_ERROR,
    };
    use planner_dispatcher::scheduler::*;
    use planner_infrastructure::InMemoryJobStore;
    use planner_testing_utils::{test_now, MockClock};
    use serde_json::json;
    use std::sync::Arc;

    fn setup() -> (Arc<InMemoryJobStore>, MockClock, JobScheduler) {
        let store = Arc::new(InMemoryJobStore::new());
        let clock = MockClock::new(test_now());
        let scheduler = JobScheduler::new(store.clone(), Arc::new(clock.clone()));
        (store, clock, scheduler)
    }

    #[tokio::test]
    async fn test_schedule_generates_id() {
        let (store, _, scheduler) = setup();
        let id = scheduler
            .schedule(Job::new(JobType::Fake, test_now(), json!({})))
            .await
            .unwrap();

        assert!(!id.is_empty());
        let stored = store.get(&id).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Delayed);
        assert_eq!(stored.job.id.as_deref(), Some(id.as_str()));
    }

    #[tokio::test]
    async fn test_schedule_same_id_is_noop() {
        let (store, _, scheduler) = setup();
        let first = Job::new(JobType::Fake, test_now() + Duration::hours(1), json!({"n": 1}))
            .with_id("stable");
        let second = Job::new(JobType::Fake, test_now() + Duration::hours(5), json!({"n": 2}))
            .with_id("stable");

        assert_eq!(scheduler.schedule(first).await.unwrap(), "stable");
        assert_eq!(scheduler.schedule(second).await.unwrap(), "stable");

        let stored = store.get("stable").await.unwrap().unwrap();
        assert_eq!(stored.job.payload["n"], 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_schedule_fails_when_store_unavailable() {
        let (store, _, scheduler) = setup();
        store.set_ready(false);

        let result = scheduler
            .schedule(Job::new(JobType::Fake, test_now(), json!({})))
            .await;
        assert!(matches!(result, Err(PlannerError::SchedulingUnavailable(_))));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_cancel_by_id_pattern_only_touches_delayed_jobs() {
        let (store, _, scheduler) = setup();
        let schedule = [
            ("rdv:a:1", test_now() - Duration::minutes(1)),
            ("rdv:a:7", test_now() + Duration::days(1)),
            ("rdv:b:7", test_now() + Duration::days(1)),
        ];
        for (id, at) in schedule {
            scheduler
                .schedule(Job::new(JobType::AppointmentReminder, at, json!({})).with_id(id))
                .await
                .unwrap();
        }
        // rdv:a:1 已被消费者取出，不可取消
        let active = store.dequeue_due(test_now()).await.unwrap().unwrap();
        assert_eq!(active.id, "rdv:a:1");

        let removed = scheduler.cancel_by_id_pattern("rdv:a:").await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.get("rdv:a:1").await.unwrap().is_some());
        assert!(store.get("rdv:a:7").await.unwrap().is_none());
        assert!(store.get("rdv:b:7").await.unwrap().is_some());

        assert!(scheduler.cancel_by_id_pattern("**").await.is_err());
    }

    #[tokio::test]
    async fn test_register_cron_validates_and_upserts() {
        let (_, _, scheduler) = setup();

        scheduler
            .register_cron(CronJob::new(JobType::MonitorJobs, "0 30 7 * * *", "Europe/Paris"))
            .await
            .unwrap();
        scheduler
            .register_cron(CronJob::new(JobType::MonitorJobs, "0 8 * * *", "Europe/Paris"))
            .await
            .unwrap();

        let invalid = scheduler
            .register_cron(CronJob::new(JobType::CleanupJobs, "not a cron", "Europe/Paris"))
            .await;
        assert!(matches!(invalid, Err(PlannerError::InvalidCron { .. })));

        let bad_tz = scheduler
            .register_cron(CronJob::new(JobType::CleanupJobs, "0 4 * * *", "Europe/Atlantis"))
            .await;
        assert!(matches!(bad_tz, Err(PlannerError::InvalidTimezone(_))));

        let crons = scheduler.registered_crons().await.unwrap();
        assert_eq!(crons.len(), 1);
        assert_eq!(crons[0].cron_expression, "0 8 * * *");

        assert_eq!(scheduler.unregister_all_crons().await.unwrap(), 1);
        assert!(scheduler.registered_crons().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_count_active_by_type() {
        let (store, _, scheduler) = setup();
        scheduler
            .schedule(Job::new(JobType::NotifyPartnerAppointments, test_now(), json!({})))
            .await
            .unwrap();
        assert_eq!(
            scheduler
                .count_active_by_type(JobType::NotifyPartnerAppointments)
                .await
                .unwrap(),
            0
        );

        store.dequeue_due(test_now()).await.unwrap();
        assert_eq!(
            scheduler
                .count_active_by_type(JobType::NotifyPartnerAppointments)
                .await
                .unwrap(),
            1
        );
        assert_eq!(scheduler.count_active_by_type(JobType::Fake).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cleanup_completed_respects_retention() {
        let (store, clock, scheduler) = setup();
        for id in ["old", "recent"] {
            scheduler
                .schedule(Job::new(JobType::Fake, test_now(), json!({})).with_id(id))
                .await
                .unwrap();
        }
        store.dequeue_due(test_now()).await.unwrap();
        store.dequeue_due(test_now()).await.unwrap();
        store.complete("old", test_now()).await.unwrap();
        store
            .complete("recent", test_now() + Duration::days(5))
            .await
            .unwrap();

        clock.advance(Duration::days(8));
        let stats = scheduler.cleanup_completed(Duration::days(7)).await.unwrap();
        assert_eq!(stats, CleanupStats { cleaned: 1 });
        assert!(store.get("recent").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_schedule_once_never_replaces_finished_jobs() {
        let (store, _, scheduler) = setup();
        let job = || Job::new(JobType::Fake, test_now(), json!({})).with_id("cron:FAKE:1");

        assert_eq!(
            scheduler.schedule_once(job()).await.unwrap().as_deref(),
            Some("cron:FAKE:1")
        );
        assert_eq!(scheduler.schedule_once(job()).await.unwrap(), None);

        store.dequeue_due(test_now()).await.unwrap().unwrap();
        store.complete("cron:FAKE:1", test_now()).await.unwrap();
        assert_eq!(scheduler.schedule_once(job()).await.unwrap(), None);
        assert_eq!(
            store.get("cron:FAKE:1").await.unwrap().unwrap().state,
            JobState::Completed
        );
    }

    #[tokio::test]
    async fn test_recover_stalled_redelivers_until_attempts_run_out() {
        let (store, clock, scheduler) = setup();
        scheduler
            .schedule(
                Job::new(JobType::ProcessPartnerEvent, test_now(), json!({"eventId": 42}))
                    .with_id("evt:42")
                    .with_attempts(2),
            )
            .await
            .unwrap();
        store.dequeue_due(test_now()).await.unwrap().unwrap();

        // 租期内不回收
        clock.advance(Duration::minutes(10));
        assert!(scheduler
            .recover_stalled(Duration::hours(1))
            .await
            .unwrap()
            .is_empty());

        clock.advance(Duration::days(2));
        let stalled = scheduler.recover_stalled(Duration::hours(1)).await.unwrap();
        assert_eq!(stalled.requeued, vec!["evt:42".to_string()]);
        assert!(stalled.failed.is_empty());

        // 仍待执行时重复调度不做修改
        scheduler
            .schedule(Job::new(JobType::ProcessPartnerEvent, test_now(), json!({})).with_id("evt:42"))
            .await
            .unwrap();
        let redelivered = store.dequeue_due(clock.now()).await.unwrap().unwrap();
        assert_eq!(redelivered.id, "evt:42");
        assert_eq!(redelivered.attempts_made, 2);
        assert_eq!(redelivered.job.payload["eventId"], 42);

        clock.advance(Duration::days(2));
        let stalled = scheduler.recover_stalled(Duration::hours(1)).await.unwrap();
        assert_eq!(stalled.failed, vec!["evt:42".to_string()]);
        let failed = store.get("evt:42").await.unwrap().unwrap();
        assert_eq!(failed.state, JobState::Failed);
        assert_eq!(failed.last_error.as_deref(), Some(STALLED_JOB_ERROR));
    }
}
