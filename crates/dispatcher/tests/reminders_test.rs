#[cfg(test)]
mod reminders_tests {
    use chrono::Duration;
    use planner_core::{JobStore, JobType};
    use planner_dispatcher::{reminder_job_id, JobScheduler, ReminderPlanner};
    use planner_domain::ReminderService;
    use planner_infrastructure::InMemoryJobStore;
    use planner_testing_utils::{test_now, AppointmentBuilder, MockClock};
    use std::sync::Arc;

    fn setup() -> (Arc<InMemoryJobStore>, ReminderPlanner) {
        let store = Arc::new(InMemoryJobStore::new());
        let clock = MockClock::new(test_now());
        let scheduler = Arc::new(JobScheduler::new(store.clone(), Arc::new(clock)));
        (store, ReminderPlanner::new(scheduler))
    }

    #[tokio::test]
    async fn test_schedules_seven_and_one_day_reminders() {
        let (store, planner) = setup();
        let date = test_now() + Duration::days(10);
        let appointment = AppointmentBuilder::new().with_id("rdv-1").with_date(date).build();

        planner.schedule_for(&appointment).await.unwrap();

        let seven = store.get(&reminder_job_id("rdv-1", 7)).await.unwrap().unwrap();
        assert_eq!(seven.job.execution_time, date - Duration::days(7));
        assert_eq!(seven.job.job_type, JobType::AppointmentReminder);
        assert_eq!(seven.job.payload["appointmentId"], "rdv-1");

        let one = store.get("rdv:rdv-1:1").await.unwrap().unwrap();
        assert_eq!(one.job.execution_time, date - Duration::days(1));
    }

    #[tokio::test]
    async fn test_skips_offsets_already_passed() {
        let (store, planner) = setup();
        let appointment = AppointmentBuilder::new()
            .with_id("rdv-2")
            .with_date(test_now() + Duration::days(3))
            .build();
        planner.schedule_for(&appointment).await.unwrap();
        assert_eq!(store.len().await, 1);
        assert!(store.get("rdv:rdv-2:1").await.unwrap().is_some());

        let soon = AppointmentBuilder::new()
            .with_id("rdv-3")
            .with_date(test_now() + Duration::hours(12))
            .build();
        planner.schedule_for(&soon).await.unwrap();
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_cancel_then_reschedule() {
        let (store, planner) = setup();
        let appointment = AppointmentBuilder::new()
            .with_id("rdv-1")
            .with_date(test_now() + Duration::days(10))
            .build();
        let other = AppointmentBuilder::new()
            .with_id("rdv-10")
            .with_date(test_now() + Duration::days(10))
            .build();
        planner.schedule_for(&appointment).await.unwrap();
        planner.schedule_for(&other).await.unwrap();

        planner.cancel_for("rdv-1").await.unwrap();
        assert_eq!(store.len().await, 2);
        assert!(store.get("rdv:rdv-10:7").await.unwrap().is_some());

        let moved = AppointmentBuilder::new()
            .with_id("rdv-1")
            .with_date(test_now() + Duration::days(20))
            .build();
        planner.schedule_for(&moved).await.unwrap();
        let seven = store.get("rdv:rdv-1:7").await.unwrap().unwrap();
        assert_eq!(seven.job.execution_time, moved.date - Duration::days(7));
    }
}
