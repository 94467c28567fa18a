#[cfg(test)]
mod partner_event_tests {
    use chrono::Duration;
    use planner_core::{Job, JobType, QueuedJob};
    use planner_domain::{
        AppointmentRepository, EventKind, PartnerObject, PartnerObjectKind, PartnerStatus, PushKind,
    };
    use planner_testing_utils::{
        beneficiary, test_now, AppointmentBuilder, MockAppointmentRepository,
        MockBeneficiaryRepository, MockClock, MockPartnerAppointmentFetcher, MockPushDispatcher,
        MockReminderService, PartnerEventBuilder, SnapshotBuilder,
    };
    use planner_worker::{JobHandler, PartnerEventReconciler, Treatment};
    use std::sync::Arc;

    struct Fixture {
        appointments: MockAppointmentRepository,
        fetcher: MockPartnerAppointmentFetcher,
        reminders: MockReminderService,
        push: MockPushDispatcher,
        reconciler: PartnerEventReconciler,
    }

    fn fixture() -> Fixture {
        let beneficiaries =
            MockBeneficiaryRepository::with_beneficiaries(vec![beneficiary("ben-1", "partner-1")]);
        let appointments = MockAppointmentRepository::new();
        let fetcher = MockPartnerAppointmentFetcher::new();
        let reminders = MockReminderService::new();
        let push = MockPushDispatcher::new();
        let reconciler = PartnerEventReconciler::new(
            Arc::new(beneficiaries),
            Arc::new(appointments.clone()),
            Arc::new(fetcher.clone()),
            Arc::new(reminders.clone()),
            Arc::new(push.clone()),
            Arc::new(MockClock::new(test_now())),
        );
        Fixture {
            appointments,
            fetcher,
            reminders,
            push,
            reconciler,
        }
    }

    #[tokio::test]
    async fn test_create_update_delete_lifecycle() {
        let f = fixture();
        let snapshot = SnapshotBuilder::new().build();
        f.fetcher.set_snapshot(snapshot.clone());

        let created = f
            .reconciler
            .reconcile(&PartnerEventBuilder::new().build())
            .await
            .unwrap();
        assert_eq!(created.treatment, Treatment::AppointmentAdded);
        assert_eq!(created.beneficiary_id.as_deref(), Some("ben-1"));
        let appointment_id = created.appointment_id.clone().unwrap();

        let stored = f.appointments.all();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].participants, vec!["ben-1".to_string()]);
        // 巴黎冬令时 UTC+1
        assert_eq!(stored[0].date, test_now() + Duration::days(10) - Duration::hours(1));
        assert_eq!(f.reminders.scheduled(), vec![appointment_id.clone()]);
        assert_eq!(f.push.sent_count(), 1);
        assert_eq!(f.push.sent()[0].0, "ben-1");
        assert_eq!(f.push.sent()[0].1.kind, PushKind::New);

        let moved = SnapshotBuilder::new()
            .with_start_at(snapshot.start_at + Duration::days(1))
            .build();
        f.fetcher.set_snapshot(moved);
        let updated = f
            .reconciler
            .reconcile(
                &PartnerEventBuilder::new()
                    .with_id("evt-2")
                    .with_kind(EventKind::Update)
                    .build(),
            )
            .await
            .unwrap();
        assert_eq!(updated.treatment, Treatment::AppointmentUpdated);
        assert_eq!(updated.appointment_id.as_deref(), Some(appointment_id.as_str()));
        assert_eq!(f.appointments.count(), 1);
        assert_eq!(
            f.appointments.all()[0].date,
            test_now() + Duration::days(11) - Duration::hours(1)
        );
        assert_eq!(f.reminders.cancelled(), vec![appointment_id.clone()]);
        assert_eq!(f.reminders.scheduled().len(), 2);
        assert_eq!(f.push.sent_count(), 2);
        assert_eq!(f.push.sent()[1].1.kind, PushKind::Updated);

        let deleted = f
            .reconciler
            .reconcile(
                &PartnerEventBuilder::new()
                    .with_id("evt-3")
                    .with_kind(EventKind::Delete)
                    .build(),
            )
            .await
            .unwrap();
        assert_eq!(deleted.treatment, Treatment::AppointmentDeleted);
        assert_eq!(f.appointments.count(), 0);
        assert_eq!(f.reminders.cancelled().len(), 2);
        assert_eq!(f.push.sent_count(), 3);
        assert_eq!(f.push.sent()[2].1.kind, PushKind::Deleted);
    }

    #[tokio::test]
    async fn test_replayed_create_is_idempotent() {
        let f = fixture();
        f.fetcher.set_snapshot(SnapshotBuilder::new().build());
        let event = PartnerEventBuilder::new().build();

        let first = f.reconciler.reconcile(&event).await.unwrap();
        let second = f.reconciler.reconcile(&event).await.unwrap();

        assert_eq!(first.treatment, Treatment::AppointmentAdded);
        assert_eq!(second.treatment, Treatment::AppointmentUpdated);
        assert_eq!(second.appointment_id, first.appointment_id);
        assert_eq!(f.appointments.count(), 1);
        assert_eq!(f.reminders.scheduled().len(), 1);
        assert!(f.reminders.cancelled().is_empty());
        assert_eq!(f.push.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_non_treatable_events_have_no_side_effects() {
        let f = fixture();
        f.fetcher.set_snapshot(SnapshotBuilder::new().build());

        let kind = f
            .reconciler
            .reconcile(
                &PartnerEventBuilder::new()
                    .with_kind(EventKind::NonTreatable)
                    .with_object(PartnerObject::NonTreatable)
                    .build(),
            )
            .await
            .unwrap();
        assert_eq!(kind.treatment, Treatment::KindNonTreatable);

        let object = f
            .reconciler
            .reconcile(
                &PartnerEventBuilder::new()
                    .with_object(PartnerObject::NonTreatable)
                    .build(),
            )
            .await
            .unwrap();
        assert_eq!(object.treatment, Treatment::ObjectNonTreatable);

        let unknown = f
            .reconciler
            .reconcile(
                &PartnerEventBuilder::new()
                    .with_partner_beneficiary_id("partner-404")
                    .build(),
            )
            .await
            .unwrap();
        assert_eq!(unknown.treatment, Treatment::BeneficiaryUnknown);
        assert!(unknown.beneficiary_id.is_none());

        assert_eq!(f.appointments.save_count(), 0);
        assert_eq!(f.push.sent_count(), 0);
        assert!(f.reminders.scheduled().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_branches() {
        let f = fixture();

        let create = f
            .reconciler
            .reconcile(&PartnerEventBuilder::new().build())
            .await
            .unwrap();
        assert_eq!(create.treatment, Treatment::CreateUnknown);

        f.fetcher.set_snapshot(
            SnapshotBuilder::new()
                .with_status(PartnerStatus::Cancelled)
                .build(),
        );
        let cancelled = f
            .reconciler
            .reconcile(&PartnerEventBuilder::new().build())
            .await
            .unwrap();
        assert_eq!(cancelled.treatment, Treatment::CreateUnknown);

        f.fetcher.remove_snapshot("obj-1");
        let update = f
            .reconciler
            .reconcile(&PartnerEventBuilder::new().with_kind(EventKind::Update).build())
            .await
            .unwrap();
        assert_eq!(update.treatment, Treatment::UpdateUnknown);

        let delete = f
            .reconciler
            .reconcile(&PartnerEventBuilder::new().with_kind(EventKind::Delete).build())
            .await
            .unwrap();
        assert_eq!(delete.treatment, Treatment::DeleteUnknown);

        assert_eq!(f.appointments.save_count(), 0);
        assert_eq!(f.push.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_update_without_local_creates() {
        let f = fixture();
        f.fetcher.set_snapshot(SnapshotBuilder::new().build());

        let report = f
            .reconciler
            .reconcile(&PartnerEventBuilder::new().with_kind(EventKind::Update).build())
            .await
            .unwrap();
        assert_eq!(report.treatment, Treatment::AppointmentAdded);
        assert_eq!(f.appointments.count(), 1);
        assert_eq!(f.push.sent()[0].1.kind, PushKind::New);
    }

    #[tokio::test]
    async fn test_update_to_unrecoverable_status_deletes() {
        let f = fixture();
        f.fetcher.set_snapshot(SnapshotBuilder::new().build());
        f.reconciler
            .reconcile(&PartnerEventBuilder::new().build())
            .await
            .unwrap();

        f.fetcher.set_snapshot(
            SnapshotBuilder::new()
                .with_status(PartnerStatus::RefusedByBeneficiary)
                .build(),
        );
        let report = f
            .reconciler
            .reconcile(&PartnerEventBuilder::new().with_kind(EventKind::Update).build())
            .await
            .unwrap();

        assert_eq!(report.treatment, Treatment::AppointmentDeleted);
        assert_eq!(f.appointments.count(), 0);
        assert_eq!(f.reminders.cancelled().len(), 1);
        // 拒绝状态不在通知范围内，只有创建时的推送
        assert_eq!(f.push.sent_count(), 1);
        assert_eq!(f.push.sent()[0].1.kind, PushKind::New);
    }

    #[tokio::test]
    async fn test_delete_is_pushed_only_for_future_notifiable_appointments() {
        let f = fixture();
        f.appointments
            .save(
                &AppointmentBuilder::new()
                    .with_date(test_now() - Duration::days(2))
                    .build(),
            )
            .await
            .unwrap();
        f.fetcher.set_snapshot(SnapshotBuilder::new().build());
        let delete = PartnerEventBuilder::new().with_kind(EventKind::Delete).build();

        let past = f.reconciler.reconcile(&delete).await.unwrap();
        assert_eq!(past.treatment, Treatment::AppointmentDeleted);
        assert_eq!(f.appointments.count(), 0);
        assert_eq!(f.push.sent_count(), 0);

        f.appointments
            .save(
                &AppointmentBuilder::new()
                    .with_id("rdv-2")
                    .with_date(test_now() + Duration::days(5))
                    .build(),
            )
            .await
            .unwrap();
        f.fetcher.set_snapshot(
            SnapshotBuilder::new()
                .with_status(PartnerStatus::Cancelled)
                .build(),
        );
        let cancelled = f.reconciler.reconcile(&delete).await.unwrap();
        assert_eq!(cancelled.treatment, Treatment::AppointmentDeleted);
        assert_eq!(cancelled.appointment_id.as_deref(), Some("rdv-2"));
        assert_eq!(f.push.sent_count(), 0);

        f.appointments
            .save(&AppointmentBuilder::new().with_id("rdv-3").build())
            .await
            .unwrap();
        f.fetcher.set_snapshot(SnapshotBuilder::new().build());
        f.reconciler.reconcile(&delete).await.unwrap();
        assert_eq!(f.push.sent_count(), 1);
        assert_eq!(f.push.sent()[0].1.kind, PushKind::Deleted);
    }

    #[tokio::test]
    async fn test_update_without_date_change_keeps_reminders() {
        let f = fixture();
        f.fetcher.set_snapshot(SnapshotBuilder::new().build());
        f.reconciler
            .reconcile(&PartnerEventBuilder::new().build())
            .await
            .unwrap();

        f.fetcher
            .set_snapshot(SnapshotBuilder::new().with_title("Atelier CV").build());
        let report = f
            .reconciler
            .reconcile(&PartnerEventBuilder::new().with_kind(EventKind::Update).build())
            .await
            .unwrap();

        assert_eq!(report.treatment, Treatment::AppointmentUpdated);
        assert_eq!(f.appointments.all()[0].title, "Atelier CV");
        assert!(f.reminders.cancelled().is_empty());
        assert_eq!(f.reminders.scheduled().len(), 1);
        assert_eq!(f.push.sent_count(), 2);
    }

    #[tokio::test]
    async fn test_past_or_not_notifiable_appointments_are_not_pushed() {
        let f = fixture();
        f.fetcher.set_snapshot(
            SnapshotBuilder::new()
                .with_start_at((test_now() - Duration::days(2)).naive_utc())
                .build(),
        );
        let past = f
            .reconciler
            .reconcile(&PartnerEventBuilder::new().build())
            .await
            .unwrap();
        assert_eq!(past.treatment, Treatment::AppointmentAdded);

        f.fetcher.set_snapshot(
            SnapshotBuilder::new()
                .with_id("obj-2")
                .with_status(PartnerStatus::Other("WAITING".to_string()))
                .build(),
        );
        let waiting = f
            .reconciler
            .reconcile(&PartnerEventBuilder::new().with_object_id("obj-2").build())
            .await
            .unwrap();
        assert_eq!(waiting.treatment, Treatment::AppointmentAdded);

        assert_eq!(f.appointments.count(), 2);
        assert_eq!(f.push.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_sessions_are_matched_by_object_kind() {
        let f = fixture();
        let existing = AppointmentBuilder::new()
            .with_id("rdv-session")
            .with_partner_info("obj-1", PartnerObjectKind::Session)
            .build();
        f.appointments.save(&existing).await.unwrap();
        f.fetcher.set_snapshot(SnapshotBuilder::new().build());

        let report = f
            .reconciler
            .reconcile(&PartnerEventBuilder::new().build())
            .await
            .unwrap();
        assert_eq!(report.treatment, Treatment::AppointmentAdded);
        assert_ne!(report.appointment_id.as_deref(), Some("rdv-session"));
        assert_eq!(f.appointments.count(), 2);
    }

    #[tokio::test]
    async fn test_dispatch_and_reminder_failures_are_counted() {
        let f = fixture();
        f.fetcher.set_snapshot(SnapshotBuilder::new().build());
        f.push.fail_for("ben-1");
        f.reminders.set_failing(true);

        let report = f
            .reconciler
            .reconcile(&PartnerEventBuilder::new().build())
            .await
            .unwrap();

        assert_eq!(report.treatment, Treatment::AppointmentAdded);
        assert_eq!(report.failed_dispatches, 1);
        assert_eq!(report.reminder_errors, 1);
        assert_eq!(f.appointments.count(), 1);
    }

    #[tokio::test]
    async fn test_notifications_can_be_disabled() {
        let f = fixture();
        f.fetcher.set_snapshot(SnapshotBuilder::new().build());
        let reconciler = f.reconciler.with_notifications(false);

        let report = reconciler
            .reconcile(&PartnerEventBuilder::new().build())
            .await
            .unwrap();
        assert_eq!(report.treatment, Treatment::AppointmentAdded);
        assert_eq!(f.push.sent_count(), 0);
        assert_eq!(f.reminders.scheduled().len(), 1);
    }

    #[tokio::test]
    async fn test_handler_reads_event_payload() {
        let f = fixture();
        f.fetcher.set_snapshot(SnapshotBuilder::new().build());
        f.push.fail_for("ben-1");
        let event = PartnerEventBuilder::new().build();
        let job = QueuedJob::new(
            "evt:evt-1".to_string(),
            Job::new(
                JobType::ProcessPartnerEvent,
                test_now(),
                serde_json::to_value(&event).unwrap(),
            ),
            test_now(),
        );

        let outcome = f.reconciler.handle(&job).await.unwrap();
        assert!(!outcome.succeeded);
        assert_eq!(outcome.error_count, 1);
        assert_eq!(outcome.result["treatment"], "APPOINTMENT_ADDED");
        assert_eq!(outcome.result["beneficiaryId"], "ben-1");
    }
}
