pub mod handler;
pub mod handlers;
pub mod service;
pub mod tracking;

pub use handler::{JobHandler, JobOutcome};
pub use handlers::{
    event_job_id, fold_notifications, AppointmentReminderHandler, CleanupHandler,
    CronHealthMonitor, DedupSettings, DedupStats, FakeHandler, NotificationDeduplicator,
    PartnerEventFeed, PartnerEventReconciler, ReconciliationReport, Treatment,
};
pub use service::{WorkerService, WorkerServiceBuilder};
pub use tracking::ExecutionTracker;
