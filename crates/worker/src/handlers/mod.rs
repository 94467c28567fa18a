//! 各任务类型的处理器

pub mod cleanup;
pub mod fake;
pub mod monitor;
pub mod notification_dedup;
pub mod partner_event;
pub mod partner_feed;
pub mod reminder;

pub use cleanup::CleanupHandler;
pub use fake::FakeHandler;
pub use monitor::CronHealthMonitor;
pub use notification_dedup::{
    fold_notifications, DedupSettings, DedupStats, NotificationDeduplicator,
};
pub use partner_event::{PartnerEventReconciler, ReconciliationReport, Treatment};
pub use partner_feed::{event_job_id, PartnerEventFeed};
pub use reminder::AppointmentReminderHandler;
