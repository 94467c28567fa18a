use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use planner_core::{Job, JobType, Result};
use planner_domain::{LocalAppointment, ReminderService};
use tracing::debug;

use crate::scheduler::JobScheduler;

/// 提醒提前天数
pub const REMINDER_OFFSETS_DAYS: [i64; 2] = [7, 1];

pub fn reminder_job_id(appointment_id: &str, days_before: i64) -> String {
    format!("rdv:{appointment_id}:{days_before}")
}

/// 基于任务调度器的预约提醒服务
pub struct ReminderPlanner {
    scheduler: Arc<JobScheduler>,
}

impl ReminderPlanner {
    pub fn new(scheduler: Arc<JobScheduler>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl ReminderService for ReminderPlanner {
    async fn schedule_for(&self, appointment: &LocalAppointment) -> Result<()> {
        let now = self.scheduler.clock().now();
        for days in REMINDER_OFFSETS_DAYS {
            let offset = Duration::days(days);
            if appointment.date - now <= offset {
                debug!("预约 {} 距今不足 {} 天，跳过提醒", appointment.id, days);
                continue;
            }
            let job = Job::new(
                JobType::AppointmentReminder,
                appointment.date - offset,
                serde_json::json!({ "appointmentId": appointment.id }),
            )
            .with_id(reminder_job_id(&appointment.id, days));
            self.scheduler.schedule(job).await?;
        }
        Ok(())
    }

    async fn cancel_for(&self, appointment_id: &str) -> Result<()> {
        self.scheduler
            .cancel_by_id_pattern(&format!("rdv:{appointment_id}:"))
            .await?;
        Ok(())
    }
}
