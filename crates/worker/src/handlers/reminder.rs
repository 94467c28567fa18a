use std::sync::Arc;

use async_trait::async_trait;
use planner_core::{JobType, QueuedJob, Result};
use planner_domain::{AppointmentRepository, PushDispatcher, PushKind, PushMessage};
use planner_infrastructure::JobMetrics;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::handler::{JobHandler, JobOutcome};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReminderPayload {
    appointment_id: String,
}

/// 预约提醒：向所有参与人推送提醒消息
pub struct AppointmentReminderHandler {
    appointments: Arc<dyn AppointmentRepository>,
    push: Arc<dyn PushDispatcher>,
}

impl AppointmentReminderHandler {
    pub fn new(appointments: Arc<dyn AppointmentRepository>, push: Arc<dyn PushDispatcher>) -> Self {
        Self { appointments, push }
    }
}

#[async_trait]
impl JobHandler for AppointmentReminderHandler {
    fn job_type(&self) -> JobType {
        JobType::AppointmentReminder
    }

    async fn handle(&self, job: &QueuedJob) -> Result<JobOutcome> {
        let payload: ReminderPayload = serde_json::from_value(job.job.payload.clone())?;
        let Some(appointment) = self.appointments.get(&payload.appointment_id).await? else {
            info!("预约 {} 已不存在，忽略提醒", payload.appointment_id);
            return Ok(JobOutcome::success(json!({
                "appointmentId": payload.appointment_id,
                "found": false,
            })));
        };

        let message = PushMessage::for_appointment(PushKind::Reminder, &appointment);
        let mut sent = 0u32;
        let mut failed = 0u32;
        for participant in &appointment.participants {
            match self.push.send(&message, participant).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    warn!("预约 {} 提醒推送给 {} 失败: {}", appointment.id, participant, e);
                    failed += 1;
                }
            }
        }
        JobMetrics::record_push_sent("reminder", u64::from(sent));
        if failed > 0 {
            JobMetrics::record_push_failed("reminder", u64::from(failed));
        }

        Ok(JobOutcome::with_errors(
            failed,
            json!({
                "appointmentId": appointment.id,
                "found": true,
                "sent": sent,
            }),
        ))
    }
}
