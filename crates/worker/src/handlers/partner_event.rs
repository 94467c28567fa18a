//! 合作方事件对账
//!
//! 将单个合作方事件与本地预约状态对齐：按 (操作类型, 对象) 分类，解析受益人，
//! 并发读取合作方快照与本地预约，然后进入创建/更新/删除分支。

use std::sync::Arc;

use async_trait::async_trait;
use planner_core::{Clock, JobType, QueuedJob, Result};
use planner_domain::{
    AppointmentRepository, Beneficiary, BeneficiaryRepository, EventAction, LocalAppointment,
    PartnerAppointmentFetcher, PartnerAppointmentSnapshot, PartnerEvent, PartnerInfo,
    PartnerObjectKind, PushDispatcher, PushKind, PushMessage, ReminderService,
};
use planner_infrastructure::JobMetrics;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::handler::{JobHandler, JobOutcome};

/// 对账的终态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Treatment {
    AppointmentAdded,
    AppointmentUpdated,
    AppointmentDeleted,
    BeneficiaryUnknown,
    KindNonTreatable,
    ObjectNonTreatable,
    CreateUnknown,
    UpdateUnknown,
    DeleteUnknown,
}

/// 单个事件的对账结果，写入执行记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    pub treatment: Treatment,
    pub beneficiary_id: Option<String>,
    pub appointment_id: Option<String>,
    pub failed_dispatches: u32,
    pub reminder_errors: u32,
}

impl ReconciliationReport {
    fn terminal(treatment: Treatment) -> Self {
        Self {
            treatment,
            beneficiary_id: None,
            appointment_id: None,
            failed_dispatches: 0,
            reminder_errors: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    Create,
    Update,
    Delete,
}

/// 单次对账过程中的累计状态
struct Reconciliation<'a> {
    beneficiary: &'a Beneficiary,
    object: PartnerObjectKind,
    failed_dispatches: u32,
    reminder_errors: u32,
}

impl Reconciliation<'_> {
    fn finish(self, treatment: Treatment, appointment_id: Option<String>) -> ReconciliationReport {
        ReconciliationReport {
            treatment,
            beneficiary_id: Some(self.beneficiary.id.clone()),
            appointment_id,
            failed_dispatches: self.failed_dispatches,
            reminder_errors: self.reminder_errors,
        }
    }
}

/// 合作方事件对账器
pub struct PartnerEventReconciler {
    beneficiaries: Arc<dyn BeneficiaryRepository>,
    appointments: Arc<dyn AppointmentRepository>,
    fetcher: Arc<dyn PartnerAppointmentFetcher>,
    reminders: Arc<dyn ReminderService>,
    push: Arc<dyn PushDispatcher>,
    clock: Arc<dyn Clock>,
    notifications_enabled: bool,
}

impl PartnerEventReconciler {
    pub fn new(
        beneficiaries: Arc<dyn BeneficiaryRepository>,
        appointments: Arc<dyn AppointmentRepository>,
        fetcher: Arc<dyn PartnerAppointmentFetcher>,
        reminders: Arc<dyn ReminderService>,
        push: Arc<dyn PushDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            beneficiaries,
            appointments,
            fetcher,
            reminders,
            push,
            clock,
            notifications_enabled: true,
        }
    }

    /// 关闭后对账照常进行，但不发送任何推送
    pub fn with_notifications(mut self, enabled: bool) -> Self {
        self.notifications_enabled = enabled;
        self
    }

    pub async fn reconcile(&self, event: &PartnerEvent) -> Result<ReconciliationReport> {
        let (operation, object) = match event.action() {
            EventAction::Create(object) => (Operation::Create, object),
            EventAction::Update(object) => (Operation::Update, object),
            EventAction::Delete(object) => (Operation::Delete, object),
            EventAction::KindNonTreatable => {
                debug!("事件 {} 的操作类型无法处理", event.id);
                return Ok(ReconciliationReport::terminal(Treatment::KindNonTreatable));
            }
            EventAction::ObjectNonTreatable => {
                debug!("事件 {} 的对象类型无法处理", event.id);
                return Ok(ReconciliationReport::terminal(Treatment::ObjectNonTreatable));
            }
        };

        let Some(beneficiary) = self
            .beneficiaries
            .find_by_partner_id(&event.partner_beneficiary_id)
            .await?
        else {
            info!(
                "事件 {} 的合作方受益人 {} 不存在",
                event.id, event.partner_beneficiary_id
            );
            return Ok(ReconciliationReport::terminal(Treatment::BeneficiaryUnknown));
        };

        let partner_info = PartnerInfo {
            id: event.object_id.clone(),
            kind: object,
        };
        let (snapshot, local) = tokio::try_join!(
            self.fetcher.find_by_event(event),
            self.appointments.get_by_partner_object_id(&partner_info),
        )?;

        let mut ctx = Reconciliation {
            beneficiary: &beneficiary,
            object,
            failed_dispatches: 0,
            reminder_errors: 0,
        };

        let (treatment, appointment_id) = match operation {
            Operation::Create => match (local, snapshot) {
                (Some(local), snapshot) => self.update_path(&mut ctx, Some(local), snapshot).await?,
                (None, Some(snapshot)) if snapshot.status.is_recoverable() => {
                    self.add(&mut ctx, &snapshot).await?
                }
                (None, _) => (Treatment::CreateUnknown, None),
            },
            Operation::Update => self.update_path(&mut ctx, local, snapshot).await?,
            Operation::Delete => match local {
                Some(local) => self.remove(&mut ctx, local, snapshot.as_ref()).await?,
                None => (Treatment::DeleteUnknown, None),
            },
        };

        Ok(ctx.finish(treatment, appointment_id))
    }

    async fn update_path(
        &self,
        ctx: &mut Reconciliation<'_>,
        local: Option<LocalAppointment>,
        snapshot: Option<PartnerAppointmentSnapshot>,
    ) -> Result<(Treatment, Option<String>)> {
        match (local, snapshot) {
            (_, None) => Ok((Treatment::UpdateUnknown, None)),
            (None, Some(snapshot)) if snapshot.status.is_recoverable() => {
                self.add(ctx, &snapshot).await
            }
            (None, Some(_)) => Ok((Treatment::CreateUnknown, None)),
            (Some(local), Some(snapshot)) if !snapshot.status.is_recoverable() => {
                self.remove(ctx, local, Some(&snapshot)).await
            }
            (Some(local), Some(snapshot)) => self.apply(ctx, local, &snapshot).await,
        }
    }

    async fn add(
        &self,
        ctx: &mut Reconciliation<'_>,
        snapshot: &PartnerAppointmentSnapshot,
    ) -> Result<(Treatment, Option<String>)> {
        let appointment = LocalAppointment::from_partner_snapshot(
            Uuid::new_v4().to_string(),
            snapshot,
            ctx.beneficiary,
            ctx.object,
        )?;
        self.appointments.save(&appointment).await?;
        info!(
            "新增合作方预约 {} (合作方对象 {})",
            appointment.id, snapshot.id
        );

        if let Err(e) = self.reminders.schedule_for(&appointment).await {
            warn!("预约 {} 提醒调度失败: {}", appointment.id, e);
            ctx.reminder_errors += 1;
        }

        if self.is_notifiable(&appointment, snapshot) {
            ctx.failed_dispatches += self.notify(PushKind::New, &appointment).await;
        }
        Ok((Treatment::AppointmentAdded, Some(appointment.id)))
    }

    async fn apply(
        &self,
        ctx: &mut Reconciliation<'_>,
        mut appointment: LocalAppointment,
        snapshot: &PartnerAppointmentSnapshot,
    ) -> Result<(Treatment, Option<String>)> {
        let changes = appointment.apply_snapshot(snapshot, ctx.beneficiary.timezone()?)?;
        self.appointments.save(&appointment).await?;
        debug!("更新预约 {}: {:?}", appointment.id, changes);

        if changes.date_changed {
            let replanned = match self.reminders.cancel_for(&appointment.id).await {
                Ok(()) => self.reminders.schedule_for(&appointment).await,
                Err(e) => Err(e),
            };
            if let Err(e) = replanned {
                warn!("预约 {} 提醒重新调度失败: {}", appointment.id, e);
                ctx.reminder_errors += 1;
            }
        }

        if changes.any_changed && self.is_notifiable(&appointment, snapshot) {
            ctx.failed_dispatches += self.notify(PushKind::Updated, &appointment).await;
        }
        Ok((Treatment::AppointmentUpdated, Some(appointment.id)))
    }

    async fn remove(
        &self,
        ctx: &mut Reconciliation<'_>,
        appointment: LocalAppointment,
        snapshot: Option<&PartnerAppointmentSnapshot>,
    ) -> Result<(Treatment, Option<String>)> {
        self.appointments.delete(&appointment.id).await?;
        info!("删除合作方预约 {}", appointment.id);

        if let Err(e) = self.reminders.cancel_for(&appointment.id).await {
            warn!("预约 {} 提醒取消失败: {}", appointment.id, e);
            ctx.reminder_errors += 1;
        }

        // 合作方快照已不可读时无法判断状态，不推送
        if snapshot.is_some_and(|snapshot| self.is_notifiable(&appointment, snapshot)) {
            ctx.failed_dispatches += self.notify(PushKind::Deleted, &appointment).await;
        }
        Ok((Treatment::AppointmentDeleted, Some(appointment.id)))
    }

    /// 只通知未来的预约，且合作方状态在允许通知的范围内
    fn is_notifiable(
        &self,
        appointment: &LocalAppointment,
        snapshot: &PartnerAppointmentSnapshot,
    ) -> bool {
        appointment.is_future(self.clock.now()) && snapshot.status.is_notifiable()
    }

    /// 推送给所有参与人，返回失败数量
    async fn notify(&self, kind: PushKind, appointment: &LocalAppointment) -> u32 {
        if !self.notifications_enabled {
            debug!("合作方预约推送已关闭，跳过 {:?}", kind);
            return 0;
        }

        let message = PushMessage::for_appointment(kind, appointment);
        let mut failed = 0;
        for participant in &appointment.participants {
            if let Err(e) = self.push.send(&message, participant).await {
                warn!(
                    "预约 {} 推送给 {} 失败: {}",
                    appointment.id, participant, e
                );
                failed += 1;
            }
        }

        let sent = appointment.participants.len() as u64 - u64::from(failed);
        JobMetrics::record_push_sent("partner_event", sent);
        if failed > 0 {
            JobMetrics::record_push_failed("partner_event", u64::from(failed));
        }
        failed
    }
}

#[async_trait]
impl JobHandler for PartnerEventReconciler {
    fn job_type(&self) -> JobType {
        JobType::ProcessPartnerEvent
    }

    async fn handle(&self, job: &QueuedJob) -> Result<JobOutcome> {
        let event: PartnerEvent = serde_json::from_value(job.job.payload.clone())?;
        let report = self.reconcile(&event).await?;
        info!(
            "合作方事件 {} 对账完成: {:?}",
            event.id, report.treatment
        );
        Ok(JobOutcome::with_errors(
            report.failed_dispatches + report.reminder_errors,
            serde_json::to_value(&report)?,
        ))
    }
}
