//! 外部协作者接口
//!
//! 对账器和通知去重器只通过这些窄接口访问持久化、合作方与推送通道。

use async_trait::async_trait;
use chrono::NaiveDate;

use planner_core::Result;

use crate::appointment::{LocalAppointment, PartnerInfo};
use crate::beneficiary::Beneficiary;
use crate::notification::{PartnerNotificationBatch, PushMessage};
use crate::partner::{PartnerAppointmentSnapshot, PartnerEvent};

/// 受益人仓库
#[async_trait]
pub trait BeneficiaryRepository: Send + Sync {
    async fn find_by_partner_id(&self, partner_id: &str) -> Result<Option<Beneficiary>>;

    /// 分页查询拥有合作方身份的受益人
    async fn find_with_partner_identity(&self, offset: usize, limit: usize)
        -> Result<Vec<Beneficiary>>;
}

/// 预约仓库
#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<LocalAppointment>>;

    async fn get_by_partner_object_id(
        &self,
        partner_info: &PartnerInfo,
    ) -> Result<Option<LocalAppointment>>;

    async fn save(&self, appointment: &LocalAppointment) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<()>;
}

/// 合作方预约快照查询
#[async_trait]
pub trait PartnerAppointmentFetcher: Send + Sync {
    /// 合作方已无该对象时返回 `None`
    async fn find_by_event(&self, event: &PartnerEvent)
        -> Result<Option<PartnerAppointmentSnapshot>>;
}

/// 预约提醒服务
#[async_trait]
pub trait ReminderService: Send + Sync {
    async fn schedule_for(&self, appointment: &LocalAppointment) -> Result<()>;

    async fn cancel_for(&self, appointment_id: &str) -> Result<()>;
}

/// 推送通道
#[async_trait]
pub trait PushDispatcher: Send + Sync {
    async fn send(&self, message: &PushMessage, beneficiary_id: &str) -> Result<()>;
}

/// 合作方通知查询
#[async_trait]
pub trait PartnerNotificationClient: Send + Sync {
    async fn get_notifications(
        &self,
        partner_beneficiary_ids: &[String],
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PartnerNotificationBatch>>;
}

/// 合作方事件队列
#[async_trait]
pub trait PartnerEventSource: Send + Sync {
    async fn fetch_pending(&self) -> Result<Vec<PartnerEvent>>;

    /// 确认事件已入队处理，合作方不再重发
    async fn acknowledge(&self, event: &PartnerEvent) -> Result<()>;
}
