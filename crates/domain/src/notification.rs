use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::appointment::LocalAppointment;

/// 合作方通知中的变动类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    Create,
    Update,
    Delete,
}

impl MovementKind {
    /// 去重折叠时的处理顺序: 创建 < 更新 < 删除
    pub fn priority(&self) -> u8 {
        match self {
            MovementKind::Create => 1,
            MovementKind::Update => 2,
            MovementKind::Delete => 3,
        }
    }

    pub fn push_kind(&self) -> PushKind {
        match self {
            MovementKind::Create => PushKind::New,
            MovementKind::Update => PushKind::Updated,
            MovementKind::Delete => PushKind::Deleted,
        }
    }
}

/// 合作方推送的预约通知
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerNotification {
    pub id: String,
    pub code: String,
    pub message: String,
    pub movement: MovementKind,
    pub appointment_kind: String,
    pub created_at: DateTime<Utc>,
    /// 通知指向的合作方对象，去重分组键
    #[serde(default)]
    pub target_id: Option<String>,
}

/// 单个受益人的通知批次
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerNotificationBatch {
    pub partner_beneficiary_id: String,
    pub notifications: Vec<PartnerNotification>,
}

/// 推送消息种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PushKind {
    New,
    Updated,
    Deleted,
    Reminder,
}

/// 推送给受益人的消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    pub kind: PushKind,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub target_id: Option<String>,
}

impl PushMessage {
    pub fn for_appointment(kind: PushKind, appointment: &LocalAppointment) -> Self {
        let title = match kind {
            PushKind::New => "New appointment",
            PushKind::Updated => "Appointment updated",
            PushKind::Deleted => "Appointment cancelled",
            PushKind::Reminder => "Upcoming appointment",
        };
        Self {
            kind,
            title: title.to_string(),
            body: format!(
                "{} - {}",
                appointment.title,
                appointment.date.format("%Y-%m-%d %H:%M UTC")
            ),
            target_id: Some(appointment.id.clone()),
        }
    }

    pub fn from_partner_notification(notification: &PartnerNotification) -> Self {
        let kind = notification.movement.push_kind();
        let title = match kind {
            PushKind::New => "New appointment",
            PushKind::Updated => "Appointment updated",
            _ => "Appointment cancelled",
        };
        Self {
            kind,
            title: title.to_string(),
            body: notification.message.clone(),
            target_id: notification.target_id.clone(),
        }
    }
}
