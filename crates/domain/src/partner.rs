use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// 合作方事件的操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Create,
    Update,
    Delete,
    #[serde(other)]
    NonTreatable,
}

/// 合作方事件关联的对象
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartnerObject {
    Appointment,
    Session,
    #[serde(other)]
    NonTreatable,
}

/// 本地会同步的合作方对象种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartnerObjectKind {
    Appointment,
    Session,
}

impl PartnerObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartnerObjectKind::Appointment => "APPOINTMENT",
            PartnerObjectKind::Session => "SESSION",
        }
    }
}

/// 合作方事件（瞬时，不持久化）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerEvent {
    pub id: String,
    pub partner_beneficiary_id: String,
    pub object: PartnerObject,
    pub kind: EventKind,
    pub object_id: String,
    pub date: DateTime<Utc>,
}

/// 事件经分类后的处理动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
    Create(PartnerObjectKind),
    Update(PartnerObjectKind),
    Delete(PartnerObjectKind),
    KindNonTreatable,
    ObjectNonTreatable,
}

impl PartnerEvent {
    /// 对 (操作类型, 对象) 组合做穷尽分类，操作类型优先判断
    pub fn action(&self) -> EventAction {
        let object = match self.object {
            PartnerObject::Appointment => Some(PartnerObjectKind::Appointment),
            PartnerObject::Session => Some(PartnerObjectKind::Session),
            PartnerObject::NonTreatable => None,
        };

        match (self.kind, object) {
            (EventKind::NonTreatable, _) => EventAction::KindNonTreatable,
            (_, None) => EventAction::ObjectNonTreatable,
            (EventKind::Create, Some(object)) => EventAction::Create(object),
            (EventKind::Update, Some(object)) => EventAction::Update(object),
            (EventKind::Delete, Some(object)) => EventAction::Delete(object),
        }
    }
}

/// 合作方预约状态
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PartnerStatus {
    Planned,
    Present,
    Absent,
    Unspecified,
    Cancelled,
    Rescheduled,
    Prescribed,
    RefusedByBeneficiary,
    RefusedByThirdParty,
    Other(String),
}

impl PartnerStatus {
    /// 可同步到本地的状态
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            PartnerStatus::Cancelled
                | PartnerStatus::Rescheduled
                | PartnerStatus::RefusedByBeneficiary
                | PartnerStatus::RefusedByThirdParty
        )
    }

    /// 值得推送给受益人的状态
    pub fn is_notifiable(&self) -> bool {
        matches!(
            self,
            PartnerStatus::Planned
                | PartnerStatus::Present
                | PartnerStatus::Absent
                | PartnerStatus::Unspecified
                | PartnerStatus::Prescribed
        )
    }

    pub fn code(&self) -> &str {
        match self {
            PartnerStatus::Planned => "PLANNED",
            PartnerStatus::Present => "PRESENT",
            PartnerStatus::Absent => "ABSENT",
            PartnerStatus::Unspecified => "UNSPECIFIED",
            PartnerStatus::Cancelled => "CANCELLED",
            PartnerStatus::Rescheduled => "RESCHEDULED",
            PartnerStatus::Prescribed => "PRESCRIBED",
            PartnerStatus::RefusedByBeneficiary => "REFUSED_BY_BENEFICIARY",
            PartnerStatus::RefusedByThirdParty => "REFUSED_BY_THIRD_PARTY",
            PartnerStatus::Other(code) => code,
        }
    }
}

impl From<String> for PartnerStatus {
    fn from(code: String) -> Self {
        match code.as_str() {
            "PLANNED" => PartnerStatus::Planned,
            "PRESENT" => PartnerStatus::Present,
            "ABSENT" => PartnerStatus::Absent,
            "UNSPECIFIED" => PartnerStatus::Unspecified,
            "CANCELLED" => PartnerStatus::Cancelled,
            "RESCHEDULED" => PartnerStatus::Rescheduled,
            "PRESCRIBED" => PartnerStatus::Prescribed,
            "REFUSED_BY_BENEFICIARY" => PartnerStatus::RefusedByBeneficiary,
            "REFUSED_BY_THIRD_PARTY" => PartnerStatus::RefusedByThirdParty,
            _ => PartnerStatus::Other(code),
        }
    }
}

impl From<PartnerStatus> for String {
    fn from(status: PartnerStatus) -> Self {
        status.code().to_string()
    }
}

/// 合作方预约实时快照
///
/// 起止时间为合作方本地时间（不带时区），按受益人时区解释。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerAppointmentSnapshot {
    pub id: String,
    pub start_at: NaiveDateTime,
    #[serde(default)]
    pub end_at: Option<NaiveDateTime>,
    pub title: String,
    pub partner_beneficiary_id: String,
    #[serde(default)]
    pub comment: Option<String>,
    pub kind: String,
    #[serde(default)]
    pub modality: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    pub status: PartnerStatus,
}

impl PartnerAppointmentSnapshot {
    /// 时长（分钟），没有结束时间时为0
    pub fn duration_minutes(&self) -> i64 {
        self.end_at
            .map(|end| (end - self.start_at).num_minutes())
            .unwrap_or(0)
    }
}
