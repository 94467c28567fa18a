use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use planner_core::{PlannerError, Result};

use crate::beneficiary::Beneficiary;
use crate::partner::{PartnerAppointmentSnapshot, PartnerObjectKind};

/// 预约来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentSource {
    /// 本系统顾问创建
    Local,
    /// 从合作方同步
    Partner,
}

/// 预约在合作方系统中的身份，也是同步的幂等键
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerInfo {
    pub id: String,
    pub kind: PartnerObjectKind,
}

/// 本地预约
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalAppointment {
    pub id: String,
    pub source: AppointmentSource,
    pub title: String,
    pub date: DateTime<Utc>,
    pub duration_minutes: i64,
    /// 参与的受益人ID
    pub participants: Vec<String>,
    pub kind: String,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub partner_info: Option<PartnerInfo>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub modality: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// 应用快照后的变化
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AppointmentChanges {
    pub date_changed: bool,
    pub any_changed: bool,
}

impl LocalAppointment {
    /// 根据合作方快照创建本地预约
    pub fn from_partner_snapshot(
        id: String,
        snapshot: &PartnerAppointmentSnapshot,
        beneficiary: &Beneficiary,
        object: PartnerObjectKind,
    ) -> Result<Self> {
        let date = local_to_utc(snapshot.start_at, beneficiary.timezone()?)?;

        Ok(Self {
            id,
            source: AppointmentSource::Partner,
            title: snapshot.title.clone(),
            date,
            duration_minutes: snapshot.duration_minutes(),
            participants: vec![beneficiary.id.clone()],
            kind: snapshot.kind.clone(),
            created_by: None,
            partner_info: Some(PartnerInfo {
                id: snapshot.id.clone(),
                kind: object,
            }),
            comment: snapshot.comment.clone(),
            modality: snapshot.modality.clone(),
            address: snapshot.address.clone(),
        })
    }

    /// 用合作方快照更新可变字段，保留ID、参与人和创建者
    pub fn apply_snapshot(
        &mut self,
        snapshot: &PartnerAppointmentSnapshot,
        timezone: Tz,
    ) -> Result<AppointmentChanges> {
        let date = local_to_utc(snapshot.start_at, timezone)?;
        let duration_minutes = snapshot.duration_minutes();

        let date_changed = self.date != date;
        let any_changed = date_changed
            || self.title != snapshot.title
            || self.duration_minutes != duration_minutes
            || self.comment != snapshot.comment
            || self.modality != snapshot.modality
            || self.address != snapshot.address;

        self.title = snapshot.title.clone();
        self.date = date;
        self.duration_minutes = duration_minutes;
        self.comment = snapshot.comment.clone();
        self.modality = snapshot.modality.clone();
        self.address = snapshot.address.clone();

        Ok(AppointmentChanges {
            date_changed,
            any_changed,
        })
    }

    pub fn is_future(&self, now: DateTime<Utc>) -> bool {
        self.date > now
    }
}

/// 将合作方本地时间按时区转换为UTC；夏令时跳变缺口中的时间顺延一小时
fn local_to_utc(local: NaiveDateTime, timezone: Tz) -> Result<DateTime<Utc>> {
    timezone
        .from_local_datetime(&local)
        .earliest()
        .or_else(|| {
            timezone
                .from_local_datetime(&(local + Duration::hours(1)))
                .earliest()
        })
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| PlannerError::Internal(format!("无法转换本地时间 {local} ({timezone})")))
}
