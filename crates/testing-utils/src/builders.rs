//! 测试数据构建器

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use planner_domain::{
    AppointmentSource, Beneficiary, EventKind, LocalAppointment, MovementKind, PartnerAppointmentSnapshot,
    PartnerEvent, PartnerInfo, PartnerNotification, PartnerObject, PartnerObjectKind, PartnerStatus,
};

/// 测试使用的固定"当前时间"
pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

pub fn beneficiary(id: &str, partner_id: &str) -> Beneficiary {
    Beneficiary {
        id: id.to_string(),
        partner_id: Some(partner_id.to_string()),
        timezone: None,
    }
}

/// Builder for creating test PartnerEvent entities
pub struct PartnerEventBuilder {
    event: PartnerEvent,
}

impl PartnerEventBuilder {
    pub fn new() -> Self {
        Self {
            event: PartnerEvent {
                id: "evt-1".to_string(),
                partner_beneficiary_id: "partner-1".to_string(),
                object: PartnerObject::Appointment,
                kind: EventKind::Create,
                object_id: "obj-1".to_string(),
                date: test_now(),
            },
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.event.id = id.to_string();
        self
    }

    pub fn with_partner_beneficiary_id(mut self, id: &str) -> Self {
        self.event.partner_beneficiary_id = id.to_string();
        self
    }

    pub fn with_kind(mut self, kind: EventKind) -> Self {
        self.event.kind = kind;
        self
    }

    pub fn with_object(mut self, object: PartnerObject) -> Self {
        self.event.object = object;
        self
    }

    pub fn with_object_id(mut self, object_id: &str) -> Self {
        self.event.object_id = object_id.to_string();
        self
    }

    pub fn build(self) -> PartnerEvent {
        self.event
    }
}

impl Default for PartnerEventBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test PartnerAppointmentSnapshot entities
pub struct SnapshotBuilder {
    snapshot: PartnerAppointmentSnapshot,
}

impl SnapshotBuilder {
    /// 默认开始时间为测试当前时间后10天（巴黎本地时间）
    pub fn new() -> Self {
        let start = (test_now() + Duration::days(10)).naive_utc();
        Self {
            snapshot: PartnerAppointmentSnapshot {
                id: "obj-1".to_string(),
                start_at: start,
                end_at: Some(start + Duration::minutes(60)),
                title: "Entretien".to_string(),
                partner_beneficiary_id: "partner-1".to_string(),
                comment: None,
                kind: "INTERVIEW".to_string(),
                modality: None,
                address: None,
                status: PartnerStatus::Planned,
            },
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.snapshot.id = id.to_string();
        self
    }

    pub fn with_start_at(mut self, start_at: NaiveDateTime) -> Self {
        self.snapshot.start_at = start_at;
        self
    }

    pub fn without_end(mut self) -> Self {
        self.snapshot.end_at = None;
        self
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.snapshot.title = title.to_string();
        self
    }

    pub fn with_status(mut self, status: PartnerStatus) -> Self {
        self.snapshot.status = status;
        self
    }

    pub fn build(self) -> PartnerAppointmentSnapshot {
        self.snapshot
    }
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test LocalAppointment entities
pub struct AppointmentBuilder {
    appointment: LocalAppointment,
}

impl AppointmentBuilder {
    pub fn new() -> Self {
        Self {
            appointment: LocalAppointment {
                id: "rdv-1".to_string(),
                source: AppointmentSource::Partner,
                title: "Entretien".to_string(),
                date: test_now() + Duration::days(10),
                duration_minutes: 60,
                participants: vec!["ben-1".to_string()],
                kind: "INTERVIEW".to_string(),
                created_by: None,
                partner_info: Some(PartnerInfo {
                    id: "obj-1".to_string(),
                    kind: PartnerObjectKind::Appointment,
                }),
                comment: None,
                modality: None,
                address: None,
            },
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.appointment.id = id.to_string();
        self
    }

    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.appointment.date = date;
        self
    }

    pub fn with_participants(mut self, participants: &[&str]) -> Self {
        self.appointment.participants = participants.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_partner_info(mut self, id: &str, kind: PartnerObjectKind) -> Self {
        self.appointment.partner_info = Some(PartnerInfo {
            id: id.to_string(),
            kind,
        });
        self
    }

    pub fn build(self) -> LocalAppointment {
        self.appointment
    }
}

impl Default for AppointmentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test PartnerNotification entities
pub struct NotificationBuilder {
    notification: PartnerNotification,
}

impl NotificationBuilder {
    pub fn new(movement: MovementKind) -> Self {
        Self {
            notification: PartnerNotification {
                id: "notif-1".to_string(),
                code: "APPOINTMENT".to_string(),
                message: format!("{movement:?}"),
                movement,
                appointment_kind: "INTERVIEW".to_string(),
                created_at: test_now() - Duration::minutes(30),
                target_id: Some("obj-1".to_string()),
            },
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.notification.id = id.to_string();
        self
    }

    pub fn with_message(mut self, message: &str) -> Self {
        self.notification.message = message.to_string();
        self
    }

    pub fn with_target(mut self, target_id: Option<&str>) -> Self {
        self.notification.target_id = target_id.map(str::to_string);
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.notification.created_at = created_at;
        self
    }

    pub fn build(self) -> PartnerNotification {
        self.notification
    }
}
