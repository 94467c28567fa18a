//! 所有协作者接口的内存模拟实现
//!
//! 用于单元测试和集成测试，无需数据库、合作方接口或推送通道。

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use planner_core::{Clock, PlannerError, Result};
use planner_domain::{
    AppointmentRepository, Beneficiary, BeneficiaryRepository, LocalAppointment,
    PartnerAppointmentFetcher, PartnerAppointmentSnapshot, PartnerEvent, PartnerEventSource,
    PartnerInfo, PartnerNotificationBatch, PartnerNotificationClient, PushDispatcher, PushMessage,
    ReminderService,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// 可手动推进的时钟
#[derive(Debug, Clone)]
pub struct MockClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += duration;
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Mock implementation of BeneficiaryRepository for testing
#[derive(Debug, Clone, Default)]
pub struct MockBeneficiaryRepository {
    beneficiaries: Arc<Mutex<Vec<Beneficiary>>>,
}

impl MockBeneficiaryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_beneficiaries(beneficiaries: Vec<Beneficiary>) -> Self {
        Self {
            beneficiaries: Arc::new(Mutex::new(beneficiaries)),
        }
    }

    pub fn add(&self, beneficiary: Beneficiary) {
        self.beneficiaries.lock().unwrap().push(beneficiary);
    }
}

#[async_trait]
impl BeneficiaryRepository for MockBeneficiaryRepository {
    async fn find_by_partner_id(&self, partner_id: &str) -> Result<Option<Beneficiary>> {
        Ok(self
            .beneficiaries
            .lock()
            .unwrap()
            .iter()
            .find(|b| b.partner_id.as_deref() == Some(partner_id))
            .cloned())
    }

    async fn find_with_partner_identity(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Beneficiary>> {
        Ok(self
            .beneficiaries
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.partner_id.is_some())
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Mock implementation of AppointmentRepository for testing
#[derive(Debug, Clone, Default)]
pub struct MockAppointmentRepository {
    appointments: Arc<Mutex<HashMap<String, LocalAppointment>>>,
    saves: Arc<Mutex<usize>>,
}

impl MockAppointmentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_appointments(appointments: Vec<LocalAppointment>) -> Self {
        let repo = Self::new();
        {
            let mut map = repo.appointments.lock().unwrap();
            for appointment in appointments {
                map.insert(appointment.id.clone(), appointment);
            }
        }
        repo
    }

    pub fn count(&self) -> usize {
        self.appointments.lock().unwrap().len()
    }

    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap()
    }

    pub fn all(&self) -> Vec<LocalAppointment> {
        self.appointments.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl AppointmentRepository for MockAppointmentRepository {
    async fn get(&self, id: &str) -> Result<Option<LocalAppointment>> {
        Ok(self.appointments.lock().unwrap().get(id).cloned())
    }

    async fn get_by_partner_object_id(
        &self,
        partner_info: &PartnerInfo,
    ) -> Result<Option<LocalAppointment>> {
        Ok(self
            .appointments
            .lock()
            .unwrap()
            .values()
            .find(|a| a.partner_info.as_ref() == Some(partner_info))
            .cloned())
    }

    async fn save(&self, appointment: &LocalAppointment) -> Result<()> {
        self.appointments
            .lock()
            .unwrap()
            .insert(appointment.id.clone(), appointment.clone());
        *self.saves.lock().unwrap() += 1;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.appointments.lock().unwrap().remove(id);
        Ok(())
    }
}

/// Mock implementation of PartnerAppointmentFetcher for testing
#[derive(Debug, Clone, Default)]
pub struct MockPartnerAppointmentFetcher {
    /// 合作方对象ID -> 快照
    snapshots: Arc<Mutex<HashMap<String, PartnerAppointmentSnapshot>>>,
}

impl MockPartnerAppointmentFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_snapshot(&self, snapshot: PartnerAppointmentSnapshot) {
        self.snapshots
            .lock()
            .unwrap()
            .insert(snapshot.id.clone(), snapshot);
    }

    pub fn remove_snapshot(&self, object_id: &str) {
        self.snapshots.lock().unwrap().remove(object_id);
    }
}

#[async_trait]
impl PartnerAppointmentFetcher for MockPartnerAppointmentFetcher {
    async fn find_by_event(
        &self,
        event: &PartnerEvent,
    ) -> Result<Option<PartnerAppointmentSnapshot>> {
        Ok(self.snapshots.lock().unwrap().get(&event.object_id).cloned())
    }
}

/// Mock implementation of ReminderService for testing
#[derive(Debug, Clone, Default)]
pub struct MockReminderService {
    scheduled: Arc<Mutex<Vec<String>>>,
    cancelled: Arc<Mutex<Vec<String>>>,
    failing: Arc<Mutex<bool>>,
}

impl MockReminderService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    /// 已调度提醒的预约ID
    pub fn scheduled(&self) -> Vec<String> {
        self.scheduled.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }

    fn check_failing(&self) -> Result<()> {
        if *self.failing.lock().unwrap() {
            return Err(PlannerError::SchedulingUnavailable("mock".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ReminderService for MockReminderService {
    async fn schedule_for(&self, appointment: &LocalAppointment) -> Result<()> {
        self.check_failing()?;
        self.scheduled.lock().unwrap().push(appointment.id.clone());
        Ok(())
    }

    async fn cancel_for(&self, appointment_id: &str) -> Result<()> {
        self.check_failing()?;
        self.cancelled
            .lock()
            .unwrap()
            .push(appointment_id.to_string());
        Ok(())
    }
}

/// Mock implementation of PushDispatcher for testing
#[derive(Debug, Clone, Default)]
pub struct MockPushDispatcher {
    sent: Arc<Mutex<Vec<(String, PushMessage)>>>,
    failing_beneficiaries: Arc<Mutex<HashSet<String>>>,
}

impl MockPushDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// 发往该受益人的推送都会失败
    pub fn fail_for(&self, beneficiary_id: &str) {
        self.failing_beneficiaries
            .lock()
            .unwrap()
            .insert(beneficiary_id.to_string());
    }

    pub fn sent(&self) -> Vec<(String, PushMessage)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl PushDispatcher for MockPushDispatcher {
    async fn send(&self, message: &PushMessage, beneficiary_id: &str) -> Result<()> {
        if self
            .failing_beneficiaries
            .lock()
            .unwrap()
            .contains(beneficiary_id)
        {
            return Err(PlannerError::Internal(format!(
                "推送失败: {beneficiary_id}"
            )));
        }
        self.sent
            .lock()
            .unwrap()
            .push((beneficiary_id.to_string(), message.clone()));
        Ok(())
    }
}

/// 模拟的合作方接口失败
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    RateLimited,
    ServerError,
}

/// 一次通知查询调用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationCall {
    pub partner_beneficiary_ids: Vec<String>,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// Mock implementation of PartnerNotificationClient for testing
#[derive(Debug, Clone, Default)]
pub struct MockPartnerNotificationClient {
    batches: Arc<Mutex<Vec<PartnerNotificationBatch>>>,
    /// 调用序号(从0开始) -> 失败类型
    failures: Arc<Mutex<HashMap<usize, MockFailure>>>,
    calls: Arc<Mutex<Vec<NotificationCall>>>,
}

impl MockPartnerNotificationClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batches(batches: Vec<PartnerNotificationBatch>) -> Self {
        let client = Self::new();
        *client.batches.lock().unwrap() = batches;
        client
    }

    pub fn fail_call(&self, call_index: usize, failure: MockFailure) {
        self.failures.lock().unwrap().insert(call_index, failure);
    }

    pub fn calls(&self) -> Vec<NotificationCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PartnerNotificationClient for MockPartnerNotificationClient {
    async fn get_notifications(
        &self,
        partner_beneficiary_ids: &[String],
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PartnerNotificationBatch>> {
        let call_index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(NotificationCall {
                partner_beneficiary_ids: partner_beneficiary_ids.to_vec(),
                from,
                to,
            });
            calls.len() - 1
        };

        match self.failures.lock().unwrap().get(&call_index) {
            Some(MockFailure::RateLimited) => {
                return Err(PlannerError::RateLimited {
                    retry_after_seconds: None,
                })
            }
            Some(MockFailure::ServerError) => {
                return Err(PlannerError::partner_api(Some(500), "mock"))
            }
            None => {}
        }

        Ok(self
            .batches
            .lock()
            .unwrap()
            .iter()
            .filter(|b| partner_beneficiary_ids.contains(&b.partner_beneficiary_id))
            .cloned()
            .collect())
    }
}

/// Mock implementation of PartnerEventSource for testing
#[derive(Debug, Clone, Default)]
pub struct MockPartnerEventSource {
    pending: Arc<Mutex<Vec<PartnerEvent>>>,
    acknowledged: Arc<Mutex<Vec<String>>>,
}

impl MockPartnerEventSource {
    pub fn with_events(events: Vec<PartnerEvent>) -> Self {
        let source = Self::default();
        *source.pending.lock().unwrap() = events;
        source
    }

    pub fn acknowledged(&self) -> Vec<String> {
        self.acknowledged.lock().unwrap().clone()
    }
}

#[async_trait]
impl PartnerEventSource for MockPartnerEventSource {
    async fn fetch_pending(&self) -> Result<Vec<PartnerEvent>> {
        Ok(self.pending.lock().unwrap().clone())
    }

    async fn acknowledge(&self, event: &PartnerEvent) -> Result<()> {
        self.pending.lock().unwrap().retain(|e| e.id != event.id);
        self.acknowledged.lock().unwrap().push(event.id.clone());
        Ok(())
    }
}
