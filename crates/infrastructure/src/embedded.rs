//! 嵌入式部署使用的领域协作者
//!
//! 受益人和预约的持久化、推送通道由宿主系统提供；单独运行时使用这里的内存实现，
//! 推送只写结构化日志。

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use planner_core::{PlannerError, Result};
use planner_domain::{
    AppointmentRepository, Beneficiary, BeneficiaryRepository, LocalAppointment, PartnerInfo,
    PushDispatcher, PushMessage,
};
use tokio::sync::RwLock;
use tracing::info;

/// 内存受益人仓库
#[derive(Debug, Clone, Default)]
pub struct InMemoryBeneficiaryRepository {
    beneficiaries: Arc<RwLock<Vec<Beneficiary>>>,
}

impl InMemoryBeneficiaryRepository {
    pub fn new(beneficiaries: Vec<Beneficiary>) -> Self {
        Self {
            beneficiaries: Arc::new(RwLock::new(beneficiaries)),
        }
    }

    /// 从JSON数组文件加载受益人
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PlannerError::Configuration(format!("读取受益人文件 {} 失败: {e}", path.display()))
        })?;
        let beneficiaries: Vec<Beneficiary> = serde_json::from_str(&content)?;
        info!("从 {} 加载了 {} 个受益人", path.display(), beneficiaries.len());
        Ok(Self::new(beneficiaries))
    }
}

#[async_trait]
impl BeneficiaryRepository for InMemoryBeneficiaryRepository {
    async fn find_by_partner_id(&self, partner_id: &str) -> Result<Option<Beneficiary>> {
        Ok(self
            .beneficiaries
            .read()
            .await
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
            .read()
            .await
            .iter()
            .filter(|b| b.partner_id.is_some())
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}

/// 内存预约仓库
#[derive(Debug, Clone, Default)]
pub struct InMemoryAppointmentRepository {
    appointments: Arc<RwLock<HashMap<String, LocalAppointment>>>,
}

impl InMemoryAppointmentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppointmentRepository for InMemoryAppointmentRepository {
    async fn get(&self, id: &str) -> Result<Option<LocalAppointment>> {
        Ok(self.appointments.read().await.get(id).cloned())
    }

    async fn get_by_partner_object_id(
        &self,
        partner_info: &PartnerInfo,
    ) -> Result<Option<LocalAppointment>> {
        Ok(self
            .appointments
            .read()
            .await
            .values()
            .find(|a| a.partner_info.as_ref() == Some(partner_info))
            .cloned())
    }

    async fn save(&self, appointment: &LocalAppointment) -> Result<()> {
        self.appointments
            .write()
            .await
            .insert(appointment.id.clone(), appointment.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.appointments.write().await.remove(id);
        Ok(())
    }
}

/// 只记录日志的推送通道
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingPushDispatcher;

#[async_trait]
impl PushDispatcher for LoggingPushDispatcher {
    async fn send(&self, message: &PushMessage, beneficiary_id: &str) -> Result<()> {
        info!(
            event = "push_sent",
            push.kind = ?message.kind,
            push.title = %message.title,
            push.target_id = ?message.target_id,
            beneficiary.id = beneficiary_id,
            "{}",
            message.body
        );
        Ok(())
    }
}
