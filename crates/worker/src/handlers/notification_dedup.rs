//! 合作方预约通知去重推送
//!
//! 按页拉取拥有合作方身份的受益人，查询其近两天的合作方通知，
//! 只保留最近两小时内的通知，按通知目标分组折叠后逐条推送。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use planner_core::config::PartnerConfig;
use planner_core::{Clock, JobType, QueuedJob, Result};
use planner_domain::{
    Beneficiary, BeneficiaryRepository, MovementKind, PartnerNotification,
    PartnerNotificationBatch, PartnerNotificationClient, PushDispatcher, PushMessage,
};
use planner_infrastructure::JobMetrics;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::handler::{JobHandler, JobOutcome};

/// 通知的有效时间窗口（分钟）
const RECENCY_WINDOW_MINUTES: i64 = 120;

/// 去重推送参数
#[derive(Debug, Clone)]
pub struct DedupSettings {
    pub page_size: usize,
    pub page_pause: Duration,
    pub rate_limit_backoff: Duration,
}

impl DedupSettings {
    pub fn from_config(config: &PartnerConfig) -> Self {
        Self {
            page_size: config.notification_page_size,
            page_pause: Duration::from_millis(config.page_pause_ms),
            rate_limit_backoff: Duration::from_millis(config.rate_limit_backoff_ms),
        }
    }
}

impl Default for DedupSettings {
    fn default() -> Self {
        Self::from_config(&PartnerConfig::default())
    }
}

/// 单次运行统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DedupStats {
    pub beneficiaries_seen: usize,
    /// 收到通知批次的受益人数
    pub processed: usize,
    /// 有效窗口内的通知数
    pub recent_notifications: usize,
    pub sent: usize,
    pub duplicates_removed: usize,
    pub errors: u32,
}

/// 折叠同一目标的通知
///
/// 每组按 创建 < 更新 < 删除、再按创建时间排序后依次合并：
/// 创建+删除、更新+删除 互相抵消；创建+更新 保留创建并使用更新的消息；
/// 更新+更新 保留最新的一条；创建+创建 保留第一条；删除+删除 互相抵消。
/// 输出按各组首次出现的顺序排列。
pub fn fold_notifications(notifications: Vec<PartnerNotification>) -> Vec<PartnerNotification> {
    let mut order: Vec<Option<String>> = Vec::new();
    let mut groups: HashMap<Option<String>, Vec<PartnerNotification>> = HashMap::new();
    for notification in notifications {
        let key = notification.target_id.clone();
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(notification);
    }

    order
        .into_iter()
        .filter_map(|key| groups.remove(&key))
        .filter_map(fold_group)
        .collect()
}

fn fold_group(mut group: Vec<PartnerNotification>) -> Option<PartnerNotification> {
    group.sort_by(|a, b| {
        a.movement
            .priority()
            .cmp(&b.movement.priority())
            .then(a.created_at.cmp(&b.created_at))
    });

    group.into_iter().fold(None, |kept, next| match kept {
        None => Some(next),
        Some(kept) => merge(kept, next),
    })
}

fn merge(kept: PartnerNotification, next: PartnerNotification) -> Option<PartnerNotification> {
    match (kept.movement, next.movement) {
        (_, MovementKind::Delete) => None,
        (MovementKind::Create, MovementKind::Update) => Some(PartnerNotification {
            message: next.message,
            ..kept
        }),
        (MovementKind::Update, MovementKind::Update) => Some(next),
        (MovementKind::Create, MovementKind::Create) => Some(kept),
        // 排序后不会出现优先级倒序
        (MovementKind::Update | MovementKind::Delete, _) => Some(kept),
    }
}

/// 是否在有效窗口内：不晚于当前时间，且不早于两小时前
fn is_recent(notification: &PartnerNotification, now: DateTime<Utc>) -> bool {
    notification.created_at < now
        && now - notification.created_at <= chrono::Duration::minutes(RECENCY_WINDOW_MINUTES)
}

/// 合作方预约通知去重推送器
pub struct NotificationDeduplicator {
    beneficiaries: Arc<dyn BeneficiaryRepository>,
    client: Arc<dyn PartnerNotificationClient>,
    push: Arc<dyn PushDispatcher>,
    clock: Arc<dyn Clock>,
    settings: DedupSettings,
}

impl NotificationDeduplicator {
    pub fn new(
        beneficiaries: Arc<dyn BeneficiaryRepository>,
        client: Arc<dyn PartnerNotificationClient>,
        push: Arc<dyn PushDispatcher>,
        clock: Arc<dyn Clock>,
        settings: DedupSettings,
    ) -> Self {
        Self {
            beneficiaries,
            client,
            push,
            clock,
            settings,
        }
    }

    pub async fn run(&self) -> Result<DedupStats> {
        let now = self.clock.now();
        let today = now.date_naive();
        let yesterday = today.pred_opt().unwrap_or(today);
        let page_size = self.settings.page_size.max(1);

        let mut stats = DedupStats::default();
        let mut offset = 0;
        loop {
            let page = self
                .beneficiaries
                .find_with_partner_identity(offset, page_size)
                .await?;
            stats.beneficiaries_seen += page.len();

            let mut rate_limited = false;
            let partner_ids: Vec<String> = page.iter().filter_map(|b| b.partner_id.clone()).collect();
            if !partner_ids.is_empty() {
                match self
                    .client
                    .get_notifications(&partner_ids, yesterday, today)
                    .await
                {
                    Ok(batches) => self.process_batches(batches, &page, now, &mut stats).await,
                    Err(e) => {
                        warn!("获取第 {} 页合作方通知失败: {}", offset / page_size, e);
                        stats.errors += 1;
                        rate_limited = e.is_rate_limited();
                    }
                }
            }

            if page.len() < page_size {
                break;
            }
            offset += page.len();

            let pause = if rate_limited {
                self.settings.rate_limit_backoff
            } else {
                self.settings.page_pause
            };
            sleep(pause).await;
        }

        info!(
            "合作方通知推送完成: 受益人 {}, 已处理 {}, 通知 {}, 已发送 {}, 去重 {}, 错误 {}",
            stats.beneficiaries_seen,
            stats.processed,
            stats.recent_notifications,
            stats.sent,
            stats.duplicates_removed,
            stats.errors
        );
        Ok(stats)
    }

    async fn process_batches(
        &self,
        batches: Vec<PartnerNotificationBatch>,
        page: &[Beneficiary],
        now: DateTime<Utc>,
        stats: &mut DedupStats,
    ) {
        let by_partner_id: HashMap<&str, &Beneficiary> = page
            .iter()
            .filter_map(|b| b.partner_id.as_deref().map(|pid| (pid, b)))
            .collect();

        for batch in batches {
            let Some(beneficiary) = by_partner_id.get(batch.partner_beneficiary_id.as_str()) else {
                warn!(
                    "通知批次的合作方受益人 {} 不在当前页中，跳过",
                    batch.partner_beneficiary_id
                );
                continue;
            };
            stats.processed += 1;

            let recent: Vec<PartnerNotification> = batch
                .notifications
                .into_iter()
                .filter(|n| is_recent(n, now))
                .collect();
            if recent.is_empty() {
                continue;
            }
            stats.recent_notifications += recent.len();

            let survivors = fold_notifications(recent.clone());
            stats.duplicates_removed += recent.len() - survivors.len();
            debug!(
                "受益人 {}: {} 条通知折叠为 {} 条",
                beneficiary.id,
                recent.len(),
                survivors.len()
            );

            for notification in &survivors {
                let message = PushMessage::from_partner_notification(notification);
                match self.push.send(&message, &beneficiary.id).await {
                    Ok(()) => {
                        stats.sent += 1;
                        JobMetrics::record_push_sent("partner_notification", 1);
                    }
                    Err(e) => {
                        warn!("通知 {} 推送给 {} 失败: {}", notification.id, beneficiary.id, e);
                        stats.errors += 1;
                        JobMetrics::record_push_failed("partner_notification", 1);
                    }
                }
            }
        }
    }
}

#[async_trait]
impl JobHandler for NotificationDeduplicator {
    fn job_type(&self) -> JobType {
        JobType::NotifyPartnerAppointments
    }

    fn single_instance(&self) -> bool {
        true
    }

    async fn handle(&self, _job: &QueuedJob) -> Result<JobOutcome> {
        let stats = self.run().await?;
        Ok(JobOutcome::completed_with_errors(
            stats.errors,
            serde_json::to_value(stats)?,
        ))
    }
}
