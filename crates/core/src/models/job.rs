use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{PlannerError, Result};

/// 任务类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobType {
    /// 预约提醒(提前7天/1天)
    AppointmentReminder,
    /// 处理单个合作方事件
    ProcessPartnerEvent,
    /// 拉取合作方事件队列
    FollowPartnerEvents,
    /// 合作方预约通知去重推送
    NotifyPartnerAppointments,
    /// 定时任务健康监控
    MonitorJobs,
    /// 清理已结束任务与执行记录
    CleanupJobs,
    /// 冒烟测试任务
    Fake,
}

impl JobType {
    pub const ALL: [JobType; 7] = [
        JobType::AppointmentReminder,
        JobType::ProcessPartnerEvent,
        JobType::FollowPartnerEvents,
        JobType::NotifyPartnerAppointments,
        JobType::MonitorJobs,
        JobType::CleanupJobs,
        JobType::Fake,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::AppointmentReminder => "APPOINTMENT_REMINDER",
            JobType::ProcessPartnerEvent => "PROCESS_PARTNER_EVENT",
            JobType::FollowPartnerEvents => "FOLLOW_PARTNER_EVENTS",
            JobType::NotifyPartnerAppointments => "NOTIFY_PARTNER_APPOINTMENTS",
            JobType::MonitorJobs => "MONITOR_JOBS",
            JobType::CleanupJobs => "CLEANUP_JOBS",
            JobType::Fake => "FAKE",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self> {
        JobType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| PlannerError::Serialization(format!("未知的任务类型: {s}")))
    }
}

/// 待调度的任务
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    #[serde(rename = "type")]
    pub job_type: JobType,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub execution_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff_ms: Option<u64>,
    /// 数值越小优先级越高
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
}

impl Job {
    pub fn new(job_type: JobType, execution_time: DateTime<Utc>, payload: serde_json::Value) -> Self {
        Self {
            job_type,
            payload,
            execution_time,
            id: None,
            attempts: None,
            backoff_ms: None,
            priority: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = Some(attempts);
        self
    }

    pub fn with_backoff_ms(mut self, backoff_ms: u64) -> Self {
        self.backoff_ms = Some(backoff_ms);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// 最大尝试次数，至少为1
    pub fn max_attempts(&self) -> u32 {
        self.attempts.unwrap_or(1).max(1)
    }

    pub fn effective_priority(&self) -> i32 {
        self.priority.unwrap_or(0)
    }
}

/// 队列中任务的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// 等待执行时间到达
    Delayed,
    /// 已被消费者取出
    Active,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Delayed => "delayed",
            JobState::Active => "active",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    /// 是否仍然占用任务ID
    pub fn is_pending(&self) -> bool {
        matches!(self, JobState::Delayed | JobState::Active)
    }

    pub fn is_finished(&self) -> bool {
        !self.is_pending()
    }
}

impl FromStr for JobState {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "delayed" => Ok(JobState::Delayed),
            "active" => Ok(JobState::Active),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            _ => Err(PlannerError::Serialization(format!("未知的任务状态: {s}"))),
        }
    }
}

/// 存储在队列中的任务实例
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedJob {
    pub id: String,
    pub job: Job,
    pub state: JobState,
    pub attempts_made: u32,
    pub enqueued_at: DateTime<Utc>,
    /// 最近一次被取出的时间，仅 Active 状态有值
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl QueuedJob {
    pub fn new(id: String, mut job: Job, now: DateTime<Utc>) -> Self {
        job.id = Some(id.clone());
        Self {
            id,
            job,
            state: JobState::Delayed,
            attempts_made: 0,
            enqueued_at: now,
            started_at: None,
            finished_at: None,
            last_error: None,
        }
    }

    pub fn job_type(&self) -> JobType {
        self.job.job_type
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.state == JobState::Delayed && self.job.execution_time <= now
    }

    pub fn has_attempts_left(&self) -> bool {
        self.attempts_made < self.job.max_attempts()
    }

    /// 是否在 `started_before` 之前被取出后一直未结束
    pub fn is_stalled(&self, started_before: DateTime<Utc>) -> bool {
        self.state == JobState::Active && self.started_at.map_or(true, |at| at < started_before)
    }
}

/// 回收超时任务时写入的错误信息
pub const STALLED_JOB_ERROR: &str = "任务执行超时，已回收";

/// 超时任务回收结果
///
/// 取出时已计入一次尝试；仍有剩余尝试次数的任务重新进入 Delayed，其余标记为 Failed。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StalledJobs {
    pub requeued: Vec<String>,
    pub failed: Vec<String>,
}

impl StalledJobs {
    pub fn is_empty(&self) -> bool {
        self.requeued.is_empty() && self.failed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.requeued.len() + self.failed.len()
    }
}

/// 任务ID是否匹配模式
///
/// 模式中的 `*` 为通配符；其余部分按顺序作为子串匹配，不锚定首尾。
pub fn id_matches_pattern(id: &str, pattern: &str) -> bool {
    let mut rest = id;
    for part in pattern.split('*').filter(|p| !p.is_empty()) {
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }
    true
}
