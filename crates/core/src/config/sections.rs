use std::time::Duration;

use anyhow::Result;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `sqlite://...` 或 `memory`（使用内存存储）
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://planner.db?mode=rwc".to_string(),
            max_connections: 5,
        }
    }
}

impl DatabaseConfig {
    pub fn is_in_memory(&self) -> bool {
        self.url == "memory"
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(anyhow::anyhow!("数据库URL不能为空"));
        }
        if !self.is_in_memory() && !self.url.starts_with("sqlite:") {
            return Err(anyhow::anyhow!("数据库URL必须是SQLite格式或 memory"));
        }
        if self.max_connections == 0 {
            return Err(anyhow::anyhow!("最大连接数必须大于0"));
        }
        Ok(())
    }
}

/// Worker配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub worker_id: String,
    /// 并发消费者数量
    pub concurrency: usize,
    pub poll_interval_ms: u64,
    /// 关闭时等待进行中任务的最长时间
    pub shutdown_timeout_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: "worker-001".to_string(),
            concurrency: 1,
            poll_interval_ms: 1000,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl WorkerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.worker_id.is_empty() {
            return Err(anyhow::anyhow!("Worker ID不能为空"));
        }
        if self.concurrency == 0 {
            return Err(anyhow::anyhow!("并发消费者数量必须大于0"));
        }
        if self.poll_interval_ms == 0 {
            return Err(anyhow::anyhow!("轮询间隔必须大于0"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// 调度器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// 周期任务检查间隔
    pub cron_tick_interval_seconds: u64,
    /// 已结束任务保留天数
    pub completed_job_retention_days: i64,
    /// 执行记录保留天数
    pub execution_record_retention_days: i64,
    /// 执行中任务的租期，超出后由周期任务触发器回收
    pub stalled_job_lease_seconds: u64,
    /// 周期任务默认时区
    pub timezone: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cron_tick_interval_seconds: 10,
            completed_job_retention_days: 7,
            execution_record_retention_days: 3,
            stalled_job_lease_seconds: 3600,
            timezone: "Europe/Paris".to_string(),
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.cron_tick_interval_seconds == 0 {
            return Err(anyhow::anyhow!("周期任务检查间隔必须大于0"));
        }
        if self.completed_job_retention_days <= 0 || self.execution_record_retention_days <= 0 {
            return Err(anyhow::anyhow!("保留天数必须大于0"));
        }
        if self.stalled_job_lease_seconds == 0 {
            return Err(anyhow::anyhow!("执行中任务租期必须大于0"));
        }
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("无效的时区 {}: {e}", self.timezone))?;
        Ok(())
    }
}

/// 合作方接口配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PartnerConfig {
    pub base_url: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub request_timeout_seconds: u64,
    /// 每页受益人数量
    pub notification_page_size: usize,
    /// 两页之间的固定间隔
    pub page_pause_ms: u64,
    /// 收到429后的等待时间
    pub rate_limit_backoff_ms: u64,
}

impl Default for PartnerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8090".to_string(),
            token_url: "http://localhost:8090/oauth/token".to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            request_timeout_seconds: 10,
            notification_page_size: 100,
            page_pause_ms: 1000,
            rate_limit_backoff_ms: 10_000,
        }
    }
}

impl PartnerConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(anyhow::anyhow!("合作方地址必须是HTTP(S)格式"));
        }
        if !(20..=100).contains(&self.notification_page_size) {
            return Err(anyhow::anyhow!("通知分页大小必须在20到100之间"));
        }
        if self.request_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("请求超时时间必须大于0"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// 功能开关
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    /// 对账器是否推送合作方预约通知
    pub notify_partner_appointments: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            notify_partner_appointments: true,
        }
    }
}

/// 可观测性配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    /// json 或 pretty
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl ObservabilityConfig {
    pub fn validate(&self) -> Result<()> {
        if !["trace", "debug", "info", "warn", "error"].contains(&self.log_level.as_str()) {
            return Err(anyhow::anyhow!("无效的日志级别: {}", self.log_level));
        }
        if !["json", "pretty"].contains(&self.log_format.as_str()) {
            return Err(anyhow::anyhow!("不支持的日志格式: {}", self.log_format));
        }
        Ok(())
    }
}
