use thiserror::Error;

/// 调度与对账系统错误类型定义
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{entity}未找到: {id}")]
    NotFound { entity: String, id: String },

    #[error("不可处理的事件: {0}")]
    NonTreatable(String),

    #[error("合作方接口错误(状态码 {status:?}): {message}")]
    PartnerApi {
        status: Option<u16>,
        message: String,
    },

    #[error("合作方接口限流, 建议等待 {retry_after_seconds:?} 秒")]
    RateLimited { retry_after_seconds: Option<u64> },

    #[error("调度存储不可用: {0}")]
    SchedulingUnavailable(String),

    #[error("无效的CRON表达式: {expr} - {message}")]
    InvalidCron { expr: String, message: String },

    #[error("无效的时区: {0}")]
    InvalidTimezone(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("任务执行错误: {0}")]
    JobExecution(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl PlannerError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn partner_api(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::PartnerApi {
            status,
            message: message.into(),
        }
    }

    /// 是否为合作方限流错误(HTTP 429)
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// 是否值得稍后重试
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database(_) | Self::SchedulingUnavailable(_) | Self::RateLimited { .. } => true,
            Self::PartnerApi { status, .. } => status.map_or(true, |s| s >= 500),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for PlannerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// 统一的Result类型
pub type Result<T> = std::result::Result<T, PlannerError>;
