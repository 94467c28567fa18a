use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::JobType;

/// 周期任务注册信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronJob {
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub cron_expression: String,
    /// IANA时区名称，如 Europe/Paris
    pub timezone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
}

impl CronJob {
    pub fn new(job_type: JobType, cron_expression: &str, timezone: &str) -> Self {
        Self {
            job_type,
            cron_expression: cron_expression.to_string(),
            timezone: timezone.to_string(),
            start_date: None,
        }
    }

    pub fn starting_at(mut self, start_date: DateTime<Utc>) -> Self {
        self.start_date = Some(start_date);
        self
    }
}
