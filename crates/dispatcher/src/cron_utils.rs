use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use cron::{Schedule, TimeUnitSpec};
use std::str::FromStr;
use tracing::debug;

use planner_core::{PlannerError, Result};

/// CRON表达式解析和调度工具
///
/// 支持5字段Unix格式（自动补齐秒字段）以及6/7字段格式，按指定时区计算触发时间。
#[derive(Debug, Clone)]
pub struct CronScheduler {
    schedule: Schedule,
    timezone: Tz,
}

impl CronScheduler {
    /// 创建UTC时区的CRON调度器
    pub fn new(cron_expr: &str) -> Result<Self> {
        Self::with_timezone(cron_expr, "UTC")
    }

    /// 创建指定时区的CRON调度器
    pub fn with_timezone(cron_expr: &str, timezone: &str) -> Result<Self> {
        let timezone: Tz = timezone
            .parse()
            .map_err(|_| PlannerError::InvalidTimezone(timezone.to_string()))?;
        let normalized = Self::normalize_expression(cron_expr);
        let schedule = Schedule::from_str(&normalized).map_err(|e| PlannerError::InvalidCron {
            expr: cron_expr.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self { schedule, timezone })
    }

    /// 5字段表达式前补 `0` 秒字段
    pub fn normalize_expression(cron_expr: &str) -> String {
        let trimmed = cron_expr.trim();
        if trimmed.split_whitespace().count() == 5 {
            format!("0 {trimmed}")
        } else {
            trimmed.to_string()
        }
    }

    /// 验证CRON表达式是否有效
    pub fn validate_cron_expression(cron_expr: &str) -> Result<()> {
        Self::new(cron_expr).map(|_| ())
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// 获取下一次执行时间
    pub fn next_execution_time(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule
            .after(&from.with_timezone(&self.timezone))
            .next()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// 获取从指定时间开始的多个执行时间
    pub fn upcoming_times(&self, from: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        self.schedule
            .after(&from.with_timezone(&self.timezone))
            .take(count)
            .map(|dt| dt.with_timezone(&Utc))
            .collect()
    }

    /// 区间 (after, until] 内的全部触发时间
    pub fn firings_between(&self, after: DateTime<Utc>, until: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        let firings: Vec<DateTime<Utc>> = self
            .schedule
            .after(&after.with_timezone(&self.timezone))
            .map(|dt| dt.with_timezone(&Utc))
            .take_while(|dt| *dt <= until)
            .collect();
        if !firings.is_empty() {
            debug!(
                "区间 {} - {} 内触发 {} 次",
                after.format("%Y-%m-%d %H:%M:%S UTC"),
                until.format("%Y-%m-%d %H:%M:%S UTC"),
                firings.len()
            );
        }
        firings
    }

    /// 每天预期触发次数：秒、分、时三个字段基数的乘积
    pub fn expected_runs_per_day(&self) -> u64 {
        u64::from(self.schedule.seconds().count())
            * u64::from(self.schedule.minutes().count())
            * u64::from(self.schedule.hours().count())
    }

    /// 计算下次执行时间距离现在的时长
    pub fn time_until_next_execution(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.next_execution_time(now).map(|next| next - now)
    }
}
