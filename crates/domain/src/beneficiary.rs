use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use planner_core::{PlannerError, Result};

/// 未设置时区的受益人默认按巴黎时间解释合作方时间
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Europe::Paris;

/// 受益人（协作者视图）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Beneficiary {
    pub id: String,
    /// 合作方系统中的受益人ID
    #[serde(default)]
    pub partner_id: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
}

impl Beneficiary {
    pub fn timezone(&self) -> Result<Tz> {
        match &self.timezone {
            None => Ok(DEFAULT_TIMEZONE),
            Some(name) => name
                .parse::<Tz>()
                .map_err(|_| PlannerError::InvalidTimezone(name.clone())),
        }
    }
}
