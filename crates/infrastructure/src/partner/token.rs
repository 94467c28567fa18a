use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

/// 提前刷新的安全余量
const REFRESH_MARGIN_SECONDS: i64 = 60;

/// 合作方访问令牌缓存
///
/// 由客户端实例持有，不使用全局状态。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenCache {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl TokenCache {
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    /// 令牌在安全余量之外仍然有效
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now + Duration::seconds(REFRESH_MARGIN_SECONDS)
    }
}

/// OAuth client_credentials 响应
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
}

impl TokenResponse {
    pub(crate) fn into_cache(self, now: DateTime<Utc>) -> TokenCache {
        TokenCache::new(self.access_token, now + Duration::seconds(self.expires_in))
    }
}
