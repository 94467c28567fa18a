use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use planner_core::config::PartnerConfig;
use planner_core::{Clock, PlannerError, Result, SystemClock};
use planner_domain::{
    EventAction, PartnerAppointmentFetcher, PartnerAppointmentSnapshot, PartnerEvent,
    PartnerEventSource, PartnerNotificationBatch, PartnerNotificationClient, PartnerObjectKind,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use super::token::{TokenCache, TokenResponse};

/// 合作方HTTP客户端
#[derive(Clone)]
pub struct HttpPartnerClient {
    config: PartnerConfig,
    http_client: Client,
    token_cache: Arc<RwLock<Option<TokenCache>>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for HttpPartnerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPartnerClient")
            .field("base_url", &self.config.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpPartnerClient {
    pub fn new(config: PartnerConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| PlannerError::Configuration(format!("创建HTTP客户端失败: {e}")))?;

        Ok(Self {
            config,
            http_client,
            token_cache: Arc::new(RwLock::new(None)),
            clock: Arc::new(SystemClock),
        })
    }

    /// 注入已有令牌
    pub fn with_token_cache(mut self, cache: TokenCache) -> Self {
        self.token_cache = Arc::new(RwLock::new(Some(cache)));
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 获取有效令牌，过期时刷新
    async fn access_token(&self) -> Result<String> {
        let now = self.clock.now();
        {
            let cache = self.token_cache.read().await;
            if let Some(token) = cache.as_ref().filter(|t| t.is_valid_at(now)) {
                return Ok(token.token.clone());
            }
        }

        let mut cache = self.token_cache.write().await;
        if let Some(token) = cache.as_ref().filter(|t| t.is_valid_at(now)) {
            return Ok(token.token.clone());
        }

        debug!("刷新合作方访问令牌");
        let response = self
            .http_client
            .post(&self.config.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PlannerError::partner_api(None, format!("获取令牌失败: {e}")))?;

        let token: TokenResponse = Self::decode(response).await?;
        let fresh = token.into_cache(now);
        let value = fresh.token.clone();
        *cache = Some(fresh);
        Ok(value)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let token = self.access_token().await?;
        request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| PlannerError::partner_api(None, e.to_string()))
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let response = Self::check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| PlannerError::Serialization(format!("解析合作方响应失败: {e}")))
    }

    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_seconds = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            warn!("合作方接口限流, Retry-After: {:?}", retry_after_seconds);
            return Err(PlannerError::RateLimited {
                retry_after_seconds,
            });
        }
        let body = response.text().await.unwrap_or_default();
        Err(PlannerError::partner_api(Some(status.as_u16()), body))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl PartnerAppointmentFetcher for HttpPartnerClient {
    #[instrument(skip(self, event), fields(event_id = %event.id, object_id = %event.object_id))]
    async fn find_by_event(
        &self,
        event: &PartnerEvent,
    ) -> Result<Option<PartnerAppointmentSnapshot>> {
        let collection = match event.action() {
            EventAction::Create(kind) | EventAction::Update(kind) | EventAction::Delete(kind) => {
                match kind {
                    PartnerObjectKind::Appointment => "appointments",
                    PartnerObjectKind::Session => "sessions",
                }
            }
            EventAction::KindNonTreatable | EventAction::ObjectNonTreatable => {
                return Err(PlannerError::NonTreatable(event.id.clone()))
            }
        };

        let url = self.url(&format!(
            "beneficiaries/{}/{}/{}",
            event.partner_beneficiary_id, collection, event.object_id
        ));
        let response = self.send(self.http_client.get(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("合作方对象已不存在");
            return Ok(None);
        }
        Self::decode(response).await.map(Some)
    }
}

#[async_trait]
impl PartnerNotificationClient for HttpPartnerClient {
    async fn get_notifications(
        &self,
        partner_beneficiary_ids: &[String],
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PartnerNotificationBatch>> {
        let request = self.http_client.get(self.url("notifications")).query(&[
            ("beneficiaryIds", partner_beneficiary_ids.join(",")),
            ("from", from.format("%Y-%m-%d").to_string()),
            ("to", to.format("%Y-%m-%d").to_string()),
        ]);
        let response = self.send(request).await?;
        Self::decode(response).await
    }
}

#[async_trait]
impl PartnerEventSource for HttpPartnerClient {
    async fn fetch_pending(&self) -> Result<Vec<PartnerEvent>> {
        let response = self.send(self.http_client.get(self.url("events"))).await?;
        Self::decode(response).await
    }

    async fn acknowledge(&self, event: &PartnerEvent) -> Result<()> {
        let url = self.url(&format!("events/{}", event.id));
        let response = self.send(self.http_client.delete(url)).await?;
        Self::check_status(response).await?;
        Ok(())
    }
}
