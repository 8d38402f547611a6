//! [`GatewayApi`] implementation over the retrying HTTP client

use async_trait::async_trait;
use reqwest::Method;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::GatewayApi;
use crate::config::Config;
use crate::error::ApiError;
use crate::models::envelope::decode;
use crate::models::{CreateListRequest, GatewayList, GatewayRule, RuleRequest};
use crate::sync::ApiHttpClient;

/// Gateway API client
#[derive(Debug)]
pub struct GatewayClient {
    http: ApiHttpClient,
}

impl GatewayClient {
    /// Wrap an existing HTTP client
    pub fn new(http: ApiHttpClient) -> Self {
        Self { http }
    }

    /// Build a client from the application configuration
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        let http = ApiHttpClient::new(
            &config.cloudflare,
            config.retry.clone(),
            config.rate_limit.clone(),
        )?;
        Ok(Self::new(http))
    }

    /// Check the envelope of a response whose payload is not needed
    fn ensure_success(body: &[u8]) -> Result<(), ApiError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }
        decode::<serde_json::Value>(body)?.into_result()?;
        Ok(())
    }
}

#[async_trait]
impl GatewayApi for GatewayClient {
    async fn get_lists(&self, cancel: &CancellationToken) -> Result<Vec<GatewayList>, ApiError> {
        let body = self
            .http
            .request::<()>(Method::GET, "/lists", None, cancel)
            .await?;
        let lists = decode::<Vec<GatewayList>>(&body)?.into_items()?;
        debug!(count = lists.len(), "Fetched lists");
        Ok(lists)
    }

    async fn create_list(
        &self,
        name: &str,
        items: &[String],
        cancel: &CancellationToken,
    ) -> Result<GatewayList, ApiError> {
        let request = CreateListRequest::domains(name, items);
        let body = self
            .http
            .request(Method::POST, "/lists", Some(&request), cancel)
            .await?;

        decode::<GatewayList>(&body)?
            .into_result()?
            .ok_or_else(|| ApiError::Decode(format!("no list returned for {}", name)))
    }

    async fn delete_list(&self, id: &str, cancel: &CancellationToken) -> Result<(), ApiError> {
        let body = self
            .http
            .request::<()>(Method::DELETE, &format!("/lists/{}", id), None, cancel)
            .await?;
        Self::ensure_success(&body)
    }

    async fn get_rules(&self, cancel: &CancellationToken) -> Result<Vec<GatewayRule>, ApiError> {
        let body = self
            .http
            .request::<()>(Method::GET, "/rules", None, cancel)
            .await?;
        let rules = decode::<Vec<GatewayRule>>(&body)?.into_items()?;
        debug!(count = rules.len(), "Fetched rules");
        Ok(rules)
    }

    async fn create_rule(
        &self,
        rule: &RuleRequest,
        cancel: &CancellationToken,
    ) -> Result<(), ApiError> {
        let body = self
            .http
            .request(Method::POST, "/rules", Some(rule), cancel)
            .await?;
        Self::ensure_success(&body)
    }

    async fn update_rule(
        &self,
        id: &str,
        rule: &RuleRequest,
        cancel: &CancellationToken,
    ) -> Result<(), ApiError> {
        let body = self
            .http
            .request(Method::PUT, &format!("/rules/{}", id), Some(rule), cancel)
            .await?;
        Self::ensure_success(&body)
    }

    async fn delete_rule(&self, id: &str, cancel: &CancellationToken) -> Result<(), ApiError> {
        let body = self
            .http
            .request::<()>(Method::DELETE, &format!("/rules/{}", id), None, cancel)
            .await?;
        Self::ensure_success(&body)
    }
}
