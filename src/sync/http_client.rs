//! Retrying HTTP client for the gateway API
//!
//! One call to [`ApiHttpClient::request`] is one logical operation: the body
//! is serialized once and every attempt sends the same bytes with the same
//! authentication headers. Attempts are driven by the [`RetryManager`].

use crate::config::{CloudflareConfig, Credentials, RateLimitConfig, RetryConfig};
use crate::error::ApiError;
use crate::sync::retry::RetryManager;
use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// HTTP client for the account-scoped gateway API
///
/// Features:
/// - Bearer token or legacy key/email authentication
/// - Retry with exponential backoff inside a fixed time budget
/// - HTTP 429 handling with Retry-After support
/// - Optional minimum spacing between requests and a concurrency cap
#[derive(Debug)]
pub struct ApiHttpClient {
    client: Client,
    base_url: String,
    credentials: Credentials,
    retry: RetryManager,
    semaphore: Arc<Semaphore>,
    last_request: Mutex<Option<Instant>>,
    limits: RateLimitConfig,
}

impl ApiHttpClient {
    /// Create a client for the account configured in `account`
    pub fn new(
        account: &CloudflareConfig,
        retry: RetryConfig,
        limits: RateLimitConfig,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(limits.request_timeout_secs))
            .build()
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to create HTTP client: {}", e)))?;
        Self::with_client(client, account, retry, limits)
    }

    /// Create a client around an existing reqwest `Client`
    pub fn with_client(
        client: Client,
        account: &CloudflareConfig,
        retry: RetryConfig,
        limits: RateLimitConfig,
    ) -> Result<Self, ApiError> {
        let credentials = account.credentials().ok_or_else(|| {
            ApiError::InvalidRequest("No API token or key/email pair configured".to_string())
        })?;

        Ok(Self {
            client,
            base_url: gateway_base_url(&account.api_host, &account.account_id),
            credentials,
            retry: RetryManager::new(retry),
            semaphore: Arc::new(Semaphore::new(limits.max_concurrent.max(1))),
            last_request: Mutex::new(None),
            limits,
        })
    }

    /// Perform one logical request and return the raw response body
    ///
    /// `path` is relative to the gateway namespace, e.g. `/lists` or
    /// `/rules/<id>`.
    pub async fn request<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        cancel: &CancellationToken,
    ) -> Result<Bytes, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let payload = match body {
            Some(body) => Some(Bytes::from(
                serde_json::to_vec(body).map_err(|e| ApiError::Serialization(e.to_string()))?,
            )),
            None => None,
        };
        let url = self.url_for(path);
        let url = url.as_str();

        self.retry
            .execute(cancel, move || {
                self.send_once(method.clone(), url, payload.clone())
            })
            .await
    }

    /// Single attempt: send, then classify the response
    async fn send_once(
        &self,
        method: Method,
        url: &str,
        body: Option<Bytes>,
    ) -> Result<Bytes, ApiError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| ApiError::Network("HTTP client is shut down".to_string()))?;

        self.wait_for_interval().await;

        let mut builder = self
            .client
            .request(method.clone(), url)
            .header(CONTENT_TYPE, "application/json");
        builder = match &self.credentials {
            Credentials::Token(token) => builder.bearer_auth(token),
            Credentials::GlobalKey { email, key } => builder
                .header("X-Auth-Email", email)
                .header("X-Auth-Key", key),
        };
        if let Some(body) = body {
            builder = builder.body(body);
        }
        let request = builder
            .build()
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

        debug!(method = %method, url = url, "Sending API request");

        let response = self
            .client
            .execute(request)
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());

            warn!(url = url, retry_after = ?retry_after, "Rate limited by API");
            return Err(ApiError::RateLimited(retry_after));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                method = %method,
                url = url,
                status = status.as_u16(),
                "API request failed"
            );
            return Err(ApiError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await.map_err(map_transport_error)?;
        debug!(url = url, body_size = body.len(), "Received response");
        Ok(body)
    }

    /// Keep at least `min_interval_ms` between consecutive requests
    async fn wait_for_interval(&self) {
        if self.limits.min_interval_ms == 0 {
            return;
        }
        let min_interval = Duration::from_millis(self.limits.min_interval_ms);

        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < min_interval {
                tokio::time::sleep(min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Absolute URL for a path inside the gateway namespace
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// `<host>/accounts/<account>/gateway`, tolerant of a trailing slash on the host
fn gateway_base_url(api_host: &str, account_id: &str) -> String {
    format!(
        "{}/accounts/{}/gateway",
        api_host.trim_end_matches('/'),
        account_id
    )
}

fn map_transport_error(e: reqwest::Error) -> ApiError {
    if e.is_builder() {
        ApiError::InvalidRequest(e.to_string())
    } else if e.is_timeout() {
        ApiError::NetworkTimeout
    } else if e.is_connect() {
        ApiError::ConnectionRefused
    } else {
        ApiError::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn account(host: &str) -> CloudflareConfig {
        CloudflareConfig {
            api_token: Some("test-token".to_string()),
            account_id: "acc-1".to_string(),
            api_host: host.to_string(),
            ..Default::default()
        }
    }

    fn retry(max_elapsed_ms: u64) -> RetryConfig {
        RetryConfig {
            initial_backoff_ms: 10,
            max_backoff_ms: 20,
            backoff_multiplier: 2.0,
            jitter: false,
            max_elapsed_ms,
        }
    }

    fn client(host: &str, max_elapsed_ms: u64) -> ApiHttpClient {
        ApiHttpClient::new(&account(host), retry(max_elapsed_ms), RateLimitConfig::default())
            .unwrap()
    }

    // Test 1: GET returns body and sends auth headers
    #[tokio::test]
    async fn test_get_sends_bearer_token() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/accounts/acc-1/gateway/lists"))
            .and(header("Authorization", "Bearer test-token"))
            .and(header("Content-Type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"result\":[]}"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client(&mock_server.uri(), 1000);
        let body = client
            .request::<()>(Method::GET, "/lists", None, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(body, Bytes::from("{\"result\":[]}"));
    }

    // Test 2: Legacy key authentication headers
    #[tokio::test]
    async fn test_legacy_key_headers() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/accounts/acc-1/gateway/rules"))
            .and(header("X-Auth-Email", "me@example.com"))
            .and(header("X-Auth-Key", "global-key"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let account = CloudflareConfig {
            api_key: Some("global-key".to_string()),
            account_email: Some("me@example.com".to_string()),
            account_id: "acc-1".to_string(),
            api_host: mock_server.uri(),
            ..Default::default()
        };
        let client =
            ApiHttpClient::new(&account, retry(1000), RateLimitConfig::default()).unwrap();

        let result = client
            .request::<()>(Method::GET, "/rules", None, &CancellationToken::new())
            .await;
        assert!(result.is_ok());
    }

    // Test 3: Transient 5xx is retried with the same body
    #[tokio::test]
    async fn test_retry_resends_same_body() {
        let mock_server = MockServer::start().await;
        let expected = serde_json::json!({"name": "list", "type": "DOMAIN"});

        Mock::given(method("POST"))
            .and(path("/accounts/acc-1/gateway/lists"))
            .and(body_json(&expected))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .up_to_n_times(1)
            .with_priority(1)
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/accounts/acc-1/gateway/lists"))
            .and(body_json(&expected))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"success\":true}"))
            .with_priority(2)
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client(&mock_server.uri(), 2000);
        let body = client
            .request(Method::POST, "/lists", Some(&expected), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(body, Bytes::from("{\"success\":true}"));
    }

    // Test 4: HTTP 429 without Retry-After surfaces once the budget is spent
    #[tokio::test]
    async fn test_429_without_retry_after() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/accounts/acc-1/gateway/lists"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&mock_server)
            .await;

        let client = client(&mock_server.uri(), 0);
        let result = client
            .request::<()>(Method::GET, "/lists", None, &CancellationToken::new())
            .await;

        assert_eq!(result.unwrap_err(), ApiError::RateLimited(None));
    }

    // Test 5: HTTP 429 carries the Retry-After hint
    #[tokio::test]
    async fn test_429_retry_after_parsed() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/accounts/acc-1/gateway/lists"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "120"))
            .mount(&mock_server)
            .await;

        let client = client(&mock_server.uri(), 1000);
        let result = client
            .request::<()>(Method::GET, "/lists", None, &CancellationToken::new())
            .await;

        assert_eq!(result.unwrap_err(), ApiError::RateLimited(Some(120)));
    }

    // Test 5b: Retry-After beyond any duration gives up without panicking
    #[tokio::test]
    async fn test_429_huge_retry_after() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/accounts/acc-1/gateway/lists"))
            .respond_with(
                ResponseTemplate::new(429).insert_header("Retry-After", "18446744073709551615"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client(&mock_server.uri(), 1000);
        let result = client
            .request::<()>(Method::GET, "/lists", None, &CancellationToken::new())
            .await;

        assert_eq!(result.unwrap_err(), ApiError::RateLimited(Some(u64::MAX)));
    }

    // Test 6: Always-failing call returns the last HTTP error
    #[tokio::test]
    async fn test_5xx_exhausts_budget() {
        let mock_server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/accounts/acc-1/gateway/rules/r1"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&mock_server)
            .await;

        let client = client(&mock_server.uri(), 200);
        let started = Instant::now();
        let result = client
            .request::<()>(Method::DELETE, "/rules/r1", None, &CancellationToken::new())
            .await;

        assert_eq!(
            result.unwrap_err(),
            ApiError::Http {
                status: 503,
                body: "unavailable".to_string()
            }
        );
        assert!(started.elapsed() < Duration::from_secs(2));
        let received = mock_server.received_requests().await.unwrap();
        assert!(received.len() > 1, "expected retries, got {}", received.len());
    }

    // Test 7: HTTP 401 is not retried
    #[tokio::test]
    async fn test_401_not_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/accounts/acc-1/gateway/rules"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client(&mock_server.uri(), 5000);
        let result = client
            .request::<()>(Method::GET, "/rules", None, &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(ApiError::Http { status: 401, .. })));
    }

    // Test 8: Malformed URL fails immediately as a permanent error
    #[tokio::test]
    async fn test_invalid_url_is_permanent() {
        let client = client("http://invalid host", 60_000);
        let started = Instant::now();
        let result = client
            .request::<()>(Method::GET, "/lists", None, &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(ApiError::InvalidRequest(_))));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    // Test 9: Cancelled token stops the call
    #[tokio::test]
    async fn test_cancelled_request() {
        let mock_server = MockServer::start().await;
        let client = client(&mock_server.uri(), 1000);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = client
            .request::<()>(Method::GET, "/lists", None, &cancel)
            .await;

        assert_eq!(result.unwrap_err(), ApiError::Cancelled);
    }

    // Test 10: Base URL tolerates trailing slash
    #[test]
    fn test_gateway_base_url() {
        assert_eq!(
            gateway_base_url("https://api.cloudflare.com/client/v4/", "abc"),
            "https://api.cloudflare.com/client/v4/accounts/abc/gateway"
        );
        assert_eq!(
            gateway_base_url("http://localhost:8080", "abc"),
            "http://localhost:8080/accounts/abc/gateway"
        );
    }

    // Test 11: Missing credentials are rejected at construction
    #[test]
    fn test_missing_credentials() {
        let account = CloudflareConfig {
            account_id: "acc".to_string(),
            ..Default::default()
        };
        let result = ApiHttpClient::new(&account, RetryConfig::default(), RateLimitConfig::default());
        assert!(matches!(result, Err(ApiError::InvalidRequest(_))));
    }

    // Test 12: Request spacing enforces minimum interval
    #[tokio::test]
    async fn test_min_interval_between_requests() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/accounts/acc-1/gateway/lists"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(2)
            .mount(&mock_server)
            .await;

        let client = ApiHttpClient::new(
            &account(&mock_server.uri()),
            retry(1000),
            RateLimitConfig {
                min_interval_ms: 100,
                ..Default::default()
            },
        )
        .unwrap();

        let cancel = CancellationToken::new();
        let started = Instant::now();
        client
            .request::<()>(Method::GET, "/lists", None, &cancel)
            .await
            .unwrap();
        client
            .request::<()>(Method::GET, "/lists", None, &cancel)
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_millis(90));
    }
}
