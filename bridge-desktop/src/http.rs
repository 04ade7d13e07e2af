//! `HttpClient` over `reqwest`.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy},
};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Outcome of a single attempt.
enum Attempt {
    Done(HttpResponse),
    Retry(BridgeError),
}

/// Desktop HTTP client with connection pooling and rustls.
///
/// Transport errors, `429` and `5xx` are retried according to the configured
/// [`RetryPolicy`]; every other status is returned to the caller as is.
pub struct ReqwestHttpClient {
    client: Client,
    policy: RetryPolicy,
}

impl ReqwestHttpClient {
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(60))
    }

    /// Client whose requests give up after `timeout` in total.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("media-cache-core/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                BridgeError::OperationFailed(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            policy: RetryPolicy::default(),
        }
    }

    /// Replace the retry policy used by [`HttpClient::execute`].
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn convert_method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Head => reqwest::Method::HEAD,
        }
    }

    fn build_request(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(Self::convert_method(request.method), &request.url);

        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        builder
    }

    async fn attempt(&self, request: &HttpRequest) -> Result<Attempt> {
        let response = match self.build_request(request).send().await {
            Ok(response) => response,
            Err(e) => {
                let error = if e.is_timeout() {
                    BridgeError::OperationFailed("Request timed out".to_string())
                } else if e.is_connect() {
                    BridgeError::OperationFailed(format!("Connection failed: {}", e))
                } else {
                    BridgeError::OperationFailed(e.to_string())
                };
                return Ok(Attempt::Retry(error));
            }
        };

        let status = response.status().as_u16();
        if status >= 500 || status == 429 {
            return Ok(Attempt::Retry(BridgeError::HttpStatus {
                status,
                url: request.url.clone(),
            }));
        }

        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect();

        // A body cut off mid-transfer is not retried; the caller sees the error
        let body = response
            .bytes()
            .await
            .map_err(|e| BridgeError::OperationFailed(format!("Failed to read body: {}", e)))?;

        Ok(Attempt::Done(HttpResponse {
            status,
            headers,
            body,
        }))
    }

    async fn run(&self, request: HttpRequest, policy: RetryPolicy) -> Result<HttpResponse> {
        let target = without_query(&request.url);
        let attempts = policy.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            debug!(attempt, attempts, url = %target, "Sending HTTP request");

            match self.attempt(&request).await? {
                Attempt::Done(response) => return Ok(response),
                Attempt::Retry(error) => {
                    warn!(attempt, url = %target, error = %error, "HTTP attempt failed");
                    last_error = Some(error);
                }
            }

            if attempt < attempts {
                sleep(policy.delay_for(attempt)).await;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            BridgeError::OperationFailed("All retry attempts exhausted".to_string())
        }))
    }
}

/// URL without query string or fragment, for logging.
fn without_query(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.run(request, self.policy.clone()).await
    }

    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        self.run(request, policy).await
    }
}
