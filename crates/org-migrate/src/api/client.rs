//! REST + GraphQL transport client for one platform instance.

use reqwest::header::{HeaderMap, ACCEPT, RETRY_AFTER, USER_AGENT};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::InstanceConfig;
use crate::error::{MigrateError, Result};

const MEDIA_TYPE: &str = "application/vnd.github+json";
const AGENT: &str = concat!("org-migrate/", env!("CARGO_PKG_VERSION"));

/// Response from a platform API call.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

/// HTTP client bound to exactly one platform instance.
///
/// The bearer token is fixed at construction; source and target credentials
/// can never be interchanged because each client holds only its own.
pub struct RestClient {
    http: reqwest::Client,
    api_url: String,
    graphql_url: String,
    token: String,
    /// Organization this client's token is scoped to.
    pub org: String,
}

impl RestClient {
    /// Build a client for one instance, routing through its proxy if set.
    pub fn new(instance: &InstanceConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(120));
        if let Some(ref proxy) = instance.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }

        Ok(Self {
            http: builder.build()?,
            api_url: instance.api_url.trim_end_matches('/').to_string(),
            graphql_url: instance.graphql_url.clone(),
            token: instance.token.clone(),
            org: instance.org.clone(),
        })
    }

    /// Perform a REST call. Non-2xx responses are errors carrying the HTTP
    /// status and response body.
    ///
    /// On a quota-exhaustion signal the call is retried exactly once after
    /// the server-specified delay; a second exhaustion surfaces as
    /// [`MigrateError::RateLimitExhausted`]. Abuse-detection signals are
    /// logged and never retried.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<ApiResponse> {
        let response = self.request_unchecked(method, path, body).await?;
        if (200..300).contains(&response.status) {
            Ok(response)
        } else {
            Err(MigrateError::api(response.status, response.body.to_string()))
        }
    }

    /// Like [`request`](Self::request) but returns non-2xx responses instead
    /// of erroring. Existence probes need the 404 back.
    pub async fn request_unchecked(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<ApiResponse> {
        let url = self.url(path);
        let (status, headers, payload) = self.send_once(method.clone(), &url, body).await?;

        if !is_quota_exhausted(status, &headers) {
            return Ok(ApiResponse {
                status: status.as_u16(),
                body: payload,
            });
        }

        if is_abuse_signal(&payload) {
            // Retrying an abuse-detection response would amplify the abuse.
            warn!("abuse detection triggered for {}, not retrying", url);
            return Ok(ApiResponse {
                status: status.as_u16(),
                body: payload,
            });
        }

        let delay = retry_delay(&headers);
        warn!(
            "rate limit exhausted for {}, retrying once in {}s",
            url,
            delay.as_secs()
        );
        tokio::time::sleep(delay).await;

        let (status, headers, payload) = self.send_once(method, &url, body).await?;
        if is_quota_exhausted(status, &headers) {
            return Err(MigrateError::RateLimitExhausted { url });
        }

        Ok(ApiResponse {
            status: status.as_u16(),
            body: payload,
        })
    }

    /// GET helper.
    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.request(Method::GET, path, None).await
    }

    /// POST helper.
    pub async fn post(&self, path: &str, body: &Value) -> Result<ApiResponse> {
        self.request(Method::POST, path, Some(body)).await
    }

    /// PUT helper.
    pub async fn put(&self, path: &str, body: &Value) -> Result<ApiResponse> {
        self.request(Method::PUT, path, Some(body)).await
    }

    /// PATCH helper.
    pub async fn patch(&self, path: &str, body: &Value) -> Result<ApiResponse> {
        self.request(Method::PATCH, path, Some(body)).await
    }

    /// Existence probe: 404 means "not found", not an error, and is never
    /// logged above debug. Any other non-2xx is surfaced as a failure.
    pub async fn exists(&self, path: &str) -> Result<bool> {
        let response = self.request_unchecked(Method::GET, path, None).await?;
        match response.status {
            200..=299 => Ok(true),
            404 => {
                debug!("not found: {}", path);
                Ok(false)
            }
            status => Err(MigrateError::api(status, response.body.to_string())),
        }
    }

    /// Execute a GraphQL query and return the `data` field.
    pub async fn graphql(&self, query: &str, variables: Value) -> Result<Value> {
        let body = json!({ "query": query, "variables": variables });
        let (status, headers, payload) = self
            .send_once(Method::POST, &self.graphql_url, Some(&body))
            .await?;

        let payload = if is_quota_exhausted(status, &headers) && !is_abuse_signal(&payload) {
            let delay = retry_delay(&headers);
            warn!(
                "rate limit exhausted for {}, retrying once in {}s",
                self.graphql_url,
                delay.as_secs()
            );
            tokio::time::sleep(delay).await;
            let (status, headers, payload) = self
                .send_once(Method::POST, &self.graphql_url, Some(&body))
                .await?;
            if is_quota_exhausted(status, &headers) {
                return Err(MigrateError::RateLimitExhausted {
                    url: self.graphql_url.clone(),
                });
            }
            if !status.is_success() {
                return Err(MigrateError::api(status.as_u16(), payload.to_string()));
            }
            payload
        } else if !status.is_success() {
            return Err(MigrateError::api(status.as_u16(), payload.to_string()));
        } else {
            payload
        };

        if let Some(errors) = payload.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                return Err(MigrateError::GraphQl(Value::Array(errors.clone()).to_string()));
            }
        }

        Ok(payload.get("data").cloned().unwrap_or(Value::Null))
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<(StatusCode, HeaderMap, Value)> {
        let mut request = self
            .http
            .request(method, url)
            .bearer_auth(&self.token)
            .header(ACCEPT, MEDIA_TYPE)
            .header(USER_AGENT, AGENT);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await?;

        let payload = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        Ok((status, headers, payload))
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.api_url, path)
        }
    }
}

/// A quota-exhaustion signal: 403/429 with the remaining-quota header at zero
/// or an explicit retry-after.
fn is_quota_exhausted(status: StatusCode, headers: &HeaderMap) -> bool {
    if status != StatusCode::FORBIDDEN && status != StatusCode::TOO_MANY_REQUESTS {
        return false;
    }
    let remaining_zero = headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == "0")
        .unwrap_or(false);
    remaining_zero || headers.contains_key(RETRY_AFTER)
}

fn is_abuse_signal(body: &Value) -> bool {
    body.get("message")
        .and_then(Value::as_str)
        .map(|m| {
            let m = m.to_lowercase();
            m.contains("secondary rate limit") || m.contains("abuse")
        })
        .unwrap_or(false)
}

/// Server-specified delay before the single retry: `retry-after` seconds, or
/// the time until `x-ratelimit-reset`, or 60s when neither is present.
fn retry_delay(headers: &HeaderMap) -> Duration {
    if let Some(seconds) = headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
    {
        return Duration::from_secs(seconds);
    }

    if let Some(reset) = headers
        .get("x-ratelimit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
    {
        let now = chrono::Utc::now().timestamp();
        return Duration::from_secs((reset - now).max(0) as u64);
    }

    Duration::from_secs(60)
}
