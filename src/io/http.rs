//! Outbound HTTP - pooled reqwest client with linear backoff retries
//!
//! Every upstream GET goes through `FetchText::get_text`, which retries
//! transport errors and non-2xx statuses alike. Body parsing happens after
//! the retry loop, so a malformed reply is never re-requested.

use crate::io::error::LookupError;
use async_trait::async_trait;
use rand::Rng;
use reqwest::Url;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// User agent sent to every upstream
pub const USER_AGENT: &str = "HeadOfficeLocator/0.1";

/// Linear backoff: after failed attempt `n`, wait `base_delay * n + jitter`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { attempts: 3, base_delay: Duration::from_millis(400), max_jitter: Duration::from_millis(150) }
    }
}

impl RetryPolicy {
    pub fn with_base_delay(base_delay: Duration) -> Self {
        Self { base_delay, ..Self::default() }
    }

    /// Delay before the attempt following failed attempt `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 { 0 } else { rand::rng().random_range(0..=jitter_ms) };
        self.base_delay * attempt + Duration::from_millis(jitter)
    }
}

/// Run `op` up to `policy.attempts` times, sleeping between failures.
/// The last attempt's error is returned.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    endpoint: &'static str,
    mut op: F,
) -> Result<T, LookupError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LookupError>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= attempts => {
                warn!(endpoint = %endpoint, attempts = attempt, error = %e, "upstream_retries_exhausted");
                return Err(e);
            }
            Err(e) => {
                let delay = policy.delay_after(attempt);
                debug!(
                    endpoint = %endpoint,
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "upstream_attempt_failed"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// A GET request against an upstream JSON API
#[derive(Debug, Clone)]
pub struct TextRequest {
    /// Short name used in logs and error messages
    pub endpoint: &'static str,
    pub url: Url,
    pub headers: Vec<(&'static str, String)>,
    pub retry: RetryPolicy,
}

impl TextRequest {
    pub fn new(endpoint: &'static str, url: Url, retry: RetryPolicy) -> Self {
        Self { endpoint, url, headers: Vec::new(), retry }
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}

/// Fetches response bodies from upstream services
#[async_trait]
pub trait FetchText: Send + Sync {
    /// GET the request URL, retrying per its policy, and return the body of
    /// the first 2xx reply
    async fn get_text(&self, request: &TextRequest) -> Result<String, LookupError>;
}

/// reqwest-backed fetcher, one per process for connection pooling
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).user_agent(USER_AGENT).build()?;
        Ok(Self { client })
    }

    async fn get_once(&self, request: &TextRequest) -> Result<String, LookupError> {
        let mut builder = self.client.get(request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }

        let response =
            builder.send().await.map_err(|e| LookupError::network(request.endpoint, e))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response
                .text()
                .await
                .ok()
                .and_then(|body| serde_json::from_str::<Value>(&body).ok())
                .and_then(|value| str_field(&value, "error").map(str::to_string));
            return Err(LookupError::Status {
                endpoint: request.endpoint,
                status: status.as_u16(),
                detail,
            });
        }
        response.text().await.map_err(|e| LookupError::network(request.endpoint, e))
    }
}

#[async_trait]
impl FetchText for HttpClient {
    async fn get_text(&self, request: &TextRequest) -> Result<String, LookupError> {
        with_retry(&request.retry, request.endpoint, || self.get_once(request)).await
    }
}

/// Join a base URL and path, then append query pairs (percent-encoded)
pub fn build_url(base: &str, path: &str, query: &[(&str, &str)]) -> Result<Url, LookupError> {
    let joined = format!("{}{}", base.trim_end_matches('/'), path);
    let mut url = Url::parse(&joined)
        .map_err(|e| LookupError::InvalidConfig(format!("bad base URL '{base}': {e}")))?;
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query.iter().copied());
    }
    Ok(url)
}

/// Parse a JSON body
pub fn parse_json(endpoint: &'static str, body: &str) -> Result<Value, LookupError> {
    serde_json::from_str(body).map_err(|e| LookupError::shape(endpoint, e.to_string()))
}

/// Parse a JSON body that may be wrapped in a JSONP callback, e.g. `callback({...})`
pub fn parse_jsonp(endpoint: &'static str, body: &str) -> Result<Value, LookupError> {
    let trimmed = body.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return parse_json(endpoint, trimmed);
    }

    let inner = trimmed
        .find('(')
        .and_then(|open| {
            let end = trimmed.trim_end_matches(';').trim_end();
            end.strip_suffix(')').map(|s| &s[open + 1..])
        })
        .ok_or_else(|| LookupError::shape(endpoint, "body is neither JSON nor JSONP"))?;
    parse_json(endpoint, inner)
}

/// Non-empty string field from a JSON object
pub fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty())
}

/// String-or-number field rendered as a string (ABNs and postcodes come as either)
pub fn text_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
