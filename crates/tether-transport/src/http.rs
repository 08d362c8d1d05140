//! REST client over `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap};
use reqwest::{Client, ClientBuilder, Method, StatusCode};
use serde_json::Value;
use tracing::{debug, info};

use tether_core::model::{ApplicationCommand, InteractionResponse, Message, MessagePayload};
use tether_core::{ApiError, ApiResult, Entity, Id, RestClient, Sendable, TransportError};

use crate::gate::{Attempt, CallGate, RateLimitInfo};

/// Default REST API base.
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// Configuration for [`HttpRestClient`].
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// API base URL without a trailing slash.
    pub api_base: String,
    /// Bot token.
    pub token: String,
    /// Application id, used by the webhook-style interaction endpoints.
    pub application_id: Id,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Attempts before a rate-limited call gives up.
    pub max_rate_limit_attempts: u32,
}

impl HttpClientConfig {
    /// Creates a configuration with default base URL and limits.
    pub fn new(token: impl Into<String>, application_id: Id) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token: token.into(),
            application_id,
            timeout: Duration::from_secs(30),
            max_rate_limit_attempts: 3,
        }
    }

    /// Sets the API base URL.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// [`RestClient`] backed by `reqwest` with a per-route [`CallGate`].
#[derive(Debug)]
pub struct HttpRestClient {
    http: Client,
    config: HttpClientConfig,
    gate: CallGate,
}

impl HttpRestClient {
    /// Builds the client.
    pub fn new(config: HttpClientConfig) -> ApiResult<Self> {
        let http = ClientBuilder::new()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Transport(TransportError::Io(e.to_string())))?;

        info!(api_base = %config.api_base, "REST client ready");

        Ok(Self {
            http,
            gate: CallGate::new(config.max_rate_limit_attempts),
            config,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base, path)
    }

    /// Sends one request through the gate and returns the JSON body
    /// (`Value::Null` for empty bodies).
    async fn execute(
        &self,
        method: Method,
        route: &str,
        path: &str,
        body: Option<Value>,
    ) -> ApiResult<Value> {
        let url = self.url(path);
        let auth = format!("Bot {}", self.config.token);
        let log_path = mask_token(path);
        let log_path = log_path.as_str();

        self.gate
            .call(route, || {
                let mut request = self
                    .http
                    .request(method.clone(), &url)
                    .header(AUTHORIZATION, auth.clone());
                if let Some(body) = &body {
                    request = request.json(body);
                }
                let method = method.as_str();
                async move {
                    debug!(method = %method, path = %log_path, "Sending request");
                    let response = request
                        .send()
                        .await
                        .map_err(|e| ApiError::Request(e.to_string()))?;
                    let status = response.status();
                    let info = rate_limit_info(response.headers());

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        let header_delay = retry_after_header(response.headers());
                        let body: Value = response.json().await.unwrap_or(Value::Null);
                        let delay = retry_after_body(&body)
                            .or(header_delay)
                            .unwrap_or(Duration::from_secs(1));
                        return Ok((Attempt::RetryAfter(delay), info));
                    }

                    let text = response
                        .text()
                        .await
                        .map_err(|e| ApiError::Request(e.to_string()))?;

                    if !status.is_success() {
                        return Err(ApiError::Http {
                            status: status.as_u16(),
                            message: text,
                        });
                    }

                    let value = if text.trim().is_empty() {
                        Value::Null
                    } else {
                        serde_json::from_str(&text)?
                    };
                    Ok((Attempt::Done(value), info))
                }
            })
            .await
    }

    async fn fetch<T: Entity>(
        &self,
        method: Method,
        route: &str,
        path: &str,
        body: Option<Value>,
    ) -> ApiResult<T> {
        let value = self.execute(method, route, path, body).await?;
        T::parse(&value).map_err(|e| ApiError::Decode(e.to_string()))
    }

    fn webhook_path(&self, token: &str) -> String {
        format!("/webhooks/{}/{}", self.config.application_id, token)
    }
}

/// Replaces interaction tokens in a request path so it can be logged.
fn mask_token(path: &str) -> String {
    let mut segments: Vec<&str> = path.split('/').collect();
    for i in 2..segments.len() {
        if matches!(segments[i - 2], "webhooks" | "interactions") {
            segments[i] = ":token";
        }
    }
    segments.join("/")
}

/// Bucket key for token-scoped routes; keeps the token itself out of logs.
fn token_bucket(token: &str) -> u64 {
    use std::hash::{DefaultHasher, Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    token.hash(&mut hasher);
    hasher.finish()
}

fn header_f64(headers: &HeaderMap, name: &str) -> Option<f64> {
    headers.get(name)?.to_str().ok()?.parse().ok()
}

fn rate_limit_info(headers: &HeaderMap) -> RateLimitInfo {
    RateLimitInfo {
        remaining: headers
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok()),
        reset_after: header_f64(headers, "x-ratelimit-reset-after")
            .filter(|s| s.is_finite() && *s >= 0.0)
            .map(Duration::from_secs_f64),
    }
}

fn retry_after_header(headers: &HeaderMap) -> Option<Duration> {
    header_f64(headers, "retry-after")
        .filter(|s| s.is_finite() && *s >= 0.0)
        .map(Duration::from_secs_f64)
}

fn retry_after_body(body: &Value) -> Option<Duration> {
    body.get("retry_after")
        .and_then(Value::as_f64)
        .filter(|s| s.is_finite() && *s >= 0.0)
        .map(Duration::from_secs_f64)
}

#[async_trait]
impl RestClient for HttpRestClient {
    async fn get_gateway_url(&self) -> ApiResult<String> {
        let value = self
            .execute(Method::GET, "GET /gateway/bot", "/gateway/bot", None)
            .await?;
        value
            .get("url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ApiError::Decode("gateway response has no url".into()))
    }

    async fn get_application_command(&self, command_id: Id) -> ApiResult<ApplicationCommand> {
        let path = format!(
            "/applications/{}/commands/{}",
            self.config.application_id, command_id
        );
        self.fetch(Method::GET, "GET /applications/:app/commands/:id", &path, None)
            .await
    }

    async fn get_guild_application_command(
        &self,
        guild_id: Id,
        command_id: Id,
    ) -> ApiResult<ApplicationCommand> {
        let path = format!(
            "/applications/{}/guilds/{}/commands/{}",
            self.config.application_id, guild_id, command_id
        );
        let route = format!("GET /applications/:app/guilds/{guild_id}/commands/:id");
        self.fetch(Method::GET, &route, &path, None).await
    }

    async fn send_interaction_response(
        &self,
        interaction_id: Id,
        token: &str,
        response: &InteractionResponse,
    ) -> ApiResult<()> {
        let path = format!("/interactions/{interaction_id}/{token}/callback");
        let route = format!("POST /interactions/{interaction_id}/callback");
        self.execute(Method::POST, &route, &path, Some(response.to_wire()))
            .await
            .map(|_| ())
    }

    async fn send_followup(&self, token: &str, payload: &MessagePayload) -> ApiResult<Message> {
        let path = format!("{}?wait=true", self.webhook_path(token));
        let route = format!("POST /webhooks/{:x}", token_bucket(token));
        self.fetch(Method::POST, &route, &path, Some(payload.to_wire()))
            .await
    }

    async fn edit_followup(
        &self,
        token: &str,
        message_id: Id,
        payload: &MessagePayload,
    ) -> ApiResult<Message> {
        let path = format!("{}/messages/{message_id}", self.webhook_path(token));
        let route = format!("PATCH /webhooks/{:x}/messages/:id", token_bucket(token));
        self.fetch(Method::PATCH, &route, &path, Some(payload.to_wire()))
            .await
    }

    async fn delete_followup(&self, token: &str, message_id: Id) -> ApiResult<()> {
        let path = format!("{}/messages/{message_id}", self.webhook_path(token));
        let route = format!("DELETE /webhooks/{:x}/messages/:id", token_bucket(token));
        self.execute(Method::DELETE, &route, &path, None)
            .await
            .map(|_| ())
    }

    async fn edit_original(&self, token: &str, payload: &MessagePayload) -> ApiResult<Message> {
        let path = format!("{}/messages/@original", self.webhook_path(token));
        let route = format!("PATCH /webhooks/{:x}/messages/@original", token_bucket(token));
        self.fetch(Method::PATCH, &route, &path, Some(payload.to_wire()))
            .await
    }

    async fn delete_original(&self, token: &str) -> ApiResult<()> {
        let path = format!("{}/messages/@original", self.webhook_path(token));
        let route = format!("DELETE /webhooks/{:x}/messages/@original", token_bucket(token));
        self.execute(Method::DELETE, &route, &path, None)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use serde_json::json;

    #[test]
    fn test_rate_limit_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        headers.insert("x-ratelimit-reset-after", HeaderValue::from_static("1.5"));
        let info = rate_limit_info(&headers);
        assert_eq!(info.remaining, Some(0));
        assert_eq!(info.reset_after, Some(Duration::from_millis(1500)));

        assert_eq!(rate_limit_info(&HeaderMap::new()), RateLimitInfo::default());
    }

    #[test]
    fn test_retry_after_sources() {
        assert_eq!(
            retry_after_body(&json!({"retry_after": 0.25, "global": false})),
            Some(Duration::from_millis(250))
        );
        assert_eq!(retry_after_body(&json!({"message": "x"})), None);

        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("2"));
        assert_eq!(retry_after_header(&headers), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_tokens_are_masked_in_logs() {
        assert_eq!(
            mask_token("/webhooks/1/secret/messages/@original"),
            "/webhooks/1/:token/messages/@original"
        );
        assert_eq!(
            mask_token("/interactions/5/secret/callback"),
            "/interactions/5/:token/callback"
        );
        assert_eq!(mask_token("/gateway/bot"), "/gateway/bot");
        assert_eq!(token_bucket("a"), token_bucket("a"));
    }

    #[test]
    fn test_config_trims_base() {
        let config = HttpClientConfig::new("tok", Id(1)).with_api_base("http://localhost:8080/");
        assert_eq!(config.api_base, "http://localhost:8080");
        let client = HttpRestClient::new(config).unwrap();
        assert_eq!(client.url("/gateway/bot"), "http://localhost:8080/gateway/bot");
    }
}
