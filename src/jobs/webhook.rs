//! Webhook execution.
//!
//! One HTTP request per [`WebhookConfig`], bounded by the configured timeout
//! (or the executor default) and an optional caller deadline.

use std::time::Duration;

use reqwest::Url;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use tokio::time::Instant;

use crate::jobs::error::{JobError, JobResult};
use crate::models::WebhookConfig;

/// Timeout applied when a webhook does not set its own
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const REDACTED_HEADERS: &[&str] = &["authorization"];

/// Issues webhook requests over a shared, pooled HTTP client
#[derive(Debug, Clone)]
pub struct WebhookExecutor {
    client: reqwest::Client,
    default_timeout: Duration,
}

impl WebhookExecutor {
    /// Build an executor with its own connection pool
    pub fn new(default_timeout: Duration) -> JobResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .zstd(true)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            default_timeout,
        })
    }

    /// Timeout for `config`, clamped to whatever is left before `deadline`
    fn effective_timeout(&self, config: &WebhookConfig, deadline: Option<Instant>) -> Duration {
        let timeout = if config.timeout_seconds > 0 {
            Duration::from_secs(config.timeout_seconds)
        } else {
            self.default_timeout
        };

        match deadline {
            Some(deadline) => timeout.min(deadline.saturating_duration_since(Instant::now())),
            None => timeout,
        }
    }

    /// Send the request described by `config` and return the response body.
    ///
    /// # Errors
    /// - [`JobError::InvalidRequest`] for an unparsable URL or header, before
    ///   anything is sent
    /// - [`JobError::WebhookTransport`] for connection, DNS and timeout failures
    /// - [`JobError::WebhookStatus`] when the response status is 400 or above
    pub async fn execute(
        &self,
        config: &WebhookConfig,
        deadline: Option<Instant>,
    ) -> JobResult<String> {
        let url = Url::parse(&config.url)
            .map_err(|e| JobError::InvalidRequest(format!("invalid URL '{}': {e}", config.url)))?;
        let timeout = self.effective_timeout(config, deadline);
        let mut request = self
            .client
            .request(config.method.into(), url)
            .timeout(timeout)
            .headers(request_headers(config)?);

        if !config.body.is_empty() {
            if config.header(CONTENT_TYPE.as_str()).is_none() {
                request = request.header(CONTENT_TYPE, "application/json");
            }
            tracing::debug!(body = %config.body, "Webhook request body");
            request = request.body(config.body.clone());
        }

        tracing::info!(
            method = %config.method,
            url = %config.url,
            timeout_secs = timeout.as_secs_f64(),
            "Executing webhook"
        );

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.as_u16() >= 400 {
            return Err(JobError::WebhookStatus {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(status = status.as_u16(), response = %body, "Webhook succeeded");
        Ok(body)
    }
}

fn request_headers(config: &WebhookConfig) -> JobResult<HeaderMap> {
    let mut headers = HeaderMap::with_capacity(config.headers.len());
    for (key, value) in &config.headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| JobError::InvalidRequest(format!("invalid header name '{key}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| JobError::InvalidRequest(format!("invalid value for header '{key}': {e}")))?;

        let shown = if REDACTED_HEADERS.contains(&name.as_str()) {
            "***"
        } else {
            value.to_str().unwrap_or("<binary>")
        };
        tracing::debug!(header = %name, value = %shown, "Webhook header");
        headers.append(name, value);
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HttpMethod;
    use std::collections::BTreeMap;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn executor() -> WebhookExecutor {
        WebhookExecutor::new(DEFAULT_TIMEOUT).unwrap()
    }

    fn config(url: String, method: HttpMethod) -> WebhookConfig {
        WebhookConfig {
            url,
            method,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_get_returns_full_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"status\":\"ok\"}"))
            .expect(1)
            .mount(&server)
            .await;

        let body = executor()
            .execute(&config(format!("{}/status", server.uri()), HttpMethod::Get), None)
            .await
            .unwrap();
        assert_eq!(body, "{\"status\":\"ok\"}");
    }

    #[tokio::test]
    async fn test_post_defaults_content_type_to_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("content-type", "application/json"))
            .and(body_string("{\"a\":1}"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut webhook = config(format!("{}/hook", server.uri()), HttpMethod::Post);
        webhook.body = "{\"a\":1}".to_string();
        executor().execute(&webhook, None).await.unwrap();
    }

    #[tokio::test]
    async fn test_explicit_headers_are_kept() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("content-type", "text/plain"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let mut webhook = config(server.uri(), HttpMethod::Post);
        webhook.body = "plain".to_string();
        webhook.headers = BTreeMap::from([
            ("Content-Type".to_string(), "text/plain".to_string()),
            ("Authorization".to_string(), "Bearer secret".to_string()),
        ]);
        let body = executor().execute(&webhook, None).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_error_status_carries_code_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let result = executor()
            .execute(&config(server.uri(), HttpMethod::Get), None)
            .await;
        match result {
            Err(JobError::WebhookStatus { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("Expected WebhookStatus, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let mut webhook = config(server.uri(), HttpMethod::Get);
        webhook.timeout_seconds = 1;
        let result = executor().execute(&webhook, None).await;
        assert!(matches!(result, Err(JobError::WebhookTransport(_))));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let result = executor()
            .execute(&config("http://127.0.0.1:1/".to_string(), HttpMethod::Get), None)
            .await;
        assert!(matches!(result, Err(JobError::WebhookTransport(_))));
    }

    #[tokio::test]
    async fn test_malformed_request_is_rejected_before_sending() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let result = executor()
            .execute(&config("not a url".to_string(), HttpMethod::Post), None)
            .await;
        assert!(matches!(result, Err(JobError::InvalidRequest(_))));

        let mut webhook = config(server.uri(), HttpMethod::Post);
        webhook.headers = BTreeMap::from([("Bad Header".to_string(), "x".to_string())]);
        let result = executor().execute(&webhook, None).await;
        assert!(matches!(result, Err(JobError::InvalidRequest(_))));

        webhook.headers = BTreeMap::from([("X-Note".to_string(), "line\nbreak".to_string())]);
        let result = executor().execute(&webhook, None).await;
        assert!(matches!(result, Err(JobError::InvalidRequest(_))));
    }

    #[test]
    fn test_effective_timeout() {
        let executor = WebhookExecutor::new(Duration::from_secs(30)).unwrap();
        let mut webhook = WebhookConfig::default();
        assert_eq!(executor.effective_timeout(&webhook, None), Duration::from_secs(30));

        webhook.timeout_seconds = 5;
        assert_eq!(executor.effective_timeout(&webhook, None), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_deadline_clamps_timeout() {
        let executor = WebhookExecutor::new(Duration::from_secs(30)).unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        let timeout = executor.effective_timeout(&WebhookConfig::default(), Some(deadline));
        assert!(timeout <= Duration::from_secs(2));
    }
}
