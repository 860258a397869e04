//! Base-URL aware transport that reports failures as values.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of one request.
///
/// - success: `status` and `data` are set (`data` falls back to the raw text
///   when the body is not JSON)
/// - HTTP error status: `status` and `error` are set
/// - connection or timeout failure: only `error` is set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpResult {
    pub status: Option<u16>,
    pub data: Option<Value>,
    pub error: Option<String>,
}

impl HttpResult {
    pub fn is_ok(&self) -> bool {
        self.status == Some(200)
    }

    pub fn error_message(&self) -> String {
        self.error.clone().unwrap_or_default()
    }
}

#[derive(Clone)]
pub struct HttpClient {
    base_url: Option<String>,
    headers: HeaderMap,
    client: Client,
}

impl HttpClient {
    pub fn new(base_url: Option<String>) -> Self {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: Option<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                Client::new()
            });
        Self {
            base_url,
            headers: HeaderMap::new(),
            client,
        }
    }

    /// Adds a header sent with every request. Invalid names or values are
    /// logged and ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "ignoring invalid header"),
        }
        self
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Joins `path` onto the base URL with exactly one slash between them.
    pub fn build_url(&self, path: &str) -> String {
        match &self.base_url {
            Some(base) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                path.trim_start_matches('/')
            ),
            None => path.to_string(),
        }
    }

    pub async fn get(&self, path: &str, query: &[(&str, &str)]) -> HttpResult {
        let url = self.build_url(path);
        tracing::debug!(url = %url, ?query, "GET");
        self.send(self.client.request(Method::GET, url).query(query))
            .await
    }

    pub async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> HttpResult {
        let url = self.build_url(path);
        tracing::debug!(url = %url, "POST");
        self.send(self.client.request(Method::POST, url).json(body))
            .await
    }

    pub async fn put_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> HttpResult {
        let url = self.build_url(path);
        tracing::debug!(url = %url, "PUT");
        self.send(self.client.request(Method::PUT, url).json(body))
            .await
    }

    pub async fn delete(&self, path: &str) -> HttpResult {
        let url = self.build_url(path);
        tracing::debug!(url = %url, "DELETE");
        self.send(self.client.request(Method::DELETE, url)).await
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> HttpResult {
        let response = match request.headers(self.headers.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                return HttpResult {
                    status: e.status().map(|s| s.as_u16()),
                    data: None,
                    error: Some(e.to_string()),
                }
            }
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                return HttpResult {
                    status: Some(status.as_u16()),
                    data: None,
                    error: Some(e.to_string()),
                }
            }
        };

        if !status.is_success() {
            let detail = if text.is_empty() {
                status.to_string()
            } else {
                format!("{}: {}", status, text)
            };
            return HttpResult {
                status: Some(status.as_u16()),
                data: None,
                error: Some(detail),
            };
        }

        let data = serde_json::from_str(&text).unwrap_or(Value::String(text));
        HttpResult {
            status: Some(status.as_u16()),
            data: Some(data),
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url_single_slash() {
        let client = HttpClient::new(Some("http://localhost:9527/".to_string()));
        assert_eq!(client.build_url("/health"), "http://localhost:9527/health");
        assert_eq!(client.build_url("health"), "http://localhost:9527/health");

        let nested = HttpClient::new(Some("https://api.example.com/v1".to_string()));
        assert_eq!(nested.build_url("/rerank"), "https://api.example.com/v1/rerank");
    }

    #[test]
    fn test_build_url_without_base() {
        let client = HttpClient::new(None);
        assert_eq!(client.build_url("http://x/y"), "http://x/y");
    }

    #[tokio::test]
    async fn test_connection_failure_has_no_status() {
        // Port 9 (discard) on localhost is not expected to accept HTTP
        let client = HttpClient::with_timeout(
            Some("http://127.0.0.1:9".to_string()),
            Duration::from_millis(500),
        );
        let result = client.get("/health", &[]).await;
        assert_eq!(result.status, None);
        assert!(result.error.is_some());
    }
}
