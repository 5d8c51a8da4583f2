//! HTTP Transport
//!
//! HTTP send primitive shared by the flow helper, token manager, and the
//! authenticating pipeline stage.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{AuthError, AuthResult, NetworkError, ProtocolError};

/// HTTP request definition.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Request URL.
    pub url: String,
    /// Request headers, lowercase keys.
    pub headers: HashMap<String, String>,
    /// Request body.
    pub body: Option<Vec<u8>>,
    /// Per-request timeout override.
    pub timeout: Option<Duration>,
    /// Set when this request is a re-send after a credential refresh. The
    /// marker survives into the cloned request so a request is retried at
    /// most once on 401.
    pub auth_retried: bool,
}

impl HttpRequest {
    /// Create a request with no headers or body.
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
            auth_retried: false,
        }
    }

    /// Set a header, replacing any existing value.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into().to_lowercase(), value.into());
        self
    }

    /// Set the request body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Build a form-encoded POST request.
    pub fn post_form(url: impl Into<String>, params: &[(&str, &str)]) -> Self {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();

        Self::new(HttpMethod::Post, url)
            .with_header("content-type", "application/x-www-form-urlencoded")
            .with_header("accept", "application/json")
            .with_body(body.into_bytes())
    }
}

/// HTTP method.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

/// HTTP response definition.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers, lowercase keys.
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: String,
}

impl HttpResponse {
    /// Check for a 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP send primitive.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a request, honoring the cancellation signal.
    async fn send(&self, request: HttpRequest, cancel: &CancellationToken)
        -> AuthResult<HttpResponse>;
}

/// Default reqwest-based HTTP transport.
pub struct ReqwestHttpTransport {
    client: reqwest::Client,
    default_timeout: Duration,
}

impl ReqwestHttpTransport {
    /// Create a transport with a 30-second default timeout.
    pub fn new() -> AuthResult<Self> {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Create a transport with a custom default timeout.
    pub fn with_timeout(timeout: Duration) -> AuthResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            // Token endpoints must not silently follow redirects.
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| {
                AuthError::Network(NetworkError::ConnectionFailed {
                    message: e.to_string(),
                })
            })?;

        Ok(Self {
            client,
            default_timeout: timeout,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestHttpTransport {
    async fn send(
        &self,
        request: HttpRequest,
        cancel: &CancellationToken,
    ) -> AuthResult<HttpResponse> {
        let timeout = request.timeout.unwrap_or(self.default_timeout);

        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
            HttpMethod::Put => self.client.put(&request.url),
            HttpMethod::Patch => self.client.patch(&request.url),
            HttpMethod::Delete => self.client.delete(&request.url),
        };

        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        builder = builder.timeout(timeout);

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(AuthError::Cancelled),
            result = builder.send() => result.map_err(|e| {
                if e.is_timeout() {
                    AuthError::Network(NetworkError::Timeout { timeout })
                } else {
                    AuthError::Network(NetworkError::ConnectionFailed {
                        message: e.to_string(),
                    })
                }
            })?,
        };

        let status = response.status().as_u16();

        let mut headers = HashMap::new();
        for (key, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(key.to_string().to_lowercase(), v.to_string());
            }
        }

        let body = tokio::select! {
            _ = cancel.cancelled() => return Err(AuthError::Cancelled),
            result = response.text() => result.map_err(|e| {
                AuthError::Protocol(ProtocolError::InvalidResponse {
                    message: e.to_string(),
                })
            })?,
        };

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Mock HTTP transport for testing.
#[derive(Default)]
pub struct MockHttpTransport {
    outcomes: std::sync::Mutex<std::collections::VecDeque<AuthResult<HttpResponse>>>,
    request_history: std::sync::Mutex<Vec<HttpRequest>>,
    response_delay: std::sync::Mutex<Option<Duration>>,
}

impl MockHttpTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response to return, in FIFO order.
    pub fn queue_response(&self, response: HttpResponse) -> &Self {
        self.outcomes.lock().unwrap().push_back(Ok(response));
        self
    }

    /// Queue a plain-status response with a body.
    pub fn queue_status(&self, status: u16, body: &str) -> &Self {
        self.queue_response(HttpResponse {
            status,
            headers: HashMap::new(),
            body: body.to_string(),
        })
    }

    /// Queue a JSON response.
    pub fn queue_json_response<T: serde::Serialize>(&self, status: u16, body: &T) -> &Self {
        self.queue_response(HttpResponse {
            status,
            headers: [("content-type".to_string(), "application/json".to_string())]
                .into_iter()
                .collect(),
            body: serde_json::to_string(body).unwrap(),
        })
    }

    /// Queue a transport error.
    pub fn queue_error(&self, error: AuthError) -> &Self {
        self.outcomes.lock().unwrap().push_back(Err(error));
        self
    }

    /// Get the recorded request history.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.request_history.lock().unwrap().clone()
    }

    /// Get the last recorded request.
    pub fn last_request(&self) -> Option<HttpRequest> {
        self.request_history.lock().unwrap().last().cloned()
    }

    /// Number of sends observed.
    pub fn request_count(&self) -> usize {
        self.request_history.lock().unwrap().len()
    }

    /// Delay every response, for exercising in-flight concurrency.
    pub fn set_response_delay(&self, delay: Duration) {
        *self.response_delay.lock().unwrap() = Some(delay);
    }
}

#[async_trait]
impl HttpTransport for MockHttpTransport {
    async fn send(
        &self,
        request: HttpRequest,
        cancel: &CancellationToken,
    ) -> AuthResult<HttpResponse> {
        if cancel.is_cancelled() {
            return Err(AuthError::Cancelled);
        }

        let delay = *self.response_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::select! {
                _ = cancel.cancelled() => return Err(AuthError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.request_history.lock().unwrap().push(request);

        self.outcomes.lock().unwrap().pop_front().unwrap_or_else(|| {
            Err(AuthError::Network(NetworkError::ConnectionFailed {
                message: "no mock response queued".to_string(),
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_transport_fifo() {
        let transport = MockHttpTransport::new();
        transport.queue_status(401, "");
        transport.queue_status(200, "ok");

        let cancel = CancellationToken::new();
        let first = transport
            .send(HttpRequest::new(HttpMethod::Get, "https://example.com"), &cancel)
            .await
            .unwrap();
        let second = transport
            .send(HttpRequest::new(HttpMethod::Get, "https://example.com"), &cancel)
            .await
            .unwrap();

        assert_eq!(first.status, 401);
        assert_eq!(second.status, 200);
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_transport_cancelled() {
        let transport = MockHttpTransport::new();
        transport.queue_status(200, "ok");

        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = transport
            .send(HttpRequest::new(HttpMethod::Get, "https://example.com"), &cancel)
            .await;
        assert!(matches!(result, Err(AuthError::Cancelled)));
        assert_eq!(transport.request_count(), 0);
    }

    #[test]
    fn test_post_form_encoding() {
        let request = HttpRequest::post_form(
            "https://api.example.com/oauth/token",
            &[("grant_type", "authorization_code"), ("code", "a b&c")],
        );

        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(
            request.headers.get("content-type").map(String::as_str),
            Some("application/x-www-form-urlencoded")
        );
        let body = String::from_utf8(request.body.unwrap()).unwrap();
        assert!(body.contains("grant_type=authorization_code"));
        assert!(body.contains("code=a+b%26c"));
    }

    #[test]
    fn test_http_method_as_str() {
        assert_eq!(HttpMethod::Get.as_str(), "GET");
        assert_eq!(HttpMethod::Post.as_str(), "POST");
        assert_eq!(HttpMethod::Delete.as_str(), "DELETE");
    }
}
