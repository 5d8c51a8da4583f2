//! Authenticating Pipeline
//!
//! Transport decorator that injects the `Authorization` header and retries a
//! request once after a 401 by forcing a credential refresh.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::transport::{HttpRequest, HttpResponse, HttpTransport};
use crate::error::{AuthError, AuthResult};
use crate::token::TokenManager;

const AUTHORIZATION: &str = "authorization";

/// Transport stage that authenticates outgoing requests.
///
/// Requests that already carry an `Authorization` header pass through
/// untouched. Requests without one get the managed credential injected; if
/// none is available the request is sent unauthenticated and the server's
/// verdict stands.
pub struct AuthenticatingTransport {
    inner: Arc<dyn HttpTransport>,
    manager: Arc<dyn TokenManager>,
}

impl AuthenticatingTransport {
    /// Wrap a transport with credential injection.
    pub fn new(inner: Arc<dyn HttpTransport>, manager: Arc<dyn TokenManager>) -> Self {
        Self { inner, manager }
    }
}

#[async_trait]
impl HttpTransport for AuthenticatingTransport {
    async fn send(
        &self,
        mut request: HttpRequest,
        cancel: &CancellationToken,
    ) -> AuthResult<HttpResponse> {
        if !request.headers.contains_key(AUTHORIZATION) {
            if let Some(credential) = self.manager.get_credential(cancel).await? {
                request
                    .headers
                    .insert(AUTHORIZATION.to_string(), credential.authorization_header());
            } else {
                debug!(url = %request.url, "no credential available, sending unauthenticated");
            }
        }

        let retry_template = (!request.auth_retried).then(|| request.clone());
        let response = self.inner.send(request, cancel).await?;

        if response.status != 401 {
            return Ok(response);
        }
        let Some(mut retry) = retry_template else {
            // Already the retried request; the second 401 stands.
            return Ok(response);
        };
        if cancel.is_cancelled() {
            return Err(AuthError::Cancelled);
        }

        let credential = match self.manager.refresh(cancel).await {
            Ok(credential) => credential,
            Err(AuthError::Cancelled) => return Err(AuthError::Cancelled),
            Err(e) => {
                // The original 401 is the caller's signal to re-authenticate;
                // the refresh failure only gets logged.
                warn!(error = %e, "credential refresh after 401 failed");
                return Ok(response);
            }
        };

        debug!(url = %retry.url, "retrying request with refreshed credential");
        retry.headers.remove(AUTHORIZATION);
        retry
            .headers
            .insert(AUTHORIZATION.to_string(), credential.authorization_header());
        retry.auth_retried = true;
        self.inner.send(retry, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transport::{HttpMethod, MockHttpTransport};
    use crate::token::MockTokenManager;
    use crate::types::Credential;
    use chrono::{Duration, Utc};

    fn credential(token: &str) -> Credential {
        Credential::new(
            token,
            "Bearer",
            Utc::now() + Duration::seconds(3600),
            Some("rt".to_string()),
            None,
        )
    }

    fn request() -> HttpRequest {
        HttpRequest::new(HttpMethod::Get, "https://api.sitebridge.com/rest/v1.0/projects")
    }

    #[tokio::test]
    async fn test_injects_authorization_header() {
        let inner = Arc::new(MockHttpTransport::new());
        inner.queue_status(200, "{}");
        let manager = Arc::new(MockTokenManager::new());
        manager.set_credential(credential("at-1"));

        let transport = AuthenticatingTransport::new(inner.clone(), manager);
        let cancel = CancellationToken::new();
        let response = transport.send(request(), &cancel).await.unwrap();

        assert_eq!(response.status, 200);
        let sent = inner.last_request().unwrap();
        assert_eq!(
            sent.headers.get(AUTHORIZATION).map(String::as_str),
            Some("Bearer at-1")
        );
    }

    #[tokio::test]
    async fn test_existing_header_passes_through() {
        let inner = Arc::new(MockHttpTransport::new());
        inner.queue_status(200, "{}");
        let manager = Arc::new(MockTokenManager::new());
        manager.set_credential(credential("managed"));

        let transport = AuthenticatingTransport::new(inner.clone(), manager);
        let cancel = CancellationToken::new();
        transport
            .send(request().with_header(AUTHORIZATION, "Bearer caller-supplied"), &cancel)
            .await
            .unwrap();

        let sent = inner.last_request().unwrap();
        assert_eq!(
            sent.headers.get(AUTHORIZATION).map(String::as_str),
            Some("Bearer caller-supplied")
        );
    }

    #[tokio::test]
    async fn test_no_credential_sends_unauthenticated() {
        let inner = Arc::new(MockHttpTransport::new());
        inner.queue_status(200, "{}");
        let manager = Arc::new(MockTokenManager::new());

        let transport = AuthenticatingTransport::new(inner.clone(), manager);
        let cancel = CancellationToken::new();
        let response = transport.send(request(), &cancel).await.unwrap();

        assert_eq!(response.status, 200);
        let sent = inner.last_request().unwrap();
        assert!(!sent.headers.contains_key(AUTHORIZATION));
    }

    #[tokio::test]
    async fn test_401_triggers_refresh_and_retry() {
        let inner = Arc::new(MockHttpTransport::new());
        inner.queue_status(401, "");
        inner.queue_status(200, "{}");
        let manager = Arc::new(MockTokenManager::new());
        manager.set_credential(credential("stale"));
        manager.set_refresh_result(credential("fresh"));

        let transport = AuthenticatingTransport::new(inner.clone(), manager.clone());
        let cancel = CancellationToken::new();
        let response = transport.send(request(), &cancel).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(manager.refresh_count(), 1);

        let requests = inner.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[0].headers.get(AUTHORIZATION).map(String::as_str),
            Some("Bearer stale")
        );
        assert_eq!(
            requests[1].headers.get(AUTHORIZATION).map(String::as_str),
            Some("Bearer fresh")
        );
        assert!(requests[1].auth_retried);
    }

    #[tokio::test]
    async fn test_second_401_is_not_retried() {
        let inner = Arc::new(MockHttpTransport::new());
        inner.queue_status(401, "");
        inner.queue_status(401, "");
        let manager = Arc::new(MockTokenManager::new());
        manager.set_credential(credential("stale"));
        manager.set_refresh_result(credential("fresh"));

        let transport = AuthenticatingTransport::new(inner.clone(), manager.clone());
        let cancel = CancellationToken::new();
        let response = transport.send(request(), &cancel).await.unwrap();

        assert_eq!(response.status, 401);
        assert_eq!(inner.request_count(), 2);
        assert_eq!(manager.refresh_count(), 1);
    }

    #[tokio::test]
    async fn test_refresh_failure_returns_original_401() {
        let inner = Arc::new(MockHttpTransport::new());
        inner.queue_status(401, "");
        let manager = Arc::new(MockTokenManager::new());
        manager.set_credential(credential("stale"));
        // No refresh result configured: refresh fails.

        let transport = AuthenticatingTransport::new(inner.clone(), manager);
        let cancel = CancellationToken::new();
        let response = transport.send(request(), &cancel).await.unwrap();

        assert_eq!(response.status, 401);
        assert_eq!(inner.request_count(), 1);
    }

    /// Transport that trips a cancellation token as each response returns,
    /// so the caller observes cancellation between the first send and any
    /// retry decision.
    struct CancelAfterSendTransport {
        inner: MockHttpTransport,
        to_cancel: CancellationToken,
    }

    #[async_trait]
    impl HttpTransport for CancelAfterSendTransport {
        async fn send(
            &self,
            request: HttpRequest,
            cancel: &CancellationToken,
        ) -> crate::error::AuthResult<HttpResponse> {
            let response = self.inner.send(request, cancel).await;
            self.to_cancel.cancel();
            response
        }
    }

    #[tokio::test]
    async fn test_cancellation_after_401_stops_retry() {
        let cancel = CancellationToken::new();
        let inner = Arc::new(CancelAfterSendTransport {
            inner: MockHttpTransport::new(),
            to_cancel: cancel.clone(),
        });
        inner.inner.queue_status(401, "");
        inner.inner.queue_status(200, "{}");

        let manager = Arc::new(MockTokenManager::new());
        manager.set_credential(credential("stale"));
        manager.set_refresh_result(credential("fresh"));

        let transport = AuthenticatingTransport::new(inner.clone(), manager.clone());
        let result = transport.send(request(), &cancel).await;

        // Cancelled between the 401 and the refresh: no refresh, no resend.
        assert!(matches!(result, Err(AuthError::Cancelled)));
        assert_eq!(inner.inner.request_count(), 1);
        assert_eq!(manager.refresh_count(), 0);
    }

    #[tokio::test]
    async fn test_non_401_errors_pass_through() {
        let inner = Arc::new(MockHttpTransport::new());
        inner.queue_status(503, "");
        let manager = Arc::new(MockTokenManager::new());
        manager.set_credential(credential("at"));
        manager.set_refresh_result(credential("fresh"));

        let transport = AuthenticatingTransport::new(inner.clone(), manager.clone());
        let cancel = CancellationToken::new();
        let response = transport.send(request(), &cancel).await.unwrap();

        assert_eq!(response.status, 503);
        assert_eq!(manager.refresh_count(), 0);
        assert_eq!(inner.request_count(), 1);
    }
}
