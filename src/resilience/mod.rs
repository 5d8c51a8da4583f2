//! Resilience
//!
//! Per-operation resilience policies: per-attempt timeout inside
//! exponential-backoff retry, inside a circuit breaker. Policies are built
//! once per operation name and cached for the lifetime of the factory.

pub mod circuit_breaker;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use retry::RetryPolicy;

use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::core::transport::{HttpRequest, HttpResponse, HttpTransport};
use crate::error::{is_transient_status, AuthError, AuthResult, NetworkError};
use crate::types::{LoggingOptions, OperationContext, ResilienceOptions, TimeoutOptions};

/// Composed resilience policy for one logical operation.
///
/// Execution order per call: the circuit breaker admits or rejects, each
/// retry attempt runs under its own timeout, and the attempt outcome feeds
/// back into the breaker.
pub struct OperationPolicy {
    name: String,
    retry: RetryPolicy,
    breaker: CircuitBreaker,
    timeout: TimeoutOptions,
    logging: LoggingOptions,
}

impl OperationPolicy {
    fn new(name: String, options: &ResilienceOptions) -> Self {
        Self {
            retry: RetryPolicy::new(options.retry.clone(), options.logging.clone()),
            breaker: CircuitBreaker::new(
                name.clone(),
                options.circuit_breaker.clone(),
                options.logging.clone(),
            ),
            timeout: options.timeout.clone(),
            logging: options.logging.clone(),
            name,
        }
    }

    /// Operation name this policy was built for.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// This operation's circuit breaker.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Run `op` under the full policy stack, treating `classify(&value) ==
    /// true` as a retryable failure. When retries exhaust on a classified
    /// value, that value is returned so the caller sees the real outcome.
    pub async fn execute_classified<T, F, Fut, C>(
        &self,
        op: F,
        classify: C,
        cancel: &CancellationToken,
    ) -> AuthResult<T>
    where
        T: Send,
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = AuthResult<T>> + Send,
        C: Fn(&T) -> bool + Send + Sync,
    {
        self.breaker.try_acquire()?;

        let attempt = || async {
            if !self.timeout.enabled {
                return op().await;
            }
            match tokio::time::timeout(self.timeout.duration, op()).await {
                Ok(result) => result,
                Err(_) => {
                    if self.logging.log_timeouts {
                        warn!(operation = %self.name, timeout = ?self.timeout.duration, "attempt timed out");
                    }
                    Err(AuthError::Network(NetworkError::Timeout {
                        timeout: self.timeout.duration,
                    }))
                }
            }
        };

        let result = self
            .retry
            .execute_classified(&self.name, attempt, &classify, cancel)
            .await;

        match &result {
            Ok(value) if classify(value) => self.breaker.on_failure(),
            Ok(_) => self.breaker.on_success(),
            Err(e) if e.is_transient() => self.breaker.on_failure(),
            Err(_) => self.breaker.release(),
        }
        result
    }

    /// Run `op` under the full policy stack.
    pub async fn execute<T, F, Fut>(&self, op: F, cancel: &CancellationToken) -> AuthResult<T>
    where
        T: Send,
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = AuthResult<T>> + Send,
    {
        self.execute_classified(op, |_| false, cancel).await
    }
}

/// Builds and caches one [`OperationPolicy`] per operation name.
///
/// Caching keeps circuit breaker state continuous across calls to the same
/// operation; a new factory starts every circuit closed.
pub struct PolicyFactory {
    options: ResilienceOptions,
    cache: Mutex<HashMap<String, Arc<OperationPolicy>>>,
}

impl PolicyFactory {
    /// Create a factory from resilience configuration.
    pub fn new(options: ResilienceOptions) -> Self {
        Self {
            options,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Get the cached policy for an operation, building it on first use.
    pub fn policy_for(&self, context: &OperationContext) -> Arc<OperationPolicy> {
        let mut cache = self.cache.lock().unwrap();
        cache
            .entry(context.name.clone())
            .or_insert_with(|| {
                Arc::new(OperationPolicy::new(context.name.clone(), &self.options))
            })
            .clone()
    }

    /// Run `op` under the cached policy for `context`.
    pub async fn execute<T, F, Fut>(
        &self,
        context: &OperationContext,
        op: F,
        cancel: &CancellationToken,
    ) -> AuthResult<T>
    where
        T: Send,
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = AuthResult<T>> + Send,
    {
        self.policy_for(context).execute(op, cancel).await
    }
}

/// Transport decorator that routes every request through the policy for its
/// operation.
///
/// Transient HTTP statuses are retried like transport errors; when retries
/// exhaust, the last response is returned so callers still see the server's
/// status and headers.
pub struct ResilientTransport {
    inner: Arc<dyn HttpTransport>,
    policies: Arc<PolicyFactory>,
}

impl ResilientTransport {
    /// Wrap a transport with per-operation resilience.
    pub fn new(inner: Arc<dyn HttpTransport>, policies: Arc<PolicyFactory>) -> Self {
        Self { inner, policies }
    }

    fn operation_name(request: &HttpRequest) -> String {
        match url::Url::parse(&request.url) {
            Ok(url) => format!("{} {}", request.method.as_str(), url.path()),
            Err(_) => format!("{} {}", request.method.as_str(), request.url),
        }
    }
}

#[async_trait]
impl HttpTransport for ResilientTransport {
    async fn send(
        &self,
        request: HttpRequest,
        cancel: &CancellationToken,
    ) -> AuthResult<HttpResponse> {
        let context = OperationContext::new(Self::operation_name(&request));
        let policy = self.policies.policy_for(&context);

        policy
            .execute_classified(
                || {
                    let request = request.clone();
                    async move { self.inner.send(request, cancel).await }
                },
                |response: &HttpResponse| is_transient_status(response.status),
                cancel,
            )
            .await
    }
}
