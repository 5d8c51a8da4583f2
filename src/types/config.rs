//! Configuration Types
//!
//! Authentication and resilience configuration for the SiteBridge SDK.

use secrecy::SecretString;
use std::time::Duration;

/// OAuth 2.0 authentication configuration.
#[derive(Clone)]
pub struct AuthOptions {
    /// OAuth 2.0 client identifier.
    pub client_id: String,
    /// OAuth 2.0 client secret.
    pub client_secret: SecretString,
    /// Redirect URI registered for OAuth callbacks.
    pub redirect_uri: String,
    /// Scopes to request access for.
    pub scopes: Vec<String>,
    /// Authorization endpoint URL.
    pub authorization_endpoint: String,
    /// Token endpoint URL.
    pub token_endpoint: String,
    /// Lead time before expiry at which a credential is proactively refreshed.
    pub token_refresh_margin: Duration,
    /// Whether to use PKCE for the authorization code flow.
    pub use_pkce: bool,
    /// HTTP timeout for token endpoint requests.
    pub http_timeout: Duration,
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: SecretString::new(String::new()),
            redirect_uri: String::new(),
            scopes: Vec::new(),
            authorization_endpoint: "https://app.sitebridge.com/oauth/authorize".to_string(),
            token_endpoint: "https://api.sitebridge.com/oauth/token".to_string(),
            token_refresh_margin: Duration::from_secs(300),
            use_pkce: true,
            http_timeout: Duration::from_secs(30),
        }
    }
}

impl std::fmt::Debug for AuthOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthOptions")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .field("authorization_endpoint", &self.authorization_endpoint)
            .field("token_endpoint", &self.token_endpoint)
            .field("token_refresh_margin", &self.token_refresh_margin)
            .field("use_pkce", &self.use_pkce)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

/// Combined resilience configuration. Immutable once a
/// [`PolicyFactory`](crate::resilience::PolicyFactory) is constructed from it.
#[derive(Clone, Debug, Default)]
pub struct ResilienceOptions {
    /// Retry policy configuration.
    pub retry: RetryOptions,
    /// Circuit breaker policy configuration.
    pub circuit_breaker: CircuitBreakerOptions,
    /// Timeout policy configuration.
    pub timeout: TimeoutOptions,
    /// Logging configuration for resilience events.
    pub logging: LoggingOptions,
}

/// Retry policy configuration.
#[derive(Clone, Debug)]
pub struct RetryOptions {
    /// Total number of attempts, including the first.
    pub max_attempts: u32,
    /// Base delay between retries.
    pub base_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Exponential backoff multiplier.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub use_jitter: bool,
    /// Maximum jitter added to a delay.
    pub max_jitter: Duration,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30000),
            backoff_multiplier: 2.0,
            use_jitter: true,
            max_jitter: Duration::from_millis(1000),
        }
    }
}

/// Circuit breaker policy configuration.
#[derive(Clone, Debug)]
pub struct CircuitBreakerOptions {
    /// Whether the circuit breaker is enabled.
    pub enabled: bool,
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// How long the circuit stays open before a trial call is allowed.
    pub break_duration: Duration,
    /// Minimum number of calls observed before the circuit can open.
    pub minimum_throughput: u32,
}

impl Default for CircuitBreakerOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 5,
            break_duration: Duration::from_secs(30),
            minimum_throughput: 10,
        }
    }
}

/// Timeout policy configuration. The timeout bounds each individual attempt,
/// not the whole retry sequence.
#[derive(Clone, Debug)]
pub struct TimeoutOptions {
    /// Whether per-attempt timeouts are enabled.
    pub enabled: bool,
    /// Per-attempt timeout duration.
    pub duration: Duration,
}

impl Default for TimeoutOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            duration: Duration::from_secs(30),
        }
    }
}

/// Logging configuration for resilience events.
#[derive(Clone, Debug)]
pub struct LoggingOptions {
    /// Whether to log retry attempts.
    pub log_retry_attempts: bool,
    /// Whether to log circuit breaker state changes.
    pub log_circuit_breaker_events: bool,
    /// Whether to log timeout events.
    pub log_timeouts: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            log_retry_attempts: true,
            log_circuit_breaker_events: true,
            log_timeouts: true,
        }
    }
}

/// Identifies a logical operation for resilience policy composition and
/// caching. Contexts with equal names resolve to the same cached policy
/// instance for the lifetime of the factory.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OperationContext {
    /// Logical operation name, e.g. `"projects.list"`.
    pub name: String,
}

impl OperationContext {
    /// Create a context for a named operation.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_options_defaults() {
        let options = AuthOptions::default();
        assert_eq!(options.token_refresh_margin, Duration::from_secs(300));
        assert!(options.use_pkce);
        assert!(options.authorization_endpoint.contains("/oauth/authorize"));
    }

    #[test]
    fn test_auth_options_debug_redacts_secret() {
        let options = AuthOptions {
            client_secret: SecretString::new("super-secret".to_string()),
            ..Default::default()
        };
        let debug = format!("{:?}", options);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_resilience_defaults() {
        let options = ResilienceOptions::default();
        assert_eq!(options.retry.max_attempts, 3);
        assert_eq!(options.circuit_breaker.failure_threshold, 5);
        assert!(options.timeout.enabled);
    }

    #[test]
    fn test_operation_context_equality() {
        assert_eq!(
            OperationContext::new("projects.list"),
            OperationContext::new("projects.list")
        );
        assert_ne!(
            OperationContext::new("projects.list"),
            OperationContext::new("projects.get")
        );
    }
}
