//! Configuration types for genjob
//!
//! Every provider gets one [`ProviderConfig`] describing how to talk to it: endpoint
//! templates, header names, where the interesting fields live in its JSON responses, and
//! the polling/retry constants. Nothing in the client is provider-specific beyond this.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, collections::HashMap, time::Duration};

/// Registry name of the Replicate preset
pub const REPLICATE: &str = "replicate";

/// Registry name of the Runway preset
pub const RUNWAY: &str = "runway";

/// Largest accepted retry backoff multiplier
pub const MAX_BACKOFF_MULTIPLIER: f64 = 10.0;

/// Placeholder substituted with the job id in poll endpoint templates
pub const JOB_ID_PLACEHOLDER: &str = "{id}";

/// Main configuration: HTTP settings plus the provider registry
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// HTTP client settings shared by all providers
    #[serde(default)]
    pub http: HttpConfig,

    /// Provider configurations keyed by name (default: replicate + runway presets)
    #[serde(default = "default_providers")]
    pub providers: HashMap<String, ProviderConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            providers: default_providers(),
        }
    }
}

impl Config {
    /// Look up a provider by name
    pub fn provider(&self, name: &str) -> Result<&ProviderConfig> {
        self.providers.get(name).ok_or_else(|| {
            Error::config(
                format!("unknown provider '{}'", name),
                format!("providers.{}", name),
            )
        })
    }

    /// Validate the HTTP settings and every registered provider
    pub fn validate(&self) -> Result<()> {
        if self.http.request_timeout.is_zero() {
            return Err(Error::config(
                "request timeout must be greater than zero",
                "http.request_timeout",
            ));
        }
        for (name, provider) in &self.providers {
            provider.validate().map_err(|e| match e {
                Error::Config { message, key } => Error::Config {
                    message,
                    key: Some(match key {
                        Some(k) => format!("providers.{}.{}", name, k),
                        None => format!("providers.{}", name),
                    }),
                },
                other => other,
            })?;
        }
        Ok(())
    }
}

/// HTTP client configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Total timeout for a single request (default: 60 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Timeout for establishing a connection (default: 10 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// How the auth token is presented to a provider
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthScheme {
    /// `Bearer <token>` (default)
    #[default]
    Bearer,
    /// `Token <token>` (older Replicate clients)
    Token,
    /// The token as-is (e.g. `xi-api-key: <token>`)
    Raw,
}

/// Auth header configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Header name carrying the credential (default: "Authorization")
    #[serde(default = "default_auth_header")]
    pub header: String,

    /// Presentation scheme for the token
    #[serde(default)]
    pub scheme: AuthScheme,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            header: default_auth_header(),
            scheme: AuthScheme::default(),
        }
    }
}

impl AuthConfig {
    /// Build the header value for a token
    pub fn header_value(&self, token: &str) -> String {
        match self.scheme {
            AuthScheme::Bearer => format!("Bearer {}", token),
            AuthScheme::Token => format!("Token {}", token),
            AuthScheme::Raw => token.to_string(),
        }
    }
}

/// JSON pointers (RFC 6901) locating fields in a provider's responses
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseFields {
    /// Job identifier (default: "/id")
    #[serde(default = "default_id_field")]
    pub id: String,

    /// Status string (default: "/status")
    #[serde(default = "default_status_field")]
    pub status: String,

    /// Direct status-check URL embedded in the creation response, if any
    #[serde(default)]
    pub status_url: Option<String>,

    /// Output value: a URL, a list of URLs, inline base64, or an object holding them
    #[serde(default = "default_output_field")]
    pub output: String,

    /// Failure reason candidates, tried in order
    #[serde(default = "default_failure_fields")]
    pub failure: Vec<String>,

    /// Progress fraction (0.0-1.0), if the provider reports one
    #[serde(default)]
    pub progress: Option<String>,

    /// Retry-after seconds inside a rate-limited error body
    #[serde(default)]
    pub retry_after: Option<String>,
}

impl Default for ResponseFields {
    fn default() -> Self {
        Self {
            id: default_id_field(),
            status: default_status_field(),
            status_url: None,
            output: default_output_field(),
            failure: default_failure_fields(),
            progress: None,
            retry_after: None,
        }
    }
}

/// Status polling configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollConfig {
    /// Delay before each status check (default: 2 seconds)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub interval: Duration,

    /// Status checks allowed before the job is classified as timed out (default: 60)
    #[serde(default = "default_poll_max_attempts")]
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: default_poll_interval(),
            max_attempts: default_poll_max_attempts(),
        }
    }
}

/// Retry configuration for transient submission failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first one (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (default: 2 seconds)
    #[serde(default = "default_retry_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 2 seconds)
    #[serde(default = "default_retry_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier applied to the delay after each retry (default: 1.0, fixed delay)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_retry_delay(),
            max_delay: default_retry_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: false,
        }
    }
}

/// Handling of HTTP 429 responses during submission
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Defer and retry once when the server advises a delay (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Added on top of the server-advised delay (default: 1 second)
    #[serde(default = "default_safety_buffer", with = "duration_serde")]
    pub safety_buffer: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            safety_buffer: default_safety_buffer(),
        }
    }
}

/// Everything needed to drive one job-based generation API
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider name, used in logs
    pub name: String,

    /// Auth header configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Extra headers sent with creation and status calls (e.g. API version pins)
    #[serde(default)]
    pub extra_headers: BTreeMap<String, String>,

    /// Ask the remote to hold the creation call open until the job finishes (`Prefer: wait`)
    #[serde(default)]
    pub prefer_wait: bool,

    /// Status URL template with an `{id}` placeholder, used when the request has none
    #[serde(default)]
    pub poll_endpoint_template: Option<String>,

    /// Response field locations
    #[serde(default)]
    pub fields: ResponseFields,

    /// Status polling
    #[serde(default)]
    pub poll: PollConfig,

    /// Retry of connection-level submission failures
    #[serde(default)]
    pub submit_retry: RetryConfig,

    /// Rate-limit deferral
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Send the auth header when downloading artifacts (default: false)
    #[serde(default)]
    pub fetch_with_auth: bool,
}

impl ProviderConfig {
    /// A provider with default field locations and constants
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            auth: AuthConfig::default(),
            extra_headers: BTreeMap::new(),
            prefer_wait: false,
            poll_endpoint_template: None,
            fields: ResponseFields::default(),
            poll: PollConfig::default(),
            submit_retry: RetryConfig::default(),
            rate_limit: RateLimitConfig::default(),
            fetch_with_auth: false,
        }
    }

    /// Replicate predictions API
    ///
    /// Creation responses embed `urls.get`; 429 bodies carry `retry_after` in seconds.
    pub fn replicate() -> Self {
        Self {
            prefer_wait: true,
            poll_endpoint_template: Some(
                "https://api.replicate.com/v1/predictions/{id}".to_string(),
            ),
            fields: ResponseFields {
                status_url: Some("/urls/get".to_string()),
                failure: vec!["/error".to_string()],
                retry_after: Some("/retry_after".to_string()),
                ..ResponseFields::default()
            },
            poll: PollConfig {
                interval: Duration::from_secs(2),
                max_attempts: 60,
            },
            ..Self::new(REPLICATE)
        }
    }

    /// Runway tasks API
    ///
    /// Creation returns only `{id}`; status lives at `/tasks/{id}` and reports progress.
    pub fn runway() -> Self {
        let mut extra_headers = BTreeMap::new();
        extra_headers.insert("X-Runway-Version".to_string(), "2024-11-06".to_string());
        Self {
            extra_headers,
            poll_endpoint_template: Some("https://api.dev.runwayml.com/v1/tasks/{id}".to_string()),
            fields: ResponseFields {
                failure: vec!["/failure".to_string(), "/failure_message".to_string()],
                progress: Some("/progress".to_string()),
                ..ResponseFields::default()
            },
            poll: PollConfig {
                interval: Duration::from_secs(5),
                max_attempts: 120,
            },
            ..Self::new(RUNWAY)
        }
    }

    /// Check constants and field pointers
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::config("provider name must not be empty", "name"));
        }
        if self.auth.header.trim().is_empty() {
            return Err(Error::config("auth header must not be empty", "auth.header"));
        }
        if self.poll.max_attempts == 0 {
            return Err(Error::config(
                "poll.max_attempts must be at least 1",
                "poll.max_attempts",
            ));
        }
        if self.submit_retry.max_attempts == 0 {
            return Err(Error::config(
                "submit_retry.max_attempts must be at least 1",
                "submit_retry.max_attempts",
            ));
        }
        let multiplier = self.submit_retry.backoff_multiplier;
        if !multiplier.is_finite() || multiplier < 1.0 || multiplier > MAX_BACKOFF_MULTIPLIER {
            return Err(Error::config(
                format!(
                    "submit_retry.backoff_multiplier must be between 1.0 and {}",
                    MAX_BACKOFF_MULTIPLIER
                ),
                "submit_retry.backoff_multiplier",
            ));
        }
        if let Some(template) = &self.poll_endpoint_template
            && !template.contains(JOB_ID_PLACEHOLDER)
        {
            return Err(Error::config(
                format!("poll endpoint template must contain {}", JOB_ID_PLACEHOLDER),
                "poll_endpoint_template",
            ));
        }

        let pointers = [
            Some(&self.fields.id),
            Some(&self.fields.status),
            Some(&self.fields.output),
            self.fields.status_url.as_ref(),
            self.fields.progress.as_ref(),
            self.fields.retry_after.as_ref(),
        ];
        for pointer in pointers
            .into_iter()
            .flatten()
            .chain(self.fields.failure.iter())
        {
            if !pointer.is_empty() && !pointer.starts_with('/') {
                return Err(Error::config(
                    format!("'{}' is not a JSON pointer", pointer),
                    "fields",
                ));
            }
        }
        Ok(())
    }
}

fn default_providers() -> HashMap<String, ProviderConfig> {
    let mut providers = HashMap::new();
    providers.insert(REPLICATE.to_string(), ProviderConfig::replicate());
    providers.insert(RUNWAY.to_string(), ProviderConfig::runway());
    providers
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_user_agent() -> String {
    concat!("genjob/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_auth_header() -> String {
    "Authorization".to_string()
}

fn default_id_field() -> String {
    "/id".to_string()
}

fn default_status_field() -> String {
    "/status".to_string()
}

fn default_output_field() -> String {
    "/output".to_string()
}

fn default_failure_fields() -> Vec<String> {
    vec!["/error".to_string()]
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_poll_max_attempts() -> u32 {
    60
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

fn default_safety_buffer() -> Duration {
    Duration::from_secs(1)
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
