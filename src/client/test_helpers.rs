//! Shared test helpers for driving JobPollingClient without real providers.

use crate::client::JobPollingClient;
use crate::config::{PollConfig, ProviderConfig, RateLimitConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
use crate::types::JobRequest;
use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Poll interval used by test providers
pub(crate) const TEST_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Poll ceiling used by test providers
pub(crate) const TEST_POLL_CEILING: u32 = 5;

/// One scripted transport outcome
pub(crate) enum Step {
    /// Return this response
    Respond(HttpResponse),
    /// Fail as if the connection was refused
    Refuse,
}

/// Transport that replays a fixed script and records every request.
///
/// Once the script runs out, every further call is refused.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<HttpRequest>>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    pub(crate) fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into_iter().collect()),
            ..Self::default()
        })
    }

    /// Number of `send` calls so far
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Copies of every request sent so far
    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Respond(response)) => Ok(response),
            Some(Step::Refuse) | None => Err(Error::Connection("connection refused".into())),
        }
    }
}

/// JSON response step
pub(crate) fn respond(status: u16, body: serde_json::Value) -> Step {
    Step::Respond(HttpResponse::json(status, &body))
}

/// Status response step in the default vocabulary
pub(crate) fn status_step(status: &str) -> Step {
    respond(200, json!({"id": "job-1", "status": status}))
}

/// Provider with millisecond timings so tests finish quickly.
///
/// Poll template points at `base`, so status calls land on the same server.
pub(crate) fn fast_provider(base: &str) -> ProviderConfig {
    ProviderConfig {
        poll_endpoint_template: Some(format!("{}/v1/jobs/{{id}}", base)),
        poll: PollConfig {
            interval: TEST_POLL_INTERVAL,
            max_attempts: TEST_POLL_CEILING,
        },
        submit_retry: RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(10),
            backoff_multiplier: 1.0,
            jitter: false,
        },
        rate_limit: RateLimitConfig {
            enabled: true,
            safety_buffer: Duration::ZERO,
        },
        ..ProviderConfig::new("test")
    }
}

/// Client over a scripted transport
pub(crate) fn scripted_client(
    steps: impl IntoIterator<Item = Step>,
) -> (JobPollingClient, Arc<ScriptedTransport>) {
    let transport = ScriptedTransport::new(steps);
    let client =
        JobPollingClient::new(fast_provider("https://api.test.local"), transport.clone()).unwrap();
    (client, transport)
}

/// Client over a real reqwest transport, pointed at a mock server
pub(crate) fn http_client(provider: ProviderConfig) -> JobPollingClient {
    let transport = ReqwestTransport::new(&Default::default()).unwrap();
    JobPollingClient::new(provider, Arc::new(transport)).unwrap()
}

/// Creation request against the scripted host
pub(crate) fn scripted_request() -> JobRequest {
    JobRequest::new(
        "https://api.test.local/v1/jobs",
        json!({"input": {"prompt": "a lighthouse at dusk"}}),
        "r8_test_token_1234",
    )
}

/// Creation request against a mock server
pub(crate) fn request_for(base: &str) -> JobRequest {
    JobRequest::new(
        format!("{}/v1/jobs", base),
        json!({"input": {"prompt": "a lighthouse at dusk"}}),
        "r8_test_token_1234",
    )
}
