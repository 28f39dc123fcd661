//! Common test utilities for genjob integration tests

#![allow(dead_code)]

use genjob::{
    JobPollingClient, JobRequest, PollConfig, ProviderConfig, RateLimitConfig, ReqwestTransport,
    RetryConfig,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Poll ceiling for mock providers
pub const POLL_CEILING: u32 = 6;

/// API token used against mock servers
pub const TOKEN: &str = "r8_integration_token_9f3c";

/// Provider shaped like the mock server's API, with millisecond timings
pub fn mock_provider(server: &MockServer) -> ProviderConfig {
    ProviderConfig {
        poll_endpoint_template: Some(format!("{}/v1/jobs/{{id}}", server.uri())),
        poll: PollConfig {
            interval: Duration::from_millis(10),
            max_attempts: POLL_CEILING,
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
        ..ProviderConfig::new("mock")
    }
}

/// Client with a real HTTP transport
pub fn client(provider: ProviderConfig) -> JobPollingClient {
    let transport = ReqwestTransport::new(&Default::default()).unwrap();
    JobPollingClient::new(provider, Arc::new(transport)).unwrap()
}

/// Creation request for a prompt
pub fn request(server: &MockServer, prompt: &str) -> JobRequest {
    JobRequest::new(
        format!("{}/v1/jobs", server.uri()),
        json!({"input": {"prompt": prompt}}),
        TOKEN,
    )
}

/// Serve `bytes` at `file_path`
pub async fn mount_artifact(server: &MockServer, file_path: &str, bytes: &[u8]) {
    Mock::given(method("GET"))
        .and(path(file_path))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(bytes.to_vec()))
        .mount(server)
        .await;
}

/// Serve `body` for status checks of job `id`, at most `times` times
pub async fn mount_status_n(server: &MockServer, id: &str, body: serde_json::Value, times: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/jobs/{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .up_to_n_times(times)
        .mount(server)
        .await;
}

/// Serve `body` for every status check of job `id`
pub async fn mount_status(server: &MockServer, id: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/jobs/{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Number of requests the server saw for a path
pub async fn hits(server: &MockServer, request_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == request_path)
        .count()
}
