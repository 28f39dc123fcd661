use super::test_helpers::*;
use super::*;
use crate::error::Error;
use crate::transport::HttpResponse;
use crate::types::{BatchSpacing, Job, JobStatus};
use serde_json::json;
use std::time::{Duration, Instant};


/// Drain every event currently buffered on a receiver
fn drain(rx: &mut broadcast::Receiver<JobEvent>) -> Vec<JobEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[test]
fn new_rejects_invalid_provider() {
    let mut provider = ProviderConfig::new("broken");
    provider.poll.max_attempts = 0;
    let err = JobPollingClient::new(provider, ScriptedTransport::new([])).unwrap_err();
    assert!(matches!(err, Error::Config { .. }));
}

#[test]
fn from_config_unknown_provider() {
    let err = JobPollingClient::from_config(&Config::default(), "midjourney").unwrap_err();
    assert!(matches!(err, Error::Config { .. }));
}

#[test]
fn fetcher_carries_auth_only_when_configured() {
    let request = scripted_request();

    let mut provider = fast_provider("https://api.test.local");
    provider.fetch_with_auth = true;
    let client = JobPollingClient::new(provider, ScriptedTransport::new([])).unwrap();
    let fetcher = format!("{:?}", client.fetcher(&request));
    assert!(fetcher.contains("Authorization"));
    assert!(!fetcher.contains("r8_test_token_1234"));

    let (client, _) = scripted_client([]);
    let fetcher = format!("{:?}", client.fetcher(&request));
    assert!(!fetcher.contains("Authorization"));
}

#[test]
fn api_headers_include_auth_and_extras() {
    let mut provider = fast_provider("https://api.test.local");
    provider
        .extra_headers
        .insert("X-Runway-Version".into(), "2024-11-06".into());
    let client = JobPollingClient::new(provider, ScriptedTransport::new([])).unwrap();

    let headers = client.api_headers(&scripted_request());
    assert_eq!(
        headers,
        vec![
            (
                "Authorization".to_string(),
                "Bearer r8_test_token_1234".to_string()
            ),
            ("X-Runway-Version".to_string(), "2024-11-06".to_string()),
        ]
    );
}
