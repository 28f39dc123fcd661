//! Job polling client
//!
//! [`JobPollingClient`] drives one remote generation job at a time through
//! submit → poll → fetch. It holds no per-job state: each [`Job`](crate::types::Job) lives in
//! the caller's scope, so any number of chains can run concurrently on one client.
//!
//! - `submit`: creation call with connection retries and one rate-limit deferral
//! - `poll`: fixed-interval status checks bounded by the provider's attempt ceiling
//! - `run` / `run_batch`: the full chain, including artifact retrieval

use crate::config::{Config, ProviderConfig};
use crate::error::Result;
use crate::fetch::ArtifactFetcher;
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{JobEvent, JobRequest};
use std::sync::Arc;
use tokio::sync::broadcast;

mod poll;
mod response;
mod run;
mod submit;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Client for one job-based generation provider
#[derive(Clone)]
pub struct JobPollingClient {
    provider: Arc<ProviderConfig>,
    transport: Arc<dyn Transport>,
    event_tx: broadcast::Sender<JobEvent>,
}

impl JobPollingClient {
    /// Create a client for a provider over the given transport
    ///
    /// Fails with a configuration error if the provider settings are invalid.
    pub fn new(provider: ProviderConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        provider.validate()?;
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            provider: Arc::new(provider),
            transport,
            event_tx,
        })
    }

    /// Create a client for a registered provider using a `reqwest` transport
    pub fn from_config(config: &Config, provider: &str) -> Result<Self> {
        let provider = config.provider(provider)?.clone();
        let transport = ReqwestTransport::new(&config.http)?;
        Self::new(provider, Arc::new(transport))
    }

    /// Provider settings this client was built with
    pub fn provider(&self) -> &ProviderConfig {
        &self.provider
    }

    /// Subscribe to job events
    ///
    /// Events sent while nobody is subscribed are dropped.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.event_tx.subscribe()
    }

    /// Artifact fetcher sharing this client's transport
    ///
    /// Carries the request's credential when the provider serves artifacts behind auth.
    pub fn fetcher(&self, request: &JobRequest) -> ArtifactFetcher {
        let fetcher = ArtifactFetcher::new(self.transport.clone());
        if self.provider.fetch_with_auth {
            fetcher.with_auth(
                self.provider.auth.header.clone(),
                self.provider.auth.header_value(&request.auth_token),
            )
        } else {
            fetcher
        }
    }

    fn emit(&self, event: JobEvent) {
        // No subscribers is fine
        self.event_tx.send(event).ok();
    }

    /// Auth and provider-specific headers sent with creation and status calls
    fn api_headers(&self, request: &JobRequest) -> Vec<(String, String)> {
        let mut headers = Vec::with_capacity(self.provider.extra_headers.len() + 1);
        headers.push((
            self.provider.auth.header.clone(),
            self.provider.auth.header_value(&request.auth_token),
        ));
        headers.extend(
            self.provider
                .extra_headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        headers
    }
}

impl std::fmt::Debug for JobPollingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobPollingClient")
            .field("provider", &self.provider.name)
            .finish_non_exhaustive()
    }
}
