//! # genjob
//!
//! Asynchronous job-polling client for generative-AI APIs that run work as remote jobs
//! (Replicate predictions, Runway tasks and anything shaped like them).
//!
//! ## Design Philosophy
//!
//! genjob is designed to be:
//! - **Provider-agnostic** - One state machine; each provider is a block of configuration
//! - **Bounded** - Every loop has a ceiling: submission retries, rate-limit deferral, polling
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding in a host application
//! - **Event-driven** - Consumers subscribe to job events instead of passing callbacks
//!
//! A job goes through three steps: [`submit`](JobPollingClient::submit) creates it,
//! [`poll`](JobPollingClient::poll) checks its status at a fixed interval until it is
//! terminal, and an [`ArtifactFetcher`] turns the output references of a succeeded job into
//! bytes. [`run`](JobPollingClient::run) chains all three.
//!
//! ## Quick Start
//!
//! ```no_run
//! use genjob::{Config, JobPollingClient, JobRequest};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = JobPollingClient::from_config(&Config::default(), "replicate")?;
//!
//!     // Subscribe to events
//!     let mut events = client.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let request = JobRequest::new(
//!         "https://api.replicate.com/v1/models/black-forest-labs/flux-schnell/predictions",
//!         json!({"input": {"prompt": "a lighthouse at dusk, 35mm film"}}),
//!         std::env::var("REPLICATE_API_TOKEN")?,
//!     );
//!
//!     let outcome = client.run(&request).await?;
//!     for artifact in &outcome.artifacts {
//!         println!("{} bytes of .{}", artifact.bytes.len(), artifact.extension);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Job polling client (submit, poll, full chains)
pub mod client;
/// Configuration types and provider presets
pub mod config;
/// Error types
pub mod error;
/// Artifact retrieval
pub mod fetch;
/// Host application collaborators (settings, artifact files, media import)
pub mod host;
/// Retry logic for transient failures
pub mod retry;
/// HTTP transport abstraction
pub mod transport;
/// Core types
pub mod types;
/// Helper functions for references, payloads and JSON fields
pub mod utils;

pub use client::JobPollingClient;
pub use config::{
    AuthConfig, AuthScheme, Config, HttpConfig, PollConfig, ProviderConfig, RateLimitConfig,
    ResponseFields, RetryConfig,
};
pub use error::{Error, Result};
pub use fetch::ArtifactFetcher;
pub use host::{
    ArtifactStore, ImportReport, ImportedArtifact, MediaImporter, MemorySettings, SettingsStore,
    TempDirStore, persist_and_import, resolve_auth_token,
};
pub use retry::IsRetryable;
pub use transport::{HttpRequest, HttpResponse, Method, ReqwestTransport, Transport};
pub use types::{
    Artifact, BatchSpacing, GenerationOutcome, Job, JobEvent, JobRequest, JobStatus,
};
