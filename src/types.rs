//! Core types for genjob

use crate::error::{Error, Result};
use crate::utils::redact_token;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lifecycle state of a remote generation job
///
/// `Created` and `Processing` are live; the other four are terminal and never change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Accepted by the remote, not yet running
    Created,
    /// Running on the remote
    Processing,
    /// Finished with output
    Succeeded,
    /// Remote reported a failure
    Failed,
    /// Remote reported a cancellation
    Canceled,
    /// Local poll ceiling reached without a terminal remote status
    TimedOut,
}

impl JobStatus {
    /// Whether no further transitions are possible
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Canceled | JobStatus::TimedOut
        )
    }

    /// Map a provider's status string
    ///
    /// Matching is case-insensitive and covers the Replicate and Runway vocabularies.
    /// Returns `None` for strings no provider is known to use. `TimedOut` is never
    /// produced here since it is a purely local classification.
    pub fn from_remote(status: &str) -> Option<Self> {
        match status.trim().to_ascii_lowercase().as_str() {
            "created" | "starting" | "pending" | "queued" | "in_queue" | "throttled" => {
                Some(JobStatus::Created)
            }
            "processing" | "running" | "in_progress" => Some(JobStatus::Processing),
            "succeeded" | "success" | "completed" | "complete" => Some(JobStatus::Succeeded),
            "failed" | "failure" | "error" => Some(JobStatus::Failed),
            "canceled" | "cancelled" => Some(JobStatus::Canceled),
            _ => None,
        }
    }

    /// Canonical string form
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Created => "CREATED",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Succeeded => "SUCCEEDED",
            JobStatus::Failed => "FAILED",
            JobStatus::Canceled => "CANCELED",
            JobStatus::TimedOut => "TIMED_OUT",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One generation request against a job-based API
///
/// The payload is opaque to the client and sent verbatim as the JSON body of the creation
/// call. The auth token is supplied by the caller for every request and never persisted.
#[derive(Clone, Serialize, Deserialize)]
pub struct JobRequest {
    /// Creation endpoint URI
    pub endpoint: String,

    /// Generation parameters (prompt, seed, media references, model options)
    pub payload: serde_json::Value,

    /// Credential attached to every call
    #[serde(skip_serializing)]
    pub auth_token: String,

    /// Status URL template with an `{id}` placeholder, overriding the provider's
    #[serde(default)]
    pub poll_endpoint_template: Option<String>,
}

impl JobRequest {
    /// Create a request
    pub fn new(
        endpoint: impl Into<String>,
        payload: serde_json::Value,
        auth_token: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            payload,
            auth_token: auth_token.into(),
            poll_endpoint_template: None,
        }
    }

    /// Set the status URL template
    pub fn with_poll_endpoint_template(mut self, template: impl Into<String>) -> Self {
        self.poll_endpoint_template = Some(template.into());
        self
    }

    /// Reject requests that cannot be sent
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(Error::InvalidRequest("endpoint must not be empty".into()));
        }
        if self.auth_token.trim().is_empty() {
            return Err(Error::InvalidRequest("auth token must not be empty".into()));
        }
        match url::Url::parse(&self.endpoint) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
            Ok(url) => Err(Error::InvalidRequest(format!(
                "unsupported endpoint scheme '{}'",
                url.scheme()
            ))),
            Err(e) => Err(Error::InvalidRequest(format!(
                "endpoint '{}' is not a valid URL: {}",
                self.endpoint, e
            ))),
        }
    }
}

impl std::fmt::Debug for JobRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRequest")
            .field("endpoint", &self.endpoint)
            .field("payload", &self.payload)
            .field("auth_token", &redact_token(&self.auth_token))
            .field("poll_endpoint_template", &self.poll_endpoint_template)
            .finish()
    }
}

/// A remote job as last observed by the client
///
/// Created by `submit`, advanced only by `poll`. `output` is non-empty exactly when the
/// status is `Succeeded`, and `failure_reason` is only set when it is `Failed`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Job {
    id: String,
    status: JobStatus,
    output: Vec<String>,
    failure_reason: Option<String>,
    attempts_made: u32,
    progress: Option<f64>,
    status_url: Option<String>,
}

impl Job {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Created,
            output: Vec::new(),
            failure_reason: None,
            attempts_made: 0,
            progress: None,
            status_url: None,
        }
    }

    /// Remote job identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current status
    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Whether the job reached a terminal state
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Artifact references (URLs or inline base64); empty unless succeeded
    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// Remote failure reason; only set when failed
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Status checks issued so far
    pub fn attempts_made(&self) -> u32 {
        self.attempts_made
    }

    /// Last progress fraction reported by the remote
    pub fn progress(&self) -> Option<f64> {
        self.progress
    }

    /// Direct status URL returned at creation, if any
    pub fn status_url(&self) -> Option<&str> {
        self.status_url.as_deref()
    }

    pub(crate) fn record_attempt(&mut self) {
        self.attempts_made += 1;
    }

    pub(crate) fn mark_timed_out(&mut self) {
        if !self.status.is_terminal() {
            self.status = JobStatus::TimedOut;
        }
    }

    /// Fold a remote observation into the job
    ///
    /// Terminal jobs are left untouched and a live job never moves back from
    /// `Processing` to `Created`.
    pub(crate) fn apply(&mut self, observation: Observation) {
        if self.status.is_terminal() {
            return;
        }

        if self.status_url.is_none() {
            self.status_url = observation.status_url;
        }
        if observation.progress.is_some() {
            self.progress = observation.progress;
        }

        match observation.status {
            JobStatus::Created | JobStatus::Processing => {
                if self.status != JobStatus::Processing {
                    self.status = observation.status;
                }
            }
            JobStatus::Succeeded if observation.output.is_empty() => {
                self.status = JobStatus::Failed;
                self.failure_reason = Some("remote reported success without output".to_string());
            }
            JobStatus::Succeeded => {
                self.status = JobStatus::Succeeded;
                self.output = observation.output;
                self.progress = Some(1.0);
            }
            JobStatus::Failed => {
                self.status = JobStatus::Failed;
                self.failure_reason = Some(
                    observation
                        .failure_reason
                        .unwrap_or_else(|| "unknown error".to_string()),
                );
            }
            JobStatus::Canceled => self.status = JobStatus::Canceled,
            JobStatus::TimedOut => self.mark_timed_out(),
        }
    }
}

/// A single status reading parsed from a remote response
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Observation {
    pub status: JobStatus,
    pub output: Vec<String>,
    pub failure_reason: Option<String>,
    pub progress: Option<f64>,
    pub status_url: Option<String>,
}

impl Observation {
    #[cfg(test)]
    pub fn status(status: JobStatus) -> Self {
        Self {
            status,
            output: Vec::new(),
            failure_reason: None,
            progress: None,
            status_url: None,
        }
    }
}

/// A retrieved artifact
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    /// The output reference this artifact came from (inline payloads are truncated)
    pub reference: String,
    /// Raw artifact bytes, unmodified
    pub bytes: Vec<u8>,
    /// MIME type reported by the server or the data URL, if any
    pub mime_type: Option<String>,
    /// File extension inferred from the reference or MIME type, without the dot
    pub extension: String,
}

/// Result of a full submit → poll → fetch chain
#[derive(Clone, Debug)]
pub struct GenerationOutcome {
    /// The job in its terminal state
    pub job: Job,
    /// One artifact per output reference; empty unless the job succeeded
    pub artifacts: Vec<Artifact>,
}

impl GenerationOutcome {
    /// Whether the job succeeded and produced artifacts
    pub fn is_success(&self) -> bool {
        self.job.status() == JobStatus::Succeeded && !self.artifacts.is_empty()
    }
}

/// How a batch of independent requests is scheduled
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BatchSpacing {
    /// Run every chain concurrently
    #[default]
    Parallel,
    /// Run chains one after another, waiting `delay` between submissions
    Serialized {
        /// Pause before every submission after the first
        delay: Duration,
    },
}

/// Event emitted while driving a job
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    /// Creation call accepted
    Submitted {
        /// Provider name
        provider: String,
        /// Remote job id
        job_id: String,
        /// Status returned by the creation call
        status: JobStatus,
    },

    /// Creation call rate limited; the client is waiting before its single retry
    RateLimited {
        /// Provider name
        provider: String,
        /// Total wait, including the safety buffer
        #[serde(with = "duration_millis")]
        wait: Duration,
    },

    /// A status check finished (successfully or not)
    Polled {
        /// Remote job id
        job_id: String,
        /// Attempt number, starting at 1
        attempt: u32,
        /// Status after this check
        status: JobStatus,
        /// Progress fraction, if known
        progress: Option<f64>,
    },

    /// The job reached a terminal state
    Finished {
        /// Remote job id
        job_id: String,
        /// Terminal status
        status: JobStatus,
        /// Status checks issued
        attempts: u32,
    },

    /// An artifact was downloaded or decoded
    ArtifactFetched {
        /// Remote job id
        job_id: String,
        /// Artifact size in bytes
        size_bytes: u64,
        /// Inferred extension
        extension: String,
    },
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }
}
