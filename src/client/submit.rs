//! Job creation

use super::JobPollingClient;
use super::response::{body_echo, job_from_creation, json_body, rejected, retry_after_hint};
use crate::error::{Error, Result};
use crate::retry::{IsRetryable, with_retry};
use crate::transport::{HttpRequest, HttpResponse};
use crate::types::{Job, JobEvent, JobRequest};
use crate::utils::redact_token;

impl JobPollingClient {
    /// Create a remote job
    ///
    /// The returned job is either live (`Created`/`Processing`, to be handed to
    /// [`poll`](Self::poll)) or already terminal when the remote finished synchronously.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidRequest`] for an empty endpoint or token, before any network call
    /// - [`Error::Transport`] when every connection attempt failed
    /// - [`Error::RemoteRejected`] for any other non-2xx response, including a 429 that
    ///   persists after the single deferred retry
    /// - [`Error::MalformedResponse`] when a 2xx body carries no job id
    pub async fn submit(&self, request: &JobRequest) -> Result<Job> {
        request.validate()?;

        tracing::debug!(
            provider = %self.provider.name,
            endpoint = %request.endpoint,
            token = %redact_token(&request.auth_token),
            "submitting job"
        );

        let mut deferred = false;
        loop {
            let response = self.send_creation(request).await?;

            if response.is_success() {
                let body = json_body(&response)?;
                let job = job_from_creation(&body, &self.provider.fields)?;
                tracing::info!(
                    provider = %self.provider.name,
                    job_id = %job.id(),
                    status = %job.status(),
                    "job submitted"
                );
                self.emit(JobEvent::Submitted {
                    provider: self.provider.name.clone(),
                    job_id: job.id().to_string(),
                    status: job.status(),
                });
                return Ok(job);
            }

            match self.classify_rejection(&response) {
                Error::RateLimited { retry_after, body } => {
                    if deferred {
                        tracing::warn!(
                            provider = %self.provider.name,
                            "still rate limited after deferred retry"
                        );
                        return Err(Error::RemoteRejected {
                            status_code: response.status,
                            body,
                        });
                    }
                    deferred = true;

                    let wait = retry_after.saturating_add(self.provider.rate_limit.safety_buffer);
                    tracing::warn!(
                        provider = %self.provider.name,
                        delay_ms = wait.as_millis(),
                        "rate limited, deferring submission"
                    );
                    self.emit(JobEvent::RateLimited {
                        provider: self.provider.name.clone(),
                        wait,
                    });
                    tokio::time::sleep(wait).await;
                }
                other => {
                    tracing::warn!(
                        provider = %self.provider.name,
                        status = response.status,
                        "job creation rejected"
                    );
                    return Err(other);
                }
            }
        }
    }

    /// Send the creation call, retrying connection-level failures
    async fn send_creation(&self, request: &JobRequest) -> Result<HttpResponse> {
        let retry = &self.provider.submit_retry;
        with_retry(retry, || self.transport.send(self.creation_request(request)))
            .await
            .map_err(|e| {
                if e.is_retryable() {
                    Error::Transport {
                        attempts: retry.max_attempts.max(1),
                        reason: e.to_string(),
                    }
                } else {
                    e
                }
            })
    }

    fn creation_request(&self, request: &JobRequest) -> HttpRequest {
        let mut http = HttpRequest::post_json(&request.endpoint, request.payload.clone());
        http.headers = self.api_headers(request);
        if self.provider.prefer_wait {
            http = http.header("Prefer", "wait");
        }
        http
    }

    /// A 429 with a usable delay hint becomes `RateLimited`; everything else is rejected
    fn classify_rejection(&self, response: &HttpResponse) -> Error {
        if response.status == 429
            && self.provider.rate_limit.enabled
            && let Some(retry_after) = retry_after_hint(response, &self.provider.fields)
        {
            return Error::RateLimited {
                retry_after,
                body: body_echo(response),
            };
        }
        rejected(response)
    }
}
