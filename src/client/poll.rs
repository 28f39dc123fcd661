//! Status polling

use super::JobPollingClient;
use super::response::{json_body, parse_observation, rejected, status_url};
use crate::error::Result;
use crate::transport::HttpRequest;
use crate::types::{Job, JobEvent, JobRequest, Observation};

impl JobPollingClient {
    /// Poll a live job until it reaches a terminal state
    ///
    /// Sleeps the provider's poll interval before each status check. Every check counts as
    /// one attempt, including checks that fail (transport error, non-2xx, unreadable body);
    /// a failed check is logged and the loop moves on. Once `attempts_made` reaches the
    /// provider's ceiling with no terminal status observed, the job is classified
    /// `TimedOut` locally and returned. This is not an error: the remote job may still
    /// be running.
    ///
    /// Jobs that are already terminal are returned unchanged without any network call.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRequest`](crate::Error::InvalidRequest) when the request is invalid or
    /// no status URL can be derived for the job.
    pub async fn poll(&self, mut job: Job, request: &JobRequest) -> Result<Job> {
        if job.is_terminal() {
            tracing::debug!(job_id = %job.id(), status = %job.status(), "job already terminal");
            return Ok(job);
        }
        request.validate()?;
        let url = status_url(&job, request, &self.provider)?;

        let ceiling = self.provider.poll.max_attempts;
        let interval = self.provider.poll.interval;
        tracing::debug!(
            job_id = %job.id(),
            url = %url,
            interval_ms = interval.as_millis(),
            ceiling,
            "polling job"
        );

        while !job.is_terminal() {
            if job.attempts_made() >= ceiling {
                job.mark_timed_out();
                tracing::warn!(
                    job_id = %job.id(),
                    attempts = job.attempts_made(),
                    "poll ceiling reached, job timed out"
                );
                break;
            }

            tokio::time::sleep(interval).await;
            job.record_attempt();

            match self.check_status(&url, request).await {
                Ok(observation) => job.apply(observation),
                Err(e) => tracing::warn!(
                    job_id = %job.id(),
                    attempt = job.attempts_made(),
                    error = %e,
                    "status check failed"
                ),
            }

            tracing::debug!(
                job_id = %job.id(),
                attempt = job.attempts_made(),
                status = %job.status(),
                progress = ?job.progress(),
                "status checked"
            );
            self.emit(JobEvent::Polled {
                job_id: job.id().to_string(),
                attempt: job.attempts_made(),
                status: job.status(),
                progress: job.progress(),
            });
        }

        tracing::info!(
            job_id = %job.id(),
            status = %job.status(),
            attempts = job.attempts_made(),
            "job finished"
        );
        self.emit(JobEvent::Finished {
            job_id: job.id().to_string(),
            status: job.status(),
            attempts: job.attempts_made(),
        });
        Ok(job)
    }

    /// One status-check call
    async fn check_status(&self, url: &str, request: &JobRequest) -> Result<Observation> {
        let mut http = HttpRequest::get(url);
        http.headers = self.api_headers(request);

        let response = self.transport.send(http).await?;
        if !response.is_success() {
            return Err(rejected(&response));
        }
        let body = json_body(&response)?;
        Ok(parse_observation(&body, &self.provider.fields))
    }
}
