//! Full generation chains

use super::JobPollingClient;
use crate::error::Result;
use crate::types::{BatchSpacing, GenerationOutcome, JobEvent, JobRequest, JobStatus};
use futures::future::join_all;

impl JobPollingClient {
    /// Submit, poll until terminal, and fetch every artifact of a succeeded job
    ///
    /// A job that ends `Failed`, `Canceled` or `TimedOut` is returned with no artifacts;
    /// inspect [`GenerationOutcome::job`] to tell them apart.
    ///
    /// # Errors
    ///
    /// Anything [`submit`](Self::submit) or [`poll`](Self::poll) can return, plus
    /// [`Error::ArtifactUnavailable`](crate::Error::ArtifactUnavailable) when a succeeded
    /// job's output cannot be retrieved.
    pub async fn run(&self, request: &JobRequest) -> Result<GenerationOutcome> {
        let job = self.submit(request).await?;
        let job = if job.is_terminal() {
            tracing::debug!(job_id = %job.id(), "job completed synchronously");
            self.emit(JobEvent::Finished {
                job_id: job.id().to_string(),
                status: job.status(),
                attempts: job.attempts_made(),
            });
            job
        } else {
            self.poll(job, request).await?
        };

        let mut artifacts = Vec::new();
        if job.status() == JobStatus::Succeeded {
            let fetcher = self.fetcher(request);
            for reference in job.output() {
                let artifact = fetcher.fetch_artifact(reference).await?;
                self.emit(JobEvent::ArtifactFetched {
                    job_id: job.id().to_string(),
                    size_bytes: artifact.bytes.len() as u64,
                    extension: artifact.extension.clone(),
                });
                artifacts.push(artifact);
            }
        } else {
            tracing::warn!(
                job_id = %job.id(),
                status = %job.status(),
                reason = job.failure_reason().unwrap_or(""),
                "job did not succeed"
            );
        }

        Ok(GenerationOutcome { job, artifacts })
    }

    /// Run independent chains, e.g. several variations of one prompt
    ///
    /// Results come back in input order. A failing chain does not stop the others.
    pub async fn run_batch(
        &self,
        requests: &[JobRequest],
        spacing: BatchSpacing,
    ) -> Vec<Result<GenerationOutcome>> {
        match spacing {
            BatchSpacing::Parallel => join_all(requests.iter().map(|r| self.run(r))).await,
            BatchSpacing::Serialized { delay } => {
                let mut results = Vec::with_capacity(requests.len());
                for (index, request) in requests.iter().enumerate() {
                    if index > 0 {
                        tracing::debug!(
                            index,
                            delay_ms = delay.as_millis(),
                            "spacing batch submission"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    results.push(self.run(request).await);
                }
                results
            }
        }
    }
}
