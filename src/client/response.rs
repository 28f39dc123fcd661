//! Interpretation of provider responses through the configured field pointers

use crate::config::{JOB_ID_PLACEHOLDER, ProviderConfig, ResponseFields};
use crate::error::{Error, Result};
use crate::transport::HttpResponse;
use crate::types::{Job, JobRequest, JobStatus, Observation};
use crate::utils::{extract_references, pointer_f64, pointer_string, truncate};
use serde_json::Value;
use std::time::Duration;

/// Longest response body echoed into errors
const MAX_BODY_ECHO: usize = 2048;

/// Longest server-advised wait honoured before resubmitting
const MAX_RETRY_AFTER: Duration = Duration::from_secs(600);

/// Read the status-related fields of a creation or status response
pub(super) fn parse_observation(body: &Value, fields: &ResponseFields) -> Observation {
    let status = match pointer_string(body, &fields.status) {
        None => JobStatus::Created,
        Some(raw) => JobStatus::from_remote(&raw).unwrap_or_else(|| {
            tracing::warn!(status = %raw, "unrecognised remote status, treating as processing");
            JobStatus::Processing
        }),
    };

    let output = body
        .pointer(&fields.output)
        .map(extract_references)
        .unwrap_or_default();

    let failure_reason = fields
        .failure
        .iter()
        .find_map(|pointer| pointer_string(body, pointer));

    let progress = fields
        .progress
        .as_deref()
        .and_then(|pointer| pointer_f64(body, pointer))
        .map(|p| p.clamp(0.0, 1.0));

    let status_url = fields
        .status_url
        .as_deref()
        .and_then(|pointer| pointer_string(body, pointer));

    Observation {
        status,
        output,
        failure_reason,
        progress,
        status_url,
    }
}

/// Parse a 2xx body as JSON
pub(super) fn json_body(response: &HttpResponse) -> Result<Value> {
    response.json_body().map_err(|e| {
        Error::MalformedResponse(format!(
            "expected JSON body ({}): {}",
            e,
            truncate(&response.text(), MAX_BODY_ECHO)
        ))
    })
}

/// Build a job from a successful creation response
pub(super) fn job_from_creation(body: &Value, fields: &ResponseFields) -> Result<Job> {
    let id = pointer_string(body, &fields.id).ok_or_else(|| {
        Error::MalformedResponse(format!(
            "creation response has no job id at '{}': {}",
            fields.id,
            truncate(&body.to_string(), MAX_BODY_ECHO)
        ))
    })?;
    let mut job = Job::new(id);
    job.apply(parse_observation(body, fields));
    Ok(job)
}

/// Response body as text, bounded for error messages
pub(super) fn body_echo(response: &HttpResponse) -> String {
    truncate(&response.text(), MAX_BODY_ECHO)
}

/// Error for a non-2xx response
pub(super) fn rejected(response: &HttpResponse) -> Error {
    Error::RemoteRejected {
        status_code: response.status,
        body: body_echo(response),
    }
}

/// Server-advised delay on a 429: `Retry-After` header first, then the body field
///
/// Negative, NaN and values above [`MAX_RETRY_AFTER`] are not a usable hint.
pub(super) fn retry_after_hint(response: &HttpResponse, fields: &ResponseFields) -> Option<Duration> {
    if let Some(delay) = response
        .header("retry-after")
        .and_then(|v| v.trim().parse::<f64>().ok())
        .and_then(usable_delay)
    {
        return Some(delay);
    }

    let pointer = fields.retry_after.as_deref()?;
    let body = response.json_body().ok()?;
    pointer_f64(&body, pointer).and_then(usable_delay)
}

fn usable_delay(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|delay| *delay <= MAX_RETRY_AFTER)
}

/// Status URL for a job: embedded URL, then the request template, then the provider's
pub(super) fn status_url(job: &Job, request: &JobRequest, provider: &ProviderConfig) -> Result<String> {
    if let Some(url) = job.status_url() {
        return Ok(url.to_string());
    }

    let template = request
        .poll_endpoint_template
        .as_deref()
        .or(provider.poll_endpoint_template.as_deref())
        .ok_or_else(|| {
            Error::InvalidRequest(format!(
                "job {} has no status URL and no poll endpoint template is configured",
                job.id()
            ))
        })?;

    if !template.contains(JOB_ID_PLACEHOLDER) {
        return Err(Error::InvalidRequest(format!(
            "poll endpoint template '{}' has no {} placeholder",
            template, JOB_ID_PLACEHOLDER
        )));
    }
    Ok(template.replace(JOB_ID_PLACEHOLDER, job.id()))
}
