//! Artifact retrieval for succeeded jobs
//!
//! An output reference is either an http(s) URL, downloaded with a single GET, or an inline
//! payload (`data:` URL or bare base64) decoded locally without touching the network.
//! Bytes are returned exactly as served or decoded; no format validation happens here.

use crate::error::{Error, Result};
use crate::transport::{HttpRequest, Transport};
use crate::types::Artifact;
use crate::utils::{decode_inline, describe_reference, infer_extension, is_http_url};
use std::sync::Arc;

/// Downloads or decodes the artifacts a succeeded job points at
#[derive(Clone)]
pub struct ArtifactFetcher {
    transport: Arc<dyn Transport>,
    auth: Option<(String, String)>,
}

impl ArtifactFetcher {
    /// Create a fetcher that sends no credentials
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            auth: None,
        }
    }

    /// Attach an auth header to every download
    pub fn with_auth(mut self, header: impl Into<String>, value: impl Into<String>) -> Self {
        self.auth = Some((header.into(), value.into()));
        self
    }

    /// Produce the raw bytes behind an output reference
    ///
    /// Any transport failure or non-2xx response fails with [`Error::ArtifactUnavailable`];
    /// there is no automatic retry.
    pub async fn fetch(&self, reference: &str) -> Result<Vec<u8>> {
        self.fetch_artifact(reference)
            .await
            .map(|artifact| artifact.bytes)
    }

    /// Like [`fetch`](Self::fetch), also reporting MIME type and a file extension
    pub async fn fetch_artifact(&self, reference: &str) -> Result<Artifact> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(unavailable(reference, "empty output reference"));
        }

        if is_http_url(reference) {
            return self.download(reference).await;
        }

        let (bytes, mime_type) =
            decode_inline(reference).map_err(|reason| unavailable(reference, reason))?;
        tracing::debug!(size = bytes.len(), "decoded inline artifact");
        Ok(Artifact {
            reference: describe_reference(reference),
            extension: infer_extension(reference, mime_type.as_deref()),
            bytes,
            mime_type,
        })
    }

    async fn download(&self, url: &str) -> Result<Artifact> {
        let mut request = HttpRequest::get(url);
        if let Some((name, value)) = &self.auth {
            request = request.header(name.clone(), value.clone());
        }

        let response = self.transport.send(request).await.map_err(|e| {
            tracing::warn!(url = %url, error = %e, "artifact download failed");
            unavailable(url, e.to_string())
        })?;

        if !response.is_success() {
            tracing::warn!(url = %url, status = response.status, "artifact download rejected");
            return Err(unavailable(url, format!("HTTP {}", response.status)));
        }

        let mime_type = response.header("content-type").map(str::to_string);
        tracing::debug!(url = %url, size = response.body.len(), "downloaded artifact");
        Ok(Artifact {
            reference: url.to_string(),
            extension: infer_extension(url, mime_type.as_deref()),
            bytes: response.body,
            mime_type,
        })
    }
}

impl std::fmt::Debug for ArtifactFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactFetcher")
            .field("auth_header", &self.auth.as_ref().map(|(name, _)| name))
            .finish_non_exhaustive()
    }
}

fn unavailable(reference: &str, reason: impl Into<String>) -> Error {
    Error::ArtifactUnavailable {
        reference: describe_reference(reference),
        reason: reason.into(),
    }
}
