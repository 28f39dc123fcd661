//! Host application collaborators
//!
//! The job client itself never touches disk or the host's project. These seams let an
//! embedding application keep API keys in its own settings, spill artifacts to temporary
//! files, and hand those files to its media importer:
//!
//! - [`SettingsStore`]: credential lookup ([`MemorySettings`] for tests and simple hosts)
//! - [`ArtifactStore`]: artifact persistence ([`TempDirStore`] writes uniquely named files)
//! - [`MediaImporter`]: import of a persisted file, answered with an [`ImportReport`]
//!
//! [`persist_and_import`] chains the last two for every artifact of a finished job.

use crate::error::{Error, Result};
use crate::types::{Artifact, GenerationOutcome};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tokio::io::AsyncWriteExt;

/// Filename collisions tolerated before a write gives up
const MAX_NAME_COLLISIONS: u32 = 1000;

/// Reply the host bridge produces when the script itself blew up
const SCRIPT_FAILURE_REPLY: &str = "EvalScript error.";

/// Key/value settings owned by the host (API keys live here)
pub trait SettingsStore: Send + Sync {
    /// Read a setting
    fn get_setting(&self, key: &str) -> Option<String>;

    /// Write a setting
    fn set_setting(&self, key: &str, value: &str) -> Result<()>;
}

/// In-memory [`SettingsStore`]
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: RwLock<HashMap<String, String>>,
}

impl MemorySettings {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn get_setting(&self, key: &str) -> Option<String> {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        values.get(key).cloned()
    }

    fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Look up the API key for a provider
///
/// A missing or blank setting is reported as [`Error::InvalidRequest`], the same error a
/// request with an empty token would produce.
pub fn resolve_auth_token(store: &dyn SettingsStore, key: &str) -> Result<String> {
    match store.get_setting(key) {
        Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        _ => Err(Error::InvalidRequest(format!(
            "no API key configured under setting '{}'",
            key
        ))),
    }
}

/// Persists artifacts somewhere the host can import them from
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Write an artifact and return where it landed
    async fn write(&self, artifact: &Artifact) -> Result<PathBuf>;

    /// Read a previously written artifact back
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;
}

/// [`ArtifactStore`] writing `<prefix>_<unix-millis>[_<n>].<ext>` files into one directory
#[derive(Clone, Debug)]
pub struct TempDirStore {
    dir: PathBuf,
    prefix: String,
}

impl TempDirStore {
    /// Store files in `dir`, created on first write if needed
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    /// Store files in the system temporary directory
    pub fn system(prefix: impl Into<String>) -> Self {
        Self::new(std::env::temp_dir(), prefix)
    }

    /// Directory files are written to
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(&self, stamp: i64, collision: u32, extension: &str) -> String {
        if collision == 0 {
            format!("{}_{}.{}", self.prefix, stamp, extension)
        } else {
            format!("{}_{}_{}.{}", self.prefix, stamp, collision, extension)
        }
    }
}

/// Write `bytes` through `writer`, removing the file at `path` if the write fails
async fn write_or_discard<W>(mut writer: W, path: &Path, bytes: &[u8]) -> Result<()>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    let written = match writer.write_all(bytes).await {
        Ok(()) => writer.flush().await,
        Err(e) => Err(e),
    };
    drop(writer);

    if let Err(e) = written {
        tokio::fs::remove_file(path).await.ok();
        tracing::warn!(path = %path.display(), error = %e, "artifact write failed");
        return Err(e.into());
    }
    Ok(())
}

#[async_trait]
impl ArtifactStore for TempDirStore {
    async fn write(&self, artifact: &Artifact) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let stamp = chrono::Utc::now().timestamp_millis();
        for collision in 0..MAX_NAME_COLLISIONS {
            let path = self
                .dir
                .join(self.file_name(stamp, collision, &artifact.extension));

            let file = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            };
            write_or_discard(file, &path, &artifact.bytes).await?;

            tracing::debug!(
                path = %path.display(),
                size = artifact.bytes.len(),
                "artifact written"
            );
            return Ok(path);
        }

        Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!(
                "no free file name for prefix '{}' in {}",
                self.prefix,
                self.dir.display()
            ),
        )))
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(path).await?)
    }
}

/// Outcome of handing a file to the host's importer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportReport {
    /// Whether the host accepted the file
    pub success: bool,
    /// Error text on failure, or whatever detail the host returned on success
    pub message: Option<String>,
}

impl ImportReport {
    /// Interpret a raw reply from the host scripting bridge
    ///
    /// Understands `{"success": true, ...}` / `{"success": false, "error": "..."}` JSON,
    /// the plain string `success`, and `Error: ...` strings. Empty, `null`, `undefined` and
    /// the bridge's own script-failure reply count as failures; any other text is taken
    /// as success.
    pub fn parse(reply: &str) -> Self {
        let reply = reply.trim();
        if reply.is_empty() || reply == "null" || reply == "undefined" {
            return Self::failed("host returned no result");
        }
        if reply == SCRIPT_FAILURE_REPLY {
            return Self::failed("host script failed to evaluate");
        }

        if reply.starts_with('{')
            && let Ok(value) = serde_json::from_str::<serde_json::Value>(reply)
        {
            let success = value
                .get("success")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false);
            let message = ["error", "message", "layerName"]
                .iter()
                .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
                .map(str::to_string);
            return Self { success, message };
        }

        if let Some(rest) = reply.strip_prefix("Error:") {
            return Self::failed(rest.trim());
        }
        if reply.eq_ignore_ascii_case("success") {
            return Self {
                success: true,
                message: None,
            };
        }

        Self {
            success: true,
            message: Some(reply.to_string()),
        }
    }

    /// Turn a refusal into [`Error::Import`]
    pub fn into_result(self) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(Error::Import(
                self.message.unwrap_or_else(|| "unknown import failure".to_string()),
            ))
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

/// Imports a persisted file into the host application
#[async_trait]
pub trait MediaImporter: Send + Sync {
    /// Import the file at `path`
    async fn import_media(&self, path: &Path) -> Result<ImportReport>;
}

/// One artifact after persistence and import
#[derive(Clone, Debug)]
pub struct ImportedArtifact {
    /// Where the artifact was written
    pub path: PathBuf,
    /// What the host said about it
    pub report: ImportReport,
}

/// Write every artifact of an outcome and import it
///
/// Reports come back in artifact order; a refused import is reported, not raised. Stops at
/// the first store or importer error.
pub async fn persist_and_import(
    outcome: &GenerationOutcome,
    store: &dyn ArtifactStore,
    importer: &dyn MediaImporter,
) -> Result<Vec<ImportedArtifact>> {
    let mut imported = Vec::with_capacity(outcome.artifacts.len());
    for artifact in &outcome.artifacts {
        let path = store.write(artifact).await?;
        let report = importer.import_media(&path).await?;
        if report.success {
            tracing::info!(job_id = %outcome.job.id(), path = %path.display(), "artifact imported");
        } else {
            tracing::warn!(
                job_id = %outcome.job.id(),
                path = %path.display(),
                reason = report.message.as_deref().unwrap_or(""),
                "host refused artifact"
            );
        }
        imported.push(ImportedArtifact { path, report });
    }
    Ok(imported)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Job, JobStatus, Observation};
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn artifact(bytes: &[u8], extension: &str) -> Artifact {
        Artifact {
            reference: "https://cdn.example.com/out".to_string(),
            bytes: bytes.to_vec(),
            mime_type: None,
            extension: extension.to_string(),
        }
    }

    #[derive(Default)]
    struct RecordingImporter {
        imported: Mutex<Vec<PathBuf>>,
        reply: &'static str,
    }

    #[async_trait]
    impl MediaImporter for RecordingImporter {
        async fn import_media(&self, path: &Path) -> Result<ImportReport> {
            self.imported.lock().unwrap().push(path.to_path_buf());
            Ok(ImportReport::parse(self.reply))
        }
    }

    #[test]
    fn test_resolve_auth_token() {
        let settings = MemorySettings::new();
        assert!(matches!(
            resolve_auth_token(&settings, "replicate_api_key"),
            Err(Error::InvalidRequest(_))
        ));

        settings.set_setting("replicate_api_key", "  ").unwrap();
        assert!(resolve_auth_token(&settings, "replicate_api_key").is_err());

        settings
            .set_setting("replicate_api_key", " r8_abc123 ")
            .unwrap();
        assert_eq!(
            resolve_auth_token(&settings, "replicate_api_key").unwrap(),
            "r8_abc123"
        );
    }

    #[test]
    fn test_import_report_parse() {
        assert_eq!(
            ImportReport::parse(r#"{"success": true, "layerName": "Generated 1"}"#),
            ImportReport {
                success: true,
                message: Some("Generated 1".into())
            }
        );
        assert_eq!(
            ImportReport::parse(r#"{"success": false, "error": "No active composition"}"#),
            ImportReport {
                success: false,
                message: Some("No active composition".into())
            }
        );
        assert!(ImportReport::parse("success").success);
        assert_eq!(
            ImportReport::parse("Error: file is locked").message.as_deref(),
            Some("file is locked")
        );
        assert!(!ImportReport::parse("Error: file is locked").success);
        assert!(!ImportReport::parse("EvalScript error.").success);
        assert!(!ImportReport::parse("").success);
        assert!(!ImportReport::parse("undefined").success);
    }

    #[test]
    fn test_import_report_into_result() {
        let err = ImportReport::parse("Error: disk full")
            .into_result()
            .unwrap_err();
        assert!(matches!(err, Error::Import(ref m) if m == "disk full"));
        assert!(ImportReport::parse("success").into_result().is_ok());
    }

    #[tokio::test]
    async fn test_temp_dir_store_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = TempDirStore::new(temp_dir.path().join("genjob"), "replicate");

        let path = store.write(&artifact(b"pixels", "png")).await.unwrap();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("replicate_"));
        assert!(name.ends_with(".png"));
        assert_eq!(store.read(&path).await.unwrap(), b"pixels");
    }

    struct BrokenDisk;

    impl tokio::io::AsyncWrite for BrokenDisk {
        fn poll_write(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            _buf: &[u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            std::task::Poll::Ready(Err(std::io::Error::other("no space left on device")))
        }

        fn poll_flush(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("replicate_1.png");
        tokio::fs::write(&path, b"half").await.unwrap();

        let err = write_or_discard(BrokenDisk, &path, b"pixels")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_temp_dir_store_never_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let store = TempDirStore::new(temp_dir.path(), "variation");

        let mut paths = Vec::new();
        for i in 0..5u8 {
            paths.push(store.write(&artifact(&[i], "jpg")).await.unwrap());
        }
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 5);
        for path in &paths {
            assert_eq!(store.read(path).await.unwrap().len(), 1);
        }
    }

    #[tokio::test]
    async fn test_persist_and_import() {
        let temp_dir = TempDir::new().unwrap();
        let store = TempDirStore::new(temp_dir.path(), "kling");
        let importer = RecordingImporter {
            reply: "success",
            ..Default::default()
        };

        let mut job = Job::new("k1");
        job.apply(Observation {
            output: vec!["https://cdn.example.com/a.mp4".into()],
            ..Observation::status(JobStatus::Succeeded)
        });
        let outcome = GenerationOutcome {
            job,
            artifacts: vec![artifact(b"moov", "mp4"), artifact(b"mdat", "mp4")],
        };

        let imported = persist_and_import(&outcome, &store, &importer)
            .await
            .unwrap();
        assert_eq!(imported.len(), 2);
        assert!(imported.iter().all(|i| i.report.success));
        assert_eq!(
            *importer.imported.lock().unwrap(),
            imported.iter().map(|i| i.path.clone()).collect::<Vec<_>>()
        );
        assert_eq!(
            tokio::fs::read(&imported[1].path).await.unwrap(),
            b"mdat"
        );
    }

    #[tokio::test]
    async fn test_refused_import_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let store = TempDirStore::new(temp_dir.path(), "bg");
        let importer = RecordingImporter {
            reply: r#"{"success": false, "error": "No layer selected"}"#,
            ..Default::default()
        };
        let outcome = GenerationOutcome {
            job: Job::new("b1"),
            artifacts: vec![artifact(b"png", "png")],
        };

        let imported = persist_and_import(&outcome, &store, &importer)
            .await
            .unwrap();
        assert!(!imported[0].report.success);
        assert_eq!(
            imported[0].report.message.as_deref(),
            Some("No layer selected")
        );
    }
}
