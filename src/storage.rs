//! Persistence for the history list and PNG downloads.
//!
//! The history is a single serialized value behind one key. [`FileStore`]
//! maps that key to a JSON file in the user's data directory; [`MemoryStore`]
//! keeps it in memory for `--no-history` sessions and tests.

use crate::render::{Artifact, RenderError};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use time::macros::format_description;
use time::OffsetDateTime;

const APP_DIR: &str = "qrgen-cli";
const HISTORY_FILE: &str = "history.json";
const LOG_FILE: &str = "qrgen.log";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("history storage I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not determine a data directory")]
    NoDataDir,
}

/// Key-value style store holding the serialized history list.
pub trait HistoryStore {
    /// Returns `None` when nothing has been stored yet.
    fn read(&self) -> Result<Option<String>, StorageError>;
    /// Replace the stored value.
    fn write(&mut self, value: &str) -> Result<(), StorageError>;
    /// Remove the stored value entirely.
    fn remove(&mut self) -> Result<(), StorageError>;
}

impl<T: HistoryStore + ?Sized> HistoryStore for Box<T> {
    fn read(&self) -> Result<Option<String>, StorageError> {
        (**self).read()
    }

    fn write(&mut self, value: &str) -> Result<(), StorageError> {
        (**self).write(value)
    }

    fn remove(&mut self) -> Result<(), StorageError> {
        (**self).remove()
    }
}

/// Store owned by the UI thread in TUI mode.
pub type BoxedStore = Box<dyn HistoryStore + Send>;

#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStore for FileStore {
    fn read(&self) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(&self.path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, value: &str) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Write-then-rename so readers never see a truncated file.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn remove(&mut self) -> Result<(), StorageError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    value: Option<String>,
}

impl MemoryStore {
    #[cfg(test)]
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
        }
    }
}

impl HistoryStore for MemoryStore {
    fn read(&self) -> Result<Option<String>, StorageError> {
        Ok(self.value.clone())
    }

    fn write(&mut self, value: &str) -> Result<(), StorageError> {
        self.value = Some(value.to_string());
        Ok(())
    }

    fn remove(&mut self) -> Result<(), StorageError> {
        self.value = None;
        Ok(())
    }
}

/// Base directory for all files this tool keeps.
pub fn base_dir() -> Result<PathBuf, StorageError> {
    dirs::data_dir()
        .map(|d| d.join(APP_DIR))
        .ok_or(StorageError::NoDataDir)
}

pub fn default_history_path() -> Result<PathBuf, StorageError> {
    Ok(base_dir()?.join(HISTORY_FILE))
}

pub fn default_log_path() -> Result<PathBuf, StorageError> {
    Ok(base_dir()?.join(LOG_FILE))
}

/// Timestamped download name, e.g. `qr-2024-01-15T14-30-45.png`.
pub fn download_filename(now: OffsetDateTime) -> String {
    let fmt = format_description!("[year]-[month]-[day]T[hour]-[minute]-[second]");
    let stamp = now
        .to_offset(time::UtcOffset::UTC)
        .format(fmt)
        .unwrap_or_else(|_| now.unix_timestamp().to_string());
    format!("qr-{stamp}.png")
}

/// Write the artifact as a PNG file at `path`.
pub fn export_png(path: &Path, artifact: &Artifact) -> Result<()> {
    let png = artifact.png_bytes().context("encode PNG")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    std::fs::write(path, png).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("There is no QR code to download")]
    NoArtifact,
    #[error("Error downloading the QR code: {0}")]
    Render(#[from] RenderError),
    #[error("Error downloading the QR code: {0}")]
    Io(#[from] std::io::Error),
}

/// Save the currently displayed artifact into `dir` under a timestamped name.
pub fn download_artifact(
    dir: &Path,
    artifact: Option<&Artifact>,
    now: OffsetDateTime,
) -> Result<PathBuf, DownloadError> {
    let artifact = artifact.ok_or(DownloadError::NoArtifact)?;
    let png = artifact.png_bytes()?;
    std::fs::create_dir_all(dir)?;
    let path = dir.join(download_filename(now));
    std::fs::write(&path, png)?;
    tracing::info!(path = %path.display(), "QR code downloaded");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Rgb;
    use crate::render::{QrCodeEncoder, QrEncoder, RenderRequest, ERROR_CORRECTION};
    use time::macros::datetime;

    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

    fn sample_artifact() -> Artifact {
        QrCodeEncoder
            .render(&RenderRequest {
                text: "https://example.com".into(),
                width: 200,
                height: 200,
                dark: Rgb::BLACK,
                light: Rgb::WHITE,
                ec_level: ERROR_CORRECTION,
            })
            .unwrap()
    }

    #[test]
    fn file_store_round_trip_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path().join("nested").join("history.json"));
        assert_eq!(store.read().unwrap(), None);

        store.write("[1,2,3]").unwrap();
        assert_eq!(store.read().unwrap().as_deref(), Some("[1,2,3]"));
        store.write("[]").unwrap();
        assert_eq!(store.read().unwrap().as_deref(), Some("[]"));

        store.remove().unwrap();
        assert!(!store.path().exists());
        assert_eq!(store.read().unwrap(), None);
        // Removing an absent value is not an error.
        store.remove().unwrap();
    }

    #[test]
    fn memory_store_behaves_like_a_single_key() {
        let mut store = MemoryStore::default();
        assert_eq!(store.read().unwrap(), None);
        store.write("x").unwrap();
        assert_eq!(store.read().unwrap().as_deref(), Some("x"));
        store.remove().unwrap();
        assert_eq!(store.read().unwrap(), None);
    }

    #[test]
    fn download_filename_is_timestamped() {
        let name = download_filename(datetime!(2024-01-15 14:30:45.678 UTC));
        assert_eq!(name, "qr-2024-01-15T14-30-45.png");
    }

    #[test]
    fn download_without_artifact_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = download_artifact(dir.path(), None, OffsetDateTime::now_utc()).unwrap_err();
        assert!(matches!(err, DownloadError::NoArtifact));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn download_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = sample_artifact();
        let path = download_artifact(
            dir.path(),
            Some(&artifact),
            datetime!(2024-01-15 14:30:45 UTC),
        )
        .unwrap();
        assert_eq!(path.file_name().unwrap(), "qr-2024-01-15T14-30-45.png");
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..8], &PNG_SIGNATURE);
    }

    #[test]
    fn export_png_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("code.png");
        export_png(&path, &sample_artifact()).unwrap();
        assert!(path.exists());
    }
}
