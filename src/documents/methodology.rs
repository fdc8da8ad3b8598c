//! Methodology Storage
//!
//! Keeps the most recently uploaded methodology document on disk. There is a
//! single slot: every upload replaces the previous file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;

use super::DocumentError;

const METHODOLOGY_DIR: &str = "methodology";
pub const METHODOLOGY_FILE: &str = "current-methodology.docx";

/// Metadata reported for the stored methodology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodologyInfo {
    pub name: String,
    pub upload_date: DateTime<Utc>,
    pub size: u64,
    pub custom: bool,
}

#[derive(Debug, Clone)]
pub struct MethodologyStore {
    path: PathBuf,
}

impl MethodologyStore {
    pub fn new(upload_dir: &Path) -> Self {
        Self {
            path: upload_dir.join(METHODOLOGY_DIR).join(METHODOLOGY_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn ensure_dir(&self) -> Result<(), DocumentError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Replaces the stored methodology with `data`.
    pub async fn save(&self, data: &[u8]) -> Result<MethodologyInfo, DocumentError> {
        self.ensure_dir().await?;

        // Write beside the target and rename so readers never see a partial file.
        let staging = self.path.with_extension("docx.part");
        fs::write(&staging, data).await?;
        fs::rename(&staging, &self.path).await?;

        info!(path = %self.path.display(), bytes = data.len(), "Stored methodology document");

        self.current().await?.ok_or_else(|| {
            DocumentError::Io(std::io::Error::new(
                ErrorKind::NotFound,
                "methodology disappeared after save",
            ))
        })
    }

    /// Metadata of the stored methodology, if any.
    pub async fn current(&self) -> Result<Option<MethodologyInfo>, DocumentError> {
        let metadata = match fs::metadata(&self.path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let upload_date = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        Ok(Some(MethodologyInfo {
            name: METHODOLOGY_FILE.to_string(),
            upload_date,
            size: metadata.len(),
            custom: true,
        }))
    }

    /// Raw bytes of the stored methodology, if any.
    pub async fn load(&self) -> Result<Option<Vec<u8>>, DocumentError> {
        match fs::read(&self.path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_store_reports_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = MethodologyStore::new(dir.path());
        assert!(store.current().await.unwrap().is_none());
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_replaces_previous_upload() {
        let dir = tempfile::tempdir().unwrap();
        let store = MethodologyStore::new(dir.path());

        store.save(b"first version").await.unwrap();
        let info = store.save(b"second").await.unwrap();

        assert_eq!(info.name, "current-methodology.docx");
        assert_eq!(info.size, 6);
        assert!(info.custom);
        assert_eq!(store.load().await.unwrap().unwrap(), b"second");
        assert_eq!(
            store.path(),
            dir.path().join("methodology").join("current-methodology.docx")
        );

        let entries = std::fs::read_dir(dir.path().join("methodology")).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[tokio::test]
    async fn test_info_serializes_camel_case() {
        let dir = tempfile::tempdir().unwrap();
        let store = MethodologyStore::new(dir.path());
        let info = store.save(b"doc").await.unwrap();

        let json = serde_json::to_value(&info).unwrap();
        assert!(json.get("uploadDate").is_some());
        assert_eq!(json["custom"], true);
    }
}
