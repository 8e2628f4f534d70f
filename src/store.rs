//! Local dataset layout and file placement
//!
//! ```text
//! <documents>/metadata.csv
//! <documents>/DataSet/COVID-19/<filename>
//! <documents>/DataSet/No Finding/<filename>
//! <documents>/DataSet/others/<filename>
//! ```
//!
//! Every write replaces what was there: a second session over the same catalog
//! leaves one copy of each file.

use std::path::{Path, PathBuf};

use tempfile::TempPath;

use crate::config::Config;
use crate::error::{Error, Result, StorageError};
use crate::record::{Finding, Record};

/// Default name of the dataset folder inside the documents directory
pub const DATASET_DIR_NAME: &str = "DataSet";

/// Default catalog file name
pub const CATALOG_NAME: &str = "metadata.csv";

/// Label folder for a finding
///
/// COVID-19 and No Finding use their label; everything else shares "others".
pub fn folder_name_for(finding: Finding) -> &'static str {
    match finding {
        Finding::Covid19 => "COVID-19",
        Finding::NoFinding => "No Finding",
        Finding::Other => "others",
    }
}

/// Derives local paths and performs replace-on-write placement
#[derive(Clone, Debug)]
pub struct DatasetStore {
    documents_dir: Option<PathBuf>,
    dataset_dir_name: String,
    catalog_name: String,
}

impl DatasetStore {
    /// Store rooted at `documents_dir` with the default layout
    ///
    /// `None` models a platform without a documents directory: every path
    /// query then fails with [`StorageError::UnresolvedLocation`].
    pub fn new(documents_dir: Option<PathBuf>) -> Self {
        Self {
            documents_dir,
            dataset_dir_name: DATASET_DIR_NAME.to_string(),
            catalog_name: CATALOG_NAME.to_string(),
        }
    }

    /// Store using the configured documents directory and names
    pub fn from_config(config: &Config) -> Self {
        Self {
            documents_dir: config.storage.documents_dir.clone(),
            dataset_dir_name: config.storage.dataset_dir_name.clone(),
            catalog_name: config.source.catalog_name.clone(),
        }
    }

    /// Per-user documents directory
    pub fn documents_dir(&self) -> Result<&Path> {
        self.documents_dir.as_deref().ok_or_else(|| {
            Error::Storage(StorageError::UnresolvedLocation {
                what: "documents directory".to_string(),
            })
        })
    }

    /// Root of the label-partitioned image tree
    pub fn dataset_dir(&self) -> Result<PathBuf> {
        Ok(self.documents_dir()?.join(&self.dataset_dir_name))
    }

    /// Folder holding images labelled `finding`
    pub fn label_dir(&self, finding: Finding) -> Result<PathBuf> {
        Ok(self.dataset_dir()?.join(folder_name_for(finding)))
    }

    /// Where the catalog is stored
    pub fn catalog_path(&self) -> Result<PathBuf> {
        Ok(self.documents_dir()?.join(&self.catalog_name))
    }

    /// Where a record's image is stored
    ///
    /// `Ok(None)` when the record's filename cannot name a file inside its label folder.
    pub fn image_path(&self, record: &Record) -> Result<Option<PathBuf>> {
        Ok(record.local_image_path(&self.dataset_dir()?))
    }

    /// Whether something exists at `path`
    pub async fn exists(path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    /// Create every missing ancestor directory of `path`
    pub async fn ensure_parent_dir(path: &Path) -> Result<()> {
        let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
            return Ok(());
        };
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            Error::Storage(StorageError::CreateDir {
                path: parent.to_path_buf(),
                reason: e.to_string(),
            })
        })
    }

    /// Delete the file at `path` if there is one
    ///
    /// Returns whether a file was removed.
    pub async fn remove_if_exists(path: &Path) -> Result<bool> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::Storage(StorageError::Remove {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })),
        }
    }

    /// Move a finished temporary download to `dest`, replacing any existing file
    ///
    /// Renames when possible and falls back to copy-then-delete when the temporary
    /// file lives on another filesystem. The temporary file is gone afterwards in
    /// every case.
    pub async fn replace_with(temp: TempPath, dest: &Path) -> Result<()> {
        Self::ensure_parent_dir(dest).await?;
        Self::remove_if_exists(dest).await?;

        let target = dest.to_path_buf();
        let persisted = tokio::task::spawn_blocking(move || temp.persist(&target))
            .await
            .map_err(|e| Error::Unknown(format!("file placement task failed: {e}")))?;

        if let Err(e) = persisted {
            tracing::debug!(
                from = %e.path.display(),
                to = %dest.display(),
                error = %e.error,
                "rename failed, copying instead"
            );
            let temp = e.path;
            tokio::fs::copy(&temp, dest).await.map_err(|err| {
                Error::Storage(StorageError::Move {
                    from: temp.to_path_buf(),
                    to: dest.to_path_buf(),
                    reason: err.to_string(),
                })
            })?;
            // dropping `temp` deletes it
        }
        Ok(())
    }

    /// Copy `src` to `dest`, replacing any existing file
    pub async fn copy_replacing(src: &Path, dest: &Path) -> Result<()> {
        Self::ensure_parent_dir(dest).await?;
        Self::remove_if_exists(dest).await?;
        tokio::fs::copy(src, dest).await.map_err(|e| {
            Error::Storage(StorageError::Copy {
                from: src.to_path_buf(),
                to: dest.to_path_buf(),
                reason: e.to_string(),
            })
        })?;
        Ok(())
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::fixtures::record;
    use std::io::Write;
    use tempfile::TempDir;

    fn temp_with(dir: &Path, contents: &[u8]) -> TempPath {
        let mut file = tempfile::NamedTempFile::new_in(dir).unwrap();
        file.write_all(contents).unwrap();
        file.into_temp_path()
    }

    #[test]
    fn folder_mapping() {
        assert_eq!(folder_name_for(Finding::Covid19), "COVID-19");
        assert_eq!(folder_name_for(Finding::NoFinding), "No Finding");
        assert_eq!(folder_name_for(Finding::Other), "others");
    }

    #[test]
    fn paths_follow_dataset_layout() {
        let store = DatasetStore::new(Some(PathBuf::from("/home/u/Documents")));

        assert_eq!(
            store.catalog_path().unwrap(),
            PathBuf::from("/home/u/Documents/metadata.csv")
        );
        assert_eq!(
            store.dataset_dir().unwrap(),
            PathBuf::from("/home/u/Documents/DataSet")
        );
        assert_eq!(
            store.label_dir(Finding::Other).unwrap(),
            PathBuf::from("/home/u/Documents/DataSet/others")
        );
        assert_eq!(
            store
                .image_path(&record("1", Finding::NoFinding, "a.png"))
                .unwrap(),
            Some(PathBuf::from("/home/u/Documents/DataSet/No Finding/a.png"))
        );
    }

    #[test]
    fn configured_names_are_used() {
        let mut config = Config::default();
        config.storage.documents_dir = Some(PathBuf::from("/srv"));
        config.storage.dataset_dir_name = "xray".to_string();
        config.source.catalog_name = "catalog.csv".to_string();

        let store = DatasetStore::from_config(&config);

        assert_eq!(store.catalog_path().unwrap(), PathBuf::from("/srv/catalog.csv"));
        assert_eq!(
            store.label_dir(Finding::Covid19).unwrap(),
            PathBuf::from("/srv/xray/COVID-19")
        );
    }

    #[test]
    fn unresolved_documents_dir_is_an_error() {
        let store = DatasetStore::new(None);

        assert!(matches!(
            store.catalog_path(),
            Err(Error::Storage(StorageError::UnresolvedLocation { .. }))
        ));
        assert!(store.dataset_dir().is_err());
        assert!(
            store
                .image_path(&record("1", Finding::Covid19, "a.png"))
                .is_err()
        );
    }

    #[tokio::test]
    async fn ensure_parent_dir_creates_missing_ancestors() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("DataSet/No Finding/a.png");

        DatasetStore::ensure_parent_dir(&target).await.unwrap();
        DatasetStore::ensure_parent_dir(&target).await.unwrap();

        assert!(dir.path().join("DataSet/No Finding").is_dir());
        assert!(!DatasetStore::exists(&target).await);
    }

    #[tokio::test]
    async fn remove_if_exists_reports_whether_it_removed() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("a.png");
        std::fs::write(&target, b"x").unwrap();

        assert!(DatasetStore::remove_if_exists(&target).await.unwrap());
        assert!(!DatasetStore::remove_if_exists(&target).await.unwrap());
    }

    #[tokio::test]
    async fn replace_with_overwrites_and_consumes_temp() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("DataSet/COVID-19/a.png");

        let first = temp_with(dir.path(), b"first");
        DatasetStore::replace_with(first, &dest).await.unwrap();

        let second = temp_with(dir.path(), b"second");
        let second_path = second.to_path_buf();
        DatasetStore::replace_with(second, &dest).await.unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"second");
        assert!(!second_path.exists(), "temporary file must not linger");
    }

    #[tokio::test]
    async fn replace_with_is_idempotent_for_same_content() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("a.png");

        for _ in 0..2 {
            DatasetStore::replace_with(temp_with(dir.path(), b"same"), &dest)
                .await
                .unwrap();
        }

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(std::fs::read(&dest).unwrap(), b"same");
    }

    #[tokio::test]
    async fn copy_replacing_keeps_source() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.png");
        let dest = dir.path().join("nested/dest.png");
        std::fs::write(&src, b"data").unwrap();
        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
        std::fs::write(&dest, b"stale").unwrap();

        DatasetStore::copy_replacing(&src, &dest).await.unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"data");
        assert!(src.exists());
    }

    #[tokio::test]
    async fn copy_replacing_missing_source_fails() {
        let dir = TempDir::new().unwrap();
        let result =
            DatasetStore::copy_replacing(&dir.path().join("missing"), &dir.path().join("d")).await;

        assert!(matches!(
            result,
            Err(Error::Storage(StorageError::Copy { .. }))
        ));
    }
}
