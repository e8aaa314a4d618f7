use crate::domain::ports::ImageStore;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const MAX_EXTENSION_LEN: usize = 8;

/// Stores chat images as flat files in one directory, served under `/uploads`.
#[derive(Clone, Debug)]
pub struct LocalImageStore {
    dir: PathBuf,
    max_bytes: usize,
}

impl LocalImageStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self { dir: dir.into(), max_bytes }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates the upload directory if it does not exist yet.
    ///
    /// # Errors
    /// Returns `AppError::Io` if the directory cannot be created.
    pub async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }
}

/// Picks a collision-free file name, keeping a sane extension from the client's name.
fn stored_name(original_name: Option<&str>) -> String {
    let extension = original_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= MAX_EXTENSION_LEN && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase);

    match extension {
        Some(ext) => format!("{}.{ext}", Uuid::new_v4()),
        None => Uuid::new_v4().to_string(),
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    #[tracing::instrument(level = "debug", skip(self, data), fields(size = data.len()))]
    async fn save(&self, original_name: Option<&str>, data: Bytes) -> Result<String> {
        if data.is_empty() {
            return Err(AppError::BadRequest("Image is empty".to_string()));
        }
        if data.len() > self.max_bytes {
            return Err(AppError::BadRequest(format!("Image exceeds {} bytes", self.max_bytes)));
        }

        let name = stored_name(original_name);
        tokio::fs::write(self.dir.join(&name), &data).await?;
        Ok(name)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn remove(&self, name: &str) -> Result<()> {
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return Err(AppError::BadRequest(format!("Invalid image name: {name}")));
        }
        match tokio::fs::remove_file(self.dir.join(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("bookswap-uploads-{}", Uuid::new_v4()))
    }

    #[test]
    fn test_stored_name_keeps_clean_extension() {
        assert!(stored_name(Some("cover.PNG")).ends_with(".png"));
        assert!(!stored_name(Some("../../evil.sh/../x")).contains('/'));
        assert!(!stored_name(Some("noext")).contains('.'));
        assert!(!stored_name(Some("weird.p?g")).contains('?'));
        assert_ne!(stored_name(None), stored_name(None));
    }

    #[tokio::test]
    async fn test_save_writes_file() {
        let store = LocalImageStore::new(temp_dir(), 16);
        store.ensure_dir().await.unwrap();

        let name = store.save(Some("a.jpg"), Bytes::from_static(b"jpegdata")).await.unwrap();
        let written = tokio::fs::read(store.dir().join(&name)).await.unwrap();
        assert_eq!(written, b"jpegdata");

        store.remove(&name).await.unwrap();
        assert!(!store.dir().join(&name).exists());
        store.remove(&name).await.unwrap();
        assert!(matches!(store.remove("../escape").await, Err(AppError::BadRequest(_))));

        let _ = tokio::fs::remove_dir_all(store.dir()).await;
    }

    #[tokio::test]
    async fn test_rejects_empty_and_oversized() {
        let store = LocalImageStore::new(temp_dir(), 4);
        store.ensure_dir().await.unwrap();

        assert!(matches!(store.save(None, Bytes::new()).await, Err(AppError::BadRequest(_))));
        assert!(matches!(store.save(None, Bytes::from_static(b"too large")).await, Err(AppError::BadRequest(_))));

        let _ = tokio::fs::remove_dir_all(store.dir()).await;
    }
}
