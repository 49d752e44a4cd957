use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{join_url, DeliverySink};
use crate::core::{Result, TtsError};

/// Writes audio under a local directory, e.g. one served by a static file host
#[derive(Debug, Clone)]
pub struct LocalDirSink {
    root: PathBuf,
    public_base_url: String,
}

impl LocalDirSink {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
        }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        if key.is_empty()
            || !relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(TtsError::storage(format!("Invalid object key: {}", key)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl DeliverySink for LocalDirSink {
    async fn upload(&self, key: &str, data: Bytes, _content_type: &str, overwrite: bool) -> Result<String> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true);
        if overwrite {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }

        let mut file = options.open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                TtsError::storage(format!("Object already exists: {}", key))
            } else {
                TtsError::storage(format!("Failed to open {}: {}", path.display(), e))
            }
        })?;
        file.write_all(&data).await?;
        file.flush().await?;

        debug!(path = %path.display(), bytes = data.len(), "Stored audio");
        Ok(join_url(&self.public_base_url, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;

    #[tokio::test]
    async fn test_upload_writes_file_and_returns_locator() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LocalDirSink::new(dir.path(), "http://localhost:8080/files/");

        let url = sink
            .upload("tts/a.mp3", Bytes::from_static(b"ID3abc"), "audio/mpeg", true)
            .await
            .unwrap();

        assert_eq!(url, "http://localhost:8080/files/tts/a.mp3");
        let written = std::fs::read(dir.path().join("tts/a.mp3")).unwrap();
        assert_eq!(written, b"ID3abc");
    }

    #[tokio::test]
    async fn test_overwrite_flag() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LocalDirSink::new(dir.path(), "http://h");

        sink.upload("k.wav", Bytes::from_static(b"one"), "audio/wav", false)
            .await
            .unwrap();
        let err = sink
            .upload("k.wav", Bytes::from_static(b"two"), "audio/wav", false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);

        sink.upload("k.wav", Bytes::from_static(b"three"), "audio/wav", true)
            .await
            .unwrap();
        assert_eq!(std::fs::read(dir.path().join("k.wav")).unwrap(), b"three");
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LocalDirSink::new(dir.path(), "http://h");
        for key in ["../x.mp3", "/etc/x.mp3", ""] {
            let err = sink
                .upload(key, Bytes::new(), "audio/mpeg", true)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Storage, "{}", key);
        }
    }
}
