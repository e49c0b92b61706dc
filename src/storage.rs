use crate::errors::ServiceError;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use tracing::{debug, instrument};

/// A document persisted to local storage.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub path: PathBuf,
    /// URL the worker downloads the file from (served under /files).
    pub url: String,
    pub hash: String,
}

/// Local filesystem storage for uploaded documents, served back over
/// HTTP under `/files`.
pub struct FileStore {
    root: PathBuf,
    public_base_url: String,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: String) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    /// Writes the document under a collision-free name derived from its
    /// content hash and returns its public URL.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn save(
        &self,
        phone: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<StoredFile, ServiceError> {
        let hash = hex::encode(Sha256::digest(bytes));
        let safe_name = sanitize_file_name(file_name);
        let stored_name = format!("{}_{}", &hash[..16], safe_name);

        let dir = self.root.join(sanitize_file_name(phone));
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            ServiceError::InternalError(format!("failed to create upload directory: {}", e))
        })?;

        let path = dir.join(&stored_name);
        tokio::fs::write(&path, bytes).await.map_err(|e| {
            ServiceError::InternalError(format!("failed to write uploaded file: {}", e))
        })?;

        let url = format!(
            "{}/files/{}/{}",
            self.public_base_url,
            sanitize_file_name(phone),
            stored_name
        );
        debug!(path = %path.display(), "Stored uploaded document");

        Ok(StoredFile { path, url, hash })
    }
}

/// Keeps only characters that are safe in both paths and URLs.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitization_strips_path_separators() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_file_name("report 2024.pdf"), "report_2024.pdf");
        assert_eq!(sanitize_file_name("+15550001111"), "_15550001111");
        assert_eq!(sanitize_file_name(""), "file");
    }

    #[tokio::test]
    async fn save_writes_file_and_builds_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path(), "http://localhost:8080/".into());

        let stored = store
            .save("+15550001111", "doc.pdf", b"%PDF-1.4 test")
            .await
            .unwrap();

        assert!(stored.path.exists());
        assert!(stored.url.starts_with("http://localhost:8080/files/_15550001111/"));
        assert!(stored.url.ends_with("doc.pdf"));
        assert_eq!(stored.hash.len(), 64);

        let contents = tokio::fs::read(&stored.path).await.unwrap();
        assert_eq!(contents, b"%PDF-1.4 test");
    }
}
