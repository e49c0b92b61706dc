use crate::WorkerError;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, instrument};

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Downloads order documents from the backend's file endpoint.
pub struct FileDownloader {
    client: reqwest::Client,
}

impl FileDownloader {
    pub fn new() -> Result<Self, WorkerError> {
        let client = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .map_err(|e| WorkerError::Download(format!("build http client: {}", e)))?;
        Ok(Self { client })
    }

    /// Fetches the document into `dir` and returns its path. The file
    /// keeps a printable extension so the print command can identify it.
    #[instrument(skip(self, dir))]
    pub async fn download(
        &self,
        file_url: &str,
        file_name: &str,
        dir: &Path,
    ) -> Result<PathBuf, WorkerError> {
        let response = self
            .client
            .get(file_url)
            .send()
            .await
            .map_err(|e| WorkerError::Download(format!("fetch {}: {}", file_url, e)))?;

        if !response.status().is_success() {
            return Err(WorkerError::Download(format!(
                "fetch {} returned {}",
                file_url,
                response.status()
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| WorkerError::Download(format!("read body: {}", e)))?;
        if bytes.is_empty() {
            return Err(WorkerError::Download("downloaded file is empty".into()));
        }

        let name = resolve_file_name(file_name, file_url, content_type.as_deref());
        let path = dir.join(name);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| WorkerError::Download(format!("write {}: {}", path.display(), e)))?;

        debug!(path = %path.display(), size = bytes.len(), "Downloaded document");
        Ok(path)
    }
}

/// Picks a local file name with an extension, preferring the recorded
/// name, then the URL path, then the content type.
fn resolve_file_name(file_name: &str, file_url: &str, content_type: Option<&str>) -> String {
    if !file_name.is_empty() && file_name.contains('.') {
        return file_name.to_string();
    }

    if let Ok(parsed) = url::Url::parse(file_url) {
        if let Some(last) = parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
        {
            if last.contains('.') {
                return last.to_string();
            }
        }
    }

    let ext = match content_type.unwrap_or("").split(';').next().unwrap_or("") {
        "application/pdf" => "pdf",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "text/plain" => "txt",
        "application/msword" => "doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "application/vnd.ms-excel" => "xls",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => "xlsx",
        "application/vnd.ms-powerpoint" => "ppt",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation" => "pptx",
        _ => "bin",
    };
    let base = if file_name.is_empty() {
        "document"
    } else {
        file_name
    };
    format!("{}.{}", base, ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorded_name_with_extension_wins() {
        assert_eq!(
            resolve_file_name("report.pdf", "http://x/files/abc", None),
            "report.pdf"
        );
    }

    #[test]
    fn url_segment_is_second_choice() {
        assert_eq!(
            resolve_file_name("", "http://x/files/a1b2_scan.jpg", None),
            "a1b2_scan.jpg"
        );
    }

    #[test]
    fn content_type_is_the_fallback() {
        assert_eq!(
            resolve_file_name("scan", "http://x/files/abc", Some("image/png")),
            "scan.png"
        );
        assert_eq!(
            resolve_file_name("", "http://x/files/abc", None),
            "document.bin"
        );
    }

    #[test]
    fn office_and_media_content_types_map_to_extensions() {
        let cases = [
            ("image/gif", "gif"),
            ("text/plain; charset=utf-8", "txt"),
            ("application/vnd.ms-excel", "xls"),
            (
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                "xlsx",
            ),
            ("application/vnd.ms-powerpoint", "ppt"),
            (
                "application/vnd.openxmlformats-officedocument.presentationml.presentation",
                "pptx",
            ),
        ];
        for (content_type, ext) in cases {
            assert_eq!(
                resolve_file_name("", "http://x/files/abc", Some(content_type)),
                format!("document.{}", ext)
            );
        }
    }
}
