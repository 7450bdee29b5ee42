// ☁️ Upload collaborator - push local files to cloud storage
//
// Token acquisition/refresh happens elsewhere; this client only reads an
// already-authorized token file and performs one create-file call.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::UploadError;

// ============================================================================
// LOCAL FILES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub path: PathBuf,
    /// Name the remote file gets
    pub name: String,
}

impl LocalFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.bin".to_string());
        LocalFile { path, name }
    }

    pub fn named(path: impl Into<PathBuf>, name: &str) -> Self {
        LocalFile {
            path: path.into(),
            name: name.to_string(),
        }
    }

    pub fn mime_type(&self) -> &'static str {
        mime_for(&self.name)
    }
}

pub fn mime_for(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "pdf" => "application/pdf",
        "mp4" => "video/mp4",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Upload bytes parked on disk until the remote call finishes
#[derive(Debug)]
pub struct StagedFile {
    pub file: LocalFile,
}

impl StagedFile {
    /// Write `bytes` to `<dir>/temp_<uuid>_<name>`; the remote name stays `name`
    pub async fn write(dir: &Path, original_name: &str, bytes: &[u8]) -> std::io::Result<Self> {
        // Only the final component: never let a client name escape `dir`
        let safe_name = Path::new(original_name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "upload.bin".to_string());

        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("temp_{}_{}", uuid::Uuid::new_v4(), safe_name));
        tokio::fs::write(&path, bytes).await?;

        Ok(StagedFile {
            file: LocalFile::named(path, &safe_name),
        })
    }

    pub async fn remove(self) {
        if let Err(e) = tokio::fs::remove_file(&self.file.path).await {
            tracing::warn!(path = %self.file.path.display(), error = %e, "could not remove staged upload");
        }
    }
}

// ============================================================================
// UPLOADER CONTRACT
// ============================================================================

#[async_trait]
pub trait FileUploader: Send + Sync {
    /// Push one file; returns the remote file id
    async fn upload(&self, file: &LocalFile, folder_id: Option<&str>) -> Result<String, UploadError>;
}

// ============================================================================
// GOOGLE DRIVE
// ============================================================================

#[derive(Debug, Deserialize)]
struct AuthorizedUserToken {
    #[serde(alias = "access_token")]
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedFile {
    id: String,
}

pub struct DriveUploader {
    client: reqwest::Client,
    upload_url: String,
    token_path: PathBuf,
}

impl DriveUploader {
    pub fn new(upload_url: impl Into<String>, token_path: impl Into<PathBuf>) -> Self {
        DriveUploader {
            client: reqwest::Client::new(),
            upload_url: upload_url.into(),
            token_path: token_path.into(),
        }
    }

    async fn access_token(&self) -> Result<String, UploadError> {
        let raw = tokio::fs::read_to_string(&self.token_path).await.map_err(|e| {
            UploadError::Credentials(format!("{}: {}", self.token_path.display(), e))
        })?;

        let parsed: AuthorizedUserToken = serde_json::from_str(&raw)
            .map_err(|e| UploadError::Credentials(format!("{}: {}", self.token_path.display(), e)))?;

        parsed
            .token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| UploadError::Credentials(format!("{} has no access token", self.token_path.display())))
    }
}

/// `multipart/related` body: JSON metadata part, then the media part
fn related_body(boundary: &str, metadata: &serde_json::Value, mime: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(bytes.len() + 512);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata.to_string().as_bytes());
    body.extend_from_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", mime).as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

#[async_trait]
impl FileUploader for DriveUploader {
    async fn upload(&self, file: &LocalFile, folder_id: Option<&str>) -> Result<String, UploadError> {
        let bytes = tokio::fs::read(&file.path).await.map_err(|source| UploadError::Read {
            path: file.path.display().to_string(),
            source,
        })?;
        let token = self.access_token().await?;

        let mut metadata = serde_json::json!({ "name": file.name });
        if let Some(folder) = folder_id {
            metadata["parents"] = serde_json::json!([folder]);
        }

        let boundary = format!("intake-{}", uuid::Uuid::new_v4().simple());
        let body = related_body(&boundary, &metadata, file.mime_type(), &bytes);

        let response = self
            .client
            .post(&self.upload_url)
            .bearer_auth(token)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let created: CreatedFile = response.json().await?;
        tracing::info!(file = %file.name, remote_id = %created.id, "file uploaded");
        Ok(created.id)
    }
}
