//! Import upload operations.
//!
//! The service groups uploads into imports: create an import under a team,
//! attach files to it one by one, then trigger processing. Processing
//! deduplicates on the `content_hash` field, so re-submitting an unchanged
//! file is harmless.

use crate::error::{CloudError, Result};
use md5::{Digest, Md5};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info};

/// Import client bound to one bearer token.
pub struct ImportClient<'a> {
    http: &'a Client,
    base_url: &'a str,
    access_token: &'a str,
}

impl<'a> ImportClient<'a> {
    pub(crate) fn new(http: &'a Client, base_url: &'a str, access_token: &'a str) -> Self {
        Self {
            http,
            base_url,
            access_token,
        }
    }

    /// Create a new import to hold uploaded files.
    pub async fn create_import(&self, team_id: &str) -> Result<String> {
        let url = format!("{}/api/v1/teams/{}/imports", self.base_url, team_id);
        debug!(url = %url, "Creating import");

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.access_token)
            .send()
            .await
            .map_err(map_transport)?;

        let status = response.status();
        if status.as_u16() == 401 {
            return Err(CloudError::AuthExpired);
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CloudError::Server {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let body: Value = response.json().await.map_err(|e| {
            CloudError::ParseError(format!("Failed to parse import response: {}", e))
        })?;

        let import_id = extract_import_id(&body).ok_or_else(|| {
            CloudError::ParseError("import response carries no id".to_string())
        })?;

        info!(import_id = %import_id, "Created import");
        Ok(import_id)
    }

    /// Attach one file to an existing import.
    ///
    /// The multipart body carries the raw file plus the `name`, `path`
    /// (relative to `base_path`, in the service's `./DATALOG/20240101/`
    /// form) and `content_hash` fields the processing step keys on.
    pub async fn add_file(
        &self,
        import_id: &str,
        file_path: &Path,
        base_path: &Path,
    ) -> Result<()> {
        if !file_path.exists() {
            return Err(CloudError::FileNotFound(file_path.display().to_string()));
        }

        let file_name = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("data")
            .to_string();

        let contents = tokio::fs::read(file_path).await?;
        let hash = content_hash(&contents, &file_name);
        let relative_path = relative_upload_path(file_path, base_path);

        debug!(
            file = %file_name,
            path = %relative_path,
            size = contents.len(),
            "Uploading file to import"
        );

        let file_part = Part::bytes(contents)
            .file_name(file_name.clone())
            .mime_str("application/octet-stream")?;

        let form = Form::new()
            .text("name", file_name)
            .text("path", relative_path)
            .text("content_hash", hash)
            .part("file", file_part);

        let url = format!("{}/api/v1/imports/{}/files", self.base_url, import_id);

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.access_token)
            .multipart(form)
            .send()
            .await
            .map_err(map_transport)?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status.as_u16() == 401 {
            Err(CloudError::AuthExpired)
        } else {
            let error_text = response.text().await.unwrap_or_default();
            Err(CloudError::Server {
                status: status.as_u16(),
                message: error_text,
            })
        }
    }

    /// Trigger processing of an import's uploaded files.
    pub async fn process_files(&self, import_id: &str) -> Result<()> {
        let url = format!(
            "{}/api/v1/imports/{}/process_files",
            self.base_url, import_id
        );
        debug!(url = %url, "Triggering import processing");

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.access_token)
            .send()
            .await
            .map_err(map_transport)?;

        let status = response.status();
        if status.is_success() {
            info!(import_id = %import_id, "Import processing triggered");
            Ok(())
        } else if status.as_u16() == 401 {
            Err(CloudError::AuthExpired)
        } else {
            let error_text = response.text().await.unwrap_or_default();
            Err(CloudError::Server {
                status: status.as_u16(),
                message: error_text,
            })
        }
    }
}

fn map_transport(e: reqwest::Error) -> CloudError {
    if e.is_connect() || e.is_timeout() {
        CloudError::ServiceUnreachable(e.to_string())
    } else {
        CloudError::Request(e)
    }
}

/// The service's dedup key: MD5 over the file content with the file name
/// appended.
pub fn content_hash(content: &[u8], file_name: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(content);
    hasher.update(file_name.as_bytes());
    hex::encode(hasher.finalize())
}

/// Render a file's position relative to the mirror root the way the service
/// expects: `./` for root files, `./DATALOG/20240101/` for nested ones.
pub fn relative_upload_path(file_path: &Path, base_path: &Path) -> String {
    let Some(parent) = file_path.parent() else {
        return "./".to_string();
    };
    match parent.strip_prefix(base_path) {
        Ok(rel) if rel.as_os_str().is_empty() => "./".to_string(),
        Ok(rel) => format!("./{}/", rel.to_string_lossy().replace('\\', "/")),
        Err(_) => "./".to_string(),
    }
}

/// Import responses arrive either wrapped (`{"data": {...}}`) or flat, with
/// the id under `id` or `import_id`.
fn extract_import_id(body: &Value) -> Option<String> {
    let inner = body.get("data").unwrap_or(body);
    let id = inner.get("id").or_else(|| inner.get("import_id"))?;
    match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_hash_includes_file_name() {
        let a = content_hash(b"Hello, World!", "file.txt");
        let b = content_hash(b"Hello, World!", "other.txt");
        assert_ne!(a, b);
        // MD5("Hello, World!file.txt")
        assert_eq!(a, "ad8efd247388d1ad9f7dc9ebd5ed87da");
    }

    #[test]
    fn test_relative_upload_path() {
        let base = Path::new("/mirror");
        assert_eq!(relative_upload_path(Path::new("/mirror/STR.edf"), base), "./");
        assert_eq!(
            relative_upload_path(Path::new("/mirror/DATALOG/20240101/a.edf"), base),
            "./DATALOG/20240101/"
        );
        // Outside the base falls back to root
        assert_eq!(relative_upload_path(Path::new("/elsewhere/x.edf"), base), "./");
    }

    #[test]
    fn test_extract_import_id() {
        assert_eq!(
            extract_import_id(&json!({"data": {"id": "imp-1"}})),
            Some("imp-1".to_string())
        );
        assert_eq!(
            extract_import_id(&json!({"import_id": 99})),
            Some("99".to_string())
        );
        assert_eq!(extract_import_id(&json!({"data": {}})), None);
    }
}
