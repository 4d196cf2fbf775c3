use reqwest::multipart::{Form, Part};
use std::path::Path;

use crate::client::ApiClient;
use crate::error::{ApiError, ApiResult};
use crate::models::{ProfilePatch, UserProfile};

/// Name endings the backend's upload handler accepts. Matched exactly,
/// case included.
const RESUME_SUFFIXES: &[&str] = &[".pdf", "docx", "doc"];

pub struct ProfileApi<'a> {
    client: &'a ApiClient,
}

impl<'a> ProfileApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn get(&self) -> ApiResult<UserProfile> {
        self.client.get("/users/me/profile").await
    }

    /// Fields left unset in `patch` are untouched server-side.
    pub async fn update(&self, patch: &ProfilePatch) -> ApiResult<UserProfile> {
        self.client.put("/users/me/profile", patch).await
    }

    /// Upload a resume from disk. The returned profile reflects the server's
    /// extraction of the file, not an echo of what was sent.
    pub async fn upload_resume(&self, path: impl AsRef<Path>) -> ApiResult<UserProfile> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ApiError::InvalidInput(format!("{} has no file name", path.display())))?
            .to_string();
        check_resume_name(&file_name)?;

        let bytes = tokio::fs::read(path).await?;
        tracing::info!(file = %file_name, size = bytes.len(), "Uploading resume");
        self.upload_resume_bytes(&file_name, bytes).await
    }

    /// Upload resume contents already held in memory.
    pub async fn upload_resume_bytes(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> ApiResult<UserProfile> {
        check_resume_name(file_name)?;
        let mime = mime_guess::from_path(file_name).first_or_octet_stream();
        let part = file_part(file_name, bytes, mime.as_ref())?;
        let form = Form::new().part("file", part);
        self.client
            .post_multipart("/users/me/profile/resume", form)
            .await
    }
}

fn file_part(file_name: &str, bytes: Vec<u8>, content_type: &str) -> ApiResult<Part> {
    Part::bytes(bytes)
        .file_name(file_name.to_string())
        .mime_str(content_type)
        .map_err(|e| ApiError::InvalidInput(format!("bad content type {content_type:?}: {e}")))
}

fn check_resume_name(file_name: &str) -> ApiResult<()> {
    let accepted =
        file_name.len() >= 4 && RESUME_SUFFIXES.iter().any(|s| file_name.ends_with(s));
    if accepted {
        Ok(())
    } else {
        Err(ApiError::InvalidInput(format!(
            "unsupported resume file {file_name:?}; only PDF, DOC and DOCX are accepted"
        )))
    }
}
