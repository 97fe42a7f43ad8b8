//! Upload interception.
//!
//! # Responsibilities
//! - Stream the first file field of a multipart upload into a staged file
//! - Keep the other form fields, in order, for the re-submission
//! - Run the rule chain from the current config snapshot
//! - Re-submit the (possibly rewritten) file upstream as a new multipart POST
//! - Relay the upstream response unchanged
//!
//! # Design Decisions
//! - The staged file is removed before the response is returned on every path
//!   the handler controls; dropped connections are covered by `StagedFile`'s
//!   drop guard
//! - Rule failures never reach the caller; staging and upstream failures do
//! - Non-2xx upstream replies are relayed, not translated

use std::path::Path;

use axum::body::Body;
use axum::extract::multipart::MultipartError;
use axum::extract::{FromRequest, Multipart};
use axum::http::{HeaderMap, Request, Response, StatusCode};
use axum::response::IntoResponse;
use http_body_util::Limited;
use reqwest::multipart::{Form, Part};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

use crate::http::headers::{strip_hop_by_hop, upload_request_headers};
use crate::http::request::request_id;
use crate::http::server::{AppState, Snapshot};
use crate::http::upstream::target_url;
use crate::pipeline::StagedFile;

/// Errors surfaced to the uploader.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No file field in upload")]
    NoFile,

    #[error("Malformed multipart body: {0}")]
    Multipart(String),

    #[error("Upload exceeds the configured size limit")]
    TooLarge,

    #[error("Failed to stage upload: {0}")]
    Staging(#[source] std::io::Error),

    #[error("Upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),
}

impl UploadError {
    pub fn status(&self) -> StatusCode {
        match self {
            UploadError::NoFile | UploadError::Multipart(_) => StatusCode::BAD_REQUEST,
            UploadError::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            UploadError::Staging(_) => StatusCode::INTERNAL_SERVER_ERROR,
            UploadError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<MultipartError> for UploadError {
    fn from(e: MultipartError) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            UploadError::TooLarge
        } else {
            UploadError::Multipart(e.body_text())
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> axum::response::Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// A form field in arrival order; `File` marks where the staged file goes.
enum FormField {
    Text { name: String, value: String },
    File,
}

/// Intercept a multipart upload, transform it, and re-submit it upstream.
pub async fn intercept(
    state: &AppState,
    snapshot: &Snapshot,
    request: Request<Body>,
) -> Result<Response<Body>, UploadError> {
    let request_id = request_id(request.headers());
    let (parts, body) = request.into_parts();

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    let forward_headers = upload_request_headers(&parts.headers);

    let limited = Body::new(Limited::new(body, snapshot.config.upload.max_upload_bytes));
    let mut multipart = Multipart::from_request(Request::from_parts(parts, limited), &())
        .await
        .map_err(|e| UploadError::Multipart(e.body_text()))?;

    let staging_root = snapshot.config.upload.staging_dir();
    let mut staged: Option<StagedFile> = None;
    let received = receive(&mut multipart, &staging_root, &request_id, &mut staged).await;
    let fields = match received {
        Ok(fields) => fields,
        Err(e) => {
            if let Some(staged) = staged {
                discard(staged, &request_id).await;
            }
            return Err(e);
        }
    };

    let Some(staged) = staged else {
        tracing::warn!(request_id = %request_id, "Upload without a file field rejected");
        return Err(UploadError::NoFile);
    };

    let chain = snapshot.config.rule_chain();
    let report = state.pipeline.run(&chain, staged.path()).await;
    tracing::info!(
        request_id = %request_id,
        applied = report.applied(),
        total = report.rules.len(),
        "Rule chain finished"
    );

    let url = target_url(&snapshot.config.upstream.url, &path_and_query);
    let result = submit(state, &url, forward_headers, &staged, fields).await;

    discard(staged, &request_id).await;

    match &result {
        Ok(response) => tracing::info!(request_id = %request_id, status = %response.status(), "Upload forwarded"),
        Err(e) => tracing::error!(request_id = %request_id, error = %e, "Upload forwarding failed"),
    }
    result
}

/// Read every field, streaming the first file into `staged`.
///
/// `staged` is filled as soon as the file is created so the caller can remove
/// it when a later field fails.
async fn receive(
    multipart: &mut Multipart,
    staging_root: &Path,
    request_id: &str,
    staged: &mut Option<StagedFile>,
) -> Result<Vec<FormField>, UploadError> {
    let mut fields = Vec::new();

    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);

        match file_name {
            Some(file_name) if staged.is_none() => {
                let content_type = field.content_type().map(str::to_string);
                let (file, mut out) = StagedFile::create(staging_root, &name, &file_name, content_type)
                    .await
                    .map_err(UploadError::Staging)?;
                tracing::debug!(request_id = %request_id, field = %name, path = ?file.path(), "Staging upload");
                let file = staged.insert(file);

                let mut size = 0u64;
                while let Some(chunk) = field.chunk().await? {
                    size += chunk.len() as u64;
                    out.write_all(&chunk).await.map_err(UploadError::Staging)?;
                }
                out.flush().await.map_err(UploadError::Staging)?;

                tracing::info!(request_id = %request_id, file = %file.file_name(), bytes = size, "Upload staged");
                fields.push(FormField::File);
            }
            Some(file_name) => {
                tracing::warn!(request_id = %request_id, field = %name, file = %file_name, "Ignoring additional file field");
                while field.chunk().await?.is_some() {}
            }
            None => {
                let value = field.text().await?;
                fields.push(FormField::Text { name, value });
            }
        }
    }

    Ok(fields)
}

async fn discard(staged: StagedFile, request_id: &str) {
    if let Err(e) = staged.remove().await {
        tracing::warn!(request_id = %request_id, error = %e, "Failed to remove staged upload");
    }
}

async fn submit(
    state: &AppState,
    url: &str,
    headers: HeaderMap,
    staged: &StagedFile,
    fields: Vec<FormField>,
) -> Result<Response<Body>, UploadError> {
    let (file, len) = staged.open().await.map_err(UploadError::Staging)?;
    let mut part = Part::stream_with_length(reqwest::Body::wrap_stream(ReaderStream::new(file)), len)
        .file_name(staged.file_name().to_string());
    if let Some(content_type) = staged.content_type() {
        part = part.mime_str(content_type)?;
    }

    let mut form = Form::new();
    let mut file_part = Some(part);
    for field in fields {
        match field {
            FormField::Text { name, value } => form = form.text(name, value),
            FormField::File => {
                if let Some(part) = file_part.take() {
                    form = form.part(staged.field_name().to_string(), part);
                }
            }
        }
    }

    let response = state
        .upstream
        .uploads()
        .post(url)
        .headers(headers)
        .multipart(form)
        .send()
        .await?;

    let status = response.status();
    let mut headers = response.headers().clone();
    strip_hop_by_hop(&mut headers);

    let mut relayed = Response::new(Body::from_stream(response.bytes_stream()));
    *relayed.status_mut() = status;
    *relayed.headers_mut() = headers;
    Ok(relayed)
}
