use std::collections::BTreeMap;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use bundle::{sniff_mime, Aggregate, MediaKind};
use serde_json::Value;
use tracing::warn;

use crate::build_log::BuildLog;
use crate::convert_job::{safe_relative, ConvertJob};
use crate::error::ApiError;
use crate::response::{artifact_body, status_for};
use crate::state::SharedState;

/// Batch-level checks. Any failure rejects the whole request before transcoding starts.
fn admit(name: String, bytes: Vec<u8>) -> Result<ConvertJob, ApiError> {
    if bytes.is_empty() {
        return Err(ApiError::BadRequest(format!("'{name}' is empty")));
    }
    let relative = safe_relative(&name)
        .ok_or_else(|| ApiError::BadRequest(format!("'{name}' is not a valid file path")))?;
    let mime = sniff_mime(&bytes).ok_or_else(|| {
        ApiError::UnsupportedMediaType(format!("'{name}': media type could not be determined"))
    })?;

    let kind = MediaKind::classify(Some(mime));
    if !kind.is_convertible() {
        return Err(ApiError::UnsupportedMediaType(format!(
            "'{name}': unsupported media type {mime}"
        )));
    }

    Ok(ConvertJob {
        name,
        relative,
        kind,
        mime: Some(mime),
        bytes,
    })
}

pub async fn convert(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let mut multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let mut uploads = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        let name = field
            .file_name()
            .or(field.name())
            .map(str::to_string)
            .ok_or_else(|| ApiError::BadRequest("File part without a name".to_string()))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        uploads.push((name, bytes.to_vec()));
    }
    if uploads.is_empty() {
        return Err(ApiError::BadRequest("No files to convert".to_string()));
    }

    let jobs = uploads
        .into_iter()
        .map(|(name, bytes)| admit(name, bytes))
        .collect::<Result<Vec<_>, _>>()?;

    let workdir = tempfile::tempdir()
        .map_err(|e| ApiError::Internal(format!("Failed to create work directory: {e}")))?;
    let mut log = BuildLog::new();
    let mut artifacts = BTreeMap::new();
    let mut succeeded = Vec::new();
    let mut failed = Vec::new();

    for job in jobs {
        let name = job.name.clone();
        match job
            .run(workdir.path(), state.runner.as_ref(), &state.tools, &mut log)
            .await
        {
            Some((out_name, bytes)) => {
                artifacts.insert(out_name, bytes);
                succeeded.push(name);
            }
            None => failed.push(name),
        }
    }

    if !failed.is_empty() {
        log.info(format!("Conversion finished with {} errors.", failed.len()));
    }
    if let Err(e) = workdir.close() {
        warn!("convert: failed to remove work directory: {e}");
    }

    let aggregate = Aggregate::from_parts(succeeded, failed);
    Ok((status_for(&aggregate), artifact_body(&artifacts, log.text())))
}
