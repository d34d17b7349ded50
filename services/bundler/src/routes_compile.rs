use std::collections::BTreeMap;

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::Json;
use bundle::{validate_icon, Aggregate, IconError, Target};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::build_log::BuildLog;
use crate::compile_job::{CompileJob, CompileMetadata};
use crate::error::ApiError;
use crate::response::{artifact_body, status_for};
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct CompileQuery {
    pub title: String,
    pub author: String,
    pub description: String,
    pub version: String,
    /// Comma-joined target names.
    pub targets: String,
}

impl CompileQuery {
    fn into_parts(self) -> Result<(CompileMetadata, Vec<Target>), ApiError> {
        for (field, value) in [
            ("title", &self.title),
            ("author", &self.author),
            ("description", &self.description),
            ("version", &self.version),
        ] {
            if value.trim().is_empty() {
                return Err(ApiError::BadRequest(format!("Query parameter `{field}` is empty")));
            }
        }

        let mut targets = Vec::new();
        for name in self.targets.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let target: Target = name
                .parse()
                .map_err(|_| ApiError::BadRequest(format!("Invalid target: {name}")))?;
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
        if targets.is_empty() {
            return Err(ApiError::BadRequest("No targets specified".to_string()));
        }

        let metadata = CompileMetadata {
            title: self.title,
            author: self.author,
            description: self.description,
            version: self.version,
        };
        Ok((metadata, targets))
    }
}

fn internal(e: impl std::fmt::Display) -> ApiError {
    ApiError::Internal(e.to_string())
}

/// Parts named `icon-<target>`; anything else is ignored.
async fn read_icons(
    multipart: &mut Multipart,
    targets: &[Target],
) -> Result<BTreeMap<Target, Vec<u8>>, ApiError> {
    let mut icons = BTreeMap::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        let target = field
            .name()
            .and_then(|n| n.strip_prefix("icon-"))
            .and_then(|t| t.parse::<Target>().ok());
        let Some(target) = target else { continue };

        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        if targets.contains(&target) {
            icons.insert(target, bytes.to_vec());
        }
    }
    Ok(icons)
}

pub async fn compile(
    State(state): State<SharedState>,
    query: Result<Query<CompileQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let (metadata, targets) = query.into_parts()?;
    let mut multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let icons = read_icons(&mut multipart, &targets).await?;

    // every custom icon is checked before any stage runs
    let to_check: Vec<(Target, Vec<u8>)> = icons.iter().map(|(t, b)| (*t, b.clone())).collect();
    tokio::task::spawn_blocking(move || {
        for (target, bytes) in &to_check {
            validate_icon(*target, bytes)?;
        }
        Ok::<_, IconError>(())
    })
    .await
    .map_err(internal)??;

    let workdir = tempfile::tempdir().map_err(|e| internal(format!("Failed to create work directory: {e}")))?;
    let mut log = BuildLog::new();
    let mut artifacts = BTreeMap::new();
    let mut succeeded = Vec::new();
    let mut failed = Vec::new();

    for &target in &targets {
        let dir = workdir.path().join(target.name());
        tokio::fs::create_dir_all(&dir).await.map_err(internal)?;
        log.info(format!("Creating {target} bundle for {}", metadata.title));

        let icon = match icons.get(&target) {
            Some(bytes) => {
                let path = dir.join(format!("icon-{target}.{}", target.icon_format().extension()));
                tokio::fs::write(&path, bytes).await.map_err(internal)?;
                log.info(format!("Using custom icon for {target}"));
                path
            }
            None => {
                log.info(format!("Using default icon for {target}"));
                state.resources.default_icon(target)
            }
        };

        let job = CompileJob {
            target,
            metadata: &metadata,
            workdir: dir,
            icon,
            resources: &state.resources,
            tools: &state.tools,
        };
        match job.run(state.runner.as_ref(), &mut log).await {
            Some(binary) => {
                artifacts.insert(target.name().to_string(), binary);
                succeeded.push(target);
            }
            None => failed.push(target),
        }
        log.info("--- [END] ---");
    }

    if let Err(e) = workdir.close() {
        warn!("compile: failed to remove work directory: {e}");
    }

    let aggregate = Aggregate::from_parts(succeeded, failed);
    Ok((status_for(&aggregate), artifact_body(&artifacts, log.text())))
}
