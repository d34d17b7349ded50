//! Boundary to the remote compile and convert services.

use std::collections::BTreeMap;

use async_trait::async_trait;
use base64::Engine;
use bundle::Target;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    /// The request could not be made at all.
    #[error("{service} service unavailable: {message}")]
    Unavailable { service: &'static str, message: String },

    #[error("{service} service sent an invalid response: {message}")]
    InvalidResponse { service: &'static str, message: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompileRequest {
    pub title: String,
    pub author: String,
    pub description: String,
    pub version: String,
    pub targets: Vec<Target>,
    /// Custom icons only; targets without one use the server default.
    pub icons: BTreeMap<Target, Vec<u8>>,
}

impl CompileRequest {
    pub fn query(&self) -> Vec<(&'static str, String)> {
        let targets = self
            .targets
            .iter()
            .map(Target::name)
            .collect::<Vec<_>>()
            .join(",");
        vec![
            ("title", self.title.clone()),
            ("author", self.author.clone()),
            ("description", self.description.clone()),
            ("version", self.version.clone()),
            ("targets", targets),
        ]
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConvertRequest {
    /// (file name, bytes); names are preserved on the wire.
    pub files: Vec<(String, Vec<u8>)>,
}

/// Decoded JSON body: artifact name → bytes, plus the build log.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemoteResponse {
    pub status: u16,
    pub files: BTreeMap<String, Vec<u8>>,
    pub log: Option<String>,
    pub message: Option<String>,
}

impl RemoteResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn from_json(
        service: &'static str,
        status: u16,
        body: &serde_json::Value,
    ) -> Result<Self, RemoteError> {
        let invalid = |message: String| RemoteError::InvalidResponse { service, message };

        let object = body
            .as_object()
            .ok_or_else(|| invalid("expected a JSON object".to_string()))?;

        let mut response = RemoteResponse {
            status,
            ..Default::default()
        };
        let mut error = None;
        for (key, value) in object {
            let text = value
                .as_str()
                .ok_or_else(|| invalid(format!("`{key}` is not a string")))?;
            match key.as_str() {
                "log" => response.log = Some(text.to_string()),
                "message" => response.message = Some(text.to_string()),
                "error" => error = Some(text.to_string()),
                _ => {
                    let bytes = base64::engine::general_purpose::STANDARD
                        .decode(text)
                        .map_err(|e| invalid(format!("`{key}` is not base64: {e}")))?;
                    response.files.insert(key.clone(), bytes);
                }
            }
        }
        if response.message.is_none() {
            response.message = error;
        }
        Ok(response)
    }
}

#[async_trait]
pub trait CompileService: Send + Sync {
    async fn compile(&self, request: CompileRequest) -> Result<RemoteResponse, RemoteError>;
}

#[async_trait]
pub trait ConvertService: Send + Sync {
    async fn convert(&self, request: ConvertRequest) -> Result<RemoteResponse, RemoteError>;
}
