use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tracing::debug;

use crate::remote::{
    CompileRequest, CompileService, ConvertRequest, ConvertService, RemoteError, RemoteResponse,
};

const COMPILE: &str = "compile";
const CONVERT: &str = "convert";

pub struct HttpCompileService {
    url: String,
    client: reqwest::Client,
}

impl HttpCompileService {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }
}

pub struct HttpConvertService {
    url: String,
    client: reqwest::Client,
}

impl HttpConvertService {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }
}

fn unavailable(service: &'static str, e: reqwest::Error) -> RemoteError {
    RemoteError::Unavailable {
        service,
        message: e.to_string(),
    }
}

async fn decode(service: &'static str, resp: reqwest::Response) -> Result<RemoteResponse, RemoteError> {
    let status = resp.status().as_u16();
    let body = resp.bytes().await.map_err(|e| unavailable(service, e))?;
    debug!(service, status, len = body.len(), "remote: response received");
    decode_body(service, status, &body)
}

const MAX_ERROR_TEXT: usize = 200;

/// A 2xx body must be the JSON artifact map. An error status with a body that is not
/// (e.g. a proxy error page) keeps its text as the message.
fn decode_body(service: &'static str, status: u16, body: &[u8]) -> Result<RemoteResponse, RemoteError> {
    let decoded = match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(value) => RemoteResponse::from_json(service, status, &value),
        Err(e) => Err(RemoteError::InvalidResponse {
            service,
            message: e.to_string(),
        }),
    };

    match decoded {
        Err(_) if !(200..300).contains(&status) => {
            let text = String::from_utf8_lossy(body);
            let text: String = text.trim().chars().take(MAX_ERROR_TEXT).collect();
            Ok(RemoteResponse {
                status,
                message: Some(if text.is_empty() { "empty response body".to_string() } else { text }),
                ..Default::default()
            })
        }
        other => other,
    }
}

#[async_trait]
impl CompileService for HttpCompileService {
    async fn compile(&self, request: CompileRequest) -> Result<RemoteResponse, RemoteError> {
        let mut form = Form::new();
        for (target, bytes) in &request.icons {
            let format = target.icon_format();
            let name = format!("icon-{target}");
            let part = Part::bytes(bytes.clone())
                .file_name(format!("{name}.{}", format.extension()))
                .mime_str(format.mime())
                .map_err(|e| unavailable(COMPILE, e))?;
            form = form.part(name, part);
        }

        let resp = self
            .client
            .post(&self.url)
            .query(&request.query())
            .multipart(form)
            .send()
            .await
            .map_err(|e| unavailable(COMPILE, e))?;

        decode(COMPILE, resp).await
    }
}

#[async_trait]
impl ConvertService for HttpConvertService {
    async fn convert(&self, request: ConvertRequest) -> Result<RemoteResponse, RemoteError> {
        let form = request
            .files
            .into_iter()
            .fold(Form::new(), |form, (name, bytes)| {
                form.part("files", Part::bytes(bytes).file_name(name))
            });

        let resp = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| unavailable(CONVERT, e))?;

        decode(CONVERT, resp).await
    }
}
