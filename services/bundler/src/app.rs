use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::state::SharedState;

/// Uploads carry whole asset sets.
const BODY_LIMIT: usize = 64 * 1024 * 1024;

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(crate::routes_health::health))
        .route("/compile", post(crate::routes_compile::compile))
        .route("/convert", post(crate::routes_convert::convert))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use base64::Engine;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::resources::Resources;
    use crate::state::AppState;
    use crate::toolchain::{Stage, ToolOutput, ToolRunner, ToolSet};

    /// Writes every expected output except when `fail` names the program or the output file.
    struct StubRunner {
        calls: AtomicUsize,
        fail: Option<&'static str>,
        outputs: Mutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl ToolRunner for StubRunner {
        async fn run(&self, stage: &Stage) -> std::io::Result<ToolOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outputs.lock().unwrap().push(stage.output.clone());
            let output_name = stage.output.file_name().and_then(|n| n.to_str());
            let failing = self.fail.is_some_and(|f| f == stage.program || Some(f) == output_name);
            if !failing {
                tokio::fs::write(&stage.output, format!("{} output", stage.program)).await?;
            }
            Ok(ToolOutput { code: Some(0), stderr: String::new() })
        }
    }

    fn app(fail: Option<&'static str>) -> (Router, Arc<StubRunner>) {
        let runner = Arc::new(StubRunner {
            calls: AtomicUsize::new(0),
            fail,
            outputs: Mutex::new(Vec::new()),
        });
        let state = Arc::new(AppState {
            resources: Resources::new("resources"),
            tools: ToolSet::default(),
            runner: runner.clone(),
        });
        (build_router(state), runner)
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut out = Vec::new();
        image::RgbaImage::new(width, height)
            .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    const BOUNDARY: &str = "bundler-test-boundary";

    fn multipart(parts: &[(&str, Option<&str>, &[u8])]) -> Body {
        let mut body = Vec::new();
        for (name, file_name, bytes) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            let disposition = match file_name {
                Some(f) => format!("Content-Disposition: form-data; name=\"{name}\"; filename=\"{f}\"\r\n"),
                None => format!("Content-Disposition: form-data; name=\"{name}\"\r\n"),
            };
            body.extend_from_slice(disposition.as_bytes());
            body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Body::from(body)
    }

    fn post(uri: &str, body: Body) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(body)
            .unwrap()
    }

    async fn send(router: Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = router.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn assert_workdirs_removed(runner: &StubRunner) {
        let outputs = runner.outputs.lock().unwrap();
        assert!(!outputs.is_empty());
        for output in outputs.iter() {
            let dir = output.parent().unwrap();
            assert!(!dir.exists(), "{} still exists", dir.display());
        }
    }

    const COMPILE: &str = "/compile?title=Demo&author=Tester&description=A%20demo&version=1.0.0";

    fn no_icons() -> Body {
        multipart(&[("note", None, b"none")])
    }

    #[tokio::test]
    async fn test_health() {
        let (router, _) = app(None);
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(router, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_compile_all_targets_succeed() {
        let (router, runner) = app(None);
        let (status, body) = send(router, post(&format!("{COMPILE}&targets=ctr,hac,cafe"), no_icons())).await;

        assert_eq!(status, StatusCode::OK);
        let ctr = base64::engine::general_purpose::STANDARD
            .decode(body["ctr"].as_str().unwrap())
            .unwrap();
        assert_eq!(ctr, b"3dsxtool output");
        assert!(body["hac"].is_string());
        assert!(body["cafe"].is_string());
        assert!(body["log"].as_str().unwrap().contains("Creating ctr bundle for Demo"));
        assert_eq!(runner.calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_compile_partial_success() {
        let (router, _) = app(Some("elf2nro"));
        let (status, body) = send(router, post(&format!("{COMPILE}&targets=ctr,hac"), no_icons())).await;

        assert_eq!(status, StatusCode::PARTIAL_CONTENT);
        let keys: Vec<&String> = body.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 2);
        assert!(body["ctr"].is_string());
        assert!(body.get("hac").is_none());
        assert!(body["log"].as_str().unwrap().contains("Failed to create"));
    }

    #[tokio::test]
    async fn test_compile_single_failure_is_unprocessable() {
        let (router, _) = app(Some("elf2nro"));
        let (status, body) = send(router, post(&format!("{COMPILE}&targets=hac"), no_icons())).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body.get("hac").is_none());
        assert!(body["log"].is_string());
    }

    #[tokio::test]
    async fn test_compile_wrong_icon_size_rejected_up_front() {
        let (router, runner) = app(None);
        let icon = png(64, 64);
        let body = multipart(&[("icon-ctr", Some("icon.png"), &icon)]);
        let (status, body) = send(router, post(&format!("{COMPILE}&targets=ctr,hac"), body)).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["message"].as_str().unwrap().contains("ctr"));
        assert_eq!(runner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_compile_wrong_icon_format_is_unsupported() {
        let (router, runner) = app(None);
        let icon = png(256, 256);
        let body = multipart(&[("icon-hac", Some("icon.png"), &icon)]);
        let (status, _) = send(router, post(&format!("{COMPILE}&targets=hac"), body)).await;

        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(runner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_compile_custom_icon_accepted() {
        let (router, _) = app(None);
        let icon = png(48, 48);
        let body = multipart(&[("icon-ctr", Some("icon.png"), &icon)]);
        let (status, body) = send(router, post(&format!("{COMPILE}&targets=ctr"), body)).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["log"].as_str().unwrap().contains("Using custom icon for ctr"));
    }

    #[tokio::test]
    async fn test_compile_bad_query() {
        let (router, _) = app(None);
        let (status, _) = send(router, post("/compile?title=Demo&targets=ctr", no_icons())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (router, _) = app(None);
        let (status, body) = send(router, post(&format!("{COMPILE}&targets=ctr,wii"), no_icons())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("wii"));

        let (router, _) = app(None);
        let (status, _) = send(router, post(&format!("{COMPILE}&targets=%20"), no_icons())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_compile_ctr_title_too_long() {
        let (router, runner) = app(None);
        let title = "x".repeat(0x41);
        let uri = format!("/compile?title={title}&author=Tester&description=A&version=1.0.0&targets=ctr");
        let (status, body) = send(router, post(&uri, no_icons())).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["log"].as_str().unwrap().contains("Title is too long"));
        assert_eq!(runner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_convert_textures() {
        let (router, runner) = app(None);
        let (hero, logo) = (png(32, 32), png(64, 16));
        let body = multipart(&[
            ("files", Some("gfx/hero.png"), &hero),
            ("files", Some("logo.png"), &logo),
        ]);
        let (status, body) = send(router, post("/convert", body)).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["gfx/hero.t3x"].is_string());
        assert!(body["logo.t3x"].is_string());
        assert_eq!(runner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_convert_partial_success() {
        let (router, runner) = app(None);
        let (good, tiny) = (png(32, 32), png(2, 2));
        let body = multipart(&[
            ("files", Some("good.png"), &good),
            ("files", Some("tiny.png"), &tiny),
        ]);
        let (status, body) = send(router, post("/convert", body)).await;

        assert_eq!(status, StatusCode::PARTIAL_CONTENT);
        assert!(body["good.t3x"].is_string());
        assert!(body.get("tiny.t3x").is_none());
        assert!(body["log"].as_str().unwrap().contains("Conversion finished with 1 errors."));
        assert_eq!(runner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_convert_single_failure() {
        let (router, _) = app(None);
        let tiny = png(2, 2);
        let (status, _) = send(router, post("/convert", multipart(&[("files", Some("tiny.png"), &tiny)]))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_convert_unsupported_rejects_batch() {
        let (router, runner) = app(None);
        let good = png(32, 32);
        let body = multipart(&[
            ("files", Some("good.png"), &good),
            ("files", Some("notes.txt"), b"just some text"),
        ]);
        let (status, body) = send(router, post("/convert", body)).await;

        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(body["message"].as_str().unwrap().contains("notes.txt"));
        assert_eq!(runner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_convert_bad_uploads() {
        let (router, _) = app(None);
        let (status, _) = send(router, post("/convert", multipart(&[("files", Some("empty.png"), b"")]))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (router, _) = app(None);
        let good = png(32, 32);
        let body = multipart(&[("files", Some("../escape.png"), &good)]);
        let (status, _) = send(router, post("/convert", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_compile_workdir_removed_after_partial_failure() {
        let (router, runner) = app(Some("elf2nro"));
        let (status, _) = send(router, post(&format!("{COMPILE}&targets=ctr,hac"), no_icons())).await;

        assert_eq!(status, StatusCode::PARTIAL_CONTENT);
        assert_eq!(runner.calls.load(Ordering::SeqCst), 4);
        assert_workdirs_removed(&runner);
    }

    #[tokio::test]
    async fn test_convert_workdir_removed_after_partial_failure() {
        let (router, runner) = app(Some("bad.t3x"));
        let (good, bad) = (png(32, 32), png(16, 16));
        let body = multipart(&[
            ("files", Some("gfx/hero.png"), &good),
            ("files", Some("gfx/bad.png"), &bad),
        ]);
        let (status, body) = send(router, post("/convert", body)).await;

        assert_eq!(status, StatusCode::PARTIAL_CONTENT);
        assert!(body["gfx/hero.t3x"].is_string());
        assert!(body.get("gfx/bad.t3x").is_none());
        assert_eq!(runner.calls.load(Ordering::SeqCst), 2);
        assert_workdirs_removed(&runner);
    }
}
