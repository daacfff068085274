use crate::error::ApiError;
use crate::manager::PipelineManager;
use crate::stream::mjpeg_response;
use anyhow::{Context, anyhow};
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::response::{Html, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub fn router(manager: Arc<PipelineManager>) -> Router {
    // Video uploads dwarf axum's 2 MB default body cap.
    let body_limit = DefaultBodyLimit::max(manager.upload_limit_bytes());
    Router::new()
        .route("/", get(index))
        .route("/set_ip", post(set_ip))
        .route("/upload", post(upload))
        .route("/video_feed/:camera_id", get(video_feed))
        .layer(CorsLayer::permissive())
        .layer(body_limit)
        .with_state(manager)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_PAGE)
}

#[derive(Deserialize)]
struct SetIpRequest {
    camera_id: u32,
    ip: String,
}

async fn set_ip(
    State(manager): State<Arc<PipelineManager>>,
    Json(request): Json<SetIpRequest>,
) -> Json<Value> {
    manager.register_live(request.camera_id, &request.ip);
    Json(json!({ "message": "IP address set successfully" }))
}

async fn upload(
    State(manager): State<Arc<PipelineManager>>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut file: Option<(String, axum::body::Bytes)> = None;
    let mut camera_id: Option<u32> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| ApiError::UploadValidation(error.to_string()))?
    {
        match field.name() {
            Some("file") => {
                let name = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|error| ApiError::UploadValidation(error.to_string()))?;
                file = Some((name, data));
            }
            Some("camera_id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|error| ApiError::UploadValidation(error.to_string()))?;
                camera_id = text.trim().parse().ok();
            }
            _ => {}
        }
    }

    let (name, data) =
        file.ok_or_else(|| ApiError::UploadValidation("no file part".to_string()))?;
    let camera_id =
        camera_id.ok_or_else(|| ApiError::UploadValidation("invalid camera id".to_string()))?;
    let filename = stored_filename(&name)
        .ok_or_else(|| ApiError::UploadValidation("no selected file".to_string()))?;
    let destination = PathBuf::from(manager.uploads_dir()).join(filename);

    let worker_manager = Arc::clone(&manager);
    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        std::fs::write(&destination, &data)
            .with_context(|| format!("failed to persist upload to {}", destination.display()))?;
        worker_manager.start_file_processing(camera_id, &destination)
    })
    .await
    .map_err(|error| ApiError::Internal(anyhow!(error)))??;

    Ok(Json(json!({ "message": "File uploaded successfully" })))
}

async fn video_feed(
    State(manager): State<Arc<PipelineManager>>,
    Path(camera_id): Path<u32>,
) -> Result<Response, ApiError> {
    // get_feed may start a snapshot poller, which builds a blocking
    // HTTP client; keep that off the async workers.
    let feed = tokio::task::spawn_blocking(move || manager.get_feed(camera_id))
        .await
        .map_err(|error| ApiError::Internal(anyhow!(error)))??;
    Ok(mjpeg_response(feed))
}

/// Strip any path components from a client-supplied filename.
fn stored_filename(name: &str) -> Option<String> {
    let filename = FsPath::new(name).file_name()?.to_str()?;
    if filename.is_empty() || filename == ".." || filename == "." {
        return None;
    }
    Some(filename.to_string())
}

const INDEX_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>Fall Detection</title>
</head>
<body>
  <h1>Fall Detection</h1>
  <form id="upload" action="/upload" method="post" enctype="multipart/form-data">
    <input type="file" name="file">
    <input type="number" name="camera_id" value="0" min="0">
    <button type="submit">Upload video</button>
  </form>
  <form id="set-ip" onsubmit="return setIp(event)">
    <input type="text" id="ip" placeholder="camera address">
    <input type="number" id="ip-camera-id" value="0" min="0">
    <button type="submit">Set camera IP</button>
  </form>
  <img src="/video_feed/0" alt="camera 0" width="640">
  <script>
    function setIp(event) {
      event.preventDefault();
      fetch('/set_ip', {
        method: 'POST',
        headers: { 'Content-Type': 'application/json' },
        body: JSON.stringify({
          camera_id: Number(document.getElementById('ip-camera-id').value),
          ip: document.getElementById('ip').value,
        }),
      });
      return false;
    }
  </script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use image::RgbImage;
    use pipeline::errors::EstimatorError;
    use pipeline::{PoseEstimator, SubjectDetection};
    use tower::ServiceExt;

    struct EmptyEstimator;

    impl PoseEstimator for EmptyEstimator {
        fn estimate(
            &self,
            _frame: &RgbImage,
        ) -> Result<Vec<SubjectDetection>, EstimatorError> {
            Ok(Vec::new())
        }
    }

    fn test_router(uploads_dir: &FsPath) -> Router {
        let mut config = GatewayConfig::from_env().unwrap();
        config.uploads_dir = uploads_dir.to_str().unwrap().to_string();
        let manager = Arc::new(PipelineManager::new(config, Arc::new(EmptyEstimator)));
        router(manager)
    }

    fn multipart_body(boundary: &str, file: Option<(&str, &[u8])>, camera_id: &str) -> Vec<u8> {
        let mut body = Vec::new();
        if let Some((filename, data)) = file {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; \
                     name=\"file\"; filename=\"{filename}\"\r\n\
                     Content-Type: video/mp4\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; \
                 name=\"camera_id\"\r\n\r\n{camera_id}\r\n--{boundary}--\r\n"
            )
            .as_bytes(),
        );
        body
    }

    fn upload_request(boundary: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn upload_larger_than_two_megabytes_reaches_the_handler() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(dir.path());

        let payload = vec![0u8; 3 * 1024 * 1024];
        let body = multipart_body("reqbound", Some(("clip.mp4", &payload)), "0");
        let response = app.oneshot(upload_request("reqbound", body)).await.unwrap();

        // The payload is not a decodable video, so processing fails
        // after the file lands on disk; the parser must not have cut
        // the request short.
        assert_ne!(response.status(), StatusCode::BAD_REQUEST);
        assert!(dir.path().join("clip.mp4").exists());
    }

    #[tokio::test]
    async fn upload_without_file_part_is_a_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(dir.path());

        let body = multipart_body("reqbound", None, "0");
        let response = app.oneshot(upload_request("reqbound", body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn stored_filename_strips_directories() {
        assert_eq!(stored_filename("clip.mp4").as_deref(), Some("clip.mp4"));
        assert_eq!(
            stored_filename("/tmp/evil/../clip.mp4").as_deref(),
            Some("clip.mp4")
        );
    }

    #[test]
    fn stored_filename_rejects_empty_and_dot_names() {
        assert_eq!(stored_filename(""), None);
        assert_eq!(stored_filename("/"), None);
        assert_eq!(stored_filename(".."), None);
    }
}
