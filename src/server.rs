//! HTTP surface: /analyze, /health, /test-prediction

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::decision::{ClassificationResult, Status};
use crate::pipeline::Analyzer;

pub const MAX_UPLOAD_SIZE: usize = 200 * 1024 * 1024; // 200 MB

struct ServerState {
    analyzer: Arc<Analyzer>,
    sample_video: PathBuf,
}

#[derive(Debug, Deserialize)]
struct AnalyzeParams {
    threshold: Option<f64>,
}

pub fn router(analyzer: Arc<Analyzer>, sample_video: PathBuf) -> Router {
    let state = Arc::new(ServerState {
        analyzer,
        sample_video,
    });

    Router::new()
        .route("/analyze", post(analyze))
        .route("/health", get(health))
        .route("/test-prediction", get(test_prediction))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "status": "error", "message": message.into() }))).into_response()
}

fn result_response(result: ClassificationResult) -> Response {
    let status = match result.status {
        Status::Ok | Status::NoFrames => StatusCode::OK,
        Status::Error => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(result)).into_response()
}

/// Scratch-file suffix from the upload's name, then its content type.
fn upload_extension(file_name: Option<&str>, content_type: Option<&str>) -> String {
    if let Some(ext) = file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
    {
        return ext.to_lowercase();
    }
    match content_type {
        Some("video/webm") => "webm",
        Some("video/quicktime") => "mov",
        Some("video/x-msvideo") => "avi",
        Some("video/x-matroska") => "mkv",
        _ => "mp4",
    }
    .to_string()
}

/// POST /analyze - multipart `video` file plus optional `threshold`
async fn analyze(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<AnalyzeParams>,
    mut multipart: Multipart,
) -> Response {
    let mut upload: Option<(Bytes, String)> = None;
    let mut threshold = params.threshold;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                log::warn!("Multipart field error: {}", e);
                return error_response(StatusCode::BAD_REQUEST, format!("Malformed upload: {}", e));
            }
        };

        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("video") => {
                let ext = upload_extension(field.file_name(), field.content_type());
                match field.bytes().await {
                    Ok(bytes) => upload = Some((bytes, ext)),
                    Err(e) => {
                        log::warn!("Failed to read video field: {}", e);
                        return error_response(StatusCode::BAD_REQUEST, format!("Malformed upload: {}", e));
                    }
                }
            }
            Some("threshold") => {
                let text = match field.text().await {
                    Ok(text) => text,
                    Err(e) => {
                        log::warn!("Failed to read threshold field: {}", e);
                        return error_response(StatusCode::BAD_REQUEST, format!("Malformed upload: {}", e));
                    }
                };
                match text.trim().parse::<f64>() {
                    Ok(value) => threshold = Some(value),
                    Err(_) => {
                        return error_response(StatusCode::BAD_REQUEST, format!("Invalid threshold {:?}", text));
                    }
                }
            }
            _ => continue,
        }
    }

    let Some((bytes, ext)) = upload else {
        return error_response(StatusCode::BAD_REQUEST, "No video file provided");
    };
    if let Some(t) = threshold.filter(|t| !(0.0..=1.0).contains(t)) {
        return error_response(StatusCode::BAD_REQUEST, format!("Threshold {} outside [0, 1]", t));
    }

    log::info!("Received {} byte video upload (.{})", bytes.len(), ext);

    let analyzer = state.analyzer.clone();
    let outcome = tokio::task::spawn_blocking(move || -> std::io::Result<ClassificationResult> {
        // Removed when `scratch` drops, whichever way this closure exits
        let mut scratch = tempfile::Builder::new()
            .prefix("realies-")
            .suffix(&format!(".{}", ext))
            .tempfile()?;
        scratch.write_all(&bytes)?;
        scratch.flush()?;
        Ok(analyzer.analyze(scratch.path(), threshold))
    })
    .await;

    match outcome {
        Ok(Ok(result)) => result_response(result),
        Ok(Err(e)) => {
            log::error!("Failed to stage upload: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("Analysis failed: {}", e))
        }
        Err(e) => {
            log::error!("Analysis task failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("Analysis failed: {}", e))
        }
    }
}

/// GET /health
async fn health(State(state): State<Arc<ServerState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": "Server is running",
        "strategy": state.analyzer.strategy_name(),
    }))
}

/// GET /test-prediction - runs the bundled sample video if there is one
async fn test_prediction(State(state): State<Arc<ServerState>>) -> Response {
    if !state.sample_video.is_file() {
        return Json(json!({
            "status": "ok",
            "message": "Pipeline loaded",
            "test_video": format!("{} not found", state.sample_video.display()),
        }))
        .into_response();
    }

    let analyzer = state.analyzer.clone();
    let path = state.sample_video.clone();
    match tokio::task::spawn_blocking(move || analyzer.analyze(&path, None)).await {
        Ok(result) => Json(json!({
            "status": "ok",
            "message": "Test prediction completed",
            "test_result": result,
        }))
        .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("Prediction test failed: {}", e)),
    }
}
