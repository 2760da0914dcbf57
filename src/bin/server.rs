//! HTTP front end for the analyzer.
//!
//! ## Environment Variables
//! - `PORT` - port to listen on (default: `5000`)
//! - `REALIES_SAMPLE_VIDEO` - video for `GET /test-prediction` (default: `1.mp4`)
//! - every `REALIES_*` model and pipeline knob read by `Config`

use anyhow::{Context, Result};
use std::sync::Arc;

use realies::decoder::FfmpegDecoder;
use realies::{Analyzer, AnalyzerSettings, Config};

#[tokio::main]
async fn main() -> Result<()> {
    realies::logging::init("info");

    let config = Config::from_env();

    // Weight downloads and mmaps block
    let load_config = config.clone();
    let strategy = tokio::task::spawn_blocking(move || realies::models::load_strategy(&load_config))
        .await
        .context("Model loading task failed")??;

    let decoder = FfmpegDecoder::with_binaries(config.ffmpeg.clone(), config.ffprobe.clone());
    let analyzer = Arc::new(Analyzer::new(
        Box::new(decoder),
        strategy,
        AnalyzerSettings::from(&config),
    ));

    let app = realies::server::router(analyzer, config.sample_video.clone());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    log::info!("Listening on http://{}", addr);
    log::info!("Endpoints: POST /analyze, GET /health, GET /test-prediction");
    axum::serve(listener, app).await.context("Server failed")?;
    Ok(())
}
