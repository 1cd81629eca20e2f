pub mod config;
pub mod error;
pub mod stream;
pub mod validation;

use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_stream::stream;
use axum::{
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::error;

use synth_core::{pcm, wav, SynthManager};

use crate::error::ApiError;
use crate::stream::WavChunkEmitter;
use crate::validation::{validate_stream_chunk_size, validate_synthesis_request};

pub use crate::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub synth: Arc<SynthManager>,
    pub request_count: Arc<AtomicU64>,
    pub config: ServerConfig,
}

/// Body of the streaming synthesis route.
#[derive(Deserialize)]
pub struct StreamSynthRequest {
    pub speaker: String,
    pub text: String,
    pub language: String,
    #[serde(default = "default_add_wav_header")]
    pub add_wav_header: bool,
    #[serde(default = "default_stream_chunk_size")]
    pub stream_chunk_size: u32,
}

fn default_add_wav_header() -> bool {
    true
}

fn default_stream_chunk_size() -> u32 {
    20
}

/// Body of the non-streaming synthesis route.
#[derive(Deserialize)]
pub struct SynthRequest {
    pub speaker: String,
    pub text: String,
    pub language: String,
}

#[derive(Serialize)]
pub struct SynthResponse {
    pub audio_base64: String,
    pub sample_rate: u32,
    pub duration_ms: u64,
}

static START_TIME: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();

/// Record the process start, for the uptime metric.
pub fn init_start_time() {
    let _ = START_TIME.get_or_init(std::time::Instant::now);
}

/// Build the route table.  The middleware stack is assembled by the binary;
/// tests drive this router directly.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
        .route("/studio_speakers", get(studio_speakers))
        .route("/languages", get(languages))
        .route("/tts", post(tts_endpoint))
        .route("/tts_stream", post(tts_stream_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
}

pub async fn health_check() -> &'static str {
    "ok"
}

/// Ordered voice identifiers, or an empty list when no catalog is loaded.
pub async fn studio_speakers(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.synth.catalog().ids())
}

pub async fn languages(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.synth.catalog().languages())
}

/// Non-streaming synthesis: whole-utterance inference, one base64 WAV blob
/// with a finalized header.
pub async fn tts_endpoint(
    State(state): State<AppState>,
    Json(req): Json<SynthRequest>,
) -> Result<Json<SynthResponse>, ApiError> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    validate_synthesis_request(&req.text, Some(&req.language))?;

    let synth = state.synth.clone();
    let samples = tokio::task::spawn_blocking(move || {
        synth.synthesize(&req.speaker, &req.text, &req.language)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Task join error: {e}")))?
    .map_err(ApiError::Synthesis)?;

    let format = state.synth.format();
    let audio_base64 = wav::encode_wav_base64(&samples, format).map_err(ApiError::Synthesis)?;
    let duration_ms = (samples.len() as f32 / format.sample_rate as f32 * 1000.0) as u64;

    Ok(Json(SynthResponse {
        audio_base64,
        sample_rate: format.sample_rate,
        duration_ms,
    }))
}

/// Streaming synthesis: incremental inference on a blocking task, quantized
/// chunks written to the chunked response body as they are produced.
pub async fn tts_stream_endpoint(
    State(state): State<AppState>,
    Json(req): Json<StreamSynthRequest>,
) -> Result<Response, ApiError> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    validate_synthesis_request(&req.text, Some(&req.language))?;
    validate_stream_chunk_size(req.stream_chunk_size)?;

    let format = state.synth.format();
    let add_wav_header = req.add_wav_header;
    let (tx, mut rx) = mpsc::channel::<anyhow::Result<Vec<f32>>>(64);

    let synth = state.synth.clone();
    let chunk_size = req.stream_chunk_size as usize;
    tokio::task::spawn_blocking(move || {
        let chunks = match synth.stream(&req.speaker, &req.text, &req.language, chunk_size) {
            Ok(chunks) => chunks,
            Err(e) => {
                let _ = tx.blocking_send(Err(e));
                return;
            }
        };
        for chunk in chunks {
            if tx.blocking_send(chunk).is_err() {
                // Receiver dropped, stop synthesizing.
                break;
            }
        }
    });

    // Hold the response until the first chunk so resolution and model-load
    // failures still surface as an error status instead of an empty body.
    let first = match rx.recv().await {
        Some(Ok(chunk)) => Some(chunk),
        Some(Err(e)) => return Err(ApiError::Synthesis(e)),
        None => None,
    };

    let mut emitter = WavChunkEmitter::new(format, add_wav_header);
    let body_stream = stream! {
        if let Some(chunk) = first {
            for segment in emitter.emit(pcm::quantize_i16le(&chunk)) {
                yield Ok::<Bytes, Infallible>(segment);
            }
        }
        while let Some(item) = rx.recv().await {
            match item {
                Ok(chunk) => {
                    for segment in emitter.emit(pcm::quantize_i16le(&chunk)) {
                        yield Ok(segment);
                    }
                }
                Err(e) => {
                    // The status is already committed; truncate the stream.
                    error!("inference failed mid-stream: {e:#}");
                    break;
                }
            }
        }
    };

    Ok((
        [(header::CONTENT_TYPE, "audio/wav")],
        Body::from_stream(body_stream),
    )
        .into_response())
}

#[derive(Serialize)]
pub struct MetricsResponse {
    pub cpu_usage_percent: f32,
    pub memory_used_mb: u64,
    pub memory_total_mb: u64,
    pub request_count: u64,
    pub uptime_seconds: u64,
}

pub async fn metrics_endpoint(State(state): State<AppState>) -> Json<MetricsResponse> {
    let mut system = sysinfo::System::new();
    system.refresh_cpu();
    system.refresh_memory();

    let uptime = START_TIME
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0);

    Json(MetricsResponse {
        cpu_usage_percent: system.global_cpu_info().cpu_usage(),
        memory_used_mb: system.used_memory() / 1024 / 1024,
        memory_total_mb: system.total_memory() / 1024 / 1024,
        request_count: state.request_count.load(Ordering::Relaxed),
        uptime_seconds: uptime,
    })
}
