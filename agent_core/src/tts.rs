//! Streaming synthesis client.
//!
//! One call drives one chunked request to the synthesis endpoint, feeds the
//! response bytes through a per-call [`FrameEncoder`], and republishes every
//! completed frame, in byte order, on the call's outbound channel.

use std::{
    pin::Pin,
    sync::{Arc, Mutex},
    task::{Context, Poll},
    time::Duration,
};

use futures::{Stream, StreamExt};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use synth_core::{
    frame::{AudioFrame, FrameEncoder},
    AudioFormat,
};

/// Granularity the client always requests from the streaming route.
pub const STREAM_CHUNK_SIZE: u32 = 150;

/// Client-held synthesis options.  The voice may be changed concurrently by
/// the coordinator; a synthesis call snapshots the options at issuance, so a
/// change never affects an already-dispatched request.
#[derive(Debug, Clone)]
pub struct TtsOptions {
    pub endpoint: String,
    pub language: String,
    pub voice: String,
}

impl Default for TtsOptions {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8020".into(),
            language: "en_US".into(),
            voice: "norman".into(),
        }
    }
}

/// Connection-level timeouts for one synthesis call.
#[derive(Debug, Clone, Copy)]
pub struct ConnOptions {
    /// Budget for connecting and receiving response headers.
    pub request_timeout: Duration,
    /// Budget for each wait on the next body chunk.
    pub chunk_timeout: Duration,
}

impl Default for ConnOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            chunk_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Error)]
pub enum TtsError {
    /// No progress within the configured window.
    #[error("synthesis request timed out")]
    Timeout,

    /// The endpoint explicitly reported failure.
    #[error("synthesis endpoint returned status {code}: {message}")]
    Status { code: u16, message: String },

    /// Any other transport-level failure.
    #[error("synthesis connection failed: {0}")]
    Connection(String),
}

fn map_transport_error(e: reqwest::Error) -> TtsError {
    if e.is_timeout() {
        TtsError::Timeout
    } else {
        TtsError::Connection(e.to_string())
    }
}

#[derive(Serialize)]
struct StreamRequestBody<'a> {
    text: &'a str,
    language: &'a str,
    speaker: &'a str,
    add_wav_header: bool,
    stream_chunk_size: u32,
}

/// Ordered frames of one synthesis call.
///
/// The stream is single-pass and forward-only; a fresh call creates a fresh
/// stream.  An error item is terminal for the call, but frames already
/// delivered are never retracted.
pub struct FrameStream {
    request_id: Uuid,
    rx: ReceiverStream<Result<AudioFrame, TtsError>>,
}

impl FrameStream {
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }
}

impl Stream for FrameStream {
    type Item = Result<AudioFrame, TtsError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx).poll_next(cx)
    }
}

#[derive(Clone)]
pub struct TtsClient {
    http: reqwest::Client,
    opts: Arc<Mutex<TtsOptions>>,
    conn: ConnOptions,
}

impl TtsClient {
    pub fn new(opts: TtsOptions) -> Self {
        Self::with_conn_options(opts, ConnOptions::default())
    }

    pub fn with_conn_options(opts: TtsOptions, conn: ConnOptions) -> Self {
        Self {
            http: reqwest::Client::new(),
            opts: Arc::new(Mutex::new(opts)),
            conn,
        }
    }

    /// Snapshot of the current options.
    pub fn options(&self) -> TtsOptions {
        self.opts.lock().unwrap().clone()
    }

    /// Update the voice used by the next synthesis call.  Last write wins;
    /// calls already in flight are unaffected.
    pub fn set_voice(&self, voice: &str) {
        self.opts.lock().unwrap().voice = voice.to_string();
    }

    pub fn voice(&self) -> String {
        self.opts.lock().unwrap().voice.clone()
    }

    /// Synthesize one utterance and stream its frames.
    ///
    /// Each call owns an independent frame encoder; concurrent calls share
    /// nothing beyond the options they snapshot at issuance.
    pub fn synthesize(&self, text: &str) -> FrameStream {
        let opts = self.options();
        let request_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(64);

        let http = self.http.clone();
        let conn = self.conn;
        let text = text.to_string();
        tokio::spawn(async move {
            if let Err(e) = run_stream(http, opts, conn, text, &tx).await {
                let _ = tx.send(Err(e)).await;
            }
        });

        FrameStream {
            request_id,
            rx: ReceiverStream::new(rx),
        }
    }
}

impl std::fmt::Debug for TtsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtsClient")
            .field("opts", &self.options())
            .finish()
    }
}

async fn run_stream(
    http: reqwest::Client,
    opts: TtsOptions,
    conn: ConnOptions,
    text: String,
    tx: &mpsc::Sender<Result<AudioFrame, TtsError>>,
) -> Result<(), TtsError> {
    let body = StreamRequestBody {
        text: &text,
        language: &opts.language,
        speaker: &opts.voice,
        add_wav_header: true,
        stream_chunk_size: STREAM_CHUNK_SIZE,
    };

    let request = http
        .post(format!("{}/tts_stream", opts.endpoint))
        .json(&body)
        .send();
    let resp = tokio::time::timeout(conn.request_timeout, request)
        .await
        .map_err(|_| TtsError::Timeout)?
        .map_err(map_transport_error)?;

    let status = resp.status();
    if !status.is_success() {
        let message = resp.text().await.unwrap_or_default();
        return Err(TtsError::Status {
            code: status.as_u16(),
            message,
        });
    }

    let mut encoder = FrameEncoder::new(AudioFormat::PIPELINE);
    let mut chunks = resp.bytes_stream();
    loop {
        let next = tokio::time::timeout(conn.chunk_timeout, chunks.next())
            .await
            .map_err(|_| TtsError::Timeout)?;
        match next {
            Some(Ok(chunk)) => {
                for frame in encoder.write(&chunk) {
                    if tx.send(Ok(frame)).await.is_err() {
                        // Consumer stopped listening; natural teardown.
                        return Ok(());
                    }
                }
            }
            Some(Err(e)) => return Err(map_transport_error(e)),
            None => break,
        }
    }

    if let Some(frame) = encoder.flush() {
        let _ = tx.send(Ok(frame)).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_voice_does_not_affect_existing_snapshot() {
        let client = TtsClient::new(TtsOptions::default());
        let snapshot = client.options();
        client.set_voice("thorsten");

        assert_eq!(snapshot.voice, "norman");
        assert_eq!(client.voice(), "thorsten");
    }

    #[test]
    fn last_voice_write_wins() {
        let client = TtsClient::new(TtsOptions::default());
        client.set_voice("a");
        client.set_voice("b");
        assert_eq!(client.voice(), "b");
    }

    #[tokio::test]
    async fn unreachable_endpoint_maps_to_connection_error() {
        let client = TtsClient::with_conn_options(
            TtsOptions {
                // Reserved TEST-NET address, nothing listens here.
                endpoint: "http://192.0.2.1:1".into(),
                ..TtsOptions::default()
            },
            ConnOptions {
                request_timeout: Duration::from_millis(500),
                chunk_timeout: Duration::from_millis(500),
            },
        );

        let mut stream = client.synthesize("hello");
        match stream.next().await {
            Some(Err(TtsError::Connection(_))) | Some(Err(TtsError::Timeout)) => {}
            other => panic!("expected transport error, got {other:?}"),
        }
    }
}
