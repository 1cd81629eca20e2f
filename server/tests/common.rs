//! Common utilities for integration tests
#![allow(dead_code)]

use std::sync::{atomic::AtomicU64, Arc};

use axum::Router;

use server::{router, AppState, ServerConfig};
use synth_core::{
    model::{Rechunk, SampleChunks, SpeechModel},
    AudioFormat, SpeakerCatalog, SynthManager, VoiceEntry,
};

/// Deterministic sample ramp used by the scripted model.
pub fn scripted_samples(total: usize) -> Vec<f32> {
    (0..total).map(|i| (i % 100) as f32 / 100.0 - 0.5).collect()
}

/// Model that replays a fixed utterance regardless of input, honoring the
/// requested chunk granularity the way the production adapter does.
pub struct ScriptedModel {
    chunks: Vec<Vec<f32>>,
}

impl ScriptedModel {
    /// Scripted inference yielding `total` samples in parts of 400.
    pub fn with_total_samples(total: usize) -> Self {
        let samples = scripted_samples(total);
        let chunks = samples.chunks(400).map(|c| c.to_vec()).collect();
        Self { chunks }
    }
}

impl SpeechModel for ScriptedModel {
    fn format(&self) -> AudioFormat {
        AudioFormat::PIPELINE
    }

    fn stream(
        &self,
        _voice: &str,
        _text: &str,
        _language: &str,
        chunk_size: usize,
    ) -> anyhow::Result<SampleChunks> {
        let parts: Vec<anyhow::Result<Vec<f32>>> =
            self.chunks.iter().cloned().map(Ok).collect();
        Ok(Box::new(Rechunk::new(parts.into_iter(), chunk_size)))
    }

    fn synthesize(&self, _voice: &str, _text: &str, _language: &str) -> anyhow::Result<Vec<f32>> {
        Ok(self.chunks.iter().flatten().copied().collect())
    }
}

/// Model whose inference always fails.
pub struct FailingModel;

impl SpeechModel for FailingModel {
    fn format(&self) -> AudioFormat {
        AudioFormat::PIPELINE
    }

    fn stream(
        &self,
        _voice: &str,
        _text: &str,
        _language: &str,
        _chunk_size: usize,
    ) -> anyhow::Result<SampleChunks> {
        Err(anyhow::anyhow!("model failed to load"))
    }

    fn synthesize(&self, _voice: &str, _text: &str, _language: &str) -> anyhow::Result<Vec<f32>> {
        Err(anyhow::anyhow!("model failed to load"))
    }
}

pub fn test_catalog() -> SpeakerCatalog {
    SpeakerCatalog::new(
        vec![
            VoiceEntry {
                id: "norman".into(),
                config: "models/en_US/norman.onnx.json".into(),
                language: "en_US".into(),
            },
            VoiceEntry {
                id: "thorsten".into(),
                config: "models/de_DE/thorsten.onnx.json".into(),
                language: "de_DE".into(),
            },
        ],
        None,
    )
}

pub fn test_state(catalog: SpeakerCatalog, model: Arc<dyn SpeechModel>) -> AppState {
    AppState {
        synth: Arc::new(SynthManager::new(catalog, model)),
        request_count: Arc::new(AtomicU64::new(0)),
        config: ServerConfig::default(),
    }
}

/// App with a scripted 1000-sample utterance.
pub fn create_test_app() -> Router {
    router(test_state(
        test_catalog(),
        Arc::new(ScriptedModel::with_total_samples(1000)),
    ))
}
