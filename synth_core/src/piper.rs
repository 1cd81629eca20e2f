//! Piper-backed production model.
//!
//! Loads one Piper voice per catalog entry, lazily, and keeps loaded
//! synthesizers in a concurrent cache.  Catalogs are small enough that no
//! eviction is needed.

use std::{
    collections::HashMap,
    fs,
    path::Path,
    sync::{Arc, RwLock},
};

use anyhow::Context;
use dashmap::DashMap;
use piper_rs::synth::PiperSpeechSynthesizer;

use crate::{
    model::{Rechunk, SampleChunks, SpeechModel},
    AudioFormat, SpeakerCatalog,
};

pub struct PiperModel {
    // voice id -> model config path
    configs: HashMap<String, String>,
    cache: DashMap<String, Arc<RwLock<PiperSpeechSynthesizer>>>,
    format: AudioFormat,
}

impl PiperModel {
    pub fn new(catalog: &SpeakerCatalog) -> Self {
        let configs = catalog
            .entries()
            .iter()
            .map(|v| (v.id.clone(), v.config.clone()))
            .collect();
        Self {
            configs,
            cache: DashMap::new(),
            format: AudioFormat::PIPELINE,
        }
    }

    /// Read the sample rate from a Piper model config JSON.
    fn read_sample_rate<P: AsRef<Path>>(cfg_path: P) -> anyhow::Result<u32> {
        let text = fs::read_to_string(cfg_path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", cfg_path.as_ref().display()))?;
        let json: serde_json::Value =
            serde_json::from_str(&text).with_context(|| "Config file is not valid JSON")?;

        let sample_rate = json
            .get("audio")
            .and_then(|a| a.get("sample_rate"))
            .and_then(|sr| sr.as_u64())
            .ok_or_else(|| anyhow::anyhow!("Missing or invalid 'audio.sample_rate' in config"))?;

        Ok(sample_rate as u32)
    }

    /// Get or lazily load the synthesizer for a voice.
    fn synth_for(&self, voice: &str) -> anyhow::Result<Arc<RwLock<PiperSpeechSynthesizer>>> {
        let cfg_path = self
            .configs
            .get(voice)
            .ok_or_else(|| anyhow::anyhow!("voice '{voice}' has no model config"))?;

        if let Some(cached) = self.cache.get(cfg_path) {
            return Ok(cached.clone());
        }

        let sample_rate = Self::read_sample_rate(cfg_path)?;
        if sample_rate != self.format.sample_rate {
            anyhow::bail!(
                "model for voice '{voice}' runs at {sample_rate} Hz, pipeline requires {} Hz",
                self.format.sample_rate
            );
        }

        let model = piper_rs::from_config_path(Path::new(cfg_path))
            .map_err(|e| anyhow::anyhow!("piper load error: {e}"))?;
        let synth = PiperSpeechSynthesizer::new(model)?;

        let synth_arc = Arc::new(RwLock::new(synth));
        self.cache.insert(cfg_path.clone(), synth_arc.clone());
        Ok(synth_arc)
    }
}

impl SpeechModel for PiperModel {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn stream(
        &self,
        voice: &str,
        text: &str,
        _language: &str,
        chunk_size: usize,
    ) -> anyhow::Result<SampleChunks> {
        // Piper voices are monolingual; the language is fixed by the catalog
        // entry the voice was resolved from.
        let synth = self.synth_for(voice)?;
        let guard = synth
            .read()
            .map_err(|_| anyhow::anyhow!("synthesizer lock poisoned"))?;
        let stream = guard
            .synthesize_parallel(text.to_string(), None)
            .map_err(|e| anyhow::anyhow!("piper synth error: {e}"))?;
        drop(guard);

        let chunks = stream.map(|part| {
            part.map(|samples| samples.into_vec())
                .map_err(|e| anyhow::anyhow!("chunk error: {e}"))
        });
        Ok(Box::new(Rechunk::new(chunks, chunk_size)))
    }

    fn synthesize(&self, voice: &str, text: &str, language: &str) -> anyhow::Result<Vec<f32>> {
        let mut samples = Vec::new();
        for chunk in self.stream(voice, text, language, 1)? {
            samples.extend(chunk?);
        }
        Ok(samples)
    }
}

impl std::fmt::Debug for PiperModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PiperModel")
            .field("voices", &self.configs.len())
            .field("loaded", &self.cache.len())
            .finish()
    }
}
