pub mod frame;
pub mod model;
pub mod pcm;
pub mod piper;
pub mod wav;

use std::{fs, path::Path, sync::Arc};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::{SampleChunks, SpeechModel};

/// Fixed-format description of a raw PCM stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    /// Bytes per sample per channel.
    pub sample_width: u16,
    pub channels: u16,
}

impl AudioFormat {
    /// The wire format of the whole pipeline: 24 kHz, 16-bit signed
    /// little-endian, mono.
    pub const PIPELINE: AudioFormat = AudioFormat {
        sample_rate: 24_000,
        sample_width: 2,
        channels: 1,
    };

    /// Size in bytes of one complete sample across all channels.
    pub fn bytes_per_sample(&self) -> usize {
        self.sample_width as usize * self.channels as usize
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.sample_width * 8
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceEntry {
    pub id: String,
    pub config: String,
    pub language: String,
}

#[derive(Deserialize)]
struct CatalogFile {
    default_voice: Option<String>,
    voices: Vec<VoiceEntry>,
}

/// Ordered set of voices known to the synthesis backend.  Built once at
/// warm-up and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct SpeakerCatalog {
    entries: Vec<VoiceEntry>,
    default_id: Option<String>,
}

impl SpeakerCatalog {
    pub fn new(entries: Vec<VoiceEntry>, default_id: Option<String>) -> Self {
        // The default falls back to the first catalog entry, matching the
        // backend convention of "speaker 0 is the default".
        let default_id = default_id.or_else(|| entries.first().map(|v| v.id.clone()));
        Self {
            entries,
            default_id,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Load from a `voices.json` catalog file.
    pub fn from_file<P: AsRef<Path>>(p: P) -> anyhow::Result<Self> {
        let text = fs::read_to_string(p.as_ref())
            .with_context(|| format!("Failed to load {}", p.as_ref().display()))?;
        let parsed: CatalogFile =
            serde_json::from_str(&text).with_context(|| "voice catalog is not valid JSON")?;

        if let Some(ref id) = parsed.default_voice {
            if !parsed.voices.iter().any(|v| &v.id == id) {
                anyhow::bail!("default_voice '{id}' is not present in the catalog");
            }
        }

        Ok(Self::new(parsed.voices, parsed.default_voice))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|v| v.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&VoiceEntry> {
        self.entries.iter().find(|v| v.id == id)
    }

    pub fn default_voice(&self) -> Option<&str> {
        self.default_id.as_deref()
    }

    /// Voice identifiers in catalog order.
    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|v| v.id.clone()).collect()
    }

    pub fn entries(&self) -> &[VoiceEntry] {
        &self.entries
    }

    /// Supported language codes, sorted and deduplicated.
    pub fn languages(&self) -> Vec<String> {
        let mut langs: Vec<String> = self.entries.iter().map(|v| v.language.clone()).collect();
        langs.sort();
        langs.dedup();
        langs
    }

    /// Resolve a requested voice to a catalog entry.  An unknown identifier
    /// silently falls back to the default voice; this is a leniency policy,
    /// not an error path.  Fails only when the catalog is empty.
    pub fn resolve(&self, requested: &str) -> anyhow::Result<&VoiceEntry> {
        if let Some(entry) = self.get(requested) {
            return Ok(entry);
        }
        let default_id = self
            .default_id
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("no voices loaded, cannot resolve '{requested}'"))?;
        warn!(voice = requested, default = default_id, "unknown voice, substituting default");
        self.get(default_id)
            .ok_or_else(|| anyhow::anyhow!("default voice '{default_id}' missing from catalog"))
    }
}

/// Owns the read-only speaker catalog plus the synthesis model and exposes
/// the two inference entry points used by the server.
#[derive(Clone)]
pub struct SynthManager {
    catalog: SpeakerCatalog,
    model: Arc<dyn SpeechModel>,
}

impl SynthManager {
    pub fn new(catalog: SpeakerCatalog, model: Arc<dyn SpeechModel>) -> Self {
        Self { catalog, model }
    }

    pub fn catalog(&self) -> &SpeakerCatalog {
        &self.catalog
    }

    pub fn format(&self) -> AudioFormat {
        self.model.format()
    }

    /// Drive incremental inference for one utterance.  The returned iterator
    /// yields raw sample chunks sized by `chunk_size` granularity units.
    pub fn stream(
        &self,
        speaker: &str,
        text: &str,
        language: &str,
        chunk_size: usize,
    ) -> anyhow::Result<SampleChunks> {
        let voice = self.catalog.resolve(speaker)?;
        self.model.stream(&voice.id, text, language, chunk_size)
    }

    /// Whole-utterance inference, for the non-streaming route.
    pub fn synthesize(&self, speaker: &str, text: &str, language: &str) -> anyhow::Result<Vec<f32>> {
        let voice = self.catalog.resolve(speaker)?;
        self.model.synthesize(&voice.id, text, language)
    }
}

impl std::fmt::Debug for SynthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthManager")
            .field("catalog", &self.catalog)
            .field("model", &"<SpeechModel>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> SpeakerCatalog {
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
                VoiceEntry {
                    id: "eva".into(),
                    config: "models/de_DE/eva.onnx.json".into(),
                    language: "de_DE".into(),
                },
            ],
            None,
        )
    }

    #[test]
    fn resolve_known_voice() {
        let c = catalog();
        assert_eq!(c.resolve("thorsten").unwrap().id, "thorsten");
    }

    #[test]
    fn resolve_unknown_voice_substitutes_default() {
        let c = catalog();
        // No explicit default, so the first entry wins.
        assert_eq!(c.resolve("nobody").unwrap().id, "norman");
    }

    #[test]
    fn resolve_empty_catalog_fails() {
        let c = SpeakerCatalog::empty();
        assert!(c.resolve("norman").is_err());
    }

    #[test]
    fn ids_preserve_catalog_order() {
        let c = catalog();
        assert_eq!(c.ids(), vec!["norman", "thorsten", "eva"]);
    }

    #[test]
    fn languages_sorted_and_deduplicated() {
        let c = catalog();
        assert_eq!(c.languages(), vec!["de_DE", "en_US"]);
    }

    #[test]
    fn explicit_default_overrides_first_entry() {
        let mut c = catalog();
        c = SpeakerCatalog::new(c.entries.clone(), Some("eva".into()));
        assert_eq!(c.resolve("nobody").unwrap().id, "eva");
    }
}
