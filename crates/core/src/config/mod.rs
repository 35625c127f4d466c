use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{MeshBinding, Result};

/// Top-level configuration structure for the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub generation: GenerationConfig,
    pub animator: AnimatorConfig,
}

impl EngineConfig {
    /// Parses a JSON document. Missing sections and fields fall back to
    /// their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }
}

/// How input text is split into letters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segmentation {
    /// Iterate letters word by word and insert a short silence between words.
    #[default]
    WordAware,
    /// Drop every non-letter and iterate the remaining letter stream.
    Flat,
}

/// How each letter's peak intensity is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntensityPolicy {
    /// Table default scaled by position in the word, plus jitter.
    #[default]
    Contextual,
    /// Table default only.
    Fixed,
}

/// Configuration for turning text into a viseme timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub segmentation: Segmentation,
    pub intensity: IntensityPolicy,
    /// Silence inserted between words under [`Segmentation::WordAware`].
    pub word_gap_ms: u32,
    /// Overrides the per-viseme table duration for every letter when set.
    pub letter_duration_ms: Option<u32>,
    /// Half-width of the uniform intensity jitter.
    pub jitter_amplitude: f32,
    /// Seed for the jitter source. Unseeded generators draw from entropy.
    pub seed: Option<u64>,
    /// Disables jitter entirely.
    pub deterministic: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            segmentation: Segmentation::WordAware,
            intensity: IntensityPolicy::Contextual,
            word_gap_ms: 100,
            letter_duration_ms: None,
            jitter_amplitude: 0.05,
            seed: None,
            deterministic: false,
        }
    }
}

impl GenerationConfig {
    /// Word-aware contextual generation with jitter switched off.
    pub fn deterministic() -> Self {
        Self {
            deterministic: true,
            ..Self::default()
        }
    }
}

/// Configuration for the per-frame blend-shape animator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimatorConfig {
    /// Lerp rate applied to the weight of the active viseme.
    pub attack_rate: f32,
    /// Lerp rate applied to every other viseme weight.
    pub decay_rate: f32,
    /// Morph target that carries idle breathing.
    pub breathing_target: String,
    /// Peak-to-trough half amplitude of the breathing wave; also its offset.
    pub breathing_amplitude: f32,
    /// Angular frequency of the breathing wave in radians per millisecond.
    pub breathing_frequency: f32,
    pub breathing_rate: f32,
    pub meshes: Vec<MeshBinding>,
}

impl Default for AnimatorConfig {
    fn default() -> Self {
        Self {
            attack_rate: 0.3,
            decay_rate: 0.15,
            breathing_target: "viseme_aa".to_string(),
            breathing_amplitude: 0.02,
            breathing_frequency: 0.001,
            breathing_rate: 0.05,
            meshes: vec![MeshBinding::head(), MeshBinding::teeth()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MeshRole;

    #[test]
    fn empty_document_yields_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn partial_overrides_keep_other_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{
                "generation": { "segmentation": "flat", "seed": 7 },
                "animator": { "attack_rate": 0.5, "meshes": [
                    { "mesh_id": "Head", "role": "primary", "gain": 1.0 }
                ] }
            }"#,
        )
        .unwrap();

        assert_eq!(config.generation.segmentation, Segmentation::Flat);
        assert_eq!(config.generation.seed, Some(7));
        assert_eq!(config.generation.word_gap_ms, 100);
        assert_eq!(config.animator.attack_rate, 0.5);
        assert_eq!(config.animator.decay_rate, 0.15);
        assert_eq!(config.animator.meshes.len(), 1);
        assert_eq!(config.animator.meshes[0].role, MeshRole::Primary);
    }

    #[test]
    fn rejects_malformed_json() {
        let err = EngineConfig::from_json_str("{ generation: }").unwrap_err();
        assert!(err.to_string().contains("invalid configuration"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = EngineConfig::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, crate::LipSyncError::Io(_)));
    }
}
