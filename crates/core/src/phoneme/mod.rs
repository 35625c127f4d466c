use std::fmt;

use serde::{Deserialize, Serialize};

/// Duration used for any viseme the table has no entry for.
pub const FALLBACK_DURATION_MS: u32 = 120;
/// Intensity used for any viseme the table has no entry for.
pub const FALLBACK_INTENSITY: f32 = 0.5;

/// Mouth-shape classes understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VisemeId {
    /// Silence, mouth at rest.
    #[serde(rename = "viseme_sil")]
    Sil,
    /// Bilabial: P, B, M.
    #[serde(rename = "viseme_PP")]
    PP,
    /// Labiodental: F, V.
    #[serde(rename = "viseme_FF")]
    FF,
    /// Dental stop.
    #[serde(rename = "viseme_TH")]
    TH,
    /// Alveolar stop.
    #[serde(rename = "viseme_DD")]
    DD,
    /// Alveolar nasal and liquid: N, L.
    #[serde(rename = "viseme_nn")]
    NN,
    /// Velar: K, G.
    #[serde(rename = "viseme_kk")]
    KK,
    /// Palatal: CH, J, SH.
    #[serde(rename = "viseme_CH")]
    CH,
    /// Sibilant: S, Z.
    #[serde(rename = "viseme_SS")]
    SS,
    /// Rhotic: R.
    #[serde(rename = "viseme_RR")]
    RR,
    /// Open vowel.
    #[serde(rename = "viseme_aa")]
    AA,
    /// Mid-front vowel.
    #[serde(rename = "viseme_E")]
    E,
    /// High-front vowel.
    #[serde(rename = "viseme_I")]
    I,
    /// Mid-back vowel.
    #[serde(rename = "viseme_O")]
    O,
    /// High-back vowel.
    #[serde(rename = "viseme_U")]
    U,
}

impl VisemeId {
    pub const ALL: [VisemeId; 15] = [
        VisemeId::Sil,
        VisemeId::PP,
        VisemeId::FF,
        VisemeId::TH,
        VisemeId::DD,
        VisemeId::NN,
        VisemeId::KK,
        VisemeId::CH,
        VisemeId::SS,
        VisemeId::RR,
        VisemeId::AA,
        VisemeId::E,
        VisemeId::I,
        VisemeId::O,
        VisemeId::U,
    ];

    /// Name of the morph target this viseme drives.
    pub fn morph_target(self) -> &'static str {
        match self {
            VisemeId::Sil => "viseme_sil",
            VisemeId::PP => "viseme_PP",
            VisemeId::FF => "viseme_FF",
            VisemeId::TH => "viseme_TH",
            VisemeId::DD => "viseme_DD",
            VisemeId::NN => "viseme_nn",
            VisemeId::KK => "viseme_kk",
            VisemeId::CH => "viseme_CH",
            VisemeId::SS => "viseme_SS",
            VisemeId::RR => "viseme_RR",
            VisemeId::AA => "viseme_aa",
            VisemeId::E => "viseme_E",
            VisemeId::I => "viseme_I",
            VisemeId::O => "viseme_O",
            VisemeId::U => "viseme_U",
        }
    }

    /// Parses a morph target name back into a viseme. Names are case sensitive,
    /// matching the avatar export.
    pub fn from_morph_target(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|viseme| viseme.morph_target() == name)
    }

    pub fn is_silence(self) -> bool {
        self == VisemeId::Sil
    }
}

impl fmt::Display for VisemeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.morph_target())
    }
}

/// Process-wide constant mapping between letters, visemes, durations and
/// intensities.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhonemeTable;

impl PhonemeTable {
    /// Resolves a symbol to its viseme. Anything outside `A-Z` (after ASCII
    /// uppercasing) is silence.
    pub fn lookup_viseme(symbol: char) -> VisemeId {
        match symbol.to_ascii_uppercase() {
            'A' => VisemeId::AA,
            'E' => VisemeId::E,
            'I' | 'H' | 'Y' => VisemeId::I,
            'O' => VisemeId::O,
            'U' | 'W' => VisemeId::U,
            'B' | 'P' | 'M' => VisemeId::PP,
            'F' | 'V' => VisemeId::FF,
            'T' => VisemeId::TH,
            'D' => VisemeId::DD,
            'N' | 'L' => VisemeId::NN,
            'S' | 'Z' => VisemeId::SS,
            'R' => VisemeId::RR,
            'K' | 'G' | 'Q' | 'X' => VisemeId::KK,
            'J' | 'C' => VisemeId::CH,
            _ => VisemeId::Sil,
        }
    }

    /// Default hold time for a viseme in milliseconds.
    pub fn default_duration(viseme: VisemeId) -> u32 {
        Self::duration_entry(viseme).unwrap_or(FALLBACK_DURATION_MS)
    }

    /// Default peak weight for a viseme in `[0, 1]`.
    pub fn default_intensity(viseme: VisemeId) -> f32 {
        Self::intensity_entry(viseme).unwrap_or(FALLBACK_INTENSITY)
    }

    fn duration_entry(viseme: VisemeId) -> Option<u32> {
        let ms = match viseme {
            // vowels hold longest
            VisemeId::AA => 180,
            VisemeId::E => 160,
            VisemeId::I => 140,
            VisemeId::O => 200,
            VisemeId::U => 180,
            // stops
            VisemeId::PP => 120,
            VisemeId::DD => 110,
            VisemeId::KK => 120,
            VisemeId::TH => 100,
            // fricatives
            VisemeId::FF => 140,
            VisemeId::SS => 160,
            VisemeId::CH => 150,
            // nasals and liquids
            VisemeId::NN => 130,
            VisemeId::RR => 140,
            VisemeId::Sil => 50,
        };
        Some(ms)
    }

    fn intensity_entry(viseme: VisemeId) -> Option<f32> {
        let intensity = match viseme {
            VisemeId::AA => 0.9,
            VisemeId::O => 0.8,
            VisemeId::U => 0.7,
            VisemeId::E => 0.6,
            VisemeId::I => 0.5,
            VisemeId::PP => 0.8,
            VisemeId::FF => 0.7,
            VisemeId::SS => 0.6,
            VisemeId::TH => 0.5,
            VisemeId::DD => 0.6,
            VisemeId::KK => 0.7,
            VisemeId::CH => 0.7,
            VisemeId::NN => 0.6,
            VisemeId::RR => 0.6,
            VisemeId::Sil => 0.0,
        };
        Some(intensity)
    }
}
