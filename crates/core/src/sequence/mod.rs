use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    GenerationConfig, IntensityPolicy, PhonemeTable, Segmentation, VisemeEvent, VisemeId,
    VisemeTimeline,
};

const MIN_LETTER_INTENSITY: f32 = 0.1;
const MAX_LETTER_INTENSITY: f32 = 1.0;

const WORD_START_GAIN: f32 = 1.1;
const WORD_END_GAIN: f32 = 0.9;
const LONG_WORD_INTERIOR_GAIN: f32 = 0.8;
const LONG_WORD_LETTERS: usize = 5;

/// Builds viseme timelines from text using a configurable policy. Timing
/// comes from the letters alone and only approximates the audio.
#[derive(Debug, Clone)]
pub struct SequenceGenerator {
    config: GenerationConfig,
    rng: StdRng,
}

/// Where a letter sits inside its word.
#[derive(Debug, Clone, Copy)]
struct WordPosition {
    index: usize,
    len: usize,
}

impl SequenceGenerator {
    /// Creates a generator. The jitter source is seeded from the config when a
    /// seed is present and from OS entropy otherwise.
    pub fn new(config: GenerationConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(config, rng)
    }

    /// Creates a generator around an explicit jitter source.
    pub fn with_rng(config: GenerationConfig, rng: StdRng) -> Self {
        Self { config, rng }
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Converts `text` into a timeline.
    ///
    /// Letter-free input yields an empty timeline. Any other input ends with
    /// a trailing silence event so the mouth is explicitly closed.
    pub fn generate(&mut self, text: &str) -> VisemeTimeline {
        let mut events = Vec::new();
        let mut cursor: u64 = 0;

        match self.config.segmentation {
            Segmentation::WordAware => {
                for word in words(text) {
                    let letters: Vec<char> =
                        word.chars().filter(char::is_ascii_alphabetic).collect();
                    if letters.is_empty() {
                        continue;
                    }
                    if !events.is_empty() {
                        self.push_silence(&mut events, &mut cursor, self.config.word_gap_ms);
                    }
                    let len = letters.len();
                    for (index, letter) in letters.into_iter().enumerate() {
                        let position = WordPosition { index, len };
                        self.push_letter(&mut events, &mut cursor, letter, Some(position));
                    }
                }
            }
            Segmentation::Flat => {
                for letter in text.chars().filter(char::is_ascii_alphabetic) {
                    self.push_letter(&mut events, &mut cursor, letter, None);
                }
            }
        }

        if !events.is_empty() {
            let trailing = PhonemeTable::default_duration(VisemeId::Sil);
            self.push_silence(&mut events, &mut cursor, trailing);
        }

        tracing::debug!(
            events = events.len(),
            duration_ms = cursor,
            "generated viseme timeline"
        );
        VisemeTimeline::from_events(events)
    }

    fn push_letter(
        &mut self,
        events: &mut Vec<VisemeEvent>,
        cursor: &mut u64,
        letter: char,
        position: Option<WordPosition>,
    ) {
        let viseme = PhonemeTable::lookup_viseme(letter);
        let duration = self
            .config
            .letter_duration_ms
            .unwrap_or_else(|| PhonemeTable::default_duration(viseme))
            .max(1);
        let intensity = self.letter_intensity(viseme, position);

        events.push(VisemeEvent::new(viseme, *cursor, duration, intensity));
        *cursor += u64::from(duration);
    }

    fn push_silence(&self, events: &mut Vec<VisemeEvent>, cursor: &mut u64, duration: u32) {
        let duration = duration.max(1);
        events.push(VisemeEvent::new(VisemeId::Sil, *cursor, duration, 0.0));
        *cursor += u64::from(duration);
    }

    fn letter_intensity(&mut self, viseme: VisemeId, position: Option<WordPosition>) -> f32 {
        let base = PhonemeTable::default_intensity(viseme);
        let value = match self.config.intensity {
            IntensityPolicy::Fixed => base,
            IntensityPolicy::Contextual => {
                let scaled = position.map_or(base, |position| positional_scale(base, position));
                scaled + self.jitter()
            }
        };
        value.clamp(MIN_LETTER_INTENSITY, MAX_LETTER_INTENSITY)
    }

    fn jitter(&mut self) -> f32 {
        let amplitude = self.config.jitter_amplitude;
        if self.config.deterministic || amplitude <= 0.0 {
            return 0.0;
        }
        self.rng.gen_range(-amplitude..=amplitude)
    }
}

impl Default for SequenceGenerator {
    fn default() -> Self {
        Self::new(GenerationConfig::default())
    }
}

/// Emphasises word onsets, softens endings and flattens the middle of long
/// words.
fn positional_scale(base: f32, position: WordPosition) -> f32 {
    let WordPosition { index, len } = position;
    let mut value = base;

    if index == 0 {
        value *= WORD_START_GAIN;
    } else if index + 1 == len {
        value *= WORD_END_GAIN;
    }

    if len > LONG_WORD_LETTERS && index > 1 && index + 2 < len {
        value *= LONG_WORD_INTERIOR_GAIN;
    }

    value
}

/// Maximal runs of word characters (ASCII alphanumerics and `_`).
fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|word| !word.is_empty())
}
