// ES1 instrument settings

use super::poly_mode::PolyMode;
use crate::audio::parameters::Range;
use crate::audio::Waveform;
use serde::{Deserialize, Serialize};

pub const RELEASE_RANGE: Range = Range::new(0.0, 5.0);
pub const ATTACK_RANGE: Range = Range::new(0.0, 5.0);
pub const VOLUME_RANGE: Range = Range::new(0.0, 1.0);
pub const GLIDE_RANGE: Range = Range::new(0.0, 5.0);
pub const DETUNE_RANGE: Range = Range::new(0.0, 1.0);
pub const MAX_VOICES: u32 = 16;

/// Persisted settings of the ES1 instrument. Times are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Es1Settings {
    pub mode: PolyMode,
    pub form: Waveform,
    pub release: f32,
    pub attack: f32,
    pub volume: f32,
    pub glide: f32,
    /// Oscillators per voice (unison)
    pub voices: u32,
    pub detune: f32,
}

impl Default for Es1Settings {
    fn default() -> Self {
        Self {
            mode: PolyMode::Poly,
            form: Waveform::Sine,
            release: 0.2,
            attack: 0.2,
            volume: 0.2,
            glide: 0.2,
            voices: 1,
            detune: 0.0,
        }
    }
}

impl Es1Settings {
    /// Bring every value back into its allowed range
    pub fn clamped(mut self) -> Self {
        self.release = RELEASE_RANGE.clamp(self.release);
        self.attack = ATTACK_RANGE.clamp(self.attack);
        self.volume = VOLUME_RANGE.clamp(self.volume);
        self.glide = GLIDE_RANGE.clamp(self.glide);
        self.detune = DETUNE_RANGE.clamp(self.detune);
        self.voices = self.voices.clamp(1, MAX_VOICES);
        self
    }
}
