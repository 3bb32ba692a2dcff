// Playback modes - how overlapping notes are handled
//
// - Poly: every note-on gets its own voice, nothing is stolen
// - Mono: a new note fades out whatever is sounding, then plays alone
// - Legato: one voice glides between held notes without retriggering

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolyMode {
    /// Independent concurrent voices per note
    #[default]
    Poly,
    /// Single voice, retriggered on every note
    Mono,
    /// Single voice gliding between held notes
    Legato,
}

impl PolyMode {
    /// Check if this mode allows multiple simultaneous notes
    pub fn is_polyphonic(self) -> bool {
        matches!(self, PolyMode::Poly)
    }

    /// Check if a new note starts a fresh envelope
    pub fn should_retrigger_envelope(self) -> bool {
        !matches!(self, PolyMode::Legato)
    }
}
