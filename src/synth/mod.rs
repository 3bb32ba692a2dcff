// Synth module - voices, playback modes and modulation

pub mod lfo;
pub mod modulation;
pub mod notes;
pub mod poly_mode;
pub mod portamento;
pub mod settings;
pub mod voice;
pub mod voice_manager;

pub use lfo::{Lfo, LfoSettings};
pub use modulation::{ModulationRouter, ModulationSource, ModulationTarget};
pub use poly_mode::PolyMode;
pub use settings::Es1Settings;
pub use voice::{Voice, VoiceId, VoiceState};
pub use voice_manager::VoiceEngine;
