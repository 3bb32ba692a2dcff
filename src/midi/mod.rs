// MIDI and keyboard command producers

pub mod event;
pub mod input;
pub mod keyboard;

pub use event::{parse, MidiEvent};
pub use input::{MidiError, MidiListener, MidiStatus};
pub use keyboard::KeyboardInput;
