// MIDI event parsing - raw bytes to note commands

use crate::messaging::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8 },
}

impl MidiEvent {
    /// Parse a raw MIDI message. Only note messages are recognised; the
    /// channel nibble is ignored.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let (status, note, velocity) = match bytes {
            [status, note, velocity, ..] => (*status, *note, *velocity),
            _ => return None,
        };

        match status & 0xF0 {
            // Velocity 0 = Note Off
            0x90 if velocity == 0 => Some(MidiEvent::NoteOff { note }),
            0x90 => Some(MidiEvent::NoteOn { note, velocity }),
            0x80 => Some(MidiEvent::NoteOff { note }),
            _ => None,
        }
    }

    pub fn into_command(self, origin: impl Into<String>) -> Command {
        match self {
            MidiEvent::NoteOn { note, velocity } => Command::note_on(note, velocity, origin),
            MidiEvent::NoteOff { note } => Command::note_off(note, origin),
        }
    }
}

/// Parse raw bytes straight into a command tagged with `origin`
pub fn parse(bytes: &[u8], origin: &str) -> Option<Command> {
    MidiEvent::from_bytes(bytes).map(|event| event.into_command(origin))
}
