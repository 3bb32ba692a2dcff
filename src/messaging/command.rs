// Commands - note events flowing from producers to the instrument

use super::broadcast::Broadcast;
use serde::{Deserialize, Serialize};

/// Highest MIDI-style velocity
pub const MAX_VELOCITY: u8 = 127;

/// Note event. `velocity > 0` is a note-on, `velocity == 0` a note-off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub note: u8,
    pub velocity: u8,
    /// Producer identity (keyboard, MIDI port, recorder)
    pub origin: String,
}

impl Command {
    pub fn new(note: u8, velocity: u8, origin: impl Into<String>) -> Self {
        Self {
            note,
            velocity: velocity.min(MAX_VELOCITY),
            origin: origin.into(),
        }
    }

    pub fn note_on(note: u8, velocity: u8, origin: impl Into<String>) -> Self {
        Self::new(note, velocity, origin)
    }

    pub fn note_off(note: u8, origin: impl Into<String>) -> Self {
        Self::new(note, 0, origin)
    }

    pub fn is_note_on(&self) -> bool {
        self.velocity > 0
    }
}

/// Ordered stream of commands from every producer, delivered synchronously
pub type CommandBus = Broadcast<Command>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_velocity_is_clamped() {
        let cmd = Command::new(60, 200, "kbd");
        assert_eq!(cmd.velocity, MAX_VELOCITY);
    }

    #[test]
    fn test_note_on_off() {
        assert!(Command::note_on(60, 1, "kbd").is_note_on());
        assert!(!Command::note_off(60, "kbd").is_note_on());
    }

    #[test]
    fn test_bus_preserves_arrival_order() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let bus = CommandBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        {
            let seen = seen.clone();
            bus.subscribe(move |c: &Command| seen.borrow_mut().push(c.clone()));
        }

        bus.emit(Command::note_on(60, 100, "kbd"));
        bus.emit(Command::note_on(64, 90, "midi"));
        bus.emit(Command::note_off(60, "kbd"));

        let notes: Vec<(u8, u8)> = seen.borrow().iter().map(|c| (c.note, c.velocity)).collect();
        assert_eq!(notes, vec![(60, 100), (64, 90), (60, 0)]);
    }
}
