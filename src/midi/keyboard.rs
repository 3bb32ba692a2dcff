// Computer keyboard as a note source

use crate::messaging::{Command, CommandBus, MAX_VELOCITY};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

pub const KEYBOARD_ORIGIN: &str = "kbd";

/// Default bindings: a, s, d play C4, D4, E4
pub fn default_bindings() -> HashMap<char, u8> {
    HashMap::from([('a', 48), ('s', 50), ('d', 52)])
}

pub struct KeyboardInput {
    bus: Rc<CommandBus>,
    bindings: HashMap<char, u8>,
    held: HashSet<char>,
}

impl KeyboardInput {
    pub fn new(bus: Rc<CommandBus>) -> Self {
        Self::with_bindings(bus, default_bindings())
    }

    pub fn with_bindings(bus: Rc<CommandBus>, bindings: HashMap<char, u8>) -> Self {
        Self {
            bus,
            bindings,
            held: HashSet::new(),
        }
    }

    pub fn bind(&mut self, key: char, note: u8) {
        self.bindings.insert(key.to_ascii_lowercase(), note);
    }

    pub fn note_for(&self, key: char) -> Option<u8> {
        self.bindings.get(&key.to_ascii_lowercase()).copied()
    }

    /// Emit a note-on for a bound key. Auto-repeat is ignored.
    pub fn key_down(&mut self, key: char, repeat: bool) -> bool {
        if repeat {
            return false;
        }
        let Some(note) = self.note_for(key) else {
            return false;
        };
        self.held.insert(key.to_ascii_lowercase());
        log::debug!("Key {} plays note {}", key, note);
        self.bus
            .emit(Command::note_on(note, MAX_VELOCITY, KEYBOARD_ORIGIN));
        true
    }

    pub fn key_up(&mut self, key: char) -> bool {
        let Some(note) = self.note_for(key) else {
            return false;
        };
        self.held.remove(&key.to_ascii_lowercase());
        self.bus.emit(Command::note_off(note, KEYBOARD_ORIGIN));
        true
    }

    pub fn is_held(&self, key: char) -> bool {
        self.held.contains(&key.to_ascii_lowercase())
    }
}
