// Held-note stack for legato playing
//
// The most recently pressed note that is still held is the one the legato
// voice sounds. Releasing it falls back to the next most recent.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeldNotes {
    stack: Vec<u8>,
}

impl HeldNotes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Press a note. A note pressed again moves to the top.
    pub fn push(&mut self, note: u8) {
        self.stack.retain(|n| *n != note);
        self.stack.push(note);
    }

    /// Release a note. Returns false if it was not held.
    pub fn remove(&mut self, note: u8) -> bool {
        let before = self.stack.len();
        self.stack.retain(|n| *n != note);
        self.stack.len() != before
    }

    pub fn top(&self) -> Option<u8> {
        self.stack.last().copied()
    }

    pub fn contains(&self, note: u8) -> bool {
        self.stack.contains(&note)
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn clear(&mut self) {
        self.stack.clear();
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.stack
    }
}
