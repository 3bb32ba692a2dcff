// Note table - positional note index to frequency
//
// Index `i` is the i-th entry of the table, starting at C0 and rising one
// semitone per entry up to B8. Equal temperament, A4 = 440 Hz.

use std::sync::LazyLock;

const PITCH_CLASSES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

const OCTAVES: usize = 9;

/// Number of entries in the table
pub const NOTE_COUNT: usize = PITCH_CLASSES.len() * OCTAVES;

/// Table index of A4
const A4_INDEX: i32 = 57;

#[derive(Debug, Clone, PartialEq)]
pub struct NoteEntry {
    pub name: String,
    pub frequency: f32,
}

static NOTES: LazyLock<Vec<NoteEntry>> = LazyLock::new(|| {
    (0..NOTE_COUNT)
        .map(|i| {
            let name = format!("{}{}", PITCH_CLASSES[i % 12], i / 12);
            let semitones = i as i32 - A4_INDEX;
            let frequency = 440.0 * 2f32.powf(semitones as f32 / 12.0);
            NoteEntry { name, frequency }
        })
        .collect()
});

pub fn frequency(index: u8) -> Option<f32> {
    NOTES.get(index as usize).map(|n| n.frequency)
}

pub fn name(index: u8) -> Option<&'static str> {
    NOTES.get(index as usize).map(|n| n.name.as_str())
}

/// Table index of a note name such as `"C4"` or `"F#2"`
pub fn index_of(name: &str) -> Option<u8> {
    NOTES
        .iter()
        .position(|n| n.name == name)
        .and_then(|i| u8::try_from(i).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_bounds() {
        assert_eq!(NOTE_COUNT, 108);
        assert_eq!(name(0), Some("C0"));
        assert_eq!(name(107), Some("B8"));
        assert_eq!(frequency(108), None);
    }

    #[test]
    fn test_reference_pitches() {
        assert_eq!(index_of("A4"), Some(57));
        assert!((frequency(57).unwrap() - 440.0).abs() < 1e-3);
        assert!((frequency(48).unwrap() - 261.63).abs() < 0.01);
        assert!((frequency(69).unwrap() - 880.0).abs() < 1e-2);
    }

    #[test]
    fn test_index_is_positional() {
        // Index 60 is C5 in this table, not middle C
        assert_eq!(name(60), Some("C5"));
        assert_eq!(index_of("C4"), Some(48));
        assert_eq!(index_of("H2"), None);
    }
}
