// Sequencer - command recording and playback

pub mod recorder;

pub use recorder::{RecordedEvent, RecorderEvent, RecorderState, Recording, TrackRecorder};
