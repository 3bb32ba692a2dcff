// synthchain - modular synthesizer control core
//
// A chain of one instrument and ordered effects driven by note commands,
// with persisted parameters, LFO modulation patching and a command
// recorder. Everything runs on one control thread; audio devices are
// opaque and driven through the `AudioGraph` trait.

pub mod assets;
pub mod audio;
pub mod chain;
pub mod config;
pub mod messaging;
pub mod midi;
pub mod project;
pub mod sequencer;
pub mod session;
pub mod synth;

pub use chain::{ChainHandle, SignalChainHost};
pub use config::Config;
pub use messaging::{Command, CommandBus};
pub use project::{Chain, PersistenceCodec};
pub use sequencer::TrackRecorder;
pub use session::Session;
pub use synth::{ModulationRouter, VoiceEngine};
