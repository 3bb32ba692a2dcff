// Playback-mode behaviour of the ES1 instrument, driven through the bus

use serde_json::json;
use std::rc::Rc;
use std::time::Duration;
use synthchain::assets::MemoryAssetLoader;
use synthchain::audio::{AudioGraph, ParamName, ParamRef};
use synthchain::midi::MidiListener;
use synthchain::project::MemoryStore;
use synthchain::synth::notes;
use synthchain::{Command, Session};

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

fn session(mode: &str) -> Session {
    let mut session = Session::new(
        Rc::new(MemoryStore::new()),
        Rc::new(MemoryAssetLoader::new()),
        MidiListener::disabled(),
    )
    .unwrap();
    session
        .chain_mut()
        .edit(0, &json!({ "mode": mode, "glide": 0.1 }))
        .unwrap();
    session
}

fn on(note: u8) -> Command {
    Command::note_on(note, 127, "kbd")
}

fn off(note: u8) -> Command {
    Command::note_off(note, "kbd")
}

/// Voices whose output gain is above zero right now
fn audible(session: &Session) -> usize {
    let engine = session.chain().instrument().unwrap();
    let engine = engine.borrow();
    let now = session.graph().current_time();
    engine
        .voices()
        .filter(|v| session.graph().value_at(v.output_gain(), now) > 0.0)
        .count()
}

#[test]
fn test_poly_every_unmatched_note_on_overlaps() {
    let mut session = session("poly");
    let engine = session.chain().instrument().unwrap();

    for note in [48, 52, 48, 55, 48] {
        session.bus().emit(on(note));
        session.advance(ms(5));
    }

    assert_eq!(engine.borrow().voices_for(48), 3);
    assert_eq!(engine.borrow().voices_for(52), 1);
    assert_eq!(engine.borrow().active_voice_count(), 5);
}

#[test]
fn test_mono_single_audible_voice_after_fade() {
    let mut session = session("mono");

    let script = [on(48), on(50), off(50), on(52), on(48), off(48), on(55)];
    for command in script {
        let retrigger = command.is_note_on();
        session.bus().emit(command);
        if retrigger {
            session.advance(ms(30));
            assert!(audible(&session) <= 1);
        }
        session.advance(ms(7));
    }

    session.advance(ms(30));
    assert_eq!(audible(&session), 1);
}

#[test]
fn test_legato_never_silent_while_held() {
    let mut session = session("legato");
    let engine = session.chain().instrument().unwrap();

    session.bus().emit(on(48));
    session.advance(ms(50));
    session.bus().emit(on(52));
    session.advance(ms(50));
    session.bus().emit(on(55));
    session.advance(ms(200));

    // Release the top note: glide back to the next held one
    session.bus().emit(off(55));
    session.advance(ms(100));

    let (osc, envelope) = {
        let engine = engine.borrow();
        let voice = engine.voices().next().unwrap();
        (voice.oscillators()[0], voice.envelope_gain())
    };
    let graph = session.graph();
    let now = graph.current_time();
    let frequency = graph.value_at(ParamRef::new(osc, ParamName::Frequency), now);
    assert!((frequency - notes::frequency(52).unwrap()).abs() < 1e-3);
    assert!(graph.value_at(envelope, now) > 0.0);
    assert_eq!(engine.borrow().voice_count(), 1);

    // Releasing a note below the top changes nothing audible
    session.bus().emit(off(48));
    session.advance(ms(100));
    assert_eq!(engine.borrow().active_voice_count(), 1);

    session.bus().emit(off(52));
    session.advance(ms(500));
    assert_eq!(engine.borrow().voice_count(), 0);
}
