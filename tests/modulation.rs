// Drag-to-patch the LFO into chain parameters

use std::rc::Rc;
use synthchain::assets::MemoryAssetLoader;
use synthchain::audio::Port;
use synthchain::midi::MidiListener;
use synthchain::project::MemoryStore;
use synthchain::synth::ModulationSource;
use synthchain::Session;

fn session() -> Session {
    Session::new(
        Rc::new(MemoryStore::new()),
        Rc::new(MemoryAssetLoader::new()),
        MidiListener::disabled(),
    )
    .unwrap()
}

#[test]
fn test_every_effect_exposes_targets() {
    let session = session();
    for id in [1, 2] {
        assert!(!session.chain().targets(id).is_empty(), "node {}", id);
    }
    assert!(session.chain().all_targets().iter().all(|t| !t.is_available()));
}

#[test]
fn test_connect_increments_once_and_clears_slot() {
    let session = session();
    let targets = session.chain().all_targets();
    let target = &targets[0];

    session.lfo().begin_drag();
    assert!(targets.iter().all(|t| t.is_available()));

    assert!(session.lfo().end_drag_over(target).unwrap());
    assert_eq!(target.connection_count(), 1);
    assert!(session.router().armed().is_none());
    assert!(targets.iter().all(|t| !t.is_available()));
    assert!(session
        .graph()
        .is_connected(session.lfo().output(), Port::Param(target.param())));

    // Dropping again without arming connects nothing
    assert!(!session.lfo().end_drag_over(target).unwrap());
    assert_eq!(target.connection_count(), 1);
}

#[test]
fn test_cancelled_drag_leaves_counts_unchanged() {
    let session = session();
    let targets = session.chain().all_targets();

    session.lfo().begin_drag();
    assert!(session.lfo().end_drag());
    assert!(session.router().armed().is_none());
    assert!(targets.iter().all(|t| t.connection_count() == 0));
}

#[test]
fn test_last_armed_source_wins() {
    let session = session();
    let targets = session.chain().targets(2);
    let target = &targets[0];

    session.lfo().begin_drag();
    let other = ModulationSource {
        output: session.chain().ports(1).unwrap().1,
        label: "EQ out".to_string(),
    };
    session.router().arm(other.clone());

    assert!(session.router().connect(target).unwrap());
    assert!(session
        .graph()
        .is_connected(other.output, Port::Param(target.param())));
    assert!(!session
        .graph()
        .is_connected(session.lfo().output(), Port::Param(target.param())));
}

#[test]
fn test_connections_accumulate() {
    let session = session();
    let targets = session.chain().targets(1);
    let target = &targets[0];

    for _ in 0..3 {
        session.lfo().begin_drag();
        session.lfo().end_drag_over(target).unwrap();
    }
    assert_eq!(target.connection_count(), 3);
}
