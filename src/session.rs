// Session - wires the control-thread components into one running synth

use crate::assets::AssetLoader;
use crate::audio::{AudioGraph, Clock, GraphError, Scheduler, SharedGraph, VirtualGraph};
use crate::chain::{ChainHandle, SignalChainHost};
use crate::messaging::CommandBus;
use crate::midi::{KeyboardInput, MidiListener};
use crate::project::{KeyValueStore, PersistenceCodec};
use crate::sequencer::TrackRecorder;
use crate::synth::{Lfo, LfoSettings, ModulationRouter};
use std::rc::Rc;
use std::time::{Duration, Instant};

pub const SAMPLE_RATE: f32 = 48000.0;

pub struct Session {
    clock: Clock,
    scheduler: Rc<Scheduler>,
    graph: Rc<VirtualGraph>,
    bus: Rc<CommandBus>,
    router: Rc<ModulationRouter>,
    chain: ChainHandle,
    recorder: TrackRecorder,
    lfo: Lfo,
    keyboard: KeyboardInput,
    midi: MidiListener,
    started: Instant,
}

impl Session {
    /// Load the chain from `store` (or the default chain) and build it into
    /// the graph's destination
    pub fn new(
        store: Rc<dyn KeyValueStore>,
        assets: Rc<dyn AssetLoader>,
        midi: MidiListener,
    ) -> Result<Self, GraphError> {
        let clock = Clock::new();
        let scheduler = Rc::new(Scheduler::new(clock.clone()));
        let graph = Rc::new(VirtualGraph::new(clock.clone(), SAMPLE_RATE));
        let shared: SharedGraph = graph.clone();
        let bus = Rc::new(CommandBus::new());
        let router = Rc::new(ModulationRouter::new(shared.clone()));
        let codec = Rc::new(PersistenceCodec::open(store));

        let host = SignalChainHost::new(
            shared.clone(),
            scheduler.clone(),
            router.clone(),
            assets,
            codec.clone(),
        );
        let chain = host.build(codec.load(), bus.clone(), graph.destination());

        let lfo = Lfo::new(shared, router.clone(), LfoSettings::default())?;
        let recorder = TrackRecorder::new(bus.clone(), scheduler.clone());
        let keyboard = KeyboardInput::new(bus.clone());

        log::info!("Session ready, {} nodes", chain.node_ids().len());

        Ok(Self {
            clock,
            scheduler,
            graph,
            bus,
            router,
            chain,
            recorder,
            lfo,
            keyboard,
            midi,
            started: Instant::now(),
        })
    }

    /// One driver step: forward MIDI, move the clock to wall time and fire
    /// due timers. Returns the number of timers fired.
    pub fn tick(&mut self) -> usize {
        self.midi.drain_into(&self.bus);
        let elapsed = self.started.elapsed();
        if elapsed <= self.clock.now() {
            return self.scheduler.run_due();
        }
        self.scheduler.advance_to(elapsed)
    }

    /// Step virtual time without consulting the wall clock
    pub fn advance(&mut self, delta: Duration) -> usize {
        self.midi.drain_into(&self.bus);
        self.scheduler.advance_by(delta)
    }

    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    pub fn graph(&self) -> &VirtualGraph {
        &self.graph
    }

    pub fn bus(&self) -> &Rc<CommandBus> {
        &self.bus
    }

    pub fn router(&self) -> &ModulationRouter {
        &self.router
    }

    pub fn chain(&self) -> &ChainHandle {
        &self.chain
    }

    pub fn chain_mut(&mut self) -> &mut ChainHandle {
        &mut self.chain
    }

    pub fn recorder(&self) -> &TrackRecorder {
        &self.recorder
    }

    pub fn lfo(&self) -> &Lfo {
        &self.lfo
    }

    pub fn lfo_mut(&mut self) -> &mut Lfo {
        &mut self.lfo
    }

    pub fn keyboard(&mut self) -> &mut KeyboardInput {
        &mut self.keyboard
    }

    pub fn midi(&self) -> &MidiListener {
        &self.midi
    }
}
