// Signal chain host - builds the node chain, wires it to the sink and folds
// every node's settings stream into the persisted chain document

use super::node::{ChainError, ChainUnit, NodeContext, SettingsStream};
use super::registry;
use crate::assets::AssetLoader;
use crate::audio::graph::tolerate;
use crate::audio::{DeviceId, Port, Scheduler, SharedGraph};
use crate::messaging::{CommandBus, Subscription};
use crate::project::{Chain, NodeId, NodeUpdate, PersistenceCodec, WrapperSettings};
use crate::synth::{ModulationRouter, ModulationTarget, VoiceEngine};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub struct SignalChainHost {
    graph: SharedGraph,
    scheduler: Rc<Scheduler>,
    router: Rc<ModulationRouter>,
    assets: Rc<dyn AssetLoader>,
    codec: Rc<PersistenceCodec>,
}

impl SignalChainHost {
    pub fn new(
        graph: SharedGraph,
        scheduler: Rc<Scheduler>,
        router: Rc<ModulationRouter>,
        assets: Rc<dyn AssetLoader>,
        codec: Rc<PersistenceCodec>,
    ) -> Self {
        Self {
            graph,
            scheduler,
            router,
            assets,
            codec,
        }
    }

    /// Build `chain` in `pos` order, feed the instrument from `commands` and
    /// wire the last node into `sink`.
    ///
    /// Nodes of unknown type (or whose devices cannot be created) are left
    /// out of the signal path but stay in the document.
    pub fn build(&self, chain: Chain, commands: Rc<CommandBus>, sink: DeviceId) -> ChainHandle {
        let ctx = NodeContext {
            graph: self.graph.clone(),
            scheduler: self.scheduler.clone(),
            router: self.router.clone(),
            assets: self.assets.clone(),
            commands,
        };

        let snapshot: Vec<_> = chain.ordered().into_iter().cloned().collect();
        let document = Rc::new(RefCell::new(chain));
        let hydrating = Rc::new(Cell::new(true));
        let saves = Rc::new(Cell::new(0));

        let units: Vec<Box<dyn ChainUnit>> = snapshot
            .iter()
            .filter_map(|node| registry::instantiate(node, &ctx))
            .collect();

        let subscriptions = units
            .iter()
            .map(|unit| {
                let stream = unit.changes().clone();
                let document = document.clone();
                let codec = self.codec.clone();
                let hydrating = hydrating.clone();
                let saves = saves.clone();

                let subscription = stream.subscribe(move |update: &NodeUpdate| {
                    if !document.borrow_mut().fold(update) {
                        log::warn!("Settings update for unknown node {}", update.id);
                        return;
                    }
                    log::debug!("Folded settings of node {}", update.id);

                    // The snapshot that was just loaded is not written back
                    if hydrating.get() {
                        return;
                    }
                    match codec.save(&document.borrow()) {
                        Ok(()) => saves.set(saves.get() + 1),
                        Err(e) => log::warn!("Could not persist chain: {}", e),
                    }
                });
                (stream, subscription)
            })
            .collect();

        for unit in &units {
            unit.publish();
        }
        hydrating.set(false);

        for pair in units.windows(2) {
            if let Err(e) = self.graph.connect(pair[0].output(), Port::Input(pair[1].input())) {
                log::warn!("Could not wire node {} to {}: {}", pair[0].id(), pair[1].id(), e);
            }
        }
        if let Some(last) = units.last() {
            if let Err(e) = self.graph.connect(last.output(), Port::Input(sink)) {
                log::warn!("Could not wire node {} to the output: {}", last.id(), e);
            }
        }

        log::info!("Chain built with {} of {} nodes", units.len(), snapshot.len());

        ChainHandle {
            graph: self.graph.clone(),
            sink,
            units,
            subscriptions,
            document,
            saves,
            torn_down: false,
        }
    }
}

/// A built chain. Dropping the handle tears it down.
pub struct ChainHandle {
    graph: SharedGraph,
    sink: DeviceId,
    units: Vec<Box<dyn ChainUnit>>,
    subscriptions: Vec<(SettingsStream, Subscription)>,
    document: Rc<RefCell<Chain>>,
    saves: Rc<Cell<usize>>,
    torn_down: bool,
}

impl ChainHandle {
    /// Current chain document, including nodes left out of the signal path
    pub fn document(&self) -> Chain {
        self.document.borrow().clone()
    }

    /// Ids of the built nodes in signal order
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.units.iter().map(|u| u.id()).collect()
    }

    /// Input and output device of a built node
    pub fn ports(&self, id: NodeId) -> Option<(DeviceId, DeviceId)> {
        self.unit(id).map(|u| (u.input(), u.output()))
    }

    /// Number of times the document has been persisted
    pub fn save_count(&self) -> usize {
        self.saves.get()
    }

    fn unit(&self, id: NodeId) -> Option<&dyn ChainUnit> {
        self.units.iter().find(|u| u.id() == id).map(|u| &**u)
    }

    /// Change parameters of one node; the node publishes its new settings
    pub fn edit(&mut self, id: NodeId, patch: &Value) -> Result<(), ChainError> {
        let unit = self
            .units
            .iter_mut()
            .find(|u| u.id() == id)
            .ok_or(ChainError::UnknownNode(id))?;
        unit.update(patch)
    }

    /// Record a new editor placement for one node
    pub fn update_wrapper(&self, id: NodeId, wrapper: WrapperSettings) -> Result<(), ChainError> {
        let unit = self.unit(id).ok_or(ChainError::UnknownNode(id))?;
        unit.changes().emit(NodeUpdate::wrapper(id, wrapper));
        Ok(())
    }

    /// Voice engine of the first instrument in the chain
    pub fn instrument(&self) -> Option<Rc<RefCell<VoiceEngine>>> {
        self.units.iter().find_map(|u| u.voice_engine())
    }

    pub fn targets(&self, id: NodeId) -> Vec<Rc<ModulationTarget>> {
        self.unit(id).map(|u| u.targets()).unwrap_or_default()
    }

    pub fn all_targets(&self) -> Vec<Rc<ModulationTarget>> {
        self.units.iter().flat_map(|u| u.targets()).collect()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Unwire the chain from the sink, stop listening to node settings and
    /// release every node. Calling it again does nothing.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        if let Some(last) = self.units.last() {
            tolerate(self.graph.disconnect(last.output(), Port::Input(self.sink)));
        }
        for (stream, subscription) in self.subscriptions.drain(..) {
            stream.unsubscribe(subscription);
        }
        for pair in self.units.windows(2) {
            tolerate(self.graph.disconnect(pair[0].output(), Port::Input(pair[1].input())));
        }
        for unit in &mut self.units {
            unit.teardown();
        }
        log::info!("Chain torn down");
    }
}

impl Drop for ChainHandle {
    fn drop(&mut self) {
        self.teardown();
    }
}
