// Reverb - convolution with a named impulse response, with bypass

use crate::assets::AssetLoader;
use crate::audio::{DeviceId, DeviceKind, GraphError, SharedGraph};
use crate::chain::node::{
    parse_settings, patched, to_value, Bypass, ChainError, ChainUnit, NodeContext, SettingsStream,
};
use crate::messaging::Broadcast;
use crate::project::{NodeId, NodeType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::rc::Rc;

/// Impulse responses shipped with the instrument
pub const IMPULSES: [&str; 38] = [
    "Block Inside",
    "Bottle Hall",
    "Cement Blocks 1",
    "Cement Blocks 2",
    "Chateau de Logne, Outside",
    "Conic Long Echo Hall",
    "Deep Space",
    "Derlon Sanctuary",
    "Direct Cabinet N1",
    "Direct Cabinet N2",
    "Direct Cabinet N3",
    "Direct Cabinet N4",
    "Five Columns Long",
    "Five Columns",
    "French 18th Century Salon",
    "Going Home",
    "Greek 7 Echo Hall",
    "Highly Damped Large Room",
    "In The Silo Revised",
    "In The Silo",
    "Large Bottle Hall",
    "Large Long Echo Hall",
    "Large Wide Echo Hall",
    "Masonic Lodge",
    "Musikvereinsaal",
    "Narrow Bumpy Space",
    "Nice Drum Room",
    "On a Star",
    "Parking Garage",
    "Rays",
    "Right Glass Triangle",
    "Ruby Room",
    "Scala Milan Opera Hall",
    "Small Drum Room",
    "Small Prehistoric Cave",
    "St Nicolaes Church",
    "Trig Room",
    "Vocal Duo",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReverbSettings {
    pub enabled: bool,
    /// Impulse response name, without extension
    pub impulse: String,
}

impl Default for ReverbSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            impulse: IMPULSES[0].to_string(),
        }
    }
}

pub struct ReverbNode {
    id: NodeId,
    graph: SharedGraph,
    assets: Rc<dyn AssetLoader>,
    routing: Bypass,
    settings: ReverbSettings,
    changes: SettingsStream,
}

impl ReverbNode {
    pub fn new(id: NodeId, initial: &Value, ctx: &NodeContext) -> Result<Self, GraphError> {
        let graph = ctx.graph.clone();
        let routing = Bypass {
            input: graph.create(DeviceKind::Gain),
            processor: graph.create(DeviceKind::Convolver),
            output: graph.create(DeviceKind::Gain),
        };

        let node = Self {
            id,
            graph,
            assets: ctx.assets.clone(),
            routing,
            settings: parse_settings(id, initial),
            changes: Rc::new(Broadcast::new()),
        };
        node.routing.apply(&node.graph, node.settings.enabled)?;
        node.load_impulse();
        Ok(node)
    }

    /// Fetch the impulse bytes and hand them to the convolver. A failed
    /// load leaves the convolver as it was.
    fn load_impulse(&self) -> bool {
        let name = format!("{}.wav", self.settings.impulse);
        match self.assets.load(&name) {
            Ok(bytes) => {
                log::debug!("Loaded impulse {} ({} bytes)", name, bytes.len());
                self.graph.set_buffer(self.routing.processor, bytes);
                true
            }
            Err(e) => {
                log::warn!("Could not load impulse {}: {}", name, e);
                false
            }
        }
    }

    pub fn convolver(&self) -> DeviceId {
        self.routing.processor
    }
}

impl ChainUnit for ReverbNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn node_type(&self) -> NodeType {
        NodeType::Reverb
    }

    fn input(&self) -> DeviceId {
        self.routing.input
    }

    fn output(&self) -> DeviceId {
        self.routing.output
    }

    fn settings(&self) -> Value {
        to_value(&self.settings)
    }

    fn changes(&self) -> &SettingsStream {
        &self.changes
    }

    fn update(&mut self, patch: &Value) -> Result<(), ChainError> {
        let next: ReverbSettings = patched(self.id, &self.settings, patch)?;
        let rewire = next.enabled != self.settings.enabled;
        let reload = next.impulse != self.settings.impulse;
        self.settings = next;

        if rewire {
            self.routing.apply(&self.graph, self.settings.enabled)?;
        }
        if reload {
            self.load_impulse();
        }
        self.publish();
        Ok(())
    }

    fn teardown(&mut self) {
        self.routing.release(&self.graph);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryAssetLoader;
    use crate::audio::{Clock, Scheduler, VirtualGraph};
    use crate::messaging::CommandBus;
    use crate::synth::ModulationRouter;
    use serde_json::json;

    fn context(assets: Rc<MemoryAssetLoader>) -> (Rc<VirtualGraph>, NodeContext) {
        let clock = Clock::new();
        let graph = Rc::new(VirtualGraph::new(clock.clone(), 48000.0));
        let ctx = NodeContext {
            graph: graph.clone(),
            scheduler: Rc::new(Scheduler::new(clock)),
            router: Rc::new(ModulationRouter::new(graph.clone())),
            assets,
            commands: Rc::new(CommandBus::new()),
        };
        (graph, ctx)
    }

    #[test]
    fn test_impulse_loaded_by_name() {
        let assets = Rc::new(MemoryAssetLoader::new());
        assets.insert("Block Inside.wav", vec![1; 8]);
        assets.insert("Deep Space.wav", vec![2; 32]);
        let (graph, ctx) = context(assets);

        let mut node = ReverbNode::new(4, &Value::Null, &ctx).unwrap();
        assert_eq!(graph.buffer_len(node.convolver()), Some(8));

        node.update(&json!({"impulse": "Deep Space"})).unwrap();
        assert_eq!(graph.buffer_len(node.convolver()), Some(32));
    }

    #[test]
    fn test_missing_impulse_keeps_previous_buffer() {
        let assets = Rc::new(MemoryAssetLoader::new());
        assets.insert("Block Inside.wav", vec![1; 8]);
        let (graph, ctx) = context(assets);

        let mut node = ReverbNode::new(4, &json!({"enabled": true}), &ctx).unwrap();
        node.update(&json!({"impulse": "Rays"})).unwrap();

        assert_eq!(graph.buffer_len(node.convolver()), Some(8));
        assert_eq!(node.settings()["impulse"], json!("Rays"));
    }
}
