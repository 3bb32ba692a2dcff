// Compressor - dynamics compression

use crate::audio::graph::{set_now, tolerate};
use crate::audio::parameters::Range;
use crate::audio::{DeviceId, DeviceKind, GraphError, ParamName, ParamRef, Port, SharedGraph};
use crate::chain::node::{
    parse_settings, patched, to_value, ChainError, ChainUnit, NodeContext, SettingsStream,
};
use crate::messaging::Broadcast;
use crate::project::{NodeId, NodeType};
use crate::synth::ModulationTarget;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::rc::Rc;

pub const THRESHOLD_RANGE: Range = Range::new(-100.0, 0.0);
pub const KNEE_RANGE: Range = Range::new(0.0, 40.0);
pub const RATIO_RANGE: Range = Range::new(1.0, 20.0);
pub const ATTACK_RANGE: Range = Range::new(0.0, 1.0);
pub const RELEASE_RANGE: Range = Range::new(0.01, 1.0);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressorSettings {
    /// dB
    pub threshold: f32,
    /// dB
    pub knee: f32,
    pub ratio: f32,
    /// Seconds
    pub attack: f32,
    /// Seconds
    pub release: f32,
}

impl Default for CompressorSettings {
    fn default() -> Self {
        Self {
            threshold: -50.0,
            knee: 40.0,
            ratio: 12.0,
            attack: 0.0,
            release: 0.25,
        }
    }
}

impl CompressorSettings {
    fn values(&self) -> [(ParamName, f32); 5] {
        [
            (ParamName::Threshold, THRESHOLD_RANGE.clamp(self.threshold)),
            (ParamName::Knee, KNEE_RANGE.clamp(self.knee)),
            (ParamName::Ratio, RATIO_RANGE.clamp(self.ratio)),
            (ParamName::Attack, ATTACK_RANGE.clamp(self.attack)),
            (ParamName::Release, RELEASE_RANGE.clamp(self.release)),
        ]
    }
}

pub struct CompressorNode {
    id: NodeId,
    graph: SharedGraph,
    input: DeviceId,
    compressor: DeviceId,
    output: DeviceId,
    settings: CompressorSettings,
    changes: SettingsStream,
    targets: Vec<Rc<ModulationTarget>>,
}

impl CompressorNode {
    pub fn new(id: NodeId, initial: &Value, ctx: &NodeContext) -> Result<Self, GraphError> {
        let graph = ctx.graph.clone();
        let input = graph.create(DeviceKind::Gain);
        let compressor = graph.create(DeviceKind::Compressor);
        let output = graph.create(DeviceKind::Gain);

        graph.connect(input, Port::Input(compressor))?;
        graph.connect(compressor, Port::Input(output))?;

        let targets = [
            (ParamName::Threshold, "Compressor threshold"),
            (ParamName::Knee, "Compressor knee"),
            (ParamName::Ratio, "Compressor ratio"),
            (ParamName::Attack, "Compressor attack"),
            (ParamName::Release, "Compressor release"),
        ]
        .into_iter()
        .map(|(name, label)| ctx.router.target(ParamRef::new(compressor, name), label))
        .collect();

        let node = Self {
            id,
            graph,
            input,
            compressor,
            output,
            settings: parse_settings(id, initial),
            changes: Rc::new(Broadcast::new()),
            targets,
        };
        node.apply_params();
        Ok(node)
    }

    fn apply_params(&self) {
        for (name, value) in self.settings.values() {
            set_now(self.graph.as_ref(), ParamRef::new(self.compressor, name), value);
        }
    }

    pub fn compressor(&self) -> DeviceId {
        self.compressor
    }
}

impl ChainUnit for CompressorNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn node_type(&self) -> NodeType {
        NodeType::Compressor
    }

    fn input(&self) -> DeviceId {
        self.input
    }

    fn output(&self) -> DeviceId {
        self.output
    }

    fn settings(&self) -> Value {
        to_value(&self.settings)
    }

    fn changes(&self) -> &SettingsStream {
        &self.changes
    }

    fn update(&mut self, patch: &Value) -> Result<(), ChainError> {
        self.settings = patched(self.id, &self.settings, patch)?;
        self.apply_params();
        self.publish();
        Ok(())
    }

    fn targets(&self) -> Vec<Rc<ModulationTarget>> {
        self.targets.clone()
    }

    fn teardown(&mut self) {
        tolerate(self.graph.disconnect(self.input, Port::Input(self.compressor)));
        tolerate(self.graph.disconnect(self.compressor, Port::Input(self.output)));
        for device in [self.input, self.compressor, self.output] {
            self.graph.release(device);
        }
    }
}
