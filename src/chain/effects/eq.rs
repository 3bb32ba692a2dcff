// EQ - one biquad filter with bypass

use crate::audio::graph::set_now;
use crate::audio::parameters::{cutoff, log_scale, Range};
use crate::audio::{DeviceId, DeviceKind, FilterType, GraphError, ParamName, ParamRef, SharedGraph};
use crate::chain::node::{
    parse_settings, patched, to_value, Bypass, ChainError, ChainUnit, NodeContext, SettingsStream,
};
use crate::messaging::Broadcast;
use crate::project::{NodeId, NodeType};
use crate::synth::ModulationTarget;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::rc::Rc;

/// Lowest cutoff in Hz (frequency factor 0)
pub const MIN_CUTOFF: f32 = 10.0;
pub const FACTOR_RANGE: Range = Range::new(0.0, 1.0);
pub const DETUNE_RANGE: Range = Range::new(0.0, 100.0);
pub const Q_RANGE: Range = Range::new(0.0001, 1.0);
pub const GAIN_RANGE: Range = Range::new(-40.0, 40.0);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EqSettings {
    pub enabled: bool,
    /// Normalized cutoff, mapped logarithmically from 10 Hz to nyquist
    pub frequency: f32,
    pub detune: f32,
    /// Normalized resonance, mapped logarithmically from 0.0001 to 100
    #[serde(rename = "Q")]
    pub q: f32,
    pub gain: f32,
    #[serde(rename = "biquadType")]
    pub biquad_type: FilterType,
}

impl Default for EqSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            frequency: 0.5,
            detune: 0.0,
            q: 0.01,
            gain: 0.0,
            biquad_type: FilterType::Lowpass,
        }
    }
}

impl EqSettings {
    pub fn cutoff_hz(&self, sample_rate: f32) -> f32 {
        cutoff(FACTOR_RANGE.clamp(self.frequency), MIN_CUTOFF, sample_rate)
    }

    pub fn resonance(&self) -> f32 {
        log_scale(Q_RANGE.clamp(self.q), 0.0001, 100.0)
    }
}

pub struct EqNode {
    id: NodeId,
    graph: SharedGraph,
    routing: Bypass,
    settings: EqSettings,
    changes: SettingsStream,
    targets: Vec<Rc<ModulationTarget>>,
}

impl EqNode {
    pub fn new(id: NodeId, initial: &Value, ctx: &NodeContext) -> Result<Self, GraphError> {
        let graph = ctx.graph.clone();
        let routing = Bypass {
            input: graph.create(DeviceKind::Gain),
            processor: graph.create(DeviceKind::BiquadFilter),
            output: graph.create(DeviceKind::Gain),
        };

        let filter = routing.processor;
        let targets = [
            (ParamName::Frequency, "EQ frequency"),
            (ParamName::Detune, "EQ detune"),
            (ParamName::Q, "EQ Q"),
            (ParamName::Gain, "EQ gain"),
        ]
        .into_iter()
        .map(|(name, label)| ctx.router.target(ParamRef::new(filter, name), label))
        .collect();

        let node = Self {
            id,
            graph,
            routing,
            settings: parse_settings(id, initial),
            changes: Rc::new(Broadcast::new()),
            targets,
        };
        node.routing.apply(&node.graph, node.settings.enabled)?;
        node.apply_params();
        Ok(node)
    }

    fn apply_params(&self) {
        let graph = self.graph.as_ref();
        let filter = self.routing.processor;
        let s = &self.settings;

        set_now(graph, ParamRef::new(filter, ParamName::Frequency), s.cutoff_hz(graph.sample_rate()));
        set_now(graph, ParamRef::new(filter, ParamName::Detune), DETUNE_RANGE.clamp(s.detune));
        set_now(graph, ParamRef::new(filter, ParamName::Q), s.resonance());
        set_now(graph, ParamRef::new(filter, ParamName::Gain), GAIN_RANGE.clamp(s.gain));
        graph.set_filter_type(filter, s.biquad_type);
    }

    pub fn filter(&self) -> DeviceId {
        self.routing.processor
    }
}

impl ChainUnit for EqNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn node_type(&self) -> NodeType {
        NodeType::Eq
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
        let next: EqSettings = patched(self.id, &self.settings, patch)?;
        let rewire = next.enabled != self.settings.enabled;
        self.settings = next;

        if rewire {
            self.routing.apply(&self.graph, self.settings.enabled)?;
        }
        self.apply_params();
        self.publish();
        Ok(())
    }

    fn targets(&self) -> Vec<Rc<ModulationTarget>> {
        self.targets.clone()
    }

    fn teardown(&mut self) {
        self.routing.release(&self.graph);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryAssetLoader;
    use crate::audio::{AudioGraph, Clock, Port, Scheduler, VirtualGraph};
    use crate::messaging::CommandBus;
    use crate::synth::ModulationRouter;
    use serde_json::json;

    fn context() -> (Rc<VirtualGraph>, NodeContext) {
        let clock = Clock::new();
        let graph = Rc::new(VirtualGraph::new(clock.clone(), 48000.0));
        let ctx = NodeContext {
            graph: graph.clone(),
            scheduler: Rc::new(Scheduler::new(clock)),
            router: Rc::new(ModulationRouter::new(graph.clone())),
            assets: Rc::new(MemoryAssetLoader::new()),
            commands: Rc::new(CommandBus::new()),
        };
        (graph, ctx)
    }

    #[test]
    fn test_parameters_are_log_mapped() {
        let (graph, ctx) = context();
        let node = EqNode::new(1, &json!({"frequency": 1.0, "Q": 1.0, "biquadType": "notch"}), &ctx)
            .unwrap();

        let frequency = graph.value_at(ParamRef::new(node.filter(), ParamName::Frequency), 0.0);
        let q = graph.value_at(ParamRef::new(node.filter(), ParamName::Q), 0.0);
        assert!((frequency - 24000.0).abs() < 0.5);
        assert!((q - 100.0).abs() < 1e-3);
        assert_eq!(graph.filter_type(node.filter()), Some(FilterType::Notch));
        assert_eq!(node.targets().len(), 4);
    }

    #[test]
    fn test_disable_bypasses_filter() {
        let (graph, ctx) = context();
        let mut node = EqNode::new(1, &Value::Null, &ctx).unwrap();
        assert!(graph.is_connected(node.input(), Port::Input(node.filter())));

        node.update(&json!({"enabled": false})).unwrap();
        assert!(graph.is_connected(node.input(), Port::Input(node.output())));
        assert!(!graph.is_connected(node.input(), Port::Input(node.filter())));
        assert!(!graph.is_connected(node.filter(), Port::Input(node.output())));
        assert_eq!(node.settings()["enabled"], json!(false));
    }
}
