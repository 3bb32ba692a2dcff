// Chain units - the uniform contract every instrument and effect fulfils
//
// A unit owns its internal devices, exposes one audio input and one audio
// output, and publishes a settings snapshot whenever its parameters change.
// It never touches devices that belong to a neighbour.

use crate::assets::AssetLoader;
use crate::audio::graph::tolerate;
use crate::audio::{DeviceId, GraphError, Port, Scheduler, SharedGraph};
use crate::messaging::{Broadcast, CommandBus};
use crate::project::{NodeId, NodeType, NodeUpdate};
use crate::synth::{ModulationRouter, ModulationTarget, VoiceEngine};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("No node with id {0} in the chain")]
    UnknownNode(NodeId),

    #[error("Invalid settings for node {id}: {source}")]
    InvalidSettings {
        id: NodeId,
        #[source]
        source: serde_json::Error,
    },

    #[error("Audio graph error: {0}")]
    Graph(#[from] GraphError),
}

/// Shared collaborators handed to every unit at build time
#[derive(Clone)]
pub struct NodeContext {
    pub graph: SharedGraph,
    pub scheduler: Rc<Scheduler>,
    pub router: Rc<ModulationRouter>,
    pub assets: Rc<dyn AssetLoader>,
    pub commands: Rc<CommandBus>,
}

pub type SettingsStream = Rc<Broadcast<NodeUpdate>>;

pub trait ChainUnit {
    fn id(&self) -> NodeId;
    fn node_type(&self) -> NodeType;
    fn input(&self) -> DeviceId;
    fn output(&self) -> DeviceId;

    /// Current settings snapshot
    fn settings(&self) -> Value;

    /// Stream of snapshots tagged with this unit's id
    fn changes(&self) -> &SettingsStream;

    /// Merge `patch` into the settings and apply it to the devices.
    /// Invalid settings leave the unit untouched.
    fn update(&mut self, patch: &Value) -> Result<(), ChainError>;

    /// Parameters other units may modulate
    fn targets(&self) -> Vec<Rc<ModulationTarget>> {
        Vec::new()
    }

    /// Voice engine of an instrument unit
    fn voice_engine(&self) -> Option<Rc<RefCell<VoiceEngine>>> {
        None
    }

    /// Release internal devices and subscriptions
    fn teardown(&mut self);

    fn publish(&self) {
        self.changes()
            .emit(NodeUpdate::settings(self.id(), self.settings()));
    }
}

/// Recursively merge `patch` into `base`: objects merge key by key,
/// anything else replaces
pub fn merge_patch(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                match base.get_mut(key) {
                    Some(existing) => merge_patch(existing, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, patch) => *base = patch.clone(),
    }
}

/// Settings from a stored value; missing fields take defaults and a value
/// that does not parse at all falls back to the defaults
pub fn parse_settings<T>(id: NodeId, value: &Value) -> T
where
    T: DeserializeOwned + Default,
{
    if value.is_null() {
        return T::default();
    }
    match serde_json::from_value(value.clone()) {
        Ok(settings) => settings,
        Err(e) => {
            log::warn!("Node {} has invalid settings ({}), using defaults", id, e);
            T::default()
        }
    }
}

/// Settings after merging `patch` into `current`
pub fn patched<T>(id: NodeId, current: &T, patch: &Value) -> Result<T, ChainError>
where
    T: Serialize + DeserializeOwned,
{
    let mut value = to_value(current);
    merge_patch(&mut value, patch);
    serde_json::from_value(value).map_err(|source| ChainError::InvalidSettings { id, source })
}

pub fn to_value<T: Serialize>(settings: &T) -> Value {
    serde_json::to_value(settings).unwrap_or(Value::Null)
}

/// Internal routing of an effect with an on/off switch:
/// `input -> processor -> output` when enabled, `input -> output` when bypassed
#[derive(Debug, Clone, Copy)]
pub struct Bypass {
    pub input: DeviceId,
    pub processor: DeviceId,
    pub output: DeviceId,
}

impl Bypass {
    pub fn apply(&self, graph: &SharedGraph, enabled: bool) -> Result<(), GraphError> {
        self.unwire(graph);
        if enabled {
            graph.connect(self.input, Port::Input(self.processor))?;
            graph.connect(self.processor, Port::Input(self.output))?;
        } else {
            graph.connect(self.input, Port::Input(self.output))?;
        }
        Ok(())
    }

    pub fn unwire(&self, graph: &SharedGraph) {
        tolerate(graph.disconnect(self.input, Port::Input(self.processor)));
        tolerate(graph.disconnect(self.input, Port::Input(self.output)));
        tolerate(graph.disconnect(self.processor, Port::Input(self.output)));
    }

    /// Unwire and free all three devices
    pub fn release(&self, graph: &SharedGraph) {
        self.unwire(graph);
        for device in [self.input, self.processor, self.output] {
            graph.release(device);
        }
    }
}
