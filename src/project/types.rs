// Types for chain persistence

use super::PersistenceError;
use crate::chain::effects::{CompressorSettings, EqSettings, ReverbSettings};
use crate::synth::Es1Settings;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

pub type NodeId = u32;

/// Node types the chain knows how to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    #[serde(rename = "ES1")]
    Es1,
    #[serde(rename = "EQ")]
    Eq,
    Compressor,
    Reverb,
}

impl NodeType {
    pub const ALL: [NodeType; 4] = [
        NodeType::Es1,
        NodeType::Eq,
        NodeType::Compressor,
        NodeType::Reverb,
    ];

    /// Name stored in chain documents
    pub fn name(self) -> &'static str {
        match self {
            NodeType::Es1 => "ES1",
            NodeType::Eq => "EQ",
            NodeType::Compressor => "Compressor",
            NodeType::Reverb => "Reverb",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Instrument nodes consume the command stream
    pub fn is_instrument(self) -> bool {
        matches!(self, NodeType::Es1)
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Editor-side placement of a node. Coordinates keep the number form they
/// were stored with and keys this crate doesn't use are carried through.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WrapperSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<[Number; 2]>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WrapperSettings {
    /// Closed wrapper placed at `(x, y)`
    pub fn at(x: impl Into<Number>, y: impl Into<Number>) -> Self {
        Self {
            pos: Some([x.into(), y.into()]),
            ..Self::default()
        }
    }
}

/// One persisted chain element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainNode {
    pub id: NodeId,
    /// Build order; array position in the document carries no meaning
    pub pos: i32,
    /// Node type name, kept verbatim so unknown types survive a round trip
    pub name: String,
    #[serde(default)]
    pub wrapper_settings: WrapperSettings,
    #[serde(default)]
    pub settings: Value,
}

impl ChainNode {
    pub fn new(id: NodeId, pos: i32, node_type: NodeType, settings: Value) -> Self {
        Self {
            id,
            pos,
            name: node_type.name().to_string(),
            wrapper_settings: WrapperSettings::default(),
            settings,
        }
    }

    pub fn node_type(&self) -> Option<NodeType> {
        NodeType::from_name(&self.name)
    }
}

/// Stored form of a chain
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainDocument {
    pub nodes: Vec<ChainNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeChange {
    Settings(Value),
    Wrapper(WrapperSettings),
}

/// Snapshot published by a node whenever its state changes
#[derive(Debug, Clone, PartialEq)]
pub struct NodeUpdate {
    pub id: NodeId,
    pub change: NodeChange,
}

impl NodeUpdate {
    pub fn settings(id: NodeId, settings: Value) -> Self {
        Self {
            id,
            change: NodeChange::Settings(settings),
        }
    }

    pub fn wrapper(id: NodeId, wrapper: WrapperSettings) -> Self {
        Self {
            id,
            change: NodeChange::Wrapper(wrapper),
        }
    }
}

/// Set of chain nodes keyed by id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chain {
    nodes: BTreeMap<NodeId, ChainNode>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a chain, rejecting duplicate ids
    pub fn from_nodes(nodes: Vec<ChainNode>) -> Result<Self, PersistenceError> {
        let mut chain = Self::new();
        for node in nodes {
            if chain.nodes.contains_key(&node.id) {
                return Err(PersistenceError::DuplicateNode(node.id));
            }
            chain.nodes.insert(node.id, node);
        }
        Ok(chain)
    }

    /// Instrument followed by the stock effects
    pub fn default_chain() -> Self {
        let nodes = [
            (NodeType::Es1, to_value(&Es1Settings::default())),
            (NodeType::Eq, to_value(&EqSettings::default())),
            (NodeType::Compressor, to_value(&CompressorSettings::default())),
            (NodeType::Reverb, to_value(&ReverbSettings::default())),
        ];

        let mut chain = Self::new();
        for (i, (node_type, settings)) in nodes.into_iter().enumerate() {
            let id = i as NodeId;
            chain.insert(ChainNode::new(id, i as i32, node_type, settings));
        }
        chain
    }

    pub fn insert(&mut self, node: ChainNode) -> Option<ChainNode> {
        self.nodes.insert(node.id, node)
    }

    pub fn get(&self, id: NodeId) -> Option<&ChainNode> {
        self.nodes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in build order: by `pos`, ties broken by id
    pub fn ordered(&self) -> Vec<&ChainNode> {
        let mut nodes: Vec<&ChainNode> = self.nodes.values().collect();
        nodes.sort_by_key(|n| (n.pos, n.id));
        nodes
    }

    /// Apply one node update. Only the matching node changes; returns false
    /// if no node has that id.
    pub fn fold(&mut self, update: &NodeUpdate) -> bool {
        let Some(node) = self.nodes.get_mut(&update.id) else {
            return false;
        };

        match &update.change {
            NodeChange::Settings(settings) => node.settings = settings.clone(),
            NodeChange::Wrapper(wrapper) => node.wrapper_settings = wrapper.clone(),
        }
        true
    }

    pub fn to_document(&self) -> ChainDocument {
        ChainDocument {
            nodes: self.ordered().into_iter().cloned().collect(),
        }
    }

    pub fn from_document(document: ChainDocument) -> Result<Self, PersistenceError> {
        Self::from_nodes(document.nodes)
    }
}

fn to_value<T: Serialize>(settings: &T) -> Value {
    serde_json::to_value(settings).unwrap_or(Value::Null)
}
