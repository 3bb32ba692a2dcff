// Node registry - node type to constructor, resolved once at build time

use super::effects::{CompressorNode, EqNode, ReverbNode};
use super::instrument::Es1Node;
use super::node::{ChainUnit, NodeContext};
use crate::audio::GraphError;
use crate::project::{ChainNode, NodeId, NodeType};
use serde_json::Value;

pub type Constructor = fn(NodeId, &Value, &NodeContext) -> Result<Box<dyn ChainUnit>, GraphError>;

pub fn constructor(node_type: NodeType) -> Constructor {
    match node_type {
        NodeType::Es1 => build_es1,
        NodeType::Eq => build_eq,
        NodeType::Compressor => build_compressor,
        NodeType::Reverb => build_reverb,
    }
}

fn build_es1(id: NodeId, settings: &Value, ctx: &NodeContext) -> Result<Box<dyn ChainUnit>, GraphError> {
    Ok(Box::new(Es1Node::new(id, settings, ctx)?))
}

fn build_eq(id: NodeId, settings: &Value, ctx: &NodeContext) -> Result<Box<dyn ChainUnit>, GraphError> {
    Ok(Box::new(EqNode::new(id, settings, ctx)?))
}

fn build_compressor(
    id: NodeId,
    settings: &Value,
    ctx: &NodeContext,
) -> Result<Box<dyn ChainUnit>, GraphError> {
    Ok(Box::new(CompressorNode::new(id, settings, ctx)?))
}

fn build_reverb(
    id: NodeId,
    settings: &Value,
    ctx: &NodeContext,
) -> Result<Box<dyn ChainUnit>, GraphError> {
    Ok(Box::new(ReverbNode::new(id, settings, ctx)?))
}

/// Instantiate a stored node. Unknown types and failed constructions yield
/// `None` so the chain can be built without them.
pub fn instantiate(node: &ChainNode, ctx: &NodeContext) -> Option<Box<dyn ChainUnit>> {
    let Some(node_type) = node.node_type() else {
        log::warn!("Skipping node {}: unknown type {:?}", node.id, node.name);
        return None;
    };

    match constructor(node_type)(node.id, &node.settings, ctx) {
        Ok(unit) => Some(unit),
        Err(e) => {
            log::warn!("Skipping node {} ({}): {}", node.id, node_type, e);
            None
        }
    }
}
