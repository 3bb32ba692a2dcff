// Chain persistence - document types, key-value stores and the versioned codec

pub mod migration;
pub mod serialization;
pub mod store;
pub mod types;

pub use serialization::PersistenceCodec;
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use types::{Chain, ChainDocument, ChainNode, NodeChange, NodeId, NodeType, NodeUpdate, WrapperSettings};

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Duplicate node id {0} in chain document")]
    DuplicateNode(NodeId),
}
