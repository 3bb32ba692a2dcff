// Signal chain - instrument and effect units wired into one path

pub mod effects;
pub mod host;
pub mod instrument;
pub mod node;
pub mod registry;

pub use host::{ChainHandle, SignalChainHost};
pub use node::{ChainError, ChainUnit, NodeContext};
