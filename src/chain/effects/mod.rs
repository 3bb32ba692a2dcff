// Effect units

pub mod compressor;
pub mod eq;
pub mod reverb;

pub use compressor::{CompressorNode, CompressorSettings};
pub use eq::{EqNode, EqSettings};
pub use reverb::{ReverbNode, ReverbSettings, IMPULSES};
