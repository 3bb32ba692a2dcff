// Audio module - device graph control surface, routing model and timing

pub mod graph;
pub mod parameters;
pub mod routing;
pub mod timing;

pub use graph::{
    AudioGraph, DeviceId, DeviceKind, FilterType, GraphError, ParamName, ParamRef, Port,
    SharedGraph, Waveform,
};
pub use routing::VirtualGraph;
pub use timing::{Clock, Scheduler, TimerHandle};
