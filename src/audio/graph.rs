// Audio device graph - the seam between the control core and the renderer
//
// Sample-level processing runs elsewhere. The core only creates opaque
// devices, wires them together and schedules their parameter values.

use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Identifier of a device inside an [`AudioGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub usize);

/// Kinds of processing devices the renderer provides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Oscillator,
    Gain,
    StereoPanner,
    BiquadFilter,
    Compressor,
    Convolver,
    /// Final output of the renderer
    Destination,
}

impl DeviceKind {
    /// Automatable parameters exposed by this device kind, with their
    /// initial values
    pub fn params(self) -> &'static [(ParamName, f32)] {
        match self {
            DeviceKind::Oscillator => &[(ParamName::Frequency, 440.0), (ParamName::Detune, 0.0)],
            DeviceKind::Gain => &[(ParamName::Gain, 1.0)],
            DeviceKind::StereoPanner => &[(ParamName::Pan, 0.0)],
            DeviceKind::BiquadFilter => &[
                (ParamName::Frequency, 350.0),
                (ParamName::Detune, 0.0),
                (ParamName::Q, 1.0),
                (ParamName::Gain, 0.0),
            ],
            DeviceKind::Compressor => &[
                (ParamName::Threshold, -24.0),
                (ParamName::Knee, 30.0),
                (ParamName::Ratio, 12.0),
                (ParamName::Attack, 0.003),
                (ParamName::Release, 0.25),
            ],
            DeviceKind::Convolver | DeviceKind::Destination => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamName {
    Gain,
    Frequency,
    Detune,
    Pan,
    Q,
    Threshold,
    Knee,
    Ratio,
    Attack,
    Release,
}

/// One automatable parameter of one device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamRef {
    pub device: DeviceId,
    pub name: ParamName,
}

impl ParamRef {
    pub fn new(device: DeviceId, name: ParamName) -> Self {
        Self { device, name }
    }
}

/// Where a device output can be connected to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Port {
    /// The audio input of a device
    Input(DeviceId),
    /// The control input of a parameter (modulation)
    Param(ParamRef),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    #[default]
    Sine,
    Triangle,
    Square,
    Sawtooth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    #[default]
    Lowpass,
    Highpass,
    Bandpass,
    Lowshelf,
    Highshelf,
    Peaking,
    Notch,
    Allpass,
}

/// Device graph errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    #[error("Unknown device: {0:?}")]
    UnknownDevice(DeviceId),

    #[error("Device {device:?} has no parameter {name:?}")]
    UnknownParam { device: DeviceId, name: ParamName },

    #[error("{from:?} is not connected to {to:?}")]
    NotConnected { from: DeviceId, to: Port },
}

/// Control surface of the external renderer.
///
/// Times are in seconds on the graph's own clock. Automation follows the
/// usual rule for audio parameters: a ramp starts at the previous event and
/// a new schedule for a parameter supersedes the old one only after the
/// caller cancels it ("cancel pending, then schedule new").
pub trait AudioGraph {
    fn current_time(&self) -> f64;

    fn sample_rate(&self) -> f32;

    /// The renderer's final output device
    fn destination(&self) -> DeviceId;

    fn create(&self, kind: DeviceKind) -> DeviceId;

    /// Free a device along with every link from or to it. Releasing an
    /// unknown device does nothing.
    fn release(&self, device: DeviceId);

    fn connect(&self, from: DeviceId, to: Port) -> Result<(), GraphError>;

    /// Fails with [`GraphError::NotConnected`] if the link does not exist
    fn disconnect(&self, from: DeviceId, to: Port) -> Result<(), GraphError>;

    fn set_value_at(&self, param: ParamRef, value: f32, time: f64);

    fn linear_ramp_to(&self, param: ParamRef, value: f32, end_time: f64);

    /// Drop every automation event at or after `from_time`
    fn cancel_scheduled(&self, param: ParamRef, from_time: f64);

    /// Value of the parameter at `time` given the current automation
    fn value_at(&self, param: ParamRef, time: f64) -> f32;

    fn start(&self, device: DeviceId, time: f64);

    fn stop(&self, device: DeviceId, time: f64);

    fn set_waveform(&self, device: DeviceId, waveform: Waveform);

    fn set_filter_type(&self, device: DeviceId, filter: FilterType);

    /// Hand a raw impulse buffer to a convolver; decoding happens in the renderer
    fn set_buffer(&self, device: DeviceId, bytes: Vec<u8>);
}

pub type SharedGraph = Rc<dyn AudioGraph>;

/// Swallow "already disconnected" errors on teardown paths
pub fn tolerate(result: Result<(), GraphError>) {
    match result {
        Ok(()) => {}
        Err(e @ GraphError::NotConnected { .. }) => log::debug!("ignored: {}", e),
        Err(e) => log::warn!("audio graph: {}", e),
    }
}

/// Cancel pending automation and pin the parameter to `value` now
pub fn set_now(graph: &dyn AudioGraph, param: ParamRef, value: f32) {
    let now = graph.current_time();
    graph.cancel_scheduled(param, now);
    graph.set_value_at(param, value, now);
}

/// Cancel pending automation, hold the current value and ramp linearly to
/// `target` over `seconds`
pub fn ramp_from_current(graph: &dyn AudioGraph, param: ParamRef, target: f32, seconds: f64) {
    let now = graph.current_time();
    let current = graph.value_at(param, now);
    graph.cancel_scheduled(param, now);
    graph.set_value_at(param, current, now);
    graph.linear_ramp_to(param, target, now + seconds.max(0.0));
}
