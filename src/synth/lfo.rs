// LFO - low frequency modulation source
//
// oscillator -> depth gain. The depth gain output is what gets patched into
// parameters through the modulation router.

use super::modulation::{ModulationRouter, ModulationSource, ModulationTarget};
use crate::audio::graph::set_now;
use crate::audio::parameters::{cutoff, Range};
use crate::audio::{DeviceId, DeviceKind, GraphError, ParamName, ParamRef, Port, SharedGraph, Waveform};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Lowest LFO rate in Hz (frequency factor 0)
pub const MIN_FREQUENCY: f32 = 0.1;
pub const FREQUENCY_RANGE: Range = Range::new(0.0, 1.0);
pub const GAIN_RANGE: Range = Range::new(0.0, 1000.0);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LfoSettings {
    pub form: Waveform,
    /// Normalized rate, mapped logarithmically from 0.1 Hz up to nyquist
    pub frequency: f32,
    /// Modulation depth, in units of the target parameter
    pub gain: f32,
}

impl Default for LfoSettings {
    fn default() -> Self {
        Self {
            form: Waveform::Sine,
            frequency: 0.5,
            gain: 100.0,
        }
    }
}

pub struct Lfo {
    graph: SharedGraph,
    router: Rc<ModulationRouter>,
    oscillator: DeviceId,
    depth: DeviceId,
    settings: LfoSettings,
}

impl Lfo {
    pub fn new(
        graph: SharedGraph,
        router: Rc<ModulationRouter>,
        settings: LfoSettings,
    ) -> Result<Self, GraphError> {
        let oscillator = graph.create(DeviceKind::Oscillator);
        let depth = graph.create(DeviceKind::Gain);
        graph.connect(oscillator, Port::Input(depth))?;

        let lfo = Self {
            graph,
            router,
            oscillator,
            depth,
            settings,
        };
        lfo.apply(&lfo.settings);
        lfo.graph.start(oscillator, lfo.graph.current_time());

        Ok(lfo)
    }

    fn apply(&self, settings: &LfoSettings) {
        let graph = self.graph.as_ref();
        graph.set_waveform(self.oscillator, settings.form);
        set_now(
            graph,
            ParamRef::new(self.oscillator, ParamName::Frequency),
            cutoff(
                FREQUENCY_RANGE.clamp(settings.frequency),
                MIN_FREQUENCY,
                graph.sample_rate(),
            ),
        );
        set_now(
            graph,
            ParamRef::new(self.depth, ParamName::Gain),
            GAIN_RANGE.clamp(settings.gain),
        );
    }

    pub fn update(&mut self, settings: LfoSettings) {
        self.apply(&settings);
        self.settings = settings;
    }

    pub fn settings(&self) -> &LfoSettings {
        &self.settings
    }

    /// Current rate in Hz
    pub fn frequency_hz(&self) -> f32 {
        cutoff(
            FREQUENCY_RANGE.clamp(self.settings.frequency),
            MIN_FREQUENCY,
            self.graph.sample_rate(),
        )
    }

    pub fn output(&self) -> DeviceId {
        self.depth
    }

    pub fn source(&self) -> ModulationSource {
        ModulationSource {
            output: self.depth,
            label: "LFO".to_string(),
        }
    }

    /// Start dragging: arm the router with this LFO
    pub fn begin_drag(&self) {
        self.router.arm(self.source());
    }

    /// Drop over `target`, patching the LFO into it
    pub fn end_drag_over(&self, target: &ModulationTarget) -> Result<bool, GraphError> {
        self.router.connect(target)
    }

    /// Drop outside any target
    pub fn end_drag(&self) -> bool {
        self.router.cancel()
    }
}
