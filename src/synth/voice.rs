// Voice - one sounding note
//
// Device layout per voice:
//   oscillator[i] -> panner[i] -> envelope gain -> output gain -> instrument bus
// The envelope shapes attack and release, the output gain carries volume
// and velocity.

use super::settings::Es1Settings;
use crate::audio::graph::{ramp_from_current, set_now, tolerate};
use crate::audio::{AudioGraph, DeviceId, DeviceKind, GraphError, ParamName, ParamRef, Port};

/// Identity of a voice inside one engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Idle,
    Attacking,
    Sustaining,
    Releasing,
}

pub struct Voice {
    id: VoiceId,
    note: u8,
    velocity: u8,
    oscillators: Vec<DeviceId>,
    panners: Vec<DeviceId>,
    envelope: DeviceId,
    output: DeviceId,
    bus: DeviceId,
    started_at: f64,
    attack: f64,
    releasing: bool,
    faded: bool,
}

/// Stereo position of oscillator `index` out of `count`
pub fn pan_position(index: usize, count: usize) -> f32 {
    2.0 * index as f32 / count as f32 - 1.0
}

/// Detune of oscillator `index` out of `count`, symmetric around the center
pub fn detune_offset(detune: f32, index: usize, count: usize) -> f32 {
    detune * (count as f32 / 2.0 - index as f32)
}

impl Voice {
    /// Create and start the devices of a new voice, wired into `bus`
    pub fn allocate(
        graph: &dyn AudioGraph,
        id: VoiceId,
        note: u8,
        velocity: u8,
        frequency: f32,
        settings: &Es1Settings,
        bus: DeviceId,
    ) -> Result<Self, GraphError> {
        let now = graph.current_time();
        let count = settings.voices.max(1) as usize;

        let envelope = graph.create(DeviceKind::Gain);
        let envelope_gain = ParamRef::new(envelope, ParamName::Gain);
        graph.cancel_scheduled(envelope_gain, now);
        graph.set_value_at(envelope_gain, 0.0, now);
        graph.linear_ramp_to(envelope_gain, 1.0, now + settings.attack as f64);

        let output = graph.create(DeviceKind::Gain);
        graph.set_value_at(
            ParamRef::new(output, ParamName::Gain),
            settings.volume * velocity as f32 / 127.0,
            now,
        );

        let mut oscillators = Vec::with_capacity(count);
        let mut panners = Vec::with_capacity(count);
        for i in 0..count {
            let panner = graph.create(DeviceKind::StereoPanner);
            graph.set_value_at(ParamRef::new(panner, ParamName::Pan), pan_position(i, count), now);

            let osc = graph.create(DeviceKind::Oscillator);
            graph.set_waveform(osc, settings.form);
            graph.set_value_at(ParamRef::new(osc, ParamName::Frequency), frequency, now);
            graph.set_value_at(
                ParamRef::new(osc, ParamName::Detune),
                detune_offset(settings.detune, i, count),
                now,
            );

            graph.connect(osc, Port::Input(panner))?;
            graph.connect(panner, Port::Input(envelope))?;
            oscillators.push(osc);
            panners.push(panner);
        }

        graph.connect(envelope, Port::Input(output))?;
        graph.connect(output, Port::Input(bus))?;

        for osc in &oscillators {
            graph.start(*osc, now);
        }

        Ok(Self {
            id,
            note,
            velocity,
            oscillators,
            panners,
            envelope,
            output,
            bus,
            started_at: now,
            attack: settings.attack as f64,
            releasing: false,
            faded: false,
        })
    }

    pub fn id(&self) -> VoiceId {
        self.id
    }

    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn velocity(&self) -> u8 {
        self.velocity
    }

    pub fn oscillators(&self) -> &[DeviceId] {
        &self.oscillators
    }

    pub fn panners(&self) -> &[DeviceId] {
        &self.panners
    }

    pub fn envelope_gain(&self) -> ParamRef {
        ParamRef::new(self.envelope, ParamName::Gain)
    }

    pub fn output_gain(&self) -> ParamRef {
        ParamRef::new(self.output, ParamName::Gain)
    }

    pub fn output(&self) -> DeviceId {
        self.output
    }

    pub fn is_releasing(&self) -> bool {
        self.releasing
    }

    /// Faded out by a mono retrigger, waiting for teardown
    pub fn is_faded(&self) -> bool {
        self.faded
    }

    /// Still answering to note-off and hot parameter changes
    pub fn is_active(&self) -> bool {
        !self.releasing && !self.faded
    }

    pub fn state(&self, now: f64) -> VoiceState {
        if self.releasing || self.faded {
            VoiceState::Releasing
        } else if now < self.started_at + self.attack {
            VoiceState::Attacking
        } else {
            VoiceState::Sustaining
        }
    }

    pub fn apply_volume(&self, graph: &dyn AudioGraph, volume: f32) {
        set_now(graph, self.output_gain(), volume * self.velocity as f32 / 127.0);
    }

    pub fn apply_detune(&self, graph: &dyn AudioGraph, detune: f32) {
        let count = self.oscillators.len();
        for (i, osc) in self.oscillators.iter().enumerate() {
            set_now(
                graph,
                ParamRef::new(*osc, ParamName::Detune),
                detune_offset(detune, i, count),
            );
        }
    }

    /// Move every oscillator to `frequency` over `seconds` (instantly if 0)
    pub fn glide_to(&mut self, graph: &dyn AudioGraph, note: u8, frequency: f32, seconds: f32) {
        self.note = note;
        for osc in &self.oscillators {
            let param = ParamRef::new(*osc, ParamName::Frequency);
            if seconds > 0.0 {
                ramp_from_current(graph, param, frequency, seconds as f64);
            } else {
                set_now(graph, param, frequency);
            }
        }
    }

    /// Start the release ramp of the envelope
    pub fn release(&mut self, graph: &dyn AudioGraph, seconds: f32) {
        self.releasing = true;
        ramp_from_current(graph, self.envelope_gain(), 0.0, seconds as f64);
    }

    /// Ramp the output gain to silence (mono retrigger)
    pub fn fade_out(&mut self, graph: &dyn AudioGraph, seconds: f64) {
        self.faded = true;
        ramp_from_current(graph, self.output_gain(), 0.0, seconds);
    }

    /// Stop the oscillators, unwire every link of the voice and free its
    /// devices. Safe to call again.
    pub fn silence(&self, graph: &dyn AudioGraph) {
        let now = graph.current_time();
        for osc in &self.oscillators {
            graph.stop(*osc, now);
        }

        for (osc, panner) in self.oscillators.iter().zip(&self.panners) {
            tolerate(graph.disconnect(*osc, Port::Input(*panner)));
            tolerate(graph.disconnect(*panner, Port::Input(self.envelope)));
        }
        tolerate(graph.disconnect(self.envelope, Port::Input(self.output)));
        tolerate(graph.disconnect(self.output, Port::Input(self.bus)));

        for device in self.devices() {
            graph.release(device);
        }
    }

    fn devices(&self) -> impl Iterator<Item = DeviceId> + '_ {
        self.oscillators
            .iter()
            .chain(&self.panners)
            .copied()
            .chain([self.envelope, self.output])
    }
}
