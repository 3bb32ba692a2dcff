// Virtual routing graph - in-process model of the renderer's device graph
//
// Tracks devices, connections and per-parameter automation timelines so the
// control core can be driven and inspected without a sound card. Automation
// is evaluated the way audio parameters behave: set-value events hold, and
// a linear ramp interpolates from the previous event to its end time.

use super::graph::{
    AudioGraph, DeviceId, DeviceKind, FilterType, GraphError, ParamName, ParamRef, Port, Waveform,
};
use super::timing::Clock;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq)]
enum AutomationEvent {
    Set { time: f64, value: f32 },
    Ramp { end: f64, value: f32 },
}

impl AutomationEvent {
    fn time(&self) -> f64 {
        match *self {
            AutomationEvent::Set { time, .. } => time,
            AutomationEvent::Ramp { end, .. } => end,
        }
    }
}

#[derive(Debug, Clone)]
struct Timeline {
    initial: f32,
    events: Vec<AutomationEvent>,
}

impl Timeline {
    fn new(initial: f32) -> Self {
        Self {
            initial,
            events: Vec::new(),
        }
    }

    fn insert(&mut self, event: AutomationEvent) {
        // Keep time order; equal times keep insertion order
        let index = self
            .events
            .iter()
            .position(|e| e.time() > event.time())
            .unwrap_or(self.events.len());
        self.events.insert(index, event);
    }

    fn cancel_from(&mut self, from_time: f64) {
        self.events.retain(|e| e.time() < from_time);
    }

    fn value_at(&self, time: f64) -> f32 {
        let mut anchor = (0.0f64, self.initial);

        for event in &self.events {
            match *event {
                AutomationEvent::Set { time: at, value } => {
                    if at > time {
                        break;
                    }
                    anchor = (at, value);
                }
                AutomationEvent::Ramp { end, value } => {
                    if end <= time {
                        anchor = (end, value);
                        continue;
                    }
                    let (start, from) = anchor;
                    if time <= start {
                        return from;
                    }
                    let progress = ((time - start) / (end - start)) as f32;
                    return from + (value - from) * progress;
                }
            }
        }

        anchor.1
    }
}

#[derive(Debug, Clone)]
struct Device {
    kind: DeviceKind,
    params: HashMap<ParamName, Timeline>,
    waveform: Waveform,
    filter_type: FilterType,
    buffer_len: Option<usize>,
    started: Option<f64>,
    stopped: Option<f64>,
}

impl Device {
    fn new(kind: DeviceKind) -> Self {
        Self {
            kind,
            params: kind
                .params()
                .iter()
                .map(|(name, initial)| (*name, Timeline::new(*initial)))
                .collect(),
            waveform: Waveform::default(),
            filter_type: FilterType::default(),
            buffer_len: None,
            started: None,
            stopped: None,
        }
    }
}

struct GraphState {
    devices: BTreeMap<DeviceId, Device>,
    next_id: usize,
    connections: Vec<(DeviceId, Port)>,
}

/// In-memory [`AudioGraph`] sharing the control clock
pub struct VirtualGraph {
    clock: Clock,
    sample_rate: f32,
    destination: DeviceId,
    state: RefCell<GraphState>,
}

impl VirtualGraph {
    pub fn new(clock: Clock, sample_rate: f32) -> Self {
        Self {
            clock,
            sample_rate,
            destination: DeviceId(0),
            state: RefCell::new(GraphState {
                devices: BTreeMap::from([(DeviceId(0), Device::new(DeviceKind::Destination))]),
                next_id: 1,
                connections: Vec::new(),
            }),
        }
    }

    /// Devices currently alive, the destination included
    pub fn device_count(&self) -> usize {
        self.state.borrow().devices.len()
    }

    pub fn kind(&self, device: DeviceId) -> Option<DeviceKind> {
        self.state.borrow().devices.get(&device).map(|d| d.kind)
    }

    pub fn is_connected(&self, from: DeviceId, to: Port) -> bool {
        self.state.borrow().connections.contains(&(from, to))
    }

    /// Every port the device output currently feeds
    pub fn outputs_of(&self, device: DeviceId) -> Vec<Port> {
        self.state
            .borrow()
            .connections
            .iter()
            .filter(|(from, _)| *from == device)
            .map(|(_, to)| *to)
            .collect()
    }

    /// Every device feeding the given port
    pub fn inputs_of(&self, port: Port) -> Vec<DeviceId> {
        self.state
            .borrow()
            .connections
            .iter()
            .filter(|(_, to)| *to == port)
            .map(|(from, _)| *from)
            .collect()
    }

    pub fn connection_count(&self) -> usize {
        self.state.borrow().connections.len()
    }

    pub fn started_at(&self, device: DeviceId) -> Option<f64> {
        self.state.borrow().devices.get(&device).and_then(|d| d.started)
    }

    pub fn stopped_at(&self, device: DeviceId) -> Option<f64> {
        self.state.borrow().devices.get(&device).and_then(|d| d.stopped)
    }

    /// Oscillators started and not yet stopped at `time`
    pub fn running_oscillators(&self, time: f64) -> usize {
        self.state
            .borrow()
            .devices
            .values()
            .filter(|d| d.kind == DeviceKind::Oscillator)
            .filter(|d| d.started.is_some_and(|t| t <= time))
            .filter(|d| d.stopped.is_none_or(|t| t > time))
            .count()
    }

    pub fn waveform(&self, device: DeviceId) -> Option<Waveform> {
        self.state.borrow().devices.get(&device).map(|d| d.waveform)
    }

    pub fn filter_type(&self, device: DeviceId) -> Option<FilterType> {
        self.state.borrow().devices.get(&device).map(|d| d.filter_type)
    }

    pub fn buffer_len(&self, device: DeviceId) -> Option<usize> {
        self.state.borrow().devices.get(&device).and_then(|d| d.buffer_len)
    }

    fn check_port(state: &GraphState, port: Port) -> Result<(), GraphError> {
        match port {
            Port::Input(device) => state
                .devices
                .get(&device)
                .map(|_| ())
                .ok_or(GraphError::UnknownDevice(device)),
            Port::Param(param) => {
                let device = state
                    .devices
                    .get(&param.device)
                    .ok_or(GraphError::UnknownDevice(param.device))?;
                if device.params.contains_key(&param.name) {
                    Ok(())
                } else {
                    Err(GraphError::UnknownParam {
                        device: param.device,
                        name: param.name,
                    })
                }
            }
        }
    }

    fn with_timeline(&self, param: ParamRef, f: impl FnOnce(&mut Timeline)) {
        let mut state = self.state.borrow_mut();
        match state
            .devices
            .get_mut(&param.device)
            .and_then(|d| d.params.get_mut(&param.name))
        {
            Some(timeline) => f(timeline),
            None => log::debug!("automation on missing parameter {:?}", param),
        }
    }

    fn with_device(&self, device: DeviceId, f: impl FnOnce(&mut Device)) {
        let mut state = self.state.borrow_mut();
        match state.devices.get_mut(&device) {
            Some(d) => f(d),
            None => log::debug!("operation on missing device {:?}", device),
        }
    }
}

impl AudioGraph for VirtualGraph {
    fn current_time(&self) -> f64 {
        self.clock.seconds()
    }

    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn destination(&self) -> DeviceId {
        self.destination
    }

    fn create(&self, kind: DeviceKind) -> DeviceId {
        let mut state = self.state.borrow_mut();
        let id = DeviceId(state.next_id);
        state.next_id += 1;
        state.devices.insert(id, Device::new(kind));
        id
    }

    fn release(&self, device: DeviceId) {
        if device == self.destination {
            log::debug!("the destination device is never released");
            return;
        }

        let mut state = self.state.borrow_mut();
        if state.devices.remove(&device).is_none() {
            log::debug!("release of missing device {:?}", device);
            return;
        }
        state.connections.retain(|(from, to)| {
            let target = match to {
                Port::Input(d) => *d,
                Port::Param(param) => param.device,
            };
            *from != device && target != device
        });
    }

    fn connect(&self, from: DeviceId, to: Port) -> Result<(), GraphError> {
        let mut state = self.state.borrow_mut();
        Self::check_port(&state, Port::Input(from))?;
        Self::check_port(&state, to)?;

        if !state.connections.contains(&(from, to)) {
            state.connections.push((from, to));
        }
        Ok(())
    }

    fn disconnect(&self, from: DeviceId, to: Port) -> Result<(), GraphError> {
        let mut state = self.state.borrow_mut();
        let before = state.connections.len();
        state.connections.retain(|c| *c != (from, to));

        if state.connections.len() == before {
            Err(GraphError::NotConnected { from, to })
        } else {
            Ok(())
        }
    }

    fn set_value_at(&self, param: ParamRef, value: f32, time: f64) {
        self.with_timeline(param, |t| t.insert(AutomationEvent::Set { time, value }));
    }

    fn linear_ramp_to(&self, param: ParamRef, value: f32, end_time: f64) {
        self.with_timeline(param, |t| {
            t.insert(AutomationEvent::Ramp {
                end: end_time,
                value,
            })
        });
    }

    fn cancel_scheduled(&self, param: ParamRef, from_time: f64) {
        self.with_timeline(param, |t| t.cancel_from(from_time));
    }

    fn value_at(&self, param: ParamRef, time: f64) -> f32 {
        self.state
            .borrow()
            .devices
            .get(&param.device)
            .and_then(|d| d.params.get(&param.name))
            .map(|t| t.value_at(time))
            .unwrap_or(0.0)
    }

    fn start(&self, device: DeviceId, time: f64) {
        self.with_device(device, |d| d.started = Some(time));
    }

    fn stop(&self, device: DeviceId, time: f64) {
        self.with_device(device, |d| {
            if d.stopped.is_none() {
                d.stopped = Some(time);
            }
        });
    }

    fn set_waveform(&self, device: DeviceId, waveform: Waveform) {
        self.with_device(device, |d| d.waveform = waveform);
    }

    fn set_filter_type(&self, device: DeviceId, filter: FilterType) {
        self.with_device(device, |d| d.filter_type = filter);
    }

    fn set_buffer(&self, device: DeviceId, bytes: Vec<u8>) {
        self.with_device(device, |d| d.buffer_len = Some(bytes.len()));
    }
}
