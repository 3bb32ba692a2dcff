// MIDI input - connects every available port and queues note commands
//
// midir calls back on its own thread. Each port pushes into its own ring
// buffer; the control loop drains them onto the command bus.

use crate::messaging::channels::{self, CommandConsumer, CommandProducer};
use crate::messaging::CommandBus;
use crate::midi::event;
use midir::{MidiInput as MidirInput, MidiInputConnection};
use ringbuf::traits::Producer;
use thiserror::Error;

const CLIENT_NAME: &str = "synthchain";

#[derive(Debug, Error)]
pub enum MidiError {
    #[error("MIDI backend unavailable: {0}")]
    Init(#[from] midir::InitError),

    #[error("no MIDI input ports")]
    NoPorts,

    #[error("MIDI port '{0}' disappeared")]
    PortGone(String),

    #[error("failed to connect to MIDI port '{port}': {reason}")]
    Connect { port: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiStatus {
    /// Listening on these ports
    Connected(Vec<String>),
    /// No usable MIDI, with the reason shown to the user
    Unsupported(String),
    /// Turned off by configuration
    Disabled,
}

impl MidiStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, MidiStatus::Connected(_))
    }
}

struct MidiPort {
    name: String,
    _connection: MidiInputConnection<()>,
    consumer: CommandConsumer,
}

pub struct MidiListener {
    ports: Vec<MidiPort>,
    status: MidiStatus,
}

impl MidiListener {
    /// Connect to every input port. Failure is reported through `status`,
    /// never as an error: the session keeps running without MIDI.
    pub fn open(capacity: usize) -> Self {
        match connect_all(capacity) {
            Ok(ports) => {
                let names: Vec<String> = ports.iter().map(|p| p.name.clone()).collect();
                log::info!("MIDI connected: {}", names.join(", "));
                Self {
                    ports,
                    status: MidiStatus::Connected(names),
                }
            }
            Err(e) => {
                log::warn!("MIDI unsupported: {}", e);
                Self {
                    ports: Vec::new(),
                    status: MidiStatus::Unsupported(e.to_string()),
                }
            }
        }
    }

    pub fn disabled() -> Self {
        log::info!("MIDI disabled");
        Self {
            ports: Vec::new(),
            status: MidiStatus::Disabled,
        }
    }

    pub fn status(&self) -> &MidiStatus {
        &self.status
    }

    /// Forward queued commands from every port onto the bus
    pub fn drain_into(&mut self, bus: &CommandBus) -> usize {
        self.ports
            .iter_mut()
            .map(|port| channels::drain_into(&mut port.consumer, bus))
            .sum()
    }
}

fn connect_all(capacity: usize) -> Result<Vec<MidiPort>, MidiError> {
    let scanner = MidirInput::new(CLIENT_NAME)?;
    let names: Vec<String> = scanner
        .ports()
        .iter()
        .filter_map(|port| scanner.port_name(port).ok())
        .collect();

    if names.is_empty() {
        return Err(MidiError::NoPorts);
    }

    let mut ports = Vec::with_capacity(names.len());
    for name in names {
        match connect_port(&name, capacity) {
            Ok(port) => ports.push(port),
            Err(e) => log::warn!("{}", e),
        }
    }

    if ports.is_empty() {
        return Err(MidiError::NoPorts);
    }
    Ok(ports)
}

fn connect_port(name: &str, capacity: usize) -> Result<MidiPort, MidiError> {
    // connect() consumes the client, so each port gets its own
    let midi_in = MidirInput::new(CLIENT_NAME)?;
    let port = midi_in
        .ports()
        .into_iter()
        .find(|p| midi_in.port_name(p).map(|n| n == name).unwrap_or(false))
        .ok_or_else(|| MidiError::PortGone(name.to_string()))?;

    let (mut producer, consumer) = channels::create_command_channel(capacity);
    let origin = name.to_string();

    let connection = midi_in
        .connect(
            &port,
            "synthchain-input",
            move |_timestamp, message, _| {
                forward(message, &origin, &mut producer);
            },
            (),
        )
        .map_err(|e| MidiError::Connect {
            port: name.to_string(),
            reason: e.to_string(),
        })?;

    Ok(MidiPort {
        name: name.to_string(),
        _connection: connection,
        consumer,
    })
}

/// MIDI thread side: parse and enqueue without blocking
fn forward(message: &[u8], origin: &str, producer: &mut CommandProducer) -> bool {
    let Some(command) = event::parse(message, origin) else {
        return false;
    };
    if producer.try_push(command).is_err() {
        // Full buffer - drop the event
        log::warn!("MIDI buffer full, event from {} dropped", origin);
        return false;
    }
    true
}
