// Track recorder - captures timestamped commands and replays them
//
// Recording and playback are mutually exclusive: starting one stops the
// other first. Playback is a set of independent timers, one per event, plus
// a completion timer at the last event's offset.

use crate::audio::{Scheduler, TimerHandle};
use crate::messaging::{Broadcast, Command, CommandBus, Subscription};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedEvent {
    pub command: Command,
    /// Milliseconds since the recording started
    pub offset_millis: u64,
}

/// Events in arrival order, so offsets never decrease
pub type Recording = Vec<RecordedEvent>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
    Playing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderEvent {
    RecordingStarted,
    RecordingStopped { events: usize },
    PlaybackStarted { events: usize },
    /// Every event was re-emitted
    PlaybackFinished,
    /// Playback was stopped before the end
    PlaybackStopped,
}

enum Mode {
    Idle,
    Recording {
        subscription: Subscription,
        buffer: Rc<RefCell<Recording>>,
    },
    Playing {
        timers: Vec<TimerHandle>,
    },
}

struct Inner {
    mode: Mode,
    recording: Recording,
}

pub struct TrackRecorder {
    bus: Rc<CommandBus>,
    scheduler: Rc<Scheduler>,
    inner: Rc<RefCell<Inner>>,
    events: Rc<Broadcast<RecorderEvent>>,
}

impl TrackRecorder {
    pub fn new(bus: Rc<CommandBus>, scheduler: Rc<Scheduler>) -> Self {
        Self {
            bus,
            scheduler,
            inner: Rc::new(RefCell::new(Inner {
                mode: Mode::Idle,
                recording: Recording::new(),
            })),
            events: Rc::new(Broadcast::new()),
        }
    }

    pub fn state(&self) -> RecorderState {
        match self.inner.borrow().mode {
            Mode::Idle => RecorderState::Idle,
            Mode::Recording { .. } => RecorderState::Recording,
            Mode::Playing { .. } => RecorderState::Playing,
        }
    }

    /// The retained recording
    pub fn recording(&self) -> Recording {
        self.inner.borrow().recording.clone()
    }

    /// Recorder state notifications
    pub fn events(&self) -> &Rc<Broadcast<RecorderEvent>> {
        &self.events
    }

    /// Start capturing every command on the bus. The previous recording is
    /// discarded; a running playback is stopped first.
    pub fn record(&self) {
        self.stop();

        let buffer = Rc::new(RefCell::new(Recording::new()));
        let started = self.scheduler.now();
        let subscription = {
            let buffer = buffer.clone();
            let clock = self.scheduler.clock().clone();
            self.bus.subscribe(move |command: &Command| {
                let offset = clock.now().saturating_sub(started);
                buffer.borrow_mut().push(RecordedEvent {
                    command: command.clone(),
                    offset_millis: offset.as_millis() as u64,
                });
            })
        };

        {
            let mut inner = self.inner.borrow_mut();
            inner.recording.clear();
            inner.mode = Mode::Recording {
                subscription,
                buffer,
            };
        }
        log::info!("Recording started");
        self.events.emit(RecorderEvent::RecordingStarted);
    }

    /// Stop recording or playback. Pending playback timers are cancelled;
    /// skipped events are not emitted.
    pub fn stop(&self) {
        let mode = std::mem::replace(&mut self.inner.borrow_mut().mode, Mode::Idle);

        match mode {
            Mode::Idle => {}
            Mode::Recording {
                subscription,
                buffer,
            } => {
                self.bus.unsubscribe(subscription);
                let recorded = std::mem::take(&mut *buffer.borrow_mut());
                let events = recorded.len();
                self.inner.borrow_mut().recording = recorded;

                log::info!("Recording stopped, {} events", events);
                self.events.emit(RecorderEvent::RecordingStopped { events });
            }
            Mode::Playing { timers } => {
                let cancelled = timers
                    .into_iter()
                    .filter(|timer| self.scheduler.cancel(*timer))
                    .count();

                log::info!("Playback stopped, {} timers cancelled", cancelled);
                self.events.emit(RecorderEvent::PlaybackStopped);
            }
        }
    }

    /// Replay the retained recording. Returns false if it is empty.
    pub fn play(&self) -> bool {
        self.stop();
        let recording = self.recording();
        self.start_playback(recording)
    }

    /// Replay `recording` without retaining it
    pub fn play_recording(&self, recording: Recording) -> bool {
        self.stop();
        self.start_playback(recording)
    }

    fn start_playback(&self, recording: Recording) -> bool {
        let Some(end) = recording.last().map(|e| e.offset_millis) else {
            log::info!("Nothing to play");
            return false;
        };
        let events = recording.len();

        let mut timers: Vec<TimerHandle> = recording
            .into_iter()
            .map(|event| {
                let bus = self.bus.clone();
                self.scheduler
                    .schedule_after(Duration::from_millis(event.offset_millis), move || {
                        bus.emit(event.command)
                    })
            })
            .collect();

        // Same deadline as the last event, scheduled after it
        let inner: Weak<RefCell<Inner>> = Rc::downgrade(&self.inner);
        let notifications = self.events.clone();
        timers.push(
            self.scheduler
                .schedule_after(Duration::from_millis(end), move || {
                    if let Some(inner) = inner.upgrade() {
                        inner.borrow_mut().mode = Mode::Idle;
                    }
                    log::info!("Playback finished");
                    notifications.emit(RecorderEvent::PlaybackFinished);
                }),
        );

        self.inner.borrow_mut().mode = Mode::Playing { timers };
        log::info!("Playback started, {} events", events);
        self.events.emit(RecorderEvent::PlaybackStarted { events });
        true
    }
}

impl Drop for TrackRecorder {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::Clock;

    struct Rig {
        scheduler: Rc<Scheduler>,
        bus: Rc<CommandBus>,
        recorder: TrackRecorder,
        heard: Rc<RefCell<Vec<(u64, Command)>>>,
    }

    fn rig() -> Rig {
        let scheduler = Rc::new(Scheduler::new(Clock::new()));
        let bus = Rc::new(CommandBus::new());
        let recorder = TrackRecorder::new(bus.clone(), scheduler.clone());
        let heard = Rc::new(RefCell::new(Vec::new()));
        {
            let heard = heard.clone();
            let clock = scheduler.clock().clone();
            bus.subscribe(move |c: &Command| {
                heard
                    .borrow_mut()
                    .push((clock.now().as_millis() as u64, c.clone()))
            });
        }
        Rig {
            scheduler,
            bus,
            recorder,
            heard,
        }
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_records_offsets_from_start() {
        let rig = rig();
        rig.scheduler.advance_by(ms(1000));

        rig.recorder.record();
        rig.bus.emit(Command::note_on(48, 90, "kbd"));
        rig.scheduler.advance_by(ms(250));
        rig.bus.emit(Command::note_off(48, "kbd"));
        rig.recorder.stop();

        let offsets: Vec<u64> = rig.recorder.recording().iter().map(|e| e.offset_millis).collect();
        assert_eq!(offsets, vec![0, 250]);
        assert_eq!(rig.recorder.state(), RecorderState::Idle);

        // Not listening any more
        rig.bus.emit(Command::note_on(50, 90, "kbd"));
        assert_eq!(rig.recorder.recording().len(), 2);
    }

    #[test]
    fn test_new_recording_overwrites() {
        let rig = rig();
        rig.recorder.record();
        rig.bus.emit(Command::note_on(48, 90, "kbd"));
        rig.recorder.stop();

        rig.recorder.record();
        rig.recorder.stop();
        assert!(rig.recorder.recording().is_empty());
        assert!(!rig.recorder.play());
    }

    #[test]
    fn test_stop_during_playback_cancels_pending() {
        let rig = rig();
        rig.recorder.play_recording(vec![
            RecordedEvent {
                command: Command::note_on(48, 90, "kbd"),
                offset_millis: 0,
            },
            RecordedEvent {
                command: Command::note_off(48, "kbd"),
                offset_millis: 400,
            },
        ]);
        assert_eq!(rig.recorder.state(), RecorderState::Playing);

        rig.scheduler.advance_by(ms(100));
        rig.recorder.stop();
        rig.scheduler.advance_by(ms(1000));

        assert_eq!(rig.heard.borrow().len(), 1);
        assert_eq!(rig.scheduler.pending(), 0);
        assert_eq!(rig.recorder.state(), RecorderState::Idle);
    }

    #[test]
    fn test_record_while_playing_stops_playback() {
        let rig = rig();
        rig.recorder.play_recording(vec![RecordedEvent {
            command: Command::note_on(48, 90, "kbd"),
            offset_millis: 300,
        }]);

        rig.recorder.record();
        assert_eq!(rig.recorder.state(), RecorderState::Recording);
        rig.scheduler.advance_by(ms(500));

        rig.recorder.stop();
        assert!(rig.heard.borrow().is_empty());
        assert!(rig.recorder.recording().is_empty());
    }

    #[test]
    fn test_event_names() {
        let event = RecordedEvent {
            command: Command::note_on(60, 127, "kbd"),
            offset_millis: 500,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["offsetMillis"], 500);
        assert_eq!(value["command"]["origin"], "kbd");
    }
}
