// Voice engine - voice lifecycles per note under a playback mode
//
// Note-on allocates (or, in legato, re-targets) a voice; note-off starts its
// release and schedules teardown once the release tail has elapsed. All
// deferred work goes through the shared scheduler and is guarded by an
// existence check, so a timer outliving its voice does nothing.

use super::notes;
use super::poly_mode::PolyMode;
use super::portamento::HeldNotes;
use super::settings::Es1Settings;
use super::voice::{Voice, VoiceId, VoiceState};
use crate::audio::{DeviceId, Scheduler, SharedGraph};
use crate::messaging::Command;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::{Rc, Weak};
use std::time::Duration;

/// Output fade applied to sounding voices when a mono note retriggers
pub const MONO_FADE: Duration = Duration::from_millis(30);

pub struct VoiceEngine {
    graph: SharedGraph,
    scheduler: Rc<Scheduler>,
    /// Bus every voice is mixed into
    output: DeviceId,
    settings: Es1Settings,
    voices: BTreeMap<VoiceId, Voice>,
    /// Canonical note-off target per note
    tracked: HashMap<u8, VoiceId>,
    held: HeldNotes,
    legato_voice: Option<VoiceId>,
    next_id: u64,
    self_ref: Weak<RefCell<VoiceEngine>>,
}

impl VoiceEngine {
    pub fn new(
        graph: SharedGraph,
        scheduler: Rc<Scheduler>,
        output: DeviceId,
        settings: Es1Settings,
    ) -> Rc<RefCell<Self>> {
        Rc::new_cyclic(|self_ref| {
            RefCell::new(Self {
                graph,
                scheduler,
                output,
                settings: settings.clamped(),
                voices: BTreeMap::new(),
                tracked: HashMap::new(),
                held: HeldNotes::new(),
                legato_voice: None,
                next_id: 0,
                self_ref: self_ref.clone(),
            })
        })
    }

    pub fn handle(&mut self, command: &Command) {
        if command.is_note_on() {
            self.note_on(command.note, command.velocity);
        } else {
            self.note_off(command.note);
        }
    }

    pub fn note_on(&mut self, note: u8, velocity: u8) {
        let Some(frequency) = notes::frequency(note) else {
            log::warn!("Note {} is outside the note table, ignored", note);
            return;
        };

        let mode = self.settings.mode;
        if !mode.should_retrigger_envelope() {
            self.legato_note_on(note, velocity, frequency);
            return;
        }

        // Poly: a second note-on for a sounding note overlaps it and the
        // earlier voice is no longer the note-off target
        if !mode.is_polyphonic() {
            self.fade_sounding_voices();
        }
        self.spawn(note, velocity, frequency);
    }

    fn legato_note_on(&mut self, note: u8, velocity: u8, frequency: f32) {
        self.held.push(note);
        match self.legato_target() {
            Some(id) => {
                let glide = self.settings.glide;
                if let Some(voice) = self.voices.get_mut(&id) {
                    voice.glide_to(self.graph.as_ref(), note, frequency, glide);
                }
            }
            None => {
                self.legato_voice = self.spawn(note, velocity, frequency);
            }
        }
    }

    pub fn note_off(&mut self, note: u8) {
        if self.settings.mode == PolyMode::Legato && self.held.contains(note) {
            self.legato_note_off(note);
            return;
        }

        let Some(id) = self.tracked.remove(&note) else {
            return;
        };
        if self.voices.get(&id).is_some_and(Voice::is_active) {
            self.release(id);
        }
    }

    fn legato_note_off(&mut self, note: u8) {
        let previous_top = self.held.top();
        self.held.remove(note);

        let Some(id) = self.legato_voice.filter(|id| self.voices.contains_key(id)) else {
            return;
        };

        match self.held.top() {
            Some(next) if Some(next) != previous_top => {
                if let Some(frequency) = notes::frequency(next) {
                    let glide = self.settings.glide;
                    if let Some(voice) = self.voices.get_mut(&id) {
                        voice.glide_to(self.graph.as_ref(), next, frequency, glide);
                    }
                }
            }
            Some(_) => {}
            None => {
                self.legato_voice = None;
                self.tracked.retain(|_, tracked| *tracked != id);
                self.release(id);
            }
        }
    }

    /// Active voice the legato glide should move, adopting one left over
    /// from another mode if needed
    fn legato_target(&mut self) -> Option<VoiceId> {
        let current = self
            .legato_voice
            .filter(|id| self.voices.get(id).is_some_and(Voice::is_active));
        if current.is_some() {
            return current;
        }

        let adopted = self
            .voices
            .iter()
            .rev()
            .find(|(_, voice)| voice.is_active())
            .map(|(id, _)| *id);
        self.legato_voice = adopted;
        adopted
    }

    fn spawn(&mut self, note: u8, velocity: u8, frequency: f32) -> Option<VoiceId> {
        let id = VoiceId(self.next_id);
        self.next_id += 1;

        match Voice::allocate(
            self.graph.as_ref(),
            id,
            note,
            velocity,
            frequency,
            &self.settings,
            self.output,
        ) {
            Ok(voice) => {
                log::debug!("Voice {:?} started for note {}", id, note);
                self.voices.insert(id, voice);
                self.tracked.insert(note, id);
                Some(id)
            }
            Err(e) => {
                log::warn!("Could not allocate voice for note {}: {}", note, e);
                None
            }
        }
    }

    /// Mono retrigger: silence every voice still audible, releasing ones
    /// included. Their release timers become stale.
    fn fade_sounding_voices(&mut self) {
        let fading: Vec<VoiceId> = self
            .voices
            .iter()
            .filter(|(_, voice)| !voice.is_faded())
            .map(|(id, _)| *id)
            .collect();

        for id in fading {
            if let Some(voice) = self.voices.get_mut(&id) {
                voice.fade_out(self.graph.as_ref(), MONO_FADE.as_secs_f64());
            }
            self.tracked.retain(|_, tracked| *tracked != id);
            self.schedule_teardown(id, MONO_FADE);
        }
    }

    fn release(&mut self, id: VoiceId) {
        let release = self.settings.release;
        if let Some(voice) = self.voices.get_mut(&id) {
            voice.release(self.graph.as_ref(), release);
        }
        self.schedule_teardown(id, Duration::from_secs_f32(release));
    }

    fn schedule_teardown(&self, id: VoiceId, delay: Duration) {
        let engine = self.self_ref.clone();
        self.scheduler.schedule_after(delay, move || {
            if let Some(engine) = engine.upgrade() {
                engine.borrow_mut().finish(id);
            }
        });
    }

    /// Release tail elapsed: stop and unwire the voice if it still exists
    fn finish(&mut self, id: VoiceId) {
        let Some(voice) = self.voices.remove(&id) else {
            log::debug!("Stale teardown for voice {:?}", id);
            return;
        };

        voice.silence(self.graph.as_ref());
        self.tracked.retain(|_, tracked| *tracked != id);
        if self.legato_voice == Some(id) {
            self.legato_voice = None;
        }
        log::debug!("Voice {:?} finished", id);
    }

    /// Replace the settings, rescaling sounding voices for volume and detune
    pub fn apply_settings(&mut self, settings: Es1Settings) {
        let settings = settings.clamped();
        let graph = self.graph.as_ref();

        if settings.volume != self.settings.volume {
            for voice in self.voices.values().filter(|v| v.is_active()) {
                voice.apply_volume(graph, settings.volume);
            }
        }
        if settings.detune != self.settings.detune {
            for voice in self.voices.values().filter(|v| v.is_active()) {
                voice.apply_detune(graph, settings.detune);
            }
        }
        if settings.mode != self.settings.mode {
            log::debug!("Voice mode {:?} -> {:?}", self.settings.mode, settings.mode);
            self.held.clear();
            self.legato_voice = None;
        }

        self.settings = settings;
    }

    /// Release every sounding voice, tracked or not
    pub fn all_notes_off(&mut self) {
        let sounding: Vec<VoiceId> = self
            .voices
            .iter()
            .filter(|(_, voice)| voice.is_active())
            .map(|(id, _)| *id)
            .collect();

        for id in sounding {
            self.release(id);
        }
        self.tracked.clear();
        self.held.clear();
        self.legato_voice = None;
    }

    /// Silence everything immediately; pending teardown timers become no-ops
    pub fn teardown(&mut self) {
        for voice in std::mem::take(&mut self.voices).into_values() {
            voice.silence(self.graph.as_ref());
        }
        self.tracked.clear();
        self.held.clear();
        self.legato_voice = None;
    }

    pub fn settings(&self) -> &Es1Settings {
        &self.settings
    }

    pub fn output(&self) -> DeviceId {
        self.output
    }

    /// Every voice still holding devices, including release tails
    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    pub fn active_voice_count(&self) -> usize {
        self.voices.values().filter(|v| v.is_active()).count()
    }

    pub fn voices(&self) -> impl Iterator<Item = &Voice> {
        self.voices.values()
    }

    /// Non-releasing voices currently sounding `note`
    pub fn voices_for(&self, note: u8) -> usize {
        self.voices
            .values()
            .filter(|v| v.is_active() && v.note() == note)
            .count()
    }

    pub fn tracked_voice(&self, note: u8) -> Option<&Voice> {
        self.tracked.get(&note).and_then(|id| self.voices.get(id))
    }

    pub fn voice_state(&self, note: u8) -> VoiceState {
        self.tracked_voice(note)
            .map(|v| v.state(self.graph.current_time()))
            .unwrap_or(VoiceState::Idle)
    }

    pub fn held_notes(&self) -> &[u8] {
        self.held.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioGraph, Clock, ParamName, ParamRef, VirtualGraph};

    struct Rig {
        scheduler: Rc<Scheduler>,
        graph: Rc<VirtualGraph>,
        engine: Rc<RefCell<VoiceEngine>>,
    }

    fn rig(settings: Es1Settings) -> Rig {
        let clock = Clock::new();
        let scheduler = Rc::new(Scheduler::new(clock.clone()));
        let graph = Rc::new(VirtualGraph::new(clock, 48000.0));
        let bus = graph.destination();
        let engine = VoiceEngine::new(graph.clone(), scheduler.clone(), bus, settings);
        Rig {
            scheduler,
            graph,
            engine,
        }
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_note_on_off_lifecycle() {
        let rig = rig(Es1Settings::default());

        rig.engine.borrow_mut().note_on(48, 127);
        assert_eq!(rig.engine.borrow().voice_state(48), VoiceState::Attacking);

        rig.scheduler.advance_by(ms(300));
        assert_eq!(rig.engine.borrow().voice_state(48), VoiceState::Sustaining);

        rig.engine.borrow_mut().note_off(48);
        assert_eq!(rig.engine.borrow().voice_count(), 1);
        assert_eq!(rig.engine.borrow().voice_state(48), VoiceState::Idle);

        rig.scheduler.advance_by(ms(200));
        assert_eq!(rig.engine.borrow().voice_count(), 0);
        assert_eq!(rig.graph.running_oscillators(rig.graph.current_time()), 0);
    }

    #[test]
    fn test_note_off_for_silent_note_is_noop() {
        let rig = rig(Es1Settings::default());
        rig.engine.borrow_mut().note_off(60);
        assert_eq!(rig.scheduler.pending(), 0);
    }

    #[test]
    fn test_poly_duplicate_note_on_overlaps() {
        let rig = rig(Es1Settings::default());

        rig.engine.borrow_mut().note_on(48, 100);
        rig.engine.borrow_mut().note_on(48, 100);
        assert_eq!(rig.engine.borrow().voices_for(48), 2);

        // Note-off releases the most recent voice only
        rig.engine.borrow_mut().note_off(48);
        rig.scheduler.advance_by(ms(500));
        assert_eq!(rig.engine.borrow().voices_for(48), 1);

        rig.engine.borrow_mut().all_notes_off();
        rig.scheduler.advance_by(ms(500));
        assert_eq!(rig.engine.borrow().voice_count(), 0);
    }

    #[test]
    fn test_velocity_scales_output_gain() {
        let rig = rig(Es1Settings {
            volume: 1.0,
            ..Default::default()
        });
        rig.engine.borrow_mut().note_on(48, 127);
        rig.engine.borrow_mut().handle(&Command::note_on(50, 0, "kbd"));

        let engine = rig.engine.borrow();
        let voice = engine.tracked_voice(48).unwrap();
        assert_eq!(rig.graph.value_at(voice.output_gain(), 0.0), 1.0);
        assert_eq!(engine.voice_count(), 1);
    }

    #[test]
    fn test_mono_fades_previous_voice() {
        let rig = rig(Es1Settings {
            mode: PolyMode::Mono,
            ..Default::default()
        });

        rig.engine.borrow_mut().note_on(48, 127);
        rig.scheduler.advance_by(ms(100));
        rig.engine.borrow_mut().note_on(50, 127);
        assert_eq!(rig.engine.borrow().active_voice_count(), 1);
        assert_eq!(rig.engine.borrow().voice_count(), 2);

        rig.scheduler.advance_by(MONO_FADE);
        assert_eq!(rig.engine.borrow().voice_count(), 1);
        assert_eq!(rig.engine.borrow().tracked_voice(50).map(Voice::note), Some(50));

        // The old note no longer has a voice to release
        rig.engine.borrow_mut().note_off(48);
        assert_eq!(rig.engine.borrow().active_voice_count(), 1);
    }

    #[test]
    fn test_legato_glides_without_new_oscillators() {
        let rig = rig(Es1Settings {
            mode: PolyMode::Legato,
            glide: 0.1,
            ..Default::default()
        });

        rig.engine.borrow_mut().note_on(48, 127);
        let devices = rig.graph.device_count();
        rig.scheduler.advance_by(ms(50));
        rig.engine.borrow_mut().note_on(52, 127);

        assert_eq!(rig.graph.device_count(), devices);
        assert_eq!(rig.engine.borrow().held_notes(), &[48, 52]);

        let osc = rig.engine.borrow().voices().next().unwrap().oscillators()[0];
        let frequency = ParamRef::new(osc, ParamName::Frequency);
        let target = notes::frequency(52).unwrap();
        assert!((rig.graph.value_at(frequency, 0.15) - target).abs() < 1e-3);

        // Releasing the top note glides back, the voice keeps sounding
        rig.scheduler.advance_by(ms(200));
        rig.engine.borrow_mut().note_off(52);
        let back = notes::frequency(48).unwrap();
        assert!((rig.graph.value_at(frequency, 0.35) - back).abs() < 1e-3);
        assert_eq!(rig.engine.borrow().active_voice_count(), 1);

        rig.engine.borrow_mut().note_off(48);
        assert_eq!(rig.engine.borrow().active_voice_count(), 0);
    }

    #[test]
    fn test_volume_hot_apply_rescales_active_voices() {
        let rig = rig(Es1Settings::default());
        rig.engine.borrow_mut().note_on(48, 127);
        rig.scheduler.advance_by(ms(10));

        let update = Es1Settings {
            volume: 0.8,
            detune: 0.5,
            voices: 1,
            ..Default::default()
        };
        rig.engine.borrow_mut().apply_settings(update);

        let engine = rig.engine.borrow();
        let voice = engine.tracked_voice(48).unwrap();
        let now = rig.graph.current_time();
        assert!((rig.graph.value_at(voice.output_gain(), now) - 0.8).abs() < 1e-6);
        let detune = ParamRef::new(voice.oscillators()[0], ParamName::Detune);
        assert!((rig.graph.value_at(detune, now) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_stale_teardown_after_engine_teardown() {
        let rig = rig(Es1Settings::default());
        rig.engine.borrow_mut().note_on(48, 127);
        rig.engine.borrow_mut().note_off(48);
        rig.engine.borrow_mut().teardown();

        assert_eq!(rig.scheduler.advance_by(ms(500)), 1);
        assert_eq!(rig.engine.borrow().voice_count(), 0);
    }
}
