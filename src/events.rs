//! Timed playback events and the sink abstraction the generator writes to.
//!
//! The generator never encodes bytes itself; it calls an [`EventSink`].
//! [`EventCollector`] is the in-memory sink used by the JSON entry point and
//! tests: it expands notes into on/off pairs and keeps the stream in the
//! canonical order.

use serde::Serialize;

use crate::model::Tick;

/// Ticks of a metronome click.
pub const METRONOME_CLICK_TICKS: Tick = 60;

/// Payload of a [`TimedEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum EventKind {
    NoteOn { key: u8, velocity: u8 },
    /// `overlap` marks a release that must follow a simultaneous attack
    /// (legato and sustained transitions).
    NoteOff { key: u8, overlap: bool },
    ControlChange { controller: u8, value: u8 },
    ProgramChange { program: u8 },
    TempoChange { bpm: f64 },
    /// 14-bit pitch wheel; `key` is set for per-note bends.
    PitchBend { key: Option<u8>, value: u16 },
    TimeSignature { numerator: u8, denominator: u8 },
    Meta(MetaEvent),
}

/// Non-sounding markers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum MetaEvent {
    /// A rest beat, kept so consumers see every beat of every track
    Rest,
    /// Click on beat `counter` of the bar
    Metronome { counter: u8, length: Tick },
    EndOfTrack,
}

/// One event at an absolute tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimedEvent {
    /// Track index; song-wide events (tempo, time signature, metronome) use 0
    pub track: usize,
    pub tick: Tick,
    pub channel: u8,
    pub kind: EventKind,
}

impl TimedEvent {
    /// Position among events at the same tick: structural events, then
    /// controllers, pitch wheel, releases, attacks; overlapping releases
    /// after attacks; end-of-track last.
    pub fn rank(&self) -> u8 {
        match self.kind {
            EventKind::TimeSignature { .. } | EventKind::TempoChange { .. } => 0,
            EventKind::Meta(MetaEvent::Metronome { .. }) | EventKind::Meta(MetaEvent::Rest) => 0,
            EventKind::ProgramChange { .. } => 1,
            EventKind::ControlChange { .. } => 2,
            EventKind::PitchBend { .. } => 3,
            EventKind::NoteOff { overlap: false, .. } => 4,
            EventKind::NoteOn { .. } => 5,
            EventKind::NoteOff { overlap: true, .. } => 6,
            EventKind::Meta(MetaEvent::EndOfTrack) => 7,
        }
    }
}

/// A note to be played, as handed to a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteEvent {
    pub track: usize,
    pub start: Tick,
    pub length: Tick,
    pub key: u8,
    pub velocity: u8,
    pub channel: u8,
    /// Release overlaps the next attack at the same tick
    pub legato: bool,
}

/// Receiver of generated playback events.
///
/// The generator calls a sink in non-decreasing tick order (a note counts at
/// its start).  Calls at the same tick follow [`TimedEvent::rank`], then
/// structural order.
pub trait EventSink {
    fn add_time_signature(&mut self, tick: Tick, numerator: u8, denominator: u8);
    fn add_tempo(&mut self, tick: Tick, bpm: f64);
    fn add_rest(&mut self, track: usize, tick: Tick, channel: u8);
    fn add_note(&mut self, note: &NoteEvent);
    fn add_control_change(&mut self, track: usize, tick: Tick, channel: u8, controller: u8, value: u8);
    fn add_program_change(&mut self, track: usize, tick: Tick, channel: u8, program: u8);
    /// Channel-wide pitch wheel.
    fn add_bend(&mut self, track: usize, tick: Tick, channel: u8, value: u16);
    /// Pitch wheel for a single sounding key.
    fn add_note_bend(&mut self, track: usize, tick: Tick, channel: u8, key: u8, value: u16);
    fn add_metronome(&mut self, _tick: Tick, _counter: u8, _length: Tick) {}
    fn finish_track(&mut self, track: usize, tick: Tick);
}

/// Sink that keeps every event in memory.
#[derive(Debug, Clone, Default)]
pub struct EventCollector {
    events: Vec<TimedEvent>,
    sorted: bool,
}

impl EventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, track: usize, tick: Tick, channel: u8, kind: EventKind) {
        self.events.push(TimedEvent {
            track,
            tick,
            channel,
            kind,
        });
        self.sorted = false;
    }

    /// Events in canonical order (tick, then [`TimedEvent::rank`], then
    /// arrival order).
    pub fn events(&mut self) -> &[TimedEvent] {
        if !self.sorted {
            self.events.sort_by_key(|e| (e.tick, e.rank()));
            self.sorted = true;
        }
        &self.events
    }

    pub fn into_events(mut self) -> Vec<TimedEvent> {
        self.events();
        self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.sorted = true;
    }
}

impl EventSink for EventCollector {
    fn add_time_signature(&mut self, tick: Tick, numerator: u8, denominator: u8) {
        self.push(
            0,
            tick,
            0,
            EventKind::TimeSignature {
                numerator,
                denominator,
            },
        );
    }

    fn add_tempo(&mut self, tick: Tick, bpm: f64) {
        self.push(0, tick, 0, EventKind::TempoChange { bpm });
    }

    fn add_rest(&mut self, track: usize, tick: Tick, channel: u8) {
        self.push(track, tick, channel, EventKind::Meta(MetaEvent::Rest));
    }

    fn add_note(&mut self, note: &NoteEvent) {
        self.push(
            note.track,
            note.start,
            note.channel,
            EventKind::NoteOn {
                key: note.key,
                velocity: note.velocity,
            },
        );
        self.push(
            note.track,
            note.start + note.length,
            note.channel,
            EventKind::NoteOff {
                key: note.key,
                overlap: note.legato,
            },
        );
    }

    fn add_control_change(&mut self, track: usize, tick: Tick, channel: u8, controller: u8, value: u8) {
        self.push(
            track,
            tick,
            channel,
            EventKind::ControlChange { controller, value },
        );
    }

    fn add_program_change(&mut self, track: usize, tick: Tick, channel: u8, program: u8) {
        self.push(track, tick, channel, EventKind::ProgramChange { program });
    }

    fn add_bend(&mut self, track: usize, tick: Tick, channel: u8, value: u16) {
        self.push(track, tick, channel, EventKind::PitchBend { key: None, value });
    }

    fn add_note_bend(&mut self, track: usize, tick: Tick, channel: u8, key: u8, value: u16) {
        self.push(
            track,
            tick,
            channel,
            EventKind::PitchBend {
                key: Some(key),
                value,
            },
        );
    }

    fn add_metronome(&mut self, tick: Tick, counter: u8, length: Tick) {
        self.push(
            0,
            tick,
            9,
            EventKind::Meta(MetaEvent::Metronome { counter, length }),
        );
    }

    fn finish_track(&mut self, track: usize, tick: Tick) {
        self.push(track, tick, 0, EventKind::Meta(MetaEvent::EndOfTrack));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_precedes_attack_at_same_tick() {
        let mut c = EventCollector::new();
        let note = |start, key, legato| NoteEvent {
            track: 0,
            start,
            length: 960,
            key,
            velocity: 95,
            channel: 0,
            legato,
        };
        c.add_note(&note(0, 60, false));
        c.add_note(&note(960, 62, false));
        c.add_tempo(960, 100.0);
        let kinds: Vec<u8> = c.events().iter().map(TimedEvent::rank).collect();
        // on(0), tempo(960), off(960), on(960), off(1920)
        assert_eq!(kinds, vec![5, 0, 4, 5, 4]);
    }

    #[test]
    fn legato_release_follows_attack() {
        let mut c = EventCollector::new();
        c.add_note(&NoteEvent {
            track: 0,
            start: 0,
            length: 480,
            key: 60,
            velocity: 95,
            channel: 0,
            legato: true,
        });
        c.add_note(&NoteEvent {
            track: 0,
            start: 480,
            length: 480,
            key: 62,
            velocity: 95,
            channel: 0,
            legato: false,
        });
        let events = c.into_events();
        assert_eq!(events[1].kind, EventKind::NoteOn { key: 62, velocity: 95 });
        assert_eq!(events[2].kind, EventKind::NoteOff { key: 60, overlap: true });
    }
}
