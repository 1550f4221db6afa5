//! Reorders generator output before it reaches the caller's sink.
//!
//! The generator walks a bar occurrence track by track, so a mid-bar tempo
//! change or a bend breakpoint is produced before notes of other tracks
//! that start earlier.  [`Schedule`] records every call and releases them in
//! (tick, rank, arrival) order.  Nothing generated for an occurrence lies
//! before its start tick, so everything earlier can be released once the
//! walk reaches the next occurrence.

use crate::events::{EventSink, NoteEvent};
use crate::model::Tick;

/// A recorded sink call.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Call {
    TimeSignature { numerator: u8, denominator: u8 },
    Tempo { bpm: f64 },
    Metronome { counter: u8, length: Tick },
    Rest { track: usize, channel: u8 },
    Program { track: usize, channel: u8, program: u8 },
    Control { track: usize, channel: u8, controller: u8, value: u8 },
    Bend { track: usize, channel: u8, value: u16 },
    NoteBend { track: usize, channel: u8, key: u8, value: u16 },
    Note(NoteEvent),
    EndOfTrack { track: usize },
}

impl Call {
    /// Position among calls at the same tick, matching
    /// [`TimedEvent::rank`](crate::events::TimedEvent::rank).
    fn rank(&self) -> u8 {
        match self {
            Call::TimeSignature { .. } | Call::Tempo { .. } => 0,
            Call::Metronome { .. } | Call::Rest { .. } => 0,
            Call::Program { .. } => 1,
            Call::Control { .. } => 2,
            Call::Bend { .. } | Call::NoteBend { .. } => 3,
            Call::Note(_) => 5,
            Call::EndOfTrack { .. } => 7,
        }
    }

    fn replay(self, tick: Tick, sink: &mut dyn EventSink) {
        match self {
            Call::TimeSignature {
                numerator,
                denominator,
            } => sink.add_time_signature(tick, numerator, denominator),
            Call::Tempo { bpm } => sink.add_tempo(tick, bpm),
            Call::Metronome { counter, length } => sink.add_metronome(tick, counter, length),
            Call::Rest { track, channel } => sink.add_rest(track, tick, channel),
            Call::Program {
                track,
                channel,
                program,
            } => sink.add_program_change(track, tick, channel, program),
            Call::Control {
                track,
                channel,
                controller,
                value,
            } => sink.add_control_change(track, tick, channel, controller, value),
            Call::Bend {
                track,
                channel,
                value,
            } => sink.add_bend(track, tick, channel, value),
            Call::NoteBend {
                track,
                channel,
                key,
                value,
            } => sink.add_note_bend(track, tick, channel, key, value),
            Call::Note(note) => sink.add_note(&note),
            Call::EndOfTrack { track } => sink.finish_track(track, tick),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    tick: Tick,
    rank: u8,
    seq: u64,
    call: Call,
}

/// Buffering sink that forwards calls in tick order.
#[derive(Debug, Default)]
pub struct Schedule {
    pending: Vec<Pending>,
    seq: u64,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, tick: Tick, call: Call) {
        self.pending.push(Pending {
            tick,
            rank: call.rank(),
            seq: self.seq,
            call,
        });
        self.seq += 1;
    }

    /// Forward every buffered call before `tick`.
    pub fn release_before(&mut self, tick: Tick, sink: &mut dyn EventSink) {
        self.pending.sort_by_key(|p| (p.tick, p.rank, p.seq));
        let ready = self.pending.partition_point(|p| p.tick < tick);
        for p in self.pending.drain(..ready) {
            p.call.replay(p.tick, sink);
        }
    }

    /// Forward everything that is left.
    pub fn release_all(&mut self, sink: &mut dyn EventSink) {
        self.release_before(Tick::MAX, sink);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl EventSink for Schedule {
    fn add_time_signature(&mut self, tick: Tick, numerator: u8, denominator: u8) {
        self.record(
            tick,
            Call::TimeSignature {
                numerator,
                denominator,
            },
        );
    }

    fn add_tempo(&mut self, tick: Tick, bpm: f64) {
        self.record(tick, Call::Tempo { bpm });
    }

    fn add_rest(&mut self, track: usize, tick: Tick, channel: u8) {
        self.record(tick, Call::Rest { track, channel });
    }

    fn add_note(&mut self, note: &NoteEvent) {
        self.record(note.start, Call::Note(*note));
    }

    fn add_control_change(&mut self, track: usize, tick: Tick, channel: u8, controller: u8, value: u8) {
        self.record(
            tick,
            Call::Control {
                track,
                channel,
                controller,
                value,
            },
        );
    }

    fn add_program_change(&mut self, track: usize, tick: Tick, channel: u8, program: u8) {
        self.record(
            tick,
            Call::Program {
                track,
                channel,
                program,
            },
        );
    }

    fn add_bend(&mut self, track: usize, tick: Tick, channel: u8, value: u16) {
        self.record(
            tick,
            Call::Bend {
                track,
                channel,
                value,
            },
        );
    }

    fn add_note_bend(&mut self, track: usize, tick: Tick, channel: u8, key: u8, value: u16) {
        self.record(
            tick,
            Call::NoteBend {
                track,
                channel,
                key,
                value,
            },
        );
    }

    fn add_metronome(&mut self, tick: Tick, counter: u8, length: Tick) {
        self.record(tick, Call::Metronome { counter, length });
    }

    fn finish_track(&mut self, track: usize, tick: Tick) {
        self.record(tick, Call::EndOfTrack { track });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventCollector, EventKind};

    #[test]
    fn releases_in_tick_then_rank_order() {
        let mut schedule = Schedule::new();
        schedule.add_note(&NoteEvent {
            track: 0,
            start: 0,
            length: 960,
            key: 60,
            velocity: 95,
            channel: 0,
            legato: false,
        });
        schedule.add_tempo(480, 90.0);
        schedule.add_program_change(1, 0, 2, 30);
        schedule.add_bend(0, 240, 0, 9000);

        let mut sink = EventCollector::new();
        schedule.release_before(480, &mut sink);
        assert_eq!(schedule.len(), 1);
        schedule.release_all(&mut sink);
        assert!(schedule.is_empty());

        let kinds: Vec<(Tick, u8)> = sink.into_events().iter().map(|e| (e.tick, e.rank())).collect();
        assert_eq!(kinds, vec![(0, 1), (0, 5), (240, 3), (480, 0), (960, 4)]);
    }

    #[test]
    fn later_calls_stay_buffered() {
        let mut schedule = Schedule::new();
        schedule.add_tempo(3840, 100.0);
        let mut sink = EventCollector::new();
        schedule.release_before(3840, &mut sink);
        assert!(sink.is_empty());
        schedule.release_all(&mut sink);
        assert_eq!(sink.events()[0].kind, EventKind::TempoChange { bpm: 100.0 });
    }
}
