//! Timeline event generation.
//!
//! Walks the performed bar occurrences produced by the sequencer and, for
//! each one, every track, staff, voice, beat and note in structural order.
//! Sounding events go to an injected [`EventSink`] in tick order; at the
//! same time every beat is registered with the tick lookup builder, so the
//! cursor index and the event stream always describe the same timeline.

pub mod curves;
pub mod ornaments;
pub mod schedule;

use std::collections::{BTreeMap, HashMap, HashSet};

use log::{debug, warn};

use crate::error::{Diagnostic, GenerateError, RangeClampWarning, Result, SequenceError};
use crate::events::{EventSink, NoteEvent, METRONOME_CLICK_TICKS};
use crate::lookup::{TickLookup, TickLookupBuilder};
use crate::model::{
    Accentuation, Beat, BeatRef, BrushType, Note, NoteRef, Ornament, Score, SlideOutType,
    TimeSignature, Tick, VibratoType, QUARTER_TIME,
};
use crate::sequencer::{self, BarOccurrence};
use crate::settings::PlaybackSettings;
use crate::sync::{self, BackingTrackSyncPoint, SyncPointMap};
use crate::tempo::TempoMap;

use curves::{BendCurve, BEND_CENTER};
use schedule::Schedule;

// ── Controllers ─────────────────────────────────────────────────────────

const CC_DATA_ENTRY: u8 = 6;
const CC_VOLUME: u8 = 7;
const CC_BALANCE: u8 = 10;
const CC_EXPRESSION: u8 = 11;
const CC_DATA_ENTRY_LSB: u8 = 38;
const CC_RPN_LSB: u8 = 100;
const CC_RPN_MSB: u8 = 101;
/// Pitch-bend range announced to the synthesizer, in semitones.
const PITCH_BEND_RANGE: u8 = 12;

// ── Note shaping ────────────────────────────────────────────────────────

const MIN_VELOCITY: i32 = 15;
const VELOCITY_INCREMENT: i32 = 16;
const DEAD_NOTE_TICKS: Tick = 30;
const PALM_MUTE_TICKS: Tick = 80;
const DEFAULT_BRUSH_TICKS: Tick = QUARTER_TIME / 8;

/// Everything a generation pass produces besides the sink's events.
#[derive(Debug, Clone)]
pub struct Generated {
    /// Performed bars in order
    pub occurrences: Vec<BarOccurrence>,
    /// Cursor index over the same ticks as the emitted events
    pub tick_lookup: TickLookup,
    pub tempo_map: TempoMap,
    /// Empty unless sync points are enabled
    pub sync_points: Vec<BackingTrackSyncPoint>,
    /// Non-fatal findings in the order they were found
    pub diagnostics: Vec<Diagnostic>,
    /// First tick after the song
    pub end_tick: Tick,
}

impl Generated {
    /// The structural problem that cut the playthrough short, if any.
    pub fn structural_error(&self) -> Option<&SequenceError> {
        self.diagnostics.iter().find_map(|d| match d {
            Diagnostic::Structural(e) => Some(e),
            Diagnostic::RangeClamp(_) => None,
        })
    }

    /// `Err` when the playthrough was cut short, for callers that treat
    /// partial output as a failure.
    pub fn check(&self) -> Result<()> {
        match self.structural_error() {
            Some(e) => Err(GenerateError::Sequence(e.clone())),
            None => Ok(()),
        }
    }

    pub fn duration_millis(&self) -> f64 {
        self.tempo_map.total_millis(self.end_tick)
    }

    pub fn sync_point_map(&self) -> SyncPointMap {
        SyncPointMap::new(self.sync_points.clone())
    }
}

/// Per-pass scratch state.
struct Pass {
    builder: TickLookupBuilder,
    tempo_map: TempoMap,
    diagnostics: Vec<Diagnostic>,
    /// Where each beat last started sounding, for tie destinations
    playback_starts: HashMap<BeatRef, Tick>,
    /// Notes reached by a legato slide; sounded by their origin
    legato_destinations: HashSet<NoteRef>,
    /// Per track: tick until which the primary / secondary pitch wheel is
    /// committed to a bending note
    wheel_busy: Vec<[Tick; 2]>,
}

/// Where a beat sits in the arena and in time.
#[derive(Clone, Copy)]
struct BeatContext<'s> {
    r: BeatRef,
    beat: &'s Beat,
    start: Tick,
    duration: Tick,
    channel: u8,
    transposition: i32,
    occurrence_end: Tick,
}

/// Generates playback events for one score.
///
/// ```no_run
/// use scoreplay::{EventCollector, PlaybackSettings, Score, TimelineGenerator};
///
/// let score = Score::new();
/// let settings = PlaybackSettings::default();
/// let mut sink = EventCollector::new();
/// let generated = TimelineGenerator::new(&score, &settings, &mut sink).generate().unwrap();
/// println!("{} ticks", generated.end_tick);
/// ```
pub struct TimelineGenerator<'a> {
    score: &'a Score,
    settings: &'a PlaybackSettings,
    sink: &'a mut dyn EventSink,
    /// Calls not yet forwarded to `sink`
    schedule: Schedule,
    /// Live per-channel transposition on top of the settings
    channel_transpositions: BTreeMap<u8, i32>,
}

impl<'a> TimelineGenerator<'a> {
    pub fn new(score: &'a Score, settings: &'a PlaybackSettings, sink: &'a mut dyn EventSink) -> Self {
        Self {
            score,
            settings,
            sink,
            schedule: Schedule::new(),
            channel_transpositions: BTreeMap::new(),
        }
    }

    /// Transpose everything played on `channel` by `semitones`, in addition
    /// to the per-track settings.
    pub fn set_transposition_pitch(&mut self, channel: u8, semitones: i32) {
        if semitones == 0 {
            self.channel_transpositions.remove(&channel);
        } else {
            self.channel_transpositions.insert(channel, semitones);
        }
    }

    /// Sequence the score and generate events for the whole playthrough.
    ///
    /// A structural problem ends the playthrough early and is reported as a
    /// diagnostic; everything before it is still generated.
    pub fn generate(&mut self) -> Result<Generated> {
        let playthrough = sequencer::sequence(self.score);
        let mut generated = self.generate_occurrences(&playthrough.occurrences)?;
        if let Some(e) = playthrough.error {
            generated.diagnostics.insert(0, Diagnostic::Structural(e));
        }
        Ok(generated)
    }

    /// Generate events for an explicit list of occurrences.
    pub fn generate_occurrences(&mut self, occurrences: &[BarOccurrence]) -> Result<Generated> {
        validate(self.score)?;
        let score = self.score;
        let settings = self.settings;

        let initial_tempo = match occurrences.first() {
            Some(first) if settings.play_tempo_changes => first.tempo,
            _ => score.initial_tempo(),
        };
        let mut pass = Pass {
            builder: TickLookupBuilder::new(settings.multi_bar_rests.as_ref()),
            tempo_map: TempoMap::new(initial_tempo),
            diagnostics: Vec::new(),
            playback_starts: HashMap::new(),
            legato_destinations: legato_destinations(score),
            wheel_busy: vec![[0; 2]; score.tracks.len()],
        };

        self.setup_tracks();
        self.schedule.add_tempo(0, initial_tempo);

        let mut tempo = initial_tempo;
        let mut time_signature: Option<TimeSignature> = None;
        for occ in occurrences {
            let Some(mb) = score.master_bars.get(occ.master_bar) else {
                continue;
            };
            self.schedule.release_before(occ.start, &mut *self.sink);

            if time_signature != Some(mb.time_signature) {
                let ts = mb.time_signature;
                self.schedule.add_time_signature(occ.start, ts.numerator, ts.denominator);
                time_signature = Some(ts);
            }

            if settings.play_tempo_changes {
                self.change_tempo(&mut pass, &mut tempo, occ.start, occ.tempo);
                let mut automations: Vec<_> = mb
                    .tempo_automations
                    .iter()
                    .filter(|a| a.ratio_position > 0.0 && a.bpm > 0.0)
                    .collect();
                automations.sort_by(|a, b| a.ratio_position.total_cmp(&b.ratio_position));
                for a in automations {
                    let tick = occ.start + (a.ratio_position.min(1.0) * occ.duration as f64).round() as Tick;
                    self.change_tempo(&mut pass, &mut tempo, tick, a.bpm);
                }
            }

            if settings.metronome {
                self.metronome(occ, mb.time_signature);
            }

            pass.builder.add_master_bar(occ);
            self.generate_bar(&mut pass, occ);
        }

        let end_tick = occurrences.last().map_or(0, BarOccurrence::end);
        for track in 0..score.tracks.len() {
            self.schedule.finish_track(track, end_tick);
        }
        self.schedule.release_all(&mut *self.sink);

        let sync_points = if settings.use_sync_points {
            sync::build_sync_points(score, occurrences, &pass.tempo_map)
        } else {
            Vec::new()
        };

        let tick_lookup = pass.builder.finish();
        debug!(
            "generated {} occurrences, {} lookups, {} tempo points, {} diagnostics",
            occurrences.len(),
            tick_lookup.len(),
            pass.tempo_map.points().len(),
            pass.diagnostics.len()
        );

        Ok(Generated {
            occurrences: occurrences.to_vec(),
            tick_lookup,
            tempo_map: pass.tempo_map,
            sync_points,
            diagnostics: pass.diagnostics,
            end_tick,
        })
    }

    // ═══════════════════════════════════════════════════════════════════
    // Song-wide events
    // ═══════════════════════════════════════════════════════════════════

    /// Program, volume, balance and pitch-bend range on both channels.
    fn setup_tracks(&mut self) {
        for (t, track) in self.score.tracks.iter().enumerate() {
            let p = &track.playback;
            let mut channels = vec![p.primary_channel];
            if p.secondary_channel != p.primary_channel {
                channels.push(p.secondary_channel);
            }
            for channel in channels {
                self.schedule.add_program_change(t, 0, channel, p.program.min(127));
                self.schedule.add_control_change(t, 0, channel, CC_VOLUME, p.volume.min(127));
                self.schedule.add_control_change(t, 0, channel, CC_BALANCE, p.balance.min(127));
                self.schedule.add_control_change(t, 0, channel, CC_EXPRESSION, 127);
                self.schedule.add_control_change(t, 0, channel, CC_RPN_MSB, 0);
                self.schedule.add_control_change(t, 0, channel, CC_RPN_LSB, 0);
                self.schedule.add_control_change(t, 0, channel, CC_DATA_ENTRY, PITCH_BEND_RANGE);
                self.schedule.add_control_change(t, 0, channel, CC_DATA_ENTRY_LSB, 0);
                self.schedule.add_control_change(t, 0, channel, CC_RPN_MSB, 127);
                self.schedule.add_control_change(t, 0, channel, CC_RPN_LSB, 127);
            }
        }
    }

    fn change_tempo(&mut self, pass: &mut Pass, current: &mut f64, tick: Tick, bpm: f64) {
        if (*current - bpm).abs() < f64::EPSILON {
            return;
        }
        self.schedule.add_tempo(tick, bpm);
        pass.tempo_map.push(tick, bpm);
        *current = bpm;
    }

    fn metronome(&mut self, occ: &BarOccurrence, ts: TimeSignature) {
        let step = ts.beat_ticks();
        if step <= 0 {
            return;
        }
        let mut tick = occ.start;
        let mut counter = 0u8;
        while tick < occ.end() {
            self.schedule.add_metronome(tick, counter, METRONOME_CLICK_TICKS);
            tick += step;
            counter = counter.saturating_add(1);
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Bars and beats
    // ═══════════════════════════════════════════════════════════════════

    fn generate_bar(&mut self, pass: &mut Pass, occ: &BarOccurrence) {
        let score = self.score;
        for (t, track) in score.tracks.iter().enumerate() {
            for (s, staff) in track.staves.iter().enumerate() {
                let Some(bar) = staff.bars.get(occ.master_bar) else {
                    continue;
                };
                for (v, voice) in bar.voices.iter().enumerate() {
                    for (b, beat) in voice.beats.iter().enumerate() {
                        let r = BeatRef {
                            track: t,
                            staff: s,
                            bar: occ.master_bar,
                            voice: v,
                            beat: b,
                        };
                        let start = occ.start + beat.playback_start;
                        let duration = played_ticks(beat);
                        let channel = self.pick_channel(pass, t, start);
                        let transposition = staff.transposition_pitch
                            + self.settings.transposition_for(t)
                            + self.channel_transpositions.get(&channel).copied().unwrap_or(0);
                        let ctx = BeatContext {
                            r,
                            beat,
                            start,
                            duration,
                            channel,
                            transposition,
                            occurrence_end: occ.end(),
                        };
                        self.generate_beat(pass, &ctx, track.playback.is_mute);
                    }
                }
            }
        }
    }

    /// The primary channel, unless its pitch wheel is still held by a
    /// bending note and the secondary one is free.
    fn pick_channel(&self, pass: &Pass, track: usize, start: Tick) -> u8 {
        let p = &self.score.tracks[track].playback;
        let [primary, secondary] = pass.wheel_busy[track];
        if start < primary && start >= secondary {
            p.secondary_channel
        } else {
            p.primary_channel
        }
    }

    fn generate_beat(&mut self, pass: &mut Pass, ctx: &BeatContext<'_>, muted: bool) {
        let beat = ctx.beat;

        // A beat made only of tie destinations keeps sounding from its origin.
        let continued = !beat.notes.is_empty() && beat.notes.iter().all(|n| n.is_tie_destination);
        let playback_start = if continued {
            beat.notes
                .iter()
                .find_map(|n| n.tie_origin)
                .and_then(|o| pass.playback_starts.get(&o.beat).copied())
                .unwrap_or(ctx.start)
        } else {
            ctx.start
        };
        pass.playback_starts.insert(ctx.r, playback_start);
        pass.builder.add_beat(ctx.r, playback_start, ctx.start, ctx.duration);

        if muted {
            return;
        }
        if beat.is_rest() {
            self.schedule.add_rest(ctx.r.track, ctx.start, ctx.channel);
            return;
        }

        if beat.whammy.is_some() || beat.vibrato != VibratoType::None {
            self.generate_whammy(pass, ctx);
        }

        let offsets = brush_offsets(beat, ctx.duration);
        for (i, note) in beat.notes.iter().enumerate() {
            self.generate_note(pass, ctx, i, note, offsets[i]);
        }
    }

    /// Whammy bar and beat vibrato move the whole channel.
    fn generate_whammy(&mut self, pass: &mut Pass, ctx: &BeatContext<'_>) {
        let beat = ctx.beat;
        let end = ctx.start + ctx.duration;
        let mut curve = BendCurve::new();
        if let Some(whammy) = &beat.whammy {
            curve.bend(whammy, ctx.start, ctx.duration);
        }
        let preset = match beat.vibrato {
            VibratoType::None => None,
            VibratoType::Slight => Some(self.settings.vibrato.beat_slight),
            VibratoType::Wide => Some(self.settings.vibrato.beat_wide),
        };
        if let Some(preset) = preset {
            let from = curve.end().unwrap_or(ctx.start).max(ctx.start);
            curve.vibrato(from, end, curve.last_semitones(), preset);
        }
        if !curve.moves_wheel() {
            return;
        }
        for p in curve.points() {
            self.schedule.add_bend(ctx.r.track, p.tick, ctx.channel, p.value);
        }
        self.schedule.add_bend(ctx.r.track, end, ctx.channel, BEND_CENTER);
        mark_busy(pass, self.score, ctx.r.track, ctx.channel, end);
    }

    // ═══════════════════════════════════════════════════════════════════
    // Notes
    // ═══════════════════════════════════════════════════════════════════

    fn generate_note(
        &mut self,
        pass: &mut Pass,
        ctx: &BeatContext<'_>,
        index: usize,
        note: &Note,
        brush_offset: Tick,
    ) {
        if note.is_tie_destination {
            return;
        }
        let nref = NoteRef {
            beat: ctx.r,
            note: index,
        };
        if pass.legato_destinations.contains(&nref) {
            return;
        }

        let track = ctx.r.track;
        let start = ctx.start + brush_offset;
        let Some(key) = self.transpose(pass, track, start, i32::from(note.key) + ctx.transposition) else {
            return;
        };

        // ── Length ──────────────────────────────────────────────────
        let own = (ctx.duration - brush_offset).max(1);
        let mut length = own + self.tied_ticks(note);
        let legato_target = match note.slide_out {
            SlideOutType::Legato => note.slide_target.filter(|&t| self.score.note(t).is_some()),
            _ => None,
        };
        if let Some(target) = legato_target {
            length += self.score.beat(target.beat).map_or(0, played_ticks);
        }
        if note.is_dead {
            length = length.min(DEAD_NOTE_TICKS);
        } else if note.is_palm_mute {
            length = length.min(PALM_MUTE_TICKS);
        } else if note.is_staccato {
            length = (length / 2).max(1);
        }
        if note.is_let_ring {
            length = length.max(ctx.occurrence_end - start);
        }

        // ── Pitch curve ─────────────────────────────────────────────
        let mut curve = BendCurve::new();
        if let Some(bend) = &note.bend {
            curve.bend(bend, start, own);
        }
        curve.slide_in(note.slide_in, start, own, &self.settings.slide);
        let preset = match note.vibrato {
            VibratoType::None => None,
            VibratoType::Slight => Some(self.settings.vibrato.note_slight),
            VibratoType::Wide => Some(self.settings.vibrato.note_wide),
        };
        if let Some(preset) = preset {
            let from = curve.end().unwrap_or(start).max(start);
            curve.vibrato(from, start + own, curve.last_semitones(), preset);
        }
        match note.slide_out {
            SlideOutType::Shift | SlideOutType::Legato => {
                if let Some(target) = note.slide_target.and_then(|t| self.score.note(t)) {
                    let delta = f64::from(target.key) - f64::from(note.key);
                    curve.slide_to(start, own, delta, self.settings.slide.shift_fraction);
                }
            }
            kind => curve.slide_out(kind, start, own, &self.settings.slide),
        }

        // ── Attack(s) ───────────────────────────────────────────────
        let velocity = velocity(ctx.beat, note);
        let legato = note.is_legato_origin || legato_target.is_some();
        let shift = i32::from(key) - i32::from(note.key);
        let segments: Vec<(i32, Tick, Tick)> = if note.ornament != Ornament::None {
            ornaments::expand(note.ornament, i32::from(key), start, length)
                .into_iter()
                .map(|n| (n.key, n.start, n.length))
                .collect()
        } else if let Some(trill) = note.trill {
            let trill_key = i32::from(trill.key) + shift;
            ornaments::subdivide(start, length, trill.speed.ticks())
                .into_iter()
                .enumerate()
                .map(|(i, (s, l))| (if i % 2 == 0 { i32::from(key) } else { trill_key }, s, l))
                .collect()
        } else if let Some(speed) = ctx.beat.tremolo_speed {
            ornaments::subdivide(start, length, speed.ticks())
                .into_iter()
                .map(|(s, l)| (i32::from(key), s, l))
                .collect()
        } else {
            vec![(i32::from(key), start, length)]
        };

        let last = segments.len().saturating_sub(1);
        for (i, (k, s, l)) in segments.into_iter().enumerate() {
            let Some(k) = self.transpose(pass, track, s, k) else {
                continue;
            };
            self.schedule.add_note(&NoteEvent {
                track,
                start: s,
                length: l,
                key: k,
                velocity,
                channel: ctx.channel,
                legato: legato && i == last,
            });
        }

        if curve.moves_wheel() {
            for p in curve.points() {
                self.schedule.add_note_bend(track, p.tick, ctx.channel, key, p.value);
            }
            let end = start + length;
            self.schedule.add_note_bend(track, end, ctx.channel, key, BEND_CENTER);
            mark_busy(pass, self.score, track, ctx.channel, end);
        }
    }

    /// Key after transposition, or `None` with a diagnostic when it leaves
    /// the MIDI range.
    fn transpose(&self, pass: &mut Pass, track: usize, tick: Tick, key: i32) -> Option<u8> {
        match u8::try_from(key) {
            Ok(k) if k <= 127 => Some(k),
            _ => {
                let warning = RangeClampWarning { track, tick, key };
                warn!("{warning}");
                pass.diagnostics.push(Diagnostic::RangeClamp(warning));
                None
            }
        }
    }

    /// Played length of all notes following `note` in its tie chain.
    fn tied_ticks(&self, note: &Note) -> Tick {
        let mut total = 0;
        let mut next = note.tie_destination;
        while let Some(r) = next {
            let (Some(beat), Some(n)) = (self.score.beat(r.beat), self.score.note(r)) else {
                break;
            };
            total += played_ticks(beat);
            next = n.tie_destination;
        }
        total
    }
}

fn played_ticks(beat: &Beat) -> Tick {
    if beat.playback_duration > 0 {
        beat.playback_duration
    } else {
        beat.duration_ticks()
    }
}

fn velocity(beat: &Beat, note: &Note) -> u8 {
    let mut v = MIN_VELOCITY + VELOCITY_INCREMENT * beat.dynamics as i32;
    v += match note.accentuation {
        Accentuation::None => 0,
        Accentuation::Normal => VELOCITY_INCREMENT,
        Accentuation::Heavy => 2 * VELOCITY_INCREMENT,
    };
    if note.is_ghost {
        v -= VELOCITY_INCREMENT;
    }
    v.clamp(1, 127) as u8
}

/// Start offset of each note of a strummed chord.
fn brush_offsets(beat: &Beat, duration: Tick) -> Vec<Tick> {
    let n = beat.notes.len();
    let mut offsets = vec![0; n];
    if beat.brush_type == BrushType::None || n < 2 {
        return offsets;
    }
    let total = if beat.brush_duration > 0 {
        beat.brush_duration
    } else {
        DEFAULT_BRUSH_TICKS
    }
    .min(duration / 2);

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by_key(|&i| beat.notes[i].key);
    if beat.brush_type == BrushType::BrushUp {
        order.reverse();
    }
    let steps = (n - 1) as Tick;
    for (rank, &i) in order.iter().enumerate() {
        offsets[i] = total * rank as Tick / steps;
    }
    offsets
}

fn mark_busy(pass: &mut Pass, score: &Score, track: usize, channel: u8, until: Tick) {
    let slot = usize::from(channel != score.tracks[track].playback.primary_channel);
    let busy = &mut pass.wheel_busy[track][slot];
    *busy = (*busy).max(until);
}

fn legato_destinations(score: &Score) -> HashSet<NoteRef> {
    score
        .tracks
        .iter()
        .flat_map(|t| t.staves.iter())
        .flat_map(|s| s.bars.iter())
        .flat_map(|b| b.voices.iter())
        .flat_map(|v| v.beats.iter())
        .flat_map(|b| b.notes.iter())
        .filter(|n| n.slide_out == SlideOutType::Legato)
        .filter_map(|n| n.slide_target)
        .collect()
}

/// Reject arenas the generator cannot walk.
fn validate(score: &Score) -> Result<()> {
    for (t, track) in score.tracks.iter().enumerate() {
        let p = &track.playback;
        if p.primary_channel > 15 || p.secondary_channel > 15 {
            return Err(GenerateError::InvalidScore(format!(
                "track {t} uses a channel outside 0..=15"
            )));
        }
        for (s, staff) in track.staves.iter().enumerate() {
            for (b, bar) in staff.bars.iter().enumerate() {
                for (v, voice) in bar.voices.iter().enumerate() {
                    for (i, beat) in voice.beats.iter().enumerate() {
                        let here = BeatRef {
                            track: t,
                            staff: s,
                            bar: b,
                            voice: v,
                            beat: i,
                        };
                        for note in &beat.notes {
                            for (what, r) in [
                                ("tie destination", note.tie_destination),
                                ("slide target", note.slide_target),
                            ] {
                                let Some(r) = r else { continue };
                                if score.note(r).is_none() || !follows(here, r.beat) {
                                    return Err(GenerateError::InvalidScore(format!(
                                        "{what} {r:?} of a note in {here:?} is missing or does not follow it"
                                    )));
                                }
                            }
                            if let Some(r) = note.tie_origin {
                                if score.note(r).is_none() {
                                    return Err(GenerateError::InvalidScore(format!(
                                        "tie origin {r:?} of a note in {here:?} is missing"
                                    )));
                                }
                            }
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

/// True when `later` comes after `earlier` in structural order.
fn follows(earlier: BeatRef, later: BeatRef) -> bool {
    (later.bar, later.beat) > (earlier.bar, earlier.beat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Dynamic;

    #[test]
    fn velocity_from_dynamics_and_accents() {
        let beat = Beat::note(crate::model::Duration::Quarter, 60);
        let mut note = Note::new(60);
        assert_eq!(velocity(&beat, &note), 95);
        note.accentuation = Accentuation::Heavy;
        assert_eq!(velocity(&beat, &note), 127);
        let soft = Beat {
            dynamics: Dynamic::PPP,
            ..beat
        };
        note.accentuation = Accentuation::None;
        note.is_ghost = true;
        assert_eq!(velocity(&soft, &note), 1);
    }

    #[test]
    fn brush_down_starts_from_the_lowest_key() {
        let mut beat = Beat::chord(crate::model::Duration::Quarter, &[64, 52, 59]);
        beat.brush_type = BrushType::BrushDown;
        beat.brush_duration = 60;
        assert_eq!(brush_offsets(&beat, 960), vec![60, 0, 30]);
        beat.brush_type = BrushType::BrushUp;
        assert_eq!(brush_offsets(&beat, 960), vec![0, 60, 30]);
    }

    #[test]
    fn structural_order() {
        let a = BeatRef {
            track: 0,
            staff: 0,
            bar: 1,
            voice: 0,
            beat: 3,
        };
        assert!(follows(a, BeatRef { bar: 2, beat: 0, ..a }));
        assert!(follows(a, BeatRef { beat: 4, ..a }));
        assert!(!follows(a, a));
    }
}
