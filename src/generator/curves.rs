//! Pitch-wheel curves: bends, whammy, vibrato and slides quantized into
//! discrete breakpoints.
//!
//! All curves are expressed in semitones relative to the sounding key and
//! converted to 14-bit pitch-wheel values against a fixed ±12 semitone range
//! (the range announced by the track setup RPN).

use std::f64::consts::PI;

use crate::model::{Bend, BendPoint, BendStyle, SlideInType, SlideOutType, Tick, QUARTER_TIME};
use crate::settings::{SlideSettings, VibratoPreset};

/// Pitch-wheel value of an unbent note.
pub const BEND_CENTER: u16 = 8192;
/// Largest bend in either direction, in semitones.
pub const BEND_RANGE_SEMITONES: f64 = 12.0;
/// Pitch-wheel units per semitone.
pub const BEND_UNITS_PER_SEMITONE: f64 = BEND_CENTER as f64 / BEND_RANGE_SEMITONES;
const BEND_MAX: f64 = 16383.0;

/// A ramp gets at least this many breakpoints per semitone of change.
pub const MIN_BREAKPOINTS_PER_SEMITONE: f64 = 4.0;
/// Longest gap between two breakpoints of a ramp.
pub const MAX_BREAKPOINT_GAP: Tick = 60;
/// Window over which a fast bend completes.
pub const FAST_BEND_TICKS: Tick = QUARTER_TIME / 4;

/// Semitones → pitch-wheel value, clamped to the wheel range.
pub fn bend_value(semitones: f64) -> u16 {
    let s = semitones.clamp(-BEND_RANGE_SEMITONES, BEND_RANGE_SEMITONES);
    (f64::from(BEND_CENTER) + s * BEND_UNITS_PER_SEMITONE)
        .round()
        .clamp(0.0, BEND_MAX) as u16
}

/// Limit a pitch offset to the wheel range; NaN counts as unbent.
fn clamp_semitones(semitones: f64) -> f64 {
    if semitones.is_nan() {
        return 0.0;
    }
    semitones.clamp(-BEND_RANGE_SEMITONES, BEND_RANGE_SEMITONES)
}

/// One pitch-wheel position at an absolute tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BendBreakpoint {
    pub tick: Tick,
    pub value: u16,
}

/// Breakpoints in non-decreasing tick order, without repeated values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BendCurve {
    points: Vec<BendBreakpoint>,
    last_semitones: f64,
}

impl BendCurve {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn points(&self) -> &[BendBreakpoint] {
        &self.points
    }

    /// True when the curve leaves the center position at some point.
    pub fn moves_wheel(&self) -> bool {
        self.points.iter().any(|p| p.value != BEND_CENTER)
    }

    /// Pitch offset of the last breakpoint.
    pub fn last_semitones(&self) -> f64 {
        self.last_semitones
    }

    /// Tick of the last breakpoint.
    pub fn end(&self) -> Option<Tick> {
        self.points.last().map(|p| p.tick)
    }

    fn push(&mut self, tick: Tick, semitones: f64) {
        let semitones = clamp_semitones(semitones);
        let value = bend_value(semitones);
        self.last_semitones = semitones;
        let tick = self.end().map_or(tick, |t| tick.max(t));
        match self.points.last_mut() {
            Some(p) if p.tick == tick => p.value = value,
            Some(p) if p.value == value => {}
            _ => self.points.push(BendBreakpoint { tick, value }),
        }
    }

    /// Linear change from `from` to `to` semitones over `[start, end]`.
    pub fn ramp(&mut self, start: Tick, end: Tick, from: f64, to: f64) {
        let (from, to) = (clamp_semitones(from), clamp_semitones(to));
        self.push(start, from);
        let span = end - start;
        if span <= 0 {
            self.push(start, to);
            return;
        }
        let by_pitch = ((to - from).abs() * MIN_BREAKPOINTS_PER_SEMITONE).ceil() as Tick;
        let by_time = (span + MAX_BREAKPOINT_GAP - 1) / MAX_BREAKPOINT_GAP;
        let steps = by_pitch.max(by_time).max(1);
        for i in 1..=steps {
            let t = start + span * i / steps;
            let v = from + (to - from) * i as f64 / steps as f64;
            self.push(t, v);
        }
    }

    /// Bend or whammy curve over a note of `duration` ticks.
    pub fn bend(&mut self, bend: &Bend, start: Tick, duration: Tick) {
        let mut points: Vec<BendPoint> = bend.points.clone();
        points.sort_by_key(|p| p.offset);
        let (Some(first), Some(last)) = (points.first().copied(), points.last().copied()) else {
            return;
        };

        let max = Tick::from(BendPoint::MAX_OFFSET);
        let (window, lo, hi) = match bend.style {
            BendStyle::Default => (duration, 0, max),
            BendStyle::Gradual => (duration, Tick::from(first.offset), Tick::from(last.offset)),
            BendStyle::Fast => (
                duration.min(FAST_BEND_TICKS),
                Tick::from(first.offset),
                Tick::from(last.offset),
            ),
        };
        let position = |offset: u8| -> Tick {
            if hi <= lo {
                return start;
            }
            start + (Tick::from(offset) - lo).clamp(0, hi - lo) * window / (hi - lo)
        };

        self.push(start, first.value);
        for pair in points.windows(2) {
            self.ramp(position(pair[0].offset), position(pair[1].offset), pair[0].value, pair[1].value);
        }
    }

    /// Oscillation around `base` semitones over `[start, end)`, returning to
    /// `base` at `end`.
    pub fn vibrato(&mut self, start: Tick, end: Tick, base: f64, preset: VibratoPreset) {
        if end <= start || preset.wavelength <= 0 {
            return;
        }
        let step = (preset.wavelength / 8).max(1);
        let mut t = start;
        while t < end {
            let phase = (t - start) as f64 / preset.wavelength as f64 * 2.0 * PI;
            self.push(t, base + preset.amplitude * phase.sin());
            t += step;
        }
        self.push(end, base);
    }

    /// Glide by `semitones` over the final `fraction` of the note, as used
    /// by shift and legato slides.  Starts from the pitch the curve has
    /// reached so far.
    pub fn slide_to(&mut self, start: Tick, duration: Tick, semitones: f64, fraction: f64) {
        let end = start + duration;
        let glide = (duration as f64 * fraction.clamp(0.0, 1.0)) as Tick;
        let base = self.last_semitones;
        if self.points.is_empty() {
            self.push(start, base);
        }
        self.ramp(end - glide, end, base, base + semitones);
    }

    /// Slide into the note from a fixed offset.
    pub fn slide_in(&mut self, kind: SlideInType, start: Tick, duration: Tick, settings: &SlideSettings) {
        let offset = match kind {
            SlideInType::None => return,
            SlideInType::IntoFromBelow => -settings.simple_offset_semitones,
            SlideInType::IntoFromAbove => settings.simple_offset_semitones,
        };
        let glide = (duration as f64 * settings.simple_fraction) as Tick;
        self.ramp(start, start + glide, offset, 0.0);
    }

    /// Slide out of the note by a fixed offset.  Shift and legato slides
    /// need a destination and are handled by [`BendCurve::slide_to`].
    pub fn slide_out(&mut self, kind: SlideOutType, start: Tick, duration: Tick, settings: &SlideSettings) {
        let offset = match kind {
            SlideOutType::OutUp => settings.simple_offset_semitones,
            SlideOutType::OutDown => -settings.simple_offset_semitones,
            _ => return,
        };
        let end = start + duration;
        let glide = (duration as f64 * settings.simple_fraction) as Tick;
        let base = self.last_semitones;
        self.ramp(end - glide, end, base, base + offset);
    }
}
