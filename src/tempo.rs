//! Tick ↔ wall-clock conversion over the performed tempo changes.
//!
//! Built while the generator walks bar occurrences, so jumps back to an
//! earlier section naturally use the tempo reached in performed order.

use log::warn;
use serde::Serialize;

use crate::model::{Tick, QUARTER_TIME};

/// A tempo change with its precomputed wall-clock position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TempoPoint {
    pub tick: Tick,
    pub bpm: f64,
    /// Milliseconds from the start of the song
    pub millis: f64,
}

/// Piecewise-constant tempo over absolute ticks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TempoMap {
    points: Vec<TempoPoint>,
}

fn ticks_to_millis(ticks: Tick, bpm: f64) -> f64 {
    ticks as f64 * 60_000.0 / (bpm * QUARTER_TIME as f64)
}

impl TempoMap {
    /// A map with a single tempo from tick 0.
    pub fn new(initial_bpm: f64) -> Self {
        Self {
            points: vec![TempoPoint {
                tick: 0,
                bpm: initial_bpm,
                millis: 0.0,
            }],
        }
    }

    /// Record a tempo change.  Changes must arrive in non-decreasing tick
    /// order; a change at the tick of the previous one replaces it.
    pub fn push(&mut self, tick: Tick, bpm: f64) {
        if bpm <= 0.0 {
            return;
        }
        let last = *self.points.last().unwrap_or(&TempoPoint {
            tick: 0,
            bpm,
            millis: 0.0,
        });
        if tick < last.tick {
            warn!("tempo change at tick {tick} precedes tick {}; ignored", last.tick);
            return;
        }
        if tick == last.tick {
            if let Some(p) = self.points.last_mut() {
                p.bpm = bpm;
            }
            return;
        }
        if (last.bpm - bpm).abs() < f64::EPSILON {
            return;
        }
        let millis = last.millis + ticks_to_millis(tick - last.tick, last.bpm);
        self.points.push(TempoPoint { tick, bpm, millis });
    }

    pub fn points(&self) -> &[TempoPoint] {
        &self.points
    }

    fn point_at_tick(&self, tick: Tick) -> &TempoPoint {
        let i = self.points.partition_point(|p| p.tick <= tick);
        &self.points[i.saturating_sub(1)]
    }

    /// Tempo in effect at `tick`.
    pub fn tempo_at(&self, tick: Tick) -> f64 {
        self.point_at_tick(tick).bpm
    }

    /// Milliseconds from the start of the song to `tick`.
    pub fn tick_to_millis(&self, tick: Tick) -> f64 {
        let p = self.point_at_tick(tick);
        p.millis + ticks_to_millis(tick - p.tick, p.bpm)
    }

    /// Milliseconds from the start of the song to `end_tick`, the first tick
    /// after the last event.
    pub fn total_millis(&self, end_tick: Tick) -> f64 {
        self.tick_to_millis(end_tick)
    }

    /// Tick reached after `millis` milliseconds, rounded to the nearest tick.
    pub fn millis_to_tick(&self, millis: f64) -> Tick {
        let i = self.points.partition_point(|p| p.millis <= millis);
        let p = &self.points[i.saturating_sub(1)];
        let ticks = p.tick as f64 + (millis - p.millis) * p.bpm * QUARTER_TIME as f64 / 60_000.0;
        ticks.round() as Tick
    }
}
