//! Backing-track sync points.
//!
//! A sync point pins a position of the performed score (an absolute tick) to
//! a millisecond offset in external media.  Between two points the playback
//! tempo is chosen so the score covers exactly the media time between them.

use log::debug;
use serde::Serialize;

use crate::model::{Score, Tick, QUARTER_TIME};
use crate::sequencer::BarOccurrence;
use crate::tempo::TempoMap;

/// A sync point resolved against the performed timeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BackingTrackSyncPoint {
    /// Index into `Score::master_bars`
    pub master_bar: usize,
    /// Which performance of the master bar (0-based)
    pub bar_occurrence: usize,
    /// Absolute tick in the performed score
    pub synth_tick: Tick,
    /// Milliseconds at `synth_tick` under the score's own tempo
    pub synth_time: f64,
    /// Score tempo at `synth_tick`
    pub synth_bpm: f64,
    /// Milliseconds in the backing track
    pub sync_time: f64,
    /// Tempo that reaches the next point exactly on time
    pub sync_bpm: f64,
}

/// Resolve the sync point automations of every performed bar.
pub fn build_sync_points(
    score: &Score,
    occurrences: &[BarOccurrence],
    tempo_map: &TempoMap,
) -> Vec<BackingTrackSyncPoint> {
    let mut points = Vec::new();
    for occ in occurrences {
        let Some(mb) = score.master_bars.get(occ.master_bar) else {
            continue;
        };
        let mut automations: Vec<_> = mb
            .sync_points
            .iter()
            .filter(|a| a.bar_occurrence == occ.ordinal)
            .collect();
        automations.sort_by(|a, b| a.ratio_position.total_cmp(&b.ratio_position));
        for a in automations {
            let tick = occ.start + (a.ratio_position.clamp(0.0, 1.0) * occ.duration as f64).round() as Tick;
            let synth_bpm = tempo_map.tempo_at(tick);
            points.push(BackingTrackSyncPoint {
                master_bar: occ.master_bar,
                bar_occurrence: occ.ordinal,
                synth_tick: tick,
                synth_time: tempo_map.tick_to_millis(tick),
                synth_bpm,
                sync_time: a.millisecond_offset,
                sync_bpm: synth_bpm,
            });
        }
    }

    for i in 0..points.len().saturating_sub(1) {
        let (here, next) = (points[i], points[i + 1]);
        let ticks = (next.synth_tick - here.synth_tick) as f64;
        let millis = next.sync_time - here.sync_time;
        if ticks > 0.0 && millis > 0.0 {
            points[i].sync_bpm = (ticks / QUARTER_TIME as f64) / (millis / 60_000.0);
        }
    }
    debug!("resolved {} sync points", points.len());
    points
}

/// Piecewise-linear mapping between score ticks and backing-track time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncPointMap {
    points: Vec<BackingTrackSyncPoint>,
}

impl SyncPointMap {
    pub fn new(points: Vec<BackingTrackSyncPoint>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[BackingTrackSyncPoint] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Backing-track milliseconds at `tick`.  `None` without sync points.
    pub fn tick_to_sync_millis(&self, tick: Tick) -> Option<f64> {
        let i = self.points.partition_point(|p| p.synth_tick <= tick);
        let p = self.points.get(i.saturating_sub(1))?;
        let beats = (tick - p.synth_tick) as f64 / QUARTER_TIME as f64;
        Some(p.sync_time + beats * 60_000.0 / p.sync_bpm)
    }

    /// Score tick playing at backing-track time `millis`.
    pub fn sync_millis_to_tick(&self, millis: f64) -> Option<Tick> {
        let i = self.points.partition_point(|p| p.sync_time <= millis);
        let p = self.points.get(i.saturating_sub(1))?;
        let beats = (millis - p.sync_time) / 60_000.0 * p.sync_bpm;
        Some(p.synth_tick + (beats * QUARTER_TIME as f64).round() as Tick)
    }
}
