//! JSON snapshot of a generated timeline, for hosts that consume the core
//! across an FFI boundary or from a web worker.
//!
//! Occurrences are reported with wall-clock positions so a cursor can be
//! animated without re-deriving the tempo map:
//!   `timestamp_ms = tempo_map.tick_to_millis(start_tick)`

use serde::Serialize;

use crate::events::TimedEvent;
use crate::lookup::TickLookup;
use crate::model::Tick;
use crate::sequencer::BarOccurrence;
use crate::sync::BackingTrackSyncPoint;
use crate::tempo::{TempoMap, TempoPoint};
use crate::timeline::Timeline;

/// Serializable view of a [`Timeline`].
#[derive(Debug, Clone, Serialize)]
pub struct TimelineSnapshot<'a> {
    /// Performed bars with timing
    pub occurrences: Vec<OccurrenceJson>,
    pub tempo: &'a [TempoPoint],
    pub events: &'a [TimedEvent],
    pub sync_points: &'a [BackingTrackSyncPoint],
    pub lookup: &'a TickLookup,
    /// Rendered diagnostic messages
    pub diagnostics: Vec<String>,
    pub end_tick: Tick,
    pub duration_ms: f64,
}

/// One performed bar with wall-clock timing.
#[derive(Debug, Clone, Serialize)]
pub struct OccurrenceJson {
    /// Position in performed order
    pub index: usize,
    /// Index into the score's master bars
    pub master_bar: usize,
    pub ordinal: usize,
    pub start_tick: Tick,
    pub duration_ticks: Tick,
    /// Start time in milliseconds
    pub timestamp_ms: f64,
    /// Duration in milliseconds
    pub duration_ms: f64,
    /// Tempo at the start of the bar (BPM)
    pub tempo_bpm: f64,
}

impl OccurrenceJson {
    fn new(occ: &BarOccurrence, tempo: &TempoMap) -> Self {
        let timestamp_ms = tempo.tick_to_millis(occ.start);
        Self {
            index: occ.index,
            master_bar: occ.master_bar,
            ordinal: occ.ordinal,
            start_tick: occ.start,
            duration_ticks: occ.duration,
            timestamp_ms,
            duration_ms: tempo.tick_to_millis(occ.end()) - timestamp_ms,
            tempo_bpm: occ.tempo,
        }
    }
}

impl<'a> TimelineSnapshot<'a> {
    pub fn new(timeline: &'a Timeline) -> Self {
        let g = &timeline.generated;
        Self {
            occurrences: g
                .occurrences
                .iter()
                .map(|o| OccurrenceJson::new(o, &g.tempo_map))
                .collect(),
            tempo: g.tempo_map.points(),
            events: &timeline.events,
            sync_points: &g.sync_points,
            lookup: &g.tick_lookup,
            diagnostics: g.diagnostics.iter().map(ToString::to_string).collect(),
            end_tick: g.end_tick,
            duration_ms: g.duration_millis(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
