//! A generated timeline and its atomically replaceable handle.
//!
//! Playback reads the current [`Timeline`] through a [`TimelineHandle`]
//! while a regeneration (settings change, sync point edit) builds a new one
//! off to the side.  The swap replaces the whole `Arc`, so a reader holding a
//! snapshot keeps a consistent event list and index until it lets go.

use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::Result;
use crate::events::{EventCollector, TimedEvent};
use crate::generator::{Generated, TimelineGenerator};
use crate::model::{Score, Tick};
use crate::query::FindBeatResult;
use crate::settings::PlaybackSettings;

/// Events plus everything else one generation pass produced.
#[derive(Debug, Clone)]
pub struct Timeline {
    pub generated: Generated,
    /// Ordered event stream
    pub events: Vec<TimedEvent>,
}

impl Timeline {
    /// Generate a timeline into an in-memory collector.
    pub fn generate(score: &Score, settings: &PlaybackSettings) -> Result<Self> {
        let mut collector = EventCollector::new();
        let generated = TimelineGenerator::new(score, settings, &mut collector).generate()?;
        Ok(Self {
            generated,
            events: collector.into_events(),
        })
    }

    pub fn end_tick(&self) -> Tick {
        self.generated.end_tick
    }

    /// See [`crate::lookup::TickLookup::find_beat`].
    pub fn find_beat(
        &self,
        visible_tracks: &BTreeSet<usize>,
        tick: Tick,
        hint: Option<&FindBeatResult>,
    ) -> Option<FindBeatResult> {
        self.generated.tick_lookup.find_beat(visible_tracks, tick, hint)
    }
}

/// Shared slot holding the current timeline.
#[derive(Debug)]
pub struct TimelineHandle {
    current: RwLock<Arc<Timeline>>,
}

impl TimelineHandle {
    pub fn new(timeline: Timeline) -> Self {
        Self {
            current: RwLock::new(Arc::new(timeline)),
        }
    }

    /// The timeline in effect now.
    pub fn snapshot(&self) -> Arc<Timeline> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Install a fully built timeline, returning the previous one.
    pub fn replace(&self, timeline: Timeline) -> Arc<Timeline> {
        let next = Arc::new(timeline);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, next)
    }

    /// Build a new timeline and install it.  On error the current one stays.
    pub fn regenerate(&self, score: &Score, settings: &PlaybackSettings) -> Result<()> {
        let timeline = Timeline::generate(score, settings)?;
        self.replace(timeline);
        Ok(())
    }
}
