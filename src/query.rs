//! Answer "which beat is playing at tick T" for a set of visible tracks.
//!
//! A caller keeps the previous [`FindBeatResult`] and passes it back as a
//! hint.  While playback advances monotonically the answer is found in the
//! hinted slice or its neighbour without searching; otherwise the lookup
//! falls back to a binary search over bar occurrences.  The hint only
//! decides where to look, never what is returned.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::lookup::{BeatLookupEntry, TickLookup};
use crate::model::Tick;

/// How a cursor should move after the current beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CursorMode {
    /// Glide to the next beat, which continues in performed order
    ToNextBeat,
    /// Glide to the end of the bar: playback jumps (repeat or direction) or ends
    ToEndOfBar,
}

/// Which path answered a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupPath {
    /// The hinted slice still contained the tick
    Hint,
    /// The slice next to the hinted one contained the tick
    Adjacent,
    /// Binary search over bar occurrences
    Seek,
}

/// Beat under the playback position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FindBeatResult {
    /// Index into `TickLookup::master_bars`
    pub master_bar_lookup: usize,
    /// Index into that lookup's slices
    pub slice: usize,
    /// Slice range containing the queried tick
    pub start: Tick,
    pub end: Tick,
    /// Beat the cursor sits on
    pub beat: BeatLookupEntry,
    /// Next beat to be attacked on a visible track, if any
    pub next_beat: Option<BeatLookupEntry>,
    pub cursor_mode: CursorMode,
    /// Tick the cursor should reach when this beat is done
    pub glide_end: Tick,
}

impl FindBeatResult {
    /// Ticks the cursor spends gliding from the queried slice start.
    pub fn glide_ticks(&self) -> Tick {
        self.glide_end - self.start
    }
}

impl TickLookup {
    /// Beat at `tick` on one of `visible_tracks`.
    ///
    /// Negative ticks are treated as 0; ticks past the song return `None`.
    pub fn find_beat(
        &self,
        visible_tracks: &BTreeSet<usize>,
        tick: Tick,
        hint: Option<&FindBeatResult>,
    ) -> Option<FindBeatResult> {
        self.find_beat_traced(visible_tracks, tick, hint).0
    }

    /// Like [`TickLookup::find_beat`], also reporting the path taken.
    pub fn find_beat_traced(
        &self,
        visible_tracks: &BTreeSet<usize>,
        tick: Tick,
        hint: Option<&FindBeatResult>,
    ) -> (Option<FindBeatResult>, LookupPath) {
        let tick = tick.max(0);

        if let Some(h) = hint {
            let (bar, slice) = (h.master_bar_lookup, h.slice);
            if self.slice(bar, slice).is_some_and(|s| s.contains(tick)) {
                return (self.assemble(visible_tracks, bar, slice), LookupPath::Hint);
            }
            let neighbours = [self.next_slice(bar, slice), self.previous_slice(bar, slice)];
            for (b, s) in neighbours.into_iter().flatten() {
                if self.slice(b, s).is_some_and(|sl| sl.contains(tick)) {
                    return (self.assemble(visible_tracks, b, s), LookupPath::Adjacent);
                }
            }
        }

        let found = self.find_master_bar(tick).and_then(|bar| {
            let slice = self.master_bars[bar].slice_at(tick)?;
            self.assemble(visible_tracks, bar, slice)
        });
        (found, LookupPath::Seek)
    }

    /// Build the result for a slice known to contain the tick.
    fn assemble(
        &self,
        visible_tracks: &BTreeSet<usize>,
        bar: usize,
        slice: usize,
    ) -> Option<FindBeatResult> {
        let mb = &self.master_bars[bar];
        let current = &mb.slices[slice];

        // Prefer a beat attacked at this slice; otherwise the most recently
        // attacked one still sounding; otherwise the last beat seen earlier
        // in the bar.
        let beat = pick_cursor_beat(current.beats.iter(), visible_tracks, current.start).or_else(|| {
            mb.slices[..slice].iter().rev().find_map(|s| {
                s.beats
                    .iter()
                    .filter(|e| visible_tracks.contains(&e.track()))
                    .max_by_key(|e| e.start)
                    .copied()
            })
        })?;

        let next = self.find_next_beat(visible_tracks, bar, slice, &beat);
        let (cursor_mode, glide_end) = match next {
            Some((next_bar, entry)) if next_bar == bar => (CursorMode::ToNextBeat, entry.start),
            Some((next_bar, entry))
                if mb.next == Some(next_bar)
                    && self.master_bars[next_bar].master_bar == mb.last_master_bar() + 1 =>
            {
                (CursorMode::ToNextBeat, entry.start)
            }
            _ => (CursorMode::ToEndOfBar, mb.end),
        };

        Some(FindBeatResult {
            master_bar_lookup: bar,
            slice,
            start: current.start,
            end: current.end,
            beat,
            next_beat: next.map(|(_, e)| e),
            cursor_mode,
            glide_end,
        })
    }

    /// First visible beat attacked after `current`, searching the rest of
    /// this occurrence and the next one in performed order.
    fn find_next_beat(
        &self,
        visible_tracks: &BTreeSet<usize>,
        bar: usize,
        slice: usize,
        current: &BeatLookupEntry,
    ) -> Option<(usize, BeatLookupEntry)> {
        let mut pos = self.next_slice(bar, slice);
        while let Some((b, s)) = pos {
            if b != bar && Some(b) != self.master_bars[bar].next {
                return None;
            }
            let sl = &self.master_bars[b].slices[s];
            let attacked = sl
                .beats
                .iter()
                .filter(|e| visible_tracks.contains(&e.track()))
                .find(|e| e.start == sl.start && e.start > current.start);
            if let Some(e) = attacked {
                return Some((b, *e));
            }
            pos = self.next_slice(b, s);
        }
        None
    }
}

fn pick_cursor_beat<'a>(
    beats: impl Iterator<Item = &'a BeatLookupEntry>,
    visible_tracks: &BTreeSet<usize>,
    slice_start: Tick,
) -> Option<BeatLookupEntry> {
    let mut best: Option<&BeatLookupEntry> = None;
    for e in beats.filter(|e| visible_tracks.contains(&e.track())) {
        best = match best {
            None => Some(e),
            Some(b) if b.start == slice_start => Some(b),
            Some(_) if e.start == slice_start => Some(e),
            Some(b) if e.start > b.start => Some(e),
            Some(b) => Some(b),
        };
    }
    best.copied()
}
