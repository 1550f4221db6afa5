//! Tick lookup index: maps absolute ticks back to the beats sounding there.
//!
//! One [`MasterBarTickLookup`] exists per performed bar occurrence (plus the
//! bars absorbed into a multi-bar rest).  Each one is tiled by an ordered
//! chain of [`BeatTickLookup`] slices; within a slice the set of active
//! beats does not change.  Slices are kept in a plain vector and split in
//! place, which is cheap because a bar only has a handful of them.
//!
//! The index is built once per generation pass by [`TickLookupBuilder`] and
//! is immutable afterwards.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::{BeatRef, Tick};
use crate::sequencer::BarOccurrence;

/// A beat active within a slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BeatLookupEntry {
    pub beat: BeatRef,
    /// Absolute tick the beat really started sounding; earlier than the
    /// slice start for beats continued by ties or split by other beats.
    pub playback_start: Tick,
    /// Absolute tick at which the beat's own span begins
    pub start: Tick,
    /// Absolute tick at which the beat's span ends
    pub end: Tick,
}

impl BeatLookupEntry {
    pub fn track(&self) -> usize {
        self.beat.track
    }
}

/// A maximal range within a bar occurrence with a constant set of active beats.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeatTickLookup {
    pub start: Tick,
    pub end: Tick,
    /// Active beats in structural order (track, staff, voice)
    pub beats: Vec<BeatLookupEntry>,
}

impl BeatTickLookup {
    pub fn contains(&self, tick: Tick) -> bool {
        self.start <= tick && tick < self.end
    }

    pub fn duration(&self) -> Tick {
        self.end - self.start
    }
}

/// The slices of one performed bar occurrence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MasterBarTickLookup {
    /// Index into `Score::master_bars`
    pub master_bar: usize,
    /// Position of the occurrence in performed order
    pub occurrence: usize,
    pub start: Tick,
    pub end: Tick,
    /// Tempo at the start of the occurrence
    pub tempo: f64,
    /// Ordered, gap-free tiling of `[start, end)`
    pub slices: Vec<BeatTickLookup>,
    /// Previous lookup in performed order
    pub previous: Option<usize>,
    /// Next lookup in performed order
    pub next: Option<usize>,
    /// Master bars folded into this one by a multi-bar rest
    pub absorbed: Vec<usize>,
}

impl MasterBarTickLookup {
    fn new(occ: &BarOccurrence, previous: Option<usize>) -> Self {
        Self {
            master_bar: occ.master_bar,
            occurrence: occ.index,
            start: occ.start,
            end: occ.end(),
            tempo: occ.tempo,
            slices: vec![BeatTickLookup {
                start: occ.start,
                end: occ.end(),
                beats: Vec::new(),
            }],
            previous,
            next: None,
            absorbed: Vec::new(),
        }
    }

    pub fn contains(&self, tick: Tick) -> bool {
        self.start <= tick && tick < self.end
    }

    /// Last master bar covered, accounting for absorbed bars.
    pub fn last_master_bar(&self) -> usize {
        self.absorbed.last().copied().unwrap_or(self.master_bar)
    }

    /// Slice containing `tick`, by linear scan.
    pub fn slice_at(&self, tick: Tick) -> Option<usize> {
        self.slices.iter().position(|s| s.contains(tick))
    }

    /// Split the slice covering `tick` so that a slice boundary lies at `tick`.
    fn split_at(&mut self, tick: Tick) {
        let i = self.slices.partition_point(|s| s.start <= tick);
        let Some(i) = i.checked_sub(1) else {
            return;
        };
        let slice = &mut self.slices[i];
        if slice.start == tick || tick >= slice.end {
            return;
        }
        let tail = BeatTickLookup {
            start: tick,
            end: slice.end,
            beats: slice.beats.clone(),
        };
        slice.end = tick;
        self.slices.insert(i + 1, tail);
    }

    /// Mark `entry` active over `[start, end)`, splitting slices at both ends.
    fn add_beat(&mut self, entry: BeatLookupEntry, start: Tick, end: Tick) {
        let start = start.max(self.start);
        let end = end.min(self.end);
        if start >= end {
            return;
        }
        self.split_at(start);
        self.split_at(end);
        for slice in self
            .slices
            .iter_mut()
            .skip_while(|s| s.end <= start)
            .take_while(|s| s.start < end)
        {
            slice.beats.push(entry);
        }
    }

    /// Grow to `end`, stretching the final slice.
    fn extend_to(&mut self, end: Tick) {
        self.end = end;
        if let Some(last) = self.slices.last_mut() {
            last.end = end;
        }
    }
}

/// The finished, read-only index.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TickLookup {
    /// Lookups in performed order; ticks strictly increase
    pub master_bars: Vec<MasterBarTickLookup>,
    /// Master bar index → lookups covering it, in performed order
    pub by_master_bar: BTreeMap<usize, Vec<usize>>,
    /// Absorbed master bar → representative master bar of its multi-bar rest
    pub multi_bar_rests: BTreeMap<usize, usize>,
}

impl TickLookup {
    pub fn is_empty(&self) -> bool {
        self.master_bars.is_empty()
    }

    pub fn len(&self) -> usize {
        self.master_bars.len()
    }

    /// First tick after the song.
    pub fn end_tick(&self) -> Tick {
        self.master_bars.last().map_or(0, |m| m.end)
    }

    /// Lookup containing `tick`, by binary search over performed order.
    pub fn find_master_bar(&self, tick: Tick) -> Option<usize> {
        let i = self
            .master_bars
            .partition_point(|m| m.start <= tick)
            .checked_sub(1)?;
        self.master_bars[i].contains(tick).then_some(i)
    }

    /// Master bar that stands in for `master_bar` when it is drawn inside a
    /// multi-bar rest.
    pub fn representative_of(&self, master_bar: usize) -> usize {
        self.multi_bar_rests
            .get(&master_bar)
            .copied()
            .unwrap_or(master_bar)
    }

    /// Lookups covering a master bar, redirected for absorbed bars.
    pub fn lookups_for(&self, master_bar: usize) -> &[usize] {
        self.by_master_bar
            .get(&master_bar)
            .or_else(|| self.by_master_bar.get(&self.representative_of(master_bar)))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Start tick of the first performance of a master bar.
    pub fn master_bar_start(&self, master_bar: usize) -> Option<Tick> {
        self.lookups_for(master_bar)
            .first()
            .map(|&i| self.master_bars[i].start)
    }

    /// Slice following `(bar, slice)` in performed order.
    pub fn next_slice(&self, bar: usize, slice: usize) -> Option<(usize, usize)> {
        let mb = self.master_bars.get(bar)?;
        if slice + 1 < mb.slices.len() {
            return Some((bar, slice + 1));
        }
        let next = mb.next?;
        (!self.master_bars[next].slices.is_empty()).then_some((next, 0))
    }

    /// Slice preceding `(bar, slice)` in performed order.
    pub fn previous_slice(&self, bar: usize, slice: usize) -> Option<(usize, usize)> {
        if slice > 0 {
            return Some((bar, slice - 1));
        }
        let prev = self.master_bars.get(bar)?.previous?;
        let len = self.master_bars[prev].slices.len();
        len.checked_sub(1).map(|s| (prev, s))
    }

    pub fn slice(&self, bar: usize, slice: usize) -> Option<&BeatTickLookup> {
        self.master_bars.get(bar)?.slices.get(slice)
    }
}

/// Incrementally builds a [`TickLookup`] while events are generated.
#[derive(Debug, Default)]
pub struct TickLookupBuilder {
    lookup: TickLookup,
    /// Representative → absorbed bars, as configured
    rests: BTreeMap<usize, Vec<usize>>,
    /// Whether beats of the current occurrence are indexed
    accepting: bool,
}

impl TickLookupBuilder {
    pub fn new(multi_bar_rests: Option<&BTreeMap<usize, Vec<usize>>>) -> Self {
        let rests = multi_bar_rests.cloned().unwrap_or_default();
        let mut lookup = TickLookup::default();
        for (&rep, absorbed) in &rests {
            for &a in absorbed {
                lookup.multi_bar_rests.insert(a, rep);
            }
        }
        Self {
            lookup,
            rests,
            accepting: false,
        }
    }

    /// Start the lookup for a performed bar.  Returns `false` when the bar
    /// was folded into the preceding multi-bar rest; its beats are then not
    /// indexed.
    pub fn add_master_bar(&mut self, occ: &BarOccurrence) -> bool {
        if let Some(current) = self.lookup.master_bars.len().checked_sub(1) {
            let mb = &self.lookup.master_bars[current];
            let absorbs = self
                .rests
                .get(&mb.master_bar)
                .is_some_and(|a| a.contains(&occ.master_bar));
            if absorbs && mb.end == occ.start && mb.last_master_bar() + 1 == occ.master_bar {
                let mb = &mut self.lookup.master_bars[current];
                mb.extend_to(occ.end());
                mb.absorbed.push(occ.master_bar);
                self.lookup
                    .by_master_bar
                    .entry(occ.master_bar)
                    .or_default()
                    .push(current);
                self.accepting = false;
                return false;
            }
        }

        let index = self.lookup.master_bars.len();
        let previous = index.checked_sub(1);
        if let Some(p) = previous {
            self.lookup.master_bars[p].next = Some(index);
        }
        self.lookup
            .master_bars
            .push(MasterBarTickLookup::new(occ, previous));
        self.lookup
            .by_master_bar
            .entry(occ.master_bar)
            .or_default()
            .push(index);
        self.accepting = true;
        true
    }

    /// Index a beat spanning `[start, start + duration)` in the current bar.
    /// `playback_start` is where the beat really began sounding.
    pub fn add_beat(&mut self, beat: BeatRef, playback_start: Tick, start: Tick, duration: Tick) {
        if !self.accepting || duration <= 0 {
            return;
        }
        let Some(mb) = self.lookup.master_bars.last_mut() else {
            return;
        };
        let entry = BeatLookupEntry {
            beat,
            playback_start,
            start,
            end: start + duration,
        };
        mb.add_beat(entry, start, start + duration);
    }

    pub fn finish(self) -> TickLookup {
        self.lookup
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occ(index: usize, master_bar: usize, start: Tick) -> BarOccurrence {
        BarOccurrence {
            index,
            master_bar,
            ordinal: 0,
            start,
            duration: 3840,
            tempo: 120.0,
        }
    }

    fn beat(track: usize, beat: usize) -> BeatRef {
        BeatRef {
            track,
            staff: 0,
            bar: 0,
            voice: 0,
            beat,
        }
    }

    fn bounds(mb: &MasterBarTickLookup) -> Vec<(Tick, Tick, usize)> {
        mb.slices
            .iter()
            .map(|s| (s.start, s.end, s.beats.len()))
            .collect()
    }

    #[test]
    fn overlapping_beats_split_slices() {
        let mut b = TickLookupBuilder::new(None);
        b.add_master_bar(&occ(0, 0, 0));
        b.add_beat(beat(0, 0), 0, 0, 1920); // half note
        b.add_beat(beat(0, 1), 1920, 1920, 1920);
        b.add_beat(beat(1, 0), 0, 0, 960); // quarter notes
        b.add_beat(beat(1, 1), 960, 960, 2880);
        let lookup = b.finish();
        let mb = &lookup.master_bars[0];
        assert_eq!(
            bounds(mb),
            vec![(0, 960, 2), (960, 1920, 2), (1920, 3840, 2)]
        );
        // the half note stays active in the slice cut out by the second quarter
        assert_eq!(mb.slices[1].beats[0].beat, beat(0, 0));
        assert_eq!(mb.slices[1].beats[0].playback_start, 0);
    }

    #[test]
    fn beats_are_clamped_to_their_bar() {
        let mut b = TickLookupBuilder::new(None);
        b.add_master_bar(&occ(0, 0, 0));
        b.add_beat(beat(0, 0), 0, 2880, 1920);
        let lookup = b.finish();
        assert_eq!(bounds(&lookup.master_bars[0]), vec![(0, 2880, 0), (2880, 3840, 1)]);
    }

    #[test]
    fn multi_bar_rest_absorbs_following_bars() {
        let mut rests = BTreeMap::new();
        rests.insert(1, vec![2, 3]);
        let mut b = TickLookupBuilder::new(Some(&rests));
        assert!(b.add_master_bar(&occ(0, 0, 0)));
        assert!(b.add_master_bar(&occ(1, 1, 3840)));
        b.add_beat(beat(0, 0), 3840, 3840, 3840);
        assert!(!b.add_master_bar(&occ(2, 2, 7680)));
        assert!(!b.add_master_bar(&occ(3, 3, 11520)));
        assert!(b.add_master_bar(&occ(4, 4, 15360)));
        let lookup = b.finish();

        assert_eq!(lookup.len(), 3);
        let rest = &lookup.master_bars[1];
        assert_eq!((rest.start, rest.end), (3840, 15360));
        assert_eq!(rest.absorbed, vec![2, 3]);
        assert_eq!(bounds(rest), vec![(3840, 15360, 1)]);
        assert_eq!(lookup.lookups_for(3), &[1]);
        assert_eq!(lookup.master_bar_start(2), Some(3840));
        assert_eq!(lookup.representative_of(2), 1);
        assert_eq!(lookup.master_bars[2].previous, Some(1));
    }

    #[test]
    fn finds_master_bar_by_tick() {
        let mut b = TickLookupBuilder::new(None);
        b.add_master_bar(&occ(0, 0, 0));
        b.add_master_bar(&occ(1, 0, 3840));
        let lookup = b.finish();
        assert_eq!(lookup.find_master_bar(0), Some(0));
        assert_eq!(lookup.find_master_bar(3840), Some(1));
        assert_eq!(lookup.find_master_bar(7680), None);
        assert_eq!(lookup.lookups_for(0), &[0, 1]);
    }
}
