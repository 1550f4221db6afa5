//! Score fixtures shared by the integration tests.
#![allow(dead_code)]

use std::collections::BTreeSet;

use scoreplay::{
    sequence, Bar, Beat, Direction, Duration, EventKind, MasterBar, Score, Staff, TimedEvent, Track,
    Voice,
};

pub fn bar() -> MasterBar {
    MasterBar::default()
}

pub fn repeat_start() -> MasterBar {
    MasterBar {
        is_repeat_start: true,
        ..MasterBar::default()
    }
}

pub fn repeat_end(count: u32) -> MasterBar {
    MasterBar {
        repeat_count: count,
        ..MasterBar::default()
    }
}

pub fn ending(mask: u8) -> MasterBar {
    MasterBar {
        alternate_endings: mask,
        ..MasterBar::default()
    }
}

pub fn with(mut bar: MasterBar, direction: Direction) -> MasterBar {
    bar.directions.insert(direction);
    bar
}

/// A score with the given master bars and no tracks.
pub fn score_of(bars: Vec<MasterBar>) -> Score {
    let mut score = Score::new();
    for b in bars {
        score.add_master_bar(b);
    }
    score
}

/// Add a track whose bars are filled by `fill(master_bar_index)`.
pub fn add_track(score: &mut Score, fill: impl Fn(usize) -> Vec<Beat>) -> usize {
    let bars = (0..score.master_bars.len())
        .map(|i| {
            let mut voice = Voice::default();
            for beat in fill(i) {
                voice.add_beat(beat);
            }
            Bar::with_voice(voice)
        })
        .collect();
    let track = score.tracks.len();
    score.add_track(Track {
        name: format!("Track {track}"),
        staves: vec![Staff {
            bars,
            ..Staff::default()
        }],
        ..Track::default()
    });
    if let Some(t) = score.tracks.last_mut() {
        t.playback.primary_channel = (2 * track) as u8;
        t.playback.secondary_channel = (2 * track + 1) as u8;
    }
    track
}

/// Four quarter notes of `key` in every bar.
pub fn quarters(key: u8) -> impl Fn(usize) -> Vec<Beat> {
    move |_| (0..4).map(|_| Beat::note(Duration::Quarter, key)).collect()
}

/// One whole note of `key` in every bar.
pub fn wholes(key: u8) -> impl Fn(usize) -> Vec<Beat> {
    move |_| vec![Beat::note(Duration::Whole, key)]
}

/// Master bar indices in performed order.
pub fn played(score: &Score) -> Vec<usize> {
    sequence(score).occurrences.iter().map(|o| o.master_bar).collect()
}

pub fn all_tracks(score: &Score) -> BTreeSet<usize> {
    (0..score.tracks.len()).collect()
}

/// `(tick, key, is_attack)` of every note event.
pub fn note_events(events: &[TimedEvent]) -> Vec<(i64, u8, bool)> {
    events
        .iter()
        .filter_map(|e| match e.kind {
            EventKind::NoteOn { key, .. } => Some((e.tick, key, true)),
            EventKind::NoteOff { key, .. } => Some((e.tick, key, false)),
            _ => None,
        })
        .collect()
}

/// Attacks only, as `(tick, key, channel)`.
pub fn attacks(events: &[TimedEvent]) -> Vec<(i64, u8, u8)> {
    events
        .iter()
        .filter_map(|e| match e.kind {
            EventKind::NoteOn { key, .. } => Some((e.tick, key, e.channel)),
            _ => None,
        })
        .collect()
}
