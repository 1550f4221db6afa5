//! Tick lookup and beat query tests over generated timelines.

mod common;

use std::collections::BTreeSet;

use common::*;
use pretty_assertions::assert_eq;
use scoreplay::{
    Beat, CursorMode, Direction, Duration, LookupPath, MasterBar, PlaybackSettings, Score, Timeline,
};

/// Repeats, an alternate ending, a D.C. al Fine and two tracks with
/// different rhythms.
fn song() -> Score {
    let mut score = score_of(vec![
        bar(),
        repeat_start(),
        MasterBar { alternate_endings: 0b01, repeat_count: 2, ..bar() },
        with(ending(0b10), Direction::TargetFine),
        with(bar(), Direction::JumpDaCapoAlFine),
    ]);
    add_track(&mut score, quarters(60));
    add_track(&mut score, |i| {
        if i % 2 == 0 {
            vec![Beat::note(Duration::Half, 40), Beat::note(Duration::Half, 43)]
        } else {
            let mut dotted = Beat::note(Duration::Half, 45);
            dotted.dots = 1;
            vec![dotted, Beat::note(Duration::Quarter, 47)]
        }
    });
    score
}

fn generate(score: &Score) -> Timeline {
    Timeline::generate(score, &PlaybackSettings::default()).expect("generation failed")
}

#[test]
fn slices_tile_the_whole_song() {
    let score = song();
    let t = generate(&score);
    let lookup = &t.generated.tick_lookup;

    assert_eq!(lookup.len(), t.generated.occurrences.len());
    let mut expected_start = 0;
    for mb in &lookup.master_bars {
        assert_eq!(mb.start, expected_start, "gap before occurrence {}", mb.occurrence);
        let mut slice_start = mb.start;
        for s in &mb.slices {
            assert_eq!(s.start, slice_start);
            assert!(s.end > s.start);
            slice_start = s.end;
        }
        assert_eq!(slice_start, mb.end);
        expected_start = mb.end;
    }
    assert_eq!(expected_start, t.end_tick());
}

#[test]
fn every_tick_resolves_to_a_containing_slice() {
    let score = song();
    let t = generate(&score);
    let tracks = all_tracks(&score);

    for tick in 0..t.end_tick() {
        let hit = t
            .find_beat(&tracks, tick, None)
            .unwrap_or_else(|| panic!("no beat at tick {tick}"));
        assert!(hit.start <= tick && tick < hit.end, "tick {tick} outside {}..{}", hit.start, hit.end);
    }
    assert!(t.find_beat(&tracks, t.end_tick(), None).is_none());
}

#[test]
fn beats_appear_in_every_slice_they_span() {
    let score = song();
    let t = generate(&score);
    let first = &t.generated.tick_lookup.master_bars[0];

    // track 1's first half note spans the first two quarter-note slices
    let holding: Vec<usize> = first
        .slices
        .iter()
        .filter(|s| s.beats.iter().any(|e| e.beat.track == 1 && e.beat.beat == 0))
        .map(|s| s.beats.len())
        .collect();
    assert_eq!(holding, vec![2, 2]);
}

#[test]
fn ascending_queries_never_seek_after_the_first() {
    let score = song();
    let t = generate(&score);
    let tracks = all_tracks(&score);
    let lookup = &t.generated.tick_lookup;

    let (mut hint, path) = lookup.find_beat_traced(&tracks, 0, None);
    assert_eq!(path, LookupPath::Seek);
    let mut tick = 0;
    while tick < t.end_tick() {
        let (hit, path) = lookup.find_beat_traced(&tracks, tick, hint.as_ref());
        assert_ne!(path, LookupPath::Seek, "seek at tick {tick}");
        assert_eq!(hit, lookup.find_beat(&tracks, tick, None), "hint changed the result at {tick}");
        hint = hit;
        tick += 30;
    }
}

#[test]
fn backwards_seek_ignores_a_stale_hint() {
    let score = song();
    let t = generate(&score);
    let tracks = all_tracks(&score);
    let lookup = &t.generated.tick_lookup;

    let late = lookup.find_beat(&tracks, t.end_tick() - 1, None);
    let (hit, path) = lookup.find_beat_traced(&tracks, 100, late.as_ref());
    assert_eq!(path, LookupPath::Seek);
    assert_eq!(hit, lookup.find_beat(&tracks, 100, None));
}

#[test]
fn cursor_glides_to_bar_end_before_a_repeat() {
    let score = song();
    let t = generate(&score);
    let only_melody: BTreeSet<usize> = [0].into_iter().collect();

    // occurrence 2 is the first ending, followed by the jump back to bar 1
    let occ = t.generated.occurrences[2];
    assert_eq!(occ.master_bar, 2);
    let last_beat = t.find_beat(&only_melody, occ.start + 3000, None).expect("beat");
    assert_eq!(last_beat.cursor_mode, CursorMode::ToEndOfBar);
    assert_eq!(last_beat.glide_end, occ.end());

    // inside a bar the cursor glides to the next attack
    let inner = t.find_beat(&only_melody, occ.start + 100, None).expect("beat");
    assert_eq!(inner.cursor_mode, CursorMode::ToNextBeat);
    assert_eq!(inner.glide_end, occ.start + 960);
}

#[test]
fn hidden_tracks_are_not_reported() {
    let score = song();
    let t = generate(&score);
    let bass: BTreeSet<usize> = [1].into_iter().collect();

    // tick 1000: melody attacks its second quarter, bass still holds a half note
    let hit = t.find_beat(&bass, 1000, None).expect("beat");
    assert_eq!(hit.beat.beat.track, 1);
    assert_eq!(hit.beat.start, 0);
    assert_eq!(hit.next_beat.map(|e| e.start), Some(1920));
}
