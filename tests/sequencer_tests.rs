//! Performance order tests: repeats, alternate endings and jump directions.

mod common;

use common::*;
use pretty_assertions::assert_eq;
use scoreplay::{sequence, Direction, MasterBar, RepeatGroup, Score, SequenceError};

#[test]
fn plain_bars_play_once_in_order() {
    let score = score_of((0..6).map(|_| bar()).collect());
    let p = sequence(&score);

    assert_eq!(played(&score), vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(p.occurrences[0].start, 0);
    for w in p.occurrences.windows(2) {
        assert!(w[0].start < w[1].start, "ticks must strictly increase");
        assert_eq!(w[0].end(), w[1].start, "occurrences must be contiguous");
    }
    assert_eq!(p.end_tick(), 6 * 3840);
}

#[test]
fn repeat_count_three_plays_group_three_times() {
    let score = score_of(vec![repeat_start(), repeat_end(3), bar()]);
    assert_eq!(played(&score), vec![0, 1, 0, 1, 0, 1, 2]);

    let single = score_of(vec![bar(), MasterBar { is_repeat_start: true, repeat_count: 3, ..bar() }]);
    assert_eq!(played(&single), vec![0, 1, 1, 1]);
}

#[test]
fn two_bar_repeat_yields_four_occurrences() {
    let score = score_of(vec![repeat_start(), repeat_end(2)]);
    let p = sequence(&score);
    let got: Vec<(usize, i64)> = p.occurrences.iter().map(|o| (o.master_bar, o.start)).collect();
    assert_eq!(got, vec![(0, 0), (1, 3840), (0, 7680), (1, 11520)]);
    let ordinals: Vec<usize> = p.occurrences.iter().map(|o| o.ordinal).collect();
    assert_eq!(ordinals, vec![0, 0, 1, 1]);
}

#[test]
fn alternate_ending_plays_only_on_its_iteration() {
    // |: A | [1. B :| [2. C :| [3. D | E
    let score = score_of(vec![
        repeat_start(),
        MasterBar { alternate_endings: 0b001, repeat_count: 3, ..bar() },
        MasterBar { alternate_endings: 0b010, repeat_count: 3, ..bar() },
        ending(0b100),
        bar(),
    ]);
    let order = played(&score);
    assert_eq!(order, vec![0, 1, 0, 2, 0, 3, 4]);
    // the second ending appears exactly once, in the second traversal
    assert_eq!(order.iter().filter(|&&b| b == 2).count(), 1);
}

#[test]
fn da_capo_al_fine_stops_at_fine() {
    let score = score_of(vec![
        bar(),
        with(bar(), Direction::TargetFine),
        bar(),
        with(bar(), Direction::JumpDaCapoAlFine),
    ]);
    assert_eq!(played(&score), vec![0, 1, 2, 3, 0, 1]);
}

#[test]
fn dal_segno_al_coda_leaves_at_to_coda() {
    let score = score_of(vec![
        bar(),
        with(bar(), Direction::TargetSegno),
        with(bar(), Direction::JumpDaCoda),
        with(bar(), Direction::JumpDalSegnoAlCoda),
        bar(),
        with(bar(), Direction::TargetCoda),
    ]);
    // "To Coda" is ignored on the first pass
    assert_eq!(played(&score), vec![0, 1, 2, 3, 1, 2, 5]);
}

#[test]
fn repeats_are_not_retaken_after_da_capo() {
    let score = score_of(vec![repeat_start(), repeat_end(2), with(bar(), Direction::JumpDaCapo)]);
    assert_eq!(played(&score), vec![0, 1, 0, 1, 2, 0, 1, 2]);
}

#[test]
fn last_ending_is_played_after_a_jump() {
    // |: A | [1. B :| [2. C | D.C.
    let score = score_of(vec![
        repeat_start(),
        MasterBar { alternate_endings: 0b01, repeat_count: 2, ..bar() },
        ending(0b10),
        with(bar(), Direction::JumpDaCapo),
    ]);
    assert_eq!(played(&score), vec![0, 1, 0, 2, 3, 0, 2, 3]);
}

#[test]
fn jump_on_closing_bar_waits_for_the_repeat() {
    let score = score_of(vec![
        repeat_start(),
        with(repeat_end(2), Direction::JumpDaCapoAlFine),
        with(bar(), Direction::TargetFine),
    ]);
    // repeat first, then the jump; the Fine bar after the group ends it
    assert_eq!(played(&score), vec![0, 1, 0, 1, 0, 1, 2]);
}

#[test]
fn unresolved_target_keeps_previous_occurrences() {
    let score = score_of(vec![bar(), bar(), with(bar(), Direction::JumpDalSegnoSegno), bar()]);
    let p = sequence(&score);
    assert_eq!(p.occurrences.len(), 3);
    assert_eq!(
        p.error,
        Some(SequenceError::UnresolvedJumpTarget {
            master_bar: 2,
            direction: Direction::JumpDalSegnoSegno,
        })
    );
}

#[test]
fn dal_segno_segno_returns_to_its_own_sign() {
    let score = score_of(vec![
        with(bar(), Direction::TargetSegno),
        with(bar(), Direction::TargetSegnoSegno),
        with(bar(), Direction::JumpDalSegnoSegno),
        bar(),
    ]);
    assert_eq!(played(&score), vec![0, 1, 2, 1, 2, 3]);
}

#[test]
fn dal_segno_al_fine_stops_at_fine() {
    let score = score_of(vec![
        bar(),
        with(bar(), Direction::TargetSegno),
        with(bar(), Direction::TargetFine),
        with(bar(), Direction::JumpDalSegnoAlFine),
        bar(),
    ]);
    assert_eq!(played(&score), vec![0, 1, 2, 3, 1, 2]);
}

#[test]
fn al_double_coda_leaves_at_to_double_coda() {
    let da_capo = score_of(vec![
        bar(),
        with(bar(), Direction::JumpDaDoubleCoda),
        with(bar(), Direction::JumpDaCapoAlDoubleCoda),
        bar(),
        with(bar(), Direction::TargetDoubleCoda),
    ]);
    assert_eq!(played(&da_capo), vec![0, 1, 2, 0, 1, 4]);

    let dal_segno = score_of(vec![
        bar(),
        with(bar(), Direction::TargetSegno),
        with(bar(), Direction::JumpDaDoubleCoda),
        with(bar(), Direction::JumpDalSegnoAlDoubleCoda),
        bar(),
        with(bar(), Direction::TargetDoubleCoda),
    ]);
    assert_eq!(played(&dal_segno), vec![0, 1, 2, 3, 1, 2, 5]);
}

#[test]
fn to_coda_wins_over_another_jump_on_the_same_bar() {
    // |S| |: A | D.C. al Coda | [1. B :| [2. To Coda, D.S. | Coda
    // bar 4 is first reached after the D.C., so both of its jumps are live
    let score = score_of(vec![
        with(bar(), Direction::TargetSegno),
        repeat_start(),
        with(bar(), Direction::JumpDaCapoAlCoda),
        MasterBar { alternate_endings: 0b01, repeat_count: 2, ..bar() },
        with(with(ending(0b10), Direction::JumpDaCoda), Direction::JumpDalSegno),
        with(bar(), Direction::TargetCoda),
    ]);
    assert_eq!(played(&score), vec![0, 1, 2, 0, 1, 2, 4, 5]);
}

#[test]
fn closing_bar_without_group_is_malformed() {
    let mut score = score_of(vec![bar(), repeat_end(2), bar()]);
    score.master_bars[1].repeat_group = None;
    let p = sequence(&score);

    assert_eq!(p.occurrences.len(), 1);
    assert!(matches!(
        p.error,
        Some(SequenceError::MalformedRepeatGroup { group: usize::MAX, .. })
    ));
}

#[test]
fn runaway_nesting_stops_at_the_step_limit() {
    // bars 1..=2 repeat ten times inside bars 0..=3, which also repeat ten
    // times: 220 bars, more than the 104 steps allowed for four bars
    let mut score = Score::new();
    score.master_bars = vec![
        MasterBar { index: 0, repeat_group: Some(0), ..bar() },
        MasterBar { index: 1, repeat_group: Some(1), ..bar() },
        MasterBar { index: 2, repeat_group: Some(1), repeat_count: 10, ..bar() },
        MasterBar { index: 3, repeat_group: Some(0), repeat_count: 10, ..bar() },
    ];
    score.repeat_groups = vec![
        RepeatGroup {
            opening: 0,
            master_bars: vec![0, 3],
            closings: vec![3],
            is_closed: true,
        },
        RepeatGroup {
            opening: 1,
            master_bars: vec![1, 2],
            closings: vec![2],
            is_closed: true,
        },
    ];
    let p = sequence(&score);

    assert_eq!(p.error, Some(SequenceError::IterationLimit { limit: 104 }));
    assert_eq!(p.occurrences.len(), 104);
}

#[test]
fn groups_from_json_do_not_need_bar_indices() {
    let score = Score::from_json(
        r#"{
            "master_bars": [
                {"repeat_group": 0},
                {"is_repeat_start": true, "repeat_group": 1},
                {"repeat_count": 2, "repeat_group": 1}
            ],
            "repeat_groups": [
                {"opening": 0, "master_bars": [0]},
                {"opening": 1, "master_bars": [1, 2], "closings": [2], "is_closed": true}
            ]
        }"#,
    )
    .expect("valid score");
    let p = sequence(&score);

    assert_eq!(p.error, None);
    assert_eq!(played(&score), vec![0, 1, 2, 1, 2]);
}

#[test]
fn sequencing_is_deterministic() {
    let score = score_of(vec![
        repeat_start(),
        MasterBar { alternate_endings: 0b01, repeat_count: 2, ..bar() },
        ending(0b10),
        with(bar(), Direction::TargetSegno),
        with(bar(), Direction::JumpDalSegno),
    ]);
    assert_eq!(sequence(&score).occurrences, sequence(&score).occurrences);
}
