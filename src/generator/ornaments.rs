//! Ornament expansion and note subdivision (turns, mordents, trills, tremolo).

use crate::model::{Ornament, Tick, QUARTER_TIME};

/// Semitones to the diatonic neighbor above each chromatic tone (C = 0).
const STEP_UP: [i32; 12] = [2, 1, 2, 1, 1, 2, 1, 2, 1, 2, 1, 1];
/// Semitones to the diatonic neighbor below each chromatic tone.
const STEP_DOWN: [i32; 12] = [1, 1, 2, 1, 2, 1, 1, 2, 1, 2, 1, 2];

/// Longest auxiliary note of an ornament.
pub const ORNAMENT_NOTE_TICKS: Tick = QUARTER_TIME / 8;

pub fn neighbor_up(key: i32) -> i32 {
    key + STEP_UP[key.rem_euclid(12) as usize]
}

pub fn neighbor_down(key: i32) -> i32 {
    key - STEP_DOWN[key.rem_euclid(12) as usize]
}

/// A note produced by expanding an ornament.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrnamentNote {
    pub key: i32,
    pub start: Tick,
    pub length: Tick,
}

/// Auxiliary notes of `ornament` followed by the shortened main note.
/// Without an ornament the main note is returned unchanged.
pub fn expand(ornament: Ornament, key: i32, start: Tick, length: Tick) -> Vec<OrnamentNote> {
    let aux = match ornament {
        Ornament::None => Vec::new(),
        Ornament::Turn => vec![neighbor_up(key), key, neighbor_down(key)],
        Ornament::InvertedTurn => vec![neighbor_down(key), key, neighbor_up(key)],
        Ornament::UpperMordent => vec![key, neighbor_up(key)],
        Ornament::LowerMordent => vec![key, neighbor_down(key)],
    };
    let each = ORNAMENT_NOTE_TICKS.min(length / (aux.len() as Tick + 1));
    if aux.is_empty() || each <= 0 {
        return vec![OrnamentNote { key, start, length }];
    }

    let mut notes: Vec<OrnamentNote> = aux
        .into_iter()
        .enumerate()
        .map(|(i, k)| OrnamentNote {
            key: k,
            start: start + i as Tick * each,
            length: each,
        })
        .collect();
    let used = notes.len() as Tick * each;
    notes.push(OrnamentNote {
        key,
        start: start + used,
        length: length - used,
    });
    notes
}

/// Split `[start, start + length)` into consecutive `(start, length)`
/// segments of `segment` ticks; the last one absorbs any remainder.
pub fn subdivide(start: Tick, length: Tick, segment: Tick) -> Vec<(Tick, Tick)> {
    if segment <= 0 || length <= segment {
        return vec![(start, length)];
    }
    let count = length / segment;
    (0..count)
        .map(|i| {
            let s = start + i * segment;
            let l = if i + 1 == count { length - i * segment } else { segment };
            (s, l)
        })
        .collect()
}
