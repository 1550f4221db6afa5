//! Simulate performance order: expand repeats, alternate endings and
//! navigation jumps into a flat list of bar occurrences with absolute ticks.
//!
//! The walk is a pure function [`step`] over an explicit [`PlaythroughState`];
//! [`sequence`] just threads the state until it finishes.  Handles:
//! - Repeat groups with any repeat count
//! - Alternate endings (bit i of the mask ⇒ played on 0-based iteration i)
//! - D.C. / D.S. / D.S.S. jumps, each taken at most once
//! - al Fine, al Coda, al Double Coda endings of those jumps
//! - Senza ripetizione: after a jump, groups play their final iteration only
//!
//! Evaluation order on a bar: Fine stop, To Coda, D.C./D.S. jump, repeat,
//! advance.  A jump sitting on a bar that closes a repeat group waits until
//! the group has played all its iterations.

use std::collections::BTreeSet;

use log::{debug, trace, warn};
use serde::Serialize;

use crate::error::SequenceError;
use crate::model::{Direction, JumpEnding, JumpOrigin, MasterBar, Score, Tick};

/// One concrete performance of a master bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BarOccurrence {
    /// Position in performed order (0-based)
    pub index: usize,
    /// Index into `Score::master_bars`
    pub master_bar: usize,
    /// How many times this master bar was performed before (0-based)
    pub ordinal: usize,
    /// Absolute start tick
    pub start: Tick,
    /// Length in ticks
    pub duration: Tick,
    /// Tempo in effect at the start of the bar (BPM)
    pub tempo: f64,
}

impl BarOccurrence {
    pub fn end(&self) -> Tick {
        self.start + self.duration
    }
}

/// Result of sequencing a score.
#[derive(Debug, Clone, Default)]
pub struct Playthrough {
    /// Performed bars; valid even when `error` is set
    pub occurrences: Vec<BarOccurrence>,
    /// Structural problem that stopped the walk early
    pub error: Option<SequenceError>,
}

impl Playthrough {
    /// Tick at which the last occurrence ends.
    pub fn end_tick(&self) -> Tick {
        self.occurrences.last().map_or(0, BarOccurrence::end)
    }
}

/// Walk state between two steps.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaythroughState {
    /// Master bar to evaluate next; `None` once finished
    pub position: Option<usize>,
    /// Start tick of the next emitted occurrence
    pub tick: Tick,
    /// Tempo carried in performed order
    pub tempo: f64,
    /// Current 0-based iteration per repeat group
    pub iterations: Vec<u32>,
    /// Jumps already taken
    pub fired: BTreeSet<Direction>,
    /// How the section after the last jump ends
    pub ending: JumpEnding,
    /// Set after a jump: repeats are no longer taken
    pub senza_ripetizione: bool,
    /// Occurrences emitted so far, per master bar
    pub played: Vec<usize>,
    /// Occurrences emitted so far
    pub emitted: usize,
}

impl PlaythroughState {
    /// State before the first bar of `score`.
    pub fn initial(score: &Score) -> Self {
        Self {
            position: (!score.master_bars.is_empty()).then_some(0),
            tick: 0,
            tempo: score.initial_tempo(),
            iterations: vec![0; score.repeat_groups.len()],
            fired: BTreeSet::new(),
            ending: JumpEnding::None,
            senza_ripetizione: false,
            played: vec![0; score.master_bars.len()],
            emitted: 0,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.position.is_none()
    }
}

/// Outcome of evaluating one master bar.
#[derive(Debug, Clone)]
pub struct Step {
    /// Occurrence produced by this bar, if it was played
    pub occurrence: Option<BarOccurrence>,
    /// State for the next step
    pub next: PlaythroughState,
    /// Structural error; `next` is finished when set
    pub error: Option<SequenceError>,
}

/// Expand `score` into performed order.  Always terminates.
pub fn sequence(score: &Score) -> Playthrough {
    let limit = step_limit(score);
    let mut state = PlaythroughState::initial(score);
    let mut result = Playthrough::default();
    let mut steps = 0;

    while !state.is_finished() {
        steps += 1;
        if steps > limit {
            warn!(
                "playthrough hit safety limit ({limit} steps) after {} occurrences",
                result.occurrences.len()
            );
            result.error = Some(SequenceError::IterationLimit { limit });
            break;
        }

        let Step {
            occurrence,
            next,
            error,
        } = step(score, &state);
        if let Some(occ) = occurrence {
            result.occurrences.push(occ);
        }
        if let Some(e) = error {
            warn!("{e}");
            result.error = Some(e);
            break;
        }
        state = next;
    }

    debug!(
        "sequenced {} master bars into {} occurrences ({} ticks)",
        score.master_bars.len(),
        result.occurrences.len(),
        result.end_tick()
    );
    result
}

/// Evaluate the master bar at `state.position`.
pub fn step(score: &Score, state: &PlaythroughState) -> Step {
    let mut next = state.clone();
    let Some(pos) = state.position else {
        return Step {
            occurrence: None,
            next,
            error: None,
        };
    };
    let Some(mb) = score.master_bars.get(pos) else {
        next.position = None;
        return Step {
            occurrence: None,
            next,
            error: None,
        };
    };

    if let Err(e) = check_group(score, pos, mb) {
        next.position = None;
        return Step {
            occurrence: None,
            next,
            error: Some(e),
        };
    }

    let group = mb.repeat_group;
    let iteration = current_iteration(score, state, group);
    let plays = mb.plays_on_iteration(iteration);
    trace!("bar {pos}: iteration {iteration}, plays {plays}");

    // ── Emit ────────────────────────────────────────────────────────
    let mut occurrence = None;
    if plays {
        let duration = score.master_bar_duration(pos);
        let (start_tempo, end_tempo) = bar_tempos(mb, state.tempo);
        occurrence = Some(BarOccurrence {
            index: state.emitted,
            master_bar: pos,
            ordinal: state.played[pos],
            start: state.tick,
            duration,
            tempo: start_tempo,
        });
        next.tick += duration;
        next.tempo = end_tempo;
        next.played[pos] += 1;
        next.emitted += 1;
    }

    // ── Directions ──────────────────────────────────────────────────
    if state.ending == JumpEnding::Fine && mb.directions.contains(&Direction::TargetFine) {
        trace!("bar {pos}: Fine");
        next.position = None;
        return Step {
            occurrence,
            next,
            error: None,
        };
    }

    let to_coda = match state.ending {
        JumpEnding::Coda => Some((Direction::JumpDaCoda, Direction::TargetCoda)),
        JumpEnding::DoubleCoda => Some((Direction::JumpDaDoubleCoda, Direction::TargetDoubleCoda)),
        _ => None,
    };
    if let Some((jump, target)) = to_coda {
        if mb.directions.contains(&jump) && !state.fired.contains(&jump) {
            let Some(dest) = score.find_direction(target) else {
                return unresolved(next, occurrence, pos, jump);
            };
            trace!("bar {pos}: {jump:?} → bar {dest}");
            next.fired.insert(jump);
            next.ending = JumpEnding::None;
            land(score, &mut next, dest);
            return Step {
                occurrence,
                next,
                error: None,
            };
        }
    }

    let closing_pending = plays
        && mb.is_repeat_end()
        && !state.senza_ripetizione
        && iteration + 1 < mb.repeat_count;

    if !closing_pending {
        let jump = mb
            .directions
            .iter()
            .copied()
            .filter(|d| !state.fired.contains(d))
            .find_map(|d| d.as_repeat_jump().map(|j| (d, j)));
        if let Some((direction, (origin, ending))) = jump {
            let dest = match origin {
                JumpOrigin::Start => Some(0),
                JumpOrigin::Segno => score.find_direction(Direction::TargetSegno),
                JumpOrigin::SegnoSegno => score.find_direction(Direction::TargetSegnoSegno),
            };
            let Some(dest) = dest else {
                return unresolved(next, occurrence, pos, direction);
            };
            trace!("bar {pos}: {direction:?} → bar {dest}");
            next.fired.insert(direction);
            next.ending = ending;
            next.senza_ripetizione = true;
            land(score, &mut next, dest);
            return Step {
                occurrence,
                next,
                error: None,
            };
        }
    }

    // ── Repeats ─────────────────────────────────────────────────────
    if closing_pending {
        if let Some(g) = group {
            let opening = score.repeat_groups[g].opening;
            trace!("bar {pos}: repeat → bar {opening} (iteration {})", iteration + 1);
            next.iterations[g] = iteration + 1;
            next.position = Some(opening);
            return Step {
                occurrence,
                next,
                error: None,
            };
        }
    }

    // ── Advance ─────────────────────────────────────────────────────
    match score.next_master_bar(pos) {
        Some(n) => land(score, &mut next, n),
        None => next.position = None,
    }
    Step {
        occurrence,
        next,
        error: None,
    }
}

/// Move to `dest`, restarting the iteration count when entering a group
/// at its opening bar.
fn land(score: &Score, next: &mut PlaythroughState, dest: usize) {
    if let Some(g) = score.master_bars.get(dest).and_then(|mb| mb.repeat_group) {
        if score.repeat_groups.get(g).map(|grp| grp.opening) == Some(dest) {
            if let Some(it) = next.iterations.get_mut(g) {
                *it = 0;
            }
        }
    }
    next.position = Some(dest);
}

fn unresolved(
    mut next: PlaythroughState,
    occurrence: Option<BarOccurrence>,
    master_bar: usize,
    direction: Direction,
) -> Step {
    next.position = None;
    Step {
        occurrence,
        next,
        error: Some(SequenceError::UnresolvedJumpTarget {
            master_bar,
            direction,
        }),
    }
}

/// Iteration used for alternate endings.  After a jump every group is on
/// its final iteration.
fn current_iteration(score: &Score, state: &PlaythroughState, group: Option<usize>) -> u32 {
    let Some(g) = group else {
        return 0;
    };
    if state.senza_ripetizione {
        return final_iteration(score, g);
    }
    state.iterations.get(g).copied().unwrap_or(0)
}

fn final_iteration(score: &Score, group: usize) -> u32 {
    score.repeat_groups[group]
        .closings
        .iter()
        .filter_map(|&c| score.master_bars.get(c))
        .map(|mb| mb.repeat_count.saturating_sub(1))
        .max()
        .unwrap_or(0)
}

fn check_group(score: &Score, pos: usize, mb: &MasterBar) -> Result<(), SequenceError> {
    match mb.repeat_group {
        None if mb.is_repeat_end() => Err(SequenceError::MalformedRepeatGroup {
            group: usize::MAX,
            message: format!("closing master bar {pos} belongs to no group"),
        }),
        None => Ok(()),
        Some(g) => {
            let Some(group) = score.repeat_groups.get(g) else {
                return Err(SequenceError::MalformedRepeatGroup {
                    group: g,
                    message: format!("referenced by master bar {pos} but missing"),
                });
            };
            if group.opening > pos || group.opening >= score.master_bars.len() {
                return Err(SequenceError::MalformedRepeatGroup {
                    group: g,
                    message: format!("opening bar {} does not precede member bar {pos}", group.opening),
                });
            }
            Ok(())
        }
    }
}

/// Tempo at the start and at the end of a played bar.
fn bar_tempos(mb: &MasterBar, carried: f64) -> (f64, f64) {
    let mut start = carried;
    let mut end = carried;
    let mut last_ratio = f64::NEG_INFINITY;
    for automation in &mb.tempo_automations {
        if automation.bpm <= 0.0 {
            continue;
        }
        if automation.ratio_position <= 0.0 {
            start = automation.bpm;
        }
        if automation.ratio_position >= last_ratio {
            last_ratio = automation.ratio_position;
            end = automation.bpm;
        }
    }
    (start, end)
}

/// Upper bound on steps: every bar may be visited once per repeat
/// iteration, once more after each distinct jump.
fn step_limit(score: &Score) -> usize {
    let max_repeat = score
        .master_bars
        .iter()
        .map(|mb| mb.repeat_count as usize)
        .max()
        .unwrap_or(0);
    let jumps = score
        .master_bars
        .iter()
        .flat_map(|mb| mb.directions.iter())
        .filter(|d| d.is_jump())
        .collect::<BTreeSet<_>>()
        .len();
    score.master_bars.len() * (max_repeat + 1) * (jumps + 2) + 16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MasterBar, TempoAutomation};

    fn plain(n: usize) -> Score {
        let mut score = Score::new();
        for _ in 0..n {
            score.add_master_bar(MasterBar::default());
        }
        score
    }

    fn indices(p: &Playthrough) -> Vec<usize> {
        p.occurrences.iter().map(|o| o.master_bar).collect()
    }

    #[test]
    fn linear_score_plays_each_bar_once() {
        let p = sequence(&plain(5));
        assert_eq!(indices(&p), vec![0, 1, 2, 3, 4]);
        assert!(p.error.is_none());
        for w in p.occurrences.windows(2) {
            assert_eq!(w[0].end(), w[1].start);
            assert!(w[0].start < w[1].start);
        }
    }

    #[test]
    fn step_reports_skipped_alternate_ending_without_emitting() {
        let mut score = Score::new();
        score.add_master_bar(MasterBar {
            is_repeat_start: true,
            ..MasterBar::default()
        });
        score.add_master_bar(MasterBar {
            alternate_endings: 0b10,
            ..MasterBar::default()
        });
        let mut state = PlaythroughState::initial(&score);
        state.position = Some(1);
        let s = step(&score, &state);
        assert!(s.occurrence.is_none());
        assert_eq!(s.next.tick, 0);
        assert!(s.next.is_finished());
    }

    #[test]
    fn tempo_carries_in_performed_order() {
        let mut score = plain(3);
        score.master_bars[1].tempo_automations.push(TempoAutomation {
            ratio_position: 0.0,
            bpm: 90.0,
        });
        score.master_bars[2].directions.insert(Direction::JumpDaCapo);
        let p = sequence(&score);
        let tempos: Vec<f64> = p.occurrences.iter().map(|o| o.tempo).collect();
        // the replayed bar 0 keeps the 90 BPM reached before the jump
        assert_eq!(tempos, vec![120.0, 90.0, 90.0, 90.0, 90.0, 90.0]);
    }

    #[test]
    fn missing_segno_stops_at_jump_bar() {
        let mut score = plain(3);
        score.master_bars[1].directions.insert(Direction::JumpDalSegno);
        let p = sequence(&score);
        assert_eq!(indices(&p), vec![0, 1]);
        assert_eq!(
            p.error,
            Some(SequenceError::UnresolvedJumpTarget {
                master_bar: 1,
                direction: Direction::JumpDalSegno
            })
        );
    }

    #[test]
    fn dangling_group_reference_is_malformed() {
        let mut score = plain(2);
        score.master_bars[1].repeat_group = Some(42);
        let p = sequence(&score);
        assert_eq!(indices(&p), vec![0]);
        assert!(matches!(
            p.error,
            Some(SequenceError::MalformedRepeatGroup { group: 42, .. })
        ));
    }
}
