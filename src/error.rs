//! Error and diagnostic types.
//!
//! Structural problems stop sequencing but keep everything produced up to
//! that point, so they travel as [`Diagnostic`]s on the generation result
//! rather than as `Err`.  Only inputs that cannot be walked at all (dangling
//! arena references, undecodable JSON) fail a call outright.

use serde::Serialize;
use thiserror::Error;

use crate::model::{Direction, Tick};

/// Problems found while simulating the performance order.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum SequenceError {
    #[error("Unresolved jump target for {direction:?} in master bar {master_bar}")]
    UnresolvedJumpTarget {
        master_bar: usize,
        direction: Direction,
    },

    #[error("Malformed repeat group {group}: {message}")]
    MalformedRepeatGroup { group: usize, message: String },

    #[error("Playthrough exceeded {limit} steps; output truncated")]
    IterationLimit { limit: usize },
}

/// A transposed note fell outside the MIDI key range and was not emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RangeClampWarning {
    pub track: usize,
    pub tick: Tick,
    /// Key after transposition
    pub key: i32,
}

impl std::fmt::Display for RangeClampWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Transposed key {} on track {} at tick {} is out of range; note dropped",
            self.key, self.track, self.tick
        )
    }
}

/// Non-fatal findings of a generation pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Diagnostic {
    Structural(SequenceError),
    RangeClamp(RangeClampWarning),
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::Structural(e) => write!(f, "{e}"),
            Diagnostic::RangeClamp(w) => write!(f, "{w}"),
        }
    }
}

/// Failures that abort a generation pass.
#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("Invalid score: {0}")]
    InvalidScore(String),

    #[error(transparent)]
    Sequence(#[from] SequenceError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = GenerateError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_bar() {
        let err = SequenceError::UnresolvedJumpTarget {
            master_bar: 7,
            direction: Direction::JumpDalSegno,
        };
        assert_eq!(
            err.to_string(),
            "Unresolved jump target for JumpDalSegno in master bar 7"
        );
        let warn = Diagnostic::RangeClamp(RangeClampWarning {
            track: 1,
            tick: 960,
            key: 130,
        });
        assert_eq!(
            warn.to_string(),
            "Transposed key 130 on track 1 at tick 960 is out of range; note dropped"
        );
    }
}
