//! Settings controlling timeline generation.
//!
//! Every field has a default, so hosts may pass partial JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{Tick, QUARTER_TIME};

/// Options for one generation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Semitone offset per track index; missing entries mean 0.
    pub transposition_pitches: Vec<i32>,
    /// Emit tempo automations; when off only the initial tempo is used.
    pub play_tempo_changes: bool,
    /// Produce backing-track sync points.
    pub use_sync_points: bool,
    /// Emit metronome clicks on every time-signature beat.
    pub metronome: bool,
    pub vibrato: VibratoSettings,
    pub slide: SlideSettings,
    /// Representative master bar → master bars absorbed into its rendered
    /// multi-bar rest.  Supplied by the layout engine.
    pub multi_bar_rests: Option<BTreeMap<usize, Vec<usize>>>,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            transposition_pitches: Vec::new(),
            play_tempo_changes: true,
            use_sync_points: false,
            metronome: false,
            vibrato: VibratoSettings::default(),
            slide: SlideSettings::default(),
            multi_bar_rests: None,
        }
    }
}

impl PlaybackSettings {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Configured transposition for a track.
    pub fn transposition_for(&self, track: usize) -> i32 {
        self.transposition_pitches.get(track).copied().unwrap_or(0)
    }
}

/// Periodic pitch oscillation shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VibratoPreset {
    /// Length of one up/down cycle
    pub wavelength: Tick,
    /// Peak deviation in semitones
    pub amplitude: f64,
}

/// The four vibrato presets: note or whammy (beat) × slight or wide.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VibratoSettings {
    pub note_slight: VibratoPreset,
    pub note_wide: VibratoPreset,
    pub beat_slight: VibratoPreset,
    pub beat_wide: VibratoPreset,
}

impl Default for VibratoSettings {
    fn default() -> Self {
        Self {
            note_slight: VibratoPreset {
                wavelength: QUARTER_TIME / 2,
                amplitude: 0.5,
            },
            note_wide: VibratoPreset {
                wavelength: QUARTER_TIME / 2,
                amplitude: 1.0,
            },
            beat_slight: VibratoPreset {
                wavelength: QUARTER_TIME / 4,
                amplitude: 0.75,
            },
            beat_wide: VibratoPreset {
                wavelength: QUARTER_TIME / 4,
                amplitude: 1.5,
            },
        }
    }
}

/// Slide timing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlideSettings {
    /// Share of the beat, counted back from its end, over which shift and
    /// legato slides glide to the destination.
    pub shift_fraction: f64,
    /// Share of the note used by slides without a destination.
    pub simple_fraction: f64,
    /// Pitch distance of slides without a destination, in semitones.
    pub simple_offset_semitones: f64,
}

impl Default for SlideSettings {
    fn default() -> Self {
        Self {
            shift_fraction: 0.5,
            simple_fraction: 0.25,
            simple_offset_semitones: 5.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let s = PlaybackSettings::from_json(r#"{"transposition_pitches":[2,-3]}"#).unwrap();
        assert!(s.play_tempo_changes);
        assert_eq!(s.transposition_for(1), -3);
        assert_eq!(s.transposition_for(5), 0);
        assert_eq!(s.vibrato, VibratoSettings::default());
    }
}
