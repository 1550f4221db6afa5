//! scoreplay — playback core for finished score models.
//!
//! Turns a score (master bars, tracks, staves, voices, beats, notes) into:
//! - the performed order of bars through repeats, alternate endings and
//!   D.C. / D.S. / Coda / Fine directions ([`sequencer`])
//! - a tick-ordered event stream for a MIDI or synthesizer backend
//!   ([`generator`], [`events`])
//! - a reverse index from ticks to the beats sounding there, for cursors and
//!   highlighting ([`lookup`], [`query`])
//!
//! # Example
//! ```no_run
//! use std::collections::BTreeSet;
//! use scoreplay::{generate_timeline, PlaybackSettings, Score};
//!
//! let score = Score::from_json("{}").unwrap();
//! let timeline = generate_timeline(&score, &PlaybackSettings::default()).unwrap();
//! let tracks: BTreeSet<usize> = (0..score.tracks.len()).collect();
//! let beat = timeline.find_beat(&tracks, 1920, None);
//! println!("{} events, beat at 1920: {beat:?}", timeline.events.len());
//! ```

pub mod error;
pub mod events;
pub mod export;
pub mod generator;
pub mod lookup;
pub mod model;
pub mod query;
pub mod sequencer;
pub mod settings;
pub mod sync;
pub mod tempo;
pub mod timeline;

pub use error::{Diagnostic, GenerateError, RangeClampWarning, Result, SequenceError};
pub use events::{EventCollector, EventKind, EventSink, MetaEvent, NoteEvent, TimedEvent};
pub use export::TimelineSnapshot;
pub use generator::{Generated, TimelineGenerator};
pub use lookup::{BeatLookupEntry, BeatTickLookup, MasterBarTickLookup, TickLookup, TickLookupBuilder};
pub use model::*;
pub use query::{CursorMode, FindBeatResult, LookupPath};
pub use sequencer::{sequence, BarOccurrence, Playthrough, PlaythroughState};
pub use settings::PlaybackSettings;
pub use sync::{BackingTrackSyncPoint, SyncPointMap};
pub use tempo::TempoMap;
pub use timeline::{Timeline, TimelineHandle};

/// Sequence `score` and stream its events into `sink`.
pub fn generate(score: &Score, settings: &PlaybackSettings, sink: &mut dyn EventSink) -> Result<Generated> {
    TimelineGenerator::new(score, settings, sink).generate()
}

/// Sequence `score` and collect its events in memory.
pub fn generate_timeline(score: &Score, settings: &PlaybackSettings) -> Result<Timeline> {
    Timeline::generate(score, settings)
}

/// Generate from JSON inputs and return the timeline snapshot as JSON.
/// An empty `settings_json` means default settings.
pub fn generate_json(score_json: &str, settings_json: &str) -> Result<String> {
    let score = Score::from_json(score_json)?;
    let settings = if settings_json.trim().is_empty() {
        PlaybackSettings::default()
    } else {
        PlaybackSettings::from_json(settings_json)?
    };
    let timeline = Timeline::generate(&score, &settings)?;
    Ok(TimelineSnapshot::new(&timeline).to_json()?)
}

// ═══════════════════════════════════════════════════════════════════════
// C FFI — for iOS (static library) and Android / desktop hosts (cdylib)
// ═══════════════════════════════════════════════════════════════════════

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use log::warn;

/// Generate a timeline from a score JSON document and return the snapshot
/// JSON as a C string.  Returns null on any error.
/// The caller must free the returned string with `scoreplay_free_string`.
///
/// # Safety
/// `score_json` must be a valid null-terminated UTF-8 C string.
/// `settings_json` may be null.
#[no_mangle]
pub unsafe extern "C" fn scoreplay_generate_json(
    score_json: *const c_char,
    settings_json: *const c_char,
) -> *mut c_char {
    if score_json.is_null() {
        return std::ptr::null_mut();
    }
    let score = match unsafe { CStr::from_ptr(score_json) }.to_str() {
        Ok(s) => s,
        Err(_) => return std::ptr::null_mut(),
    };
    let settings = if settings_json.is_null() {
        ""
    } else {
        match unsafe { CStr::from_ptr(settings_json) }.to_str() {
            Ok(s) => s,
            Err(_) => return std::ptr::null_mut(),
        }
    };

    match generate_json(score, settings) {
        Ok(json) => CString::new(json).unwrap_or_default().into_raw(),
        Err(e) => {
            warn!("scoreplay_generate_json failed: {e}");
            std::ptr::null_mut()
        }
    }
}

/// Free a string previously returned by scoreplay functions.
///
/// # Safety
/// `ptr` must be a string previously returned by a scoreplay function, or null.
#[no_mangle]
pub unsafe extern "C" fn scoreplay_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        unsafe {
            let _ = CString::from_raw(ptr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip_through_the_c_abi() {
        let score = CString::new(
            r#"{"tempo":90,"master_bars":[{},{}],"tracks":[{"staves":[{"bars":[
                {"voices":[{"beats":[{"duration":"Whole","playback_duration":3840,"notes":[{"key":60}]}]}]}
            ]}]}]}"#,
        )
        .unwrap();
        let ptr = unsafe { scoreplay_generate_json(score.as_ptr(), std::ptr::null()) };
        assert!(!ptr.is_null());
        let json = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_owned();
        unsafe { scoreplay_free_string(ptr) };

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["end_tick"], 7680);
        assert_eq!(value["occurrences"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn bad_json_yields_null() {
        let score = CString::new("not json").unwrap();
        let ptr = unsafe { scoreplay_generate_json(score.as_ptr(), std::ptr::null()) };
        assert!(ptr.is_null());
    }
}
