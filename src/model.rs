//! Data model for a finished score, as consumed by playback generation.
//!
//! The model is an arena: master bars, repeat groups and tracks live in flat
//! vectors and refer to each other by index.  Bars of a staff are aligned
//! with `Score::master_bars` by position.  Cross references between notes
//! (ties, slide targets) use [`NoteRef`] instead of pointers.
//!
//! Playback offsets (`Beat::playback_start`, `Beat::playback_duration`) are
//! assumed to be computed already; [`Voice::add_beat`] lays beats out
//! sequentially for hosts that build simple scores by hand.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Discrete time unit.  Signed so that effect maths and seek requests can go
/// below zero before being clamped.
pub type Tick = i64;

/// Ticks per quarter note.
pub const QUARTER_TIME: Tick = 960;

/// Tempo used when a score declares none.
pub const DEFAULT_TEMPO: f64 = 120.0;

// ═══════════════════════════════════════════════════════════════════════
// Score
// ═══════════════════════════════════════════════════════════════════════

/// A complete, finished score.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Score {
    /// Title of the piece
    pub title: Option<String>,
    /// Initial tempo in BPM (quarter notes per minute)
    pub tempo: f64,
    /// Structural bars shared by all tracks, in score order
    pub master_bars: Vec<MasterBar>,
    /// Repeat groups referenced by `MasterBar::repeat_group`
    pub repeat_groups: Vec<RepeatGroup>,
    /// Instruments
    pub tracks: Vec<Track>,
}

impl Score {
    /// Create an empty score at the default tempo.
    pub fn new() -> Self {
        Self {
            tempo: DEFAULT_TEMPO,
            ..Self::default()
        }
    }

    /// Deserialize a finished score from JSON.  Repeat groups are derived
    /// from the bar flags when the document carries none; master bar
    /// indices always follow array positions.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut score: Score = serde_json::from_str(json)?;
        if score.repeat_groups.is_empty() && !score.master_bars.is_empty() {
            score.rebuild_repeat_groups();
        }
        for (i, mb) in score.master_bars.iter_mut().enumerate() {
            mb.index = i;
        }
        Ok(score)
    }

    /// Recompute repeat groups from `is_repeat_start`, `repeat_count` and
    /// `alternate_endings` of every master bar.
    pub fn rebuild_repeat_groups(&mut self) {
        let bars = std::mem::take(&mut self.master_bars);
        self.repeat_groups.clear();
        for bar in bars {
            self.add_master_bar(bar);
        }
    }

    /// Initial tempo, falling back to [`DEFAULT_TEMPO`] for unset values.
    pub fn initial_tempo(&self) -> f64 {
        if self.tempo > 0.0 {
            self.tempo
        } else {
            DEFAULT_TEMPO
        }
    }

    /// Append a master bar and assign it to a repeat group.
    ///
    /// A new group starts at a repeat-start bar, or at the first bar after a
    /// closed group unless that bar is one of the group's alternate endings.
    /// A group that is closed without an explicit start is opened at its
    /// first bar.  Returns the index of the new bar.
    pub fn add_master_bar(&mut self, mut bar: MasterBar) -> usize {
        let index = self.master_bars.len();
        bar.index = index;

        let current = self.repeat_groups.len().checked_sub(1);
        let start_new = match current {
            None => true,
            Some(g) => {
                bar.is_repeat_start
                    || (self.repeat_groups[g].is_closed && bar.alternate_endings == 0)
            }
        };
        if start_new {
            self.repeat_groups.push(RepeatGroup {
                opening: index,
                ..RepeatGroup::default()
            });
        }
        let group_index = self.repeat_groups.len() - 1;

        let group = &mut self.repeat_groups[group_index];
        group.master_bars.push(index);
        if bar.is_repeat_end() {
            group.closings.push(index);
            group.is_closed = true;
        }
        bar.repeat_group = Some(group_index);

        self.master_bars.push(bar);
        index
    }

    /// Append a track and return its index.
    pub fn add_track(&mut self, mut track: Track) -> usize {
        let index = self.tracks.len();
        track.index = index;
        self.tracks.push(track);
        index
    }

    /// Structural successor of a master bar.
    pub fn next_master_bar(&self, index: usize) -> Option<usize> {
        let next = index + 1;
        (next < self.master_bars.len()).then_some(next)
    }

    /// Structural predecessor of a master bar.
    pub fn previous_master_bar(&self, index: usize) -> Option<usize> {
        index.checked_sub(1)
    }

    /// Repeat group a master bar belongs to, if any.
    pub fn group_of(&self, master_bar: usize) -> Option<&RepeatGroup> {
        self.master_bars
            .get(master_bar)
            .and_then(|mb| mb.repeat_group)
            .and_then(|g| self.repeat_groups.get(g))
    }

    /// Nominal or, for anacrusis bars, content-derived length in ticks.
    pub fn master_bar_duration(&self, index: usize) -> Tick {
        let Some(mb) = self.master_bars.get(index) else {
            return 0;
        };
        let nominal = mb.time_signature.bar_ticks();
        if !mb.is_anacrusis {
            return nominal;
        }
        let content = self
            .tracks
            .iter()
            .flat_map(|t| t.staves.iter())
            .filter_map(|s| s.bars.get(index))
            .flat_map(|b| b.voices.iter())
            .map(Voice::end)
            .max()
            .unwrap_or(0);
        if content > 0 && content < nominal {
            content
        } else {
            nominal
        }
    }

    /// First master bar carrying the given direction, in score order.
    pub fn find_direction(&self, direction: Direction) -> Option<usize> {
        self.master_bars
            .iter()
            .position(|mb| mb.directions.contains(&direction))
    }

    /// Resolve a beat reference.
    pub fn beat(&self, r: BeatRef) -> Option<&Beat> {
        self.tracks
            .get(r.track)?
            .staves
            .get(r.staff)?
            .bars
            .get(r.bar)?
            .voices
            .get(r.voice)?
            .beats
            .get(r.beat)
    }

    /// Resolve a note reference.
    pub fn note(&self, r: NoteRef) -> Option<&Note> {
        self.beat(r.beat)?.notes.get(r.note)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Master bars and structure
// ═══════════════════════════════════════════════════════════════════════

/// Time signature of a master bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    /// Beats per bar (e.g. 3 in 3/4)
    pub numerator: u8,
    /// Beat unit (e.g. 4 in 3/4)
    pub denominator: u8,
}

impl TimeSignature {
    pub const fn new(numerator: u8, denominator: u8) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Ticks of one beat unit.
    pub fn beat_ticks(&self) -> Tick {
        QUARTER_TIME * 4 / Tick::from(self.denominator.max(1))
    }

    /// Nominal bar length in ticks.
    pub fn bar_ticks(&self) -> Tick {
        Tick::from(self.numerator) * self.beat_ticks()
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::new(4, 4)
    }
}

/// A structural bar shared by all tracks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterBar {
    /// Position in `Score::master_bars`
    pub index: usize,
    /// Time signature in effect for this bar
    pub time_signature: TimeSignature,
    /// Pickup bar whose length comes from its content
    pub is_anacrusis: bool,
    /// Opens a repeat group
    pub is_repeat_start: bool,
    /// Total number of plays of the group when this bar closes it; 0 = not a closing bar
    pub repeat_count: u32,
    /// Bit i set ⇒ bar is played on 0-based iteration i of its repeat group; 0 = always
    pub alternate_endings: u8,
    /// Jump and target markers
    pub directions: BTreeSet<Direction>,
    /// Owning repeat group (index into `Score::repeat_groups`)
    pub repeat_group: Option<usize>,
    /// Tempo changes within the bar
    pub tempo_automations: Vec<TempoAutomation>,
    /// Backing-track synchronization anchors
    pub sync_points: Vec<SyncPointAutomation>,
}

impl MasterBar {
    pub fn new(time_signature: TimeSignature) -> Self {
        Self {
            time_signature,
            ..Self::default()
        }
    }

    /// Whether this bar closes a repeat group.
    pub fn is_repeat_end(&self) -> bool {
        self.repeat_count > 0
    }

    /// Whether the bar plays on the given 0-based iteration of its group.
    pub fn plays_on_iteration(&self, iteration: u32) -> bool {
        if self.alternate_endings == 0 {
            return true;
        }
        iteration < 8 && self.alternate_endings & (1 << iteration) != 0
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.directions.insert(direction);
        self
    }
}

/// A contiguous run of master bars played one or more times.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RepeatGroup {
    /// Bar the repeat jumps back to
    pub opening: usize,
    /// Member bars in score order (includes trailing alternate endings)
    pub master_bars: Vec<usize>,
    /// Bars carrying a repeat count
    pub closings: Vec<usize>,
    /// Whether at least one closing bar has been seen
    pub is_closed: bool,
}

/// Tempo change at a position within a master bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoAutomation {
    /// Position within the bar, 0.0 = start, 1.0 = end
    pub ratio_position: f64,
    /// New tempo in BPM
    pub bpm: f64,
}

/// Anchor tying a position in a master bar to a backing-track time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyncPointAutomation {
    /// Position within the bar, 0.0 = start, 1.0 = end
    pub ratio_position: f64,
    /// Which performed occurrence of the bar this anchor belongs to (0-based)
    pub bar_occurrence: usize,
    /// Backing-track time in milliseconds
    pub millisecond_offset: f64,
}

/// Navigation markers attached to a master bar.
///
/// `Target*` variants mark places a jump can land or stop; `Jump*` variants
/// relocate playback.  The declaration order is the evaluation order used
/// when a bar carries several of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    TargetFine,
    TargetSegno,
    TargetSegnoSegno,
    TargetCoda,
    TargetDoubleCoda,

    JumpDaCapo,
    JumpDaCapoAlCoda,
    JumpDaCapoAlDoubleCoda,
    JumpDaCapoAlFine,

    JumpDalSegno,
    JumpDalSegnoAlCoda,
    JumpDalSegnoAlDoubleCoda,
    JumpDalSegnoAlFine,

    JumpDalSegnoSegno,
    JumpDalSegnoSegnoAlCoda,
    JumpDalSegnoSegnoAlDoubleCoda,
    JumpDalSegnoSegnoAlFine,

    JumpDaCoda,
    JumpDaDoubleCoda,
}

/// Where a Da Capo / Dal Segno style jump lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpOrigin {
    Start,
    Segno,
    SegnoSegno,
}

/// What ends the section replayed after a Da Capo / Dal Segno jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JumpEnding {
    /// Play on to the end
    None,
    /// Stop at the Fine marker
    Fine,
    /// Leave at "To Coda" for the Coda marker
    Coda,
    /// Leave at "To Double Coda" for the Double Coda marker
    DoubleCoda,
}

impl Direction {
    /// Decompose a Da Capo / Dal Segno jump into landing point and ending.
    pub fn as_repeat_jump(self) -> Option<(JumpOrigin, JumpEnding)> {
        use Direction::*;
        let r = match self {
            JumpDaCapo => (JumpOrigin::Start, JumpEnding::None),
            JumpDaCapoAlCoda => (JumpOrigin::Start, JumpEnding::Coda),
            JumpDaCapoAlDoubleCoda => (JumpOrigin::Start, JumpEnding::DoubleCoda),
            JumpDaCapoAlFine => (JumpOrigin::Start, JumpEnding::Fine),
            JumpDalSegno => (JumpOrigin::Segno, JumpEnding::None),
            JumpDalSegnoAlCoda => (JumpOrigin::Segno, JumpEnding::Coda),
            JumpDalSegnoAlDoubleCoda => (JumpOrigin::Segno, JumpEnding::DoubleCoda),
            JumpDalSegnoAlFine => (JumpOrigin::Segno, JumpEnding::Fine),
            JumpDalSegnoSegno => (JumpOrigin::SegnoSegno, JumpEnding::None),
            JumpDalSegnoSegnoAlCoda => (JumpOrigin::SegnoSegno, JumpEnding::Coda),
            JumpDalSegnoSegnoAlDoubleCoda => (JumpOrigin::SegnoSegno, JumpEnding::DoubleCoda),
            JumpDalSegnoSegnoAlFine => (JumpOrigin::SegnoSegno, JumpEnding::Fine),
            _ => return None,
        };
        Some(r)
    }

    pub fn is_jump(self) -> bool {
        !matches!(
            self,
            Direction::TargetFine
                | Direction::TargetSegno
                | Direction::TargetSegnoSegno
                | Direction::TargetCoda
                | Direction::TargetDoubleCoda
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Tracks, staves, bars, voices
// ═══════════════════════════════════════════════════════════════════════

/// An instrument.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Track {
    /// Position in `Score::tracks`
    pub index: usize,
    /// Display name
    pub name: String,
    /// MIDI setup
    pub playback: PlaybackInformation,
    /// Staves, each with one bar per master bar
    pub staves: Vec<Staff>,
}

/// MIDI setup of a track.  Two channels are reserved per track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackInformation {
    /// General MIDI program
    pub program: u8,
    /// Channel for regular notes
    pub primary_channel: u8,
    /// Channel for notes whose pitch wheel would disturb the primary one
    pub secondary_channel: u8,
    /// Channel volume (0-127)
    pub volume: u8,
    /// Stereo balance (0-127, 64 = center)
    pub balance: u8,
    /// Muted tracks still index, but emit no notes
    pub is_mute: bool,
}

impl Default for PlaybackInformation {
    fn default() -> Self {
        Self {
            program: 25,
            primary_channel: 0,
            secondary_channel: 1,
            volume: 100,
            balance: 64,
            is_mute: false,
        }
    }
}

/// One staff of a track.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Staff {
    /// Bars aligned with `Score::master_bars`
    pub bars: Vec<Bar>,
    /// Playback transposition in semitones (e.g. capo, transposing instruments)
    pub transposition_pitch: i32,
}

/// Per-staff content of one master bar.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Bar {
    pub voices: Vec<Voice>,
}

impl Bar {
    pub fn with_voice(voice: Voice) -> Self {
        Self {
            voices: vec![voice],
        }
    }
}

/// A monophonic-in-time stream of beats.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Voice {
    pub beats: Vec<Beat>,
}

impl Voice {
    /// Append a beat directly after the previous one.
    pub fn add_beat(&mut self, mut beat: Beat) -> &mut Self {
        beat.playback_start = self.end();
        if beat.playback_duration <= 0 {
            beat.playback_duration = beat.duration_ticks();
        }
        self.beats.push(beat);
        self
    }

    /// Tick (relative to the bar) at which the last beat ends.
    pub fn end(&self) -> Tick {
        self.beats
            .iter()
            .map(|b| b.playback_start + b.playback_duration)
            .max()
            .unwrap_or(0)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Beats and notes
// ═══════════════════════════════════════════════════════════════════════

/// Written note value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Duration {
    Whole,
    Half,
    #[default]
    Quarter,
    Eighth,
    Sixteenth,
    ThirtySecond,
    SixtyFourth,
}

impl Duration {
    /// Undotted length in ticks.
    pub fn ticks(self) -> Tick {
        match self {
            Duration::Whole => QUARTER_TIME * 4,
            Duration::Half => QUARTER_TIME * 2,
            Duration::Quarter => QUARTER_TIME,
            Duration::Eighth => QUARTER_TIME / 2,
            Duration::Sixteenth => QUARTER_TIME / 4,
            Duration::ThirtySecond => QUARTER_TIME / 8,
            Duration::SixtyFourth => QUARTER_TIME / 16,
        }
    }
}

/// Written loudness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Dynamic {
    PPP,
    PP,
    P,
    MP,
    MF,
    #[default]
    F,
    FF,
    FFF,
}

/// Strum direction of a chord.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BrushType {
    #[default]
    None,
    /// Low to high strings: notes start in ascending key order
    BrushDown,
    /// High to low strings: notes start in descending key order
    BrushUp,
}

/// Vibrato preset strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VibratoType {
    #[default]
    None,
    Slight,
    Wide,
}

/// A set of notes starting together in one voice.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Beat {
    /// Written value
    pub duration: Duration,
    /// Augmentation dots (0-2)
    pub dots: u8,
    /// Tuplet ratio (numerator, denominator), e.g. (3, 2) for triplets
    pub tuplet: Option<(u8, u8)>,
    /// Start relative to the bar, in ticks
    pub playback_start: Tick,
    /// Played length in ticks
    pub playback_duration: Tick,
    /// Notes; empty means rest
    pub notes: Vec<Note>,
    /// Loudness
    pub dynamics: Dynamic,
    /// Whammy-bar vibrato applied to the whole beat
    pub vibrato: VibratoType,
    /// Whammy-bar curve applied to the whole beat
    pub whammy: Option<Bend>,
    /// Tremolo picking subdivision
    pub tremolo_speed: Option<Duration>,
    /// Strum
    pub brush_type: BrushType,
    /// Total stagger of a strum in ticks
    pub brush_duration: Tick,
}

impl Beat {
    pub fn rest(duration: Duration) -> Self {
        Self {
            duration,
            ..Self::default()
        }
    }

    pub fn note(duration: Duration, key: u8) -> Self {
        Self {
            duration,
            notes: vec![Note::new(key)],
            ..Self::default()
        }
    }

    pub fn chord(duration: Duration, keys: &[u8]) -> Self {
        Self {
            duration,
            notes: keys.iter().copied().map(Note::new).collect(),
            ..Self::default()
        }
    }

    pub fn is_rest(&self) -> bool {
        self.notes.is_empty()
    }

    /// Length from written value, dots and tuplet.
    pub fn duration_ticks(&self) -> Tick {
        let base = self.duration.ticks();
        let mut ticks = base;
        let mut dot = base;
        for _ in 0..self.dots {
            dot /= 2;
            ticks += dot;
        }
        match self.tuplet {
            Some((num, den)) if num > 0 => ticks * Tick::from(den) / Tick::from(num),
            _ => ticks,
        }
    }
}

/// Accent strength on a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Accentuation {
    #[default]
    None,
    Normal,
    Heavy,
}

/// Slide into a note without a defined origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SlideInType {
    #[default]
    None,
    IntoFromBelow,
    IntoFromAbove,
}

/// Slide out of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SlideOutType {
    #[default]
    None,
    /// To `slide_target`, target is re-attacked
    Shift,
    /// To `slide_target`, target is not re-attacked
    Legato,
    OutUp,
    OutDown,
}

/// Short melodic embellishment around the main note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Ornament {
    #[default]
    None,
    Turn,
    InvertedTurn,
    UpperMordent,
    LowerMordent,
}

/// Shape timing of a bend or whammy curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BendStyle {
    /// Points are placed at their own offsets
    #[default]
    Default,
    /// Points are spread evenly over the whole note
    Gradual,
    /// Points are compressed into a short window at the note start
    Fast,
}

/// One point of a bend curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BendPoint {
    /// Position within the note, 0..=[`BendPoint::MAX_OFFSET`]
    pub offset: u8,
    /// Pitch change in semitones (negative for dips)
    pub value: f64,
}

impl BendPoint {
    pub const MAX_OFFSET: u8 = 60;

    pub const fn new(offset: u8, value: f64) -> Self {
        Self { offset, value }
    }
}

/// A pitch curve descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bend {
    pub points: Vec<BendPoint>,
    pub style: BendStyle,
}

/// Rapid alternation with an auxiliary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trill {
    /// Key alternated with the main note
    pub key: u8,
    /// Length of each alternation segment
    pub speed: Duration,
}

/// A sounding pitch within a beat.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Note {
    /// MIDI key at concert pitch before playback transposition
    pub key: u8,
    /// Continues a tie; not re-attacked
    pub is_tie_destination: bool,
    /// Previous note of the tie chain
    pub tie_origin: Option<NoteRef>,
    /// Next note of the tie chain
    pub tie_destination: Option<NoteRef>,
    pub is_dead: bool,
    pub is_ghost: bool,
    pub is_palm_mute: bool,
    pub is_staccato: bool,
    pub is_let_ring: bool,
    /// Hammer-on / pull-off origin: the next attack overlaps this release
    pub is_legato_origin: bool,
    pub accentuation: Accentuation,
    pub bend: Option<Bend>,
    pub vibrato: VibratoType,
    pub slide_in: SlideInType,
    pub slide_out: SlideOutType,
    /// Destination of a shift or legato slide
    pub slide_target: Option<NoteRef>,
    pub ornament: Ornament,
    pub trill: Option<Trill>,
}

impl Note {
    pub fn new(key: u8) -> Self {
        Self {
            key,
            ..Self::default()
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// References
// ═══════════════════════════════════════════════════════════════════════

/// Arena address of a beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BeatRef {
    pub track: usize,
    pub staff: usize,
    /// Bar index, equal to the master bar index
    pub bar: usize,
    pub voice: usize,
    pub beat: usize,
}

/// Arena address of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NoteRef {
    pub beat: BeatRef,
    pub note: usize,
}
