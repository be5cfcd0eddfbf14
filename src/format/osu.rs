//! The osu! beatmap text format (`.osu`).
//!
//! A beatmap is a sequence of `[Section]` blocks. `[General]`, `[Metadata]` and `[Difficulty]`
//! hold `Key: Value` pairs, `[TimingPoints]` and `[HitObjects]` hold comma separated rows.
//! Sections we have no use for (`[Editor]`, `[Events]`, `[Colours]`) are skipped.
//!
//! Timing is expressed in integer milliseconds from the start of the audio file, so no tempo
//! integration is needed to place hit objects.

pub mod probe;

use thiserror::Error;

use super::span::{WithSpan, WithSpanExt, lines_with_span};

/// The latest format version, assumed when the version header is missing.
pub const LATEST_FORMAT_VERSION: u32 = 14;

/// The playfield width in osu! pixels. Mania columns are spread evenly across it.
pub const PLAYFIELD_WIDTH: f64 = 512.0;

/// Game mode declared by `[General] Mode`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OsuMode {
    /// `0`, osu!standard.
    #[default]
    Standard,
    /// `1`, osu!taiko.
    Taiko,
    /// `2`, osu!catch.
    Catch,
    /// `3`, osu!mania.
    Mania,
}

impl OsuMode {
    /// Converts the numeric mode code used in the file.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::Standard,
            1 => Self::Taiko,
            2 => Self::Catch,
            3 => Self::Mania,
            _ => return None,
        })
    }
}

/// `[General]` section.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct General {
    /// Audio file name, relative to the beatmap directory.
    pub audio_filename: String,
    /// Silence in milliseconds before the audio starts.
    pub audio_lead_in: i64,
    /// Preview start time in milliseconds, `-1` if unset.
    pub preview_time: i64,
    /// Declared game mode.
    pub mode: OsuMode,
}

impl Default for General {
    fn default() -> Self {
        Self {
            audio_filename: String::new(),
            audio_lead_in: 0,
            preview_time: -1,
            mode: OsuMode::Standard,
        }
    }
}

/// `[Metadata]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Metadata {
    /// Romanised song title.
    pub title: String,
    /// Song title in its original script.
    pub title_unicode: String,
    /// Romanised artist.
    pub artist: String,
    /// Artist in its original script.
    pub artist_unicode: String,
    /// Mapper name.
    pub creator: String,
    /// Difficulty name.
    pub version: String,
    /// Original media the song comes from.
    pub source: String,
    /// Search terms.
    pub tags: Vec<String>,
}

/// `[Difficulty]` section.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Difficulty {
    /// HP drain rate.
    pub hp_drain_rate: f64,
    /// Circle size. In osu!mania this is the number of columns.
    pub circle_size: f64,
    /// Overall difficulty.
    pub overall_difficulty: f64,
    /// Approach rate.
    pub approach_rate: f64,
    /// Base slider velocity in hundreds of osu! pixels per beat.
    pub slider_multiplier: f64,
    /// Slider ticks per beat.
    pub slider_tick_rate: f64,
}

impl Default for Difficulty {
    fn default() -> Self {
        Self {
            hp_drain_rate: 5.0,
            circle_size: 5.0,
            overall_difficulty: 5.0,
            approach_rate: 5.0,
            slider_multiplier: 1.4,
            slider_tick_rate: 1.0,
        }
    }
}

impl Difficulty {
    /// Number of mania columns declared by this section.
    #[must_use]
    pub fn key_count(&self) -> u32 {
        key_count_from_circle_size(self.circle_size)
    }
}

/// Rounds a circle size into a column count. Non-finite or non-positive sizes give zero columns.
pub(crate) fn key_count_from_circle_size(circle_size: f64) -> u32 {
    if circle_size.is_finite() && circle_size > 0.0 {
        circle_size.round() as u32
    } else {
        0
    }
}

/// A row of `[TimingPoints]`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimingPoint {
    /// Start time in milliseconds.
    pub time: f64,
    /// For uninherited points, the duration of a beat in milliseconds.
    /// For inherited points, a negative inverse slider velocity percentage.
    pub beat_length: f64,
    /// Beats per measure.
    pub meter: u32,
    /// Whether this point declares a new tempo (red line) rather than a velocity change (green line).
    pub uninherited: bool,
    /// Whether kiai time is enabled from this point.
    pub kiai: bool,
}

impl TimingPoint {
    /// Tempo declared by this point, `None` for inherited points.
    #[must_use]
    pub fn bpm(&self) -> Option<f64> {
        (self.uninherited && self.beat_length > 0.0).then(|| 60_000.0 / self.beat_length)
    }

    /// Scroll velocity multiplier declared by this point. Uninherited points reset it to `1.0`.
    #[must_use]
    pub fn speed(&self) -> f64 {
        if self.uninherited || self.beat_length >= 0.0 {
            1.0
        } else {
            100.0 / -self.beat_length
        }
    }
}

/// Shape of a hit object, decided by the type bit field.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HitObjectKind {
    /// Type bit 0. A single hit.
    Circle,
    /// Type bit 1. A slider, or a drum roll in osu!taiko.
    Slider {
        /// How many times the slider is traversed.
        slides: u32,
        /// Visual length in osu! pixels.
        length: f64,
    },
    /// Type bit 3. A spinner, or a denden in osu!taiko.
    Spinner {
        /// End time in milliseconds.
        end_time: i64,
    },
    /// Type bit 7. An osu!mania hold note.
    Hold {
        /// End time in milliseconds.
        end_time: i64,
    },
}

/// A row of `[HitObjects]`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HitObject {
    /// Horizontal position in osu! pixels. In osu!mania this selects the column.
    pub x: f64,
    /// Vertical position in osu! pixels.
    pub y: f64,
    /// Time in milliseconds.
    pub time: i64,
    /// Shape of the object.
    pub kind: HitObjectKind,
    /// Hit sound bit field: normal `1`, whistle `2`, finish `4`, clap `8`.
    pub hit_sound: u8,
}

impl HitObject {
    /// Whether the whistle sound is set.
    #[must_use]
    pub const fn has_whistle(&self) -> bool {
        self.hit_sound & 2 != 0
    }

    /// Whether the finish sound is set.
    #[must_use]
    pub const fn has_finish(&self) -> bool {
        self.hit_sound & 4 != 0
    }

    /// Whether the clap sound is set.
    #[must_use]
    pub const fn has_clap(&self) -> bool {
        self.hit_sound & 8 != 0
    }
}

/// A parsed osu! beatmap.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Osu {
    /// The `osu file format vN` number.
    pub format_version: u32,
    /// `[General]`.
    pub general: General,
    /// `[Metadata]`.
    pub metadata: Metadata,
    /// `[Difficulty]`.
    pub difficulty: Difficulty,
    /// `[TimingPoints]`, sorted by time.
    pub timing_points: Vec<TimingPoint>,
    /// `[HitObjects]` in file order.
    pub hit_objects: Vec<HitObject>,
}

impl Osu {
    /// Number of mania columns.
    #[must_use]
    pub fn key_count(&self) -> u32 {
        self.difficulty.key_count()
    }

    /// Beat length (ms) and slider velocity multiplier in effect at `time`.
    ///
    /// Before the first uninherited point, the first one applies.
    #[must_use]
    pub fn timing_at(&self, time: f64) -> (f64, f64) {
        let mut beat_length = self
            .timing_points
            .iter()
            .find(|tp| tp.uninherited)
            .map_or(500.0, |tp| tp.beat_length);
        let mut speed = 1.0;
        for tp in self.timing_points.iter().take_while(|tp| tp.time <= time) {
            if tp.uninherited {
                beat_length = tp.beat_length;
                speed = 1.0;
            } else {
                speed = tp.speed();
            }
        }
        (beat_length, speed)
    }

    /// End time of `object` in milliseconds. Circles end where they start, and slider ends
    /// saturate at the bounds of `i64`.
    #[must_use]
    pub fn end_time(&self, object: &HitObject) -> i64 {
        match object.kind {
            HitObjectKind::Circle => object.time,
            HitObjectKind::Spinner { end_time } | HitObjectKind::Hold { end_time } => end_time,
            HitObjectKind::Slider { slides, length } => {
                let (beat_length, speed) = self.timing_at(object.time as f64);
                let pixels_per_beat = self.difficulty.slider_multiplier * 100.0 * speed;
                if pixels_per_beat <= 0.0 {
                    return object.time;
                }
                let span = length / pixels_per_beat * beat_length * f64::from(slides);
                object.time.saturating_add(span.round() as i64)
            }
        }
    }
}

/// Recoverable oddities found while parsing. The entry is skipped or defaulted.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OsuWarning {
    /// The first line was not `osu file format vN`.
    #[error("missing `osu file format` header, assuming v{LATEST_FORMAT_VERSION}")]
    MissingVersionHeader,
    /// An unknown `[Section]` header.
    #[error("unknown section `{0}`")]
    UnknownSection(String),
    /// A `Key: Value` line without a colon.
    #[error("expected `Key: Value`, found `{0}`")]
    ExpectedKeyValue(String),
    /// A known key with a value that could not be read.
    #[error("invalid value `{value}` for `{key}`")]
    InvalidValue {
        /// The key.
        key: String,
        /// The raw value.
        value: String,
    },
}

/// Errors which make the beatmap unusable.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum OsuParseError {
    /// A timing point row could not be read.
    #[error("invalid timing point at line {line}: {reason}")]
    InvalidTimingPoint {
        /// 1-based line number.
        line: usize,
        /// What was wrong.
        reason: String,
    },
    /// A hit object row could not be read.
    #[error("invalid hit object at line {line}: {reason}")]
    InvalidHitObject {
        /// 1-based line number.
        line: usize,
        /// What was wrong.
        reason: String,
    },
}

/// Parsed beatmap and the warnings found on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct OsuOutput {
    /// The beatmap.
    pub osu: Osu,
    /// Recoverable problems, in source order.
    pub warnings: Vec<WithSpan<OsuWarning>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Section {
    General,
    Editor,
    Metadata,
    Difficulty,
    Events,
    TimingPoints,
    Colours,
    HitObjects,
    Unknown,
}

impl Section {
    /// Recognises a `[Name]` header line.
    pub(crate) fn from_header(line: &str) -> Option<Result<Self, &str>> {
        let name = line.strip_prefix('[')?.strip_suffix(']')?;
        Some(match name {
            "General" => Ok(Self::General),
            "Editor" => Ok(Self::Editor),
            "Metadata" => Ok(Self::Metadata),
            "Difficulty" => Ok(Self::Difficulty),
            "Events" => Ok(Self::Events),
            "TimingPoints" => Ok(Self::TimingPoints),
            "Colours" => Ok(Self::Colours),
            "HitObjects" => Ok(Self::HitObjects),
            other => Err(other),
        })
    }
}

/// Splits a `Key: Value` line.
pub(crate) fn split_key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    Some((key.trim(), value.trim()))
}

/// Reads the `Mode` value. Shared with the quick probe so that both agree.
pub(crate) fn parse_mode(value: &str) -> Option<OsuMode> {
    value.parse::<u8>().ok().and_then(OsuMode::from_code)
}

/// Reads the `CircleSize` value. Shared with the quick probe so that both agree.
pub(crate) fn parse_circle_size(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|size| size.is_finite())
}

fn parse_version_header(line: &str) -> Option<u32> {
    line.trim_start_matches('\u{feff}')
        .trim()
        .strip_prefix("osu file format v")?
        .parse()
        .ok()
}

/// Parses an osu! beatmap from its text.
///
/// # Errors
///
/// Returns [`OsuParseError`] when a timing point or hit object row is unreadable,
/// since skipping it would silently change the chart.
///
/// # Example
///
/// ```
/// use rhythm_chart::format::osu::{parse_osu, OsuMode};
///
/// let source = "osu file format v14\n\n[General]\nMode: 3\n\n[Difficulty]\nCircleSize:4\n";
/// let output = parse_osu(source).unwrap();
/// assert_eq!(output.osu.general.mode, OsuMode::Mania);
/// assert_eq!(output.osu.key_count(), 4);
/// ```
pub fn parse_osu(source: &str) -> Result<OsuOutput, OsuParseError> {
    let mut osu = Osu {
        format_version: LATEST_FORMAT_VERSION,
        general: General::default(),
        metadata: Metadata::default(),
        difficulty: Difficulty::default(),
        timing_points: Vec::new(),
        hit_objects: Vec::new(),
    };
    let mut warnings = Vec::new();
    let mut section = None;
    let mut seen_content = false;

    for (index, (range, raw)) in lines_with_span(source).enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }
        if !seen_content {
            seen_content = true;
            if let Some(version) = parse_version_header(line) {
                osu.format_version = version;
                continue;
            }
            warnings.push(OsuWarning::MissingVersionHeader.with_span(range.clone()));
        }
        if let Some(header) = Section::from_header(line) {
            section = Some(header.unwrap_or_else(|name| {
                warnings.push(OsuWarning::UnknownSection(name.to_owned()).with_span(range.clone()));
                Section::Unknown
            }));
            continue;
        }
        let Some(current) = section else {
            continue;
        };
        match current {
            Section::General | Section::Metadata | Section::Difficulty => {
                let Some((key, value)) = split_key_value(line) else {
                    warnings.push(OsuWarning::ExpectedKeyValue(line.to_owned()).with_span(range));
                    continue;
                };
                let valid = match current {
                    Section::General => apply_general(&mut osu.general, key, value),
                    Section::Metadata => {
                        apply_metadata(&mut osu.metadata, key, value);
                        true
                    }
                    _ => apply_difficulty(&mut osu.difficulty, key, value),
                };
                if !valid {
                    warnings.push(
                        OsuWarning::InvalidValue {
                            key: key.to_owned(),
                            value: value.to_owned(),
                        }
                        .with_span(range),
                    );
                }
            }
            Section::TimingPoints => osu.timing_points.push(parse_timing_point(line, line_no)?),
            Section::HitObjects => osu.hit_objects.push(parse_hit_object(line, line_no)?),
            Section::Editor | Section::Events | Section::Colours | Section::Unknown => {}
        }
    }

    osu.timing_points
        .sort_by(|a, b| a.time.total_cmp(&b.time));
    Ok(OsuOutput { osu, warnings })
}

/// Applies a `[General]` entry, returning `false` if a known key had an unreadable value.
fn apply_general(general: &mut General, key: &str, value: &str) -> bool {
    match key {
        "AudioFilename" => general.audio_filename = value.to_owned(),
        "AudioLeadIn" => match value.parse() {
            Ok(lead_in) => general.audio_lead_in = lead_in,
            Err(_) => return false,
        },
        "PreviewTime" => match value.parse() {
            Ok(preview) => general.preview_time = preview,
            Err(_) => return false,
        },
        "Mode" => match parse_mode(value) {
            Some(mode) => general.mode = mode,
            None => return false,
        },
        _ => {}
    }
    true
}

fn apply_metadata(metadata: &mut Metadata, key: &str, value: &str) {
    let value = value.to_owned();
    match key {
        "Title" => metadata.title = value,
        "TitleUnicode" => metadata.title_unicode = value,
        "Artist" => metadata.artist = value,
        "ArtistUnicode" => metadata.artist_unicode = value,
        "Creator" => metadata.creator = value,
        "Version" => metadata.version = value,
        "Source" => metadata.source = value,
        "Tags" => metadata.tags = value.split_whitespace().map(str::to_owned).collect(),
        _ => {}
    }
}

fn apply_difficulty(difficulty: &mut Difficulty, key: &str, value: &str) -> bool {
    let slot = match key {
        "HPDrainRate" => &mut difficulty.hp_drain_rate,
        "CircleSize" => {
            return match parse_circle_size(value) {
                Some(size) => {
                    difficulty.circle_size = size;
                    true
                }
                None => false,
            };
        }
        "OverallDifficulty" => &mut difficulty.overall_difficulty,
        "ApproachRate" => &mut difficulty.approach_rate,
        "SliderMultiplier" => &mut difficulty.slider_multiplier,
        "SliderTickRate" => &mut difficulty.slider_tick_rate,
        _ => return true,
    };
    match value.parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => {
            *slot = parsed;
            true
        }
        _ => false,
    }
}

fn field<'a>(fields: &[&'a str], index: usize) -> Option<&'a str> {
    fields.get(index).map(|f| f.trim())
}

fn parse_timing_point(line: &str, line_no: usize) -> Result<TimingPoint, OsuParseError> {
    let invalid = |reason: &str| OsuParseError::InvalidTimingPoint {
        line: line_no,
        reason: reason.to_owned(),
    };
    let fields: Vec<&str> = line.split(',').collect();
    let time = field(&fields, 0)
        .and_then(|f| f.parse::<f64>().ok())
        .filter(|t| t.is_finite())
        .ok_or_else(|| invalid("time is not a number"))?;
    let beat_length = field(&fields, 1)
        .and_then(|f| f.parse::<f64>().ok())
        .filter(|b| b.is_finite())
        .ok_or_else(|| invalid("beat length is not a number"))?;
    let meter = match field(&fields, 2) {
        Some(meter) => meter.parse().map_err(|_| invalid("meter is not an integer"))?,
        None => 4,
    };
    let uninherited = match field(&fields, 6) {
        Some("0") => false,
        Some("1") => true,
        Some(_) => return Err(invalid("uninherited flag must be 0 or 1")),
        None => beat_length > 0.0,
    };
    let effects: u8 = match field(&fields, 7) {
        Some(effects) => effects
            .parse()
            .map_err(|_| invalid("effects is not an integer"))?,
        None => 0,
    };
    Ok(TimingPoint {
        time,
        beat_length,
        meter,
        uninherited,
        kiai: effects & 1 != 0,
    })
}

const TYPE_CIRCLE: u32 = 1;
const TYPE_SLIDER: u32 = 1 << 1;
const TYPE_SPINNER: u32 = 1 << 3;
const TYPE_HOLD: u32 = 1 << 7;

fn parse_hit_object(line: &str, line_no: usize) -> Result<HitObject, OsuParseError> {
    let invalid = |reason: &str| OsuParseError::InvalidHitObject {
        line: line_no,
        reason: reason.to_owned(),
    };
    let fields: Vec<&str> = line.split(',').collect();
    let number = |index: usize, name: &str| {
        field(&fields, index)
            .and_then(|f| f.parse::<f64>().ok())
            .filter(|n| n.is_finite())
            .ok_or_else(|| invalid(&format!("{name} is not a number")))
    };
    let x = number(0, "x")?;
    let y = number(1, "y")?;
    let time = number(2, "time")?.round() as i64;
    let type_bits: u32 = field(&fields, 3)
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| invalid("type is not an integer"))?;
    let hit_sound = match field(&fields, 4) {
        Some(sound) => sound
            .parse()
            .map_err(|_| invalid("hit sound is not an integer"))?,
        None => 0,
    };

    let kind = if type_bits & TYPE_HOLD != 0 {
        let end_time = field(&fields, 5)
            .and_then(|extras| extras.split(':').next())
            .and_then(|end| end.trim().parse::<f64>().ok())
            .filter(|end| end.is_finite())
            .ok_or_else(|| invalid("hold note has no end time"))?;
        HitObjectKind::Hold {
            end_time: end_time.round() as i64,
        }
    } else if type_bits & TYPE_SPINNER != 0 {
        HitObjectKind::Spinner {
            end_time: number(5, "spinner end time")?.round() as i64,
        }
    } else if type_bits & TYPE_SLIDER != 0 {
        let slides = field(&fields, 6)
            .and_then(|f| f.parse::<u32>().ok())
            .ok_or_else(|| invalid("slider slides is not an integer"))?;
        HitObjectKind::Slider {
            slides,
            length: number(7, "slider length")?,
        }
    } else if type_bits & TYPE_CIRCLE != 0 {
        HitObjectKind::Circle
    } else {
        return Err(invalid("type has no object bit set"));
    };

    Ok(HitObject {
        x,
        y,
        time,
        kind,
        hit_sound,
    })
}
