//! The normalized chart: header, transitions and the ordered note sequence.
//!
//! A [`Chart`] is built from a [`ChartSource`] in four steps:
//!
//! 1. [`ChartHeader::from_source`] reads the metadata.
//! 2. [`notes::hit_objects`] reduces the source to [`HitObject`]s for the requested mode.
//! 3. [`HitObject::into_notes`] validates and expands each of them.
//! 4. [`Chart::new`] orders the notes by time then lane, checks the hold structure and derives
//!    the duration and counts.
//!
//! Transition points come from [`timeline::build_transitions`] and always cover the first note.
//!
//! Key counts are bounded by [`MAX_KEY_COUNT`] and note times by [`notes::MAX_TIME`], so a
//! hostile file is rejected with a [`MalformedError`] before anything is sized after it.

pub mod header;
pub mod level;
pub mod notes;
pub mod timeline;

use std::collections::HashMap;

use itertools::Itertools;
use thiserror::Error;

use self::{
    header::ChartHeader,
    notes::{HitObject, MAX_TIME, Note, NoteKind},
    timeline::TransitionPoint,
};
use crate::{
    format::{ChartSource, FormatKind},
    mode::Mode,
};

/// Most lanes a chart may declare.
pub const MAX_KEY_COUNT: u32 = 32;

/// Structural problems which make a chart unplayable.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MalformedError {
    /// The chart declares no lane.
    #[error("key count must be positive")]
    ZeroKeyCount,
    /// The chart declares more lanes than [`MAX_KEY_COUNT`].
    #[error("key count {0} exceeds the limit of {MAX_KEY_COUNT}")]
    KeyCountOutOfRange(u32),
    /// The starting tempo is zero, negative or not a number.
    #[error("base tempo must be positive, found {0}")]
    InvalidTempo(String),
    /// A hit object resolved to a lane outside `0..key_count`.
    #[error("lane {lane} at {time} ms is out of range for {key_count} keys")]
    LaneOutOfRange {
        /// Time of the object.
        time: i64,
        /// The resolved lane.
        lane: i64,
        /// Key count of the chart.
        key_count: u32,
    },
    /// A hit object starts before the chart.
    #[error("note on lane {lane} has negative time {time} ms")]
    NegativeTime {
        /// Time of the object.
        time: i64,
        /// Lane of the object.
        lane: u32,
    },
    /// A note, or the end of a hold, lies past [`MAX_TIME`].
    #[error("note on lane {lane} at {time} ms is past the latest playable time")]
    TimeOutOfRange {
        /// Time of the note or of the hold end.
        time: i64,
        /// Lane of the note.
        lane: u32,
    },
    /// A hold ends before it starts.
    #[error("hold on lane {lane} at {time} ms has negative duration {duration} ms")]
    NegativeDuration {
        /// Start of the hold.
        time: i64,
        /// Lane of the hold.
        lane: u32,
        /// The declared length.
        duration: i64,
    },
    /// Two notes share a time and a lane.
    #[error("duplicate note on lane {lane} at {time} ms")]
    DuplicateNote {
        /// Time of the notes.
        time: i64,
        /// Lane of the notes.
        lane: u32,
    },
    /// A note appears on a lane while a hold is still open there.
    #[error("note on lane {lane} at {time} ms overlaps the hold started at {hold_start} ms")]
    OverlappingHold {
        /// Time of the offending note.
        time: i64,
        /// Lane of both.
        lane: u32,
        /// Start of the open hold.
        hold_start: i64,
    },
    /// A hold is never closed.
    #[error("hold on lane {lane} at {time} ms has no tail")]
    UnclosedHold {
        /// Start of the hold.
        time: i64,
        /// Lane of the hold.
        lane: u32,
    },
    /// A tail without an open hold.
    #[error("tail on lane {lane} at {time} ms closes no hold")]
    TailWithoutHead {
        /// Time of the tail.
        time: i64,
        /// Lane of the tail.
        lane: u32,
    },
    /// No transition point was given.
    #[error("chart has no transition point")]
    NoTransition,
    /// A transition point does not come strictly after the previous one.
    #[error("transition point at {time} ms is out of order")]
    UnorderedTransition {
        /// Time of the offending point.
        time: i64,
    },
    /// The first transition point starts after the first note.
    #[error("first transition at {transition} ms starts after the first note at {note} ms")]
    UncoveredNote {
        /// Time of the first transition point.
        transition: i64,
        /// Time of the first note.
        note: i64,
    },
}

/// Errors of building a chart from a parsed source.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum BuildError {
    /// The source is structurally broken.
    #[error("malformed chart: {0}")]
    Malformed(#[from] MalformedError),
    /// The source cannot be played under the mode.
    #[error("{format} charts of this kind cannot be played in {mode} mode")]
    UnsupportedMode {
        /// Requested mode.
        mode: Mode,
        /// Format of the source.
        format: FormatKind,
    },
}

/// A playable chart. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Chart {
    header: ChartHeader,
    transitions: Vec<TransitionPoint>,
    mode: Mode,
    key_count: u32,
    notes: Vec<Note>,
    duration: i64,
    normal_count: usize,
    head_count: usize,
}

impl Chart {
    /// Builds the chart of `source` played under `mode`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] if the source does not fit the mode or is malformed. No partial
    /// chart is returned.
    pub fn build(source: &ChartSource, mode: Mode) -> Result<Self, BuildError> {
        let header = ChartHeader::from_source(source);
        check_tempo(header.base_bpm)?;
        let (key_count, objects) = notes::hit_objects(source, mode)?;
        let notes: Vec<Note> = objects
            .into_iter()
            .map(|object: HitObject| object.into_notes(key_count))
            .flatten_ok()
            .collect::<Result<_, _>>()?;
        let first_note = notes.iter().map(|note| note.time).min();
        let transitions = timeline::build_transitions(source, header.base_bpm, first_note);
        Ok(Self::new(header, transitions, mode, key_count, notes)?)
    }

    /// Assembles a chart from already expanded notes in any order.
    ///
    /// `transitions` must ascend with unique times, and the first point must not start after the
    /// first note.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedError`] when notes collide, holds overlap or stay open, a note is out
    /// of range, or the transitions are out of order or start too late.
    ///
    /// ```
    /// use rhythm_chart::{
    ///     chart::{Chart, header::ChartHeader, notes::{Note, NoteKind}, timeline::TransitionPoint},
    ///     mode::Mode,
    /// };
    ///
    /// let header = ChartHeader {
    ///     music_file: String::new(),
    ///     title: "t".into(),
    ///     title_unicode: None,
    ///     artist: "a".into(),
    ///     artist_unicode: None,
    ///     charter: String::new(),
    ///     chart_name: String::new(),
    ///     source: String::new(),
    ///     base_bpm: 120.0,
    ///     preview_time: None,
    /// };
    /// let notes = vec![
    ///     Note::new(2500, 3, NoteKind::Tail),
    ///     Note::new(1000, 0, NoteKind::Normal),
    ///     Note::new(2000, 3, NoteKind::Head),
    /// ];
    /// let chart = Chart::new(header, vec![TransitionPoint::new(0, 120.0)], Mode::Piano4, 4, notes)
    ///     .unwrap();
    /// assert_eq!(chart.duration(), 2500);
    /// assert_eq!((chart.normal_count(), chart.head_count()), (1, 1));
    /// ```
    pub fn new(
        header: ChartHeader,
        transitions: Vec<TransitionPoint>,
        mode: Mode,
        key_count: u32,
        mut notes: Vec<Note>,
    ) -> Result<Self, MalformedError> {
        check_key_count(key_count)?;
        check_tempo(header.base_bpm)?;
        notes.sort_by_key(|note| (note.time, note.lane));
        validate(&notes, key_count)?;
        check_transitions(&transitions, notes.first())?;

        let duration = notes.last().map_or(0, |note| note.time);
        let counts = notes.iter().counts_by(|note| note.kind);
        let count = |kind| counts.get(&kind).copied().unwrap_or(0);
        Ok(Self {
            normal_count: count(NoteKind::Normal),
            head_count: count(NoteKind::Head),
            header,
            transitions,
            mode,
            key_count,
            notes,
            duration,
        })
    }

    /// Display metadata.
    #[must_use]
    pub const fn header(&self) -> &ChartHeader {
        &self.header
    }

    /// Tempo and speed transitions, ascending by time with unique times.
    #[must_use]
    pub fn transitions(&self) -> &[TransitionPoint] {
        &self.transitions
    }

    /// Mode the chart was built for.
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// Number of lanes.
    #[must_use]
    pub const fn key_count(&self) -> u32 {
        self.key_count
    }

    /// Notes ordered by time, then lane.
    #[must_use]
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// Time of the last note, `0` without notes.
    #[must_use]
    pub const fn duration(&self) -> i64 {
        self.duration
    }

    /// Number of taps.
    #[must_use]
    pub const fn normal_count(&self) -> usize {
        self.normal_count
    }

    /// Number of holds. Tails are not counted.
    #[must_use]
    pub const fn head_count(&self) -> usize {
        self.head_count
    }

    /// Transition point in effect at `time`: the last one not after it, or the first one.
    #[must_use]
    pub fn transition_at(&self, time: i64) -> Option<&TransitionPoint> {
        let index = self.transitions.partition_point(|point| point.time <= time);
        self.transitions.get(index.saturating_sub(1))
    }
}

pub(crate) const fn check_key_count(key_count: u32) -> Result<(), MalformedError> {
    match key_count {
        0 => Err(MalformedError::ZeroKeyCount),
        1..=MAX_KEY_COUNT => Ok(()),
        _ => Err(MalformedError::KeyCountOutOfRange(key_count)),
    }
}

fn check_tempo(bpm: f64) -> Result<(), MalformedError> {
    if bpm.is_finite() && bpm > 0.0 {
        Ok(())
    } else {
        Err(MalformedError::InvalidTempo(bpm.to_string()))
    }
}

fn check_transitions(
    transitions: &[TransitionPoint],
    first_note: Option<&Note>,
) -> Result<(), MalformedError> {
    let first = transitions.first().ok_or(MalformedError::NoTransition)?;
    if let Some((_, point)) = transitions
        .iter()
        .tuple_windows()
        .find(|(a, b)| a.time >= b.time)
    {
        return Err(MalformedError::UnorderedTransition { time: point.time });
    }
    match first_note {
        Some(note) if note.time < first.time => Err(MalformedError::UncoveredNote {
            transition: first.time,
            note: note.time,
        }),
        _ => Ok(()),
    }
}

/// Checks sorted notes for collisions and hold pairing.
fn validate(notes: &[Note], key_count: u32) -> Result<(), MalformedError> {
    if let Some((a, _)) = notes
        .iter()
        .tuple_windows()
        .find(|(a, b)| a.time == b.time && a.lane == b.lane)
    {
        return Err(MalformedError::DuplicateNote {
            time: a.time,
            lane: a.lane,
        });
    }
    // Start of the open hold on each lane.
    let mut open: HashMap<u32, i64> = HashMap::new();
    for note in notes {
        if note.lane >= key_count {
            return Err(MalformedError::LaneOutOfRange {
                time: note.time,
                lane: i64::from(note.lane),
                key_count,
            });
        }
        if note.time < 0 {
            return Err(MalformedError::NegativeTime {
                time: note.time,
                lane: note.lane,
            });
        }
        if note.time > MAX_TIME {
            return Err(MalformedError::TimeOutOfRange {
                time: note.time,
                lane: note.lane,
            });
        }
        match (note.kind, open.get(&note.lane).copied()) {
            (NoteKind::Tail, Some(_)) => {
                open.remove(&note.lane);
            }
            (NoteKind::Tail, None) => {
                return Err(MalformedError::TailWithoutHead {
                    time: note.time,
                    lane: note.lane,
                });
            }
            (_, Some(hold_start)) => {
                return Err(MalformedError::OverlappingHold {
                    time: note.time,
                    lane: note.lane,
                    hold_start,
                });
            }
            (NoteKind::Head, None) => {
                open.insert(note.lane, note.time);
            }
            (NoteKind::Normal, None) => {}
        }
    }
    if let Some((lane, time)) = open.into_iter().min() {
        return Err(MalformedError::UnclosedHold { time, lane });
    }
    Ok(())
}
