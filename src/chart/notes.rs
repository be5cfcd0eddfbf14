//! Notes and their extraction from each format.
//!
//! Every format is first reduced to [`HitObject`]s, which carry a resolved but unchecked lane.
//! [`HitObject::into_notes`] then validates one object and expands it into [`Note`]s.

use std::collections::HashMap;

use super::{
    BuildError, MalformedError, check_key_count,
    timeline::{bms_tempo_map, to_ms},
};
use crate::{
    format::{
        ChartSource,
        bms::{Bms, BmsKey, PlayerSide},
        osu::{HitObjectKind, Osu, OsuMode, PLAYFIELD_WIDTH},
    },
    mode::Mode,
};

/// Lanes of the drum mode.
pub const DRUM_KEY_COUNT: u32 = 3;
/// Lane of centre hits.
pub const DRUM_DON: i64 = 0;
/// Lane of rim hits.
pub const DRUM_KAT: i64 = 1;
/// Lane of drum rolls and spinners.
pub const DRUM_ROLL: i64 = 2;

/// Lanes of the karaoke mode.
pub const KARAOKE_KEY_COUNT: u32 = 1;

/// Latest time a note may take, in milliseconds. About 24 days.
pub const MAX_TIME: i64 = i32::MAX as i64;

/// Kind of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NoteKind {
    /// A single tap.
    Normal,
    /// Start of a hold.
    Head,
    /// End of a hold. Closes the latest [`NoteKind::Head`] on the same lane.
    Tail,
}

/// A playable event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Note {
    /// Time in milliseconds, never negative.
    pub time: i64,
    /// Lane index, below the key count of the chart.
    pub lane: u32,
    /// Kind of this note.
    pub kind: NoteKind,
}

impl Note {
    /// Creates a note.
    #[must_use]
    pub const fn new(time: i64, lane: u32, kind: NoteKind) -> Self {
        Self { time, lane, kind }
    }
}

/// A musical event of any format, before validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HitObject {
    /// Start time in milliseconds.
    pub time: i64,
    /// Lane resolved from the position signal of the format. May be out of range.
    pub lane: i64,
    /// Hold length in milliseconds. Zero for a tap.
    pub duration: i64,
}

impl HitObject {
    /// A tap.
    #[must_use]
    pub const fn tap(time: i64, lane: i64) -> Self {
        Self {
            time,
            lane,
            duration: 0,
        }
    }

    /// A hold from `time` to `end`. The length saturates at the bounds of `i64`.
    #[must_use]
    pub const fn hold(time: i64, lane: i64, end: i64) -> Self {
        Self {
            time,
            lane,
            duration: end.saturating_sub(time),
        }
    }

    /// Expands this object into one [`NoteKind::Normal`], or a [`NoteKind::Head`] at `time` and
    /// a [`NoteKind::Tail`] at `time + duration`.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedError`] if the lane is outside `0..key_count`, the time or duration
    /// is negative, or the note ends past [`MAX_TIME`].
    ///
    /// ```
    /// use rhythm_chart::chart::notes::{HitObject, Note, NoteKind};
    ///
    /// let notes = HitObject::hold(2000, 3, 2500).into_notes(4).unwrap();
    /// assert_eq!(
    ///     notes,
    ///     vec![Note::new(2000, 3, NoteKind::Head), Note::new(2500, 3, NoteKind::Tail)]
    /// );
    /// assert!(HitObject::tap(0, 4).into_notes(4).is_err());
    /// ```
    pub fn into_notes(self, key_count: u32) -> Result<Vec<Note>, MalformedError> {
        let Self {
            time,
            lane,
            duration,
        } = self;
        let lane = u32::try_from(lane)
            .ok()
            .filter(|&lane| lane < key_count)
            .ok_or(MalformedError::LaneOutOfRange {
                time,
                lane,
                key_count,
            })?;
        if time < 0 {
            return Err(MalformedError::NegativeTime { time, lane });
        }
        if duration < 0 {
            return Err(MalformedError::NegativeDuration {
                time,
                lane,
                duration,
            });
        }
        let end = time.saturating_add(duration);
        if end > MAX_TIME {
            return Err(MalformedError::TimeOutOfRange { time: end, lane });
        }
        Ok(if duration == 0 {
            vec![Note::new(time, lane, NoteKind::Normal)]
        } else {
            vec![
                Note::new(time, lane, NoteKind::Head),
                Note::new(end, lane, NoteKind::Tail),
            ]
        })
    }
}

/// Hit objects of a source played under `mode`, with the key count they assume.
///
/// # Errors
///
/// Returns [`BuildError::UnsupportedMode`] when the source cannot be played under `mode`, and
/// [`MalformedError::ZeroKeyCount`] or [`MalformedError::KeyCountOutOfRange`] when the key count
/// is not playable.
pub fn hit_objects(source: &ChartSource, mode: Mode) -> Result<(u32, Vec<HitObject>), BuildError> {
    let unsupported = || BuildError::UnsupportedMode {
        mode,
        format: source.kind(),
    };
    let (key_count, objects) = match (source, mode) {
        (ChartSource::Osu(osu), Mode::Piano4 | Mode::Piano7)
            if osu.general.mode == OsuMode::Mania =>
        {
            (osu.key_count(), osu_mania_objects(osu))
        }
        (ChartSource::Osu(osu), Mode::Drum) if osu.general.mode == OsuMode::Taiko => {
            (DRUM_KEY_COUNT, osu_taiko_objects(osu))
        }
        (ChartSource::Osu(osu), Mode::Karaoke) => (
            KARAOKE_KEY_COUNT,
            single_lane(
                osu.hit_objects
                    .iter()
                    .map(|object| HitObject::hold(object.time, 0, osu.end_time(object))),
            ),
        ),
        (ChartSource::Bms(bms), Mode::Piano4 | Mode::Piano7) => bms_objects(bms),
        (ChartSource::Bms(bms), Mode::Karaoke) => {
            (KARAOKE_KEY_COUNT, single_lane(bms_objects(bms).1))
        }
        #[cfg(feature = "bmson")]
        (ChartSource::Bmson(bmson), Mode::Piano4 | Mode::Piano7) => {
            (bmson.key_count(), bmson::objects(bmson))
        }
        #[cfg(feature = "bmson")]
        (ChartSource::Bmson(bmson), Mode::Karaoke) => {
            (KARAOKE_KEY_COUNT, single_lane(bmson::objects(bmson)))
        }
        _ => return Err(unsupported()),
    };
    check_key_count(key_count)?;
    Ok((key_count, objects))
}

/// Column of a mania object: `floor(x * key_count / 512)`.
fn mania_lane(x: f64, key_count: u32) -> i64 {
    (x * f64::from(key_count) / PLAYFIELD_WIDTH).floor() as i64
}

fn osu_mania_objects(osu: &Osu) -> Vec<HitObject> {
    let key_count = osu.key_count();
    osu.hit_objects
        .iter()
        .map(|object| {
            let lane = mania_lane(object.x, key_count);
            match object.kind {
                HitObjectKind::Hold { end_time } => HitObject::hold(object.time, lane, end_time),
                _ => HitObject::tap(object.time, lane),
            }
        })
        .collect()
}

fn osu_taiko_objects(osu: &Osu) -> Vec<HitObject> {
    osu.hit_objects
        .iter()
        .map(|object| match object.kind {
            HitObjectKind::Circle if object.has_whistle() || object.has_clap() => {
                HitObject::tap(object.time, DRUM_KAT)
            }
            HitObjectKind::Circle => HitObject::tap(object.time, DRUM_DON),
            _ => HitObject::hold(object.time, DRUM_ROLL, osu.end_time(object)),
        })
        .collect()
}

/// Puts every object on lane `0`, dropping those which start on or inside the previous one.
fn single_lane(objects: impl IntoIterator<Item = HitObject>) -> Vec<HitObject> {
    let mut objects: Vec<_> = objects.into_iter().collect();
    objects.sort_by_key(|object| (object.time, std::cmp::Reverse(object.duration)));
    let mut kept: Vec<HitObject> = Vec::with_capacity(objects.len());
    for object in objects {
        let free = kept
            .last()
            .is_none_or(|last| object.time > last.time.saturating_add(last.duration.max(0)));
        if free {
            kept.push(HitObject { lane: 0, ..object });
        }
    }
    kept
}

/// Lane of a BMS key: scratch `0`, keys `1` to `7`, and the player 2 side shifted by 8.
const fn bms_lane(side: PlayerSide, key: BmsKey) -> i64 {
    let lane = match key {
        BmsKey::Scratch => 0,
        BmsKey::Key(key) => key as i64,
    };
    match side {
        PlayerSide::Player1 => lane,
        PlayerSide::Player2 => lane + 8,
    }
}

/// Key count of a BMS chart: 16 when both sides are used, else 8.
#[must_use]
pub fn bms_key_count(bms: &Bms) -> u32 {
    if bms.is_double_play() { 16 } else { 8 }
}

fn bms_objects(bms: &Bms) -> (u32, Vec<HitObject>) {
    let tempo = bms_tempo_map(bms);
    let ms = |time| to_ms(tempo.ms_at(bms.beat_of(time)));
    let ln_obj = bms.header.ln_obj;

    let mut objects: Vec<HitObject> = Vec::new();
    // Visible note last placed on each lane, as an index into `objects`.
    let mut last_visible: HashMap<i64, usize> = HashMap::new();
    // Long note start waiting for its end on each lane.
    let mut open_long: HashMap<i64, i64> = HashMap::new();

    for (time, side, key, long, id) in bms.notes() {
        let lane = bms_lane(side, key);
        let at = ms(time);
        if long {
            match open_long.remove(&lane) {
                Some(start) => objects.push(HitObject::hold(start, lane, at)),
                None => {
                    open_long.insert(lane, at);
                }
            }
            continue;
        }
        if Some(id) == ln_obj {
            close_with_ln_obj(&mut objects, last_visible.remove(&lane), at);
            continue;
        }
        last_visible.insert(lane, objects.len());
        objects.push(HitObject::tap(at, lane));
    }
    // An unterminated long note start is played as a tap.
    objects.extend(
        open_long
            .into_iter()
            .map(|(lane, start)| HitObject::tap(start, lane)),
    );
    (bms_key_count(bms), objects)
}

fn close_with_ln_obj(objects: &mut [HitObject], previous: Option<usize>, end: i64) {
    let Some(object) = previous.and_then(|index| objects.get_mut(index)) else {
        return;
    };
    object.duration = end.saturating_sub(object.time);
}

#[cfg(feature = "bmson")]
mod bmson {
    use super::{HitObject, to_ms};
    use crate::{
        chart::timeline::bmson_tempo_map,
        format::bmson::{Bmson, BmsonLayout},
    };

    /// Lane of a bmson note under the layout of the chart.
    pub(super) fn lane(layout: BmsonLayout, x: u32) -> i64 {
        let x = i64::from(x);
        match layout {
            BmsonLayout::Beat => match x {
                8 => 0,
                _ => x,
            },
            BmsonLayout::BeatDouble => match x {
                8 => 0,
                16 => 8,
                _ => x,
            },
            BmsonLayout::Sequential => x - 1,
        }
    }

    pub(super) fn objects(bmson: &Bmson) -> Vec<HitObject> {
        let tempo = bmson_tempo_map(bmson);
        let resolution = f64::from(bmson.info.resolution.max(1));
        let ms = |pulse: u64| to_ms(tempo.ms_at(pulse as f64 / resolution));
        let layout = bmson.layout();
        bmson
            .playable_notes()
            .filter_map(|note| {
                let x = note.x?;
                let start = ms(note.y);
                Some(if note.l == 0 {
                    HitObject::tap(start, lane(layout, x))
                } else {
                    HitObject::hold(start, lane(layout, x), ms(note.y.saturating_add(note.l)))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::format::bms::{parse_bms, rng::FixedRng};

    fn bms(source: &str) -> Bms {
        parse_bms(source, FixedRng::new(vec![])).bms
    }

    #[test]
    fn zero_duration_hold_is_a_tap() {
        assert_eq!(
            HitObject::hold(100, 1, 100).into_notes(4).unwrap(),
            vec![Note::new(100, 1, NoteKind::Normal)]
        );
    }

    #[test]
    fn malformed_objects() {
        assert_eq!(
            HitObject::tap(0, -1).into_notes(4),
            Err(MalformedError::LaneOutOfRange {
                time: 0,
                lane: -1,
                key_count: 4
            })
        );
        assert!(matches!(
            HitObject::tap(-5, 0).into_notes(4),
            Err(MalformedError::NegativeTime { .. })
        ));
        assert!(matches!(
            HitObject::hold(100, 0, 50).into_notes(4),
            Err(MalformedError::NegativeDuration { duration: -50, .. })
        ));
    }

    #[test]
    fn extreme_times_do_not_overflow() {
        assert_eq!(
            HitObject::hold(1000, 0, i64::MAX).into_notes(4),
            Err(MalformedError::TimeOutOfRange {
                time: i64::MAX,
                lane: 0
            })
        );
        assert!(matches!(
            HitObject::hold(-5, 0, i64::MAX).into_notes(4),
            Err(MalformedError::NegativeTime { time: -5, .. })
        ));
        assert!(matches!(
            HitObject::hold(i64::MAX, 0, i64::MIN).into_notes(4),
            Err(MalformedError::NegativeDuration { duration: i64::MIN, .. })
        ));
        assert!(matches!(
            HitObject::tap(i64::MAX, 0).into_notes(4),
            Err(MalformedError::TimeOutOfRange { .. })
        ));
        assert_eq!(
            HitObject::tap(MAX_TIME, 1).into_notes(4).unwrap(),
            vec![Note::new(MAX_TIME, 1, NoteKind::Normal)]
        );
        let kept = single_lane([HitObject::hold(0, 0, i64::MAX), HitObject::tap(10, 0)]);
        assert_eq!(kept, vec![HitObject::hold(0, 0, i64::MAX)]);
    }

    #[test]
    fn mania_columns() {
        let lanes: Vec<_> = [0.0, 64.0, 192.0, 320.0, 448.0, 511.0]
            .into_iter()
            .map(|x| mania_lane(x, 4))
            .collect();
        assert_eq!(lanes, vec![0, 0, 1, 2, 3, 3]);
        assert_eq!(mania_lane(-1.0, 4), -1);
        assert_eq!(mania_lane(512.0, 4), 4);
    }

    #[test]
    fn bms_lanes_and_long_notes() {
        // 120 BPM, one measure is 2000 ms. The stray `ZZ` has no note to close.
        let chart = bms("
#BPM 120
#LNOBJ ZZ
#00116:01
#00111:0100
#00119:00000000000000ZZ
#00159:0101
#00229:01
");
        let (key_count, mut objects) = bms_objects(&chart);
        objects.sort_by_key(|object| (object.time, object.lane));
        assert_eq!(key_count, 16);
        assert_eq!(
            objects,
            vec![
                HitObject::tap(2000, 0),
                HitObject::tap(2000, 1),
                HitObject::hold(2000, 7, 3000),
                HitObject::tap(4000, 15),
            ]
        );
    }

    #[test]
    fn ln_obj_closes_previous_note() {
        let chart = bms("#BPM 120\n#LNOBJ ZZ\n#00113:0100ZZ00\n");
        let (key_count, objects) = bms_objects(&chart);
        assert_eq!(key_count, 8);
        assert_eq!(objects, vec![HitObject::hold(2000, 3, 3000)]);
    }

    #[test]
    fn single_lane_drops_overlaps() {
        let kept = single_lane([
            HitObject::tap(0, 3),
            HitObject::hold(0, 1, 500),
            HitObject::tap(200, 2),
            HitObject::tap(500, 0),
            HitObject::tap(501, 2),
        ]);
        assert_eq!(kept, vec![HitObject::hold(0, 0, 500), HitObject::tap(501, 0)]);
    }

    #[cfg(feature = "bmson")]
    #[test]
    fn bmson_lane_layouts() {
        use crate::format::bmson::BmsonLayout;

        assert_eq!(bmson::lane(BmsonLayout::Beat, 8), 0);
        assert_eq!(bmson::lane(BmsonLayout::Beat, 7), 7);
        assert_eq!(bmson::lane(BmsonLayout::Beat, 9), 9);
        assert_eq!(bmson::lane(BmsonLayout::BeatDouble, 16), 8);
        assert_eq!(bmson::lane(BmsonLayout::BeatDouble, 9), 9);
        assert_eq!(bmson::lane(BmsonLayout::Sequential, 1), 0);
    }
}
