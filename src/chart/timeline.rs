//! Tempo and scroll speed transitions.
//!
//! osu! beatmaps already declare their timing in milliseconds. BMS and bmson place objects on
//! beats, so a [`TempoMap`] built from their tempo changes and stops converts positions first.

use itertools::Itertools;

use crate::format::{ChartSource, bms::Bms, osu::Osu};

/// Beats per measure when the format does not tell.
pub const DEFAULT_METER: u32 = 4;

/// A change of tempo or scroll speed, effective until the next point.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransitionPoint {
    /// Time in milliseconds.
    pub time: i64,
    /// Tempo in beats per minute.
    pub bpm: f64,
    /// Scroll speed multiplier. `0.0` while the chart is stopped.
    pub speed: f64,
    /// Beats per measure.
    pub meter: u32,
    /// Whether this section is highlighted (osu! kiai time).
    pub highlight: bool,
}

impl TransitionPoint {
    /// A plain point with unit speed.
    #[must_use]
    pub const fn new(time: i64, bpm: f64) -> Self {
        Self {
            time,
            bpm,
            speed: 1.0,
            meter: DEFAULT_METER,
            highlight: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Anchor {
    beat: f64,
    ms: f64,
    bpm: f64,
    /// Set for the anchor resuming after a stop. Objects on the stop beat itself belong before it.
    after_stop: bool,
}

/// Converts beat positions into milliseconds.
///
/// On the same beat, a tempo change applies before a stop, and the stop is measured with the new
/// tempo. Objects on the beat of a stop are placed at its start.
#[derive(Debug, Clone, PartialEq)]
pub struct TempoMap {
    initial: Anchor,
    /// Tempo changes and stop ends in beat order.
    anchors: Vec<Anchor>,
    /// Start time and length of each stop, in milliseconds.
    stops: Vec<(f64, f64)>,
}

/// A tempo event on the beat axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TempoEvent {
    /// The tempo changes to the given BPM.
    Bpm(f64),
    /// Scrolling stops for the given number of beats.
    Stop(f64),
}

impl TempoMap {
    /// Builds the map from the starting tempo and `(beat, event)` pairs in any order.
    ///
    /// Non-positive tempos and stops are ignored.
    #[must_use]
    pub fn new(initial_bpm: f64, events: impl IntoIterator<Item = (f64, TempoEvent)>) -> Self {
        let initial = Anchor {
            beat: 0.0,
            ms: 0.0,
            bpm: initial_bpm,
            after_stop: false,
        };
        let mut anchors = Vec::new();
        let mut stops = Vec::new();
        let (mut beat, mut ms, mut bpm) = (0.0, 0.0, initial_bpm);

        let events = events
            .into_iter()
            .filter(|(at, event)| {
                let value = match event {
                    TempoEvent::Bpm(value) | TempoEvent::Stop(value) => *value,
                };
                at.is_finite() && *at >= 0.0 && value.is_finite() && value > 0.0
            })
            .sorted_by(|(a, a_event), (b, b_event)| {
                let rank = |event: &TempoEvent| matches!(event, TempoEvent::Stop(_));
                a.total_cmp(b).then(rank(a_event).cmp(&rank(b_event)))
            });
        for (at, event) in events {
            ms += (at - beat) * 60_000.0 / bpm;
            beat = at;
            match event {
                TempoEvent::Bpm(new_bpm) => {
                    bpm = new_bpm;
                    anchors.push(Anchor {
                        beat,
                        ms,
                        bpm,
                        after_stop: false,
                    });
                }
                TempoEvent::Stop(beats) => {
                    let length = beats * 60_000.0 / bpm;
                    stops.push((ms, length));
                    ms += length;
                    anchors.push(Anchor {
                        beat,
                        ms,
                        bpm,
                        after_stop: true,
                    });
                }
            }
        }
        Self {
            initial,
            anchors,
            stops,
        }
    }

    /// Milliseconds at `beat`.
    #[must_use]
    pub fn ms_at(&self, beat: f64) -> f64 {
        let applied = self.anchors.partition_point(|anchor| {
            anchor.beat < beat || (anchor.beat == beat && !anchor.after_stop)
        });
        let anchor = applied
            .checked_sub(1)
            .and_then(|index| self.anchors.get(index))
            .unwrap_or(&self.initial);
        anchor.ms + (beat - anchor.beat) * 60_000.0 / anchor.bpm
    }

    /// Transition points: one per tempo change, and a zero speed span for each stop.
    #[must_use]
    pub fn transitions(&self) -> Vec<TransitionPoint> {
        let tempo = std::iter::once(&self.initial)
            .chain(&self.anchors)
            .filter(|anchor| !anchor.after_stop)
            .map(|anchor| (anchor.ms, TransitionPoint::new(to_ms(anchor.ms), anchor.bpm)));
        let stops = self.stops.iter().flat_map(|&(start, length)| {
            let bpm = self.bpm_at_ms(start);
            let stopped = TransitionPoint {
                speed: 0.0,
                ..TransitionPoint::new(to_ms(start), bpm)
            };
            let resumed = TransitionPoint::new(to_ms(start + length), bpm);
            [(start, stopped), (start + length, resumed)]
        });
        tempo
            .chain(stops)
            .sorted_by(|(a, _), (b, _)| a.total_cmp(b))
            .map(|(_, point)| point)
            .collect()
    }

    fn bpm_at_ms(&self, ms: f64) -> f64 {
        self.anchors
            .iter()
            .take_while(|anchor| anchor.ms <= ms)
            .last()
            .map_or(self.initial.bpm, |anchor| anchor.bpm)
    }
}

/// Rounds milliseconds to the integer time axis of notes.
pub(crate) fn to_ms(ms: f64) -> i64 {
    ms.round() as i64
}

/// Tempo map of a BMS chart.
#[must_use]
pub fn bms_tempo_map(bms: &Bms) -> TempoMap {
    let changes = bms
        .bpm_changes()
        .map(|(time, bpm)| (bms.beat_of(time), TempoEvent::Bpm(bpm)));
    let stops = bms
        .stops()
        .map(|(time, beats)| (bms.beat_of(time), TempoEvent::Stop(beats)));
    TempoMap::new(bms.initial_bpm(), changes.chain(stops))
}

/// Tempo map of a bmson chart, with beats counted in quarter notes.
#[cfg(feature = "bmson")]
#[must_use]
pub fn bmson_tempo_map(bmson: &crate::format::bmson::Bmson) -> TempoMap {
    let resolution = f64::from(bmson.info.resolution.max(1));
    let changes = bmson
        .bpm_events
        .iter()
        .map(|event| (event.y as f64 / resolution, TempoEvent::Bpm(event.bpm)));
    let stops = bmson.stop_events.iter().map(|event| {
        (
            event.y as f64 / resolution,
            TempoEvent::Stop(event.duration as f64 / resolution),
        )
    });
    TempoMap::new(bmson.info.init_bpm, changes.chain(stops))
}

fn osu_transitions(osu: &Osu, base_bpm: f64) -> Vec<TransitionPoint> {
    let mut bpm = base_bpm;
    osu.timing_points
        .iter()
        .map(|point| {
            if let Some(declared) = point.bpm() {
                bpm = declared;
            }
            TransitionPoint {
                time: to_ms(point.time),
                bpm,
                speed: point.speed(),
                meter: if point.meter == 0 { DEFAULT_METER } else { point.meter },
                highlight: point.kiai,
            }
        })
        .collect()
}

/// Builds the transition points of a source.
///
/// Points are ordered by time, and points sharing a time are merged, the later declaration
/// winning. If the source declares
/// nothing, a single point at `0` with `base_bpm` is made. If the first point starts after
/// `first_note`, a copy of it is placed at `first_note`.
#[must_use]
pub fn build_transitions(
    source: &ChartSource,
    base_bpm: f64,
    first_note: Option<i64>,
) -> Vec<TransitionPoint> {
    let declared = match source {
        ChartSource::Osu(osu) => osu_transitions(osu, base_bpm),
        ChartSource::Bms(bms) => bms_tempo_map(bms).transitions(),
        #[cfg(feature = "bmson")]
        ChartSource::Bmson(bmson) => bmson_tempo_map(bmson).transitions(),
    };
    normalize(declared, base_bpm, first_note)
}

fn normalize(
    mut points: Vec<TransitionPoint>,
    base_bpm: f64,
    first_note: Option<i64>,
) -> Vec<TransitionPoint> {
    // Stable, so declaration order still decides between equal times.
    points.sort_by_key(|point| point.time);
    let mut merged: Vec<TransitionPoint> = Vec::with_capacity(points.len());
    for point in points {
        match merged.last_mut() {
            Some(last) if last.time == point.time => *last = point,
            _ => merged.push(point),
        }
    }
    let Some(first) = merged.first().copied() else {
        return vec![TransitionPoint::new(0, base_bpm)];
    };
    if let Some(note) = first_note.filter(|&note| note < first.time) {
        merged.insert(0, TransitionPoint { time: note, ..first });
    }
    merged
}
