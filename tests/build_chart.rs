use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use rhythm_chart::prelude::*;

fn chart_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/charts")
        .join(name)
}

fn load(name: &str) -> Chart {
    let registry = ModeRegistry::default();
    ChartLoader::new(&registry, LoadConfig::default())
        .load(chart_path(name))
        .unwrap()
}

fn load_text(name: &str, text: &str) -> Result<Chart, LoadError> {
    let registry = ModeRegistry::default();
    ChartLoader::new(&registry, LoadConfig::default())
        .load_from(BundledChart::new(name, text.as_bytes()))
}

const PLAYABLE: [&str; 7] = [
    "mania4.osu",
    "mania6.osu",
    "mania7.osu",
    "taiko.osu",
    "simple.bms",
    "random.bms",
    "simple.bmson",
];

#[test]
fn four_key_scenario() {
    let chart = load("mania4.osu");
    assert_eq!(chart.mode(), Mode::Piano4);
    assert_eq!(chart.key_count(), 4);
    assert_eq!(
        chart.notes(),
        &[
            Note::new(1000, 0, NoteKind::Normal),
            Note::new(2000, 3, NoteKind::Head),
            Note::new(2500, 3, NoteKind::Tail),
        ]
    );
    assert_eq!(chart.duration(), 2500);
    assert_eq!(chart.normal_count(), 1);
    assert_eq!(chart.head_count(), 1);

    let header = chart.header();
    assert_eq!(header.title, "Four Lanes");
    assert_eq!(header.title_unicode.as_deref(), Some("四つの道"));
    assert_eq!(header.music_file, "audio.mp3");
    assert_eq!(header.chart_name, "Easy");
    assert_eq!(header.base_bpm, 120.0);
    assert_eq!(header.preview_time, Some(1000));
}

#[test]
fn notes_are_ordered_and_unique() {
    for name in PLAYABLE {
        let chart = load(name);
        let keys: Vec<_> = chart
            .notes()
            .iter()
            .map(|note| (note.time, note.lane))
            .collect();
        assert!(
            keys.windows(2).all(|pair| matches!(pair, [a, b] if a < b)),
            "{name}: {keys:?}"
        );
        assert!(
            chart.notes().iter().all(|note| note.lane < chart.key_count()),
            "{name}"
        );
    }
}

#[test]
fn every_head_is_closed_by_a_tail_on_its_lane() {
    for name in PLAYABLE {
        let chart = load(name);
        let notes = chart.notes();
        for (index, head) in notes.iter().enumerate() {
            if head.kind != NoteKind::Head {
                continue;
            }
            let next = notes
                .iter()
                .skip(index + 1)
                .find(|note| note.lane == head.lane);
            assert!(
                matches!(next, Some(tail) if tail.kind == NoteKind::Tail && tail.time > head.time),
                "{name}: head at {} on lane {}",
                head.time,
                head.lane
            );
        }
    }
}

#[test]
fn tails_keep_the_source_hold_length() {
    let chart = load("mania7.osu");
    let holds: Vec<_> = chart
        .notes()
        .iter()
        .filter(|note| note.kind != NoteKind::Normal)
        .map(|note| (note.time, note.lane, note.kind))
        .collect();
    assert_eq!(
        holds,
        vec![
            (400, 2, NoteKind::Head),
            (1200, 2, NoteKind::Tail),
            (1600, 5, NoteKind::Head),
            (2000, 5, NoteKind::Tail),
            (4300, 0, NoteKind::Head),
            (5000, 0, NoteKind::Tail),
        ]
    );
}

#[test]
fn duration_and_counts_match_the_notes() {
    for name in PLAYABLE {
        let chart = load(name);
        let last = chart.notes().last().map_or(0, |note| note.time);
        assert_eq!(chart.duration(), last, "{name}");
        let normal = chart
            .notes()
            .iter()
            .filter(|note| note.kind == NoteKind::Normal)
            .count();
        let heads = chart
            .notes()
            .iter()
            .filter(|note| note.kind == NoteKind::Head)
            .count();
        let tails = chart
            .notes()
            .iter()
            .filter(|note| note.kind == NoteKind::Tail)
            .count();
        assert_eq!(chart.normal_count(), normal, "{name}");
        assert_eq!(chart.head_count(), heads, "{name}");
        assert_eq!(heads, tails, "{name}");
    }
}

#[test]
fn empty_chart_has_zero_duration() {
    let chart = load_text(
        "empty.osu",
        "osu file format v14\n[General]\nMode: 3\n[Difficulty]\nCircleSize:4\n",
    )
    .unwrap();
    assert!(chart.notes().is_empty());
    assert_eq!(chart.duration(), 0);
    assert_eq!((chart.normal_count(), chart.head_count()), (0, 0));
    assert_eq!(chart.transitions(), &[TransitionPoint::new(0, 120.0)]);
}

#[test]
fn loading_twice_gives_the_same_chart() {
    for name in PLAYABLE {
        assert_eq!(load(name), load(name), "{name}");
    }
}

#[test]
fn seven_key_timeline() {
    let chart = load("mania7.osu");
    let points: Vec<_> = chart
        .transitions()
        .iter()
        .map(|point| (point.time, point.bpm, point.speed, point.highlight))
        .collect();
    assert_eq!(
        points,
        vec![
            (0, 150.0, 1.0, false),
            (4000, 200.0, 1.0, true),
            (6000, 200.0, 2.0, false),
        ]
    );
    assert_eq!(chart.transition_at(5000).map(|point| point.bpm), Some(200.0));
    assert_eq!(chart.normal_count(), 6);
    assert_eq!(chart.head_count(), 3);
    assert_eq!(chart.duration(), 6000);
}

#[test]
fn drum_lanes() {
    let chart = load("taiko.osu");
    assert_eq!(chart.mode(), Mode::Drum);
    assert_eq!(chart.key_count(), 3);
    let notes: Vec<_> = chart
        .notes()
        .iter()
        .map(|note| (note.time, note.lane, note.kind))
        .collect();
    assert_eq!(
        notes,
        vec![
            (500, 0, NoteKind::Normal),
            (1000, 1, NoteKind::Normal),
            (1500, 1, NoteKind::Normal),
            (2000, 2, NoteKind::Head),
            (2500, 2, NoteKind::Tail),
            (3000, 2, NoteKind::Head),
            (4000, 2, NoteKind::Tail),
        ]
    );
}

fn mania_with_object(object: &str) -> String {
    format!(
        "osu file format v14\n[General]\nMode: 3\n[Difficulty]\nCircleSize:4\n\
         [TimingPoints]\n0,500,4,2,0,100,1,0\n[HitObjects]\n\
         64,192,500,1,0,0:0:0:0:\n{object}\n"
    )
}

#[test]
fn lane_out_of_range_is_malformed() {
    for (object, lane) in [
        ("-1,192,1000,1,0,0:0:0:0:", -1),
        ("512,192,1000,1,0,0:0:0:0:", 4),
    ] {
        let err = load_text("bad.osu", &mania_with_object(object)).unwrap_err();
        assert!(
            matches!(
                err.kind,
                LoadErrorKind::Build(BuildError::Malformed(MalformedError::LaneOutOfRange {
                    time: 1000,
                    lane: found,
                    key_count: 4,
                })) if found == lane
            ),
            "{err}"
        );
    }
}

#[test]
fn overlapping_hold_is_malformed() {
    let text = mania_with_object(
        "64,192,1000,128,0,2000:0:0:0:0:\n64,192,1500,1,0,0:0:0:0:",
    );
    let err = load_text("overlap.osu", &text).unwrap_err();
    assert!(matches!(
        err.kind,
        LoadErrorKind::Build(BuildError::Malformed(MalformedError::OverlappingHold {
            time: 1500,
            lane: 0,
            hold_start: 1000,
        }))
    ));
}

#[test]
fn duplicate_note_is_malformed() {
    let err = load_text(
        "twice.osu",
        &mania_with_object("100,192,500,1,0,0:0:0:0:"),
    )
    .unwrap_err();
    assert!(matches!(
        err.kind,
        LoadErrorKind::Build(BuildError::Malformed(MalformedError::DuplicateNote {
            time: 500,
            lane: 0
        }))
    ));
}

#[test]
fn hold_ending_before_it_starts_is_malformed() {
    let err = load_text(
        "backwards.osu",
        &mania_with_object("448,192,1000,128,0,900:0:0:0:0:"),
    )
    .unwrap_err();
    assert!(matches!(
        err.kind,
        LoadErrorKind::Build(BuildError::Malformed(MalformedError::NegativeDuration {
            duration: -100,
            ..
        }))
    ));
}

#[test]
fn zero_length_hold_is_a_tap() {
    let chart = load_text(
        "short.osu",
        &mania_with_object("448,192,1000,128,0,1000:0:0:0:0:"),
    )
    .unwrap();
    assert_eq!(chart.notes().last(), Some(&Note::new(1000, 3, NoteKind::Normal)));
    assert_eq!(chart.head_count(), 0);
}

#[test]
fn any_source_can_be_sung() {
    let output = parse(
        FormatKind::Osu,
        &std::fs::read(chart_path("mania7.osu")).unwrap(),
        &LoadConfig::default(),
    )
    .unwrap();
    let chart = Chart::build(&output.source, Mode::Karaoke).unwrap();
    assert_eq!(chart.key_count(), 1);
    assert!(chart.notes().iter().all(|note| note.lane == 0));
    // Chords collapse into their longest note, and notes inside a hold are dropped.
    let kept: Vec<_> = chart
        .notes()
        .iter()
        .filter(|note| note.kind != NoteKind::Tail)
        .map(|note| note.time)
        .collect();
    assert_eq!(kept, vec![0, 400, 1600, 4300, 6000]);
    assert_eq!(chart.normal_count(), 2);
    assert_eq!(chart.head_count(), 3);
}

#[test]
fn bms_cannot_be_drummed() {
    let output = parse(
        FormatKind::Bms,
        &std::fs::read(chart_path("simple.bms")).unwrap(),
        &LoadConfig::default(),
    )
    .unwrap();
    assert!(matches!(
        Chart::build(&output.source, Mode::Drum),
        Err(BuildError::UnsupportedMode {
            mode: Mode::Drum,
            format: FormatKind::Bms,
        })
    ));
}

fn malformed(name: &str, text: &str) -> MalformedError {
    match load_text(name, text).unwrap_err().kind {
        LoadErrorKind::Build(BuildError::Malformed(err)) => err,
        other => panic!("expected a malformed chart, got {other:?}"),
    }
}

#[test]
fn huge_key_counts_are_malformed() {
    let osu = "osu file format v14\n[General]\nMode: 3\n[Difficulty]\nCircleSize:4000000000\n\
               [HitObjects]\n";
    assert_eq!(
        malformed("wide.osu", osu),
        MalformedError::KeyCountOutOfRange(4_000_000_000)
    );

    let bmson = |hint: &str, x: u32| {
        format!(
            r#"{{"info": {{"title": "t", "artist": "a", "init_bpm": 120, "mode_hint": "{hint}"}},
                "sound_channels": [{{"name": "a.wav", "notes": [{{"x": {x}, "y": 0}}]}}]}}"#
        )
    };
    assert_eq!(
        malformed("wide.bmson", &bmson("generic-nkeys", 4_000_000_000)),
        MalformedError::KeyCountOutOfRange(4_000_000_000)
    );
    assert_eq!(
        malformed("wide.bmson", &bmson("generic-4000000000k", 1)),
        MalformedError::KeyCountOutOfRange(4_000_000_000)
    );
}

#[test]
fn out_of_range_hold_ends_are_malformed() {
    assert_eq!(
        malformed(
            "early.osu",
            &mania_with_object("64,192,-5,128,0,1e300:0:0:0:0:")
        ),
        MalformedError::NegativeTime { time: -5, lane: 0 }
    );
    assert_eq!(
        malformed(
            "endless.osu",
            &mania_with_object("64,192,1000,128,0,1e300:0:0:0:0:")
        ),
        MalformedError::TimeOutOfRange {
            time: i64::MAX,
            lane: 0
        }
    );
}

#[test]
fn out_of_range_slider_end_is_malformed() {
    let text = "osu file format v14\n[General]\nMode: 1\n\
                [TimingPoints]\n0,500,4,2,0,100,1,0\n[HitObjects]\n\
                256,192,1000,2,0,L|300:192,1,1e300\n";
    assert_eq!(
        malformed("roll.osu", text),
        MalformedError::TimeOutOfRange {
            time: i64::MAX,
            lane: 2
        }
    );
}

#[test]
fn pulse_overflow_is_malformed() {
    let text = r#"{"info": {"title": "t", "artist": "a", "init_bpm": 120},
        "sound_channels": [{"name": "a.wav", "notes": [{"x": 1, "y": 18446744073709551615, "l": 1}]}]}"#;
    assert_eq!(
        malformed("late.bmson", text),
        MalformedError::TimeOutOfRange {
            time: i64::MAX,
            lane: 1
        }
    );
}
