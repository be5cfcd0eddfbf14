use std::{
    fs,
    path::{Path, PathBuf},
};

use pretty_assertions::assert_eq;
use rhythm_chart::prelude::*;

fn chart_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/charts")
        .join(name)
}

#[test]
fn bms_chart() {
    let registry = ModeRegistry::default();
    let loader = ChartLoader::new(&registry, LoadConfig::default());
    let chart = loader.load(chart_path("simple.bms")).unwrap();

    assert_eq!(chart.mode(), Mode::Piano7);
    assert_eq!(chart.key_count(), 8);
    // 120 BPM, the first measure starts at 2000 ms and lasts 2000 ms.
    assert_eq!(
        chart.notes(),
        &[
            Note::new(2000, 0, NoteKind::Normal),
            Note::new(2000, 1, NoteKind::Normal),
            Note::new(2500, 1, NoteKind::Normal),
            Note::new(2500, 5, NoteKind::Head),
            Note::new(3000, 1, NoteKind::Normal),
            Note::new(3500, 1, NoteKind::Normal),
            Note::new(3500, 5, NoteKind::Tail),
        ]
    );
    let header = chart.header();
    assert_eq!(header.title, "Simple");
    assert_eq!(header.artist, "Someone");
    assert_eq!(header.chart_name, "[Normal]");
    assert_eq!(header.source, "Test");
    assert_eq!(header.base_bpm, 120.0);
}

#[test]
fn bmson_chart() {
    let registry = ModeRegistry::default();
    let loader = ChartLoader::new(&registry, LoadConfig::default());
    let chart = loader.load(chart_path("simple.bmson")).unwrap();

    assert_eq!(chart.mode(), Mode::Piano7);
    assert_eq!(chart.key_count(), 8);
    assert_eq!(
        chart.notes(),
        &[
            Note::new(0, 1, NoteKind::Normal),
            Note::new(500, 0, NoteKind::Head),
            Note::new(1500, 0, NoteKind::Tail),
        ]
    );
    assert_eq!(chart.header().charter, "Charter");
    assert_eq!(chart.header().chart_name, "HYPER");
}

#[test]
fn random_blocks_follow_the_configured_policy() {
    let registry = ModeRegistry::default();
    let lanes = |random: BmsRandom| {
        ChartLoader::new(&registry, LoadConfig::default().with_bms_random(random))
            .load(chart_path("random.bms"))
            .unwrap()
            .notes()
            .iter()
            .map(|note| note.lane)
            .collect::<Vec<_>>()
    };
    assert_eq!(lanes(BmsRandom::default()), vec![1]);
    assert_eq!(lanes(BmsRandom::Fixed(vec![2])), vec![2]);
    assert_eq!(lanes(BmsRandom::Seeded(7)), lanes(BmsRandom::Seeded(7)));
}

#[test]
fn shift_jis_title() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sjis.bms");
    // "#TITLE あ" in Shift_JIS.
    fs::write(&path, b"#TITLE \x82\xa0\n#BPM 120\n#00111:01\n").unwrap();

    let registry = ModeRegistry::default();
    let chart = ChartLoader::new(&registry, LoadConfig::default())
        .load(&path)
        .unwrap();
    assert_eq!(chart.header().title, "あ");

    let strict = LoadConfig::default().with_shift_jis_fallback(false);
    let chart = ChartLoader::new(&registry, strict).load(&path).unwrap();
    assert_ne!(chart.header().title, "あ");
}

#[test]
fn errors_carry_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let registry = ModeRegistry::default();
    let loader = ChartLoader::new(&registry, LoadConfig::default());

    let missing = dir.path().join("missing.bms");
    let err = loader.load(&missing).unwrap_err();
    assert_eq!(err.path, missing);
    assert!(matches!(err.kind, LoadErrorKind::Io(_)));

    let broken = dir.path().join("broken.bmson");
    fs::write(&broken, "{ not json").unwrap();
    let err = loader.load(&broken).unwrap_err();
    assert_eq!(err.path, broken);
    assert!(matches!(err.kind, LoadErrorKind::Parse(ParseError::Bmson(_))));

    let standard = chart_path("standard.osu");
    let err = loader.load(&standard).unwrap_err();
    assert!(matches!(err.kind, LoadErrorKind::UnsupportedFormat));
}

#[test]
fn unreadable_osu_row_fails_the_load() {
    let registry = ModeRegistry::default();
    let loader = ChartLoader::new(&registry, LoadConfig::default());
    let text = "osu file format v14\n[General]\nMode: 3\n[HitObjects]\nabc,192,1000,1,0\n";
    let err = loader
        .load_from(BundledChart::new("bad.osu", text.as_bytes()))
        .unwrap_err();
    assert!(matches!(err.kind, LoadErrorKind::Parse(ParseError::Osu(_))));
    assert_eq!(err.path, PathBuf::from("bad.osu"));
}

#[test]
fn only_registered_modes_load() {
    let registry = ModeRegistry::builder()
        .register(DrumMode::new())
        .unwrap()
        .build();
    let loader = ChartLoader::new(&registry, LoadConfig::default());
    assert!(loader.load(chart_path("taiko.osu")).is_ok());
    let err = loader.load(chart_path("mania4.osu")).unwrap_err();
    assert!(matches!(
        err.kind,
        LoadErrorKind::UnregisteredMode(Mode::Piano4)
    ));
}

#[test]
fn chart_info_summary() {
    let registry = ModeRegistry::default();
    let loader = ChartLoader::new(&registry, LoadConfig::default());
    let info = loader.load_info(chart_path("mania7.osu")).unwrap();

    assert_eq!(info.path, chart_path("mania7.osu"));
    assert_eq!(info.mode, Mode::Piano7);
    assert_eq!(info.key_count, 7);
    assert_eq!(info.title, "Seven Lanes");
    assert_eq!(info.charter, "Mapper");
    assert_eq!(info.chart_name, "Hard");
    assert_eq!(info.duration, 6000);
    assert_eq!((info.normal_count, info.head_count), (6, 3));
    assert_eq!((info.min_bpm, info.max_bpm, info.main_bpm), (150.0, 200.0, 150.0));
    assert_eq!(info.bpm_string(), "150 BPM (150-200)");
    assert_eq!(info.time_string(), "00:06");
    assert_eq!(info.note_count_string(), "Notes 6 / Holds 3");
    assert_eq!(info.level, level(&loader.load(&info.path).unwrap()));
    assert!(info.level > 0.0);
}

#[test]
fn prepare_play_hands_over_tunables_and_replay() {
    let tunables = ModeTunables {
        speed_scale: 2.0,
        travel_distance: 1.0,
    };
    let registry = ModeRegistry::builder()
        .register(PianoMode::piano4().with_tunables(tunables))
        .unwrap()
        .build();
    let loader = ChartLoader::new(&registry, LoadConfig::default());
    let setup = loader
        .prepare_play(chart_path("mania4.osu"), Some("replay"))
        .unwrap();
    assert_eq!(setup.tunables, tunables);
    assert_eq!(setup.replay, Some("replay"));
    assert_eq!(setup.chart, loader.load(chart_path("mania4.osu")).unwrap());
    assert_eq!(
        registry.get(Mode::Piano4).map(|prop| prop.exposure_time(1.0)),
        Some(500.0)
    );
}

#[test]
fn loads_through_a_file_handle() {
    let registry = ModeRegistry::default();
    let loader = ChartLoader::new(&registry, LoadConfig::default());
    let path = chart_path("taiko.osu");
    let by_handle = loader.load_from(NamedFile::open(&path).unwrap()).unwrap();
    assert_eq!(by_handle, loader.load(&path).unwrap());
}
