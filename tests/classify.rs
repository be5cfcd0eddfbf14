use std::{
    fs,
    io::{self, Read},
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
fn path_and_handle_agree() {
    let expected = [
        ("mania4.osu", Some(Mode::Piano4)),
        ("mania6.osu", Some(Mode::Piano4)),
        ("mania7.osu", Some(Mode::Piano7)),
        ("taiko.osu", Some(Mode::Drum)),
        ("standard.osu", None),
        ("simple.bms", Some(Mode::Piano7)),
        ("random.bms", Some(Mode::Piano7)),
        ("simple.bmson", Some(Mode::Piano7)),
    ];
    for (name, mode) in expected {
        let path = chart_path(name);
        let by_path = chart_file_mode(&path).unwrap();
        let by_file = chart_file_mode_by_file(NamedFile::open(&path).unwrap()).unwrap();
        assert_eq!(by_path, mode, "{name}");
        assert_eq!(by_file, by_path, "{name}");
    }
}

#[test]
fn key_count_six_is_piano4_and_seven_is_piano7() {
    assert_eq!(
        chart_file_mode(chart_path("mania6.osu")).unwrap(),
        Some(Mode::Piano4)
    );
    assert_eq!(
        chart_file_mode(chart_path("mania7.osu")).unwrap(),
        Some(Mode::Piano7)
    );
}

#[test]
fn unknown_extension_has_no_mode() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("song.xyz");
    fs::write(&path, "osu file format v14\n[General]\nMode: 3\n").unwrap();
    assert_eq!(chart_file_mode(&path).unwrap(), None);
    assert_eq!(
        chart_file_mode_by_file(NamedFile::open(&path).unwrap()).unwrap(),
        None
    );
}

#[test]
fn extension_is_case_insensitive() {
    let text = fs::read(chart_path("mania4.osu")).unwrap();
    let handle = BundledChart::new("Song [Easy].OSU", text.as_slice());
    assert_eq!(chart_file_mode_by_file(handle).unwrap(), Some(Mode::Piano4));
}

#[test]
fn missing_osu_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(chart_file_mode(dir.path().join("gone.osu")).is_err());
    // Formats classified by extension alone are never opened.
    assert_eq!(
        chart_file_mode(dir.path().join("gone.bms")).unwrap(),
        Some(Mode::Piano7)
    );
}

struct Unnamed;

impl Read for Unnamed {
    fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
        Ok(0)
    }
}

impl ChartHandle for Unnamed {
    fn name(&self) -> io::Result<PathBuf> {
        Err(io::Error::other("stat failed"))
    }
}

#[test]
fn failed_name_query_is_an_error_not_a_mode() {
    assert!(chart_file_mode_by_file(Unnamed).is_err());
}
