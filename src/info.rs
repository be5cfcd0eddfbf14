//! Catalog summary of a chart.

use std::path::{Path, PathBuf};

use crate::{
    chart::{Chart, level::level},
    mode::Mode,
};

/// A lightweight record describing a chart file, kept in the catalog instead of the chart.
///
/// The full [`Chart`] is rebuilt from [`ChartInfo::path`] when needed.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChartInfo {
    /// Chart file the record was derived from.
    pub path: PathBuf,
    /// Mode of the chart.
    pub mode: Mode,
    /// Number of lanes.
    pub key_count: u32,
    /// Audio file relative to the chart file.
    pub music_file: String,
    /// Song title.
    pub title: String,
    /// Song artist.
    pub artist: String,
    /// Author of the chart.
    pub charter: String,
    /// Name of the chart among the charts of the song.
    pub chart_name: String,
    /// Franchise, album or genre.
    pub source: String,
    /// Tempo at the start.
    pub base_bpm: f64,
    /// Lowest tempo.
    pub min_bpm: f64,
    /// Highest tempo.
    pub max_bpm: f64,
    /// Tempo covering the longest part of the chart.
    pub main_bpm: f64,
    /// Time of the last note in milliseconds.
    pub duration: i64,
    /// Number of taps.
    pub normal_count: usize,
    /// Number of holds.
    pub head_count: usize,
    /// Estimated difficulty, see [`crate::chart::level`].
    pub level: f64,
}

impl ChartInfo {
    /// Summarizes `chart` read from `path`.
    #[must_use]
    pub fn new(chart: &Chart, path: impl AsRef<Path>) -> Self {
        let header = chart.header();
        let (min_bpm, max_bpm, main_bpm) = bpm_stats(chart);
        Self {
            path: path.as_ref().to_path_buf(),
            mode: chart.mode(),
            key_count: chart.key_count(),
            music_file: header.music_file.clone(),
            title: header.title.clone(),
            artist: header.artist.clone(),
            charter: header.charter.clone(),
            chart_name: header.chart_name.clone(),
            source: header.source.clone(),
            base_bpm: header.base_bpm,
            min_bpm,
            max_bpm,
            main_bpm,
            duration: chart.duration(),
            normal_count: chart.normal_count(),
            head_count: chart.head_count(),
            level: level(chart),
        }
    }

    /// Note counts for display, e.g. `"Notes 512 / Holds 64"`.
    #[must_use]
    pub fn note_count_string(&self) -> String {
        format!("Notes {} / Holds {}", self.normal_count, self.head_count)
    }

    /// Duration as `mm:ss`, e.g. `"02:05"`.
    #[must_use]
    pub fn time_string(&self) -> String {
        let seconds = self.duration.max(0) / 1000;
        format!("{:02}:{:02}", seconds / 60, seconds % 60)
    }

    /// Tempo for display: `"150 BPM"`, or `"150 BPM (75-300)"` when it changes.
    #[must_use]
    pub fn bpm_string(&self) -> String {
        let main = self.main_bpm.round();
        let (min, max) = (self.min_bpm.round(), self.max_bpm.round());
        if (max - min).abs() < 1.0 {
            format!("{main} BPM")
        } else {
            format!("{main} BPM ({min}-{max})")
        }
    }
}

/// Lowest, highest and main tempo over `0..=duration`.
fn bpm_stats(chart: &Chart) -> (f64, f64, f64) {
    let base = chart.header().base_bpm;
    let end = chart.duration();
    let transitions = chart.transitions();
    let mut spans: Vec<(f64, i64)> = Vec::new();
    for (index, point) in transitions.iter().enumerate() {
        let start = point.time.max(0);
        let until = transitions
            .get(index + 1)
            .map_or(end, |next| next.time.min(end));
        if start > end && index > 0 {
            break;
        }
        match spans.iter_mut().find(|(bpm, _)| *bpm == point.bpm) {
            Some((_, length)) => *length += (until - start).max(0),
            None => spans.push((point.bpm, (until - start).max(0))),
        }
    }
    let Some(&(first, _)) = spans.first() else {
        return (base, base, base);
    };
    let min = spans.iter().map(|(bpm, _)| *bpm).fold(first, f64::min);
    let max = spans.iter().map(|(bpm, _)| *bpm).fold(first, f64::max);
    let main = spans
        .iter()
        .max_by_key(|(_, length)| *length)
        .map_or(first, |(bpm, _)| *bpm);
    (min, max, main)
}
