//! Chart metadata common to every format.

use crate::format::{
    ChartSource,
    bms::{Bms, BmsHeader},
    osu::Osu,
};

/// Tempo assumed for osu! beatmaps without any uninherited timing point.
pub const FALLBACK_OSU_BPM: f64 = 120.0;

/// Display metadata of a chart.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChartHeader {
    /// Audio file played with the chart, relative to the chart file. Empty for key-sounded charts
    /// without a preview track.
    pub music_file: String,
    /// Song title.
    pub title: String,
    /// Song title in its original script, if the format tells it apart.
    pub title_unicode: Option<String>,
    /// Song artist.
    pub artist: String,
    /// Song artist in its original script, if the format tells it apart.
    pub artist_unicode: Option<String>,
    /// Author of the chart.
    pub charter: String,
    /// Name of this chart among the charts of the song, e.g. "HYPER" or "Insane".
    pub chart_name: String,
    /// Franchise, album or genre the song comes from.
    pub source: String,
    /// Tempo at the start of the chart.
    pub base_bpm: f64,
    /// Start of the song preview in milliseconds.
    pub preview_time: Option<i64>,
}

impl ChartHeader {
    /// Reads the header of a parsed source. Missing fields become empty strings.
    #[must_use]
    pub fn from_source(source: &ChartSource) -> Self {
        match source {
            ChartSource::Osu(osu) => from_osu(osu),
            ChartSource::Bms(bms) => from_bms(bms),
            #[cfg(feature = "bmson")]
            ChartSource::Bmson(bmson) => from_bmson(bmson),
        }
    }
}

fn non_empty(text: &str) -> Option<String> {
    (!text.is_empty()).then(|| text.to_owned())
}

fn from_osu(osu: &Osu) -> ChartHeader {
    let metadata = &osu.metadata;
    ChartHeader {
        music_file: osu.general.audio_filename.clone(),
        title: metadata.title.clone(),
        title_unicode: non_empty(&metadata.title_unicode),
        artist: metadata.artist.clone(),
        artist_unicode: non_empty(&metadata.artist_unicode),
        charter: metadata.creator.clone(),
        chart_name: metadata.version.clone(),
        source: metadata.source.clone(),
        base_bpm: osu
            .timing_points
            .iter()
            .find_map(|point| point.bpm())
            .unwrap_or(FALLBACK_OSU_BPM),
        preview_time: (osu.general.preview_time >= 0).then_some(osu.general.preview_time),
    }
}

/// Names of `#DIFFICULTY` 1 to 5.
const BMS_DIFFICULTY_NAMES: [&str; 5] = ["BEGINNER", "NORMAL", "HYPER", "ANOTHER", "INSANE"];

fn from_bms(bms: &Bms) -> ChartHeader {
    let BmsHeader {
        title,
        subtitle,
        artist,
        sub_artist,
        genre,
        difficulty,
        preview,
        ..
    } = &bms.header;
    let chart_name = subtitle.clone().or_else(|| {
        difficulty
            .and_then(|level| BMS_DIFFICULTY_NAMES.get(usize::from(level).checked_sub(1)?))
            .map(|name| (*name).to_owned())
    });
    ChartHeader {
        music_file: preview.clone().unwrap_or_default(),
        title: title.clone().unwrap_or_default(),
        title_unicode: None,
        artist: artist.clone().unwrap_or_default(),
        artist_unicode: None,
        charter: sub_artist.clone().unwrap_or_default(),
        chart_name: chart_name.unwrap_or_default(),
        source: genre.clone().unwrap_or_default(),
        base_bpm: bms.initial_bpm(),
        preview_time: None,
    }
}

#[cfg(feature = "bmson")]
fn from_bmson(bmson: &crate::format::bmson::Bmson) -> ChartHeader {
    let info = &bmson.info;
    let chart_name = if info.chart_name.is_empty() {
        info.subtitle.clone()
    } else {
        info.chart_name.clone()
    };
    ChartHeader {
        music_file: info.preview_music.clone().unwrap_or_default(),
        title: info.title.clone(),
        title_unicode: None,
        artist: info.artist.clone(),
        artist_unicode: None,
        charter: info.charter().unwrap_or_default().to_owned(),
        chart_name,
        source: info.genre.clone(),
        base_bpm: info.init_bpm,
        preview_time: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::bms::{parse_bms, rng::FixedRng};

    #[test]
    fn bms_difficulty_names_the_chart() {
        let source = "#TITLE Song\n#SUBARTIST obj: someone\n#DIFFICULTY 4\n#GENRE Trance\n";
        let bms = parse_bms(source, FixedRng::new(vec![])).bms;
        let header = ChartHeader::from_source(&ChartSource::Bms(bms));
        assert_eq!(header.chart_name, "ANOTHER");
        assert_eq!(header.charter, "obj: someone");
        assert_eq!(header.source, "Trance");
        assert_eq!(header.base_bpm, 130.0);
    }
}
