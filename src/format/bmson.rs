//! The [bmson format](https://bmson-spec.readthedocs.io/en/master/doc/index.html) definition.
//!
//! Only the parts which shape the playable chart are modelled. Unknown fields such as `bga`
//! and `lines` are accepted and ignored by the deserializer.
//!
//! # Order of Processing
//!
//! When a [`BpmEvent`] and a [`StopEvent`] appear on the same pulse, the tempo changes first,
//! then scrolling stops for a duration measured with the new tempo. A [`Note`] on the pulse of a
//! stop is played before the stop.

use serde::{Deserialize, Serialize};

/// Top-level object for bmson format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bmson {
    /// Version of bmson format.
    #[serde(default)]
    pub version: String,
    /// Score metadata.
    pub info: BmsonInfo,
    /// Events of bpm change. If there are coincident events, the successor is only applied.
    #[serde(default)]
    pub bpm_events: Vec<BpmEvent>,
    /// Events of scroll stop.
    #[serde(default)]
    pub stop_events: Vec<StopEvent>,
    /// Note data.
    #[serde(default)]
    pub sound_channels: Vec<SoundChannel>,
}

/// Header metadata of chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BmsonInfo {
    /// Self explanatory title.
    pub title: String,
    /// Self explanatory subtitle.
    #[serde(default)]
    pub subtitle: String,
    /// Author of the song.
    pub artist: String,
    /// Other authors as `key:value` pairs, such as `chart:someone`.
    #[serde(default)]
    pub subartists: Vec<String>,
    /// Self explanatory genre.
    #[serde(default)]
    pub genre: String,
    /// Hint for the lane layout, e.g. "beat-7k", "popn-5k", "generic-nkeys".
    #[serde(default = "default_mode_hint")]
    pub mode_hint: String,
    /// Special chart name, e.g. "HYPER".
    #[serde(default)]
    pub chart_name: String,
    /// Self explanatory level number.
    #[serde(default)]
    pub level: u32,
    /// Initial BPM.
    pub init_bpm: f64,
    /// Preview music file name.
    pub preview_music: Option<String>,
    /// Pulses per quarter note.
    #[serde(default = "default_resolution")]
    pub resolution: u32,
}

impl BmsonInfo {
    /// The chart author taken from a `chart:` sub-artist entry.
    #[must_use]
    pub fn charter(&self) -> Option<&str> {
        self.subartists.iter().find_map(|entry| {
            let (key, value) = entry.split_once(':')?;
            (key.trim() == "chart").then(|| value.trim())
        })
    }
}

/// Default mode hint, beatmania 7 keys.
#[must_use]
pub fn default_mode_hint() -> String {
    "beat-7k".into()
}

/// Default resolution, 240 pulses per quarter note.
#[must_use]
pub const fn default_resolution() -> u32 {
    240
}

/// Sound file and the notes that ring it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundChannel {
    /// Sound file path.
    pub name: String,
    /// Notes ringing this sound.
    #[serde(default)]
    pub notes: Vec<Note>,
}

/// Sound note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Lane. `None` (or `0`) is a background sound, not playable.
    #[serde(default)]
    pub x: Option<u32>,
    /// Position in pulses.
    pub y: u64,
    /// Length in pulses. Zero for a normal note, positive for a long note.
    #[serde(default)]
    pub l: u64,
    /// Continuation flag.
    #[serde(default)]
    pub c: bool,
}

/// BPM change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BpmEvent {
    /// Position in pulses.
    pub y: u64,
    /// New BPM.
    pub bpm: f64,
}

/// Scroll stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopEvent {
    /// Position in pulses.
    pub y: u64,
    /// Stopping duration in pulses.
    pub duration: u64,
}

/// Lane layout decided by [`BmsonInfo::mode_hint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BmsonLayout {
    /// `beat-5k`, `beat-7k`: lane `8` is the scratch.
    Beat,
    /// `beat-10k`, `beat-14k`: lanes `8` and `16` are the scratches.
    BeatDouble,
    /// `popn-5k`, `popn-9k`, `keyboard-*`, `generic-nkeys`: lanes are numbered from `1`.
    Sequential,
}

impl Bmson {
    /// Layout of the lanes.
    #[must_use]
    pub fn layout(&self) -> BmsonLayout {
        match self.info.mode_hint.as_str() {
            "beat-5k" | "beat-7k" => BmsonLayout::Beat,
            "beat-10k" | "beat-14k" => BmsonLayout::BeatDouble,
            _ => BmsonLayout::Sequential,
        }
    }

    /// Number of playable lanes.
    #[must_use]
    pub fn key_count(&self) -> u32 {
        match self.layout() {
            BmsonLayout::Beat => 8,
            BmsonLayout::BeatDouble => 16,
            BmsonLayout::Sequential => {
                let declared = self
                    .info
                    .mode_hint
                    .rsplit('-')
                    .next()
                    .and_then(|keys| keys.strip_suffix('k'))
                    .and_then(|keys| keys.parse().ok());
                declared.unwrap_or_else(|| {
                    self.playable_notes()
                        .filter_map(|note| note.x)
                        .max()
                        .unwrap_or(0)
                })
            }
        }
    }

    /// Notes with a lane, across all sound channels.
    pub fn playable_notes(&self) -> impl Iterator<Item = &Note> + '_ {
        self.sound_channels
            .iter()
            .flat_map(|channel| &channel.notes)
            .filter(|note| note.x.is_some_and(|x| x > 0))
    }
}

/// Parses a bmson chart from JSON bytes.
///
/// # Errors
///
/// Returns the JSON error when the bytes are not valid bmson.
///
/// # Example
///
/// ```
/// use rhythm_chart::format::bmson::parse_bmson;
///
/// let json = br#"{"info": {"title": "t", "artist": "a", "init_bpm": 150}, "sound_channels": []}"#;
/// let bmson = parse_bmson(json).unwrap();
/// assert_eq!(bmson.info.resolution, 240);
/// assert_eq!(bmson.key_count(), 8);
/// ```
pub fn parse_bmson(bytes: &[u8]) -> Result<Bmson, serde_json::Error> {
    serde_json::from_slice(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_key_count_falls_back_to_lanes() {
        let json = br#"{
            "info": {"title": "t", "artist": "a", "init_bpm": 120, "mode_hint": "generic-nkeys",
                     "subartists": ["music:x", "chart : Someone"]},
            "sound_channels": [{"name": "a.wav", "notes": [
                {"x": 3, "y": 0, "l": 0, "c": false},
                {"x": null, "y": 240, "l": 0, "c": false},
                {"x": 5, "y": 480, "l": 240, "c": false}
            ]}]
        }"#;
        let bmson = parse_bmson(json).unwrap();
        assert_eq!(bmson.layout(), BmsonLayout::Sequential);
        assert_eq!(bmson.key_count(), 5);
        assert_eq!(bmson.playable_notes().count(), 2);
        assert_eq!(bmson.info.charter(), Some("Someone"));
    }

    #[test]
    fn popn_key_count_from_hint() {
        let json = br#"{"info": {"title": "t", "artist": "a", "init_bpm": 120, "mode_hint": "popn-9k"}}"#;
        assert_eq!(parse_bmson(json).unwrap().key_count(), 9);
    }
}
