//! Gameplay modes and chart file classification.
//!
//! The file extension decides the format. Formats holding a single kind of chart map straight to
//! a mode without reading the file. osu! beatmaps carry several game modes, so their `[General]`
//! and `[Difficulty]` sections are probed with [`probe_osu`].
//!
//! BMS, bmson and O2Jam files are always [`Mode::Piano7`], whatever lane count they declare.
//! A bmson chart whose `mode_hint` asks for 4 keys is still listed and played as 7-key, since
//! classification never parses these formats.
//!
//! Both [`chart_file_mode`] and [`chart_file_mode_by_file`] go through [`chart_mode_of`], so they
//! classify any file the same way.

use std::{
    fs::File,
    io::{self, BufRead, BufReader, Read},
    path::{Path, PathBuf},
};

use crate::format::{
    FormatKind,
    osu::{
        OsuMode,
        probe::{OsuProbe, probe_osu},
    },
};

/// A gameplay discipline. "No mode" is expressed as `Option::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mode {
    /// Key mode with up to 4 lanes, or exactly 6.
    Piano4,
    /// Key mode with 5 or 7 and more lanes.
    Piano7,
    /// Percussion mode with don, kat and roll lanes.
    Drum,
    /// Single lane singing mode.
    Karaoke,
}

impl Mode {
    /// All modes, in display order.
    pub const ALL: [Self; 4] = [Self::Piano4, Self::Piano7, Self::Drum, Self::Karaoke];

    /// Maps an osu! game mode and its column count.
    ///
    /// ```
    /// use rhythm_chart::{format::osu::OsuMode, mode::Mode};
    ///
    /// assert_eq!(Mode::from_osu(OsuMode::Mania, 6), Some(Mode::Piano4));
    /// assert_eq!(Mode::from_osu(OsuMode::Mania, 7), Some(Mode::Piano7));
    /// assert_eq!(Mode::from_osu(OsuMode::Standard, 4), None);
    /// ```
    #[must_use]
    pub const fn from_osu(mode: OsuMode, key_count: u32) -> Option<Self> {
        match mode {
            OsuMode::Mania if key_count <= 4 || key_count == 6 => Some(Self::Piano4),
            OsuMode::Mania => Some(Self::Piano7),
            OsuMode::Taiko => Some(Self::Drum),
            OsuMode::Standard | OsuMode::Catch => None,
        }
    }

    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Piano4 => "Piano4",
            Self::Piano7 => "Piano7",
            Self::Drum => "Drum",
            Self::Karaoke => "Karaoke",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// An open chart stream that knows its file name.
///
/// Charts shipped inside an archive are read from such handles instead of loose files.
pub trait ChartHandle: Read {
    /// Queries the name of the underlying file. The extension selects the format.
    ///
    /// # Errors
    ///
    /// Returns the I/O error of the query, e.g. a failed `stat` on a closed file.
    fn name(&self) -> io::Result<PathBuf>;
}

impl<H: ChartHandle + ?Sized> ChartHandle for &mut H {
    fn name(&self) -> io::Result<PathBuf> {
        H::name(self)
    }
}

/// A file on disk opened for reading.
#[derive(Debug)]
pub struct NamedFile {
    path: PathBuf,
    file: File,
}

impl NamedFile {
    /// Opens `path`.
    ///
    /// # Errors
    ///
    /// Returns the error of [`File::open`].
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = File::open(&path)?;
        Ok(Self { path, file })
    }
}

impl Read for NamedFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl ChartHandle for NamedFile {
    fn name(&self) -> io::Result<PathBuf> {
        let metadata = self.file.metadata()?;
        if metadata.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is a directory", self.path.display()),
            ));
        }
        Ok(self.path.clone())
    }
}

/// A chart read from memory or any other stream, named explicitly.
#[derive(Debug, Clone)]
pub struct BundledChart<R> {
    name: PathBuf,
    reader: R,
}

impl<R: Read> BundledChart<R> {
    /// Wraps `reader` under `name`.
    pub fn new(name: impl Into<PathBuf>, reader: R) -> Self {
        Self {
            name: name.into(),
            reader,
        }
    }
}

impl<R: Read> Read for BundledChart<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl<R: Read> ChartHandle for BundledChart<R> {
    fn name(&self) -> io::Result<PathBuf> {
        Ok(self.name.clone())
    }
}

/// Classifies the chart file at `path`.
///
/// Returns `Ok(None)` for unknown extensions and for osu! beatmaps of unplayable modes. Only
/// osu! beatmaps are opened.
///
/// # Errors
///
/// Returns the I/O error if an osu! beatmap cannot be read.
pub fn chart_file_mode(path: impl AsRef<Path>) -> io::Result<Option<Mode>> {
    let Some(kind) = FormatKind::from_path(&path) else {
        return Ok(None);
    };
    if kind != FormatKind::Osu {
        return chart_mode_of(kind, io::empty());
    }
    let file = File::open(path)?;
    chart_mode_of(kind, BufReader::new(file))
}

/// Classifies an already open chart, reading from its current position.
///
/// # Errors
///
/// Returns the I/O error if the name query fails or the stream cannot be read. Callers should
/// treat it as a failed load, unlike `Ok(None)` which means "not a playable chart".
pub fn chart_file_mode_by_file(mut handle: impl ChartHandle) -> io::Result<Option<Mode>> {
    let name = handle.name()?;
    let Some(kind) = FormatKind::from_path(&name) else {
        return Ok(None);
    };
    chart_mode_of(kind, BufReader::new(&mut handle))
}

/// Classifies chart content of a known format. `reader` is only consumed for osu! beatmaps.
///
/// # Errors
///
/// Returns the I/O error of `reader`.
pub fn chart_mode_of(kind: FormatKind, reader: impl BufRead) -> io::Result<Option<Mode>> {
    Ok(match kind {
        FormatKind::Bms | FormatKind::Bmson | FormatKind::Ojn => Some(Mode::Piano7),
        FormatKind::Osu => {
            let OsuProbe { mode, key_count } = probe_osu(reader)?;
            Mode::from_osu(mode, key_count)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mania(circle_size: &str) -> String {
        format!("osu file format v14\n[General]\nMode: 3\n[Difficulty]\nCircleSize:{circle_size}\n")
    }

    #[test]
    fn key_count_rule() {
        for (circle_size, expected) in [
            ("1", Mode::Piano4),
            ("4", Mode::Piano4),
            ("5", Mode::Piano7),
            ("6", Mode::Piano4),
            ("7", Mode::Piano7),
            ("10", Mode::Piano7),
        ] {
            let text = mania(circle_size);
            let handle = BundledChart::new("a.osu", text.as_bytes());
            assert_eq!(
                chart_file_mode_by_file(handle).unwrap(),
                Some(expected),
                "CircleSize {circle_size}"
            );
        }
    }

    #[test]
    fn other_osu_modes() {
        let taiko = "osu file format v14\n[General]\nMode: 1\n";
        let standard = "osu file format v14\n[General]\nMode: 0\n";
        let by_text =
            |text: &str| chart_file_mode_by_file(BundledChart::new("x.OSU", text.as_bytes()));
        assert_eq!(by_text(taiko).unwrap(), Some(Mode::Drum));
        assert_eq!(by_text(standard).unwrap(), None);
    }

    #[test]
    fn single_mode_extensions_skip_io() {
        assert_eq!(chart_file_mode("missing/song.bme").unwrap(), Some(Mode::Piano7));
        assert_eq!(chart_file_mode("missing/song.ojn").unwrap(), Some(Mode::Piano7));
        assert_eq!(chart_file_mode("missing/song.xyz").unwrap(), None);
        assert!(chart_file_mode("missing/song.osu").is_err());
    }

    #[test]
    fn bmson_mode_hint_is_not_read() {
        let json = br#"{"info": {"title": "t", "artist": "a", "init_bpm": 120, "mode_hint": "generic-4keys"}}"#;
        let handle = BundledChart::new("four.bmson", &json[..]);
        assert_eq!(chart_file_mode_by_file(handle).unwrap(), Some(Mode::Piano7));
    }

    struct Unstattable;

    impl Read for Unstattable {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }
    }

    impl ChartHandle for Unstattable {
        fn name(&self) -> io::Result<PathBuf> {
            Err(io::Error::other("stat failed"))
        }
    }

    #[test]
    fn stat_failure_is_an_error() {
        assert!(chart_file_mode_by_file(Unstattable).is_err());
    }
}
