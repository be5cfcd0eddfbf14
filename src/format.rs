//! Format parsers and the closed set of parsed sources.
//!
//! Each submodule turns the text (or JSON) of one chart format into its own structure.
//! [`parse`] dispatches on [`FormatKind`] and wraps the result into [`ChartSource`], which is what
//! the chart builder consumes.

pub mod bms;
#[cfg(feature = "bmson")]
pub mod bmson;
pub mod osu;
pub mod span;

use std::{borrow::Cow, ffi::OsStr, path::Path};

use thiserror::Error;

use self::{
    bms::{Bms, BmsWarning},
    osu::{Osu, OsuParseError, OsuWarning},
    span::WithSpan,
};
use crate::load::LoadConfig;

/// Chart file formats recognised by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FormatKind {
    /// `.osu`.
    Osu,
    /// `.bms`, `.bme`, `.bml`.
    Bms,
    /// `.bmson`.
    Bmson,
    /// `.ojn`, recognised but not readable.
    Ojn,
}

impl FormatKind {
    /// Recognises a file extension, case-insensitively.
    #[must_use]
    pub fn from_extension(ext: &OsStr) -> Option<Self> {
        let ext = ext.to_str()?.to_ascii_lowercase();
        Some(match ext.as_str() {
            "osu" => Self::Osu,
            "bms" | "bme" | "bml" => Self::Bms,
            "bmson" => Self::Bmson,
            "ojn" => Self::Ojn,
            _ => return None,
        })
    }

    /// Recognises the extension of `path`.
    #[must_use]
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref().extension().and_then(Self::from_extension)
    }

    /// Whether this build of the crate can parse the format.
    #[must_use]
    pub const fn is_parsable(self) -> bool {
        match self {
            Self::Osu | Self::Bms => true,
            Self::Bmson => cfg!(feature = "bmson"),
            Self::Ojn => false,
        }
    }
}

impl std::fmt::Display for FormatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Osu => "osu",
            Self::Bms => "BMS",
            Self::Bmson => "bmson",
            Self::Ojn => "O2Jam",
        })
    }
}

/// A parsed chart of any supported format.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ChartSource {
    /// An osu! beatmap.
    Osu(Osu),
    /// A BMS chart, with `#RANDOM` blocks already resolved.
    Bms(Bms),
    /// A bmson chart.
    #[cfg(feature = "bmson")]
    Bmson(bmson::Bmson),
}

impl ChartSource {
    /// The format this source was read from.
    #[must_use]
    pub const fn kind(&self) -> FormatKind {
        match self {
            Self::Osu(_) => FormatKind::Osu,
            Self::Bms(_) => FormatKind::Bms,
            #[cfg(feature = "bmson")]
            Self::Bmson(_) => FormatKind::Bmson,
        }
    }
}

/// A recoverable problem found by one of the parsers.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum FormatWarning {
    /// From the osu! parser.
    #[error(transparent)]
    Osu(WithSpan<OsuWarning>),
    /// From the BMS parser.
    #[error(transparent)]
    Bms(WithSpan<BmsWarning>),
}

/// A parsed source and its warnings.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutput {
    /// The parsed chart.
    pub source: ChartSource,
    /// Recoverable problems, in source order.
    pub warnings: Vec<FormatWarning>,
}

/// Errors which make a chart file unusable.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ParseError {
    /// The osu! parser rejected the beatmap.
    #[error("osu parse error: {0}")]
    Osu(#[from] OsuParseError),
    /// The bytes are not valid bmson.
    #[cfg(feature = "bmson")]
    #[error("bmson parse error: {0}")]
    Bmson(serde_json::Error),
    /// No parser is available for the format.
    #[error("no parser for {0} charts")]
    Unsupported(FormatKind),
}

/// Parses the bytes of a chart file of the given format.
///
/// # Errors
///
/// Returns [`ParseError`] when the format has no parser or the content is unusable.
///
/// # Example
///
/// ```
/// use rhythm_chart::format::{ChartSource, FormatKind, parse};
/// use rhythm_chart::load::LoadConfig;
///
/// let bytes = b"#TITLE x\n#00111:01\n";
/// let output = parse(FormatKind::Bms, bytes, &LoadConfig::default()).unwrap();
/// assert!(matches!(output.source, ChartSource::Bms(_)));
/// ```
pub fn parse(
    kind: FormatKind,
    bytes: &[u8],
    config: &LoadConfig,
) -> Result<ParseOutput, ParseError> {
    match kind {
        FormatKind::Osu => {
            let text = decode_text(bytes, config.shift_jis_fallback);
            let output = osu::parse_osu(&text)?;
            Ok(ParseOutput {
                source: ChartSource::Osu(output.osu),
                warnings: output.warnings.into_iter().map(FormatWarning::Osu).collect(),
            })
        }
        FormatKind::Bms => {
            let text = decode_text(bytes, config.shift_jis_fallback);
            let output = bms::parse_bms(&text, config.bms_random.rng());
            Ok(ParseOutput {
                source: ChartSource::Bms(output.bms),
                warnings: output.warnings.into_iter().map(FormatWarning::Bms).collect(),
            })
        }
        #[cfg(feature = "bmson")]
        FormatKind::Bmson => {
            let bmson = bmson::parse_bmson(strip_bom(bytes)).map_err(ParseError::Bmson)?;
            Ok(ParseOutput {
                source: ChartSource::Bmson(bmson),
                warnings: Vec::new(),
            })
        }
        #[cfg(not(feature = "bmson"))]
        FormatKind::Bmson => Err(ParseError::Unsupported(kind)),
        FormatKind::Ojn => Err(ParseError::Unsupported(kind)),
    }
}

fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes)
}

/// Decodes chart text.
///
/// UTF-8 (with or without a byte order mark) is taken as is. Anything else is read as Shift_JIS,
/// the usual encoding of older BMS files, or lossily as UTF-8 when `shift_jis_fallback` is off.
#[must_use]
pub fn decode_text(bytes: &[u8], shift_jis_fallback: bool) -> Cow<'_, str> {
    let bytes = strip_bom(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) if shift_jis_fallback => {
            encoding_rs::SHIFT_JIS
                .decode_without_bom_handling(bytes)
                .0
        }
        Err(_) => String::from_utf8_lossy(bytes),
    }
}
