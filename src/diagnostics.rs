//! Terminal diagnostics for parser warnings, rendered with `ariadne`.
//!
//! Warnings carry byte spans into the decoded chart text, so ariadne works out rows and columns
//! on its own.
//!
//! ```rust
//! use rhythm_chart::{
//!     diagnostics::{collect_reports, emit_warnings},
//!     format::{FormatWarning, bms::{parse_bms, rng::FixedRng}},
//! };
//!
//! let source = "#TITLE Test\n#UNKNOWN command\n";
//! let output = parse_bms(source, FixedRng::new(vec![1]));
//! let warnings: Vec<_> = output.warnings.into_iter().map(FormatWarning::Bms).collect();
//!
//! emit_warnings("test.bms", source, &warnings);
//! assert_eq!(collect_reports("test.bms", source, &warnings).len(), 1);
//! ```

use std::ops::Range;

use ariadne::{Color, Label, Report, ReportKind, Source};

use crate::format::{
    FormatWarning,
    bms::{BmsWarning, control_flow::ControlFlowWarning},
    osu::OsuWarning,
    span::WithSpan,
};

/// A chart file name and its decoded text.
///
/// ```rust
/// use rhythm_chart::diagnostics::SimpleSource;
///
/// let source = SimpleSource::new("test.osu", "osu file format v14\n");
/// assert_eq!(source.name(), "test.osu");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SimpleSource<'a> {
    name: &'a str,
    text: &'a str,
}

impl<'a> SimpleSource<'a> {
    /// Pairs a file name with its text.
    #[must_use]
    pub const fn new(name: &'a str, text: &'a str) -> Self {
        Self { name, text }
    }

    /// The text.
    #[must_use]
    pub const fn text(&self) -> &'a str {
        self.text
    }

    /// The file name.
    #[must_use]
    pub const fn name(&self) -> &'a str {
        self.name
    }
}

/// Conversion of a spanned warning into an `ariadne::Report`.
pub trait ToAriadne {
    /// Builds the report against `src`.
    fn to_report<'a>(&self, src: &SimpleSource<'a>) -> Report<'a, (String, Range<usize>)>;
}

/// Builds a report with a single colored label.
#[must_use]
pub fn build_report<'a>(
    src: &SimpleSource<'a>,
    kind: ReportKind<'a>,
    range: Range<usize>,
    title: &str,
    label_message: impl ToString,
    color: Color,
) -> Report<'a, (String, Range<usize>)> {
    let filename = src.name().to_string();
    Report::build(kind, (filename.clone(), range.clone()))
        .with_message(title)
        .with_label(
            Label::new((filename, range))
                .with_message(label_message.to_string())
                .with_color(color),
        )
        .finish()
}

impl ToAriadne for WithSpan<OsuWarning> {
    fn to_report<'a>(&self, src: &SimpleSource<'a>) -> Report<'a, (String, Range<usize>)> {
        let title = match self.content() {
            OsuWarning::MissingVersionHeader => "missing header",
            OsuWarning::UnknownSection(_) => "unknown section",
            OsuWarning::ExpectedKeyValue(_) => "malformed line",
            OsuWarning::InvalidValue { .. } => "invalid value",
        };
        build_report(
            src,
            ReportKind::Warning,
            self.span(),
            title,
            self.content(),
            Color::Yellow,
        )
    }
}

impl ToAriadne for WithSpan<BmsWarning> {
    fn to_report<'a>(&self, src: &SimpleSource<'a>) -> Report<'a, (String, Range<usize>)> {
        let (title, color) = match self.content() {
            BmsWarning::UnknownCommand(_) => ("unknown command", Color::Yellow),
            BmsWarning::InvalidValue { .. } => ("invalid value", Color::Yellow),
            BmsWarning::InvalidMessage(_) => ("invalid message", Color::Yellow),
            BmsWarning::UnsupportedLnType(_) => ("unsupported long note type", Color::Blue),
            BmsWarning::ControlFlow(ControlFlowWarning::Unclosed(_)) => {
                ("unclosed control flow", Color::Red)
            }
            BmsWarning::ControlFlow(_) => ("misplaced control flow", Color::Red),
        };
        build_report(
            src,
            ReportKind::Warning,
            self.span(),
            title,
            self.content(),
            color,
        )
    }
}

impl ToAriadne for FormatWarning {
    fn to_report<'a>(&self, src: &SimpleSource<'a>) -> Report<'a, (String, Range<usize>)> {
        match self {
            Self::Osu(warning) => warning.to_report(src),
            Self::Bms(warning) => warning.to_report(src),
        }
    }
}

/// Prints every warning of a chart to standard error.
pub fn emit_warnings<'a, W: ToAriadne + 'a>(
    name: &'a str,
    source: &'a str,
    warnings: impl IntoIterator<Item = &'a W>,
) {
    let simple = SimpleSource::new(name, source);
    let ariadne_source = Source::from(source);
    for warning in warnings {
        let report = warning.to_report(&simple);
        let _ = report.eprint((name.to_string(), ariadne_source.clone()));
    }
}

/// Builds the reports of a chart's warnings without printing them.
#[must_use]
pub fn collect_reports<'a, W: ToAriadne + 'a>(
    name: &'a str,
    source: &'a str,
    warnings: impl IntoIterator<Item = &'a W>,
) -> Vec<Report<'a, (String, Range<usize>)>> {
    let simple = SimpleSource::new(name, source);
    warnings
        .into_iter()
        .map(|warning| warning.to_report(&simple))
        .collect()
}
