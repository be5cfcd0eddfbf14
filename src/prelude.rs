//! Re-exports of the commonly used types.
//!
//! `use rhythm_chart::prelude::*;` brings in everything needed to classify, load and catalog
//! charts.

#[cfg(feature = "diagnostics")]
pub use crate::diagnostics::{SimpleSource, ToAriadne, collect_reports, emit_warnings};
pub use crate::{
    catalog::{Catalog, CatalogScan, scan_bundle, scan_dir},
    chart::{
        BuildError, Chart, MalformedError,
        header::ChartHeader,
        level::level,
        notes::{HitObject, Note, NoteKind},
        timeline::TransitionPoint,
    },
    format::{ChartSource, FormatKind, FormatWarning, ParseError, ParseOutput, parse},
    info::ChartInfo,
    load::{BmsRandom, ChartLoader, LoadConfig, LoadError, LoadErrorKind},
    mode::{
        BundledChart, ChartHandle, Mode, NamedFile, chart_file_mode, chart_file_mode_by_file,
        chart_mode_of,
    },
    registry::{
        DrumMode, KaraokeMode, ModeProp, ModeRegistry, ModeRegistryBuilder, ModeTunables,
        PianoMode, PlaySetup, RegistryError,
    },
};
