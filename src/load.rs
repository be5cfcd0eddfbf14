//! Loading charts from files and open handles.
//!
//! A load runs synchronously on the calling thread: the file is read to the end and released,
//! then classified, parsed and built. Parser warnings are passed to the [`log`] facade at debug
//! level and never fail the load.
//!
//! [`log`]: https://crates.io/crates/log

use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
};

use log::debug;
use thiserror::Error;

use crate::{
    chart::{BuildError, Chart},
    format::{
        self, FormatKind, ParseError,
        bms::rng::{FixedRng, Rng},
    },
    info::ChartInfo,
    mode::{ChartHandle, Mode, chart_mode_of},
    registry::{ModeRegistry, PlaySetup},
};

/// How `#RANDOM` blocks of BMS charts are resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BmsRandom {
    /// Replays the given values. Loading the same file twice gives the same chart.
    Fixed(Vec<u64>),
    /// A seeded generator, reproducible per seed.
    #[cfg(feature = "rand")]
    Seeded(u64),
    /// A generator seeded by the operating system. Every load may differ.
    #[cfg(feature = "rand")]
    Entropy,
}

impl Default for BmsRandom {
    fn default() -> Self {
        Self::Fixed(vec![1])
    }
}

impl BmsRandom {
    /// A fresh random source for one load.
    #[must_use]
    pub fn rng(&self) -> Box<dyn Rng> {
        match self {
            Self::Fixed(values) => Box::new(FixedRng::new(values.clone())),
            #[cfg(feature = "rand")]
            Self::Seeded(seed) => {
                use rand::SeedableRng;
                Box::new(format::bms::rng::RandRng(rand::rngs::StdRng::seed_from_u64(
                    *seed,
                )))
            }
            #[cfg(feature = "rand")]
            Self::Entropy => Box::new(format::bms::rng::RandRng(rand::rng())),
        }
    }
}

/// Options of chart loading.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LoadConfig {
    /// Resolution of BMS `#RANDOM` blocks.
    pub bms_random: BmsRandom,
    /// Whether text which is not UTF-8 is read as Shift_JIS.
    pub shift_jis_fallback: bool,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            bms_random: BmsRandom::default(),
            shift_jis_fallback: true,
        }
    }
}

impl LoadConfig {
    /// Sets the resolution of BMS `#RANDOM` blocks.
    #[must_use]
    pub fn with_bms_random(mut self, bms_random: BmsRandom) -> Self {
        self.bms_random = bms_random;
        self
    }

    /// Sets whether text which is not UTF-8 is read as Shift_JIS.
    #[must_use]
    pub const fn with_shift_jis_fallback(mut self, enabled: bool) -> Self {
        self.shift_jis_fallback = enabled;
        self
    }
}

/// What went wrong while loading a chart.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum LoadErrorKind {
    /// The file could not be read or queried.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The file is not a chart of any playable mode, or its format has no parser.
    #[error("unsupported chart format")]
    UnsupportedFormat,
    /// The mode of the chart is not in the registry.
    #[error("mode {0} is not registered")]
    UnregisteredMode(Mode),
    /// The content could not be parsed.
    #[error(transparent)]
    Parse(ParseError),
    /// The parsed chart is not playable.
    #[error(transparent)]
    Build(#[from] BuildError),
}

impl From<ParseError> for LoadErrorKind {
    fn from(error: ParseError) -> Self {
        match error {
            ParseError::Unsupported(_) => Self::UnsupportedFormat,
            other => Self::Parse(other),
        }
    }
}

/// A failed load, with the chart file it concerns.
#[derive(Debug, Error)]
#[error("failed to load {}: {kind}", path.display())]
pub struct LoadError {
    /// The chart file.
    pub path: PathBuf,
    /// What went wrong.
    #[source]
    pub kind: LoadErrorKind,
}

impl LoadError {
    /// Attaches `path` to `kind`.
    pub fn new(path: impl Into<PathBuf>, kind: impl Into<LoadErrorKind>) -> Self {
        Self {
            path: path.into(),
            kind: kind.into(),
        }
    }
}

/// Loads charts with a fixed registry and configuration.
#[derive(Debug, Clone)]
pub struct ChartLoader<'r> {
    registry: &'r ModeRegistry,
    config: LoadConfig,
}

impl<'r> ChartLoader<'r> {
    /// Creates a loader.
    #[must_use]
    pub const fn new(registry: &'r ModeRegistry, config: LoadConfig) -> Self {
        Self { registry, config }
    }

    /// The registry in use.
    #[must_use]
    pub const fn registry(&self) -> &'r ModeRegistry {
        self.registry
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &LoadConfig {
        &self.config
    }

    /// Loads the chart file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] with `path` attached if the file cannot be read, is not a playable
    /// chart, or is malformed.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Chart, LoadError> {
        let path = path.as_ref();
        let kind = FormatKind::from_path(path)
            .ok_or_else(|| LoadError::new(path, LoadErrorKind::UnsupportedFormat))?;
        let bytes = fs::read(path).map_err(|e| LoadError::new(path, e))?;
        self.load_bytes(path, kind, &bytes)
    }

    /// Loads a chart from an open handle, reading it to the end.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] if the handle cannot be queried or read, is not a playable chart,
    /// or is malformed.
    pub fn load_from(&self, mut handle: impl ChartHandle) -> Result<Chart, LoadError> {
        let name = handle.name().map_err(|e| LoadError::new("<unknown>", e))?;
        let kind = FormatKind::from_path(&name)
            .ok_or_else(|| LoadError::new(&name, LoadErrorKind::UnsupportedFormat))?;
        let mut bytes = Vec::new();
        handle
            .read_to_end(&mut bytes)
            .map_err(|e| LoadError::new(&name, e))?;
        drop(handle);
        self.load_bytes(&name, kind, &bytes)
    }

    /// Loads the chart at `path` and summarizes it.
    ///
    /// # Errors
    ///
    /// Same as [`ChartLoader::load`].
    pub fn load_info(&self, path: impl AsRef<Path>) -> Result<ChartInfo, LoadError> {
        let path = path.as_ref();
        let chart = self.load(path)?;
        Ok(self.summarize(&chart, path))
    }

    /// Loads a chart from a handle and summarizes it.
    ///
    /// # Errors
    ///
    /// Same as [`ChartLoader::load_from`].
    pub fn load_info_from(&self, handle: impl ChartHandle) -> Result<ChartInfo, LoadError> {
        let name = handle.name().ok();
        let chart = self.load_from(handle)?;
        Ok(self.summarize(&chart, name.as_deref().unwrap_or_else(|| Path::new(""))))
    }

    /// Loads the chart at `path` for gameplay, together with its mode's tunables and an opaque
    /// replay.
    ///
    /// # Errors
    ///
    /// Same as [`ChartLoader::load`].
    pub fn prepare_play<R>(
        &self,
        path: impl AsRef<Path>,
        replay: Option<R>,
    ) -> Result<PlaySetup<R>, LoadError> {
        let path = path.as_ref();
        let chart = self.load(path)?;
        let prop = self
            .registry
            .get(chart.mode())
            .ok_or_else(|| LoadError::new(path, LoadErrorKind::UnregisteredMode(chart.mode())))?;
        Ok(PlaySetup {
            tunables: prop.tunables(),
            chart,
            replay,
        })
    }

    fn summarize(&self, chart: &Chart, path: &Path) -> ChartInfo {
        match self.registry.get(chart.mode()) {
            Some(prop) => prop.new_chart_info(chart, path),
            None => ChartInfo::new(chart, path),
        }
    }

    fn load_bytes(&self, path: &Path, kind: FormatKind, bytes: &[u8]) -> Result<Chart, LoadError> {
        let error = |kind: LoadErrorKind| LoadError::new(path, kind);
        let mode = chart_mode_of(kind, bytes)
            .map_err(|e| error(e.into()))?
            .ok_or_else(|| error(LoadErrorKind::UnsupportedFormat))?;
        let prop = self
            .registry
            .get(mode)
            .ok_or_else(|| error(LoadErrorKind::UnregisteredMode(mode)))?;
        let output = format::parse(kind, bytes, &self.config).map_err(|e| error(e.into()))?;
        for warning in &output.warnings {
            debug!("{}: {warning}", path.display());
        }
        prop.new_chart(&output.source).map_err(|e| error(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::BundledChart;

    #[test]
    fn unknown_extension_is_unsupported() {
        let registry = ModeRegistry::default();
        let loader = ChartLoader::new(&registry, LoadConfig::default());
        let err = loader.load("song.xyz").unwrap_err();
        assert!(matches!(err.kind, LoadErrorKind::UnsupportedFormat));
        assert_eq!(err.path, PathBuf::from("song.xyz"));
    }

    #[test]
    fn ojn_is_classified_but_unsupported() {
        let registry = ModeRegistry::default();
        let loader = ChartLoader::new(&registry, LoadConfig::default());
        let err = loader
            .load_from(BundledChart::new("song.ojn", &b"\0\0\0\0"[..]))
            .unwrap_err();
        assert!(matches!(err.kind, LoadErrorKind::UnsupportedFormat));
    }

    #[test]
    fn unregistered_mode() {
        let registry = ModeRegistry::builder().build();
        let loader = ChartLoader::new(&registry, LoadConfig::default());
        let err = loader
            .load_from(BundledChart::new("song.bms", &b"#00111:01"[..]))
            .unwrap_err();
        assert!(matches!(err.kind, LoadErrorKind::UnregisteredMode(Mode::Piano7)));
    }

    #[test]
    fn default_random_policy_is_reproducible() {
        assert_eq!(LoadConfig::default().bms_random, BmsRandom::Fixed(vec![1]));
    }
}
