//! Per-mode capabilities and the registry holding them.
//!
//! A [`ModeRegistry`] is assembled once with [`ModeRegistryBuilder`] and cannot change afterwards:
//! it has no mutating method, and the builder is consumed by [`ModeRegistryBuilder::build`].
//! Share it by reference (or in an `Arc`) with every loader.

use std::path::Path;

use thiserror::Error;

use crate::{
    chart::{BuildError, Chart},
    format::ChartSource,
    info::ChartInfo,
    mode::Mode,
};

/// Tunables of a mode handed to gameplay.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModeTunables {
    /// Scroll speed in screen lengths per second at a speed multiplier of `1.0`.
    pub speed_scale: f64,
    /// Distance from where notes appear to the judgement line, in screen lengths.
    pub travel_distance: f64,
}

impl ModeTunables {
    /// How long a note is visible before reaching the judgement line, in milliseconds, when the
    /// chart scrolls at `speed`. Infinite when the chart does not scroll.
    #[must_use]
    pub fn exposure_time(&self, speed: f64) -> f64 {
        let velocity = self.speed_scale * speed;
        if velocity > 0.0 {
            1000.0 * self.travel_distance / velocity
        } else {
            f64::INFINITY
        }
    }

    /// Returns a copy with another speed scale.
    #[must_use]
    pub const fn with_speed_scale(self, speed_scale: f64) -> Self {
        Self {
            speed_scale,
            ..self
        }
    }
}

/// Capabilities of a gameplay mode.
pub trait ModeProp: Send + Sync {
    /// The mode served.
    fn mode(&self) -> Mode;

    /// Display name.
    fn name(&self) -> &str {
        self.mode().name()
    }

    /// Tunables handed to gameplay.
    fn tunables(&self) -> ModeTunables;

    /// Builds the chart of a parsed source.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] if the source cannot be played under this mode.
    fn new_chart(&self, source: &ChartSource) -> Result<Chart, BuildError> {
        Chart::build(source, self.mode())
    }

    /// Summarizes a chart for the catalog.
    fn new_chart_info(&self, chart: &Chart, path: &Path) -> ChartInfo {
        ChartInfo::new(chart, path)
    }

    /// [`ModeTunables::exposure_time`] of this mode.
    fn exposure_time(&self, speed: f64) -> f64 {
        self.tunables().exposure_time(speed)
    }
}

/// Key modes, with lanes falling from the top of the screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PianoMode {
    mode: Mode,
    tunables: ModeTunables,
}

impl PianoMode {
    const TUNABLES: ModeTunables = ModeTunables {
        speed_scale: 1.0,
        travel_distance: 0.85,
    };

    /// Up to 4 lanes, or 6.
    #[must_use]
    pub const fn piano4() -> Self {
        Self {
            mode: Mode::Piano4,
            tunables: Self::TUNABLES,
        }
    }

    /// 5, 7 or more lanes.
    #[must_use]
    pub const fn piano7() -> Self {
        Self {
            mode: Mode::Piano7,
            tunables: Self::TUNABLES,
        }
    }

    /// Replaces the tunables.
    #[must_use]
    pub const fn with_tunables(self, tunables: ModeTunables) -> Self {
        Self { tunables, ..self }
    }
}

impl ModeProp for PianoMode {
    fn mode(&self) -> Mode {
        self.mode
    }

    fn tunables(&self) -> ModeTunables {
        self.tunables
    }
}

/// Percussion mode, with notes scrolling horizontally.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrumMode {
    tunables: ModeTunables,
}

impl DrumMode {
    /// Default tunables.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tunables: ModeTunables {
                speed_scale: 1.2,
                travel_distance: 1.1,
            },
        }
    }

    /// Replaces the tunables.
    #[must_use]
    pub const fn with_tunables(self, tunables: ModeTunables) -> Self {
        Self { tunables }
    }
}

impl Default for DrumMode {
    fn default() -> Self {
        Self::new()
    }
}

impl ModeProp for DrumMode {
    fn mode(&self) -> Mode {
        Mode::Drum
    }

    fn tunables(&self) -> ModeTunables {
        self.tunables
    }
}

/// Single lane singing mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KaraokeMode {
    tunables: ModeTunables,
}

impl KaraokeMode {
    /// Default tunables.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tunables: ModeTunables {
                speed_scale: 0.8,
                travel_distance: 1.0,
            },
        }
    }

    /// Replaces the tunables.
    #[must_use]
    pub const fn with_tunables(self, tunables: ModeTunables) -> Self {
        Self { tunables }
    }
}

impl Default for KaraokeMode {
    fn default() -> Self {
        Self::new()
    }
}

impl ModeProp for KaraokeMode {
    fn mode(&self) -> Mode {
        Mode::Karaoke
    }

    fn tunables(&self) -> ModeTunables {
        self.tunables
    }
}

/// Errors while assembling a registry.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum RegistryError {
    /// Two capabilities were registered for one mode.
    #[error("mode {0} is already registered")]
    DuplicateMode(Mode),
}

/// Collects mode capabilities before freezing them into a [`ModeRegistry`].
#[derive(Default)]
pub struct ModeRegistryBuilder {
    modes: Vec<Box<dyn ModeProp>>,
}

impl ModeRegistryBuilder {
    /// An empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the capabilities of one mode.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateMode`] if the mode is already registered.
    pub fn register(mut self, prop: impl ModeProp + 'static) -> Result<Self, RegistryError> {
        let mode = prop.mode();
        if self.modes.iter().any(|registered| registered.mode() == mode) {
            return Err(RegistryError::DuplicateMode(mode));
        }
        self.modes.push(Box::new(prop));
        Ok(self)
    }

    /// Freezes the registry.
    #[must_use]
    pub fn build(mut self) -> ModeRegistry {
        self.modes.sort_by_key(|prop| prop.mode());
        ModeRegistry { modes: self.modes }
    }
}

impl std::fmt::Debug for ModeRegistryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.modes.iter().map(|prop| prop.mode()))
            .finish()
    }
}

/// The immutable set of supported modes.
pub struct ModeRegistry {
    modes: Vec<Box<dyn ModeProp>>,
}

impl ModeRegistry {
    /// Starts assembling a registry.
    #[must_use]
    pub fn builder() -> ModeRegistryBuilder {
        ModeRegistryBuilder::new()
    }

    /// The capabilities of `mode`, if registered.
    #[must_use]
    pub fn get(&self, mode: Mode) -> Option<&dyn ModeProp> {
        self.modes
            .iter()
            .find(|prop| prop.mode() == mode)
            .map(AsRef::as_ref)
    }

    /// Registered capabilities, ordered by mode.
    pub fn iter(&self) -> impl Iterator<Item = &dyn ModeProp> + '_ {
        self.modes.iter().map(AsRef::as_ref)
    }

    /// Registered modes.
    pub fn modes(&self) -> impl Iterator<Item = Mode> + '_ {
        self.modes.iter().map(|prop| prop.mode())
    }
}

impl Default for ModeRegistry {
    /// All four built-in modes with default tunables.
    fn default() -> Self {
        Self {
            modes: vec![
                Box::new(PianoMode::piano4()),
                Box::new(PianoMode::piano7()),
                Box::new(DrumMode::new()),
                Box::new(KaraokeMode::new()),
            ],
        }
    }
}

impl std::fmt::Debug for ModeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModeRegistry")
            .field("modes", &self.modes().collect::<Vec<_>>())
            .finish()
    }
}

/// What gameplay receives once per play session.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaySetup<R> {
    /// The chart to play.
    pub chart: Chart,
    /// Tunables of the chart's mode.
    pub tunables: ModeTunables,
    /// An already decoded replay to play back, opaque to this crate.
    pub replay: Option<R>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn registry_is_shareable() {
        assert_send_sync::<ModeRegistry>();
    }

    #[test]
    fn duplicate_mode_is_rejected() {
        let result = ModeRegistry::builder()
            .register(PianoMode::piano4())
            .and_then(|builder| builder.register(PianoMode::piano4()));
        assert_eq!(
            result.map(|_| ()),
            Err(RegistryError::DuplicateMode(Mode::Piano4))
        );
    }

    #[test]
    fn lookup_by_mode() {
        let registry = ModeRegistry::builder()
            .register(DrumMode::new())
            .and_then(|builder| builder.register(PianoMode::piano7()))
            .unwrap()
            .build();
        assert_eq!(registry.modes().collect::<Vec<_>>(), vec![Mode::Piano7, Mode::Drum]);
        assert!(registry.get(Mode::Karaoke).is_none());
        assert_eq!(registry.get(Mode::Drum).map(|prop| prop.name()), Some("Drum"));
    }

    #[test]
    fn exposure_time_follows_speed() {
        let tunables = ModeTunables {
            speed_scale: 1.0,
            travel_distance: 0.5,
        };
        assert_eq!(tunables.exposure_time(1.0), 500.0);
        assert_eq!(tunables.exposure_time(2.0), 250.0);
        assert_eq!(tunables.with_speed_scale(0.5).exposure_time(1.0), 1000.0);
        assert!(tunables.exposure_time(0.0).is_infinite());
    }
}
