//! Chart ingestion for a multi-mode rhythm game.
//!
//! The crate turns chart files of several formats into one playable model and a catalog summary:
//!
//! - [`format`] reads `.osu`, BMS (`.bms/.bme/.bml`) and `.bmson` files into a
//!   [`format::ChartSource`], reporting recoverable oddities as warnings.
//! - [`mode`] decides which gameplay mode a chart belongs to without building it.
//! - [`chart`] builds the tempo timeline and the ordered notes of a [`chart::Chart`], and rejects
//!   structurally broken charts.
//! - [`info`] derives the [`info::ChartInfo`] kept in song selection, with a difficulty estimate.
//! - [`registry`] holds the capabilities of each mode, frozen once assembled.
//! - [`load`] and [`catalog`] tie the above together for single files, open handles and whole
//!   song directories.
//!
//! Loads are synchronous and never print: parser warnings go to the [`log`] facade at debug
//! level, and the `diagnostics` feature renders them with `ariadne` on demand.
//!
//! ```rust
//! use rhythm_chart::prelude::*;
//!
//! let registry = ModeRegistry::default();
//! let loader = ChartLoader::new(&registry, LoadConfig::default());
//! let text = "\
//! osu file format v14
//!
//! [General]
//! Mode: 3
//!
//! [Metadata]
//! Title:Song
//!
//! [Difficulty]
//! CircleSize:4
//!
//! [TimingPoints]
//! 0,500,4,2,0,100,1,0
//!
//! [HitObjects]
//! 64,192,1000,1,0,0:0:0:0:
//! ";
//! let chart = loader.load_from(BundledChart::new("song.osu", text.as_bytes())).unwrap();
//! assert_eq!(chart.mode(), Mode::Piano4);
//! assert_eq!(chart.notes().len(), 1);
//! ```
//!
//! [`log`]: https://crates.io/crates/log

pub mod catalog;
pub mod chart;
#[cfg(feature = "diagnostics")]
pub mod diagnostics;
pub mod format;
pub mod info;
pub mod load;
pub mod mode;
pub mod prelude;
pub mod registry;
