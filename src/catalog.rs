//! Catalog of chart summaries, per mode.
//!
//! Scans tolerate partial failure: a file which cannot be classified or loaded is logged with
//! [`log::warn!`] and recorded in [`CatalogScan::skipped`], and the scan goes on with its
//! siblings. Files of unknown extension or unplayable modes are passed over silently and never
//! loaded.

use std::{
    cmp::Ordering,
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use log::{debug, info, warn};

use crate::{
    format::FormatKind,
    info::ChartInfo,
    load::{ChartLoader, LoadError, LoadErrorKind},
    mode::{ChartHandle, Mode, chart_file_mode},
};

/// Chart summaries grouped by mode, each group sorted by title, then level, then path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    infos: BTreeMap<Mode, Vec<ChartInfo>>,
}

fn catalog_order(a: &ChartInfo, b: &ChartInfo) -> Ordering {
    a.title
        .cmp(&b.title)
        .then(a.level.total_cmp(&b.level))
        .then_with(|| a.path.cmp(&b.path))
}

impl Catalog {
    /// An empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `info` at its sorted position in the group of its mode.
    pub fn insert(&mut self, info: ChartInfo) {
        let group = self.infos.entry(info.mode).or_default();
        let index = group.partition_point(|other| catalog_order(other, &info) != Ordering::Greater);
        group.insert(index, info);
    }

    /// Summaries of `mode`, sorted.
    #[must_use]
    pub fn get(&self, mode: Mode) -> &[ChartInfo] {
        self.infos.get(&mode).map_or(&[], Vec::as_slice)
    }

    /// All summaries, grouped by mode.
    pub fn iter(&self) -> impl Iterator<Item = &ChartInfo> + '_ {
        self.infos.values().flatten()
    }

    /// Number of summaries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.infos.values().map(Vec::len).sum()
    }

    /// Whether the catalog holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.infos.values().all(Vec::is_empty)
    }
}

impl Extend<ChartInfo> for Catalog {
    fn extend<T: IntoIterator<Item = ChartInfo>>(&mut self, iter: T) {
        for info in iter {
            self.insert(info);
        }
    }
}

/// Result of a scan.
#[derive(Debug, Default)]
pub struct CatalogScan {
    /// Charts loaded successfully.
    pub catalog: Catalog,
    /// Files which looked like charts but failed to load.
    pub skipped: Vec<LoadError>,
}

impl CatalogScan {
    fn add(&mut self, result: Result<ChartInfo, LoadError>) {
        match result {
            Ok(info) => self.catalog.insert(info),
            Err(error) => {
                warn!("skipping chart: {error}");
                self.skipped.push(error);
            }
        }
    }
}

/// Scans the song directories under `root`. Charts directly inside `root` are scanned too.
///
/// # Errors
///
/// Returns the I/O error if `root` itself cannot be listed. Failures below it are skipped.
pub fn scan_dir(loader: &ChartLoader<'_>, root: impl AsRef<Path>) -> io::Result<CatalogScan> {
    let root = root.as_ref();
    let mut scan = CatalogScan::default();
    for entry in sorted_entries(root)? {
        if entry.is_dir() {
            match sorted_entries(&entry) {
                Ok(files) => {
                    for file in files.into_iter().filter(|path| path.is_file()) {
                        scan_file(loader, &file, &mut scan);
                    }
                }
                Err(error) => {
                    warn!("skipping song directory {}: {error}", entry.display());
                    scan.skipped.push(LoadError::new(entry, error));
                }
            }
        } else {
            scan_file(loader, &entry, &mut scan);
        }
    }
    info!(
        "scanned {}: {} charts, {} skipped",
        root.display(),
        scan.catalog.len(),
        scan.skipped.len()
    );
    Ok(scan)
}

fn sorted_entries(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut paths = fs::read_dir(dir)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<io::Result<Vec<_>>>()?;
    paths.sort();
    Ok(paths)
}

fn scan_file(loader: &ChartLoader<'_>, path: &Path, scan: &mut CatalogScan) {
    match chart_file_mode(path) {
        Ok(Some(mode)) if loader.registry().get(mode).is_some() => scan.add(loader.load_info(path)),
        Ok(_) => {}
        Err(error) => scan.add(Err(LoadError::new(path, error))),
    }
}

/// Scans charts bundled as open handles, such as the entries of an archive.
pub fn scan_bundle<H: ChartHandle>(
    loader: &ChartLoader<'_>,
    handles: impl IntoIterator<Item = H>,
) -> CatalogScan {
    let mut scan = CatalogScan::default();
    for handle in handles {
        let name = match handle.name() {
            Ok(name) => name,
            Err(error) => {
                scan.add(Err(LoadError::new("<unknown>", error)));
                continue;
            }
        };
        if FormatKind::from_path(&name).is_none() {
            continue;
        }
        match loader.load_info_from(handle) {
            Err(LoadError {
                kind: LoadErrorKind::UnsupportedFormat,
                ..
            }) => debug!("passing over {}: not a playable chart", name.display()),
            result => scan.add(result),
        }
    }
    info!(
        "scanned bundle: {} charts, {} skipped",
        scan.catalog.len(),
        scan.skipped.len()
    );
    scan
}
