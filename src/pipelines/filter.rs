//! Pair and window filtering ahead of a run.
//!
//! - rejected pairs (from an external review step) are dropped by exact,
//!   ordered id match
//! - windows are split into those used by a surviving pair and the rest, so
//!   the single-station and double-difference sides can be processed apart

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::core::io::{derived_path, dump_json, load_json};
use crate::core::model::{
    PairList, RejectionList, StationWindows, WindowList, component_based_windows, station_based_windows,
};
use crate::defaults::{FILTERED_PAIRS_SUFFIX, PAIRED_WINDOWS_SUFFIX, SINGLE_WINDOWS_SUFFIX};
use crate::error::Result;

/// A rejection entry that matched no pair. Not an error, but reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectionNotFound {
    pub component: String,
    pub window_id_i: String,
    pub window_id_j: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilteredPairs {
    pub pairs: PairList,
    pub unmatched: Vec<RejectionNotFound>,
}

/// Drop every pair that exactly matches a rejection of its component.
///
/// `(a, b)` does not reject a pair `(b, a)`. Components absent from the
/// rejection list pass through untouched.
pub fn filter_rejected_pairs(pairs: &PairList, rejections: &RejectionList) -> FilteredPairs {
    let mut filtered = PairList::new();
    let mut unmatched = Vec::new();

    for (component, comp_pairs) in pairs {
        let rejects: HashSet<(&str, &str)> = rejections
            .get(component)
            .map(|rs| rs.iter().map(|(i, j)| (i.as_str(), j.as_str())).collect())
            .unwrap_or_default();

        let kept: Vec<_> = comp_pairs
            .iter()
            .filter(|p| !rejects.contains(&(p.window_id_i.as_str(), p.window_id_j.as_str())))
            .cloned()
            .collect();

        log::info!(
            "[{component}] kept {} of {} pairs ({} rejections)",
            kept.len(),
            comp_pairs.len(),
            rejects.len()
        );
        filtered.insert(component.clone(), kept);
    }

    for (component, rejects) in rejections {
        let comp_pairs = pairs.get(component).map(Vec::as_slice).unwrap_or_default();
        for (window_id_i, window_id_j) in rejects {
            if !comp_pairs.iter().any(|p| p.matches(window_id_i, window_id_j)) {
                log::warn!("[{component}] rejection ({window_id_i}, {window_id_j}) matches no pair");
                unmatched.push(RejectionNotFound {
                    component: component.clone(),
                    window_id_i: window_id_i.clone(),
                    window_id_j: window_id_j.clone(),
                });
            }
        }
    }

    FilteredPairs {
        pairs: filtered,
        unmatched,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowPartition {
    /// Windows referenced by at least one pair of their component
    pub paired: WindowList,
    /// Everything else
    pub single: WindowList,
}

/// Split windows by whether a pair of the same component references them.
/// Both outputs carry every component of `windows`, possibly empty.
pub fn partition_windows(windows: &WindowList, pairs: &PairList) -> WindowPartition {
    let mut paired = WindowList::new();
    let mut single = WindowList::new();

    for (component, comp_windows) in windows {
        let used: HashSet<&str> = pairs
            .get(component)
            .map(|ps| {
                ps.iter()
                    .flat_map(|p| [p.window_id_i.as_str(), p.window_id_j.as_str()])
                    .collect()
            })
            .unwrap_or_default();

        let (p, s): (Vec<_>, Vec<_>) = comp_windows
            .iter()
            .cloned()
            .partition(|w| used.contains(w.window_id.as_str()));

        log::info!("[{component}] {} paired windows, {} single windows", p.len(), s.len());
        paired.insert(component.clone(), p);
        single.insert(component.clone(), s);
    }

    WindowPartition { paired, single }
}

/// Filter a pair file against a rejection file, writing `<pairs>.filter.json`.
pub fn filter_pairs_file(pairs_file: &Path, rejection_file: &Path) -> Result<(PathBuf, FilteredPairs)> {
    let pairs: PairList = load_json(pairs_file)?;
    let rejections: RejectionList = load_json(rejection_file)?;
    let filtered = filter_rejected_pairs(&pairs, &rejections);

    let output = derived_path(pairs_file, FILTERED_PAIRS_SUFFIX);
    dump_json(&filtered.pairs, &output)?;
    log::info!("Filtered pairs written to {}", output.display());
    Ok((output, filtered))
}

/// Split a station-keyed window file by a pair file, writing
/// `<windows>.paired.json` and `<windows>.single.json`.
pub fn filter_windows_file(windows_file: &Path, pairs_file: &Path) -> Result<(PathBuf, PathBuf)> {
    let station_windows: StationWindows = load_json(windows_file)?;
    let windows = component_based_windows(&station_windows)?;
    let pairs: PairList = load_json(pairs_file)?;
    let partition = partition_windows(&windows, &pairs);

    let paired = derived_path(windows_file, PAIRED_WINDOWS_SUFFIX);
    let single = derived_path(windows_file, SINGLE_WINDOWS_SUFFIX);
    dump_json(&station_based_windows(&partition.paired), &paired)?;
    dump_json(&station_based_windows(&partition.single), &single)?;
    log::info!("Windows written to {} and {}", paired.display(), single.display());
    Ok((paired, single))
}
