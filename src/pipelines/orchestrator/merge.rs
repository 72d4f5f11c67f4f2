//! Merge single-station and double-difference adjoint archives.

use std::collections::BTreeMap;

use crate::core::adjoint::{AdjointSource, StationLocation};
use crate::core::model::{PairList, WindowList};
use crate::error::{DdError, Result};
use crate::pipelines::archive::AdjointArchive;
use crate::pipelines::merge::merge_weighted;
use crate::pipelines::normalization::{MergeWeights, NormalizationTable, normalization_table};

#[derive(Debug, Clone, PartialEq)]
pub struct MergeSummary {
    pub normalization: NormalizationTable,
    pub single_only: usize,
    pub dd_only: usize,
    pub both: usize,
}

impl MergeSummary {
    pub fn written(&self) -> usize {
        self.single_only + self.dd_only + self.both
    }
}

type Loaded = BTreeMap<String, (AdjointSource, StationLocation)>;

fn load_all<A: AdjointArchive + ?Sized>(archive: &A) -> Result<Loaded> {
    let mut out = Loaded::new();
    for path in archive.list() {
        let entry = archive.get(&path)?.ok_or_else(|| DdError::InvalidArchiveEntry {
            path: path.clone(),
            reason: "listed but not readable".to_string(),
        })?;
        out.insert(path, entry);
    }
    Ok(out)
}

/// Weighted union merge of `single` and `dd` into `output`.
///
/// Normalization factors come from the filtered pairs and the single-station
/// windows. The receiver location of a merged entry is taken from the
/// double-difference side when present. Events are copied from `dd`.
pub fn merge_adjoints<A, B>(
    pairs: &PairList,
    single_windows: &WindowList,
    weights: MergeWeights,
    single: &A,
    dd: &A,
    output: &mut B,
) -> Result<MergeSummary>
where
    A: AdjointArchive + ?Sized,
    B: AdjointArchive + ?Sized,
{
    let normalization = normalization_table(pairs, single_windows, weights);

    let single_entries = load_all(single)?;
    let dd_entries = load_all(dd)?;
    log::info!(
        "Loaded {} single-station and {} double-difference adjoint sources",
        single_entries.len(),
        dd_entries.len()
    );

    let mut locations = BTreeMap::new();
    let mut single_values = BTreeMap::new();
    let mut dd_values = BTreeMap::new();
    let (mut single_only, mut dd_only, mut both) = (0, 0, 0);

    for (path, (source, loc)) in single_entries {
        if !dd_entries.contains_key(&path) {
            single_only += 1;
        }
        locations.insert(path.clone(), loc);
        single_values.insert(path, source);
    }
    for (path, (source, loc)) in dd_entries {
        if single_values.contains_key(&path) {
            both += 1;
        } else {
            dd_only += 1;
        }
        locations.insert(path.clone(), loc);
        dd_values.insert(path, source);
    }

    let merged = merge_weighted(single_values, dd_values, &normalization, weights)?;
    for (path, source) in &merged {
        let loc = locations.get(path).copied().unwrap_or_default();
        output.add(source, &loc)?;
    }

    for event in dd.events() {
        output.add_event(event.clone());
    }
    output.flush()?;

    let summary = MergeSummary {
        normalization,
        single_only,
        dd_only,
        both,
    };
    log::info!(
        "Merged {} adjoint sources ({} single only, {} double-difference only, {} both)",
        summary.written(),
        single_only,
        dd_only,
        both
    );
    Ok(summary)
}
