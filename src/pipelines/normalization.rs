//! Per-component normalization of single-station vs double-difference weights.
//!
//! For one component:
//!
//! ```text
//! dd_total_weight     = dd_weight * Σ_pairs (weight_i + weight_j)
//! n_dd_meas           = |{window_id_i} ∪ {window_id_j}|
//! n_single_meas       = |single windows|
//! single_total_weight = single_weight * n_single_meas
//! factor              = (n_dd_meas + n_single_meas) / (dd_total_weight + single_total_weight)
//! ```
//!
//! A pair contributes both of its sub-weights while its windows are counted
//! once each, however many pairs share them. Weights are not range-checked;
//! negative or fractional weights go straight into the sums.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::core::model::{Component, Pair, PairList, Window, WindowList};
use crate::defaults::{DD_WEIGHT, SINGLE_WEIGHT};
use crate::error::{DdError, Result};

/// Static merge weights, shared by every component.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MergeWeights {
    pub single_weight: f64,
    pub dd_weight: f64,
}

impl Default for MergeWeights {
    fn default() -> Self {
        Self {
            single_weight: SINGLE_WEIGHT,
            dd_weight: DD_WEIGHT,
        }
    }
}

/// Intermediate counts for one component, kept for logging and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentStats {
    pub dd_total_weight: f64,
    pub n_dd_meas: usize,
    pub n_single_meas: usize,
    pub single_total_weight: f64,
}

impl ComponentStats {
    pub fn n_meas(&self) -> usize {
        self.n_dd_meas + self.n_single_meas
    }

    pub fn total_weight(&self) -> f64 {
        self.dd_total_weight + self.single_total_weight
    }

    /// `None` when the total weight is zero (no measurements at all).
    pub fn factor(&self) -> Option<f64> {
        let total = self.total_weight();
        if total == 0.0 {
            return None;
        }
        Some(self.n_meas() as f64 / total)
    }
}

pub fn component_stats(pairs: &[Pair], single_windows: &[Window], weights: MergeWeights) -> ComponentStats {
    let mut pair_weight_sum = 0.0;
    let mut unique_dd_ids: HashSet<&str> = HashSet::new();
    for pair in pairs {
        pair_weight_sum += pair.weight_i;
        pair_weight_sum += pair.weight_j;
        unique_dd_ids.insert(&pair.window_id_i);
        unique_dd_ids.insert(&pair.window_id_j);
    }

    let n_single_meas = single_windows.len();
    ComponentStats {
        dd_total_weight: weights.dd_weight * pair_weight_sum,
        n_dd_meas: unique_dd_ids.len(),
        n_single_meas,
        single_total_weight: weights.single_weight * n_single_meas as f64,
    }
}

/// Component -> normalization factor.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NormalizationTable(BTreeMap<Component, f64>);

impl NormalizationTable {
    /// Factor for `component`; components without measurements have none.
    pub fn get(&self, component: &str) -> Result<f64> {
        self.0
            .get(component)
            .copied()
            .ok_or_else(|| DdError::MissingNormalization(component.to_string()))
    }

    pub fn insert(&mut self, component: impl Into<Component>, factor: f64) {
        self.0.insert(component.into(), factor);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Component, &f64)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Normalization factors for every component seen in either the pairs or the
/// single windows. Components whose total weight is zero are left out.
pub fn normalization_table(pairs: &PairList, single_windows: &WindowList, weights: MergeWeights) -> NormalizationTable {
    let components: BTreeSet<&Component> = pairs.keys().chain(single_windows.keys()).collect();

    let mut table = NormalizationTable::default();
    for component in components {
        let comp_pairs = pairs.get(component).map(Vec::as_slice).unwrap_or_default();
        let comp_windows = single_windows.get(component).map(Vec::as_slice).unwrap_or_default();
        let stats = component_stats(comp_pairs, comp_windows, weights);

        log::debug!(
            "[{component}] dd_total_weight={} n_dd_meas={} n_single_meas={} total_weight={}",
            stats.dd_total_weight,
            stats.n_dd_meas,
            stats.n_single_meas,
            stats.total_weight()
        );

        match stats.factor() {
            Some(factor) => {
                log::info!("[{component}] normalization factor: {factor:.6}");
                table.insert(component.clone(), factor);
            }
            None => log::warn!("[{component}] total weight is zero, no normalization factor"),
        }
    }
    table
}
