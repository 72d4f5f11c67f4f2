//! Measurement-only run: the adjoint round without adjoint sources.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;

use super::{Measurement, PairCalculator, RunInputs, TagAbsent, WaveformSource, run_component};
use crate::core::io::dump_json;
use crate::core::model::{Component, WindowPair, validate_pair_references};
use crate::distributed::RoundExecutor;
use crate::error::Result;
use crate::params::ParamFile;

/// `component -> station -> measurements`, each tagged with `paired_with`.
pub type MeasurementFile = BTreeMap<Component, BTreeMap<String, Vec<Measurement>>>;

#[derive(Debug, Default)]
pub struct MeasureRun {
    pub measures: MeasurementFile,
    pub absent: Vec<TagAbsent>,
}

fn tag_partner(mut meas: Measurement, partner: &str) -> Measurement {
    meas.insert("paired_with".to_string(), Value::from(partner));
    meas
}

/// Measure every pair of every component. Only the coordinator gets `Some`.
///
/// Every component of the pair list gets an entry, possibly empty.
pub fn calc_measures<E, S, C>(
    exec: &E,
    params: &ParamFile,
    run: &RunInputs<'_, S>,
    calculator: &C,
) -> Result<Option<MeasureRun>>
where
    E: RoundExecutor<WindowPair, (Measurement, Measurement)>,
    S: WaveformSource + ?Sized,
    C: PairCalculator,
{
    let adj_src_type = params.adjoint_source_type()?;
    validate_pair_references(run.pairs, run.windows)?;

    let mut out = MeasureRun::default();
    for component in run.pairs.keys() {
        let round = run_component(exec, run, adj_src_type, component, |inputs| {
            calculator.measure_pair(inputs)
        })?;
        let Some(round) = round else {
            continue;
        };
        out.absent.extend(round.absent);

        let comp_measures = out.measures.entry(component.clone()).or_default();
        for ((sta_i, sta_j), (meas_i, meas_j)) in round.results {
            comp_measures
                .entry(sta_i.clone())
                .or_default()
                .push(tag_partner(meas_i, &sta_j));
            comp_measures
                .entry(sta_j)
                .or_default()
                .push(tag_partner(meas_j, &sta_i));
        }
        log::info!("[{component}] measurements for {} stations", comp_measures.len());
    }

    Ok(exec.role().is_coordinator().then_some(out))
}

/// Write measurements as pretty-printed JSON with sorted keys.
pub fn write_measures(measures: &MeasurementFile, path: &Path) -> Result<()> {
    log::info!("Writing measurements to {}", path.display());
    dump_json(measures, path)
}
