//! Double-difference adjoint source run.
//!
//! Per component: load traces, run one distributed round over the pairs,
//! aggregate the per-pair halves into one adjoint source per station. The
//! coordinator ends up with `station -> [adjoint source per component]` and
//! files it into an archive.

use std::collections::BTreeMap;

use super::{PairCalculator, RunInputs, TagAbsent, WaveformSource, run_component};
use crate::core::adjoint::AdjointSource;
use crate::core::model::{WindowPair, validate_pair_references};
use crate::distributed::RoundExecutor;
use crate::error::Result;
use crate::params::ParamFile;
use crate::pipelines::aggregate::aggregate_with_roster;
use crate::pipelines::archive::AdjointArchive;

/// Coordinator-side result of [`calc_adj_sources`].
#[derive(Debug, Default)]
pub struct AdjointRun {
    /// Station -> aggregated adjoint sources, one per component that had a
    /// contribution for it
    pub sources: BTreeMap<String, Vec<AdjointSource>>,
    pub absent: Vec<TagAbsent>,
}

impl AdjointRun {
    pub fn n_sources(&self) -> usize {
        self.sources.values().map(Vec::len).sum()
    }
}

/// Compute aggregated double-difference adjoint sources for every component.
///
/// The adjoint source type and the pair/window references are validated
/// before any round starts. Every participant calls this; only the
/// coordinator gets `Some`.
pub fn calc_adj_sources<E, S, C>(
    exec: &E,
    params: &ParamFile,
    run: &RunInputs<'_, S>,
    calculator: &C,
) -> Result<Option<AdjointRun>>
where
    E: RoundExecutor<WindowPair, (AdjointSource, AdjointSource)>,
    S: WaveformSource + ?Sized,
    C: PairCalculator,
{
    let adj_src_type = params.adjoint_source_type()?;
    validate_pair_references(run.pairs, run.windows)?;
    log::info!("Adjoint source type: {adj_src_type}");

    let mut out = AdjointRun::default();
    for component in run.pairs.keys() {
        let round = run_component(exec, run, adj_src_type, component, |inputs| {
            calculator.adjoint_pair(inputs)
        })?;
        let Some(round) = round else {
            continue;
        };

        out.absent.extend(round.absent);
        for (station, adj) in aggregate_with_roster(round.results, &round.stations) {
            match adj {
                Some(adj) => out.sources.entry(station).or_default().push(adj),
                None => log::debug!("[{component}] {station}: no double-difference contribution"),
            }
        }
    }

    if !exec.role().is_coordinator() {
        return Ok(None);
    }
    log::info!(
        "{} adjoint sources for {} stations",
        out.n_sources(),
        out.sources.len()
    );
    Ok(Some(out))
}

/// File every adjoint source of `run` into `archive`, together with receiver
/// locations and events from `waveforms`. Returns the number of entries.
pub fn write_adjoint_sources<S, A>(run: &AdjointRun, waveforms: &S, archive: &mut A) -> Result<usize>
where
    S: WaveformSource + ?Sized,
    A: AdjointArchive + ?Sized,
{
    for event in waveforms.events()? {
        archive.add_event(event);
    }

    let mut written = 0;
    for (station, sources) in &run.sources {
        let location = match waveforms.location(station)? {
            Some(location) => location,
            None => {
                log::warn!("{station}: no station inventory, writing zero coordinates");
                Default::default()
            }
        };
        for source in sources {
            archive.add(source, &location)?;
            written += 1;
        }
    }
    archive.flush()?;
    Ok(written)
}
