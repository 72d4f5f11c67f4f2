//! Run orchestration.
//!
//! Orchestrators drive one complete run per command:
//! - `adjoint` - distributed double-difference adjoint sources, aggregated per
//!   station and written to an archive
//! - `measure` - the same round, emitting per-station measurement lists
//! - `merge` - normalization plus weighted merge of single-station and
//!   double-difference archives
//!
//! Components are processed strictly one after another; each component is
//! one distributed round keyed by `(window_id_i, window_id_j)`. Two stations
//! may share several pairs on different windows, so station keys only appear
//! once the round is merged.
//!
//! The physics lives behind two seams: [`WaveformSource`] (observed and
//! synthetic traces from an external waveform archive) and [`PairCalculator`]
//! (the external adjoint library evaluating one window pair).

pub mod adjoint;
pub mod measure;
pub mod merge;

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use crate::core::adjoint::{AdjointSource, StationLocation, Trace};
use crate::core::model::{Pair, PairList, Window, WindowList, WindowPair, station_of_window_id, stations_of_pairs};
use crate::core::splitter::slice_range;
use crate::distributed::{Role, RoundExecutor};
use crate::error::{DdError, Result};
use crate::params::AdjointSourceType;
use crate::pipelines::aggregate::StationPair;

/// Station (`NET.STA`) -> trace for one component.
pub type TraceSet = BTreeMap<String, Trace>;

/// One side of a pair measurement, as produced by the adjoint library.
pub type Measurement = Map<String, Value>;

/// External waveform archive.
pub trait WaveformSource {
    /// Trace of `station` under `tag` for `component`, or `None` if the station
    /// has no waveform with that tag.
    fn trace(&self, station: &str, tag: &str, component: &str) -> Result<Option<Trace>>;

    /// Receiver coordinates, if the station has inventory.
    fn location(&self, station: &str) -> Result<Option<StationLocation>>;

    /// Event descriptions carried into output archives.
    fn events(&self) -> Result<Vec<Value>> {
        Ok(Vec::new())
    }
}

/// A station that lacks the requested waveform tag. Tolerated and skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagAbsent {
    pub station: String,
    pub tag: String,
    pub component: String,
}

/// Traces for `stations`, plus a [`TagAbsent`] for every station without one.
pub fn collect_traces<S: WaveformSource + ?Sized>(
    source: &S,
    stations: &[String],
    tag: &str,
    component: &str,
) -> Result<(TraceSet, Vec<TagAbsent>)> {
    let mut traces = TraceSet::new();
    let mut absent = Vec::new();
    for station in stations {
        match source.trace(station, tag, component)? {
            Some(trace) => {
                traces.insert(station.clone(), trace);
            }
            None => {
                log::warn!("{station}: no waveform under tag '{tag}' for component {component}");
                absent.push(TagAbsent {
                    station: station.clone(),
                    tag: tag.to_string(),
                    component: component.to_string(),
                });
            }
        }
    }
    Ok((traces, absent))
}

/// Everything the adjoint library needs to evaluate one pair.
#[derive(Debug, Clone, Copy)]
pub struct PairInputs<'a> {
    pub adj_src_type: AdjointSourceType,
    pub component: &'a str,
    pub pair: &'a Pair,
    /// All windows of the component
    pub windows: &'a [Window],
    pub obsd: &'a TraceSet,
    pub synt: &'a TraceSet,
}

impl<'a> PairInputs<'a> {
    pub fn window(&self, window_id: &str) -> Option<&'a Window> {
        self.windows.iter().find(|w| w.window_id == window_id)
    }
}

/// External adjoint library, evaluated once per pair.
///
/// Implementations must be pure with respect to the pair: the same inputs give
/// the same outputs, whichever worker evaluates them.
pub trait PairCalculator: Sync {
    /// Adjoint sources for station i and station j.
    fn adjoint_pair(&self, inputs: &PairInputs<'_>) -> Result<(AdjointSource, AdjointSource)>;

    /// Measurements for station i and station j.
    fn measure_pair(&self, inputs: &PairInputs<'_>) -> Result<(Measurement, Measurement)>;
}

/// Inputs shared by the adjoint and measurement runs.
pub struct RunInputs<'a, S: ?Sized> {
    pub pairs: &'a PairList,
    pub windows: &'a WindowList,
    pub obsd: &'a S,
    pub obsd_tag: &'a str,
    pub synt: &'a S,
    pub synt_tag: &'a str,
}

/// Coordinator-side outcome of one component round.
#[derive(Debug)]
pub struct ComponentRound<V> {
    /// Per-pair halves in window-pair order, keyed by their stations
    pub results: Vec<(StationPair, (V, V))>,
    /// Every station of the component's pairs
    pub stations: Vec<String>,
    pub absent: Vec<TagAbsent>,
}

/// Which of the component's pairs this participant needs traces for.
///
/// The coordinator loads everything; a worker only its own slice.
pub(crate) fn local_pairs(pairs: &[Pair], role: Role, workers: usize) -> &[Pair] {
    match role {
        Role::Coordinator => pairs,
        Role::Worker(rank) => &pairs[slice_range(pairs.len(), workers, rank)],
    }
}

/// Re-tag a failure with the index of the job that raised it.
fn in_job(index: usize, err: DdError) -> DdError {
    match err {
        DdError::Job { message, .. } => DdError::Job { index, message },
        other => DdError::job(index, other),
    }
}

/// One distributed round over the pairs of `component`.
///
/// Pairs touching a station without observed or synthetic traces are skipped.
/// Workers get `Ok(None)`.
pub(crate) fn run_component<E, S, V, F>(
    exec: &E,
    run: &RunInputs<'_, S>,
    adj_src_type: AdjointSourceType,
    component: &str,
    eval: F,
) -> Result<Option<ComponentRound<V>>>
where
    E: RoundExecutor<WindowPair, (V, V)>,
    S: WaveformSource + ?Sized,
    F: Fn(&PairInputs<'_>) -> Result<(V, V)> + Sync,
{
    let comp_pairs = run.pairs.get(component).map(Vec::as_slice).unwrap_or_default();
    let windows = run.windows.get(component).map(Vec::as_slice).unwrap_or_default();

    let stations = stations_of_pairs(local_pairs(comp_pairs, exec.role(), exec.workers()))?;
    let (obsd, mut absent) = collect_traces(run.obsd, &stations, run.obsd_tag, component)?;
    let (synt, synt_absent) = collect_traces(run.synt, &stations, run.synt_tag, component)?;
    absent.extend(synt_absent);

    let missing: BTreeSet<String> = absent.iter().map(|a| a.station.clone()).collect();

    let job = |idx: &usize| -> Result<Vec<(WindowPair, (V, V))>> {
        let pair = &comp_pairs[*idx];
        let (sta_i, sta_j) = pair.stations().map_err(|e| in_job(*idx, e))?;
        if missing.contains(&sta_i) || missing.contains(&sta_j) {
            log::debug!(
                "[{component}] skipping pair ({}, {}): missing waveforms",
                pair.window_id_i,
                pair.window_id_j
            );
            return Ok(Vec::new());
        }
        let inputs = PairInputs {
            adj_src_type,
            component,
            pair,
            windows,
            obsd: &obsd,
            synt: &synt,
        };
        let value = eval(&inputs).map_err(|e| in_job(*idx, e))?;
        Ok(vec![(pair.window_ids(), value)])
    };

    log::info!(
        "[{component}] {} pairs over {} stations, {} participants",
        comp_pairs.len(),
        stations.len(),
        exec.workers()
    );
    let merged = exec.run_round((0..comp_pairs.len()).collect(), job)?;

    let Some(merged) = merged else {
        return Ok(None);
    };
    let results = merged
        .into_iter()
        .map(|((id_i, id_j), halves)| {
            let key = (
                station_of_window_id(&id_i)?.to_string(),
                station_of_window_id(&id_j)?.to_string(),
            );
            Ok((key, halves))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Some(ComponentRound {
        results,
        stations,
        absent,
    }))
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory stand-ins for the external collaborators.

    use super::*;

    /// Waveforms keyed by (station, tag). Every trace has `n_samples` samples.
    pub struct MemoryWaveforms {
        pub tagged: BTreeSet<(String, String)>,
        pub n_samples: usize,
    }

    impl MemoryWaveforms {
        pub fn new(stations: &[&str], tags: &[&str], n_samples: usize) -> Self {
            let tagged = stations
                .iter()
                .flat_map(|s| tags.iter().map(move |t| (s.to_string(), t.to_string())))
                .collect();
            Self { tagged, n_samples }
        }
    }

    impl WaveformSource for MemoryWaveforms {
        fn trace(&self, station: &str, tag: &str, component: &str) -> Result<Option<Trace>> {
            if !self.tagged.contains(&(station.to_string(), tag.to_string())) {
                return Ok(None);
            }
            Ok(Some(Trace {
                id: format!("{station}.00.BH{component}"),
                starttime: "2010-03-04T22:17:47.000000Z".to_string(),
                dt: 1.0,
                data: vec![0.0; self.n_samples],
            }))
        }

        fn location(&self, _station: &str) -> Result<Option<StationLocation>> {
            Ok(Some(StationLocation {
                latitude: 10.0,
                longitude: 20.0,
                elevation: 30.0,
                local_depth: 0.0,
            }))
        }

        fn events(&self) -> Result<Vec<Value>> {
            Ok(vec![serde_json::json!({"id": "C201003042218A"})])
        }
    }

    /// Adjoint "library" that emits constant series: station i gets
    /// `weight_i`, station j gets `-weight_j`, at every sample.
    pub struct ConstantCalculator {
        pub fail_on: Option<String>,
    }

    fn side(inputs: &PairInputs<'_>, window_id: &str, value: f64) -> Result<AdjointSource> {
        let station = station_of_window_id(window_id)?;
        let (network, sta) = station.split_once('.').unwrap_or((station, ""));
        let trace = inputs
            .obsd
            .get(station)
            .ok_or_else(|| DdError::job(0, format!("no trace for {station}")))?;
        Ok(AdjointSource {
            adj_src_type: inputs.adj_src_type.to_string(),
            network: network.to_string(),
            station: sta.to_string(),
            location: "00".to_string(),
            component: format!("BH{}", inputs.component),
            dt: trace.dt,
            min_period: 27.0,
            max_period: 60.0,
            misfit: value.abs(),
            starttime: trace.starttime.clone(),
            adjoint_source: vec![value; trace.data.len()],
        })
    }

    impl PairCalculator for ConstantCalculator {
        fn adjoint_pair(&self, inputs: &PairInputs<'_>) -> Result<(AdjointSource, AdjointSource)> {
            if self.fail_on.as_deref() == Some(inputs.pair.window_id_i.as_str()) {
                return Err(DdError::job(0, "adjoint library raised"));
            }
            Ok((
                side(inputs, &inputs.pair.window_id_i, inputs.pair.weight_i)?,
                side(inputs, &inputs.pair.window_id_j, -inputs.pair.weight_j)?,
            ))
        }

        fn measure_pair(&self, inputs: &PairInputs<'_>) -> Result<(Measurement, Measurement)> {
            let meas = |id: &str, dt: f64| {
                let mut m = Measurement::new();
                m.insert("window_id".to_string(), Value::from(id));
                m.insert("dt".to_string(), Value::from(dt));
                m
            };
            Ok((
                meas(&inputs.pair.window_id_i, inputs.pair.weight_i),
                meas(&inputs.pair.window_id_j, -inputs.pair.weight_j),
            ))
        }
    }

    /// Two Z windows per channel on XX.AAA and XX.BBB, paired window by
    /// window: both pairs join the same two stations.
    pub fn two_window_run_data() -> (PairList, WindowList) {
        use crate::core::model::{StationWindows, WindowDescriptor, component_based_windows};

        let mut sw = StationWindows::new();
        for sta in ["XX.AAA", "XX.BBB"] {
            sw.entry(sta.to_string()).or_default().insert(
                format!("{sta}.00.BHZ"),
                vec![WindowDescriptor::default(), WindowDescriptor::default()],
            );
        }
        let windows = component_based_windows(&sw).unwrap_or_default();

        let mut pairs = PairList::new();
        pairs.insert(
            "Z".to_string(),
            vec![
                Pair::new("XX.AAA.00.BHZ:0", "XX.BBB.00.BHZ:0", 1.0, 1.0),
                Pair::new("XX.AAA.00.BHZ:1", "XX.BBB.00.BHZ:1", 2.0, 0.5),
            ],
        );
        (pairs, windows)
    }

    /// Three Z pairs over four stations, one T pair.
    pub fn sample_run_data() -> (PairList, WindowList) {
        use crate::core::model::{StationWindows, WindowDescriptor, component_based_windows};

        let mut sw = StationWindows::new();
        for sta in ["II.AAK", "II.BORG", "IU.ANMO", "IU.COR"] {
            let channels = sw.entry(sta.to_string()).or_default();
            for comp in ["Z", "T"] {
                channels.insert(format!("{sta}.00.BH{comp}"), vec![WindowDescriptor::default()]);
            }
        }
        let windows = component_based_windows(&sw).unwrap_or_default();

        let mut pairs = PairList::new();
        pairs.insert(
            "Z".to_string(),
            vec![
                Pair::new("II.AAK.00.BHZ:0", "II.BORG.00.BHZ:0", 1.0, 1.0),
                Pair::new("II.AAK.00.BHZ:0", "IU.ANMO.00.BHZ:0", 2.0, 0.5),
                Pair::new("IU.ANMO.00.BHZ:0", "IU.COR.00.BHZ:0", 1.0, 3.0),
            ],
        );
        pairs.insert(
            "T".to_string(),
            vec![Pair::new("II.AAK.00.BHT:0", "IU.COR.00.BHT:0", 1.0, 1.0)],
        );
        (pairs, windows)
    }
}
