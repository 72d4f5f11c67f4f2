// Shared fixtures for integration tests: an in-memory waveform archive and a
// deterministic stand-in for the adjoint library.
#![allow(dead_code)]

use std::collections::BTreeMap;

use serde_json::Value;

use ferrous_dd::Result;
use ferrous_dd::core::adjoint::{AdjointSource, StationLocation, Trace};
use ferrous_dd::core::model::{
    Pair, PairList, StationWindows, WindowDescriptor, WindowList, component_based_windows,
    station_of_window_id,
};
use ferrous_dd::error::DdError;
use ferrous_dd::pipelines::orchestrator::{Measurement, PairCalculator, PairInputs, WaveformSource};

pub const OBSD_TAG: &str = "proc_obsd_27_60";
pub const SYNT_TAG: &str = "proc_synt_27_60";

/// Every listed station has both tags on every component.
pub struct FakeArchive {
    pub stations: Vec<String>,
    pub n_samples: usize,
}

impl FakeArchive {
    pub fn new(stations: &[&str], n_samples: usize) -> Self {
        Self {
            stations: stations.iter().map(|s| s.to_string()).collect(),
            n_samples,
        }
    }
}

impl WaveformSource for FakeArchive {
    fn trace(&self, station: &str, tag: &str, component: &str) -> Result<Option<Trace>> {
        if !self.stations.iter().any(|s| s == station) || (tag != OBSD_TAG && tag != SYNT_TAG) {
            return Ok(None);
        }
        Ok(Some(Trace {
            id: format!("{station}.00.BH{component}"),
            starttime: "2010-03-04T22:17:47.000000Z".to_string(),
            dt: 0.5,
            data: vec![0.0; self.n_samples],
        }))
    }

    fn location(&self, station: &str) -> Result<Option<StationLocation>> {
        let index = self.stations.iter().position(|s| s == station);
        Ok(index.map(|i| StationLocation {
            latitude: i as f64,
            longitude: -(i as f64),
            elevation: 100.0,
            local_depth: 0.0,
        }))
    }

    fn events(&self) -> Result<Vec<Value>> {
        Ok(vec![serde_json::json!({"id": "C201003042218A"})])
    }
}

/// Station i gets `weight_i * (k + 1)` at sample k, station j the negated
/// `weight_j` ramp.
pub struct RampCalculator;

fn ramp(inputs: &PairInputs<'_>, window_id: &str, scale: f64) -> Result<AdjointSource> {
    let station = station_of_window_id(window_id)?;
    let trace = inputs
        .obsd
        .get(station)
        .ok_or_else(|| DdError::job(0, format!("no observed trace for {station}")))?;
    let (network, sta) = station.split_once('.').unwrap_or((station, ""));
    Ok(AdjointSource {
        adj_src_type: inputs.adj_src_type.to_string(),
        network: network.to_string(),
        station: sta.to_string(),
        location: "00".to_string(),
        component: format!("BH{}", inputs.component),
        dt: trace.dt,
        min_period: 27.0,
        max_period: 60.0,
        misfit: scale.abs(),
        starttime: trace.starttime.clone(),
        adjoint_source: (0..trace.data.len()).map(|k| scale * (k + 1) as f64).collect(),
    })
}

impl PairCalculator for RampCalculator {
    fn adjoint_pair(&self, inputs: &PairInputs<'_>) -> Result<(AdjointSource, AdjointSource)> {
        Ok((
            ramp(inputs, &inputs.pair.window_id_i, inputs.pair.weight_i)?,
            ramp(inputs, &inputs.pair.window_id_j, -inputs.pair.weight_j)?,
        ))
    }

    fn measure_pair(&self, inputs: &PairInputs<'_>) -> Result<(Measurement, Measurement)> {
        let side = |id: &str| {
            let mut m = Measurement::new();
            m.insert("window_id".to_string(), Value::from(id));
            m
        };
        Ok((side(&inputs.pair.window_id_i), side(&inputs.pair.window_id_j)))
    }
}

/// Station-keyed windows: one window per station and component.
pub fn station_windows(stations: &[&str], components: &[&str]) -> StationWindows {
    let mut sw = StationWindows::new();
    for sta in stations {
        let channels = sw.entry(sta.to_string()).or_default();
        for comp in components {
            channels.insert(format!("{sta}.00.BH{comp}"), vec![WindowDescriptor::default()]);
        }
    }
    sw
}

pub fn windows(stations: &[&str], components: &[&str]) -> WindowList {
    component_based_windows(&station_windows(stations, components)).unwrap()
}

/// Chain of pairs `s0-s1, s1-s2, ...` on `component`, with weights varying by
/// position.
pub fn chain_pairs(stations: &[&str], component: &str) -> Vec<Pair> {
    stations
        .windows(2)
        .enumerate()
        .map(|(k, w)| {
            Pair::new(
                format!("{}.00.BH{component}:0", w[0]),
                format!("{}.00.BH{component}:0", w[1]),
                1.0 + k as f64,
                0.5,
            )
        })
        .collect()
}

pub fn pair_list(entries: Vec<(&str, Vec<Pair>)>) -> PairList {
    entries
        .into_iter()
        .map(|(c, p)| (c.to_string(), p))
        .collect::<BTreeMap<_, _>>()
}
