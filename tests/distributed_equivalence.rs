// Multi-participant rounds over ChannelTransport must produce exactly what the
// rayon pool and a single participant produce.

mod common;

use common::{FakeArchive, OBSD_TAG, RampCalculator, SYNT_TAG, chain_pairs, pair_list, windows};

use ferrous_dd::Result;
use ferrous_dd::core::adjoint::AdjointSource;
use ferrous_dd::core::model::WindowPair;
use ferrous_dd::distributed::{ChannelTransport, PartialResult, Pooled, Spmd, SoloTransport, run_spmd};
use ferrous_dd::error::DdError;
use ferrous_dd::params::{AdjointConfig, ParamFile};
use ferrous_dd::pipelines::orchestrator::adjoint::{AdjointRun, calc_adj_sources};
use ferrous_dd::pipelines::orchestrator::measure::calc_measures;
use ferrous_dd::pipelines::orchestrator::{Measurement, PairCalculator, PairInputs, RunInputs};

type AdjointPartial = PartialResult<WindowPair, (AdjointSource, AdjointSource)>;
type MeasurePartial = PartialResult<WindowPair, (Measurement, Measurement)>;

const STATIONS: [&str; 7] = ["AA.S00", "AA.S01", "AA.S02", "AA.S03", "BB.S04", "BB.S05", "BB.S06"];

fn params() -> ParamFile {
    ParamFile {
        adjoint_config: Some(AdjointConfig {
            adj_src_type: Some("multitaper_misfit_DD".to_string()),
            ..AdjointConfig::default()
        }),
        ..ParamFile::default()
    }
}

fn sorted_sources(run: &AdjointRun) -> Vec<(String, Vec<AdjointSource>)> {
    run.sources
        .iter()
        .map(|(station, sources)| (station.clone(), sources.clone()))
        .collect()
}

#[test]
fn test_spmd_matches_pooled_and_solo() {
    let pairs = pair_list(vec![
        ("Z", chain_pairs(&STATIONS, "Z")),
        ("R", chain_pairs(&STATIONS[..4], "R")),
    ]);
    let windows = windows(&STATIONS, &["Z", "R"]);
    let archive = FakeArchive::new(&STATIONS, 8);
    let run = RunInputs {
        pairs: &pairs,
        windows: &windows,
        obsd: &archive,
        obsd_tag: OBSD_TAG,
        synt: &archive,
        synt_tag: SYNT_TAG,
    };
    let params = params();

    let solo = calc_adj_sources(&Spmd(SoloTransport), &params, &run, &RampCalculator)
        .unwrap()
        .unwrap();
    let pooled = calc_adj_sources(&Pooled::new(3).unwrap(), &params, &run, &RampCalculator)
        .unwrap()
        .unwrap();
    assert_eq!(sorted_sources(&solo), sorted_sources(&pooled));

    for size in [2, 4, 9] {
        let results = run_spmd(size, |t: ChannelTransport<usize, AdjointPartial>| {
            calc_adj_sources(&Spmd(t), &params, &run, &RampCalculator)
        })
        .unwrap();

        let mut results = results.into_iter();
        let coordinator = results.next().unwrap().unwrap().unwrap();
        assert_eq!(sorted_sources(&coordinator), sorted_sources(&solo), "size {size}");
        assert!(results.all(|r| matches!(r, Ok(None))));
    }
}

#[test]
fn test_spmd_station_value_is_sum_of_halves() {
    // S01 is j of pair 0 (weight 0.5) and i of pair 1 (weight 2.0)
    let pairs = pair_list(vec![("Z", chain_pairs(&STATIONS[..3], "Z"))]);
    let windows = windows(&STATIONS[..3], &["Z"]);
    let archive = FakeArchive::new(&STATIONS[..3], 3);
    let run = RunInputs {
        pairs: &pairs,
        windows: &windows,
        obsd: &archive,
        obsd_tag: OBSD_TAG,
        synt: &archive,
        synt_tag: SYNT_TAG,
    };
    let params = params();

    let results = run_spmd(2, |t: ChannelTransport<usize, AdjointPartial>| {
        calc_adj_sources(&Spmd(t), &params, &run, &RampCalculator)
    })
    .unwrap();
    let out = results.into_iter().next().unwrap().unwrap().unwrap();

    let s01 = &out.sources["AA.S01"][0];
    assert_eq!(s01.adjoint_source, vec![1.5, 3.0, 4.5]);
    assert_eq!(s01.misfit, 2.5);
}

/// Raises for one specific pair, like the adjoint library would on bad data.
struct FailOn(&'static str);

impl PairCalculator for FailOn {
    fn adjoint_pair(&self, inputs: &PairInputs<'_>) -> Result<(AdjointSource, AdjointSource)> {
        if inputs.pair.window_id_i == self.0 {
            return Err(DdError::job(0, "taper window too short"));
        }
        RampCalculator.adjoint_pair(inputs)
    }

    fn measure_pair(&self, inputs: &PairInputs<'_>) -> Result<(Measurement, Measurement)> {
        RampCalculator.measure_pair(inputs)
    }
}

#[test]
fn test_spmd_failure_aborts_coordinator() {
    let pairs = pair_list(vec![("Z", chain_pairs(&STATIONS, "Z"))]);
    let windows = windows(&STATIONS, &["Z"]);
    let archive = FakeArchive::new(&STATIONS, 4);
    let run = RunInputs {
        pairs: &pairs,
        windows: &windows,
        obsd: &archive,
        obsd_tag: OBSD_TAG,
        synt: &archive,
        synt_tag: SYNT_TAG,
    };
    let params = params();
    // Pair 4 lands in the last worker's slice for three participants
    let calculator = FailOn("BB.S04.00.BHZ:0");

    let pooled = calc_adj_sources(&Pooled::new(2).unwrap(), &params, &run, &calculator);
    assert!(matches!(pooled, Err(DdError::Job { index: 4, .. })));

    let results = run_spmd(3, |t: ChannelTransport<usize, AdjointPartial>| {
        calc_adj_sources(&Spmd(t), &params, &run, &calculator)
    })
    .unwrap();
    assert!(matches!(results[0], Err(DdError::Job { index: 4, .. })));
    assert!(matches!(results[1], Ok(None)));
    // The worker that raised reports the failure to its own caller too
    assert!(matches!(results[2], Err(DdError::Job { index: 4, .. })));
}

#[test]
fn test_measures_spmd_matches_pooled() {
    let pairs = pair_list(vec![("T", chain_pairs(&STATIONS, "T"))]);
    let windows = windows(&STATIONS, &["T"]);
    let archive = FakeArchive::new(&STATIONS, 2);
    let run = RunInputs {
        pairs: &pairs,
        windows: &windows,
        obsd: &archive,
        obsd_tag: OBSD_TAG,
        synt: &archive,
        synt_tag: SYNT_TAG,
    };
    let params = params();

    let pooled = calc_measures(&Pooled::default(), &params, &run, &RampCalculator)
        .unwrap()
        .unwrap();
    let results = run_spmd(4, |t: ChannelTransport<usize, MeasurePartial>| {
        calc_measures(&Spmd(t), &params, &run, &RampCalculator)
    })
    .unwrap();
    let spmd = results.into_iter().next().unwrap().unwrap().unwrap();

    assert_eq!(spmd.measures, pooled.measures);
    // Inner stations are measured twice, the ends once
    assert_eq!(pooled.measures["T"]["AA.S01"].len(), 2);
    assert_eq!(pooled.measures["T"]["BB.S06"].len(), 1);
}
