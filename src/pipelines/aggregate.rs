//! Pair aggregation: fold per-pair results into one value per station.
//!
//! A pair result carries one half-contribution for each of its two stations.
//! Every station's value is the `⊕` of the halves from all pairs touching it,
//! so the result does not depend on the order pairs are visited in.

use std::collections::BTreeMap;

use crate::core::superpose::{Accumulator, Superpose};

/// `(station_i, station_j)`
pub type StationPair = (String, String);

/// Merged output of a distributed round.
pub type PairResults<C> = BTreeMap<StationPair, (C, C)>;

fn accumulate<C, I>(results: I, accs: &mut BTreeMap<String, Accumulator<C>>)
where
    C: Superpose,
    I: IntoIterator<Item = (StationPair, (C, C))>,
{
    for ((sta_i, sta_j), (contrib_i, contrib_j)) in results {
        accs.entry(sta_i).or_default().push(contrib_i);
        accs.entry(sta_j).or_default().push(contrib_j);
    }
}

/// Stations touched by at least one pair, with their combined contribution.
pub fn aggregate_pairs<C, I>(results: I) -> BTreeMap<String, C>
where
    C: Superpose,
    I: IntoIterator<Item = (StationPair, (C, C))>,
{
    let mut accs = BTreeMap::new();
    accumulate(results, &mut accs);
    accs.into_iter()
        .filter_map(|(station, acc)| acc.into_inner().map(|c| (station, c)))
        .collect()
}

/// Like [`aggregate_pairs`], but every station of `roster` is present.
///
/// `None` means "no double-difference contribution", which is different from
/// a contribution that happens to be zero. Stations outside the roster that
/// appear in `results` are kept as well.
pub fn aggregate_with_roster<C, I>(results: I, roster: &[String]) -> BTreeMap<String, Option<C>>
where
    C: Superpose,
    I: IntoIterator<Item = (StationPair, (C, C))>,
{
    let mut accs: BTreeMap<String, Accumulator<C>> = roster
        .iter()
        .map(|station| (station.clone(), Accumulator::empty()))
        .collect();
    accumulate(results, &mut accs);
    accs.into_iter()
        .map(|(station, acc)| (station, acc.into_inner()))
        .collect()
}
