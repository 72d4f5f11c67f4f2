//! Pair and window model.
//!
//! Upstream files key windows by station and channel; everything downstream
//! works on component-indexed lists. A window id is `<channel_id>:<index>`,
//! where `channel_id` is `NET.STA.LOC.CHA` and `index` is the position of the
//! window within that channel's list.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::defaults::WINDOW_WEIGHT;
use crate::error::{DdError, Result};

/// Component tag (last character of the channel code: Z, R, T, N, E, ...).
pub type Component = String;

/// Component -> ordered pairs. Order only matters for reproducible partitioning.
pub type PairList = BTreeMap<Component, Vec<Pair>>;

/// Component -> ordered windows.
pub type WindowList = BTreeMap<Component, Vec<Window>>;

/// Station -> channel id -> window descriptors, as written by the window picker.
pub type StationWindows = BTreeMap<String, BTreeMap<String, Vec<WindowDescriptor>>>;

/// Component -> list of `(window_id_i, window_id_j)` to drop.
pub type RejectionList = BTreeMap<Component, Vec<(String, String)>>;

/// `(window_id_i, window_id_j)`. Identifies one pair within a component.
pub type WindowPair = (String, String);

/// A pair of windows on two different stations. The unit of distributed work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pair {
    pub window_id_i: String,
    pub window_id_j: String,
    pub weight_i: f64,
    pub weight_j: f64,
    /// Fields written by the pairing step that this crate does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Pair {
    pub fn new(
        window_id_i: impl Into<String>,
        window_id_j: impl Into<String>,
        weight_i: f64,
        weight_j: f64,
    ) -> Self {
        Self {
            window_id_i: window_id_i.into(),
            window_id_j: window_id_j.into(),
            weight_i,
            weight_j,
            extra: Map::new(),
        }
    }

    /// Station names (`NET.STA`) of both sides.
    pub fn stations(&self) -> Result<(String, String)> {
        Ok((
            station_of_window_id(&self.window_id_i)?.to_string(),
            station_of_window_id(&self.window_id_j)?.to_string(),
        ))
    }

    /// Exact, ordered id match. `(a, b)` does not match `(b, a)`.
    pub fn window_ids(&self) -> WindowPair {
        (self.window_id_i.clone(), self.window_id_j.clone())
    }

    pub fn matches(&self, window_id_i: &str, window_id_j: &str) -> bool {
        self.window_id_i == window_id_i && self.window_id_j == window_id_j
    }
}

/// Window descriptor as stored in the station-keyed window file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WindowDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_weight: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A measurement window for one station-component.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub window_id: String,
    pub station: String,
    pub channel_id: String,
    pub component: Component,
    pub weight: f64,
    pub descriptor: WindowDescriptor,
}

/// Channel id part of a window id (everything before the last `:`).
pub fn channel_of_window_id(window_id: &str) -> Result<&str> {
    match window_id.rsplit_once(':') {
        Some((channel, _)) if !channel.is_empty() => Ok(channel),
        _ => Err(DdError::InvalidWindowId(window_id.to_string())),
    }
}

/// `NET.STA` of a channel id `NET.STA.LOC.CHA`.
pub fn station_of_channel(channel_id: &str) -> Option<&str> {
    let mut dots = channel_id.match_indices('.').map(|(i, _)| i);
    let first = dots.next()?;
    match dots.next() {
        Some(second) if second > first + 1 && first > 0 => Some(&channel_id[..second]),
        None if first > 0 && first + 1 < channel_id.len() => Some(channel_id),
        _ => None,
    }
}

/// `NET.STA` of a window id.
pub fn station_of_window_id(window_id: &str) -> Result<&str> {
    let channel = channel_of_window_id(window_id)?;
    station_of_channel(channel).ok_or_else(|| DdError::InvalidWindowId(window_id.to_string()))
}

/// Component tag of a channel id (its last character).
pub fn component_of_channel(channel_id: &str) -> Option<Component> {
    channel_id.chars().last().map(|c| c.to_string())
}

/// Convert station-keyed windows into component-indexed windows with ids.
pub fn component_based_windows(station_windows: &StationWindows) -> Result<WindowList> {
    let mut windows = WindowList::new();
    for (station, channels) in station_windows {
        for (channel_id, descriptors) in channels {
            let component = component_of_channel(channel_id)
                .ok_or_else(|| DdError::InvalidWindowId(channel_id.clone()))?;
            let entry = windows.entry(component.clone()).or_default();
            for (index, descriptor) in descriptors.iter().enumerate() {
                entry.push(Window {
                    window_id: format!("{channel_id}:{index}"),
                    station: station.clone(),
                    channel_id: channel_id.clone(),
                    component: component.clone(),
                    weight: descriptor.window_weight.unwrap_or(WINDOW_WEIGHT),
                    descriptor: descriptor.clone(),
                });
            }
        }
    }
    Ok(windows)
}

/// Inverse of [`component_based_windows`].
pub fn station_based_windows(windows: &WindowList) -> StationWindows {
    let mut out = StationWindows::new();
    for window in windows.values().flatten() {
        out.entry(window.station.clone())
            .or_default()
            .entry(window.channel_id.clone())
            .or_default()
            .push(window.descriptor.clone());
    }
    out
}

/// Every distinct station touched by a pair slice.
pub fn stations_of_pairs(pairs: &[Pair]) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut stations = Vec::new();
    for pair in pairs {
        let (sta_i, sta_j) = pair.stations()?;
        for sta in [sta_i, sta_j] {
            if seen.insert(sta.clone()) {
                stations.push(sta);
            }
        }
    }
    stations.sort();
    Ok(stations)
}

/// Check that every pair only references windows known for its component.
pub fn validate_pair_references(pairs: &PairList, windows: &WindowList) -> Result<()> {
    for (component, comp_pairs) in pairs {
        let universe: HashSet<&str> = windows
            .get(component)
            .map(|ws| ws.iter().map(|w| w.window_id.as_str()).collect())
            .unwrap_or_default();

        for pair in comp_pairs {
            for id in [&pair.window_id_i, &pair.window_id_j] {
                if !universe.contains(id.as_str()) {
                    return Err(DdError::DanglingWindow {
                        component: component.clone(),
                        window_id_i: pair.window_id_i.clone(),
                        window_id_j: pair.window_id_j.clone(),
                        missing: id.clone(),
                    });
                }
            }
        }
    }
    Ok(())
}
