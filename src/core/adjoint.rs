//! Adjoint source and trace value types.
//!
//! The numeric content is produced by an external adjoint library; this crate
//! only needs the additive and scaling algebra plus enough metadata to file
//! the result back into an archive.

use serde::{Deserialize, Serialize};

use super::superpose::{Scale, Superpose};

/// One adjoint source time series for a station-component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjointSource {
    pub adj_src_type: String,
    pub network: String,
    pub station: String,
    pub location: String,
    /// Channel code, e.g. `BHZ` or `MXZ`
    pub component: String,
    pub dt: f64,
    pub min_period: f64,
    pub max_period: f64,
    pub misfit: f64,
    /// ISO-8601 start time, passed through untouched
    pub starttime: String,
    pub adjoint_source: Vec<f64>,
}

impl AdjointSource {
    /// `NET.STA`
    pub fn station_id(&self) -> String {
        format!("{}.{}", self.network, self.station)
    }

    /// Archive path `NET_STA_MX?`; `BH` channels are renamed to `MX`.
    pub fn archive_path(&self) -> String {
        format!(
            "{}_{}_{}",
            self.network,
            self.station,
            output_component(&self.component)
        )
    }
}

/// Component code as written to the archive (`BHZ` -> `MXZ`).
pub fn output_component(component: &str) -> String {
    component.replace("BH", "MX")
}

impl Superpose for AdjointSource {
    /// Sample-wise sum with misfits added; metadata comes from `self`.
    fn superpose(mut self, other: Self) -> Self {
        self.misfit += other.misfit;
        self.adjoint_source = self.adjoint_source.superpose(other.adjoint_source);
        self
    }
}

impl Scale for AdjointSource {
    fn scale(mut self, factor: f64) -> Self {
        self.misfit *= factor;
        self.adjoint_source = self.adjoint_source.scale(factor);
        self
    }
}

/// Receiver coordinates attached to archive entries.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StationLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
    pub local_depth: f64,
}

/// A waveform trace as handed to the adjoint library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    /// `NET.STA.LOC.CHA`
    pub id: String,
    pub starttime: String,
    pub dt: f64,
    pub data: Vec<f64>,
}
