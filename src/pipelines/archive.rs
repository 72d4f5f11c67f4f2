//! Adjoint source archive.
//!
//! The container format belongs to an external seismic archive library; the
//! [`AdjointArchive`] trait is the seam. [`JsonArchive`] is a JSON-backed
//! implementation that mirrors the container's logical layout: one entry per
//! station-component under the `AdjointSources` namespace, each entry holding
//! the samples plus physical metadata, and a passthrough list of events.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::adjoint::{AdjointSource, StationLocation, output_component};
use crate::core::io::{dump_json, load_json, remove_existing};
use crate::defaults::{ADJOINT_SOURCES_NAMESPACE, OUTPUT_UNITS};
use crate::error::{DdError, Result};

pub trait AdjointArchive {
    /// Entry paths under the adjoint-source namespace. Empty if the namespace
    /// does not exist.
    fn list(&self) -> Vec<String>;

    fn get(&self, path: &str) -> Result<Option<(AdjointSource, StationLocation)>>;

    /// Store `source` under its archive path, replacing any previous entry.
    fn add(&mut self, source: &AdjointSource, location: &StationLocation) -> Result<String>;

    fn events(&self) -> &[Value];

    fn add_event(&mut self, event: Value);

    /// Persist pending changes.
    fn flush(&self) -> Result<()>;
}

/// Metadata written alongside every adjoint source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryParameters {
    pub adjoint_source_type: String,
    pub component: String,
    pub depth_in_m: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation_in_m: f64,
    pub dt: f64,
    pub location: String,
    pub max_period: f64,
    pub min_period: f64,
    pub misfit: f64,
    pub starttime: String,
    pub station_id: String,
    pub units: String,
}

impl EntryParameters {
    fn new(source: &AdjointSource, loc: &StationLocation) -> Self {
        Self {
            adjoint_source_type: source.adj_src_type.clone(),
            component: output_component(&source.component),
            depth_in_m: loc.local_depth,
            latitude: loc.latitude,
            longitude: loc.longitude,
            elevation_in_m: loc.elevation,
            dt: source.dt,
            location: source.location.clone(),
            max_period: source.max_period,
            min_period: source.min_period,
            misfit: source.misfit,
            starttime: source.starttime.clone(),
            station_id: source.station_id(),
            units: OUTPUT_UNITS.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub data: Vec<f64>,
    pub parameters: EntryParameters,
}

impl ArchiveEntry {
    fn to_adjoint(&self, path: &str) -> Result<(AdjointSource, StationLocation)> {
        let p = &self.parameters;
        let (network, station) = p
            .station_id
            .split_once('.')
            .ok_or_else(|| DdError::InvalidArchiveEntry {
                path: path.to_string(),
                reason: format!("station_id '{}' is not NET.STA", p.station_id),
            })?;
        let source = AdjointSource {
            adj_src_type: p.adjoint_source_type.clone(),
            network: network.to_string(),
            station: station.to_string(),
            location: p.location.clone(),
            component: p.component.clone(),
            dt: p.dt,
            min_period: p.min_period,
            max_period: p.max_period,
            misfit: p.misfit,
            starttime: p.starttime.clone(),
            adjoint_source: self.data.clone(),
        };
        let loc = StationLocation {
            latitude: p.latitude,
            longitude: p.longitude,
            elevation: p.elevation_in_m,
            local_depth: p.depth_in_m,
        };
        Ok((source, loc))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ArchiveDocument {
    #[serde(default)]
    events: Vec<Value>,
    #[serde(default)]
    auxiliary_data: BTreeMap<String, BTreeMap<String, ArchiveEntry>>,
}

/// JSON file archive. Changes are written by [`AdjointArchive::flush`].
#[derive(Debug)]
pub struct JsonArchive {
    path: PathBuf,
    doc: ArchiveDocument,
}

impl JsonArchive {
    /// Open an existing archive for reading.
    pub fn open(path: &Path) -> Result<Self> {
        let doc = load_json(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            doc,
        })
    }

    /// Start a fresh archive at `path`, deleting whatever was there.
    pub fn create(path: &Path) -> Result<Self> {
        remove_existing(path)?;
        let archive = Self {
            path: path.to_path_buf(),
            doc: ArchiveDocument::default(),
        };
        archive.flush()?;
        Ok(archive)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AdjointArchive for JsonArchive {
    fn list(&self) -> Vec<String> {
        self.doc
            .auxiliary_data
            .get(ADJOINT_SOURCES_NAMESPACE)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn get(&self, path: &str) -> Result<Option<(AdjointSource, StationLocation)>> {
        self.doc
            .auxiliary_data
            .get(ADJOINT_SOURCES_NAMESPACE)
            .and_then(|entries| entries.get(path))
            .map(|entry| entry.to_adjoint(path))
            .transpose()
    }

    fn add(&mut self, source: &AdjointSource, location: &StationLocation) -> Result<String> {
        let path = source.archive_path();
        let entry = ArchiveEntry {
            data: source.adjoint_source.clone(),
            parameters: EntryParameters::new(source, location),
        };
        log::debug!("Adding adjoint source {path} ({} samples)", entry.data.len());
        self.doc
            .auxiliary_data
            .entry(ADJOINT_SOURCES_NAMESPACE.to_string())
            .or_default()
            .insert(path.clone(), entry);
        Ok(path)
    }

    fn events(&self) -> &[Value] {
        &self.doc.events
    }

    fn add_event(&mut self, event: Value) {
        self.doc.events.push(event);
    }

    fn flush(&self) -> Result<()> {
        dump_json(&self.doc, &self.path)
    }
}
