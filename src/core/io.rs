// JSON / YAML file helpers
//
// Every input of the workflow is a small JSON or YAML document; outputs are
// pretty-printed JSON with sorted keys (all output maps are BTreeMaps).

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{DdError, Result};

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| DdError::io(path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| DdError::json(path, e))
}

pub fn dump_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| DdError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|e| DdError::json(path, e))?;
    writer
        .write_all(b"\n")
        .and_then(|_| writer.flush())
        .map_err(|e| DdError::io(path, e))
}

pub fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| DdError::io(path, e))?;
    serde_yaml::from_reader(BufReader::new(file)).map_err(|e| DdError::yaml(path, e))
}

/// `pairs.json` + `.filter.json` -> `pairs.filter.json`.
///
/// Inputs without a `.json` extension get the suffix appended.
pub fn derived_path(input: &Path, suffix: &str) -> PathBuf {
    let name = input.to_string_lossy();
    match name.strip_suffix(".json") {
        Some(stem) => PathBuf::from(format!("{stem}{suffix}")),
        None => PathBuf::from(format!("{name}{suffix}")),
    }
}

/// Delete `path` if it exists. Outputs are recreated, never appended to.
pub fn remove_existing(path: &Path) -> Result<bool> {
    if path.is_file() {
        log::info!("Output file {} exists. Deleting...", path.display());
        std::fs::remove_file(path).map_err(|e| DdError::io(path, e))?;
        return Ok(true);
    }
    Ok(false)
}
