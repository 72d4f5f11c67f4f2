//! Error types for the double-difference workflow.
//!
//! Variants follow the failure classes of a run:
//! - configuration problems, raised before any distributed work starts
//! - data-integrity problems in pair/window inputs
//! - failures inside a distributed round (always fatal for the run)
//! - I/O and (de)serialization wrappers

use std::path::PathBuf;

use thiserror::Error;

/// Configuration failures. Always fatal, always raised up front.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("adjoint source type is not double difference: {0}")]
    NotDoubleDifference(String),

    #[error("unsupported double-difference adjoint source type: {0}")]
    Unsupported(String),

    #[error("missing required parameter '{0}'")]
    MissingKey(&'static str),

    #[error("invalid worker count {0}, must be at least 1")]
    InvalidWorkerCount(usize),
}

#[derive(Debug, Error)]
pub enum DdError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("component {component}: pair ({window_id_i}, {window_id_j}) references unknown window {missing}")]
    DanglingWindow {
        component: String,
        window_id_i: String,
        window_id_j: String,
        missing: String,
    },

    #[error("malformed window id '{0}', expected NET.STA.LOC.CHA:INDEX")]
    InvalidWindowId(String),

    #[error("archive entry {path}: {reason}")]
    InvalidArchiveEntry { path: String, reason: String },

    #[error("duplicate result key {0} in distributed round")]
    DuplicateKey(String),

    #[error("no normalization factor for component {0}")]
    MissingNormalization(String),

    #[error("job {index} failed: {message}")]
    Job { index: usize, message: String },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("YAML error in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl DdError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DdError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        DdError::Json {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn yaml(path: impl Into<PathBuf>, source: serde_yaml::Error) -> Self {
        DdError::Yaml {
            path: path.into(),
            source,
        }
    }

    /// Wrap an arbitrary job failure with the index of the job that raised it.
    pub fn job(index: usize, err: impl std::fmt::Display) -> Self {
        DdError::Job {
            index,
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DdError>;
