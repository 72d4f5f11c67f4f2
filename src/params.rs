// src/params.rs
//
// Run configuration: the JSON path manifest (-f) and the YAML parameter
// file (-p). Adjoint and processing options are kept opaque and handed to the
// external adjoint library untouched.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::core::io::{load_json, load_yaml};
use crate::error::{ConfigError, Result};
use crate::pipelines::normalization::MergeWeights;

/// Supported double-difference adjoint source types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjointSourceType {
    MultitaperMisfitDd,
    CcTraveltimeMisfitDd,
}

impl AdjointSourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjointSourceType::MultitaperMisfitDd => "multitaper_misfit_DD",
            AdjointSourceType::CcTraveltimeMisfitDd => "cc_traveltime_misfit_DD",
        }
    }
}

impl fmt::Display for AdjointSourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdjointSourceType {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if !s.ends_with("_DD") {
            return Err(ConfigError::NotDoubleDifference(s.to_string()));
        }
        match s {
            "multitaper_misfit_DD" => Ok(AdjointSourceType::MultitaperMisfitDd),
            "cc_traveltime_misfit_DD" => Ok(AdjointSourceType::CcTraveltimeMisfitDd),
            _ => Err(ConfigError::Unsupported(s.to_string())),
        }
    }
}

/// `adjoint_config` section: the type selector plus opaque library options.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdjointConfig {
    #[serde(default)]
    pub adj_src_type: Option<String>,
    #[serde(flatten)]
    pub options: BTreeMap<String, serde_yaml::Value>,
}

/// YAML parameter file (-p)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParamFile {
    #[serde(default)]
    pub adjoint_config: Option<AdjointConfig>,
    #[serde(default)]
    pub process_config: BTreeMap<String, serde_yaml::Value>,
    #[serde(default)]
    pub single_weight: Option<f64>,
    #[serde(default)]
    pub dd_weight: Option<f64>,
}

impl ParamFile {
    pub fn load(path: &Path) -> Result<Self> {
        load_yaml(path)
    }

    /// Resolve and validate the adjoint source type.
    pub fn adjoint_source_type(&self) -> Result<AdjointSourceType> {
        let config = require(&self.adjoint_config, "adjoint_config")?;
        let name = require(&config.adj_src_type, "adjoint_config.adj_src_type")?;
        Ok(name.parse::<AdjointSourceType>()?)
    }
}

/// JSON path manifest (-f). Each command needs a different subset of keys.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathFile {
    #[serde(default)]
    pub pair_file: Option<PathBuf>,
    #[serde(default)]
    pub window_file: Option<PathBuf>,
    #[serde(default)]
    pub single_window_file: Option<PathBuf>,
    #[serde(default)]
    pub obsd_asdf: Option<PathBuf>,
    #[serde(default)]
    pub synt_asdf: Option<PathBuf>,
    #[serde(default)]
    pub obsd_tag: Option<String>,
    #[serde(default)]
    pub synt_tag: Option<String>,
    #[serde(default)]
    pub single_adj: Option<PathBuf>,
    #[serde(default)]
    pub dd_adj: Option<PathBuf>,
    #[serde(default)]
    pub output_file: Option<PathBuf>,
    #[serde(default)]
    pub single_weight: Option<f64>,
    #[serde(default)]
    pub dd_weight: Option<f64>,
}

impl PathFile {
    pub fn load(path: &Path) -> Result<Self> {
        load_json(path)
    }
}

/// Borrow a required option or fail with `ConfigError::MissingKey`.
pub fn require<'a, T>(value: &'a Option<T>, key: &'static str) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| ConfigError::MissingKey(key).into())
}

/// Merge weights: parameter file first, then path manifest, then defaults.
pub fn merge_weights(params: Option<&ParamFile>, paths: &PathFile) -> MergeWeights {
    let defaults = MergeWeights::default();
    MergeWeights {
        single_weight: params
            .and_then(|p| p.single_weight)
            .or(paths.single_weight)
            .unwrap_or(defaults.single_weight),
        dd_weight: params
            .and_then(|p| p.dd_weight)
            .or(paths.dd_weight)
            .unwrap_or(defaults.dd_weight),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DdError;

    #[test]
    fn test_adjoint_source_type_parsing() {
        assert_eq!(
            "cc_traveltime_misfit_DD".parse::<AdjointSourceType>().unwrap(),
            AdjointSourceType::CcTraveltimeMisfitDd
        );
        assert_eq!(
            "multitaper_misfit_DD".parse::<AdjointSourceType>().unwrap(),
            AdjointSourceType::MultitaperMisfitDd
        );
        assert!(matches!(
            "cc_traveltime_misfit".parse::<AdjointSourceType>(),
            Err(ConfigError::NotDoubleDifference(_))
        ));
        assert!(matches!(
            "waveform_misfit_DD".parse::<AdjointSourceType>(),
            Err(ConfigError::Unsupported(_))
        ));
    }

    #[test]
    fn test_param_file_yaml() {
        let yaml = r#"
single_weight: 0.5
adjoint_config:
  adj_src_type: multitaper_misfit_DD
  min_period: 27.0
  max_period: 60.0
  taper_percentage: 0.3
process_config:
  interp_delta: 0.1425
"#;
        let params: ParamFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(params.adjoint_source_type().unwrap(), AdjointSourceType::MultitaperMisfitDd);
        let options = &params.adjoint_config.as_ref().unwrap().options;
        assert_eq!(options.len(), 3);
        assert!(options.contains_key("taper_percentage"));
        assert_eq!(params.process_config.len(), 1);
    }

    #[test]
    fn test_missing_adjoint_config_is_config_error() {
        let params = ParamFile::default();
        let err = params.adjoint_source_type().unwrap_err();
        assert!(matches!(err, DdError::Config(ConfigError::MissingKey("adjoint_config"))));
    }

    #[test]
    fn test_merge_weights_precedence() {
        let paths: PathFile =
            serde_json::from_str(r#"{"single_weight": 2.0, "dd_weight": 3.0}"#).unwrap();
        let params = ParamFile {
            dd_weight: Some(5.0),
            ..ParamFile::default()
        };

        let w = merge_weights(Some(&params), &paths);
        assert_eq!(w.single_weight, 2.0);
        assert_eq!(w.dd_weight, 5.0);

        let w = merge_weights(None, &PathFile::default());
        assert_eq!(w, MergeWeights::default());
    }
}
