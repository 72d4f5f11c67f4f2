//! `ferrous-dd` command line: pair/window filtering, normalization and merge.
//!
//! Computing double-difference adjoint sources or measurements needs an
//! external adjoint library and waveform archive, so those runs have no
//! subcommand here. Drive them from the library through
//! `ferrous_dd::pipelines::orchestrator::adjoint::calc_adj_sources` and
//! `ferrous_dd::pipelines::orchestrator::measure::calc_measures`, supplying a
//! `PairCalculator` and a `WaveformSource`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use ferrous_dd::core::io::load_json;
use ferrous_dd::core::model::{PairList, StationWindows, WindowList, component_based_windows};
use ferrous_dd::defaults;
use ferrous_dd::params::{ParamFile, PathFile, merge_weights, require};
use ferrous_dd::pipelines::archive::JsonArchive;
use ferrous_dd::pipelines::filter::{filter_pairs_file, filter_windows_file};
use ferrous_dd::pipelines::normalization::normalization_table;
use ferrous_dd::pipelines::orchestrator::merge::merge_adjoints;

#[derive(Parser)]
#[command(name = "ferrous-dd")]
#[command(about = "FerrousDD - double-difference adjoint source filtering, normalization and merge", long_about = None)]
#[command(version)]
struct Cli {
    /// Verbose level: 1=error, 2=warning, 3=message, 4+=debugging
    #[arg(short = 'v', long, value_name = "INT", default_value_t = defaults::VERBOSITY, global = true)]
    verbosity: i32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drop rejected pairs, writing PAIRS.filter.json
    FilterPairs {
        /// Pair file (component -> pairs)
        #[arg(value_name = "PAIRS.JSON")]
        pairs: PathBuf,

        /// Rejection file (component -> [[window_id_i, window_id_j], ...])
        #[arg(value_name = "REJECTIONS.JSON")]
        rejections: PathBuf,
    },

    /// Split windows into paired and single sets, writing WINDOWS.paired.json
    /// and WINDOWS.single.json
    FilterWindows {
        /// Station-keyed window file
        #[arg(value_name = "WINDOWS.JSON")]
        windows: PathBuf,

        /// Pair file (normally the filtered one)
        #[arg(value_name = "PAIRS.JSON")]
        pairs: PathBuf,
    },

    /// Print per-component normalization factors as JSON
    Normalize {
        /// Path file with pair_file and single_window_file
        #[arg(short = 'f', long = "path-file", value_name = "FILE")]
        path_file: PathBuf,

        /// YAML parameter file overriding single_weight / dd_weight
        #[arg(short = 'p', long = "param-file", value_name = "FILE")]
        param_file: Option<PathBuf>,
    },

    /// Merge single-station and double-difference adjoint sources
    Merge {
        /// Path file with pair_file, single_window_file, single_adj, dd_adj
        /// and output_file
        #[arg(short = 'f', long = "path-file", value_name = "FILE")]
        path_file: PathBuf,

        /// YAML parameter file overriding single_weight / dd_weight
        #[arg(short = 'p', long = "param-file", value_name = "FILE")]
        param_file: Option<PathBuf>,
    },
}

fn init_logger(verbosity: i32) {
    // 1=error, 2=warning, 3=message, 4=debug, 5+=trace
    let log_level = match verbosity {
        v if v <= 1 => log::LevelFilter::Error,
        2 => log::LevelFilter::Warn,
        3 => log::LevelFilter::Info,
        4 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn load_run_config(path_file: &Path, param_file: Option<&Path>) -> Result<(PathFile, Option<ParamFile>)> {
    let paths = PathFile::load(path_file)
        .with_context(|| format!("reading path file {}", path_file.display()))?;
    let params = param_file
        .map(|p| ParamFile::load(p).with_context(|| format!("reading parameter file {}", p.display())))
        .transpose()?;
    Ok((paths, params))
}

fn load_pairs_and_single_windows(paths: &PathFile) -> Result<(PairList, WindowList)> {
    let pairs: PairList = load_json(require(&paths.pair_file, "pair_file")?)?;
    let station_windows: StationWindows = load_json(require(&paths.single_window_file, "single_window_file")?)?;
    let single_windows = component_based_windows(&station_windows)?;
    Ok((pairs, single_windows))
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::FilterPairs { pairs, rejections } => {
            log::info!("Filtering {} with {}", pairs.display(), rejections.display());
            let (_, filtered) = filter_pairs_file(&pairs, &rejections)?;
            if !filtered.unmatched.is_empty() {
                log::warn!("{} rejections matched no pair", filtered.unmatched.len());
            }
        }

        Commands::FilterWindows { windows, pairs } => {
            log::info!("Splitting {} by {}", windows.display(), pairs.display());
            filter_windows_file(&windows, &pairs)?;
        }

        Commands::Normalize {
            path_file,
            param_file,
        } => {
            let (paths, params) = load_run_config(&path_file, param_file.as_deref())?;
            let weights = merge_weights(params.as_ref(), &paths);
            log::info!(
                "Weights: single_weight={} dd_weight={}",
                weights.single_weight,
                weights.dd_weight
            );
            let (pairs, single_windows) = load_pairs_and_single_windows(&paths)?;
            let table = normalization_table(&pairs, &single_windows, weights);
            println!("{}", serde_json::to_string_pretty(&table)?);
        }

        Commands::Merge {
            path_file,
            param_file,
        } => {
            let (paths, params) = load_run_config(&path_file, param_file.as_deref())?;
            let weights = merge_weights(params.as_ref(), &paths);
            let output_file = require(&paths.output_file, "output_file")?;
            let single_adj = require(&paths.single_adj, "single_adj")?;
            let dd_adj = require(&paths.dd_adj, "dd_adj")?;
            let (pairs, single_windows) = load_pairs_and_single_windows(&paths)?;

            let single = JsonArchive::open(single_adj)
                .with_context(|| format!("opening single-station archive {}", single_adj.display()))?;
            let dd = JsonArchive::open(dd_adj)
                .with_context(|| format!("opening double-difference archive {}", dd_adj.display()))?;
            let mut output = JsonArchive::create(output_file)?;

            let summary = merge_adjoints(&pairs, &single_windows, weights, &single, &dd, &mut output)?;
            log::info!(
                "Wrote {} adjoint sources to {}",
                summary.written(),
                output.path().display()
            );
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logger(cli.verbosity);

    if let Err(e) = run(cli.command) {
        log::error!("{e:#}");
        std::process::exit(1);
    }
}
