// src/defaults.rs

// Merge weights
pub const SINGLE_WEIGHT: f64 = 1.0;
pub const DD_WEIGHT: f64 = 1.0;

// Window descriptors without an explicit weight count as one measurement
pub const WINDOW_WEIGHT: f64 = 1.0;

// Archive layout
pub const ADJOINT_SOURCES_NAMESPACE: &str = "AdjointSources";
pub const OUTPUT_UNITS: &str = "m";

// Output file suffixes (replace ".json" in the input name)
pub const FILTERED_PAIRS_SUFFIX: &str = ".filter.json";
pub const PAIRED_WINDOWS_SUFFIX: &str = ".paired.json";
pub const SINGLE_WINDOWS_SUFFIX: &str = ".single.json";

// Other Constants
pub const VERBOSITY: i32 = 3;
