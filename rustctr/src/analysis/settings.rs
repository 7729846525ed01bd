use ctrcore::fitting::error::{BootstrapOptions, ErrorMethod};
use serde::{Deserialize, Serialize};

use crate::analysis::coincidence::CoincidencePolicy;
use crate::error::ConfigError;

/// Which locator a channel's energy spectrum goes through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocatorMode {
    /// Lookahead peak detection with per-candidate fits (the default);
    /// resolves spectra with escape or secondary peaks.
    MultiPeak,
    /// One fit inside a fixed window; for clean single-photopeak spectra.
    SinglePeak,
}

/// Multi-peak locator configuration.
#[derive(Clone, Copy, Debug)]
pub struct MultiPeakSettings {
    /// Events outside this amplitude range are ignored.
    pub bin_range: (f64, f64),
    /// Bin count is `floor(ptp(bin_range) * 2^factor)`.
    pub factor: u32,
    /// Lookahead window of the peak detection, in bins.
    pub lookahead: usize,
    /// Crop half-width around each candidate before its fit.
    pub step: f64,
    /// Acceptance window below the fitted location, in fitted sigmas.
    pub left_sigma: f64,
    /// Acceptance window above the fitted location.
    pub right_sigma: f64,
    /// Advisory floor on the sample count; below it the locator warns
    /// and proceeds.
    pub min_samples: usize,
}

impl MultiPeakSettings {
    pub fn over(bin_range: (f64, f64)) -> MultiPeakSettings {
        MultiPeakSettings {
            bin_range,
            factor: 8,
            lookahead: 10,
            step: 0.05,
            left_sigma: 2.0,
            right_sigma: 2.0,
            min_samples: 100,
        }
    }
}

/// Single-peak locator configuration.
#[derive(Clone, Copy, Debug)]
pub struct SinglePeakSettings {
    /// Histogram range of the energy spectrum.
    pub bin_range: (f64, f64),
    /// Histogram bin count.
    pub bins: usize,
    /// The peak is assumed to sit inside this window; bins outside are
    /// not fitted.
    pub fit_range: (f64, f64),
    pub left_sigma: f64,
    pub right_sigma: f64,
    /// Advisory, as in the multi-peak locator.
    pub min_samples: usize,
}

impl SinglePeakSettings {
    pub fn over(fit_range: (f64, f64)) -> SinglePeakSettings {
        SinglePeakSettings {
            bin_range: (0.1, 1.0),
            bins: 200,
            fit_range,
            left_sigma: 3.0,
            right_sigma: 5.0,
            min_samples: 100,
        }
    }
}

/// Full analysis configuration, replacing the historical keyword-argument
/// bags with named fields. Invalid keys fail at validation time via
/// [`error_method_from_key`] / [`policy_from_index`] instead of being
/// silently ignored.
#[derive(Clone, Debug)]
pub struct AnalysisSettings {
    /// Experiment keyword; drives crystal-length parsing and the output
    /// table name.
    pub working_on: String,
    /// Only process runs whose name contains this.
    pub keyword: String,
    /// Error strategy for the delay fit and the photopeak fits.
    pub error_method: ErrorMethod,
    /// How per-channel index sets combine.
    pub policy: CoincidencePolicy,
    pub locator: LocatorMode,
    /// Drop the 00000 warm-up runs.
    pub skip_first: bool,
    /// Preamble lines per sample file (4 raw scope exports, 0 combined).
    pub skip_rows: usize,
    /// Hard floor on the coincident sample count; below it the group fails.
    pub min_samples: usize,
    /// Delay histogram range in ps.
    pub time_range: (f64, f64),
    /// Delay histogram bin width in ps.
    pub dt: f64,
    /// Photopeak search range of the left (reference) detector.
    pub left_energy_range: (f64, f64),
    /// Photopeak search range of the right (under-test) detector.
    pub right_energy_range: (f64, f64),
    /// Single-peak mode fit windows.
    pub left_fit_range: (f64, f64),
    pub right_fit_range: (f64, f64),
    /// Single-peak mode histogram range.
    pub energy_bin_range: (f64, f64),
    pub bootstrap: BootstrapOptions,
    /// Base seed for every bootstrap draw; per-group RNGs derive from it,
    /// so a fixed seed reproduces the table exactly.
    pub seed: u64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        AnalysisSettings {
            working_on: "DOI".to_string(),
            keyword: String::new(),
            error_method: ErrorMethod::PercentileBootstrap,
            policy: CoincidencePolicy::IntersectAll,
            locator: LocatorMode::MultiPeak,
            skip_first: true,
            skip_rows: 4,
            min_samples: 100,
            time_range: (-1000.0, 1000.0),
            dt: 25.0,
            left_energy_range: (0.4, 0.8),
            right_energy_range: (0.2, 0.8),
            left_fit_range: (0.5, 0.7),
            right_fit_range: (0.4, 0.6),
            energy_bin_range: (0.1, 1.0),
            bootstrap: BootstrapOptions::default(),
            seed: 0,
        }
    }
}

/// Validate an error-strategy key.
pub fn error_method_from_key(key: &str) -> Result<ErrorMethod, ConfigError> {
    ErrorMethod::from_key(key).ok_or_else(|| ConfigError::UnknownErrorMethod(key.to_string()))
}

/// Validate a coincidence-policy index.
pub fn policy_from_index(index: u8) -> Result<CoincidencePolicy, ConfigError> {
    CoincidencePolicy::from_index(index).ok_or(ConfigError::UnknownPolicy(index))
}
