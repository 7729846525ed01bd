use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;

use itertools::Itertools;

use crate::fitting::gaussian::{fit_gaussian, FitOptions, GaussianFit, SINGLE_PEAK_ATTEMPTS};
use crate::statistics::bootstrap::{bca_interval, counter_seed, sample_mean, sample_std, Ecdf};
use crate::statistics::histogram::{value_counts, Histogram};

/// Error magnitude reported when a strategy cannot produce an estimate.
/// Large enough that any downstream weighting discards the point.
pub const ERROR_SENTINEL: f64 = 1e12;

/// Interchangeable error-estimation strategies for a fitted Gaussian.
///
/// The four differ in their statistical assumptions (symmetric normal
/// errors vs. resampling) and are selected by a single configuration key;
/// the legacy spellings are kept so existing run scripts keep working.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorMethod {
    /// Square root of the fit covariance diagonal.
    LeastSquares,
    /// Refit batches drawn from the fitted normal distribution.
    ParametricBootstrap,
    /// ECDF resampling with a full refit per run, summarized by a second fit.
    EmpiricalBootstrap,
    /// BCa confidence intervals of the clipped raw samples (the default).
    PercentileBootstrap,
}

impl ErrorMethod {
    /// Parse a configuration key. Unknown keys are a configuration error
    /// the caller must treat as fatal.
    pub fn from_key(key: &str) -> Option<ErrorMethod> {
        match key {
            "lsq" => Some(ErrorMethod::LeastSquares),
            "parametric" => Some(ErrorMethod::ParametricBootstrap),
            "empirical" => Some(ErrorMethod::EmpiricalBootstrap),
            "scikits" => Some(ErrorMethod::PercentileBootstrap),
            _ => None,
        }
    }

    /// The key this method is selected by, also used in output file names.
    pub fn key(&self) -> &'static str {
        match self {
            ErrorMethod::LeastSquares => "lsq",
            ErrorMethod::ParametricBootstrap => "parametric",
            ErrorMethod::EmpiricalBootstrap => "empirical",
            ErrorMethod::PercentileBootstrap => "scikits",
        }
    }
}

/// (location, scale, amplitude) standard errors. Strategies that do not
/// estimate the amplitude error report 0 for it.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ErrorTriple {
    pub location: f64,
    pub scale: f64,
    pub amplitude: f64,
}

impl ErrorTriple {
    pub fn sentinel() -> ErrorTriple {
        ErrorTriple {
            location: ERROR_SENTINEL,
            scale: ERROR_SENTINEL,
            amplitude: ERROR_SENTINEL,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.location == ERROR_SENTINEL
    }
}

/// Shared knobs of the resampling strategies.
#[derive(Clone, Copy, Debug)]
pub struct BootstrapOptions {
    /// Refit batches for the parametric and empirical strategies.
    pub runs: usize,
    /// Resamples per BCa interval.
    pub resamples: usize,
    /// Clip window below the fitted location, in units of the fitted scale.
    pub left_sigma: f64,
    /// Clip window above the fitted location.
    pub right_sigma: f64,
    /// Fewer clipped samples than this yields the sentinel triple.
    pub min_samples: usize,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        BootstrapOptions {
            runs: 500,
            resamples: 2000,
            left_sigma: 5.0,
            right_sigma: 5.0,
            min_samples: 100,
        }
    }
}

/// Dispatch on the configured strategy.
///
/// `samples` are the raw (unbinned) observations behind the fit; the
/// least-squares strategy ignores them and uses only the covariance.
pub fn estimate_errors<R: Rng>(
    method: ErrorMethod,
    samples: &[f64],
    fit: &GaussianFit,
    opts: &BootstrapOptions,
    rng: &mut R,
) -> ErrorTriple {
    match method {
        ErrorMethod::LeastSquares => least_squares_errors(fit),
        ErrorMethod::ParametricBootstrap => {
            parametric_bootstrap(fit.location, fit.scale, samples.len(), opts.runs, rng)
        }
        ErrorMethod::EmpiricalBootstrap => {
            empirical_bootstrap(samples, fit.scale, opts.runs, rng)
                .unwrap_or_else(ErrorTriple::sentinel)
        }
        ErrorMethod::PercentileBootstrap => {
            percentile_bootstrap(samples, fit.location, fit.scale, opts, rng)
        }
    }
}

/// Errors straight off the covariance diagonal; sentinel when the fit
/// carries no covariance.
pub fn least_squares_errors(fit: &GaussianFit) -> ErrorTriple {
    match fit.covariance {
        Some(cov) => ErrorTriple {
            location: cov[(0, 0)].abs().sqrt(),
            scale: cov[(1, 1)].abs().sqrt(),
            amplitude: cov[(2, 2)].abs().sqrt(),
        },
        None => ErrorTriple::sentinel(),
    }
}

/// Parametric bootstrap: `runs` batches of `n` draws from N(location, scale),
/// a closed-form MLE (mean, std) per batch, and the spread of those
/// estimates across batches as the error. Amplitude is not estimated.
pub fn parametric_bootstrap<R: Rng>(
    location: f64,
    scale: f64,
    n: usize,
    runs: usize,
    rng: &mut R,
) -> ErrorTriple {
    if n == 0 || runs == 0 {
        return ErrorTriple::sentinel();
    }
    let dist = match Normal::new(location, scale.abs()) {
        Ok(d) => d,
        Err(_) => return ErrorTriple::sentinel(),
    };

    let base: u64 = rng.gen();
    let estimates: Vec<(f64, f64)> = (0..runs)
        .into_par_iter()
        .map(|run| {
            let mut run_rng = StdRng::seed_from_u64(counter_seed(base, run as u64));
            let batch: Vec<f64> = (0..n).map(|_| dist.sample(&mut run_rng)).collect();
            (sample_mean(&batch), sample_std(&batch))
        })
        .collect();

    let (locations, scales): (Vec<f64>, Vec<f64>) = estimates.into_iter().unzip();
    ErrorTriple {
        location: sample_std(&locations),
        scale: sample_std(&scales),
        amplitude: 0.0,
    }
}

/// Diagnostic mode of the empirical bootstrap: the full per-run
/// (location, scale, amplitude) list. Runs whose refit fails are dropped.
pub fn empirical_bootstrap_runs<R: Rng>(
    samples: &[f64],
    runs: usize,
    rng: &mut R,
) -> Vec<(f64, f64, f64)> {
    let ecdf = Ecdf::new(samples);
    if ecdf.is_empty() {
        return Vec::new();
    }
    let base: u64 = rng.gen();

    (0..runs)
        .into_par_iter()
        .filter_map(|run| {
            let mut run_rng = StdRng::seed_from_u64(counter_seed(base, run as u64));
            let resample = ecdf.sample_into(samples.len(), &mut run_rng);
            let table = value_counts(&resample);
            let fit = fit_gaussian(
                &table.centers,
                &table.counts_f64(),
                None,
                FitOptions {
                    scale_guess: 100.0,
                    peak_guess: None,
                    max_attempts: SINGLE_PEAK_ATTEMPTS,
                },
            )?;
            Some((fit.location, fit.scale, fit.amplitude))
        })
        .collect()
}

/// Empirical bootstrap summary: the resampled scale estimates are themselves
/// histogrammed (41 bins over `fit_scale` +/- 20) and fitted to a Gaussian,
/// and that meta-fit's (location, scale, amplitude) is the reported triple.
/// The double fit is the historical definition of this estimator and is kept
/// as-is; downstream tables depend on it.
pub fn empirical_bootstrap<R: Rng>(
    samples: &[f64],
    fit_scale: f64,
    runs: usize,
    rng: &mut R,
) -> Option<ErrorTriple> {
    let params = empirical_bootstrap_runs(samples, runs, rng);
    if params.is_empty() {
        return None;
    }
    let (_locations, scales, _amplitudes): (Vec<f64>, Vec<f64>, Vec<f64>) =
        params.into_iter().multiunzip();

    let scale_range = (fit_scale - 20.0, fit_scale + 20.0);
    let meta_hist = Histogram::from_range(&scales, scale_range, 41);
    if meta_hist.is_empty() {
        return None;
    }
    let meta = fit_gaussian(
        &meta_hist.centers,
        &meta_hist.counts_f64(),
        None,
        FitOptions {
            scale_guess: 100.0,
            peak_guess: None,
            max_attempts: SINGLE_PEAK_ATTEMPTS,
        },
    )?;
    Some(ErrorTriple {
        location: meta.location,
        scale: meta.scale,
        amplitude: meta.amplitude,
    })
}

/// Percentile (BCa) bootstrap of the raw samples clipped to the fitted peak.
///
/// The clip assumes the clipped data is itself Gaussian; the interval
/// half-widths are converted to one-sigma errors through the normal 95%
/// quantile. Too few clipped samples yields the sentinel triple instead of
/// a failure so the surrounding pipeline can keep the record and flag it.
pub fn percentile_bootstrap<R: Rng>(
    samples: &[f64],
    location: f64,
    scale: f64,
    opts: &BootstrapOptions,
    rng: &mut R,
) -> ErrorTriple {
    let lo = location - opts.left_sigma * scale;
    let hi = location + opts.right_sigma * scale;
    let clipped: Vec<f64> = samples.iter().copied().filter(|v| *v > lo && *v < hi).collect();

    if clipped.len() < opts.min_samples {
        log::warn!(
            "percentile bootstrap: {} samples inside the clip window (need {}), reporting sentinel",
            clipped.len(),
            opts.min_samples
        );
        return ErrorTriple::sentinel();
    }

    let scale_err = match bca_interval(&clipped, sample_std, 0.95, opts.resamples, rng) {
        Some((_, upper)) => (upper - sample_std(&clipped)) / 1.96,
        None => return ErrorTriple::sentinel(),
    };
    let location_err = match bca_interval(&clipped, sample_mean, 0.95, opts.resamples, rng) {
        Some((_, upper)) => (upper - sample_mean(&clipped)) / 1.96,
        None => return ErrorTriple::sentinel(),
    };

    ErrorTriple {
        location: location_err,
        scale: scale_err,
        amplitude: 0.0,
    }
}
