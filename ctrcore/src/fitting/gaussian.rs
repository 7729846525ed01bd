use itertools::Itertools;
use nalgebra::{Matrix3, Vector3};
use ordered_float::OrderedFloat;

use crate::statistics::chi::reduced_chi_square;
use crate::statistics::model::gaussian_density;

/// Retry budget for photopeak fits.
pub const SINGLE_PEAK_ATTEMPTS: usize = 5;
/// Retry budget for the final delay fit, which sees far noisier histograms.
pub const DELAY_FIT_ATTEMPTS: usize = 100;

const MAX_ITERATIONS: usize = 200;
const LAMBDA_START: f64 = 1e-3;
const LAMBDA_GIVE_UP: f64 = 1e12;

/// Converged parameters of a shifted-Gaussian least-squares fit.
///
/// `scale` is always reported positive; the optimizer is free to explore
/// negative widths internally. A missing covariance means the normal
/// equations could not be inverted at the solution.
#[derive(Clone, Debug)]
pub struct GaussianFit {
    pub location: f64,
    pub scale: f64,
    pub amplitude: f64,
    pub covariance: Option<Matrix3<f64>>,
    pub reduced_chi_square: Option<f64>,
}

impl GaussianFit {
    /// Fitted peak height: the density evaluated at its own location.
    pub fn height(&self) -> f64 {
        gaussian_density(self.location, self.location, self.scale, self.amplitude)
    }
}

/// Knobs of a single `fit_gaussian` call. Defaults match the photopeak
/// call sites; the delay fit overrides all three.
#[derive(Clone, Copy, Debug)]
pub struct FitOptions {
    /// Initial width seed, in the x-axis units of the data.
    pub scale_guess: f64,
    /// Location seed; falls back to the x of the tallest bin.
    pub peak_guess: Option<f64>,
    /// Re-seed-and-retry budget before the fit is declared failed.
    pub max_attempts: usize,
}

impl Default for FitOptions {
    fn default() -> Self {
        FitOptions {
            scale_guess: 0.05,
            peak_guess: None,
            max_attempts: SINGLE_PEAK_ATTEMPTS,
        }
    }
}

/// Weighted nonlinear least-squares fit of `gaussian_density` to (x, y).
///
/// Minimizes `sum w_i * (y_i - density(x_i))^2` by Levenberg-Marquardt over
/// (location, scale, amplitude). When `weights` is `None` the counts
/// themselves set the weights, `w_i = 1/y_i`, the Poisson-style weighting
/// appropriate for histogram bins (zero-count bins must already be gone).
///
/// A diverged attempt or a non-finite covariance triggers a deterministic
/// re-seed: location jumps to the y-value nearest the maximum-likelihood
/// mean of `y`, the amplitude to the tallest bin, and the width seed grows
/// with the attempt number. After `max_attempts` failures the fit reports
/// `None` rather than raising; callers treat that as a failed peak.
///
/// `x` must be ascending (histogram bin centers always are).
pub fn fit_gaussian(
    x: &[f64],
    y: &[f64],
    weights: Option<&[f64]>,
    opts: FitOptions,
) -> Option<GaussianFit> {
    if x.is_empty() || x.len() != y.len() {
        log::debug!("gaussian fit called with no usable data");
        return None;
    }
    if y.iter().all(|&v| v <= 0.0) {
        return None;
    }

    let w: Vec<f64> = match weights {
        Some(values) => values.iter().map(|&v| if v > 0.0 { v } else { 1.0 }).collect(),
        None => y.iter().map(|&v| if v > 0.0 { 1.0 / v } else { 1.0 }).collect(),
    };

    let tallest = y
        .iter()
        .position_max_by_key(|&&v| OrderedFloat(v))
        .expect("non-empty y");

    let mut guess = Vector3::new(
        opts.peak_guess.unwrap_or(x[tallest]),
        opts.scale_guess,
        1.0,
    );

    for attempt in 0..opts.max_attempts.max(1) {
        if let Some((params, covariance)) = lm_solve(x, y, &w, guess) {
            let finite = covariance
                .map(|c| c.iter().all(|v| v.is_finite()))
                .unwrap_or(false);
            if finite {
                return Some(finish(x, y, &w, params, covariance));
            }
        }

        // Robust restart: jump to the y-value nearest the MLE mean of the
        // counts, widen the width seed, and start the amplitude at the
        // tallest bin instead of 1.
        let mle_mean = y.iter().sum::<f64>() / y.len() as f64;
        let idx = x.partition_point(|&v| v < mle_mean);
        let restart_location = if idx < y.len() {
            y[idx]
        } else {
            y[(y.len() / 2).saturating_sub(1)]
        };
        guess = Vector3::new(
            restart_location,
            opts.scale_guess * (attempt as f64 + 2.0),
            y[tallest],
        );
        log::debug!("gaussian fit attempt {} failed, re-seeding", attempt + 1);
    }

    None
}

fn finish(
    x: &[f64],
    y: &[f64],
    w: &[f64],
    params: Vector3<f64>,
    covariance: Option<Matrix3<f64>>,
) -> GaussianFit {
    let location = params[0];
    let scale = params[1].abs();
    let amplitude = params[2];

    let predicted: Vec<f64> = x
        .iter()
        .map(|&xi| gaussian_density(xi, location, scale, amplitude))
        .collect();
    let sigma: Vec<f64> = w.iter().map(|&wi| 1.0 / wi.sqrt()).collect();
    let dof = (x.len() + 3 - 1) as i64;
    let chi = reduced_chi_square(y, &predicted, &sigma, dof);

    GaussianFit {
        location,
        scale,
        amplitude,
        covariance,
        reduced_chi_square: chi,
    }
}

fn weighted_cost(x: &[f64], y: &[f64], w: &[f64], p: &Vector3<f64>) -> f64 {
    let mut cost = 0.0;
    for i in 0..x.len() {
        let r = y[i] - gaussian_density(x[i], p[0], p[1], p[2]);
        cost += w[i] * r * r;
    }
    cost
}

/// Accumulated normal equations (JtWJ, JtWr) at the current parameters,
/// with analytic derivatives of the Gaussian shape.
fn normal_equations(
    x: &[f64],
    y: &[f64],
    w: &[f64],
    p: &Vector3<f64>,
) -> (Matrix3<f64>, Vector3<f64>) {
    let (location, scale, amplitude) = (p[0], p[1], p[2]);
    let s = scale.abs().max(1e-12);
    let sign = if scale < 0.0 { -1.0 } else { 1.0 };
    let norm = 1.0 / (s * (2.0 * std::f64::consts::PI).sqrt());

    let mut jtj = Matrix3::zeros();
    let mut jtr = Vector3::zeros();
    for i in 0..x.len() {
        let z = (x[i] - location) / s;
        let g = norm * (-0.5 * z * z).exp();
        let r = y[i] - amplitude * g;
        let j = Vector3::new(
            amplitude * g * z / s,
            sign * amplitude * g * (z * z - 1.0) / s,
            g,
        );
        jtj += w[i] * j * j.transpose();
        jtr += w[i] * r * j;
    }
    (jtj, jtr)
}

/// One Levenberg-Marquardt descent from `p0`. Returns the converged
/// parameters and the scipy-convention covariance (inverse normal equations
/// scaled by the residual variance), or `None` on divergence.
fn lm_solve(
    x: &[f64],
    y: &[f64],
    w: &[f64],
    p0: Vector3<f64>,
) -> Option<(Vector3<f64>, Option<Matrix3<f64>>)> {
    let mut p = p0;
    let mut cost = weighted_cost(x, y, w, &p);
    if !cost.is_finite() {
        return None;
    }

    let mut lambda = LAMBDA_START;
    let mut converged = false;

    for _ in 0..MAX_ITERATIONS {
        let (jtj, jtr) = normal_equations(x, y, w, &p);

        let mut damped = jtj;
        for i in 0..3 {
            damped[(i, i)] += lambda * jtj[(i, i)].max(1e-12);
        }

        let delta = match damped.lu().solve(&jtr) {
            Some(d) if d.iter().all(|v| v.is_finite()) => d,
            _ => {
                lambda *= 10.0;
                if lambda > LAMBDA_GIVE_UP {
                    return None;
                }
                continue;
            }
        };

        let trial = p + delta;
        let trial_cost = weighted_cost(x, y, w, &trial);
        if trial_cost.is_finite() && trial_cost <= cost {
            let improvement = cost - trial_cost;
            p = trial;
            cost = trial_cost;
            lambda = (lambda * 0.1).max(1e-12);
            if improvement <= 1e-10 * (1.0 + cost) {
                converged = true;
                break;
            }
        } else {
            lambda *= 10.0;
            if lambda > LAMBDA_GIVE_UP {
                return None;
            }
        }
    }

    if !converged {
        return None;
    }

    let (jtj, _) = normal_equations(x, y, w, &p);
    let covariance = jtj.try_inverse().map(|inv| {
        let n = x.len();
        let residual_var = if n > 3 { cost / (n - 3) as f64 } else { 1.0 };
        inv * residual_var
    });
    Some((p, covariance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::histogram::Histogram;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Histogram counts drawn around density(x; 5, 1, 100), with small
    /// multiplicative noise standing in for Poisson fluctuations.
    fn synthetic_peak(seed: u64) -> (Vec<f64>, Vec<f64>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut x = Vec::new();
        let mut y = Vec::new();
        let mut xi = 1.0;
        while xi < 9.0 {
            let mean = gaussian_density(xi, 5.0, 1.0, 100.0);
            let jitter = 1.0 + 0.1 * (rng.gen::<f64>() - 0.5);
            let count = (mean * jitter).round();
            if count > 0.0 {
                x.push(xi);
                y.push(count);
            }
            xi += 0.1;
        }
        (x, y)
    }

    #[test]
    fn test_recovers_known_parameters() {
        for seed in 0..10 {
            let (x, y) = synthetic_peak(seed);
            let fit = fit_gaussian(
                &x,
                &y,
                None,
                FitOptions {
                    scale_guess: 0.5,
                    peak_guess: None,
                    max_attempts: SINGLE_PEAK_ATTEMPTS,
                },
            )
            .expect("clean synthetic peak must fit");
            assert!((fit.location - 5.0).abs() < 0.1, "location {}", fit.location);
            assert!((fit.scale - 1.0).abs() < 0.1, "scale {}", fit.scale);
            assert!(fit.covariance.is_some());
        }
    }

    #[test]
    fn test_scale_reported_positive() {
        let (x, y) = synthetic_peak(3);
        // A negative width seed converges to the mirrored solution
        let fit = fit_gaussian(
            &x,
            &y,
            None,
            FitOptions {
                scale_guess: -0.5,
                peak_guess: Some(5.0),
                max_attempts: SINGLE_PEAK_ATTEMPTS,
            },
        )
        .unwrap();
        assert!(fit.scale > 0.0);
        assert!((fit.scale - 1.0).abs() < 0.1);
    }

    #[test]
    fn test_degenerate_data_returns_none() {
        let x: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let y = vec![0.0; 50];
        assert!(fit_gaussian(&x, &y, None, FitOptions::default()).is_none());
        assert!(fit_gaussian(&[], &[], None, FitOptions::default()).is_none());
    }

    #[test]
    fn test_chi_square_near_one_for_poisson_like_noise() {
        let (x, y) = synthetic_peak(8);
        let fit = fit_gaussian(&x, &y, None, FitOptions { scale_guess: 0.5, ..FitOptions::default() }).unwrap();
        let chi = fit.reduced_chi_square.unwrap();
        assert!(chi >= 0.0 && chi < 5.0, "chi {}", chi);
    }

    #[test]
    fn test_fits_binned_samples() {
        // End-to-end through the histogram type, like the pipeline does
        let mut rng = StdRng::seed_from_u64(11);
        let samples: Vec<f64> = (0..20_000)
            .map(|_| {
                // sum of uniforms is plenty Gaussian for a fit check
                let s: f64 = (0..12).map(|_| rng.gen::<f64>()).sum();
                (s - 6.0) * 0.08 + 0.6
            })
            .collect();
        let hist = Histogram::from_range(&samples, (0.1, 1.0), 200);
        let fit = fit_gaussian(&hist.centers, &hist.counts_f64(), None, FitOptions::default())
            .expect("binned Gaussian sample must fit");
        assert!((fit.location - 0.6).abs() < 0.02);
        assert!((fit.scale - 0.08).abs() < 0.02);
    }
}
