use std::collections::HashSet;

use rand::Rng;

use ctrcore::fitting::error::{estimate_errors, BootstrapOptions, ErrorMethod, ErrorTriple};
use ctrcore::fitting::gaussian::{fit_gaussian, FitOptions, GaussianFit, SINGLE_PEAK_ATTEMPTS};
use ctrcore::fitting::peakdetect::peak_detect;
use ctrcore::statistics::histogram::Histogram;

use crate::analysis::settings::{MultiPeakSettings, SinglePeakSettings};
use crate::data::reader::{EventId, SampleSeries};

/// An accepted photopeak: the event ids inside the acceptance window,
/// ready for coincidence matching, plus the fit and its errors.
#[derive(Clone, Debug)]
pub struct PeakSelection {
    pub indices: HashSet<EventId>,
    pub fit: GaussianFit,
    pub errors: ErrorTriple,
}

/// Primary and (when present) secondary photopeaks of one energy spectrum.
#[derive(Clone, Debug)]
pub struct LocatedPeaks {
    pub primary: PeakSelection,
    pub secondary: Option<PeakSelection>,
}

/// Locate photopeaks by lookahead detection with an independent fit per
/// candidate.
///
/// Candidate ranking is deliberately asymmetric and must stay that way:
/// the greatest *fitted height* (density at its own location) wins the
/// primary slot, while among the remaining candidates the greatest
/// *location* wins the secondary slot. A dethroned primary candidate drops
/// out of contention entirely. Downstream tables were produced under this
/// ranking.
///
/// Returns `None` when no candidate fit converges.
pub fn locate_photopeaks<R: Rng>(
    series: &SampleSeries,
    cfg: &MultiPeakSettings,
    method: ErrorMethod,
    bootstrap: &BootstrapOptions,
    rng: &mut R,
) -> Option<LocatedPeaks> {
    let (xmin, xmax) = cfg.bin_range;
    let restricted = series.restricted(xmin, xmax);

    if restricted.len() < cfg.min_samples {
        log::warn!(
            "only {} samples in ({}, {}), fitting anyway",
            restricted.len(),
            xmin,
            xmax
        );
    }

    let bins = ((xmax - xmin) * 2f64.powi(cfg.factor as i32)).floor() as usize;
    if bins == 0 {
        return None;
    }
    let hist = Histogram::from_range(&restricted.values, cfg.bin_range, bins);
    if hist.is_empty() {
        return None;
    }
    let counts = hist.counts_f64();

    let (maxima, _minima) = peak_detect(&counts, &hist.centers, cfg.lookahead);

    let mut best_height = 0.0;
    let mut primary: Option<(GaussianFit, ErrorTriple)> = None;
    let mut secondary_location = xmin;
    let mut secondary: Option<(GaussianFit, ErrorTriple)> = None;

    for (x, _y) in maxima {
        let window = hist.crop((x - cfg.step, x + cfg.step));
        if window.is_empty() {
            continue;
        }
        let fit = match fit_gaussian(
            &window.centers,
            &window.counts_f64(),
            None,
            FitOptions {
                scale_guess: 0.05,
                peak_guess: Some(x),
                max_attempts: SINGLE_PEAK_ATTEMPTS,
            },
        ) {
            Some(fit) => fit,
            None => {
                log::debug!("candidate fit at {:.3} failed", x);
                continue;
            }
        };

        let local = restricted.restricted(x - cfg.step, x + cfg.step);
        let errors = estimate_errors(method, &local.values, &fit, bootstrap, rng);

        let height = fit.height();
        if height > best_height {
            // for multiple peaks, the tallest wins
            best_height = height;
            primary = Some((fit, errors));
        } else if fit.location > secondary_location {
            secondary_location = fit.location;
            secondary = Some((fit, errors));
        }
    }

    let (fit, errors) = match primary {
        Some(found) => found,
        None => {
            log::warn!("photopeak fit failed");
            return None;
        }
    };

    let accept = |fit: &GaussianFit| {
        restricted.ids_in(
            fit.location - cfg.left_sigma * fit.scale,
            fit.location + cfg.right_sigma * fit.scale,
        )
    };

    let primary = PeakSelection {
        indices: accept(&fit),
        fit,
        errors,
    };
    let secondary = secondary.map(|(fit, errors)| PeakSelection {
        indices: accept(&fit),
        fit,
        errors,
    });

    Some(LocatedPeaks { primary, secondary })
}

/// Locate a single photopeak inside a fixed fit window.
///
/// The histogram spans the whole energy range; only bins inside
/// `fit_range` are fitted, and the acceptance window is applied to the
/// full series (not the fit window).
pub fn photopeak_events<R: Rng>(
    series: &SampleSeries,
    cfg: &SinglePeakSettings,
    method: ErrorMethod,
    bootstrap: &BootstrapOptions,
    rng: &mut R,
) -> Option<PeakSelection> {
    if series.len() < cfg.min_samples {
        log::warn!("only {} samples, fitting anyway", series.len());
    }

    let hist = Histogram::from_range(&series.values, cfg.bin_range, cfg.bins);
    let window = hist.crop(cfg.fit_range);
    if window.is_empty() {
        return None;
    }

    let fit = fit_gaussian(
        &window.centers,
        &window.counts_f64(),
        None,
        FitOptions {
            scale_guess: 0.05,
            peak_guess: None,
            max_attempts: SINGLE_PEAK_ATTEMPTS,
        },
    )?;

    let errors = estimate_errors(method, &series.values, &fit, bootstrap, rng);
    let indices = series.ids_in(
        fit.location - cfg.left_sigma * fit.scale,
        fit.location + cfg.right_sigma * fit.scale,
    );

    Some(PeakSelection { indices, fit, errors })
}
