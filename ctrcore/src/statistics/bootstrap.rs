use rand::Rng;
use statrs::distribution::{ContinuousCDF, Normal};

/// Deterministic sub-seed derivation using SplitMix64.
///
/// Bootstrap runs fan out over a thread pool, so each run gets its own RNG
/// seeded from a base seed and the run counter. SplitMix64 decorrelates the
/// seeds far better than `base + counter`.
#[inline]
pub fn counter_seed(base_seed: u64, counter: u64) -> u64 {
    let mut z = base_seed.wrapping_add(counter.wrapping_mul(0x9e3779b97f4a7c15));
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

/// Arithmetic mean.
pub fn sample_mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Maximum-likelihood standard deviation (ddof = 0).
///
/// This matches the point estimates the bootstrap intervals are built
/// around; an unbiased (n - 1) estimator would shift every interval.
pub fn sample_std(values: &[f64]) -> f64 {
    let mean = sample_mean(values);
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Empirical cumulative distribution function over a sample collection.
///
/// `P(X <= xs[i]) = (i + 1) / n` with `xs` sorted ascending. Inverse-CDF
/// draws therefore reproduce the observed values with their observed
/// frequencies.
#[derive(Clone, Debug)]
pub struct Ecdf {
    xs: Vec<f64>,
}

impl Ecdf {
    pub fn new(samples: &[f64]) -> Ecdf {
        let mut xs = samples.to_vec();
        xs.sort_unstable_by(|a, b| a.total_cmp(b));
        Ecdf { xs }
    }

    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    /// Draw `n` values by inverse-CDF sampling with the supplied RNG.
    pub fn sample_into<R: Rng>(&self, n: usize, rng: &mut R) -> Vec<f64> {
        let len = self.xs.len();
        let mut out = Vec::with_capacity(n);
        if len == 0 {
            return out;
        }
        for _ in 0..n {
            let u: f64 = rng.gen();
            // smallest i with (i + 1) / len >= u
            let idx = ((u * len as f64).ceil() as usize).saturating_sub(1).min(len - 1);
            out.push(self.xs[idx]);
        }
        out
    }
}

/// Bias-corrected-accelerated bootstrap confidence interval.
///
/// Returns `(lower, upper)` bounds for `statistic` at the given confidence
/// level, or `None` when the sample is too small or the replicate
/// distribution is fully degenerate.
pub fn bca_interval<R, F>(
    samples: &[f64],
    statistic: F,
    confidence: f64,
    n_resamples: usize,
    rng: &mut R,
) -> Option<(f64, f64)>
where
    R: Rng,
    F: Fn(&[f64]) -> f64,
{
    let n = samples.len();
    if n < 2 || n_resamples < 2 {
        return None;
    }

    let theta_hat = statistic(samples);

    // Bootstrap replicates of the statistic
    let mut scratch = vec![0.0; n];
    let mut replicates = Vec::with_capacity(n_resamples);
    for _ in 0..n_resamples {
        for slot in scratch.iter_mut() {
            *slot = samples[rng.gen_range(0..n)];
        }
        replicates.push(statistic(&scratch));
    }
    replicates.sort_unstable_by(|a, b| a.total_cmp(b));

    // Bias correction from the fraction of replicates below the point estimate
    let below = replicates.iter().filter(|&&t| t < theta_hat).count();
    let b = n_resamples as f64;
    let proportion = (below as f64 / b).clamp(1.0 / (b + 1.0), b / (b + 1.0));

    let std_normal = Normal::new(0.0, 1.0).unwrap();
    let z0 = std_normal.inverse_cdf(proportion);

    // Acceleration from the jackknife skewness of the statistic
    let mut jack = Vec::with_capacity(n);
    let mut loo = Vec::with_capacity(n - 1);
    for i in 0..n {
        loo.clear();
        loo.extend_from_slice(&samples[..i]);
        loo.extend_from_slice(&samples[i + 1..]);
        jack.push(statistic(&loo));
    }
    let jack_mean = sample_mean(&jack);
    let num: f64 = jack.iter().map(|t| (jack_mean - t).powi(3)).sum();
    let den: f64 = jack.iter().map(|t| (jack_mean - t).powi(2)).sum();
    let accel = if den > 0.0 {
        num / (6.0 * den.powf(1.5))
    } else {
        0.0
    };

    let alpha = 1.0 - confidence;
    let adjusted = |z_alpha: f64| -> f64 {
        let zsum = z0 + z_alpha;
        std_normal.cdf(z0 + zsum / (1.0 - accel * zsum))
    };
    let a_lo = adjusted(std_normal.inverse_cdf(alpha / 2.0));
    let a_hi = adjusted(std_normal.inverse_cdf(1.0 - alpha / 2.0));

    let pick = |a: f64| -> f64 {
        let idx = ((n_resamples - 1) as f64 * a).round();
        replicates[(idx.max(0.0) as usize).min(n_resamples - 1)]
    };
    Some((pick(a_lo), pick(a_hi)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_counter_seed_decorrelates() {
        let a = counter_seed(42, 0);
        let b = counter_seed(42, 1);
        assert_ne!(a, b);
        assert_eq!(a, counter_seed(42, 0));
    }

    #[test]
    fn test_mean_and_std() {
        let values = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((sample_mean(&values) - 5.0).abs() < 1e-12);
        assert!((sample_std(&values) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_ecdf_sampling_stays_in_support() {
        let samples = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let ecdf = Ecdf::new(&samples);
        let mut rng = StdRng::seed_from_u64(7);
        let drawn = ecdf.sample_into(200, &mut rng);
        assert_eq!(drawn.len(), 200);
        for v in drawn {
            assert!(samples.contains(&v));
        }
    }

    #[test]
    fn test_bca_brackets_the_mean() {
        let mut rng = StdRng::seed_from_u64(12345);
        // N(10, 2) sample via Box-Muller-free statrs draw is overkill here;
        // a uniform shifted sample is enough to sanity-check the bracket.
        let samples: Vec<f64> = (0..400).map(|_| 10.0 + rng.gen::<f64>() - 0.5).collect();
        let (lo, hi) = bca_interval(&samples, sample_mean, 0.95, 1000, &mut rng).unwrap();
        let mean = sample_mean(&samples);
        assert!(lo <= mean && mean <= hi);
        assert!(hi - lo < 0.2);
    }

    #[test]
    fn test_bca_is_deterministic_under_seed() {
        let samples: Vec<f64> = (0..100).map(|i| (i % 13) as f64).collect();
        let mut rng_a = StdRng::seed_from_u64(99);
        let mut rng_b = StdRng::seed_from_u64(99);
        let a = bca_interval(&samples, sample_std, 0.95, 500, &mut rng_a).unwrap();
        let b = bca_interval(&samples, sample_std, 0.95, 500, &mut rng_b).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_bca_rejects_tiny_samples() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(bca_interval(&[1.0], sample_mean, 0.95, 100, &mut rng).is_none());
    }
}
