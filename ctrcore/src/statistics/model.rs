use statrs::distribution::{Continuous, Normal};

/// Shifted normal distribution: `amplitude * N(x; location, scale)`.
///
/// This is the parametric shape every fit and chi-square score in the
/// workspace is evaluated against. The width is taken as `|scale|` so the
/// model stays well defined while an optimizer explores negative widths;
/// a zero or non-finite width evaluates to 0 rather than a singularity.
pub fn gaussian_density(x: f64, location: f64, scale: f64, amplitude: f64) -> f64 {
    let width = scale.abs();
    match Normal::new(location, width) {
        Ok(dist) => amplitude * dist.pdf(x),
        Err(_) => 0.0,
    }
}

/// Shifted normal distribution on a constant noise floor.
pub fn gaussian_density_with_noise(
    x: f64,
    location: f64,
    scale: f64,
    amplitude: f64,
    noise: f64,
) -> f64 {
    gaussian_density(x, location, scale, amplitude) + noise
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_density_integrates_to_amplitude() {
        // Trapezoid rule over +/- 10 sigma captures essentially all the mass
        let (location, scale, amplitude) = (5.0, 1.0, 100.0);
        let n = 20_000;
        let (lo, hi) = (location - 10.0 * scale, location + 10.0 * scale);
        let dx = (hi - lo) / n as f64;
        let mut area = 0.0;
        for i in 0..n {
            let x0 = lo + i as f64 * dx;
            let y0 = gaussian_density(x0, location, scale, amplitude);
            let y1 = gaussian_density(x0 + dx, location, scale, amplitude);
            area += 0.5 * (y0 + y1) * dx;
        }
        assert!((area - amplitude).abs() < 1e-6 * amplitude);
    }

    #[test]
    fn test_density_maximized_at_location() {
        let peak = gaussian_density(5.0, 5.0, 1.0, 100.0);
        for x in [3.0, 4.5, 4.99, 5.01, 5.5, 7.0] {
            assert!(gaussian_density(x, 5.0, 1.0, 100.0) < peak);
        }
    }

    #[test]
    fn test_negative_scale_matches_positive() {
        let a = gaussian_density(0.3, 0.5, 0.05, 2.0);
        let b = gaussian_density(0.3, 0.5, -0.05, 2.0);
        assert!((a - b).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_scale_is_zero_not_panic() {
        assert_eq!(gaussian_density(1.0, 1.0, 0.0, 10.0), 0.0);
        assert_eq!(gaussian_density(1.0, 1.0, f64::NAN, 10.0), 0.0);
        assert_eq!(gaussian_density_with_noise(1.0, 1.0, 0.0, 10.0, 3.0), 3.0);
    }
}
