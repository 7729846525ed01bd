/// Local maxima and minima of a sequence by lookahead comparison.
///
/// A point is a maximum when no value within `lookahead` positions on
/// either side strictly exceeds it (minima mirrored). Returned as (x, y)
/// pairs ready to seed per-candidate fits.
pub fn peak_detect(
    y: &[f64],
    x: &[f64],
    lookahead: usize,
) -> (Vec<(f64, f64)>, Vec<(f64, f64)>) {
    assert_eq!(y.len(), x.len());
    let n = y.len();
    let mut maxima = Vec::new();
    let mut minima = Vec::new();

    for i in 0..n {
        let lo = i.saturating_sub(lookahead);
        let hi = (i + lookahead).min(n.saturating_sub(1));
        let window = &y[lo..=hi];

        if window.iter().all(|&v| v <= y[i]) {
            maxima.push((x[i], y[i]));
        } else if window.iter().all(|&v| v >= y[i]) {
            minima.push((x[i], y[i]));
        }
    }

    (maxima, minima)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finds_two_bumps() {
        let x: Vec<f64> = (0..100).map(|i| i as f64 / 100.0).collect();
        let y: Vec<f64> = x
            .iter()
            .map(|&v| {
                50.0 * (-(v - 0.3f64).powi(2) / 0.002).exp()
                    + 80.0 * (-(v - 0.6f64).powi(2) / 0.002).exp()
            })
            .collect();
        let (maxima, _) = peak_detect(&y, &x, 10);
        // The flat tails register as plateau "maxima" of height ~0; the two
        // real bumps must be present at the right positions.
        let tall: Vec<&(f64, f64)> = maxima.iter().filter(|(_, h)| *h > 1.0).collect();
        assert_eq!(tall.len(), 2);
        assert!((tall[0].0 - 0.3).abs() < 0.02);
        assert!((tall[1].0 - 0.6).abs() < 0.02);
    }

    #[test]
    fn test_lookahead_suppresses_ripple() {
        // Small ripple riding on one broad bump: a wide window sees only
        // one maximum above the noise floor
        let x: Vec<f64> = (0..200).map(|i| i as f64).collect();
        let y: Vec<f64> = x
            .iter()
            .map(|&v| 100.0 * (-(v - 100.0f64).powi(2) / 800.0).exp() + (v * 0.9).sin())
            .collect();
        let (maxima, _) = peak_detect(&y, &x, 30);
        let tall: Vec<&(f64, f64)> = maxima.iter().filter(|(_, h)| *h > 10.0).collect();
        assert_eq!(tall.len(), 1);
        assert!((tall[0].0 - 100.0).abs() <= 3.0);
    }

    #[test]
    fn test_minima_mirrored() {
        let x: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|&v| (v - 25.0).powi(2)).collect();
        let (maxima, minima) = peak_detect(&y, &x, 5);
        assert!(minima.iter().any(|&(pos, _)| (pos - 25.0).abs() < 1.0));
        // Endpoints dominate their one-sided windows
        assert!(maxima.iter().any(|&(pos, _)| pos == 0.0 || pos == 49.0));
    }
}
