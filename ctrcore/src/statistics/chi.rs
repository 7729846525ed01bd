/// Reduced chi-square of a fit: `(1/dof) * sum((observed - predicted)^2 / sigma^2)`.
///
/// Returns `None` when `dof <= 0` or any `sigma` is exactly zero, both of
/// which make the statistic undefined. Callers are expected to have dropped
/// zero-count bins before evaluating (the Poisson error of an empty bin is
/// zero and would divide out).
///
/// Note the call sites of this crate keep the historical degrees-of-freedom
/// convention `n_points + n_parameters - 1`.
pub fn reduced_chi_square(
    observed: &[f64],
    predicted: &[f64],
    sigma: &[f64],
    dof: i64,
) -> Option<f64> {
    assert_eq!(observed.len(), predicted.len());
    assert_eq!(observed.len(), sigma.len());

    if dof <= 0 {
        return None;
    }
    if sigma.iter().any(|s| *s == 0.0) {
        return None;
    }

    let chi2: f64 = observed
        .iter()
        .zip(predicted.iter())
        .zip(sigma.iter())
        .map(|((o, p), s)| (o - p).powi(2) / (s * s))
        .sum();

    Some(chi2 / dof as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_fit_is_zero() {
        let y = vec![3.0, 7.0, 11.0, 6.0];
        let sigma = vec![1.7, 2.6, 3.3, 2.4];
        let chi = reduced_chi_square(&y, &y, &sigma, (y.len() + 3 - 1) as i64).unwrap();
        assert_eq!(chi, 0.0);
    }

    #[test]
    fn test_zero_sigma_is_undefined() {
        let y = vec![1.0, 2.0];
        let sigma = vec![1.0, 0.0];
        assert!(reduced_chi_square(&y, &y, &sigma, 4).is_none());
    }

    #[test]
    fn test_nonpositive_dof_is_undefined() {
        let y = vec![1.0];
        let sigma = vec![1.0];
        assert!(reduced_chi_square(&y, &y, &sigma, 0).is_none());
        assert!(reduced_chi_square(&y, &y, &sigma, -2).is_none());
    }

    #[test]
    fn test_known_value() {
        let observed = vec![2.0, 4.0];
        let predicted = vec![1.0, 2.0];
        let sigma = vec![1.0, 2.0];
        // (1 + 1) / dof
        let chi = reduced_chi_square(&observed, &predicted, &sigma, 4).unwrap();
        assert!((chi - 0.5).abs() < 1e-12);
    }
}
