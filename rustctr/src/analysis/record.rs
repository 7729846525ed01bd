use serde::{Deserialize, Serialize};

/// One row of the aggregate results table: everything measured for one
/// file-group. Constructed once by the pipeline and never mutated; the
/// serialized column names match the historical tables so downstream
/// notebooks keep working.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DelayRecord {
    pub uniquename: String,
    #[serde(rename = "SampleA")]
    pub sample_a: String,
    #[serde(rename = "SampleB")]
    pub sample_b: String,
    /// Crystal length in mm, parsed from the run name by the data layer.
    pub length: i64,
    pub mtime: f64,
    pub ctime: f64,

    /// Delay fit, in ps.
    pub location: f64,
    pub locationerr: f64,
    pub scale: f64,
    pub scaleerr: f64,
    pub amplitude: f64,
    pub amplitudeerr: f64,
    pub chisquared: Option<f64>,
    pub numofsamples: usize,

    /// Left (reference) photopeak.
    #[serde(rename = "LPloc")]
    pub lp_loc: f64,
    #[serde(rename = "LPscale")]
    pub lp_scale: f64,
    #[serde(rename = "LPlocerr")]
    pub lp_loc_err: f64,
    #[serde(rename = "LPscaleerr")]
    pub lp_scale_err: f64,

    /// Right (under-test) photopeak.
    #[serde(rename = "RPloc")]
    pub rp_loc: f64,
    #[serde(rename = "RPscale")]
    pub rp_scale: f64,
    #[serde(rename = "RPlocerr")]
    pub rp_loc_err: f64,
    #[serde(rename = "RPscaleerr")]
    pub rp_scale_err: f64,

    /// Right secondary photopeak; zeros when none was found.
    #[serde(rename = "RSPloc")]
    pub rsp_loc: f64,
    #[serde(rename = "RSPscale")]
    pub rsp_scale: f64,
    #[serde(rename = "RSPlocerr")]
    pub rsp_loc_err: f64,
    #[serde(rename = "RSPscaleerr")]
    pub rsp_scale_err: f64,
}

/// Coincidence time resolution from the delay-fit scale, with first-order
/// error propagation.
///
/// Against a reference detector of known resolution `(ref, ref_err)` the
/// reference is subtracted in quadrature; a fitted width at or below the
/// reference yields (0, 0). With identical detectors (`None`) the width
/// splits evenly between the two, i.e. divides by sqrt(2).
pub fn time_resolution(scale: f64, scale_err: f64, reference: Option<(f64, f64)>) -> (f64, f64) {
    match reference {
        Some((reference, reference_err)) => {
            if scale <= reference {
                return (0.0, 0.0);
            }
            let value = (scale * scale - reference * reference).sqrt();
            let err = ((scale * scale_err).powi(2) + (reference * reference_err).powi(2)).sqrt()
                / value;
            (value, err)
        }
        None => (
            scale / std::f64::consts::SQRT_2,
            scale_err / std::f64::consts::SQRT_2,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_detectors_split_by_sqrt2() {
        let (value, err) = time_resolution(100.0, 4.0, None);
        assert!((value - 70.710678).abs() < 1e-5);
        assert!((err - 2.828427).abs() < 1e-5);
    }

    #[test]
    fn test_reference_subtracted_in_quadrature() {
        let (value, err) = time_resolution(130.0, 5.0, Some((42.0, 2.0)));
        let expected = (130.0f64 * 130.0 - 42.0 * 42.0).sqrt();
        assert!((value - expected).abs() < 1e-9);
        assert!(err > 0.0 && err < 10.0);
    }

    #[test]
    fn test_width_below_reference_clamps() {
        assert_eq!(time_resolution(40.0, 5.0, Some((42.0, 2.0))), (0.0, 0.0));
    }
}
