//! Risk-free rate term structures used when turning strikes into log-moneyness.

use crate::error::{Result, SurfaceError};

/// Continuously compounded risk-free rate for a maturity in years.
pub trait RateProvider: Send + Sync {
    fn rate(&self, maturity: f64) -> f64;
}

/// The same rate at every maturity.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FlatRate(pub f64);

impl RateProvider for FlatRate {
    fn rate(&self, _maturity: f64) -> f64 {
        self.0
    }
}

impl<F> RateProvider for F
where
    F: Fn(f64) -> f64 + Send + Sync,
{
    fn rate(&self, maturity: f64) -> f64 {
        self(maturity)
    }
}

/// Tenors of the 3M bill, 5Y and 10Y treasury anchors.
pub const DEFAULT_ANCHOR_TENORS: [f64; 3] = [0.25, 5.0, 10.0];

/// Piecewise-linear curve through anchor points, flat before the first and after
/// the last anchor.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RateCurve {
    tenors: Vec<f64>,
    rates: Vec<f64>,
}

impl RateCurve {
    /// Anchors are sorted by tenor; duplicate tenors are rejected.
    pub fn new(tenors: Vec<f64>, rates: Vec<f64>) -> Result<Self> {
        if tenors.is_empty() || tenors.len() != rates.len() {
            return Err(SurfaceError::shape(format!(
                "rate curve needs matching non-empty anchors, got {} tenors and {} rates",
                tenors.len(),
                rates.len()
            )));
        }
        if tenors.iter().chain(rates.iter()).any(|v| !v.is_finite()) {
            return Err(SurfaceError::invalid("rate curve anchors must be finite"));
        }

        let mut anchors: Vec<(f64, f64)> = tenors.into_iter().zip(rates).collect();
        anchors.sort_by(|a, b| a.0.total_cmp(&b.0));
        if anchors.windows(2).any(|w| w[0].0 == w[1].0) {
            return Err(SurfaceError::invalid("rate curve tenors must be distinct"));
        }
        let (tenors, rates) = anchors.into_iter().unzip();
        Ok(Self { tenors, rates })
    }

    /// Curve through the 0.25y, 5y and 10y anchors with the given rates.
    pub fn from_anchor_rates(rates: [f64; 3]) -> Result<Self> {
        Self::new(DEFAULT_ANCHOR_TENORS.to_vec(), rates.to_vec())
    }

    pub fn tenors(&self) -> &[f64] {
        &self.tenors
    }

    pub fn rates(&self) -> &[f64] {
        &self.rates
    }
}

impl RateProvider for RateCurve {
    /// NaN maturities give a NaN rate.
    fn rate(&self, maturity: f64) -> f64 {
        if maturity.is_nan() {
            return f64::NAN;
        }
        let last = self.tenors.len() - 1;
        if maturity <= self.tenors[0] {
            return self.rates[0];
        }
        if maturity >= self.tenors[last] {
            return self.rates[last];
        }
        let i = self.tenors.partition_point(|&t| t <= maturity) - 1;
        let (t0, t1) = (self.tenors[i], self.tenors[i + 1]);
        let (r0, r1) = (self.rates[i], self.rates[i + 1]);
        r0 + (r1 - r0) * (maturity - t0) / (t1 - t0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_rate_and_closure() {
        assert_eq!(FlatRate(0.03).rate(7.0), 0.03);
        let curve = |t: f64| 0.01 + 0.001 * t;
        assert!((curve.rate(2.0) - 0.012).abs() < 1e-15);
    }

    #[test]
    fn curve_is_linear_between_anchors_and_flat_outside() {
        let curve = RateCurve::from_anchor_rates([0.05, 0.04, 0.045]).unwrap();
        assert_eq!(curve.rate(0.1), 0.05);
        assert_eq!(curve.rate(0.25), 0.05);
        assert_eq!(curve.rate(30.0), 0.045);
        assert_eq!(curve.rate(5.0), 0.04);
        let mid = curve.rate(2.625);
        assert!((mid - 0.045).abs() < 1e-12, "{mid}");
        assert!((curve.rate(7.5) - 0.0425).abs() < 1e-12);
    }

    #[test]
    fn nan_maturity_gives_nan_rate() {
        let curve = RateCurve::from_anchor_rates([0.05, 0.04, 0.045]).unwrap();
        assert!(curve.rate(f64::NAN).is_nan());
        assert_eq!(curve.rate(f64::NEG_INFINITY), 0.05);
        assert_eq!(curve.rate(f64::INFINITY), 0.045);
    }

    #[test]
    fn unsorted_anchors_are_sorted() {
        let curve = RateCurve::new(vec![10.0, 0.25], vec![0.04, 0.02]).unwrap();
        assert_eq!(curve.tenors(), &[0.25, 10.0]);
        assert_eq!(curve.rates(), &[0.02, 0.04]);
    }

    #[test]
    fn invalid_anchors_are_rejected() {
        assert!(RateCurve::new(vec![], vec![]).is_err());
        assert!(RateCurve::new(vec![1.0, 2.0], vec![0.01]).is_err());
        assert!(RateCurve::new(vec![1.0, 1.0], vec![0.01, 0.02]).is_err());
        assert!(RateCurve::new(vec![1.0], vec![f64::NAN]).is_err());
    }
}
