use crate::error::{Result, SurfaceError};
use crate::market::rates::RateProvider;
use crate::models::utils::{forward_price, log_moneyness};

/// One maturity's market smile: parallel log-moneyness and implied vol arrays.
///
/// Validated on construction and immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Slice {
    maturity: f64,
    log_moneyness: Vec<f64>,
    implied_vols: Vec<f64>,
}

impl Slice {
    /// Creates a slice from log-moneyness `k` and implied vols `iv` at maturity `t`.
    ///
    /// # Errors
    ///
    /// [`SurfaceError::InvalidInput`] if the arrays differ in length or are empty,
    /// `t` is not a positive finite year fraction, any value is non-finite, or a vol
    /// is negative.
    pub fn new(maturity: f64, log_moneyness: Vec<f64>, implied_vols: Vec<f64>) -> Result<Self> {
        check_maturity(maturity)?;
        if log_moneyness.len() != implied_vols.len() {
            return Err(SurfaceError::invalid(format!(
                "log-moneyness ({}) and implied vol ({}) arrays differ in length at T={}",
                log_moneyness.len(),
                implied_vols.len(),
                maturity
            )));
        }
        if log_moneyness.is_empty() {
            return Err(SurfaceError::invalid(format!(
                "slice at T={} has no market points",
                maturity
            )));
        }
        if let Some(k) = log_moneyness.iter().find(|k| !k.is_finite()) {
            return Err(SurfaceError::invalid(format!(
                "non-finite log-moneyness {} at T={}",
                k, maturity
            )));
        }
        if let Some(v) = implied_vols.iter().find(|v| !(v.is_finite() && **v >= 0.0)) {
            return Err(SurfaceError::invalid(format!(
                "implied vol {} at T={} must be finite and non-negative",
                v, maturity
            )));
        }

        Ok(Self {
            maturity,
            log_moneyness,
            implied_vols,
        })
    }

    /// Creates a slice from raw strikes, converting them to forward log-moneyness
    /// `k = ln(K / (S·exp((r(T) − q)·T)))`.
    ///
    /// The rate provider is called once, at `t`, after `t` has been validated.
    pub fn from_strikes(
        maturity: f64,
        strikes: &[f64],
        implied_vols: Vec<f64>,
        spot: f64,
        dividend_yield: f64,
        rates: &dyn RateProvider,
    ) -> Result<Self> {
        check_maturity(maturity)?;
        if !(spot.is_finite() && spot > 0.0) {
            return Err(SurfaceError::invalid(format!(
                "spot must be > 0 and finite, got {}",
                spot
            )));
        }
        if let Some(k) = strikes.iter().find(|k| !(k.is_finite() && **k > 0.0)) {
            return Err(SurfaceError::invalid(format!(
                "strike {} must be > 0 and finite",
                k
            )));
        }

        let forward = forward_price(spot, rates.rate(maturity), dividend_yield, maturity);
        let k = strikes
            .iter()
            .map(|&strike| log_moneyness(strike, forward))
            .collect();
        Self::new(maturity, k, implied_vols)
    }

    pub fn maturity(&self) -> f64 {
        self.maturity
    }

    pub fn log_moneyness(&self) -> &[f64] {
        &self.log_moneyness
    }

    pub fn implied_vols(&self) -> &[f64] {
        &self.implied_vols
    }

    pub fn len(&self) -> usize {
        self.log_moneyness.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log_moneyness.is_empty()
    }

    /// Market total variance `iv²·T` per point.
    pub fn total_variances(&self) -> Vec<f64> {
        self.implied_vols
            .iter()
            .map(|iv| iv * iv * self.maturity)
            .collect()
    }
}

fn check_maturity(maturity: f64) -> Result<()> {
    if !(maturity.is_finite() && maturity > 0.0) {
        return Err(SurfaceError::invalid(format!(
            "maturity must be > 0 and finite, got {}",
            maturity
        )));
    }
    Ok(())
}

/// Model calibrator trait for parameter optimization
pub trait ModelCalibrator: Send + Sync {
    /// Returns the name of the model (e.g., "svi")
    fn model_name(&self) -> &str;

    /// How many parameters are in the model's optimization vector
    fn param_count(&self) -> usize;

    /// Returns the vector of (min, max) bounds for each parameter
    fn param_bounds(&self) -> &[(f64, f64)];

    /// Objective value for the parameter vector `x` against the calibrator's data
    fn evaluate_objective(&self, x: &[f64]) -> f64;

    /// Returns parameter names in the order they appear in the optimization vector
    fn param_names(&self) -> Vec<&str>;
}

/// Informational outcome of a bounded fit. Never used to reject a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConvergenceStatus {
    /// The optimizer returned normally with every parameter strictly inside its bounds.
    Converged,
    /// The optimizer returned normally but at least one parameter sits on a bound.
    BoundActive,
}

/// Diagnostics attached to every calibrated slice.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CalibrationReport {
    /// Final objective (mean squared vol error)
    pub objective: f64,
    /// `sqrt(objective)`, in vol units
    pub rmse: f64,
    /// Objective at the (clamped) starting point
    pub initial_objective: f64,
    /// Number of objective evaluations, including finite-difference steps
    pub evaluations: usize,
    pub status: ConvergenceStatus,
    /// Names of parameters that ended on a bound
    pub active_bounds: Vec<String>,
}
