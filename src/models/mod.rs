pub mod grid;
pub mod svi;

/// Common traits used by the smile models
pub mod traits {
    use crate::model_params::SviParameterization;
    use crate::models::svi::svi_model::{SviParams, VARIANCE_FLOOR};

    /// Closed-form smile evaluator for one SVI parameterization.
    ///
    /// Implementations are stateless; the parameter vector is passed on every call
    /// so that the same evaluator serves the optimizer and fitted slices alike.
    pub trait SmileModel: Send + Sync + std::fmt::Debug {
        fn parameterization(&self) -> SviParameterization;

        /// Smile variance `w(k)`. May be negative for ill-conditioned parameters.
        fn total_variance(&self, params: &SviParams, k: f64) -> f64;

        /// Implied volatility `sqrt(max(w(k), ε))`.
        fn implied_vol(&self, params: &SviParams, k: f64) -> f64 {
            self.total_variance(params, k).max(VARIANCE_FLOOR).sqrt()
        }

        fn total_variances(&self, params: &SviParams, ks: &[f64]) -> Vec<f64> {
            ks.iter().map(|&k| self.total_variance(params, k)).collect()
        }

        fn implied_vols(&self, params: &SviParams, ks: &[f64]) -> Vec<f64> {
            ks.iter().map(|&k| self.implied_vol(params, k)).collect()
        }
    }
}

/// Utility functions shared by the models
pub mod utils {
    /// Forward price `S·exp((r − q)·T)`.
    pub fn forward_price(spot: f64, rate: f64, dividend_yield: f64, t: f64) -> f64 {
        spot * ((rate - dividend_yield) * t).exp()
    }

    /// Log-moneyness against the forward: `ln(K / F)`.
    pub fn log_moneyness(strike: f64, forward: f64) -> f64 {
        (strike / forward).ln()
    }

    /// Linear interpolation weight of `x` inside `[x0, x1]`.
    #[inline]
    pub fn interp_weight(x0: f64, x1: f64, x: f64) -> f64 {
        (x - x0) / (x1 - x0)
    }

}
