// src/models/svi/svi_model.rs

//! Stochastic Volatility Inspired (SVI) smile model
//!
//! The raw SVI form gives the smile variance at log-moneyness k as:
//!
//! w(k) = a + b * (ρ(k-m) + sqrt((k-m)² + σ²))
//!
//! with implied volatility read off as `sqrt(max(w(k), ε))`. The floor ε keeps
//! ill-conditioned parameter sets (a very negative `a`) from producing a NaN.
//! Parameters:
//! - a: vertical shift (controls ATM level)
//! - b: slope factor (curvature scale, b >= 0)
//! - ρ: asymmetry parameter (skew, -1 < ρ < 1)
//! - m: horizontal shift (smile minimum location)
//! - σ: curvature parameter (smoothness at the vertex, σ > 0)
//!
//! Parameter ranges are enforced as optimizer bounds by the calibrator, not here:
//! the evaluator accepts whatever vector it is given.

use crate::error::{Result, SurfaceError};
use crate::model_params::SviParameterization;
use crate::models::traits::SmileModel;

/// Variance floor applied before the square root.
pub const VARIANCE_FLOOR: f64 = 1e-10;

/// Number of entries in an SVI parameter vector, for every parameterization.
pub const SVI_PARAM_COUNT: usize = 5;

/// Ordered SVI parameter vector `(a, b, ρ, m, σ)`.
///
/// Field names follow the raw formulation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SviParams {
    /// Vertical shift parameter (controls ATM variance level)
    pub a: f64,
    /// Slope factor (controls wing steepness)
    pub b: f64,
    /// Asymmetry parameter (skew)
    pub rho: f64,
    /// Horizontal shift parameter
    pub m: f64,
    /// Curvature parameter
    pub sigma: f64,
}

impl SviParams {
    pub fn new(a: f64, b: f64, rho: f64, m: f64, sigma: f64) -> Self {
        Self {
            a,
            b,
            rho,
            m,
            sigma,
        }
    }

    /// Builds parameters from an optimizer vector `[a, b, rho, m, sigma]`.
    pub fn from_slice(x: &[f64]) -> Result<Self> {
        match x {
            [a, b, rho, m, sigma] => Ok(Self::new(*a, *b, *rho, *m, *sigma)),
            _ => Err(SurfaceError::invalid(format!(
                "SVI parameter vector must have {} entries, got {}",
                SVI_PARAM_COUNT,
                x.len()
            ))),
        }
    }

    pub fn to_array(&self) -> [f64; SVI_PARAM_COUNT] {
        [self.a, self.b, self.rho, self.m, self.sigma]
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.to_array().to_vec()
    }

    /// Minimum of the raw smile, `a + b·σ·sqrt(1 − ρ²)`.
    ///
    /// Negative values mean the smile dips below zero variance somewhere and the
    /// variance floor is active there.
    pub fn min_total_variance(&self) -> f64 {
        self.a + self.b * self.sigma * (1.0 - self.rho * self.rho).max(0.0).sqrt()
    }

    /// Starting point for a fit when the caller has none.
    ///
    /// Places the vertex at the lowest quoted vol, sets `a` so the vertex variance
    /// roughly matches it, and uses a flat skew with moderate wings.
    pub fn heuristic_guess(k: &[f64], iv: &[f64]) -> Self {
        let (k_min, iv_min) = k
            .iter()
            .zip(iv.iter())
            .filter(|(k, v)| k.is_finite() && v.is_finite())
            .fold((0.0, f64::INFINITY), |best, (&k, &v)| {
                if v < best.1 {
                    (k, v)
                } else {
                    best
                }
            });
        let iv_min = if iv_min.is_finite() { iv_min } else { 0.2 };

        let b = 0.1;
        let sigma = 0.1;
        Self::new(iv_min * iv_min - b * sigma, b, 0.0, k_min, sigma)
    }
}

/// Raw SVI evaluator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawSvi;

impl RawSvi {
    #[inline]
    pub fn variance(params: &SviParams, k: f64) -> f64 {
        let k_minus_m = k - params.m;
        let sqrt_term = (k_minus_m * k_minus_m + params.sigma * params.sigma).sqrt();
        params.a + params.b * (params.rho * k_minus_m + sqrt_term)
    }
}

impl SmileModel for RawSvi {
    fn parameterization(&self) -> SviParameterization {
        SviParameterization::Raw
    }

    fn total_variance(&self, params: &SviParams, k: f64) -> f64 {
        RawSvi::variance(params, k)
    }
}

static RAW_SVI: RawSvi = RawSvi;

/// Resolves the evaluator for a parameterization.
///
/// Fails with [`SurfaceError::UnsupportedParameterization`] for formulations that
/// have no closed-form implementation.
pub fn smile_model(parameterization: SviParameterization) -> Result<&'static dyn SmileModel> {
    match parameterization {
        SviParameterization::Raw => Ok(&RAW_SVI),
        SviParameterization::Natural | SviParameterization::JumpWing => {
            Err(SurfaceError::UnsupportedParameterization(parameterization))
        }
    }
}
