// src/models/svi/svi_calibrator.rs

//! SVI slice calibrator
//!
//! Fits one maturity's smile by minimizing the mean squared difference between
//! model and market implied volatility, with every market point weighted equally.
//! The fit is a single bounded L-BFGS-B descent from the caller's initial guess:
//! no global search and no multi-start, so the result depends on the guess and may
//! be a local minimum. Whatever the optimizer returns is accepted; the attached
//! [`CalibrationReport`] lets callers gate on fit quality themselves.

use tracing::debug;

use crate::calibration::config::OptimizationConfig;
use crate::calibration::pipeline::calibrate_model;
use crate::calibration::types::{CalibrationReport, ModelCalibrator, Slice};
use crate::error::{Result, SurfaceError};
use crate::model_params::SviParameterization;
use crate::models::svi::svi_model::{smile_model, SviParams};
use crate::models::traits::SmileModel;

/// Objective value returned for parameter vectors that cannot be evaluated
const REJECTED_OBJECTIVE: f64 = 1.0e12;

/// Structure to hold parameter bounds for the SVI model calibration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SviParamBounds {
    /// Vertical shift parameter bounds
    pub a: (f64, f64),
    /// Slope factor bounds (strictly positive lower bound avoids a flat smile)
    pub b: (f64, f64),
    /// Asymmetry parameter bounds (kept away from ±1 to avoid vertical wings)
    pub rho: (f64, f64),
    /// Horizontal shift parameter bounds
    pub m: (f64, f64),
    /// Curvature parameter bounds (must be > 0)
    pub sigma: (f64, f64),
}

impl Default for SviParamBounds {
    fn default() -> Self {
        Self {
            a: (-1.0, 1.0),
            b: (1e-5, 10.0),
            rho: (-0.999, 0.999),
            m: (-5.0, 5.0),
            sigma: (1e-5, 5.0),
        }
    }
}

impl SviParamBounds {
    pub fn to_vec(&self) -> Vec<(f64, f64)> {
        vec![self.a, self.b, self.rho, self.m, self.sigma]
    }

    /// Checks that every lower bound is finite and below its upper bound.
    pub fn validate(&self) -> Result<()> {
        for (name, (lo, hi)) in ["a", "b", "rho", "m", "sigma"].iter().zip(self.to_vec()) {
            if !(lo.is_finite() && hi.is_finite() && lo < hi) {
                return Err(SurfaceError::invalid(format!(
                    "bounds for {} must be finite with lower < upper, got ({}, {})",
                    name, lo, hi
                )));
            }
        }
        Ok(())
    }
}

impl TryFrom<&[(f64, f64)]> for SviParamBounds {
    type Error = SurfaceError;

    /// Reads `[a, b, rho, m, sigma]` bounds in optimizer order.
    fn try_from(bounds: &[(f64, f64)]) -> Result<Self> {
        match *bounds {
            [a, b, rho, m, sigma] => Ok(Self { a, b, rho, m, sigma }),
            _ => Err(SurfaceError::invalid(format!(
                "SVI bounds need 5 (min, max) pairs, got {}",
                bounds.len()
            ))),
        }
    }
}

/// Mean-squared-error objective for one slice, as seen by the optimizer.
#[derive(Debug, Clone)]
pub struct SviSliceObjective<'a> {
    slice: &'a Slice,
    model: &'static dyn SmileModel,
    param_bounds: Vec<(f64, f64)>,
}

impl<'a> SviSliceObjective<'a> {
    pub fn new(
        slice: &'a Slice,
        parameterization: SviParameterization,
        bounds: &SviParamBounds,
    ) -> Result<Self> {
        bounds.validate()?;
        Ok(Self {
            slice,
            model: smile_model(parameterization)?,
            param_bounds: bounds.to_vec(),
        })
    }

    /// Mean of `(σ_model(k_i) − σ_market_i)²` over the slice.
    pub fn mse(&self, params: &SviParams) -> f64 {
        let k = self.slice.log_moneyness();
        let iv = self.slice.implied_vols();
        let sum: f64 = k
            .iter()
            .zip(iv.iter())
            .map(|(&k, &iv)| {
                let diff = self.model.implied_vol(params, k) - iv;
                diff * diff
            })
            .sum();
        sum / k.len() as f64
    }
}

impl ModelCalibrator for SviSliceObjective<'_> {
    fn model_name(&self) -> &str {
        "svi"
    }

    fn param_count(&self) -> usize {
        self.param_bounds.len()
    }

    fn param_bounds(&self) -> &[(f64, f64)] {
        &self.param_bounds
    }

    fn evaluate_objective(&self, x: &[f64]) -> f64 {
        let params = match SviParams::from_slice(x) {
            Ok(p) => p,
            Err(_) => return REJECTED_OBJECTIVE,
        };
        let obj = self.mse(&params);
        if obj.is_finite() {
            obj
        } else {
            REJECTED_OBJECTIVE
        }
    }

    fn param_names(&self) -> Vec<&str> {
        vec!["a", "b", "rho", "m", "sigma"]
    }
}

/// A market slice together with the parameters fitted to it.
///
/// Created once by a successful fit and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct CalibratedSlice {
    slice: Slice,
    params: SviParams,
    parameterization: SviParameterization,
    model: &'static dyn SmileModel,
    report: CalibrationReport,
}

impl CalibratedSlice {
    pub fn maturity(&self) -> f64 {
        self.slice.maturity()
    }

    pub fn slice(&self) -> &Slice {
        &self.slice
    }

    pub fn params(&self) -> &SviParams {
        &self.params
    }

    pub fn parameterization(&self) -> SviParameterization {
        self.parameterization
    }

    pub fn report(&self) -> &CalibrationReport {
        &self.report
    }

    /// Implied vol at log-moneyness `k` from the fitted parameters.
    ///
    /// Outside the quoted moneyness range this is the closed-form model's own
    /// extrapolation.
    pub fn evaluate(&self, k: f64) -> f64 {
        self.model.implied_vol(&self.params, k)
    }

    pub fn evaluate_many(&self, ks: &[f64]) -> Vec<f64> {
        self.model.implied_vols(&self.params, ks)
    }

    /// Smile variance `w(k)` before the floor is applied.
    pub fn total_variance(&self, k: f64) -> f64 {
        self.model.total_variance(&self.params, k)
    }

    /// Model minus market vol at each quoted point.
    pub fn residuals(&self) -> Vec<f64> {
        self.slice
            .log_moneyness()
            .iter()
            .zip(self.slice.implied_vols().iter())
            .map(|(&k, &iv)| self.evaluate(k) - iv)
            .collect()
    }
}

/// Fits one slice. Stateless, so independent maturities can be fitted in parallel.
pub fn calibrate_slice(
    slice: &Slice,
    parameterization: SviParameterization,
    bounds: &SviParamBounds,
    config: &OptimizationConfig,
    initial_guess: &SviParams,
) -> Result<CalibratedSlice> {
    let objective = SviSliceObjective::new(slice, parameterization, bounds)?;
    debug!(
        maturity = slice.maturity(),
        points = slice.len(),
        %parameterization,
        "calibrating SVI slice"
    );

    let outcome = calibrate_model(&objective, config, &initial_guess.to_vec())?;
    let params = SviParams::from_slice(&outcome.params)?;

    Ok(CalibratedSlice {
        slice: slice.clone(),
        params,
        parameterization,
        model: objective.model,
        report: outcome.report,
    })
}

/// Loss value for fixed parameters, identical to what the optimizer minimizes.
pub fn evaluate_svi(
    slice: &Slice,
    parameterization: SviParameterization,
    params: &SviParams,
) -> Result<f64> {
    let objective =
        SviSliceObjective::new(slice, parameterization, &SviParamBounds::default())?;
    Ok(objective.mse(params))
}

/// Fit state of a [`SliceCalibrator`].
#[derive(Debug, Clone, Default)]
pub enum SliceFit {
    #[default]
    Unfitted,
    Fitted(CalibratedSlice),
}

/// Calibrator for one maturity with an explicit Unfitted → Fitted lifecycle.
#[derive(Debug, Clone)]
pub struct SliceCalibrator {
    parameterization: SviParameterization,
    initial_guess: SviParams,
    bounds: SviParamBounds,
    config: OptimizationConfig,
    state: SliceFit,
}

impl SliceCalibrator {
    pub fn new(parameterization: SviParameterization, initial_guess: SviParams) -> Self {
        Self {
            parameterization,
            initial_guess,
            bounds: SviParamBounds::default(),
            config: OptimizationConfig::default(),
            state: SliceFit::Unfitted,
        }
    }

    pub fn with_bounds(mut self, bounds: SviParamBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_config(mut self, config: OptimizationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn parameterization(&self) -> SviParameterization {
        self.parameterization
    }

    pub fn state(&self) -> &SliceFit {
        &self.state
    }

    pub fn is_fitted(&self) -> bool {
        matches!(self.state, SliceFit::Fitted(_))
    }

    /// Fits the slice and stores the result. A failed fit leaves the previous state.
    pub fn fit(&mut self, slice: &Slice) -> Result<&CalibratedSlice> {
        let calibrated = calibrate_slice(
            slice,
            self.parameterization,
            &self.bounds,
            &self.config,
            &self.initial_guess,
        )?;
        self.state = SliceFit::Fitted(calibrated);
        self.calibrated()
    }

    pub fn calibrated(&self) -> Result<&CalibratedSlice> {
        match &self.state {
            SliceFit::Fitted(c) => Ok(c),
            SliceFit::Unfitted => Err(SurfaceError::NotFitted {
                what: "SVI slice calibrator",
            }),
        }
    }

    pub fn optimal_params(&self) -> Result<&SviParams> {
        self.calibrated().map(CalibratedSlice::params)
    }

    pub fn evaluate(&self, k: f64) -> Result<f64> {
        self.calibrated().map(|c| c.evaluate(k))
    }

    pub fn evaluate_many(&self, ks: &[f64]) -> Result<Vec<f64>> {
        self.calibrated().map(|c| c.evaluate_many(ks))
    }

    pub fn into_calibrated(self) -> Result<CalibratedSlice> {
        match self.state {
            SliceFit::Fitted(c) => Ok(c),
            SliceFit::Unfitted => Err(SurfaceError::NotFitted {
                what: "SVI slice calibrator",
            }),
        }
    }
}
