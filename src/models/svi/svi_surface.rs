// src/models/svi/svi_surface.rs

//! Maturity-stitched SVI surface
//!
//! Holds one [`CalibratedSlice`] per maturity, sorted ascending, and answers
//! implied volatility queries at any `(k, T)`:
//!
//! - `T` equal to a fitted maturity: that slice's value, no interpolation.
//! - `T1 < T < T2`: linear interpolation between the two bracketing slices, in
//!   implied vol by default (see [`MaturityInterpolation`]).
//! - `T` outside the fitted range: the boundary slice's value unchanged.
//!
//! Moneyness is never interpolated: every value comes from a slice's closed-form
//! smile at the requested `k`.

use tracing::{debug, info};

use crate::calibration::config::SurfaceConfig;
use crate::calibration::types::Slice;
use crate::error::{Result, SurfaceError};
use crate::model_params::{MaturityInterpolation, SviParameterization};
use crate::models::svi::svi_calibrator::{calibrate_slice, CalibratedSlice};
use crate::models::svi::svi_model::SviParams;
use crate::models::utils::interp_weight;

/// Where a query maturity falls relative to the fitted slices.
enum Bracket<'a> {
    Exact(&'a CalibratedSlice),
    Between(&'a CalibratedSlice, &'a CalibratedSlice),
    Flat(&'a CalibratedSlice),
}

/// Represents the full SVI volatility surface across multiple maturities.
///
/// Fitting is write-once per maturity; after fitting the surface is read-only and
/// can be shared across threads. Concurrent fitting into one surface must be
/// serialized by the caller.
#[derive(Debug, Clone, Default)]
pub struct SviSurface {
    config: SurfaceConfig,
    // Sorted by maturity, no duplicates
    slices: Vec<CalibratedSlice>,
}

impl SviSurface {
    pub fn new(config: SurfaceConfig) -> Self {
        Self {
            config,
            slices: Vec::new(),
        }
    }

    pub fn with_parameterization(parameterization: SviParameterization) -> Self {
        Self::new(SurfaceConfig::new(parameterization))
    }

    /// Builds a surface from slices that were calibrated elsewhere, e.g. in parallel
    /// via [`SviSurface::fit_slice`].
    pub fn from_calibrated(
        config: SurfaceConfig,
        calibrated: impl IntoIterator<Item = CalibratedSlice>,
    ) -> Result<Self> {
        let mut surface = Self::new(config);
        for slice in calibrated {
            surface.insert(slice)?;
        }
        Ok(surface)
    }

    pub fn config(&self) -> &SurfaceConfig {
        &self.config
    }

    pub fn parameterization(&self) -> SviParameterization {
        self.config.parameterization
    }

    pub fn is_fitted(&self) -> bool {
        !self.slices.is_empty()
    }

    pub fn maturities(&self) -> Vec<f64> {
        self.slices.iter().map(CalibratedSlice::maturity).collect()
    }

    pub fn slices(&self) -> &[CalibratedSlice] {
        &self.slices
    }

    /// Slice fitted at exactly `maturity`, if any.
    pub fn slice(&self, maturity: f64) -> Option<&CalibratedSlice> {
        self.slices.iter().find(|s| s.maturity() == maturity)
    }

    /// `(T, params)` for every fitted maturity, ascending.
    pub fn fitted_params(&self) -> Vec<(f64, SviParams)> {
        self.slices
            .iter()
            .map(|s| (s.maturity(), *s.params()))
            .collect()
    }

    /// Calibrates one maturity with the surface's configuration without storing it.
    ///
    /// This is the unit of parallel work: slices share no state, so callers may fan
    /// out over maturities and [`insert`](Self::insert) the results afterwards.
    pub fn fit_slice(&self, slice: &Slice) -> Result<CalibratedSlice> {
        let guess = self.config.initial_guess.unwrap_or_else(|| {
            SviParams::heuristic_guess(slice.log_moneyness(), slice.implied_vols())
        });
        calibrate_slice(
            slice,
            self.config.parameterization,
            &self.config.bounds,
            &self.config.optimization,
            &guess,
        )
        .map_err(|source| SurfaceError::SliceCalibration {
            maturity: slice.maturity(),
            source: Box::new(source),
        })
    }

    /// Stores a calibrated slice, keeping maturities sorted and unique.
    pub fn insert(&mut self, calibrated: CalibratedSlice) -> Result<()> {
        let t = calibrated.maturity();
        let idx = self.slices.partition_point(|s| s.maturity() < t);
        if self.slices.get(idx).is_some_and(|s| s.maturity() == t) {
            return Err(SurfaceError::DuplicateMaturity { maturity: t });
        }
        self.slices.insert(idx, calibrated);
        Ok(())
    }

    /// Fits every slice and adds them to the surface.
    ///
    /// All-or-nothing: if any maturity fails, the error names it and the surface is
    /// left exactly as it was.
    pub fn fit(&mut self, market_data: &[Slice]) -> Result<()> {
        for (i, slice) in market_data.iter().enumerate() {
            let t = slice.maturity();
            let repeated = market_data[..i].iter().any(|s| s.maturity() == t);
            if repeated || self.slice(t).is_some() {
                return Err(SurfaceError::DuplicateMaturity { maturity: t });
            }
        }

        let fitted = market_data
            .iter()
            .map(|slice| self.fit_slice(slice))
            .collect::<Result<Vec<_>>>()?;

        for calibrated in fitted {
            debug!(
                maturity = calibrated.maturity(),
                rmse = calibrated.report().rmse,
                status = ?calibrated.report().status,
                "slice fitted"
            );
            self.insert(calibrated)?;
        }
        info!(
            slices = self.slices.len(),
            parameterization = %self.config.parameterization,
            "SVI surface fitted"
        );
        Ok(())
    }

    fn bracket(&self, t: f64) -> Result<Bracket<'_>> {
        if !t.is_finite() {
            return Err(SurfaceError::invalid(format!(
                "query maturity must be finite, got {}",
                t
            )));
        }
        let (first, last) = match (self.slices.first(), self.slices.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(SurfaceError::NotFitted { what: "SVI surface" }),
        };

        if let Some(exact) = self.slice(t) {
            return Ok(Bracket::Exact(exact));
        }
        if t < first.maturity() {
            return Ok(Bracket::Flat(first));
        }
        if t > last.maturity() {
            return Ok(Bracket::Flat(last));
        }
        let idx = self.slices.partition_point(|s| s.maturity() < t);
        Ok(Bracket::Between(&self.slices[idx - 1], &self.slices[idx]))
    }

    fn interpolate(&self, lo: &CalibratedSlice, hi: &CalibratedSlice, k: f64, t: f64) -> f64 {
        let (t1, t2) = (lo.maturity(), hi.maturity());
        let weight = interp_weight(t1, t2, t);
        let (iv1, iv2) = (lo.evaluate(k), hi.evaluate(k));
        match self.config.interpolation {
            MaturityInterpolation::LinearVol => (1.0 - weight) * iv1 + weight * iv2,
            MaturityInterpolation::LinearTotalVariance => {
                let w = (1.0 - weight) * iv1 * iv1 * t1 + weight * iv2 * iv2 * t2;
                (w / t).sqrt()
            }
        }
    }

    /// Implied volatility at log-moneyness `k` and maturity `t`.
    ///
    /// # Errors
    ///
    /// [`SurfaceError::NotFitted`] before any slice has been fitted,
    /// [`SurfaceError::InvalidInput`] for a non-finite `k` or `t`.
    pub fn evaluate(&self, k: f64, t: f64) -> Result<f64> {
        if !k.is_finite() {
            return Err(SurfaceError::invalid(format!(
                "log-moneyness must be finite, got {}",
                k
            )));
        }
        Ok(match self.bracket(t)? {
            Bracket::Exact(slice) | Bracket::Flat(slice) => slice.evaluate(k),
            Bracket::Between(lo, hi) => self.interpolate(lo, hi, k, t),
        })
    }

    /// Vector form of [`evaluate`](Self::evaluate) at a single maturity.
    pub fn evaluate_many(&self, ks: &[f64], t: f64) -> Result<Vec<f64>> {
        if let Some(k) = ks.iter().find(|k| !k.is_finite()) {
            return Err(SurfaceError::invalid(format!(
                "log-moneyness must be finite, got {}",
                k
            )));
        }
        Ok(match self.bracket(t)? {
            Bracket::Exact(slice) | Bracket::Flat(slice) => slice.evaluate_many(ks),
            Bracket::Between(lo, hi) => ks
                .iter()
                .map(|&k| self.interpolate(lo, hi, k, t))
                .collect(),
        })
    }

    /// Implied variance `σ(k, T)²`.
    pub fn implied_variance(&self, k: f64, t: f64) -> Result<f64> {
        self.evaluate(k, t).map(|v| v * v)
    }

    /// Total implied variance `σ(k, T)²·T`.
    pub fn total_variance(&self, k: f64, t: f64) -> Result<f64> {
        self.implied_variance(k, t).map(|v| v * t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::config::OptimizationConfig;
    use crate::models::svi::svi_calibrator::SviParamBounds;
    use crate::models::svi::svi_model::RawSvi;

    fn slice_from(params: &SviParams, t: f64) -> Slice {
        let k: Vec<f64> = (0..9).map(|i| -0.4 + 0.1 * i as f64).collect();
        let iv = k.iter().map(|&k| RawSvi::variance(params, k).sqrt()).collect();
        Slice::new(t, k, iv).unwrap()
    }

    fn fitted_surface(interpolation: MaturityInterpolation) -> SviSurface {
        let short = SviParams::new(0.03, 0.2, -0.5, 0.0, 0.15);
        let long = SviParams::new(0.05, 0.1, -0.3, 0.05, 0.3);
        let config = SurfaceConfig::default()
            .with_interpolation(interpolation)
            .with_optimization(OptimizationConfig::fast());
        let mut surface = SviSurface::new(config);
        surface
            .fit(&[slice_from(&long, 1.0), slice_from(&short, 0.25)])
            .unwrap();
        surface
    }

    #[test]
    fn evaluate_before_fit_fails() {
        let surface = SviSurface::default();
        assert!(!surface.is_fitted());
        assert!(matches!(
            surface.evaluate(0.0, 0.5),
            Err(SurfaceError::NotFitted { .. })
        ));
        assert!(matches!(
            surface.evaluate_many(&[0.0], 0.5),
            Err(SurfaceError::NotFitted { .. })
        ));
    }

    #[test]
    fn maturities_are_sorted() {
        let surface = fitted_surface(MaturityInterpolation::LinearVol);
        assert_eq!(surface.maturities(), vec![0.25, 1.0]);
        assert_eq!(surface.fitted_params().len(), 2);
    }

    #[test]
    fn exact_maturity_is_bitwise_slice_value() {
        let surface = fitted_surface(MaturityInterpolation::LinearVol);
        let slice = surface.slice(0.25).unwrap();
        for k in [-0.7, -0.2, 0.0, 0.13, 0.9] {
            assert_eq!(surface.evaluate(k, 0.25).unwrap(), slice.evaluate(k));
        }
    }

    #[test]
    fn linear_vol_between_maturities() {
        let surface = fitted_surface(MaturityInterpolation::LinearVol);
        let k = -0.1;
        let iv1 = surface.evaluate(k, 0.25).unwrap();
        let iv2 = surface.evaluate(k, 1.0).unwrap();
        let t = 0.4;
        let w = (t - 0.25) / (1.0 - 0.25);
        let expected = (1.0 - w) * iv1 + w * iv2;
        assert!((surface.evaluate(k, t).unwrap() - expected).abs() < 1e-15);
    }

    #[test]
    fn flat_extrapolation_outside_range() {
        let surface = fitted_surface(MaturityInterpolation::LinearVol);
        let k = 0.05;
        let short = surface.slice(0.25).unwrap().evaluate(k);
        let long = surface.slice(1.0).unwrap().evaluate(k);
        for t in [1e-6, 0.1, 0.2499] {
            assert_eq!(surface.evaluate(k, t).unwrap(), short);
        }
        for t in [1.0001, 3.0, 100.0] {
            assert_eq!(surface.evaluate(k, t).unwrap(), long);
        }
    }

    #[test]
    fn total_variance_mode_interpolates_w() {
        let surface = fitted_surface(MaturityInterpolation::LinearTotalVariance);
        let k = 0.0;
        let iv1 = surface.evaluate(k, 0.25).unwrap();
        let iv2 = surface.evaluate(k, 1.0).unwrap();
        let t = 0.5;
        let w = (t - 0.25) / 0.75;
        let total = (1.0 - w) * iv1 * iv1 * 0.25 + w * iv2 * iv2 * 1.0;
        let got = surface.total_variance(k, t).unwrap();
        assert!((got - total).abs() < 1e-14);
    }

    #[test]
    fn vector_and_scalar_queries_agree() {
        let surface = fitted_surface(MaturityInterpolation::LinearVol);
        let ks = [-0.3, 0.0, 0.2];
        for t in [0.1, 0.25, 0.6, 2.0] {
            let many = surface.evaluate_many(&ks, t).unwrap();
            for (k, v) in ks.iter().zip(many) {
                assert_eq!(v, surface.evaluate(*k, t).unwrap());
            }
        }
    }

    #[test]
    fn non_finite_queries_are_rejected() {
        let surface = fitted_surface(MaturityInterpolation::LinearVol);
        assert!(matches!(
            surface.evaluate(0.0, f64::NAN),
            Err(SurfaceError::InvalidInput { .. })
        ));
        assert!(matches!(
            surface.evaluate(f64::INFINITY, 0.5),
            Err(SurfaceError::InvalidInput { .. })
        ));
    }

    #[test]
    fn duplicate_maturity_is_rejected() {
        let mut surface = fitted_surface(MaturityInterpolation::LinearVol);
        let p = SviParams::new(0.04, 0.1, 0.0, 0.0, 0.2);
        let err = surface.fit(&[slice_from(&p, 0.25)]).unwrap_err();
        assert!(matches!(err, SurfaceError::DuplicateMaturity { .. }));

        let mut fresh = SviSurface::default();
        let err = fresh
            .fit(&[slice_from(&p, 0.5), slice_from(&p, 0.5)])
            .unwrap_err();
        assert!(matches!(err, SurfaceError::DuplicateMaturity { .. }));
        assert!(!fresh.is_fitted());
    }

    #[test]
    fn failed_fit_leaves_surface_unchanged() {
        let p = SviParams::new(0.04, 0.1, 0.0, 0.0, 0.2);
        let bad_bounds = SviParamBounds {
            sigma: (1.0, 0.5),
            ..SviParamBounds::default()
        };
        let mut surface = SviSurface::new(SurfaceConfig::default().with_bounds(bad_bounds));
        let err = surface
            .fit(&[slice_from(&p, 0.5), slice_from(&p, 1.0)])
            .unwrap_err();
        match err {
            SurfaceError::SliceCalibration { maturity, .. } => assert_eq!(maturity, 0.5),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!surface.is_fitted());
    }

    #[test]
    fn unsupported_parameterization_surfaces_on_fit() {
        let p = SviParams::new(0.04, 0.1, 0.0, 0.0, 0.2);
        let mut surface = SviSurface::with_parameterization(SviParameterization::JumpWing);
        let err = surface.fit(&[slice_from(&p, 0.5)]).unwrap_err();
        match err {
            SurfaceError::SliceCalibration { source, .. } => assert!(matches!(
                *source,
                SurfaceError::UnsupportedParameterization(SviParameterization::JumpWing)
            )),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn parallel_style_fit_matches_sequential() {
        let short = SviParams::new(0.03, 0.2, -0.5, 0.0, 0.15);
        let long = SviParams::new(0.05, 0.1, -0.3, 0.05, 0.3);
        let config = SurfaceConfig::default().with_optimization(OptimizationConfig::fast());
        let market = [slice_from(&short, 0.25), slice_from(&long, 1.0)];

        let mut sequential = SviSurface::new(config.clone());
        sequential.fit(&market).unwrap();

        let template = SviSurface::new(config.clone());
        let fitted: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = market
                .iter()
                .map(|slice| scope.spawn(|| template.fit_slice(slice)))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap().unwrap())
                .collect()
        });
        let parallel = SviSurface::from_calibrated(config, fitted).unwrap();

        assert_eq!(parallel.maturities(), sequential.maturities());
        for t in [0.25, 0.5, 1.0] {
            assert_eq!(
                parallel.evaluate(0.1, t).unwrap(),
                sequential.evaluate(0.1, t).unwrap()
            );
        }
    }
}
