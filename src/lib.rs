//! # svi-surface: SVI Implied Volatility Surface Construction
//!
//! `svi-surface` turns a discrete, noisy set of market implied volatilities into a
//! continuous implied-volatility surface that can be queried at any
//! `(log-moneyness, maturity)` point.
//!
//! ## Core Features
//!
//! - **SVI smile**: raw SVI `w(k) = a + b(ρ(k−m) + sqrt((k−m)² + σ²))` fitted per maturity
//!   by bounded L-BFGS-B on the mean squared implied-vol error
//! - **Surface stitching**: independently fitted smiles combined across maturity with
//!   linear interpolation between neighbours and flat extrapolation outside
//! - **Grid surface**: bilinear interpolation over an explicit strike × maturity grid,
//!   with no calibration involved
//! - **Market inputs**: forward log-moneyness, rate curves, ACT/ACT day counting and
//!   option chain grouping
//!
//! ## Quick Start
//!
//! ```rust
//! use svi_surface::{build_svi_surface, Slice, SurfaceConfig};
//!
//! let slices = vec![
//!     Slice::new(0.25, vec![-0.2, -0.1, 0.0, 0.1, 0.2], vec![0.30, 0.26, 0.24, 0.25, 0.27])?,
//!     Slice::new(1.0, vec![-0.2, -0.1, 0.0, 0.1, 0.2], vec![0.27, 0.24, 0.22, 0.23, 0.24])?,
//! ];
//!
//! let surface = build_svi_surface(&slices, SurfaceConfig::default())?;
//! let vol = surface.evaluate(0.05, 0.5)?;
//! assert!(vol > 0.0);
//! # Ok::<(), svi_surface::SurfaceError>(())
//! ```
//!
//! ## Implied Volatility Convention
//!
//! The fitted smile is read directly as `iv(k) = sqrt(max(w(k), 1e-10))`; `w` is not
//! divided by the maturity. Total variance in the usual sense is therefore `iv²·T`.
//!
//! ## Configuration Presets
//!
//! The library provides several optimization configuration presets:
//! - `production()`: High accuracy for live surface building
//! - `fast()`: Balanced speed/accuracy for development
//! - `research()`: High-precision settings with per-iteration tracing
//! - `minimal()`: Quick validation settings

// ================================================================================================
// MODULES
// ================================================================================================

pub mod calibration;
pub mod error;
pub mod market;
pub mod model_params;
pub mod models;

// ================================================================================================
// PUBLIC RE-EXPORTS
// ================================================================================================

pub use error::{Result, SurfaceError};

// Market data and configuration
pub use calibration::{
    config::{OptimizationConfig, SurfaceConfig},
    types::{CalibrationReport, ConvergenceStatus, Slice},
};
pub use market::{FlatRate, OptionQuote, RateCurve, RateProvider};

// SVI model types
pub use models::svi::{
    svi_calibrator::{
        calibrate_slice, evaluate_svi, CalibratedSlice, SliceCalibrator, SliceFit,
        SviParamBounds,
    },
    svi_model::{smile_model, RawSvi, SviParams},
    svi_surface::SviSurface,
};
pub use models::traits::SmileModel;

// Grid surface
pub use models::grid::GridVolatilitySurface;

// Model selection
pub use model_params::{MaturityInterpolation, SviParameterization};

// ================================================================================================
// DEFAULT CONFIGURATIONS
// ================================================================================================

/// Pre-configured optimization settings for common use cases.
///
/// # Available Configurations
///
/// - [`production()`]: Production-grade settings
/// - [`fast()`]: Development-optimized settings
/// - [`research()`]: High-precision settings for research
/// - [`minimal()`]: Quick validation settings
pub mod default_configs {
    use crate::calibration::config::OptimizationConfig;

    /// Production-grade configuration.
    ///
    /// **Characteristics:**
    /// - Maximum iterations: 1,000
    /// - Convergence tolerance: 1e-10
    ///
    /// # Example
    ///
    /// ```rust
    /// use svi_surface::default_configs;
    ///
    /// let config = default_configs::production();
    /// assert_eq!(config.max_iterations, 1000);
    /// ```
    pub fn production() -> OptimizationConfig {
        OptimizationConfig::production()
    }

    /// Fast configuration for development and testing.
    ///
    /// **Characteristics:**
    /// - Maximum iterations: 300
    /// - Convergence tolerance: 1e-8
    pub fn fast() -> OptimizationConfig {
        OptimizationConfig::fast()
    }

    /// High-precision configuration for research and backtesting.
    ///
    /// **Characteristics:**
    /// - Maximum iterations: 5,000
    /// - Convergence tolerance: 1e-14
    /// - Per-iteration objective traced at `TRACE` level
    pub fn research() -> OptimizationConfig {
        OptimizationConfig::research()
    }

    /// Minimal configuration for quick validation and debugging.
    ///
    /// **Characteristics:**
    /// - Maximum iterations: 50
    /// - Convergence tolerance: 1e-6
    pub fn minimal() -> OptimizationConfig {
        OptimizationConfig::minimal()
    }
}

/// Calibrate raw SVI parameters to a single maturity.
///
/// Runs one bounded L-BFGS-B descent on the mean squared error between
/// model-implied and market vols, starting from `initial_guess` or, if `None`,
/// from [`SviParams::heuristic_guess`] on the slice's own data.
///
/// # Errors
///
/// * [`SurfaceError::InvalidInput`] if `bounds` are inverted or non-finite
/// * [`SurfaceError::Optimizer`] if the optimizer itself fails
///
/// # Example
///
/// ```rust
/// use svi_surface::{calibrate_svi, default_configs, Slice, SviParamBounds};
///
/// let slice = Slice::new(0.5, vec![-0.1, 0.0, 0.1], vec![0.26, 0.24, 0.25])?;
/// let fitted = calibrate_svi(&slice, &default_configs::fast(), &SviParamBounds::default(), None)?;
/// println!("params: {:?}, rmse: {:.2e}", fitted.params(), fitted.report().rmse);
/// # Ok::<(), svi_surface::SurfaceError>(())
/// ```
pub fn calibrate_svi(
    slice: &Slice,
    config: &OptimizationConfig,
    bounds: &SviParamBounds,
    initial_guess: Option<SviParams>,
) -> Result<CalibratedSlice> {
    let guess = initial_guess.unwrap_or_else(|| {
        SviParams::heuristic_guess(slice.log_moneyness(), slice.implied_vols())
    });
    calibrate_slice(slice, SviParameterization::Raw, bounds, config, &guess)
}

/// Fit every slice and stitch them into a queryable surface.
///
/// All-or-nothing: the first maturity that fails to calibrate is returned as
/// [`SurfaceError::SliceCalibration`] and no surface is built.
pub fn build_svi_surface(slices: &[Slice], config: SurfaceConfig) -> Result<SviSurface> {
    let mut surface = SviSurface::new(config);
    surface.fit(slices)?;
    Ok(surface)
}
