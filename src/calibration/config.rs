use crate::model_params::{MaturityInterpolation, SviParameterization};
use crate::models::svi::svi_calibrator::SviParamBounds;
use crate::models::svi::svi_model::SviParams;

/// Settings for the bounded L-BFGS-B optimizer used on every slice
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct OptimizationConfig {
    /// Maximum L-BFGS-B iterations per slice
    pub max_iterations: usize,

    /// Projected-gradient (infinity norm) tolerance handed to the optimizer
    pub tolerance: f64,

    /// Absolute objective change between iterations that ends a run. Must sit
    /// well below the squared vol errors being fit.
    pub objective_tolerance: f64,

    /// Step length below which a run counts as stalled
    pub step_tolerance: f64,

    /// Number of curvature pairs kept by L-BFGS
    pub memory_size: usize,

    /// Floor on the finite-difference step, so parameters sitting at zero
    /// still get a usable gradient
    pub fd_min_step: f64,

    /// Iterations per L-BFGS-B run before it is resumed from its best point
    /// with fresh curvature memory
    pub resume_interval: usize,

    /// How many times a stalled or capped run may be resumed. Resumes share the
    /// `max_iterations` budget.
    pub max_resumes: usize,

    /// Emit a `trace!` event for every optimizer iteration
    pub trace_iterations: bool,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
            objective_tolerance: 0.0,
            step_tolerance: 1e-8,
            memory_size: 10,
            fd_min_step: 1e-8,
            resume_interval: 100,
            max_resumes: 50,
            trace_iterations: false,
        }
    }
}

impl OptimizationConfig {
    /// Default configuration for production calibration with high accuracy
    pub fn production() -> Self {
        Self {
            max_iterations: 1000,
            tolerance: 1e-10,
            trace_iterations: false,
            ..Self::default()
        }
    }

    /// Fast configuration for development and testing
    pub fn fast() -> Self {
        Self {
            max_iterations: 300,
            tolerance: 1e-8,
            trace_iterations: false,
            ..Self::default()
        }
    }

    /// High-precision configuration for research and backtesting
    pub fn research() -> Self {
        Self {
            max_iterations: 5000,
            tolerance: 1e-14,
            trace_iterations: true,
            ..Self::default()
        }
    }

    /// Minimal configuration for quick validation and debugging
    pub fn minimal() -> Self {
        Self {
            max_iterations: 50,
            tolerance: 1e-6,
            trace_iterations: false,
            ..Self::default()
        }
    }
}

fn default_max_iterations() -> usize {
    500
}

fn default_tolerance() -> f64 {
    1e-10
}

/// Named option set for building an [`SviSurface`](crate::SviSurface).
///
/// Every field has a default, so a TOML file only needs the keys it changes:
///
/// ```toml
/// parameterization = "RAW"
/// interpolation = "linear_vol"
///
/// [optimization]
/// max_iterations = 800
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SurfaceConfig {
    pub parameterization: SviParameterization,
    pub interpolation: MaturityInterpolation,
    pub bounds: SviParamBounds,
    pub optimization: OptimizationConfig,
    /// Shared starting point for every slice. `None` derives one per slice from
    /// its market points.
    pub initial_guess: Option<SviParams>,
}

impl SurfaceConfig {
    pub fn new(parameterization: SviParameterization) -> Self {
        Self {
            parameterization,
            ..Self::default()
        }
    }

    pub fn with_interpolation(mut self, interpolation: MaturityInterpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn with_optimization(mut self, optimization: OptimizationConfig) -> Self {
        self.optimization = optimization;
        self
    }

    pub fn with_initial_guess(mut self, guess: SviParams) -> Self {
        self.initial_guess = Some(guess);
        self
    }

    pub fn with_bounds(mut self, bounds: SviParamBounds) -> Self {
        self.bounds = bounds;
        self
    }
}

#[cfg(feature = "serde")]
impl SurfaceConfig {
    /// Parses a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        use anyhow::Context;
        toml::from_str(text).context("failed to parse surface configuration")
    }

    /// Loads a configuration from a TOML file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        use anyhow::Context;
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read surface configuration {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }
}
