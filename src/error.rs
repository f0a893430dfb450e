//! Error types for surface construction and queries.
//!
//! Core operations return [`Result<T>`] so callers can tell a shape problem from a
//! query made before fitting, or from a point that falls outside a grid.

use thiserror::Error;

use crate::model_params::SviParameterization;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SurfaceError>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SurfaceError {
    /// Grid or matrix dimensions disagree at construction time.
    #[error("shape mismatch: {message}")]
    ShapeMismatch { message: String },

    /// A calibration-dependent object was queried before a successful fit.
    #[error("{what} has not been fitted yet")]
    NotFitted { what: &'static str },

    /// A grid query fell outside the explicit grid extent.
    #[error("{axis} {value} is outside the grid range [{min}, {max}]")]
    OutOfBounds {
        axis: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// The selected parameterization has no closed-form implementation.
    #[error("unsupported SVI parameterization: {0}")]
    UnsupportedParameterization(SviParameterization),

    /// The bounded optimizer reported a failure.
    #[error("optimizer failed: {message}")]
    Optimizer { message: String },

    /// One maturity of a surface fit failed.
    #[error("calibration of slice T={maturity} failed: {source}")]
    SliceCalibration {
        maturity: f64,
        #[source]
        source: Box<SurfaceError>,
    },

    /// Malformed caller input (length mismatch, non-finite values, ...).
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// A surface already holds a fit for this maturity.
    #[error("maturity {maturity} is already fitted")]
    DuplicateMaturity { maturity: f64 },
}

impl SurfaceError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        SurfaceError::InvalidInput {
            message: message.into(),
        }
    }

    pub(crate) fn shape(message: impl Into<String>) -> Self {
        SurfaceError::ShapeMismatch {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_calibration_keeps_source() {
        let err = SurfaceError::SliceCalibration {
            maturity: 0.5,
            source: Box::new(SurfaceError::UnsupportedParameterization(
                SviParameterization::Natural,
            )),
        };
        let msg = err.to_string();
        assert!(msg.contains("T=0.5"), "{msg}");
        assert!(msg.contains("NATURAL"), "{msg}");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn out_of_bounds_message_names_axis() {
        let err = SurfaceError::OutOfBounds {
            axis: "strike",
            value: 130.0,
            min: 90.0,
            max: 120.0,
        };
        assert_eq!(
            err.to_string(),
            "strike 130 is outside the grid range [90, 120]"
        );
    }
}
