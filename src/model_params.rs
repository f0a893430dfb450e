//! Discriminators that select model behaviour without hard-coding it in the
//! calibrators: which SVI formulation to evaluate, and how the stitched surface
//! moves between fitted maturities.

use std::fmt;
use std::str::FromStr;

/// SVI formulation used to turn a 5-element parameter vector into total variance.
///
/// Only [`SviParameterization::Raw`] has a closed-form implementation. The other
/// variants are accepted in configuration but fail on first evaluation with
/// [`SurfaceError::UnsupportedParameterization`](crate::SurfaceError::UnsupportedParameterization).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum SviParameterization {
    /// Gatheral's raw form: `a + b(ρ(k−m) + sqrt((k−m)² + σ²))`.
    #[default]
    Raw,
    /// `(θ/2)(1 + ρφk + sqrt((φk+ρ)² + 1 − ρ²))`.
    Natural,
    /// ATM variance, skew and wing slopes `(v, ψ, p, c, ṽ)`.
    JumpWing,
}

impl fmt::Display for SviParameterization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SviParameterization::Raw => "RAW",
            SviParameterization::Natural => "NATURAL",
            SviParameterization::JumpWing => "JUMP_WING",
        };
        f.write_str(name)
    }
}

impl FromStr for SviParameterization {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "RAW" => Ok(SviParameterization::Raw),
            "NATURAL" => Ok(SviParameterization::Natural),
            "JUMP_WING" | "JUMPWING" => Ok(SviParameterization::JumpWing),
            other => Err(anyhow::anyhow!("unknown SVI parameterization: {}", other)),
        }
    }
}

/// How [`SviSurface`](crate::SviSurface) interpolates between two fitted maturities.
///
/// Outside the fitted range both methods extrapolate flat (the boundary slice is
/// returned unchanged).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MaturityInterpolation {
    /// Linear in implied volatility with weight `(T − T1) / (T2 − T1)`.
    /// Not calendar-spread consistent.
    #[default]
    LinearVol,
    /// Linear in total variance `σ²·T`, then converted back to volatility.
    LinearTotalVariance,
}
