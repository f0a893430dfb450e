//! Bilinear volatility surface over an explicit (strike × maturity) grid.
//!
//! No parametric model is involved: the surface is exactly the caller's grid, and
//! queries inside it are bilinear in the four surrounding nodes. Queries outside
//! the grid fail with [`SurfaceError::OutOfBounds`] unless a fill value has been
//! set; there is no extrapolation.

use std::fmt;

use crate::error::{Result, SurfaceError};
use crate::models::utils::interp_weight;

/// Volatility grid with `vols[i][j]` quoted at `(strikes[i], maturities[j])`.
///
/// Axes must be ascending and duplicate-free. They are not re-sorted; an unsorted
/// axis gives meaningless bracket searches rather than an error.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct GridVolatilitySurface {
    strikes: Vec<f64>,
    maturities: Vec<f64>,
    vols: Vec<Vec<f64>>,
    fill_value: Option<f64>,
}

impl GridVolatilitySurface {
    /// Builds the surface, checking the matrix has shape `(strikes, maturities)`.
    ///
    /// # Errors
    ///
    /// [`SurfaceError::ShapeMismatch`] if an axis is empty, the row count differs
    /// from the strike count, or any row length differs from the maturity count.
    pub fn new(strikes: Vec<f64>, maturities: Vec<f64>, vols: Vec<Vec<f64>>) -> Result<Self> {
        if strikes.is_empty() || maturities.is_empty() {
            return Err(SurfaceError::shape(format!(
                "grid axes must be non-empty, got {} strikes and {} maturities",
                strikes.len(),
                maturities.len()
            )));
        }
        if vols.len() != strikes.len() {
            return Err(SurfaceError::shape(format!(
                "vol matrix must have shape ({}, {}), got {} rows",
                strikes.len(),
                maturities.len(),
                vols.len()
            )));
        }
        if let Some((i, row)) = vols
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != maturities.len())
        {
            return Err(SurfaceError::shape(format!(
                "vol matrix must have shape ({}, {}), row {} has {} columns",
                strikes.len(),
                maturities.len(),
                i,
                row.len()
            )));
        }

        Ok(Self {
            strikes,
            maturities,
            vols,
            fill_value: None,
        })
    }

    /// Returns `fill_value` for queries outside the grid instead of failing.
    pub fn with_fill_value(mut self, fill_value: f64) -> Self {
        self.fill_value = Some(fill_value);
        self
    }

    pub fn strikes(&self) -> &[f64] {
        &self.strikes
    }

    pub fn maturities(&self) -> &[f64] {
        &self.maturities
    }

    pub fn vols(&self) -> &[Vec<f64>] {
        &self.vols
    }

    /// The stored grid, unmodified: `(strikes, maturities, vols)`.
    pub fn get_original_grid(&self) -> (&[f64], &[f64], &[Vec<f64>]) {
        (&self.strikes, &self.maturities, &self.vols)
    }

    /// Bilinearly interpolated volatility at `(strike, maturity)`.
    ///
    /// Grid boundaries are inclusive; a query on a node returns that node's value.
    pub fn get_vol(&self, strike: f64, maturity: f64) -> Result<f64> {
        let x = match locate(&self.strikes, strike, "strike") {
            Ok(cell) => cell,
            Err(err) => return self.fill_or(err),
        };
        let y = match locate(&self.maturities, maturity, "maturity") {
            Ok(cell) => cell,
            Err(err) => return self.fill_or(err),
        };

        let v00 = self.vols[x.lo][y.lo];
        let v10 = self.vols[x.hi][y.lo];
        let v01 = self.vols[x.lo][y.hi];
        let v11 = self.vols[x.hi][y.hi];

        Ok(v00 * (1.0 - x.weight) * (1.0 - y.weight)
            + v10 * x.weight * (1.0 - y.weight)
            + v01 * (1.0 - x.weight) * y.weight
            + v11 * x.weight * y.weight)
    }

    /// Batch form of [`get_vol`](Self::get_vol) with shape `(strikes, maturities)`.
    ///
    /// Any out-of-bounds point fails the whole call.
    pub fn get_vol_grid(&self, strikes: &[f64], maturities: &[f64]) -> Result<Vec<Vec<f64>>> {
        strikes
            .iter()
            .map(|&k| {
                maturities
                    .iter()
                    .map(|&t| self.get_vol(k, t))
                    .collect::<Result<Vec<_>>>()
            })
            .collect()
    }

    fn fill_or(&self, err: SurfaceError) -> Result<f64> {
        self.fill_value.ok_or(err)
    }
}

/// Bracketing cell along one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Cell {
    lo: usize,
    hi: usize,
    weight: f64,
}

/// Linear scan for the first `[xs[i], xs[i+1]]` containing `x`, boundaries inclusive.
fn locate(xs: &[f64], x: f64, axis: &'static str) -> Result<Cell> {
    let (min, max) = (xs[0], xs[xs.len() - 1]);
    let out_of_bounds = || SurfaceError::OutOfBounds {
        axis,
        value: x,
        min,
        max,
    };

    if xs.len() == 1 {
        return if x == min {
            Ok(Cell {
                lo: 0,
                hi: 0,
                weight: 0.0,
            })
        } else {
            Err(out_of_bounds())
        };
    }

    xs.windows(2)
        .position(|w| w[0] <= x && x <= w[1])
        .map(|i| Cell {
            lo: i,
            hi: i + 1,
            weight: interp_weight(xs[i], xs[i + 1], x),
        })
        .ok_or_else(out_of_bounds)
}

impl fmt::Display for GridVolatilitySurface {
    /// Tabular view: one row per strike, one column per maturity.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>10}", "strike")?;
        for t in &self.maturities {
            write!(f, " {:>10}", t)?;
        }
        writeln!(f)?;
        for (k, row) in self.strikes.iter().zip(self.vols.iter()) {
            write!(f, "{:>10}", k)?;
            for v in row {
                write!(f, " {:>10.4}", v)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
