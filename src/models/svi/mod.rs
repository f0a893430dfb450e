//! SVI smile model, per-maturity calibrator and the maturity-stitched surface.

pub mod svi_calibrator;
pub mod svi_model;
pub mod svi_surface;
