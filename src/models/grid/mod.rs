//! Non-parametric grid surface with bilinear interpolation.

pub mod grid_surface;

pub use grid_surface::GridVolatilitySurface;
