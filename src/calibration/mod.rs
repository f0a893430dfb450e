pub mod config;
pub mod pipeline;
pub mod types;

// Re-export the optimizer entry point for easy access inside the library
pub use cmaes_lbfgsb::lbfgsb_optimize;
