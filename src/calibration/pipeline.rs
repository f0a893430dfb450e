use std::sync::atomic::{AtomicUsize, Ordering};

use cmaes_lbfgsb::lbfgsb_optimize::{lbfgsb_optimize, LbfgsbConfig};
use tracing::{debug, trace, warn};

use crate::calibration::config::OptimizationConfig;
use crate::calibration::types::{CalibrationReport, ConvergenceStatus, ModelCalibrator};
use crate::error::{Result, SurfaceError};

/// Relative distance to a bound below which a parameter counts as pinned.
const BOUND_PROXIMITY: f64 = 1e-6;

/// Best parameters and diagnostics from one bounded local minimization.
#[derive(Debug, Clone)]
pub struct CalibrationOutcome {
    pub params: Vec<f64>,
    pub report: CalibrationReport,
}

/// Clamps a starting point into the optimizer's bound box.
pub fn clamp_to_bounds(x: &[f64], bounds: &[(f64, f64)]) -> Vec<f64> {
    x.iter()
        .zip(bounds.iter())
        .map(|(&v, &(lo, hi))| if v.is_finite() { v.clamp(lo, hi) } else { 0.5 * (lo + hi) })
        .collect()
}

/// Relative objective improvement a resumed run must achieve to be resumed again.
const RESUME_IMPROVEMENT: f64 = 1e-9;

fn lbfgsb_config(config: &OptimizationConfig) -> LbfgsbConfig {
    LbfgsbConfig {
        memory_size: config.memory_size.max(1),
        obj_tol: config.objective_tolerance,
        step_size_tol: config.step_tolerance,
        fd_min_step: config.fd_min_step,
        ..LbfgsbConfig::default()
    }
}

/// Bounded L-BFGS-B descent on `model`'s objective from `initial_guess`.
///
/// There is no global search and no multi-start: the result is a local minimum
/// near the starting point. When a run stalls or uses up its
/// [`OptimizationConfig::resume_interval`], the descent is resumed from its best
/// point with empty curvature memory, up to [`OptimizationConfig::max_resumes`]
/// times and within the shared `max_iterations` budget. A normal return from the optimizer is always
/// accepted; the [`ConvergenceStatus`] only records whether a bound ended up
/// active. If the optimizer never improves on the start, the start is returned.
///
/// # Errors
///
/// [`SurfaceError::InvalidInput`] if the guess has the wrong length,
/// [`SurfaceError::Optimizer`] if L-BFGS-B itself fails or the objective is not finite.
pub fn calibrate_model(
    model: &dyn ModelCalibrator,
    config: &OptimizationConfig,
    initial_guess: &[f64],
) -> Result<CalibrationOutcome> {
    let bounds = model.param_bounds();
    if initial_guess.len() != model.param_count() || bounds.len() != model.param_count() {
        return Err(SurfaceError::invalid(format!(
            "{} expects {} parameters, initial guess has {}",
            model.model_name(),
            model.param_count(),
            initial_guess.len()
        )));
    }

    let evaluations = AtomicUsize::new(0);
    let obj_fn = |x: &[f64]| {
        evaluations.fetch_add(1, Ordering::Relaxed);
        model.evaluate_objective(x)
    };

    let start = clamp_to_bounds(initial_guess, bounds);
    let start_obj = obj_fn(&start);
    if !start_obj.is_finite() {
        return Err(SurfaceError::Optimizer {
            message: format!("objective is not finite at the starting point {:?}", start),
        });
    }
    debug!(
        model = model.model_name(),
        objective = start_obj,
        "starting L-BFGS-B from initial guess"
    );

    let trace_iterations = config.trace_iterations;
    let iterations = AtomicUsize::new(0);
    let (mut objective, mut params) = (start_obj, start);
    let mut runs = 0;

    while runs <= config.max_resumes {
        let used = iterations.load(Ordering::Relaxed);
        if used >= config.max_iterations {
            break;
        }
        runs += 1;

        let mut refined_solution = params.clone();
        let refine_res = lbfgsb_optimize(
            &mut refined_solution,
            bounds,
            &obj_fn,
            (config.max_iterations - used).min(config.resume_interval.max(1)),
            config.tolerance,
            Some(|_current_x: &[f64], current_obj: f64| {
                iterations.fetch_add(1, Ordering::Relaxed);
                if trace_iterations {
                    trace!(objective = current_obj, "L-BFGS-B iteration");
                }
            }),
            Some(lbfgsb_config(config)),
        );
        // Charge at least one iteration per run
        iterations.fetch_max(used + 1, Ordering::Relaxed);

        let (loc_obj, loc_sol) = match refine_res {
            Ok((_, loc_sol)) => (obj_fn(&loc_sol), loc_sol),
            Err(e) => {
                return Err(SurfaceError::Optimizer {
                    message: format!("L-BFGS-B failed: {:?}", e),
                })
            }
        };
        if !loc_obj.is_finite() || loc_obj >= objective {
            if runs == 1 && (loc_obj > objective || !loc_obj.is_finite()) {
                warn!(
                    model = model.model_name(),
                    start = start_obj,
                    returned = loc_obj,
                    "L-BFGS-B did not improve on the starting point, keeping it"
                );
            }
            break;
        }

        let improved_enough = loc_obj < objective * (1.0 - RESUME_IMPROVEMENT);
        objective = loc_obj;
        params = loc_sol;
        if !improved_enough {
            break;
        }
        trace!(
            model = model.model_name(),
            objective,
            run = runs,
            "resuming L-BFGS-B from best point"
        );
    }

    let names = model.param_names();
    let active_bounds: Vec<String> = params
        .iter()
        .zip(bounds.iter())
        .zip(names.iter())
        .filter(|((&v, &(lo, hi)), _)| {
            let tol = BOUND_PROXIMITY * (hi - lo).abs().max(1.0);
            (v - lo).abs() <= tol || (hi - v).abs() <= tol
        })
        .map(|(_, name)| (*name).to_string())
        .collect();
    let status = if active_bounds.is_empty() {
        ConvergenceStatus::Converged
    } else {
        debug!(
            model = model.model_name(),
            params = ?active_bounds,
            "parameters finished on a bound"
        );
        ConvergenceStatus::BoundActive
    };

    let evaluations = evaluations.load(Ordering::Relaxed);
    debug!(
        model = model.model_name(),
        objective,
        evaluations,
        runs,
        ?status,
        "calibration finished"
    );

    Ok(CalibrationOutcome {
        params,
        report: CalibrationReport {
            objective,
            rmse: objective.max(0.0).sqrt(),
            initial_objective: start_obj,
            evaluations,
            status,
            active_bounds,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Shifted quadratic bowl, minimum at `target`.
    struct Bowl {
        target: Vec<f64>,
        bounds: Vec<(f64, f64)>,
    }

    impl ModelCalibrator for Bowl {
        fn model_name(&self) -> &str {
            "bowl"
        }
        fn param_count(&self) -> usize {
            self.target.len()
        }
        fn param_bounds(&self) -> &[(f64, f64)] {
            &self.bounds
        }
        fn evaluate_objective(&self, x: &[f64]) -> f64 {
            x.iter()
                .zip(self.target.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum()
        }
        fn param_names(&self) -> Vec<&str> {
            vec!["x", "y"]
        }
    }

    #[test]
    fn clamp_projects_into_box() {
        let bounds = [(-1.0, 1.0), (0.0, 2.0), (0.0, 1.0)];
        assert_eq!(
            clamp_to_bounds(&[5.0, -3.0, f64::NAN], &bounds),
            vec![1.0, 0.0, 0.5]
        );
    }

    #[test]
    fn interior_minimum_is_found() {
        let bowl = Bowl {
            target: vec![0.3, -0.2],
            bounds: vec![(-1.0, 1.0), (-1.0, 1.0)],
        };
        let out = calibrate_model(&bowl, &OptimizationConfig::production(), &[0.9, 0.9]).unwrap();
        assert!((out.params[0] - 0.3).abs() < 1e-4, "{:?}", out.params);
        assert!((out.params[1] + 0.2).abs() < 1e-4, "{:?}", out.params);
        assert!(out.report.objective <= out.report.initial_objective);
        assert!(out.report.evaluations > 0);
    }

    #[test]
    fn minimum_outside_box_reports_active_bound() {
        let bowl = Bowl {
            target: vec![3.0, 0.0],
            bounds: vec![(-1.0, 1.0), (-1.0, 1.0)],
        };
        let out = calibrate_model(&bowl, &OptimizationConfig::production(), &[0.0, 0.5]).unwrap();
        assert!((out.params[0] - 1.0).abs() < 1e-6, "{:?}", out.params);
        assert_eq!(out.report.status, ConvergenceStatus::BoundActive);
        assert_eq!(out.report.active_bounds, vec!["x".to_string()]);
    }

    #[test]
    fn wrong_guess_length_is_rejected() {
        let bowl = Bowl {
            target: vec![0.0, 0.0],
            bounds: vec![(-1.0, 1.0), (-1.0, 1.0)],
        };
        let err = calibrate_model(&bowl, &OptimizationConfig::fast(), &[0.0]).unwrap_err();
        assert!(matches!(err, SurfaceError::InvalidInput { .. }));
    }
}
