//! Root finder backed by the Newton-Raphson solver of RustedSciThe. The system hands over
//! its residuals as symbolic expressions; RustedSciThe differentiates and lambdifies them
//! and iterates with damped Newton steps. The result is accepted only if it is finite, lies
//! inside the lower bounds of the unknowns and brings the residual below the tolerance.
//! RustedSciThe iterates without bounds and without a line search, so a rejected result
//! is handed over to the bounded [`NewtonRaphson`] of this crate, which restarts from the
//! initial guess.
use super::NR_solver::{
    LinearSolver, NewtonRaphson, NonlinearSystem, RootFinder, RootResult, SolverStatus,
    all_finite, inf_norm, solve_linear_system,
};
use RustedSciThe::numerical::Nonlinear_systems::NR::NR;
use log::{info, warn};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// why the result of RustedSciThe was not accepted
#[derive(Debug, Clone)]
struct Rejected {
    reason: String,
    iterations: usize,
    n_fev: usize,
}

impl Rejected {
    fn before_start(reason: &str) -> Self {
        Self {
            reason: reason.to_string(),
            iterations: 0,
            n_fev: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolicNR {
    /// bound on the norm of the last Newton step
    pub tolerance: f64,
    /// residual tolerance (infinity norm)
    pub residual_tolerance: f64,
    pub max_iterations: usize,
    pub damping_factor: f64,
    /// takes over when the result of RustedSciThe is rejected
    pub fallback: Option<NewtonRaphson>,
}

impl Default for SymbolicNR {
    fn default() -> Self {
        Self {
            tolerance: 1e-12,
            residual_tolerance: 1e-8,
            max_iterations: 200,
            damping_factor: 1.0,
            fallback: Some(NewtonRaphson::new()),
        }
    }
}

impl SymbolicNR {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_solver_params(
        &mut self,
        tolerance: f64,
        residual_tolerance: f64,
        max_iterations: usize,
        damping_factor: f64,
    ) {
        self.tolerance = tolerance;
        self.residual_tolerance = residual_tolerance;
        self.max_iterations = max_iterations;
        self.damping_factor = damping_factor;
    }

    pub fn with_fallback(mut self, fallback: Option<NewtonRaphson>) -> Self {
        self.fallback = fallback;
        self
    }

    fn run(&self, system: &dyn NonlinearSystem, initial_guess: &DVector<f64>) -> Result<RootResult, Rejected> {
        let (equations, unknowns) = system
            .equations()
            .ok_or_else(|| Rejected::before_start("the system has no closed-form residuals"))?;
        if equations.len() != unknowns.len() || unknowns.len() != initial_guess.len() || unknowns.is_empty() {
            return Err(Rejected::before_start("the system is not square"));
        }
        // RustedSciThe asserts on these instead of returning an error
        if self.max_iterations == 0 || !(self.damping_factor > 0.0 && self.damping_factor <= 1.0) {
            return Err(Rejected::before_start("solver parameters out of range"));
        }
        let f0 = system.residual(initial_guess);
        let j0 = system.jacobian(initial_guess);
        if !all_finite(&f0) || j0.iter().any(|x| !x.is_finite()) || j0.lu().solve(&f0).is_none() {
            return Err(Rejected::before_start(
                "the Jacobian is singular or not finite at the initial guess",
            ));
        }

        let mut solver = NR::new();
        solver.set_equation_system(
            equations,
            Some(unknowns),
            initial_guess.iter().copied().collect(),
            self.tolerance,
            self.max_iterations,
        );
        solver.set_solver_params(
            Some("warn".to_string()),
            None,
            Some(self.damping_factor),
            None,
            None,
            None,
        );
        solver.eq_generate();
        solver.solve();
        // the converging iteration is not counted by RustedSciThe
        let iterations = (solver.i + 1).min(self.max_iterations);
        let solution = solver.get_result().ok_or_else(|| Rejected {
            reason: format!("no convergence in {} iterations", self.max_iterations),
            iterations,
            n_fev: 1,
        })?;
        let x: Vec<f64> = solution.data.into();
        let x = DVector::from_vec(x);

        let f = system.residual(&x);
        let rejected = |reason: String| Rejected {
            reason,
            iterations,
            n_fev: 2,
        };
        if !all_finite(&x) || !all_finite(&f) {
            return Err(rejected("the result is not finite".to_string()));
        }
        if let Some(lb) = system.lower_bounds() {
            if x.iter().zip(lb.iter()).any(|(xj, l)| xj < l) {
                return Err(rejected("the result violates the lower bounds".to_string()));
            }
        }
        let residual_norm = inf_norm(&f);
        if residual_norm > self.residual_tolerance {
            return Err(rejected(format!("|F| = {:e} above tolerance", residual_norm)));
        }

        // size of the Newton step that is still left at the accepted root
        let jac = system.jacobian(&x);
        let scale = system.step_scale(&x);
        let last_step = solve_linear_system(LinearSolver::Lu, &jac, &-&f)
            .map(|d| {
                (0..d.len())
                    .map(|j| d[j].abs() / scale[j].max(f64::MIN_POSITIVE))
                    .fold(0.0, f64::max)
            })
            .unwrap_or(f64::INFINITY);
        Ok(RootResult {
            x,
            status: SolverStatus {
                success: true,
                iterations,
                residual_norm,
                last_step,
                n_fev: iterations + 2,
                n_jev: iterations + 2,
                message: format!("RustedSciThe NR converged in {} iterations", iterations),
            },
        })
    }
}

impl RootFinder for SymbolicNR {
    fn find_root(&self, system: &dyn NonlinearSystem, initial_guess: &DVector<f64>) -> RootResult {
        let rejected = match self.run(system, initial_guess) {
            Ok(result) => {
                info!("{}", result.status.message);
                return result;
            }
            Err(rejected) => rejected,
        };
        warn!("RustedSciThe NR result rejected: {}", rejected.reason);
        match &self.fallback {
            Some(fallback) => {
                let mut result = fallback.find_root(system, initial_guess);
                result.status.message = format!(
                    "{} (bounded Newton after RustedSciThe NR: {})",
                    result.status.message, rejected.reason
                );
                result
            }
            None => {
                let f = system.residual(initial_guess);
                RootResult {
                    x: initial_guess.clone(),
                    status: SolverStatus {
                        success: false,
                        iterations: rejected.iterations,
                        residual_norm: inf_norm(&f),
                        last_step: f64::INFINITY,
                        n_fev: rejected.n_fev + 1,
                        n_jev: rejected.iterations,
                        message: rejected.reason,
                    },
                }
            }
        }
    }
}
