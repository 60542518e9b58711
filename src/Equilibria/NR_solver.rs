//! Bounded damped Newton-Raphson root finder for square nonlinear systems.
//!
//! The solver only sees the [`NonlinearSystem`] contract: residual, Jacobian, optional
//! lower bounds of the unknowns and a scale for the relative step criterion. Iteration:
//! solve `J d = -F` (LU, SVD fallback), shorten the step so that bounded unknowns stay
//! strictly feasible (fraction-to-boundary rule), then backtrack until the Armijo condition
//! on `|F|^2` holds. Convergence requires both a small relative step and a small residual,
//! or a small residual that no step along the Newton direction decreases any more.
//! Failure to converge is reported in [`SolverStatus`] together with the best iterate.
use RustedSciThe::symbolic::symbolic_engine::Expr;
use log::{debug, warn};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::fmt;

pub trait NonlinearSystem {
    fn dimension(&self) -> usize;
    fn residual(&self, x: &DVector<f64>) -> DVector<f64>;
    /// forward-difference Jacobian unless the system provides an analytic one
    fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64> {
        let n = self.dimension();
        let f0 = self.residual(x);
        let mut jac = DMatrix::zeros(f0.len(), n);
        for j in 0..n {
            let h = f64::EPSILON.sqrt() * x[j].abs().max(1.0);
            let mut xh = x.clone();
            xh[j] += h;
            let fh = self.residual(&xh);
            for i in 0..f0.len() {
                jac[(i, j)] = (fh[i] - f0[i]) / h;
            }
        }
        jac
    }
    fn lower_bounds(&self) -> Option<DVector<f64>> {
        None
    }
    fn step_scale(&self, x: &DVector<f64>) -> DVector<f64> {
        x.abs()
    }
    /// closed-form residuals and the names of the unknowns in the order of `x`
    fn equations(&self) -> Option<(Vec<Expr>, Vec<String>)> {
        None
    }
}

pub trait RootFinder {
    fn find_root(&self, system: &dyn NonlinearSystem, initial_guess: &DVector<f64>) -> RootResult;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverStatus {
    pub success: bool,
    pub iterations: usize,
    /// infinity norm of the residual at the returned iterate
    pub residual_norm: f64,
    /// largest relative change of an unknown in the last iteration
    pub last_step: f64,
    pub n_fev: usize,
    pub n_jev: usize,
    pub message: String,
}

impl fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "success = {}, iterations = {}, |F| = {:e}, last step = {:e}, fev = {}, jev = {} ({})",
            self.success,
            self.iterations,
            self.residual_norm,
            self.last_step,
            self.n_fev,
            self.n_jev,
            self.message
        )
    }
}

#[derive(Debug, Clone)]
pub struct RootResult {
    pub x: DVector<f64>,
    pub status: SolverStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LinearSolver {
    #[default]
    Lu,
    Inv,
    Svd,
}

pub(crate) fn inf_norm(v: &DVector<f64>) -> f64 {
    v.iter().fold(0.0, |acc, x| acc.max(x.abs()))
}

pub(crate) fn all_finite(v: &DVector<f64>) -> bool {
    v.iter().all(|x| x.is_finite())
}

fn solve_svd(a: &DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = a.clone().svd(true, true);
    let eps = svd.singular_values.max() * f64::EPSILON * a.nrows().max(a.ncols()) as f64;
    svd.solve(b, eps).ok().filter(all_finite)
}

/// solves `a x = b`; singular or badly scaled LU systems fall back to SVD least squares
pub fn solve_linear_system(method: LinearSolver, a: &DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    let direct = match method {
        LinearSolver::Lu => a.clone().lu().solve(b),
        LinearSolver::Inv => a.clone().try_inverse().map(|inv| inv * b),
        LinearSolver::Svd => None,
    };
    match direct.filter(all_finite) {
        Some(x) => Some(x),
        None => {
            if method != LinearSolver::Svd {
                debug!("direct linear solve failed, falling back to SVD");
            }
            solve_svd(a, b)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewtonRaphson {
    /// relative step tolerance
    pub tolerance: f64,
    /// residual tolerance (infinity norm)
    pub residual_tolerance: f64,
    pub max_iterations: usize,
    /// first trial step length of every iteration
    pub dumping_factor: f64,
    /// fraction of the distance to a lower bound a single step may cover
    pub boundary_fraction: f64,
    /// backtracking stops below this step length
    pub min_step: f64,
    pub linear_sys_method: LinearSolver,
}

impl Default for NewtonRaphson {
    fn default() -> Self {
        Self {
            tolerance: 1e-12,
            residual_tolerance: 1e-8,
            max_iterations: 200,
            dumping_factor: 1.0,
            boundary_fraction: 0.99,
            min_step: 1e-10,
            linear_sys_method: LinearSolver::Lu,
        }
    }
}

impl NewtonRaphson {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_solver_params(
        &mut self,
        tolerance: f64,
        residual_tolerance: f64,
        max_iterations: usize,
        dumping_factor: f64,
    ) {
        self.tolerance = tolerance;
        self.residual_tolerance = residual_tolerance;
        self.max_iterations = max_iterations;
        self.dumping_factor = dumping_factor;
    }

    /// largest step length along `direction` keeping every bounded unknown strictly inside
    fn boundary_step(&self, x: &DVector<f64>, direction: &DVector<f64>, bounds: &Option<DVector<f64>>) -> f64 {
        let mut alpha = self.dumping_factor;
        if let Some(lb) = bounds {
            for j in 0..x.len() {
                if direction[j] < 0.0 {
                    alpha = alpha.min(-self.boundary_fraction * (x[j] - lb[j]) / direction[j]);
                }
            }
        }
        alpha.max(0.0)
    }
}

impl RootFinder for NewtonRaphson {
    fn find_root(&self, system: &dyn NonlinearSystem, initial_guess: &DVector<f64>) -> RootResult {
        let bounds = system.lower_bounds();
        let mut x = initial_guess.clone();
        let mut f = system.residual(&x);
        let mut status = SolverStatus {
            success: false,
            iterations: 0,
            residual_norm: inf_norm(&f),
            last_step: f64::INFINITY,
            n_fev: 1,
            n_jev: 0,
            message: String::new(),
        };
        if !all_finite(&f) {
            status.message = "residual is not finite at the initial guess".to_string();
            warn!("{}", status.message);
            return RootResult { x, status };
        }
        let mut best = (x.clone(), status.residual_norm);

        for i in 1..=self.max_iterations {
            status.iterations = i;
            let jac = system.jacobian(&x);
            status.n_jev += 1;
            let rhs = -&f;
            let Some(direction) = solve_linear_system(self.linear_sys_method, &jac, &rhs) else {
                status.message = format!("linear system could not be solved at iteration {}", i);
                break;
            };

            let phi0 = f.norm_squared();
            let mut alpha = self.boundary_step(&x, &direction, &bounds);
            let mut sufficient_decrease = false;
            let (x_new, f_new) = loop {
                let trial = &x + &direction * alpha;
                let f_trial = system.residual(&trial);
                status.n_fev += 1;
                if all_finite(&f_trial) && f_trial.norm_squared() <= (1.0 - 1e-4 * alpha) * phi0 {
                    sufficient_decrease = true;
                    break (trial, f_trial);
                }
                if alpha < self.min_step {
                    break (trial, f_trial);
                }
                alpha *= 0.5;
            };
            if !sufficient_decrease && status.residual_norm <= self.residual_tolerance {
                // the residual is at rounding level, no step can decrease it further
                status.success = true;
                status.message = format!("residual cannot be decreased further after {} iterations", i);
                return RootResult { x, status };
            }
            if !all_finite(&f_new) {
                status.message = format!("residual became non-finite at iteration {}", i);
                break;
            }

            let scale = system.step_scale(&x);
            status.last_step = (0..x.len())
                .map(|j| (alpha * direction[j]).abs() / scale[j].max(f64::MIN_POSITIVE))
                .fold(0.0, f64::max);
            x = x_new;
            f = f_new;
            status.residual_norm = inf_norm(&f);
            if status.residual_norm < best.1 {
                best = (x.clone(), status.residual_norm);
            }
            debug!(
                "iteration = {}, step length = {:e}, relative step = {:e}, |F| = {:e}",
                i, alpha, status.last_step, status.residual_norm
            );
            if status.last_step <= self.tolerance && status.residual_norm <= self.residual_tolerance {
                status.success = true;
                status.message = format!("converged in {} iterations", i);
                return RootResult { x, status };
            }
        }

        if status.message.is_empty() {
            status.message = format!("maximum number of iterations ({}) reached", self.max_iterations);
        }
        warn!("Newton-Raphson did not converge: {}", status.message);
        status.residual_norm = best.1;
        RootResult { x: best.0, status }
    }
}
