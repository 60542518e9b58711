use super::NR_solver::{LinearSolver, NewtonRaphson, RootFinder};
use super::NumSys::NumSys;
use super::symbolic_NR::SymbolicNR;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// which root finder a solve call uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RootFinderKind {
    /// RustedSciThe Newton-Raphson on the symbolic residuals, bounded Newton if rejected
    #[default]
    Symbolic,
    /// bounded damped Newton-Raphson of this crate only
    Bounded,
}

/// Everything a solve call depends on besides the system and the initial composition.
/// Values of symbolic equilibrium constants travel here instead of being written into the
/// equilibria.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolveConfig {
    pub numsys: NumSys,
    pub root_finder: RootFinderKind,
    /// bring the equilibrium rows to reduced row echelon form (constants are combined)
    pub rref_equilibria: bool,
    /// bring the conservation law basis to reduced row echelon form
    pub rref_conservation: bool,
    pub params: HashMap<String, f64>,
    pub xtol: f64,
    pub ftol: f64,
    pub max_iterations: usize,
    pub damping_factor: f64,
    pub linear_solver: LinearSolver,
    /// initial guesses are raised to at least this value
    pub min_concentration: f64,
    pub sanity_rtol: f64,
    pub sanity_atol: f64,
}

impl Default for SolveConfig {
    fn default() -> Self {
        Self {
            numsys: NumSys::default(),
            root_finder: RootFinderKind::default(),
            rref_equilibria: false,
            rref_conservation: false,
            params: HashMap::new(),
            xtol: 1e-12,
            ftol: 1e-8,
            max_iterations: 200,
            damping_factor: 1.0,
            linear_solver: LinearSolver::Lu,
            min_concentration: 1e-20,
            sanity_rtol: 1e-6,
            sanity_atol: 1e-12,
        }
    }
}

impl SolveConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_numsys(mut self, numsys: NumSys) -> Self {
        self.numsys = numsys;
        self
    }

    pub fn with_root_finder(mut self, root_finder: RootFinderKind) -> Self {
        self.root_finder = root_finder;
        self
    }

    pub fn with_rref(mut self, rref_equilibria: bool, rref_conservation: bool) -> Self {
        self.rref_equilibria = rref_equilibria;
        self.rref_conservation = rref_conservation;
        self
    }

    pub fn with_param(mut self, name: &str, value: f64) -> Self {
        self.params.insert(name.to_string(), value);
        self
    }

    pub fn with_tolerances(mut self, xtol: f64, ftol: f64) -> Self {
        self.xtol = xtol;
        self.ftol = ftol;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn bounded_newton(&self) -> NewtonRaphson {
        let mut solver = NewtonRaphson::new();
        solver.set_solver_params(self.xtol, self.ftol, self.max_iterations, self.damping_factor);
        solver.linear_sys_method = self.linear_solver;
        solver
    }

    pub fn root_finder(&self) -> Box<dyn RootFinder> {
        match self.root_finder {
            RootFinderKind::Symbolic => {
                let mut solver = SymbolicNR::new().with_fallback(Some(self.bounded_newton()));
                solver.set_solver_params(self.xtol, self.ftol, self.max_iterations, self.damping_factor);
                Box::new(solver)
            }
            RootFinderKind::Bounded => Box::new(self.bounded_newton()),
        }
    }
}
