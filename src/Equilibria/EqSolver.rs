//! Solve entry points: a single solve in one numerical formulation, a retry over several
//! formulations and a parallel sweep over the initial concentration of one species.
use super::EquilibriumSystem::EquilibriumSystem;
use super::NR_solver::{RootFinder, SolverStatus};
use super::NumSys::{NumSys, VariableTransform};
use super::errors::EquilibriumError;
use super::residual::EquilibriumResidual;
use super::sanity_check::SanityReport;
use super::solve_config::SolveConfig;
use log::{info, warn};
use nalgebra::DVector;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Equilibrium composition together with the solver status and the sanity diagnostics.
/// A solution is returned even if the root finder failed; check `is_success`/`is_sane`
/// or use `ensure_converged`/`ensure_sane`.
#[derive(Debug, Clone)]
pub struct Solution {
    species: Vec<String>,
    concentrations: DVector<f64>,
    initial: DVector<f64>,
    numsys: NumSys,
    rref_equilibria: bool,
    rref_conservation: bool,
    status: SolverStatus,
    sanity: SanityReport,
}

impl Solution {
    pub fn species(&self) -> &[String] {
        &self.species
    }
    pub fn concentrations(&self) -> &DVector<f64> {
        &self.concentrations
    }
    pub fn initial(&self) -> &DVector<f64> {
        &self.initial
    }
    pub fn numsys(&self) -> NumSys {
        self.numsys
    }
    pub fn rref_flags(&self) -> (bool, bool) {
        (self.rref_equilibria, self.rref_conservation)
    }
    pub fn status(&self) -> &SolverStatus {
        &self.status
    }
    pub fn sanity(&self) -> &SanityReport {
        &self.sanity
    }
    pub fn is_success(&self) -> bool {
        self.status.success
    }
    pub fn is_sane(&self) -> bool {
        self.sanity.is_sane()
    }

    pub fn get(&self, species: &str) -> Option<f64> {
        self.species
            .iter()
            .position(|s| s == species)
            .map(|i| self.concentrations[i])
    }

    /// -log10 of the concentration
    pub fn p_value(&self, species: &str) -> Option<f64> {
        self.get(species).map(|c| -c.log10())
    }

    pub fn to_map(&self) -> HashMap<String, f64> {
        self.species
            .iter()
            .cloned()
            .zip(self.concentrations.iter().copied())
            .collect()
    }

    pub fn ensure_converged(self) -> Result<Self, EquilibriumError> {
        if self.status.success {
            Ok(self)
        } else {
            Err(EquilibriumError::ConvergenceFailure(self.status.message.clone()))
        }
    }

    pub fn ensure_sane(self) -> Result<Self, EquilibriumError> {
        if self.sanity.is_sane() {
            Ok(self)
        } else {
            Err(EquilibriumError::SanityViolation(self.sanity.violations().join("; ")))
        }
    }
}

/// one combination of numerical formulation and row-reduction options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strategy {
    pub numsys: NumSys,
    pub rref_equilibria: bool,
    pub rref_conservation: bool,
}

impl Strategy {
    pub fn new(numsys: NumSys, rref_equilibria: bool, rref_conservation: bool) -> Self {
        Self {
            numsys,
            rref_equilibria,
            rref_conservation,
        }
    }

    /// every formulation without row reduction, then every formulation with both reductions
    pub fn defaults() -> Vec<Strategy> {
        [false, true]
            .into_iter()
            .flat_map(|rref| NumSys::all().into_iter().map(move |n| Strategy::new(n, rref, rref)))
            .collect()
    }

    fn apply(&self, config: &SolveConfig) -> SolveConfig {
        config
            .clone()
            .with_numsys(self.numsys)
            .with_rref(self.rref_equilibria, self.rref_conservation)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub strategy: Strategy,
    pub success: bool,
    pub sane: bool,
    pub iterations: usize,
    pub residual_norm: f64,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct RobustSolution {
    pub solution: Solution,
    pub attempts: Vec<Attempt>,
}

#[derive(Debug, Clone)]
pub struct SweepPoint {
    pub value: f64,
    pub success: bool,
    pub sane: bool,
    pub max_law_deviation: f64,
    pub iterations: usize,
    pub solution: Solution,
}

impl EquilibriumSystem {
    /// residual function for the given initial composition and options
    pub fn residual_function(
        &self,
        initial: &DVector<f64>,
        config: &SolveConfig,
    ) -> Result<EquilibriumResidual, EquilibriumError> {
        let rows = self.mass_action_rows(&config.params, config.rref_equilibria)?;
        let laws = self.conservation_laws(config.rref_conservation);
        EquilibriumResidual::new(config.numsys, &rows, &laws, initial)
    }

    /// solves starting from the initial concentrations
    pub fn solve(
        &self,
        initial: &HashMap<String, f64>,
        config: &SolveConfig,
    ) -> Result<Solution, EquilibriumError> {
        let c0 = self.concentration_vector(initial)?;
        let root_finder = config.root_finder();
        self.solve_with_root_finder(&c0, &c0, config, root_finder.as_ref())
    }

    /// solves with an explicit initial guess; the conserved totals still come from `initial`
    pub fn solve_from(
        &self,
        initial: &HashMap<String, f64>,
        guess: &HashMap<String, f64>,
        config: &SolveConfig,
    ) -> Result<Solution, EquilibriumError> {
        let c0 = self.concentration_vector(initial)?;
        let guess = self.concentration_vector(guess)?;
        let root_finder = config.root_finder();
        self.solve_with_root_finder(&c0, &guess, config, root_finder.as_ref())
    }

    pub fn solve_with_root_finder(
        &self,
        initial: &DVector<f64>,
        guess: &DVector<f64>,
        config: &SolveConfig,
        root_finder: &dyn RootFinder,
    ) -> Result<Solution, EquilibriumError> {
        if guess.len() != self.n_species() {
            return Err(EquilibriumError::DimensionMismatch {
                expected: self.n_species(),
                found: guess.len(),
            });
        }
        let residual = self.residual_function(initial, config)?;
        let y0 = config.numsys.to_unknowns(guess, config.min_concentration);
        info!(
            "solving {} species with {} formulation (rref equilibria: {}, rref conservation: {})",
            self.n_species(),
            config.numsys,
            config.rref_equilibria,
            config.rref_conservation
        );
        let result = root_finder.find_root(&residual, &y0);
        let concentrations = config.numsys.to_concentrations(&result.x);
        let sanity = SanityReport::check(
            self,
            initial,
            &concentrations,
            config.sanity_rtol,
            config.sanity_atol,
        );
        if result.status.success {
            info!("{}", result.status);
        } else {
            warn!("{}", result.status);
        }
        Ok(Solution {
            species: self.species_names().into_iter().map(String::from).collect(),
            concentrations,
            initial: initial.clone(),
            numsys: config.numsys,
            rref_equilibria: config.rref_equilibria,
            rref_conservation: config.rref_conservation,
            status: result.status,
            sanity,
        })
    }

    /// Tries the strategies in order and returns the first converged and sane solution.
    /// If none qualifies, the attempt with the smallest residual is returned. An empty
    /// strategy list means the options of `config` only.
    pub fn solve_robustly(
        &self,
        initial: &HashMap<String, f64>,
        config: &SolveConfig,
        strategies: &[Strategy],
    ) -> Result<RobustSolution, EquilibriumError> {
        let own = [Strategy::new(config.numsys, config.rref_equilibria, config.rref_conservation)];
        let strategies = if strategies.is_empty() { &own[..] } else { strategies };
        let mut attempts = Vec::with_capacity(strategies.len());
        let mut best: Option<Solution> = None;
        for strategy in strategies {
            let solution = self.solve(initial, &strategy.apply(config))?;
            attempts.push(Attempt {
                strategy: *strategy,
                success: solution.is_success(),
                sane: solution.is_sane(),
                iterations: solution.status.iterations,
                residual_norm: solution.status.residual_norm,
                message: solution.status.message.clone(),
            });
            if solution.is_success() && solution.is_sane() {
                return Ok(RobustSolution { solution, attempts });
            }
            let better = best
                .as_ref()
                .is_none_or(|b| solution.status.residual_norm < b.status.residual_norm);
            if better {
                best = Some(solution);
            }
        }
        warn!("no strategy produced a converged and sane solution");
        let solution = best.ok_or_else(|| {
            EquilibriumError::ConvergenceFailure("no strategy was attempted".to_string())
        })?;
        Ok(RobustSolution { solution, attempts })
    }

    /// Independent solves, in parallel, for every value of the initial concentration of
    /// `species`; the other initial concentrations are taken from `initial`.
    pub fn sweep(
        &self,
        initial: &HashMap<String, f64>,
        species: &str,
        values: &[f64],
        config: &SolveConfig,
    ) -> Result<Vec<SweepPoint>, EquilibriumError> {
        if self.index_of(species).is_none() {
            return Err(EquilibriumError::UnknownSpecies(species.to_string()));
        }
        info!("sweep over {} values of [{}]", values.len(), species);
        values
            .par_iter()
            .map(|value| {
                let mut point = initial.clone();
                point.insert(species.to_string(), *value);
                let solution = self.solve(&point, config)?;
                Ok(SweepPoint {
                    value: *value,
                    success: solution.is_success(),
                    sane: solution.is_sane(),
                    max_law_deviation: solution.sanity.max_law_deviation(),
                    iterations: solution.status.iterations,
                    solution,
                })
            })
            .collect()
    }
}
