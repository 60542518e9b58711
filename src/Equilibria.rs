/// error type of the equilibrium layer
pub mod errors;
/// reduced row echelon form, rank, null space
pub mod linalg_utils;
/// Species and equilibria assembled into one system: stoichiometry matrix, composition
/// matrix, conservation laws and mass action rows. Derived matrices are computed lazily
/// and cached.
///
/// # Examples
/// ```
/// use AqEquilibria::Chemistry::reaction::Equilibrium;
/// use AqEquilibria::Equilibria::EquilibriumSystem::EquilibriumSystem;
/// let water = Equilibrium::from_string("H2O = H+ + OH-", 1e-14 / 55.5).unwrap();
/// let ammonium = Equilibrium::from_string("NH4+ = H+ + NH3", 10f64.powf(-9.26)).unwrap();
/// let system =
///     EquilibriumSystem::from_formulae(&["H+", "OH-", "NH4+", "NH3", "H2O"], vec![water, ammonium])
///         .unwrap();
/// assert_eq!(system.stoichiometry_matrix().shape(), (2, 5));
/// assert_eq!(system.conservation_laws(false).len(), 3);
/// ```
#[allow(non_snake_case)]
pub mod EquilibriumSystem;
/// numerical formulations: linear, logarithmic and squared unknowns
#[allow(non_snake_case)]
pub mod NumSys;
/// residual function of the equilibrium problem
pub mod residual;
/// damped Newton-Raphson root finder behind the `RootFinder` trait
#[allow(non_snake_case)]
pub mod NR_solver;
/// root finder delegating to the Newton-Raphson solver of RustedSciThe
#[allow(non_snake_case)]
pub mod symbolic_NR;
/// non-negativity, upper bounds and conservation of a computed composition
pub mod sanity_check;
/// options of a solve call
pub mod solve_config;
/// Solving the system: single solve, retry over formulations, parallel sweep.
///
/// # Examples
/// ```
/// use AqEquilibria::Chemistry::reaction::Equilibrium;
/// use AqEquilibria::Equilibria::EquilibriumSystem::EquilibriumSystem;
/// use AqEquilibria::Equilibria::NumSys::NumSys;
/// use AqEquilibria::Equilibria::solve_config::SolveConfig;
/// use std::collections::HashMap;
/// let water = Equilibrium::from_string("H2O = H+ + OH-", 1e-14 / 55.5).unwrap();
/// let ammonium = Equilibrium::from_string("NH4+ = H+ + NH3", 10f64.powf(-9.26)).unwrap();
/// let system =
///     EquilibriumSystem::from_formulae(&["H+", "OH-", "NH4+", "NH3", "H2O"], vec![water, ammonium])
///         .unwrap();
/// let c0: HashMap<String, f64> = [("H+", 1e-7), ("OH-", 1e-7), ("NH4+", 1e-7), ("NH3", 1.0), ("H2O", 55.5)]
///     .iter()
///     .map(|(k, v)| (k.to_string(), *v))
///     .collect();
/// let solution = system.solve(&c0, &SolveConfig::new().with_numsys(NumSys::log())).unwrap();
/// assert!(solution.is_success() && solution.is_sane());
/// println!("pH = {:.2}", solution.p_value("H+").unwrap());
/// ```
#[allow(non_snake_case)]
pub mod EqSolver;
/// residuals and Jacobian as symbolic expressions, condition number
pub mod symbolic_system;
/// console tables
#[allow(non_snake_case)]
pub mod EqSystemOutput;
#[allow(non_snake_case)]
mod EqSystem_tests;
