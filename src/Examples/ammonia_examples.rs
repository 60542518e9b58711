//! Protolysis of ammonia in water, step by step: system assembly, solving in the three
//! numerical formulations with and without row reduction, symbolic Jacobians, a sweep
//! over the initial ammonia concentration and a parametrised equilibrium constant.
use crate::Chemistry::reaction::{EqConstant, Equilibrium};
use crate::Equilibria::EqSolver::Strategy;
use crate::Equilibria::EqSystemOutput::{attempts_table, sweep_table};
use crate::Equilibria::EquilibriumSystem::EquilibriumSystem;
use crate::Equilibria::NR_solver::NonlinearSystem;
use crate::Equilibria::NumSys::{NumSys, VariableTransform};
use crate::Equilibria::errors::EquilibriumError;
use crate::Equilibria::solve_config::SolveConfig;
use crate::Equilibria::symbolic_system::SymbolicSystem;
use prettytable::{Table, row};
use std::collections::HashMap;

pub const AMMONIA_SPECIES: [&str; 5] = ["H+", "OH-", "NH4+", "NH3", "H2O"];
/// ionic product of water over the concentration of water
pub const K_WATER: f64 = 1e-14 / 55.5;
pub const PKA_AMMONIUM: f64 = 9.26;

/// water autoprotolysis and ammonium protolysis; the ammonium constant may be a parameter
pub fn ammonia_system_with(ka: impl Into<EqConstant>) -> Result<EquilibriumSystem, EquilibriumError> {
    let water = Equilibrium::new(&[("H2O", 1)], &[("H+", 1), ("OH-", 1)], K_WATER)?
        .with_name("water autoprotolysis");
    let ammonium = Equilibrium::new(&[("NH4+", 1)], &[("H+", 1), ("NH3", 1)], ka)?
        .with_name("ammonium protolysis");
    EquilibriumSystem::from_formulae(&AMMONIA_SPECIES, vec![water, ammonium])
}

pub fn ammonia_system() -> Result<EquilibriumSystem, EquilibriumError> {
    ammonia_system_with(10f64.powf(-PKA_AMMONIUM))
}

/// 1 M ammonia in pure water
pub fn ammonia_initial() -> HashMap<String, f64> {
    AMMONIA_SPECIES
        .iter()
        .zip([1e-7, 1e-7, 1e-7, 1.0, 55.5])
        .map(|(name, c)| (name.to_string(), c))
        .collect()
}

pub fn ammonia_examples(task: usize) -> Result<(), EquilibriumError> {
    let system = ammonia_system()?;
    let c0 = ammonia_initial();
    match task {
        0 => {
            // matrices and one solve in linear unknowns
            system.pretty_print_matrices();
            println!("\nConservation laws in reduced row echelon form:");
            system.conservation_table(true).printstd();
            let solution = system.solve(&c0, &SolveConfig::new())?;
            solution.pretty_print();
            println!("pH = {:.3}", solution.p_value("H+").unwrap_or(f64::NAN));
        }
        1 => {
            // every formulation with every combination of row reductions
            let mut table = Table::new();
            table.add_row(row!["Formulation", "rref eq", "rref cons", "Success", "Sane", "Iterations", "[H+]", "[NH4+]"]);
            for numsys in NumSys::all() {
                for (rref_eq, rref_cons) in [(false, false), (true, false), (false, true), (true, true)] {
                    let config = SolveConfig::new().with_numsys(numsys).with_rref(rref_eq, rref_cons);
                    let solution = system.solve(&c0, &config)?;
                    table.add_row(row![
                        numsys,
                        rref_eq,
                        rref_cons,
                        solution.is_success(),
                        solution.is_sane(),
                        solution.status().iterations,
                        format!("{:.10e}", solution.get("H+").unwrap_or(f64::NAN)),
                        format!("{:.10e}", solution.get("NH4+").unwrap_or(f64::NAN))
                    ]);
                }
            }
            table.printstd();
        }
        2 => {
            // closed-form residuals, Jacobian and its conditioning at the solution
            let reference = system.solve(&c0, &SolveConfig::new())?.ensure_converged()?;
            for numsys in NumSys::all() {
                let config = SolveConfig::new().with_numsys(numsys);
                let residual = system.residual_function(reference.initial(), &config)?;
                let symbolic = SymbolicSystem::from_residual(&residual);
                println!("\n{} formulation:", numsys);
                for (i, f) in symbolic.residuals().iter().enumerate() {
                    println!("  F{} = {}", i, f);
                }
                let y = numsys.to_unknowns(reference.concentrations(), config.min_concentration);
                println!("  |F| at the solution = {:e}", residual.residual(&y).amax());
                println!("  cond(J) at the solution = {:e}", symbolic.condition_number(&y)?);
            }
        }
        3 => {
            // accuracy over a range of initial ammonia concentrations
            let values: Vec<f64> = (0..25).map(|i| 10f64.powf(-8.0 + 0.5 * i as f64)).collect();
            for numsys in NumSys::all() {
                let points = system.sweep(&c0, "NH3", &values, &SolveConfig::new().with_numsys(numsys))?;
                println!("\n{} formulation:", numsys);
                sweep_table("NH3", &points).printstd();
            }
        }
        4 => {
            // the same system for several pKa values without touching the equilibria
            let parametric = ammonia_system_with("Ka")?;
            let mut table = Table::new();
            table.add_row(row!["pKa", "pH", "[NH4+]"]);
            for pka in [8.0, 9.26, 10.5] {
                let config = SolveConfig::new()
                    .with_numsys(NumSys::log())
                    .with_param("Ka", 10f64.powf(-pka));
                let solution = parametric.solve(&c0, &config)?.ensure_sane()?;
                table.add_row(row![
                    pka,
                    format!("{:.4}", solution.p_value("H+").unwrap_or(f64::NAN)),
                    format!("{:.6e}", solution.get("NH4+").unwrap_or(f64::NAN))
                ]);
            }
            table.printstd();
        }
        5 => {
            // start without any ions and let the retry strategy pick a formulation
            let mut start = c0.clone();
            for ion in ["H+", "OH-", "NH4+"] {
                start.insert(ion.to_string(), 0.0);
            }
            let result = system.solve_robustly(&start, &SolveConfig::new(), &Strategy::defaults())?;
            attempts_table(&result.attempts).printstd();
            result.solution.pretty_print();
        }
        _ => println!("unknown example {}", task),
    }
    Ok(())
}
