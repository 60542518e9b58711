#[cfg(test)]
mod tests {
    use crate::Chemistry::reaction::{Equilibrium, ReactionError};
    use crate::Chemistry::species::Species;
    use crate::Equilibria::EquilibriumSystem::EquilibriumSystem;
    use crate::Equilibria::NR_solver::NonlinearSystem;
    use crate::Equilibria::NumSys::{NumSys, VariableTransform};
    use crate::Equilibria::errors::EquilibriumError;
    use crate::Equilibria::linalg_utils::{null_space, rank, rref, rref_with_transform};
    use crate::Equilibria::residual::EquilibriumResidual;
    use crate::Equilibria::solve_config::SolveConfig;
    use crate::Examples::ammonia_examples::{
        K_WATER, PKA_AMMONIUM, ammonia_initial, ammonia_system, ammonia_system_with,
    };
    use approx::assert_relative_eq;
    use nalgebra::{DMatrix, DVector};
    use std::collections::{BTreeMap, HashMap};

    fn ka() -> f64 {
        10f64.powf(-PKA_AMMONIUM)
    }

    /// 2 NO2 = N2O4 with K = 2, a system with moderate constants
    fn dimerisation() -> EquilibriumSystem {
        let eq = Equilibrium::from_string("2 NO2 = N2O4", 2.0).unwrap();
        EquilibriumSystem::from_formulae(&["NO2", "N2O4"], vec![eq]).unwrap()
    }

    /// Jacobian of the wrapped residual by forward differences
    struct FiniteDifference<'a>(&'a EquilibriumResidual);

    impl NonlinearSystem for FiniteDifference<'_> {
        fn dimension(&self) -> usize {
            self.0.dimension()
        }
        fn residual(&self, x: &DVector<f64>) -> DVector<f64> {
            self.0.residual(x)
        }
    }

    #[test]
    fn test_stoichiometry_matrix() {
        let system = ammonia_system().unwrap();
        assert_eq!(system.n_species(), 5);
        assert_eq!(system.n_equilibria(), 2);
        assert_eq!(system.species_names(), vec!["H+", "OH-", "NH4+", "NH3", "H2O"]);
        let expected = DMatrix::from_row_slice(
            2,
            5,
            &[1.0, 1.0, 0.0, 0.0, -1.0, 1.0, 0.0, -1.0, 1.0, 0.0],
        );
        assert_eq!(system.stoichiometry_matrix(), &expected);
        assert_eq!(system.index_of("NH3"), Some(3));
        assert_eq!(system.index_of("Na+"), None);
    }

    #[test]
    fn test_composition_matrix() {
        let system = ammonia_system().unwrap();
        let composition = system.composition_matrix();
        assert_eq!(composition.labels, vec!["H", "N", "O", "charge"]);
        assert_eq!(
            composition.matrix.row(0).iter().copied().collect::<Vec<_>>(),
            vec![1.0, 1.0, 4.0, 3.0, 2.0]
        );
        assert_eq!(
            composition.matrix.row(3).iter().copied().collect::<Vec<_>>(),
            vec![1.0, -1.0, 1.0, 0.0, 0.0]
        );
        // every equilibrium conserves every element and the charge
        let product = system.stoichiometry_matrix() * composition.matrix.transpose();
        assert!(product.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_conservation_laws() {
        let system = ammonia_system().unwrap();
        let laws = system.conservation_laws(false);
        let names: Vec<&str> = laws.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["H", "N", "O"]);
        assert_eq!(laws[0].coefficients, DVector::from_vec(vec![1.0, 1.0, 4.0, 3.0, 2.0]));
        assert_eq!(laws[1].coefficients, DVector::from_vec(vec![0.0, 0.0, 1.0, 1.0, 0.0]));
        assert_eq!(laws[2].coefficients, DVector::from_vec(vec![0.0, 1.0, 0.0, 0.0, 1.0]));
        let s = system.stoichiometry_matrix();
        for law in &laws {
            assert!((s * &law.coefficients).iter().all(|x| x.abs() < 1e-12));
        }
        let c0 = system.concentration_vector(&ammonia_initial()).unwrap();
        assert_relative_eq!(laws[1].evaluate(&c0), 1.0 + 1e-7, epsilon = 1e-15);
    }

    #[test]
    fn test_conservation_laws_rref() {
        let system = ammonia_system().unwrap();
        let reduced = system.conservation_laws(true);
        let names: Vec<&str> = reduced.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["H+ basis", "OH- basis", "NH4+ basis"]);
        let expected = [
            [1.0, 0.0, 0.0, -1.0, 1.0],
            [0.0, 1.0, 0.0, 0.0, 1.0],
            [0.0, 0.0, 1.0, 1.0, 0.0],
        ];
        for (law, row) in reduced.iter().zip(expected) {
            for (a, b) in law.coefficients.iter().zip(row) {
                assert_relative_eq!(*a, b, epsilon = 1e-12);
            }
        }
        // both bases span the same space
        let mut stacked = DMatrix::zeros(6, 5);
        for (i, law) in system
            .conservation_laws(false)
            .iter()
            .chain(reduced.iter())
            .enumerate()
        {
            stacked.set_row(i, &law.coefficients.transpose());
        }
        assert_eq!(rank(&stacked), 3);
        // the unreduced basis stays cached and unchanged
        assert_eq!(system.conservation_laws(false)[0].name, "H");
    }

    #[test]
    fn test_mass_action_rows() {
        let system = ammonia_system().unwrap();
        let rows = system.mass_action_rows(&HashMap::new(), false).unwrap();
        assert_eq!(&rows.rows, system.stoichiometry_matrix());
        assert_eq!(rows.labels, vec!["water autoprotolysis", "ammonium protolysis"]);
        assert_relative_eq!(rows.ln_k[0], K_WATER.ln(), epsilon = 1e-12);
        assert_relative_eq!(rows.ln_k[1], ka().ln(), epsilon = 1e-12);

        let reduced = system.mass_action_rows(&HashMap::new(), true).unwrap();
        let expected = DMatrix::from_row_slice(
            2,
            5,
            &[1.0, 0.0, -1.0, 1.0, 0.0, 0.0, 1.0, 1.0, -1.0, -1.0],
        );
        assert_eq!(reduced.rows, expected);
        assert_eq!(reduced.labels, vec!["H+ equilibrium", "OH- equilibrium"]);
        assert_relative_eq!(reduced.ln_k[0], ka().ln(), epsilon = 1e-10);
        assert_relative_eq!(reduced.ln_k[1], K_WATER.ln() - ka().ln(), epsilon = 1e-10);
    }

    #[test]
    fn test_parametric_constant() {
        let system = ammonia_system_with("Ka").unwrap();
        assert!(matches!(
            system.mass_action_rows(&HashMap::new(), false),
            Err(EquilibriumError::Reaction(ReactionError::UnknownParameter(_)))
        ));
        let config = SolveConfig::new().with_param("Ka", ka());
        let rows = system.mass_action_rows(&config.params, false).unwrap();
        assert_relative_eq!(rows.ln_k[1], ka().ln(), epsilon = 1e-12);

        let zero = ammonia_system_with(0.0).unwrap();
        assert!(matches!(
            zero.mass_action_rows(&HashMap::new(), false),
            Err(EquilibriumError::NonPositiveConstant(_))
        ));
    }

    #[test]
    fn test_dependent_equilibria() {
        let water = Equilibrium::from_string("H2O = H+ + OH-", K_WATER).unwrap();
        let ammonium = Equilibrium::from_string("NH4+ = H+ + NH3", ka()).unwrap();
        let base = Equilibrium::from_string("NH4+ + OH- = NH3 + H2O", ka() / K_WATER).unwrap();
        let system = EquilibriumSystem::from_formulae(
            &["H+", "OH-", "NH4+", "NH3", "H2O"],
            vec![water, ammonium, base],
        )
        .unwrap();
        assert!(matches!(
            system.mass_action_rows(&HashMap::new(), false),
            Err(EquilibriumError::DependentEquilibria {
                rank: 2,
                n_equilibria: 3
            })
        ));
        // the conservation laws only depend on the rank
        assert_eq!(system.conservation_laws(false).len(), 3);
    }

    #[test]
    fn test_construction_errors() {
        let water = || Equilibrium::from_string("H2O = H+ + OH-", K_WATER).unwrap();
        assert!(matches!(
            EquilibriumSystem::from_formulae(&["H+", "OH-", "H+", "H2O"], vec![water()]),
            Err(EquilibriumError::DuplicateSpecies(name)) if name == "H+"
        ));
        assert!(matches!(
            EquilibriumSystem::from_formulae(&["H+", "H2O"], vec![water()]),
            Err(EquilibriumError::UnknownSpecies(name)) if name == "OH-"
        ));
        let broken = Equilibrium::from_string("NH4+ = NH3", 1.0).unwrap();
        assert!(matches!(
            EquilibriumSystem::from_formulae(&["NH4+", "NH3"], vec![broken]),
            Err(EquilibriumError::Reaction(ReactionError::Imbalance { .. }))
        ));
        assert!(matches!(
            EquilibriumSystem::from_formulae(&["H+", "Qq"], vec![]),
            Err(EquilibriumError::Formula(_))
        ));
    }

    #[test]
    fn test_from_equilibria() {
        let water = Equilibrium::from_string("H2O = H+ + OH-", K_WATER).unwrap();
        let ammonium = Equilibrium::from_string("NH4+ = H+ + NH3", ka()).unwrap();
        let system = EquilibriumSystem::from_equilibria(vec![water, ammonium]).unwrap();
        assert_eq!(system.species_names(), vec!["H2O", "H+", "OH-", "NH4+", "NH3"]);
        assert_eq!(system.conservation_laws(false).len(), 3);
    }

    #[test]
    fn test_concentration_vector() {
        let system = ammonia_system().unwrap();
        let partial = HashMap::from([("NH3".to_string(), 0.5), ("H2O".to_string(), 55.5)]);
        let c = system.concentration_vector(&partial).unwrap();
        assert_eq!(c, DVector::from_vec(vec![0.0, 0.0, 0.0, 0.5, 55.5]));

        let unknown = HashMap::from([("Na+".to_string(), 0.1)]);
        assert!(matches!(
            system.concentration_vector(&unknown),
            Err(EquilibriumError::UnknownSpecies(_))
        ));
        let negative = HashMap::from([("NH3".to_string(), -0.1)]);
        assert!(matches!(
            system.concentration_vector(&negative),
            Err(EquilibriumError::InvalidConcentration { .. })
        ));
        let nan = HashMap::from([("NH3".to_string(), f64::NAN)]);
        assert!(system.concentration_vector(&nan).is_err());
    }

    #[test]
    fn test_isomers_need_invariants_from_null_space() {
        let ethanol: BTreeMap<String, usize> =
            BTreeMap::from([("C".to_string(), 2), ("H".to_string(), 6), ("O".to_string(), 1)]);
        let species = vec![
            Species::with_composition("A", ethanol.clone(), 0),
            Species::with_composition("B", ethanol.clone(), 0),
            Species::with_composition("C", ethanol, 0),
        ];
        let eq = Equilibrium::from_string("A = B", 3.0).unwrap();
        let system = EquilibriumSystem::new(species, vec![eq]).unwrap();
        let laws = system.conservation_laws(false);
        let names: Vec<&str> = laws.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["C", "invariant 0"]);
        for law in &laws {
            assert!((system.stoichiometry_matrix() * &law.coefficients).iter().all(|x| x.abs() < 1e-12));
        }
    }

    #[test]
    fn test_linalg_utils() {
        let m = DMatrix::from_row_slice(2, 3, &[2.0, 4.0, 6.0, 1.0, 1.0, 1.0]);
        let (reduced, pivots) = rref(&m);
        assert_eq!(pivots, vec![0, 1]);
        assert_eq!(reduced, DMatrix::from_row_slice(2, 3, &[1.0, 0.0, -1.0, 0.0, 1.0, 2.0]));
        let (_, t, _) = rref_with_transform(&m);
        assert!((&t * &m - &reduced).iter().all(|x| x.abs() < 1e-12));

        let kernel = null_space(&m);
        assert_eq!(kernel.shape(), (1, 3));
        assert!((&m * kernel.row(0).transpose()).iter().all(|x| x.abs() < 1e-12));

        let singular = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]);
        assert_eq!(rank(&singular), 1);
        assert_eq!(rank(&DMatrix::<f64>::zeros(0, 3)), 0);
        assert_eq!(null_space(&DMatrix::<f64>::zeros(0, 3)).shape(), (3, 3));
    }

    #[test]
    fn test_numsys_transforms() {
        let c = DVector::from_vec(vec![1e-7, 0.0, 55.5]);
        for numsys in NumSys::all() {
            let y = numsys.to_unknowns(&c, 1e-20);
            let back = numsys.to_concentrations(&y);
            assert_relative_eq!(back[0], 1e-7, max_relative = 1e-12);
            assert_relative_eq!(back[1], 1e-20, max_relative = 1e-12);
            assert_relative_eq!(back[2], 55.5, max_relative = 1e-12);
        }
        assert_eq!(NumSys::linear().lower_bound(), Some(0.0));
        assert_eq!(NumSys::log().lower_bound(), None);
        assert_eq!(NumSys::square().lower_bound(), None);
        assert_eq!(NumSys::default(), NumSys::linear());
    }

    #[test]
    fn test_numsys_names_and_serde() {
        assert_eq!(NumSys::log().to_string(), "log");
        assert_eq!("sqrt".parse::<NumSys>().unwrap(), NumSys::square());
        assert_eq!(" Linear ".parse::<NumSys>().unwrap(), NumSys::linear());
        assert!(matches!(
            "cubic".parse::<NumSys>(),
            Err(EquilibriumError::UnknownTransform(_))
        ));
        assert_eq!(serde_json::to_string(&NumSys::square()).unwrap(), "\"square\"");
        let parsed: NumSys = serde_json::from_str("\"logarithmic\"").unwrap();
        assert_eq!(parsed, NumSys::log());
        assert!(serde_json::from_str::<NumSys>("\"cubic\"").is_err());

        let config: SolveConfig =
            serde_json::from_str(r#"{"numsys": "square", "max_iterations": 50}"#).unwrap();
        assert_eq!(config.numsys, NumSys::square());
        assert_eq!(config.max_iterations, 50);
        assert_eq!(config.xtol, SolveConfig::default().xtol);
        let json = serde_json::to_string(&config).unwrap();
        let back: SolveConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_analytic_jacobian_matches_finite_differences() {
        let system = dimerisation();
        let c = DVector::from_vec(vec![0.4, 0.3]);
        let rows = system.mass_action_rows(&HashMap::new(), false).unwrap();
        let laws = system.conservation_laws(false);
        assert_eq!(laws.len(), 1);
        for numsys in NumSys::all() {
            let residual = EquilibriumResidual::new(numsys, &rows, &laws, &c).unwrap();
            let y = numsys.to_unknowns(&c, 1e-20);
            let analytic = residual.jacobian(&y);
            let numeric = FiniteDifference(&residual).jacobian(&y);
            for (a, n) in analytic.iter().zip(numeric.iter()) {
                assert_relative_eq!(*a, *n, epsilon = 1e-6, max_relative = 1e-5);
            }
        }
    }

    #[test]
    fn test_fractional_rref_row() {
        let system = dimerisation();
        let reduced = system.mass_action_rows(&HashMap::new(), true).unwrap();
        assert_eq!(reduced.rows, DMatrix::from_row_slice(1, 2, &[1.0, -0.5]));
        assert_relative_eq!(reduced.ln_k[0], -0.5 * 2f64.ln(), epsilon = 1e-14);

        let c = DVector::from_vec(vec![0.4, 0.3]);
        let laws = system.conservation_laws(false);
        for numsys in NumSys::all() {
            let residual = EquilibriumResidual::new(numsys, &reduced, &laws, &c).unwrap();
            let y = numsys.to_unknowns(&c, 1e-20);
            let f = residual.residual(&y);
            if numsys != NumSys::log() {
                // sqrt(K) [NO2] - sqrt([N2O4])
                assert_relative_eq!(f[0], 2f64.sqrt() * 0.4 - 0.3f64.sqrt(), epsilon = 1e-14);
            }
            let analytic = residual.jacobian(&y);
            let numeric = FiniteDifference(&residual).jacobian(&y);
            for (a, n) in analytic.iter().zip(numeric.iter()) {
                assert_relative_eq!(*a, *n, epsilon = 1e-6, max_relative = 1e-5);
            }
        }
    }

    #[test]
    fn test_residual_at_initial_state() {
        let system = dimerisation();
        let c = DVector::from_vec(vec![0.4, 0.3]);
        let config = SolveConfig::new().with_numsys(NumSys::log());
        let residual = system.residual_function(&c, &config).unwrap();
        assert_eq!(residual.totals().len(), 1);
        assert_relative_eq!(residual.totals()[0], 1.0, epsilon = 1e-15);
        let f = residual.residual(&NumSys::log().to_unknowns(&c, 1e-20));
        // ln(0.3) - 2 ln(0.4) - ln(2) and an exactly conserved nitrogen total
        assert_relative_eq!(f[0], 0.3f64.ln() - 2.0 * 0.4f64.ln() - 2f64.ln(), epsilon = 1e-12);
        assert_relative_eq!(f[1], 0.0, epsilon = 1e-14);
    }

    #[test]
    fn test_residual_shape_errors() {
        let system = ammonia_system().unwrap();
        let rows = system.mass_action_rows(&HashMap::new(), false).unwrap();
        let laws = system.conservation_laws(false);
        let c0 = system.concentration_vector(&ammonia_initial()).unwrap();
        assert!(matches!(
            EquilibriumResidual::new(NumSys::linear(), &rows, &laws[..2], &c0),
            Err(EquilibriumError::NotSquare {
                equations: 4,
                unknowns: 5
            })
        ));
        let short = DVector::from_vec(vec![1.0; 4]);
        assert!(matches!(
            EquilibriumResidual::new(NumSys::linear(), &rows, &laws, &short),
            Err(EquilibriumError::DimensionMismatch {
                expected: 5,
                found: 4
            })
        ));
    }

    #[test]
    fn test_tables() {
        let system = ammonia_system().unwrap();
        assert_eq!(system.stoichiometry_table().len(), 3);
        assert_eq!(system.conservation_table(true).len(), 4);
        let rendered = system.conservation_table(false).to_string();
        assert!(rendered.contains("NH4+"));
    }
}
