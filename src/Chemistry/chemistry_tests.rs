#[cfg(test)]
mod tests {
    use crate::Chemistry::formula::*;
    use crate::Chemistry::reaction::{EqConstant, Equilibrium, ReactionError};
    use crate::Chemistry::species::Species;
    use approx::assert_relative_eq;
    use std::collections::{BTreeMap, HashMap};

    fn counts(pairs: &[(&str, usize)]) -> BTreeMap<String, usize> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn species(formulae: &[&str]) -> Vec<Species> {
        formulae
            .iter()
            .map(|f| Species::from_formula(f).unwrap())
            .collect()
    }

    #[test]
    fn test_parse_formula() {
        let parsed = parse_formula("C6H8O6", None).unwrap();
        assert_eq!(parsed.composition, counts(&[("C", 6), ("H", 8), ("O", 6)]));
        assert_eq!(parsed.charge, 0);

        let parsed = parse_formula("Na(NO3)2", None).unwrap();
        assert_eq!(parsed.composition, counts(&[("Na", 1), ("N", 2), ("O", 6)]));

        let parsed = parse_formula("H2O", None).unwrap();
        assert_eq!(parsed.composition, counts(&[("H", 2), ("O", 1)]));

        let parsed = parse_formula("C5H6OOH", None).unwrap();
        assert_eq!(parsed.composition, counts(&[("C", 5), ("H", 7), ("O", 2)]));
    }

    #[test]
    fn test_nested_brackets_and_hydrates() {
        let parsed = parse_formula("K4[Fe(CN)6]", None).unwrap();
        assert_eq!(
            parsed.composition,
            counts(&[("K", 4), ("Fe", 1), ("C", 6), ("N", 6)])
        );
        let expected = counts(&[("Cu", 1), ("S", 1), ("O", 9), ("H", 10)]);
        for hydrate in ["CuSO4.5H2O", "CuSO4·5H2O", "CuSO4*5H2O"] {
            assert_eq!(parse_formula(hydrate, None).unwrap().composition, expected);
        }
    }

    #[test]
    fn test_charges() {
        let cases = [
            ("H+", 1),
            ("OH-", -1),
            ("NH4+", 1),
            ("SO4--", -2),
            ("SO4-2", -2),
            ("Fe+++", 3),
            ("Fe+3", 3),
            ("Fe/3+", 3),
            ("Fe{3+}", 3),
            ("PO4{3-}", -3),
            ("H2O", 0),
        ];
        for (formula, charge) in cases {
            assert_eq!(parse_formula(formula, None).unwrap().charge, charge, "{}", formula);
        }
        let electron = parse_formula("e-", None).unwrap();
        assert_eq!(electron.charge, -1);
        assert!(electron.composition.is_empty());
        // the composition of an ion does not contain its charge
        assert_eq!(
            parse_formula("SO4-2", None).unwrap().composition,
            counts(&[("S", 1), ("O", 4)])
        );
    }

    #[test]
    fn test_phases() {
        let parsed = parse_formula("NH4+(aq)", None).unwrap();
        assert_eq!(parsed.phase, Some(Phase::Aqueous));
        assert_eq!(parsed.charge, 1);
        assert_eq!(parsed.composition, counts(&[("N", 1), ("H", 4)]));
        assert_eq!(parse_formula("NaCl(s)", None).unwrap().phase, Some(Phase::Solid));
        assert_eq!(parse_formula("H2O(l)", None).unwrap().phase, Some(Phase::Liquid));
        assert_eq!(parse_formula("CO2(G)", None).unwrap().phase, Some(Phase::Gas));
        assert_eq!(parse_formula("NH3", None).unwrap().phase, None);
    }

    #[test]
    fn test_formula_errors() {
        assert_eq!(parse_formula("  ", None), Err(FormulaError::Empty));
        assert!(matches!(
            parse_formula("Xx2O", None),
            Err(FormulaError::UnknownElement { .. })
        ));
        assert!(matches!(
            parse_formula("Ca(NO3", None),
            Err(FormulaError::UnbalancedBrackets(_))
        ));
        assert!(matches!(
            parse_formula("CaNO3)2", None),
            Err(FormulaError::UnbalancedBrackets(_))
        ));
        assert!(matches!(
            parse_formula("H2$O", None),
            Err(FormulaError::UnexpectedCharacter { ch: '$', .. })
        ));
        assert!(matches!(parse_formula("H0", None), Err(FormulaError::ZeroCount(_))));
        // counts that do not fit into usize
        for formula in [
            "C99999999999999999999999",
            "(C18446744073709551615)2",
            "(CH18446744073709551615)[H]",
            "H2O.18446744073709551615H2O",
            "H18446744073709551615H",
        ] {
            assert_eq!(
                parse_formula(formula, None),
                Err(FormulaError::CountOverflow(formula.to_string())),
                "{}",
                formula
            );
        }
        assert_eq!(
            parse_formula("C18446744073709551615", None).unwrap().composition["C"],
            usize::MAX
        );
        assert!(matches!(
            parse_formula("Fe{3}", None),
            Err(FormulaError::InvalidCharge { .. })
        ));
        assert!(matches!(
            parse_formula("Fe+-", None),
            Err(FormulaError::InvalidCharge { .. })
        ));
    }

    #[test]
    fn test_calculate_molar_mass() {
        let (molar_mass, _) = calculate_molar_mass("H2O(g)", None).unwrap();
        assert_relative_eq!(molar_mass, 18.01528, epsilon = 1e-2);
        let (molar_mass, _) = calculate_molar_mass("NaCl", None).unwrap();
        assert_relative_eq!(molar_mass, 58.44, epsilon = 1e-2);
        let (molar_mass, _) = calculate_molar_mass("C6H8O6", None).unwrap();
        assert_relative_eq!(molar_mass, 176.12, epsilon = 1e-2);
        let (molar_mass, composition) = calculate_molar_mass("Ca(NO3)2", None).unwrap();
        assert_relative_eq!(molar_mass, 164.093, epsilon = 1e-2);
        assert_eq!(composition["O"], 6);
    }

    #[test]
    fn test_calculate_molar_mass_of_vector_of_substances() {
        let vec_of_formulae = ["H2O", "NaCl", "C6H8O6", "Ca(NO3)2"];
        let expected_molar_masses = [18.01528, 58.44316, 176.12, 164.093];
        let calculated = calculate_molar_mass_of_vector_of_subs(&vec_of_formulae, None).unwrap();
        for (calculated, expected) in calculated.iter().zip(expected_molar_masses) {
            assert_relative_eq!(*calculated, expected, epsilon = 1e-2);
        }
        assert!(calculate_molar_mass_of_vector_of_subs(&["H2O", "Qq"], None).is_err());
    }

    #[test]
    fn test_with_groups() {
        let groups: Groups = HashMap::from([(
            "Me".to_string(),
            HashMap::from([("C".to_string(), 1), ("H".to_string(), 3)]),
        )]);
        let toluol = parse_formula("C6H5Me", Some(&groups)).unwrap();
        assert_eq!(toluol.composition, counts(&[("H", 8), ("C", 7)]));
        let xylol = parse_formula("C6H4(Me)2", Some(&groups)).unwrap();
        assert_eq!(xylol.composition, counts(&[("H", 10), ("C", 8)]));
        // without the group definition Me is not an element
        assert!(parse_formula("C6H5Me", None).is_err());
    }

    #[test]
    fn test_element_matrix() {
        let (matrix, elements) =
            create_elem_composition_matrix(&["H2O", "NaCl", "C3H8", "CH4"], None).unwrap();
        assert_eq!(matrix.nrows(), 4);
        assert_eq!(matrix.ncols(), 5);
        assert_eq!(elements, vec!["C", "Cl", "H", "Na", "O"]);
        assert_eq!(matrix[(2, 0)], 3.0);
        assert_eq!(matrix[(2, 2)], 8.0);
        assert_eq!(matrix[(0, 4)], 1.0);
    }

    #[test]
    fn test_species() {
        let ammonium = Species::from_formula("NH4+").unwrap();
        assert_eq!(ammonium.name(), "NH4+");
        assert_eq!(ammonium.count("H"), 4);
        assert_eq!(ammonium.count("O"), 0);
        assert_eq!(ammonium.charge(), 1);
        assert_relative_eq!(ammonium.molar_mass(), 18.039, epsilon = 1e-2);
        assert_eq!(ammonium.to_string(), "NH4+");

        let proton = Species::with_composition("Hp", counts(&[("H", 1), ("O", 0)]), 1);
        assert_eq!(proton.composition(), &counts(&[("H", 1)]));
        assert_eq!(proton.phase(), None);
    }

    #[test]
    fn test_equilibrium_from_string() {
        let eq = Equilibrium::from_string("NH4+ = H+ + NH3", 5.5e-10).unwrap();
        assert_eq!(eq.reactants(), &BTreeMap::from([("NH4+".to_string(), 1)]));
        assert_eq!(
            eq.products(),
            &BTreeMap::from([("H+".to_string(), 1), ("NH3".to_string(), 1)])
        );
        assert_eq!(eq.constant(), &EqConstant::Value(5.5e-10));

        let eq = Equilibrium::from_string("2 NO2 <=> N2O4", "K").unwrap();
        assert_eq!(eq.reactants()["NO2"], 2);
        assert!(eq.constant().is_symbolic());
        assert_eq!(eq.equation(), "2 NO2 = N2O4");
        let net = eq.net_stoichiometry();
        assert_eq!(net["NO2"], -2);
        assert_eq!(net["N2O4"], 1);

        assert!(matches!(
            Equilibrium::from_string("A + B", 1.0),
            Err(ReactionError::Parse { .. })
        ));
        assert!(matches!(
            Equilibrium::from_string(" = H+ + OH-", 1.0),
            Err(ReactionError::EmptySide(_))
        ));
        assert!(matches!(
            Equilibrium::from_string("H2O = H+ + OH-", -1.0),
            Err(ReactionError::InvalidConstant(_))
        ));
    }

    #[test]
    fn test_equilibrium_new_and_constants() {
        let eq = Equilibrium::new(&[("H2O", 1)], &[("H+", 1), ("OH-", 1)], 1e-14)
            .unwrap()
            .with_name("water");
        assert_eq!(eq.name(), Some("water"));
        assert_eq!(eq.species_names().len(), 3);
        assert!(matches!(
            Equilibrium::new(&[("H2O", 0)], &[("H+", 1), ("OH-", 1)], 1e-14),
            Err(ReactionError::InvalidCoefficient { .. })
        ));
        // repeated species add up; the sum must stay representable
        let doubled = Equilibrium::new(&[("NO2", 1), ("NO2", 1)], &[("N2O4", 1)], 6.7).unwrap();
        assert_eq!(doubled.reactants()["NO2"], 2);
        assert!(matches!(
            Equilibrium::new(&[("A", u32::MAX), ("A", 1)], &[("B", 1)], 1.0),
            Err(ReactionError::InvalidCoefficient { .. })
        ));

        // a new value does not change the original equilibrium
        let parametric = eq.with_constant("Kw");
        assert_eq!(eq.constant(), &EqConstant::Value(1e-14));
        let params = HashMap::from([("Kw".to_string(), 1e-13)]);
        assert_eq!(parametric.constant().resolve(&params).unwrap(), 1e-13);
        assert_eq!(
            parametric.constant().resolve(&HashMap::new()),
            Err(ReactionError::UnknownParameter("Kw".to_string()))
        );
        let bad = HashMap::from([("Kw".to_string(), f64::NAN)]);
        assert!(parametric.constant().resolve(&bad).is_err());
    }

    #[test]
    fn test_balance() {
        let all = species(&["H+", "OH-", "NH4+", "NH3", "H2O"]);
        let water = Equilibrium::from_string("H2O = H+ + OH-", 1e-14).unwrap();
        assert!(water.check_balance(&all).is_ok());
        let ammonium = Equilibrium::from_string("NH4+ = H+ + NH3", 5.5e-10).unwrap();
        assert!(ammonium.check_balance(&all).is_ok());

        let no_proton = Equilibrium::from_string("NH4+ = NH3", 1.0).unwrap();
        match no_proton.check_balance(&all) {
            Err(ReactionError::Imbalance {
                quantity,
                reactants,
                products,
                ..
            }) => {
                assert_eq!(quantity, "H");
                assert_eq!((reactants, products), (4, 3));
            }
            other => panic!("unexpected result {:?}", other),
        }

        let with_hydrogen = species(&["NH4+", "NH3", "H"]);
        let charge_only = Equilibrium::from_string("NH4+ = NH3 + H", 1.0).unwrap();
        match charge_only.check_balance(&with_hydrogen) {
            Err(ReactionError::Imbalance { quantity, .. }) => assert_eq!(quantity, "charge"),
            other => panic!("unexpected result {:?}", other),
        }

        let unknown = Equilibrium::from_string("NH4+ = H+ + NH2", 1.0).unwrap();
        assert!(matches!(
            unknown.check_balance(&all),
            Err(ReactionError::UnknownSpecies { .. })
        ));
    }
}
