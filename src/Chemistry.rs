/// Table of chemical elements with standard atomic masses
pub mod elements;
/// Module to calculate the atomic composition, charge and molar mass of a chemical formula
///
///  # Examples
/// ```
/// use AqEquilibria::Chemistry::formula::{calculate_molar_mass, parse_formula};
/// let (molar_mass, element_composition) = calculate_molar_mass("C6H8O6", None).unwrap();
/// println!("Element counts: {:?}", element_composition);
/// println!("Molar mass: {:?} g/mol", molar_mass);
/// let parsed = parse_formula("NH4+(aq)", None).unwrap();
/// assert_eq!(parsed.charge, 1);
/// assert_eq!(parsed.composition["H"], 4);
/// ```
pub mod formula;
/// chemical species with immutable composition and charge
pub mod species;
/// equilibrium reactions and their constants
///
///  # Examples
/// ```
/// use AqEquilibria::Chemistry::reaction::Equilibrium;
/// use AqEquilibria::Chemistry::species::Species;
/// let eq = Equilibrium::from_string("NH4+ = H+ + NH3", 10f64.powf(-9.26)).unwrap();
/// let species: Vec<Species> = ["NH4+", "H+", "NH3"]
///     .iter()
///     .map(|f| Species::from_formula(f).unwrap())
///     .collect();
/// assert!(eq.check_balance(&species).is_ok());
/// ```
pub mod reaction;
mod chemistry_tests;
