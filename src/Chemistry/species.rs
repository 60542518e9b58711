use super::formula::{FormulaError, Groups, Phase, molar_mass, parse_formula};
use std::collections::BTreeMap;
use std::fmt;

/// chemical species: a name (usually the formula itself), elemental composition and net charge.
/// Fields are private so that a species cannot change after it was parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Species {
    name: String,
    composition: BTreeMap<String, usize>,
    charge: i32,
    phase: Option<Phase>,
}

impl Species {
    /// species named after its formula, e.g. "NH4+" or "H2O(l)"
    pub fn from_formula(formula: &str) -> Result<Self, FormulaError> {
        Self::from_formula_with_groups(formula, None)
    }

    pub fn from_formula_with_groups(
        formula: &str,
        groups: Option<&Groups>,
    ) -> Result<Self, FormulaError> {
        let parsed = parse_formula(formula, groups)?;
        Ok(Self {
            name: formula.trim().to_string(),
            composition: parsed.composition,
            charge: parsed.charge,
            phase: parsed.phase,
        })
    }

    /// species with an arbitrary name and explicitly given composition, e.g. "Hp" for H+
    pub fn with_composition(
        name: &str,
        composition: BTreeMap<String, usize>,
        charge: i32,
    ) -> Self {
        Self {
            name: name.to_string(),
            composition: composition.into_iter().filter(|(_, n)| *n > 0).collect(),
            charge,
            phase: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn composition(&self) -> &BTreeMap<String, usize> {
        &self.composition
    }

    /// number of atoms of the element in the species (0 if absent)
    pub fn count(&self, element: &str) -> usize {
        self.composition.get(element).copied().unwrap_or(0)
    }

    pub fn charge(&self) -> i32 {
        self.charge
    }

    pub fn phase(&self) -> Option<Phase> {
        self.phase
    }

    pub fn molar_mass(&self) -> f64 {
        molar_mass(&self.composition)
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
