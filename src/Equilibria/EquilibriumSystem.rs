use super::errors::EquilibriumError;
use super::linalg_utils::{independent_rows, null_space, rank, rref, rref_with_transform, stack_rows};
use crate::Chemistry::reaction::Equilibrium;
use crate::Chemistry::species::Species;
use log::{debug, info};
use nalgebra::{DMatrix, DVector, RowDVector};
use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

/// linear combination of concentrations that no reaction can change
#[derive(Debug, Clone, PartialEq)]
pub struct ConservationLaw {
    pub name: String,
    pub coefficients: DVector<f64>,
}

impl ConservationLaw {
    /// value of the conserved quantity at given concentrations
    pub fn evaluate(&self, concentrations: &DVector<f64>) -> f64 {
        self.coefficients.dot(concentrations)
    }
}

/// rows are elements (sorted alphabetically) followed by the charge row, columns are species
#[derive(Debug, Clone)]
pub struct CompositionMatrix {
    pub matrix: DMatrix<f64>,
    pub labels: Vec<String>,
}

/// mass action part of the system: one row of (possibly combined) stoichiometric
/// coefficients per equation and the natural logarithm of its constant
#[derive(Debug, Clone)]
pub struct MassActionRows {
    pub rows: DMatrix<f64>,
    pub ln_k: DVector<f64>,
    pub labels: Vec<String>,
}

/// Set of species and equilibria between them. Matrices derived from the definitions are
/// computed on first use and cached; the definitions themselves never change.
#[derive(Debug, Clone)]
pub struct EquilibriumSystem {
    species: Vec<Species>,
    index: HashMap<String, usize>,
    equilibria: Vec<Equilibrium>,
    stoichiometry: OnceLock<DMatrix<f64>>,
    composition: OnceLock<CompositionMatrix>,
    conservation: OnceLock<Vec<ConservationLaw>>,
}

impl EquilibriumSystem {
    pub fn new(
        species: Vec<Species>,
        equilibria: Vec<Equilibrium>,
    ) -> Result<Self, EquilibriumError> {
        let mut index = HashMap::new();
        for (i, s) in species.iter().enumerate() {
            if index.insert(s.name().to_string(), i).is_some() {
                return Err(EquilibriumError::DuplicateSpecies(s.name().to_string()));
            }
        }
        for eq in &equilibria {
            if let Some(unknown) = eq.species_names().into_iter().find(|s| !index.contains_key(*s)) {
                return Err(EquilibriumError::UnknownSpecies(unknown.to_string()));
            }
            eq.check_balance(&species)?;
        }
        info!(
            "equilibrium system assembled: {} species, {} equilibria",
            species.len(),
            equilibria.len()
        );
        Ok(Self {
            species,
            index,
            equilibria,
            stoichiometry: OnceLock::new(),
            composition: OnceLock::new(),
            conservation: OnceLock::new(),
        })
    }

    /// species parsed from formulae, in the given order
    pub fn from_formulae(
        formulae: &[&str],
        equilibria: Vec<Equilibrium>,
    ) -> Result<Self, EquilibriumError> {
        let species = formulae
            .iter()
            .map(|f| Species::from_formula(f))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(species, equilibria)
    }

    /// species are collected from the equilibria in order of first appearance
    pub fn from_equilibria(equilibria: Vec<Equilibrium>) -> Result<Self, EquilibriumError> {
        let mut seen = BTreeSet::new();
        let mut formulae: Vec<String> = Vec::new();
        for eq in &equilibria {
            for name in eq.reactants().keys().chain(eq.products().keys()) {
                if seen.insert(name.clone()) {
                    formulae.push(name.clone());
                }
            }
        }
        let formulae: Vec<&str> = formulae.iter().map(|s| s.as_str()).collect();
        Self::from_formulae(&formulae, equilibria)
    }

    pub fn species(&self) -> &[Species] {
        &self.species
    }

    pub fn species_names(&self) -> Vec<&str> {
        self.species.iter().map(|s| s.name()).collect()
    }

    pub fn equilibria(&self) -> &[Equilibrium] {
        &self.equilibria
    }

    pub fn n_species(&self) -> usize {
        self.species.len()
    }

    pub fn n_equilibria(&self) -> usize {
        self.equilibria.len()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// reactions x species, products positive and reactants negative
    pub fn stoichiometry_matrix(&self) -> &DMatrix<f64> {
        self.stoichiometry.get_or_init(|| {
            let mut matrix = DMatrix::zeros(self.equilibria.len(), self.species.len());
            for (r, eq) in self.equilibria.iter().enumerate() {
                for (name, nu) in eq.net_stoichiometry() {
                    matrix[(r, self.index[&name])] = nu as f64;
                }
            }
            debug!("stoichiometry matrix: {}", matrix);
            matrix
        })
    }

    pub fn composition_matrix(&self) -> &CompositionMatrix {
        self.composition.get_or_init(|| {
            let elements: BTreeSet<&String> = self
                .species
                .iter()
                .flat_map(|s| s.composition().keys())
                .collect();
            let mut labels: Vec<String> = elements.into_iter().cloned().collect();
            labels.push("charge".to_string());
            let mut matrix = DMatrix::zeros(labels.len(), self.species.len());
            for (j, s) in self.species.iter().enumerate() {
                for (i, element) in labels[..labels.len() - 1].iter().enumerate() {
                    matrix[(i, j)] = s.count(element) as f64;
                }
                matrix[(labels.len() - 1, j)] = s.charge() as f64;
            }
            CompositionMatrix { matrix, labels }
        })
    }

    /// physical basis of conservation laws: independent element and charge balances,
    /// completed with null space vectors of the stoichiometry matrix if the composition
    /// does not pin down all invariants
    fn derive_conservation_laws(&self) -> Vec<ConservationLaw> {
        let stoichiometry = self.stoichiometry_matrix();
        let n = self.species.len();
        let expected = n - rank(stoichiometry);
        let composition = self.composition_matrix();
        let mut rows: Vec<RowDVector<f64>> = Vec::new();
        let mut names: Vec<String> = Vec::new();
        for i in independent_rows(&composition.matrix) {
            rows.push(composition.matrix.row(i).clone_owned());
            names.push(composition.labels[i].clone());
        }
        if rows.len() < expected {
            let invariants = null_space(stoichiometry);
            for (k, row) in invariants.row_iter().enumerate() {
                if rows.len() == expected {
                    break;
                }
                let mut candidate = rows.clone();
                candidate.push(row.clone_owned());
                if rank(&stack_rows(&candidate, n)) == candidate.len() {
                    rows = candidate;
                    names.push(format!("invariant {}", k));
                }
            }
        }
        debug_assert_eq!(rows.len(), expected);
        rows.into_iter()
            .zip(names)
            .map(|(row, name)| ConservationLaw {
                name,
                coefficients: row.transpose(),
            })
            .collect()
    }

    /// Independent conservation laws, n_species - rank(stoichiometry) of them.
    /// With `rref` the basis is brought to reduced row echelon form; this changes only the
    /// representation of the laws, not the set of admissible concentrations.
    pub fn conservation_laws(&self, rref_basis: bool) -> Vec<ConservationLaw> {
        let base = self
            .conservation
            .get_or_init(|| self.derive_conservation_laws());
        if !rref_basis || base.is_empty() {
            return base.clone();
        }
        let rows: Vec<RowDVector<f64>> = base.iter().map(|law| law.coefficients.transpose()).collect();
        let (reduced, pivots) = rref(&stack_rows(&rows, self.species.len()));
        pivots
            .iter()
            .enumerate()
            .map(|(i, &p)| ConservationLaw {
                name: format!("{} basis", self.species[p].name()),
                coefficients: reduced.row(i).transpose(),
            })
            .collect()
    }

    /// Rows of the mass action equations with resolved constants. Parameters of symbolic
    /// constants are looked up in `params`. With `rref_rows` the stoichiometric rows are
    /// brought to reduced row echelon form and the constants are combined accordingly
    /// (ln K' = T ln K).
    pub fn mass_action_rows(
        &self,
        params: &HashMap<String, f64>,
        rref_rows: bool,
    ) -> Result<MassActionRows, EquilibriumError> {
        let stoichiometry = self.stoichiometry_matrix();
        let r = rank(stoichiometry);
        if r < self.equilibria.len() {
            return Err(EquilibriumError::DependentEquilibria {
                rank: r,
                n_equilibria: self.equilibria.len(),
            });
        }
        let mut ln_k = DVector::zeros(self.equilibria.len());
        for (i, eq) in self.equilibria.iter().enumerate() {
            let k = eq.constant().resolve(params)?;
            if k <= 0.0 {
                return Err(EquilibriumError::NonPositiveConstant(eq.equation()));
            }
            ln_k[i] = k.ln();
        }
        if !rref_rows {
            let labels = self
                .equilibria
                .iter()
                .map(|eq| eq.name().map(|s| s.to_string()).unwrap_or_else(|| eq.equation()))
                .collect();
            return Ok(MassActionRows {
                rows: stoichiometry.clone(),
                ln_k,
                labels,
            });
        }
        let (reduced, transform, pivots) = rref_with_transform(stoichiometry);
        let labels = pivots
            .iter()
            .map(|&p| format!("{} equilibrium", self.species[p].name()))
            .collect();
        Ok(MassActionRows {
            rows: reduced,
            ln_k: transform * ln_k,
            labels,
        })
    }

    /// vector of concentrations aligned with the species order; species missing in the map
    /// get zero concentration
    pub fn concentration_vector(
        &self,
        concentrations: &HashMap<String, f64>,
    ) -> Result<DVector<f64>, EquilibriumError> {
        let mut vector = DVector::zeros(self.species.len());
        for (name, value) in concentrations {
            let i = self
                .index_of(name)
                .ok_or_else(|| EquilibriumError::UnknownSpecies(name.clone()))?;
            if !value.is_finite() || *value < 0.0 {
                return Err(EquilibriumError::InvalidConcentration {
                    species: name.clone(),
                    value: *value,
                });
            }
            vector[i] = *value;
        }
        Ok(vector)
    }
}
