use super::EquilibriumSystem::{ConservationLaw, MassActionRows};
use super::NR_solver::NonlinearSystem;
use super::NumSys::{NumSys, VariableTransform};
use super::errors::EquilibriumError;
use super::symbolic_system::SymbolicSystem;
use RustedSciThe::symbolic::symbolic_engine::Expr;
use nalgebra::{DMatrix, DVector};

/// Residual of the equilibrium problem in the unknowns of one numerical formulation:
/// one mass action equation per (combined) equilibrium followed by one equation per
/// conservation law, `Σ v_j c_j - Σ v_j c0_j`.
#[derive(Debug, Clone)]
pub struct EquilibriumResidual {
    transform: NumSys,
    mass_action: Vec<DVector<f64>>,
    ln_k: Vec<f64>,
    laws: Vec<DVector<f64>>,
    totals: Vec<f64>,
    n_species: usize,
}

impl EquilibriumResidual {
    pub fn new(
        transform: NumSys,
        rows: &MassActionRows,
        laws: &[ConservationLaw],
        initial: &DVector<f64>,
    ) -> Result<Self, EquilibriumError> {
        let n_species = rows.rows.ncols();
        if initial.len() != n_species {
            return Err(EquilibriumError::DimensionMismatch {
                expected: n_species,
                found: initial.len(),
            });
        }
        let equations = rows.rows.nrows() + laws.len();
        if equations != n_species {
            return Err(EquilibriumError::NotSquare {
                equations,
                unknowns: n_species,
            });
        }
        let mass_action = (0..rows.rows.nrows())
            .map(|i| rows.rows.row(i).transpose())
            .collect();
        let laws: Vec<DVector<f64>> = laws.iter().map(|law| law.coefficients.clone()).collect();
        let totals = laws.iter().map(|v| v.dot(initial)).collect();
        Ok(Self {
            transform,
            mass_action,
            ln_k: rows.ln_k.iter().copied().collect(),
            laws,
            totals,
            n_species,
        })
    }

    pub fn transform(&self) -> NumSys {
        self.transform
    }

    /// conserved totals fixed by the initial concentrations
    pub fn totals(&self) -> &[f64] {
        &self.totals
    }

    pub fn mass_action(&self) -> &[DVector<f64>] {
        &self.mass_action
    }

    pub fn ln_k(&self) -> &[f64] {
        &self.ln_k
    }

    pub fn laws(&self) -> &[DVector<f64>] {
        &self.laws
    }
}

impl NonlinearSystem for EquilibriumResidual {
    fn dimension(&self) -> usize {
        self.n_species
    }

    fn residual(&self, y: &DVector<f64>) -> DVector<f64> {
        let c = self.transform.to_concentrations(y);
        let mut f = DVector::zeros(self.n_species);
        for (i, (row, ln_k)) in self.mass_action.iter().zip(self.ln_k.iter()).enumerate() {
            f[i] = self.transform.mass_action_residual(row, *ln_k, y, &c);
        }
        let offset = self.mass_action.len();
        for (i, (law, total)) in self.laws.iter().zip(self.totals.iter()).enumerate() {
            f[offset + i] = law.dot(&c) - total;
        }
        f
    }

    fn jacobian(&self, y: &DVector<f64>) -> DMatrix<f64> {
        let c = self.transform.to_concentrations(y);
        let dc = self.transform.dc_dy(y);
        let mut jac = DMatrix::zeros(self.n_species, self.n_species);
        for (i, (row, ln_k)) in self.mass_action.iter().zip(self.ln_k.iter()).enumerate() {
            let gradient = self.transform.mass_action_gradient(row, *ln_k, y, &c);
            jac.set_row(i, &gradient.transpose());
        }
        let offset = self.mass_action.len();
        for (i, law) in self.laws.iter().enumerate() {
            jac.set_row(offset + i, &law.component_mul(&dc).transpose());
        }
        jac
    }

    fn lower_bounds(&self) -> Option<DVector<f64>> {
        self.transform
            .lower_bound()
            .map(|bound| DVector::from_element(self.n_species, bound))
    }

    fn step_scale(&self, y: &DVector<f64>) -> DVector<f64> {
        self.transform.step_scale(y)
    }

    fn equations(&self) -> Option<(Vec<Expr>, Vec<String>)> {
        let symbolic = SymbolicSystem::from_residual(self);
        Some((symbolic.residuals().to_vec(), symbolic.variables().to_vec()))
    }
}
