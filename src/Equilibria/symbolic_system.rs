//! Closed-form residuals and Jacobian of the equilibrium problem as RustedSciThe
//! expressions in the variables `y0 .. y{n-1}`. The residuals feed the RustedSciThe
//! root finder; the Jacobian serves inspection and the conditioning analysis.
use super::NR_solver::NonlinearSystem;
use super::NumSys::VariableTransform;
use super::errors::EquilibriumError;
use super::residual::EquilibriumResidual;
use RustedSciThe::symbolic::symbolic_engine::Expr;
use nalgebra::{DMatrix, DVector};
use std::collections::HashMap;

/// numeric value of an expression built from variables, constants, arithmetic, powers,
/// exponentials and logarithms
pub fn eval_expr(expr: &Expr, vars: &HashMap<String, f64>) -> Result<f64, EquilibriumError> {
    let value = match expr {
        Expr::Var(name) => *vars
            .get(name)
            .ok_or_else(|| EquilibriumError::Symbolic(format!("no value for variable {}", name)))?,
        Expr::Const(c) => *c,
        Expr::Add(a, b) => eval_expr(a, vars)? + eval_expr(b, vars)?,
        Expr::Sub(a, b) => eval_expr(a, vars)? - eval_expr(b, vars)?,
        Expr::Mul(a, b) => eval_expr(a, vars)? * eval_expr(b, vars)?,
        Expr::Div(a, b) => eval_expr(a, vars)? / eval_expr(b, vars)?,
        Expr::Pow(base, exponent) => {
            let exponent = eval_expr(exponent, vars)?;
            let base = eval_expr(base, vars)?;
            if exponent.fract() == 0.0 && exponent.abs() < i32::MAX as f64 {
                base.powi(exponent as i32)
            } else {
                base.powf(exponent)
            }
        }
        Expr::Exp(a) => eval_expr(a, vars)?.exp(),
        Expr::Ln(a) => eval_expr(a, vars)?.ln(),
        other => {
            return Err(EquilibriumError::Symbolic(format!(
                "unsupported expression {}",
                other
            )));
        }
    };
    Ok(value)
}

#[derive(Debug, Clone)]
pub struct SymbolicSystem {
    variables: Vec<String>,
    concentrations: Vec<Expr>,
    residuals: Vec<Expr>,
    jacobian: Vec<Vec<Expr>>,
}

impl SymbolicSystem {
    pub fn from_residual(residual: &EquilibriumResidual) -> Self {
        let transform = residual.transform();
        let n = residual.dimension();
        let variables: Vec<String> = (0..n).map(|j| format!("y{}", j)).collect();
        let unknowns: Vec<Expr> = variables.iter().map(|v| Expr::Var(v.clone())).collect();
        let concentrations: Vec<Expr> = unknowns
            .iter()
            .map(|y| transform.concentration_expr(y))
            .collect();

        let mut residuals = Vec::with_capacity(n);
        for (row, ln_k) in residual.mass_action().iter().zip(residual.ln_k()) {
            residuals.push(transform.mass_action_expr(row, *ln_k, &unknowns));
        }
        for (law, total) in residual.laws().iter().zip(residual.totals()) {
            let conserved = law
                .iter()
                .zip(concentrations.iter())
                .filter(|(v, _)| **v != 0.0)
                .map(|(v, c)| {
                    if *v == 1.0 {
                        c.clone()
                    } else {
                        Expr::Const(*v) * c.clone()
                    }
                })
                .reduce(|acc, term| acc + term)
                .unwrap_or(Expr::Const(0.0));
            residuals.push(conserved - Expr::Const(*total));
        }

        let jacobian = residuals
            .iter()
            .map(|f| variables.iter().map(|v| f.diff(v)).collect())
            .collect();
        Self {
            variables,
            concentrations,
            residuals,
            jacobian,
        }
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// concentrations expressed through the unknowns
    pub fn concentrations(&self) -> &[Expr] {
        &self.concentrations
    }

    pub fn residuals(&self) -> &[Expr] {
        &self.residuals
    }

    pub fn jacobian(&self) -> &[Vec<Expr>] {
        &self.jacobian
    }

    fn bind(&self, y: &DVector<f64>) -> Result<HashMap<String, f64>, EquilibriumError> {
        if y.len() != self.variables.len() {
            return Err(EquilibriumError::DimensionMismatch {
                expected: self.variables.len(),
                found: y.len(),
            });
        }
        Ok(self.variables.iter().cloned().zip(y.iter().copied()).collect())
    }

    pub fn evaluate(&self, y: &DVector<f64>) -> Result<DVector<f64>, EquilibriumError> {
        let vars = self.bind(y)?;
        let values = self
            .residuals
            .iter()
            .map(|f| eval_expr(f, &vars))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DVector::from_vec(values))
    }

    pub fn evaluate_jacobian(&self, y: &DVector<f64>) -> Result<DMatrix<f64>, EquilibriumError> {
        let vars = self.bind(y)?;
        let n = self.variables.len();
        let mut jac = DMatrix::zeros(self.residuals.len(), n);
        for (i, row) in self.jacobian.iter().enumerate() {
            for (j, df) in row.iter().enumerate() {
                jac[(i, j)] = eval_expr(df, &vars)?;
            }
        }
        Ok(jac)
    }

    /// 2-norm condition number of the Jacobian at `y`; infinite for a singular Jacobian
    pub fn condition_number(&self, y: &DVector<f64>) -> Result<f64, EquilibriumError> {
        let jac = self.evaluate_jacobian(y)?;
        if jac.iter().any(|x| !x.is_finite()) {
            return Err(EquilibriumError::LinearAlgebra(
                "Jacobian is not finite".to_string(),
            ));
        }
        let singular_values = jac.singular_values();
        let max = singular_values.max();
        let min = singular_values.min();
        Ok(if min > 0.0 { max / min } else { f64::INFINITY })
    }
}
