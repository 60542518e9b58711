//! Numerical formulations of the equilibrium problem. The unknowns `y` of the nonlinear
//! system are either the concentrations themselves, their natural logarithms or their
//! square roots; every formulation has the same roots in terms of concentrations.
use super::errors::EquilibriumError;
use RustedSciThe::symbolic::symbolic_engine::Expr;
use enum_dispatch::enum_dispatch;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[enum_dispatch]
pub trait VariableTransform {
    fn name(&self) -> &'static str;
    /// unknowns from concentrations; concentrations below `floor` are raised to it first
    fn to_unknowns(&self, concentrations: &DVector<f64>, floor: f64) -> DVector<f64>;
    fn to_concentrations(&self, unknowns: &DVector<f64>) -> DVector<f64>;
    /// dc_j/dy_j, the transform acts elementwise
    fn dc_dy(&self, unknowns: &DVector<f64>) -> DVector<f64>;
    /// mass action equation of one (possibly combined) equilibrium
    fn mass_action_residual(
        &self,
        row: &DVector<f64>,
        ln_k: f64,
        unknowns: &DVector<f64>,
        concentrations: &DVector<f64>,
    ) -> f64;
    /// gradient of `mass_action_residual` with respect to the unknowns
    fn mass_action_gradient(
        &self,
        row: &DVector<f64>,
        ln_k: f64,
        unknowns: &DVector<f64>,
        concentrations: &DVector<f64>,
    ) -> DVector<f64>;
    /// scale of the unknowns used by the relative step criterion
    fn step_scale(&self, unknowns: &DVector<f64>) -> DVector<f64>;
    /// lower bound of every unknown, if any
    fn lower_bound(&self) -> Option<f64>;
    fn concentration_expr(&self, unknown: &Expr) -> Expr;
    fn mass_action_expr(&self, row: &DVector<f64>, ln_k: f64, unknowns: &[Expr]) -> Expr;
}

/// c^nu; rows in reduced row echelon form may carry fractional coefficients
fn power(c: f64, nu: f64) -> f64 {
    if nu == 1.0 {
        c
    } else if nu.fract() != 0.0 {
        c.powf(nu)
    } else {
        c.powi(nu as i32)
    }
}

/// products over the positive and negative entries of `row`: (Π c^ν, Π c^|ν|)
fn products_and_reactants(row: &DVector<f64>, c: &DVector<f64>) -> (f64, f64) {
    let mut products = 1.0;
    let mut reactants = 1.0;
    for (nu, cj) in row.iter().zip(c.iter()) {
        if *nu > 0.0 {
            products *= power(*cj, *nu);
        } else if *nu < 0.0 {
            reactants *= power(*cj, -*nu);
        }
    }
    (products, reactants)
}

/// derivative of Π_{k} c_k^|ν_k| over the entries with the sign of `row[j]`, by c_j
fn partial_product(row: &DVector<f64>, c: &DVector<f64>, j: usize) -> f64 {
    let sign = row[j].signum();
    let nu_j = row[j].abs();
    let mut value = nu_j * power(c[j], nu_j - 1.0);
    for (k, (nu, ck)) in row.iter().zip(c.iter()).enumerate() {
        if k != j && nu.signum() == sign && *nu != 0.0 {
            value *= power(*ck, nu.abs());
        }
    }
    value
}

/// Π_prod c^ν / K − Π_react c^|ν|
fn linear_mass_action(row: &DVector<f64>, ln_k: f64, c: &DVector<f64>) -> f64 {
    let (products, reactants) = products_and_reactants(row, c);
    products / ln_k.exp() - reactants
}

/// gradient of `linear_mass_action` by concentrations
fn linear_mass_action_gradient(row: &DVector<f64>, ln_k: f64, c: &DVector<f64>) -> DVector<f64> {
    let k = ln_k.exp();
    DVector::from_fn(row.len(), |j, _| {
        if row[j] > 0.0 {
            partial_product(row, c, j) / k
        } else if row[j] < 0.0 {
            -partial_product(row, c, j)
        } else {
            0.0
        }
    })
}

fn product_expr(factors: Vec<Expr>) -> Expr {
    factors
        .into_iter()
        .reduce(|acc, f| acc * f)
        .unwrap_or(Expr::Const(1.0))
}

fn linear_mass_action_expr(row: &DVector<f64>, ln_k: f64, c: &[Expr]) -> Expr {
    let mut products = Vec::new();
    let mut reactants = Vec::new();
    for (nu, cj) in row.iter().zip(c.iter()) {
        let factor = if nu.abs() == 1.0 {
            cj.clone()
        } else {
            Expr::Pow(Box::new(cj.clone()), Box::new(Expr::Const(nu.abs())))
        };
        if *nu > 0.0 {
            products.push(factor);
        } else if *nu < 0.0 {
            reactants.push(factor);
        }
    }
    product_expr(products) / Expr::Const(ln_k.exp()) - product_expr(reactants)
}

/// unknowns are the concentrations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Linear;

impl VariableTransform for Linear {
    fn name(&self) -> &'static str {
        "linear"
    }
    fn to_unknowns(&self, concentrations: &DVector<f64>, floor: f64) -> DVector<f64> {
        concentrations.map(|c| c.max(floor))
    }
    fn to_concentrations(&self, unknowns: &DVector<f64>) -> DVector<f64> {
        unknowns.clone()
    }
    fn dc_dy(&self, unknowns: &DVector<f64>) -> DVector<f64> {
        DVector::from_element(unknowns.len(), 1.0)
    }
    fn mass_action_residual(
        &self,
        row: &DVector<f64>,
        ln_k: f64,
        _unknowns: &DVector<f64>,
        concentrations: &DVector<f64>,
    ) -> f64 {
        linear_mass_action(row, ln_k, concentrations)
    }
    fn mass_action_gradient(
        &self,
        row: &DVector<f64>,
        ln_k: f64,
        _unknowns: &DVector<f64>,
        concentrations: &DVector<f64>,
    ) -> DVector<f64> {
        linear_mass_action_gradient(row, ln_k, concentrations)
    }
    fn step_scale(&self, unknowns: &DVector<f64>) -> DVector<f64> {
        unknowns.abs()
    }
    fn lower_bound(&self) -> Option<f64> {
        Some(0.0)
    }
    fn concentration_expr(&self, unknown: &Expr) -> Expr {
        unknown.clone()
    }
    fn mass_action_expr(&self, row: &DVector<f64>, ln_k: f64, unknowns: &[Expr]) -> Expr {
        linear_mass_action_expr(row, ln_k, unknowns)
    }
}

/// unknowns are ln(c); mass action laws become linear
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Logarithmic;

impl VariableTransform for Logarithmic {
    fn name(&self) -> &'static str {
        "log"
    }
    fn to_unknowns(&self, concentrations: &DVector<f64>, floor: f64) -> DVector<f64> {
        concentrations.map(|c| c.max(floor).ln())
    }
    fn to_concentrations(&self, unknowns: &DVector<f64>) -> DVector<f64> {
        unknowns.map(f64::exp)
    }
    fn dc_dy(&self, unknowns: &DVector<f64>) -> DVector<f64> {
        unknowns.map(f64::exp)
    }
    fn mass_action_residual(
        &self,
        row: &DVector<f64>,
        ln_k: f64,
        unknowns: &DVector<f64>,
        _concentrations: &DVector<f64>,
    ) -> f64 {
        row.dot(unknowns) - ln_k
    }
    fn mass_action_gradient(
        &self,
        row: &DVector<f64>,
        _ln_k: f64,
        _unknowns: &DVector<f64>,
        _concentrations: &DVector<f64>,
    ) -> DVector<f64> {
        row.clone()
    }
    fn step_scale(&self, unknowns: &DVector<f64>) -> DVector<f64> {
        DVector::from_element(unknowns.len(), 1.0)
    }
    fn lower_bound(&self) -> Option<f64> {
        None
    }
    fn concentration_expr(&self, unknown: &Expr) -> Expr {
        Expr::Exp(Box::new(unknown.clone()))
    }
    fn mass_action_expr(&self, row: &DVector<f64>, ln_k: f64, unknowns: &[Expr]) -> Expr {
        let sum = row
            .iter()
            .zip(unknowns.iter())
            .filter(|(nu, _)| **nu != 0.0)
            .map(|(nu, y)| Expr::Const(*nu) * y.clone())
            .reduce(|acc, term| acc + term)
            .unwrap_or(Expr::Const(0.0));
        sum - Expr::Const(ln_k)
    }
}

/// unknowns are sqrt(c), so any real iterate maps to a non-negative concentration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Squared;

impl VariableTransform for Squared {
    fn name(&self) -> &'static str {
        "square"
    }
    fn to_unknowns(&self, concentrations: &DVector<f64>, floor: f64) -> DVector<f64> {
        concentrations.map(|c| c.max(floor).sqrt())
    }
    fn to_concentrations(&self, unknowns: &DVector<f64>) -> DVector<f64> {
        unknowns.map(|y| y * y)
    }
    fn dc_dy(&self, unknowns: &DVector<f64>) -> DVector<f64> {
        unknowns.map(|y| 2.0 * y)
    }
    fn mass_action_residual(
        &self,
        row: &DVector<f64>,
        ln_k: f64,
        _unknowns: &DVector<f64>,
        concentrations: &DVector<f64>,
    ) -> f64 {
        linear_mass_action(row, ln_k, concentrations)
    }
    fn mass_action_gradient(
        &self,
        row: &DVector<f64>,
        ln_k: f64,
        unknowns: &DVector<f64>,
        concentrations: &DVector<f64>,
    ) -> DVector<f64> {
        linear_mass_action_gradient(row, ln_k, concentrations).component_mul(&self.dc_dy(unknowns))
    }
    fn step_scale(&self, unknowns: &DVector<f64>) -> DVector<f64> {
        unknowns.abs()
    }
    fn lower_bound(&self) -> Option<f64> {
        None
    }
    fn concentration_expr(&self, unknown: &Expr) -> Expr {
        Expr::Pow(Box::new(unknown.clone()), Box::new(Expr::Const(2.0)))
    }
    fn mass_action_expr(&self, row: &DVector<f64>, ln_k: f64, unknowns: &[Expr]) -> Expr {
        let c: Vec<Expr> = unknowns.iter().map(|y| self.concentration_expr(y)).collect();
        linear_mass_action_expr(row, ln_k, &c)
    }
}

#[enum_dispatch(VariableTransform)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TransformKind", into = "TransformKind")]
pub enum NumSys {
    Linear(Linear),
    Logarithmic(Logarithmic),
    Squared(Squared),
}

impl NumSys {
    pub fn linear() -> Self {
        NumSys::Linear(Linear)
    }
    pub fn log() -> Self {
        NumSys::Logarithmic(Logarithmic)
    }
    pub fn square() -> Self {
        NumSys::Squared(Squared)
    }
    /// all formulations in the order they are tried by default
    pub fn all() -> [NumSys; 3] {
        [NumSys::linear(), NumSys::log(), NumSys::square()]
    }
}

impl Default for NumSys {
    fn default() -> Self {
        NumSys::linear()
    }
}

impl fmt::Display for NumSys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for NumSys {
    type Err = EquilibriumError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "linear" | "lin" | "identity" => Ok(NumSys::linear()),
            "log" | "logarithmic" => Ok(NumSys::log()),
            "square" | "squared" | "sqrt" => Ok(NumSys::square()),
            other => Err(EquilibriumError::UnknownTransform(other.to_string())),
        }
    }
}

/// serialised form of `NumSys`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum TransformKind {
    #[serde(rename = "linear", alias = "identity")]
    Linear,
    #[serde(rename = "log", alias = "logarithmic")]
    Log,
    #[serde(rename = "square", alias = "squared")]
    Square,
}

impl From<TransformKind> for NumSys {
    fn from(kind: TransformKind) -> Self {
        match kind {
            TransformKind::Linear => NumSys::linear(),
            TransformKind::Log => NumSys::log(),
            TransformKind::Square => NumSys::square(),
        }
    }
}

impl From<NumSys> for TransformKind {
    fn from(numsys: NumSys) -> Self {
        match numsys {
            NumSys::Linear(_) => TransformKind::Linear,
            NumSys::Logarithmic(_) => TransformKind::Log,
            NumSys::Squared(_) => TransformKind::Square,
        }
    }
}
