use crate::Chemistry::formula::FormulaError;
use crate::Chemistry::reaction::ReactionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EquilibriumError {
    #[error("formula error: {0}")]
    Formula(#[from] FormulaError),
    #[error("reaction error: {0}")]
    Reaction(#[from] ReactionError),
    #[error("species '{0}' is defined twice")]
    DuplicateSpecies(String),
    #[error("unknown species '{0}'")]
    UnknownSpecies(String),
    #[error("invalid initial concentration of {species}: {value}")]
    InvalidConcentration { species: String, value: f64 },
    #[error("equilibrium constant of '{0}' must be positive to be solved")]
    NonPositiveConstant(String),
    #[error("equilibria are linearly dependent: rank {rank} for {n_equilibria} equilibria")]
    DependentEquilibria { rank: usize, n_equilibria: usize },
    #[error("system is not square: {equations} equations for {unknowns} unknowns")]
    NotSquare { equations: usize, unknowns: usize },
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("solver did not converge: {0}")]
    ConvergenceFailure(String),
    #[error("solution is not physically admissible: {0}")]
    SanityViolation(String),
    #[error("unknown numerical formulation '{0}', expected linear, log or square")]
    UnknownTransform(String),
    #[error("symbolic evaluation error: {0}")]
    Symbolic(String),
    #[error("linear algebra error: {0}")]
    LinearAlgebra(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
