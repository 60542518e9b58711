use super::species::Species;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

static EQUILIBRIUM_SIGN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*(?:<=>|<->|⇌|=)\s*").expect("valid regex"));
static PLUS_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+\+\s+").expect("valid regex"));
static TERM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<coeff>\d+(?:\.\d*)?)?\s*(?P<species>\S.*)$").expect("valid regex")
});

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReactionError {
    #[error("cannot parse reaction '{equation}': {reason}")]
    Parse { equation: String, reason: String },
    #[error("one side of reaction '{0}' is empty")]
    EmptySide(String),
    #[error("invalid stoichiometric coefficient '{coefficient}' of '{species}'")]
    InvalidCoefficient { species: String, coefficient: String },
    #[error("invalid equilibrium constant {0}")]
    InvalidConstant(f64),
    #[error("no value given for parameter '{0}'")]
    UnknownParameter(String),
    #[error("species '{species}' of reaction '{reaction}' is not defined")]
    UnknownSpecies { species: String, reaction: String },
    #[error(
        "reaction '{reaction}' does not conserve {quantity}: reactants {reactants}, products {products}"
    )]
    Imbalance {
        reaction: String,
        quantity: String,
        reactants: i64,
        products: i64,
    },
}

/// equilibrium constant: a number or a named parameter whose value is given at solve time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EqConstant {
    Value(f64),
    Param(String),
}

impl EqConstant {
    pub fn resolve(&self, params: &HashMap<String, f64>) -> Result<f64, ReactionError> {
        let value = match self {
            EqConstant::Value(value) => *value,
            EqConstant::Param(name) => *params
                .get(name)
                .ok_or_else(|| ReactionError::UnknownParameter(name.clone()))?,
        };
        if !value.is_finite() || value < 0.0 {
            return Err(ReactionError::InvalidConstant(value));
        }
        Ok(value)
    }

    pub fn is_symbolic(&self) -> bool {
        matches!(self, EqConstant::Param(_))
    }
}

impl From<f64> for EqConstant {
    fn from(value: f64) -> Self {
        EqConstant::Value(value)
    }
}

impl From<&str> for EqConstant {
    fn from(name: &str) -> Self {
        EqConstant::Param(name.to_string())
    }
}

impl fmt::Display for EqConstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EqConstant::Value(value) => write!(f, "{:e}", value),
            EqConstant::Param(name) => write!(f, "{}", name),
        }
    }
}

/// reversible reaction: reactants = products, K = Π[products]^ν / Π[reactants]^ν
#[derive(Debug, Clone, PartialEq)]
pub struct Equilibrium {
    name: Option<String>,
    reactants: BTreeMap<String, u32>,
    products: BTreeMap<String, u32>,
    constant: EqConstant,
}

fn collect_side(
    side: &[(&str, u32)],
    equation: &str,
) -> Result<BTreeMap<String, u32>, ReactionError> {
    if side.is_empty() {
        return Err(ReactionError::EmptySide(equation.to_string()));
    }
    let mut map = BTreeMap::new();
    for (species, coefficient) in side {
        if *coefficient == 0 {
            return Err(ReactionError::InvalidCoefficient {
                species: species.to_string(),
                coefficient: coefficient.to_string(),
            });
        }
        let total = map.entry(species.trim().to_string()).or_insert(0u32);
        let sum = total.checked_add(*coefficient);
        *total = sum.ok_or_else(|| ReactionError::InvalidCoefficient {
            species: species.to_string(),
            coefficient: format!("{} + {}", total, coefficient),
        })?;
    }
    Ok(map)
}

fn parse_side(side: &str, equation: &str) -> Result<Vec<(String, u32)>, ReactionError> {
    let side = side.trim();
    if side.is_empty() {
        return Err(ReactionError::EmptySide(equation.to_string()));
    }
    let mut terms = Vec::new();
    for term in PLUS_SEPARATOR.split(side) {
        let term = term.trim();
        let captures = TERM.captures(term).ok_or_else(|| ReactionError::Parse {
            equation: equation.to_string(),
            reason: format!("cannot read term '{}'", term),
        })?;
        let species = captures["species"].trim().to_string();
        let coefficient = match captures.name("coeff") {
            Some(coeff) => coeff.as_str().parse::<u32>().map_err(|_| {
                ReactionError::InvalidCoefficient {
                    species: species.clone(),
                    coefficient: coeff.as_str().to_string(),
                }
            })?,
            None => 1,
        };
        terms.push((species, coefficient));
    }
    Ok(terms)
}

impl Equilibrium {
    pub fn new(
        reactants: &[(&str, u32)],
        products: &[(&str, u32)],
        constant: impl Into<EqConstant>,
    ) -> Result<Self, ReactionError> {
        let constant = constant.into();
        if let EqConstant::Value(value) = constant {
            if !value.is_finite() || value < 0.0 {
                return Err(ReactionError::InvalidConstant(value));
            }
        }
        let equation = format!("{:?} = {:?}", reactants, products);
        Ok(Self {
            name: None,
            reactants: collect_side(reactants, &equation)?,
            products: collect_side(products, &equation)?,
            constant,
        })
    }

    /// parses equations like "NH4+ = H+ + NH3" or "2 NO2 <=> N2O4". Terms are separated by
    /// a plus surrounded with whitespace, so that charges like "H+" stay part of the formula
    pub fn from_string(
        equation: &str,
        constant: impl Into<EqConstant>,
    ) -> Result<Self, ReactionError> {
        let sides: Vec<&str> = EQUILIBRIUM_SIGN.split(equation.trim()).collect();
        if sides.len() != 2 {
            return Err(ReactionError::Parse {
                equation: equation.to_string(),
                reason: "expected exactly one equilibrium sign (=, <=>, <->, ⇌)".to_string(),
            });
        }
        let reactants = parse_side(sides[0], equation)?;
        let products = parse_side(sides[1], equation)?;
        let reactants: Vec<(&str, u32)> = reactants.iter().map(|(s, n)| (s.as_str(), *n)).collect();
        let products: Vec<(&str, u32)> = products.iter().map(|(s, n)| (s.as_str(), *n)).collect();
        Self::new(&reactants, &products, constant)
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// copy of the equilibrium with another constant; the original stays untouched
    pub fn with_constant(&self, constant: impl Into<EqConstant>) -> Self {
        Self {
            constant: constant.into(),
            ..self.clone()
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn reactants(&self) -> &BTreeMap<String, u32> {
        &self.reactants
    }

    pub fn products(&self) -> &BTreeMap<String, u32> {
        &self.products
    }

    pub fn constant(&self) -> &EqConstant {
        &self.constant
    }

    /// all species taking part in the reaction
    pub fn species_names(&self) -> BTreeSet<&str> {
        self.reactants
            .keys()
            .chain(self.products.keys())
            .map(|s| s.as_str())
            .collect()
    }

    /// net stoichiometric coefficients: products positive, reactants negative
    pub fn net_stoichiometry(&self) -> BTreeMap<String, i64> {
        let mut net: BTreeMap<String, i64> = BTreeMap::new();
        for (species, nu) in &self.products {
            *net.entry(species.clone()).or_insert(0) += *nu as i64;
        }
        for (species, nu) in &self.reactants {
            *net.entry(species.clone()).or_insert(0) -= *nu as i64;
        }
        net.retain(|_, nu| *nu != 0);
        net
    }

    pub fn equation(&self) -> String {
        let side = |map: &BTreeMap<String, u32>| {
            map.iter()
                .map(|(species, nu)| {
                    if *nu == 1 {
                        species.clone()
                    } else {
                        format!("{} {}", nu, species)
                    }
                })
                .collect::<Vec<_>>()
                .join(" + ")
        };
        format!("{} = {}", side(&self.reactants), side(&self.products))
    }

    /// conservation of every element and of charge between reactants and products
    pub fn check_balance(&self, species: &[Species]) -> Result<(), ReactionError> {
        let lookup: HashMap<&str, &Species> = species.iter().map(|s| (s.name(), s)).collect();
        let find = |name: &str| {
            lookup
                .get(name)
                .copied()
                .ok_or_else(|| ReactionError::UnknownSpecies {
                    species: name.to_string(),
                    reaction: self.equation(),
                })
        };
        let mut elements: BTreeSet<String> = BTreeSet::new();
        for name in self.species_names() {
            elements.extend(find(name)?.composition().keys().cloned());
        }
        let side_total = |map: &BTreeMap<String, u32>, quantity: &dyn Fn(&Species) -> i64| {
            map.iter()
                .map(|(name, nu)| find(name).map(|s| *nu as i64 * quantity(s)))
                .sum::<Result<i64, ReactionError>>()
        };
        for element in &elements {
            let count = |s: &Species| s.count(element) as i64;
            let reactants = side_total(&self.reactants, &count)?;
            let products = side_total(&self.products, &count)?;
            if reactants != products {
                return Err(ReactionError::Imbalance {
                    reaction: self.equation(),
                    quantity: element.clone(),
                    reactants,
                    products,
                });
            }
        }
        let charge = |s: &Species| s.charge() as i64;
        let reactants = side_total(&self.reactants, &charge)?;
        let products = side_total(&self.products, &charge)?;
        if reactants != products {
            return Err(ReactionError::Imbalance {
                reaction: self.equation(),
                quantity: "charge".to_string(),
                reactants,
                products,
            });
        }
        Ok(())
    }
}

impl fmt::Display for Equilibrium {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}: {}; K = {}", name, self.equation(), self.constant),
            None => write!(f, "{}; K = {}", self.equation(), self.constant),
        }
    }
}
