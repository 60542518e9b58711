//! Parsing of chemical formulae into elemental composition, net charge and phase.
//!
//! Supported notation:
//! - element symbols with counts: `H2O`, `C6H8O6`
//! - nested brackets with multipliers: `Ca(NO3)2`, `K4[Fe(CN)6]`
//! - hydrates and adducts: `CuSO4.5H2O`, `CuSO4·5H2O`, `CuSO4*5H2O`
//! - charges: `NH4+`, `Fe+++`, `SO4--`, `Fe+3`, `SO4-2`, `Fe/3+`, `Fe{3+}`, and the electron `e-`
//! - phase marks: `(aq)`, `(s)`, `(c)`, `(l)`, `(g)`
//! - user-defined chemical groups such as `Me` -> {"C":1, "H":3}
use super::elements::{find_element, is_element};
use log::debug;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;

/// names of chemical groups and their atomic composition { "Me":{"C":1, "H":3}}
pub type Groups = HashMap<String, HashMap<String, usize>>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    #[error("empty formula")]
    Empty,
    #[error("unknown element or group '{symbol}' in formula '{formula}'")]
    UnknownElement { symbol: String, formula: String },
    #[error("unbalanced brackets in formula '{0}'")]
    UnbalancedBrackets(String),
    #[error("unexpected character '{ch}' at position {position} in formula '{formula}'")]
    UnexpectedCharacter {
        ch: char,
        position: usize,
        formula: String,
    },
    #[error("zero count in formula '{0}'")]
    ZeroCount(String),
    #[error("atom count overflows in formula '{0}'")]
    CountOverflow(String),
    #[error("malformed charge '{charge}' in formula '{formula}'")]
    InvalidCharge { charge: String, formula: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Aqueous,
    Solid,
    Liquid,
    Gas,
}

/// result of parsing: element counts, net charge and phase mark (if any)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFormula {
    pub composition: BTreeMap<String, usize>,
    pub charge: i32,
    pub phase: Option<Phase>,
}

const PHASE_MARKS: [(&str, Phase); 5] = [
    ("(aq)", Phase::Aqueous),
    ("(s)", Phase::Solid),
    ("(c)", Phase::Solid),
    ("(l)", Phase::Liquid),
    ("(g)", Phase::Gas),
];

fn split_phase(formula: &str) -> (&str, Option<Phase>) {
    for (mark, phase) in PHASE_MARKS {
        let len = formula.len();
        if len > mark.len()
            && formula.is_char_boundary(len - mark.len())
            && formula[len - mark.len()..].eq_ignore_ascii_case(mark)
        {
            return (&formula[..len - mark.len()], Some(phase));
        }
    }
    (formula, None)
}

/// "3+", "+3", "+", "++", "2-" ...
fn parse_charge_token(token: &str, formula: &str) -> Result<i32, FormulaError> {
    let invalid = || FormulaError::InvalidCharge {
        charge: token.to_string(),
        formula: formula.to_string(),
    };
    if token.is_empty() {
        return Err(invalid());
    }
    let signs: String = token.chars().filter(|c| *c == '+' || *c == '-').collect();
    let digits: String = token.chars().filter(|c| c.is_ascii_digit()).collect();
    if signs.len() + digits.len() != token.chars().count() || signs.is_empty() {
        return Err(invalid());
    }
    let sign = if signs.chars().all(|c| c == '+') {
        1
    } else if signs.chars().all(|c| c == '-') {
        -1
    } else {
        return Err(invalid());
    };
    if digits.is_empty() {
        return Ok(sign * signs.len() as i32);
    }
    // a magnitude goes with exactly one sign, either before or after it
    if signs.len() != 1 || !(token.starts_with(['+', '-']) || token.ends_with(['+', '-'])) {
        return Err(invalid());
    }
    let magnitude: i32 = digits.parse().map_err(|_| invalid())?;
    Ok(sign * magnitude)
}

fn split_charge(formula: &str) -> Result<(&str, i32), FormulaError> {
    // Fe{3+}
    if formula.ends_with('}') {
        let open = formula
            .rfind('{')
            .ok_or_else(|| FormulaError::UnbalancedBrackets(formula.to_string()))?;
        let token = &formula[open + 1..formula.len() - 1];
        return Ok((&formula[..open], parse_charge_token(token, formula)?));
    }
    // Fe/3+
    if let Some(slash) = formula.rfind('/') {
        let token = &formula[slash + 1..];
        return Ok((&formula[..slash], parse_charge_token(token, formula)?));
    }
    let chars: Vec<(usize, char)> = formula.char_indices().collect();
    let mut i = chars.len();
    // Fe+3, SO4-2
    while i > 0 && chars[i - 1].1.is_ascii_digit() {
        i -= 1;
    }
    if i < chars.len() && i > 0 && matches!(chars[i - 1].1, '+' | '-') {
        let start = chars[i - 1].0;
        return Ok((&formula[..start], parse_charge_token(&formula[start..], formula)?));
    }
    // NH4+, Fe+++, SO4--
    let mut i = chars.len();
    while i > 0 && matches!(chars[i - 1].1, '+' | '-') {
        i -= 1;
    }
    if i == chars.len() {
        return Ok((formula, 0));
    }
    let start = chars.get(i).map(|(pos, _)| *pos).unwrap_or(0);
    Ok((&formula[..start], parse_charge_token(&formula[start..], formula)?))
}

struct BodyParser<'a> {
    chars: Vec<char>,
    pos: usize,
    groups: Option<&'a Groups>,
    formula: &'a str,
}

/// adds `n * multiplier` atoms of `symbol`
fn accumulate(
    counts: &mut BTreeMap<String, usize>,
    symbol: String,
    n: usize,
    multiplier: usize,
    formula: &str,
) -> Result<(), FormulaError> {
    let overflow = || FormulaError::CountOverflow(formula.to_string());
    let added = n.checked_mul(multiplier).ok_or_else(overflow)?;
    let count = counts.entry(symbol).or_insert(0);
    *count = count.checked_add(added).ok_or_else(overflow)?;
    Ok(())
}

impl<'a> BodyParser<'a> {
    fn read_count(&mut self) -> Result<Option<usize>, FormulaError> {
        let start = self.pos;
        while self.pos < self.chars.len() && self.chars[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        if start == self.pos {
            return Ok(None);
        }
        let digits: String = self.chars[start..self.pos].iter().collect();
        // only digits were collected, so parsing fails on overflow alone
        let count: usize = digits
            .parse()
            .map_err(|_| FormulaError::CountOverflow(self.formula.to_string()))?;
        if count == 0 {
            return Err(FormulaError::ZeroCount(self.formula.to_string()));
        }
        Ok(Some(count))
    }

    fn is_known(&self, symbol: &str) -> bool {
        is_element(symbol)
            || self
                .groups
                .map(|groups| groups.contains_key(symbol))
                .unwrap_or(false)
    }

    /// parses symbols and brackets until the end of the part or the closing bracket
    fn parse_sequence(
        &mut self,
        closing: Option<char>,
        stop_at_dot: bool,
    ) -> Result<BTreeMap<String, usize>, FormulaError> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        loop {
            let Some(&c) = self.chars.get(self.pos) else {
                if closing.is_some() {
                    return Err(FormulaError::UnbalancedBrackets(self.formula.to_string()));
                }
                return Ok(counts);
            };
            match c {
                '(' | '[' => {
                    let close = if c == '(' { ')' } else { ']' };
                    self.pos += 1;
                    let inner = self.parse_sequence(Some(close), false)?;
                    let multiplier = self.read_count()?.unwrap_or(1);
                    for (symbol, n) in inner {
                        accumulate(&mut counts, symbol, n, multiplier, self.formula)?;
                    }
                }
                ')' | ']' => {
                    if Some(c) == closing {
                        self.pos += 1;
                        return Ok(counts);
                    }
                    return Err(FormulaError::UnbalancedBrackets(self.formula.to_string()));
                }
                '.' | '·' | '*' if stop_at_dot && closing.is_none() => return Ok(counts),
                c if c.is_uppercase() => {
                    let start = self.pos;
                    self.pos += 1;
                    while self.pos < self.chars.len() && self.chars[self.pos].is_lowercase() {
                        self.pos += 1;
                    }
                    let symbol: String = self.chars[start..self.pos].iter().collect();
                    if !self.is_known(&symbol) {
                        return Err(FormulaError::UnknownElement {
                            symbol,
                            formula: self.formula.to_string(),
                        });
                    }
                    let n = self.read_count()?.unwrap_or(1);
                    accumulate(&mut counts, symbol, n, 1, self.formula)?;
                }
                _ => {
                    return Err(FormulaError::UnexpectedCharacter {
                        ch: c,
                        position: self.pos,
                        formula: self.formula.to_string(),
                    });
                }
            }
        }
    }

    /// the whole body: "CuSO4.5H2O" is split into parts at dots, every part after the
    /// first one may start with a multiplier
    fn parse_body(&mut self) -> Result<BTreeMap<String, usize>, FormulaError> {
        let mut counts = self.parse_sequence(None, true)?;
        while let Some(&c) = self.chars.get(self.pos) {
            debug_assert!(matches!(c, '.' | '·' | '*'));
            self.pos += 1;
            let multiplier = self.read_count()?.unwrap_or(1);
            let part = self.parse_sequence(None, true)?;
            if part.is_empty() {
                return Err(FormulaError::UnexpectedCharacter {
                    ch: c,
                    position: self.pos - 1,
                    formula: self.formula.to_string(),
                });
            }
            for (symbol, n) in part {
                accumulate(&mut counts, symbol, n, multiplier, self.formula)?;
            }
        }
        Ok(counts)
    }
}

// Chemical formulae may contain spectial names for chemical groups i.e. groups of atoms, e.g. Me (methyl) group,
// which is converted into {"C":1, "H":3}
fn handle_groups(
    counts: BTreeMap<String, usize>,
    groups: Option<&Groups>,
    formula: &str,
) -> Result<BTreeMap<String, usize>, FormulaError> {
    let Some(groups) = groups else {
        return Ok(counts);
    };
    let mut expanded = BTreeMap::new();
    for (symbol, n) in counts {
        match groups.get(&symbol) {
            Some(atomic_composition) if !is_element(&symbol) => {
                for (atom, quantity) in atomic_composition {
                    accumulate(&mut expanded, atom.clone(), *quantity, n, formula)?;
                }
            }
            _ => accumulate(&mut expanded, symbol, n, 1, formula)?,
        }
    }
    Ok(expanded)
}

/// Parse a chemical formula into its elemental composition, net charge and phase mark.
/// Argument groups is optional: it is needed if the formula contains special names for
/// chemical groups like Me, Ph, etc.
pub fn parse_formula(formula: &str, groups: Option<&Groups>) -> Result<ParsedFormula, FormulaError> {
    let cleaned: String = formula.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return Err(FormulaError::Empty);
    }
    let (body, phase) = split_phase(&cleaned);
    if body == "e-" {
        return Ok(ParsedFormula {
            composition: BTreeMap::new(),
            charge: -1,
            phase,
        });
    }
    let (body, charge) = split_charge(body)?;
    if body.is_empty() {
        return Err(FormulaError::Empty);
    }
    let mut parser = BodyParser {
        chars: body.chars().collect(),
        pos: 0,
        groups,
        formula,
    };
    let counts = parser.parse_body()?;
    let composition = handle_groups(counts, groups, formula)?;
    debug!(
        "parsed formula {}: {:?}, charge {}, phase {:?}",
        formula, composition, charge, phase
    );
    Ok(ParsedFormula {
        composition,
        charge,
        phase,
    })
}

/// molar mass of a substance with given elemental composition, g/mol
pub fn molar_mass(composition: &BTreeMap<String, usize>) -> f64 {
    composition
        .iter()
        .filter_map(|(element, count)| find_element(element).map(|e| e.atomic_mass * *count as f64))
        .sum()
}

/// Function to calculate the molar mass of a substance given its chemical formula
pub fn calculate_molar_mass(
    formula: &str,
    groups: Option<&Groups>,
) -> Result<(f64, BTreeMap<String, usize>), FormulaError> {
    let parsed = parse_formula(formula, groups)?;
    Ok((molar_mass(&parsed.composition), parsed.composition))
}

/// Function to calculate the molar mass of a vector of chemical formulas
pub fn calculate_molar_mass_of_vector_of_subs(
    vec_of_formulae: &[&str],
    groups: Option<&Groups>,
) -> Result<Vec<f64>, FormulaError> {
    vec_of_formulae
        .iter()
        .map(|formula| calculate_molar_mass(formula, groups).map(|(mass, _)| mass))
        .collect()
}

/// matrix of elemental composition: rows are substances, columns are elements (sorted alphabetically)
pub fn create_elem_composition_matrix(
    vec_of_formulae: &[&str],
    groups: Option<&Groups>,
) -> Result<(DMatrix<f64>, Vec<String>), FormulaError> {
    let compositions = vec_of_formulae
        .iter()
        .map(|formula| parse_formula(formula, groups).map(|parsed| parsed.composition))
        .collect::<Result<Vec<_>, _>>()?;
    let unique_elements: Vec<String> = compositions
        .iter()
        .flat_map(|composition| composition.keys().cloned())
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect();
    let mut matrix = DMatrix::zeros(compositions.len(), unique_elements.len());
    for (i, composition) in compositions.iter().enumerate() {
        for (j, element) in unique_elements.iter().enumerate() {
            if let Some(count) = composition.get(element) {
                matrix[(i, j)] = *count as f64;
            }
        }
    }
    Ok((matrix, unique_elements))
}
