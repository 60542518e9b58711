//! Physical admissibility of a computed composition: non-negative concentrations that do
//! not exceed what the conserved totals allow, and conserved quantities equal to their
//! initial values.
use super::EquilibriumSystem::EquilibriumSystem;
use log::warn;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesSanity {
    pub name: String,
    pub concentration: f64,
    /// smallest `total / v_j` over the conservation laws with non-negative coefficients
    pub upper_bound: Option<f64>,
    pub non_negative: bool,
    pub within_bound: bool,
}

impl SpeciesSanity {
    pub fn is_sane(&self) -> bool {
        self.non_negative && self.within_bound
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LawSanity {
    pub name: String,
    pub initial: f64,
    pub current: f64,
    /// |current - initial| relative to the magnitude of the conserved quantity
    pub relative_deviation: f64,
    pub conserved: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SanityReport {
    pub species: Vec<SpeciesSanity>,
    pub laws: Vec<LawSanity>,
}

impl SanityReport {
    /// Checks `solution` against the physical conservation laws of `system` (never the
    /// reduced ones, so that the report does not depend on solver options).
    pub fn check(
        system: &EquilibriumSystem,
        initial: &DVector<f64>,
        solution: &DVector<f64>,
        rtol: f64,
        atol: f64,
    ) -> Self {
        let laws = system.conservation_laws(false);
        let mut law_reports = Vec::with_capacity(laws.len());
        for law in &laws {
            let initial_value = law.evaluate(initial);
            let current = law.evaluate(solution);
            let magnitude = law
                .coefficients
                .abs()
                .dot(&initial.abs())
                .max(law.coefficients.abs().dot(&solution.abs()));
            let deviation = (current - initial_value).abs();
            law_reports.push(LawSanity {
                name: law.name.clone(),
                initial: initial_value,
                current,
                relative_deviation: if magnitude > 0.0 { deviation / magnitude } else { deviation },
                conserved: deviation <= rtol * magnitude + atol,
            });
        }

        let mut species_reports = Vec::with_capacity(solution.len());
        for (j, name) in system.species_names().into_iter().enumerate() {
            let upper_bound = laws
                .iter()
                .filter(|law| law.coefficients.iter().all(|v| *v >= 0.0) && law.coefficients[j] > 0.0)
                .map(|law| law.evaluate(initial) / law.coefficients[j])
                .reduce(f64::min);
            let c = solution[j];
            species_reports.push(SpeciesSanity {
                name: name.to_string(),
                concentration: c,
                upper_bound,
                non_negative: c >= -atol,
                within_bound: upper_bound.is_none_or(|bound| c <= bound * (1.0 + rtol) + atol),
            });
        }

        let report = SanityReport {
            species: species_reports,
            laws: law_reports,
        };
        for violation in report.violations() {
            warn!("sanity check: {}", violation);
        }
        report
    }

    pub fn is_sane(&self) -> bool {
        self.species.iter().all(|s| s.is_sane()) && self.laws.iter().all(|l| l.conserved)
    }

    /// human readable description of every violation
    pub fn violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        for s in &self.species {
            if !s.non_negative {
                violations.push(format!("negative concentration of {}: {:e}", s.name, s.concentration));
            }
            if !s.within_bound {
                violations.push(format!(
                    "concentration of {} ({:e}) exceeds the conserved total ({:e})",
                    s.name,
                    s.concentration,
                    s.upper_bound.unwrap_or(f64::NAN)
                ));
            }
        }
        for l in &self.laws {
            if !l.conserved {
                violations.push(format!(
                    "conservation of {} broken: initial {:e}, final {:e}",
                    l.name, l.initial, l.current
                ));
            }
        }
        violations
    }

    pub fn max_law_deviation(&self) -> f64 {
        self.laws
            .iter()
            .map(|l| l.relative_deviation)
            .fold(0.0, f64::max)
    }
}
