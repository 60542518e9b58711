use crate::Chemistry::formula::Groups;
use crate::Chemistry::reaction::{EqConstant, Equilibrium};
use crate::Chemistry::species::Species;
use crate::Equilibria::EqSolver::{RobustSolution, Strategy};
use crate::Equilibria::EquilibriumSystem::EquilibriumSystem;
use crate::Equilibria::errors::EquilibriumError;
use crate::Equilibria::solve_config::SolveConfig;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

/// header of the task section in a mixed document
pub const TASK_HEADER: &str = "EQUILIBRIUM";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquilibriumDefinition {
    #[serde(default)]
    pub name: Option<String>,
    /// e.g. "NH4+ = H+ + NH3"
    pub equation: String,
    /// a number or the name of a parameter from `config.params`
    pub constant: EqConstant,
}

/// Complete description of an equilibrium problem as stored in a JSON task file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquilibriumTask {
    /// species in the order of the concentration vector; taken from the equilibria if empty
    #[serde(default)]
    pub species: Vec<String>,
    #[serde(default)]
    pub groups: Option<Groups>,
    pub initial_concentrations: HashMap<String, f64>,
    pub equilibria: Vec<EquilibriumDefinition>,
    #[serde(default)]
    pub config: SolveConfig,
    /// formulations tried one after another; only `config` is used if empty
    #[serde(default)]
    pub strategies: Vec<Strategy>,
}

impl EquilibriumTask {
    pub fn from_json(json: &str) -> Result<Self, EquilibriumError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, EquilibriumError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), EquilibriumError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn equilibria(&self) -> Result<Vec<Equilibrium>, EquilibriumError> {
        self.equilibria
            .iter()
            .map(|def| {
                let eq = Equilibrium::from_string(&def.equation, def.constant.clone())?;
                Ok(match &def.name {
                    Some(name) => eq.with_name(name),
                    None => eq,
                })
            })
            .collect()
    }

    pub fn build_system(&self) -> Result<EquilibriumSystem, EquilibriumError> {
        let equilibria = self.equilibria()?;
        let names: Vec<String> = if self.species.is_empty() {
            let mut seen = BTreeSet::new();
            equilibria
                .iter()
                .flat_map(|eq| eq.reactants().keys().chain(eq.products().keys()))
                .filter(|name| seen.insert(name.to_string()))
                .cloned()
                .collect()
        } else {
            self.species.clone()
        };
        let species = names
            .iter()
            .map(|name| Species::from_formula_with_groups(name, self.groups.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        EquilibriumSystem::new(species, equilibria)
    }

    /// builds the system and solves it with the configured strategies
    pub fn run(&self) -> Result<RobustSolution, EquilibriumError> {
        let system = self.build_system()?;
        system.solve_robustly(&self.initial_concentrations, &self.config, &self.strategies)
    }
}

/// Reads a task file. The file is either a bare JSON task or a document in which the JSON
/// follows a line with the `EQUILIBRIUM` header and runs up to the next all-caps header.
pub fn load_task_from_file(file_name: &str) -> Result<EquilibriumTask, EquilibriumError> {
    let content = fs::read_to_string(file_name)?;
    let lines: Vec<&str> = content.lines().collect();
    let start_index = lines
        .iter()
        .position(|line| line.trim().to_uppercase() == TASK_HEADER)
        .map(|i| i + 1);
    let (start_index, section) = match start_index {
        Some(start) => {
            let end = (start..lines.len())
                .find(|&i| {
                    let trimmed = lines[i].trim();
                    !trimmed.is_empty() && trimmed.chars().all(|c| c.is_uppercase() || c == '_')
                })
                .unwrap_or(lines.len());
            (start, lines[start..end].join("\n"))
        }
        None => (0, content.clone()),
    };

    match serde_json::from_str::<EquilibriumTask>(&section) {
        Ok(task) => {
            info!("Successfully parsed equilibrium task from file '{}'", file_name);
            if task.equilibria.is_empty() {
                warn!("task in '{}' contains no equilibria", file_name);
            }
            Ok(task)
        }
        Err(e) => {
            let actual_line = start_index + e.line().saturating_sub(1);
            error!(
                "Error parsing equilibrium task at line {}, column {} (line {} in file): {}",
                e.line(),
                e.column(),
                actual_line + 1,
                e
            );
            if let Some(problem_line) = lines.get(actual_line) {
                error!("Problematic line: {}", problem_line);
            }
            Err(e.into())
        }
    }
}
