use super::EqSolver::{Attempt, Solution, SweepPoint};
use super::EquilibriumSystem::EquilibriumSystem;
use prettytable::{Cell, Row, Table, row};

fn matrix_table(header: &[&str], labels: &[String], rows: &[Vec<f64>]) -> Table {
    let mut table = Table::new();
    let mut head = vec![Cell::new("")];
    head.extend(header.iter().map(|h| Cell::new(h)));
    table.add_row(Row::new(head));
    for (label, values) in labels.iter().zip(rows) {
        let mut cells = vec![Cell::new(label)];
        cells.extend(values.iter().map(|v| Cell::new(&format!("{}", v))));
        table.add_row(Row::new(cells));
    }
    table
}

impl EquilibriumSystem {
    pub fn stoichiometry_table(&self) -> Table {
        let s = self.stoichiometry_matrix();
        let labels: Vec<String> = self.equilibria().iter().map(|eq| eq.equation()).collect();
        let rows: Vec<Vec<f64>> = s.row_iter().map(|r| r.iter().copied().collect()).collect();
        matrix_table(&self.species_names(), &labels, &rows)
    }

    pub fn conservation_table(&self, rref: bool) -> Table {
        let laws = self.conservation_laws(rref);
        let labels: Vec<String> = laws.iter().map(|l| l.name.clone()).collect();
        let rows: Vec<Vec<f64>> = laws
            .iter()
            .map(|l| l.coefficients.iter().copied().collect())
            .collect();
        matrix_table(&self.species_names(), &labels, &rows)
    }

    pub fn pretty_print_matrices(&self) {
        println!("\nStoichiometry matrix:");
        self.stoichiometry_table().printstd();
        println!("\nConservation laws:");
        self.conservation_table(false).printstd();
    }
}

impl Solution {
    pub fn table(&self) -> Table {
        let mut table = Table::new();
        table.add_row(row!["Species", "Initial", "Equilibrium", "p", "Sane"]);
        for (i, (name, s)) in self.species().iter().zip(&self.sanity().species).enumerate() {
            let c = self.concentrations()[i];
            table.add_row(row![
                name,
                format!("{:.6e}", self.initial()[i]),
                format!("{:.6e}", c),
                format!("{:.4}", -c.log10()),
                s.is_sane()
            ]);
        }
        table
    }

    pub fn pretty_print(&self) {
        let (rref_eq, rref_cons) = self.rref_flags();
        println!(
            "\nFormulation: {}, rref equilibria: {}, rref conservation: {}",
            self.numsys(),
            rref_eq,
            rref_cons
        );
        println!("Solver: {}", self.status());
        self.table().printstd();
        let mut laws = Table::new();
        laws.add_row(row!["Conserved", "Initial", "Final", "Relative deviation"]);
        for l in &self.sanity().laws {
            laws.add_row(row![
                l.name,
                format!("{:.10e}", l.initial),
                format!("{:.10e}", l.current),
                format!("{:.2e}", l.relative_deviation)
            ]);
        }
        laws.printstd();
        for violation in self.sanity().violations() {
            println!("  violation: {}", violation);
        }
    }
}

pub fn attempts_table(attempts: &[Attempt]) -> Table {
    let mut table = Table::new();
    table.add_row(row!["Formulation", "rref eq", "rref cons", "Success", "Sane", "Iterations", "|F|"]);
    for a in attempts {
        table.add_row(row![
            a.strategy.numsys,
            a.strategy.rref_equilibria,
            a.strategy.rref_conservation,
            a.success,
            a.sane,
            a.iterations,
            format!("{:.3e}", a.residual_norm)
        ]);
    }
    table
}

pub fn sweep_table(species: &str, points: &[SweepPoint]) -> Table {
    let mut table = Table::new();
    table.add_row(row![
        format!("[{}]0", species),
        "Success",
        "Sane",
        "Iterations",
        "Max conservation error"
    ]);
    for p in points {
        table.add_row(row![
            format!("{:.3e}", p.value),
            p.success,
            p.sane,
            p.iterations,
            format!("{:.3e}", p.max_law_deviation)
        ]);
    }
    table
}
