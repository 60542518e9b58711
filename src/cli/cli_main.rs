use crate::Examples::ammonia_examples::ammonia_examples;
use crate::Equilibria::EqSystemOutput::attempts_table;
use crate::Equilibria::errors::EquilibriumError;
use crate::Utils::load_from_file::load_task_from_file;
use crate::Utils::logger::{init_logger, level_from_str};
use std::io::{self, Write};

/// `solve <task.json> [log level] [log file]` runs a task file, no arguments start the menu
pub fn run(args: &[String]) -> Result<(), EquilibriumError> {
    match args.first().map(|s| s.as_str()) {
        Some("solve") => {
            let file = args.get(1).ok_or_else(|| {
                EquilibriumError::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "usage: solve <task.json> [log level] [log file]",
                ))
            })?;
            let level = args.get(2).map(|l| level_from_str(l)).unwrap_or(log::LevelFilter::Info);
            init_logger(level, args.get(3).map(|s| s.as_str()));
            solve_task_file(file)
        }
        Some("example") => {
            init_logger(log::LevelFilter::Warn, None);
            let task = args.get(1).and_then(|t| t.parse().ok()).unwrap_or(0);
            ammonia_examples(task)
        }
        Some(other) => Err(EquilibriumError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("unknown command '{}', expected solve or example", other),
        ))),
        None => {
            init_logger(log::LevelFilter::Warn, None);
            run_interactive_menu();
            Ok(())
        }
    }
}

pub fn solve_task_file(file: &str) -> Result<(), EquilibriumError> {
    let task = load_task_from_file(file)?;
    let result = task.run()?;
    if result.attempts.len() > 1 {
        attempts_table(&result.attempts).printstd();
    }
    result.solution.pretty_print();
    Ok(())
}

pub fn run_interactive_menu() {
    loop {
        show_main_menu();
        let choice = get_user_input();
        let outcome = match choice.trim() {
            "1" => ammonia_examples(0),
            "2" => ammonia_examples(1),
            "3" => ammonia_examples(2),
            "4" => ammonia_examples(3),
            "5" => ammonia_examples(4),
            "6" => ammonia_examples(5),
            "7" => {
                print!("\x1b[36mPath to task file: \x1b[0m");
                let _ = io::stdout().flush();
                solve_task_file(get_user_input().trim())
            }
            "0" => {
                println!("Goodbye!");
                break;
            }
            _ => {
                println!("Invalid choice. Please try again.");
                Ok(())
            }
        };
        if let Err(e) = outcome {
            println!("\x1b[31mError: {}\x1b[0m", e);
        }
    }
}

/* colors
Blue (\x1b[34m) - header, Yellow (\x1b[33m) - menu options, Cyan (\x1b[36m) - prompt,
Red (\x1b[31m) - errors, Reset (\x1b[0m)
*/
fn show_main_menu() {
    println!("\x1b[34m\n Aqueous equilibria: species, equilibria, conservation laws and solvers \n\x1b[0m");
    println!("\x1b[33m1. Ammonia in water: matrices and a linear solve\x1b[0m");
    println!("\x1b[33m2. Compare formulations and row reductions\x1b[0m");
    println!("\x1b[33m3. Symbolic residuals and Jacobian conditioning\x1b[0m");
    println!("\x1b[33m4. Sweep over the initial ammonia concentration\x1b[0m");
    println!("\x1b[33m5. Parametrised equilibrium constant\x1b[0m");
    println!("\x1b[33m6. Retry strategy from ion-free water\x1b[0m");
    println!("\x1b[33m7. Solve a task file\x1b[0m");
    println!("\x1b[33m0. Exit\x1b[0m");
    print!("\x1b[36mEnter your choice: \x1b[0m");
    let _ = io::stdout().flush();
}

fn get_user_input() -> String {
    let mut input = String::new();
    match io::stdin().read_line(&mut input) {
        Ok(0) | Err(_) => "0".to_string(),
        Ok(_) => input,
    }
}
