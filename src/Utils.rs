/// simplelog initialisation for the binary and the examples
pub mod logger;
/// JSON task files: species, initial concentrations, equilibria and solver options
///
/// # Examples
/// ```
/// use AqEquilibria::Utils::load_from_file::EquilibriumTask;
/// let task = EquilibriumTask::from_json(r#"{
///     "initial_concentrations": {"H2O": 55.5},
///     "equilibria": [{"equation": "H2O = H+ + OH-", "constant": 1.8e-16}],
///     "config": {"numsys": "log"}
/// }"#).unwrap();
/// let solution = task.run().unwrap().solution;
/// assert!(solution.is_success());
/// ```
pub mod load_from_file;
