/// Protolysis of ammonia in water: the walk-through of assembling and solving an
/// equilibrium system in different numerical formulations
pub mod ammonia_examples;
