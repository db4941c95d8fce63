pub mod conditions;
pub mod config;
pub mod memory;
pub mod ordering;
pub mod partition;
pub mod python;
pub mod segment;
pub mod solver;
pub mod state;

pub mod errors;
