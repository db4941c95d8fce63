//! Per grid cell environmental conditions

use serde::{Deserialize, Serialize};

/// Ideal gas constant
/// unit: J / K / mol
pub const GAS_CONSTANT: f64 = 8.314462618;

/// Air density from the ideal gas law
///
/// $$ n = \frac{P}{R T} $$
///
/// No range checking is done; a zero temperature yields an infinite density.
pub fn derive_air_density(pressure: f64, temperature: f64) -> f64 {
    pressure / (GAS_CONSTANT * temperature)
}

/// Environmental conditions of a single grid cell
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Conditions {
    /// unit: K
    pub temperature: f64,
    /// unit: Pa
    pub pressure: f64,
    /// unit: mol / m^3
    pub air_density: f64,
}

impl Conditions {
    /// Recompute the air density from the current temperature and pressure
    pub fn update_air_density(&mut self) {
        self.air_density = derive_air_density(self.pressure, self.temperature);
    }
}
