use crate::conditions::{derive_air_density, GAS_CONSTANT};
use crate::errors::MusicaError;
use pyo3::exceptions::{PyKeyError, PyValueError};
use pyo3::prelude::*;

pub mod state;

pub use state::{PySolver, PySolverResult, PyState};

impl From<MusicaError> for PyErr {
    fn from(error: MusicaError) -> PyErr {
        match error {
            MusicaError::UnknownSpecies(_) | MusicaError::UnknownRateParameter(_) => {
                PyKeyError::new_err(error.to_string())
            }
            _ => PyValueError::new_err(error.to_string()),
        }
    }
}

/// Air density [mol m-3] from pressure [Pa] and temperature [K]
#[pyfunction]
#[pyo3(name = "derive_air_density")]
fn py_derive_air_density(pressure: f64, temperature: f64) -> f64 {
    derive_air_density(pressure, temperature)
}

#[pymodule]
pub fn core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PySolver>()?;
    m.add_class::<PyState>()?;
    m.add_class::<PySolverResult>()?;
    m.add_function(wrap_pyfunction!(py_derive_air_density, m)?)?;
    m.add("GAS_CONSTANT", GAS_CONSTANT)?;
    Ok(())
}
