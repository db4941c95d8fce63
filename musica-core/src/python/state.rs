//! Python bindings for solvers and grid-cell indexed state
//!
//! ```python
//! from musica._musica.core import Solver
//!
//! solver = Solver(["O3", "NO"], ["LOSS.O3"], solver_type="rosenbrock", vector_width=3)
//! state = solver.create_state(number_of_grid_cells=7)
//! state.set_conditions(temperatures=[300.0] * 7, pressures=[101325.0] * 7)
//! state.set_concentrations({"O3": [10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0]})
//! result = solver.solve(state, 60.0)
//! ```

use crate::config::SolverConfig;
use crate::memory::{MemorySegment, MemorySolver};
use crate::solver::{SolverResult, SolverType};
use crate::state::{CellValues, State};
use numpy::PyReadonlyArray1;
use pyo3::exceptions::{PyTypeError, PyValueError};
use pyo3::prelude::*;
use pythonize::pythonize;
use std::collections::HashMap;
use std::sync::Arc;

impl<'py> FromPyObject<'py> for CellValues {
    fn extract_bound(ob: &Bound<'py, PyAny>) -> PyResult<Self> {
        if let Ok(value) = ob.extract::<f64>() {
            return Ok(CellValues::Scalar(value));
        }
        if let Ok(array) = ob.extract::<PyReadonlyArray1<f64>>() {
            return Ok(CellValues::Sequence(array.as_array().to_vec()));
        }
        ob.extract::<Vec<f64>>()
            .map(CellValues::Sequence)
            .map_err(|_| {
                PyTypeError::new_err("values must be a float, a sequence of floats or a 1-D array")
            })
    }
}

/// A chemistry solver together with the mechanism it was built for.
///
/// Parameters
/// ----------
/// species : list[str]
///     Species names, in slot order.
/// user_defined_rate_parameters : list[str]
///     User-defined rate parameter names, in slot order.
/// solver_type : str
///     One of "rosenbrock", "rosenbrock_standard_order", "backward_euler",
///     "backward_euler_standard_order".
/// vector_width : int, optional
///     Overrides the number of grid cells solved together. Zero or a negative
///     value keeps every grid cell in a single segment.
#[pyclass(name = "Solver", module = "musica._musica.core")]
#[derive(Clone)]
pub struct PySolver(pub Arc<MemorySolver>);

#[pymethods]
impl PySolver {
    #[new]
    #[pyo3(signature = (species, user_defined_rate_parameters=Vec::new(), solver_type="rosenbrock", vector_width=None))]
    fn new(
        species: Vec<String>,
        user_defined_rate_parameters: Vec<String>,
        solver_type: &str,
        vector_width: Option<i64>,
    ) -> PyResult<Self> {
        let config = SolverConfig {
            solver_type: solver_type.parse::<SolverType>()?,
            vector_width,
            species,
            user_defined_rate_parameters,
        };
        config.validate()?;
        Ok(Self(Arc::new(MemorySolver::from_config(&config)?)))
    }

    /// Build a solver from a TOML configuration string.
    #[staticmethod]
    fn from_toml(text: &str) -> PyResult<Self> {
        let config = SolverConfig::from_toml_str(text)?;
        Ok(Self(Arc::new(MemorySolver::from_config(&config)?)))
    }

    #[getter]
    fn solver_type(&self) -> String {
        self.0.solver_type().to_string()
    }

    /// Create a state holding `number_of_grid_cells` independent grid cells.
    #[pyo3(signature = (number_of_grid_cells=1))]
    fn create_state(&self, number_of_grid_cells: usize) -> PyResult<PyState> {
        Ok(PyState {
            state: State::new(self.0.as_ref(), number_of_grid_cells)?,
            solver: Arc::clone(&self.0),
        })
    }

    /// Advance every grid cell of `state` by `time_step` seconds.
    fn solve(&self, mut state: PyRefMut<'_, PyState>, time_step: f64) -> PyResult<PySolverResult> {
        if !Arc::ptr_eq(&self.0, &state.solver) {
            return Err(PyValueError::new_err("state was created by a different solver"));
        }
        let result = state.state.solve(self.0.as_ref(), time_step)?;
        Ok(PySolverResult(result))
    }

    fn __repr__(&self) -> String {
        format!("Solver(solver_type='{}')", self.0.solver_type())
    }
}

/// Simulation state addressed by grid cell index.
///
/// Values are passed as a float (only when there is a single grid cell), a
/// list of floats or a 1-D numpy array with one entry per grid cell.
#[pyclass(name = "State", module = "musica._musica.core")]
pub struct PyState {
    state: State<MemorySegment>,
    solver: Arc<MemorySolver>,
}

#[pymethods]
impl PyState {
    /// Set concentrations for the given species. Other species are left unchanged.
    ///
    /// Raises
    /// ------
    /// KeyError
    ///     If a species is not part of the mechanism.
    /// ValueError
    ///     If a value does not have one entry per grid cell.
    fn set_concentrations(&mut self, concentrations: HashMap<String, CellValues>) -> PyResult<()> {
        self.state.set_concentrations(&concentrations)?;
        Ok(())
    }

    fn get_concentrations(&self) -> HashMap<String, Vec<f64>> {
        self.state.get_concentrations()
    }

    /// Set the given user-defined rate parameters. Other parameters are left unchanged.
    fn set_user_defined_rate_parameters(
        &mut self,
        user_defined_rate_parameters: HashMap<String, CellValues>,
    ) -> PyResult<()> {
        self.state.set_user_defined_rate_parameters(&user_defined_rate_parameters)?;
        Ok(())
    }

    fn get_user_defined_rate_parameters(&self) -> HashMap<String, Vec<f64>> {
        self.state.get_user_defined_rate_parameters()
    }

    /// Set temperatures [K], pressures [Pa] and air densities [mol m-3].
    ///
    /// Omitted fields keep their values. If air densities are omitted they are
    /// derived from the ideal gas law.
    #[pyo3(signature = (temperatures=None, pressures=None, air_densities=None))]
    fn set_conditions(
        &mut self,
        temperatures: Option<CellValues>,
        pressures: Option<CellValues>,
        air_densities: Option<CellValues>,
    ) -> PyResult<()> {
        self.state.set_conditions(
            temperatures.as_ref(),
            pressures.as_ref(),
            air_densities.as_ref(),
        )?;
        Ok(())
    }

    /// Return a dict with "temperature", "pressure" and "air_density" lists.
    fn get_conditions(&self, py: Python<'_>) -> PyResult<PyObject> {
        Ok(pythonize(py, &self.state.get_conditions())?)
    }

    fn get_species_ordering(&self) -> HashMap<String, usize> {
        self.state.species_ordering().to_map()
    }

    fn get_user_defined_rate_parameters_ordering(&self) -> HashMap<String, usize> {
        self.state.user_defined_rate_parameters_ordering().to_map()
    }

    fn get_number_of_grid_cells(&self) -> usize {
        self.state.number_of_grid_cells()
    }

    fn get_segment_sizes(&self) -> Vec<usize> {
        self.state.segment_sizes()
    }

    fn __repr__(&self) -> String {
        format!(
            "State(number_of_grid_cells={}, segments={:?})",
            self.state.number_of_grid_cells(),
            self.state.segment_sizes()
        )
    }
}

/// Merged outcome of solving every segment of a state.
#[pyclass(name = "SolverResult", module = "musica._musica.core")]
#[derive(Clone, Debug)]
pub struct PySolverResult(pub SolverResult);

#[pymethods]
impl PySolverResult {
    #[getter]
    fn state(&self) -> String {
        self.0.state.to_string()
    }

    #[getter]
    fn converged(&self) -> bool {
        self.0.state.is_converged()
    }

    /// Solver counters as a dict.
    #[getter]
    fn stats(&self, py: Python<'_>) -> PyResult<PyObject> {
        Ok(pythonize(py, &self.0.stats)?)
    }

    fn __repr__(&self) -> String {
        format!("SolverResult(state='{}')", self.0.state)
    }
}
