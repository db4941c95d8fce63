//! In-process solver backend
//!
//! [`MemorySolver`] allocates [`MemorySegment`]s with the same memory layouts a
//! compiled solver uses: vector-ordered segments store each slot as a block of
//! `lanes` consecutive cells, standard-ordered segments store each cell as a row of slots.
//! Its `solve` only applies user-defined first-order terms:
//!
//! - `LOSS.<species>`: $c \leftarrow c \, e^{-k \Delta t}$
//! - `EMIS.<species>`: $c \leftarrow c + k \Delta t$

use crate::conditions::Conditions;
use crate::config::SolverConfig;
use crate::errors::{MusicaError, MusicaResult};
use crate::ordering::NameIndexOrdering;
use crate::partition::VectorWidth;
use crate::segment::{read_value, write_value, Field, Segment, Strides};
use crate::solver::{Solver, SolverResult, SolverState, SolverStats, SolverType};
use ndarray::Array2;
use std::collections::HashMap;
use std::sync::Arc;

const LOSS_PREFIX: &str = "LOSS.";
const EMISSION_PREFIX: &str = "EMIS.";

/// Memory layout of a segment's per-slot arrays
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Layout {
    /// Shape (slots, lanes); partial segments are padded to `lanes`
    Vector { lanes: usize },
    /// Shape (cells, slots)
    Standard,
}

impl Layout {
    fn allocate(&self, slots: usize, cells: usize) -> Array2<f64> {
        match self {
            Layout::Vector { lanes } => Array2::zeros((slots, *lanes)),
            Layout::Standard => Array2::zeros((cells, slots)),
        }
    }

    fn strides(&self, array: &Array2<f64>) -> Strides {
        let strides = array.strides();
        match self {
            Layout::Vector { .. } => Strides::new(strides[1] as usize, strides[0] as usize),
            Layout::Standard => Strides::new(strides[0] as usize, strides[1] as usize),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Term {
    Loss,
    Emission,
}

/// A first-order term driven by a user-defined rate parameter
#[derive(Copy, Clone, Debug, PartialEq)]
struct FirstOrderTerm {
    term: Term,
    species: usize,
    parameter: usize,
}

#[derive(Debug, Clone)]
pub struct MemorySegment {
    layout: Layout,
    cell_count: usize,
    species: Arc<NameIndexOrdering>,
    rate_parameters: Arc<NameIndexOrdering>,
    concentrations: Array2<f64>,
    rate_parameter_values: Array2<f64>,
    conditions: Vec<Conditions>,
}

impl MemorySegment {
    pub fn layout(&self) -> Layout {
        self.layout
    }

    fn array(&self, field: Field) -> &Array2<f64> {
        match field {
            Field::Concentrations => &self.concentrations,
            Field::RateParameters => &self.rate_parameter_values,
        }
    }
}

impl Segment for MemorySegment {
    fn cell_count(&self) -> usize {
        self.cell_count
    }

    fn strides(&self, field: Field) -> Strides {
        self.layout.strides(self.array(field))
    }

    fn species_ordering(&self) -> HashMap<String, usize> {
        self.species.to_map()
    }

    fn rate_parameters_ordering(&self) -> HashMap<String, usize> {
        self.rate_parameters.to_map()
    }

    fn conditions(&self) -> &[Conditions] {
        &self.conditions
    }

    fn conditions_mut(&mut self) -> &mut [Conditions] {
        &mut self.conditions
    }

    fn values(&self, field: Field) -> &[f64] {
        // Arrays built by `Array2::zeros` are always contiguous
        self.array(field).as_slice_memory_order().unwrap_or_default()
    }

    fn values_mut(&mut self, field: Field) -> &mut [f64] {
        let array = match field {
            Field::Concentrations => &mut self.concentrations,
            Field::RateParameters => &mut self.rate_parameter_values,
        };
        array.as_slice_memory_order_mut().unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct MemorySolver {
    solver_type: SolverType,
    vector_width: VectorWidth,
    species: Arc<NameIndexOrdering>,
    rate_parameters: Arc<NameIndexOrdering>,
    terms: Vec<FirstOrderTerm>,
}

impl MemorySolver {
    pub fn new(
        solver_type: SolverType,
        vector_width: VectorWidth,
        species: NameIndexOrdering,
        rate_parameters: NameIndexOrdering,
    ) -> MusicaResult<Self> {
        let mut terms = Vec::new();
        for (parameter, name) in rate_parameters.names().iter().enumerate() {
            let (term, target) = if let Some(target) = name.strip_prefix(LOSS_PREFIX) {
                (Term::Loss, target)
            } else if let Some(target) = name.strip_prefix(EMISSION_PREFIX) {
                (Term::Emission, target)
            } else {
                continue;
            };
            let slot = species.index_of(target).map_err(|_| {
                MusicaError::InvalidConfiguration(format!(
                    "rate parameter '{}' refers to unknown species '{}'",
                    name, target
                ))
            })?;
            terms.push(FirstOrderTerm {
                term,
                species: slot,
                parameter,
            });
        }

        Ok(Self {
            solver_type,
            vector_width,
            species: Arc::new(species),
            rate_parameters: Arc::new(rate_parameters),
            terms,
        })
    }

    pub fn from_config(config: &SolverConfig) -> MusicaResult<Self> {
        Self::new(
            config.solver_type,
            config.vector_width(),
            config.species_ordering()?,
            config.rate_parameters_ordering()?,
        )
    }

    pub fn solver_type(&self) -> SolverType {
        self.solver_type
    }

    fn layout_for(&self, number_of_grid_cells: usize) -> Layout {
        if self.solver_type.is_vector_ordered() {
            Layout::Vector {
                lanes: self.vector_width.effective(number_of_grid_cells),
            }
        } else {
            Layout::Standard
        }
    }
}

impl Solver for MemorySolver {
    type Segment = MemorySegment;

    fn vector_width(&self) -> VectorWidth {
        self.vector_width
    }

    fn create_segment(&self, number_of_grid_cells: usize) -> MusicaResult<MemorySegment> {
        let layout = self.layout_for(number_of_grid_cells);
        if let Layout::Vector { lanes } = layout {
            if number_of_grid_cells > lanes {
                return Err(MusicaError::InvalidConfiguration(format!(
                    "segment of {} grid cells does not fit a vector width of {}",
                    number_of_grid_cells, lanes
                )));
            }
        }

        Ok(MemorySegment {
            layout,
            cell_count: number_of_grid_cells,
            species: Arc::clone(&self.species),
            rate_parameters: Arc::clone(&self.rate_parameters),
            concentrations: layout.allocate(self.species.len(), number_of_grid_cells),
            rate_parameter_values: layout
                .allocate(self.rate_parameters.len(), number_of_grid_cells),
            conditions: vec![Conditions::default(); number_of_grid_cells],
        })
    }

    fn solve(&self, segment: &mut MemorySegment, time_step: f64) -> MusicaResult<SolverResult> {
        let mut state = SolverState::Converged;
        for cell in 0..segment.cell_count() {
            for term in &self.terms {
                let rate = read_value(&*segment, Field::RateParameters, term.parameter, cell);
                let current = read_value(&*segment, Field::Concentrations, term.species, cell);
                let updated = match term.term {
                    Term::Loss => current * (-rate * time_step).exp(),
                    Term::Emission => current + rate * time_step,
                };
                write_value(segment, Field::Concentrations, term.species, cell, updated);
            }
        }

        for cell in 0..segment.cell_count() {
            for species in 0..self.species.len() {
                let value = read_value(&*segment, Field::Concentrations, species, cell);
                if value.is_nan() {
                    state = SolverState::NaNDetected;
                } else if value.is_infinite() && state.is_converged() {
                    state = SolverState::InfDetected;
                }
            }
        }

        Ok(SolverResult {
            state,
            stats: SolverStats {
                number_of_steps: 1,
                accepted: u64::from(state.is_converged()),
                rejected: u64::from(!state.is_converged()),
                final_time: time_step,
            },
        })
    }
}
