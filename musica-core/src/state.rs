//! Grid-cell indexed access to segmented solver state
//!
//! A [`State`] owns the segments a solver allocated for `N` grid cells and
//! translates logical grid cell indices `0..N` into (segment, local cell) pairs.
//! Every scatter and gather walks the segments in partition order and the cells of
//! each segment in local order, with a single running grid cell counter.
//! Logical cell `k` therefore always maps to the same physical location.
//!
//! # Examples
//!
//! ```rust
//! use musica_core::memory::MemorySolver;
//! use musica_core::ordering::{NameIndexOrdering, OrderingKind};
//! use musica_core::partition::VectorWidth;
//! use musica_core::solver::SolverType;
//! use musica_core::state::{CellValues, State};
//! use std::collections::HashMap;
//!
//! let solver = MemorySolver::new(
//!     SolverType::Rosenbrock,
//!     VectorWidth::from_raw(3),
//!     NameIndexOrdering::from_names(OrderingKind::Species, ["O3", "NO"]).unwrap(),
//!     NameIndexOrdering::from_names(OrderingKind::RateParameter, Vec::<String>::new()).unwrap(),
//! )
//! .unwrap();
//! let mut state = State::new(&solver, 7).unwrap();
//! assert_eq!(state.segment_sizes(), vec![3, 3, 1]);
//!
//! let o3: Vec<f64> = (10..17).map(f64::from).collect();
//! state
//!     .set_concentrations(&HashMap::from([("O3".to_string(), CellValues::from(o3.clone()))]))
//!     .unwrap();
//! assert_eq!(state.get_concentrations()["O3"], o3);
//! ```

use crate::conditions::Conditions;
use crate::errors::{MusicaError, MusicaResult};
use crate::ordering::{NameIndexOrdering, OrderingKind};
use crate::partition::{partition, VectorWidth};
use crate::segment::{Field, Segment};
use crate::solver::{Solver, SolverResult};
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per grid cell values for one name
///
/// A bare scalar is only accepted when the state has exactly one grid cell.
/// There is no broadcasting: larger states need one value per grid cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValues {
    Scalar(f64),
    Sequence(Vec<f64>),
}

impl CellValues {
    /// Values for each of `number_of_grid_cells` cells, in logical order
    fn for_grid_cells(&self, name: &str, number_of_grid_cells: usize) -> MusicaResult<&[f64]> {
        let values = match self {
            CellValues::Scalar(value) => std::slice::from_ref(value),
            CellValues::Sequence(values) => values.as_slice(),
        };
        if values.len() != number_of_grid_cells {
            return Err(MusicaError::LengthMismatch {
                name: name.to_string(),
                expected: number_of_grid_cells,
                found: values.len(),
            });
        }
        Ok(values)
    }
}

impl From<f64> for CellValues {
    fn from(value: f64) -> Self {
        CellValues::Scalar(value)
    }
}

impl From<Vec<f64>> for CellValues {
    fn from(values: Vec<f64>) -> Self {
        CellValues::Sequence(values)
    }
}

impl From<&[f64]> for CellValues {
    fn from(values: &[f64]) -> Self {
        CellValues::Sequence(values.to_vec())
    }
}

impl From<ndarray::Array1<f64>> for CellValues {
    fn from(values: ndarray::Array1<f64>) -> Self {
        CellValues::Sequence(values.to_vec())
    }
}

/// Conditions of every grid cell, one field at a time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionsSeries {
    /// unit: K
    pub temperature: Vec<f64>,
    /// unit: Pa
    pub pressure: Vec<f64>,
    /// unit: mol / m^3
    pub air_density: Vec<f64>,
}

/// Simulation state of `N` grid cells spread over solver segments
#[derive(Debug)]
pub struct State<S: Segment> {
    number_of_grid_cells: usize,
    vector_width: VectorWidth,
    segments: Vec<S>,
    species: NameIndexOrdering,
    rate_parameters: NameIndexOrdering,
}

impl<S: Segment> State<S> {
    /// Allocate segments for `number_of_grid_cells` cells
    ///
    /// Orderings are captured from the first segment and checked once against
    /// every other segment.
    pub fn new<V>(solver: &V, number_of_grid_cells: usize) -> MusicaResult<Self>
    where
        V: Solver<Segment = S>,
    {
        let vector_width = solver.vector_width();
        let sizes = partition(number_of_grid_cells, vector_width)?;
        let segments = sizes
            .iter()
            .map(|&size| solver.create_segment(size))
            .collect::<MusicaResult<Vec<_>>>()?;

        let covered: usize = segments.iter().map(Segment::cell_count).sum();
        if covered != number_of_grid_cells {
            return Err(MusicaError::SegmentCountMismatch {
                expected: number_of_grid_cells,
                found: covered,
            });
        }
        // Same total, different split: cells would land in the wrong segment
        if let Some((index, (segment, &size))) = segments
            .iter()
            .zip(&sizes)
            .enumerate()
            .find(|(_, (segment, size))| segment.cell_count() != **size)
        {
            return Err(MusicaError::SegmentSizeMismatch {
                segment: index,
                expected: size,
                found: segment.cell_count(),
            });
        }

        let first = segments
            .first()
            .ok_or(MusicaError::SegmentCountMismatch {
                expected: number_of_grid_cells,
                found: 0,
            })?;
        let species = NameIndexOrdering::new(OrderingKind::Species, first.species_ordering())?;
        let rate_parameters = NameIndexOrdering::new(
            OrderingKind::RateParameter,
            first.rate_parameters_ordering(),
        )?;

        for (index, segment) in segments.iter().enumerate().skip(1) {
            let reported = [
                (&species, segment.species_ordering()),
                (&rate_parameters, segment.rate_parameters_ordering()),
            ];
            for (ordering, indices) in reported {
                if !ordering.matches(&indices) {
                    return Err(MusicaError::OrderingMismatch {
                        segment: index,
                        kind: ordering.kind(),
                    });
                }
            }
        }

        debug!(
            "Created state with {} grid cells (vector width {}, segments {:?}, {} species, {} rate parameters)",
            number_of_grid_cells,
            vector_width,
            sizes,
            species.len(),
            rate_parameters.len()
        );

        Ok(Self {
            number_of_grid_cells,
            vector_width,
            segments,
            species,
            rate_parameters,
        })
    }

    pub fn number_of_grid_cells(&self) -> usize {
        self.number_of_grid_cells
    }

    pub fn vector_width(&self) -> VectorWidth {
        self.vector_width
    }

    /// Number of grid cells held by each segment, in partition order
    pub fn segment_sizes(&self) -> Vec<usize> {
        self.segments.iter().map(Segment::cell_count).collect()
    }

    pub fn segments(&self) -> &[S] {
        &self.segments
    }

    pub fn species_ordering(&self) -> &NameIndexOrdering {
        &self.species
    }

    pub fn user_defined_rate_parameters_ordering(&self) -> &NameIndexOrdering {
        &self.rate_parameters
    }

    /// Set concentrations of the given species
    ///
    /// Species missing from `values` keep their current concentrations.
    /// Every entry is validated before anything is written.
    pub fn set_concentrations(&mut self, values: &HashMap<String, CellValues>) -> MusicaResult<()> {
        self.scatter(Field::Concentrations, values)
    }

    /// Concentrations of every species, one value per grid cell
    pub fn get_concentrations(&self) -> HashMap<String, Vec<f64>> {
        self.gather(Field::Concentrations)
    }

    /// Set the given user-defined rate parameters, leaving the others unchanged
    pub fn set_user_defined_rate_parameters(
        &mut self,
        values: &HashMap<String, CellValues>,
    ) -> MusicaResult<()> {
        self.scatter(Field::RateParameters, values)
    }

    pub fn get_user_defined_rate_parameters(&self) -> HashMap<String, Vec<f64>> {
        self.gather(Field::RateParameters)
    }

    /// Update the environmental conditions
    ///
    /// Omitted fields keep their current values. When `air_densities` is omitted but
    /// temperatures or pressures are given, each cell's air density is derived from its
    /// updated temperature and pressure.
    pub fn set_conditions(
        &mut self,
        temperatures: Option<&CellValues>,
        pressures: Option<&CellValues>,
        air_densities: Option<&CellValues>,
    ) -> MusicaResult<()> {
        let n = self.number_of_grid_cells;
        let temperatures = temperatures
            .map(|values| values.for_grid_cells("temperature", n))
            .transpose()?;
        let pressures = pressures
            .map(|values| values.for_grid_cells("pressure", n))
            .transpose()?;
        let air_densities = air_densities
            .map(|values| values.for_grid_cells("air_density", n))
            .transpose()?;
        let derive_density =
            air_densities.is_none() && (temperatures.is_some() || pressures.is_some());

        let mut cell = 0;
        for segment in &mut self.segments {
            let count = segment.cell_count();
            let records = segment.conditions_mut();
            for record in &mut records[..count] {
                update_conditions(
                    record,
                    temperatures.map(|values| values[cell]),
                    pressures.map(|values| values[cell]),
                    air_densities.map(|values| values[cell]),
                    derive_density,
                );
                cell += 1;
            }
        }
        Ok(())
    }

    pub fn get_conditions(&self) -> ConditionsSeries {
        let n = self.number_of_grid_cells;
        let mut series = ConditionsSeries {
            temperature: Vec::with_capacity(n),
            pressure: Vec::with_capacity(n),
            air_density: Vec::with_capacity(n),
        };
        for segment in &self.segments {
            for record in &segment.conditions()[..segment.cell_count()] {
                series.temperature.push(record.temperature);
                series.pressure.push(record.pressure);
                series.air_density.push(record.air_density);
            }
        }
        series
    }

    /// Advance every segment by `time_step` seconds
    ///
    /// Segments are solved in partition order and their results merged with
    /// [`SolverResult::merge`]. The first solver error is returned as is.
    pub fn solve<V>(&mut self, solver: &V, time_step: f64) -> MusicaResult<SolverResult>
    where
        V: Solver<Segment = S>,
    {
        debug!(
            "Solving {} grid cells in {} segments over {} s",
            self.number_of_grid_cells,
            self.segments.len(),
            time_step
        );
        let mut merged: Option<SolverResult> = None;
        for (index, segment) in self.segments.iter_mut().enumerate() {
            let result = solver.solve(segment, time_step)?;
            if !result.state.is_converged() {
                warn!("Segment {} finished with solver state '{}'", index, result.state);
            }
            merged = Some(match merged {
                Some(previous) => previous.merge(result),
                None => result,
            });
        }
        Ok(merged.unwrap_or_default())
    }

    fn ordering(&self, field: Field) -> &NameIndexOrdering {
        match field {
            Field::Concentrations => &self.species,
            Field::RateParameters => &self.rate_parameters,
        }
    }

    fn scatter(&mut self, field: Field, values: &HashMap<String, CellValues>) -> MusicaResult<()> {
        let n = self.number_of_grid_cells;
        let ordering = self.ordering(field);
        let writes = values
            .iter()
            .map(|(name, cell_values)| {
                let slot = ordering.index_of(name)?;
                Ok::<_, MusicaError>((slot, cell_values.for_grid_cells(name, n)?))
            })
            .collect::<MusicaResult<Vec<_>>>()?;

        trace!("Writing {} entries to {:?}", writes.len(), field);
        for (slot, cells) in writes {
            self.write_slot(field, slot, cells);
        }
        Ok(())
    }

    fn write_slot(&mut self, field: Field, slot: usize, cells: &[f64]) {
        let mut cell = 0;
        for segment in &mut self.segments {
            let strides = segment.strides(field);
            let count = segment.cell_count();
            let data = segment.values_mut(field);
            for local in 0..count {
                data[strides.offset(slot, local)] = cells[cell];
                cell += 1;
            }
        }
    }

    fn gather(&self, field: Field) -> HashMap<String, Vec<f64>> {
        let ordering = self.ordering(field);
        trace!("Reading {} entries from {:?}", ordering.len(), field);
        ordering
            .names()
            .iter()
            .enumerate()
            .map(|(slot, name)| (name.clone(), self.read_slot(field, slot)))
            .collect()
    }

    fn read_slot(&self, field: Field, slot: usize) -> Vec<f64> {
        let mut cells = Vec::with_capacity(self.number_of_grid_cells);
        for segment in &self.segments {
            let strides = segment.strides(field);
            let data = segment.values(field);
            cells.extend((0..segment.cell_count()).map(|local| data[strides.offset(slot, local)]));
        }
        cells
    }
}

fn update_conditions(
    record: &mut Conditions,
    temperature: Option<f64>,
    pressure: Option<f64>,
    air_density: Option<f64>,
    derive_density: bool,
) {
    if let Some(temperature) = temperature {
        record.temperature = temperature;
    }
    if let Some(pressure) = pressure {
        record.pressure = pressure;
    }
    if let Some(air_density) = air_density {
        record.air_density = air_density;
    } else if derive_density {
        record.update_air_density();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::Strides;
    use crate::solver::{SolverState, SolverStats};
    use std::cell::Cell;
    use std::num::NonZeroUsize;

    const SPECIES: [&str; 3] = ["A", "B", "C"];
    const PARAMETERS: [&str; 2] = ["k1", "k2"];

    /// Slots two apart, cells padded by one unused value
    struct SpreadSegment {
        cell_count: usize,
        species: HashMap<String, usize>,
        parameters: HashMap<String, usize>,
        concentrations: Vec<f64>,
        rate_parameters: Vec<f64>,
        conditions: Vec<Conditions>,
    }

    fn spread_strides(slots: usize) -> Strides {
        Strides::new(2 * slots + 1, 2)
    }

    impl Segment for SpreadSegment {
        fn cell_count(&self) -> usize {
            self.cell_count
        }

        fn strides(&self, field: Field) -> Strides {
            match field {
                Field::Concentrations => spread_strides(self.species.len()),
                Field::RateParameters => spread_strides(self.parameters.len()),
            }
        }

        fn species_ordering(&self) -> HashMap<String, usize> {
            self.species.clone()
        }

        fn rate_parameters_ordering(&self) -> HashMap<String, usize> {
            self.parameters.clone()
        }

        fn conditions(&self) -> &[Conditions] {
            &self.conditions
        }

        fn conditions_mut(&mut self) -> &mut [Conditions] {
            &mut self.conditions
        }

        fn values(&self, field: Field) -> &[f64] {
            match field {
                Field::Concentrations => &self.concentrations,
                Field::RateParameters => &self.rate_parameters,
            }
        }

        fn values_mut(&mut self, field: Field) -> &mut [f64] {
            match field {
                Field::Concentrations => &mut self.concentrations,
                Field::RateParameters => &mut self.rate_parameters,
            }
        }
    }

    #[derive(Default)]
    struct SpreadSolver {
        width: usize,
        created: Cell<usize>,
        /// Reverse the species ordering of every segment but the first
        reorder_later_segments: bool,
        /// Every segment holds one cell fewer than requested
        short_segments: bool,
        /// Cell counts reported by each segment instead of the requested ones
        reported_sizes: Option<Vec<usize>>,
    }

    fn indices(names: &[&str]) -> HashMap<String, usize> {
        names
            .iter()
            .enumerate()
            .map(|(index, name)| (name.to_string(), index))
            .collect()
    }

    impl Solver for SpreadSolver {
        type Segment = SpreadSegment;

        fn vector_width(&self) -> VectorWidth {
            NonZeroUsize::new(self.width).map_or(VectorWidth::Unpartitioned, VectorWidth::Lanes)
        }

        fn create_segment(&self, number_of_grid_cells: usize) -> MusicaResult<SpreadSegment> {
            let index = self.created.get();
            self.created.set(index + 1);
            let species = if index > 0 && self.reorder_later_segments {
                let mut reversed = SPECIES;
                reversed.reverse();
                indices(&reversed)
            } else {
                indices(&SPECIES)
            };
            let cell_count = match &self.reported_sizes {
                Some(sizes) => sizes[index],
                None if self.short_segments => number_of_grid_cells - 1,
                None => number_of_grid_cells,
            };
            Ok(SpreadSegment {
                cell_count,
                concentrations: vec![0.0; cell_count * spread_strides(SPECIES.len()).cell],
                rate_parameters: vec![0.0; cell_count * spread_strides(PARAMETERS.len()).cell],
                species,
                parameters: indices(&PARAMETERS),
                conditions: vec![Conditions::default(); cell_count],
            })
        }

        fn solve(&self, segment: &mut SpreadSegment, time_step: f64) -> MusicaResult<SolverResult> {
            let state = if segment.cell_count == 1 {
                SolverState::StepSizeTooSmall
            } else {
                SolverState::Converged
            };
            Ok(SolverResult {
                state,
                stats: SolverStats {
                    number_of_steps: segment.cell_count as u64,
                    accepted: 0,
                    rejected: 0,
                    final_time: time_step,
                },
            })
        }
    }

    fn spread_state(width: usize, cells: usize) -> State<SpreadSegment> {
        let solver = SpreadSolver {
            width,
            ..Default::default()
        };
        State::new(&solver, cells).unwrap()
    }

    fn entries(pairs: &[(&str, CellValues)]) -> HashMap<String, CellValues> {
        pairs
            .iter()
            .map(|(name, values)| (name.to_string(), values.clone()))
            .collect()
    }

    #[test]
    fn test_roundtrip_through_unusual_strides() {
        let mut state = spread_state(3, 7);
        assert_eq!(state.segment_sizes(), vec![3, 3, 1]);

        let b: Vec<f64> = (10..17).map(f64::from).collect();
        state
            .set_concentrations(&entries(&[("B", b.clone().into())]))
            .unwrap();

        let concentrations = state.get_concentrations();
        assert_eq!(concentrations["B"], b);
        assert_eq!(concentrations["A"], vec![0.0; 7]);
        assert_eq!(concentrations.len(), 3);

        // The last segment's only cell holds the last logical value
        let last = &state.segments()[2];
        assert_eq!(last.concentrations[spread_strides(3).offset(1, 0)], 16.0);
    }

    #[test]
    fn test_rate_parameters_use_their_own_slot_space() {
        let mut state = spread_state(2, 3);
        state
            .set_user_defined_rate_parameters(&entries(&[("k2", vec![1.0, 2.0, 3.0].into())]))
            .unwrap();

        let parameters = state.get_user_defined_rate_parameters();
        assert_eq!(parameters["k2"], vec![1.0, 2.0, 3.0]);
        assert_eq!(parameters["k1"], vec![0.0; 3]);
        assert_eq!(state.get_concentrations()["B"], vec![0.0; 3]);

        let result =
            state.set_user_defined_rate_parameters(&entries(&[("A", CellValues::from(1.0))]));
        assert_eq!(result, Err(MusicaError::UnknownRateParameter("A".to_string())));
    }

    #[test]
    fn test_invalid_entry_blocks_valid_entries() {
        let mut state = spread_state(2, 3);
        let result = state.set_concentrations(&entries(&[
            ("A", vec![1.0, 2.0, 3.0].into()),
            ("B", vec![1.0, 2.0].into()),
        ]));
        assert!(matches!(result, Err(MusicaError::LengthMismatch { .. })));
        assert_eq!(state.get_concentrations()["A"], vec![0.0; 3]);
    }

    #[test]
    fn test_length_mismatch_details() {
        let mut state = spread_state(2, 3);
        let result = state.set_concentrations(&entries(&[("C", CellValues::from(4.0))]));
        assert_eq!(
            result,
            Err(MusicaError::LengthMismatch {
                name: "C".to_string(),
                expected: 3,
                found: 1,
            })
        );
    }

    #[test]
    fn test_conditions_derive_density_only_when_omitted() {
        let mut state = spread_state(2, 2);
        state
            .set_conditions(
                Some(&vec![300.0, 250.0].into()),
                Some(&vec![101325.0, 50000.0].into()),
                None,
            )
            .unwrap();
        let conditions = state.get_conditions();
        assert_eq!(
            conditions.air_density,
            vec![
                crate::conditions::derive_air_density(101325.0, 300.0),
                crate::conditions::derive_air_density(50000.0, 250.0)
            ]
        );

        state
            .set_conditions(None, None, Some(&vec![1.0, 2.0].into()))
            .unwrap();
        let conditions = state.get_conditions();
        assert_eq!(conditions.air_density, vec![1.0, 2.0]);
        assert_eq!(conditions.temperature, vec![300.0, 250.0]);
    }

    #[test]
    fn test_conditions_validated_before_writing() {
        let mut state = spread_state(2, 2);
        let result = state.set_conditions(
            Some(&vec![300.0, 250.0].into()),
            Some(&vec![101325.0].into()),
            None,
        );
        assert!(matches!(result, Err(MusicaError::LengthMismatch { .. })));
        assert_eq!(state.get_conditions().temperature, vec![0.0, 0.0]);
    }

    #[test]
    fn test_ordering_mismatch_detected() {
        let solver = SpreadSolver {
            width: 2,
            reorder_later_segments: true,
            ..Default::default()
        };
        let result = State::new(&solver, 4);
        assert_eq!(
            result.err(),
            Some(MusicaError::OrderingMismatch {
                segment: 1,
                kind: OrderingKind::Species,
            })
        );
    }

    #[test]
    fn test_segment_count_mismatch_detected() {
        let solver = SpreadSolver {
            width: 3,
            short_segments: true,
            ..Default::default()
        };
        let result = State::new(&solver, 5);
        assert_eq!(
            result.err(),
            Some(MusicaError::SegmentCountMismatch {
                expected: 5,
                found: 3,
            })
        );
    }

    #[test]
    fn test_segment_split_mismatch_names_the_segment() {
        let solver = SpreadSolver {
            width: 3,
            reported_sizes: Some(vec![2, 4]),
            ..Default::default()
        };
        let result = State::new(&solver, 6);
        let error = result.err().unwrap();
        assert_eq!(
            error,
            MusicaError::SegmentSizeMismatch {
                segment: 0,
                expected: 3,
                found: 2,
            }
        );
        assert_eq!(
            error.to_string(),
            "Segment 0 holds 2 grid cells but the partition assigned it 3"
        );
    }

    #[test]
    fn test_solve_merges_segment_results() {
        let solver = SpreadSolver {
            width: 2,
            ..Default::default()
        };
        let mut state = State::new(&solver, 5).unwrap();
        let result = state.solve(&solver, 60.0).unwrap();
        assert_eq!(result.state, SolverState::StepSizeTooSmall);
        assert_eq!(result.stats.number_of_steps, 5);
        assert_eq!(result.stats.final_time, 60.0);
    }
}
