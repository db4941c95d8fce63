//! Solver-owned blocks of grid cells and strided access into them
//!
//! A [`Segment`] holds the state of up to one vector width of grid cells.
//! Its arrays are laid out however the solver prefers (interleaved blocks for
//! vector-ordered solvers, row-major for standard-ordered ones), so values are only
//! ever addressed through the [`Strides`] the segment reports for each [`Field`].

use crate::conditions::Conditions;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Addressable per-slot arrays of a segment
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    Concentrations,
    RateParameters,
}

/// Offset multipliers for one field of one segment
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strides {
    /// Distance between neighbouring grid cells of the same slot
    pub cell: usize,
    /// Distance between neighbouring slots of the same grid cell
    pub field: usize,
}

impl Strides {
    pub fn new(cell: usize, field: usize) -> Self {
        Self { cell, field }
    }

    /// Flat offset of (`slot`, `cell`) in the backing array
    pub fn offset(&self, slot: usize, cell: usize) -> usize {
        slot * self.field + cell * self.cell
    }
}

/// Capabilities a solver segment must expose
///
/// Orderings are reported as raw mappings because they come straight from the solver.
/// [`State`](crate::state::State) captures them once from the first segment.
pub trait Segment {
    /// Number of grid cells stored in this segment
    fn cell_count(&self) -> usize;

    /// Strides of `field` in the backing array returned by [`Segment::values`]
    fn strides(&self, field: Field) -> Strides;

    fn species_ordering(&self) -> HashMap<String, usize>;

    fn rate_parameters_ordering(&self) -> HashMap<String, usize>;

    /// One record per grid cell, in local cell order
    fn conditions(&self) -> &[Conditions];

    fn conditions_mut(&mut self) -> &mut [Conditions];

    /// Backing storage of `field`
    fn values(&self, field: Field) -> &[f64];

    fn values_mut(&mut self, field: Field) -> &mut [f64];
}

/// Read the value of (`slot`, `cell`) from `field`
///
/// Strides are queried from the segment on every call.
///
/// # Panics
/// Panics if the computed offset is outside of the segment's backing array.
pub fn read_value<S: Segment + ?Sized>(segment: &S, field: Field, slot: usize, cell: usize) -> f64 {
    debug_assert!(cell < segment.cell_count());
    let offset = segment.strides(field).offset(slot, cell);
    segment.values(field)[offset]
}

/// Write `value` to (`slot`, `cell`) of `field`
///
/// # Panics
/// Panics if the computed offset is outside of the segment's backing array.
pub fn write_value<S: Segment + ?Sized>(
    segment: &mut S,
    field: Field,
    slot: usize,
    cell: usize,
    value: f64,
) {
    debug_assert!(cell < segment.cell_count());
    let offset = segment.strides(field).offset(slot, cell);
    segment.values_mut(field)[offset] = value;
}
