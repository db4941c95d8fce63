//! Splitting grid cells into solver-sized segments
//!
//! Vector-ordered solvers process a fixed number of grid cells at a time.
//! [`partition`] decides how many segments a state needs and how many cells each one holds.
//!
//! ```rust
//! use musica_core::partition::{partition, VectorWidth};
//!
//! let sizes = partition(7, VectorWidth::from_raw(3)).unwrap();
//! assert_eq!(sizes, vec![3, 3, 1]);
//! ```

use crate::errors::{MusicaError, MusicaResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroUsize;

/// Number of grid cells a solver processes together
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VectorWidth {
    /// A single segment holds every grid cell
    Unpartitioned,
    /// Segments hold at most this many grid cells
    Lanes(NonZeroUsize),
}

impl VectorWidth {
    /// Interpret a raw width where zero or a negative value means "no partitioning"
    pub fn from_raw(width: i64) -> Self {
        usize::try_from(width)
            .ok()
            .and_then(NonZeroUsize::new)
            .map_or(VectorWidth::Unpartitioned, VectorWidth::Lanes)
    }

    /// Width actually used for `number_of_grid_cells` cells
    pub fn effective(&self, number_of_grid_cells: usize) -> usize {
        match self {
            VectorWidth::Unpartitioned => number_of_grid_cells,
            VectorWidth::Lanes(lanes) => lanes.get(),
        }
    }
}

impl fmt::Display for VectorWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VectorWidth::Unpartitioned => write!(f, "unpartitioned"),
            VectorWidth::Lanes(lanes) => write!(f, "{}", lanes),
        }
    }
}

/// Segment sizes for `number_of_grid_cells` cells at the given vector width
///
/// Every segment holds exactly `vector_width` cells except possibly the last,
/// which holds the remainder. Cells are assigned in ascending logical order,
/// so segment `i` starts at the sum of the sizes before it.
pub fn partition(number_of_grid_cells: usize, vector_width: VectorWidth) -> MusicaResult<Vec<usize>> {
    if number_of_grid_cells < 1 {
        return Err(MusicaError::InvalidConfiguration(
            "number of grid cells must be at least 1".to_string(),
        ));
    }

    let width = vector_width.effective(number_of_grid_cells);
    let segment_count = number_of_grid_cells.div_ceil(width);
    let sizes = (0..segment_count)
        .map(|segment| width.min(number_of_grid_cells - segment * width))
        .collect();
    Ok(sizes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lanes(width: usize) -> VectorWidth {
        VectorWidth::Lanes(NonZeroUsize::new(width).unwrap())
    }

    #[test]
    fn test_partition_completeness() {
        for n in 1..=40 {
            for v in 1..=12 {
                let sizes = partition(n, lanes(v)).unwrap();
                assert_eq!(sizes.iter().sum::<usize>(), n, "n={n}, v={v}");
                assert_eq!(sizes.len(), n.div_ceil(v), "n={n}, v={v}");
                let (last, leading) = sizes.split_last().unwrap();
                assert!(leading.iter().all(|&size| size == v), "n={n}, v={v}");
                assert!(*last > 0 && *last <= v, "n={n}, v={v}");
            }
        }
    }

    #[test]
    fn test_partition_with_remainder() {
        assert_eq!(partition(7, lanes(3)).unwrap(), vec![3, 3, 1]);
        assert_eq!(partition(8, lanes(4)).unwrap(), vec![4, 4]);
        assert_eq!(partition(2, lanes(5)).unwrap(), vec![2]);
    }

    #[test]
    fn test_partition_without_vector_width() {
        assert_eq!(partition(9, VectorWidth::from_raw(0)).unwrap(), vec![9]);
        assert_eq!(partition(9, VectorWidth::from_raw(-4)).unwrap(), vec![9]);
        assert_eq!(partition(1, VectorWidth::Unpartitioned).unwrap(), vec![1]);
    }

    #[test]
    fn test_partition_rejects_zero_cells() {
        assert!(matches!(
            partition(0, lanes(4)),
            Err(MusicaError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            partition(0, VectorWidth::Unpartitioned),
            Err(MusicaError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_from_raw() {
        assert_eq!(VectorWidth::from_raw(4), lanes(4));
        assert_eq!(VectorWidth::from_raw(0), VectorWidth::Unpartitioned);
        assert_eq!(VectorWidth::from_raw(-1), VectorWidth::Unpartitioned);
        assert_eq!(VectorWidth::Unpartitioned.effective(6), 6);
        assert_eq!(lanes(4).effective(6), 4);
    }
}
