//! Interface to the chemistry solver that owns segment memory
//!
//! The integration itself happens behind [`Solver::solve`]; this crate only
//! creates segments through the solver and hands them back one at a time.

use crate::errors::{MusicaError, MusicaResult};
use crate::partition::VectorWidth;
use crate::segment::Segment;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

/// Lane count used by vector-ordered solvers unless configured otherwise
pub const DEFAULT_VECTOR_WIDTH: usize = 4;

/// Solver flavours and the memory layout each one uses
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverType {
    /// Rosenbrock with vector-ordered matrices
    #[default]
    Rosenbrock,
    /// Rosenbrock with standard-ordered matrices
    RosenbrockStandardOrder,
    /// Backward Euler with vector-ordered matrices
    BackwardEuler,
    /// Backward Euler with standard-ordered matrices
    BackwardEulerStandardOrder,
}

impl SolverType {
    pub fn is_vector_ordered(&self) -> bool {
        matches!(self, SolverType::Rosenbrock | SolverType::BackwardEuler)
    }

    /// Vector width the solver is built for
    pub fn default_vector_width(&self) -> VectorWidth {
        match NonZeroUsize::new(DEFAULT_VECTOR_WIDTH) {
            Some(lanes) if self.is_vector_ordered() => VectorWidth::Lanes(lanes),
            _ => VectorWidth::Unpartitioned,
        }
    }
}

impl fmt::Display for SolverType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SolverType::Rosenbrock => "rosenbrock",
            SolverType::RosenbrockStandardOrder => "rosenbrock_standard_order",
            SolverType::BackwardEuler => "backward_euler",
            SolverType::BackwardEulerStandardOrder => "backward_euler_standard_order",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for SolverType {
    type Err = MusicaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rosenbrock" => Ok(SolverType::Rosenbrock),
            "rosenbrock_standard_order" => Ok(SolverType::RosenbrockStandardOrder),
            "backward_euler" => Ok(SolverType::BackwardEuler),
            "backward_euler_standard_order" => Ok(SolverType::BackwardEulerStandardOrder),
            _ => Err(MusicaError::InvalidConfiguration(format!(
                "unknown solver type '{}'",
                s
            ))),
        }
    }
}

/// Outcome of a single solve call
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SolverState {
    #[default]
    Converged,
    ConvergenceExceededMaxSteps,
    StepSizeTooSmall,
    RepeatedlySingularMatrix,
    NaNDetected,
    InfDetected,
    AcceptingUnconvergedIntegration,
}

impl SolverState {
    pub fn is_converged(&self) -> bool {
        matches!(self, SolverState::Converged)
    }
}

impl fmt::Display for SolverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SolverState::Converged => "Converged",
            SolverState::ConvergenceExceededMaxSteps => "Convergence Exceeded Max Steps",
            SolverState::StepSizeTooSmall => "Step Size Too Small",
            SolverState::RepeatedlySingularMatrix => "Repeatedly Singular Matrix",
            SolverState::NaNDetected => "NaN Detected",
            SolverState::InfDetected => "Inf Detected",
            SolverState::AcceptingUnconvergedIntegration => "Accepting Unconverged Integration",
        };
        write!(f, "{}", name)
    }
}

/// Counters reported by the solver
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SolverStats {
    pub number_of_steps: u64,
    pub accepted: u64,
    pub rejected: u64,
    /// Time reached by the integration
    /// unit: s
    pub final_time: f64,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SolverResult {
    pub state: SolverState,
    pub stats: SolverStats,
}

impl SolverResult {
    /// Combine the results of two segments solved over the same time step
    ///
    /// The first non-converged state wins. Counters are summed and the final time is
    /// the earliest one reached.
    pub fn merge(self, other: SolverResult) -> SolverResult {
        let state = if self.state.is_converged() {
            other.state
        } else {
            self.state
        };
        SolverResult {
            state,
            stats: SolverStats {
                number_of_steps: self.stats.number_of_steps + other.stats.number_of_steps,
                accepted: self.stats.accepted + other.stats.accepted,
                rejected: self.stats.rejected + other.stats.rejected,
                final_time: self.stats.final_time.min(other.stats.final_time),
            },
        }
    }
}

/// A chemistry solver that owns segment memory
pub trait Solver {
    type Segment: Segment;

    /// Width segments must be partitioned to
    fn vector_width(&self) -> VectorWidth;

    /// Allocate a segment holding `number_of_grid_cells` cells
    fn create_segment(&self, number_of_grid_cells: usize) -> MusicaResult<Self::Segment>;

    /// Advance every cell of `segment` by `time_step` seconds
    fn solve(&self, segment: &mut Self::Segment, time_step: f64) -> MusicaResult<SolverResult>;
}
