//! Ranging round extraction, distance computation and position solving

pub mod sequence;
pub mod ranging;
pub mod solver;

pub use sequence::{MatchingPolicy, SequenceMatcher};
pub use ranging::{DistanceComputer, ProcessingDelayPolicy, RoundFrames, RoundRanges, TimestampUnit};
pub use solver::{PositionSolver, SolverAdapter, SolverConfig, SolverRegistry};
