//! SS-TWR Offline Localization
//!
//! Estimates 2D positions of mobile nodes from logged single-sided two-way
//! ranging exchanges with fixed anchors. Each ranging round consists of three
//! consecutive POLL/RESPONSE exchanges; their timestamps are converted into
//! anchor distances and handed to a pluggable position solver.

pub mod core;
pub mod algorithms;
pub mod processing;
pub mod validation;
pub mod utils;
pub mod results;
pub mod localizer;

// Re-export commonly used types
pub use crate::core::{Anchor, Direction, Frame, MacAddress, MobileNode, SequenceNumber, SequenceTriple};
pub use algorithms::{
    DistanceComputer, MatchingPolicy, PositionSolver, ProcessingDelayPolicy, SequenceMatcher,
    SolverAdapter, SolverConfig, SolverRegistry, TimestampUnit,
};
pub use processing::{AnchorTable, Dataset, FrameTable, TableLoader};
pub use validation::{AccuracySummary, DataIntegrityError, Error, ErrorCategory, Result, RoundError, RoundFailure, SolverError};
pub use utils::{init_logging, ConfigError, Configuration, LogConfig, LogLevel};
pub use results::{build_result, LocalizationResult, OutputFormat, Results};
pub use localizer::{LocalizationReport, Localizer};
