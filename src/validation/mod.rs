//! Error taxonomy and accuracy evaluation

pub mod error;
pub mod accuracy;

pub use error::{DataIntegrityError, Error, ErrorCategory, Result, RoundError, RoundFailure, SolverError};
pub use accuracy::AccuracySummary;
