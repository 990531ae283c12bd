//! Error taxonomy of the localization pipeline
//!
//! Round-level errors ([`DataIntegrityError`], [`SolverError`]) are caught at the
//! round boundary and collected as [`RoundFailure`]s. Everything else ends up in
//! the crate-level [`Error`] and aborts the run.

use crate::core::{Direction, MacAddress, SequenceNumber, SequenceTriple};
use crate::utils::config::ConfigError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Frame data of a single ranging round is inconsistent
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataIntegrityError {
    #[error("expected {expected} {direction} frames in round, found {found}")]
    FrameCount {
        direction: Direction,
        expected: usize,
        found: usize,
    },

    #[error("POLL frame {poll} is paired with RESPONSE frame {response}")]
    SequenceMismatch {
        poll: SequenceNumber,
        response: SequenceNumber,
    },

    #[error("anchor {anchor} answering frame {sequence_number} is not in the anchor table")]
    UnknownAnchor {
        anchor: MacAddress,
        sequence_number: SequenceNumber,
    },
}

/// Position solver could not produce a candidate
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("at least {required} anchors required, got {available}")]
    InsufficientAnchors { available: usize, required: usize },

    #[error("{anchors} anchor positions given for {distances} distances")]
    LengthMismatch { anchors: usize, distances: usize },

    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("degenerate anchor geometry: {reason}")]
    DegenerateGeometry { reason: String },

    #[error("no convergence after {iterations} iterations (step {last_step:.3e} m)")]
    ConvergenceFailure { iterations: u32, last_step: f64 },

    #[error("no candidate position returned")]
    NoCandidate,
}

/// Reason a single ranging round produced no result
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RoundError {
    #[error("data integrity: {0}")]
    DataIntegrity(#[from] DataIntegrityError),

    #[error("solver '{solver}': {source}")]
    Solver {
        solver: String,
        #[source]
        source: SolverError,
    },
}

impl RoundError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            RoundError::DataIntegrity(_) => ErrorCategory::DataIntegrity,
            RoundError::Solver { .. } => ErrorCategory::Solver,
        }
    }
}

/// Coarse classification used for failure counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ErrorCategory {
    DataIntegrity,
    Solver,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::DataIntegrity => write!(f, "data integrity"),
            ErrorCategory::Solver => write!(f, "solver"),
        }
    }
}

/// A ranging round that was skipped, with the reason
#[derive(Debug, Clone, PartialEq)]
pub struct RoundFailure {
    pub mac_address: MacAddress,
    pub sequence_numbers: SequenceTriple,
    pub error: RoundError,
}

impl fmt::Display for RoundFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "node {} round {:?}: {}",
            self.mac_address, self.sequence_numbers, self.error
        )
    }
}

/// Count failures per category
pub fn count_by_category(failures: &[RoundFailure]) -> BTreeMap<ErrorCategory, usize> {
    let mut counts = BTreeMap::new();
    for failure in failures {
        *counts.entry(failure.error.category()).or_insert(0) += 1;
    }
    counts
}

/// Fatal errors: configuration and input table problems
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error in '{}': {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid row in '{}' line {line}: {reason}", path.display())]
    Table {
        path: PathBuf,
        line: u64,
        reason: String,
    },
}

/// Result type alias using the crate-level [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Error::Csv {
            path: path.into(),
            source,
        }
    }

    pub fn table(path: impl Into<PathBuf>, line: u64, reason: impl Into<String>) -> Self {
        Error::Table {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }
}
