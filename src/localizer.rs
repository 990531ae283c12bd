//! Run driver: mobile nodes in, positions out
//!
//! For every mobile node the POLL/RESPONSE sequence numbers are matched into
//! ranging rounds. Each round goes through distance computation, the position
//! solver and the result builder. A round that fails is logged and recorded as
//! a [`RoundFailure`] while the remaining rounds carry on.

use crate::algorithms::ranging::{DistanceComputer, RoundFrames};
use crate::algorithms::sequence::SequenceMatcher;
use crate::algorithms::solver::{SolverAdapter, SolverRegistry};
use crate::core::{MobileNode, SequenceTriple};
use crate::processing::tables::{AnchorTable, Dataset, NodeFrames};
use crate::results::{build_result, LocalizationResult, Results};
use crate::utils::config::{ConfigError, Configuration, TofConfig};
use crate::validation::accuracy::AccuracySummary;
use crate::validation::error::{count_by_category, ErrorCategory, Result, RoundError, RoundFailure};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::time::Instant;

/// Outcome of a full run
#[derive(Debug, Clone)]
pub struct LocalizationReport {
    pub results: Results,
    /// Anchor table the results were computed against
    pub anchors: AnchorTable,
    pub failures: Vec<RoundFailure>,
}

impl LocalizationReport {
    pub fn failure_counts(&self) -> BTreeMap<ErrorCategory, usize> {
        count_by_category(&self.failures)
    }

    pub fn accuracy(&self) -> AccuracySummary {
        AccuracySummary::from_results(&self.results)
    }

    /// Rounds attempted, successful or not
    pub fn round_count(&self) -> usize {
        self.results.len() + self.failures.len()
    }
}

/// Rounds of a single mobile node
#[derive(Debug, Default)]
struct NodeOutcome {
    results: Vec<LocalizationResult>,
    failures: Vec<RoundFailure>,
}

/// Single-sided TWR localizer
#[derive(Debug)]
pub struct Localizer {
    config: TofConfig,
    adapter: SolverAdapter,
}

impl Localizer {
    /// Validate the configuration and build the configured solver
    pub fn new(config: &TofConfig, registry: &SolverRegistry) -> std::result::Result<Self, ConfigError> {
        let adapter = SolverAdapter::from_config(registry, &config.solver)?;
        Ok(Self {
            config: config.clone(),
            adapter,
        })
    }

    /// Localizer backed by the built-in solvers
    pub fn from_configuration(config: &Configuration) -> std::result::Result<Self, ConfigError> {
        Self::new(config.tof(), &SolverRegistry::with_builtin())
    }

    pub fn config(&self) -> &TofConfig {
        &self.config
    }

    pub fn solver_name(&self) -> &str {
        self.adapter.solver_name()
    }

    /// Localize every mobile node of the dataset.
    ///
    /// Only configuration problems abort the run; round failures end up in
    /// the report.
    pub fn run(&self, dataset: &Dataset) -> Result<LocalizationReport> {
        let started = Instant::now();
        let delay = self.config.processing_delay.resolve(&dataset.anchors)?;
        let computer = DistanceComputer::new(self.config.timestamp_unit, delay);

        tracing::info!(
            solver = self.solver_name(),
            matching = ?self.config.matching,
            processing_delay = ?self.config.processing_delay,
            mobiles = dataset.mobiles.len(),
            parallel = self.config.parallel,
            "starting localization"
        );

        let localize = |mobile: &MobileNode| self.localize_mobile(mobile, dataset, &computer);
        let outcomes: Vec<NodeOutcome> = if self.config.parallel {
            dataset.mobiles.par_iter().map(localize).collect()
        } else {
            dataset.mobiles.iter().map(localize).collect()
        };

        let mut report = LocalizationReport {
            results: Results::new(),
            anchors: dataset.anchors.clone(),
            failures: Vec::new(),
        };
        for outcome in outcomes {
            report.results.extend(outcome.results);
            report.failures.extend(outcome.failures);
        }

        tracing::info!(
            results = report.results.len(),
            failures = report.failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "localization finished"
        );
        Ok(report)
    }

    fn localize_mobile(&self, mobile: &MobileNode, dataset: &Dataset, computer: &DistanceComputer) -> NodeOutcome {
        let span = tracing::info_span!("mobile", mac = %mobile.mac_address);
        let _guard = span.enter();

        let frames = dataset.frames.node_frames(mobile.mac_address);
        let matcher = SequenceMatcher::new(
            frames.poll_sequence_numbers(),
            frames.response_sequence_numbers(),
            self.config.matching,
        );

        let mut outcome = NodeOutcome::default();
        for sequence_numbers in matcher.triples() {
            match self.localize_round(mobile, &frames, &sequence_numbers, &dataset.anchors, computer) {
                Ok(result) => outcome.results.push(result),
                Err(error) => {
                    tracing::warn!(round = ?sequence_numbers, category = %error.category(), "round skipped: {}", error);
                    outcome.failures.push(RoundFailure {
                        mac_address: mobile.mac_address,
                        sequence_numbers,
                        error,
                    });
                }
            }
        }

        tracing::info!(
            polls = frames.poll_count(),
            responses = frames.response_count(),
            results = outcome.results.len(),
            failures = outcome.failures.len(),
            "mobile node done"
        );
        outcome
    }

    /// Position of one ranging round
    pub fn localize_round(
        &self,
        mobile: &MobileNode,
        frames: &NodeFrames<'_>,
        sequence_numbers: &SequenceTriple,
        anchors: &AnchorTable,
        computer: &DistanceComputer,
    ) -> std::result::Result<LocalizationResult, RoundError> {
        let round = RoundFrames::select(frames, sequence_numbers)?;
        let ranges = computer.compute(&round, anchors)?;

        let position = self.adapter.locate(&ranges).map_err(|source| RoundError::Solver {
            solver: self.solver_name().to_string(),
            source,
        })?;

        tracing::debug!(
            round = ?sequence_numbers,
            distances = ?ranges.distances,
            x = position.x,
            y = position.y,
            "round solved"
        );

        Ok(build_result(mobile.mac_address, position, round.first_poll(), round.third_response()))
    }
}
