//! Single-sided two-way ranging: timestamps to distances
//!
//! For each POLL/RESPONSE pair of a round the mobile node measures the round
//! trip between sending the POLL and receiving the RESPONSE. The anchor's fixed
//! processing delay is subtracted and the remainder halved to get the time of
//! flight, which the speed of light turns into a distance.

use crate::core::{Anchor, Direction, Frame, SequenceTriple, ROUND_EXCHANGE_COUNT, SPEED_OF_LIGHT_VACUUM};
use crate::processing::tables::{AnchorTable, NodeFrames};
use crate::utils::config::ConfigError;
use crate::validation::error::DataIntegrityError;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// Unit of the logged clock timestamps and processing delays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampUnit {
    #[default]
    Picoseconds,
    Nanoseconds,
    Microseconds,
    Seconds,
}

impl TimestampUnit {
    pub fn seconds_per_tick(self) -> f64 {
        match self {
            TimestampUnit::Picoseconds => 1e-12,
            TimestampUnit::Nanoseconds => 1e-9,
            TimestampUnit::Microseconds => 1e-6,
            TimestampUnit::Seconds => 1.0,
        }
    }

    /// Speed of light in metres per tick of this unit
    pub fn speed_of_light(self) -> f64 {
        SPEED_OF_LIGHT_VACUUM * self.seconds_per_tick()
    }
}

/// Which anchor processing delay applies to a RESPONSE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingDelayPolicy {
    /// Delay of the anchor that sent the RESPONSE frame
    #[default]
    PerAnchor,
    /// One delay for all anchors; rejected unless every anchor agrees
    Uniform,
}

impl ProcessingDelayPolicy {
    /// Bind the policy to the anchor table of a run
    pub fn resolve(self, anchors: &AnchorTable) -> Result<ProcessingDelay, ConfigError> {
        match self {
            ProcessingDelayPolicy::PerAnchor => Ok(ProcessingDelay::PerAnchor),
            ProcessingDelayPolicy::Uniform => {
                if anchors.is_empty() {
                    return Err(ConfigError::NoAnchors);
                }
                anchors
                    .uniform_processing_time()
                    .map(ProcessingDelay::Uniform)
                    .ok_or_else(|| ConfigError::NonUniformProcessingDelay {
                        delays: anchors.distinct_processing_times(),
                    })
            }
        }
    }
}

/// Processing delay policy bound to concrete anchors
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProcessingDelay {
    PerAnchor,
    Uniform(f64),
}

/// Time of flight from a single-sided two-way ranging exchange
pub fn time_of_flight(poll_begin: f64, response_begin: f64, processing_time: f64) -> f64 {
    let round_trip = response_begin - poll_begin;
    (round_trip - processing_time) / 2.0
}

/// The three POLL/RESPONSE pairs of a ranging round, ascending by sequence number
#[derive(Debug, Clone, Copy)]
pub struct RoundFrames<'a> {
    pub polls: [&'a Frame; ROUND_EXCHANGE_COUNT],
    pub responses: [&'a Frame; ROUND_EXCHANGE_COUNT],
}

impl<'a> RoundFrames<'a> {
    /// Pick the round's frames out of a node's frames.
    ///
    /// Each side must hold exactly one frame per sequence number of the round.
    pub fn select(node: &NodeFrames<'a>, sequence_numbers: &SequenceTriple) -> Result<Self, DataIntegrityError> {
        let polls = exactly_three(node.round_polls(sequence_numbers), Direction::Transmit)?;
        let responses = exactly_three(node.round_responses(sequence_numbers), Direction::Receive)?;

        for (poll, response) in polls.iter().zip(responses.iter()) {
            if poll.sequence_number != response.sequence_number {
                return Err(DataIntegrityError::SequenceMismatch {
                    poll: poll.sequence_number,
                    response: response.sequence_number,
                });
            }
        }

        Ok(Self { polls, responses })
    }

    pub fn first_poll(&self) -> &'a Frame {
        self.polls[0]
    }

    pub fn third_response(&self) -> &'a Frame {
        self.responses[ROUND_EXCHANGE_COUNT - 1]
    }
}

fn exactly_three(frames: Vec<&Frame>, direction: Direction) -> Result<[&Frame; ROUND_EXCHANGE_COUNT], DataIntegrityError> {
    let found = frames.len();
    frames
        .try_into()
        .map_err(|_| DataIntegrityError::FrameCount {
            direction,
            expected: ROUND_EXCHANGE_COUNT,
            found,
        })
}

/// Responding anchors and measured distances, index aligned
#[derive(Debug, Clone, Copy)]
pub struct RoundRanges<'t> {
    pub anchors: [&'t Anchor; ROUND_EXCHANGE_COUNT],
    pub distances: [f64; ROUND_EXCHANGE_COUNT],
}

impl RoundRanges<'_> {
    pub fn anchor_positions(&self) -> [Vector2<f64>; ROUND_EXCHANGE_COUNT] {
        self.anchors.map(Anchor::position_2d)
    }
}

/// Converts round timestamps into anchor distances
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceComputer {
    /// Metres per timestamp tick
    speed_of_light: f64,
    delay: ProcessingDelay,
}

impl DistanceComputer {
    pub fn new(unit: TimestampUnit, delay: ProcessingDelay) -> Self {
        Self {
            speed_of_light: unit.speed_of_light(),
            delay,
        }
    }

    /// Picosecond timestamps with per-anchor delays
    pub fn per_anchor() -> Self {
        Self::new(TimestampUnit::Picoseconds, ProcessingDelay::PerAnchor)
    }

    pub fn speed_of_light(&self) -> f64 {
        self.speed_of_light
    }

    pub fn processing_time(&self, anchor: &Anchor) -> f64 {
        match self.delay {
            ProcessingDelay::PerAnchor => anchor.message_processing_time,
            ProcessingDelay::Uniform(delay) => delay,
        }
    }

    /// Distance covered during one exchange
    pub fn distance(&self, poll: &Frame, response: &Frame, processing_time: f64) -> f64 {
        time_of_flight(poll.begin_clock_timestamp, response.begin_clock_timestamp, processing_time) * self.speed_of_light
    }

    /// Distances to the three anchors that answered the round
    pub fn compute<'t>(&self, round: &RoundFrames<'_>, anchors: &'t AnchorTable) -> Result<RoundRanges<'t>, DataIntegrityError> {
        let responder = move |response: &Frame| {
            anchors
                .by_mac(response.source_mac_address)
                .ok_or(DataIntegrityError::UnknownAnchor {
                    anchor: response.source_mac_address,
                    sequence_number: response.sequence_number,
                })
        };
        let responders = [
            responder(round.responses[0])?,
            responder(round.responses[1])?,
            responder(round.responses[2])?,
        ];

        let distances = std::array::from_fn(|i| {
            self.distance(round.polls[i], round.responses[i], self.processing_time(responders[i]))
        });

        Ok(RoundRanges {
            anchors: responders,
            distances,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{MacAddress, SequenceNumber};
    use crate::processing::tables::FrameTable;
    use nalgebra::Vector3;

    const MOBILE: MacAddress = MacAddress(100);

    fn poll(sequence_number: SequenceNumber, begin: f64) -> Frame {
        Frame {
            source_mac_address: MOBILE,
            destination_mac_address: MacAddress(0xFFFF),
            direction: Direction::Transmit,
            sequence_number,
            begin_clock_timestamp: begin,
            end_clock_timestamp: begin,
            begin_true_position: Vector3::new(sequence_number as f64, 0.0, 1.0),
            end_true_position: Vector3::zeros(),
        }
    }

    fn response(anchor: u64, sequence_number: SequenceNumber, begin: f64) -> Frame {
        Frame {
            source_mac_address: MacAddress(anchor),
            destination_mac_address: MOBILE,
            direction: Direction::Receive,
            sequence_number,
            begin_clock_timestamp: begin,
            end_clock_timestamp: begin,
            begin_true_position: Vector3::zeros(),
            end_true_position: Vector3::new(0.0, sequence_number as f64, 1.0),
        }
    }

    fn anchors(delays: [f64; 3]) -> AnchorTable {
        AnchorTable::new(vec![
            Anchor::new(MacAddress(1), Vector3::new(0.0, 0.0, 0.0), delays[0]),
            Anchor::new(MacAddress(2), Vector3::new(10.0, 0.0, 0.0), delays[1]),
            Anchor::new(MacAddress(3), Vector3::new(0.0, 10.0, 0.0), delays[2]),
        ])
    }

    #[test]
    fn test_time_of_flight() {
        assert_eq!(time_of_flight(1000.0, 1500.0, 100.0), 200.0);
    }

    #[test]
    fn test_distance_in_picoseconds() {
        let computer = DistanceComputer::per_anchor();
        let distance = computer.distance(&poll(1, 1000.0), &response(1, 1, 1500.0), 100.0);

        assert!((computer.speed_of_light() - 2.99792458e-4).abs() < 1e-15);
        assert!((distance - 200.0 * 2.99792458e-4).abs() < 1e-12);
    }

    #[test]
    fn test_timestamp_units() {
        assert!((TimestampUnit::Nanoseconds.speed_of_light() - 0.299792458).abs() < 1e-12);
        assert_eq!(TimestampUnit::Seconds.speed_of_light(), SPEED_OF_LIGHT_VACUUM);
    }

    #[test]
    fn test_compute_uses_responding_anchor_delay() {
        let frames = FrameTable::new(vec![
            poll(1, 0.0),
            response(2, 1, 1_000.0),
            poll(2, 10_000.0),
            response(3, 2, 11_000.0),
            poll(3, 20_000.0),
            response(1, 3, 21_000.0),
        ]);
        let table = anchors([100.0, 200.0, 300.0]);
        let node = frames.node_frames(MOBILE);
        let round = RoundFrames::select(&node, &[1, 2, 3]).unwrap();

        let ranges = DistanceComputer::per_anchor().compute(&round, &table).unwrap();

        let macs: Vec<_> = ranges.anchors.iter().map(|a| a.mac_address).collect();
        assert_eq!(macs, vec![MacAddress(2), MacAddress(3), MacAddress(1)]);

        let c = TimestampUnit::Picoseconds.speed_of_light();
        assert!((ranges.distances[0] - 400.0 * c).abs() < 1e-12);
        assert!((ranges.distances[1] - 350.0 * c).abs() < 1e-12);
        assert!((ranges.distances[2] - 450.0 * c).abs() < 1e-12);
        assert_eq!(ranges.anchor_positions()[0], Vector2::new(10.0, 0.0));
    }

    #[test]
    fn test_compute_with_uniform_delay() {
        let frames = FrameTable::new(vec![
            poll(1, 0.0),
            response(1, 1, 1_000.0),
            poll(2, 0.0),
            response(2, 2, 1_000.0),
            poll(3, 0.0),
            response(3, 3, 1_000.0),
        ]);
        let table = anchors([100.0, 100.0, 100.0]);
        let delay = ProcessingDelayPolicy::Uniform.resolve(&table).unwrap();
        let computer = DistanceComputer::new(TimestampUnit::Picoseconds, delay);

        let node = frames.node_frames(MOBILE);
        let round = RoundFrames::select(&node, &[1, 2, 3]).unwrap();
        let ranges = computer.compute(&round, &table).unwrap();

        assert!(ranges.distances.iter().all(|d| (d - 450.0 * computer.speed_of_light()).abs() < 1e-12));
    }

    #[test]
    fn test_uniform_policy_rejects_mixed_delays() {
        let err = ProcessingDelayPolicy::Uniform.resolve(&anchors([100.0, 100.0, 150.0])).unwrap_err();
        assert_eq!(err, ConfigError::NonUniformProcessingDelay { delays: vec![100.0, 150.0] });
        assert_eq!(
            ProcessingDelayPolicy::PerAnchor.resolve(&anchors([1.0, 2.0, 3.0])).unwrap(),
            ProcessingDelay::PerAnchor
        );
    }

    #[test]
    fn test_uniform_policy_ignores_replaced_anchor_rows() {
        let table = AnchorTable::new(vec![
            Anchor::new(MacAddress(1), Vector3::zeros(), 100.0),
            Anchor::new(MacAddress(2), Vector3::zeros(), 100.0),
            Anchor::new(MacAddress(1), Vector3::zeros(), 999.0),
            Anchor::new(MacAddress(1), Vector3::zeros(), 100.0),
        ]);

        assert_eq!(ProcessingDelayPolicy::Uniform.resolve(&table), Ok(ProcessingDelay::Uniform(100.0)));
    }

    #[test]
    fn test_select_rejects_missing_frame() {
        let frames = FrameTable::new(vec![
            poll(1, 0.0),
            poll(2, 0.0),
            poll(3, 0.0),
            response(1, 1, 0.0),
            response(2, 3, 0.0),
        ]);
        let node = frames.node_frames(MOBILE);

        let err = RoundFrames::select(&node, &[1, 2, 3]).unwrap_err();
        assert_eq!(
            err,
            DataIntegrityError::FrameCount {
                direction: Direction::Receive,
                expected: 3,
                found: 2
            }
        );
    }

    #[test]
    fn test_select_rejects_duplicate_poll() {
        let frames = FrameTable::new(vec![
            poll(1, 0.0),
            poll(1, 5.0),
            poll(2, 0.0),
            poll(3, 0.0),
            response(1, 1, 0.0),
            response(2, 2, 0.0),
            response(3, 3, 0.0),
        ]);
        let node = frames.node_frames(MOBILE);

        let err = RoundFrames::select(&node, &[1, 2, 3]).unwrap_err();
        assert_eq!(
            err,
            DataIntegrityError::FrameCount {
                direction: Direction::Transmit,
                expected: 3,
                found: 4
            }
        );
    }

    #[test]
    fn test_select_rejects_misaligned_duplicates() {
        // Two POLLs logged for 1 and none for 3
        let frames = FrameTable::new(vec![
            poll(1, 0.0),
            poll(1, 5.0),
            poll(2, 0.0),
            response(1, 1, 0.0),
            response(2, 2, 0.0),
            response(3, 3, 0.0),
        ]);
        let node = frames.node_frames(MOBILE);

        let err = RoundFrames::select(&node, &[1, 2, 3]).unwrap_err();
        assert_eq!(err, DataIntegrityError::SequenceMismatch { poll: 1, response: 2 });
    }

    #[test]
    fn test_compute_rejects_unknown_anchor() {
        let frames = FrameTable::new(vec![
            poll(1, 0.0),
            response(1, 1, 0.0),
            poll(2, 0.0),
            response(9, 2, 0.0),
            poll(3, 0.0),
            response(3, 3, 0.0),
        ]);
        let node = frames.node_frames(MOBILE);
        let round = RoundFrames::select(&node, &[1, 2, 3]).unwrap();

        let err = DistanceComputer::per_anchor().compute(&round, &anchors([0.0; 3])).unwrap_err();
        assert_eq!(
            err,
            DataIntegrityError::UnknownAnchor {
                anchor: MacAddress(9),
                sequence_number: 2
            }
        );
    }

    #[test]
    fn test_round_reporting_frames() {
        let frames = FrameTable::new(vec![
            poll(4, 0.0),
            poll(5, 0.0),
            poll(6, 0.0),
            response(1, 4, 0.0),
            response(2, 5, 0.0),
            response(3, 6, 0.0),
        ]);
        let node = frames.node_frames(MOBILE);
        let round = RoundFrames::select(&node, &[4, 5, 6]).unwrap();

        assert_eq!(round.first_poll().sequence_number, 4);
        assert_eq!(round.third_response().sequence_number, 6);
    }
}
