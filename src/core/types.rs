//! Core data types for the localization pipeline

use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Radio node identifier as logged by the measurement campaign
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MacAddress(pub u64);

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for MacAddress {
    fn from(value: u64) -> Self {
        MacAddress(value)
    }
}

/// Frame sequence number, issued per exchange and possibly gapped
pub type SequenceNumber = u32;

/// Sequence numbers `(s, s+1, s+2)` of one ranging round
pub type SequenceTriple = [SequenceNumber; 3];

/// Direction of a logged frame, seen from the node that logged it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "TX", alias = "tx")]
    Transmit,
    #[serde(rename = "RX", alias = "rx")]
    Receive,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Transmit => write!(f, "TX"),
            Direction::Receive => write!(f, "RX"),
        }
    }
}

/// One observed radio transmission or reception event
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub source_mac_address: MacAddress,
    pub destination_mac_address: MacAddress,
    pub direction: Direction,
    pub sequence_number: SequenceNumber,
    /// Device clock at the start of the frame (timestamp units)
    pub begin_clock_timestamp: f64,
    /// Device clock at the end of the frame (timestamp units)
    pub end_clock_timestamp: f64,
    /// Ground truth position when the frame started, reporting only
    pub begin_true_position: Vector3<f64>,
    /// Ground truth position when the frame ended, reporting only
    pub end_true_position: Vector3<f64>,
}

impl Frame {
    /// POLL frames are transmitted by the mobile node itself
    pub fn is_poll_from(&self, mobile: MacAddress) -> bool {
        self.direction == Direction::Transmit && self.source_mac_address == mobile
    }

    /// RESPONSE frames are received by the mobile node from an anchor
    pub fn is_response_to(&self, mobile: MacAddress) -> bool {
        self.direction == Direction::Receive && self.destination_mac_address == mobile
    }
}

/// Fixed, surveyed node used as a ranging reference
#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
    pub mac_address: MacAddress,
    pub position_dimensions: u8,
    pub position: Vector3<f64>,
    /// Delay between POLL reception and RESPONSE transmission (timestamp units)
    pub message_processing_time: f64,
}

impl Anchor {
    pub fn new(mac_address: MacAddress, position: Vector3<f64>, message_processing_time: f64) -> Self {
        Self {
            mac_address,
            position_dimensions: 2,
            position,
            message_processing_time,
        }
    }

    /// Horizontal projection used by the 2D solvers
    pub fn position_2d(&self) -> Vector2<f64> {
        Vector2::new(self.position.x, self.position.y)
    }
}

/// Node being localized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MobileNode {
    pub mac_address: MacAddress,
}

impl MobileNode {
    pub fn new(mac_address: MacAddress) -> Self {
        Self { mac_address }
    }
}
