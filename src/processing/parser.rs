//! CSV loaders for the anchor, mobile node and frame tables
//!
//! A measurement directory holds three files with a header row each. Columns
//! are matched by name and unknown columns are ignored.

use crate::core::{Anchor, Direction, Frame, MacAddress, MobileNode, SequenceNumber};
use crate::processing::tables::{AnchorTable, Dataset, FrameTable};
use crate::validation::error::{Error, Result};
use nalgebra::Vector3;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

pub const ANCHORS_FILE: &str = "ss_twr_anchors.csv";
pub const MOBILES_FILE: &str = "ss_twr_mobiles.csv";
pub const FRAMES_FILE: &str = "ss_twr_mobile_frames.csv";

#[derive(Debug, Deserialize)]
struct AnchorRecord {
    mac_address: MacAddress,
    #[serde(default = "default_dimensions")]
    position_dimensions: u8,
    position_x: f64,
    position_y: f64,
    #[serde(default)]
    position_z: f64,
    message_processing_time: f64,
}

fn default_dimensions() -> u8 {
    2
}

#[derive(Debug, Deserialize)]
struct MobileRecord {
    mac_address: MacAddress,
}

#[derive(Debug, Deserialize)]
struct FrameRecord {
    source_mac_address: MacAddress,
    destination_mac_address: MacAddress,
    direction: Direction,
    sequence_number: SequenceNumber,
    begin_clock_timestamp: f64,
    end_clock_timestamp: f64,
    #[serde(default)]
    begin_true_position_x: f64,
    #[serde(default)]
    begin_true_position_y: f64,
    #[serde(default)]
    begin_true_position_z: f64,
    #[serde(default)]
    end_true_position_x: f64,
    #[serde(default)]
    end_true_position_y: f64,
    #[serde(default)]
    end_true_position_z: f64,
}

/// Loader for the tables of an offline measurement directory
#[derive(Debug, Clone)]
pub struct TableLoader {
    strict_validation: bool,
}

impl TableLoader {
    /// Loader that rejects non-finite numbers
    pub fn new() -> Self {
        Self {
            strict_validation: true,
        }
    }

    /// Enable or disable the finiteness checks
    pub fn set_strict_validation(&mut self, strict: bool) {
        self.strict_validation = strict;
    }

    /// Load all three tables from `directory`
    pub fn load_directory<P: AsRef<Path>>(&self, directory: P) -> Result<Dataset> {
        let directory = directory.as_ref();
        let dataset = Dataset {
            anchors: self.load_anchors(directory.join(ANCHORS_FILE))?,
            mobiles: self.load_mobiles(directory.join(MOBILES_FILE))?,
            frames: self.load_frames(directory.join(FRAMES_FILE))?,
        };

        tracing::info!(
            directory = %directory.display(),
            anchors = dataset.anchors.len(),
            mobiles = dataset.mobiles.len(),
            frames = dataset.frames.len(),
            "loaded measurement tables"
        );
        Ok(dataset)
    }

    pub fn load_anchors<P: AsRef<Path>>(&self, path: P) -> Result<AnchorTable> {
        let path = path.as_ref();
        let mut seen = HashSet::new();
        let mut anchors = Vec::new();

        for (line, record) in read_records::<AnchorRecord>(path)? {
            self.check_finite(path, line, "position_x", record.position_x)?;
            self.check_finite(path, line, "position_y", record.position_y)?;
            self.check_finite(path, line, "position_z", record.position_z)?;
            self.check_finite(path, line, "message_processing_time", record.message_processing_time)?;

            if !seen.insert(record.mac_address) {
                tracing::warn!(anchor = %record.mac_address, line, "duplicate anchor row replaces the earlier one");
            }

            anchors.push(Anchor {
                mac_address: record.mac_address,
                position_dimensions: record.position_dimensions,
                position: Vector3::new(record.position_x, record.position_y, record.position_z),
                message_processing_time: record.message_processing_time,
            });
        }

        Ok(AnchorTable::new(anchors))
    }

    pub fn load_mobiles<P: AsRef<Path>>(&self, path: P) -> Result<Vec<MobileNode>> {
        let path = path.as_ref();
        let mut seen = HashSet::new();
        let mut mobiles = Vec::new();

        for (line, record) in read_records::<MobileRecord>(path)? {
            if seen.insert(record.mac_address) {
                mobiles.push(MobileNode::new(record.mac_address));
            } else {
                tracing::warn!(mobile = %record.mac_address, line, "duplicate mobile node row skipped");
            }
        }

        Ok(mobiles)
    }

    pub fn load_frames<P: AsRef<Path>>(&self, path: P) -> Result<FrameTable> {
        let path = path.as_ref();
        let mut frames = Vec::new();

        for (line, record) in read_records::<FrameRecord>(path)? {
            self.check_finite(path, line, "begin_clock_timestamp", record.begin_clock_timestamp)?;
            self.check_finite(path, line, "end_clock_timestamp", record.end_clock_timestamp)?;
            self.check_finite(path, line, "begin_true_position_x", record.begin_true_position_x)?;
            self.check_finite(path, line, "begin_true_position_y", record.begin_true_position_y)?;
            self.check_finite(path, line, "begin_true_position_z", record.begin_true_position_z)?;
            self.check_finite(path, line, "end_true_position_x", record.end_true_position_x)?;
            self.check_finite(path, line, "end_true_position_y", record.end_true_position_y)?;
            self.check_finite(path, line, "end_true_position_z", record.end_true_position_z)?;

            frames.push(Frame {
                source_mac_address: record.source_mac_address,
                destination_mac_address: record.destination_mac_address,
                direction: record.direction,
                sequence_number: record.sequence_number,
                begin_clock_timestamp: record.begin_clock_timestamp,
                end_clock_timestamp: record.end_clock_timestamp,
                begin_true_position: Vector3::new(
                    record.begin_true_position_x,
                    record.begin_true_position_y,
                    record.begin_true_position_z,
                ),
                end_true_position: Vector3::new(
                    record.end_true_position_x,
                    record.end_true_position_y,
                    record.end_true_position_z,
                ),
            });
        }

        Ok(FrameTable::new(frames))
    }

    fn check_finite(&self, path: &Path, line: u64, field: &str, value: f64) -> Result<()> {
        if self.strict_validation && !value.is_finite() {
            return Err(Error::table(path, line, format!("{} is not finite ({})", field, value)));
        }
        Ok(())
    }
}

impl Default for TableLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl Dataset {
    /// Load a measurement directory with strict validation
    pub fn load<P: AsRef<Path>>(directory: P) -> Result<Self> {
        TableLoader::new().load_directory(directory)
    }
}

/// Deserialize every row of a CSV file together with its line number
fn read_records<R: DeserializeOwned>(path: &Path) -> Result<Vec<(u64, R)>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| Error::csv(path, e))?;
    let headers = reader.headers().map_err(|e| Error::csv(path, e))?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| Error::csv(path, e))?;
        let line = record.position().map_or(0, |position| position.line());
        let row = record.deserialize(Some(&headers)).map_err(|e| Error::csv(path, e))?;
        rows.push((line, row));
    }
    Ok(rows)
}
