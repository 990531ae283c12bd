//! Localization result records and their container

use crate::core::{Frame, MacAddress, POSITION_DIMENSIONS};
use crate::validation::error::{Error, Result};
use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

/// CSV header, in field order of [`LocalizationResult`]
const CSV_COLUMNS: [&str; 14] = [
    "mac_address",
    "position_dimensions",
    "position_x",
    "position_y",
    "position_z",
    "begin_true_position_x",
    "begin_true_position_y",
    "begin_true_position_z",
    "end_true_position_x",
    "end_true_position_y",
    "end_true_position_z",
    "reference_position_x",
    "reference_position_y",
    "reference_position_z",
];

/// One solved position with its ground truth
///
/// Kept flat so that a record maps one to one onto a CSV row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalizationResult {
    pub mac_address: MacAddress,
    pub position_dimensions: u8,
    pub position_x: f64,
    pub position_y: f64,
    pub position_z: f64,
    pub begin_true_position_x: f64,
    pub begin_true_position_y: f64,
    pub begin_true_position_z: f64,
    pub end_true_position_x: f64,
    pub end_true_position_y: f64,
    pub end_true_position_z: f64,
    pub reference_position_x: f64,
    pub reference_position_y: f64,
    pub reference_position_z: f64,
}

impl LocalizationResult {
    pub fn position(&self) -> Vector3<f64> {
        Vector3::new(self.position_x, self.position_y, self.position_z)
    }

    pub fn begin_true_position(&self) -> Vector3<f64> {
        Vector3::new(self.begin_true_position_x, self.begin_true_position_y, self.begin_true_position_z)
    }

    pub fn end_true_position(&self) -> Vector3<f64> {
        Vector3::new(self.end_true_position_x, self.end_true_position_y, self.end_true_position_z)
    }

    pub fn reference_position(&self) -> Vector3<f64> {
        Vector3::new(self.reference_position_x, self.reference_position_y, self.reference_position_z)
    }

    /// Planar distance between the solved and the reference position (meters)
    pub fn horizontal_error(&self) -> f64 {
        let dx = self.position_x - self.reference_position_x;
        let dy = self.position_y - self.reference_position_y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Assemble the record of one accepted round.
///
/// Ground truth is taken from the begin position of the first POLL and the
/// end position of the third RESPONSE, both projected onto the plane.
pub fn build_result(
    mac_address: MacAddress,
    position: Vector2<f64>,
    first_poll: &Frame,
    third_response: &Frame,
) -> LocalizationResult {
    let begin = first_poll.begin_true_position;
    let end = third_response.end_true_position;

    LocalizationResult {
        mac_address,
        position_dimensions: POSITION_DIMENSIONS,
        position_x: position.x,
        position_y: position.y,
        position_z: 0.0,
        begin_true_position_x: begin.x,
        begin_true_position_y: begin.y,
        begin_true_position_z: 0.0,
        end_true_position_x: end.x,
        end_true_position_y: end.y,
        end_true_position_z: 0.0,
        reference_position_x: end.x,
        reference_position_y: end.y,
        reference_position_z: 0.0,
    }
}

/// Output encoding of a result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Csv => write!(f, "csv"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format '{}' (expected csv or json)", other)),
        }
    }
}

/// Ordered, append-only collection of results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Results {
    records: Vec<LocalizationResult>,
}

impl Results {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: LocalizationResult) {
        self.records.push(result);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LocalizationResult> {
        self.records.iter()
    }

    pub fn as_slice(&self) -> &[LocalizationResult] {
        &self.records
    }

    /// Results of one mobile node, in insertion order
    pub fn for_mobile(&self, mac_address: MacAddress) -> impl Iterator<Item = &LocalizationResult> {
        self.records.iter().filter(move |r| r.mac_address == mac_address)
    }

    /// Write in the given format
    pub fn write<W: Write>(&self, writer: W, format: OutputFormat) -> Result<()> {
        match format {
            OutputFormat::Csv => self.write_csv(writer),
            OutputFormat::Json => self.write_json(writer),
        }
    }

    /// CSV with a header row, one row per result
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        // serialize() only emits the header along with the first row
        if self.records.is_empty() {
            csv_writer
                .write_record(CSV_COLUMNS)
                .map_err(|e| Error::csv("<output>", e))?;
        }
        for record in &self.records {
            csv_writer
                .serialize(record)
                .map_err(|e| Error::csv("<output>", e))?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Pretty printed JSON array
    pub fn write_json<W: Write>(&self, mut writer: W) -> Result<()> {
        serde_json::to_writer_pretty(&mut writer, &self.records)?;
        writeln!(writer)?;
        Ok(())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P, format: OutputFormat) -> Result<()> {
        let file = std::fs::File::create(path.as_ref())?;
        self.write(std::io::BufWriter::new(file), format)
    }

    /// Read a result set previously written with [`Results::write_csv`]
    pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path).map_err(|e| Error::csv(path, e))?;

        let mut results = Results::new();
        for record in reader.deserialize() {
            results.push(record.map_err(|e| Error::csv(path, e))?);
        }
        Ok(results)
    }
}

impl Extend<LocalizationResult> for Results {
    fn extend<I: IntoIterator<Item = LocalizationResult>>(&mut self, iter: I) {
        self.records.extend(iter);
    }
}

impl FromIterator<LocalizationResult> for Results {
    fn from_iter<I: IntoIterator<Item = LocalizationResult>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Results {
    type Item = LocalizationResult;
    type IntoIter = std::vec::IntoIter<LocalizationResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a Results {
    type Item = &'a LocalizationResult;
    type IntoIter = std::slice::Iter<'a, LocalizationResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Direction;
    use approx::assert_relative_eq;
    use tempfile::tempdir;

    fn frame(direction: Direction, begin: Vector3<f64>, end: Vector3<f64>) -> Frame {
        Frame {
            source_mac_address: MacAddress(1),
            destination_mac_address: MacAddress(2),
            direction,
            sequence_number: 10,
            begin_clock_timestamp: 0.0,
            end_clock_timestamp: 0.0,
            begin_true_position: begin,
            end_true_position: end,
        }
    }

    fn sample(mac: u64, x: f64, y: f64) -> LocalizationResult {
        let poll = frame(Direction::Transmit, Vector3::new(x, y, 1.0), Vector3::zeros());
        let response = frame(Direction::Receive, Vector3::zeros(), Vector3::new(x, y, 1.0));
        build_result(MacAddress(mac), Vector2::new(x + 0.3, y + 0.4), &poll, &response)
    }

    #[test]
    fn test_build_result_projects_ground_truth() {
        let poll = frame(Direction::Transmit, Vector3::new(1.0, 2.0, 3.0), Vector3::new(9.0, 9.0, 9.0));
        let response = frame(Direction::Receive, Vector3::new(8.0, 8.0, 8.0), Vector3::new(4.0, 5.0, 6.0));

        let result = build_result(MacAddress(7), Vector2::new(1.5, 2.5), &poll, &response);

        assert_eq!(result.mac_address, MacAddress(7));
        assert_eq!(result.position_dimensions, 2);
        assert_eq!(result.position(), Vector3::new(1.5, 2.5, 0.0));
        assert_eq!(result.begin_true_position(), Vector3::new(1.0, 2.0, 0.0));
        assert_eq!(result.end_true_position(), Vector3::new(4.0, 5.0, 0.0));
        assert_eq!(result.reference_position(), result.end_true_position());

        // inputs untouched
        assert_eq!(poll.begin_true_position, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(response.end_true_position, Vector3::new(4.0, 5.0, 6.0));
    }

    #[test]
    fn test_horizontal_error() {
        assert_relative_eq!(sample(1, 2.0, 3.0).horizontal_error(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_for_mobile_keeps_order() {
        let results: Results = vec![sample(1, 0.0, 0.0), sample(2, 1.0, 1.0), sample(1, 2.0, 2.0)]
            .into_iter()
            .collect();

        let xs: Vec<f64> = results.for_mobile(MacAddress(1)).map(|r| r.end_true_position_x).collect();
        assert_eq!(xs, vec![0.0, 2.0]);
        assert_eq!(results.for_mobile(MacAddress(3)).count(), 0);
    }

    #[test]
    fn test_csv_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results.csv");

        let mut results = Results::new();
        results.push(sample(100, 3.0, 4.0));
        results.extend(vec![sample(101, -1.25, 7.5)]);
        results.save(&path, OutputFormat::Csv).unwrap();

        let header = std::fs::read_to_string(&path).unwrap();
        assert!(header.starts_with("mac_address,position_dimensions,position_x,position_y,position_z,"));

        let loaded = Results::read_csv(&path).unwrap();
        assert_eq!(loaded, results);
    }

    #[test]
    fn test_empty_csv_has_header() {
        let mut buffer = Vec::new();
        Results::new().write_csv(&mut buffer).unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap(), format!("{}\n", CSV_COLUMNS.join(",")));

        let mut single = Vec::new();
        let results: Results = vec![sample(1, 0.0, 0.0)].into_iter().collect();
        results.write_csv(&mut single).unwrap();
        let text = String::from_utf8(single).unwrap();
        assert_eq!(text.lines().next().unwrap(), CSV_COLUMNS.join(","));
    }

    #[test]
    fn test_json_output_is_array() {
        let mut buffer = Vec::new();
        let results: Results = vec![sample(5, 1.0, 1.0)].into_iter().collect();
        results.write(&mut buffer, OutputFormat::Json).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        let rows = value.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["mac_address"], 5);
        assert_eq!(rows[0]["reference_position_z"], 0.0);
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("CSV".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
