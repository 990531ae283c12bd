use crate::core::MacAddress;
use crate::results::{LocalizationResult, Results};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Error below which a fix counts as sub-meter (meters)
pub const SUBMETER_THRESHOLD: f64 = 1.0;

/// Statistics of the horizontal error between solved and reference positions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccuracySummary {
    /// Number of samples in statistics
    pub sample_count: usize,
    /// Mean error (meters)
    pub mean_error: f64,
    /// Population standard deviation (meters)
    pub std_dev_error: f64,
    /// Root Mean Square Error (meters)
    pub rmse: f64,
    /// 95th percentile error (meters)
    pub error_95_percentile: f64,
    pub min_error: f64,
    pub max_error: f64,
    /// Fraction of samples below [`SUBMETER_THRESHOLD`] (0-1)
    pub submeter_rate: f64,
}

impl AccuracySummary {
    /// Summary over raw error magnitudes
    pub fn from_errors(errors: &[f64]) -> Self {
        if errors.is_empty() {
            return Self {
                sample_count: 0,
                mean_error: 0.0,
                std_dev_error: 0.0,
                rmse: 0.0,
                error_95_percentile: 0.0,
                min_error: 0.0,
                max_error: 0.0,
                submeter_rate: 0.0,
            };
        }

        let n = errors.len();
        let mean_error = errors.iter().sum::<f64>() / n as f64;
        let rmse = (errors.iter().map(|e| e.powi(2)).sum::<f64>() / n as f64).sqrt();
        let variance = errors.iter().map(|e| (e - mean_error).powi(2)).sum::<f64>() / n as f64;

        let max_error = errors.iter().copied().fold(0.0, f64::max);
        let min_error = errors.iter().copied().fold(f64::INFINITY, f64::min);

        let mut sorted = errors.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let index_95 = ((n as f64 * 0.95).ceil() as usize).saturating_sub(1).min(n - 1);

        let submeter = errors.iter().filter(|&&e| e < SUBMETER_THRESHOLD).count();

        Self {
            sample_count: n,
            mean_error,
            std_dev_error: variance.sqrt(),
            rmse,
            error_95_percentile: sorted[index_95],
            min_error,
            max_error,
            submeter_rate: submeter as f64 / n as f64,
        }
    }

    pub fn from_results<'a, I>(results: I) -> Self
    where
        I: IntoIterator<Item = &'a LocalizationResult>,
    {
        let errors: Vec<f64> = results.into_iter().map(LocalizationResult::horizontal_error).collect();
        Self::from_errors(&errors)
    }

    /// One summary per mobile node, keyed by MAC address
    pub fn per_mobile(results: &Results) -> BTreeMap<MacAddress, AccuracySummary> {
        let mut errors: BTreeMap<MacAddress, Vec<f64>> = BTreeMap::new();
        for result in results {
            errors.entry(result.mac_address).or_default().push(result.horizontal_error());
        }

        errors
            .into_iter()
            .map(|(mac, errors)| (mac, Self::from_errors(&errors)))
            .collect()
    }
}

impl fmt::Display for AccuracySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "n={} mean={:.3}m std={:.3}m rmse={:.3}m p95={:.3}m min={:.3}m max={:.3}m sub-meter={:.1}%",
            self.sample_count,
            self.mean_error,
            self.std_dev_error,
            self.rmse,
            self.error_95_percentile,
            self.min_error,
            self.max_error,
            self.submeter_rate * 100.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Direction, Frame};
    use crate::results::build_result;
    use approx::assert_relative_eq;
    use nalgebra::{Vector2, Vector3};

    fn result(mac: u64, error_x: f64) -> LocalizationResult {
        let frame = Frame {
            source_mac_address: MacAddress(mac),
            destination_mac_address: MacAddress(0),
            direction: Direction::Receive,
            sequence_number: 0,
            begin_clock_timestamp: 0.0,
            end_clock_timestamp: 0.0,
            begin_true_position: Vector3::zeros(),
            end_true_position: Vector3::new(1.0, 1.0, 0.0),
        };
        build_result(MacAddress(mac), Vector2::new(1.0 + error_x, 1.0), &frame, &frame)
    }

    #[test]
    fn test_known_errors() {
        let summary = AccuracySummary::from_errors(&[0.5, 1.5, 1.0, 2.0]);

        assert_eq!(summary.sample_count, 4);
        assert_relative_eq!(summary.mean_error, 1.25, epsilon = 1e-12);
        assert_relative_eq!(summary.std_dev_error, 0.3125_f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(summary.rmse, 1.875_f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(summary.error_95_percentile, 2.0);
        assert_relative_eq!(summary.min_error, 0.5);
        assert_relative_eq!(summary.max_error, 2.0);
        assert_relative_eq!(summary.submeter_rate, 0.25);
    }

    #[test]
    fn test_empty_summary() {
        let summary = AccuracySummary::from_results(&Results::new());
        assert_eq!(summary.sample_count, 0);
        assert_eq!(summary.rmse, 0.0);
    }

    #[test]
    fn test_per_mobile_breakdown() {
        let results: Results = vec![result(1, 0.2), result(2, 3.0), result(1, 0.4)].into_iter().collect();

        let overall = AccuracySummary::from_results(&results);
        assert_eq!(overall.sample_count, 3);

        let per_mobile = AccuracySummary::per_mobile(&results);
        assert_eq!(per_mobile.len(), 2);
        assert_relative_eq!(per_mobile[&MacAddress(1)].mean_error, 0.3, epsilon = 1e-12);
        assert_relative_eq!(per_mobile[&MacAddress(1)].submeter_rate, 1.0);
        assert_relative_eq!(per_mobile[&MacAddress(2)].max_error, 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_display() {
        let text = AccuracySummary::from_errors(&[0.25]).to_string();
        assert!(text.contains("n=1"));
        assert!(text.contains("rmse=0.250m"));
        assert!(text.contains("sub-meter=100.0%"));
    }
}
