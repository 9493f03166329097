//! Benchmark metrics records.
//!
//! A [MetricsRecord] is produced once per runner invocation and emitted as a
//! single marker-prefixed line on standard output, where the surrounding log
//! infrastructure scrapes it. Every emitted record is independently
//! parseable; the aggregator assumes nothing beyond "marker-prefixed lines
//! are metrics, one JSON object per line".

use serde::{Deserialize, Serialize};

use crate::error::BenchmarkError;

/// Marker token distinguishing machine-readable metrics lines from
/// human-readable output.
pub const METRICS_PREFIX: &str = "METRICS ";

/// Metrics for one benchmark job execution.
///
/// Constructed after job completion and never mutated again. All fields
/// default when absent so that the aggregator tolerates partial records
/// scraped from foreign log lines.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct MetricsRecord {
    /// Label grouping records from the same experiment batch
    #[serde(default)]
    pub run_id: String,
    /// Label identifying the emitting task instance
    #[serde(default)]
    pub pod_name: String,
    /// Job execution duration in seconds
    #[serde(default)]
    pub wall_seconds: f64,
    /// Host-level network bytes received during the job's execution window
    #[serde(default)]
    pub bytes_received: u64,
    /// Host-level network bytes sent during the job's execution window
    #[serde(default)]
    pub bytes_sent: u64,
    /// Sum of bytes received and sent
    #[serde(default)]
    pub total_bytes: u64,
    /// Average throughput in MB/s over the execution window
    #[serde(default)]
    pub avg_throughput_mb_s: f64,
}

impl MetricsRecord {
    /// Return a new MetricsRecord with the derived fields computed.
    ///
    /// # Arguments
    ///
    /// * `run_id`: Experiment batch label
    /// * `pod_name`: Task instance label
    /// * `wall_seconds`: Job execution duration
    /// * `bytes_received`: Network bytes received delta
    /// * `bytes_sent`: Network bytes sent delta
    pub fn new(
        run_id: String,
        pod_name: String,
        wall_seconds: f64,
        bytes_received: u64,
        bytes_sent: u64,
    ) -> Self {
        let total_bytes = bytes_received + bytes_sent;
        MetricsRecord {
            run_id,
            pod_name,
            wall_seconds,
            bytes_received,
            bytes_sent,
            total_bytes,
            avg_throughput_mb_s: throughput_mb_s(total_bytes, wall_seconds),
        }
    }

    /// Encode the record as a single marker-prefixed line.
    pub fn to_line(&self) -> Result<String, BenchmarkError> {
        Ok(format!("{}{}", METRICS_PREFIX, serde_json::to_string(self)?))
    }

    /// Decode a record from a marker-prefixed line.
    ///
    /// Returns `None` when the line does not carry the marker, and
    /// `Some(Err(_))` when the payload after the marker is not valid JSON.
    pub fn from_line(line: &str) -> Option<Result<Self, BenchmarkError>> {
        line.trim()
            .strip_prefix(METRICS_PREFIX)
            .map(|payload| serde_json::from_str(payload).map_err(BenchmarkError::from))
    }
}

/// Return the average throughput in MB/s.
///
/// Defined as exactly `0.0` when the duration or byte count is not positive,
/// to avoid division artifacts.
pub fn throughput_mb_s(total_bytes: u64, wall_seconds: f64) -> f64 {
    if wall_seconds > 0.0 && total_bytes > 0 {
        total_bytes as f64 / 1e6 / wall_seconds
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record() -> MetricsRecord {
        MetricsRecord::new("run1".to_string(), "task-0".to_string(), 2.0, 1_000_000, 500)
    }

    #[test]
    fn throughput() {
        assert_eq!(0.5, throughput_mb_s(1_000_000, 2.0));
        assert_eq!(2.0, throughput_mb_s(4_000_000, 2.0));
    }

    #[test]
    fn throughput_zero_wall() {
        assert_eq!(0.0, throughput_mb_s(1_000_000, 0.0));
        assert_eq!(0.0, throughput_mb_s(1_000_000, -1.0));
    }

    #[test]
    fn throughput_zero_bytes() {
        assert_eq!(0.0, throughput_mb_s(0, 2.0));
    }

    #[test]
    fn new_computes_derived_fields() {
        let record = make_record();
        assert_eq!(1_000_500, record.total_bytes);
        assert_eq!(1_000_500.0 / 1e6 / 2.0, record.avg_throughput_mb_s);
    }

    #[test]
    fn line_round_trip() {
        let record = make_record();
        let line = record.to_line().unwrap();
        assert!(line.starts_with(METRICS_PREFIX));
        assert!(!line.contains('\n'));
        let decoded = MetricsRecord::from_line(&line).unwrap().unwrap();
        assert_eq!(record, decoded);
    }

    #[test]
    fn from_line_without_marker() {
        assert!(MetricsRecord::from_line("Wall time: 2.00 s").is_none());
        // The marker must be a prefix, not merely present.
        assert!(MetricsRecord::from_line("see METRICS {}").is_none());
    }

    #[test]
    fn from_line_invalid_json() {
        let result = MetricsRecord::from_line("METRICS {not json").unwrap();
        assert!(result.is_err());
    }

    #[test]
    fn from_line_defaults_missing_fields() {
        let decoded = MetricsRecord::from_line("METRICS {\"run_id\":\"run1\"}")
            .unwrap()
            .unwrap();
        assert_eq!("run1", decoded.run_id);
        assert_eq!("", decoded.pod_name);
        assert_eq!(0, decoded.total_bytes);
        assert_eq!(0.0, decoded.wall_seconds);
    }

    #[test]
    fn serialised_field_names() {
        let record = make_record();
        let value: serde_json::Value =
            serde_json::from_str(record.to_line().unwrap().strip_prefix(METRICS_PREFIX).unwrap())
                .unwrap();
        for key in [
            "run_id",
            "pod_name",
            "wall_seconds",
            "bytes_received",
            "bytes_sent",
            "total_bytes",
            "avg_throughput_mb_s",
        ] {
            assert!(value.get(key).is_some(), "missing key {}", key);
        }
    }
}
