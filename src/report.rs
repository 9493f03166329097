//! Metrics aggregation and reporting.
//!
//! The aggregator pages through a CloudWatch Logs group for marker-prefixed
//! metrics lines, decodes them into [MetricsRecord]s and prints per-task and
//! averaged statistics. Fetch failures are fatal; decode failures affect
//! only the offending record and are skipped with a diagnostic on the error
//! stream.

use aws_config::BehaviorVersion;
use aws_sdk_cloudwatchlogs::Client;
use aws_types::region::Region;

use crate::error::BenchmarkError;
use crate::metrics::{MetricsRecord, METRICS_PREFIX};

/// Sentinel label used in the report when no run_id filter was supplied.
const ANY_RUN_ID: &str = "<any>";

/// Stream label used when an event carries no log stream name.
const UNKNOWN_STREAM: &str = "<unknown-stream>";

/// A log event fetched from the log store.
///
/// Converted from the SDK event type at the fetch boundary so that the
/// parse and report pipeline stays free of SDK types.
#[derive(Clone, Debug, PartialEq)]
pub struct LogEvent {
    /// The raw log message
    pub message: String,
    /// The log stream the event was written to, standing in for task
    /// identity when the record carries no pod name
    pub stream: String,
}

/// Build a CloudWatch Logs client, using the ambient credentials-and-region
/// resolution unless an explicit region is given.
pub async fn cloudwatch_client(region: Option<String>) -> Client {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(Region::new(region));
    }
    Client::new(&loader.load().await)
}

/// Fetch all metrics-bearing events from a log group.
///
/// Pages through `FilterLogEvents` with the marker pattern until the store
/// stops returning a continuation token, accumulating events in the store's
/// return order. The store is trusted to terminate the pagination; no upper
/// bound or timeout is applied.
///
/// # Arguments
///
/// * `client`: CloudWatch Logs client
/// * `log_group`: Name of the log group to query
pub async fn fetch_log_events(
    client: &Client,
    log_group: &str,
) -> Result<Vec<LogEvent>, BenchmarkError> {
    let mut events = Vec::new();
    let mut next_token: Option<String> = None;
    loop {
        let response = client
            .filter_log_events()
            .log_group_name(log_group)
            .filter_pattern(METRICS_PREFIX.trim_end())
            .set_next_token(next_token)
            .send()
            .await
            .map_err(BenchmarkError::from)?;
        events.extend(response.events().iter().map(|event| LogEvent {
            message: event.message().unwrap_or_default().to_string(),
            stream: event
                .log_stream_name()
                .unwrap_or(UNKNOWN_STREAM)
                .to_string(),
        }));
        next_token = response.next_token().map(str::to_string);
        if next_token.is_none() {
            break;
        }
        tracing::debug!("fetched {} events so far, following nextToken", events.len());
    }
    Ok(events)
}

/// Decode marker-prefixed events into metrics records.
///
/// Events without the marker are ignored. Events whose payload fails to
/// decode are skipped with one diagnostic on the error stream naming the
/// offending message; parsing continues for the rest. A record without a
/// pod name takes the event's stream identifier. When a run_id filter is
/// supplied, records with a different (or missing) run_id are dropped.
/// Fetch order is preserved.
///
/// # Arguments
///
/// * `events`: Events in store return order
/// * `run_id`: Optional run_id filter
pub fn parse_metrics(events: &[LogEvent], run_id: Option<&str>) -> Vec<MetricsRecord> {
    let mut records = Vec::new();
    for event in events {
        let message = event.message.trim();
        let mut record = match MetricsRecord::from_line(message) {
            None => continue,
            Some(Err(error)) => {
                eprintln!("Failed to parse METRICS line: {:?} ({})", message, error);
                continue;
            }
            Some(Ok(record)) => record,
        };
        if record.pod_name.is_empty() {
            record.pod_name = event.stream.clone();
        }
        if let Some(run_id) = run_id {
            if record.run_id != run_id {
                continue;
            }
        }
        records.push(record);
    }
    records
}

/// Arithmetic means of the numeric metrics fields across a record set.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Averages {
    pub wall_seconds: f64,
    pub bytes_received: f64,
    pub bytes_sent: f64,
    pub total_bytes: f64,
    pub avg_throughput_mb_s: f64,
}

impl Averages {
    /// Compute field-wise means over the records; all zero for an empty set.
    pub fn from_records(records: &[MetricsRecord]) -> Self {
        if records.is_empty() {
            return Self::default();
        }
        let count = records.len() as f64;
        let mut totals = Self::default();
        for record in records {
            totals.wall_seconds += record.wall_seconds;
            totals.bytes_received += record.bytes_received as f64;
            totals.bytes_sent += record.bytes_sent as f64;
            totals.total_bytes += record.total_bytes as f64;
            totals.avg_throughput_mb_s += record.avg_throughput_mb_s;
        }
        Self {
            wall_seconds: totals.wall_seconds / count,
            bytes_received: totals.bytes_received / count,
            bytes_sent: totals.bytes_sent / count,
            total_bytes: totals.total_bytes / count,
            avg_throughput_mb_s: totals.avg_throughput_mb_s / count,
        }
    }
}

/// Print the benchmark report for a record set.
///
/// An empty set prints a single "no records" line; otherwise a header, one
/// line per record and an averages block.
///
/// # Arguments
///
/// * `run_id`: The run_id filter the records were selected with, if any
/// * `records`: Surviving records in fetch order
pub fn print_report(run_id: Option<&str>, records: &[MetricsRecord]) {
    let label = run_id.unwrap_or(ANY_RUN_ID);
    if records.is_empty() {
        println!("No METRICS lines found for run_id={}", label);
        return;
    }

    println!("=== Benchmark report for RUN_ID={} ===", label);
    println!("Tasks with metrics: {}", records.len());
    println!();

    println!("Per-task metrics:");
    for record in records {
        println!(
            "  {:40}  wall={:7.2}s  total={:8.2} MB  thr={:7.2} MB/s",
            record.pod_name,
            record.wall_seconds,
            record.total_bytes as f64 / 1e6,
            record.avg_throughput_mb_s
        );
    }

    let averages = Averages::from_records(records);
    println!();
    println!("Averages over all tasks:");
    println!("  Wall time:         {:.2} s", averages.wall_seconds);
    println!("  Bytes received:    {:.2} MB", averages.bytes_received / 1e6);
    println!("  Bytes sent:        {:.2} MB", averages.bytes_sent / 1e6);
    println!("  Total bytes:       {:.2} MB", averages.total_bytes / 1e6);
    println!("  Avg throughput:    {:.2} MB/s", averages.avg_throughput_mb_s);
}
