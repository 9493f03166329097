//! This crate provides a benchmark harness for remotely hosted, chunked,
//! multi-dimensional array datasets. It measures wall-clock time and
//! host-level network bytes transferred while performing a
//! data-access-and-compute job against an S3-compatible object store, and
//! reports aggregated metrics collected from CloudWatch Logs across many
//! parallel task runs.
//!
//! Two binaries are built from this crate:
//!
//! * `arraybench` runs one benchmark job and emits a single machine-readable
//!   `METRICS {json}` line to standard output.
//! * `arraybench-report` pages through a CloudWatch Logs group, decodes the
//!   metrics lines emitted by the runner fleet and prints per-task and
//!   averaged statistics.
//!
//! The harness is built on top of a number of open source components.
//!
//! * [Tokio](tokio), the most popular asynchronous Rust runtime.
//! * [Serde](serde) performs (de)serialisation of the metrics records.
//! * AWS SDKs for [S3](aws-sdk-s3) and [CloudWatch
//!   Logs](aws-sdk-cloudwatchlogs) interact with the object store and the
//!   log store.
//! * [ndarray] provides [NumPy](https://numpy.org)-like n-dimensional arrays
//!   used in the benchmark jobs.
//! * [linfa_clustering] provides the k-means implementation used by the
//!   large job.

pub mod cli;
pub mod dataset;
pub mod error;
pub mod jobs;
pub mod metrics;
pub mod netio;
pub mod report;
pub mod runner;
pub mod s3_client;
pub mod tracing;
