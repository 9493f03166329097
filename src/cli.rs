//! Command Line Interface (CLI) arguments.
//!
//! Runner configuration is environment-sourced in deployment (the task
//! orchestrator injects environment variables), so every runner argument
//! carries an `env` fallback. Both argument structs are parsed once at
//! process start and passed by reference; there is no ambient global
//! configuration.

use clap::Parser;
use url::Url;

use crate::s3_client::StorageOptions;

/// Default startup jitter scale in seconds.
const DEFAULT_JITTER_SECONDS: u64 = 5;

/// Benchmark runner command line interface
#[derive(Clone, Debug, Parser)]
pub struct RunnerArgs {
    /// URL of the remote dataset
    #[arg(
        long,
        env = "URL",
        default_value = "https://s3.waw4-1.cloudferro.com/EarthCODE/OSCAssets/seasfire/seasfire_v0.4.zarr"
    )]
    pub url: Url,
    /// Whether to run the large job ("1", "true" or "yes", case-insensitive;
    /// anything else selects the small job)
    #[arg(
        long,
        env = "LARGE_JOB",
        default_value = "",
        value_parser = parse_flag,
        action = clap::ArgAction::Set
    )]
    pub large_job: bool,
    /// Expected number of concurrently launched task instances, used to
    /// scale the startup jitter
    #[arg(long, env = "NUM_RUNS", default_value_t = 5)]
    pub expected_tasks: u64,
    /// Label grouping all runner invocations of one experiment batch
    #[arg(long, env = "RUN_ID", default_value = "")]
    pub run_id: String,
    /// Label identifying this task instance in the emitted metrics
    #[arg(long, env = "POD_NAME", default_value = "")]
    pub pod_name: String,
    /// Startup jitter scale in seconds; unparsable values fall back to 5
    #[arg(long, env = "WAIT_TIME", default_value = "5", value_parser = parse_jitter_seconds)]
    pub jitter_seconds: u64,
    /// Object storage access key id; anonymous access when absent
    #[arg(long, env = "AWS_ACCESS_KEY_ID")]
    pub access_key: Option<String>,
    /// Object storage secret access key
    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,
    /// Object storage session token
    #[arg(long, env = "AWS_SESSION_TOKEN", hide_env_values = true)]
    pub session_token: Option<String>,
    /// Object storage endpoint override; derived from the dataset URL when
    /// absent
    #[arg(long, env = "AWS_ENDPOINT")]
    pub endpoint: Option<String>,
    /// Object storage region
    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,
}

impl RunnerArgs {
    /// Returns the object storage options described by these arguments.
    pub fn storage_options(&self) -> StorageOptions {
        StorageOptions {
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
            session_token: self.session_token.clone(),
            endpoint: self.endpoint.clone(),
            region: self.region.clone(),
        }
    }
}

/// Metrics aggregator command line interface
#[derive(Clone, Debug, Parser)]
pub struct ReportArgs {
    /// Filter by the run_id value embedded in the METRICS JSON. If omitted,
    /// include all records.
    #[arg(long)]
    pub run_id: Option<String>,
    /// CloudWatch Logs group name to query
    #[arg(long, default_value = "/ecs/arraybench")]
    pub log_group_name: String,
    /// AWS region; uses the ambient credentials-and-region resolution when
    /// absent
    #[arg(long)]
    pub region: Option<String>,
}

/// Parse a lenient boolean flag: "1", "true" and "yes" (case-insensitive)
/// are true, everything else is false.
fn parse_flag(value: &str) -> Result<bool, std::convert::Infallible> {
    Ok(matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    ))
}

/// Parse the jitter scale, falling back to the default when unparsable.
fn parse_jitter_seconds(value: &str) -> Result<u64, std::convert::Infallible> {
    Ok(value.trim().parse().unwrap_or(DEFAULT_JITTER_SECONDS))
}

/// Returns parsed runner command line arguments.
pub fn parse_runner() -> RunnerArgs {
    RunnerArgs::parse()
}

/// Returns parsed aggregator command line arguments.
pub fn parse_report() -> ReportArgs {
    ReportArgs::parse()
}
