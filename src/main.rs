//! This file defines the benchmark runner binary entry point.

use arraybench::cli;
use arraybench::error;
use arraybench::runner;
use arraybench::tracing;

/// Application entry point
#[tokio::main]
async fn main() {
    let args = cli::parse_runner();
    tracing::init_tracing();
    if let Err(err) = runner::run(&args).await {
        error::report_fatal("Benchmark run failed", &err);
        std::process::exit(1);
    }
}
