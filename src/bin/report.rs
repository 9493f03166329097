//! This file defines the metrics aggregator binary entry point.

use arraybench::cli;
use arraybench::error;
use arraybench::report;
use arraybench::tracing;

/// Application entry point
#[tokio::main]
async fn main() {
    let args = cli::parse_report();
    tracing::init_tracing();
    let client = report::cloudwatch_client(args.region.clone()).await;
    let events = match report::fetch_log_events(&client, &args.log_group_name).await {
        Ok(events) => events,
        Err(err) => {
            error::report_fatal("Error calling FilterLogEvents", &err);
            std::process::exit(1);
        }
    };
    let records = report::parse_metrics(&events, args.run_id.as_deref());
    report::print_report(args.run_id.as_deref(), &records);
}
