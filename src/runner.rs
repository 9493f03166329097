//! Benchmark runner orchestration.
//!
//! One invocation performs one job: jittered start, counter snapshots
//! around the job execution, human-readable summary lines and exactly one
//! machine-readable metrics line on standard output. Any failure propagates
//! to the caller; the surrounding orchestration notices the missing metrics
//! line out-of-band. No retries are performed.

use std::time::{Duration, Instant};

use rand::Rng;

use crate::cli::RunnerArgs;
use crate::dataset::Dataset;
use crate::error::BenchmarkError;
use crate::jobs::{Job, LargeJob, SmallJob};
use crate::metrics::MetricsRecord;
use crate::netio;

/// Return the exclusive upper bound of the startup jitter in seconds.
///
/// Scales logarithmically with the expected number of concurrently launched
/// task instances, so that larger fleets spread over a wider window without
/// small fleets waiting long. Task counts below 2 use `ln(2)`.
pub fn max_jitter_seconds(scale_seconds: u64, expected_tasks: u64) -> f64 {
    scale_seconds as f64 * (expected_tasks.max(2) as f64).ln()
}

/// Sample a startup delay uniformly from `[0, max_seconds)`.
fn sample_jitter(max_seconds: f64) -> f64 {
    if max_seconds > 0.0 {
        rand::thread_rng().gen_range(0.0..max_seconds)
    } else {
        0.0
    }
}

/// Run one benchmark job and emit its metrics record.
///
/// The startup delay spreads the start times of many concurrently launched
/// task instances so they do not all hit the remote data source in the same
/// instant. This is probabilistic collision avoidance, not a guarantee; no
/// retry happens if collisions still occur.
pub async fn run(args: &RunnerArgs) -> Result<(), BenchmarkError> {
    let max_wait = max_jitter_seconds(args.jitter_seconds, args.expected_tasks);
    let delay = sample_jitter(max_wait);
    println!("Start jitter: sleeping {:.1} s (max {:.1} s)", delay, max_wait);
    tokio::time::sleep(Duration::from_secs_f64(delay)).await;

    // The dataset open happens inside the measured window; it transfers the
    // manifest and is part of the workload's access pattern.
    let before = netio::snapshot();
    let start = Instant::now();

    let dataset = Dataset::open(&args.url, &args.storage_options()).await?;
    let job: &dyn Job = if args.large_job { &LargeJob } else { &SmallJob };
    tracing::info!("running {} job against {}", job.name(), args.url);
    let summary = job.execute(&dataset).await?;
    tracing::info!("{} job completed: {}", job.name(), summary);

    let wall_seconds = start.elapsed().as_secs_f64();
    let after = netio::snapshot();
    let (bytes_received, bytes_sent) = after.delta_since(&before);

    println!("Wall time:         {:.2} s", wall_seconds);
    println!("Bytes received:    {:.2} MB", bytes_received as f64 / 1e6);
    println!("Bytes sent:        {:.2} MB", bytes_sent as f64 / 1e6);
    println!(
        "Total bytes:       {:.2} MB",
        (bytes_received + bytes_sent) as f64 / 1e6
    );

    let record = MetricsRecord::new(
        args.run_id.clone(),
        args.pod_name.clone(),
        wall_seconds,
        bytes_received,
        bytes_sent,
    );
    if record.avg_throughput_mb_s > 0.0 {
        println!("Avg throughput:    {:.2} MB/s", record.avg_throughput_mb_s);
    }
    println!("{}", record.to_line()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_jitter_scales_with_task_count() {
        let small = max_jitter_seconds(5, 2);
        let large = max_jitter_seconds(5, 100);
        assert_eq!(5.0 * 2.0_f64.ln(), small);
        assert_eq!(5.0 * 100.0_f64.ln(), large);
        assert!(large > small);
    }

    #[test]
    fn max_jitter_small_fleet_uses_ln_two() {
        assert_eq!(max_jitter_seconds(5, 2), max_jitter_seconds(5, 0));
        assert_eq!(max_jitter_seconds(5, 2), max_jitter_seconds(5, 1));
    }

    #[test]
    fn sample_jitter_within_bound() {
        let max = max_jitter_seconds(5, 10);
        for _ in 0..1000 {
            let delay = sample_jitter(max);
            assert!((0.0..max).contains(&delay));
        }
    }

    #[test]
    fn sample_jitter_zero_scale() {
        assert_eq!(0.0, sample_jitter(max_jitter_seconds(0, 10)));
        assert_eq!(0.0, sample_jitter(0.0));
    }
}
