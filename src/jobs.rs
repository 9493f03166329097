//! Benchmark job bodies.
//!
//! Each job is a declarative data-selection-and-aggregation pipeline run
//! against an opened [Dataset](crate::dataset::Dataset). The runner core
//! treats jobs as an injected capability: it selects one by configuration
//! and only cares that `execute` returns some summary whose shape is
//! irrelevant to the metrics pipeline.

use std::fmt;

use async_trait::async_trait;
use linfa::prelude::*;
use linfa_clustering::KMeans;
use ndarray::{s, Array1, Array2, ArrayView3, ErrorKind, Ix3, ShapeError};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;

use crate::dataset::Dataset;
use crate::error::BenchmarkError;

/// Variable reduced by the small job.
pub const SMALL_JOB_VARIABLE: &str = "cams_frpfire";
/// Variables combined into the large job's feature table.
pub const LARGE_JOB_VARIABLES: [&str; 2] = ["cams_frpfire", "fwi_mean"];
/// Number of trailing time steps in the large job's temporal window.
pub const TIME_WINDOW: usize = 500;
/// Spatial subsampling stride of the large job.
pub const SPATIAL_STRIDE: usize = 4;
/// Fixed cluster count of the large job.
pub const NUM_CLUSTERS: usize = 4;

/// Dimension layout the large job expects of its variables.
const LARGE_JOB_DIMS: [&str; 3] = ["time", "latitude", "longitude"];

/// Opaque result summary of a job execution, used only for logging.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum JobSummary {
    /// Scalar mean produced by the small job
    Mean(f64),
    /// Cluster assignment grid produced by the large job
    Clusters { points: usize, clusters: usize },
}

impl fmt::Display for JobSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobSummary::Mean(value) => write!(f, "mean={:.6}", value),
            JobSummary::Clusters { points, clusters } => {
                write!(f, "{} points in {} clusters", points, clusters)
            }
        }
    }
}

/// Trait for benchmark jobs.
///
/// This forms the contract between the runner core and the job bodies.
#[async_trait]
pub trait Job {
    /// Short name of the job variant, used for logging.
    fn name(&self) -> &'static str;

    /// Execute the job against an opened dataset.
    async fn execute(&self, dataset: &Dataset) -> Result<JobSummary, BenchmarkError>;
}

/// Mean of one variable over all of its dimensions. Transfers roughly
/// 110 MB against the reference dataset.
pub struct SmallJob;

#[async_trait]
impl Job for SmallJob {
    fn name(&self) -> &'static str {
        "small"
    }

    async fn execute(&self, dataset: &Dataset) -> Result<JobSummary, BenchmarkError> {
        let variable = dataset.variable(SMALL_JOB_VARIABLE)?;
        let values = variable.read().await?;
        Ok(JobSummary::Mean(nan_mean(values.iter().copied())))
    }
}

/// Temporal mean of two variables over a trailing window, spatially
/// subsampled, clustered with k-means and reattached to the spatial grid.
/// Transfers roughly 1 GB against the reference dataset.
pub struct LargeJob;

#[async_trait]
impl Job for LargeJob {
    fn name(&self) -> &'static str {
        "large"
    }

    async fn execute(&self, dataset: &Dataset) -> Result<JobSummary, BenchmarkError> {
        let mut columns = Vec::with_capacity(LARGE_JOB_VARIABLES.len());
        for name in LARGE_JOB_VARIABLES {
            let variable = dataset.variable(name)?;
            let dims = &variable.meta().dims;
            if !dims.is_empty() && dims != &LARGE_JOB_DIMS {
                return Err(BenchmarkError::DimensionMismatch {
                    name: name.to_string(),
                    expected: LARGE_JOB_DIMS.iter().map(|d| d.to_string()).collect(),
                    actual: dims.clone(),
                });
            }
            let window = variable
                .read_last(TIME_WINDOW)
                .await?
                .into_dimensionality::<Ix3>()?;
            let mean = nan_mean_axis0(&window.view());
            let stride = SPATIAL_STRIDE as isize;
            columns.push(mean.slice(s![..;stride, ..;stride]).to_owned());
        }
        let (rows, cols) = columns
            .first()
            .ok_or(BenchmarkError::EmptyArray {
                operation: "feature assembly",
            })?
            .dim();
        let features = build_feature_matrix(&columns)?;
        let labels = cluster_labels(features, NUM_CLUSTERS)?;
        // Reattach the per-point labels to the subsampled spatial grid.
        let grid = labels.into_shape((rows, cols))?;
        let mut sizes = vec![0usize; NUM_CLUSTERS];
        for label in grid.iter() {
            sizes[*label] += 1;
        }
        tracing::debug!("cluster sizes: {:?}", sizes);
        Ok(JobSummary::Clusters {
            points: grid.len(),
            clusters: NUM_CLUSTERS,
        })
    }
}

/// Mean of the non-NaN values of an iterator, mirroring the skip-missing
/// semantics of the dataset's native tooling. Returns NaN when no values
/// remain.
pub fn nan_mean(values: impl Iterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut count: usize = 0;
    for value in values {
        if !value.is_nan() {
            sum += value;
            count += 1;
        }
    }
    if count > 0 {
        sum / count as f64
    } else {
        f64::NAN
    }
}

/// Reduce a `(time, y, x)` cube to a `(y, x)` grid of NaN-skipping means
/// over the leading axis.
pub fn nan_mean_axis0(cube: &ArrayView3<f64>) -> Array2<f64> {
    let (_, rows, cols) = cube.dim();
    Array2::from_shape_fn((rows, cols), |(y, x)| {
        nan_mean(cube.slice(s![.., y, x]).iter().copied())
    })
}

/// Assemble per-variable spatial grids into a `(points, features)` table,
/// flattening each grid in row-major order and replacing missing values
/// with zero.
pub fn build_feature_matrix(columns: &[Array2<f64>]) -> Result<Array2<f64>, BenchmarkError> {
    let first = columns.first().ok_or(BenchmarkError::EmptyArray {
        operation: "feature assembly",
    })?;
    let (rows, cols) = first.dim();
    let mut features = Array2::zeros((rows * cols, columns.len()));
    for (feature, column) in columns.iter().enumerate() {
        if column.dim() != (rows, cols) {
            return Err(ShapeError::from_kind(ErrorKind::IncompatibleShape).into());
        }
        for (point, value) in column.iter().enumerate() {
            features[[point, feature]] = if value.is_nan() { 0.0 } else { *value };
        }
    }
    Ok(features)
}

/// Fit k-means over the feature table and return one cluster label per
/// point. Initialisation strategy and run count are left to the library
/// defaults.
pub fn cluster_labels(
    features: Array2<f64>,
    clusters: usize,
) -> Result<Array1<usize>, BenchmarkError> {
    let rng = Xoshiro256Plus::seed_from_u64(rand::thread_rng().gen());
    let observations = DatasetBase::from(features);
    let model = KMeans::params_with_rng(clusters, rng).fit(&observations)?;
    let assigned = model.predict(observations);
    Ok(assigned.targets)
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::{array, Array3};

    #[test]
    fn nan_mean_skips_missing() {
        let values = [1.0, f64::NAN, 3.0];
        assert_eq!(2.0, nan_mean(values.iter().copied()));
    }

    #[test]
    fn nan_mean_all_missing() {
        let values = [f64::NAN, f64::NAN];
        assert!(nan_mean(values.iter().copied()).is_nan());
    }

    #[test]
    fn nan_mean_empty() {
        assert!(nan_mean(std::iter::empty()).is_nan());
    }

    #[test]
    fn nan_mean_axis0_reduces_time() {
        let mut cube = Array3::zeros((3, 1, 2));
        cube[[0, 0, 0]] = 1.0;
        cube[[1, 0, 0]] = 2.0;
        cube[[2, 0, 0]] = 3.0;
        cube[[0, 0, 1]] = 4.0;
        cube[[1, 0, 1]] = f64::NAN;
        cube[[2, 0, 1]] = 8.0;
        let mean = nan_mean_axis0(&cube.view());
        assert_eq!((1, 2), mean.dim());
        assert_eq!(2.0, mean[[0, 0]]);
        assert_eq!(6.0, mean[[0, 1]]);
    }

    #[test]
    fn build_feature_matrix_fills_missing_with_zero() {
        let a = array![[1.0, f64::NAN], [3.0, 4.0]];
        let b = array![[5.0, 6.0], [f64::NAN, 8.0]];
        let features = build_feature_matrix(&[a, b]).unwrap();
        assert_eq!((4, 2), features.dim());
        // Row-major point order: (0,0), (0,1), (1,0), (1,1).
        assert_eq!(1.0, features[[0, 0]]);
        assert_eq!(0.0, features[[1, 0]]);
        assert_eq!(3.0, features[[2, 0]]);
        assert_eq!(5.0, features[[0, 1]]);
        assert_eq!(0.0, features[[2, 1]]);
        assert_eq!(8.0, features[[3, 1]]);
    }

    #[test]
    fn build_feature_matrix_rejects_mismatched_grids() {
        let a = Array2::zeros((2, 2));
        let b = Array2::zeros((2, 3));
        let result = build_feature_matrix(&[a, b]);
        assert!(matches!(result, Err(BenchmarkError::ShapeInvalid(_))));
    }

    #[test]
    fn build_feature_matrix_rejects_empty_input() {
        let result = build_feature_matrix(&[]);
        assert!(matches!(result, Err(BenchmarkError::EmptyArray { .. })));
    }

    #[test]
    fn cluster_labels_separates_blobs() {
        // Two tight, well-separated groups of four points each.
        let mut points = Vec::new();
        for i in 0..4 {
            points.push([0.0 + 0.01 * i as f64, 0.0]);
        }
        for i in 0..4 {
            points.push([100.0 + 0.01 * i as f64, 100.0]);
        }
        let features =
            Array2::from_shape_vec((8, 2), points.into_iter().flatten().collect()).unwrap();
        let labels = cluster_labels(features, 2).unwrap();
        assert_eq!(8, labels.len());
        assert!(labels.iter().all(|label| *label < 2));
        for i in 1..4 {
            assert_eq!(labels[0], labels[i]);
            assert_eq!(labels[4], labels[4 + i]);
        }
        assert_ne!(labels[0], labels[4]);
    }

    #[test]
    fn job_summary_display() {
        assert_eq!("mean=1.500000", JobSummary::Mean(1.5).to_string());
        assert_eq!(
            "180 points in 4 clusters",
            JobSummary::Clusters {
                points: 180,
                clusters: 4
            }
            .to_string()
        );
    }
}
